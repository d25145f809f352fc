use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{batch_delete, db, delete_by_id, search_pattern, FieldErrors, ServiceError, ServiceResult};
use crate::database::models::{clean, Project, ProjectInput, ProjectStatus};
use crate::database::{DatabaseManager, Page, PageParams};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
}

impl ProjectFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(pattern) = search_pattern(self.search.as_deref()) {
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = clean(&self.status) {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(client_id) = self.client_id {
            qb.push(" AND client_id = ").push_bind(client_id);
        }
    }
}

pub struct ProjectService {
    pool: PgPool,
}

impl ProjectService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list(&self, filter: &ProjectFilter, page: &PageParams) -> ServiceResult<Page<Project>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects WHERE TRUE");
        filter.push_conditions(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar projetos"))?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM projects WHERE TRUE");
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY COALESCE(start_date, created_at::date) DESC, name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<Project>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar projetos"))?;

        Ok(Page::new(items, total, page))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Project> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar projeto"))?
            .ok_or_else(|| ServiceError::NotFound("Projeto não encontrado".to_string()))
    }

    pub async fn create(&self, input: ProjectInput) -> ServiceResult<Project> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, client_id, description, status, start_date, end_date, budget)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(input.client_id)
        .bind(&input.description)
        .bind(status_of(&input))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .fetch_one(&mut *conn)
        .await
        .map_err(db("Erro ao criar projeto"))
    }

    pub async fn update(&self, id: Uuid, input: ProjectInput) -> ServiceResult<Project> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = $2, client_id = $3, description = $4, status = $5,
                start_date = $6, end_date = $7, budget = $8, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.client_id)
        .bind(&input.description)
        .bind(status_of(&input))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao atualizar projeto"))?
        .ok_or_else(|| ServiceError::NotFound("Projeto não encontrado".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        delete_by_id(&self.pool, "projects", id, "Projeto não encontrado").await
    }

    pub async fn batch_delete(&self, ids: &[Uuid]) -> ServiceResult<u64> {
        batch_delete(&self.pool, "projects", ids).await
    }
}

fn status_of(input: &ProjectInput) -> &str {
    input.status.as_deref().unwrap_or(ProjectStatus::Planejado.as_str())
}

fn normalize(input: ProjectInput) -> ProjectInput {
    ProjectInput {
        name: input.name.trim().to_string(),
        description: clean(&input.description),
        status: clean(&input.status),
        ..input
    }
}

fn validate(input: &ProjectInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("name", &input.name);
    errors.parses::<ProjectStatus>("status", input.status.as_deref());
    if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
        errors.check(end >= start, "end_date", "A data de término deve ser igual ou posterior ao início");
    }
    if let Some(budget) = input.budget {
        errors.non_negative("budget", budget);
        errors.money("budget", budget);
    }
    errors.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn input() -> ProjectInput {
        ProjectInput {
            name: "Georreferenciamento".to_string(),
            client_id: None,
            description: None,
            status: None,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30),
            budget: Some(Decimal::from(15000)),
        }
    }

    #[test]
    fn defaults_to_planned() {
        assert_eq!(status_of(&input()), "planejado");
        assert!(validate(&input()).is_ok());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let bad = ProjectInput {
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..input()
        };
        match validate(&bad) {
            Err(ServiceError::Validation { field_errors, .. }) => assert!(field_errors.contains_key("end_date")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn same_day_project_is_fine() {
        let one_day = ProjectInput {
            end_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..input()
        };
        assert!(validate(&one_day).is_ok());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let bad = normalize(ProjectInput {
            status: Some("arquivado".to_string()),
            ..input()
        });
        assert!(validate(&bad).is_err());
    }
}
