use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{batch_delete, db, delete_by_id, import_rows, normalize_uf, search_pattern, FieldErrors, Importable, ServiceError, ServiceResult};
use crate::database::models::{clean, Acompanhamento, AcompanhamentoInput, AcompanhamentoView, CertificationStatus};
use crate::database::{DatabaseManager, Page, PageParams};
use crate::spreadsheet::{ImportReport, SheetRow};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcompanhamentoFilter {
    pub search: Option<String>,
    pub status: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
    pub client_id: Option<Uuid>,
}

impl AcompanhamentoFilter {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(pattern) = search_pattern(self.search.as_deref()) {
            qb.push(" AND (property_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR owner_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR car_code ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = clean(&self.status) {
            qb.push(" AND certification_status = ").push_bind(status);
        }
        if let Some(state) = normalize_uf(self.state.clone()) {
            qb.push(" AND state = ").push_bind(state);
        }
        if let Some(municipality) = clean(&self.municipality) {
            qb.push(" AND lower(municipality) = lower(").push_bind(municipality).push(")");
        }
        if let Some(client_id) = self.client_id {
            qb.push(" AND client_id = ").push_bind(client_id);
        }
    }
}

pub struct AcompanhamentoService {
    pool: PgPool,
}

impl AcompanhamentoService {
    pub fn new() -> ServiceResult<Self> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub async fn list(&self, filter: &AcompanhamentoFilter, page: &PageParams) -> ServiceResult<Page<AcompanhamentoView>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM acompanhamentos WHERE TRUE");
        filter.push_conditions(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .map_err(db("Erro ao contar acompanhamentos"))?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM acompanhamentos WHERE TRUE");
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY property_name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = query
            .build_query_as::<Acompanhamento>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao listar acompanhamentos"))?;

        Ok(Page::new(items, total, page).map(AcompanhamentoView::from))
    }

    pub async fn export(&self, filter: &AcompanhamentoFilter) -> ServiceResult<Vec<Acompanhamento>> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM acompanhamentos WHERE TRUE");
        filter.push_conditions(&mut query);
        query.push(" ORDER BY property_name");
        query
            .build_query_as::<Acompanhamento>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db("Erro ao exportar acompanhamentos"))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<AcompanhamentoView> {
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        sqlx::query_as::<_, Acompanhamento>("SELECT * FROM acompanhamentos WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db("Erro ao buscar acompanhamento"))?
            .map(AcompanhamentoView::from)
            .ok_or_else(|| ServiceError::NotFound("Acompanhamento não encontrado".to_string()))
    }

    pub async fn create(&self, input: AcompanhamentoInput) -> ServiceResult<AcompanhamentoView> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;
        insert(&mut conn, &input).await.map(AcompanhamentoView::from)
    }

    pub async fn update(&self, id: Uuid, input: AcompanhamentoInput) -> ServiceResult<AcompanhamentoView> {
        let input = normalize(input);
        validate(&input)?;
        let mut conn = DatabaseManager::acquire(&self.pool).await?;

        sqlx::query_as::<_, Acompanhamento>(
            r#"
            UPDATE acompanhamentos
            SET property_name = $2, owner_name = $3, client_id = $4, municipality = $5, state = $6,
                car_code = $7, total_area_ha = $8, native_vegetation_ha = $9, legal_reserve_ha = $10,
                app_ha = $11, consolidated_area_ha = $12, certification_status = $13,
                certification_expires_at = $14, notes = $15, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.property_name)
        .bind(&input.owner_name)
        .bind(input.client_id)
        .bind(&input.municipality)
        .bind(&input.state)
        .bind(&input.car_code)
        .bind(input.total_area_ha)
        .bind(input.native_vegetation_ha)
        .bind(input.legal_reserve_ha)
        .bind(input.app_ha)
        .bind(input.consolidated_area_ha)
        .bind(status_of(&input))
        .bind(input.certification_expires_at)
        .bind(&input.notes)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db("Erro ao atualizar acompanhamento"))?
        .map(AcompanhamentoView::from)
        .ok_or_else(|| ServiceError::NotFound("Acompanhamento não encontrado".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        delete_by_id(&self.pool, "acompanhamentos", id, "Acompanhamento não encontrado").await
    }

    pub async fn batch_delete(&self, ids: &[Uuid]) -> ServiceResult<u64> {
        batch_delete(&self.pool, "acompanhamentos", ids).await
    }

    pub async fn import(&self, rows: &[SheetRow]) -> ServiceResult<ImportReport> {
        import_rows(&self.pool, rows, "acompanhamento", |row| {
            AcompanhamentoInput::from_sheet_row(row).map(normalize)
        })
        .await
    }
}

fn status_of(input: &AcompanhamentoInput) -> &str {
    input
        .certification_status
        .as_deref()
        .unwrap_or(CertificationStatus::Pendente.as_str())
}

fn normalize(input: AcompanhamentoInput) -> AcompanhamentoInput {
    AcompanhamentoInput {
        property_name: input.property_name.trim().to_string(),
        owner_name: clean(&input.owner_name),
        municipality: clean(&input.municipality),
        state: normalize_uf(input.state.clone()),
        car_code: clean(&input.car_code).map(|c| c.to_uppercase()),
        certification_status: clean(&input.certification_status),
        notes: clean(&input.notes),
        ..input
    }
}

fn validate(input: &AcompanhamentoInput) -> ServiceResult<()> {
    let mut errors = FieldErrors::new();
    errors.required("property_name", &input.property_name);
    errors.uf("state", input.state.as_deref());
    errors.parses::<CertificationStatus>("certification_status", input.certification_status.as_deref());

    let parts = [
        ("native_vegetation_ha", input.native_vegetation_ha),
        ("legal_reserve_ha", input.legal_reserve_ha),
        ("app_ha", input.app_ha),
        ("consolidated_area_ha", input.consolidated_area_ha),
    ];
    errors.non_negative("total_area_ha", input.total_area_ha);
    errors.area("total_area_ha", input.total_area_ha);
    for (field, value) in parts {
        errors.non_negative(field, value);
        errors.area(field, value);
    }

    match parts.iter().try_fold(Decimal::ZERO, |acc, (_, v)| acc.checked_add(*v)) {
        Some(used) => errors.check(
            used <= input.total_area_ha,
            "total_area_ha",
            "A soma das áreas de uso excede a área total",
        ),
        None => errors.add("total_area_ha", "A soma das áreas de uso excede o limite permitido"),
    }
    errors.finish()
}

async fn insert(conn: &mut PgConnection, input: &AcompanhamentoInput) -> ServiceResult<Acompanhamento> {
    sqlx::query_as::<_, Acompanhamento>(
        r#"
        INSERT INTO acompanhamentos
            (property_name, owner_name, client_id, municipality, state, car_code, total_area_ha,
             native_vegetation_ha, legal_reserve_ha, app_ha, consolidated_area_ha,
             certification_status, certification_expires_at, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(&input.property_name)
    .bind(&input.owner_name)
    .bind(input.client_id)
    .bind(&input.municipality)
    .bind(&input.state)
    .bind(&input.car_code)
    .bind(input.total_area_ha)
    .bind(input.native_vegetation_ha)
    .bind(input.legal_reserve_ha)
    .bind(input.app_ha)
    .bind(input.consolidated_area_ha)
    .bind(status_of(input))
    .bind(input.certification_expires_at)
    .bind(&input.notes)
    .fetch_one(conn)
    .await
    .map_err(db("Erro ao criar acompanhamento"))
}

#[async_trait]
impl Importable for AcompanhamentoInput {
    async fn insert(&self, conn: &mut PgConnection) -> ServiceResult<()> {
        validate(self)?;
        insert(conn, self).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn input(total: &str, native: &str, reserve: &str, app: &str, consolidated: &str) -> AcompanhamentoInput {
        AcompanhamentoInput {
            property_name: "Fazenda Santa Luzia".to_string(),
            owner_name: None,
            client_id: None,
            municipality: Some("Uberaba".to_string()),
            state: Some("mg".to_string()),
            car_code: None,
            total_area_ha: d(total),
            native_vegetation_ha: d(native),
            legal_reserve_ha: d(reserve),
            app_ha: d(app),
            consolidated_area_ha: d(consolidated),
            certification_status: None,
            certification_expires_at: None,
            notes: None,
        }
    }

    #[test]
    fn land_use_may_fill_the_whole_area() {
        assert!(validate(&normalize(input("100", "20", "20", "10", "50"))).is_ok());
    }

    #[test]
    fn land_use_cannot_exceed_total() {
        match validate(&normalize(input("100", "30", "20", "10", "50.5"))) {
            Err(ServiceError::Validation { field_errors, .. }) => assert!(field_errors.contains_key("total_area_ha")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn negative_areas_are_rejected() {
        match validate(&normalize(input("100", "-1", "0", "0", "0"))) {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("native_vegetation_ha"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn huge_areas_are_rejected_without_overflow() {
        let mut huge = input("100", "0", "0", "0", "0");
        huge.native_vegetation_ha = Decimal::MAX;
        huge.legal_reserve_ha = Decimal::MAX;
        match validate(&normalize(huge)) {
            Err(ServiceError::Validation { field_errors, .. }) => {
                assert!(field_errors.contains_key("native_vegetation_ha"));
                assert!(field_errors.contains_key("legal_reserve_ha"));
                assert!(field_errors.contains_key("total_area_ha"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn areas_must_fit_the_column() {
        assert!(validate(&normalize(input("9999999999.9999", "0", "0", "0", "0"))).is_ok());
        assert!(validate(&normalize(input("10000000000", "0", "0", "0", "0"))).is_err());
    }

    #[test]
    fn municipality_filter_is_exact_ignoring_case() {
        let filter = AcompanhamentoFilter {
            search: Some("luzia".to_string()),
            municipality: Some(" Uberaba ".to_string()),
            ..AcompanhamentoFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM acompanhamentos WHERE TRUE");
        filter.push_conditions(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("lower(municipality) = lower($4)"));
        assert!(!sql.contains("municipality ILIKE"));
    }

    #[test]
    fn state_is_uppercased_and_status_defaults() {
        let normalized = normalize(input("10", "0", "0", "0", "0"));
        assert_eq!(normalized.state.as_deref(), Some("MG"));
        assert_eq!(status_of(&normalized), "pendente");
    }
}
