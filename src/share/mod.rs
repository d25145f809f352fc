//! Share-link access policy.
//!
//! A share link grants anonymous read access to a filtered subset of
//! acompanhamentos. The checks here decide whether a presented token/password pair
//! may see anything and which fields survive the projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::password;

/// Field names an acompanhamento exposes, used to validate `visible_fields`
pub const SHAREABLE_FIELDS: &[&str] = &[
    "id",
    "property_name",
    "owner_name",
    "municipality",
    "state",
    "car_code",
    "total_area_ha",
    "native_vegetation_ha",
    "legal_reserve_ha",
    "app_ha",
    "consolidated_area_ha",
    "certification_status",
    "certification_expires_at",
    "land_use",
    "notes",
    "updated_at",
];

/// Unpadded base64 length of `bytes` random bytes
pub const fn encoded_len(bytes: usize) -> usize {
    (bytes * 4 + 2) / 3
}

/// The stored part of a link that the access check needs
#[derive(Debug, Clone)]
pub struct ShareGate<'a> {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub password_hash: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareDenied {
    Revoked,
    Expired,
    PasswordRequired,
    PasswordInvalid,
}

impl ShareGate<'_> {
    /// Decide access at `now` for an optional presented password.
    pub fn check(&self, now: DateTime<Utc>, presented: Option<&str>) -> Result<(), ShareDenied> {
        if !self.active {
            return Err(ShareDenied::Revoked);
        }
        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return Err(ShareDenied::Expired);
            }
        }
        if let Some(hash) = self.password_hash {
            let presented = presented.filter(|p| !p.is_empty()).ok_or(ShareDenied::PasswordRequired)?;
            if !password::verify_password(presented, hash) {
                return Err(ShareDenied::PasswordInvalid);
            }
        }
        Ok(())
    }
}

/// Cheap shape check so obviously bogus tokens never reach the database
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == encoded_len(crate::config::config().security.share_token_bytes)
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Which acompanhamentos a link exposes. All present criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSelection {
    pub record_ids: Option<Vec<Uuid>>,
    pub status: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
}

impl ShareSelection {
    /// Appends `AND ...` conditions to a query that already has a `WHERE` clause.
    pub fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(ids) = &self.record_ids {
            qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(status) = &self.status {
            qb.push(" AND certification_status = ").push_bind(status.clone());
        }
        if let Some(state) = &self.state {
            qb.push(" AND state = ").push_bind(state.to_uppercase());
        }
        if let Some(municipality) = &self.municipality {
            qb.push(" AND lower(municipality) = lower(")
                .push_bind(municipality.clone())
                .push(")");
        }
    }
}

/// Keeps only `fields` (plus `id`) on each JSON object. `None` keeps everything.
pub fn project_fields(records: Vec<Value>, fields: Option<&[String]>) -> Vec<Value> {
    let Some(fields) = fields else {
        return records;
    };

    records
        .into_iter()
        .map(|record| match record {
            Value::Object(map) => {
                let kept: Map<String, Value> = map
                    .into_iter()
                    .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
                    .collect();
                Value::Object(kept)
            }
            other => other,
        })
        .collect()
}

/// Returns the first requested field that is not shareable.
pub fn unknown_field(fields: &[String]) -> Option<&str> {
    fields
        .iter()
        .map(String::as_str)
        .find(|f| !SHAREABLE_FIELDS.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn hash(pw: &str) -> String {
        password::hash_password_with_cost(pw, 4).unwrap()
    }

    #[test]
    fn open_link_passes() {
        let gate = ShareGate { active: true, expires_at: None, password_hash: None };
        assert_eq!(gate.check(Utc::now(), None), Ok(()));
    }

    #[test]
    fn revoked_wins_over_everything() {
        let gate = ShareGate {
            active: false,
            expires_at: Some(Utc::now() - Duration::days(1)),
            password_hash: None,
        };
        assert_eq!(gate.check(Utc::now(), None), Err(ShareDenied::Revoked));
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let gate = ShareGate { active: true, expires_at: Some(now), password_hash: None };
        assert_eq!(gate.check(now, None), Err(ShareDenied::Expired));
        assert_eq!(gate.check(now - Duration::seconds(1), None), Ok(()));
    }

    #[test]
    fn password_required_then_checked() {
        let stored = hash("segredo123");
        let gate = ShareGate { active: true, expires_at: None, password_hash: Some(&stored) };

        assert_eq!(gate.check(Utc::now(), None), Err(ShareDenied::PasswordRequired));
        assert_eq!(gate.check(Utc::now(), Some("")), Err(ShareDenied::PasswordRequired));
        assert_eq!(gate.check(Utc::now(), Some("errada")), Err(ShareDenied::PasswordInvalid));
        assert_eq!(gate.check(Utc::now(), Some("segredo123")), Ok(()));
    }

    #[test]
    fn expired_is_reported_before_password() {
        let stored = hash("segredo123");
        let gate = ShareGate {
            active: true,
            expires_at: Some(Utc::now() - Duration::minutes(5)),
            password_hash: Some(&stored),
        };
        assert_eq!(gate.check(Utc::now(), Some("segredo123")), Err(ShareDenied::Expired));
    }

    #[test]
    fn token_shape() {
        assert_eq!(encoded_len(32), 43);
        assert!(is_well_formed_token(&"a".repeat(43)));
        assert!(is_well_formed_token("abcDEF0123456789-_abcDEF0123456789-_abcdefg"));
        assert!(!is_well_formed_token("short"));
        assert!(!is_well_formed_token(&format!("{}=", "a".repeat(42))));
    }

    #[test]
    fn projection_keeps_id() {
        let records = vec![json!({
            "id": "5f0c",
            "property_name": "Fazenda Boa Vista",
            "owner_name": "Maria",
            "notes": "interno"
        })];
        let fields = vec!["property_name".to_string()];
        let out = project_fields(records.clone(), Some(&fields));
        assert_eq!(out[0], json!({"id": "5f0c", "property_name": "Fazenda Boa Vista"}));

        let untouched = project_fields(records.clone(), None);
        assert_eq!(untouched, records);
    }

    #[test]
    fn unknown_fields_are_reported() {
        let fields = vec!["state".to_string(), "password_hash".to_string()];
        assert_eq!(unknown_field(&fields), Some("password_hash"));
        assert_eq!(unknown_field(&fields[..1]), None);
    }

    #[test]
    fn selection_builds_and_conditions() {
        let selection = ShareSelection {
            record_ids: Some(vec![Uuid::new_v4()]),
            status: Some("certificado".to_string()),
            state: Some("mg".to_string()),
            municipality: None,
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM acompanhamentos WHERE TRUE");
        selection.push_conditions(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("id = ANY($1)"));
        assert!(sql.contains("certification_status = $2"));
        assert!(sql.contains("state = $3"));
        assert!(!sql.contains("municipality"));
    }

    #[test]
    fn municipality_matches_whole_name_ignoring_case() {
        let selection = ShareSelection {
            municipality: Some("Uberaba".to_string()),
            ..ShareSelection::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM acompanhamentos WHERE TRUE");
        selection.push_conditions(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("lower(municipality) = lower($1)"));
        assert!(!sql.contains("ILIKE"));
    }
}
