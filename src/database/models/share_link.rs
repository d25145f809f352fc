use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::share::{ShareGate, ShareSelection};

#[derive(Debug, Clone, FromRow)]
pub struct ShareLink {
    pub id: Uuid,
    pub token: String,
    pub label: String,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub record_ids: Option<Vec<Uuid>>,
    pub filter_status: Option<String>,
    pub filter_state: Option<String>,
    pub filter_municipality: Option<String>,
    pub visible_fields: Option<Vec<String>>,
    pub active: bool,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn gate(&self) -> ShareGate<'_> {
        ShareGate {
            active: self.active,
            expires_at: self.expires_at,
            password_hash: self.password_hash.as_deref(),
        }
    }

    pub fn selection(&self) -> ShareSelection {
        ShareSelection {
            record_ids: self.record_ids.clone(),
            status: self.filter_status.clone(),
            state: self.filter_state.clone(),
            municipality: self.filter_municipality.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareFilterInput {
    pub status: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareLinkInput {
    pub label: String,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub record_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub filter: ShareFilterInput,
    pub visible_fields: Option<Vec<String>>,
}

/// Share link as shown to its owner; the password hash never leaves the server
#[derive(Debug, Clone, Serialize)]
pub struct ShareLinkView {
    pub id: Uuid,
    pub token: String,
    pub url: String,
    pub label: String,
    pub has_password: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub selection: ShareSelection,
    pub visible_fields: Option<Vec<String>>,
    pub active: bool,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ShareLinkView {
    pub fn new(link: ShareLink, public_url: &str) -> Self {
        let selection = link.selection();
        Self {
            url: format!("{}/share/{}", public_url.trim_end_matches('/'), link.token),
            has_password: link.password_hash.is_some(),
            id: link.id,
            token: link.token,
            label: link.label,
            expires_at: link.expires_at,
            selection,
            visible_fields: link.visible_fields,
            active: link.active,
            access_count: link.access_count,
            last_accessed_at: link.last_accessed_at,
            created_by: link.created_by,
            created_at: link.created_at,
        }
    }
}
