pub mod acompanhamento;
pub mod budget;
pub mod client;
pub mod offering;
pub mod product;
pub mod project;
pub mod share_link;
pub mod transaction;
pub mod user;

pub use acompanhamento::{Acompanhamento, AcompanhamentoInput, AcompanhamentoView, CertificationStatus, LandUse};
pub use budget::{BudgetItem, BudgetItemInput, BudgetItemRow, ProjectionRow};
pub use client::{Client, ClientInput};
pub use offering::{Offering, OfferingInput};
pub use product::{Product, ProductInput};
pub use project::{Project, ProjectInput, ProjectStatus};
pub use share_link::{ShareLink, ShareLinkInput, ShareLinkView};
pub use transaction::{Transaction, TransactionInput, TransactionKind, TransactionStatus};
pub use user::{User, UserView};

/// Trims and drops empty strings from optional text fields
pub fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn default_true() -> bool {
    true
}
