pub mod manager;
pub mod models;
pub mod page;

pub use manager::{DatabaseError, DatabaseManager};
pub use page::{Page, PageParams};
