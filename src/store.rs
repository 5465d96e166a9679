pub mod dao;
pub mod models;

pub use dao::{PgRelevanceStore, RelevanceStore};
pub use models::{ELIGIBILITY_WINDOW_SECS, GroupId, GroupMetrics, RelevanceScore};
