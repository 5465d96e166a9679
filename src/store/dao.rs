// モジュールの公開と型の再エクスポート
mod dao_impl;
mod dao_trait;

pub use dao_impl::PgRelevanceStore;
pub use dao_trait::RelevanceStore;
