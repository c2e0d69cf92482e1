pub mod datasets;
pub mod eval;
pub mod models;
