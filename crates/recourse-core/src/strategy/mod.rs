//! Recovery strategy table.
//!
//! Each error category maps to its own retry and fallback economics.
//! The table is seeded with tuned defaults and can be overridden from
//! YAML/JSON documents validated against an embedded JSON Schema.

mod schema;
mod table;

pub use schema::validate_strategy_schema;
pub use table::{RecoveryStrategy, StrategyError, StrategyOverride, StrategyTable};
