//! Trading decision and position-lifecycle engine
//!
//! ```text
//! Ingestor (news) → Pipeline (sentiment + entry rules + sizing) → trades table
//!                                                                     ↓
//!                          Overrides (operator) ←──────────── Exit engine (TSL / market close)
//! ```

pub mod audit;
pub mod capital;
pub mod exits;
pub mod pipeline;
pub mod rules;
pub mod session;
pub mod sizer;

pub use audit::Overrides;
pub use capital::per_trade_budget;
pub use exits::ExitEngine;
pub use pipeline::DecisionPipeline;
pub use rules::{EntryRules, SkipReason};
pub use session::SessionClock;
pub use sizer::{size_position, PositionSize};
