//! Interface contracts of the matching engine.
//!
//! The engine itself is backend-agnostic. A storage backend implements [`MatchEngineDatabase`]
//! (the write path, including every conditional status transition) and [`MarketQuery`] (read-only
//! projections for the API layer). The payment provider used for fee refunds implements
//! [`PaymentGateway`].
//!
//! The conditional transitions are the heart of the concurrency story: every resolution step is an
//! `UPDATE ... WHERE id = ? AND status = ?` executed inside a single backend transaction, so a
//! racing resolution attempt observes `None` and walks away without side effects.
mod data_objects;
mod market_query;
mod match_engine_database;
mod payment_gateway;

pub use data_objects::{PurgeTotals, SlotAward, SlotClosure};
pub use market_query::{MarketQuery, SlotQueryFilter};
pub use match_engine_database::{MatchEngineDatabase, MatchEngineError};
pub use payment_gateway::{CancelReceipt, GatewayError, NullGateway, PaymentGateway};
