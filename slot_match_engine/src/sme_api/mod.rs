//! # Matching engine public API
//!
//! The `sme_api` module exposes the programmatic API for the slot matching engine.
//!
//! * [`match_flow_api`] is the primary API: it takes in bids and introduction requests, resolves
//!   slots on their deadlines or inline on auto-match, and drives the refund path for paid
//!   requests that come to nothing.
//! * [`market_api`] serves the read-only status projections consumed by the API layer and by
//!   operator tooling, including the refund reconciliation queue.
//!
//! The other submodules hold the support types: sweep summaries, compensation outcomes, the
//! retry policy and the error enums.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the traits it needs (see
//! [`crate::traits`]), plus, for the flow API, a payment gateway and the event producers that
//! notification senders subscribed through:
//!
//! ```rust,ignore
//! use slot_match_engine::{events::EventProducers, MatchFlowApi, NullGateway, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(url, 10).await?;
//! let api = MatchFlowApi::new(db, NullGateway, EventProducers::default());
//! let placement = api.place_bid(new_bid).await?;
//! ```

pub mod errors;
pub mod flow_objects;
pub mod market_api;
pub mod match_flow_api;
pub mod retry;
