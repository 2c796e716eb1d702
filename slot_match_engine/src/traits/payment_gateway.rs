use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sme_common::Krw;
use thiserror::Error;

/// The contract the engine expects from the payment provider that collected introduction fees.
///
/// Only cancellation is needed here; charging and confirmation belong to the checkout flow.
/// A cancel must be safe to issue more than once for the same payment reference — the engine
/// additionally pre-checks persisted state before calling, but the provider is the last line of
/// defence against a double refund.
///
/// Futures are required to be `Send` so the sweep workers can drive compensation from spawned
/// tasks.
pub trait PaymentGateway: Clone + Send + Sync {
    /// Cancels (refunds) the payment identified by `payment_ref`. `amount` limits the refund to a
    /// partial amount; `None` cancels the full charge.
    fn cancel(
        &self,
        payment_ref: &str,
        reason: &str,
        amount: Option<Krw>,
    ) -> impl Future<Output = Result<CancelReceipt, GatewayError>> + Send;
}

/// The provider's record of a completed cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReceipt {
    /// The provider-side identifier of the cancellation, stored as the request's `refund_ref`.
    pub refund_ref: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The gateway rejected the cancellation ({code}). {message}")]
    CancelRejected { code: String, message: String },
    #[error("The gateway could not be reached. {0}")]
    Unavailable(String),
    #[error("No payment gateway has been configured")]
    NotConfigured,
}

/// A gateway for deployments where no provider credentials are wired up yet. Every cancel fails
/// with [`GatewayError::NotConfigured`], which leaves requests truthfully unrefunded and queued
/// for manual reconciliation rather than falsely marked as refunded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGateway;

impl PaymentGateway for NullGateway {
    async fn cancel(
        &self,
        _payment_ref: &str,
        _reason: &str,
        _amount: Option<Krw>,
    ) -> Result<CancelReceipt, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
