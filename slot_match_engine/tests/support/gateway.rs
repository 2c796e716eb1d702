//! A scriptable payment gateway for driving the refund path in tests.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
    Mutex,
};

use chrono::Utc;
use slot_match_engine::traits::{CancelReceipt, GatewayError, PaymentGateway};
use sme_common::Krw;

#[derive(Debug, Clone)]
pub struct CancelCall {
    pub payment_ref: String,
    pub reason: String,
    pub amount: Option<Krw>,
}

/// Records every cancel call it receives and succeeds unless told otherwise. Receipts are
/// numbered (`cancel-1`, `cancel-2`, ...) so tests can assert on which call produced a refund.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    calls: Arc<Mutex<Vec<CancelCall>>>,
    counter: Arc<AtomicU64>,
    failing: Arc<Mutex<Option<String>>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// All cancels fail with the given message until [`Self::heal`] is called.
    pub fn fail_with<S: Into<String>>(&self, message: S) {
        *self.failing.lock().unwrap() = Some(message.into());
    }

    pub fn heal(&self) {
        *self.failing.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<CancelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PaymentGateway for RecordingGateway {
    async fn cancel(&self, payment_ref: &str, reason: &str, amount: Option<Krw>) -> Result<CancelReceipt, GatewayError> {
        self.calls.lock().unwrap().push(CancelCall {
            payment_ref: payment_ref.to_string(),
            reason: reason.to_string(),
            amount,
        });
        if let Some(message) = self.failing.lock().unwrap().clone() {
            return Err(GatewayError::Unavailable(message));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CancelReceipt { refund_ref: format!("cancel-{n}"), cancelled_at: Utc::now() })
    }
}
