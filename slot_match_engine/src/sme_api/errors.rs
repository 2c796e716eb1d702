use thiserror::Error;

use crate::{db_types::RequestStatus, traits::MatchEngineError};

#[derive(Debug, Clone, Error)]
pub enum MatchFlowError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] MatchEngineError),
    #[error(transparent)]
    CompensationError(#[from] CompensationError),
    #[error("Match request {id} is {status} and cannot take this action")]
    RequestNotActionable { id: i64, status: RequestStatus },
}

/// Failures of the refund path. A gateway failure is terminal for the automatic system: the
/// request keeps its truthful status, the failure is recorded against it, and an operator retries
/// through the reconciliation queue.
#[derive(Debug, Clone, Error)]
pub enum CompensationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested match request {0} does not exist")]
    RequestNotFound(i64),
    #[error("Match request {id} is {status}, which is not a refundable status")]
    NotRefundable { id: i64, status: RequestStatus },
    #[error("Match request {0} carries no confirmed fee payment, so there is nothing to refund")]
    NoPaymentToRefund(i64),
    #[error("The gateway refused to cancel payment [{payment_ref}] for match request {id}. {error}")]
    GatewayCancelFailed { id: i64, payment_ref: String, error: String },
}

impl From<MatchEngineError> for CompensationError {
    fn from(e: MatchEngineError) -> Self {
        CompensationError::DatabaseError(e.to_string())
    }
}
