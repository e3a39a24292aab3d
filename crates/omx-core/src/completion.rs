//! Request completion taxonomy.
//!
//! Exactly one completion is delivered per admitted request back to its
//! originator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ClientKey, OrderSid};

/// How an order request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionType {
    /// Accepted by the exchange.
    Ok,
    /// Rejected by the exchange.
    Rejected,
    /// Rejected before leaving the gateway (admission or routing).
    RejectedInternally,
    /// Engine send failure.
    Failed,
    /// Deadline elapsed before the dispatcher could send.
    Timeout,
    /// Throttled and the request did not permit waiting.
    Throttled,
    /// Throttled, then the deadline elapsed while waiting.
    ThrottledThenTimeout,
    /// A cancel for the same order is already in flight.
    AlreadyInPendingCancel,
}

impl CompletionType {
    /// Completions other than `Ok`/`Rejected` terminate a request the
    /// exchange never saw, so admission reservations must be reversed.
    #[must_use]
    pub fn reverses_admission(&self) -> bool {
        !matches!(self, Self::Ok | Self::Rejected)
    }
}

impl fmt::Display for CompletionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Rejected => "REJECTED",
            Self::RejectedInternally => "REJECTED_INTERNALLY",
            Self::Failed => "FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Throttled => "THROTTLED",
            Self::ThrottledThenTimeout => "THROTTLED_THEN_TIMEOUT",
            Self::AlreadyInPendingCancel => "ALREADY_IN_PENDING_CANCEL",
        };
        write!(f, "{s}")
    }
}

/// Why a request (or order) was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectType {
    OrderExceedPurchasingPower,
    Crossed,
    InsufficientLongPosition,
    ExceedUnderlyingThrottle,
    UnknownOrder,
    DuplicateOrder,
    UnsupportedOperation,
    Other,
}

impl fmt::Display for RejectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OrderExceedPurchasingPower => "ORDER_EXCEED_PURCHASING_POWER",
            Self::Crossed => "CROSSED",
            Self::InsufficientLongPosition => "INSUFFICIENT_LONG_POSITION",
            Self::ExceedUnderlyingThrottle => "EXCEED_UNDERLYING_THROTTLE",
            Self::UnknownOrder => "UNKNOWN_ORDER",
            Self::DuplicateOrder => "DUPLICATE_ORDER",
            Self::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            Self::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// Completion record delivered exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequestCompletion {
    pub client_key: ClientKey,
    pub order_sid: OrderSid,
    pub completion_type: CompletionType,
    pub reject_type: Option<RejectType>,
    pub reason: String,
}

impl OrderRequestCompletion {
    #[must_use]
    pub fn ok(client_key: ClientKey, order_sid: OrderSid) -> Self {
        Self {
            client_key,
            order_sid,
            completion_type: CompletionType::Ok,
            reject_type: None,
            reason: String::new(),
        }
    }

    #[must_use]
    pub fn of(
        client_key: ClientKey,
        order_sid: OrderSid,
        completion_type: CompletionType,
        reject_type: Option<RejectType>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            client_key,
            order_sid,
            completion_type,
            reject_type,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverses_admission() {
        assert!(!CompletionType::Ok.reverses_admission());
        assert!(!CompletionType::Rejected.reverses_admission());
        assert!(CompletionType::Timeout.reverses_admission());
        assert!(CompletionType::Throttled.reverses_admission());
        assert!(CompletionType::Failed.reverses_admission());
    }

    #[test]
    fn test_completion_display() {
        assert_eq!(
            CompletionType::ThrottledThenTimeout.to_string(),
            "THROTTLED_THEN_TIMEOUT"
        );
        assert_eq!(
            RejectType::OrderExceedPurchasingPower.to_string(),
            "ORDER_EXCEED_PURCHASING_POWER"
        );
    }
}
