//! Notification dispatch - Informing users and staff about order state changes.
//!
//! Delivery is pluggable through the [`Notifier`] trait. A failed delivery never undoes the
//! state change that triggered it; the failure is logged and handed back to the caller next
//! to the successful outcome.

use crate::core::bundle::Bundle;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

/// Which message a notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Sent to the customer after submitting
    OrderSubmitted,
    /// Sent to the pool's staff after a submit
    OrderReceived,
    /// Sent to the customer with the manager's comment
    OrderApproved,
    /// Sent to the customer with the reason
    OrderRejected,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OrderSubmitted => "order submitted",
            Self::OrderReceived => "order received",
            Self::OrderApproved => "order approved",
            Self::OrderRejected => "order rejected",
        })
    }
}

/// A notification could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} notification for bundle {bundle} failed: {message}")]
pub struct NotificationError {
    /// Message that failed
    pub kind: NotificationKind,
    /// Rendered bundle key
    pub bundle: String,
    /// Transport error
    pub message: String,
}

impl NotificationError {
    /// Failure of `kind` for `bundle`.
    #[must_use]
    pub fn new(kind: NotificationKind, bundle: &Bundle, message: impl Into<String>) -> Self {
        Self {
            kind,
            bundle: bundle.key.to_string(),
            message: message.into(),
        }
    }
}

/// Receives order lifecycle events once they are committed.
pub trait Notifier: Send + Sync {
    /// The customer's order was submitted
    fn order_submitted(
        &self,
        bundle: &Bundle,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;

    /// Staff of the pool received a new order
    fn order_received(
        &self,
        bundle: &Bundle,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;

    /// Staff approved the order
    fn order_approved(
        &self,
        bundle: &Bundle,
        comment: &str,
        acting_user_id: i64,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;

    /// Staff rejected the order
    fn order_rejected(
        &self,
        bundle: &Bundle,
        comment: &str,
        acting_user_id: i64,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;
}

/// Notifier that only writes structured log events.
///
/// Useful for development and for deployments without a mail transport.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Creates a notifier that only logs.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    async fn order_submitted(&self, bundle: &Bundle) -> Result<(), NotificationError> {
        info!(
            bundle = %bundle.key,
            to_user = bundle.target_user_id(),
            lines = bundle.lines.len(),
            quantity = bundle.total_quantity(),
            "Order submitted"
        );
        Ok(())
    }

    async fn order_received(&self, bundle: &Bundle) -> Result<(), NotificationError> {
        info!(
            bundle = %bundle.key,
            inventory_pool_id = bundle.inventory_pool_id,
            to_be_verified = bundle.is_to_be_verified(),
            purpose = %bundle.purpose_descriptions(),
            "Order received"
        );
        Ok(())
    }

    async fn order_approved(
        &self,
        bundle: &Bundle,
        comment: &str,
        acting_user_id: i64,
    ) -> Result<(), NotificationError> {
        info!(
            bundle = %bundle.key,
            to_user = bundle.target_user_id(),
            by_user = acting_user_id,
            comment,
            "Order approved"
        );
        Ok(())
    }

    async fn order_rejected(
        &self,
        bundle: &Bundle,
        comment: &str,
        acting_user_id: i64,
    ) -> Result<(), NotificationError> {
        info!(
            bundle = %bundle.key,
            to_user = bundle.target_user_id(),
            by_user = acting_user_id,
            comment,
            "Order rejected"
        );
        Ok(())
    }
}

/// Logs a failed delivery and keeps it for the caller.
pub(crate) fn record_failure(
    result: Result<(), NotificationError>,
    failures: &mut Vec<NotificationError>,
) {
    if let Err(e) = result {
        warn!(
            kind = %e.kind,
            bundle = %e.bundle,
            "Notification failed, the recipient must be contacted another way: {}",
            e.message
        );
        failures.push(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bundle::Bundle;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let bundle = Bundle::empty(1, 2);
        let notifier = LogNotifier::new();

        assert!(notifier.order_submitted(&bundle).await.is_ok());
        assert!(notifier.order_received(&bundle).await.is_ok());
        assert!(notifier.order_approved(&bundle, "ok", 3).await.is_ok());
        assert!(notifier.order_rejected(&bundle, "no", 3).await.is_ok());
    }

    #[test]
    fn test_record_failure_collects_errors() {
        let bundle = Bundle::empty(1, 2);
        let mut failures = Vec::new();

        record_failure(Ok(()), &mut failures);
        record_failure(
            Err(NotificationError::new(
                NotificationKind::OrderApproved,
                &bundle,
                "smtp down",
            )),
            &mut failures,
        );

        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].to_string(),
            "order approved notification for bundle unsubmitted_1_2 failed: smtp down"
        );
    }
}
