/// The delivery capability the dispatcher hands rendered notifications to.
use thiserror::Error;

use crate::notification::NotificationContext;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no webhook URL configured")]
    NotConfigured,
    #[error("webhook responded with HTTP {0}")]
    Status(u16),
    #[error("webhook request failed: {0}")]
    Transport(String),
}

/// Transports a rendered notification somewhere.
///
/// Implementations report failure but must not retry; the dispatcher logs the
/// error and moves on.
pub trait DeliverySink {
    async fn deliver(&self, notification: &NotificationContext) -> Result<(), DeliveryError>;
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory sink that records every delivery attempt.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        delivered: Arc<Mutex<Vec<NotificationContext>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every later delivery fail with `DeliveryError::Status(500)`.
        /// Failed attempts are still recorded.
        pub fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub fn delivered(&self) -> Vec<NotificationContext> {
            self.delivered.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }
    }

    impl DeliverySink for RecordingSink {
        async fn deliver(&self, notification: &NotificationContext) -> Result<(), DeliveryError> {
            self.delivered.lock().unwrap().push(notification.clone());
            if *self.fail.lock().unwrap() {
                return Err(DeliveryError::Status(500));
            }
            Ok(())
        }
    }
}
