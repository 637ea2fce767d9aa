//! Closed-loop throttling of the limiter from monitor alerts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::process_supervisor::{ProcessSupervisor, SupervisorError};
use crate::domain::models::{Classification, FeedbackConfig, ThrottleDirective, WorkerId};

/// Destination for throttle directives.
///
/// Directives skip the operator command validator: they are built internally
/// and never contain operator text.
#[async_trait]
pub trait DirectiveSink: Send + Sync {
    async fn send_directive(&self, directive: &ThrottleDirective) -> Result<(), SupervisorError>;
}

#[async_trait]
impl DirectiveSink for ProcessSupervisor {
    async fn send_directive(&self, directive: &ThrottleDirective) -> Result<(), SupervisorError> {
        self.deliver(WorkerId::Gatekeeper, &directive.to_command()).await
    }
}

/// Turns classified monitor lines into throttle directives for the limiter.
///
/// Stateless: every qualifying line produces its directive again, with no
/// debounce and no hysteresis.
pub struct FeedbackController {
    sink: Arc<dyn DirectiveSink>,
    config: FeedbackConfig,
}

impl FeedbackController {
    pub fn new(sink: Arc<dyn DirectiveSink>, config: FeedbackConfig) -> Self {
        Self { sink, config }
    }

    /// Directives implied by one classification, in send order.
    ///
    /// A line that is both under pressure and a recovery sentinel throttles
    /// first and restores second, so the limiter ends at the restored rate.
    pub fn directives_for(&self, classification: &Classification) -> Vec<ThrottleDirective> {
        if !self.config.enabled {
            return Vec::new();
        }

        let mut directives = Vec::with_capacity(2);
        if classification.resource_pressure {
            directives.push(self.directive(self.config.throttle_multiplier));
        }
        if classification.recovery {
            directives.push(self.directive(self.config.restore_multiplier));
        }
        directives
    }

    /// Send every directive for `classification`.
    ///
    /// Send failures are logged and dropped; returns how many were delivered.
    pub async fn apply(&self, classification: &Classification) -> usize {
        let mut delivered = 0;
        for directive in self.directives_for(classification) {
            match self.sink.send_directive(&directive).await {
                Ok(()) => {
                    info!(directive = %directive, "Throttle directive sent");
                    delivered += 1;
                }
                Err(e) => warn!(directive = %directive, error = %e, "Failed to send throttle directive"),
            }
        }
        delivered
    }

    fn directive(&self, multiplier: f64) -> ThrottleDirective {
        // Config validation keeps multipliers in range; fall back to full rate otherwise.
        ThrottleDirective::new(multiplier).unwrap_or_else(|_| ThrottleDirective::restore())
    }
}
