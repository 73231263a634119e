//! Per-request context carried through every provider call.

use ratebridge_common::CorrelationId;
use tokio_util::sync::CancellationToken;

/// Correlation ID and cancellation signal for one logical operation.
///
/// Cloning is cheap; clones share the same cancellation token.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Fresh context with a new correlation ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for an existing correlation ID.
    pub fn with_correlation_id(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Signal cancellation to every holder of this context.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_cancellation() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        assert_eq!(ctx.correlation_id(), clone.correlation_id());

        clone.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_with_cancellation_uses_parent_token() {
        let parent = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(parent.child_token());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }
}
