use async_trait::async_trait;
use thiserror::Error;

use super::types::{ContextKey, DisplayData};

/// Handler errors. These never reach subscribers: the registry absorbs them
/// and excludes the failing handler from the pass.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("enablement check failed: {0}")]
    Enablement(String),
    #[error("display data unavailable: {0}")]
    DisplayData(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A pluggable capability provider evaluated per context.
///
/// Implementations are registered once at bootstrap and live for the process
/// lifetime; they can be disabled per context but never unregistered. `S` is
/// the subject type the embedding application evaluates against (a user
/// record, a course, ...).
#[async_trait]
pub trait Handler<S>: Send + Sync {
    /// Unique handler identity. Registering a second handler with the same
    /// name replaces the first.
    fn name(&self) -> &str;

    /// Display order, ascending. Ties are broken by registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether the handler applies in the given context. May hit the network
    /// or local storage; an error counts as disabled for the current pass.
    async fn is_enabled(&self, ctx: &ContextKey) -> Result<bool, HandlerError>;

    /// Data the consumer needs to render this handler for `subject`. Only
    /// called when `is_enabled` resolved true. An error excludes the handler
    /// from the emitted list without affecting siblings.
    async fn display_data(
        &self,
        _subject: &S,
        _ctx: &ContextKey,
    ) -> Result<DisplayData, HandlerError> {
        Ok(DisplayData::default())
    }
}
