use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque key identifying the scope a handler set is evaluated for
/// (a menu, a screen, a site section).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextKey(String);

impl ContextKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Renderable payload a handler provides for one subject in one context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayData {
    pub title: String,
    pub icon: Option<String>,
    pub class: Option<String>,
    /// Handler-specific extras (badge counts, deep links, ...).
    #[serde(default)]
    pub extra: Value,
}

/// One entry of the emitted handler list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDisplay {
    pub name: String,
    pub priority: i32,
    pub data: DisplayData,
}

/// Evaluation state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    /// No pass has run yet (or the context was invalidated while nobody
    /// was subscribed; the next subscription triggers a pass).
    Uninitialized,
    /// A pass is in flight.
    Evaluating,
    /// The cached list reflects the latest pass.
    Ready,
}
