use async_trait::async_trait;

use super::traits::{Handler, HandlerError};
use super::types::{ContextKey, DisplayData};

/// Handler with fixed enablement and display data.
///
/// Useful for menu entries that are always (or conditionally, via feature
/// flags) present and need no per-subject lookup.
#[derive(Debug, Clone)]
pub struct StaticHandler {
    name: String,
    priority: i32,
    enabled: bool,
    display: DisplayData,
}

impl StaticHandler {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        let name = name.into();
        Self {
            display: DisplayData {
                title: name.clone(),
                ..DisplayData::default()
            },
            name,
            priority,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn display(mut self, display: DisplayData) -> Self {
        self.display = display;
        self
    }
}

#[async_trait]
impl<S: Send + Sync> Handler<S> for StaticHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn is_enabled(&self, _ctx: &ContextKey) -> Result<bool, HandlerError> {
        Ok(self.enabled)
    }

    async fn display_data(
        &self,
        _subject: &S,
        _ctx: &ContextKey,
    ) -> Result<DisplayData, HandlerError> {
        Ok(self.display.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_handler_reports_fixed_state() {
        let handler = StaticHandler::new("settings", 100).enabled(false);
        let ctx = ContextKey::new("menu");

        assert_eq!(Handler::<()>::name(&handler), "settings");
        assert_eq!(Handler::<()>::priority(&handler), 100);
        assert!(!Handler::<()>::is_enabled(&handler, &ctx).await.unwrap());
    }

    #[tokio::test]
    async fn static_handler_defaults_title_to_name() {
        let handler = StaticHandler::new("grades", 0);
        let ctx = ContextKey::new("menu");

        let data = Handler::<()>::display_data(&handler, &(), &ctx).await.unwrap();
        assert_eq!(data.title, "grades");
    }
}
