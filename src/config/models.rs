use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Feature flag configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeaturesConfig {
    /// Comma-separated disabled-feature entries. An entry has the form
    /// `<Delegate>_<Handler>` or `<Delegate>_<Handler>:<context>`.
    #[serde(default)]
    pub disabled: String,
}

impl FeaturesConfig {
    /// Parsed entries, empty segments skipped.
    pub fn entries(&self) -> Vec<String> {
        self.disabled
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    64
}
