use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid disabled-feature entry '{entry}': {reason}")]
    InvalidFeatureEntry { entry: String, reason: &'static str },

    #[error("Event channel capacity must be positive")]
    InvalidChannelCapacity,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_features(config)?;
    validate_events(config)?;
    Ok(())
}

/// Disabled entries must be `<Delegate>_<Handler>` with at most one
/// `:<context>` suffix and no embedded whitespace.
fn validate_features(config: &Config) -> Result<(), ValidationError> {
    for entry in config.features.entries() {
        if entry.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidFeatureEntry {
                entry,
                reason: "contains whitespace",
            });
        }
        if entry.matches(':').count() > 1 {
            return Err(ValidationError::InvalidFeatureEntry {
                entry,
                reason: "more than one context separator",
            });
        }
        if !entry.contains('_') {
            return Err(ValidationError::InvalidFeatureEntry {
                entry,
                reason: "missing delegate/handler separator",
            });
        }
        if entry.ends_with(':') {
            return Err(ValidationError::InvalidFeatureEntry {
                entry,
                reason: "empty context",
            });
        }
    }

    Ok(())
}

fn validate_events(config: &Config) -> Result<(), ValidationError> {
    if config.events.channel_capacity == 0 {
        return Err(ValidationError::InvalidChannelCapacity);
    }

    Ok(())
}
