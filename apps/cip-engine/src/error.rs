use serde::{Deserialize, Serialize};

/// Error types for cycle detection and scoring.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Analysis configuration failed validation; nothing was fetched.
    InvalidConfiguration(String),
    /// Samples handed to the detector are not in ascending timestamp order.
    UnorderedSeries { tag: String },
    /// The time-series provider could not deliver a readable series.
    Provider { tag: String, message: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration(msg) => {
                write!(f, "Invalid analysis configuration: {}", msg)
            }
            Self::UnorderedSeries { tag } => {
                write!(f, "Series for tag {} is not in timestamp order", tag)
            }
            Self::Provider { tag, message } => {
                write!(f, "Provider failed for tag {}: {}", tag, message)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Serializable failure carried on a per-tank report when that tank's
/// analysis could not complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankFailure {
    pub code: String,
    pub message: String,
}

impl EngineError {
    /// Convert to the serializable per-tank failure with a stable code.
    pub fn to_failure(&self) -> TankFailure {
        let code = match self {
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::UnorderedSeries { .. } => "unordered_series",
            Self::Provider { .. } => "provider_unavailable",
        };
        TankFailure {
            code: code.to_string(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_carries_tag_and_code() {
        let err = EngineError::Provider {
            tag: "BEB3-10-0400-TT421".to_string(),
            message: "connection refused".to_string(),
        };
        let failure = err.to_failure();
        assert_eq!(failure.code, "provider_unavailable");
        assert!(failure.message.contains("BEB3-10-0400-TT421"));
        assert!(failure.message.contains("connection refused"));
    }

    #[test]
    fn configuration_error_displays_reason() {
        let err = EngineError::InvalidConfiguration("max_gap_minutes must be >= 0".to_string());
        assert!(err.to_string().contains("max_gap_minutes"));
        assert_eq!(err.to_failure().code, "invalid_configuration");
    }
}
