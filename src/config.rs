// Importer configuration
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENVIRONMENT_ID_VAR: &str = "PROFORMA_DEFAULT_ENVIRONMENT_ID";
pub const FALLBACK_FILE_TYPE_VAR: &str = "PROFORMA_FALLBACK_FILE_TYPE";

// Fallback values used when a reference in the task cannot be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Execution environment assigned when no environment is named "<language> <version>".
    pub default_environment_id: i64,
    /// File type name used for files without a known extension.
    pub fallback_file_type_name: String,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            default_environment_id: 1,
            fallback_file_type_name: "Makefile".to_string(),
        }
    }
}

impl ImporterConfig {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    // Applies environment overrides on top of an existing config; unparsable values are ignored
    pub fn with_env_overrides(self) -> Self {
        Self {
            default_environment_id: std::env::var(DEFAULT_ENVIRONMENT_ID_VAR)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(self.default_environment_id),
            fallback_file_type_name: std::env::var(FALLBACK_FILE_TYPE_VAR)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(self.fallback_file_type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_legacy_fallbacks() {
        let config = ImporterConfig::default();
        assert_eq!(config.default_environment_id, 1);
        assert_eq!(config.fallback_file_type_name, "Makefile");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ImporterConfig =
            serde_json::from_str(r#"{"default_environment_id": 7}"#).unwrap();
        assert_eq!(config.default_environment_id, 7);
        assert_eq!(config.fallback_file_type_name, "Makefile");
    }
}
