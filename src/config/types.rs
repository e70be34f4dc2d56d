//! Server configuration types.

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult};

/// Complete configuration for the file gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileServerConfig {
    /// Address to bind
    pub host: String,
    pub port: u16,
    /// Directory served as the namespace root. Must end in '/'.
    pub root_dir: String,
    /// URL prefix under which all file routes live. Must begin and end
    /// with '/'.
    pub url_prefix: String,
    /// Maximum request body size in bytes (uploads and PUT bodies)
    pub max_payload_size: usize,
    /// Directory for rolling log files; stdout-only when unset
    pub log_dir: Option<String>,
    /// Log level (off, error, warn, info, debug, trace)
    pub log_level: Option<String>,
    /// CORS allowed origins; empty means allow any
    pub cors_allowed_origins: Vec<String>,
    pub shutdown_grace_period_secs: u64,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        FileServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            root_dir: "./files/".to_string(),
            url_prefix: "/".to_string(),
            max_payload_size: 100 * 1024 * 1024, // 100MB
            log_dir: None,
            log_level: None,
            cors_allowed_origins: Vec::new(),
            shutdown_grace_period_secs: 5,
        }
    }
}

impl FileServerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.root_dir.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "root_dir".to_string(),
            });
        }
        if !self.root_dir.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "root_dir".to_string(),
                value: self.root_dir.clone(),
                reason: "root directory must end in a slash".to_string(),
            });
        }
        if !self.url_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "url_prefix".to_string(),
                value: self.url_prefix.clone(),
                reason: "URL prefix must start with a slash".to_string(),
            });
        }
        if !self.url_prefix.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "url_prefix".to_string(),
                value: self.url_prefix.clone(),
                reason: "URL prefix must end in a slash".to_string(),
            });
        }
        if self.max_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_size".to_string(),
                value: "0".to_string(),
                reason: "payload limit must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FileServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_root_dir_must_end_in_slash() {
        let config = FileServerConfig {
            root_dir: "/srv/files".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "root_dir"));
    }

    #[test]
    fn test_url_prefix_slash_rules() {
        let missing_leading = FileServerConfig {
            url_prefix: "files/".to_string(),
            ..Default::default()
        };
        assert!(missing_leading.validate().is_err());

        let missing_trailing = FileServerConfig {
            url_prefix: "/files".to_string(),
            ..Default::default()
        };
        assert!(missing_trailing.validate().is_err());

        let valid = FileServerConfig {
            url_prefix: "/files/".to_string(),
            ..Default::default()
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_zero_payload_limit_rejected() {
        let config = FileServerConfig {
            max_payload_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = FileServerConfig {
            url_prefix: "/files/".to_string(),
            cors_allowed_origins: vec!["https://example.com".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: FileServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
