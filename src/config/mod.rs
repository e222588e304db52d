use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::error::{GuardError, Result};

/// Main configuration for the security module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Backend API endpoints
    pub api: ApiConfig,
    /// Persistent key-value storage configuration
    pub storage: StorageConfig,
    /// Request throttling configuration
    pub rate_limit: RateLimitConfig,
    /// Failed-attempt blocking configuration
    pub ip_block: IpBlockConfig,
    /// Navigation target allow-list configuration
    pub url_guard: UrlGuardConfig,
    /// Password strength requirements
    pub password_policy: PasswordPolicyConfig,
}

/// Backend API endpoints consumed by the token and CSRF flows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the backend API
    pub base_url: String,
    /// Path of the token refresh endpoint
    pub refresh_path: String,
    /// Path of the CSRF token endpoint
    pub csrf_path: String,
}

/// Persistent key-value storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend to use
    pub backend: StorageBackend,
    /// Backing file for the file backend
    pub file_path: PathBuf,
}

/// Supported storage backends
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StorageBackend {
    /// In-memory storage (not persistent)
    Memory,
    /// File-based storage
    File,
}

/// Request throttling configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Rolling window length in milliseconds
    pub window_ms: u64,
    /// Maximum admitted requests per window
    pub max_requests: u32,
}

/// Failed-attempt blocking configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IpBlockConfig {
    /// Failed attempts before a block is applied
    pub max_attempts: u32,
    /// Block length in milliseconds
    pub block_duration_ms: u64,
}

/// Navigation target allow-list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlGuardConfig {
    /// Hosts that navigation/redirect targets may point at
    pub allowed_hosts: Vec<String>,
}

/// Password strength requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicyConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Require uppercase letters
    pub require_uppercase: bool,
    /// Require lowercase letters
    pub require_lowercase: bool,
    /// Require numbers
    pub require_numbers: bool,
    /// Require special characters
    pub require_special_chars: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            rate_limit: RateLimitConfig::default(),
            ip_block: IpBlockConfig::default(),
            url_guard: UrlGuardConfig::default(),
            password_policy: PasswordPolicyConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            refresh_path: "/api/auth/refresh".to_string(),
            csrf_path: "/api/auth/csrf".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            file_path: PathBuf::from("webguard_store.json"),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
        }
    }
}

impl Default for IpBlockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            block_duration_ms: 15 * 60_000,
        }
    }
}

impl Default for UrlGuardConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
        }
    }
}

impl SecurityConfig {
    /// Set the backend API base URL
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// Use the file storage backend at the given path
    pub fn with_file_storage<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.storage.backend = StorageBackend::File;
        self.storage.file_path = path.into();
        self
    }

    /// Add a host to the navigation allow-list
    pub fn with_allowed_host<S: Into<String>>(mut self, host: S) -> Self {
        self.url_guard.allowed_hosts.push(host.into());
        self
    }

    /// Set the throttling window and request budget
    pub fn with_rate_limit(mut self, window_ms: u64, max_requests: u32) -> Self {
        self.rate_limit = RateLimitConfig {
            window_ms,
            max_requests,
        };
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.into())?;
        let config: SecurityConfig = toml::from_str(&content)
            .map_err(|e| GuardError::config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: Into<PathBuf>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GuardError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.into(), content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(GuardError::config("api.base_url is required"));
        }

        if self.rate_limit.max_requests == 0 {
            return Err(GuardError::config(
                "rate_limit.max_requests must be greater than 0",
            ));
        }

        if self.rate_limit.window_ms == 0 {
            return Err(GuardError::config(
                "rate_limit.window_ms must be greater than 0",
            ));
        }

        if self.ip_block.max_attempts == 0 {
            return Err(GuardError::config(
                "ip_block.max_attempts must be greater than 0",
            ));
        }

        if self.url_guard.allowed_hosts.is_empty() {
            return Err(GuardError::config(
                "url_guard.allowed_hosts must not be empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SecurityConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.ip_block.max_attempts, 5);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_builder_methods() {
        let config = SecurityConfig::default()
            .with_base_url("https://api.example.com")
            .with_allowed_host("app.example.com")
            .with_rate_limit(1_000, 3);

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert!(config
            .url_guard
            .allowed_hosts
            .contains(&"app.example.com".to_string()));
        assert_eq!(config.rate_limit.max_requests, 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SecurityConfig::default();
        config.rate_limit.max_requests = 0;
        assert!(config.validate().is_err());

        let mut config = SecurityConfig::default();
        config.url_guard.allowed_hosts.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webguard.toml");

        let config = SecurityConfig::default().with_base_url("https://api.example.com");
        config.save_to_file(&path).unwrap();

        let loaded = SecurityConfig::from_file(&path).unwrap();
        assert_eq!(loaded.api, config.api);
        assert_eq!(loaded.rate_limit, config.rate_limit);
    }
}
