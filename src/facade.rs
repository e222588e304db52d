use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;

use crate::config::{IpBlockConfig, RateLimitConfig, SecurityConfig};
use crate::csp::CspManager;
use crate::fingerprint::{self, DeviceFingerprint};
use crate::ip_block::IpBlockGuard;
use crate::password::{PasswordPolicy, PasswordValidationResult};
use crate::rate_limit::RateLimiter;
use crate::sanitize::{InputSanitizer, UrlGuard};
use crate::storage::{create_store, KeyValueStore};
use crate::token::{self, TokenBundle, TokenStore};
use crate::utils::error::Result;

#[derive(Deserialize)]
struct CsrfResponse {
    token: String,
}

/// Single access point composing every security component.
///
/// The rest of the application talks to this facade: outbound API calls
/// attach [`SecurityGuard::request_headers`], login/registration store the
/// bundle, logout removes it and clears security data, form submission paths
/// run the password and sanitization gates, and navigation targets pass
/// through the URL guard.
pub struct SecurityGuard {
    config: SecurityConfig,
    store: Arc<dyn KeyValueStore>,
    tokens: TokenStore,
    rate_limiter: RateLimiter,
    ip_guard: IpBlockGuard,
    sanitizer: InputSanitizer,
    url_guard: UrlGuard,
    password_policy: PasswordPolicy,
    http: Client,
}

impl SecurityGuard {
    /// Build the facade and every component from `config`
    pub fn new(config: SecurityConfig) -> Result<Self> {
        config.validate()?;

        let store = create_store(&config.storage)?;
        let tokens = TokenStore::new(store.clone(), config.api.clone())?;
        let rate_limiter = RateLimiter::new(store.clone());
        let ip_guard = IpBlockGuard::new(store.clone());
        let sanitizer = InputSanitizer::new();
        let url_guard = UrlGuard::new(&config.url_guard);
        let password_policy = PasswordPolicy::new(config.password_policy.clone());

        Ok(Self {
            config,
            store,
            tokens,
            rate_limiter,
            ip_guard,
            sanitizer,
            url_guard,
            password_policy,
            http: Client::new(),
        })
    }

    /// Build the facade with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(SecurityConfig::default())
    }

    /// The active configuration
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// The underlying key-value store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // ----- token lifecycle -----

    /// Persist a bundle issued at login/registration
    pub fn set_token(&self, bundle: &TokenBundle) -> Result<()> {
        self.tokens.set_token(bundle)
    }

    /// The stored access token, if any
    pub fn get_token(&self) -> Option<String> {
        self.tokens.get_token()
    }

    /// Delete the stored bundle
    pub fn remove_token(&self) -> Result<()> {
        self.tokens.remove_token()
    }

    /// Whether a token's expiry claim is strictly in the future
    pub fn is_token_valid(&self, token: &str) -> bool {
        token::is_token_valid(token)
    }

    /// Exchange the stored refresh token for a new bundle
    pub async fn refresh_token(&self) -> bool {
        self.tokens.refresh_token().await
    }

    /// Reset token, rate-limit, and attempt-block state to first run
    pub fn clear_security_data(&self) -> Result<()> {
        self.tokens.clear_security_data()
    }

    // ----- throttling gates -----

    /// Rate-limit check for `key` under the configured window
    pub fn check_rate_limit(&self, key: &str) -> bool {
        self.rate_limiter
            .check_rate_limit(key, &self.config.rate_limit)
    }

    /// Rate-limit check for `key` under an explicit window
    pub fn check_rate_limit_with(&self, key: &str, config: &RateLimitConfig) -> bool {
        self.rate_limiter.check_rate_limit(key, config)
    }

    /// Record a failed attempt for `ip` under the configured thresholds
    pub fn record_failed_attempt(&self, ip: &str) -> bool {
        self.ip_guard
            .record_failed_attempt(ip, &self.config.ip_block)
    }

    /// Record a failed attempt for `ip` under explicit thresholds
    pub fn record_failed_attempt_with(&self, ip: &str, config: &IpBlockConfig) -> bool {
        self.ip_guard.record_failed_attempt(ip, config)
    }

    /// Whether requests from `ip` are currently allowed
    pub fn check_ip_block(&self, ip: &str) -> bool {
        self.ip_guard.check_ip_block(ip, &self.config.ip_block)
    }

    // ----- content gates -----

    /// Sanitize untrusted markup
    pub fn sanitize_input(&self, raw: &str) -> String {
        self.sanitizer.sanitize_input(raw)
    }

    /// Whether `url` is an allowed navigation target
    pub fn validate_url(&self, url: &str) -> bool {
        self.url_guard.validate_url(url)
    }

    /// The normalized URL when allowed, or an empty string
    pub fn sanitize_url(&self, url: &str) -> String {
        self.url_guard.sanitize_url(url)
    }

    /// Evaluate a password against the configured policy
    pub fn validate_password_strength(&self, password: &str) -> PasswordValidationResult {
        self.password_policy.validate_password_strength(password)
    }

    /// Sample the environment fingerprint
    pub fn device_fingerprint(&self) -> DeviceFingerprint {
        fingerprint::device_fingerprint()
    }

    // ----- header assembly and CSRF -----

    /// Assemble the hardening header set, freshly on every call.
    ///
    /// The Content-Security-Policy value is read live from the process-wide
    /// [`CspManager`], so policy changes show up in the next call.
    pub fn secure_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let csp = CspManager::global().policy_string();
        if let Ok(value) = HeaderValue::from_str(&csp) {
            headers.insert("Content-Security-Policy", value);
        }

        headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
        headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
        headers.insert("X-XSS-Protection", HeaderValue::from_static("1; mode=block"));
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
        headers.insert(
            "Referrer-Policy",
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(
            "Permissions-Policy",
            HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
        );

        headers
    }

    /// The hardening header set plus the bearer token, for outbound API calls
    pub fn request_headers(&self) -> HeaderMap {
        let mut headers = self.secure_headers();
        if let Some(token) = self.get_token() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    /// Fetch a CSRF token from the configured endpoint.
    ///
    /// Unlike [`SecurityGuard::refresh_token`] this propagates failure: the
    /// action that needed the token must not proceed without it.
    pub async fn csrf_token(&self) -> Result<String> {
        let url = format!("{}{}", self.config.api.base_url, self.config.api.csrf_path);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body: CsrfResponse = response.json().await?;
        Ok(body.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_headers_contain_the_full_set() {
        let guard = SecurityGuard::with_defaults().unwrap();
        let headers = guard.secure_headers();

        for name in [
            "Content-Security-Policy",
            "X-Content-Type-Options",
            "X-Frame-Options",
            "X-XSS-Protection",
            "Strict-Transport-Security",
            "Referrer-Policy",
            "Permissions-Policy",
        ] {
            assert!(headers.contains_key(name), "missing header {}", name);
        }

        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");

        let csp = headers
            .get("Content-Security-Policy")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(csp.contains("default-src 'self'"));
    }

    #[test]
    fn test_request_headers_attach_bearer_token() {
        let guard = SecurityGuard::with_defaults().unwrap();
        assert!(!guard.request_headers().contains_key(AUTHORIZATION));

        guard
            .set_token(&TokenBundle {
                access_token: "abc".to_string(),
                refresh_token: "def".to_string(),
                expires_at: 0,
            })
            .unwrap();

        let headers = guard.request_headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_gate_pass_throughs() {
        let config = SecurityConfig::default().with_rate_limit(60_000, 1);
        let guard = SecurityGuard::new(config).unwrap();

        assert!(guard.check_rate_limit("login"));
        assert!(!guard.check_rate_limit("login"));

        assert!(guard.check_ip_block("203.0.113.9"));
        assert!(!guard.validate_url("javascript:alert(1)"));
        assert!(guard.sanitize_input("<script>x</script>").is_empty());
        assert!(!guard.validate_password_strength("weak").is_valid);
        assert_eq!(guard.device_fingerprint().components.len(), 10);
    }

    #[tokio::test]
    async fn test_csrf_failure_propagates() {
        let config = SecurityConfig::default().with_base_url("http://127.0.0.1:9");
        let guard = SecurityGuard::new(config).unwrap();

        assert!(guard.csrf_token().await.is_err());
    }
}
