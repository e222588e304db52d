use serde::{Deserialize, Serialize};

use crate::config::PasswordPolicyConfig;

/// Outcome of a password strength check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordValidationResult {
    /// Whether every enabled rule passed
    pub is_valid: bool,
    /// One human-readable message per violated rule, in rule order
    pub errors: Vec<String>,
}

/// Password strength validation.
///
/// Each rule is evaluated independently so the caller can show every
/// violation at once instead of the first one found.
pub struct PasswordPolicy {
    config: PasswordPolicyConfig,
}

impl PasswordPolicy {
    /// Create a policy with the given requirements
    pub fn new(config: PasswordPolicyConfig) -> Self {
        Self { config }
    }

    /// Evaluate `password` against every enabled rule
    pub fn validate_password_strength(&self, password: &str) -> PasswordValidationResult {
        let mut errors = Vec::new();

        if password.chars().count() < self.config.min_length {
            errors.push(format!(
                "Password must be at least {} characters long",
                self.config.min_length
            ));
        }

        if self.config.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }

        if self.config.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }

        if self.config.require_numbers && !password.chars().any(|c| c.is_numeric()) {
            errors.push("Password must contain at least one number".to_string());
        }

        if self.config.require_special_chars && !password.chars().any(|c| !c.is_alphanumeric()) {
            errors.push("Password must contain at least one special character".to_string());
        }

        PasswordValidationResult {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new(PasswordPolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password_passes() {
        let result = PasswordPolicy::default().validate_password_strength("StrongP@ss123");
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_weak_password_collects_every_violation() {
        let result = PasswordPolicy::default().validate_password_strength("weak");
        assert!(!result.is_valid);

        // Too short, no uppercase, no number, no special character
        assert_eq!(result.errors.len(), 4);
        assert!(result.errors[0].contains("at least 8 characters"));
    }

    #[test]
    fn test_rules_are_independent() {
        let policy = PasswordPolicy::default();

        let result = policy.validate_password_strength("alllowercase1!");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("uppercase"));

        let result = policy.validate_password_strength("NoNumbersHere!");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("number"));
    }

    #[test]
    fn test_relaxed_config() {
        let policy = PasswordPolicy::new(PasswordPolicyConfig {
            min_length: 4,
            require_uppercase: false,
            require_lowercase: true,
            require_numbers: false,
            require_special_chars: false,
        });

        assert!(policy.validate_password_strength("abcd").is_valid);
        assert!(!policy.validate_password_strength("ABCD").is_valid);
    }
}
