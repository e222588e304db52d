use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use ring::digest;
use serde::{Deserialize, Serialize};
use sysinfo::{System, SystemExt};

/// Number of environment signals sampled, in the fixed order documented on
/// [`device_fingerprint`]
pub const SIGNAL_COUNT: usize = 10;

/// Placeholder recorded for a signal that cannot be read
const UNAVAILABLE: &str = "unavailable";

/// Derived environment identifier.
///
/// `id` is a pure function of `components`: the same environment always
/// produces the same fingerprint. This is a weak secondary anomaly signal,
/// not a primary identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    /// Stable hash of the component sequence
    pub id: String,
    /// The sampled signals, in sampling order
    pub components: Vec<String>,
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
}

/// Sample the environment and derive its fingerprint.
///
/// Exactly [`SIGNAL_COUNT`] signals are read, in this order: OS name,
/// OS version, kernel version, host name, CPU count, total memory,
/// architecture, locale, UTC offset, crate version. A signal that cannot be
/// read is replaced by a fixed placeholder rather than aborting the sample.
pub fn device_fingerprint() -> DeviceFingerprint {
    let components = sample_signals();
    DeviceFingerprint {
        id: hash_components(&components),
        components,
        timestamp: Utc::now(),
    }
}

fn sample_signals() -> Vec<String> {
    let system = System::new_all();

    let components = vec![
        system.name().unwrap_or_else(|| UNAVAILABLE.to_string()),
        system
            .os_version()
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        system
            .kernel_version()
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        system
            .host_name()
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        system.cpus().len().to_string(),
        system.total_memory().to_string(),
        std::env::consts::ARCH.to_string(),
        std::env::var("LANG").unwrap_or_else(|_| UNAVAILABLE.to_string()),
        chrono::Local::now().offset().to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    ];

    debug_assert_eq!(components.len(), SIGNAL_COUNT);
    components
}

fn hash_components(components: &[String]) -> String {
    let joined = components.join("|");
    let digest = digest::digest(&digest::SHA256, joined.as_bytes());
    general_purpose::STANDARD.encode(digest.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_has_exactly_ten_components() {
        let fingerprint = device_fingerprint();
        assert_eq!(fingerprint.components.len(), SIGNAL_COUNT);
    }

    #[test]
    fn test_fingerprint_is_stable_within_a_session() {
        let first = device_fingerprint();
        let second = device_fingerprint();

        assert_eq!(first.id, second.id);
        assert_eq!(first.components, second.components);
    }

    #[test]
    fn test_id_is_a_pure_function_of_components() {
        let fingerprint = device_fingerprint();
        assert_eq!(fingerprint.id, hash_components(&fingerprint.components));

        let mut altered = fingerprint.components.clone();
        altered[0] = "other-os".to_string();
        assert_ne!(fingerprint.id, hash_components(&altered));
    }

    #[test]
    fn test_missing_signal_uses_placeholder() {
        let components = vec![UNAVAILABLE.to_string(); SIGNAL_COUNT];
        // Hashing placeholder-only components still yields a stable id
        assert_eq!(hash_components(&components), hash_components(&components));
    }
}
