use std::sync::Mutex;

use lazy_static::lazy_static;
use tracing::debug;

/// One directive with its ordered source tokens
#[derive(Debug, Clone)]
struct CspDirective {
    name: String,
    sources: Vec<String>,
}

/// Content-Security-Policy table.
///
/// Holds an insertion-ordered mapping of directive name to source tokens,
/// seeded conservatively: every resource type restricted to the page's own
/// origin, plugins and frames disabled outright. The application-wide table
/// lives behind [`CspManager::global`]; independent instances exist only for
/// tests.
pub struct CspManager {
    directives: Mutex<Vec<CspDirective>>,
}

lazy_static! {
    static ref GLOBAL_CSP: CspManager = CspManager::with_defaults();
}

impl CspManager {
    /// The process-wide policy table, created lazily on first access.
    /// Repeated calls return the same instance.
    pub fn global() -> &'static CspManager {
        &GLOBAL_CSP
    }

    /// Create a table seeded with the conservative default policy
    pub fn with_defaults() -> Self {
        let manager = Self {
            directives: Mutex::new(Vec::new()),
        };
        manager.seed_defaults();
        manager
    }

    fn seed_defaults(&self) {
        let mut directives = self.lock();
        directives.clear();
        for name in [
            "default-src",
            "script-src",
            "style-src",
            "img-src",
            "connect-src",
            "font-src",
            "media-src",
        ] {
            directives.push(CspDirective {
                name: name.to_string(),
                sources: vec!["'self'".to_string()],
            });
        }
        for name in ["object-src", "frame-src"] {
            directives.push(CspDirective {
                name: name.to_string(),
                sources: vec!["'none'".to_string()],
            });
        }
    }

    /// Set the source list for a directive, overwriting any prior list.
    /// New directives are appended in insertion order.
    pub fn add_policy(&self, directive: &str, sources: Vec<String>) {
        let mut deduped: Vec<String> = Vec::with_capacity(sources.len());
        for source in sources {
            if !deduped.contains(&source) {
                deduped.push(source);
            }
        }

        let mut directives = self.lock();
        if let Some(existing) = directives.iter_mut().find(|d| d.name == directive) {
            existing.sources = deduped;
        } else {
            directives.push(CspDirective {
                name: directive.to_string(),
                sources: deduped,
            });
        }
    }

    /// Delete a directive from the table
    pub fn remove_policy(&self, directive: &str) {
        let mut directives = self.lock();
        directives.retain(|d| d.name != directive);
    }

    /// Serialize the table as a policy header value, directives in
    /// insertion order
    pub fn policy_string(&self) -> String {
        let directives = self.lock();
        directives
            .iter()
            .map(|d| {
                if d.sources.is_empty() {
                    d.name.clone()
                } else {
                    format!("{} {}", d.name, d.sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Validate a candidate policy string against the table.
    ///
    /// Accepts only when every parsed directive is already registered and
    /// every source token is either registered for that directive or an
    /// http/https URL (a trusted external addition). Anything else rejects.
    pub fn validate_policy(&self, policy: &str) -> bool {
        let directives = self.lock();

        for segment in policy.split(';') {
            let mut tokens = segment.split_whitespace();
            let Some(name) = tokens.next() else {
                continue;
            };

            let Some(registered) = directives.iter().find(|d| d.name == name) else {
                debug!(directive = name, "rejecting unknown directive");
                return false;
            };

            for source in tokens {
                if registered.sources.iter().any(|s| s == source) {
                    continue;
                }
                if !is_external_url(source) {
                    debug!(directive = name, source, "rejecting unregistered source");
                    return false;
                }
            }
        }

        true
    }

    /// Restore the seed table (intended for tests sharing the process-wide
    /// instance)
    pub fn reset_to_defaults(&self) {
        self.seed_defaults();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CspDirective>> {
        self.directives.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn is_external_url(source: &str) -> bool {
    match url::Url::parse(source) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
