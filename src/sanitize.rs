use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

use crate::config::UrlGuardConfig;

/// Tags that survive sanitization
const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "br", "em", "i", "li", "ol", "p", "span", "strong", "u", "ul",
];

/// (tag, attribute) pairs that survive sanitization
const ALLOWED_ATTRIBUTES: &[(&str, &str)] = &[("a", "href")];

/// Allow-list HTML sanitizer.
///
/// Keeps a small set of known-safe tags and attributes and discards
/// everything else, so novel injection vectors degrade to plain text instead
/// of slipping through a denylist. Script and style elements are dropped
/// together with their content; disallowed tags are stripped but their text
/// is kept. Sanitization never fails; it always returns a usable string.
pub struct InputSanitizer {
    comment: Regex,
    script_block: Regex,
    style_block: Regex,
    tag: Regex,
    attribute: Regex,
}

impl InputSanitizer {
    /// Create a sanitizer with its patterns compiled once
    pub fn new() -> Self {
        Self {
            comment: Regex::new(r"(?s)<!--.*?-->").expect("static pattern"),
            script_block: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>")
                .expect("static pattern"),
            style_block: Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("static pattern"),
            tag: Regex::new(r#"(?is)<(/?)([a-z][a-z0-9-]*)((?:"[^"]*"|'[^']*'|[^>"'])*)>"#)
                .expect("static pattern"),
            attribute: Regex::new(r#"(?i)([a-z][a-z0-9-]*)\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
                .expect("static pattern"),
        }
    }

    /// Sanitize untrusted markup into safe markup
    pub fn sanitize_input(&self, raw: &str) -> String {
        let without_comments = self.comment.replace_all(raw, "");
        let without_scripts = self.script_block.replace_all(&without_comments, "");
        let without_styles = self.style_block.replace_all(&without_scripts, "");

        self.tag
            .replace_all(&without_styles, |caps: &Captures| self.rebuild_tag(caps))
            .into_owned()
    }

    fn rebuild_tag(&self, caps: &Captures) -> String {
        let closing = &caps[1] == "/";
        let name = caps[2].to_ascii_lowercase();

        if !ALLOWED_TAGS.contains(&name.as_str()) {
            debug!(tag = %name, "stripping disallowed tag");
            return String::new();
        }

        if closing {
            return format!("</{}>", name);
        }

        let mut rebuilt = format!("<{}", name);
        for attr_caps in self.attribute.captures_iter(&caps[3]) {
            let attr_name = attr_caps[1].to_ascii_lowercase();
            if !ALLOWED_ATTRIBUTES.contains(&(name.as_str(), attr_name.as_str())) {
                continue;
            }
            let value = attr_caps[2].trim_matches(|c| c == '"' || c == '\'');
            if attr_name == "href" && !is_safe_link_target(value) {
                continue;
            }
            rebuilt.push_str(&format!(" {}=\"{}\"", attr_name, value));
        }
        rebuilt.push('>');
        rebuilt
    }
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// A link target is safe when it is an http/https URL or a relative path
fn is_safe_link_target(value: &str) -> bool {
    match Url::parse(value) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        // Relative references fail to parse; accept them unless they smuggle
        // a scheme
        Err(_) => !value.contains(':'),
    }
}

/// Navigation target gate: scheme plus host allow-list.
///
/// Externally supplied navigation and redirect targets must pass through
/// here before use. Unparseable input and hosts outside the allow-list are
/// rejected, which covers `javascript:` and `data:` schemes as a side
/// effect of the scheme check.
pub struct UrlGuard {
    allowed_hosts: Vec<String>,
}

impl UrlGuard {
    /// Create a guard for the configured host allow-list
    pub fn new(config: &UrlGuardConfig) -> Self {
        Self {
            allowed_hosts: config.allowed_hosts.clone(),
        }
    }

    /// Check whether `url` is an http/https URL pointing at an allowed host
    pub fn validate_url(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.is_allowed(&parsed),
            Err(_) => false,
        }
    }

    /// Return the normalized URL when valid, or an empty string
    pub fn sanitize_url(&self, url: &str) -> String {
        match Url::parse(url) {
            Ok(parsed) if self.is_allowed(&parsed) => parsed.to_string(),
            _ => String::new(),
        }
    }

    fn is_allowed(&self, parsed: &Url) -> bool {
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        match parsed.host_str() {
            Some(host) => self
                .allowed_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host)),
            None => false,
        }
    }
}
