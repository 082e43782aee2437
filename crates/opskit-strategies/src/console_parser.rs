//! Jenkins console output parsing

use regex::Regex;
use std::sync::OnceLock;

fn build_reference() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\d{4})").ok()).as_ref()
}

/// First four-digit build reference (`#1234`) in a console log.
///
/// Upstream jobs print the downstream build they triggered this way, e.g.
/// `Starting building: nightly-deploy #4821`.
pub fn find_build(console: &str) -> Option<u64> {
    build_reference()?
        .captures(console)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
