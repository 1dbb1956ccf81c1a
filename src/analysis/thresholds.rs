//! Lenient parsing of `marginal=..,pass=..` threshold strings.

use crate::kayenta::Threshold;

const MARGINAL_KEY: &str = "marginal";
const PASS_KEY: &str = "pass";

/// Parse a comma-separated `key=value` list into a [`Threshold`].
///
/// Never fails. Fragments without exactly one `=`, unknown keys and empty
/// values are skipped, keeping the corresponding default.
pub fn parse_thresholds(input: &str, defaults: &Threshold) -> Threshold {
    let mut threshold = defaults.clone();

    for fragment in input.split(',') {
        let mut parts = fragment.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };

        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.trim() {
            MARGINAL_KEY => threshold.marginal = value.to_string(),
            PASS_KEY => threshold.pass = value.to_string(),
            _ => {}
        }
    }

    threshold
}
