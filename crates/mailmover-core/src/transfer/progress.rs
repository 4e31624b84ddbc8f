//! Extract progress from imapsync's stdout lines.
//!
//! Only two shapes are recognised: a percentage (`42%`, `17.5%`) and a
//! message ratio (`120/480`). Anything else is ignored.

use regex::Regex;
use std::sync::OnceLock;

/// Bytes credited to a successful run when imapsync never printed a total.
pub const ESTIMATED_BYTES_PER_TRANSFER: u64 = 1024 * 1024;

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]{1,3}(?:\.[0-9]+)?)%").expect("static regex"))
}

fn ratio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)/(\d+)").expect("static regex"))
}

fn bytes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)total bytes transferred\s*:\s*(\d+)").expect("static regex")
    })
}

/// Progress in [0, 100] if the line carries a percentage or a ratio.
/// A percentage wins over a ratio on the same line.
pub fn parse_progress(line: &str) -> Option<f64> {
    if let Some(caps) = percent_re().captures(line) {
        if let Ok(p) = caps[1].parse::<f64>() {
            return Some(p.clamp(0.0, 100.0));
        }
    }
    let caps = ratio_re().captures(line)?;
    let done: f64 = caps[1].parse().ok()?;
    let total: f64 = caps[2].parse().ok()?;
    if total <= 0.0 {
        return None;
    }
    Some((done / total * 100.0).clamp(0.0, 100.0))
}

/// Byte total from imapsync's end-of-run summary line.
pub fn parse_bytes_transferred(line: &str) -> Option<u64> {
    bytes_re().captures(line)?[1].parse().ok()
}
