use std::sync::OnceLock;

use regex::Regex;

const RATE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Binary multiplier for a byte-rate unit. Unknown units count as raw bytes.
pub fn unit_multiplier(unit: &str) -> f64 {
    match unit.trim().to_ascii_uppercase().as_str() {
        "KB" | "KIB" => 1024.0,
        "MB" | "MIB" => 1024.0 * 1024.0,
        "GB" | "GIB" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "TIB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    }
}

/// Bytes per second for an already split `<number> <unit>` pair.
pub fn rate_from_parts(number: &str, unit: &str) -> Option<f64> {
    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value * unit_multiplier(unit))
}

/// Parse a throughput figure such as `"12.50 MB/s"` into bytes per second.
pub fn parse_rate(text: &str) -> Option<f64> {
    static RATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = RATE_RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([A-Za-z]*)\s*/s\s*$").expect("valid rate regex")
    });
    let caps = re.captures(text)?;
    rate_from_parts(&caps[1], &caps[2])
}

/// Format bytes per second with binary units: `"512 B/s"`, `"12.50 MB/s"`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return "0 B/s".to_string();
    }
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1024.0 && unit < RATE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} B/s")
    } else {
        format!("{value:.2} {}/s", RATE_UNITS[unit])
    }
}
