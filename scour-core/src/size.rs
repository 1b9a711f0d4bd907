use crate::error::{Result, ScourError};

pub const KB: u64 = 1024;
pub const MB: u64 = KB * 1024;
pub const GB: u64 = MB * 1024;
pub const TB: u64 = GB * 1024;

const UNITS: [(u64, &str); 4] = [(TB, "TB"), (GB, "GB"), (MB, "MB"), (KB, "KB")];

/// `1536` -> `1.5 KB`
pub fn format_size(bytes: u64) -> String {
    UNITS
        .iter()
        .find(|(unit, _)| bytes >= *unit)
        .map(|(unit, suffix)| format!("{:.1} {}", bytes as f64 / *unit as f64, suffix))
        .unwrap_or_else(|| format!("{bytes} B"))
}

/// `1234567` -> `1,234,567`
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Parse a size literal such as `512`, `1.5K`, `20MB` or `3g` into bytes
pub fn parse_size(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| ScourError::InvalidQuery(format!("invalid size: {raw}")))?;

    let unit = unit.trim().to_ascii_uppercase();
    let unit = unit.strip_suffix('B').filter(|u| !u.is_empty()).unwrap_or(unit.as_str());
    let multiplier = match unit {
        "" | "B" => 1,
        "K" => KB,
        "M" => MB,
        "G" => GB,
        "T" => TB,
        _ => return Err(ScourError::InvalidQuery(format!("invalid size unit: {raw}"))),
    };

    Ok((value * multiplier as f64) as u64)
}
