//! Parser for `--timeout` style durations.

use std::time::Duration;

/// Parse `300`, `300s`, `5m`, `1h` or a combination such as `1m30s`.
/// A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            _ => return Err(format!("invalid duration {input:?}: unknown unit {c:?}")),
        };
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration {input:?}: missing number before {c:?}"))?;
        total = n
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| format!("invalid duration {input:?}: too large"))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("invalid duration {input:?}: trailing number without unit"));
    }
    Ok(Duration::from_secs(total))
}
