//! Relative time ranges such as `2h`, `30m` or `4d30m`.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static RE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[wdhms])+$").unwrap());
static RE_RANGE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([wdhms])").unwrap());

pub const DEFAULT_RANGE: &str = "5m";

/// Parses a relative range into a duration. A bare integer means seconds.
pub fn parse_range(input: &str) -> Result<Duration, String> {
    if let Ok(secs) = input.parse::<u64>() {
        return non_zero(input, secs);
    }

    if !RE_RANGE.is_match(input) {
        return Err(format!(
            "invalid range '{}', expected something like 2h, 30m or 4d30m",
            input
        ));
    }

    let mut total: u64 = 0;
    for caps in RE_RANGE_PART.captures_iter(input) {
        let amount: u64 = caps[1]
            .parse()
            .map_err(|_| format!("range '{}' is too large", input))?;
        let unit = match &caps[2] {
            "w" => 7 * 24 * 3600,
            "d" => 24 * 3600,
            "h" => 3600,
            "m" => 60,
            _ => 1,
        };
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("range '{}' is too large", input))?;
    }

    non_zero(input, total)
}

fn non_zero(input: &str, secs: u64) -> Result<Duration, String> {
    if secs == 0 {
        return Err(format!("range '{}' must be longer than zero seconds", input));
    }
    Ok(Duration::from_secs(secs))
}
