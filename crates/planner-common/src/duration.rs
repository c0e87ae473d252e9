//! Go-style duration strings
//!
//! Flux objects carry intervals as Go `metav1.Duration` strings ("5m0s",
//! "1h0m0s"). The planner writes intervals in that canonical form so a
//! re-reconcile with the same interval compares equal to what the API server
//! stores, and parses the looser human form ("5m", "1h30m") on the CLI.

use std::time::Duration;

use crate::Error;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Format a duration the way Go's `time.Duration.String()` does.
///
/// Examples: 5m → "5m0s", 1h → "1h0m0s", 90s → "1m30s", 1.5s → "1.5s",
/// 250ms → "250ms", zero → "0s".
pub fn format_go_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    if d < Duration::from_secs(1) {
        let nanos = d.subsec_nanos();
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}µs", nanos / 1_000)
        } else {
            format!("{}ns", nanos)
        };
    }

    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h{minutes}m"));
    } else if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }

    let nanos = d.subsec_nanos();
    if nanos == 0 {
        out.push_str(&format!("{seconds}s"));
    } else {
        let frac = format!("{nanos:09}");
        out.push_str(&format!("{seconds}.{}s", frac.trim_end_matches('0')));
    }
    out
}

/// Parse a Go-style duration ("5m", "1h30m", "90s", "1.5h", "250ms").
///
/// A bare "0" is accepted; any other value needs a unit on every component.
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    let input = s.trim();
    if input.is_empty() {
        return Err(Error::validation("invalid duration: empty string"));
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || {
        Error::validation(format!(
            "invalid duration '{}', expected e.g. 5m, 1h30m, 90s",
            input
        ))
    };

    let mut total_nanos: u128 = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let (number, after) = rest.split_at(number_len);

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC as u128,
            "m" => 60 * NANOS_PER_SEC as u128,
            "h" => 3600 * NANOS_PER_SEC as u128,
            _ => return Err(invalid()),
        };

        let value: f64 = number.parse().map_err(|_| invalid())?;
        let nanos = (value * unit_nanos as f64).round();
        if !nanos.is_finite() || nanos >= u128::MAX as f64 {
            return Err(invalid());
        }
        total_nanos = total_nanos
            .checked_add(nanos as u128)
            .ok_or_else(invalid)?;
        rest = after;
    }

    let secs = u64::try_from(total_nanos / NANOS_PER_SEC as u128).map_err(|_| invalid())?;
    let nanos = (total_nanos % NANOS_PER_SEC as u128) as u32;
    Ok(Duration::new(secs, nanos))
}
