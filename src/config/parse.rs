use std::time::Duration;

use crate::error::ConfigError;

/// Parse a duration in either shorthand (`500ms`, `30s`, `10m`, `2h`,
/// bare seconds) or ISO-8601 time form (`PT30S`, `PT10M`, `PT1H30M`,
/// `PT0.5S`). `field` names the config entry in error messages.
pub(crate) fn parse_duration_value(
    field: &'static str,
    value: &str,
) -> Result<Duration, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::InvalidDuration {
            field,
            value: value.to_owned(),
        });
    }

    let duration = if value.len() >= 2 && value.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("pt"))
    {
        parse_iso_duration(field, value)?
    } else {
        parse_shorthand_duration(field, value)?
    };

    if duration.as_millis() == 0 {
        return Err(ConfigError::DurationZero { field });
    }
    Ok(duration)
}

fn parse_shorthand_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        field,
        value: value.to_owned(),
    };

    let digits_len = value.chars().take_while(char::is_ascii_digit).count();
    if digits_len == 0 {
        return Err(invalid());
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part.parse().map_err(|_| invalid())?;

    let unit = if unit_part.is_empty() { "s" } else { unit_part };
    match unit {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => number
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or(ConfigError::DurationOverflow { field }),
        "h" => number
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or(ConfigError::DurationOverflow { field }),
        _ => Err(invalid()),
    }
}

fn parse_iso_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        field,
        value: value.to_owned(),
    };

    let body = value.get(2..).ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    let mut total_ms: u64 = 0;
    let mut number = String::new();
    for ch in body.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }
        let quantity: f64 = number.parse().map_err(|_| invalid())?;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(invalid());
        }
        number.clear();
        let unit_ms: f64 = match ch.to_ascii_uppercase() {
            'H' => 3_600_000.0,
            'M' => 60_000.0,
            'S' => 1000.0,
            _ => return Err(invalid()),
        };
        let part_ms = quantity * unit_ms;
        if part_ms > u64::MAX as f64 {
            return Err(ConfigError::DurationOverflow { field });
        }
        total_ms = total_ms
            .checked_add(part_ms.round() as u64)
            .ok_or(ConfigError::DurationOverflow { field })?;
    }
    if !number.is_empty() {
        // Trailing digits without a unit designator.
        return Err(invalid());
    }
    Ok(Duration::from_millis(total_ms))
}
