// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Value assumed for `maxspeed=none`, in km/h.
const NONE_MAX_SPEED: f64 = 40.0;

/// Unit used to interpret a tag value or a literal in routing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    /// Speed, normalized to meters per second. Values are in km/h, unless they mention "mph".
    Speed,

    /// Weight, normalized to tonnes. Values are in tonnes, unless they mention pounds.
    Weight,

    /// Length, normalized to meters. Values are in meters, unless they mention feet.
    Length,

    /// Plain number.
    #[default]
    Number,
}

impl ValueType {
    /// Maps a `type` attribute from a routing configuration onto a value type.
    /// Unknown and empty names are treated as plain numbers.
    pub fn from_name(name: &str) -> Self {
        match name {
            "speed" => Self::Speed,
            "weight" => Self::Weight,
            "length" => Self::Length,
            _ => Self::Number,
        }
    }
}

/// Parses a tag value or a literal according to its [ValueType].
///
/// Only the leading numeric part of the string is considered (an optional sign,
/// digits and a decimal point); the rest may only carry unit hints.
/// Returns `None` if the string does not start with a number.
pub fn parse_value(value: &str, value_type: ValueType) -> Option<f64> {
    let parsed = match value_type {
        ValueType::Speed => parse_speed(value),
        ValueType::Weight => parse_weight(value),
        ValueType::Length => parse_length(value),
        ValueType::Number => return parse_leading_number(value),
    };

    // -1 doubles as "unknown" for united values
    parsed.filter(|&v| v != -1.0)
}

fn parse_speed(value: &str) -> Option<f64> {
    if value == "none" {
        return Some(NONE_MAX_SPEED);
    }

    let kmh = parse_leading_number(value)?;
    let ms = kmh / 3.6;
    if value.contains("mph") {
        Some(ms * 1.6)
    } else {
        Some(ms)
    }
}

fn parse_weight(value: &str) -> Option<f64> {
    let w = parse_leading_number(value)?;
    if value.contains('"') || value.contains("lbs") {
        Some(w * 0.4535 / 1000.0)
    } else {
        Some(w)
    }
}

fn parse_length(value: &str) -> Option<f64> {
    let l = parse_leading_number(value)?;
    if value.contains('"') || value.contains("ft") {
        Some(l * 0.3048)
    } else {
        Some(l)
    }
}

fn parse_leading_number(value: &str) -> Option<f64> {
    let end = first_number_end_index(value)?;
    value[..end].parse().ok()
}

/// Returns the length of the numeric prefix of `value`, or `None` if there is no such prefix.
fn first_number_end_index(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut i = 0;
    let mut has_digits = false;
    let mut has_dot = false;

    if bytes.first() == Some(&b'-') {
        i += 1;
    }

    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => has_digits = true,
            b'.' if !has_dot => has_dot = true,
            _ => break,
        }
        i += 1;
    }

    if has_digits {
        Some(i)
    } else {
        None
    }
}
