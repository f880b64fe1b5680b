// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duration codec.
//!
//! Time values are written as four single digits `HHMM`: tens of hours, ones
//! of hours, tens of minutes, ones of minutes. Digits are weighted
//! `600, 60, 10, 1` and summed without range checks, so `0099` is 99 minutes
//! and `9999` is 6599 minutes.

use std::str::FromStr;

use strum::{Display, EnumString};

/// Per-digit weights in minutes.
const DIGIT_WEIGHTS: [u32; 4] = [600, 60, 10, 1];

/// Reads four leading ASCII digits. Anything after them is ignored.
fn leading_digit_groups(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    if bytes.len() < DIGIT_WEIGHTS.len() {
        return None;
    }
    bytes
        .iter()
        .zip(DIGIT_WEIGHTS)
        .try_fold(0u32, |acc, (b, weight)| {
            b.is_ascii_digit()
                .then(|| acc + u32::from(b - b'0') * weight)
        })
}

/// Decodes a free-text reply such as `0130` into minutes.
///
/// The match is anchored at the start only: `0130 please` decodes to 90,
/// `about 0130` does not decode.
pub fn decode_free_text_duration(text: &str) -> Option<u32> {
    leading_digit_groups(text)
}

/// Decodes a duration label such as `log0205` into minutes.
///
/// The label must be one of `prefixes` followed by exactly four digits.
pub fn decode_label_duration<S: AsRef<str>>(label: &str, prefixes: &[S]) -> Option<u32> {
    prefixes.iter().find_map(|prefix| {
        let digits = label.strip_prefix(prefix.as_ref())?;
        if digits.len() != DIGIT_WEIGHTS.len() {
            return None;
        }
        leading_digit_groups(digits)
    })
}

/// Unit of a structured task duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DurationUnit {
    Minute,
    Hour,
    Day,
}

impl DurationUnit {
    pub fn minutes(self) -> u32 {
        match self {
            DurationUnit::Minute => 1,
            DurationUnit::Hour => 60,
            DurationUnit::Day => 24 * 60,
        }
    }
}

/// Decodes a structured `amount` + `unit` duration into minutes.
///
/// Returns `None` for an unrecognized unit; callers treat that as 0 minutes
/// and log a warning. Negative amounts count as 0 and the product saturates.
pub fn decode_structured_duration(amount: i64, unit: &str) -> Option<u32> {
    let unit = DurationUnit::from_str(unit).ok()?;
    let amount = u32::try_from(amount.max(0)).unwrap_or(u32::MAX);
    Some(amount.saturating_mul(unit.minutes()))
}

/// Formats minutes as `Hh MMm`, e.g. `1h 30m`.
pub fn format_minutes(minutes: u64) -> String {
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PREFIXES: &[&str] = &["log", "@log"];

    #[test]
    fn free_text_examples() {
        assert_eq!(decode_free_text_duration("0130"), Some(90));
        assert_eq!(decode_free_text_duration("0205"), Some(125));
        assert_eq!(decode_free_text_duration("9999"), Some(6599));
        assert_eq!(decode_free_text_duration("0000"), Some(0));
    }

    #[test]
    fn free_text_rejects_non_matches() {
        assert_eq!(decode_free_text_duration("abcd"), None);
        assert_eq!(decode_free_text_duration("12"), None);
        assert_eq!(decode_free_text_duration(""), None);
        assert_eq!(decode_free_text_duration("01a0"), None);
        assert_eq!(decode_free_text_duration(" 0130"), None);
    }

    #[test]
    fn free_text_tolerates_trailing_characters() {
        assert_eq!(decode_free_text_duration("0130 minutes"), Some(90));
        assert_eq!(decode_free_text_duration("01305"), Some(90));
    }

    #[test]
    fn free_text_handles_multibyte_input() {
        assert_eq!(decode_free_text_duration("ßß"), None);
        assert_eq!(decode_free_text_duration("0130ß"), Some(90));
    }

    #[test]
    fn label_with_either_prefix_decodes() {
        assert_eq!(decode_label_duration("log0205", PREFIXES), Some(125));
        assert_eq!(decode_label_duration("@log0100", PREFIXES), Some(60));
    }

    #[test]
    fn label_requires_exactly_four_digits() {
        assert_eq!(decode_label_duration("log020", PREFIXES), None);
        assert_eq!(decode_label_duration("log02050", PREFIXES), None);
        assert_eq!(decode_label_duration("0205", PREFIXES), None);
        assert_eq!(decode_label_duration("logabcd", PREFIXES), None);
        assert_eq!(decode_label_duration("track", PREFIXES), None);
    }

    #[test]
    fn label_digits_are_not_range_checked() {
        assert_eq!(decode_label_duration("log0099", PREFIXES), Some(99));
    }

    #[test]
    fn structured_units() {
        assert_eq!(decode_structured_duration(30, "minute"), Some(30));
        assert_eq!(decode_structured_duration(1, "day"), Some(1440));
        assert_eq!(decode_structured_duration(2, "hour"), Some(120));
        assert_eq!(decode_structured_duration(5, "fortnight"), None);
        assert_eq!(decode_structured_duration(5, "fortnight").unwrap_or(0), 0);
    }

    #[test]
    fn structured_clamps_out_of_range_amounts() {
        assert_eq!(decode_structured_duration(-3, "hour"), Some(0));
        assert_eq!(decode_structured_duration(i64::MAX, "day"), Some(u32::MAX));
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_minutes(90), "1h 30m");
        assert_eq!(format_minutes(5), "0h 05m");
        assert_eq!(format_minutes(6599), "109h 59m");
    }

    proptest! {
        #[test]
        fn any_four_digits_decode_arithmetically(d in proptest::array::uniform4(0u32..10)) {
            let text: String = d.iter().map(|n| char::from_digit(*n, 10).unwrap()).collect();
            let expected = d[0] * 600 + d[1] * 60 + d[2] * 10 + d[3];
            prop_assert_eq!(decode_free_text_duration(&text), Some(expected));
            prop_assert_eq!(decode_label_duration(&format!("log{text}"), PREFIXES), Some(expected));
        }
    }
}
