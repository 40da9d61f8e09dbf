//! Human-readable durations.
//!
//! Durations travel in role documents as compact strings such as `"20h"`,
//! `"1h30m"` or `"1.5s"`. Encoding always produces the canonical form
//! (`"20h0m0s"`), which decodes back to the same value.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::TypeError;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// A non-negative span of time with a string wire form.
///
/// A zero duration means "unset" wherever a duration is optional
/// (for example a role's maximum session TTL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(std::time::Duration);

impl Duration {
    pub const ZERO: Duration = Duration(std::time::Duration::ZERO);

    pub const fn new(duration: std::time::Duration) -> Self {
        Self(duration)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(std::time::Duration::from_secs(secs))
    }

    pub const fn from_mins(mins: u64) -> Self {
        Self::from_secs(mins * 60)
    }

    pub const fn from_hours(hours: u64) -> Self {
        Self::from_secs(hours * 3600)
    }

    /// Returns true for the zero ("unset") duration.
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub const fn as_std(&self) -> std::time::Duration {
        self.0
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self(value)
    }
}

impl From<Duration> for std::time::Duration {
    fn from(value: Duration) -> Self {
        value.0
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_nanos();

        if total == 0 {
            return write!(f, "0s");
        }

        if total < NANOS_PER_SEC {
            return if total % NANOS_PER_MILLI == 0 {
                write!(f, "{}ms", total / NANOS_PER_MILLI)
            } else if total % NANOS_PER_MICRO == 0 {
                write!(f, "{}us", total / NANOS_PER_MICRO)
            } else {
                write!(f, "{total}ns")
            };
        }

        let hours = total / NANOS_PER_HOUR;
        let minutes = (total % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
        let secs = (total % NANOS_PER_MINUTE) / NANOS_PER_SEC;
        let nanos = total % NANOS_PER_SEC;

        if hours > 0 {
            write!(f, "{hours}h{minutes}m")?;
        } else if minutes > 0 {
            write!(f, "{minutes}m")?;
        }

        if nanos == 0 {
            write!(f, "{secs}s")
        } else {
            let fraction = format!("{nanos:09}");
            write!(f, "{secs}.{}s", fraction.trim_end_matches('0'))
        }
    }
}

impl FromStr for Duration {
    type Err = TypeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse(input).map_err(|reason| TypeError::InvalidDuration {
            input: input.to_string(),
            reason,
        })
    }
}

/// Parses a sequence of `<number><unit>` groups.
fn parse(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("expected a number before {rest:?}"));
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let scale = match unit {
            "h" => NANOS_PER_HOUR,
            "m" => NANOS_PER_MINUTE,
            "s" => NANOS_PER_SEC,
            "ms" => NANOS_PER_MILLI,
            "us" | "µs" => NANOS_PER_MICRO,
            "ns" => 1,
            "" => return Err("missing unit".to_string()),
            other => return Err(format!("unknown unit {other:?}")),
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| format!("number {int_part:?} out of range"))?
        };

        let mut group = whole
            .checked_mul(scale)
            .ok_or_else(|| "duration out of range".to_string())?;

        if !frac_part.is_empty() {
            // Digits beyond nanosecond precision are dropped.
            let digits = &frac_part[..frac_part.len().min(9)];
            let numerator: u128 = digits
                .parse()
                .map_err(|_| format!("fraction {frac_part:?} out of range"))?;
            let denominator = 10u128.pow(u32::try_from(digits.len()).unwrap_or(9));
            group += numerator * scale / denominator;
        }

        total = total
            .checked_add(group)
            .ok_or_else(|| "duration out of range".to_string())?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| "duration out of range")?;
    let nanos = u32::try_from(total % NANOS_PER_SEC).map_err(|_| "duration out of range")?;
    Ok(Duration(std::time::Duration::new(secs, nanos)))
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration string such as \"20h\" or an integer number of nanoseconds")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
                Ok(Duration(std::time::Duration::from_nanos(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
                u64::try_from(v)
                    .map(|n| Duration(std::time::Duration::from_nanos(n)))
                    .map_err(|_| E::custom("negative durations are not supported"))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("20h", Duration::from_hours(20); "hours")]
    #[test_case("20h0m0s", Duration::from_hours(20); "canonical hours")]
    #[test_case("1h30m", Duration::from_mins(90); "hours and minutes")]
    #[test_case("90s", Duration::from_secs(90); "seconds")]
    #[test_case("1.5s", Duration::new(std::time::Duration::from_millis(1500)); "fractional seconds")]
    #[test_case("250ms", Duration::new(std::time::Duration::from_millis(250)); "millis")]
    #[test_case("7us", Duration::new(std::time::Duration::from_micros(7)); "micros")]
    #[test_case("0", Duration::ZERO; "bare zero")]
    fn test_parse(input: &str, expected: Duration) {
        assert_eq!(input.parse::<Duration>().unwrap(), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("20"; "missing unit")]
    #[test_case("20d"; "unknown unit")]
    #[test_case("h"; "missing number")]
    #[test_case("-5s"; "negative")]
    fn test_parse_rejects(input: &str) {
        assert!(input.parse::<Duration>().is_err());
    }

    #[test_case(Duration::ZERO, "0s")]
    #[test_case(Duration::from_hours(20), "20h0m0s")]
    #[test_case(Duration::from_secs(61), "1m1s")]
    #[test_case(Duration::new(std::time::Duration::from_millis(1500)), "1.5s")]
    #[test_case(Duration::new(std::time::Duration::from_millis(3)), "3ms")]
    #[test_case(Duration::new(std::time::Duration::from_nanos(42)), "42ns")]
    fn test_display(duration: Duration, expected: &str) {
        assert_eq!(duration.to_string(), expected);
    }

    #[test]
    fn test_json_accepts_string_and_nanos() {
        let from_str: Duration = serde_json::from_str("\"20h\"").unwrap();
        let from_num: Duration = serde_json::from_str("72000000000000").unwrap();
        assert_eq!(from_str, Duration::from_hours(20));
        assert_eq!(from_num, Duration::from_hours(20));
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"20h0m0s\"");
    }

    proptest::proptest! {
        #[test]
        fn prop_display_parses_back(secs in 0u64..10_000_000, nanos in 0u32..1_000_000_000) {
            let duration = Duration::new(std::time::Duration::new(secs, nanos));
            let parsed: Duration = duration.to_string().parse().unwrap();
            proptest::prop_assert_eq!(parsed, duration);
        }
    }
}
