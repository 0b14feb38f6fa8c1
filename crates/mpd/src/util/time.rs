use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use regex::Regex;

use crate::{MpdError, MpdResult};

pub const MICROS_PER_SECOND: i64 = 1_000_000;

static XS_DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-)?P(([0-9]*)Y)?(([0-9]*)M)?(([0-9]*)D)?(T(([0-9]*)H)?(([0-9]*)M)?(([0-9.]*)S)?)?$",
    )
    .unwrap()
});

static XS_DATE_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d\d\d\d)-(\d\d)-(\d\d)[Tt](\d\d):(\d\d):(\d\d)([\.,](\d+))?([Zz]|((\+|-)(\d?\d):?(\d\d)))?$",
    )
    .unwrap()
});

/// Parses an `xs:duration` value with millisecond precision.
///
/// Years and months use the average Gregorian lengths. A bare number is read as hours.
pub fn parse_xs_duration(value: &str) -> MpdResult<TimeDelta> {
    let invalid = || MpdError::InvalidDuration(value.to_string());

    let Some(caps) = XS_DURATION_REGEX.captures(value) else {
        let hours: f64 = value.trim().parse().map_err(|_| invalid())?;
        return milliseconds_to_delta(hours * 3600.0 * 1000.0).ok_or_else(invalid);
    };

    let component = |index: usize, unit_seconds: f64| -> MpdResult<f64> {
        match caps.get(index).map(|m| m.as_str()) {
            Some(digits) if !digits.is_empty() => digits
                .parse::<f64>()
                .map(|v| v * unit_seconds)
                .map_err(|_| invalid()),
            _ => Ok(0.0),
        }
    };

    let seconds = component(3, 31_556_908.0)?
        + component(5, 2_629_739.0)?
        + component(7, 86_400.0)?
        + component(10, 3600.0)?
        + component(12, 60.0)?
        + component(14, 1.0)?;

    let milliseconds = seconds * 1000.0;
    milliseconds_to_delta(if caps.get(1).is_some() {
        -milliseconds
    } else {
        milliseconds
    })
    .ok_or_else(invalid)
}

/// `None` for values outside the range of [`TimeDelta`], including infinities and NaN.
fn milliseconds_to_delta(milliseconds: f64) -> Option<TimeDelta> {
    if !milliseconds.is_finite() || milliseconds.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(milliseconds as i64)
}

/// Parses an `xs:dateTime` value. A value without a timezone is read as UTC.
pub fn parse_xs_date_time(value: &str) -> MpdResult<DateTime<Utc>> {
    let invalid = || MpdError::InvalidDateTime(value.to_string());

    let caps = XS_DATE_TIME_REGEX.captures(value).ok_or_else(invalid)?;
    let number = |index: usize| -> MpdResult<u32> {
        caps.get(index)
            .ok_or_else(invalid)?
            .as_str()
            .parse()
            .map_err(|_| invalid())
    };

    let (hour, minute, second) = (number(4)?, number(5)?, number(6)?);
    let naive = NaiveDate::from_ymd_opt(number(1)? as i32, number(2)?, number(3)?)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(invalid)?;
    let mut date_time = Utc.from_utc_datetime(&naive);

    if let Some(fraction) = caps.get(8) {
        // Only millisecond precision is kept, the remaining digits are truncated.
        let millis = format!("{:0<3}", fraction.as_str());
        let millis: i64 = millis[..3].parse().map_err(|_| invalid())?;
        date_time += TimeDelta::milliseconds(millis);
    }

    if let Some(sign) = caps.get(11) {
        let offset_minutes = number(12)? as i64 * 60 + number(13)? as i64;
        let offset = TimeDelta::minutes(offset_minutes);
        date_time = if sign.as_str() == "-" {
            date_time + offset
        } else {
            date_time - offset
        };
    }

    Ok(date_time)
}

/// Computes `timestamp * multiplier / divisor`, rounding towards negative infinity.
pub fn scale_large_timestamp(timestamp: i64, multiplier: i64, divisor: i64) -> i64 {
    let scaled = (timestamp as i128 * multiplier as i128).div_euclid(divisor as i128);
    scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Computes `ceil(numerator / denominator)` for a positive denominator.
pub fn ceil_divide(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator.div_euclid(denominator);
    if numerator.rem_euclid(denominator) == 0 {
        quotient
    } else {
        quotient + 1
    }
}

pub(crate) trait TimeDeltaExt {
    fn as_micros(&self) -> i64;
}

impl TimeDeltaExt for TimeDelta {
    fn as_micros(&self) -> i64 {
        self.num_microseconds().unwrap_or(if *self < TimeDelta::zero() {
            i64::MIN
        } else {
            i64::MAX
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xs_duration() {
        assert_eq!(
            parse_xs_duration("PT150.279S").unwrap(),
            TimeDelta::milliseconds(150_279)
        );
        assert_eq!(
            parse_xs_duration("PT1H30M").unwrap(),
            TimeDelta::minutes(90)
        );
        assert_eq!(parse_xs_duration("P1D").unwrap(), TimeDelta::days(1));
        assert_eq!(
            parse_xs_duration("-PT2S").unwrap(),
            TimeDelta::seconds(-2)
        );
        assert_eq!(parse_xs_duration("PT0S").unwrap(), TimeDelta::zero());
        assert_eq!(
            parse_xs_duration("P1Y").unwrap(),
            TimeDelta::seconds(31_556_908)
        );
        // bare numbers are hours
        assert_eq!(parse_xs_duration("1.5").unwrap(), TimeDelta::minutes(90));

        assert!(parse_xs_duration("PTxS").is_err());
        assert!(parse_xs_duration("P1.2.3S").is_err());
    }

    #[test]
    fn test_parse_xs_duration_out_of_range() {
        for value in ["-inf", "inf", "NaN", "-1e300", "1e300", "P99999999999999999999Y"] {
            assert!(
                matches!(parse_xs_duration(value), Err(MpdError::InvalidDuration(v)) if v == value),
                "{value} should be rejected"
            );
        }
        // still representable
        assert_eq!(
            parse_xs_duration("P300000Y").unwrap(),
            TimeDelta::seconds(300_000 * 31_556_908)
        );
    }

    #[test]
    fn test_parse_xs_date_time() {
        let expected = Utc.with_ymd_and_hms(2014, 6, 19, 23, 7, 42).unwrap();
        assert_eq!(parse_xs_date_time("2014-06-19T23:07:42").unwrap(), expected);
        assert_eq!(parse_xs_date_time("2014-06-19T23:07:42Z").unwrap(), expected);
        assert_eq!(
            parse_xs_date_time("2014-06-20T01:07:42+02:00").unwrap(),
            expected
        );
        assert_eq!(
            parse_xs_date_time("2014-06-19T20:07:42-0300").unwrap(),
            expected
        );
        assert_eq!(
            parse_xs_date_time("2014-06-19T23:07:42.1234Z").unwrap(),
            expected + TimeDelta::milliseconds(123)
        );
        assert_eq!(
            parse_xs_date_time("1970-01-01T00:00:00Z").unwrap(),
            DateTime::<Utc>::UNIX_EPOCH
        );

        assert!(parse_xs_date_time("2014-06-19").is_err());
        assert!(parse_xs_date_time("2014-13-19T23:07:42Z").is_err());
    }

    #[test]
    fn test_scale_large_timestamp() {
        assert_eq!(scale_large_timestamp(90_000, MICROS_PER_SECOND, 90_000), 1_000_000);
        assert_eq!(scale_large_timestamp(1, MICROS_PER_SECOND, 3), 333_333);
        assert_eq!(scale_large_timestamp(-1, MICROS_PER_SECOND, 3), -333_334);
        assert_eq!(scale_large_timestamp(i64::MAX, 2, 1), i64::MAX);
    }

    #[test]
    fn test_ceil_divide() {
        assert_eq!(ceil_divide(10, 5), 2);
        assert_eq!(ceil_divide(11, 5), 3);
        assert_eq!(ceil_divide(0, 5), 0);
        assert_eq!(ceil_divide(-1, 5), 0);
    }
}
