use std::{str::FromStr, sync::LazyLock};

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

use crate::{
    util::time::{parse_xs_date_time, parse_xs_duration, MICROS_PER_SECOND},
    xml::XmlElement,
    MpdError, MpdResult,
};

static FRAME_RATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:/(\d+))?$").unwrap());

/// Typed attribute accessors. A missing attribute is `None`, an unparsable one is an error.
pub(crate) trait AttributeExt {
    fn string(&self, name: &str) -> Option<String>;

    fn number<T: FromStr>(&self, name: &str) -> MpdResult<Option<T>>;

    fn duration(&self, name: &str) -> MpdResult<Option<TimeDelta>>;

    fn date_time(&self, name: &str) -> MpdResult<Option<DateTime<Utc>>>;

    fn frame_rate(&self) -> MpdResult<Option<f32>>;

    fn availability_time_offset(&self) -> MpdResult<Option<AvailabilityTimeOffset>>;
}

impl AttributeExt for XmlElement {
    fn string(&self, name: &str) -> Option<String> {
        self.attr(name).map(String::from)
    }

    fn number<T: FromStr>(&self, name: &str) -> MpdResult<Option<T>> {
        self.attr(name)
            .map(|value| {
                value
                    .trim()
                    .parse()
                    .map_err(|_| MpdError::invalid_attribute(name, value))
            })
            .transpose()
    }

    fn duration(&self, name: &str) -> MpdResult<Option<TimeDelta>> {
        self.attr(name).map(parse_xs_duration).transpose()
    }

    fn date_time(&self, name: &str) -> MpdResult<Option<DateTime<Utc>>> {
        self.attr(name).map(parse_xs_date_time).transpose()
    }

    /// `@frameRate`, either an integer or a `30000/1001` fraction.
    fn frame_rate(&self) -> MpdResult<Option<f32>> {
        let Some(value) = self.attr("frameRate") else {
            return Ok(None);
        };
        let invalid = || MpdError::invalid_attribute("frameRate", value);

        let caps = FRAME_RATE_REGEX.captures(value.trim()).ok_or_else(invalid)?;
        let numerator: f32 = caps[1].parse().map_err(|_| invalid())?;
        match caps.get(2) {
            Some(denominator) => {
                let denominator: f32 = denominator.as_str().parse().map_err(|_| invalid())?;
                if denominator == 0.0 {
                    return Err(invalid());
                }
                Ok(Some(numerator / denominator))
            }
            None => Ok(Some(numerator)),
        }
    }

    fn availability_time_offset(&self) -> MpdResult<Option<AvailabilityTimeOffset>> {
        let Some(value) = self.attr("availabilityTimeOffset") else {
            return Ok(None);
        };
        if value.trim() == "INF" {
            return Ok(Some(AvailabilityTimeOffset::Infinite));
        }

        let invalid = || MpdError::invalid_attribute("availabilityTimeOffset", value);
        let seconds: f64 = value.trim().parse().map_err(|_| invalid())?;
        if !seconds.is_finite() {
            return Err(invalid());
        }
        Ok(Some(AvailabilityTimeOffset::Offset(TimeDelta::microseconds(
            (seconds * MICROS_PER_SECOND as f64) as i64,
        ))))
    }
}

/// `@availabilityTimeOffset` as declared on a `BaseURL` or segment element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AvailabilityTimeOffset {
    /// `INF`, every segment is available as soon as the period starts.
    Infinite,
    Offset(TimeDelta),
}

impl AvailabilityTimeOffset {
    /// The offset applied to segment availability. The segment element value takes precedence
    /// over the `BaseURL` one, and `INF` applies no adjustment at all.
    pub(crate) fn resolve(
        base_url: Option<AvailabilityTimeOffset>,
        segment: Option<AvailabilityTimeOffset>,
    ) -> Option<TimeDelta> {
        match segment.or(base_url) {
            Some(Self::Offset(offset)) => Some(offset),
            Some(Self::Infinite) | None => None,
        }
    }
}
