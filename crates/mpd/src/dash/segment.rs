use chrono::{DateTime, TimeDelta, Utc};

use super::{template::UrlTemplate, timeline::TimelineElement};
use crate::util::{
    time::{scale_large_timestamp, MICROS_PER_SECOND},
    RangedUri,
};

pub const DEFAULT_START_NUMBER: u64 = 1;

/// How the segments of a representation are located, as resolved from `SegmentBase`,
/// `SegmentList` or `SegmentTemplate`.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentBase {
    Single(SingleSegmentBase),
    List(SegmentList),
    Template(SegmentTemplate),
}

impl SegmentBase {
    pub fn timescale(&self) -> u64 {
        match self {
            Self::Single(base) => base.timescale,
            Self::List(list) => list.base.timescale,
            Self::Template(template) => template.base.timescale,
        }
    }

    /// `@presentationTimeOffset` in timescale units.
    pub fn presentation_time_offset(&self) -> u64 {
        match self {
            Self::Single(base) => base.presentation_time_offset,
            Self::List(list) => list.base.presentation_time_offset,
            Self::Template(template) => template.base.presentation_time_offset,
        }
    }

    pub fn presentation_time_offset_us(&self) -> i64 {
        scale_large_timestamp(
            self.presentation_time_offset() as i64,
            MICROS_PER_SECOND,
            self.timescale().max(1) as i64,
        )
    }

    /// The initialization segment, substituting the initialization template if there is one.
    pub fn initialization(
        &self,
        representation_id: Option<&str>,
        bandwidth: Option<u64>,
    ) -> Option<RangedUri> {
        match self {
            Self::Single(base) => base.initialization.clone(),
            Self::List(list) => list.base.initialization.clone(),
            Self::Template(template) => match &template.initialization_template {
                Some(initialization) => Some(RangedUri::new(
                    Some(initialization.build(representation_id, 0, bandwidth, 0)),
                    0,
                    None,
                )),
                None => template.base.initialization.clone(),
            },
        }
    }
}

/// A representation stored in a single file, optionally with a `sidx` index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSegmentBase {
    pub initialization: Option<RangedUri>,
    pub timescale: u64,
    pub presentation_time_offset: u64,
    pub index_start: u64,
    pub index_length: u64,
}

impl Default for SingleSegmentBase {
    fn default() -> Self {
        Self {
            initialization: None,
            timescale: 1,
            presentation_time_offset: 0,
            index_start: 0,
            index_length: 0,
        }
    }
}

impl SingleSegmentBase {
    /// Byte range of the segment index, if `@indexRange` was declared.
    pub fn index(&self) -> Option<RangedUri> {
        (self.index_length > 0).then(|| RangedUri::new(None, self.index_start, Some(self.index_length)))
    }
}

/// State shared by [`SegmentList`] and [`SegmentTemplate`].
#[derive(Debug, Clone, PartialEq)]
pub struct MultiSegmentBase {
    pub initialization: Option<RangedUri>,
    pub timescale: u64,
    pub presentation_time_offset: u64,
    pub start_number: u64,
    /// Fixed segment duration in timescale units, when there is no timeline.
    pub duration: Option<u64>,
    pub timeline: Option<Vec<TimelineElement>>,
    /// `None` when unset or declared as `INF`, in both cases no adjustment is applied.
    pub availability_time_offset: Option<TimeDelta>,
    pub time_shift_buffer_depth: Option<TimeDelta>,
    /// Wall clock time of the period start, only known for dynamic manifests.
    pub period_start_unix_time: Option<DateTime<Utc>>,
}

impl MultiSegmentBase {
    pub(crate) fn segment_duration_us(&self) -> Option<i64> {
        self.duration
            .map(|duration| self.scale_to_us(duration.min(i64::MAX as u64) as i64))
            .filter(|duration_us| *duration_us > 0)
    }

    pub(crate) fn scale_to_us(&self, value: i64) -> i64 {
        scale_large_timestamp(value, MICROS_PER_SECOND, self.timescale.max(1) as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentList {
    pub base: MultiSegmentBase,
    pub media_segments: Vec<RangedUri>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTemplate {
    pub base: MultiSegmentBase,
    /// Last segment number, announced through the
    /// `http://dashif.org/guidelines/last-segment-number` supplemental property.
    pub end_number: Option<u64>,
    pub initialization_template: Option<UrlTemplate>,
    pub media_template: Option<UrlTemplate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment_index_range() {
        let base = SingleSegmentBase::default();
        assert!(base.index().is_none());

        let base = SingleSegmentBase {
            index_start: 800,
            index_length: 200,
            ..Default::default()
        };
        assert_eq!(base.index(), Some(RangedUri::new(None, 800, Some(200))));
    }

    #[test]
    fn test_template_initialization() {
        let template = SegmentBase::Template(SegmentTemplate {
            base: MultiSegmentBase {
                initialization: Some(RangedUri::new(Some("ignored.mp4".to_string()), 0, None)),
                timescale: 90_000,
                presentation_time_offset: 45_000,
                start_number: 1,
                duration: Some(180_000),
                timeline: None,
                availability_time_offset: None,
                time_shift_buffer_depth: None,
                period_start_unix_time: None,
            },
            end_number: None,
            initialization_template: Some(UrlTemplate::new("$RepresentationID$/init.mp4")),
            media_template: None,
        });

        let initialization = template.initialization(Some("v1"), Some(1000)).unwrap();
        assert_eq!(initialization.reference(), Some("v1/init.mp4"));
        assert_eq!(template.presentation_time_offset_us(), 500_000);
    }
}
