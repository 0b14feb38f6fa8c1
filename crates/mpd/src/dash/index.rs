//! Segment addressing over the resolved segment bases.
//!
//! A [`SegmentIndex`] maps between segment numbers, media time and urls, and locates the live
//! availability window for dynamic presentations:
//!
//! - A segment is complete once its end time is not after `now - periodStart +
//!   availabilityTimeOffset`.
//! - With a time shift buffer, segments ending before `now - periodStart - timeShiftBufferDepth`
//!   are no longer available.
//!
//! Times passed to and returned from the index are relative to the period start.

use chrono::{DateTime, TimeDelta, Utc};

use super::segment::{MultiSegmentBase, SegmentList, SegmentTemplate};
use crate::util::{
    time::{ceil_divide, TimeDeltaExt, MICROS_PER_SECOND},
    RangedUri,
};

#[derive(Debug, Clone, Copy)]
pub enum SegmentIndex<'a> {
    /// The whole representation is one segment.
    Single(&'a RangedUri),
    List(&'a SegmentList),
    Template {
        template: &'a SegmentTemplate,
        representation_id: Option<&'a str>,
        bandwidth: Option<u64>,
    },
}

impl<'a> SegmentIndex<'a> {
    fn base(&self) -> Option<&'a MultiSegmentBase> {
        match self {
            Self::Single(_) => None,
            Self::List(list) => Some(&list.base),
            Self::Template { template, .. } => Some(&template.base),
        }
    }

    pub fn first_segment_num(&self) -> u64 {
        self.base().map(|base| base.start_number).unwrap_or(0)
    }

    /// Number of segments in the period, `None` when the index is unbounded.
    pub fn segment_count(&self, period_duration: Option<TimeDelta>) -> Option<u64> {
        match self {
            Self::Single(_) => Some(1),
            Self::List(list) => Some(list.media_segments.len() as u64),
            Self::Template { template, .. } => {
                let base = &template.base;
                if let Some(timeline) = &base.timeline {
                    Some(timeline.len() as u64)
                } else if let Some(end_number) = template.end_number {
                    Some(end_number.saturating_add(1).saturating_sub(base.start_number))
                } else {
                    let duration = base.duration.filter(|d| *d > 0)?;
                    let period_duration_us = period_duration?.as_micros() as i128;
                    let count = ceil_divide(
                        period_duration_us * base.timescale as i128,
                        duration as i128 * MICROS_PER_SECOND as i128,
                    );
                    Some(count.clamp(0, u64::MAX as i128) as u64)
                }
            }
        }
    }

    /// Whether the segments are explicitly listed in the manifest, rather than generated.
    pub fn is_explicit(&self) -> bool {
        match self {
            Self::Single(_) | Self::List(_) => true,
            Self::Template { template, .. } => template.base.timeline.is_some(),
        }
    }

    /// Start time of a segment.
    pub fn time(&self, segment_num: u64) -> TimeDelta {
        let Some(base) = self.base() else {
            return TimeDelta::zero();
        };

        let index = segment_num as i128 - base.start_number as i128;
        let unscaled = match &base.timeline {
            Some(timeline) => {
                timeline_start(timeline, index).saturating_sub(base.presentation_time_offset as i128)
            }
            None => index.saturating_mul(base.duration.unwrap_or(0) as i128),
        };
        TimeDelta::microseconds(base.scale_to_us(clamp_i64(unscaled)))
    }

    /// Duration of a segment. The last generated segment is cut at the end of the period.
    pub fn duration(&self, segment_num: u64, period_duration: Option<TimeDelta>) -> TimeDelta {
        let Some(base) = self.base() else {
            return period_duration.unwrap_or_else(TimeDelta::zero);
        };

        if let Some(timeline) = &base.timeline {
            let index = segment_num.saturating_sub(base.start_number) as usize;
            let duration = timeline
                .get(index)
                .or(timeline.last())
                .map(|element| element.duration)
                .unwrap_or(0);
            return TimeDelta::microseconds(base.scale_to_us(duration as i64));
        }

        let is_last = self.segment_count(period_duration).is_some_and(|count| {
            count > 0 && segment_num == last_segment_num(self.first_segment_num(), count)
        });
        let remaining = |period_duration: TimeDelta| {
            period_duration
                .checked_sub(&self.time(segment_num))
                .unwrap_or_else(TimeDelta::zero)
        };
        match (base.segment_duration_us(), period_duration) {
            (Some(_), Some(period_duration)) if is_last => remaining(period_duration),
            (Some(duration_us), _) => TimeDelta::microseconds(duration_us),
            (None, Some(period_duration)) => remaining(period_duration),
            (None, None) => TimeDelta::zero(),
        }
    }

    /// The segment containing `time`, clamped to the segments of the index.
    pub fn segment_num(&self, time: TimeDelta, period_duration: Option<TimeDelta>) -> u64 {
        let first = self.first_segment_num();
        let count = self.segment_count(period_duration);
        if count == Some(0) {
            return first;
        }
        let Some(base) = self.base() else {
            return first;
        };

        match (&base.timeline, count) {
            (Some(timeline), Some(count)) => {
                let count = count.min(timeline.len() as u64);
                if count == 0 {
                    return first;
                }
                self.search_timeline(time, first, last_segment_num(first, count))
            }
            _ => {
                let Some(duration_us) = base.segment_duration_us() else {
                    return first;
                };
                let segment_num =
                    base.start_number as i128 + time.as_micros() as i128 / duration_us as i128;
                if segment_num < first as i128 {
                    return first;
                }
                let segment_num = segment_num.min(u64::MAX as i128) as u64;
                match count {
                    Some(count) => segment_num.min(last_segment_num(first, count)),
                    None => segment_num,
                }
            }
        }
    }

    fn search_timeline(&self, time: TimeDelta, first: u64, last: u64) -> u64 {
        let mut low = first as i128;
        let mut high = last as i128;
        while low <= high {
            let middle = low + (high - low) / 2;
            let middle_time = self.time(middle as u64);
            if middle_time < time {
                low = middle + 1;
            } else if middle_time > time {
                high = middle - 1;
            } else {
                return middle as u64;
            }
        }
        if low == first as i128 {
            first
        } else {
            high as u64
        }
    }

    /// Url of a segment, relative to the representation base url.
    pub fn segment_url(&self, segment_num: u64) -> Option<RangedUri> {
        match self {
            Self::Single(uri) => (segment_num == 0).then(|| (*uri).clone()),
            Self::List(list) => {
                let index = segment_num.checked_sub(list.base.start_number)?;
                list.media_segments.get(index as usize).cloned()
            }
            Self::Template {
                template,
                representation_id,
                bandwidth,
            } => {
                let base = &template.base;
                let index = segment_num.checked_sub(base.start_number)?;
                let time = match &base.timeline {
                    Some(timeline) => timeline.get(usize::try_from(index).ok()?)?.start_time,
                    None => index.checked_mul(base.duration.unwrap_or(0))?,
                };
                let url = template
                    .media_template
                    .as_ref()?
                    .build(*representation_id, segment_num, *bandwidth, time);
                Some(RangedUri::new(Some(url), 0, None))
            }
        }
    }

    /// First segment still inside the time shift buffer at `now`.
    pub fn first_available_segment_num(
        &self,
        period_duration: Option<TimeDelta>,
        now: DateTime<Utc>,
    ) -> u64 {
        let first = self.first_segment_num();
        let Some(base) = self.base() else {
            return first;
        };
        if self.segment_count(period_duration).is_some() {
            return first;
        }
        let (Some(depth), Some(period_start)) =
            (base.time_shift_buffer_depth, base.period_start_unix_time)
        else {
            return first;
        };

        let live_edge = now - period_start;
        let window_start = live_edge.checked_sub(&depth).unwrap_or(TimeDelta::MIN);
        first.max(self.segment_num(window_start, period_duration))
    }

    /// Number of complete segments available at `now`, starting from
    /// [`Self::first_available_segment_num`].
    pub fn available_segment_count(
        &self,
        period_duration: Option<TimeDelta>,
        now: DateTime<Utc>,
    ) -> u64 {
        if let Some(count) = self.segment_count(period_duration) {
            return count;
        }
        let Some(base) = self.base() else {
            return 0;
        };
        let Some(period_start) = base.period_start_unix_time else {
            tracing::debug!("Unbounded segment index without a period start time");
            return 0;
        };

        let live_edge = now - period_start;
        let availability_time_offset = base.availability_time_offset.unwrap_or_else(TimeDelta::zero);
        let available_until = live_edge
            .checked_add(&availability_time_offset)
            .unwrap_or(TimeDelta::MAX);
        let first_incomplete = self.segment_num(available_until, period_duration);
        first_incomplete.saturating_sub(self.first_available_segment_num(period_duration, now))
    }

    /// Wall clock time at which the segment after the last available one becomes available.
    ///
    /// `None` for static presentations and for indexes whose segments are all known.
    pub fn next_segment_available_time(
        &self,
        period_duration: Option<TimeDelta>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if self.is_explicit() {
            return None;
        }
        let base = self.base()?;
        let period_start = base.period_start_unix_time?;

        let first_incomplete = self
            .first_available_segment_num(period_duration, now)
            .saturating_add(self.available_segment_count(period_duration, now));
        if let Some(count) = self.segment_count(period_duration) {
            if first_incomplete >= self.first_segment_num().saturating_add(count) {
                return None;
            }
        }

        let end = self
            .time(first_incomplete)
            .checked_add(&self.duration(first_incomplete, period_duration))?;
        let availability_time_offset = base.availability_time_offset.unwrap_or_else(TimeDelta::zero);
        period_start
            .checked_add_signed(end)?
            .checked_sub_signed(availability_time_offset)
    }
}

fn timeline_start(timeline: &[super::timeline::TimelineElement], index: i128) -> i128 {
    let Some(last) = timeline.last() else {
        return 0;
    };
    match usize::try_from(index).ok().and_then(|i| timeline.get(i)) {
        Some(element) => element.start_time as i128,
        // extrapolated with the last duration
        None if index < 0 => {
            timeline[0].start_time as i128 + index.saturating_mul(timeline[0].duration as i128)
        }
        None => (last.end_time() as i128)
            .saturating_add((index - timeline.len() as i128).saturating_mul(last.duration as i128)),
    }
}

/// Number of the last of `count` segments starting at `first`, for a non-zero `count`.
fn last_segment_num(first: u64, count: u64) -> u64 {
    first.saturating_add(count - 1)
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dash::{
        segment::SegmentTemplate, template::UrlTemplate, timeline::TimelineElement,
    };

    fn fixed_template(duration: u64, timescale: u64) -> SegmentTemplate {
        SegmentTemplate {
            base: MultiSegmentBase {
                initialization: None,
                timescale,
                presentation_time_offset: 0,
                start_number: 1,
                duration: Some(duration),
                timeline: None,
                availability_time_offset: None,
                time_shift_buffer_depth: None,
                period_start_unix_time: None,
            },
            end_number: None,
            initialization_template: None,
            media_template: Some(UrlTemplate::new("seg-$Number$-$Time$.m4s")),
        }
    }

    fn index(template: &SegmentTemplate) -> SegmentIndex<'_> {
        SegmentIndex::Template {
            template,
            representation_id: Some("v"),
            bandwidth: None,
        }
    }

    #[test]
    fn test_fixed_duration_arithmetic() {
        let template = fixed_template(180_000, 90_000);
        let index = index(&template);
        let period = Some(TimeDelta::seconds(9));

        assert_eq!(index.first_segment_num(), 1);
        assert_eq!(index.segment_count(period), Some(5));
        assert_eq!(index.segment_count(None), None);
        assert_eq!(index.time(3), TimeDelta::seconds(4));
        assert_eq!(index.duration(3, period), TimeDelta::seconds(2));
        // last segment is cut at the period end
        assert_eq!(index.duration(5, period), TimeDelta::seconds(1));
        assert!(!index.is_explicit());

        assert_eq!(index.segment_num(TimeDelta::milliseconds(4500), period), 3);
        assert_eq!(index.segment_num(TimeDelta::seconds(-10), period), 1);
        assert_eq!(index.segment_num(TimeDelta::seconds(100), period), 5);
        assert_eq!(index.segment_num(TimeDelta::seconds(100), None), 51);

        assert_eq!(
            index.segment_url(3).unwrap().reference(),
            Some("seg-3-360000.m4s")
        );
        assert!(index.segment_url(0).is_none());
    }

    #[test]
    fn test_segment_num_round_trip() {
        for (duration, timescale) in [(180_000, 90_000), (1001, 30_000), (4, 1), (1, 3)] {
            let template = fixed_template(duration, timescale);
            let index = index(&template);
            for n in 1..500 {
                assert_eq!(index.segment_num(index.time(n), None), n);
            }
        }
    }

    #[test]
    fn test_timeline_arithmetic() {
        let mut template = fixed_template(0, 1000);
        template.base.duration = None;
        template.base.presentation_time_offset = 1000;
        template.base.timeline = Some(vec![
            TimelineElement { start_time: 1000, duration: 2000 },
            TimelineElement { start_time: 3000, duration: 2000 },
            TimelineElement { start_time: 5000, duration: 1000 },
        ]);
        let index = index(&template);

        assert!(index.is_explicit());
        assert_eq!(index.segment_count(None), Some(3));
        assert_eq!(index.time(1), TimeDelta::zero());
        assert_eq!(index.time(3), TimeDelta::seconds(4));
        assert_eq!(index.duration(3, None), TimeDelta::seconds(1));

        assert_eq!(index.segment_num(TimeDelta::zero(), None), 1);
        assert_eq!(index.segment_num(TimeDelta::seconds(2), None), 2);
        assert_eq!(index.segment_num(TimeDelta::milliseconds(3500), None), 2);
        assert_eq!(index.segment_num(TimeDelta::seconds(-1), None), 1);
        assert_eq!(index.segment_num(TimeDelta::seconds(60), None), 3);

        assert_eq!(
            index.segment_url(2).unwrap().reference(),
            Some("seg-2-3000.m4s")
        );
        assert!(index.segment_url(4).is_none());
    }

    #[test]
    fn test_live_window() {
        let mut template = fixed_template(2, 1);
        template.base.time_shift_buffer_depth = Some(TimeDelta::seconds(30));
        template.base.period_start_unix_time = Some(DateTime::<Utc>::UNIX_EPOCH);
        let index = index(&template);
        let now = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(100);

        let first = index.first_available_segment_num(None, now);
        assert!(index.time(first) >= TimeDelta::seconds(70));
        assert_eq!(index.time(first), TimeDelta::seconds(70));
        // segments [70, 100) are complete
        assert_eq!(index.available_segment_count(None, now), 15);
        assert_eq!(
            index.next_segment_available_time(None, now),
            Some(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(102))
        );

        template.base.availability_time_offset = Some(TimeDelta::seconds(3));
        let index = SegmentIndex::Template {
            template: &template,
            representation_id: None,
            bandwidth: None,
        };
        assert_eq!(index.first_available_segment_num(None, now), first);
        // [100, 102) is complete by 103
        assert_eq!(index.available_segment_count(None, now), 16);
        assert_eq!(
            index.next_segment_available_time(None, now),
            Some(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(101))
        );
    }

    #[test]
    fn test_live_window_before_period_start() {
        let mut template = fixed_template(2, 1);
        template.base.time_shift_buffer_depth = Some(TimeDelta::seconds(30));
        template.base.period_start_unix_time = Some(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(50));
        let index = index(&template);
        let now = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(10);

        assert_eq!(index.first_available_segment_num(None, now), 1);
        assert_eq!(index.available_segment_count(None, now), 0);
    }

    #[test]
    fn test_bounded_index_ignores_live_window() {
        let mut template = fixed_template(2, 1);
        template.base.time_shift_buffer_depth = Some(TimeDelta::seconds(30));
        template.base.period_start_unix_time = Some(DateTime::<Utc>::UNIX_EPOCH);
        template.end_number = Some(10);
        let index = index(&template);
        let now = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(100);

        assert_eq!(index.segment_count(None), Some(10));
        assert_eq!(index.first_available_segment_num(None, now), 1);
        assert_eq!(index.available_segment_count(None, now), 10);
        assert_eq!(index.next_segment_available_time(None, now), None);
    }

    #[test]
    fn test_single_segment() {
        let uri = RangedUri::new(None, 0, None);
        let index = SegmentIndex::Single(&uri);
        let period = Some(TimeDelta::seconds(30));

        assert_eq!(index.first_segment_num(), 0);
        assert_eq!(index.segment_count(period), Some(1));
        assert_eq!(index.segment_num(TimeDelta::seconds(12), period), 0);
        assert_eq!(index.time(0), TimeDelta::zero());
        assert_eq!(index.duration(0, period), TimeDelta::seconds(30));
        assert_eq!(index.segment_url(0), Some(uri.clone()));
        assert!(index.is_explicit());
        assert_eq!(index.next_segment_available_time(period, DateTime::<Utc>::UNIX_EPOCH), None);
    }

    #[test]
    fn test_last_segment_number_at_upper_bound() {
        let mut template = fixed_template(2, 1);
        template.end_number = Some(u64::MAX);
        let index = index(&template);

        assert_eq!(index.segment_count(None), Some(u64::MAX - 1));
        assert_eq!(index.segment_num(TimeDelta::MAX, None), 4_611_686_018_428);
        assert_eq!(index.duration(u64::MAX - 1, None), TimeDelta::seconds(2));
        // $Time$ no longer fits
        assert!(index.segment_url(u64::MAX - 1).is_none());
    }

    #[test]
    fn test_live_window_at_time_range_limits() {
        let mut template = fixed_template(2, 1);
        template.base.time_shift_buffer_depth = Some(TimeDelta::MAX);
        template.base.period_start_unix_time = Some(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(100));
        let index = index(&template);
        let now = DateTime::<Utc>::UNIX_EPOCH;

        assert_eq!(index.first_available_segment_num(None, now), 1);
        assert_eq!(index.available_segment_count(None, now), 0);
        assert_eq!(
            index.next_segment_available_time(None, now),
            Some(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(102))
        );

        let mut template = fixed_template(2, 1);
        template.base.time_shift_buffer_depth = Some(TimeDelta::seconds(30));
        template.base.period_start_unix_time = Some(DateTime::<Utc>::UNIX_EPOCH);
        template.base.availability_time_offset = Some(TimeDelta::MAX);
        let index = self::index(&template);
        let now = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(100);

        assert_eq!(index.first_available_segment_num(None, now), 36);
        assert_eq!(index.available_segment_count(None, now), 4_611_686_018_428 - 36);
        // past the last representable date
        assert_eq!(index.next_segment_available_time(None, now), None);
    }

    #[test]
    fn test_sub_microsecond_segments() {
        let template = fixed_template(1, 10_000_000);
        let index = index(&template);
        assert_eq!(index.segment_num(TimeDelta::seconds(1), None), 1);
        assert_eq!(index.segment_count(Some(TimeDelta::seconds(1))), Some(10_000_000));
    }
}
