//! The resolved presentation: every inherited attribute has been pushed down to the
//! representations, and base urls are absolute.

pub mod descriptor;
pub mod format;
pub mod protection;
pub mod pssh;

use chrono::{DateTime, TimeDelta, Utc};
use url::Url;

pub use descriptor::Descriptor;
pub use format::{Format, Label, TrackType};
pub use protection::{DrmInitData, SchemeData};

use crate::{
    dash::{segment::SingleSegmentBase, BaseUrl, SegmentIndex, SegmentList, SegmentTemplate},
    util::RangedUri,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub availability_start_time: Option<DateTime<Utc>>,
    /// `None` for an unbounded live presentation.
    pub duration: Option<TimeDelta>,
    pub min_buffer_time: Option<TimeDelta>,
    /// `MPD@type="dynamic"`
    pub dynamic: bool,
    pub min_update_period: Option<TimeDelta>,
    pub time_shift_buffer_depth: Option<TimeDelta>,
    pub suggested_presentation_delay: Option<TimeDelta>,
    pub publish_time: Option<DateTime<Utc>>,
    pub program_information: Option<ProgramInformation>,
    pub utc_timing: Option<UtcTiming>,
    pub service_description: Option<ServiceDescription>,
    /// `Location`, the url to refresh a dynamic manifest from.
    pub location: Option<Url>,
    pub periods: Vec<Period>,
}

impl Manifest {
    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    pub fn period(&self, index: usize) -> Option<&Period> {
        self.periods.get(index)
    }

    /// Duration of the period at `index`, bounded by the next period or the end of the
    /// presentation.
    pub fn period_duration(&self, index: usize) -> Option<TimeDelta> {
        let period = self.periods.get(index)?;
        match self.periods.get(index + 1) {
            Some(next) => next.start.checked_sub(&period.start),
            None => self.duration?.checked_sub(&period.start),
        }
    }

    /// Wall clock time at which the period at `index` starts, only known for live manifests.
    pub fn period_start_unix_time(&self, index: usize) -> Option<DateTime<Utc>> {
        let period = self.periods.get(index)?;
        self.availability_start_time?.checked_add_signed(period.start)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub id: Option<String>,
    /// Offset from the start of the presentation.
    pub start: TimeDelta,
    pub adaptation_sets: Vec<AdaptationSet>,
    pub event_streams: Vec<EventStream>,
    pub asset_identifier: Option<Descriptor>,
}

impl Period {
    pub fn adaptation_set_index(&self, track_type: TrackType) -> Option<usize> {
        self.adaptation_sets
            .iter()
            .position(|adaptation_set| adaptation_set.track_type == track_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationSet {
    pub id: Option<i64>,
    pub track_type: TrackType,
    pub representations: Vec<Representation>,
    pub roles: Vec<Descriptor>,
    pub accessibility: Vec<Descriptor>,
    pub essential_properties: Vec<Descriptor>,
    pub supplemental_properties: Vec<Descriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    /// Revision of the manifest this representation was read from.
    pub revision_id: u64,
    pub format: Format,
    /// Candidates in manifest order, never empty.
    pub base_urls: Vec<BaseUrl>,
    pub inband_event_streams: Vec<Descriptor>,
    pub essential_properties: Vec<Descriptor>,
    pub supplemental_properties: Vec<Descriptor>,
    pub presentation_time_offset_us: i64,
    pub initialization: Option<RangedUri>,
    pub kind: RepresentationKind,
}

/// How the media of a representation is split.
#[derive(Debug, Clone, PartialEq)]
pub enum RepresentationKind {
    /// One file, addressed with byte ranges.
    Single {
        segment_base: SingleSegmentBase,
        /// The `sidx` box, when `@indexRange` is declared.
        index_uri: Option<RangedUri>,
        /// The whole file as a single segment, only when there is no `sidx` to read.
        segment: Option<RangedUri>,
    },
    List(SegmentList),
    Template(SegmentTemplate),
}

impl Representation {
    pub fn id(&self) -> Option<&str> {
        self.format.id.as_deref()
    }

    /// The first base url candidate.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_urls.first().map(|base_url| &base_url.url)
    }

    pub fn is_multi_segment(&self) -> bool {
        !matches!(self.kind, RepresentationKind::Single { .. })
    }

    /// The `sidx` box to load before segments can be addressed.
    pub fn index_uri(&self) -> Option<&RangedUri> {
        match &self.kind {
            RepresentationKind::Single { index_uri, .. } => index_uri.as_ref(),
            _ => None,
        }
    }

    /// The initialization data and the `sidx` box as a single range, when they are adjacent in
    /// the same resource and can be loaded with one request.
    pub fn header_uri(&self) -> Option<RangedUri> {
        let initialization = self.initialization.as_ref()?;
        initialization.attempt_merge(self.index_uri()?, self.base_url()?)
    }

    /// The segment index, `None` when it must first be read from the `sidx` box.
    pub fn index(&self) -> Option<SegmentIndex<'_>> {
        match &self.kind {
            RepresentationKind::Single { segment, .. } => segment.as_ref().map(SegmentIndex::Single),
            RepresentationKind::List(list) => Some(SegmentIndex::List(list)),
            RepresentationKind::Template(template) => Some(SegmentIndex::Template {
                template,
                representation_id: self.format.id.as_deref(),
                bandwidth: self.format.bitrate,
            }),
        }
    }

    /// Absolute url and byte range of a segment, resolved against the first base url.
    pub fn segment_url(&self, segment_num: u64) -> Option<(Url, Option<String>)> {
        let segment = self.index()?.segment_url(segment_num)?;
        let url = segment.resolve(self.base_url()?).ok()?;
        Some((url, segment.to_http_range()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStream {
    pub scheme_id_uri: String,
    pub value: String,
    pub timescale: u64,
    pub events: Vec<EventMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub id: i64,
    /// Relative to the period start.
    pub presentation_time_us: i64,
    pub duration_ms: Option<i64>,
    pub message_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInformation {
    pub title: Option<String>,
    pub source: Option<String>,
    pub copyright: Option<String>,
    pub more_information_url: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtcTiming {
    pub scheme_id_uri: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDescription {
    pub target_offset_ms: Option<i64>,
    pub min_offset_ms: Option<i64>,
    pub max_offset_ms: Option<i64>,
    pub min_playback_speed: Option<f32>,
    pub max_playback_speed: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(start_seconds: i64) -> Period {
        Period {
            id: None,
            start: TimeDelta::seconds(start_seconds),
            adaptation_sets: Vec::new(),
            event_streams: Vec::new(),
            asset_identifier: None,
        }
    }

    fn manifest(duration: Option<TimeDelta>, periods: Vec<Period>) -> Manifest {
        Manifest {
            availability_start_time: None,
            duration,
            min_buffer_time: None,
            dynamic: false,
            min_update_period: None,
            time_shift_buffer_depth: None,
            suggested_presentation_delay: None,
            publish_time: None,
            program_information: None,
            utc_timing: None,
            service_description: None,
            location: None,
            periods,
        }
    }

    #[test]
    fn test_period_duration() {
        let manifest = manifest(Some(TimeDelta::seconds(100)), vec![period(0), period(30)]);
        assert_eq!(manifest.period_duration(0), Some(TimeDelta::seconds(30)));
        assert_eq!(manifest.period_duration(1), Some(TimeDelta::seconds(70)));
        assert_eq!(manifest.period_duration(2), None);
    }

    #[test]
    fn test_unbounded_period_duration() {
        let manifest = manifest(None, vec![period(0), period(30)]);
        assert_eq!(manifest.period_duration(0), Some(TimeDelta::seconds(30)));
        assert_eq!(manifest.period_duration(1), None);
    }

    #[test]
    fn test_manifest_is_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Manifest>();
    }
}
