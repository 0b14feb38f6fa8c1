//! Builds a [`Manifest`] from an MPD document.
//!
//! The document is read into an element tree once, then walked top down. Every scope receives
//! a snapshot of the values it inherits from its ancestors (base urls, segment bases,
//! availability offsets) and returns a fully resolved node.

mod adaptation;
mod attributes;
mod metadata;
mod protection;
mod segment;

use std::io::Read;

use chrono::{DateTime, TimeDelta, Utc};
use url::Url;

use self::{
    adaptation::parse_adaptation_set,
    attributes::{AttributeExt, AvailabilityTimeOffset},
    metadata::{
        parse_base_url_entry, parse_descriptor, parse_event_stream, parse_program_information,
        parse_service_description, parse_utc_timing,
    },
    segment::{parse_segment_base, SegmentContext},
};
use crate::{
    dash::{
        url::{merge_baseurls, resolve_base_url},
        BaseUrl, SegmentBase,
    },
    model::{Format, Manifest, Period},
    xml::{parse_document, XmlElement},
    MpdError, MpdResult,
};

const DVB_PROFILES: [&str; 3] = [
    "urn:dvb:dash:profile:dvb-dash:2014",
    "urn:dvb:dash:profile:dvb-dash:isoff-ext-live:2014",
    "urn:dvb:dash:profile:dvb-dash:isoff-ext-on-demand:2014",
];

/// Extension points of [`DashManifestParser`].
pub trait ParserHooks: Send + Sync {
    /// Called for every element the parser does not handle, with the local name of its parent.
    fn on_unknown_element(&self, parent: &str, element: &XmlElement) {
        tracing::trace!(parent, element = element.name(), "Skipping unknown element");
    }

    /// Post-processes the format of every representation before it is stored.
    fn process_format(&self, format: Format) -> Format {
        format
    }
}

#[derive(Debug, Default)]
pub struct DefaultParserHooks;

impl ParserHooks for DefaultParserHooks {}

/// Values of the `MPD` element every scope depends on.
#[derive(Debug)]
pub(crate) struct ManifestContext {
    pub dvb_profile: bool,
    pub time_shift_buffer_depth: Option<TimeDelta>,
    pub revision_id: u64,
}

/// Values a `Period` hands down to its adaptation sets.
pub(crate) struct PeriodContext<'a> {
    pub manifest: &'a ManifestContext,
    pub base_urls: &'a [BaseUrl],
    pub base_url_availability_time_offset: Option<AvailabilityTimeOffset>,
    pub segment_availability_time_offset: Option<AvailabilityTimeOffset>,
    pub segment_base: Option<&'a SegmentBase>,
    pub period_start_unix_time: Option<DateTime<Utc>>,
    pub period_duration: Option<TimeDelta>,
}

pub struct DashManifestParser {
    hooks: Box<dyn ParserHooks>,
    revision_id: u64,
}

impl Default for DashManifestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DashManifestParser {
    pub fn new() -> Self {
        Self {
            hooks: Box::new(DefaultParserHooks),
            revision_id: 0,
        }
    }

    pub fn with_hooks<H>(mut self, hooks: H) -> Self
    where
        H: ParserHooks + 'static,
    {
        self.hooks = Box::new(hooks);
        self
    }

    /// Revision stamped on every representation, so a refreshed manifest can be told apart.
    pub fn with_revision_id(mut self, revision_id: u64) -> Self {
        self.revision_id = revision_id;
        self
    }

    /// Parses a manifest retrieved from `url`, which is the root base url.
    pub fn parse<R>(&self, url: &Url, mut input: R) -> MpdResult<Manifest>
    where
        R: Read,
    {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        self.parse_str(url, std::str::from_utf8(&buf)?)
    }

    pub fn parse_str(&self, url: &Url, input: &str) -> MpdResult<Manifest> {
        let root = parse_document(input, Some("MPD"))?;
        self.parse_mpd(url, &root)
    }

    fn parse_mpd(&self, url: &Url, element: &XmlElement) -> MpdResult<Manifest> {
        let dynamic = element.attr("type") == Some("dynamic");
        let dvb_profile = element
            .attr("profiles")
            .map(|profiles| {
                profiles
                    .split(',')
                    .any(|profile| DVB_PROFILES.contains(&profile.trim()))
            })
            .unwrap_or(false);

        let availability_start_time = element.date_time("availabilityStartTime")?;
        let publish_time = element.date_time("publishTime")?;
        let mut duration = element.duration("mediaPresentationDuration")?;
        let min_buffer_time = element.duration("minBufferTime")?;
        let (min_update_period, time_shift_buffer_depth, suggested_presentation_delay) =
            if dynamic {
                (
                    element.duration("minimumUpdatePeriod")?,
                    element.duration("timeShiftBufferDepth")?,
                    element.duration("suggestedPresentationDelay")?,
                )
            } else {
                (None, None, None)
            };

        let manifest_context = ManifestContext {
            dvb_profile,
            time_shift_buffer_depth,
            revision_id: self.revision_id,
        };

        let document_base_url = BaseUrl::document(url.clone(), dvb_profile);
        let initial_availability_time_offset =
            dynamic.then_some(AvailabilityTimeOffset::Offset(TimeDelta::zero()));
        let (base_urls, base_url_availability_time_offset) = resolve_scope_base_urls(
            element,
            std::slice::from_ref(&document_base_url),
            initial_availability_time_offset,
            dvb_profile,
        )?;

        let mut program_information = None;
        let mut utc_timing = None;
        let mut service_description = None;
        let mut location = None;
        let mut periods = Vec::new();
        let mut next_period_start = (!dynamic).then(TimeDelta::zero);
        let mut seen_early_access_period = false;

        for child in element.children() {
            match child.local_name() {
                "BaseURL" => {}
                "ProgramInformation" => program_information = Some(parse_program_information(child)),
                "UTCTiming" => utc_timing = Some(parse_utc_timing(child)),
                "ServiceDescription" => service_description = Some(parse_service_description(child)?),
                "Location" => location = Some(merge_baseurls(url, child.text())?),
                "Period" if seen_early_access_period => {
                    tracing::debug!("Skipping period after an early access period");
                }
                "Period" => {
                    let (period, period_duration) = self.parse_period(
                        periods.len(),
                        child,
                        &manifest_context,
                        &base_urls,
                        base_url_availability_time_offset,
                        next_period_start,
                        availability_start_time,
                    )?;
                    match period {
                        Some(period) => {
                            next_period_start = period_duration
                                .map(|period_duration| {
                                    period.start.checked_add(&period_duration).ok_or_else(|| {
                                        MpdError::PeriodOutOfRange(periods.len())
                                    })
                                })
                                .transpose()?;
                            periods.push(period);
                        }
                        None if dynamic => {
                            tracing::debug!(index = periods.len(), "Found early access period");
                            seen_early_access_period = true;
                        }
                        None => return Err(MpdError::UnknownPeriodStart(periods.len())),
                    }
                }
                _ => self.hooks.on_unknown_element("MPD", child),
            }
        }

        if duration.is_none() {
            match next_period_start {
                Some(next_period_start) => duration = Some(next_period_start),
                None if !dynamic => return Err(MpdError::UnknownDuration),
                None => {}
            }
        }
        if periods.is_empty() {
            return Err(MpdError::NoPeriods);
        }

        tracing::debug!(
            dynamic,
            periods = periods.len(),
            ?duration,
            "Parsed media presentation description"
        );
        Ok(Manifest {
            availability_start_time,
            duration,
            min_buffer_time,
            dynamic,
            min_update_period,
            time_shift_buffer_depth,
            suggested_presentation_delay,
            publish_time,
            program_information,
            utc_timing,
            service_description,
            location,
            periods,
        })
    }

    /// Returns the period, or `None` when its start can not be determined, together with its
    /// declared duration.
    fn parse_period(
        &self,
        index: usize,
        element: &XmlElement,
        manifest: &ManifestContext,
        parent_base_urls: &[BaseUrl],
        parent_availability_time_offset: Option<AvailabilityTimeOffset>,
        default_start: Option<TimeDelta>,
        availability_start_time: Option<DateTime<Utc>>,
    ) -> MpdResult<(Option<Period>, Option<TimeDelta>)> {
        let id = element.string("id");
        let start = element.duration("start")?.or(default_start);
        let duration = element.duration("duration")?;
        let Some(start) = start else {
            return Ok((None, duration));
        };
        let period_start_unix_time = availability_start_time
            .map(|time| {
                time.checked_add_signed(start)
                    .ok_or(MpdError::PeriodOutOfRange(index))
            })
            .transpose()?;

        let (base_urls, base_url_availability_time_offset) = resolve_scope_base_urls(
            element,
            parent_base_urls,
            parent_availability_time_offset,
            manifest.dvb_profile,
        )?;

        let mut segment_base = None;
        let mut segment_availability_time_offset = None;
        for child in element.children() {
            if !matches!(
                child.local_name(),
                "SegmentBase" | "SegmentList" | "SegmentTemplate"
            ) {
                continue;
            }
            if child.local_name() != "SegmentBase" {
                segment_availability_time_offset = child
                    .availability_time_offset()?
                    .or(segment_availability_time_offset);
            }
            let context = SegmentContext {
                period_start_unix_time,
                period_duration: duration,
                time_shift_buffer_depth: manifest.time_shift_buffer_depth,
                base_url_availability_time_offset,
                segment_availability_time_offset,
                supplemental_properties: &[],
            };
            segment_base = parse_segment_base(child, segment_base.as_ref(), &context)?;
        }

        let context = PeriodContext {
            manifest,
            base_urls: &base_urls,
            base_url_availability_time_offset,
            segment_availability_time_offset,
            segment_base: segment_base.as_ref(),
            period_start_unix_time,
            period_duration: duration,
        };

        let mut adaptation_sets = Vec::new();
        let mut event_streams = Vec::new();
        let mut asset_identifier = None;
        for child in element.children() {
            match child.local_name() {
                "BaseURL" | "SegmentBase" | "SegmentList" | "SegmentTemplate" => {}
                "AdaptationSet" => adaptation_sets.push(parse_adaptation_set(
                    child,
                    &context,
                    self.hooks.as_ref(),
                )?),
                "EventStream" => event_streams.push(parse_event_stream(child)?),
                "AssetIdentifier" => asset_identifier = Some(parse_descriptor(child)),
                _ => self.hooks.on_unknown_element("Period", child),
            }
        }

        tracing::debug!(?id, ?start, adaptation_sets = adaptation_sets.len(), "Parsed period");
        Ok((
            Some(Period {
                id,
                start,
                adaptation_sets,
                event_streams,
                asset_identifier,
            }),
            duration,
        ))
    }
}

/// Resolves the `BaseURL` children of a scope. Without any, the scope keeps the parent
/// candidates. The first `BaseURL` sets the availability time offset of the scope.
pub(crate) fn resolve_scope_base_urls(
    element: &XmlElement,
    parents: &[BaseUrl],
    parent_availability_time_offset: Option<AvailabilityTimeOffset>,
    dvb_profile: bool,
) -> MpdResult<(Vec<BaseUrl>, Option<AvailabilityTimeOffset>)> {
    let mut base_urls = Vec::new();
    let mut availability_time_offset = parent_availability_time_offset;

    for (index, child) in element.children_named("BaseURL").enumerate() {
        if index == 0 {
            availability_time_offset = child
                .availability_time_offset()?
                .or(parent_availability_time_offset);
        }
        let entry = parse_base_url_entry(child)?;
        base_urls.extend(resolve_base_url(&entry, parents, dvb_profile)?);
    }

    if base_urls.is_empty() {
        base_urls = parents.to_vec();
    }
    Ok((base_urls, availability_time_offset))
}
