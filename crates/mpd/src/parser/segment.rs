use chrono::{DateTime, TimeDelta, Utc};

use super::attributes::{AttributeExt, AvailabilityTimeOffset};
use crate::{
    dash::{
        segment::DEFAULT_START_NUMBER,
        timeline::{expand_timeline, TimelineElement, TimelineEntry},
        MultiSegmentBase, SegmentBase, SegmentList, SegmentTemplate, SingleSegmentBase,
        UrlTemplate,
    },
    model::descriptor::{self, Descriptor},
    util::{parse_byte_range, time::scale_large_timestamp, time::TimeDeltaExt, RangedUri},
    xml::XmlElement,
    MpdError, MpdResult,
};

/// Values of the enclosing scopes that segment elements depend on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentContext<'a> {
    pub period_start_unix_time: Option<DateTime<Utc>>,
    /// `Period@duration`, bounds timelines with a negative repeat count.
    pub period_duration: Option<TimeDelta>,
    pub time_shift_buffer_depth: Option<TimeDelta>,
    pub base_url_availability_time_offset: Option<AvailabilityTimeOffset>,
    pub segment_availability_time_offset: Option<AvailabilityTimeOffset>,
    /// Supplemental properties of the adaptation set, which may announce the last segment.
    pub supplemental_properties: &'a [Descriptor],
}

/// Parses a `SegmentBase`, `SegmentList` or `SegmentTemplate` element. Values missing on the
/// element are taken from `parent` if it is of the same kind.
pub(crate) fn parse_segment_base(
    element: &XmlElement,
    parent: Option<&SegmentBase>,
    context: &SegmentContext<'_>,
) -> MpdResult<Option<SegmentBase>> {
    let segment_base = match element.local_name() {
        "SegmentBase" => {
            let parent = match parent {
                Some(SegmentBase::Single(parent)) => Some(parent),
                _ => None,
            };
            SegmentBase::Single(parse_single_segment_base(element, parent)?)
        }
        "SegmentList" => {
            let parent = match parent {
                Some(SegmentBase::List(parent)) => Some(parent),
                _ => None,
            };
            SegmentBase::List(parse_segment_list(element, parent, context)?)
        }
        "SegmentTemplate" => {
            let parent = match parent {
                Some(SegmentBase::Template(parent)) => Some(parent),
                _ => None,
            };
            SegmentBase::Template(parse_segment_template(element, parent, context)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(segment_base))
}

fn parse_single_segment_base(
    element: &XmlElement,
    parent: Option<&SingleSegmentBase>,
) -> MpdResult<SingleSegmentBase> {
    let timescale = element
        .number("timescale")?
        .or(parent.map(|parent| parent.timescale))
        .unwrap_or(1);
    let presentation_time_offset = element
        .number("presentationTimeOffset")?
        .or(parent.map(|parent| parent.presentation_time_offset))
        .unwrap_or(0);

    let (mut index_start, mut index_length) = parent
        .map(|parent| (parent.index_start, parent.index_length))
        .unwrap_or((0, 0));
    if let Some(index_range) = element.attr("indexRange") {
        let (start, length) = parse_byte_range("indexRange", index_range)?;
        index_start = start;
        index_length = length.ok_or_else(|| MpdError::invalid_attribute("indexRange", index_range))?;
    }

    let initialization = match element.child("Initialization") {
        Some(initialization) => Some(parse_ranged_url(initialization, "sourceURL", "range")?),
        None => parent.and_then(|parent| parent.initialization.clone()),
    };

    Ok(SingleSegmentBase {
        initialization,
        timescale,
        presentation_time_offset,
        index_start,
        index_length,
    })
}

fn parse_segment_list(
    element: &XmlElement,
    parent: Option<&SegmentList>,
    context: &SegmentContext<'_>,
) -> MpdResult<SegmentList> {
    let base = parse_multi_segment_base(element, parent.map(|parent| &parent.base), context)?;

    let mut media_segments = Vec::new();
    for segment_url in element.children_named("SegmentURL") {
        media_segments.push(parse_ranged_url(segment_url, "media", "mediaRange")?);
    }
    if media_segments.is_empty() {
        if let Some(parent) = parent {
            media_segments = parent.media_segments.clone();
        }
    }

    Ok(SegmentList {
        base,
        media_segments,
    })
}

fn parse_segment_template(
    element: &XmlElement,
    parent: Option<&SegmentTemplate>,
    context: &SegmentContext<'_>,
) -> MpdResult<SegmentTemplate> {
    let base = parse_multi_segment_base(element, parent.map(|parent| &parent.base), context)?;

    let media_template = element
        .attr("media")
        .map(UrlTemplate::new)
        .or_else(|| parent.and_then(|parent| parent.media_template.clone()));
    let initialization_template = element
        .attr("initialization")
        .map(UrlTemplate::new)
        .or_else(|| parent.and_then(|parent| parent.initialization_template.clone()));

    Ok(SegmentTemplate {
        base,
        end_number: descriptor::last_segment_number(context.supplemental_properties),
        initialization_template,
        media_template,
    })
}

fn parse_multi_segment_base(
    element: &XmlElement,
    parent: Option<&MultiSegmentBase>,
    context: &SegmentContext<'_>,
) -> MpdResult<MultiSegmentBase> {
    let timescale: u64 = element
        .number("timescale")?
        .or(parent.map(|parent| parent.timescale))
        .unwrap_or(1);
    if timescale == 0 {
        return Err(MpdError::invalid_attribute("timescale", "0"));
    }
    let presentation_time_offset = element
        .number("presentationTimeOffset")?
        .or(parent.map(|parent| parent.presentation_time_offset))
        .unwrap_or(0);
    let duration = element
        .number("duration")?
        .or(parent.and_then(|parent| parent.duration));
    let start_number = element
        .number("startNumber")?
        .or(parent.map(|parent| parent.start_number))
        .unwrap_or(DEFAULT_START_NUMBER);

    let initialization = match element.child("Initialization") {
        Some(initialization) => Some(parse_ranged_url(initialization, "sourceURL", "range")?),
        None => parent.and_then(|parent| parent.initialization.clone()),
    };

    let timeline = match element.child("SegmentTimeline") {
        Some(timeline) => {
            let end_time = context.period_duration.map(|period_duration| {
                scale_large_timestamp(period_duration.as_micros(), timescale as i64, 1_000_000)
                    .max(0) as u64
            });
            Some(parse_segment_timeline(timeline, end_time)?)
        }
        None => parent.and_then(|parent| parent.timeline.clone()),
    };

    Ok(MultiSegmentBase {
        initialization,
        timescale,
        presentation_time_offset,
        start_number,
        duration,
        timeline,
        availability_time_offset: AvailabilityTimeOffset::resolve(
            context.base_url_availability_time_offset,
            context.segment_availability_time_offset,
        ),
        time_shift_buffer_depth: context.time_shift_buffer_depth,
        period_start_unix_time: context.period_start_unix_time,
    })
}

fn parse_segment_timeline(
    element: &XmlElement,
    end_time: Option<u64>,
) -> MpdResult<Vec<TimelineElement>> {
    let entries = element
        .children_named("S")
        .map(|entry| -> MpdResult<TimelineEntry> {
            Ok(TimelineEntry {
                time: entry.number("t")?,
                duration: entry
                    .number("d")?
                    .ok_or_else(|| MpdError::invalid_attribute("d", ""))?,
                repeat_count: entry.number("r")?.unwrap_or(0),
            })
        })
        .collect::<MpdResult<Vec<_>>>()?;

    expand_timeline(&entries, end_time)
}

/// `Initialization@sourceURL` + `@range`, or `SegmentURL@media` + `@mediaRange`.
fn parse_ranged_url(
    element: &XmlElement,
    url_attribute: &str,
    range_attribute: &str,
) -> MpdResult<RangedUri> {
    let url = element.string(url_attribute);
    let (start, length) = match element.attr(range_attribute) {
        Some(range) => parse_byte_range(range_attribute, range)?,
        None => (0, None),
    };
    Ok(RangedUri::new(url, start, length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn context(supplemental_properties: &[Descriptor]) -> SegmentContext<'_> {
        SegmentContext {
            period_start_unix_time: None,
            period_duration: Some(TimeDelta::seconds(60)),
            time_shift_buffer_depth: None,
            base_url_availability_time_offset: None,
            segment_availability_time_offset: None,
            supplemental_properties,
        }
    }

    fn parse(xml: &str, parent: Option<&SegmentBase>) -> SegmentBase {
        let element = parse_document(xml, None).unwrap();
        parse_segment_base(&element, parent, &context(&[]))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_segment_base() {
        let base = parse(
            r#"<SegmentBase timescale="48000" indexRange="863-1138">
                <Initialization range="0-862"/>
            </SegmentBase>"#,
            None,
        );
        let SegmentBase::Single(base) = base else {
            panic!("expected a single segment base");
        };
        assert_eq!(base.timescale, 48_000);
        assert_eq!(base.index(), Some(RangedUri::new(None, 863, Some(276))));
        assert_eq!(base.initialization, Some(RangedUri::new(None, 0, Some(863))));
    }

    #[test]
    fn test_segment_list_inherits_parent() {
        let parent = parse(
            r#"<SegmentList timescale="1000" duration="2000" startNumber="5">
                <Initialization sourceURL="init.mp4"/>
                <SegmentURL media="a.mp4"/>
                <SegmentURL media="b.mp4" mediaRange="100-199"/>
            </SegmentList>"#,
            None,
        );
        let child = parse(r#"<SegmentList duration="4000"/>"#, Some(&parent));

        let SegmentBase::List(list) = child else {
            panic!("expected a segment list");
        };
        assert_eq!(list.base.timescale, 1000);
        assert_eq!(list.base.duration, Some(4000));
        assert_eq!(list.base.start_number, 5);
        assert_eq!(list.media_segments.len(), 2);
        assert_eq!(
            list.media_segments[1],
            RangedUri::new(Some("b.mp4".to_string()), 100, Some(100))
        );
        assert_eq!(
            list.base.initialization.as_ref().and_then(RangedUri::reference),
            Some("init.mp4")
        );
    }

    #[test]
    fn test_parent_of_other_kind_is_ignored() {
        let parent = parse(r#"<SegmentBase timescale="90000"/>"#, None);
        let child = parse(r#"<SegmentTemplate media="$Number$.m4s" duration="2"/>"#, Some(&parent));
        assert_eq!(child.timescale(), 1);
    }

    #[test]
    fn test_segment_template() {
        let properties = [Descriptor::new(
            descriptor::LAST_SEGMENT_NUMBER_SCHEME,
            Some("30".to_string()),
        )];
        let element = parse_document(
            r#"<SegmentTemplate timescale="10" media="$Time$.m4s" initialization="init.mp4">
                <SegmentTimeline>
                    <S t="0" d="20" r="1"/>
                    <S d="10" r="-1"/>
                </SegmentTimeline>
            </SegmentTemplate>"#,
            None,
        )
        .unwrap();
        let segment_base = parse_segment_base(&element, None, &context(&properties))
            .unwrap()
            .unwrap();

        let SegmentBase::Template(template) = segment_base else {
            panic!("expected a segment template");
        };
        assert_eq!(template.end_number, Some(30));
        assert_eq!(template.media_template.as_ref().map(UrlTemplate::as_str), Some("$Time$.m4s"));
        // 600 timescale units in the period, 40 taken by the first entry
        assert_eq!(template.base.timeline.as_ref().map(Vec::len), Some(2 + 56));
    }

    #[test]
    fn test_timeline_entry_without_duration() {
        let element = parse_document(
            r#"<SegmentTemplate><SegmentTimeline><S t="0"/></SegmentTimeline></SegmentTemplate>"#,
            None,
        )
        .unwrap();
        assert!(parse_segment_base(&element, None, &context(&[])).is_err());
    }
}
