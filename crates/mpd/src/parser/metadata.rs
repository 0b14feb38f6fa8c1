use super::attributes::AttributeExt;
use crate::{
    dash::url::BaseUrlEntry,
    model::{
        Descriptor, EventMessage, EventStream, Label, ProgramInformation, ServiceDescription,
        UtcTiming,
    },
    util::time::{scale_large_timestamp, MICROS_PER_SECOND},
    xml::XmlElement,
    MpdResult,
};

pub(crate) fn parse_descriptor(element: &XmlElement) -> Descriptor {
    Descriptor {
        scheme_id_uri: element.string("schemeIdUri").unwrap_or_default(),
        value: element.string("value"),
        id: element.string("id"),
    }
}

pub(crate) fn parse_label(element: &XmlElement) -> Label {
    Label {
        language: element.string("lang"),
        value: element.text().to_string(),
    }
}

pub(crate) fn parse_base_url_entry(element: &XmlElement) -> MpdResult<BaseUrlEntry> {
    Ok(BaseUrlEntry {
        url: element.text().to_string(),
        service_location: element.string("serviceLocation"),
        priority: element.number("dvb:priority")?,
        weight: element.number("dvb:weight")?,
    })
}

pub(crate) fn parse_event_stream(element: &XmlElement) -> MpdResult<EventStream> {
    let timescale: u64 = element.number("timescale")?.unwrap_or(1).max(1);
    let presentation_time_offset: i64 = element.number("presentationTimeOffset")?.unwrap_or(0);

    let mut events = element
        .children_named("Event")
        .map(|event| -> MpdResult<EventMessage> {
            let presentation_time: i64 = event.number("presentationTime")?.unwrap_or(0);
            let duration: Option<i64> = event.number("duration")?;
            Ok(EventMessage {
                id: event.number("id")?.unwrap_or(0),
                presentation_time_us: scale_large_timestamp(
                    presentation_time.saturating_sub(presentation_time_offset),
                    MICROS_PER_SECOND,
                    timescale as i64,
                ),
                duration_ms: duration
                    .map(|duration| scale_large_timestamp(duration, 1000, timescale as i64)),
                message_data: event
                    .string("messageData")
                    .unwrap_or_else(|| event.text().to_string()),
            })
        })
        .collect::<MpdResult<Vec<_>>>()?;
    events.sort_by_key(|event| event.presentation_time_us);

    Ok(EventStream {
        scheme_id_uri: element.string("schemeIdUri").unwrap_or_default(),
        value: element.string("value").unwrap_or_default(),
        timescale,
        events,
    })
}

pub(crate) fn parse_program_information(element: &XmlElement) -> ProgramInformation {
    let text = |name: &str| element.child(name).map(|child| child.text().to_string());
    ProgramInformation {
        title: text("Title"),
        source: text("Source"),
        copyright: text("Copyright"),
        more_information_url: element.string("moreInformationURL"),
        language: element.string("lang"),
    }
}

pub(crate) fn parse_utc_timing(element: &XmlElement) -> UtcTiming {
    UtcTiming {
        scheme_id_uri: element.string("schemeIdUri").unwrap_or_default(),
        value: element.string("value").unwrap_or_default(),
    }
}

pub(crate) fn parse_service_description(element: &XmlElement) -> MpdResult<ServiceDescription> {
    let mut description = ServiceDescription::default();
    if let Some(latency) = element.child("Latency") {
        description.target_offset_ms = latency.number("target")?;
        description.min_offset_ms = latency.number("min")?;
        description.max_offset_ms = latency.number("max")?;
    }
    if let Some(playback_rate) = element.child("PlaybackRate") {
        description.min_playback_speed = playback_rate.number("min")?;
        description.max_playback_speed = playback_rate.number("max")?;
    }
    Ok(description)
}
