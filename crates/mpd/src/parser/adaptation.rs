use super::{
    attributes::{AttributeExt, AvailabilityTimeOffset},
    metadata::{parse_descriptor, parse_label},
    protection::parse_content_protection,
    resolve_scope_base_urls,
    segment::{parse_segment_base, SegmentContext},
    ParserHooks, PeriodContext,
};
use crate::{
    dash::{BaseUrl, SegmentBase, SingleSegmentBase},
    model::{
        descriptor::{self, Descriptor},
        format::{self, mime, TrackType},
        protection::{self, DrmInitData, SchemeData},
        AdaptationSet, Format, Label, Representation, RepresentationKind,
    },
    util::RangedUri,
    xml::XmlElement,
    MpdError, MpdResult,
};

/// Media attributes shared by `AdaptationSet` and `Representation`. Values missing on a
/// representation are inherited from its adaptation set.
#[derive(Debug, Clone, Default)]
struct MediaAttributes {
    mime_type: Option<String>,
    codecs: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    frame_rate: Option<f32>,
    audio_channels: Option<u32>,
    audio_sampling_rate: Option<u32>,
    language: Option<String>,
}

impl MediaAttributes {
    fn parse(element: &XmlElement, parent: Option<&MediaAttributes>) -> MpdResult<Self> {
        let parent = parent.cloned().unwrap_or_default();
        Ok(Self {
            mime_type: element.string("mimeType").or(parent.mime_type),
            codecs: element.string("codecs").or(parent.codecs),
            width: element.number("width")?.or(parent.width),
            height: element.number("height")?.or(parent.height),
            frame_rate: element.frame_rate()?.or(parent.frame_rate),
            audio_channels: parent.audio_channels,
            audio_sampling_rate: element.number("audioSamplingRate")?.or(parent.audio_sampling_rate),
            language: element.string("lang").or(parent.language),
        })
    }

    fn update_audio_channels(&mut self, element: &XmlElement) {
        let descriptor = parse_descriptor(element);
        match descriptor::audio_channel_count(&descriptor) {
            Some(channels) => self.audio_channels = Some(channels),
            None => tracing::debug!(
                scheme = %descriptor.scheme_id_uri,
                value = ?descriptor.value,
                "Unsupported audio channel configuration"
            ),
        }
    }
}

/// Descriptors declared on the adaptation set, shared with every representation in it.
#[derive(Debug, Default)]
struct AdaptationDescriptors {
    roles: Vec<Descriptor>,
    accessibility: Vec<Descriptor>,
    essential_properties: Vec<Descriptor>,
    supplemental_properties: Vec<Descriptor>,
    inband_event_streams: Vec<Descriptor>,
    labels: Vec<Label>,
    drm_scheme_type: Option<String>,
    drm_scheme_datas: Vec<SchemeData>,
}

/// A parsed `Representation` before the adaptation set level data is merged in.
struct RepresentationInfo {
    format: Format,
    base_urls: Vec<BaseUrl>,
    segment_base: SegmentBase,
    drm_scheme_type: Option<String>,
    drm_scheme_datas: Vec<SchemeData>,
    inband_event_streams: Vec<Descriptor>,
    essential_properties: Vec<Descriptor>,
    supplemental_properties: Vec<Descriptor>,
}

fn check_content_type(current: TrackType, other: TrackType) -> MpdResult<TrackType> {
    match (current, other) {
        (TrackType::Unknown, other) => Ok(other),
        (current, TrackType::Unknown) => Ok(current),
        (current, other) if current == other => Ok(current),
        (current, other) => Err(MpdError::InconsistentContentType(current, other)),
    }
}

fn check_language(current: Option<String>, other: Option<String>) -> MpdResult<Option<String>> {
    match (current, other) {
        (None, other) => Ok(other),
        (current, None) => Ok(current),
        (Some(current), Some(other)) if current == other => Ok(Some(current)),
        (Some(current), Some(other)) => Err(MpdError::InconsistentLanguage(current, other)),
    }
}

pub(crate) fn parse_adaptation_set(
    element: &XmlElement,
    period: &PeriodContext<'_>,
    hooks: &dyn ParserHooks,
) -> MpdResult<AdaptationSet> {
    let id = element.number("id")?;
    let label = element.string("label");
    let mut attributes = MediaAttributes::parse(element, None)?;
    let mut track_type = match element.attr("contentType") {
        Some(content_type) => TrackType::from_content_type(content_type),
        None => format::sample_mime_type(attributes.mime_type.as_deref(), attributes.codecs.as_deref())
            .map(|mime_type| TrackType::from_mime_type(&mime_type))
            .unwrap_or_default(),
    };

    let (base_urls, base_url_availability_time_offset) = resolve_scope_base_urls(
        element,
        period.base_urls,
        period.base_url_availability_time_offset,
        period.manifest.dvb_profile,
    )?;

    let mut descriptors = AdaptationDescriptors::default();
    let mut segment_elements = Vec::new();
    let mut representation_elements = Vec::new();
    for child in element.children() {
        match child.local_name() {
            "BaseURL" => {}
            "ContentProtection" => {
                let protection = parse_content_protection(child)?;
                if protection.scheme_type.is_some() {
                    descriptors.drm_scheme_type = protection.scheme_type;
                }
                descriptors.drm_scheme_datas.extend(protection.scheme_data);
            }
            "ContentComponent" => {
                attributes.language = check_language(attributes.language, child.string("lang"))?;
                let component_type = child
                    .attr("contentType")
                    .map(TrackType::from_content_type)
                    .unwrap_or_default();
                track_type = check_content_type(track_type, component_type)?;
            }
            "Role" => descriptors.roles.push(parse_descriptor(child)),
            "AudioChannelConfiguration" => attributes.update_audio_channels(child),
            "Accessibility" => descriptors.accessibility.push(parse_descriptor(child)),
            "EssentialProperty" => descriptors.essential_properties.push(parse_descriptor(child)),
            "SupplementalProperty" => descriptors
                .supplemental_properties
                .push(parse_descriptor(child)),
            "InbandEventStream" => descriptors
                .inband_event_streams
                .push(parse_descriptor(child)),
            "Label" => descriptors.labels.push(parse_label(child)),
            "SegmentBase" | "SegmentList" | "SegmentTemplate" => segment_elements.push(child),
            "Representation" => representation_elements.push(child),
            _ => hooks.on_unknown_element("AdaptationSet", child),
        }
    }

    let mut segment_base = period.segment_base.cloned();
    let mut segment_availability_time_offset = period.segment_availability_time_offset;
    for segment_element in segment_elements {
        if segment_element.local_name() != "SegmentBase" {
            segment_availability_time_offset = segment_element
                .availability_time_offset()?
                .or(segment_availability_time_offset);
        }
        let context = SegmentContext {
            period_start_unix_time: period.period_start_unix_time,
            period_duration: period.period_duration,
            time_shift_buffer_depth: period.manifest.time_shift_buffer_depth,
            base_url_availability_time_offset,
            segment_availability_time_offset,
            supplemental_properties: &descriptors.supplemental_properties,
        };
        segment_base = parse_segment_base(segment_element, segment_base.as_ref(), &context)?;
    }

    let scope = RepresentationScope {
        period,
        attributes: &attributes,
        descriptors: &descriptors,
        base_urls: &base_urls,
        base_url_availability_time_offset,
        segment_availability_time_offset,
        segment_base: segment_base.as_ref(),
    };
    let mut infos = Vec::with_capacity(representation_elements.len());
    for representation_element in representation_elements {
        let info = parse_representation(representation_element, &scope, hooks)?;
        let representation_type = info
            .format
            .sample_mime_type
            .as_deref()
            .map(TrackType::from_mime_type)
            .unwrap_or_default();
        track_type = check_content_type(track_type, representation_type)?;
        infos.push(info);
    }

    let representations = infos
        .into_iter()
        .map(|info| build_representation(info, label.as_deref(), &descriptors, period, hooks))
        .collect();

    tracing::debug!(?id, %track_type, "Parsed adaptation set");
    Ok(AdaptationSet {
        id,
        track_type,
        representations,
        roles: descriptors.roles,
        accessibility: descriptors.accessibility,
        essential_properties: descriptors.essential_properties,
        supplemental_properties: descriptors.supplemental_properties,
    })
}

/// The adaptation set values a representation inherits.
struct RepresentationScope<'a> {
    period: &'a PeriodContext<'a>,
    attributes: &'a MediaAttributes,
    descriptors: &'a AdaptationDescriptors,
    base_urls: &'a [BaseUrl],
    base_url_availability_time_offset: Option<AvailabilityTimeOffset>,
    segment_availability_time_offset: Option<AvailabilityTimeOffset>,
    segment_base: Option<&'a SegmentBase>,
}

fn parse_representation(
    element: &XmlElement,
    scope: &RepresentationScope<'_>,
    hooks: &dyn ParserHooks,
) -> MpdResult<RepresentationInfo> {
    let id = element.string("id");
    let bandwidth = element.number("bandwidth")?;
    let mut attributes = MediaAttributes::parse(element, Some(scope.attributes))?;

    let (base_urls, base_url_availability_time_offset) = resolve_scope_base_urls(
        element,
        scope.base_urls,
        scope.base_url_availability_time_offset,
        scope.period.manifest.dvb_profile,
    )?;
    if base_urls.is_empty() {
        return Err(MpdError::MissingBaseUrl(id));
    }

    let mut drm_scheme_type = None;
    let mut drm_scheme_datas = Vec::new();
    let mut inband_event_streams = Vec::new();
    let mut essential_properties = scope.descriptors.essential_properties.clone();
    let mut supplemental_properties = scope.descriptors.supplemental_properties.clone();
    let mut segment_elements = Vec::new();
    for child in element.children() {
        match child.local_name() {
            "BaseURL" => {}
            "AudioChannelConfiguration" => attributes.update_audio_channels(child),
            "SegmentBase" | "SegmentList" | "SegmentTemplate" => segment_elements.push(child),
            "ContentProtection" => {
                let protection = parse_content_protection(child)?;
                if protection.scheme_type.is_some() {
                    drm_scheme_type = protection.scheme_type;
                }
                drm_scheme_datas.extend(protection.scheme_data);
            }
            "InbandEventStream" => inband_event_streams.push(parse_descriptor(child)),
            "EssentialProperty" => essential_properties.push(parse_descriptor(child)),
            "SupplementalProperty" => supplemental_properties.push(parse_descriptor(child)),
            _ => hooks.on_unknown_element("Representation", child),
        }
    }

    let mut segment_base = scope.segment_base.cloned();
    let mut segment_availability_time_offset = scope.segment_availability_time_offset;
    for segment_element in segment_elements {
        if segment_element.local_name() != "SegmentBase" {
            segment_availability_time_offset = segment_element
                .availability_time_offset()?
                .or(segment_availability_time_offset);
        }
        let context = SegmentContext {
            period_start_unix_time: scope.period.period_start_unix_time,
            period_duration: scope.period.period_duration,
            time_shift_buffer_depth: scope.period.manifest.time_shift_buffer_depth,
            base_url_availability_time_offset,
            segment_availability_time_offset,
            supplemental_properties: &scope.descriptors.supplemental_properties,
        };
        segment_base = parse_segment_base(segment_element, segment_base.as_ref(), &context)?;
    }

    let format = build_format(
        id,
        bandwidth,
        &attributes,
        scope.descriptors,
        &essential_properties,
        &supplemental_properties,
    );

    Ok(RepresentationInfo {
        format,
        base_urls,
        segment_base: segment_base
            .unwrap_or_else(|| SegmentBase::Single(SingleSegmentBase::default())),
        drm_scheme_type,
        drm_scheme_datas,
        inband_event_streams,
        essential_properties,
        supplemental_properties,
    })
}

fn build_format(
    id: Option<String>,
    bitrate: Option<u64>,
    attributes: &MediaAttributes,
    descriptors: &AdaptationDescriptors,
    essential_properties: &[Descriptor],
    supplemental_properties: &[Descriptor],
) -> Format {
    let mut codecs = attributes.codecs.clone();
    let mut sample_mime_type =
        format::sample_mime_type(attributes.mime_type.as_deref(), codecs.as_deref());
    if sample_mime_type.as_deref() == Some(mime::AUDIO_E_AC3)
        && descriptor::is_dolby_joc(supplemental_properties)
    {
        sample_mime_type = Some(mime::AUDIO_E_AC3_JOC.to_string());
        codecs = Some("ec+3".to_string());
    }

    let role_flags = descriptor::role_flags_from_roles(&descriptors.roles)
        | descriptor::role_flags_from_accessibility(&descriptors.accessibility)
        | descriptor::role_flags_from_properties(essential_properties)
        | descriptor::role_flags_from_properties(supplemental_properties);
    let tiles = descriptor::thumbnail_tiles(essential_properties);

    let mut format = Format {
        id,
        container_mime_type: attributes.mime_type.clone(),
        codecs,
        bitrate,
        language: attributes.language.clone(),
        selection_flags: descriptor::selection_flags(&descriptors.roles),
        role_flags,
        tile_count_horizontal: tiles.map(|(columns, _)| columns),
        tile_count_vertical: tiles.map(|(_, rows)| rows),
        ..Default::default()
    };

    match sample_mime_type
        .as_deref()
        .map(TrackType::from_mime_type)
        .unwrap_or_default()
    {
        TrackType::Video => {
            format.width = attributes.width;
            format.height = attributes.height;
            format.frame_rate = attributes.frame_rate;
        }
        TrackType::Audio => {
            format.channel_count = attributes.audio_channels;
            format.sample_rate = attributes.audio_sampling_rate;
        }
        TrackType::Text => {
            if let Some(sample_mime_type) = sample_mime_type.as_deref() {
                format.accessibility_channel =
                    descriptor::accessibility_channel(sample_mime_type, &descriptors.accessibility);
            }
        }
        TrackType::Image => {
            format.width = attributes.width;
            format.height = attributes.height;
        }
        TrackType::Unknown => {}
    }

    format.sample_mime_type = sample_mime_type;
    format
}

fn build_representation(
    info: RepresentationInfo,
    label: Option<&str>,
    descriptors: &AdaptationDescriptors,
    period: &PeriodContext<'_>,
    hooks: &dyn ParserHooks,
) -> Representation {
    let mut format = info.format;
    format.label = label
        .map(String::from)
        .or_else(|| descriptors.labels.first().map(|label| label.value.clone()));
    format.labels = descriptors.labels.clone();

    let mut scheme_datas = info.drm_scheme_datas;
    scheme_datas.extend(descriptors.drm_scheme_datas.iter().cloned());
    if !scheme_datas.is_empty() {
        protection::fill_in_clear_key_information(&mut scheme_datas);
        protection::filter_redundant_incomplete(&mut scheme_datas);
        format.drm_init_data = Some(DrmInitData::new(
            info.drm_scheme_type
                .or_else(|| descriptors.drm_scheme_type.clone()),
            scheme_datas,
        ));
    }

    let mut inband_event_streams = info.inband_event_streams;
    inband_event_streams.extend(descriptors.inband_event_streams.iter().cloned());

    let format = hooks.process_format(format);
    let initialization = info
        .segment_base
        .initialization(format.id.as_deref(), format.bitrate);
    let presentation_time_offset_us = info.segment_base.presentation_time_offset_us();

    let kind = match info.segment_base {
        SegmentBase::Single(segment_base) => {
            let index_uri = segment_base.index();
            let segment = index_uri
                .is_none()
                .then(|| RangedUri::new(None, 0, None));
            RepresentationKind::Single {
                segment_base,
                index_uri,
                segment,
            }
        }
        SegmentBase::List(list) => RepresentationKind::List(list),
        SegmentBase::Template(template) => RepresentationKind::Template(template),
    };

    Representation {
        revision_id: period.manifest.revision_id,
        format,
        base_urls: info.base_urls,
        inband_event_streams,
        essential_properties: info.essential_properties,
        supplemental_properties: info.supplemental_properties,
        presentation_time_offset_us,
        initialization,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_content_type() {
        assert_eq!(
            check_content_type(TrackType::Unknown, TrackType::Audio).unwrap(),
            TrackType::Audio
        );
        assert_eq!(
            check_content_type(TrackType::Video, TrackType::Unknown).unwrap(),
            TrackType::Video
        );
        assert!(matches!(
            check_content_type(TrackType::Video, TrackType::Audio),
            Err(MpdError::InconsistentContentType(TrackType::Video, TrackType::Audio))
        ));
    }

    #[test]
    fn test_check_language() {
        assert_eq!(
            check_language(None, Some("en".to_string())).unwrap().as_deref(),
            Some("en")
        );
        assert_eq!(
            check_language(Some("en".to_string()), Some("en".to_string()))
                .unwrap()
                .as_deref(),
            Some("en")
        );
        assert!(check_language(Some("en".to_string()), Some("de".to_string())).is_err());
    }

    #[test]
    fn test_build_format_e_ac3_joc() {
        let attributes = MediaAttributes {
            mime_type: Some("audio/mp4".to_string()),
            codecs: Some("ec-3".to_string()),
            audio_channels: Some(6),
            width: Some(1920),
            ..Default::default()
        };
        let supplemental = [Descriptor::new(
            "tag:dolby.com,2018:dash:EC3_ExtensionType:2018",
            Some("JOC".to_string()),
        )];
        let format = build_format(
            Some("a1".to_string()),
            Some(768_000),
            &attributes,
            &AdaptationDescriptors::default(),
            &[],
            &supplemental,
        );

        assert_eq!(format.sample_mime_type.as_deref(), Some(mime::AUDIO_E_AC3_JOC));
        assert_eq!(format.codecs.as_deref(), Some("ec+3"));
        assert_eq!(format.channel_count, Some(6));
        assert_eq!(format.width, None);
    }
}
