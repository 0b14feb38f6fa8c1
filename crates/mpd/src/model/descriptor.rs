//! Scheme-keyed descriptors (`Role`, `Accessibility`, `EssentialProperty`, ...) and the tables
//! that turn them into format properties.

use std::sync::LazyLock;

use regex::Regex;

use super::format::{mime, role_flags, selection_flags};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Descriptor {
    pub scheme_id_uri: String,
    pub value: Option<String>,
    pub id: Option<String>,
}

impl Descriptor {
    pub fn new<S>(scheme_id_uri: S, value: Option<String>) -> Self
    where
        S: Into<String>,
    {
        Self {
            scheme_id_uri: scheme_id_uri.into(),
            value,
            id: None,
        }
    }

    fn is(&self, scheme_id_uri: &str) -> bool {
        self.scheme_id_uri.eq_ignore_ascii_case(scheme_id_uri)
    }
}

pub const ROLE_SCHEME: &str = "urn:mpeg:dash:role:2011";
pub const AUDIO_PURPOSE_SCHEME: &str = "urn:tva:metadata:cs:AudioPurposeCS:2007";
pub const TRICK_MODE_SCHEME: &str = "http://dashif.org/guidelines/trickmode";
pub const THUMBNAIL_TILE_SCHEME: &str = "http://dashif.org/thumbnail_tile";
pub const LAST_SEGMENT_NUMBER_SCHEME: &str = "http://dashif.org/guidelines/last-segment-number";
pub const CEA_608_SCHEME: &str = "urn:scte:dash:cc:cea-608:2015";
pub const CEA_708_SCHEME: &str = "urn:scte:dash:cc:cea-708:2015";

const DOLBY_EC3_EXTENSION_SCHEME: &str = "tag:dolby.com,2018:dash:EC3_ExtensionType:2018";
const DOLBY_DIGITAL_PLUS_EXTENSION_SCHEME: &str =
    "tag:dolby.com,2014:dash:DolbyDigitalPlusExtensionType:2014";

static CEA_608_ACCESSIBILITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CC([1-4])=.*").unwrap());
static CEA_708_ACCESSIBILITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([1-9]|[1-5][0-9]|6[0-3])=.*").unwrap());

/// Selection flags from the `Role` descriptors of the DASH role scheme.
pub fn selection_flags(roles: &[Descriptor]) -> u32 {
    roles
        .iter()
        .filter(|role| role.is(ROLE_SCHEME))
        .map(|role| match role.value.as_deref() {
            Some("main") => selection_flags::DEFAULT,
            Some("forced_subtitle") => selection_flags::FORCED,
            _ => 0,
        })
        .fold(0, |flags, flag| flags | flag)
}

pub fn role_flags_from_roles(roles: &[Descriptor]) -> u32 {
    roles
        .iter()
        .filter(|role| role.is(ROLE_SCHEME))
        .map(|role| dash_role_flags(role.value.as_deref()))
        .fold(0, |flags, flag| flags | flag)
}

pub fn role_flags_from_accessibility(descriptors: &[Descriptor]) -> u32 {
    descriptors
        .iter()
        .map(|descriptor| {
            if descriptor.is(ROLE_SCHEME) {
                dash_role_flags(descriptor.value.as_deref())
            } else if descriptor.is(AUDIO_PURPOSE_SCHEME) {
                audio_purpose_role_flags(descriptor.value.as_deref())
            } else {
                0
            }
        })
        .fold(0, |flags, flag| flags | flag)
}

pub fn role_flags_from_properties(properties: &[Descriptor]) -> u32 {
    if properties
        .iter()
        .any(|property| property.is(TRICK_MODE_SCHEME))
    {
        role_flags::TRICK_PLAY
    } else {
        0
    }
}

fn dash_role_flags(value: Option<&str>) -> u32 {
    match value {
        Some("main") => role_flags::MAIN,
        Some("alternate") => role_flags::ALTERNATE,
        Some("supplementary") => role_flags::SUPPLEMENTARY,
        Some("commentary") => role_flags::COMMENTARY,
        Some("dub") => role_flags::DUB,
        Some("emergency") => role_flags::EMERGENCY,
        Some("caption") => role_flags::CAPTION,
        Some("forced_subtitle") | Some("subtitle") => role_flags::SUBTITLE,
        Some("sign") => role_flags::SIGN,
        Some("description") => role_flags::DESCRIBES_VIDEO,
        Some("enhanced-audio-intelligibility") => role_flags::ENHANCED_DIALOG_INTELLIGIBILITY,
        _ => 0,
    }
}

fn audio_purpose_role_flags(value: Option<&str>) -> u32 {
    match value {
        Some("1") => role_flags::DESCRIBES_VIDEO,
        Some("2") => role_flags::ENHANCED_DIALOG_INTELLIGIBILITY,
        Some("3") => role_flags::SUPPLEMENTARY,
        Some("4") => role_flags::COMMENTARY,
        Some("6") => role_flags::MAIN,
        _ => 0,
    }
}

/// Closed caption channel of a CEA-608 or CEA-708 track, announced by an accessibility
/// descriptor of the matching scheme.
///
/// Values look like `CC1=eng;CC3=deu` (608) or `1=lang:eng` (708), the first service wins.
pub fn accessibility_channel(sample_mime_type: &str, descriptors: &[Descriptor]) -> Option<u32> {
    let (scheme, regex) = match sample_mime_type {
        mime::TEXT_CEA608 => (CEA_608_SCHEME, &CEA_608_ACCESSIBILITY_REGEX),
        mime::TEXT_CEA708 => (CEA_708_SCHEME, &CEA_708_ACCESSIBILITY_REGEX),
        _ => return None,
    };

    descriptors.iter().find_map(|descriptor| {
        if !descriptor.is(scheme) {
            return None;
        }
        let value = descriptor.value.as_deref()?;

        let channel = regex.captures(value).and_then(|caps| caps[1].parse().ok());
        if channel.is_none() {
            tracing::warn!(value, "Unable to parse closed caption accessibility channel");
        }
        channel
    })
}

/// Whether the Dolby supplemental properties mark E-AC-3 with joint object coding.
pub fn is_dolby_joc(properties: &[Descriptor]) -> bool {
    properties.iter().any(|property| {
        (property.is(DOLBY_EC3_EXTENSION_SCHEME) && property.value.as_deref() == Some("JOC"))
            || (property.is(DOLBY_DIGITAL_PLUS_EXTENSION_SCHEME)
                && property.value.as_deref() == Some("ec+3"))
    })
}

/// `(columns, rows)` of a thumbnail grid, from a `5x4` style value.
pub fn thumbnail_tiles(properties: &[Descriptor]) -> Option<(u32, u32)> {
    properties
        .iter()
        .filter(|property| property.is(THUMBNAIL_TILE_SCHEME))
        .find_map(|property| {
            let (columns, rows) = property.value.as_deref()?.split_once('x')?;
            Some((columns.parse().ok()?, rows.parse().ok()?))
        })
}

/// The last segment number of a template, from the DASH-IF supplemental property.
pub fn last_segment_number(properties: &[Descriptor]) -> Option<u64> {
    properties
        .iter()
        .filter(|property| property.is(LAST_SEGMENT_NUMBER_SCHEME))
        .find_map(|property| property.value.as_deref()?.trim().parse().ok())
}

const CICP_CHANNEL_COUNTS: [Option<u32>; 21] = [
    None,
    Some(1),
    Some(2),
    Some(3),
    Some(4),
    Some(5),
    Some(6),
    Some(8),
    Some(2),
    Some(3),
    Some(4),
    Some(7),
    Some(8),
    Some(24),
    Some(8),
    Some(12),
    Some(10),
    Some(12),
    Some(14),
    Some(12),
    Some(14),
];

/// Channel count of an `AudioChannelConfiguration` descriptor. `None` for unknown schemes or
/// values.
pub fn audio_channel_count(descriptor: &Descriptor) -> Option<u32> {
    let value = descriptor.value.as_deref()?.trim();
    match descriptor.scheme_id_uri.to_ascii_lowercase().as_str() {
        "urn:mpeg:dash:23003:3:audio_channel_configuration:2011" => value.parse().ok(),
        "urn:mpeg:mpegb:cicp:channelconfiguration" => {
            let index: usize = value.parse().ok()?;
            CICP_CHANNEL_COUNTS.get(index).copied().flatten()
        }
        "tag:dolby.com,2014:dash:audio_channel_configuration:2011"
        | "urn:dolby:dash:audio_channel_configuration:2011" => {
            match value.to_ascii_lowercase().as_str() {
                "4000" => Some(1),
                "a000" => Some(2),
                "f801" => Some(6),
                "fa01" => Some(8),
                _ => None,
            }
        }
        "tag:dts.com,2014:dash:audio_channel_configuration:2012" => value
            .parse()
            .ok()
            .filter(|channels| (1..=32).contains(channels)),
        "tag:dts.com,2018:uhd:audio_channel_configuration" => u32::from_str_radix(value, 16)
            .ok()
            .map(u32::count_ones)
            .filter(|channels| *channels > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(scheme: &str, value: &str) -> Descriptor {
        Descriptor::new(scheme, Some(value.to_string()))
    }

    #[test]
    fn test_role_flags() {
        let roles = [
            descriptor(ROLE_SCHEME, "main"),
            descriptor(ROLE_SCHEME, "commentary"),
            descriptor("urn:example:role", "dub"),
        ];
        assert_eq!(
            role_flags_from_roles(&roles),
            role_flags::MAIN | role_flags::COMMENTARY
        );
        assert_eq!(selection_flags(&roles), selection_flags::DEFAULT);

        let roles = [descriptor(ROLE_SCHEME, "forced_subtitle")];
        assert_eq!(role_flags_from_roles(&roles), role_flags::SUBTITLE);
        assert_eq!(selection_flags(&roles), selection_flags::FORCED);
    }

    #[test]
    fn test_accessibility_role_flags() {
        let descriptors = [
            descriptor(AUDIO_PURPOSE_SCHEME, "1"),
            descriptor(ROLE_SCHEME, "enhanced-audio-intelligibility"),
        ];
        assert_eq!(
            role_flags_from_accessibility(&descriptors),
            role_flags::DESCRIBES_VIDEO | role_flags::ENHANCED_DIALOG_INTELLIGIBILITY
        );
        assert_eq!(
            role_flags_from_properties(&[Descriptor::new(TRICK_MODE_SCHEME, Some("1".into()))]),
            role_flags::TRICK_PLAY
        );
    }

    #[test]
    fn test_accessibility_channel() {
        assert_eq!(
            accessibility_channel(mime::TEXT_CEA608, &[descriptor(CEA_608_SCHEME, "CC3=deu")]),
            Some(3)
        );
        assert_eq!(
            accessibility_channel(mime::TEXT_CEA708, &[descriptor(CEA_708_SCHEME, "12=lang:eng")]),
            Some(12)
        );
        assert_eq!(
            accessibility_channel(mime::TEXT_CEA708, &[descriptor(CEA_708_SCHEME, "64=lang:eng")]),
            None
        );
        assert_eq!(
            accessibility_channel(mime::TEXT_CEA608, &[descriptor(ROLE_SCHEME, "CC1=eng")]),
            None
        );
        assert_eq!(
            accessibility_channel(mime::TEXT_VTT, &[descriptor(CEA_608_SCHEME, "CC1=eng")]),
            None
        );
    }

    #[test]
    fn test_accessibility_channel_matches_caption_format() {
        let descriptors = [
            descriptor(CEA_708_SCHEME, "2=lang:eng"),
            descriptor(CEA_608_SCHEME, "CC4=deu"),
        ];
        assert_eq!(accessibility_channel(mime::TEXT_CEA608, &descriptors), Some(4));
        assert_eq!(accessibility_channel(mime::TEXT_CEA708, &descriptors), Some(2));
        assert_eq!(accessibility_channel(mime::TEXT_CEA608, &descriptors[..1]), None);
    }

    #[test]
    fn test_audio_channel_count() {
        let count = |scheme: &str, value: &str| audio_channel_count(&descriptor(scheme, value));

        assert_eq!(
            count("urn:mpeg:dash:23003:3:audio_channel_configuration:2011", "6"),
            Some(6)
        );
        assert_eq!(count("urn:mpeg:mpegB:cicp:ChannelConfiguration", "13"), Some(24));
        assert_eq!(count("urn:mpeg:mpegB:cicp:ChannelConfiguration", "0"), None);
        assert_eq!(count("urn:mpeg:mpegB:cicp:ChannelConfiguration", "21"), None);
        assert_eq!(
            count("tag:dolby.com,2014:dash:audio_channel_configuration:2011", "F801"),
            Some(6)
        );
        assert_eq!(
            count("tag:dts.com,2014:dash:audio_channel_configuration:2012", "33"),
            None
        );
        assert_eq!(
            count("tag:dts.com,2018:uhd:audio_channel_configuration", "0000003F"),
            Some(6)
        );
        assert_eq!(count("urn:example", "2"), None);
    }

    #[test]
    fn test_supplemental_properties() {
        let properties = [
            descriptor(THUMBNAIL_TILE_SCHEME, "5x4"),
            descriptor(LAST_SEGMENT_NUMBER_SCHEME, "120"),
            descriptor(DOLBY_EC3_EXTENSION_SCHEME, "JOC"),
        ];
        assert_eq!(thumbnail_tiles(&properties), Some((5, 4)));
        assert_eq!(last_segment_number(&properties), Some(120));
        assert!(is_dolby_joc(&properties));
        assert!(!is_dolby_joc(&properties[..2]));
    }
}
