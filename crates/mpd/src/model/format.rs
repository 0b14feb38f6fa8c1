use std::fmt;

use crate::model::protection::DrmInitData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackType {
    #[default]
    Unknown,
    Audio,
    Video,
    Text,
    Image,
}

impl TrackType {
    /// Maps `AdaptationSet@contentType` and `ContentComponent@contentType`.
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            "audio" => Self::Audio,
            "video" => Self::Video,
            "text" => Self::Text,
            "image" => Self::Image,
            _ => Self::Unknown,
        }
    }

    /// Derives the track type of a sample mime type.
    pub fn from_mime_type(mime_type: &str) -> Self {
        match top_level_type(mime_type) {
            Some("audio") => Self::Audio,
            Some("video") => Self::Video,
            Some("image") => Self::Image,
            Some("text") => Self::Text,
            Some("application") if is_text_mime_type(mime_type) => Self::Text,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Text => "text",
            Self::Image => "image",
        };
        f.write_str(name)
    }
}

pub mod selection_flags {
    pub const DEFAULT: u32 = 1;
    pub const FORCED: u32 = 1 << 1;
}

pub mod role_flags {
    pub const MAIN: u32 = 1;
    pub const ALTERNATE: u32 = 1 << 1;
    pub const SUPPLEMENTARY: u32 = 1 << 2;
    pub const COMMENTARY: u32 = 1 << 3;
    pub const DUB: u32 = 1 << 4;
    pub const EMERGENCY: u32 = 1 << 5;
    pub const CAPTION: u32 = 1 << 6;
    pub const SUBTITLE: u32 = 1 << 7;
    pub const SIGN: u32 = 1 << 8;
    pub const DESCRIBES_VIDEO: u32 = 1 << 9;
    pub const ENHANCED_DIALOG_INTELLIGIBILITY: u32 = 1 << 11;
    pub const TRICK_PLAY: u32 = 1 << 14;
}

pub mod mime {
    pub const VIDEO_MP4: &str = "video/mp4";
    pub const VIDEO_H264: &str = "video/avc";
    pub const VIDEO_H265: &str = "video/hevc";
    pub const VIDEO_DOLBY_VISION: &str = "video/dolby-vision";
    pub const VIDEO_AV1: &str = "video/av01";
    pub const VIDEO_VP8: &str = "video/x-vnd.on2.vp8";
    pub const VIDEO_VP9: &str = "video/x-vnd.on2.vp9";

    pub const AUDIO_MP4: &str = "audio/mp4";
    pub const AUDIO_AAC: &str = "audio/mp4a-latm";
    pub const AUDIO_MPEG: &str = "audio/mpeg";
    pub const AUDIO_AC3: &str = "audio/ac3";
    pub const AUDIO_E_AC3: &str = "audio/eac3";
    pub const AUDIO_E_AC3_JOC: &str = "audio/eac3-joc";
    pub const AUDIO_AC4: &str = "audio/ac4";
    pub const AUDIO_DTS: &str = "audio/vnd.dts";
    pub const AUDIO_DTS_HD: &str = "audio/vnd.dts.hd";
    pub const AUDIO_DTS_EXPRESS: &str = "audio/vnd.dts.hd;profile=lbr";
    pub const AUDIO_DTS_X: &str = "audio/vnd.dts.uhd;profile=p2";
    pub const AUDIO_OPUS: &str = "audio/opus";
    pub const AUDIO_VORBIS: &str = "audio/vorbis";
    pub const AUDIO_FLAC: &str = "audio/flac";
    pub const AUDIO_MPEGH_MHM1: &str = "audio/mhm1";

    pub const TEXT_VTT: &str = "text/vtt";
    pub const TEXT_TTML: &str = "application/ttml+xml";
    pub const TEXT_CEA608: &str = "application/cea-608";
    pub const TEXT_CEA708: &str = "application/cea-708";
    pub const APPLICATION_MP4: &str = "application/mp4";
    pub const APPLICATION_MP4VTT: &str = "application/x-mp4-vtt";
    pub const APPLICATION_RAWCC: &str = "application/x-rawcc";
}

fn top_level_type(mime_type: &str) -> Option<&str> {
    mime_type.split_once('/').map(|(top, _)| top)
}

fn is_text_mime_type(mime_type: &str) -> bool {
    matches!(
        mime_type,
        mime::TEXT_TTML
            | mime::TEXT_CEA608
            | mime::TEXT_CEA708
            | mime::APPLICATION_MP4VTT
            | mime::APPLICATION_RAWCC
    ) || mime_type.starts_with("application/x-subrip")
}

/// Sample mime type of a single RFC 6381 codec string, e.g. `avc1.640028` or `mp4a.40.2`.
pub fn codec_mime_type(codec: &str) -> Option<&'static str> {
    let codec = codec.trim().to_ascii_lowercase();
    let (prefix, rest) = match codec.split_once('.') {
        Some((prefix, rest)) => (prefix, Some(rest)),
        None => (codec.as_str(), None),
    };

    let mime_type = match prefix {
        "avc1" | "avc3" => mime::VIDEO_H264,
        "hev1" | "hvc1" => mime::VIDEO_H265,
        "dvav" | "dva1" | "dvhe" | "dvh1" | "dav1" => mime::VIDEO_DOLBY_VISION,
        "av01" => mime::VIDEO_AV1,
        "vp09" | "vp9" => mime::VIDEO_VP9,
        "vp08" | "vp8" => mime::VIDEO_VP8,
        "mp4a" => return mp4a_mime_type(rest),
        "ac-3" | "dac3" => mime::AUDIO_AC3,
        "ec-3" | "dec3" => mime::AUDIO_E_AC3,
        "ec+3" => mime::AUDIO_E_AC3_JOC,
        "ac-4" | "dac4" => mime::AUDIO_AC4,
        "dtsc" => mime::AUDIO_DTS,
        "dtse" => mime::AUDIO_DTS_EXPRESS,
        "dtsh" | "dtsl" => mime::AUDIO_DTS_HD,
        "dtsx" => mime::AUDIO_DTS_X,
        "opus" => mime::AUDIO_OPUS,
        "vorbis" => mime::AUDIO_VORBIS,
        "flac" => mime::AUDIO_FLAC,
        "mhm1" | "mha1" => mime::AUDIO_MPEGH_MHM1,
        "wvtt" => mime::TEXT_VTT,
        "stpp" => mime::TEXT_TTML,
        "c608" => mime::TEXT_CEA608,
        "c708" => mime::TEXT_CEA708,
        _ => return None,
    };
    Some(mime_type)
}

/// `mp4a.<object type>[.<audio object type>]`, object types from the MP4RA registry.
fn mp4a_mime_type(object_type: Option<&str>) -> Option<&'static str> {
    let Some(object_type) = object_type else {
        return Some(mime::AUDIO_AAC);
    };
    let hex = object_type.split('.').next().unwrap_or_default();
    let Ok(object_type) = u8::from_str_radix(hex, 16) else {
        return Some(mime::AUDIO_AAC);
    };

    let mime_type = match object_type {
        0x40 | 0x66 | 0x67 | 0x68 => mime::AUDIO_AAC,
        0x69 | 0x6b => mime::AUDIO_MPEG,
        0xa5 => mime::AUDIO_AC3,
        0xa6 => mime::AUDIO_E_AC3,
        0xa9 | 0xac => mime::AUDIO_DTS,
        0xaa | 0xab => mime::AUDIO_DTS_HD,
        0xad => mime::AUDIO_OPUS,
        0xae => mime::AUDIO_AC4,
        _ => return None,
    };
    Some(mime_type)
}

/// First codec of a comma separated `@codecs` list matching the given track type.
pub fn codecs_of_type(codecs: &str, track_type: TrackType) -> Option<&str> {
    codecs
        .split(',')
        .map(str::trim)
        .find(|codec| {
            codec_mime_type(codec).map(TrackType::from_mime_type) == Some(track_type)
        })
}

/// Derives the sample mime type from the container mime type and codecs.
pub fn sample_mime_type(container_mime_type: Option<&str>, codecs: Option<&str>) -> Option<String> {
    let container = container_mime_type?;
    match top_level_type(container) {
        Some("audio") => Some(
            codecs
                .and_then(|codecs| codecs_of_type(codecs, TrackType::Audio))
                .and_then(codec_mime_type)
                .unwrap_or(container)
                .to_string(),
        ),
        Some("video") => Some(
            codecs
                .and_then(|codecs| codecs_of_type(codecs, TrackType::Video))
                .and_then(codec_mime_type)
                .unwrap_or(container)
                .to_string(),
        ),
        _ if container == mime::APPLICATION_RAWCC => codecs
            .and_then(|codecs| codecs.split(',').find_map(codec_mime_type))
            .map(String::from),
        Some("text") | Some("image") => Some(container.to_string()),
        _ if is_text_mime_type(container) => Some(container.to_string()),
        _ if container == mime::APPLICATION_MP4 => {
            let codec_mime = codecs.and_then(|codecs| {
                codecs.split(',').find_map(codec_mime_type)
            });
            match codec_mime {
                Some(mime::TEXT_VTT) => Some(mime::APPLICATION_MP4VTT.to_string()),
                Some(codec_mime) => Some(codec_mime.to_string()),
                None => Some(container.to_string()),
            }
        }
        _ => None,
    }
}

/// Everything known about the media of a representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Format {
    pub id: Option<String>,
    pub label: Option<String>,
    pub labels: Vec<Label>,
    pub container_mime_type: Option<String>,
    pub sample_mime_type: Option<String>,
    pub codecs: Option<String>,
    /// `@bandwidth` in bits per second.
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub channel_count: Option<u32>,
    pub sample_rate: Option<u32>,
    pub language: Option<String>,
    pub selection_flags: u32,
    pub role_flags: u32,
    pub accessibility_channel: Option<u32>,
    pub tile_count_horizontal: Option<u32>,
    pub tile_count_vertical: Option<u32>,
    pub drm_init_data: Option<DrmInitData>,
}

impl Format {
    pub fn track_type(&self) -> TrackType {
        self.sample_mime_type
            .as_deref()
            .or(self.container_mime_type.as_deref())
            .map(TrackType::from_mime_type)
            .unwrap_or_default()
    }
}

/// A `Label` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub language: Option<String>,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_mime_type() {
        assert_eq!(codec_mime_type("avc1.640028"), Some(mime::VIDEO_H264));
        assert_eq!(codec_mime_type("hvc1.2.4.L153.B0"), Some(mime::VIDEO_H265));
        assert_eq!(codec_mime_type("mp4a.40.2"), Some(mime::AUDIO_AAC));
        assert_eq!(codec_mime_type("mp4a.6B"), Some(mime::AUDIO_MPEG));
        assert_eq!(codec_mime_type("mp4a.a6"), Some(mime::AUDIO_E_AC3));
        assert_eq!(codec_mime_type("EC-3"), Some(mime::AUDIO_E_AC3));
        assert_eq!(codec_mime_type("wvtt"), Some(mime::TEXT_VTT));
        assert_eq!(codec_mime_type("unknown"), None);
    }

    #[test]
    fn test_sample_mime_type() {
        assert_eq!(
            sample_mime_type(Some("video/mp4"), Some("avc1.4d401f,mp4a.40.2")).as_deref(),
            Some(mime::VIDEO_H264)
        );
        assert_eq!(
            sample_mime_type(Some("audio/mp4"), Some("avc1.4d401f,mp4a.40.2")).as_deref(),
            Some(mime::AUDIO_AAC)
        );
        assert_eq!(
            sample_mime_type(Some("application/mp4"), Some("wvtt")).as_deref(),
            Some(mime::APPLICATION_MP4VTT)
        );
        assert_eq!(
            sample_mime_type(Some("application/mp4"), Some("stpp.ttml.im1t")).as_deref(),
            Some(mime::TEXT_TTML)
        );
        assert_eq!(
            sample_mime_type(Some("text/vtt"), None).as_deref(),
            Some(mime::TEXT_VTT)
        );
        assert_eq!(
            sample_mime_type(Some("application/x-rawcc"), Some("cea608")).as_deref(),
            None
        );
        assert_eq!(
            sample_mime_type(Some("application/x-rawcc"), Some("c608")).as_deref(),
            Some(mime::TEXT_CEA608)
        );
        assert_eq!(sample_mime_type(Some("application/octet-stream"), None), None);
        assert_eq!(sample_mime_type(None, Some("avc1")), None);
    }

    #[test]
    fn test_track_type_from_mime_type() {
        assert_eq!(TrackType::from_mime_type("video/avc"), TrackType::Video);
        assert_eq!(TrackType::from_mime_type(mime::TEXT_TTML), TrackType::Text);
        assert_eq!(
            TrackType::from_mime_type(mime::APPLICATION_MP4VTT),
            TrackType::Text
        );
        assert_eq!(
            TrackType::from_mime_type("application/octet-stream"),
            TrackType::Unknown
        );
    }
}
