use thiserror::Error;

use crate::model::TrackType;

#[derive(Error, Debug)]
pub enum MpdError {
    #[error("Input does not contain a valid media presentation description, root element: {0}")]
    InvalidRootElement(String),

    #[error("Invalid MPD: {0}")]
    MpdParsing(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid date/time format: {0}")]
    InvalidDateTime(String),

    #[error("Invalid value for attribute {attribute}: {value}")]
    InvalidAttribute { attribute: String, value: String },

    #[error("No periods found")]
    NoPeriods,

    #[error("Unable to determine start of period {0}")]
    UnknownPeriodStart(usize),

    #[error("Period {0} extends beyond the supported time range")]
    PeriodOutOfRange(usize),

    #[error("Unable to determine duration of static manifest")]
    UnknownDuration,

    #[error("Inconsistent content types in adaptation set: {0:?} and {1:?}")]
    InconsistentContentType(TrackType, TrackType),

    #[error("Inconsistent languages in adaptation set: {0} and {1}")]
    InconsistentLanguage(String, String),

    #[error("Representation {0:?} has no base url")]
    MissingBaseUrl(Option<String>),

    #[error(transparent)]
    XmlError(#[from] quick_xml::Error),

    #[error(transparent)]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error(transparent)]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
}

impl MpdError {
    pub(crate) fn invalid_attribute<A, V>(attribute: A, value: V) -> Self
    where
        A: Into<String>,
        V: Into<String>,
    {
        Self::InvalidAttribute {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Whether the error was caused by the manifest content rather than by reading it.
    pub fn is_malformed_manifest(&self) -> bool {
        !matches!(self, Self::IOError(_))
    }
}

pub type MpdResult<T> = Result<T, MpdError>;
