use url::Url;

use crate::{dash::url::merge_baseurls, MpdError, MpdResult};

/// A reference to a byte range of a resource, relative to a representation's base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangedUri {
    reference: Option<String>,
    pub start: u64,
    /// `None` means the range extends to the end of the resource.
    pub length: Option<u64>,
}

impl RangedUri {
    pub fn new(reference: Option<String>, start: u64, length: Option<u64>) -> Self {
        Self {
            reference,
            start,
            length,
        }
    }

    /// The url reference as written in the manifest, `None` for the base url itself.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn resolve(&self, base: &Url) -> MpdResult<Url> {
        match &self.reference {
            Some(reference) => merge_baseurls(base, reference),
            None => Ok(base.clone()),
        }
    }

    /// `Range` header value, or `None` when the whole resource is referenced.
    pub fn to_http_range(&self) -> Option<String> {
        match self.length {
            Some(length) => Some(format!(
                "bytes={}-{}",
                self.start,
                self.start.saturating_add(length).saturating_sub(1)
            )),
            None if self.start > 0 => Some(format!("bytes={}-", self.start)),
            None => None,
        }
    }

    /// Merges two adjacent ranges of the same resource, e.g. an initialization range directly
    /// followed by an index range.
    pub fn attempt_merge(&self, other: &RangedUri, base: &Url) -> Option<RangedUri> {
        let resolved = self.resolve(base).ok()?;
        if other.resolve(base).ok()? != resolved {
            return None;
        }

        let reference = Some(resolved.to_string());
        match (self.length, other.length) {
            (Some(length), _) if self.start.checked_add(length) == Some(other.start) => {
                Some(RangedUri::new(
                    reference,
                    self.start,
                    other.length.map(|other_length| length.saturating_add(other_length)),
                ))
            }
            (_, Some(other_length)) if other.start.checked_add(other_length) == Some(self.start) => {
                Some(RangedUri::new(
                    reference,
                    other.start,
                    self.length.map(|length| other_length.saturating_add(length)),
                ))
            }
            _ => None,
        }
    }
}

/// The byte range shall be expressed and formatted as a byte-range-spec as defined in
/// IETF RFC 7233:2014, subclause 2.1. It is restricted to a single expression identifying
/// a contiguous range of bytes.
///
/// Returns the first byte position and, when the last position is given, the length.
pub(crate) fn parse_byte_range(attribute: &str, value: &str) -> MpdResult<(u64, Option<u64>)> {
    let invalid = || MpdError::invalid_attribute(attribute, value);

    let (start, end) = match value.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (value, None),
    };

    let first_byte_pos = start.trim().parse::<u64>().map_err(|_| invalid())?;
    let last_byte_pos = match end.map(str::trim) {
        Some(end) if !end.is_empty() => Some(end.parse::<u64>().map_err(|_| invalid())?),
        _ => None,
    };

    // 0-500 means 501 bytes
    let length = last_byte_pos
        .map(|last_byte_pos| {
            last_byte_pos
                .checked_sub(first_byte_pos)
                .and_then(|delta| delta.checked_add(1))
                .ok_or_else(invalid)
        })
        .transpose()?;

    Ok((first_byte_pos, length))
}
