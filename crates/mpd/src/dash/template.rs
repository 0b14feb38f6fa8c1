use std::{collections::HashMap, sync::LazyLock};

use regex::{Captures, Regex, Replacer};

// DASH-IF IOP only permits the `%0[width]d` format tag, e.g. "$RepresentationID$/$Number%06d$.m4s".
static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$(RepresentationID|Number|Time|Bandwidth)(?:%0(\d+)d)?\$").unwrap()
});

const REPRESENTATION_ID: &str = "RepresentationID";
const NUMBER: &str = "Number";
const TIME: &str = "Time";
const BANDWIDTH: &str = "Bandwidth";

/// A `SegmentTemplate@media` or `SegmentTemplate@initialization` url template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new<S>(template: S) -> Self
    where
        S: Into<String>,
    {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitutes all identifiers. Identifiers without a value are kept verbatim.
    pub fn build(
        &self,
        representation_id: Option<&str>,
        number: u64,
        bandwidth: Option<u64>,
        time: u64,
    ) -> String {
        let mut values = HashMap::with_capacity(4);
        if let Some(representation_id) = representation_id {
            values.insert(REPRESENTATION_ID, representation_id.to_string());
        }
        if let Some(bandwidth) = bandwidth {
            values.insert(BANDWIDTH, bandwidth.to_string());
        }
        values.insert(NUMBER, number.to_string());
        values.insert(TIME, time.to_string());

        IDENTIFIER_REGEX
            .replace_all(&self.0, Substitution(&values))
            .into_owned()
    }
}

struct Substitution<'a>(&'a HashMap<&'static str, String>);

impl Replacer for Substitution<'_> {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) {
        // $$ is an escaped dollar sign
        let Some(identifier) = caps.get(1) else {
            dst.push('$');
            return;
        };

        match (self.0.get(identifier.as_str()), caps.get(2)) {
            (None, _) => dst.push_str(&caps[0]),
            (Some(value), Some(width)) => {
                let width = width.as_str().parse().unwrap_or(0);
                dst.push_str(&format!("{value:0>width$}"));
            }
            (Some(value), None) => dst.push_str(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build() {
        let template = UrlTemplate::new("$RepresentationID$/$Bandwidth$/seg-$Number%05d$-$Time$.m4s");
        assert_eq!(
            template.build(Some("video_1"), 42, Some(800_000), 90_000),
            "video_1/800000/seg-00042-90000.m4s"
        );
    }

    #[test]
    fn test_width() {
        let template = UrlTemplate::new("$RepresentationID%03d$_$Time%012d$_$Number%1d$");
        assert_eq!(template.build(Some("7"), 12, None, 900), "007_000000000900_12");
    }

    #[test]
    fn test_missing_and_unknown_identifiers() {
        let template = UrlTemplate::new("$RepresentationID$/$Bandwidth$/$SubNumber$/$Number$.m4s");
        assert_eq!(
            template.build(None, 1, None, 0),
            "$RepresentationID$/$Bandwidth$/$SubNumber$/1.m4s"
        );
    }

    #[test]
    fn test_escaped_dollar() {
        let template = UrlTemplate::new("price$$-$Number$.m4s");
        assert_eq!(template.as_str(), "price$$-$Number$.m4s");
        assert_eq!(template.build(None, 3, None, 0), "price$-3.m4s");
    }
}
