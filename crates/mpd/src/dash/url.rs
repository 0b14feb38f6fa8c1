use url::Url;

use crate::MpdResult;

pub const DEFAULT_WEIGHT: u32 = 1;
pub const DEFAULT_DVB_PRIORITY: u32 = 1;

/// A candidate base url of a scope in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    pub url: Url,
    pub service_location: String,
    /// Lower values are preferred. `None` when neither the manifest nor its profile sets one.
    pub priority: Option<u32>,
    /// Relative weight among urls of equal priority.
    pub weight: u32,
}

impl BaseUrl {
    /// The root candidate, built from the url the manifest was retrieved from.
    pub fn document(url: Url, dvb_profile: bool) -> Self {
        Self {
            service_location: url.to_string(),
            url,
            priority: dvb_profile.then_some(DEFAULT_DVB_PRIORITY),
            weight: DEFAULT_WEIGHT,
        }
    }
}

/// A `BaseURL` element as written in the manifest.
#[derive(Debug, Clone, Default)]
pub struct BaseUrlEntry {
    pub url: String,
    pub service_location: Option<String>,
    pub priority: Option<u32>,
    pub weight: Option<u32>,
}

pub(crate) fn is_absolute_url(s: &str) -> bool {
    Url::parse(s).is_ok()
}

/// Resolves one `BaseURL` entry against the candidates of the enclosing scope.
///
/// An absolute entry replaces the parents and yields exactly one candidate. A relative entry
/// yields one candidate per parent, each inheriting the parent's priority, weight and service
/// location unless the entry declares its own.
pub fn resolve_base_url(
    entry: &BaseUrlEntry,
    parents: &[BaseUrl],
    dvb_profile: bool,
) -> MpdResult<Vec<BaseUrl>> {
    if is_absolute_url(&entry.url) {
        let url = Url::parse(&entry.url)?;
        return Ok(vec![BaseUrl {
            service_location: entry
                .service_location
                .clone()
                .unwrap_or_else(|| entry.url.clone()),
            url,
            priority: entry
                .priority
                .or(dvb_profile.then_some(DEFAULT_DVB_PRIORITY)),
            weight: entry.weight.unwrap_or(DEFAULT_WEIGHT),
        }]);
    }

    parents
        .iter()
        .map(|parent| {
            Ok(BaseUrl {
                url: merge_baseurls(&parent.url, &entry.url)?,
                service_location: entry
                    .service_location
                    .clone()
                    .unwrap_or_else(|| parent.service_location.clone()),
                priority: entry.priority.or(parent.priority),
                weight: entry.weight.unwrap_or(parent.weight),
            })
        })
        .collect()
}

/// Resolves a `BaseURL`, `Location` or segment reference against `current`.
///
/// Relative references keep the query of `current`, so tokens on the manifest url reach every
/// segment request. A reference with a query of its own replaces it:
/// `segments/1.m4s` against `https://cdn.example.com/live/manifest.mpd?token=a` resolves to
/// `https://cdn.example.com/live/segments/1.m4s?token=a`, while `1.m4s?token=b` keeps `token=b`.
pub(crate) fn merge_baseurls(current: &Url, new: &str) -> MpdResult<Url> {
    if is_absolute_url(new) {
        return Ok(Url::parse(new)?);
    }

    let mut merged = current.join(new)?;
    if merged.query().is_none() {
        merged.set_query(current.query());
    }
    Ok(merged)
}
