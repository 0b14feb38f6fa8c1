//! # iori-mpd
//!
//! Parses MPEG-DASH media presentation descriptions into an immutable [`Manifest`] and
//! addresses the segments of every representation, for on-demand and live presentations.
//!
//! ```no_run
//! use iori_mpd::{DashManifestParser, Manifest};
//!
//! # fn main() -> iori_mpd::MpdResult<()> {
//! let url = url::Url::parse("https://example.com/live/manifest.mpd")?;
//! let input = std::fs::File::open("manifest.mpd")?;
//! let manifest: Manifest = DashManifestParser::new().parse(&url, input)?;
//!
//! let now = chrono::Utc::now();
//! for (index, period) in manifest.periods.iter().enumerate() {
//!     let period_duration = manifest.period_duration(index);
//!     for adaptation_set in period.adaptation_sets.iter() {
//!         for representation in adaptation_set.representations.iter() {
//!             let Some(segments) = representation.index() else {
//!                 continue;
//!             };
//!             let first = segments.first_available_segment_num(period_duration, now);
//!             println!("{:?}", representation.segment_url(first));
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod dash;
pub mod error;
pub mod model;
pub mod parser;
pub mod util;
pub mod xml;

pub use error::{MpdError, MpdResult};
pub use model::{AdaptationSet, Manifest, Period, Representation, RepresentationKind};
pub use parser::{DashManifestParser, ParserHooks};

/// Parses a manifest with the default hooks.
pub fn parse<R>(url: &url::Url, input: R) -> MpdResult<Manifest>
where
    R: std::io::Read,
{
    DashManifestParser::new().parse(url, input)
}
