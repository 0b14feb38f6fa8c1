//! # Segment addressing
//!
//! Building blocks shared by every representation kind:
//!
//! * [`url`] resolves `BaseURL` elements into weighted candidate lists.
//! * [`segment`] holds the resolved `SegmentBase`, `SegmentList` and `SegmentTemplate`.
//! * [`timeline`] expands `SegmentTimeline` entries.
//! * [`template`] substitutes `$Number$`, `$Time$` and friends in url templates.
//! * [`index`] maps segment numbers to times and urls, including the live availability window.
pub mod index;
pub mod segment;
pub mod template;
pub mod timeline;
pub mod url;

pub use index::SegmentIndex;
pub use segment::{MultiSegmentBase, SegmentBase, SegmentList, SegmentTemplate, SingleSegmentBase};
pub use template::UrlTemplate;
pub use timeline::{TimelineElement, TimelineEntry};
pub use url::BaseUrl;
