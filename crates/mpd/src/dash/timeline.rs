use crate::{util::time::ceil_divide, MpdError, MpdResult};

/// Most segments a single timeline may expand to.
pub const MAX_TIMELINE_SEGMENTS: u64 = 1 << 21;

/// One segment on the sample timeline of a representation, in timescale units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineElement {
    pub start_time: u64,
    pub duration: u64,
}

impl TimelineElement {
    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }
}

/// A `SegmentTimeline/S` entry as written in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    /// `S@t`, absent when the entry continues from the end of the previous one.
    pub time: Option<u64>,
    /// `S@d`
    pub duration: u64,
    /// `S@r`. Only additional segment references are counted, so `r=5` is 6 segments.
    /// A negative value repeats up to the next `S@t` or the end of the period.
    pub repeat_count: i64,
}

/// Expands run-length encoded timeline entries into individual segments.
///
/// `end_time` is the period end in timescale units, used to bound a negative repeat count on
/// the last entry. Fails when the timeline exceeds [`MAX_TIMELINE_SEGMENTS`] or runs past the
/// end of the `u64` time range.
pub fn expand_timeline(
    entries: &[TimelineEntry],
    end_time: Option<u64>,
) -> MpdResult<Vec<TimelineElement>> {
    let mut elements = Vec::new();
    let mut start_time = 0u64;

    for (index, entry) in entries.iter().enumerate() {
        if let Some(time) = entry.time {
            start_time = time;
        }
        if entry.duration == 0 {
            tracing::warn!(index, "Ignoring timeline entry with zero duration");
            continue;
        }

        let count = if entry.repeat_count >= 0 {
            entry.repeat_count as u64 + 1
        } else {
            let boundary = match entries.get(index + 1) {
                Some(next) => next.time,
                None => end_time,
            };
            match boundary {
                Some(boundary) => ceil_divide(
                    boundary as i128 - start_time as i128,
                    entry.duration as i128,
                )
                .max(0) as u64,
                None => {
                    tracing::warn!(
                        index,
                        "Unable to determine the end of a timeline entry with negative repeat count"
                    );
                    0
                }
            }
        };

        if count > MAX_TIMELINE_SEGMENTS - elements.len() as u64 {
            return Err(MpdError::invalid_attribute(
                "r",
                entry.repeat_count.to_string(),
            ));
        }

        elements.reserve(count as usize);
        for _ in 0..count {
            let end_time = start_time
                .checked_add(entry.duration)
                .ok_or_else(|| MpdError::invalid_attribute("d", entry.duration.to_string()))?;
            elements.push(TimelineElement {
                start_time,
                duration: entry.duration,
            });
            start_time = end_time;
        }
    }

    Ok(elements)
}
