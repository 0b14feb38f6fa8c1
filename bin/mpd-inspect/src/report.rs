use chrono::{DateTime, TimeDelta, Utc};
use iori_mpd::{util::RangedUri, AdaptationSet, Manifest, Period, Representation};
use serde::Serialize;
use url::Url;

#[derive(Debug, Serialize)]
pub struct ManifestReport {
    pub dynamic: bool,
    pub duration_ms: Option<i64>,
    pub availability_start_time: Option<String>,
    pub time_shift_buffer_depth_ms: Option<i64>,
    pub min_update_period_ms: Option<i64>,
    pub location: Option<String>,
    pub now: String,
    pub periods: Vec<PeriodReport>,
}

#[derive(Debug, Serialize)]
pub struct PeriodReport {
    pub id: Option<String>,
    pub start_ms: i64,
    pub duration_ms: Option<i64>,
    pub event_streams: Vec<String>,
    pub adaptation_sets: Vec<AdaptationSetReport>,
}

#[derive(Debug, Serialize)]
pub struct AdaptationSetReport {
    pub id: Option<i64>,
    pub track_type: String,
    pub representations: Vec<RepresentationReport>,
}

#[derive(Debug, Serialize)]
pub struct RepresentationReport {
    pub id: Option<String>,
    pub codecs: Option<String>,
    pub sample_mime_type: Option<String>,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub language: Option<String>,
    pub base_urls: Vec<String>,
    pub drm_systems: Vec<String>,
    pub initialization: Option<SegmentReport>,
    /// `sidx` range to load before segments can be listed.
    pub index: Option<SegmentReport>,
    /// Initialization and `sidx` in one request, when they are adjacent.
    pub header: Option<SegmentReport>,
    pub segment_count: Option<u64>,
    pub available_segment_count: Option<u64>,
    pub next_segment_available_time: Option<String>,
    pub segments: Vec<SegmentReport>,
}

#[derive(Debug, Serialize)]
pub struct SegmentReport {
    pub number: Option<u64>,
    pub url: String,
    pub range: Option<String>,
    pub start_ms: Option<i64>,
    pub duration_ms: Option<i64>,
}

impl SegmentReport {
    fn from_uri(uri: &RangedUri, base_url: Option<&Url>) -> Option<Self> {
        Some(Self {
            number: None,
            url: uri.resolve(base_url?).ok()?.to_string(),
            range: uri.to_http_range(),
            start_ms: None,
            duration_ms: None,
        })
    }
}

impl ManifestReport {
    pub fn new(manifest: &Manifest, now: DateTime<Utc>, segment_limit: u64) -> Self {
        let periods = manifest
            .periods
            .iter()
            .enumerate()
            .map(|(index, period)| {
                PeriodReport::new(period, manifest.period_duration(index), now, segment_limit)
            })
            .collect();

        Self {
            dynamic: manifest.dynamic,
            duration_ms: manifest.duration.map(|duration| duration.num_milliseconds()),
            availability_start_time: manifest
                .availability_start_time
                .map(|time| time.to_rfc3339()),
            time_shift_buffer_depth_ms: manifest
                .time_shift_buffer_depth
                .map(|depth| depth.num_milliseconds()),
            min_update_period_ms: manifest
                .min_update_period
                .map(|period| period.num_milliseconds()),
            location: manifest.location.as_ref().map(Url::to_string),
            now: now.to_rfc3339(),
            periods,
        }
    }

    pub fn print(&self) {
        println!(
            "{} presentation, duration: {}",
            if self.dynamic { "Dynamic" } else { "Static" },
            format_ms(self.duration_ms)
        );
        if let Some(availability_start_time) = &self.availability_start_time {
            println!("Available since {availability_start_time}, now {}", self.now);
        }
        if let Some(depth) = self.time_shift_buffer_depth_ms {
            println!("Time shift buffer: {}", format_ms(Some(depth)));
        }
        if let Some(location) = &self.location {
            println!("Location: {location}");
        }

        for (index, period) in self.periods.iter().enumerate() {
            println!(
                "Period #{index} ({}) start: {}, duration: {}",
                period.id.as_deref().unwrap_or("-"),
                format_ms(Some(period.start_ms)),
                format_ms(period.duration_ms)
            );
            for scheme in period.event_streams.iter() {
                println!("  Event stream: {scheme}");
            }
            for adaptation_set in period.adaptation_sets.iter() {
                println!(
                    "  [{}] adaptation set {}",
                    adaptation_set.track_type,
                    adaptation_set
                        .id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
                for representation in adaptation_set.representations.iter() {
                    representation.print();
                }
            }
        }
    }
}

impl PeriodReport {
    fn new(
        period: &Period,
        period_duration: Option<TimeDelta>,
        now: DateTime<Utc>,
        segment_limit: u64,
    ) -> Self {
        Self {
            id: period.id.clone(),
            start_ms: period.start.num_milliseconds(),
            duration_ms: period_duration.map(|duration| duration.num_milliseconds()),
            event_streams: period
                .event_streams
                .iter()
                .map(|stream| format!("{} ({} events)", stream.scheme_id_uri, stream.events.len()))
                .collect(),
            adaptation_sets: period
                .adaptation_sets
                .iter()
                .map(|adaptation_set| {
                    AdaptationSetReport::new(adaptation_set, period_duration, now, segment_limit)
                })
                .collect(),
        }
    }
}

impl AdaptationSetReport {
    fn new(
        adaptation_set: &AdaptationSet,
        period_duration: Option<TimeDelta>,
        now: DateTime<Utc>,
        segment_limit: u64,
    ) -> Self {
        Self {
            id: adaptation_set.id,
            track_type: adaptation_set.track_type.to_string(),
            representations: adaptation_set
                .representations
                .iter()
                .map(|representation| {
                    RepresentationReport::new(representation, period_duration, now, segment_limit)
                })
                .collect(),
        }
    }
}

impl RepresentationReport {
    fn new(
        representation: &Representation,
        period_duration: Option<TimeDelta>,
        now: DateTime<Utc>,
        segment_limit: u64,
    ) -> Self {
        let format = &representation.format;
        let base_url = representation.base_url();

        let mut report = Self {
            id: format.id.clone(),
            codecs: format.codecs.clone(),
            sample_mime_type: format.sample_mime_type.clone(),
            bitrate: format.bitrate,
            width: format.width,
            height: format.height,
            language: format.language.clone(),
            base_urls: representation
                .base_urls
                .iter()
                .map(|base_url| base_url.url.to_string())
                .collect(),
            drm_systems: format
                .drm_init_data
                .iter()
                .flat_map(|drm| drm.scheme_datas.iter())
                .map(|scheme_data| scheme_data.uuid.to_string())
                .collect(),
            initialization: representation
                .initialization
                .as_ref()
                .and_then(|initialization| SegmentReport::from_uri(initialization, base_url)),
            index: representation
                .index_uri()
                .and_then(|index| SegmentReport::from_uri(index, base_url)),
            header: representation
                .header_uri()
                .and_then(|header| SegmentReport::from_uri(&header, base_url)),
            segment_count: None,
            available_segment_count: None,
            next_segment_available_time: None,
            segments: Vec::new(),
        };

        let Some(index) = representation.index() else {
            return report;
        };
        let first = index.first_available_segment_num(period_duration, now);
        let available = index.available_segment_count(period_duration, now);
        report.segment_count = index.segment_count(period_duration);
        report.available_segment_count = Some(available);
        report.next_segment_available_time = index
            .next_segment_available_time(period_duration, now)
            .map(|time| time.to_rfc3339());

        for segment_num in first..first.saturating_add(available.min(segment_limit)) {
            let Some((url, range)) = representation.segment_url(segment_num) else {
                tracing::warn!(segment_num, "Unable to resolve segment url");
                continue;
            };
            report.segments.push(SegmentReport {
                number: Some(segment_num),
                url: url.to_string(),
                range,
                start_ms: Some(index.time(segment_num).num_milliseconds()),
                duration_ms: Some(index.duration(segment_num, period_duration).num_milliseconds()),
            });
        }
        report
    }

    fn print(&self) {
        let mut line = format!(
            "    {} {} {}",
            self.id.as_deref().unwrap_or("-"),
            self.sample_mime_type.as_deref().unwrap_or("unknown"),
            self.codecs.as_deref().unwrap_or("-"),
        );
        if let Some(bitrate) = self.bitrate {
            line.push_str(&format!(" {bitrate}bps"));
        }
        if let (Some(width), Some(height)) = (self.width, self.height) {
            line.push_str(&format!(" {width}x{height}"));
        }
        if let Some(language) = &self.language {
            line.push_str(&format!(" lang={language}"));
        }
        println!("{line}");

        if !self.drm_systems.is_empty() {
            println!("      drm: {}", self.drm_systems.join(", "));
        }
        if let Some(initialization) = &self.initialization {
            println!("      init: {}", initialization.describe());
        }
        if let Some(index) = &self.index {
            println!("      sidx: {}", index.describe());
        }
        if let Some(header) = &self.header {
            println!("      header: {}", header.describe());
        }
        if let Some(available) = self.available_segment_count {
            println!(
                "      segments: {available} available of {}",
                self.segment_count
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "unbounded".to_string())
            );
        }
        for segment in self.segments.iter() {
            println!("      {}", segment.describe());
        }
        if let Some(next) = &self.next_segment_available_time {
            println!("      next segment at {next}");
        }
    }
}

impl SegmentReport {
    fn describe(&self) -> String {
        let mut description = match self.number {
            Some(number) => format!("#{number} {}", self.url),
            None => self.url.clone(),
        };
        if let Some(range) = &self.range {
            description.push_str(&format!(" [{range}]"));
        }
        if let (Some(start), Some(duration)) = (self.start_ms, self.duration_ms) {
            description.push_str(&format!(
                " @{} +{}",
                format_ms(Some(start)),
                format_ms(Some(duration))
            ));
        }
        description
    }
}

fn format_ms(ms: Option<i64>) -> String {
    match ms {
        Some(ms) => format!("{}.{:03}s", ms / 1000, (ms % 1000).abs()),
        None => "unknown".to_string(),
    }
}
