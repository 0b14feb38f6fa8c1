use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use iori_mpd::DashManifestParser;
use url::Url;

mod report;

#[derive(Parser, Debug, Clone)]
#[clap(name = "mpd-inspect", version, about)]
struct InspectArgs {
    /// Path of the manifest to inspect
    path: PathBuf,

    /// Url the manifest was retrieved from
    ///
    /// Relative base urls are resolved against it. Defaults to the file url of `path`.
    #[clap(short, long, env = "MPD_INSPECT_URL")]
    url: Option<Url>,

    /// Wall clock time used to locate live segments, in RFC 3339
    #[clap(long)]
    now: Option<DateTime<Utc>>,

    /// Number of available segments listed per representation
    #[clap(short, long, default_value = "3")]
    segments: u64,

    /// Print the report as JSON
    #[clap(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .try_from_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = InspectArgs::parse();
    let url = match args.url {
        Some(url) => url,
        None => {
            let path = args
                .path
                .canonicalize()
                .with_context(|| format!("Failed to locate {}", args.path.display()))?;
            Url::from_file_path(&path)
                .map_err(|_| anyhow::anyhow!("Invalid manifest path: {}", path.display()))?
        }
    };

    let file = File::open(&args.path)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;
    tracing::info!(%url, "Parsing manifest");
    let manifest = DashManifestParser::new().parse(&url, BufReader::new(file))?;

    let now = args.now.unwrap_or_else(Utc::now);
    let report = report::ManifestReport::new(&manifest, now, args.segments);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }

    Ok(())
}
