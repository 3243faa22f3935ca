use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, ValueEnum};
use tracing::error;

use deeplinks::config::{ChannelConfig, Config, DEFAULT_LABEL, DEFAULT_SCHEME};
use deeplinks::event::parse_utc;
use deeplinks::window::WindowConfig;
use deeplinks::{generate, logging};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SummaryFormat {
    Text,
    Json,
}

/// Generate an XMLTV guide and an M3U playlist of deep-linked events.
#[derive(Parser)]
#[command(version)]
pub struct Cli {
    /// Schedule database written by the acquisition step.
    #[arg(long, env = "DEEPLINKS_DB", default_value = "out/espn_schedule.db")]
    pub db: PathBuf,

    #[arg(long, env = "DEEPLINKS_XML", default_value = "out/espn_plus.xml")]
    pub xml: PathBuf,

    #[arg(long, env = "DEEPLINKS_M3U", default_value = "out/espn_plus.m3u")]
    pub m3u: PathBuf,

    /// Events starting within this many hours are listed.
    #[arg(long, env = "DEEPLINKS_WINDOW_HOURS", default_value_t = 3)]
    pub window_hours: u32,

    /// Events starting within this many hours get standby tiles.
    #[arg(long, env = "DEEPLINKS_MAX_STANDBY_HOURS", default_value_t = 6)]
    pub max_standby_hours: u32,

    #[arg(long, env = "DEEPLINKS_STANDBY_TILE_MIN", default_value_t = 30)]
    pub standby_tile_min: u32,

    /// Minutes an event stays in the guide after it ends.
    #[arg(long, env = "DEEPLINKS_POST_END_GRACE_MIN", default_value_t = 65)]
    pub post_end_grace_min: u32,

    #[arg(long, env = "DEEPLINKS_ENDED_TILE_MIN", default_value_t = 30)]
    pub ended_tile_min: u32,

    #[arg(long, env = "DEEPLINKS_GROUP", default_value = DEFAULT_LABEL)]
    pub group: String,

    #[arg(long, env = "DEEPLINKS_PROVIDER_LABEL", default_value = DEFAULT_LABEL)]
    pub provider_label: String,

    /// URL scheme of the player app.
    #[arg(long, env = "DEEPLINKS_SCHEME", default_value = DEFAULT_SCHEME)]
    pub scheme: String,

    #[arg(long, env = "DEEPLINKS_CHANNEL_BASE", default_value_t = 31000)]
    pub channel_base: u32,

    /// Reference instant instead of the wall clock, e.g. 2025-03-01T18:00:00Z.
    #[arg(long, env = "DEEPLINKS_NOW", value_parser = parse_now)]
    pub now: Option<DateTime<Utc>>,

    #[arg(long, value_enum, default_value_t = SummaryFormat::Text)]
    pub summary: SummaryFormat,

    #[arg(long, env = "DEEPLINKS_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            db_path: self.db.clone(),
            guide_path: self.xml.clone(),
            playlist_path: self.m3u.clone(),
            window: WindowConfig {
                upcoming_horizon: TimeDelta::hours(self.window_hours.into()),
                standby_horizon: TimeDelta::hours(self.max_standby_hours.into()),
                post_end_grace: TimeDelta::minutes(self.post_end_grace_min.into()),
                ended_tile: TimeDelta::minutes(self.ended_tile_min.into()),
                standby_tile: TimeDelta::minutes(self.standby_tile_min.into()),
                ..WindowConfig::default()
            },
            channels: ChannelConfig {
                base: self.channel_base,
                scheme: self.scheme.clone(),
                network_alias: self.provider_label.clone(),
                group_title: self.group.clone(),
            },
        }
    }
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, String> {
    parse_utc(value).ok_or_else(|| format!("invalid timestamp {value:?}"))
}

pub fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = logging::init("info", cli.log_json) {
        eprintln!("failed to initialize logging: {err}");
    }

    let now = cli.now.unwrap_or_else(Utc::now);
    let summary = match generate(&cli.config(), now) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "generation failed");
            eprintln!("deeplinks: {err}");
            return ExitCode::from(err.exit_code());
        }
    };

    match cli.summary {
        SummaryFormat::Text => print!("{summary}"),
        SummaryFormat::Json => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!(error = %err, "failed to encode summary");
                eprintln!("deeplinks: failed to encode summary: {err}");
                return ExitCode::FAILURE;
            }
        },
    }

    ExitCode::SUCCESS
}
