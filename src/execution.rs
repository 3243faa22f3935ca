use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::channel::{ChannelAssigner, Lineup};
use crate::config::Config;
use crate::db::EventStore;
use crate::error::{DataIntegrityError, Result};
use crate::event::validate_rows;
use crate::guide::GuideRenderer;
use crate::output::{Artifact, ArtifactSink, FileSink};
use crate::playlist::PlaylistRenderer;
use crate::window::{Phase, PhaseTally, WindowSelector};

const SAMPLE_COUNT: usize = 5;

/// Both documents of one run, rendered from the same [`Lineup`].
#[derive(Debug)]
pub struct Artifacts {
    pub lineup: Lineup,
    pub guide: String,
    pub playlist: String,
    pub rows_read: usize,
    pub rejected: Vec<DataIntegrityError>,
    pub merged: usize,
}

/// Runs store → selector → assigner → renderers → sink, once per call.
pub struct GuideBuilder {
    store: EventStore,
    selector: WindowSelector,
    assigner: ChannelAssigner,
    guide: GuideRenderer,
    playlist: PlaylistRenderer,
    guide_path: PathBuf,
    playlist_path: PathBuf,
}

impl GuideBuilder {
    pub fn new(store: EventStore, config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store,
            selector: WindowSelector::new(config.window),
            assigner: ChannelAssigner::new(&config.channels),
            guide: GuideRenderer::new(&config.channels),
            playlist: PlaylistRenderer::new(&config.channels),
            guide_path: config.guide_path.clone(),
            playlist_path: config.playlist_path.clone(),
        })
    }

    /// Render both artifacts in memory. Nothing is written.
    pub fn build(&self, now: DateTime<Utc>) -> Result<Artifacts> {
        let rows = self.store.read_rows()?;
        let rows_read = rows.len();

        let validated = validate_rows(rows);
        let selection = self.selector.select(validated.events, now);
        let lineup = self.assigner.assign(selection)?;

        let guide = self.guide.render(&lineup)?;
        let playlist = self.playlist.render(&lineup)?;

        Ok(Artifacts {
            lineup,
            guide,
            playlist,
            rows_read,
            rejected: validated.rejected,
            merged: validated.merged,
        })
    }

    /// Build, then hand both artifacts to `sink` as one set. A failed run
    /// leaves the previous guide and playlist in place together.
    #[instrument(skip_all, fields(now = %now))]
    pub fn run<S: ArtifactSink>(&self, now: DateTime<Utc>, sink: &S) -> Result<RunSummary> {
        let artifacts = self.build(now)?;

        sink.publish(&[
            Artifact {
                path: &self.guide_path,
                contents: &artifacts.guide,
            },
            Artifact {
                path: &self.playlist_path,
                contents: &artifacts.playlist,
            },
        ])?;

        let summary = RunSummary::new(self, &artifacts);
        info!(
            rows = summary.rows_read,
            skipped = summary.rows_skipped,
            merged = summary.rows_merged,
            channels = summary.guide_channels,
            programmes = summary.guide_programmes,
            playlist = summary.playlist_entries,
            "generated guide and playlist"
        );
        Ok(summary)
    }
}

/// Open the configured store and write both artifacts to disk.
pub fn generate(config: &Config, now: DateTime<Utc>) -> Result<RunSummary> {
    let store = EventStore::open(&config.db_path)?;
    GuideBuilder::new(store, config)?.run(now, &FileSink)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub now: DateTime<Utc>,
    pub source: PathBuf,
    pub rows_read: usize,
    pub rows_skipped: usize,
    /// Identical duplicates folded into the row that was kept.
    pub rows_merged: usize,
    pub phases: PhaseTally,
    pub guide_channels: usize,
    pub guide_programmes: usize,
    pub playlist_entries: usize,
    pub guide_path: PathBuf,
    pub playlist_path: PathBuf,
    pub samples: Vec<String>,
}

impl RunSummary {
    fn new(builder: &GuideBuilder, artifacts: &Artifacts) -> Self {
        let lineup = &artifacts.lineup;
        let samples = lineup
            .playable()
            .take(SAMPLE_COUNT)
            .map(|entry| match entry.phase {
                Phase::Live => format!("[LIVE] {}", entry.event.title),
                _ => entry.event.title.clone(),
            })
            .collect();

        Self {
            now: lineup.now,
            source: builder.store.location().to_path_buf(),
            rows_read: artifacts.rows_read,
            rows_skipped: artifacts.rejected.len(),
            rows_merged: artifacts.merged,
            phases: lineup.tally,
            guide_channels: lineup.entries.len(),
            guide_programmes: lineup.entries.iter().map(|e| e.blocks.len()).sum(),
            playlist_entries: lineup.playable().count(),
            guide_path: builder.guide_path.clone(),
            playlist_path: builder.playlist_path.clone(),
            samples,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database: {}", self.source.display())?;
        writeln!(f, "Time: {}", self.now.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "Rows: {} read, {} skipped, {} merged",
            self.rows_read, self.rows_skipped, self.rows_merged
        )?;
        writeln!(
            f,
            "Events: {} live, {} upcoming, {} standby, {} ended, {} expired, {} later",
            self.phases.live,
            self.phases.upcoming,
            self.phases.standby,
            self.phases.ended_recent,
            self.phases.expired,
            self.phases.beyond_horizon
        )?;
        writeln!(
            f,
            "Guide: {} ({} channels, {} programmes)",
            self.guide_path.display(),
            self.guide_channels,
            self.guide_programmes
        )?;
        writeln!(
            f,
            "Playlist: {} ({} channels)",
            self.playlist_path.display(),
            self.playlist_entries
        )?;
        for (i, sample) in self.samples.iter().enumerate() {
            writeln!(f, "  {}. {sample}", i + 1)?;
        }
        if self.playlist_entries > self.samples.len() {
            writeln!(f, "  ... and {} more", self.playlist_entries - self.samples.len())?;
        }
        Ok(())
    }
}
