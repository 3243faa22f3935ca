use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{GuideError, Result};
use crate::event::Event;

/// Lifecycle of an event relative to the reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Standby,
    Upcoming,
    Live,
    EndedRecent,
    Expired,
}

/// Thresholds that decide which events are visible and how their time is tiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Events starting within this lead are `Upcoming` (inclusive).
    pub upcoming_horizon: TimeDelta,
    /// Events starting within this lead, but past `upcoming_horizon`, are `Standby` (inclusive).
    pub standby_horizon: TimeDelta,
    /// How long an event stays visible after `stop` (exclusive).
    pub post_end_grace: TimeDelta,
    /// Length of the "EVENT ENDED" tile closing the grace period.
    pub ended_tile: TimeDelta,
    pub standby_tile: TimeDelta,
    /// Standby tiles shorter than this are dropped.
    pub min_tile: TimeDelta,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            upcoming_horizon: TimeDelta::hours(3),
            standby_horizon: TimeDelta::hours(6),
            post_end_grace: TimeDelta::minutes(65),
            ended_tile: TimeDelta::minutes(30),
            standby_tile: TimeDelta::minutes(30),
            min_tile: TimeDelta::minutes(5),
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        let zero = TimeDelta::zero();
        if self.standby_tile <= zero {
            return Err(GuideError::configuration("standby tile length must be positive"));
        }
        if self.upcoming_horizon < zero || self.post_end_grace < zero || self.ended_tile < zero {
            return Err(GuideError::configuration("window thresholds must not be negative"));
        }
        if self.upcoming_horizon > self.standby_horizon {
            return Err(GuideError::configuration(
                "upcoming window must not exceed the standby window",
            ));
        }
        if self.ended_tile > self.post_end_grace {
            return Err(GuideError::configuration(
                "ended tile must fit inside the post-end grace period",
            ));
        }
        Ok(())
    }
}

/// Whether an entry stands for the event itself or for its standby countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    Event,
    Standby,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Countdown tile ahead of the start.
    StandBy { starts_in: TimeDelta },
    Event,
    /// Post-stop detail before the ended tile.
    Trailing,
    Ended,
}

/// One time block on an entry's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selected {
    pub event: Event,
    pub phase: Phase,
    pub kind: EntryKind,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTally {
    pub standby: usize,
    pub upcoming: usize,
    pub live: usize,
    pub ended_recent: usize,
    pub expired: usize,
    pub beyond_horizon: usize,
}

impl PhaseTally {
    fn record(&mut self, phase: Option<Phase>) {
        let slot = match phase {
            Some(Phase::Standby) => &mut self.standby,
            Some(Phase::Upcoming) => &mut self.upcoming,
            Some(Phase::Live) => &mut self.live,
            Some(Phase::EndedRecent) => &mut self.ended_recent,
            Some(Phase::Expired) => &mut self.expired,
            None => &mut self.beyond_horizon,
        };
        *slot += 1;
    }
}

/// The visible entries of one run, ordered by `(start, play_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub now: DateTime<Utc>,
    pub entries: Vec<Selected>,
    pub tally: PhaseTally,
}

pub struct WindowSelector {
    config: WindowConfig,
}

impl WindowSelector {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Phase of `event` at `now`, or `None` when it starts past the standby window.
    pub fn classify(&self, event: &Event, now: DateTime<Utc>) -> Option<Phase> {
        if (event.start <= now && now <= event.stop) || event.is_live == Some(true) {
            return Some(Phase::Live);
        }

        if now < event.start {
            let lead = event.start - now;
            if lead <= self.config.upcoming_horizon {
                Some(Phase::Upcoming)
            } else if lead <= self.config.standby_horizon {
                Some(Phase::Standby)
            } else {
                None
            }
        } else if now - event.stop < self.config.post_end_grace {
            Some(Phase::EndedRecent)
        } else {
            Some(Phase::Expired)
        }
    }

    pub fn select<I>(&self, events: I, now: DateTime<Utc>) -> Selection
    where
        I: IntoIterator<Item = Event>,
    {
        let mut tally = PhaseTally::default();
        let mut entries = Vec::new();

        for event in events {
            let phase = self.classify(&event, now);
            tally.record(phase);

            let (phase, kind) = match phase {
                Some(Phase::Expired) | None => continue,
                Some(Phase::Standby) => (Phase::Standby, EntryKind::Standby),
                Some(phase) => (phase, EntryKind::Event),
            };

            let blocks = self.layout(&event, phase);
            entries.push(Selected {
                event,
                phase,
                kind,
                blocks,
            });
        }

        entries.sort_by(|a, b| {
            (a.event.start, &a.event.play_id).cmp(&(b.event.start, &b.event.play_id))
        });

        debug!(?tally, selected = entries.len(), %now, "selected events");
        Selection {
            now,
            entries,
            tally,
        }
    }

    /// Blocks depend on the event and its phase only, never on `now` itself.
    fn layout(&self, event: &Event, phase: Phase) -> Vec<Block> {
        let mut blocks = Vec::new();
        match phase {
            Phase::Standby => {
                let anchor = event.start - self.config.standby_horizon;
                blocks.extend(self.standby_tiles(anchor, event.start));
            }
            Phase::Upcoming => {
                let anchor = event.start - self.config.upcoming_horizon;
                blocks.extend(self.standby_tiles(anchor, event.start));
                blocks.push(block(event.start, event.stop, BlockKind::Event));
            }
            // An override outside [start, stop] still shows the scheduled slot.
            Phase::Live => blocks.push(block(event.start, event.stop, BlockKind::Event)),
            Phase::EndedRecent => {
                let trailing_end = event.stop + (self.config.post_end_grace - self.config.ended_tile);
                blocks.push(block(event.start, event.stop, BlockKind::Event));
                blocks.push(block(event.stop, trailing_end, BlockKind::Trailing));
                blocks.push(block(
                    trailing_end,
                    event.stop + self.config.post_end_grace,
                    BlockKind::Ended,
                ));
            }
            Phase::Expired => {}
        }

        blocks.retain(|b| b.start < b.stop);
        blocks
    }

    /// Grid-aligned countdown tiles from the tile holding `anchor` up to `start`.
    fn standby_tiles(&self, anchor: DateTime<Utc>, start: DateTime<Utc>) -> Vec<Block> {
        let tile = self.config.standby_tile;
        if tile <= TimeDelta::zero() {
            return Vec::new();
        }

        let mut tiles = Vec::new();
        let mut cursor = floor_to_grid(anchor, tile);
        while cursor < start {
            let end = (cursor + tile).min(start);
            if end - cursor >= self.config.min_tile {
                tiles.push(block(
                    cursor,
                    end,
                    BlockKind::StandBy {
                        starts_in: start - cursor,
                    },
                ));
            }
            cursor = cursor + tile;
        }
        tiles
    }
}

fn block(start: DateTime<Utc>, stop: DateTime<Utc>, kind: BlockKind) -> Block {
    Block { start, stop, kind }
}

/// Round `t` down to a multiple of `tile` since the UNIX epoch.
pub fn floor_to_grid(t: DateTime<Utc>, tile: TimeDelta) -> DateTime<Utc> {
    let step = tile.num_seconds();
    if step <= 0 {
        return t;
    }
    let secs = t.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(step), 0).unwrap_or(t)
}
