use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::ChannelConfig;
use crate::error::{DataIntegrityError, GuideError, IntegrityViolation, Result};
use crate::event::{Event, UNKNOWN_TITLE};
use crate::window::{Block, EntryKind, Phase, PhaseTally, Selection};

/// Longest channel display name, in characters, before it is cut.
pub const MAX_DISPLAY_LEN: usize = 38;

pub fn channel_id(play_id: &str) -> String {
    format!("dl-{play_id}")
}

/// Channel of the standby countdown that precedes an event's own channel.
pub fn standby_channel_id(play_id: &str) -> String {
    format!("dl-{play_id}-standby")
}

pub fn deep_link(scheme: &str, play_id: &str) -> String {
    format!("{scheme}://x-callback-url/showWatchStream?playID={play_id}")
}

/// A selected entry with its channel identity attached.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideEntry {
    pub event: Event,
    pub phase: Phase,
    pub kind: EntryKind,
    pub blocks: Vec<Block>,
    pub channel_number: u32,
    pub channel_id: String,
    pub display_name: String,
    /// `None` for standby fillers, which have nothing to play yet.
    pub deep_link: Option<String>,
}

impl GuideEntry {
    pub fn is_filler(&self) -> bool {
        self.kind == EntryKind::Standby
    }
}

/// The one selection both artifacts are rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineup {
    pub now: DateTime<Utc>,
    /// Channel-number order: playable entries first, then standby fillers.
    pub entries: Vec<GuideEntry>,
    pub tally: PhaseTally,
}

impl Lineup {
    pub fn playable(&self) -> impl Iterator<Item = &GuideEntry> {
        self.entries.iter().filter(|e| !e.is_filler())
    }

    pub fn fillers(&self) -> impl Iterator<Item = &GuideEntry> {
        self.entries.iter().filter(|e| e.is_filler())
    }
}

/// Hands out channel numbers and ids for one run.
///
/// Ids come from the play id alone, so they survive re-generation. Numbers are
/// dense from the configured base in selection order, playable entries first,
/// and only mean something within the run that produced them.
pub struct ChannelAssigner {
    base: u32,
    scheme: String,
}

impl ChannelAssigner {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            base: config.base,
            scheme: config.scheme.clone(),
        }
    }

    pub fn assign(&self, selection: Selection) -> Result<Lineup> {
        let (playable, fillers): (Vec<_>, Vec<_>) = selection
            .entries
            .into_iter()
            .partition(|s| s.kind == EntryKind::Event);

        let mut taken = BTreeSet::new();
        let mut next = Some(self.base);
        let mut entries = Vec::with_capacity(playable.len() + fillers.len());

        for selected in playable.into_iter().chain(fillers) {
            let play_id = selected.event.play_id.as_str();
            let (channel_id, deep_link) = match selected.kind {
                EntryKind::Event => (channel_id(play_id), Some(deep_link(&self.scheme, play_id))),
                EntryKind::Standby => (standby_channel_id(play_id), None),
            };

            // Keyed on the id itself: a filler for `x` and an event `x-standby` share one.
            if !taken.insert(channel_id.clone()) {
                if selected.kind == EntryKind::Standby {
                    warn!(
                        play_id,
                        channel_id = %channel_id,
                        "channel id already taken, dropping standby filler"
                    );
                    continue;
                }
                return Err(DataIntegrityError {
                    play_id: Some(selected.event.play_id),
                    row: 0,
                    violation: IntegrityViolation::DuplicatePlayId,
                }
                .into());
            }

            let channel_number =
                next.ok_or_else(|| GuideError::Render("channel numbers exhausted".to_string()))?;
            next = channel_number.checked_add(1);

            entries.push(GuideEntry {
                display_name: shorten_title(&selected.event.title, MAX_DISPLAY_LEN),
                channel_number,
                channel_id,
                deep_link,
                event: selected.event,
                phase: selected.phase,
                kind: selected.kind,
                blocks: selected.blocks,
            });
        }

        debug!(channels = entries.len(), base = self.base, "assigned channels");
        Ok(Lineup {
            now: selection.now,
            entries,
            tally: selection.tally,
        })
    }
}

/// Channel-friendly title: symbol and emoji runs removed, whitespace collapsed,
/// cut on a word boundary past `max_len` characters.
pub fn shorten_title(title: &str, max_len: usize) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if is_spacing(c) { ' ' } else { c })
        .filter(|c| !is_decoration(*c))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        return UNKNOWN_TITLE.to_string();
    }
    if collapsed.chars().count() <= max_len {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(max_len + 1).collect();
    let head = match cut.rsplit_once(' ') {
        Some((head, _)) if !head.trim().is_empty() => head.to_string(),
        _ => collapsed.chars().take(max_len).collect(),
    };
    format!("{}…", head.trim_end())
}

fn is_spacing(c: char) -> bool {
    matches!(c, '\u{2000}'..='\u{200B}' | '\u{202F}' | '\u{205F}')
}

fn is_decoration(c: char) -> bool {
    matches!(
        c,
        '\u{200C}'..='\u{200F}'
            | '\u{2060}'..='\u{206F}'
            | '\u{2100}'..='\u{27FF}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{1F000}'..='\u{1FAFF}'
    )
}
