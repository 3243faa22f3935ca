use crate::channel::{GuideEntry, Lineup};
use crate::config::ChannelConfig;
use crate::error::{GuideError, Result};

/// One playable channel line of the M3U playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub channel_number: u32,
    pub channel_id: String,
    pub name: String,
    pub deep_link: String,
}

impl PlaylistEntry {
    fn from_guide_entry(entry: &GuideEntry) -> Result<Self> {
        let Some(deep_link) = entry.deep_link.clone() else {
            return Err(GuideError::Render(format!(
                "playable channel {} has no deep link",
                entry.channel_id
            )));
        };
        if deep_link.contains(&['\r', '\n'][..]) {
            return Err(GuideError::Render(format!(
                "deep link for {} spans multiple lines",
                entry.channel_id
            )));
        }

        let suffix = entry
            .event
            .league
            .as_deref()
            .or(entry.event.sport.as_deref());
        let name = match suffix {
            Some(suffix) => format!("{} ({suffix})", entry.display_name),
            None => entry.display_name.clone(),
        };

        Ok(Self {
            channel_number: entry.channel_number,
            channel_id: entry.channel_id.clone(),
            name,
            deep_link,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub group_title: String,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn render(&self) -> String {
        let mut body = String::new();
        body.push_str("#EXTM3U\n");

        let group = attribute(&self.group_title);
        for entry in &self.entries {
            let name = attribute(&entry.name);
            body.push_str(
                format!(
                    "#EXTINF:-1 tvg-id=\"{}\" tvg-chno=\"{}\" tvg-name=\"{name}\" tvg-logo=\"\" group-title=\"{group}\",{name}\n",
                    attribute(&entry.channel_id),
                    entry.channel_number,
                )
                .as_str(),
            );
            body.push_str(format!("{}\n", entry.deep_link).as_str());
        }

        body
    }
}

/// Builds the playlist from the playable entries of a [`Lineup`]; fillers are skipped.
pub struct PlaylistRenderer {
    group_title: String,
}

impl PlaylistRenderer {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            group_title: config.group_title.clone(),
        }
    }

    pub fn playlist(&self, lineup: &Lineup) -> Result<Playlist> {
        let entries = lineup
            .playable()
            .map(PlaylistEntry::from_guide_entry)
            .collect::<Result<Vec<_>>>()?;

        Ok(Playlist {
            group_title: self.group_title.clone(),
            entries,
        })
    }

    pub fn render(&self, lineup: &Lineup) -> Result<String> {
        Ok(self.playlist(lineup)?.render())
    }
}

/// Keep a value inside one double-quoted attribute on one line.
fn attribute(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' => '\'',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::channel::ChannelAssigner;
    use crate::event::Event;
    use crate::window::{WindowConfig, WindowSelector};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
    }

    fn event(id: &str, title: &str, start: TimeDelta, stop: TimeDelta) -> Event {
        Event {
            play_id: id.to_string(),
            title: title.to_string(),
            sport: None,
            league: None,
            start: now() + start,
            stop: now() + stop,
            is_live: None,
        }
    }

    fn lineup(events: Vec<Event>) -> Lineup {
        let selection = WindowSelector::new(WindowConfig::default()).select(events, now());
        ChannelAssigner::new(&ChannelConfig::default())
            .assign(selection)
            .unwrap()
    }

    #[test]
    pub fn test_playlist_document() {
        let mut live = event("p1", "Rangers vs. Bruins", TimeDelta::hours(-1), TimeDelta::hours(1));
        live.league = Some("NHL".to_string());
        let mut upcoming = event("p2", "Spurs \"at\" Heat", TimeDelta::hours(2), TimeDelta::hours(4));
        upcoming.sport = Some("Basketball".to_string());
        let ended = event("p0", "Morning Race", TimeDelta::hours(-5), TimeDelta::minutes(-10));
        let standby = event("p3", "Night Game", TimeDelta::hours(5), TimeDelta::hours(7));

        let lineup = lineup(vec![upcoming, standby, live, ended]);
        let m3u = PlaylistRenderer::new(&ChannelConfig::default())
            .render(&lineup)
            .unwrap();

        let expected = r#"#EXTM3U
#EXTINF:-1 tvg-id="dl-p0" tvg-chno="31000" tvg-name="Morning Race" tvg-logo="" group-title="ESPN+",Morning Race
sportscenter://x-callback-url/showWatchStream?playID=p0
#EXTINF:-1 tvg-id="dl-p1" tvg-chno="31001" tvg-name="Rangers vs. Bruins (NHL)" tvg-logo="" group-title="ESPN+",Rangers vs. Bruins (NHL)
sportscenter://x-callback-url/showWatchStream?playID=p1
#EXTINF:-1 tvg-id="dl-p2" tvg-chno="31002" tvg-name="Spurs 'at' Heat (Basketball)" tvg-logo="" group-title="ESPN+",Spurs 'at' Heat (Basketball)
sportscenter://x-callback-url/showWatchStream?playID=p2
"#;
        assert_eq!(m3u, expected);
    }

    #[test]
    pub fn test_empty_playlist() {
        let m3u = PlaylistRenderer::new(&ChannelConfig::default())
            .render(&lineup(Vec::new()))
            .unwrap();
        assert_eq!(m3u, "#EXTM3U\n");
    }

    #[test]
    pub fn test_missing_deep_link_is_render_error() {
        let mut lineup = lineup(vec![event("p1", "A", TimeDelta::hours(-1), TimeDelta::hours(1))]);
        lineup.entries[0].deep_link = None;

        let renderer = PlaylistRenderer::new(&ChannelConfig::default());
        assert!(matches!(renderer.render(&lineup), Err(GuideError::Render(_))));

        lineup.entries[0].deep_link = Some("scheme://x\nbad".to_string());
        assert!(matches!(renderer.render(&lineup), Err(GuideError::Render(_))));
    }

    #[test]
    pub fn test_attribute_folding() {
        assert_eq!(attribute("a\"b\nc"), "a'b c");
    }
}
