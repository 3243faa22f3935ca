use chrono::{DateTime, TimeDelta, Utc};

use crate::channel::{GuideEntry, Lineup};
use crate::config::ChannelConfig;
use crate::error::{GuideError, Result};
use crate::window::{Block, BlockKind};

pub const STAND_BY_TITLE: &str = "STAND BY";
pub const EVENT_ENDED_TITLE: &str = "EVENT ENDED";

const GENERATOR: &str = "deeplinks";
const LANG: &str = "en";

/// Serializes a [`Lineup`] as an XMLTV grid guide.
pub struct GuideRenderer {
    network_alias: String,
}

impl GuideRenderer {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            network_alias: config.network_alias.clone(),
        }
    }

    pub fn render(&self, lineup: &Lineup) -> Result<String> {
        let mut body = String::new();
        body.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        body.push_str("<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n");
        body.push_str(format!("<tv generator-info-name=\"{GENERATOR}\">\n").as_str());

        // XMLTV wants every channel ahead of the first programme.
        for entry in &lineup.entries {
            self.push_channel(&mut body, entry)?;
        }
        for entry in &lineup.entries {
            for block in &entry.blocks {
                push_programme(&mut body, entry, block)?;
            }
        }

        body.push_str("</tv>\n");
        Ok(body)
    }

    fn push_channel(&self, body: &mut String, entry: &GuideEntry) -> Result<()> {
        if entry.channel_id.is_empty() {
            return Err(GuideError::Render(format!(
                "channel for {} has no id",
                entry.event.play_id
            )));
        }

        body.push_str(format!("  <channel id=\"{}\">\n", escape(&entry.channel_id)).as_str());
        body.push_str(
            format!("    <display-name>{}</display-name>\n", escape(&entry.display_name)).as_str(),
        );
        body.push_str(
            format!("    <display-name>{}</display-name>\n", escape(&self.network_alias)).as_str(),
        );
        body.push_str("  </channel>\n");
        Ok(())
    }
}

fn push_programme(body: &mut String, entry: &GuideEntry, block: &Block) -> Result<()> {
    if block.stop < block.start {
        return Err(GuideError::Render(format!(
            "programme on {} stops before it starts",
            entry.channel_id
        )));
    }

    let event = &entry.event;
    let (title, desc, categories) = match block.kind {
        BlockKind::StandBy { starts_in } => (
            STAND_BY_TITLE,
            Some(format!("{} starts in {}", event.title, countdown(starts_in))),
            Vec::new(),
        ),
        BlockKind::Event => {
            let mut categories = vec!["Sports", "Sports event"];
            categories.extend(event.sport.as_deref());
            categories.extend(event.league.as_deref());
            (event.title.as_str(), None, categories)
        }
        BlockKind::Trailing => (event.title.as_str(), Some("Final".to_string()), Vec::new()),
        BlockKind::Ended => (EVENT_ENDED_TITLE, None, Vec::new()),
    };

    body.push_str(
        format!(
            "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n",
            xmltv_time(block.start),
            xmltv_time(block.stop),
            escape(&entry.channel_id)
        )
        .as_str(),
    );
    body.push_str(format!("    <title lang=\"{LANG}\">{}</title>\n", escape(title)).as_str());
    if let Some(desc) = desc {
        body.push_str(format!("    <desc lang=\"{LANG}\">{}</desc>\n", escape(&desc)).as_str());
    }
    for category in categories {
        body.push_str(
            format!("    <category lang=\"{LANG}\">{}</category>\n", escape(category)).as_str(),
        );
    }
    body.push_str("  </programme>\n");
    Ok(())
}

/// `YYYYMMDDHHMMSS +0000`
pub fn xmltv_time(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d%H%M%S +0000").to_string()
}

fn countdown(d: TimeDelta) -> String {
    let minutes = d.num_minutes().max(0);
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Escape markup characters and drop anything XML 1.0 cannot carry.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}' => {
                out.push(c)
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod test {
    use chrono::{TimeDelta, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::channel::ChannelAssigner;
    use crate::event::Event;
    use crate::window::{WindowConfig, WindowSelector};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
    }

    fn render(events: Vec<Event>) -> String {
        let selection = WindowSelector::new(WindowConfig::default()).select(events, now());
        let config = ChannelConfig::default();
        let lineup = ChannelAssigner::new(&config).assign(selection).unwrap();
        GuideRenderer::new(&config).render(&lineup).unwrap()
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

    #[test]
    pub fn test_live_document() {
        let mut live = event(
            "p1",
            "Rangers vs. Bruins",
            TimeDelta::hours(-1),
            TimeDelta::hours(1),
        );
        live.sport = Some("Hockey".to_string());
        live.league = Some("NHL".to_string());

        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="deeplinks">
  <channel id="dl-p1">
    <display-name>Rangers vs. Bruins</display-name>
    <display-name>ESPN+</display-name>
  </channel>
  <programme start="20250301170000 +0000" stop="20250301190000 +0000" channel="dl-p1">
    <title lang="en">Rangers vs. Bruins</title>
    <category lang="en">Sports</category>
    <category lang="en">Sports event</category>
    <category lang="en">Hockey</category>
    <category lang="en">NHL</category>
  </programme>
</tv>
"#;
        assert_eq!(render(vec![live]), expected);
    }

    #[test]
    pub fn test_empty_document() {
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="deeplinks">
</tv>
"#;
        assert_eq!(render(Vec::new()), expected);
    }

    #[test]
    pub fn test_ended_recent_tiles() {
        let ended = event(
            "p2",
            "Late Match",
            TimeDelta::hours(-5),
            TimeDelta::minutes(-10),
        );
        let xml = render(vec![ended]);

        assert!(xml.contains(
            "<programme start=\"20250301175000 +0000\" stop=\"20250301182500 +0000\" channel=\"dl-p2\">\n    <title lang=\"en\">Late Match</title>\n    <desc lang=\"en\">Final</desc>"
        ));
        assert!(xml.contains(
            "<programme start=\"20250301182500 +0000\" stop=\"20250301185500 +0000\" channel=\"dl-p2\">\n    <title lang=\"en\">EVENT ENDED</title>"
        ));
    }

    #[test]
    pub fn test_standby_filler_channel() {
        let standby = event("p3", "Night Game", TimeDelta::hours(5), TimeDelta::hours(7));
        let xml = render(vec![standby]);

        assert!(xml.contains("<channel id=\"dl-p3-standby\">"));
        assert!(!xml.contains("<channel id=\"dl-p3\">"));
        assert_eq!(xml.matches("<title lang=\"en\">STAND BY</title>").count(), 12);
        assert!(xml.contains("<desc lang=\"en\">Night Game starts in 6h</desc>"));
        assert!(xml.contains("<desc lang=\"en\">Night Game starts in 30m</desc>"));
        assert!(!xml.contains("<title lang=\"en\">Night Game</title>"));
    }

    #[test]
    pub fn test_escaping() {
        let tricky = event(
            "p4",
            "Tom & Jerry <Cup> \"Final\"\u{1}",
            TimeDelta::hours(-1),
            TimeDelta::hours(1),
        );
        let xml = render(vec![tricky]);
        assert!(xml.contains("<title lang=\"en\">Tom &amp; Jerry &lt;Cup&gt; &quot;Final&quot;</title>"));
        assert!(!xml.contains('\u{1}'));
    }

    #[test]
    pub fn test_xmltv_time_and_countdown() {
        assert_eq!(xmltv_time(now()), "20250301180000 +0000");
        assert_eq!(countdown(TimeDelta::minutes(150)), "2h 30m");
        assert_eq!(countdown(TimeDelta::minutes(120)), "2h");
        assert_eq!(countdown(TimeDelta::minutes(10)), "10m");
    }
}
