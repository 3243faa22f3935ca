use std::path::PathBuf;

use crate::error::{GuideError, Result};
use crate::window::WindowConfig;

pub const DEFAULT_CHANNEL_BASE: u32 = 31000;
pub const DEFAULT_SCHEME: &str = "sportscenter";
pub const DEFAULT_LABEL: &str = "ESPN+";

/// How channels are numbered, named and linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// First channel number of a run.
    pub base: u32,
    /// URL scheme of the external player, e.g. `sportscenter`.
    pub scheme: String,
    /// Secondary `display-name` of every guide channel.
    pub network_alias: String,
    /// `group-title` of every playlist entry.
    pub group_title: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_CHANNEL_BASE,
            scheme: DEFAULT_SCHEME.to_string(),
            network_alias: DEFAULT_LABEL.to_string(),
            group_title: DEFAULT_LABEL.to_string(),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub guide_path: PathBuf,
    pub playlist_path: PathBuf,
    pub window: WindowConfig,
    pub channels: ChannelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("out/espn_schedule.db"),
            guide_path: PathBuf::from("out/espn_plus.xml"),
            playlist_path: PathBuf::from("out/espn_plus.m3u"),
            window: WindowConfig::default(),
            channels: ChannelConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        if self.channels.scheme.is_empty()
            || !self
                .channels
                .scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(GuideError::configuration(format!(
                "invalid deep link scheme {:?}",
                self.channels.scheme
            )));
        }
        Ok(())
    }
}
