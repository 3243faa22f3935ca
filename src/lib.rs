pub mod channel;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod execution;
pub mod guide;
pub mod logging;
pub mod output;
pub mod playlist;
pub mod window;

pub use error::{GuideError, Result};
pub use execution::{generate, GuideBuilder, RunSummary};
