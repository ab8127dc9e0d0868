use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const HELP_TEXT: &str = "\
Navigation
  j / Down        next row
  k / Up          previous row
  h / Left        previous column
  l / Right       next column
  PgDown / PgUp   page down / up
  g / G           first / last row
  Enter           show record
  Esc             back

Filter
  /               edit filter (live)
  Enter / Esc     keep / discard edit
  x               clear filter

Other
  c               copy cell
  C               copy row as csv
  r               reload source
  ?               this help
  q               quit";

#[derive(Debug, thiserror::Error)]
pub enum TVError {
    #[error("io error: {0}")]
    IoError(#[from] Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("invalid json: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("GET {url} returned status {status}")]
    FetchFailed { url: String, status: u16 },
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("collection '{0}' not found in payload")]
    CollectionNotFound(String),
    #[error("payload holds several collections ({0}), pick one with --collection")]
    AmbiguousCollection(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("a table needs at least one column")]
    EmptySchema,
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Filter,
    ClearFilter,
    Enter,
    Exit,
    Help,
    CopyCell,
    CopyRow,
    Reload,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub http_timeout_secs: u64,
    pub log_file: PathBuf,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            http_timeout_secs: 30,
            log_file: PathBuf::from("atv.log"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_setters_chain() {
        let cfg = TVConfig::default()
            .with_max_column_width(12)
            .with_event_poll_time(5);
        assert_eq!(cfg.max_column_width, 12);
        assert_eq!(cfg.event_poll_time, 5);
        assert_eq!(cfg.http_timeout_secs, 30);
    }

    #[test]
    fn io_errors_convert() {
        let err: TVError = Error::other("boom").into();
        assert!(matches!(err, TVError::IoError(_)));
        assert_eq!(err.to_string(), "io error: boom");
    }
}
