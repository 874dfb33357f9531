use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum RosterError {
    IoError(Error),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
}

impl From<Error> for RosterError {
    fn from(err: Error) -> Self {
        RosterError::IoError(err)
    }
}

impl From<serde_json::Error> for RosterError {
    fn from(err: serde_json::Error) -> Self {
        RosterError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ViewerConfig {
    /// Crossterm poll timeout in ms. Also paces the focus timer.
    pub event_poll_time: u64,
    /// Delay before the dropdown search input grabs the keyboard.
    pub focus_delay_ms: u64,
    /// Hard cap for rendered column width.
    pub max_column_width: usize,
    /// How long a transient status message stays visible, in ms.
    pub status_message_time: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            event_poll_time: 100,
            focus_delay_ms: 100,
            max_column_width: 24,
            status_message_time: 4000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
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
    OpenFilter,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
 roster-tv keys

 Up/Down/Left/Right   move cell selection
 PgUp/PgDn            move a page up/down
 Home/End             jump to first/last row
 / or f               open filter for the selected column
 y                    copy cell to clipboard
 Y                    copy row to clipboard (csv)
 ?                    this help
 Esc                  close popup / dropdown
 q                    quit

 In a search dropdown:
   Enter      confirm search (closes)
   Tab        apply search (stays open)
   Ctrl-r     reset search
   Esc        close without changes

 In a season/role dropdown:
   Up/Down    move, Space toggles a value
   Enter      confirm, Ctrl-r clear, Esc close
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_setters() {
        let cfg = ViewerConfig::default()
            .with_focus_delay_ms(0)
            .with_event_poll_time(10);
        assert_eq!(cfg.focus_delay_ms, 0);
        assert_eq!(cfg.event_poll_time, 10);
        assert_eq!(cfg.max_column_width, 24);
    }
}
