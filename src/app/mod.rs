//! Application state types and entry glue.
//!
//! `AppState` wraps the [`DirectoryState`] store with the purely visual
//! state of the TUI: selection, focus, modal, status line. Helpers here also
//! resolve the per-user config directory and the theme.
//!
pub mod config;
pub mod keymap;
pub mod update;

use ratatui::style::Color;
use std::path::{Path, PathBuf};

use crate::api::UserId;
use crate::state::{DirectoryState, Field, RefreshOrdering};
use keymap::Keymap;

/// Which pane receives key input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Focus {
    List,
    Form,
}

/// Current input mode for key handling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    Modal,
}

/// Color palette for theming the TUI.
#[derive(Clone, Copy, Debug)]
pub struct Theme {
    pub text: Color,
    pub muted: Color,
    pub title: Color,
    pub border: Color,
    pub header_bg: Color,
    pub header_fg: Color,
    pub status_bg: Color,
    pub status_fg: Color,
    pub highlight_fg: Color,
    pub highlight_bg: Color,
    pub error_fg: Color,
}

impl Theme {
    /// Catppuccin Mocha theme defaults.
    pub fn mocha() -> Self {
        // Palette reference: https://github.com/catppuccin/catppuccin
        Self {
            text: Color::Rgb(0xcd, 0xd6, 0xf4),         // text
            muted: Color::Rgb(0x7f, 0x84, 0x9c),        // overlay1
            title: Color::Rgb(0xcb, 0xa6, 0xf7),        // mauve
            border: Color::Rgb(0x58, 0x5b, 0x70),       // surface2
            header_bg: Color::Rgb(0x31, 0x32, 0x44),    // surface0
            header_fg: Color::Rgb(0xb4, 0xbe, 0xfe),    // lavender
            status_bg: Color::Rgb(0x45, 0x47, 0x5a),    // surface1
            status_fg: Color::Rgb(0xcd, 0xd6, 0xf4),    // text
            highlight_fg: Color::Rgb(0xf9, 0xe2, 0xaf), // yellow
            highlight_bg: Color::Rgb(0x45, 0x47, 0x5a), // surface1
            error_fg: Color::Rgb(0xf3, 0x8b, 0xa8),     // red
        }
    }

    /// Load theme from a simple key=value file. Unknown or missing keys fall back to `mocha`.
    pub fn from_file(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        let mut theme = Self::mocha();

        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, '=');
            let key = parts.next().map(|s| s.trim()).unwrap_or("");
            let val = parts.next().map(|s| s.trim()).unwrap_or("");
            if let Some(color) = Self::parse_color(val) {
                match key {
                    "text" => theme.text = color,
                    "muted" => theme.muted = color,
                    "title" => theme.title = color,
                    "border" => theme.border = color,
                    "header_bg" => theme.header_bg = color,
                    "header_fg" => theme.header_fg = color,
                    "status_bg" => theme.status_bg = color,
                    "status_fg" => theme.status_fg = color,
                    "highlight_fg" => theme.highlight_fg = color,
                    "highlight_bg" => theme.highlight_bg = color,
                    "error_fg" => theme.error_fg = color,
                    _ => {}
                }
            }
        }

        Some(theme)
    }

    /// Parse a color from hex ("#RRGGBB" or "RRGGBB") or "reset".
    fn parse_color(s: &str) -> Option<Color> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "reset" {
            return Some(Color::Reset);
        }
        let hex = lower.strip_prefix('#').unwrap_or(lower.as_str());
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Color::Rgb(r, g, b))
    }

    /// Persist the theme to a config file in key=value format.
    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut buf = String::new();
        buf.push_str("# userdir-client theme configuration\n");
        buf.push_str("# Colors: hex as #RRGGBB or RRGGBB, or 'reset'\n\n");

        fn color_to_str(c: Color) -> String {
            match c {
                Color::Rgb(r, g, b) => format!("#{:02X}{:02X}{:02X}", r, g, b),
                Color::Reset => "reset".to_string(),
                Color::Black => "#000000".to_string(),
                Color::Red => "#FF0000".to_string(),
                Color::Yellow => "#FFFF00".to_string(),
                Color::Cyan => "#00FFFF".to_string(),
                Color::Gray => "#B3B3B3".to_string(),
                Color::DarkGray => "#4D4D4D".to_string(),
                Color::White => "#FFFFFF".to_string(),
                // best-effort for the rest
                _ => "reset".to_string(),
            }
        }

        for (k, v) in [
            ("text", self.text),
            ("muted", self.muted),
            ("title", self.title),
            ("border", self.border),
            ("header_bg", self.header_bg),
            ("header_fg", self.header_fg),
            ("status_bg", self.status_bg),
            ("status_fg", self.status_fg),
            ("highlight_fg", self.highlight_fg),
            ("highlight_bg", self.highlight_bg),
            ("error_fg", self.error_fg),
        ] {
            let _ = writeln!(&mut buf, "{} = {}", k, color_to_str(v));
        }

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, buf)
    }

    /// Load from `path`, writing the default theme there first if it is missing.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::from_file(path).unwrap_or_else(Self::mocha);
        }
        let t = Self::mocha();
        let _ = t.write_file(path);
        t
    }
}

/// Directory holding `client.conf`, `theme.conf`, `keybinds.conf` and the log.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("userdir-client"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Path of a named file inside [`config_dir`].
pub fn config_file_path(name: &str) -> PathBuf {
    config_dir().join(name)
}

/// Modal dialogs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModalState {
    /// Gate before a delete. `selected` is 0 for "Yes", 1 for "No".
    DeleteConfirm {
        id: UserId,
        name: String,
        selected: usize,
    },
    Info {
        message: String,
    },
    Help,
}

/// One-line feedback shown in the status bar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Error(String),
}

pub struct AppState {
    pub store: DirectoryState,
    pub selected_index: usize,
    pub rows_per_page: usize,
    pub focus: Focus,
    pub form_field: Field,
    pub input_mode: InputMode,
    pub modal: Option<ModalState>,
    pub status: Option<Status>,
    /// Requests dispatched and not yet completed.
    pub in_flight: usize,
    pub api_url: String,
    pub theme: Theme,
    pub keymap: Keymap,
}

impl AppState {
    pub fn new(ordering: RefreshOrdering, api_url: impl Into<String>, theme: Theme, keymap: Keymap) -> Self {
        Self {
            store: DirectoryState::new(ordering),
            selected_index: 0,
            rows_per_page: 10,
            focus: Focus::List,
            form_field: Field::Name,
            input_mode: InputMode::Normal,
            modal: None,
            status: None,
            in_flight: 0,
            api_url: api_url.into(),
            theme,
            keymap,
        }
    }

    /// Record currently highlighted in the list.
    pub fn selected_user(&self) -> Option<&crate::api::UserRecord> {
        self.store.users().get(self.selected_index)
    }

    /// Keep the selection inside the collection after it changed size.
    pub fn clamp_selection(&mut self) {
        let len = self.store.users().len();
        if self.selected_index >= len {
            self.selected_index = len.saturating_sub(1);
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RefreshOrdering::default(), config::DEFAULT_API_URL, Theme::mocha(), Keymap::default())
    }
}

/// Re-export the application event loop entry function.
pub use update::run_app as run;
