//! Keybinding configuration: parse `keybinds.conf`, provide defaults, and map keys to actions.
//!
//! Only the directory list is driven by the keymap. While the form has focus,
//! keys are text input and are handled directly by the update loop.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;
use std::path::Path;

/// Semantic actions available while browsing the directory list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyAction {
    /// Exit the application.
    Quit,
    /// Show the help modal.
    OpenHelp,
    /// Clear the form and start a new entry.
    NewUser,
    /// Load the selected record into the form.
    EditSelection,
    /// Ask to delete the selected record.
    DeleteSelection,
    /// Re-read the collection from the service.
    Refresh,
    /// Fetch the selected record alone and show its details.
    ShowDetails,
    /// Move focus between the list and the form.
    ToggleFocus,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    /// Bound but does nothing.
    Ignore,
}

const ALL_ACTIONS: [(&str, KeyAction); 13] = [
    ("Quit", KeyAction::Quit),
    ("OpenHelp", KeyAction::OpenHelp),
    ("NewUser", KeyAction::NewUser),
    ("EditSelection", KeyAction::EditSelection),
    ("DeleteSelection", KeyAction::DeleteSelection),
    ("Refresh", KeyAction::Refresh),
    ("ShowDetails", KeyAction::ShowDetails),
    ("ToggleFocus", KeyAction::ToggleFocus),
    ("MoveUp", KeyAction::MoveUp),
    ("MoveDown", KeyAction::MoveDown),
    ("PageUp", KeyAction::PageUp),
    ("PageDown", KeyAction::PageDown),
    ("Ignore", KeyAction::Ignore),
];

/// Mapping from `(modifiers, code)` to [`KeyAction`].
#[derive(Clone, Debug)]
pub struct Keymap {
    bindings: HashMap<(KeyModifiers, KeyCode), KeyAction>,
}

impl Keymap {
    /// Default bindings: arrows and vim keys for movement, single letters for commands.
    pub fn new_defaults() -> Self {
        use KeyCode::*;
        use KeyModifiers as M;
        let mut bindings = HashMap::new();
        bindings.insert((M::NONE, Char('q')), KeyAction::Quit);
        bindings.insert((M::CONTROL, Char('c')), KeyAction::Quit);
        bindings.insert((M::NONE, Esc), KeyAction::Ignore);
        bindings.insert((M::NONE, Char('?')), KeyAction::OpenHelp);
        bindings.insert((M::NONE, Char('n')), KeyAction::NewUser);
        bindings.insert((M::NONE, Char('e')), KeyAction::EditSelection);
        bindings.insert((M::NONE, Enter), KeyAction::EditSelection);
        bindings.insert((M::NONE, Char('d')), KeyAction::DeleteSelection);
        bindings.insert((M::NONE, Delete), KeyAction::DeleteSelection);
        bindings.insert((M::NONE, Char('r')), KeyAction::Refresh);
        bindings.insert((M::NONE, Char('i')), KeyAction::ShowDetails);
        bindings.insert((M::NONE, Tab), KeyAction::ToggleFocus);
        bindings.insert((M::NONE, Up), KeyAction::MoveUp);
        bindings.insert((M::NONE, Down), KeyAction::MoveDown);
        bindings.insert((M::NONE, Char('k')), KeyAction::MoveUp);
        bindings.insert((M::NONE, Char('j')), KeyAction::MoveDown);
        bindings.insert((M::NONE, PageUp), KeyAction::PageUp);
        bindings.insert((M::NONE, PageDown), KeyAction::PageDown);
        Self { bindings }
    }

    /// Load from `path`, or write the defaults there if it does not exist.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::from_file(path).unwrap_or_default();
        }
        let km = Self::default();
        let _ = km.write_file(path);
        km
    }

    /// Read `Action = KeySpec` lines on top of the defaults.
    pub fn from_file(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        Some(Self::parse(&contents))
    }

    fn parse(contents: &str) -> Self {
        let mut map = Self::default();
        for raw in contents.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, '=');
            let lhs = parts.next().map(|s| s.trim()).unwrap_or("");
            let rhs = parts.next().map(|s| s.trim()).unwrap_or("");
            if let (Some(action), Some(key)) = (parse_action(lhs), parse_key(rhs)) {
                map.bindings.insert(key, action);
            }
        }
        map
    }

    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut buf = String::new();
        buf.push_str("# userdir-client keybindings\n");
        buf.push_str("# Format: <Action> = <KeySpec>\n");
        buf.push_str("# KeySpec examples: q, Ctrl+c, Enter, Esc, Tab, Up, Down, PageUp, PageDown, Delete\n\n");
        let mut rows: Vec<(String, &str)> = self
            .bindings
            .iter()
            .map(|((mods, code), action)| (Self::format_key(*mods, *code), format_action(*action)))
            .collect();
        rows.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(&b.0)));
        for (key, action) in rows {
            let _ = writeln!(&mut buf, "{action} = {key}");
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, buf)
    }

    pub fn resolve(&self, key: &KeyEvent) -> Option<KeyAction> {
        self.bindings.get(&(key.modifiers, key.code)).copied()
    }

    /// Keys bound to `action`, formatted for display.
    pub fn keys_for(&self, action: KeyAction) -> Vec<String> {
        let mut keys: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|((m, c), _)| Self::format_key(*m, *c))
            .collect();
        keys.sort();
        keys
    }

    /// Format a key like "Ctrl+c" or "PageUp".
    pub fn format_key(mods: KeyModifiers, code: KeyCode) -> String {
        use KeyCode::*;
        let base = match code {
            Enter => "Enter".to_string(),
            Delete => "Delete".to_string(),
            Esc => "Esc".to_string(),
            Tab => "Tab".to_string(),
            BackTab => "BackTab".to_string(),
            Up => "Up".to_string(),
            Down => "Down".to_string(),
            Left => "Left".to_string(),
            Right => "Right".to_string(),
            PageUp => "PageUp".to_string(),
            PageDown => "PageDown".to_string(),
            Char(c) => c.to_string(),
            _ => format!("{:?}", code),
        };
        if mods.contains(KeyModifiers::CONTROL) {
            format!("Ctrl+{}", base)
        } else {
            base
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new_defaults()
    }
}

fn parse_key(spec: &str) -> Option<(KeyModifiers, KeyCode)> {
    use KeyCode::*;
    let s = spec.trim();
    let (mods, rest) = match s.strip_prefix("Ctrl+") {
        Some(after) => (KeyModifiers::CONTROL, after),
        None => (KeyModifiers::NONE, s),
    };
    let code = match rest {
        "Enter" => Enter,
        "Delete" => Delete,
        "Esc" | "Escape" => Esc,
        "Tab" => Tab,
        "BackTab" => BackTab,
        "Up" => Up,
        "Down" => Down,
        "Left" => Left,
        "Right" => Right,
        "PageUp" => PageUp,
        "PageDown" => PageDown,
        _ => {
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Char(c),
                _ => return None,
            }
        }
    };
    Some((mods, code))
}

fn parse_action(s: &str) -> Option<KeyAction> {
    ALL_ACTIONS.iter().find(|(name, _)| *name == s.trim()).map(|(_, a)| *a)
}

pub fn format_action(a: KeyAction) -> &'static str {
    ALL_ACTIONS
        .iter()
        .find(|(_, action)| *action == a)
        .map(|(name, _)| *name)
        .unwrap_or("Ignore")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_binding_overrides_default() {
        let km = Keymap::parse("Refresh = F\nQuit = Ctrl+x\n# Bogus = z\nNotAnAction = y\n");
        let f = KeyEvent::new(KeyCode::Char('F'), KeyModifiers::NONE);
        assert_eq!(km.resolve(&f), Some(KeyAction::Refresh));
        let cx = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
        assert_eq!(km.resolve(&cx), Some(KeyAction::Quit));
        let y = KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE);
        assert_eq!(km.resolve(&y), None);
    }

    #[test]
    fn action_names_round_trip() {
        for (name, action) in ALL_ACTIONS {
            assert_eq!(parse_action(name), Some(action));
            assert_eq!(format_action(action), name);
        }
    }

    #[test]
    fn keys_for_lists_all_bindings() {
        let km = Keymap::default();
        assert_eq!(km.keys_for(KeyAction::DeleteSelection), vec!["Delete", "d"]);
    }
}
