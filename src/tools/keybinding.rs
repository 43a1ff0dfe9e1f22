// SPDX-License-Identifier: MPL-2.0
//! Keybinding matching for tools.

use serde::{Deserialize, Serialize};

/// A keyboard event as delivered by the host surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyEvent {
    /// Main key, lower case ("s", "escape", "tab").
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// When a binding is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeybindingScope {
    #[default]
    Always,
    OnlyWhileActive,
}

/// One chord bound to a command, e.g. `["ctrl", "z"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keybinding {
    pub keys: Vec<String>,
    pub command: String,
    #[serde(default)]
    pub scope: KeybindingScope,
}

impl Keybinding {
    pub fn new(keys: &[&str], command: impl Into<String>) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            command: command.into(),
            scope: KeybindingScope::Always,
        }
    }

    pub fn while_active(mut self) -> Self {
        self.scope = KeybindingScope::OnlyWhileActive;
        self
    }

    /// Strict chord match: every listed modifier must be held, no
    /// unlisted modifier may be, and the main key must be equal
    /// (case-insensitive).
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let mut ctrl = false;
        let mut shift = false;
        let mut alt = false;
        let mut meta = false;
        let mut main: Option<&str> = None;

        for key in &self.keys {
            match key.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => ctrl = true,
                "shift" => shift = true,
                "alt" | "option" => alt = true,
                "meta" | "cmd" | "super" => meta = true,
                _ => main = Some(key),
            }
        }

        let Some(main) = main else { return false };
        ctrl == event.ctrl
            && shift == event.shift
            && alt == event.alt
            && meta == event.meta
            && main.eq_ignore_ascii_case(&event.key)
    }
}
