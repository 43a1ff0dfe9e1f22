// SPDX-License-Identifier: MPL-2.0
//! Named command registry. Tools expose their activation as
//! `<name>.activate` commands; keybindings and UI affordances fire
//! commands by name without holding tool references.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What a command does when fired.
#[derive(Clone)]
pub enum CommandAction {
    /// Activate the named tool. Resolved by the editor, which owns the
    /// tool manager.
    ActivateTool(String),
    /// Arbitrary callback.
    Callback(Arc<dyn Fn() + Send + Sync>),
}

impl std::fmt::Debug for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandAction::ActivateTool(name) => {
                f.debug_tuple("ActivateTool").field(name).finish()
            }
            CommandAction::Callback(_) => f.debug_tuple("Callback").finish(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Mutex<HashMap<String, CommandAction>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, action: CommandAction) {
        self.commands
            .lock()
            .expect("command registry poisoned")
            .insert(name.into(), action);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.commands
            .lock()
            .expect("command registry poisoned")
            .remove(name)
            .is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.commands
            .lock()
            .expect("command registry poisoned")
            .contains_key(name)
    }

    /// Looks a command up. Unknown names are logged and ignored.
    pub fn resolve(&self, name: &str) -> Option<CommandAction> {
        let action = self
            .commands
            .lock()
            .expect("command registry poisoned")
            .get(name)
            .cloned();
        if action.is_none() {
            tracing::warn!(command = name, "unknown command");
        }
        action
    }
}
