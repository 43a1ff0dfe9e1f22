// SPDX-License-Identifier: MPL-2.0
//! Editor tools: the [`Tool`] trait, per-tool configuration and the
//! arbitration logic in [`manager::ToolManager`].

pub mod keybinding;
pub mod manager;

pub use keybinding::{KeyEvent, Keybinding, KeybindingScope};
pub use manager::ToolManager;

use crate::annotation::AnnotationType;
use crate::handles::Handle;

pub const SELECT_TOOL: &str = "select_tool";
pub const EDIT_TOOL: &str = "edit_tool";
pub const COMMENTATOR_TOOL: &str = "commentator";
pub const ZOOM_TOOL: &str = "zoom_tool";

/// Tools that stay usable on completed (effectively read-only) items.
pub const COMPLETE_ITEM_TOOLS: [&str; 3] = [SELECT_TOOL, COMMENTATOR_TOOL, ZOOM_TOOL];

/// Mouse cursor requested by the active tool. Reset to [`Default`] on
/// every deactivation.
///
/// [`Default`]: EditorCursor::Default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorCursor {
    #[default]
    Default,
    Crosshair,
    Grab,
    Pointer,
    Move,
}

/// Resources a tool acquires while active. Handles collected here are
/// released when the tool deactivates, whether or not the tool
/// remembered to do so itself.
#[derive(Debug, Default)]
pub struct ToolContext {
    pub handles: Vec<Handle>,
}

impl ToolContext {
    pub fn push_handle(&mut self, handle: Handle) {
        self.handles.push(handle);
    }
}

/// One editor tool. Implementations hold their own interaction state;
/// activation bookkeeping lives in the manager.
pub trait Tool: Send {
    fn activate(&mut self, context: &mut ToolContext);

    fn deactivate(&mut self, context: &mut ToolContext);

    /// Drops transient interaction state, e.g. on view switches.
    fn reset(&mut self);

    /// For sub-annotation tools: binds the master annotation the tool
    /// operates under.
    fn select_master_annotation(&mut self, _annotation_id: &str) {}
}

/// Static configuration of a registered tool.
#[derive(Debug, Clone, Default)]
pub struct ToolConfig {
    pub name: String,
    pub icon: String,
    /// Annotation types this tool can create.
    pub annotation_types: Vec<AnnotationType>,
    pub keybindings: Vec<Keybinding>,
    /// Lower value sorts earlier in the toolbar; unprioritized tools go
    /// last in registration order.
    pub priority: Option<u32>,
    /// Sub-annotation tools are excluded from the toolbar and never
    /// become the "previous" tool.
    pub sub: bool,
    pub disabled: bool,
}

impl ToolConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A registered tool with its live activation state.
pub struct ToolEntry {
    pub name: String,
    pub tool: Box<dyn Tool>,
    pub config: ToolConfig,
    pub context: ToolContext,
    pub active: bool,
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("active", &self.active)
            .field("sub", &self.config.sub)
            .finish()
    }
}
