// SPDX-License-Identifier: MPL-2.0
//! Tool registration and activation arbitration.
//!
//! At most one tool is active at a time. Activating a tool deactivates
//! every other active tool first, releasing the handles it acquired and
//! resetting the cursor, so a tool can never observe a half-switched
//! editor. The last deactivated non-sub tool is remembered in a
//! one-slot "previous tool" so sub-tool excursions can return.

use std::sync::{Arc, Mutex};

use crate::annotation::{Annotation, AnnotationType};
use crate::commands::{CommandAction, CommandRegistry};
use crate::item::ItemStatus;

use super::keybinding::{KeyEvent, KeybindingScope};
use super::{EditorCursor, Tool, ToolConfig, ToolContext, ToolEntry, COMPLETE_ITEM_TOOLS, EDIT_TOOL};

pub struct ToolManager {
    entries: Vec<ToolEntry>,
    previous_tool: Option<String>,
    commands: Arc<CommandRegistry>,
    cursor: Arc<Mutex<EditorCursor>>,
}

impl ToolManager {
    pub fn new(commands: Arc<CommandRegistry>, cursor: Arc<Mutex<EditorCursor>>) -> Self {
        Self {
            entries: Vec::new(),
            previous_tool: None,
            commands,
            cursor,
        }
    }

    /// Registers a tool under `name`, replacing any previous
    /// registration, and exposes it as the `<name>.activate` command.
    ///
    /// A config whose `name` disagrees with `name` is rejected.
    pub fn register_tool(&mut self, name: &str, tool: Box<dyn Tool>, config: ToolConfig) -> bool {
        if config.name != name {
            tracing::warn!(
                tool = name,
                config_name = %config.name,
                "tool config name mismatch, registration refused"
            );
            return false;
        }
        if self.entries.iter().any(|entry| entry.name == name) {
            self.unregister_tool(name);
        }
        self.entries.push(ToolEntry {
            name: name.to_string(),
            tool,
            config,
            context: ToolContext::default(),
            active: false,
        });
        self.commands.register(
            format!("{name}.activate"),
            CommandAction::ActivateTool(name.to_string()),
        );
        true
    }

    /// Deactivates and removes a tool, dropping its command.
    pub fn unregister_tool(&mut self, name: &str) {
        let Some(pos) = self.entries.iter().position(|entry| entry.name == name) else {
            tracing::warn!(tool = name, "cannot unregister unknown tool");
            return;
        };
        self.deactivate_at(pos);
        self.entries.remove(pos);
        self.commands.unregister(&format!("{name}.activate"));
        if self.previous_tool.as_deref() == Some(name) {
            self.previous_tool = None;
        }
    }

    pub fn activate_tool(&mut self, name: &str) -> bool {
        self.activate_tool_with(name, None)
    }

    /// Activates `name`, optionally binding a master annotation for
    /// sub-annotation tools. Re-activating the active tool only
    /// forwards the payload.
    pub fn activate_tool_with(&mut self, name: &str, master_annotation_id: Option<&str>) -> bool {
        let Some(pos) = self.entries.iter().position(|entry| entry.name == name) else {
            tracing::warn!(tool = name, "cannot activate unknown tool");
            return false;
        };
        if self.entries[pos].config.disabled {
            tracing::warn!(tool = name, "cannot activate disabled tool");
            return false;
        }

        let activating_sub = self.entries[pos].config.sub;
        for i in 0..self.entries.len() {
            if i == pos || !self.entries[i].active {
                continue;
            }
            let was_sub = self.entries[i].config.sub;
            let replaced = self.entries[i].name.clone();
            self.deactivate_at(i);
            if !activating_sub && !was_sub {
                self.previous_tool = Some(replaced);
            }
        }

        let entry = &mut self.entries[pos];
        if !entry.active {
            entry.active = true;
            entry.tool.activate(&mut entry.context);
        }
        if let Some(master) = master_annotation_id {
            entry.tool.select_master_annotation(master);
        }
        true
    }

    pub fn deactivate_tool(&mut self, name: &str) {
        let Some(pos) = self.entries.iter().position(|entry| entry.name == name) else {
            tracing::warn!(tool = name, "cannot deactivate unknown tool");
            return;
        };
        self.deactivate_at(pos);
    }

    /// Returns to the most recently replaced non-sub tool, if any.
    pub fn activate_previous_tool(&mut self) -> bool {
        let Some(name) = self.previous_tool.take() else {
            return false;
        };
        self.activate_tool(&name)
    }

    pub fn current_tool(&self) -> Option<&ToolEntry> {
        self.entries.iter().find(|entry| entry.active)
    }

    pub fn current_tool_name(&self) -> Option<&str> {
        self.current_tool().map(|entry| entry.name.as_str())
    }

    /// Resets the active tool's transient state, e.g. on view switches.
    pub fn reset_current_tool(&mut self) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.active) {
            entry.tool.reset();
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Toolbar tools for an item in `status`, prioritized ones first.
    ///
    /// Sub-annotation tools never appear; completed items only offer
    /// the read-only-safe subset.
    pub fn available_tools(&self, status: ItemStatus) -> Vec<&ToolEntry> {
        let mut tools: Vec<&ToolEntry> = self
            .entries
            .iter()
            .filter(|entry| !entry.config.sub)
            .filter(|entry| {
                status != ItemStatus::Complete || COMPLETE_ITEM_TOOLS.contains(&entry.name.as_str())
            })
            .collect();
        tools.sort_by_key(|entry| entry.config.priority.unwrap_or(u32::MAX));
        tools
    }

    /// First registered non-sub tool able to create `annotation_type`.
    /// Used for class-driven activation: picking an annotation class
    /// switches to a tool that can draw it.
    pub fn find_by_main_annotation_type(
        &self,
        annotation_type: AnnotationType,
    ) -> Option<&ToolEntry> {
        self.entries.iter().find(|entry| {
            !entry.config.sub && entry.config.annotation_types.contains(&annotation_type)
        })
    }

    /// Annotation types creatable right now. The edit tool adopts the
    /// selected annotation's main type instead of its own list.
    pub fn current_annotation_types(&self, selected: Option<&Annotation>) -> Vec<AnnotationType> {
        let Some(entry) = self.current_tool() else {
            return Vec::new();
        };
        if entry.name == EDIT_TOOL {
            if let Some(annotation) = selected {
                return vec![annotation.main_type];
            }
        }
        entry.config.annotation_types.clone()
    }

    /// Commands fired by `event` across all registered tools.
    /// Active-only bindings are skipped for inactive tools.
    pub fn handle_keybindings(&self, event: &KeyEvent) -> Vec<String> {
        let mut fired = Vec::new();
        for entry in &self.entries {
            for binding in &entry.config.keybindings {
                if binding.scope == KeybindingScope::OnlyWhileActive && !entry.active {
                    continue;
                }
                if binding.matches(event) {
                    fired.push(binding.command.clone());
                }
            }
        }
        fired
    }

    /// Deactivates everything and forgets the previous-tool slot.
    pub fn cleanup(&mut self) {
        for i in 0..self.entries.len() {
            self.deactivate_at(i);
        }
        self.previous_tool = None;
    }

    fn deactivate_at(&mut self, pos: usize) {
        let entry = &mut self.entries[pos];
        if !entry.active {
            return;
        }
        entry.active = false;
        entry.tool.deactivate(&mut entry.context);
        for mut handle in entry.context.handles.drain(..) {
            handle.release();
        }
        *self.cursor.lock().expect("cursor state poisoned") = EditorCursor::Default;
    }
}

impl std::fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolManager")
            .field("entries", &self.entries)
            .field("previous_tool", &self.previous_tool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::Handle;
    use crate::tools::{Keybinding, SELECT_TOOL, ZOOM_TOOL};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Probe {
        activations: AtomicUsize,
        deactivations: AtomicUsize,
        resets: AtomicUsize,
        releases: AtomicUsize,
        master: Mutex<Option<String>>,
    }

    struct ProbeTool {
        probe: Arc<Probe>,
    }

    impl Tool for ProbeTool {
        fn activate(&mut self, context: &mut ToolContext) {
            self.probe.activations.fetch_add(1, Ordering::SeqCst);
            let releases = self.probe.clone();
            context.push_handle(Handle::new(move || {
                releases.releases.fetch_add(1, Ordering::SeqCst);
            }));
        }

        fn deactivate(&mut self, _context: &mut ToolContext) {
            self.probe.deactivations.fetch_add(1, Ordering::SeqCst);
        }

        fn reset(&mut self) {
            self.probe.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn select_master_annotation(&mut self, annotation_id: &str) {
            *self.probe.master.lock().unwrap() = Some(annotation_id.to_string());
        }
    }

    fn manager() -> ToolManager {
        ToolManager::new(
            Arc::new(CommandRegistry::new()),
            Arc::new(Mutex::new(EditorCursor::Default)),
        )
    }

    fn register(manager: &mut ToolManager, name: &str, config: ToolConfig) -> Arc<Probe> {
        let probe = Arc::new(Probe::default());
        let tool = Box::new(ProbeTool {
            probe: probe.clone(),
        });
        assert!(manager.register_tool(name, tool, config));
        probe
    }

    #[test]
    fn config_name_mismatch_is_refused() {
        let mut manager = manager();
        let probe = Arc::new(Probe::default());
        let registered = manager.register_tool(
            "select_tool",
            Box::new(ProbeTool { probe }),
            ToolConfig::named("zoom_tool"),
        );
        assert!(!registered);
        assert!(!manager.is_registered("select_tool"));
    }

    #[test]
    fn registration_exposes_an_activate_command() {
        let commands = Arc::new(CommandRegistry::new());
        let mut manager = ToolManager::new(
            commands.clone(),
            Arc::new(Mutex::new(EditorCursor::Default)),
        );
        register(&mut manager, SELECT_TOOL, ToolConfig::named(SELECT_TOOL));
        assert!(commands.is_registered("select_tool.activate"));

        manager.unregister_tool(SELECT_TOOL);
        assert!(!commands.is_registered("select_tool.activate"));
    }

    #[test]
    fn at_most_one_tool_is_active() {
        let mut manager = manager();
        let select = register(&mut manager, SELECT_TOOL, ToolConfig::named(SELECT_TOOL));
        let zoom = register(&mut manager, ZOOM_TOOL, ToolConfig::named(ZOOM_TOOL));

        assert!(manager.activate_tool(SELECT_TOOL));
        assert!(manager.activate_tool(ZOOM_TOOL));

        assert_eq!(manager.current_tool_name(), Some(ZOOM_TOOL));
        assert_eq!(select.deactivations.load(Ordering::SeqCst), 1);
        assert_eq!(select.releases.load(Ordering::SeqCst), 1);
        assert_eq!(zoom.activations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cursor_resets_on_deactivation() {
        let cursor = Arc::new(Mutex::new(EditorCursor::Default));
        let mut manager = ToolManager::new(Arc::new(CommandRegistry::new()), cursor.clone());
        register(&mut manager, ZOOM_TOOL, ToolConfig::named(ZOOM_TOOL));

        manager.activate_tool(ZOOM_TOOL);
        *cursor.lock().unwrap() = EditorCursor::Crosshair;
        manager.deactivate_tool(ZOOM_TOOL);
        assert_eq!(*cursor.lock().unwrap(), EditorCursor::Default);
    }

    #[test]
    fn reactivation_is_idempotent() {
        let mut manager = manager();
        let probe = register(&mut manager, SELECT_TOOL, ToolConfig::named(SELECT_TOOL));

        manager.activate_tool(SELECT_TOOL);
        manager.activate_tool(SELECT_TOOL);
        assert_eq!(probe.activations.load(Ordering::SeqCst), 1);
        assert_eq!(probe.deactivations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn previous_tool_is_a_single_slot() {
        let mut manager = manager();
        register(&mut manager, SELECT_TOOL, ToolConfig::named(SELECT_TOOL));
        register(&mut manager, ZOOM_TOOL, ToolConfig::named(ZOOM_TOOL));
        register(&mut manager, EDIT_TOOL, ToolConfig::named(EDIT_TOOL));

        manager.activate_tool(SELECT_TOOL);
        manager.activate_tool(ZOOM_TOOL);
        manager.activate_tool(EDIT_TOOL);

        // Only the most recent replacement survives, and going back is
        // itself a tool switch that refills the slot.
        assert!(manager.activate_previous_tool());
        assert_eq!(manager.current_tool_name(), Some(ZOOM_TOOL));
        assert!(manager.activate_previous_tool());
        assert_eq!(manager.current_tool_name(), Some(EDIT_TOOL));
    }

    #[test]
    fn sub_tool_activation_preserves_the_previous_slot() {
        let mut manager = manager();
        register(&mut manager, SELECT_TOOL, ToolConfig::named(SELECT_TOOL));
        register(&mut manager, EDIT_TOOL, ToolConfig::named(EDIT_TOOL));
        let sub_config = ToolConfig {
            sub: true,
            ..ToolConfig::named("directional_vector")
        };
        let sub = register(&mut manager, "directional_vector", sub_config);

        manager.activate_tool(SELECT_TOOL);
        manager.activate_tool(EDIT_TOOL);
        manager.activate_tool_with("directional_vector", Some("ann-9"));

        assert_eq!(sub.master.lock().unwrap().as_deref(), Some("ann-9"));
        // The excursion into the sub tool returns to the tool that was
        // replaced by a real tool switch.
        assert!(manager.activate_previous_tool());
        assert_eq!(manager.current_tool_name(), Some(SELECT_TOOL));
    }

    #[test]
    fn disabled_tools_cannot_activate() {
        let mut manager = manager();
        let config = ToolConfig {
            disabled: true,
            ..ToolConfig::named(ZOOM_TOOL)
        };
        register(&mut manager, ZOOM_TOOL, config);
        assert!(!manager.activate_tool(ZOOM_TOOL));
        assert!(manager.current_tool().is_none());
    }

    #[test]
    fn available_tools_sorts_by_priority_and_hides_sub_tools() {
        let mut manager = manager();
        register(
            &mut manager,
            ZOOM_TOOL,
            ToolConfig {
                priority: Some(5),
                ..ToolConfig::named(ZOOM_TOOL)
            },
        );
        register(
            &mut manager,
            SELECT_TOOL,
            ToolConfig {
                priority: Some(1),
                ..ToolConfig::named(SELECT_TOOL)
            },
        );
        register(&mut manager, EDIT_TOOL, ToolConfig::named(EDIT_TOOL));
        register(
            &mut manager,
            "directional_vector",
            ToolConfig {
                sub: true,
                ..ToolConfig::named("directional_vector")
            },
        );

        let names: Vec<&str> = manager
            .available_tools(ItemStatus::Annotate)
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec![SELECT_TOOL, ZOOM_TOOL, EDIT_TOOL]);
    }

    #[test]
    fn complete_items_only_offer_the_safe_subset() {
        let mut manager = manager();
        register(&mut manager, SELECT_TOOL, ToolConfig::named(SELECT_TOOL));
        register(&mut manager, EDIT_TOOL, ToolConfig::named(EDIT_TOOL));
        register(&mut manager, ZOOM_TOOL, ToolConfig::named(ZOOM_TOOL));

        let names: Vec<&str> = manager
            .available_tools(ItemStatus::Complete)
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec![SELECT_TOOL, ZOOM_TOOL]);
    }

    #[test]
    fn edit_tool_adopts_the_selected_annotation_type() {
        let mut manager = manager();
        register(
            &mut manager,
            EDIT_TOOL,
            ToolConfig {
                annotation_types: vec![AnnotationType::BoundingBox, AnnotationType::Polygon],
                ..ToolConfig::named(EDIT_TOOL)
            },
        );
        manager.activate_tool(EDIT_TOOL);

        let selected = Annotation {
            id: "ann-1".into(),
            class_name: "car".into(),
            main_type: AnnotationType::Polygon,
        };
        assert_eq!(
            manager.current_annotation_types(Some(&selected)),
            vec![AnnotationType::Polygon]
        );
        assert_eq!(
            manager.current_annotation_types(None),
            vec![AnnotationType::BoundingBox, AnnotationType::Polygon]
        );
    }

    #[test]
    fn annotation_type_lookup_skips_sub_tools() {
        let mut manager = manager();
        register(
            &mut manager,
            "directional_vector",
            ToolConfig {
                sub: true,
                annotation_types: vec![AnnotationType::Polygon],
                ..ToolConfig::named("directional_vector")
            },
        );
        register(
            &mut manager,
            "polygon_tool",
            ToolConfig {
                annotation_types: vec![AnnotationType::Polygon],
                ..ToolConfig::named("polygon_tool")
            },
        );

        let found = manager
            .find_by_main_annotation_type(AnnotationType::Polygon)
            .expect("tool for polygon");
        assert_eq!(found.name, "polygon_tool");
        assert!(manager
            .find_by_main_annotation_type(AnnotationType::Mask)
            .is_none());
    }

    #[test]
    fn keybindings_respect_activation_scope() {
        let mut manager = manager();
        register(
            &mut manager,
            SELECT_TOOL,
            ToolConfig {
                keybindings: vec![Keybinding::new(&["v"], "select_tool.activate")],
                ..ToolConfig::named(SELECT_TOOL)
            },
        );
        register(
            &mut manager,
            ZOOM_TOOL,
            ToolConfig {
                keybindings: vec![Keybinding::new(&["escape"], "zoom_tool.exit").while_active()],
                ..ToolConfig::named(ZOOM_TOOL)
            },
        );

        assert_eq!(
            manager.handle_keybindings(&KeyEvent::key("v")),
            vec!["select_tool.activate".to_string()]
        );
        // Inactive zoom tool ignores its active-only binding.
        assert!(manager.handle_keybindings(&KeyEvent::key("escape")).is_empty());

        manager.activate_tool(ZOOM_TOOL);
        assert_eq!(
            manager.handle_keybindings(&KeyEvent::key("escape")),
            vec!["zoom_tool.exit".to_string()]
        );
    }
}
