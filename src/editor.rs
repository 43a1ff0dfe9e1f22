// SPDX-License-Identifier: MPL-2.0
//! The editor ties the layout, tool manager and command registry
//! together and owns the shared cursor state.

use std::sync::{Arc, Mutex};

use crate::commands::{CommandAction, CommandRegistry};
use crate::config::Config;
use crate::error::Result;
use crate::item::Item;
use crate::layout::{Layout, LayoutKind, ViewSources, ViewUpdate};
use crate::tiles::RepaintCallback;
use crate::tools::{EditorCursor, KeyEvent, ToolManager, EDIT_TOOL, SELECT_TOOL};

pub struct Editor {
    commands: Arc<CommandRegistry>,
    cursor: Arc<Mutex<EditorCursor>>,
    pub tools: ToolManager,
    pub layout: Layout,
}

impl Editor {
    pub fn new(
        kind: LayoutKind,
        sources: ViewSources,
        config: Config,
        repaint: RepaintCallback,
    ) -> Self {
        let commands = Arc::new(CommandRegistry::new());
        let cursor = Arc::new(Mutex::new(EditorCursor::Default));
        let tools = ToolManager::new(Arc::clone(&commands), Arc::clone(&cursor));
        let layout = Layout::new(kind, sources, config, repaint);
        Self {
            commands,
            cursor,
            tools,
            layout,
        }
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn cursor(&self) -> EditorCursor {
        *self.cursor.lock().expect("cursor state poisoned")
    }

    pub fn set_cursor(&self, cursor: EditorCursor) {
        *self.cursor.lock().expect("cursor state poisoned") = cursor;
    }

    /// Binds an item to a view slot. Any view holding fresh stream
    /// content starts streaming immediately, and a default tool is
    /// activated when a view comes into existence with none active.
    ///
    /// Must be called within a tokio runtime when `item` is a streaming
    /// slot.
    pub fn set_view_config(&mut self, index: usize, item: Item) -> Result<ViewUpdate> {
        let update = self.layout.set_view_config(index, item)?;
        // Reused stream views carry a fresh manager for the new item
        // and need the kick-off just like created ones.
        if !matches!(update, ViewUpdate::Unchanged) {
            if let Some(stream) = self
                .layout
                .view_at(index)
                .and_then(|view| view.stream())
                .cloned()
            {
                tokio::spawn(async move {
                    if let Err(err) = stream.load_frames().await {
                        tracing::warn!(error = %err, "initial frame load failed");
                    }
                });
            }
        }
        if matches!(update, ViewUpdate::Created | ViewUpdate::Replaced)
            && self.tools.current_tool().is_none()
            && !self.tools.activate_tool(EDIT_TOOL)
        {
            self.tools.activate_tool(SELECT_TOOL);
        }
        Ok(update)
    }

    /// Switches the active view, resetting the current tool's transient
    /// state.
    pub fn set_active_view(&mut self, id: u64) {
        if self.layout.set_active_view(id) {
            self.tools.reset_current_tool();
        }
    }

    /// Routes a key event through tool keybindings. Returns whether any
    /// binding consumed it.
    pub fn handle_key_event(&mut self, event: &KeyEvent) -> bool {
        let fired = self.tools.handle_keybindings(event);
        let handled = !fired.is_empty();
        for command in fired {
            self.call_command(&command);
        }
        handled
    }

    pub fn call_command(&mut self, name: &str) {
        match self.commands.resolve(name) {
            Some(CommandAction::ActivateTool(tool)) => {
                self.tools.activate_tool(&tool);
            }
            Some(CommandAction::Callback(callback)) => callback(),
            None => {}
        }
    }

    pub fn cleanup(&mut self) {
        self.tools.cleanup();
        self.layout.cleanup();
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("tools", &self.tools)
            .field("layout", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FrameSource, PageRequest, SectionSource, TileSource};
    use crate::item::{ItemKind, ItemStatus, SectionDescriptor, Slot};
    use crate::tiles::TileKey;
    use crate::tools::{Keybinding, Tool, ToolConfig, ToolContext, ZOOM_TOOL};
    use futures_util::FutureExt;
    use std::collections::HashMap;

    struct NullBackend;

    impl TileSource for NullBackend {
        fn resolve_tile_urls(
            &self,
            _tiles: Vec<TileKey>,
        ) -> futures_util::future::BoxFuture<'static, Result<HashMap<TileKey, String>>> {
            async { Ok(HashMap::new()) }.boxed()
        }

        fn fetch_tile(
            &self,
            _url: String,
        ) -> futures_util::future::BoxFuture<'static, Result<Vec<u8>>> {
            async { Ok(Vec::new()) }.boxed()
        }
    }

    impl SectionSource for NullBackend {
        fn load_page(
            &self,
            _item_id: String,
            _slot_name: String,
            _page: PageRequest,
        ) -> futures_util::future::BoxFuture<'static, Result<Vec<SectionDescriptor>>> {
            async { Ok(Vec::new()) }.boxed()
        }
    }

    impl FrameSource for NullBackend {
        fn fetch_frame(
            &self,
            _url: String,
        ) -> futures_util::future::BoxFuture<'static, Result<Vec<u8>>> {
            async { Ok(Vec::new()) }.boxed()
        }
    }

    struct NoopTool;

    impl Tool for NoopTool {
        fn activate(&mut self, _context: &mut ToolContext) {}
        fn deactivate(&mut self, _context: &mut ToolContext) {}
        fn reset(&mut self) {}
    }

    /// Section source recording which items requested pages.
    #[derive(Default)]
    struct RecordingSections {
        item_ids: Mutex<Vec<String>>,
    }

    impl SectionSource for RecordingSections {
        fn load_page(
            &self,
            item_id: String,
            _slot_name: String,
            page: PageRequest,
        ) -> futures_util::future::BoxFuture<'static, Result<Vec<SectionDescriptor>>> {
            self.item_ids.lock().unwrap().push(item_id);
            let sections: Vec<_> = (page.offset..page.offset + 1)
                .map(|index| SectionDescriptor {
                    section_index: index,
                    width: 1,
                    height: 1,
                    hq_url: Some(format!("hq-{index}")),
                    lq_url: Some(format!("lq-{index}")),
                })
                .collect();
            async move { Ok(sections) }.boxed()
        }
    }

    async fn settle() {
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
    }

    fn editor() -> Editor {
        let backend = Arc::new(NullBackend);
        Editor::new(
            LayoutKind::Single,
            ViewSources {
                tiles: backend.clone(),
                sections: backend.clone(),
                frames: backend,
            },
            Config::default(),
            Arc::new(|| {}),
        )
    }

    fn image_item(id: &str) -> Item {
        Item {
            id: id.into(),
            name: id.into(),
            status: ItemStatus::New,
            slot: Slot {
                id: format!("{id}-slot"),
                file_name: format!("{id}.jpg"),
                slot_name: "0".into(),
                kind: ItemKind::Image,
                total_sections: 1,
                metadata: None,
            },
        }
    }

    fn video_item(id: &str) -> Item {
        Item {
            id: id.into(),
            name: format!("{id}.mp4"),
            status: ItemStatus::Annotate,
            slot: Slot {
                id: format!("{id}-slot"),
                file_name: format!("{id}.mp4"),
                slot_name: "0".into(),
                kind: ItemKind::Video,
                total_sections: 3,
                metadata: None,
            },
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rebinding_a_stream_view_restarts_streaming() {
        let sections = Arc::new(RecordingSections::default());
        let backend = Arc::new(NullBackend);
        let mut editor = Editor::new(
            LayoutKind::Single,
            ViewSources {
                tiles: backend.clone(),
                sections: sections.clone(),
                frames: backend,
            },
            Config::default(),
            Arc::new(|| {}),
        );

        editor.set_view_config(0, video_item("a")).unwrap();
        settle().await;
        assert_eq!(
            editor.set_view_config(0, video_item("b")).unwrap(),
            ViewUpdate::Reused
        );
        settle().await;

        // Both bindings kicked off their initial page load.
        let ids = sections.item_ids.lock().unwrap();
        assert!(ids.contains(&"a".to_string()));
        assert!(ids.contains(&"b".to_string()));
    }

    #[test]
    fn new_views_fall_back_to_a_default_tool() {
        let mut editor = editor();
        editor
            .tools
            .register_tool(SELECT_TOOL, Box::new(NoopTool), ToolConfig::named(SELECT_TOOL));

        editor.set_view_config(0, image_item("a")).unwrap();
        // No edit tool registered, so the select tool steps in.
        assert_eq!(editor.tools.current_tool_name(), Some(SELECT_TOOL));
    }

    #[test]
    fn keybindings_fire_activation_commands() {
        let mut editor = editor();
        editor
            .tools
            .register_tool(SELECT_TOOL, Box::new(NoopTool), ToolConfig::named(SELECT_TOOL));
        editor.tools.register_tool(
            ZOOM_TOOL,
            Box::new(NoopTool),
            ToolConfig {
                keybindings: vec![Keybinding::new(&["z"], "zoom_tool.activate")],
                ..ToolConfig::named(ZOOM_TOOL)
            },
        );
        editor.tools.activate_tool(SELECT_TOOL);

        assert!(editor.handle_key_event(&KeyEvent::key("z")));
        assert_eq!(editor.tools.current_tool_name(), Some(ZOOM_TOOL));
        assert!(!editor.handle_key_event(&KeyEvent::key("q")));
    }

    #[test]
    fn callback_commands_run_when_called() {
        let mut editor = editor();
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = fired.clone();
        editor.commands().register(
            "frames.next",
            CommandAction::Callback(Arc::new(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })),
        );
        editor.call_command("frames.next");
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
