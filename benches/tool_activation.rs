// SPDX-License-Identifier: MPL-2.0
//! Tool switching and keybinding dispatch overhead.

use std::sync::{Arc, Mutex};

use criterion::{criterion_group, criterion_main, Criterion};

use workview::commands::CommandRegistry;
use workview::item::ItemStatus;
use workview::tools::{
    EditorCursor, KeyEvent, Keybinding, Tool, ToolConfig, ToolContext, ToolManager,
};

struct NoopTool;

impl Tool for NoopTool {
    fn activate(&mut self, _context: &mut ToolContext) {}
    fn deactivate(&mut self, _context: &mut ToolContext) {}
    fn reset(&mut self) {}
}

fn populated_manager(tool_count: usize) -> ToolManager {
    let mut manager = ToolManager::new(
        Arc::new(CommandRegistry::new()),
        Arc::new(Mutex::new(EditorCursor::Default)),
    );
    for i in 0..tool_count {
        let name = format!("tool_{i}");
        let config = ToolConfig {
            priority: Some((tool_count - i) as u32),
            keybindings: vec![Keybinding::new(
                &["ctrl", &i.to_string()],
                format!("{name}.activate"),
            )],
            ..ToolConfig::named(name.as_str())
        };
        manager.register_tool(&name, Box::new(NoopTool), config);
    }
    manager
}

fn bench_tools(c: &mut Criterion) {
    let mut group = c.benchmark_group("tool_activation");

    group.bench_function("switch_between_two_of_twenty", |b| {
        let mut manager = populated_manager(20);
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let name = if flip { "tool_3" } else { "tool_11" };
            std::hint::black_box(manager.activate_tool(name))
        });
    });

    group.bench_function("keybinding_dispatch", |b| {
        let manager = populated_manager(20);
        let event = KeyEvent::key("7").with_ctrl();
        b.iter(|| std::hint::black_box(manager.handle_keybindings(&event)));
    });

    group.bench_function("available_tools_sorted", |b| {
        let manager = populated_manager(20);
        b.iter(|| std::hint::black_box(manager.available_tools(ItemStatus::Annotate)));
    });

    group.finish();
}

criterion_group!(benches, bench_tools);
criterion_main!(benches);
