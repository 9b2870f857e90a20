//! End-to-end bridge scenarios: load, register, unload, reload, marshal

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hostbridge_core::sdk::{
    GeneratedMetadata, InteropResult, PropertyInfo, ScriptHandle, StringName, Variant,
    VariantCodec, VariantType,
};
use hostbridge_core::{
    BridgeOptions, ErrorSink, LoadUnit, ManagedType, NativeHost, ScriptBridge, TypeBuilder,
};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingHost {
    next: AtomicUsize,
    reloaded: Mutex<Vec<ScriptHandle>>,
}

impl NativeHost for RecordingHost {
    fn new_script(&self) -> ScriptHandle {
        ScriptHandle::from_raw(0x2000 + self.next.fetch_add(1, Ordering::SeqCst) * 16)
    }

    fn load_script(&self, _path: &str) -> Option<ScriptHandle> {
        None
    }

    fn reload_registered_script(&self, script: ScriptHandle) {
        self.reloaded.lock().push(script);
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<String>>);

impl ErrorSink for RecordingSink {
    fn push_error(&self, message: &str) {
        self.0.lock().push(message.to_string());
    }
}

struct ManyProperties(usize);

impl GeneratedMetadata for ManyProperties {
    fn property_list(&self) -> InteropResult<Vec<PropertyInfo>> {
        Ok((0..self.0)
            .map(|i| PropertyInfo::exported(&format!("field_{}", i), VariantType::Int))
            .collect())
    }

    fn property_default_values(&self) -> InteropResult<Vec<(StringName, Variant)>> {
        Ok((0..self.0)
            .map(|i| (StringName::new(&format!("field_{}", i)), Variant::Int(i as i64)))
            .collect())
    }
}

struct Setup {
    bridge: ScriptBridge,
    host: Arc<RecordingHost>,
    sink: Arc<RecordingSink>,
    node: ManagedType,
}

fn setup() -> Setup {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let host = Arc::new(RecordingHost::default());
    let sink = Arc::new(RecordingSink::default());
    let bridge = ScriptBridge::builder(host.clone())
        .options(BridgeOptions::default())
        .error_sink(sink.clone())
        .build();
    let object = TypeBuilder::native("GodotObject", "Object").build();
    let node = TypeBuilder::native("Node", "Node").base(&object).build();
    bridge.register_native_type(object);
    bridge.register_native_type(node.clone());
    Setup {
        bridge,
        host,
        sink,
        node,
    }
}

fn game_unit(node: &ManagedType) -> Arc<LoadUnit> {
    let unit = LoadUnit::new("Game");
    TypeBuilder::script("Player")
        .namespace("Game")
        .base(node)
        .unit(&unit)
        .script_path("res://player.cs")
        .build();
    TypeBuilder::script("Enemy")
        .namespace("Game")
        .base(node)
        .unit(&unit)
        .build();
    unit
}

#[test]
fn test_unload_and_reload_cycle() {
    let s = setup();
    let unit = game_unit(&s.node);
    assert_eq!(s.bridge.load_unit(unit.clone()), 1);

    let player = unit.find_type("Game.Player").unwrap();
    let enemy = unit.find_type("Game.Enemy").unwrap();
    let player_script = s.bridge.get_or_create_script_for_path("res://player.cs");
    let enemy_script = s.bridge.get_or_create_script_for_type(&enemy);
    assert_eq!(s.bridge.registry().try_get_type(player_script), Some(player));

    // Unload: both handles leave the registry, only the path-less one keeps a record
    assert!(s.bridge.unload_unit(unit.id()));
    assert!(s.bridge.registry().is_empty());
    assert!(s.bridge.lifecycle().reload_record(player_script).is_none());
    let record = s.bridge.lifecycle().reload_record(enemy_script).unwrap();
    assert_eq!(record.class_name, "Game.Enemy");
    assert_eq!(record.unit_name.as_deref(), Some("Game"));

    // Reload a fresh build of the unit and re-resolve the path-less handle
    let reloaded = game_unit(&s.node);
    s.bridge.load_unit(reloaded.clone());
    assert!(s.bridge.try_reload_script(enemy_script));
    let new_enemy = reloaded.find_type("Game.Enemy").unwrap();
    assert_eq!(s.bridge.registry().try_get_type(enemy_script), Some(new_enemy));
    assert!(s.bridge.lifecycle().reload_record(enemy_script).is_none());
    assert_eq!(s.host.reloaded.lock().last(), Some(&enemy_script));

    // Still registered: reload succeeds and nothing is re-resolved
    assert!(s.bridge.try_reload_script(enemy_script));

    // The path-based handle rebinds through add_script_bridge
    assert!(s.bridge.add_script_bridge(player_script, "res://player.cs"));
    assert!(s.sink.0.lock().is_empty());
}

#[test]
fn test_reload_fails_when_class_removed() {
    let s = setup();
    let unit = game_unit(&s.node);
    s.bridge.load_unit(unit.clone());
    let enemy = unit.find_type("Game.Enemy").unwrap();
    let script = s.bridge.get_or_create_script_for_type(&enemy);

    s.bridge.unload_unit(unit.id());

    // The new build no longer has Enemy
    let reloaded = LoadUnit::new("Game");
    TypeBuilder::script("Player")
        .namespace("Game")
        .base(&s.node)
        .unit(&reloaded)
        .script_path("res://player.cs")
        .build();
    s.bridge.load_unit(reloaded);

    assert!(!s.bridge.try_reload_script(script));
    assert!(s.bridge.lifecycle().reload_record(script).is_none());
    assert!(!s.bridge.registry().is_registered(script));
}

#[test]
fn test_reload_disabled_keeps_registrations() {
    let host = Arc::new(RecordingHost::default());
    let bridge = ScriptBridge::new(BridgeOptions::without_reload(), host);
    let object = TypeBuilder::native("GodotObject", "Object").build();
    let unit = LoadUnit::new("Game");
    let ty = TypeBuilder::script("Player").base(&object).unit(&unit).build();
    bridge.load_unit(unit.clone());
    let script = bridge.get_or_create_script_for_type(&ty);

    assert!(!bridge.lifecycle().is_tracked(unit.id()));
    bridge.unload_unit(unit.id());
    assert!(bridge.registry().is_registered(script));
}

#[test]
fn test_marshal_inline_and_heap_match() {
    let s = setup();
    let small = TypeBuilder::script("Small")
        .base(&s.node)
        .metadata(ManyProperties(10))
        .build();
    let large = TypeBuilder::script("Large")
        .base(&s.node)
        .metadata(ManyProperties(100))
        .build();
    let small_script = s.bridge.get_or_create_script_for_type(&small);
    let large_script = s.bridge.get_or_create_script_for_type(&large);

    let collect = |script| {
        let mut seen = Vec::new();
        s.bridge.get_property_info_list(script, |owner, items| {
            assert_eq!(owner, script);
            seen = items
                .iter()
                .map(|p| (p.name().to_string(), p.ty, p.usage, p.exported))
                .collect();
        });
        seen
    };

    let small_items = collect(small_script);
    let large_items = collect(large_script);
    assert_eq!(small_items.len(), 10);
    assert_eq!(large_items.len(), 100);
    assert_eq!(small_items[..], large_items[..10]);

    let mut defaults = Vec::new();
    s.bridge.get_property_default_values(large_script, |_, items| {
        for item in items {
            defaults.push(s.bridge.codec().decode(&item.value).unwrap());
        }
    });
    assert_eq!(defaults.len(), 100);
    assert_eq!(defaults[42], Variant::Int(42));
}

#[test]
fn test_marshal_unregistered_reports() {
    let s = setup();
    let mut called = false;
    s.bridge
        .get_property_info_list(ScriptHandle::from_raw(0xdead), |_, _| called = true);
    assert!(!called);
    assert_eq!(s.sink.0.lock().len(), 1);
}

#[test]
fn test_options_from_toml() {
    let options = BridgeOptions::from_toml_str(
        r#"
        [bridge]
        reload_enabled = true
        editor_units = ["EditorTools"]
        "#,
    )
    .unwrap();
    let host = Arc::new(RecordingHost::default());
    let bridge = ScriptBridge::new(options, host);

    let object = TypeBuilder::native("GodotObject", "Object").build();
    let unit = LoadUnit::new("EditorTools");
    let dock = TypeBuilder::script("Dock").base(&object).unit(&unit).build();
    let script = bridge.get_or_create_script_for_type(&dock);
    assert!(bridge.update_script_class_info(script).is_tool);
}
