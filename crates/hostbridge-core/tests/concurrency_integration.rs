//! Concurrent call-ins from several native threads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use hostbridge_core::sdk::{NativeObjectPtr, ScriptHandle};
use hostbridge_core::{BridgeOptions, LoadUnit, NativeHost, ScriptBridge, TypeBuilder};

#[derive(Default)]
struct CountingHost {
    next: AtomicUsize,
    created: AtomicUsize,
}

impl NativeHost for CountingHost {
    fn new_script(&self) -> ScriptHandle {
        self.created.fetch_add(1, Ordering::SeqCst);
        ScriptHandle::from_raw(0x4000 + self.next.fetch_add(1, Ordering::SeqCst) * 8)
    }

    fn load_script(&self, _path: &str) -> Option<ScriptHandle> {
        None
    }

    fn reload_registered_script(&self, _script: ScriptHandle) {}
}

const THREADS: usize = 8;

#[test]
fn test_concurrent_get_or_create_yields_one_handle() {
    let host = Arc::new(CountingHost::default());
    let bridge = ScriptBridge::new(BridgeOptions::default(), host.clone());
    let object = TypeBuilder::native("GodotObject", "Object").build();
    let player = TypeBuilder::script("Player").base(&object).build();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let bridge = bridge.clone();
            let player = player.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                bridge.get_or_create_script_for_type(&player)
            })
        })
        .collect();

    let scripts: Vec<ScriptHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(scripts.iter().all(|s| *s == scripts[0]));
    assert_eq!(host.created.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.registry().len(), 1);
}

#[test]
fn test_lookups_see_pre_or_post_unload_state() {
    let host = Arc::new(CountingHost::default());
    let bridge = ScriptBridge::new(BridgeOptions::default(), host);
    let object = TypeBuilder::native("GodotObject", "Object").build();
    let unit = LoadUnit::new("Game");
    let types: Vec<_> = (0..32)
        .map(|i| {
            TypeBuilder::script(&format!("Script{}", i))
                .base(&object)
                .unit(&unit)
                .build()
        })
        .collect();
    bridge.load_unit(unit.clone());
    let scripts: Vec<_> = types
        .iter()
        .map(|ty| bridge.get_or_create_script_for_type(ty))
        .collect();

    let barrier = Arc::new(Barrier::new(2));
    let reader = {
        let bridge = bridge.clone();
        let scripts = scripts.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..200 {
                // Each snapshot is taken under one lock: all or nothing
                let guard = bridge.registry().lock();
                let live = scripts.iter().filter(|s| guard.is_registered(**s)).count();
                assert!(live == 0 || live == scripts.len());
            }
        })
    };

    barrier.wait();
    bridge.unload_unit(unit.id());
    reader.join().unwrap();

    assert!(bridge.registry().is_empty());
    assert_eq!(bridge.lifecycle().reload_record_count(), scripts.len());
}

#[test]
fn test_concurrent_handle_swaps() {
    let host = Arc::new(CountingHost::default());
    let bridge = ScriptBridge::new(BridgeOptions::default(), host);
    let object = TypeBuilder::native("GodotObject", "Object")
        .default_constructor()
        .build();
    bridge.register_native_type(object);

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let bridge = bridge.clone();
            thread::spawn(move || {
                let mut handle = bridge
                    .instantiate_for_native_object("Object", NativeObjectPtr::from_raw(0x100 + i))
                    .unwrap();
                let object = bridge.handles().target(handle).unwrap();
                for round in 0..50 {
                    handle = bridge.swap_handle_ownership(handle, round % 2 == 0).unwrap();
                }
                assert_eq!(bridge.handles().target(handle).unwrap().native_ptr(), object.native_ptr());
                bridge.free_handle(handle)
            })
        })
        .collect();

    for worker in workers {
        assert!(worker.join().unwrap());
    }
    assert!(bridge.handles().is_empty());
}
