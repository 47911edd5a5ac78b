/*
 *  tests/runtime_integration.rs
 *
 *  Integration tests for the plugin runtime and preset scheduler
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 */

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use luxel::canvas::mock::{MockMatrix, MockMatrixState};
use luxel::plugin::source::StaticModuleSource;
use luxel::plugin::{Plugin, PluginManager};
use luxel::scene::property::DynProperty;
use luxel::store::{ConfigStore, PresetConfig, SceneConfig};
use luxel::{
    ControlApi, ControlEvent, FrameCanvas, Property, RuntimeHandle, Scene, SceneCore,
    SceneFactory, SceneFlow, Scheduler,
};

/// Observable lifecycle trace, shared between the render thread and the
/// test body.
#[derive(Debug, Clone, PartialEq)]
enum Ev {
    Init(&'static str),
    Render(&'static str),
    Stop(&'static str),
}

type EventLog = Arc<Mutex<Vec<Ev>>>;

struct RecordingScene {
    core: SceneCore,
    type_name: &'static str,
    log: EventLog,
    panic_in_render: bool,
    brightness: Property<i64>,
}

impl Scene for RecordingScene {
    fn name(&self) -> &str {
        self.type_name
    }

    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn scene_properties(&self) -> Vec<&dyn DynProperty> {
        vec![&self.brightness]
    }

    fn scene_properties_mut(&mut self) -> Vec<&mut dyn DynProperty> {
        vec![&mut self.brightness]
    }

    fn on_initialize(&mut self, _canvas: &FrameCanvas) {
        self.log.lock().unwrap().push(Ev::Init(self.type_name));
    }

    fn render(&mut self, canvas: &mut FrameCanvas) -> SceneFlow {
        if self.panic_in_render {
            panic!("scripted render failure");
        }
        self.log.lock().unwrap().push(Ev::Render(self.type_name));
        let v = self.brightness.value() as u8;
        canvas.set_pixel(0, 0, luxel::Color::new(v, v, v));
        SceneFlow::Continue
    }

    fn after_render_stop(&mut self, _canvas: &mut FrameCanvas) {
        self.log.lock().unwrap().push(Ev::Stop(self.type_name));
    }
}

struct RecordingFactory {
    type_name: &'static str,
    log: EventLog,
    panic_in_render: bool,
}

impl SceneFactory for RecordingFactory {
    fn create_default(&self) -> Box<dyn Scene> {
        Box::new(RecordingScene {
            core: SceneCore::new(1, 5000).with_fps(120),
            type_name: self.type_name,
            log: Arc::clone(&self.log),
            panic_in_render: self.panic_in_render,
            brightness: Property::bounded("brightness", 200, 0, 255),
        })
    }
}

struct ScenePackPlugin {
    log: EventLog,
}

impl Plugin for ScenePackPlugin {
    fn create_scenes(&self) -> Vec<Box<dyn SceneFactory>> {
        vec![
            Box::new(RecordingFactory {
                type_name: "alpha",
                log: Arc::clone(&self.log),
                panic_in_render: false,
            }),
            Box::new(RecordingFactory {
                type_name: "beta",
                log: Arc::clone(&self.log),
                panic_in_render: false,
            }),
            Box::new(RecordingFactory {
                type_name: "grenade",
                log: Arc::clone(&self.log),
                panic_in_render: true,
            }),
        ]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Harness {
    api: ControlApi,
    handle: RuntimeHandle,
    log: EventLog,
    matrix_state: Arc<Mutex<MockMatrixState>>,
    render_thread: Option<JoinHandle<()>>,
}

impl Harness {
    /// Stand up plugins, store, scheduler and a mock matrix on a dedicated
    /// render thread, exactly as `main` wires them.
    fn start() -> Self {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));

        let mut source = StaticModuleSource::new().register(
            "scene_pack",
            Box::new(ScenePackPlugin {
                log: Arc::clone(&log),
            }),
        );
        let plugins = Arc::new(
            PluginManager::discover_and_load(&mut source, std::path::Path::new("/plugins"))
                .unwrap(),
        );

        let store = Arc::new(ConfigStore::in_memory());
        let handle = RuntimeHandle::new(store);
        let api = ControlApi::new(handle.clone(), Arc::clone(&plugins));

        let matrix = MockMatrix::new(32, 16);
        let matrix_state = matrix.state();

        let thread_handle = handle.clone();
        let render_thread = std::thread::spawn(move || {
            let mut matrix = matrix;
            let rng = StdRng::seed_from_u64(0x0D15_91A7);
            Scheduler::with_rng(thread_handle, plugins, rng).run(&mut matrix);
        });

        Self {
            api,
            handle,
            log,
            matrix_state,
            render_thread: Some(render_thread),
        }
    }

    fn preset_of(&self, scenes: &[(&str, i64, i64)]) -> PresetConfig {
        PresetConfig {
            scenes: scenes
                .iter()
                .map(|(name, weight, duration)| SceneConfig {
                    type_name: name.to_string(),
                    uuid: String::new(),
                    arguments: json!({ "weight": weight, "duration": duration })
                        .as_object()
                        .unwrap()
                        .clone(),
                })
                .collect(),
            providers: vec![],
        }
    }

    fn activate(&self, id: &str, scenes: &[(&str, i64, i64)]) {
        self.api.upsert_preset(id, self.preset_of(scenes)).unwrap();
        self.api.set_current_preset(id).unwrap();
    }

    fn events(&self) -> Vec<Ev> {
        self.log.lock().unwrap().clone()
    }

    fn wait_for(&self, timeout: Duration, mut cond: impl FnMut(&[Ev]) -> bool) -> bool {
        let end = Instant::now() + timeout;
        loop {
            if cond(&self.events()) {
                return true;
            }
            if Instant::now() >= end {
                return cond(&self.events());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn shutdown(&mut self) {
        self.handle.request_shutdown();
        if let Some(thread) = self.render_thread.take() {
            assert!(
                thread.join().is_ok(),
                "render thread must not die on shutdown"
            );
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn renders_of(events: &[Ev], name: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Ev::Render(n) if *n == name))
        .count()
}

#[test]
fn test_lifecycle_ordering_over_many_windows() {
    let mut h = Harness::start();
    h.activate("day", &[("alpha", 1, 120)]);

    // let several duration windows elapse after the instance settles
    assert!(h.wait_for(Duration::from_secs(5), |ev| {
        let last_init = ev.iter().rposition(|e| matches!(e, Ev::Init(_)));
        match last_init {
            Some(i) => ev[i..].iter().filter(|e| matches!(e, Ev::Stop(_))).count() >= 3,
            None => false,
        }
    }));
    h.shutdown();

    let events = h.events();
    assert_eq!(events[0], Ev::Init("alpha"));

    // an instance is never initialized twice: a later Init means the
    // previous instance was torn down, which forbids renders in between
    // without a closing stop
    let init_positions: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Ev::Init(_)))
        .map(|(i, _)| i)
        .collect();
    for pair in init_positions.windows(2) {
        let between = &events[pair[0] + 1..pair[1]];
        assert!(
            !between.iter().any(|e| matches!(e, Ev::Render(_))),
            "a rendered instance was re-initialized"
        );
    }

    // steady state: every window renders at least once and closes with
    // exactly one stop before the next render batch
    let tail = &events[init_positions.last().unwrap() + 1..];
    let mut rendered_since_stop = 0;
    let mut stops = 0;
    for event in tail {
        match event {
            Ev::Render(_) => rendered_since_stop += 1,
            Ev::Stop(_) => {
                assert!(rendered_since_stop > 0, "stop without a preceding render");
                rendered_since_stop = 0;
                stops += 1;
            }
            Ev::Init(_) => unreachable!(),
        }
    }
    assert!(stops >= 3);
}

#[test]
fn test_zero_weight_preset_backs_off_without_rendering() {
    let mut h = Harness::start();
    h.activate("dead", &[("alpha", 0, 1000), ("beta", 0, 1000)]);

    std::thread::sleep(Duration::from_millis(600));

    let events = h.events();
    assert_eq!(renders_of(&events, "alpha"), 0);
    assert_eq!(renders_of(&events, "beta"), 0);
    assert_eq!(h.matrix_state.lock().unwrap().swap_count, 0);

    // the loop is still alive and reacts to a fixed preset within a backoff
    h.activate("alive", &[("alpha", 1, 200)]);
    assert!(h.wait_for(Duration::from_secs(3), |ev| renders_of(ev, "alpha") > 0));

    h.shutdown();
}

#[test]
fn test_dirty_flag_preempts_active_window_quickly() {
    let mut h = Harness::start();
    // one long window; without preemption this runs for a minute
    h.activate("slow", &[("alpha", 1, 60_000)]);

    assert!(h.wait_for(Duration::from_secs(3), |ev| renders_of(ev, "alpha") > 0));

    let marked_at = Instant::now();
    h.handle.mark_config_dirty();

    assert!(
        h.wait_for(Duration::from_secs(2), |ev| {
            ev.iter().any(|e| matches!(e, Ev::Stop("alpha")))
        }),
        "dirty flag did not end the active window"
    );
    // generous CI bound; the contract is one preemption-check interval
    assert!(marked_at.elapsed() < Duration::from_millis(1500));

    h.shutdown();
}

#[test]
fn test_skip_request_ends_window_and_scheduling_continues() {
    let mut h = Harness::start();
    h.activate("slow", &[("alpha", 1, 60_000)]);

    assert!(h.wait_for(Duration::from_secs(3), |ev| renders_of(ev, "alpha") > 0));
    h.api.skip_current_scene();

    assert!(h.wait_for(Duration::from_secs(2), |ev| {
        ev.iter().any(|e| matches!(e, Ev::Stop("alpha")))
    }));

    // the loop picks the next window on its own
    let renders_at_stop = renders_of(&h.events(), "alpha");
    assert!(h.wait_for(Duration::from_secs(3), |ev| {
        renders_of(ev, "alpha") > renders_at_stop
    }));

    h.shutdown();
}

#[test]
fn test_render_panic_is_isolated_to_one_window() {
    let mut h = Harness::start();
    h.activate("mixed", &[("grenade", 1, 300), ("alpha", 1, 150)]);

    // both scenes get selected over time; the panicking one must not take
    // the loop (or the process) down, and alpha keeps rendering
    assert!(h.wait_for(Duration::from_secs(10), |ev| {
        renders_of(ev, "alpha") >= 5
            && ev.iter().filter(|e| matches!(e, Ev::Stop(_))).count() >= 4
    }));

    h.shutdown();
}

#[test]
fn test_preset_switch_tears_down_and_rebuilds_scenes() {
    let mut h = Harness::start();
    h.activate("first", &[("alpha", 1, 60_000)]);
    assert!(h.wait_for(Duration::from_secs(3), |ev| renders_of(ev, "alpha") > 0));

    // switching the current preset marks the store dirty; the scheduler
    // must stop alpha and start beta within a window, not after a minute
    h.activate("second", &[("beta", 1, 60_000)]);

    assert!(h.wait_for(Duration::from_secs(3), |ev| renders_of(ev, "beta") > 0));

    let events = h.events();
    let first_beta_render = events
        .iter()
        .position(|e| matches!(e, Ev::Render("beta")))
        .unwrap();
    let alpha_stop = events
        .iter()
        .position(|e| matches!(e, Ev::Stop("alpha")))
        .unwrap();
    assert!(
        alpha_stop < first_beta_render,
        "alpha must release the canvas before beta renders"
    );
    // beta is a fresh instance with its own initialize
    assert!(events
        .iter()
        .any(|e| matches!(e, Ev::Init("beta"))));

    h.shutdown();
}

#[test]
fn test_active_scene_events_reach_subscribers() {
    let mut h = Harness::start();
    let mut rx = h.api.subscribe_events();
    h.activate("day", &[("alpha", 1, 100)]);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = None;
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(ControlEvent::ActiveSceneChanged { uuid, name }) => {
                seen = Some((uuid, name));
                break;
            }
            _ => std::thread::sleep(Duration::from_millis(10)),
        }
    }

    let (uuid, name) = seen.expect("no ActiveSceneChanged event observed");
    assert_eq!(name, "alpha");
    // the uuid is the one persisted into the preset by the control plane
    let stored = h.api.get_preset("day").unwrap();
    assert_eq!(stored.scenes[0].uuid, uuid);

    h.shutdown();
}

#[test]
fn test_rendering_disable_blanks_and_reenables() {
    let mut h = Harness::start();
    h.activate("day", &[("alpha", 1, 100)]);
    assert!(h.wait_for(Duration::from_secs(3), |ev| renders_of(ev, "alpha") > 0));

    h.api.set_rendering_enabled(false);
    std::thread::sleep(Duration::from_millis(400));
    assert!(h.matrix_state.lock().unwrap().clear_count > 0);

    let renders_while_off = renders_of(&h.events(), "alpha");
    std::thread::sleep(Duration::from_millis(300));
    // at most one in-flight window drains after the switch
    assert!(renders_of(&h.events(), "alpha") <= renders_while_off + 1);

    h.api.set_rendering_enabled(true);
    assert!(h.wait_for(Duration::from_secs(3), |ev| {
        renders_of(ev, "alpha") > renders_while_off + 1
    }));

    h.shutdown();
}
