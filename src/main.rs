/*
 *  main.rs
 *
 *  Luxel - scenes for every pixel
 *  (c) 2023-26 Luxel contributors
 *
 *  Daemon entry point: wiring, lifecycle phases, shutdown
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use env_logger::Env;
use log::{debug, error, info};

use luxel::config;
use luxel::control::ControlApi;
use luxel::plugin::{LifecyclePhase, PluginManager};
use luxel::runtime::RuntimeHandle;
use luxel::scheduler::Scheduler;
use luxel::store::ConfigStore;
use luxel::SimMatrix;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Plugin directory resolution order: config/CLI, then the PLUGIN_DIR
/// environment variable, then `plugins/` next to the executable.
fn resolve_plugin_dir(cfg: &config::Config) -> PathBuf {
    if let Some(dir) = cfg.plugin_dir.clone() {
        return dir;
    }
    if let Ok(dir) = std::env::var("PLUGIN_DIR") {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join("plugins")))
        .unwrap_or_else(|| PathBuf::from("plugins"))
}

fn load_plugins(dir: &PathBuf) -> Result<PluginManager, anyhow::Error> {
    #[cfg(feature = "plugin-system")]
    {
        let mut source = luxel::plugin::source::DylibModuleSource;
        debug!("Loading plugins from '{}'...", dir.display());
        PluginManager::discover_and_load(&mut source, dir).context("plugin discovery failed")
    }

    #[cfg(not(feature = "plugin-system"))]
    {
        let _ = dir;
        info!("Plugin system disabled at build time, starting with an empty registry");
        Ok(PluginManager::empty())
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("install SIGHUP handler");

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
        _ = sighup.recv() => info!("SIGHUP received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Ctrl+C received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;

    let log_level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!(
        "Luxel v{} (built {})",
        env!("CARGO_PKG_VERSION"),
        BUILD_DATE
    );

    let plugin_dir = resolve_plugin_dir(&cfg);
    let manager = load_plugins(&plugin_dir)?;

    let store_path = cfg
        .store_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.json"));
    debug!("Loading config store from '{}'...", store_path.display());
    let store = Arc::new(ConfigStore::load(&store_path).context("loading config store")?);

    let handle = RuntimeHandle::new(Arc::clone(&store));

    // A plugin failing here vetoes startup with its diagnostic.
    manager
        .run_lifecycle_phase(LifecyclePhase::BeforeServerInit, &handle)
        .context("plugin startup")?;

    let manager = Arc::new(manager);

    // The HTTP/WebSocket transport is an external collaborator; it binds
    // this API. Here we stand up the API and forward its event stream to
    // the log so headless runs stay observable.
    let port = cfg.port.unwrap_or(8080);
    let api = ControlApi::new(handle.clone(), Arc::clone(&manager));
    info!("Control API ready (transport binds port {})", port);

    let mut events = api.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            debug!("control event: {:?}", event);
        }
    });

    manager.run_lifecycle_phase(LifecyclePhase::PostInit, &handle)?;

    let display = cfg.display.clone().unwrap_or_default();
    let (width, height) = (
        display.width.unwrap_or(64),
        display.height.unwrap_or(32),
    );
    let refresh_fps = display.refresh_fps.unwrap_or(60);

    // The scheduler owns the only thread that calls into scene code.
    let render_handle = handle.clone();
    let render_manager = Arc::clone(&manager);
    let render_thread = std::thread::Builder::new()
        .name("render".into())
        .spawn(move || {
            let mut matrix = SimMatrix::new(width, height, refresh_fps);
            Scheduler::new(render_handle, render_manager).run(&mut matrix);
        })
        .context("spawning render thread")?;

    wait_for_shutdown_signal().await;
    handle.request_shutdown();

    if render_thread.join().is_err() {
        error!("Render thread terminated abnormally");
    }

    manager.run_lifecycle_phase(LifecyclePhase::PreExit, &handle)?;

    info!("Saving config...");
    store.save();

    drop(api);
    match Arc::try_unwrap(manager) {
        Ok(mut manager) => manager.destroy_plugins(),
        // outstanding clones release their modules on drop
        Err(_) => debug!("Plugin manager still shared at exit"),
    }

    info!("Finished, shutting down...");
    Ok(())
}
