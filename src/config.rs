use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Presets and schedules live in the shared
/// store (JSON); this file only wires up the daemon itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General options
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// Directory scanned for plugin modules
    pub plugin_dir: Option<PathBuf>,
    /// Path of the persisted preset/config store
    pub store_path: Option<PathBuf>,
    /// Port the external control-plane transport binds
    pub port: Option<u16>,
    /// display-specific geometry & behavior
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub refresh_fps: Option<u32>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "Luxel", about = "Luxel matrix scene host", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub plugin_dir: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub store_path: Option<PathBuf>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long)]
    pub display_refresh_fps: Option<u32>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    load_with_cli(cli)
}

pub fn load_with_cli(cli: Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/luxel/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/luxel/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/luxel.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["luxel.yaml", "config.yaml", "config/luxel.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()  { dst.log_level = src.log_level; }
    if src.plugin_dir.is_some() { dst.plugin_dir = src.plugin_dir; }
    if src.store_path.is_some() { dst.store_path = src.store_path; }
    if src.port.is_some()       { dst.port = src.port; }
    // display
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some()       { dst.width = src.width; }
    if src.height.is_some()      { dst.height = src.height; }
    if src.refresh_fps.is_some() { dst.refresh_fps = src.refresh_fps; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()  { cfg.log_level = cli.log_level.clone(); }
    if cli.plugin_dir.is_some() { cfg.plugin_dir = cli.plugin_dir.clone(); }
    if cli.store_path.is_some() { cfg.store_path = cli.store_path.clone(); }
    if cli.port.is_some()       { cfg.port = cli.port; }

    let any_case = cli.display_width.is_some()
        || cli.display_height.is_some()
        || cli.display_refresh_fps.is_some();

    if any_case && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_width.is_some()       { display.width = cli.display_width; }
        if cli.display_height.is_some()      { display.height = cli.display_height; }
        if cli.display_refresh_fps.is_some() { display.refresh_fps = cli.display_refresh_fps; }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if let (Some(w), Some(h)) = (display.width, display.height) {
            if w == 0 || h == 0 {
                return Err(ConfigError::Validation("display width/height must be > 0".into()));
            }
        }
        if let Some(fps) = display.refresh_fps {
            if fps == 0 || fps > 240 {
                return Err(ConfigError::Validation("display refresh_fps must be 1..=240".into()));
            }
        }
    }
    Ok(())
}
