// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/tasktally/tasktally.toml`, then the XDG user config,
//! then `./tasktally.toml`, with `TASKTALLY_` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TasktallyConfig;

/// Config file name searched for in every location.
pub const CONFIG_FILE_NAME: &str = "tasktally.toml";

/// Top-level sections, used to map `TASKTALLY_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &[
    "agent", "logging", "telegram", "server", "oauth", "storage", "bus", "tracking",
];

/// The config files consulted by [`load_config`], lowest precedence first.
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/tasktally").join(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("tasktally").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Build the Figment used for config loading.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tasktally/tasktally.toml` (system-wide)
/// 3. `~/.config/tasktally/tasktally.toml` (user XDG config)
/// 4. `./tasktally.toml` (local directory)
/// 5. `TASKTALLY_*` environment variables
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(TasktallyConfig::default()));
    for path in config_file_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<TasktallyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TasktallyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TasktallyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TasktallyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TasktallyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping `TASKTALLY_SERVER_MAX_BODY_BYTES` to
/// `server.max_body_bytes`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores themselves.
fn env_provider() -> Env {
    Env::prefixed("TASKTALLY_").map(|key| {
        let key_str = key.as_str();
        SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string())
            .into()
    })
}
