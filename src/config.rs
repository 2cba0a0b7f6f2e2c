// fmctl - CLI for the Cisco Firepower Management Center API
// Copyright (C) 2026 The fmctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.


use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const PROJECT_FILE: &str = ".fmctl.yaml";
pub const CONFIG_DIR_ENV: &str = "FMCTL_CONFIG_DIR";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Domain name or uuid picked when the server has several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Project,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("FMC server is required; set it with `fmctl configure --server <host>` or FMCTL_SERVER")]
    MissingServer,
    #[error("username is required; set it with `fmctl configure --username <name>` or FMCTL_USERNAME")]
    MissingUsername,
}

/// Connection settings after merging both scopes and the command line.
/// `password` stays optional; callers prompt for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub server: String,
    pub username: String,
    pub password: Option<String>,
    pub domain: Option<String>,
    pub verify_tls: bool,
}

pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    match scope {
        Scope::Project => Ok(cwd.join(PROJECT_FILE)),
        Scope::User => {
            if let Ok(custom) = env::var(CONFIG_DIR_ENV) {
                return Ok(PathBuf::from(custom).join("config.yaml"));
            }
            let base = config_dir().ok_or(ConfigError::MissingConfigDir)?;
            Ok(base.join("fmctl").join("config.yaml"))
        }
    }
}

/// User scope overlaid with project scope.
pub fn load(cwd: &Path) -> Result<Config> {
    let user = load_scope(Scope::User, cwd)?;
    let project = load_scope(Scope::Project, cwd)?;
    Ok(user.overlay(project))
}

pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    Ok(read_if_exists(&config_path(scope, cwd)?)?.unwrap_or_default())
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(&path, serialized).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn resolve(cwd: &Path, overrides: Config) -> Result<EffectiveConfig> {
    let merged = load(cwd)?.overlay(overrides);

    let server = merged
        .server
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::MissingServer)?;
    let username = merged
        .username
        .filter(|u| !u.is_empty())
        .ok_or(ConfigError::MissingUsername)?;

    Ok(EffectiveConfig {
        server,
        username,
        password: merged.password,
        domain: merged.domain,
        verify_tls: merged.verify_tls.unwrap_or(false),
    })
}

impl Config {
    /// Values set in `top` win.
    pub fn overlay(self, top: Config) -> Config {
        Config {
            server: top.server.or(self.server),
            username: top.username.or(self.username),
            password: top.password.or(self.password),
            domain: top.domain.or(self.domain),
            verify_tls: top.verify_tls.or(self.verify_tls),
        }
    }

    /// Copy safe to print.
    pub fn masked(&self) -> Config {
        Config {
            password: self.password.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(config))
}
