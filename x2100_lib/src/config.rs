//! Load time settings of the EC handle
//!
//! ```toml
//! [ec]
//! command_port = 0x66
//! data_port = 0x62
//! gpe = 0x17
//! global_lock = false
//! # Dangerous, reboot and removal of battery may be needed
//! write_support = false
//! poll_limit = 65535
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ec::{EcError, EcResult, EcSettings};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    ec: Option<EcConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EcConfig {
    command_port: Option<u16>,
    data_port: Option<u16>,
    gpe: Option<u32>,
    global_lock: Option<bool>,
    write_support: Option<bool>,
    poll_limit: Option<u32>,
}

pub const CONFIG_FILE: &str = "x2100_tool_config.toml";

/// Next to the executable first, then the working directory
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![];
    if let Ok(mut path) = std::env::current_exe() {
        path.pop();
        path.push(CONFIG_FILE);
        paths.push(path);
    }
    paths.push(PathBuf::from(CONFIG_FILE));
    paths
}

pub fn parse_config(toml_str: &str) -> EcResult<EcSettings> {
    let decoded: Config =
        toml::from_str(toml_str).map_err(|err| EcError::Config(err.to_string()))?;
    debug!("{:?}", decoded);

    let ec = decoded.ec.unwrap_or_default();
    let defaults = EcSettings::default();
    let settings = EcSettings {
        command_port: ec.command_port.unwrap_or(defaults.command_port),
        data_port: ec.data_port.unwrap_or(defaults.data_port),
        write_support: ec.write_support.unwrap_or(defaults.write_support),
        gpe: ec.gpe.unwrap_or(defaults.gpe),
        global_lock: ec.global_lock.unwrap_or(defaults.global_lock),
        poll_limit: ec.poll_limit.unwrap_or(defaults.poll_limit),
    };

    if settings.poll_limit == 0 {
        return Err(EcError::Config("poll_limit must be at least 1".to_string()));
    }
    if settings.command_port == settings.data_port {
        return Err(EcError::Config(format!(
            "command and data port are both {:#X}",
            settings.command_port
        )));
    }
    Ok(settings)
}

/// Read settings from `path`, or from the default locations if None.
/// Without any config file the defaults apply, a given file must exist.
pub fn load_config(path: Option<&Path>) -> EcResult<EcSettings> {
    if let Some(path) = path {
        let toml_str = std::fs::read_to_string(path).map_err(|err| {
            EcError::Config(format!("Failed to read {}: {}", path.display(), err))
        })?;
        return parse_config(&toml_str);
    }

    for path in default_config_paths() {
        if let Ok(toml_str) = std::fs::read_to_string(&path) {
            info!("Using config {}", path.display());
            return parse_config(&toml_str);
        }
    }
    Ok(EcSettings::default())
}
