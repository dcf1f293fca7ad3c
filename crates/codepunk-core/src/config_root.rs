//! `<config-root>` resolution.
//!
//! Order: `CODEPUNK_CONFIG_HOME` if set; else on POSIX
//! `$XDG_CONFIG_HOME/codepunk` or `~/.config/codepunk`; on Windows
//! `%APPDATA%\CodePunk`.

use std::path::PathBuf;

pub fn config_root() -> anyhow::Result<PathBuf> {
    if let Ok(explicit) = std::env::var("CODEPUNK_CONFIG_HOME") {
        if !explicit.trim().is_empty() {
            return Ok(PathBuf::from(explicit));
        }
    }

    if cfg!(windows) {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return Ok(PathBuf::from(appdata).join("CodePunk"));
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Ok(PathBuf::from(xdg).join("codepunk"));
        }
    }

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("cannot resolve home directory for config root"))?;
    Ok(PathBuf::from(home).join(".config").join("codepunk"))
}
