// ABOUTME: XDG Base Directory paths for configuration and log storage
// ABOUTME: Falls back to the working directory when no home directory is known

use directories::ProjectDirs;
use std::path::PathBuf;

const QUALIFIER: &str = "cloud";
const ORGANIZATION: &str = "mchbee";
const APPLICATION: &str = "skidbot";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// e.g. ~/.local/share/skidbot/
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// e.g. ~/.local/share/skidbot/logs/
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// e.g. ~/.config/skidbot/
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Expand a leading `~` to the home directory. Returns the input unchanged
/// (with a warning) when the home directory cannot be determined.
pub fn expand_tilde(path: &str) -> String {
    let rest = match path.strip_prefix("~/") {
        Some(rest) => rest,
        None if path == "~" => "",
        None => return path.to_string(),
    };
    let Some(base) = directories::BaseDirs::new() else {
        tracing::warn!(path = %path, "Failed to expand tilde: could not determine home directory");
        return path.to_string();
    };
    base.home_dir().join(rest).to_string_lossy().to_string()
}
