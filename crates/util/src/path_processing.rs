use std::path::PathBuf;

use dirs_next::{config_dir, home_dir};

/// Directory name used under the platform configuration directory.
pub const CONFIG_DIR_NAME: &str = "varscope";

pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// `<config_dir>/varscope`, falling back to the working directory.
pub fn default_config_dir() -> PathBuf {
    config_dir().unwrap_or_else(|| PathBuf::from(".")).join(CONFIG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_trimmed_only() {
        assert_eq!(expand_tilde("  /tmp/history.json "), PathBuf::from("/tmp/history.json"));
    }

    #[test]
    fn config_dir_ends_with_crate_directory() {
        assert!(default_config_dir().ends_with(CONFIG_DIR_NAME));
    }
}
