use std::path::PathBuf;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

/// Per-user configuration directory for minipack, e.g.
/// `~/.config/minipack` on Linux. `None` if no home directory is known.
pub fn user_config_dir() -> Option<PathBuf> {
    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("minipack"))
}
