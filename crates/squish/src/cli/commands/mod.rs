//! CLI commands

mod cache;
mod init;
mod optimize;

use std::path::{Path, PathBuf};

pub use cache::CacheCommand;
pub use init::InitCommand;
pub use optimize::OptimizeCommand;

/// Directory that relative paths in the config file resolve against
fn config_root(config_path: Option<&Path>, cwd: &Path) -> PathBuf {
    config_path
        .and_then(Path::parent)
        .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf)
}
