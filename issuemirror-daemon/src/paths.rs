use std::path::{Path, PathBuf};

use issuemirror_core::config::root_dir_at;

pub const DAEMON_SOCKET: &str = "daemon.sock";

/// `<home>/.issuemirror/daemon.sock`
pub fn socket_path(home: &Path) -> PathBuf {
    root_dir_at(home).join(DAEMON_SOCKET)
}
