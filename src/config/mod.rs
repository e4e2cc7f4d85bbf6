//! Deployment configuration.
//!
//! - [`Config`]: the optional `svcp.yaml` describing the database identities,
//!   the credential store, the consumers of the credential and per-service overrides.
//! - [`Parser`]: locating and loading that file.
//! - [`ConfigFile`]: the line-oriented `KEY=VALUE` settings file each service reads.

mod duration;
mod env_file;
mod parser;
mod types;

pub use duration::parse_duration_string;
pub use env_file::{validate_key, ConfigFile, Line};
pub use parser::{Parser, CONFIG_FILE_NAME};
pub use types::*;

use std::path::{Path, PathBuf};

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s == "~" {
        dirs::home_dir().unwrap_or_else(|| path.to_path_buf())
    } else if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            home.join(rest)
        } else {
            path.to_path_buf()
        }
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_subpath() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_tilde(Path::new("~/.pgpass")), home.join(".pgpass"));
    }

    #[test]
    fn expand_tilde_leaves_other_paths() {
        assert_eq!(
            expand_tilde(Path::new("/etc/pgpass")),
            PathBuf::from("/etc/pgpass")
        );
        assert_eq!(expand_tilde(Path::new("a/~b")), PathBuf::from("a/~b"));
    }
}
