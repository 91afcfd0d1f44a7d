//! Small helpers shared across modules.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Resolve a configured path, replacing a leading `~` or `~/` with `$HOME`.
///
/// `~user` forms are not supported and are returned as written, as is any
/// path when `HOME` is unset.
pub fn home_path(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return PathBuf::from(raw),
    };
    match std::env::var_os("HOME") {
        Some(home) => {
            let mut path = PathBuf::from(home);
            let rest = rest.trim_start_matches('/');
            if !rest.is_empty() {
                path.push(rest);
            }
            path
        }
        None => PathBuf::from(raw),
    }
}

/// Write `contents` to `path` via a temp file in the same directory, then
/// rename over the target, so readers never see a half-written file.
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    write_via_temp(path, contents, None)
}

/// [`write_atomic`] for secrets: on unix the file is created owner-only
/// (`0600`) before any byte is written.
pub fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    write_via_temp(path, contents, Some(0o600))
}

fn write_via_temp(path: &Path, contents: &[u8], mode: Option<u32>) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .map_or_else(|| "state".into(), |n| n.to_string_lossy());
    let temp_path = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));

    // A leftover temp file would keep its old permissions.
    let _ = std::fs::remove_file(&temp_path);
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = mode {
            options.mode(mode);
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    let written = options
        .open(&temp_path)
        .and_then(|mut file| file.write_all(contents))
        .and_then(|()| std::fs::rename(&temp_path, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    written
}
