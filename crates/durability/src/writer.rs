//! Crash-safe file writes
//!
//! The primary document is replaced with the write-fsync-rename pattern:
//! 1. Write to a temporary file next to the target
//! 2. fsync the temporary file
//! 3. Atomic rename over the target
//! 4. fsync the parent directory
//!
//! Either the old or the new document is visible at every point, never a
//! partial one. Backups get fresh names on every write and are written in
//! place.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

/// Replace `target` with `data` via `temp`
pub fn write_atomic(target: &Path, temp: &Path, data: &[u8]) -> io::Result<()> {
    write_synced(temp, data)?;

    if let Err(e) = fs::rename(temp, target) {
        let _ = fs::remove_file(temp);
        return Err(e);
    }

    if let Some(dir) = target.parent() {
        sync_dir(dir)?;
    }
    Ok(())
}

/// Write `data` to `path` (create or truncate) and fsync it
pub fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Remove a temporary file left behind by an interrupted write
///
/// Returns whether a file was removed.
pub fn cleanup_temp_file(temp: &Path) -> io::Result<bool> {
    match fs::remove_file(temp) {
        Ok(()) => {
            debug!(path = %temp.display(), "Removed stale temporary file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("db.json");
        let temp = temp_dir.path().join(".db.json.tmp");

        write_atomic(&target, &temp, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");
        assert!(!temp.exists());
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("db.json");
        let temp = temp_dir.path().join(".db.json.tmp");

        write_atomic(&target, &temp, b"{\"a\": 1, \"long\": true}").unwrap();
        write_atomic(&target, &temp, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("missing").join("db.json");
        let temp = temp_dir.path().join("missing").join(".db.json.tmp");

        assert!(write_atomic(&target, &temp, b"{}").is_err());
    }

    #[test]
    fn test_cleanup_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let temp = temp_dir.path().join(".db.json.tmp");

        assert!(!cleanup_temp_file(&temp).unwrap());
        fs::write(&temp, b"partial").unwrap();
        assert!(cleanup_temp_file(&temp).unwrap());
        assert!(!temp.exists());
    }
}
