//! Store file layout
//!
//! A store is one primary file plus a sibling `backup` directory:
//!
//! ```text
//! <dir>/
//! ├── things.json                      # Primary document
//! ├── .things.json.tmp                 # Transient, only during a write
//! └── backup/
//!     ├── 1700000000000--things.json   # <millis>--<primary name>
//!     └── ...
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Name of the backup directory next to the primary file
pub const BACKUP_DIR_NAME: &str = "backup";

/// Separator between timestamp and primary name in backup file names
pub const BACKUP_SEPARATOR: &str = "--";

/// Paths belonging to one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    primary: PathBuf,
    backup_dir: PathBuf,
    base_name: String,
}

impl StorePaths {
    /// Derive the layout from the primary file path
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the path has no file name component.
    pub fn from_primary(primary: impl AsRef<Path>) -> io::Result<Self> {
        let primary = primary.as_ref().to_path_buf();
        let base_name = primary
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("store path has no file name: {}", primary.display()),
                )
            })?;
        let backup_dir = parent_dir(&primary).join(BACKUP_DIR_NAME);

        Ok(StorePaths {
            primary,
            backup_dir,
            base_name,
        })
    }

    /// Primary document path
    pub fn primary(&self) -> &Path {
        &self.primary
    }

    /// Directory holding the primary file
    pub fn data_dir(&self) -> &Path {
        parent_dir(&self.primary)
    }

    /// Backup directory
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// File name of the primary document
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Temporary file used while replacing the primary document
    pub fn temp_file(&self) -> PathBuf {
        self.data_dir().join(format!(".{}.tmp", self.base_name))
    }

    /// File name of the backup taken at `timestamp`
    pub fn backup_file_name(&self, timestamp: u64) -> String {
        format!("{}{}{}", timestamp, BACKUP_SEPARATOR, self.base_name)
    }

    /// Path of the backup taken at `timestamp`
    pub fn backup_file(&self, timestamp: u64) -> PathBuf {
        self.backup_dir.join(self.backup_file_name(timestamp))
    }

    /// Parse the timestamp out of a backup file name
    ///
    /// Returns None for names that are not `<digits>--<base name>`.
    pub fn parse_backup_timestamp(&self, file_name: &str) -> Option<u64> {
        let prefix = file_name
            .strip_suffix(self.base_name.as_str())?
            .strip_suffix(BACKUP_SEPARATOR)?;
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        prefix.parse().ok()
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
