//! File-backed store: one JSON grid file per table plus a manifest.
//!
//! Layout of a data directory:
//!
//! ```text
//! <data_dir>/
//!   store.json          manifest: table name -> file name, active table
//!   store.lock          advisory run lock, held with flock while a store is open
//!   tables/<file>.json  one Table per file
//! ```
//!
//! Writes stay in memory until [`TabularStore::flush`], which writes every
//! dirty table and then the manifest, each through a temp file and rename.
//!
//! The lock file itself is never removed. The OS drops the `flock` when the
//! holding process exits, so a killed run leaves nothing stale behind.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wte_common::{Error, Result, SCHEMA_VERSION};

use super::{missing, Table, TabularStore};

pub const MANIFEST_FILE_NAME: &str = "store.json";
pub const LOCK_FILE_NAME: &str = "store.lock";
const TABLES_DIR: &str = "tables";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    schema_version: String,
    #[serde(default)]
    tables: BTreeMap<String, String>,
    #[serde(default)]
    active: Option<String>,
}

/// JSON-on-disk [`TabularStore`] holding an exclusive lock while open.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    manifest: Manifest,
    tables: BTreeMap<String, Table>,
    dirty: BTreeSet<String>,
    manifest_dirty: bool,
    lock: StoreLock,
}

impl JsonFileStore {
    /// Open (or initialize) the store rooted at `root` and take its lock.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(TABLES_DIR))?;
        let lock = StoreLock::acquire(&root.join(LOCK_FILE_NAME))?;
        Self::load(root, lock)
    }

    fn load(root: &Path, lock: StoreLock) -> Result<Self> {
        let manifest_path = root.join(MANIFEST_FILE_NAME);
        let manifest: Manifest = if manifest_path.exists() {
            serde_json::from_str(&fs::read_to_string(&manifest_path)?)?
        } else {
            Manifest {
                schema_version: SCHEMA_VERSION.to_string(),
                ..Manifest::default()
            }
        };
        if !manifest.schema_version.is_empty() && !manifest_compatible(&manifest.schema_version) {
            return Err(Error::Store(format!(
                "store schema {} is incompatible with {}",
                manifest.schema_version, SCHEMA_VERSION
            )));
        }

        let mut tables = BTreeMap::new();
        for (name, file) in &manifest.tables {
            let path = root.join(TABLES_DIR).join(file);
            let table = if path.exists() {
                serde_json::from_str(&fs::read_to_string(&path)?).map_err(|e| {
                    Error::Store(format!("table '{name}' at {}: {e}", path.display()))
                })?
            } else {
                warn!(table = %name, path = %path.display(), "table file missing, treating as empty");
                Table::default()
            };
            tables.insert(name.clone(), table);
        }

        debug!(root = %root.display(), tables = tables.len(), "opened file store");
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            tables,
            dirty: BTreeSet::new(),
            manifest_dirty: false,
            lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, file: &str) -> PathBuf {
        self.root.join(TABLES_DIR).join(file)
    }

    fn file_name_for(&self, name: &str) -> String {
        let stem = sanitize_file_stem(name);
        let taken: BTreeSet<&str> = self.manifest.tables.values().map(String::as_str).collect();
        let mut candidate = format!("{stem}.json");
        let mut n = 2;
        while taken.contains(candidate.as_str()) {
            candidate = format!("{stem}-{n}.json");
            n += 1;
        }
        candidate
    }
}

impl TabularStore for JsonFileStore {
    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    fn create_table(&mut self, name: &str) -> Result<bool> {
        if self.tables.contains_key(name) {
            return Ok(false);
        }
        let file = self.file_name_for(name);
        self.manifest.tables.insert(name.to_string(), file);
        self.tables.insert(name.to_string(), Table::default());
        self.dirty.insert(name.to_string());
        self.manifest_dirty = true;
        Ok(true)
    }

    fn read_table(&self, name: &str) -> Result<Table> {
        self.tables.get(name).cloned().ok_or_else(|| missing(name))
    }

    fn write_table(&mut self, name: &str, table: Table) -> Result<()> {
        let slot = self.tables.get_mut(name).ok_or_else(|| missing(name))?;
        *slot = table;
        self.dirty.insert(name.to_string());
        Ok(())
    }

    fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.has_table(name) {
            return Err(missing(name));
        }
        self.manifest.active = Some(name.to_string());
        self.manifest_dirty = true;
        Ok(())
    }

    fn active(&self) -> Option<String> {
        self.manifest.active.clone()
    }

    fn flush(&mut self) -> Result<()> {
        let dirty = std::mem::take(&mut self.dirty);
        for name in &dirty {
            let (Some(table), Some(file)) = (self.tables.get(name), self.manifest.tables.get(name))
            else {
                continue;
            };
            let json = serde_json::to_vec_pretty(table)?;
            write_atomic(&self.table_path(file), &json)?;
        }

        if self.manifest_dirty || !self.root.join(MANIFEST_FILE_NAME).exists() {
            self.manifest.schema_version = SCHEMA_VERSION.to_string();
            let json = serde_json::to_vec_pretty(&self.manifest)?;
            write_atomic(&self.root.join(MANIFEST_FILE_NAME), &json)?;
            self.manifest_dirty = false;
        }

        debug!(root = %self.root.display(), tables = dirty.len(), "store flushed");
        Ok(())
    }
}

/// Exclusive advisory lock on `store.lock`, released by the OS on exit.
#[derive(Debug)]
struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Err(Error::LockHeld {
                        path: path.display().to_string(),
                    });
                }
                return Err(err.into());
            }
        }

        // Informational only; a previous holder may have left its pid here.
        file.set_len(0)?;
        let mut writer = &file;
        writeln!(writer, "{}", std::process::id())?;
        debug!(path = %path.display(), "store lock acquired");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            if unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) } != 0 {
                warn!(path = %self.path.display(), "failed to release store lock");
            }
        }
    }
}

/// Whether a manifest written at `version` can be read by this build.
/// Only the major component has to match.
fn manifest_compatible(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().and_then(|s| s.parse::<u32>().ok());
    major(version).is_some() && major(version) == major(SCHEMA_VERSION)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// File stem for a table name: ASCII alphanumerics kept, everything else `_`.
fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if stem.chars().all(|c| c == '_') {
        "table".to_string()
    } else {
        stem
    }
}
