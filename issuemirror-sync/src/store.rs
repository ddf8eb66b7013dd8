//! Document store: the vault as seen by the reconciliation engine.
//!
//! All paths passed to a [`DocumentStore`] are relative to the vault root.
//!
//! ## `FsStore::write`: atomic protocol
//!
//! 1. Normalise line endings to LF.
//! 2. Create missing parent directories.
//! 3. Write to `<path>.issuemirror.tmp`.
//! 4. Rename to the final path (atomic on POSIX).
//!
//! Deletion never unlinks: [`DocumentStore::trash`] moves the document under
//! `<vault>/.trash/`, keeping its relative path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};
use crate::frontmatter::Frontmatter;

/// Folder (relative to the vault) that receives trashed documents.
pub const TRASH_DIR: &str = ".trash";

/// Extension of managed documents.
pub const DOCUMENT_EXTENSION: &str = "md";

/// Storage operations the sync engine needs.
pub trait DocumentStore {
    fn read(&self, path: &Path) -> Result<String, SyncError>;

    /// Write `content`, creating parent folders as needed.
    fn write(&self, path: &Path, content: &str) -> Result<(), SyncError>;

    fn exists(&self, path: &Path) -> bool;

    /// Move a document out of the way. Returns where it went.
    fn trash(&self, path: &Path) -> Result<PathBuf, SyncError>;

    /// `.md` files directly inside `dir`, sorted. A missing folder is empty.
    fn list_documents(&self, dir: &Path) -> Result<Vec<PathBuf>, SyncError>;

    /// Sub-folders directly inside `dir`, sorted. A missing folder is empty.
    fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>, SyncError>;

    /// Remove `dir` if it exists and is empty. Returns whether it was removed.
    fn remove_dir_if_empty(&self, dir: &Path) -> Result<bool, SyncError>;

    fn read_frontmatter(&self, path: &Path) -> Result<Option<Frontmatter>, SyncError> {
        Ok(Frontmatter::parse(&self.read(path)?))
    }
}

// ---------------------------------------------------------------------------
// FsStore
// ---------------------------------------------------------------------------

/// Filesystem store rooted at the vault folder.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn entries(&self, dir: &Path) -> Result<Vec<(PathBuf, std::fs::FileType)>, SyncError> {
        let full = self.resolve(dir);
        let read = match std::fs::read_dir(&full) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&full, e)),
        };
        let mut out = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| io_err(&full, e))?;
            let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            out.push((dir.join(entry.file_name()), file_type));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

impl DocumentStore for FsStore {
    fn read(&self, path: &Path) -> Result<String, SyncError> {
        let full = self.resolve(path);
        let content = std::fs::read_to_string(&full).map_err(|e| io_err(&full, e))?;
        Ok(content.replace("\r\n", "\n"))
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), SyncError> {
        let full = self.resolve(path);
        let tmp = PathBuf::from(format!("{}.issuemirror.tmp", full.display()));
        atomic_write(&full, &tmp, content)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn trash(&self, path: &Path) -> Result<PathBuf, SyncError> {
        let from = self.resolve(path);
        let relative = Path::new(TRASH_DIR).join(path);
        let mut target = relative.clone();
        let mut n = 1;
        while self.resolve(&target).exists() {
            target = numbered(&relative, n);
            n += 1;
        }
        let to = self.resolve(&target);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::rename(&from, &to).map_err(|e| io_err(&from, e))?;
        tracing::info!("trashed: {} -> {}", from.display(), to.display());
        Ok(target)
    }

    fn list_documents(&self, dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
        Ok(self
            .entries(dir)?
            .into_iter()
            .filter(|(path, ty)| {
                ty.is_file() && path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
            })
            .map(|(path, _)| path)
            .collect())
    }

    fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
        Ok(self
            .entries(dir)?
            .into_iter()
            .filter(|(_, ty)| ty.is_dir())
            .map(|(path, _)| path)
            .collect())
    }

    fn remove_dir_if_empty(&self, dir: &Path) -> Result<bool, SyncError> {
        let full = self.resolve(dir);
        let mut read = match std::fs::read_dir(&full) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_err(&full, e)),
        };
        if read.next().is_some() {
            return Ok(false);
        }
        std::fs::remove_dir(&full).map_err(|e| io_err(&full, e))?;
        tracing::debug!("removed empty folder: {}", full.display());
        Ok(true)
    }
}

/// `notes/Issue - 7.md` → `notes/Issue - 7 (2).md`
fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({}).{}", n + 1, ext.to_string_lossy()),
        None => format!("{stem} ({})", n + 1),
    };
    path.with_file_name(name)
}

fn atomic_write(path: &Path, tmp: &Path, content: &str) -> Result<(), SyncError> {
    let normalized = content.replace("\r\n", "\n");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, normalized).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    tracing::debug!("wrote: {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsStore) {
        let dir = TempDir::new().expect("vault");
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn write_creates_parents_and_normalises_crlf() {
        let (_dir, store) = store();
        let path = Path::new("GitHub Issues/acme/widgets/Issue - 1.md");
        store.write(path, "line one\r\nline two\r\n").expect("write");
        assert_eq!(store.read(path).expect("read"), "line one\nline two\n");
        let raw = std::fs::read(store.root().join(path)).unwrap();
        assert!(!raw.contains(&b'\r'));
    }

    #[test]
    fn write_leaves_no_tmp_file() {
        let (_dir, store) = store();
        let path = Path::new("a.md");
        store.write(path, "x").expect("write");
        store.write(path, "y").expect("overwrite");
        let names: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md".to_string()]);
    }

    #[test]
    fn write_failure_surfaces_path() {
        let (_dir, store) = store();
        std::fs::write(store.root().join("blocker"), "file").unwrap();
        let err = store.write(Path::new("blocker/doc.md"), "x").unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn trash_moves_and_numbers_collisions() {
        let (_dir, store) = store();
        let path = Path::new("Issues/Issue - 3.md");
        store.write(path, "first").unwrap();
        let first = store.trash(path).expect("trash");
        assert_eq!(first, Path::new(".trash/Issues/Issue - 3.md"));
        assert!(!store.exists(path));

        store.write(path, "second").unwrap();
        let second = store.trash(path).expect("trash again");
        assert_eq!(second, Path::new(".trash/Issues/Issue - 3 (2).md"));
        assert_eq!(store.read(&second).unwrap(), "second");
    }

    #[test]
    fn listing_filters_and_sorts() {
        let (_dir, store) = store();
        let dir = Path::new("notes");
        store.write(&dir.join("b.md"), "").unwrap();
        store.write(&dir.join("a.md"), "").unwrap();
        store.write(&dir.join("c.txt"), "").unwrap();
        store.write(&dir.join("sub/d.md"), "").unwrap();

        let docs = store.list_documents(dir).unwrap();
        assert_eq!(docs, vec![dir.join("a.md"), dir.join("b.md")]);
        assert_eq!(store.list_dirs(dir).unwrap(), vec![dir.join("sub")]);
        assert!(store.list_documents(Path::new("missing")).unwrap().is_empty());
    }

    #[test]
    fn remove_dir_only_when_empty() {
        let (_dir, store) = store();
        store.write(Path::new("full/x.md"), "").unwrap();
        std::fs::create_dir_all(store.root().join("empty")).unwrap();
        assert!(!store.remove_dir_if_empty(Path::new("full")).unwrap());
        assert!(store.remove_dir_if_empty(Path::new("empty")).unwrap());
        assert!(!store.remove_dir_if_empty(Path::new("empty")).unwrap());
    }
}
