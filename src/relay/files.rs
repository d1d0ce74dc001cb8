//! Read-only store for the files the server offers for download.
//!
//! All lookups are confined to a single directory. Requested names are
//! reduced to their final path component before being joined onto the
//! store directory, so a request can never reach outside of it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of the regular files in the store directory, sorted.
    ///
    /// A missing directory is treated as an empty store rather than an
    /// error, so a freshly deployed server can answer list requests
    /// before anyone has provisioned files.
    pub fn list(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads a stored file in full.
    ///
    /// Only the final component of `name` is used, so `../secret` and
    /// `sub/dir/report.txt` both resolve inside the store directory.
    /// Returns `NotFound` when the name has no final component or the
    /// file does not exist.
    pub fn read(&self, name: &str) -> io::Result<Bytes> {
        let file_name = Path::new(name)
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "empty file name"))?;
        let path = self.dir.join(file_name);
        let bytes = fs::read(path)?;
        Ok(Bytes::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rustyrelay_files_{tag}_test"));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    #[test]
    fn test_list_sorted_regular_files_only() {
        let dir = scratch_dir("list");
        File::create(dir.join("beta.txt"))
            .expect("create")
            .write_all(b"b")
            .expect("write");
        File::create(dir.join("alpha.txt"))
            .expect("create")
            .write_all(b"a")
            .expect("write");
        fs::create_dir_all(dir.join("subdir")).expect("failed to create subdir");

        let store = FileStore::new(&dir);
        let names = store.list().expect("list failed");
        assert_eq!(names, vec!["alpha.txt".to_string(), "beta.txt".to_string()]);

        fs::remove_dir_all(dir).expect("failed to remove tmp dir");
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = std::env::temp_dir().join("rustyrelay_files_missing_test_nonexistent");
        let store = FileStore::new(&dir);
        let names = store.list().expect("list failed");
        assert!(names.is_empty());
    }

    #[test]
    fn test_read_whole_file() {
        let dir = scratch_dir("read");
        let content = b"relay me";
        File::create(dir.join("notes.txt"))
            .expect("create")
            .write_all(content)
            .expect("write");

        let store = FileStore::new(&dir);
        let bytes = store.read("notes.txt").expect("read failed");
        assert_eq!(&bytes[..], content);

        fs::remove_dir_all(dir).expect("failed to remove tmp dir");
    }

    #[test]
    fn test_read_strips_path_components() {
        let dir = scratch_dir("strip");
        File::create(dir.join("inside.txt"))
            .expect("create")
            .write_all(b"inside")
            .expect("write");

        let store = FileStore::new(&dir);
        // Both resolve to the final component inside the store dir.
        let bytes = store.read("../inside.txt").expect("read failed");
        assert_eq!(&bytes[..], b"inside");
        let bytes = store.read("deep/nested/inside.txt").expect("read failed");
        assert_eq!(&bytes[..], b"inside");

        fs::remove_dir_all(dir).expect("failed to remove tmp dir");
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let dir = scratch_dir("missing");
        let store = FileStore::new(&dir);

        match store.read("no_such_file.bin") {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            Ok(_) => panic!("expected NotFound for missing file"),
        }
        // A name with no final component is also NotFound.
        match store.read("..") {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            Ok(_) => panic!("expected NotFound for bare .."),
        }

        fs::remove_dir_all(dir).expect("failed to remove tmp dir");
    }
}
