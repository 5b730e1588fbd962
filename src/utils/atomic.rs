//! Atomic file replacement: write a sibling temp file, fsync, rename.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// `.name.tmp` next to `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Readers see either the old file or the complete new one
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = write_synced(&tmp, bytes).and_then(|_| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_synced(tmp: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("out.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file
        let path = dir.path().join("taken");
        fs::create_dir_all(path.join("inner")).unwrap();

        assert!(write_atomic(&path, b"data").is_err());
        assert!(!temp_path(&path).exists());
        assert!(path.join("inner").is_dir());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = temp_path(Path::new("data/denylist.json"));
        assert_eq!(tmp, PathBuf::from("data/.denylist.json.tmp"));
    }
}
