// src/watch/hash.rs

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fs::FileSystem;

/// blake3 hex digest of a single file's contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn identical_contents_hash_identically() {
        let fs = MockFileSystem::new();
        fs.add_file("a.css", b"body{}");
        fs.add_file("b.css", b"body{}");
        fs.add_file("c.css", b"body{color:red}");

        let a = compute_file_hash(&fs, Path::new("a.css")).unwrap();
        let b = compute_file_hash(&fs, Path::new("b.css")).unwrap();
        let c = compute_file_hash(&fs, Path::new("c.css")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn missing_file_is_an_error() {
        let fs = MockFileSystem::new();
        assert!(compute_file_hash(&fs, Path::new("gone.css")).is_err());
    }
}
