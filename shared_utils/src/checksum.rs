//! File checksums
//!
//! Streaming BLAKE3 digest of a file, read in 16 KiB blocks so large
//! decoded references never have to sit in memory.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_BLOCK_SIZE: usize = 16 * 1024;

/// Hex-encoded BLAKE3 digest of the file at `path`.
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; READ_BLOCK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
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
    use std::fs;

    #[test]
    fn test_same_content_same_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&a, &content).unwrap();
        fs::write(&b, &content).unwrap();

        assert_eq!(file_checksum(&a).unwrap(), file_checksum(&b).unwrap());
    }

    #[test]
    fn test_matches_one_shot_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.bin");
        let content = vec![7u8; READ_BLOCK_SIZE * 3 + 5];
        fs::write(&path, &content).unwrap();

        let expected = blake3::hash(&content).to_hex().to_string();
        assert_eq!(file_checksum(&path).unwrap(), expected);
    }

    #[test]
    fn test_different_content_differs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"caf").unwrap();
        fs::write(&b, b"m4a").unwrap();

        assert_ne!(file_checksum(&a).unwrap(), file_checksum(&b).unwrap());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_checksum(&dir.path().join("missing")).is_err());
    }
}
