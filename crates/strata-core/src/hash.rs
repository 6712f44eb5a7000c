use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

/// Length of a content hash: SHA256 hex digest truncated to 16 chars.
pub const HASH_LEN: usize = 16;

const READ_BLOCK: usize = 64 * 1024;

fn truncate_hex(digest: &[u8]) -> String {
    let mut hex = String::with_capacity(HASH_LEN);
    for byte in digest.iter().take(HASH_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Hash raw bytes to the 16-hex-char content hash.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    truncate_hex(&hasher.finalize())
}

/// Hash UTF-8 file content. This is the primary cache key.
pub fn content_hash(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// Hash a file's bytes, streamed in 64 KiB blocks.
///
/// Unreadable files hash to the empty string; callers treat that as
/// "changed" rather than failing the run.
pub fn hash_file(path: &Path) -> String {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(file_path = %path.display(), error = %e, "failed to open file for hashing");
            return String::new();
        }
    };
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BLOCK];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) => {
                warn!(file_path = %path.display(), error = %e, "failed to read file for hashing");
                return String::new();
            }
        }
    }
    truncate_hex(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hash_is_16_hex_chars() {
        let h = content_hash("def run():\n    pass\n");
        assert_eq!(h.len(), HASH_LEN);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("hello!"));
    }

    #[test]
    fn test_file_hash_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"x = 1\n").unwrap();
        drop(f);
        assert_eq!(hash_file(&path), content_hash("x = 1\n"));
    }

    #[test]
    fn test_missing_file_hashes_empty() {
        assert_eq!(hash_file(Path::new("/nonexistent/file.py")), "");
    }

    #[test]
    fn test_large_file_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        let content = "a".repeat(READ_BLOCK * 2 + 17);
        std::fs::write(&path, &content).unwrap();
        assert_eq!(hash_file(&path), content_hash(&content));
    }
}
