use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Derive where a diagnostic crop is kept.
/// Layout: `<base>/<field>/<attempt>-<first_16_hex_chars>.png`
pub fn crop_path(base: &Path, field: &str, attempt: u32, hash_hex: &str) -> PathBuf {
    let field_dir: String = field
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    base.join(field_dir)
        .join(format!("{attempt}-{}.png", &hash_hex[..16.min(hash_hex.len())]))
}
