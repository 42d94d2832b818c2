use std::any::Any;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A type-erased, thread-safe container.
pub(crate) type Dynamic = Arc<dyn Any + Send + Sync>;

/// A 32-byte BLAKE3 hash used for fingerprinting.
///
/// In `hanko`, this serves two purposes:
/// 1. It digests the resolved dependency versions into the dependency
///    fingerprint stamped into HTML.
/// 2. It records the content hash of every emitted bundle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub fn hash_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(blake3::Hasher::new().update_mmap(path)?.finalize().into())
    }

    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for &byte in self.0.iter() {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Per-build values fixed for the lifetime of a single process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    /// Milliseconds since the Unix epoch, captured when the build started.
    pub bundle_version: u128,
}

impl BuildInfo {
    /// Captures the current wall-clock time as the bundle version.
    pub fn now() -> Self {
        let bundle_version = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();

        Self { bundle_version }
    }
}

/// Global configuration and state available to all tasks.
///
/// # Type Parameters
///
/// * `D`: The type of the user-defined global data. Must be `Send + Sync`.
#[derive(Clone)]
pub struct Environment<D: Send + Sync = ()> {
    /// User-defined global data.
    pub data: D,
}

impl<D: Send + Sync> Environment<D> {
    pub fn new(data: D) -> Self {
        Self { data }
    }
}

impl<D: Send + Sync> std::fmt::Debug for Environment<D>
where
    D: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("data", &self.data)
            .finish()
    }
}

/// The context passed to every task execution.
pub struct TaskContext<'a, G: Send + Sync = ()> {
    /// Access to global configuration and data.
    pub env: &'a Environment<G>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_matches_blake3() {
        let hash = Hash32::hash(b"hanko");
        assert_eq!(hash.to_hex(), blake3::hash(b"hanko").to_hex().as_str());
        assert_eq!(hash.to_hex().len(), 64);
    }

    #[test]
    fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.js");
        std::fs::write(&path, "console.log(1)").unwrap();

        assert_eq!(
            Hash32::hash_file(&path).unwrap(),
            Hash32::hash("console.log(1)")
        );
    }

    #[test]
    fn test_build_info_is_recent() {
        // 2020-09-13T12:26:40Z
        assert!(BuildInfo::now().bundle_version > 1_600_000_000_000);
    }
}
