use std::fmt::{Debug, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::{Cache, CacheEntry, Clock, SystemClock};
use crate::codec::{Codec, CodecRegistry};
use crate::CacheError;

/// Cache persisted as one file per key.
///
/// Files are named `<sha256(key)><extension>` and hold the codec-serialized
/// [`CacheEntry`], so expiration survives restarts. Writes go through a
/// temporary file in the same directory and are renamed into place; the last
/// writer wins. Unreadable or corrupt files count as misses.
pub struct FileCache<V> {
    dir: PathBuf,
    codec: Arc<dyn Codec<CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: 'static> FileCache<V> {
    /// Opens (and creates if needed) a cache rooted at `dir`.
    ///
    /// Fails with [`CacheError::NoSuitableCodec`] when `registry` has no codec
    /// for `CacheEntry<V>`.
    pub fn open(dir: impl Into<PathBuf>, registry: &CodecRegistry) -> Result<Self, CacheError> {
        let dir = dir.into();
        let codec = registry.select_format::<CacheEntry<V>>()?;
        fs::create_dir_all(&dir).map_err(|source| CacheError::io(&dir, source))?;
        tracing::debug!(dir = %dir.display(), codec = codec.id(), "opened file cache");
        Ok(Self {
            dir,
            codec,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<V> FileCache<V> {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn codec_id(&self) -> &str {
        self.codec.id()
    }

    /// Location of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir
            .join(format!("{digest}{}", self.codec.file_extension()))
    }

    fn read_entry(&self, path: &Path) -> Option<CacheEntry<V>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return None,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to read cache file");
                return None;
            }
        };
        match self.codec.parse(&bytes) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring corrupt cache file");
                None
            }
        }
    }
}

impl<V> Debug for FileCache<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("dir", &self.dir)
            .field("codec", &self.codec.id())
            .field("clock", &self.clock)
            .finish()
    }
}

impl<V> Cache<V> for FileCache<V>
where
    V: Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let path = self.path_for(key);
        let Some(entry) = self.read_entry(&path) else {
            return Ok(None);
        };
        if entry.is_expired(self.clock.as_ref()) {
            tracing::trace!(key, "cache entry expired");
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn put(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        let bytes = self.codec.format(&entry)?;
        let path = self.path_for(key);

        let mut file =
            NamedTempFile::new_in(&self.dir).map_err(|source| CacheError::io(&self.dir, source))?;
        file.write_all(&bytes)
            .map_err(|source| CacheError::io(file.path(), source))?;
        file.persist(&path)
            .map_err(|error| CacheError::io(&path, error.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::cache::ManualClock;

    #[test]
    fn entries_survive_reopen_with_their_expiration() {
        let dir = tempdir().expect("temp dir");
        let clock = Arc::new(ManualClock::default());
        let registry = CodecRegistry::standard::<CacheEntry<Vec<String>>>(true);

        let first = FileCache::<Vec<String>>::open(dir.path(), &registry)
            .expect("open")
            .with_clock(clock.clone());
        first
            .put("EXR", vec![String::from("D.USD")], Duration::from_secs(60))
            .expect("put");

        let second = FileCache::<Vec<String>>::open(dir.path(), &registry)
            .expect("reopen")
            .with_clock(clock.clone());
        assert_eq!(
            second.get("EXR").expect("get"),
            Some(vec![String::from("D.USD")])
        );

        clock.advance(Duration::from_secs(60));
        assert_eq!(second.get("EXR").expect("get"), None);
    }

    #[test]
    fn file_name_is_hashed_key_with_codec_extension() {
        let dir = tempdir().expect("temp dir");
        let registry = CodecRegistry::standard::<CacheEntry<u32>>(true);
        let cache = FileCache::<u32>::open(dir.path(), &registry).expect("open");

        let path = cache.path_for("ECB/EXR");
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.ends_with(".bin.gz"));
        assert_eq!(name.len(), 64 + ".bin.gz".len());
        assert_eq!(cache.path_for("ECB/EXR"), path);
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let dir = tempdir().expect("temp dir");
        let registry = CodecRegistry::standard::<CacheEntry<u32>>(false);
        let cache = FileCache::<u32>::open(dir.path(), &registry).expect("open");

        fs::write(cache.path_for("k"), b"not a cache entry").expect("write");
        assert_eq!(cache.get("k").expect("get"), None);

        cache.put("k", 3, Duration::from_secs(1)).expect("put");
        assert_eq!(cache.get("k").expect("get"), Some(3));
    }

    #[test]
    fn missing_codec_fails_at_open() {
        let dir = tempdir().expect("temp dir");
        let registry = CodecRegistry::standard::<CacheEntry<u32>>(false);
        let err = FileCache::<String>::open(dir.path(), &registry).expect_err("must fail");
        assert!(matches!(err, CacheError::NoSuitableCodec { .. }));
    }
}
