//! Typed serializers used by file-backed caches.
//!
//! A [`Codec<T>`] turns values of one type into bytes and back, and carries
//! the file extension and rank used when several codecs support the same type.
//! [`CodecRegistry::select_format`] picks the highest rank; registration
//! order breaks ties.

use std::any::{type_name, Any};
use std::cmp::Reverse;
use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::CacheError;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode codec failure: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("gzip codec failure: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Serializer for values of type `T`.
///
/// Implementations must round-trip: `parse(format(v)) == v`.
pub trait Codec<T>: Send + Sync {
    fn id(&self) -> &str;

    fn rank(&self) -> i32;

    /// Extension including the leading dot, e.g. `.json`.
    fn file_extension(&self) -> &str;

    fn parse(&self, bytes: &[u8]) -> Result<T, CodecError>;

    fn format(&self, value: &T) -> Result<Vec<u8>, CodecError>;
}

/// Human-readable JSON codec.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub const RANK: i32 = 100;

    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn id(&self) -> &str {
        "json"
    }

    fn rank(&self) -> i32 {
        Self::RANK
    }

    fn file_extension(&self) -> &str {
        ".json"
    }

    fn parse(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn format(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }
}

/// Compact binary codec; preferred over JSON when both are registered.
pub struct BincodeCodec<T>(PhantomData<fn() -> T>);

impl<T> BincodeCodec<T> {
    pub const RANK: i32 = 200;

    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn id(&self) -> &str {
        "bincode"
    }

    fn rank(&self) -> i32 {
        Self::RANK
    }

    fn file_extension(&self) -> &str {
        ".bin"
    }

    fn parse(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn format(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(value)?)
    }
}

/// Gzip layer over another codec; appends `.gz` to its extension.
pub struct GzipCodec<T> {
    inner: Arc<dyn Codec<T>>,
    id: String,
    extension: String,
}

impl<T> GzipCodec<T> {
    pub fn new(inner: Arc<dyn Codec<T>>) -> Self {
        let id = format!("{}+gzip", inner.id());
        let extension = format!("{}.gz", inner.file_extension());
        Self {
            inner,
            id,
            extension,
        }
    }
}

impl<T> Codec<T> for GzipCodec<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn rank(&self) -> i32 {
        self.inner.rank()
    }

    fn file_extension(&self) -> &str {
        &self.extension
    }

    fn parse(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut decoded)?;
        self.inner.parse(&decoded)
    }

    fn format(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let plain = self.inner.format(value)?;
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(plain.len() / 2),
            Compression::default(),
        );
        encoder.write_all(&plain)?;
        Ok(encoder.finish()?)
    }
}

struct Registration {
    id: String,
    rank: i32,
    type_name: &'static str,
    /// Holds an `Arc<dyn Codec<T>>` for the registered `T`.
    codec: Box<dyn Any + Send + Sync>,
}

/// Codecs of any value type, selected by rank.
#[derive(Default)]
pub struct CodecRegistry {
    entries: Vec<Registration>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON and bincode codecs for `T`, optionally gzip-wrapped.
    pub fn standard<T>(compress: bool) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let json: Arc<dyn Codec<T>> = Arc::new(JsonCodec::<T>::new());
        let bincode: Arc<dyn Codec<T>> = Arc::new(BincodeCodec::<T>::new());
        if compress {
            Self::new()
                .with(Arc::new(GzipCodec::new(json)) as Arc<dyn Codec<T>>)
                .with(Arc::new(GzipCodec::new(bincode)) as Arc<dyn Codec<T>>)
        } else {
            Self::new().with(json).with(bincode)
        }
    }

    pub fn register<T: 'static>(&mut self, codec: Arc<dyn Codec<T>>) {
        self.entries.push(Registration {
            id: codec.id().to_owned(),
            rank: codec.rank(),
            type_name: type_name::<T>(),
            codec: Box::new(codec),
        });
    }

    pub fn with<T: 'static>(mut self, codec: Arc<dyn Codec<T>>) -> Self {
        self.register(codec);
        self
    }

    /// Codecs supporting `T`, best first.
    pub fn formats<T: 'static>(&self) -> Vec<Arc<dyn Codec<T>>> {
        let mut candidates = self
            .entries
            .iter()
            .filter_map(|entry| {
                entry
                    .codec
                    .downcast_ref::<Arc<dyn Codec<T>>>()
                    .map(|codec| (entry.rank, Arc::clone(codec)))
            })
            .collect::<Vec<_>>();
        candidates.sort_by_key(|(rank, _)| Reverse(*rank));
        candidates.into_iter().map(|(_, codec)| codec).collect()
    }

    pub fn select_format<T: 'static>(&self) -> Result<Arc<dyn Codec<T>>, CacheError> {
        self.formats::<T>()
            .into_iter()
            .next()
            .ok_or(CacheError::NoSuitableCodec {
                type_name: type_name::<T>(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Debug for CodecRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| (entry.id.as_str(), entry.rank, entry.type_name)),
            )
            .finish()
    }
}
