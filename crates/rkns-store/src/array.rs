use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};
use crate::group::{self, Attributes};

/// Marker/metadata key of an array node.
pub(crate) const ARRAY_MARKER: &str = ".zarray";
/// Sub-prefix holding an array's chunks.
const CHUNK_DIR: &str = "c";
/// CRC32 framing prepended to every chunk.
const CHUNK_HEADER: usize = 4;

// ---------------------------------------------------------------------------
// DataType / ArrayData
// ---------------------------------------------------------------------------

/// Element type of an array. Stored little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl DataType {
    /// Bytes per element.
    pub fn item_size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

/// Flat, C-order array contents.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! le_decode {
    ($bytes:expr, $ty:ty) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|c| {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(c);
                <$ty>::from_le_bytes(buf)
            })
            .collect()
    };
}

impl ArrayData {
    pub fn dtype(&self) -> DataType {
        match self {
            Self::U8(_) => DataType::U8,
            Self::I16(_) => DataType::I16,
            Self::I32(_) => DataType::I32,
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Little-endian encoding of all elements.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::U8(v) => v.clone(),
            Self::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// Decode little-endian bytes. Returns `None` if the length is not a
    /// multiple of the element size.
    pub fn from_le_bytes(dtype: DataType, bytes: &[u8]) -> Option<Self> {
        if bytes.len() % dtype.item_size() != 0 {
            return None;
        }
        Some(match dtype {
            DataType::U8 => Self::U8(bytes.to_vec()),
            DataType::I16 => Self::I16(le_decode!(bytes, i16)),
            DataType::I32 => Self::I32(le_decode!(bytes, i32)),
            DataType::F32 => Self::F32(le_decode!(bytes, f32)),
            DataType::F64 => Self::F64(le_decode!(bytes, f64)),
        })
    }

    /// Every element widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::U8(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::I16(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::F64(v) => v.clone(),
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            Self::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<&[i16]> {
        match self {
            Self::I16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for ArrayData {
    fn from(v: Vec<u8>) -> Self {
        Self::U8(v)
    }
}

impl From<Vec<i16>> for ArrayData {
    fn from(v: Vec<i16>) -> Self {
        Self::I16(v)
    }
}

impl From<Vec<i32>> for ArrayData {
    fn from(v: Vec<i32>) -> Self {
        Self::I32(v)
    }
}

impl From<Vec<f32>> for ArrayData {
    fn from(v: Vec<f32>) -> Self {
        Self::F32(v)
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(v: Vec<f64>) -> Self {
        Self::F64(v)
    }
}

// ---------------------------------------------------------------------------
// Options / metadata
// ---------------------------------------------------------------------------

/// Chunk compression codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum Compression {
    None,
    Zstd { level: i32 },
}

impl Default for Compression {
    fn default() -> Self {
        Self::Zstd { level: 3 }
    }
}

/// How a new array is laid out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayOptions {
    /// Rows (axis-0 entries) per chunk. Derived from `target_chunk_bytes`
    /// when unset.
    pub chunk_rows: Option<u64>,
    /// Approximate uncompressed chunk size used when `chunk_rows` is unset.
    pub target_chunk_bytes: u64,
    pub compression: Compression,
}

impl Default for ArrayOptions {
    fn default() -> Self {
        Self {
            chunk_rows: None,
            target_chunk_bytes: 1024 * 1024,
            compression: Compression::default(),
        }
    }
}

impl ArrayOptions {
    fn resolve_chunk_rows(&self, row_bytes: u64) -> u64 {
        self.chunk_rows
            .unwrap_or_else(|| self.target_chunk_bytes / row_bytes.max(1))
            .max(1)
    }
}

/// Persisted array metadata (`.zarray`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayMeta {
    pub dtype: DataType,
    pub shape: Vec<u64>,
    pub chunk_rows: u64,
    pub compression: Compression,
    /// BLAKE3 hex digest of the little-endian content.
    pub digest: String,
}

impl ArrayMeta {
    /// Total element count.
    pub fn len(&self) -> u64 {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries along axis 0.
    pub fn rows(&self) -> u64 {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Elements per axis-0 entry.
    pub fn row_len(&self) -> u64 {
        self.shape.iter().skip(1).product()
    }

    fn row_bytes(&self) -> u64 {
        self.row_len() * self.dtype.item_size() as u64
    }

    fn chunk_count(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.rows().div_ceil(self.chunk_rows)
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk codec
// ---------------------------------------------------------------------------

fn encode_chunk(raw: &[u8], compression: Compression) -> StoreResult<Vec<u8>> {
    let payload = match compression {
        Compression::None => raw.to_vec(),
        Compression::Zstd { level } => {
            zstd::encode_all(raw, level).map_err(|e| StoreError::Compression(e.to_string()))?
        }
    };
    let mut framed = Vec::with_capacity(CHUNK_HEADER + payload.len());
    framed.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

fn decode_chunk(key: &str, framed: &[u8], compression: Compression) -> StoreResult<Vec<u8>> {
    let corrupt = |reason: String| StoreError::CorruptChunk {
        key: key.to_string(),
        reason,
    };
    if framed.len() < CHUNK_HEADER {
        return Err(corrupt("truncated header".into()));
    }
    let (header, payload) = framed.split_at(CHUNK_HEADER);
    let mut crc = [0u8; CHUNK_HEADER];
    crc.copy_from_slice(header);
    let expected = u32::from_le_bytes(crc);
    let computed = crc32fast::hash(payload);
    if expected != computed {
        return Err(corrupt(format!(
            "crc32 mismatch: expected {expected:08x}, computed {computed:08x}"
        )));
    }
    match compression {
        Compression::None => Ok(payload.to_vec()),
        Compression::Zstd { .. } => {
            zstd::decode_all(payload).map_err(|e| corrupt(format!("zstd: {e}")))
        }
    }
}

/// BLAKE3 hex digest, as recorded in array metadata.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

// ---------------------------------------------------------------------------
// Array handle
// ---------------------------------------------------------------------------

/// Handle to a chunked array node.
///
/// Arrays are written once, at creation; the handle only reads data.
/// Attributes stay mutable.
#[derive(Clone)]
pub struct Array {
    store: Arc<dyn StoreBackend>,
    path: String,
    meta: ArrayMeta,
}

impl Array {
    /// Write `data` as a new array at `path`. Chunks first, `.zarray` last.
    pub(crate) fn create(
        store: Arc<dyn StoreBackend>,
        path: String,
        data: &ArrayData,
        shape: &[u64],
        options: &ArrayOptions,
    ) -> StoreResult<Self> {
        let expected: u64 = shape.iter().product();
        if shape.is_empty() || expected != data.len() as u64 {
            return Err(StoreError::ShapeMismatch {
                path,
                shape: shape.to_vec(),
                expected,
                actual: data.len() as u64,
            });
        }

        let bytes = data.to_le_bytes();
        let dtype = data.dtype();
        let row_bytes = shape.iter().skip(1).product::<u64>() * dtype.item_size() as u64;
        let meta = ArrayMeta {
            dtype,
            shape: shape.to_vec(),
            chunk_rows: options.resolve_chunk_rows(row_bytes),
            compression: options.compression,
            digest: content_digest(&bytes),
        };

        if !bytes.is_empty() {
            let chunk_bytes = (meta.chunk_rows * row_bytes) as usize;
            for (index, raw) in bytes.chunks(chunk_bytes).enumerate() {
                let key = chunk_key(&path, index as u64);
                store.set(&key, &encode_chunk(raw, meta.compression)?)?;
            }
        }

        let encoded =
            serde_json::to_vec(&meta).map_err(|e| StoreError::Serialization(e.to_string()))?;
        store.set(&group::node_key(&path, ARRAY_MARKER), &encoded)?;
        debug!(
            path = %path,
            dtype = %meta.dtype,
            shape = ?meta.shape,
            chunks = meta.chunk_count(),
            "array written"
        );
        Ok(Self { store, path, meta })
    }

    /// Open the array at `path`.
    pub(crate) fn open(store: Arc<dyn StoreBackend>, path: String) -> StoreResult<Self> {
        let raw = store
            .get(&group::node_key(&path, ARRAY_MARKER))?
            .ok_or_else(|| StoreError::NotFound(display_path(&path)))?;
        let meta: ArrayMeta =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self { store, path, meta })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn meta(&self) -> &ArrayMeta {
        &self.meta
    }

    pub fn shape(&self) -> &[u64] {
        &self.meta.shape
    }

    pub fn dtype(&self) -> DataType {
        self.meta.dtype
    }

    /// Content digest recorded at write time.
    pub fn digest(&self) -> &str {
        &self.meta.digest
    }

    /// Read the whole array and verify its content digest.
    pub fn read(&self) -> StoreResult<ArrayData> {
        let bytes = self.read_row_bytes(0, self.meta.rows())?;
        let computed = content_digest(&bytes);
        if computed != self.meta.digest {
            return Err(StoreError::CorruptArray {
                path: display_path(&self.path),
                expected: self.meta.digest.clone(),
                computed,
            });
        }
        self.decode(bytes)
    }

    /// Read rows `start..end` along axis 0. Chunk CRCs are checked; the
    /// whole-array digest is not.
    pub fn read_rows(&self, start: u64, end: u64) -> StoreResult<ArrayData> {
        let bytes = self.read_row_bytes(start, end)?;
        self.decode(bytes)
    }

    /// Read a `u8` array as raw bytes.
    pub fn read_bytes(&self) -> StoreResult<Vec<u8>> {
        self.expect_dtype(DataType::U8)?;
        match self.read()? {
            ArrayData::U8(bytes) => Ok(bytes),
            other => Err(StoreError::DtypeMismatch {
                path: display_path(&self.path),
                stored: other.dtype().to_string(),
                requested: DataType::U8.to_string(),
            }),
        }
    }

    pub fn attrs(&self) -> StoreResult<Attributes> {
        group::read_attrs(self.store.as_ref(), &self.path)
    }

    pub fn set_attr(&self, key: &str, value: impl Into<serde_json::Value>) -> StoreResult<()> {
        let mut attrs = self.attrs()?;
        attrs.insert(key.to_string(), value.into());
        group::write_attrs(self.store.as_ref(), &self.path, &attrs)
    }

    pub fn update_attrs(&self, update: Attributes) -> StoreResult<()> {
        let mut attrs = self.attrs()?;
        attrs.extend(update);
        group::write_attrs(self.store.as_ref(), &self.path, &attrs)
    }

    fn expect_dtype(&self, requested: DataType) -> StoreResult<()> {
        if self.meta.dtype != requested {
            return Err(StoreError::DtypeMismatch {
                path: display_path(&self.path),
                stored: self.meta.dtype.to_string(),
                requested: requested.to_string(),
            });
        }
        Ok(())
    }

    fn decode(&self, bytes: Vec<u8>) -> StoreResult<ArrayData> {
        ArrayData::from_le_bytes(self.meta.dtype, &bytes).ok_or_else(|| StoreError::CorruptArray {
            path: display_path(&self.path),
            expected: format!("multiple of {} bytes", self.meta.dtype.item_size()),
            computed: format!("{} bytes", bytes.len()),
        })
    }

    fn read_row_bytes(&self, start: u64, end: u64) -> StoreResult<Vec<u8>> {
        let rows = self.meta.rows();
        if start > end || end > rows {
            return Err(StoreError::OutOfBounds {
                path: display_path(&self.path),
                start,
                end,
                rows,
            });
        }
        let row_bytes = self.meta.row_bytes();
        if start == end || row_bytes == 0 {
            return Ok(Vec::new());
        }

        let chunk_rows = self.meta.chunk_rows;
        let first = start / chunk_rows;
        let last = (end - 1) / chunk_rows;
        let mut out = Vec::with_capacity(((end - start) * row_bytes) as usize);
        for index in first..=last {
            let key = chunk_key(&self.path, index);
            let framed = self
                .store
                .get(&key)?
                .ok_or_else(|| StoreError::CorruptChunk {
                    key: key.clone(),
                    reason: "missing chunk".into(),
                })?;
            let chunk = decode_chunk(&key, &framed, self.meta.compression)?;

            let chunk_start_row = index * chunk_rows;
            let chunk_end_row = (chunk_start_row + chunk_rows).min(rows);
            let expected_len = ((chunk_end_row - chunk_start_row) * row_bytes) as usize;
            if chunk.len() != expected_len {
                return Err(StoreError::CorruptChunk {
                    key,
                    reason: format!("expected {expected_len} bytes, got {}", chunk.len()),
                });
            }

            let lo = (start.max(chunk_start_row) - chunk_start_row) * row_bytes;
            let hi = (end.min(chunk_end_row) - chunk_start_row) * row_bytes;
            out.extend_from_slice(&chunk[lo as usize..hi as usize]);
        }
        Ok(out)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("path", &display_path(&self.path))
            .field("dtype", &self.meta.dtype)
            .field("shape", &self.meta.shape)
            .finish()
    }
}

fn chunk_key(path: &str, index: u64) -> String {
    group::node_key(&group::node_key(path, CHUNK_DIR), &index.to_string())
}

pub(crate) fn display_path(path: &str) -> String {
    format!("/{path}")
}
