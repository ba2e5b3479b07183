//! Persistent [`CacheStorage`] on the local filesystem.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/.current                 store recorded as current
//! <root>/<store>/.sealed          marker written after a complete population
//! <root>/<store>/<sha1>.entry     one file per request key
//! ```
//!
//! An entry file is a 4-byte little-endian header length, a JSON header
//! (`CachedData<EntryHeader>`), then the raw body. Every file is written to a
//! temporary file and renamed into place, so a reader sees either the old or
//! the new contents.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use tokio::{fs, task};
use tracing::{debug, warn};

use crate::net::CachedResponse;

use super::{CacheStorage, CachedData, EntryInfo, RequestKey, StorageError, StorageResult};

const SEALED_MARKER: &str = ".sealed";
const CURRENT_POINTER: &str = ".current";
const ENTRY_EXTENSION: &str = "entry";
const HEADER_LEN_BYTES: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Use `root` as the store directory, creating it if needed.
    pub async fn new(root: PathBuf) -> StorageResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, store: &str) -> StorageResult<PathBuf> {
        if store.is_empty() || store.starts_with('.') || store.contains(['/', '\\']) {
            return Err(StorageError::NoSuchStore(store.to_string()));
        }
        Ok(self.root.join(store))
    }

    fn entry_name(key: &RequestKey) -> String {
        let mut hasher = Sha1::new();
        hasher.update(key.url.as_bytes());
        for (name, value) in &key.vary {
            hasher.update([0u8]);
            hasher.update(name.as_bytes());
            hasher.update([b':']);
            hasher.update(value.as_bytes());
        }
        format!("{:x}.{}", hasher.finalize(), ENTRY_EXTENSION)
    }

    fn encode(key: &RequestKey, response: &CachedResponse) -> StorageResult<Vec<u8>> {
        let header = CachedData::new(EntryHeader {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
        });
        let header = serde_json::to_vec(&header)?;
        let header_len = u32::try_from(header.len()).map_err(|_| StorageError::Corrupt {
            path: PathBuf::new(),
            reason: "entry header too large".to_string(),
        })?;

        let mut buf = Vec::with_capacity(HEADER_LEN_BYTES + header.len() + response.body.len());
        buf.extend_from_slice(&header_len.to_le_bytes());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&response.body);
        Ok(buf)
    }

    fn decode(path: &Path, raw: Vec<u8>) -> StorageResult<(CachedData<EntryHeader>, Bytes)> {
        let corrupt = |reason: &str| StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let len_bytes: [u8; HEADER_LEN_BYTES] = raw
            .get(..HEADER_LEN_BYTES)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| corrupt("truncated length prefix"))?;
        let header_end = HEADER_LEN_BYTES + u32::from_le_bytes(len_bytes) as usize;
        if header_end > raw.len() {
            return Err(corrupt("truncated header"));
        }

        let header: CachedData<EntryHeader> =
            serde_json::from_slice(&raw[HEADER_LEN_BYTES..header_end])
                .map_err(|e| corrupt(&e.to_string()))?;
        let body = Bytes::from(raw).slice(header_end..);
        Ok((header, body))
    }

    async fn read_entry(path: &Path) -> StorageResult<Option<(CachedData<EntryHeader>, Bytes)>> {
        match fs::read(path).await {
            Ok(raw) => Self::decode(path, raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn dir_exists(dir: &Path) -> StorageResult<bool> {
        match fs::metadata(dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(dir, e)),
        }
    }

    /// Write `contents` to `target` through a temporary file in `dir`, then
    /// rename it into place. The temporary file is removed on any failure.
    async fn write_atomic(store: &str, dir: &Path, target: &Path, contents: Vec<u8>) -> StorageResult<()> {
        let store = store.to_string();
        let dir = dir.to_path_buf();
        let target = target.to_path_buf();
        let join_target = target.clone();

        task::spawn_blocking(move || {
            let missing_store = |e: &std::io::Error| e.kind() == ErrorKind::NotFound;

            let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
                if missing_store(&e) {
                    StorageError::NoSuchStore(store.clone())
                } else {
                    StorageError::io(&dir, e)
                }
            })?;
            tmp.write_all(&contents)
                .map_err(|e| StorageError::io(&target, e))?;
            tmp.persist(&target).map_err(|e| {
                if missing_store(&e.error) {
                    StorageError::NoSuchStore(store.clone())
                } else {
                    StorageError::io(&target, e.error)
                }
            })?;
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::io(join_target, std::io::Error::other(e)))?
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, store: &str) -> StorageResult<()> {
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.root, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, store: &str) -> StorageResult<bool> {
        let dir = self.store_dir(store)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(store, "Store deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&dir, e)),
        }
    }

    async fn lookup(&self, store: &str, key: &RequestKey) -> StorageResult<Option<CachedResponse>> {
        let path = self.store_dir(store)?.join(Self::entry_name(key));
        let Some((header, body)) = Self::read_entry(&path).await? else {
            return Ok(None);
        };
        // Distinct keys sharing a digest would be a collision; treat as a miss.
        if header.data.key != *key {
            warn!(path = %path.display(), "Entry key mismatch");
            return Ok(None);
        }
        Ok(Some(CachedResponse {
            status: header.data.status,
            headers: header.data.headers,
            body,
        }))
    }

    async fn put(&self, store: &str, key: &RequestKey, response: &CachedResponse) -> StorageResult<()> {
        let dir = self.store_dir(store)?;
        if !Self::dir_exists(&dir).await? {
            return Err(StorageError::NoSuchStore(store.to_string()));
        }
        let target = dir.join(Self::entry_name(key));
        let contents = Self::encode(key, response)?;
        Self::write_atomic(store, &dir, &target, contents).await
    }

    async fn seal(&self, store: &str) -> StorageResult<()> {
        let dir = self.store_dir(store)?;
        if !Self::dir_exists(&dir).await? {
            return Err(StorageError::NoSuchStore(store.to_string()));
        }
        let marker = dir.join(SEALED_MARKER);
        let stamp = serde_json::to_vec(&CachedData::new(store))?;
        Self::write_atomic(store, &dir, &marker, stamp).await
    }

    async fn is_sealed(&self, store: &str) -> StorageResult<bool> {
        let marker = self.store_dir(store)?.join(SEALED_MARKER);
        match fs::metadata(&marker).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&marker, e)),
        }
    }

    async fn entries(&self, store: &str) -> StorageResult<Vec<EntryInfo>> {
        let dir = self.store_dir(store)?;
        let mut listing = match fs::read_dir(&dir).await {
            Ok(listing) => listing,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NoSuchStore(store.to_string()))
            }
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        let mut infos = Vec::new();
        while let Some(entry) = listing
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(Some((header, body))) => infos.push(EntryInfo {
                    key: header.data.key,
                    status: header.data.status,
                    size: body.len(),
                    cached_at: header.cached_at,
                }),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
            }
        }
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(infos)
    }

    async fn current(&self) -> StorageResult<Option<String>> {
        let path = self.root.join(CURRENT_POINTER);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        let pointer: CachedData<String> =
            serde_json::from_slice(&raw).map_err(|e| StorageError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Some(pointer.data))
    }

    async fn set_current(&self, store: &str) -> StorageResult<()> {
        let dir = self.store_dir(store)?;
        if !Self::dir_exists(&dir).await? {
            return Err(StorageError::NoSuchStore(store.to_string()));
        }
        let pointer = serde_json::to_vec(&CachedData::new(store))?;
        Self::write_atomic(store, &self.root, &self.root.join(CURRENT_POINTER), pointer).await?;
        debug!(store, "Current store recorded");
        Ok(())
    }
}
