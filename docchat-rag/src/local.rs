//! Directory-backed vector store.
//!
//! Layout under the persistence directory:
//!
//! ```text
//! db/
//!   manifest.json        format version + one entry per collection
//!   <collection>.jsonl   one serialized Chunk (with embedding) per line
//!   <collection>.<n>.jsonl   the same, after the n-th full replace
//! ```
//!
//! Writes go through to disk immediately: collection files are append-only
//! and the manifest is replaced atomically. Replacing a collection writes a
//! new file and only the manifest swap makes it live, so a failed rebuild
//! leaves the previous index readable. On load, a later line with the same
//! chunk id replaces an earlier one. Loading never re-embeds anything.

use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::inmemory::{InMemoryVectorStore, check_dimensions, ensure_compatible};
use crate::vectorstore::{CollectionSpec, VectorStore};

/// File name of the index manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// On-disk format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

const BACKEND: &str = "Local";

/// Contents of `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// On-disk format version.
    pub format_version: u32,
    /// Collections by name.
    pub collections: BTreeMap<String, CollectionManifest>,
}

impl Default for IndexManifest {
    fn default() -> Self {
        Self { format_version: FORMAT_VERSION, collections: BTreeMap::new() }
    }
}

/// Manifest entry for one collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionManifest {
    /// Embedding model the vectors were produced with.
    pub embedding_model: String,
    /// Length of every stored vector.
    pub dimensions: usize,
    /// Number of distinct chunks after the last write.
    pub chunk_count: usize,
    /// When the collection was created.
    pub created_at: DateTime<Utc>,
    /// When the collection was last written.
    pub updated_at: DateTime<Utc>,
    /// Number of full replaces; selects the collection file.
    #[serde(default)]
    pub generation: u64,
}

impl CollectionManifest {
    /// The spec this collection was created with.
    pub fn spec(&self) -> CollectionSpec {
        CollectionSpec { dimensions: self.dimensions, embedding_model: self.embedding_model.clone() }
    }
}

/// A [`VectorStore`] persisted under a directory.
///
/// Use [`LocalVectorStore::create`] when building an index (the directory is
/// created if absent) and [`LocalVectorStore::open`] when querying (a missing
/// index is reported as `Ok(None)`).
///
/// The store assumes a single writer; running ingestion while another process
/// queries the same directory is not supported.
#[derive(Debug)]
pub struct LocalVectorStore {
    root: PathBuf,
    inner: InMemoryVectorStore,
    manifest: Mutex<IndexManifest>,
}

impl LocalVectorStore {
    /// Open the store at `root` for writing, creating the directory if needed.
    ///
    /// An existing index is loaded so collections can be appended to.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexCorrupt`] if the directory holds data that
    /// cannot be read.
    pub async fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        match Self::open(&root).await? {
            Some(store) => Ok(store),
            None => {
                info!(path = %root.display(), "creating new vector index");
                Ok(Self {
                    root,
                    inner: InMemoryVectorStore::new(),
                    manifest: Mutex::new(IndexManifest::default()),
                })
            }
        }
    }

    /// Load the index at `root`.
    ///
    /// Returns `Ok(None)` when the directory does not exist or is empty:
    /// no index has been built there yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexCorrupt`] if the manifest is missing from a
    /// non-empty directory, cannot be parsed, has an unknown format version,
    /// or a collection file is missing or malformed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Option<Self>> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);

        let raw = match fs::read_to_string(&manifest_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return if is_missing_or_empty(&root).await? {
                    debug!(path = %root.display(), "no vector index found");
                    Ok(None)
                } else {
                    Err(RagError::IndexCorrupt {
                        path: root,
                        message: format!("directory is not empty but has no {MANIFEST_FILE}"),
                    })
                };
            }
            Err(e) => return Err(e.into()),
        };

        let manifest: IndexManifest = serde_json::from_str(&raw).map_err(|e| {
            RagError::IndexCorrupt { path: manifest_path.clone(), message: e.to_string() }
        })?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::IndexCorrupt {
                path: manifest_path,
                message: format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    manifest.format_version
                ),
            });
        }

        let inner = InMemoryVectorStore::new();
        for (name, entry) in &manifest.collections {
            let spec = entry.spec();
            let path = collection_path(&root, name, entry.generation);
            let chunks = read_collection_file(&path, &spec).await?;
            if chunks.len() != entry.chunk_count {
                warn!(
                    collection = %name,
                    expected = entry.chunk_count,
                    found = chunks.len(),
                    "chunk count differs from manifest"
                );
            }
            inner.create_collection(name, &spec).await?;
            inner.upsert(name, &chunks).await?;
        }

        info!(
            path = %root.display(),
            collections = manifest.collections.len(),
            "loaded vector index"
        );
        Ok(Some(Self { root, inner, manifest: Mutex::new(manifest) }))
    }

    /// The persistence directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A copy of the current manifest.
    pub async fn manifest(&self) -> IndexManifest {
        self.manifest.lock().await.clone()
    }

    async fn write_manifest(&self, manifest: &IndexManifest) -> Result<()> {
        let json = serde_json::to_string_pretty(manifest).map_err(|e| {
            RagError::VectorStoreError { backend: BACKEND.into(), message: e.to_string() }
        })?;
        let tmp = self.root.join(format!("{MANIFEST_FILE}.tmp"));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, self.root.join(MANIFEST_FILE)).await?;
        Ok(())
    }
}

async fn is_missing_or_empty(root: &Path) -> Result<bool> {
    match fs::read_dir(root).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

fn collection_path(root: &Path, name: &str, generation: u64) -> PathBuf {
    match generation {
        0 => root.join(format!("{name}.jsonl")),
        n => root.join(format!("{name}.{n}.jsonl")),
    }
}

fn serialize_chunks(chunks: &[Chunk]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for chunk in chunks {
        serde_json::to_writer(&mut buf, chunk).map_err(|e| RagError::VectorStoreError {
            backend: BACKEND.into(),
            message: format!("failed to serialize chunk '{}': {e}", chunk.id),
        })?;
        buf.push(b'\n');
    }
    Ok(buf)
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RagError::ConfigError(format!(
            "invalid collection name '{name}': use letters, digits, '_' or '-'"
        )))
    }
}

async fn read_collection_file(path: &Path, spec: &CollectionSpec) -> Result<Vec<Chunk>> {
    let raw = fs::read_to_string(path).await.map_err(|e| RagError::IndexCorrupt {
        path: path.to_path_buf(),
        message: format!("cannot read collection file: {e}"),
    })?;

    let mut chunks = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(line).map_err(|e| RagError::IndexCorrupt {
            path: path.to_path_buf(),
            message: format!("line {}: {e}", line_no + 1),
        })?;
        if chunk.embedding.len() != spec.dimensions {
            return Err(RagError::IndexCorrupt {
                path: path.to_path_buf(),
                message: format!(
                    "line {}: embedding has {} dimensions, manifest says {}",
                    line_no + 1,
                    chunk.embedding.len(),
                    spec.dimensions
                ),
            });
        }
        chunks.push(chunk);
    }
    Ok(chunks)
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn create_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()> {
        validate_name(name)?;
        let mut manifest = self.manifest.lock().await;
        if let Some(existing) = manifest.collections.get(name) {
            return ensure_compatible(&existing.spec(), spec);
        }

        self.inner.create_collection(name, spec).await?;
        fs::write(collection_path(&self.root, name, 0), b"").await?;

        let now = Utc::now();
        manifest.collections.insert(
            name.to_string(),
            CollectionManifest {
                embedding_model: spec.embedding_model.clone(),
                dimensions: spec.dimensions,
                chunk_count: 0,
                created_at: now,
                updated_at: now,
                generation: 0,
            },
        );
        self.write_manifest(&manifest).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let mut manifest = self.manifest.lock().await;
        self.inner.delete_collection(name).await?;
        let Some(entry) = manifest.collections.remove(name) else {
            return Ok(());
        };

        self.write_manifest(&manifest).await?;
        remove_if_present(&collection_path(&self.root, name, entry.generation)).await?;
        info!(collection = name, "deleted collection");
        Ok(())
    }

    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>> {
        self.inner.collection_spec(name).await
    }

    async fn replace_collection(
        &self,
        name: &str,
        spec: &CollectionSpec,
        chunks: &[Chunk],
    ) -> Result<()> {
        validate_name(name)?;
        check_dimensions(spec, chunks)?;
        let mut manifest = self.manifest.lock().await;

        let previous = manifest.collections.get(name).cloned();
        let generation = previous.as_ref().map_or(0, |entry| entry.generation + 1);
        let path = collection_path(&self.root, name, generation);
        let tmp = path.with_extension("jsonl.tmp");
        fs::write(&tmp, serialize_chunks(chunks)?).await?;
        fs::rename(&tmp, &path).await?;

        let mut next = manifest.clone();
        let now = Utc::now();
        next.collections.insert(
            name.to_string(),
            CollectionManifest {
                embedding_model: spec.embedding_model.clone(),
                dimensions: spec.dimensions,
                chunk_count: chunks.iter().map(|c| c.id.as_str()).collect::<HashSet<_>>().len(),
                created_at: now,
                updated_at: now,
                generation,
            },
        );
        if let Err(e) = self.write_manifest(&next).await {
            remove_if_present(&path).await.ok();
            return Err(e);
        }
        *manifest = next;
        self.inner.replace_collection(name, spec, chunks).await?;

        if let Some(old) = previous {
            let old_path = collection_path(&self.root, name, old.generation);
            if let Err(e) = remove_if_present(&old_path).await {
                warn!(path = %old_path.display(), error = %e, "failed to remove replaced collection file");
            }
        }
        info!(collection = name, chunks = chunks.len(), generation, "replaced collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut manifest = self.manifest.lock().await;
        // Validates dimensions before anything touches the disk.
        self.inner.upsert(collection, chunks).await?;
        let generation = manifest.collections.get(collection).map_or(0, |e| e.generation);

        let buf = serialize_chunks(chunks)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(collection_path(&self.root, collection, generation))
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        let count = self.inner.count(collection).await?;
        if let Some(entry) = manifest.collections.get_mut(collection) {
            entry.chunk_count = count;
            entry.updated_at = Utc::now();
        }
        debug!(collection, written = chunks.len(), total = count, "persisted chunks");
        self.write_manifest(&manifest).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.inner.search(collection, embedding, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn spec() -> CollectionSpec {
        CollectionSpec { dimensions: 2, embedding_model: "test-model".into() }
    }

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.into(),
            text: format!("text of {id}"),
            embedding,
            metadata: HashMap::from([("source".to_string(), "a.txt".to_string())]),
            document_id: "a".into(),
        }
    }

    #[tokio::test]
    async fn missing_directory_is_not_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(LocalVectorStore::open(temp.path().join("nope")).await.unwrap().is_none());
        assert!(LocalVectorStore::open(temp.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("db");
        {
            let store = LocalVectorStore::create(&root).await.unwrap();
            store.create_collection("docs", &spec()).await.unwrap();
            store.upsert("docs", &[chunk("a", vec![1.0, 0.0])]).await.unwrap();
            store.upsert("docs", &[chunk("b", vec![0.0, 1.0]), chunk("a", vec![0.5, 0.5])]).await.unwrap();
        }

        let store = LocalVectorStore::open(&root).await.unwrap().unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 2);
        let manifest = store.manifest().await;
        assert_eq!(manifest.collections["docs"].chunk_count, 2);
        assert_eq!(manifest.collections["docs"].embedding_model, "test-model");

        let results = store.search("docs", &[0.5, 0.5], 1).await.unwrap();
        assert_eq!(results[0].chunk.id, "a");
        assert_eq!(results[0].chunk.metadata["source"], "a.txt");
    }

    #[tokio::test]
    async fn unreadable_manifest_is_corrupt() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(MANIFEST_FILE), "{not json").unwrap();
        let err = LocalVectorStore::open(temp.path()).await.unwrap_err();
        assert!(matches!(err, RagError::IndexCorrupt { .. }));
    }

    #[tokio::test]
    async fn stray_files_without_manifest_are_corrupt() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("chroma.sqlite3"), "junk").unwrap();
        let err = LocalVectorStore::open(temp.path()).await.unwrap_err();
        assert!(matches!(err, RagError::IndexCorrupt { .. }));
    }

    #[tokio::test]
    async fn delete_collection_removes_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::create(temp.path()).await.unwrap();
        store.create_collection("docs", &spec()).await.unwrap();
        assert!(temp.path().join("docs.jsonl").exists());

        store.delete_collection("docs").await.unwrap();
        assert!(!temp.path().join("docs.jsonl").exists());
        assert!(store.collection_spec("docs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_swaps_files_and_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::create(temp.path()).await.unwrap();
        store.create_collection("docs", &spec()).await.unwrap();
        store.upsert("docs", &[chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])]).await.unwrap();

        store.replace_collection("docs", &spec(), &[chunk("c", vec![1.0, 1.0])]).await.unwrap();
        assert!(!temp.path().join("docs.jsonl").exists());
        assert!(temp.path().join("docs.1.jsonl").exists());
        drop(store);

        let store = LocalVectorStore::open(temp.path()).await.unwrap().unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
        assert_eq!(store.manifest().await.collections["docs"].generation, 1);
        store.upsert("docs", &[chunk("d", vec![0.0, 1.0])]).await.unwrap();

        let store = LocalVectorStore::open(temp.path()).await.unwrap().unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rejected_replace_keeps_previous_contents() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::create(temp.path()).await.unwrap();
        store.create_collection("docs", &spec()).await.unwrap();
        store.upsert("docs", &[chunk("a", vec![1.0, 0.0])]).await.unwrap();

        let bad = [chunk("b", vec![0.0, 1.0]), chunk("c", vec![1.0])];
        assert!(store.replace_collection("docs", &spec(), &bad).await.is_err());
        drop(store);

        let store = LocalVectorStore::open(temp.path()).await.unwrap().unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
        assert_eq!(store.manifest().await.collections["docs"].generation, 0);
    }

    #[tokio::test]
    async fn rejects_path_like_collection_names() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::create(temp.path()).await.unwrap();
        assert!(store.create_collection("../escape", &spec()).await.is_err());
    }
}
