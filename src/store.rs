use std::fs;
use std::io::Write;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tempfile::Builder;

use crate::domain::RemoteFile;
use crate::error::PipelineError;

/// Folder-scoped artifact storage shared by every stage.
///
/// `artifact_exists` returns the id of an artifact with exactly that name in the folder.
/// Implementations never overwrite: callers check existence before uploading.
pub trait RemoteStore: Send + Sync {
    fn list_artifacts(&self, folder_id: &str) -> Result<Vec<RemoteFile>, PipelineError>;
    fn artifact_exists(&self, name: &str, folder_id: &str)
    -> Result<Option<String>, PipelineError>;
    fn download_artifact(&self, id: &str) -> Result<Vec<u8>, PipelineError>;
    fn upload_artifact(
        &self,
        bytes: &[u8],
        name: &str,
        folder_id: &str,
    ) -> Result<String, PipelineError>;
}

#[derive(Debug, Clone)]
struct StoredArtifact {
    file: RemoteFile,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryState {
    artifacts: Vec<StoredArtifact>,
    next_id: usize,
    uploads: usize,
    downloads: usize,
}

/// Process-local store, mostly useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> usize {
        self.lock().map(|state| state.uploads).unwrap_or_default()
    }

    pub fn download_count(&self) -> usize {
        self.lock().map(|state| state.downloads).unwrap_or_default()
    }

    /// Snapshot of `(name, bytes)` pairs in a folder, in upload order.
    pub fn folder_contents(&self, folder_id: &str) -> Vec<(String, Vec<u8>)> {
        self.lock()
            .map(|state| {
                state
                    .artifacts
                    .iter()
                    .filter(|a| a.file.folder_id == folder_id)
                    .map(|a| (a.file.name.clone(), a.bytes.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, PipelineError> {
        self.state
            .lock()
            .map_err(|_| PipelineError::Store("memory store lock poisoned".to_string()))
    }
}

impl RemoteStore for MemoryStore {
    fn list_artifacts(&self, folder_id: &str) -> Result<Vec<RemoteFile>, PipelineError> {
        let state = self.lock()?;
        Ok(state
            .artifacts
            .iter()
            .filter(|a| a.file.folder_id == folder_id)
            .map(|a| a.file.clone())
            .collect())
    }

    fn artifact_exists(
        &self,
        name: &str,
        folder_id: &str,
    ) -> Result<Option<String>, PipelineError> {
        let state = self.lock()?;
        Ok(state
            .artifacts
            .iter()
            .find(|a| a.file.folder_id == folder_id && a.file.name == name)
            .map(|a| a.file.id.clone()))
    }

    fn download_artifact(&self, id: &str) -> Result<Vec<u8>, PipelineError> {
        let mut state = self.lock()?;
        let bytes = state
            .artifacts
            .iter()
            .find(|a| a.file.id == id)
            .map(|a| a.bytes.clone())
            .ok_or_else(|| PipelineError::ArtifactNotFound(id.to_string()))?;
        state.downloads += 1;
        Ok(bytes)
    }

    fn upload_artifact(
        &self,
        bytes: &[u8],
        name: &str,
        folder_id: &str,
    ) -> Result<String, PipelineError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        state.uploads += 1;
        let id = format!("mem-{}", state.next_id);
        state.artifacts.push(StoredArtifact {
            file: RemoteFile {
                id: id.clone(),
                name: name.to_string(),
                folder_id: folder_id.to_string(),
            },
            bytes: bytes.to_vec(),
        });
        Ok(id)
    }
}

/// Store backed by a local directory: one subdirectory per folder id, ids are `folder/name`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: Utf8PathBuf,
}

impl FsStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn default_root() -> Result<Utf8PathBuf, PipelineError> {
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("tse-lakehouse"))
                    .ok()
            })
            .ok_or_else(|| PipelineError::Filesystem("unable to resolve cache directory".to_string()))
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn folder_dir(&self, folder_id: &str) -> Result<Utf8PathBuf, PipelineError> {
        validate_segment(folder_id)?;
        Ok(self.root.join(folder_id))
    }

    fn artifact_path(&self, id: &str) -> Result<Utf8PathBuf, PipelineError> {
        let (folder, name) = id
            .split_once('/')
            .ok_or_else(|| PipelineError::ArtifactNotFound(id.to_string()))?;
        validate_segment(name)?;
        Ok(self.folder_dir(folder)?.join(name))
    }
}

fn validate_segment(segment: &str) -> Result<(), PipelineError> {
    let is_valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\']);
    if !is_valid {
        return Err(PipelineError::Store(format!(
            "invalid folder or artifact name: {segment}"
        )));
    }
    Ok(())
}

impl RemoteStore for FsStore {
    fn list_artifacts(&self, folder_id: &str) -> Result<Vec<RemoteFile>, PipelineError> {
        let dir = self.folder_dir(folder_id)?;
        if !dir.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(dir.as_std_path()).map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| PipelineError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            files.push(RemoteFile {
                id: format!("{folder_id}/{name}"),
                name: name.to_string(),
                folder_id: folder_id.to_string(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn artifact_exists(
        &self,
        name: &str,
        folder_id: &str,
    ) -> Result<Option<String>, PipelineError> {
        validate_segment(name)?;
        let path = self.folder_dir(folder_id)?.join(name);
        if path.as_std_path().is_file() {
            return Ok(Some(format!("{folder_id}/{name}")));
        }
        Ok(None)
    }

    fn download_artifact(&self, id: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.artifact_path(id)?;
        if !path.as_std_path().is_file() {
            return Err(PipelineError::ArtifactNotFound(id.to_string()));
        }
        fs::read(path.as_std_path()).map_err(|err| PipelineError::Filesystem(err.to_string()))
    }

    fn upload_artifact(
        &self,
        bytes: &[u8],
        name: &str,
        folder_id: &str,
    ) -> Result<String, PipelineError> {
        validate_segment(name)?;
        let dir = self.folder_dir(folder_id)?;
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".tse-lakehouse-upload")
            .tempfile_in(dir.as_std_path())
            .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        temp.write_all(bytes)
            .map_err(|err| PipelineError::Filesystem(err.to_string()))?;
        temp.persist_noclobber(dir.join(name).as_std_path())
            .map_err(|err| PipelineError::Store(format!("{name}: {}", err.error)))?;
        Ok(format!("{folder_id}/{name}"))
    }
}
