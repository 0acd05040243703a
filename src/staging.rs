//! Writes share payloads into the plugin's private cache so the share surface
//! has a file to point at.
//!
//! Every request gets its own directory under the staging root. A directory
//! is removed when its [`StagedArtifact`] is dropped, or left for the next
//! sweep when the artifact is retired after a completed share (the receiver
//! may still be reading it). Anything in the root that no live artifact owns
//! is swept before the next request stages.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use base64::{engine::general_purpose, Engine as _};
use log::{debug, error, warn};
use tempfile::{Builder, TempDir};
use url::Url;

use crate::request::{ShareRequest, ShareSource};
use crate::{Error, Result};

pub struct StagingArea {
    root: PathBuf,
    /// Request directories owned by artifacts that are still alive.
    live: Arc<Mutex<HashSet<PathBuf>>>,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Materializes the request's payload. Input problems are reported before
    /// anything on disk is touched.
    pub fn stage(&self, request: &ShareRequest) -> Result<StagedArtifact> {
        let bytes = match &request.source {
            ShareSource::Inline(data) => decode_base64(data)?,
            ShareSource::LocalPath(path) => read_local_file(path)?,
        };
        self.write_artifact(&request.filename, &bytes)
    }

    fn write_artifact(&self, filename: &str, bytes: &[u8]) -> Result<StagedArtifact> {
        self.sweep();

        // From here on the artifact owns the directory: any early return drops
        // it, which deletes the directory and unregisters it.
        let artifact = self.claim_request_dir(filename)?;
        {
            let mut file = File::create(&artifact.path).map_err(caching_failed)?;
            file.write_all(bytes).map_err(caching_failed)?;
            file.flush().map_err(caching_failed)?;
        }

        if !artifact.path.is_file() {
            error!("staged file {} is missing after write", artifact.path.display());
            return Err(caching_failed(io::Error::new(
                io::ErrorKind::NotFound,
                "staged file missing after write",
            )));
        }
        grant_read_only(&artifact.path).map_err(caching_failed)?;

        debug!("staged {}", artifact.path.display());
        Ok(artifact)
    }

    /// Creates a request directory and registers it as live in one step, so
    /// a concurrent sweep never sees it unowned.
    fn claim_request_dir(&self, filename: &str) -> Result<StagedArtifact> {
        let mut live = self.live_dirs();
        let dir = self.create_request_dir().map_err(caching_failed)?;
        let path = dir.path().join(filename);
        let url = Url::from_file_path(&path).map_err(|_| {
            caching_failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not addressable as a file URL", path.display()),
            ))
        })?;

        let dir_path = dir.path().to_path_buf();
        live.insert(dir_path.clone());
        Ok(StagedArtifact {
            path,
            url,
            dir_path,
            live: Arc::clone(&self.live),
            dir: Some(dir),
        })
    }

    fn create_request_dir(&self) -> io::Result<TempDir> {
        fs::create_dir_all(&self.root)?;
        Builder::new()
            .prefix(&format!("{}-", uuid::Uuid::new_v4()))
            .tempdir_in(&self.root)
    }

    fn live_dirs(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        lock_live(&self.live)
    }

    /// Removes every entry under the root not owned by a live artifact.
    /// Returns how many entries were removed.
    pub fn sweep(&self) -> usize {
        // held for the whole pass; request dirs are created and released
        // under the same lock
        let live = self.live_dirs();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("cannot list staging dir {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if live.contains(&path) {
                continue;
            }
            let result = match entry.file_type() {
                Ok(t) if t.is_dir() => fs::remove_dir_all(&path),
                _ => fs::remove_file(&path),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove stale {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            debug!("swept {} stale staging entries", removed);
        }
        removed
    }
}

/// Reads the whole source up front so that anything wrong with it, a
/// directory included, is reported as the local file's problem.
fn read_local_file(path: &Path) -> Result<Vec<u8>> {
    let not_found = |e: io::Error| {
        warn!("cannot read {} for sharing: {}", path.display(), e);
        Error::LocalFileNotFound {
            path: path.to_path_buf(),
            source: e,
        }
    };

    let mut source = File::open(path).map_err(not_found)?;
    if !source.metadata().map_err(not_found)?.is_file() {
        return Err(not_found(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes).map_err(not_found)?;
    Ok(bytes)
}

/// A staged file. Dropping it deletes the file and its request directory.
pub struct StagedArtifact {
    path: PathBuf,
    url: Url,
    dir_path: PathBuf,
    live: Arc<Mutex<HashSet<PathBuf>>>,
    dir: Option<TempDir>,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `file://` reference handed to the share surface.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Releases ownership without deleting anything; the next sweep removes
    /// the file.
    pub fn retire(mut self) {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        let mut live = lock_live(&self.live);
        // deletes the directory unless it was retired
        self.dir.take();
        live.remove(&self.dir_path);
        debug!("releasing staged {}", self.path.display());
    }
}

impl std::fmt::Debug for StagedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedArtifact")
            .field("path", &self.path)
            .field("url", &self.url.as_str())
            .finish()
    }
}

fn lock_live(live: &Mutex<HashSet<PathBuf>>) -> MutexGuard<'_, HashSet<PathBuf>> {
    match live.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Standard alphabet; line breaks and other ASCII whitespace are tolerated.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    general_purpose::STANDARD.decode(compact).map_err(|e| {
        warn!("rejecting share payload: {}", e);
        Error::DataInvalid(e)
    })
}

fn caching_failed(e: io::Error) -> Error {
    error!("caching share payload failed: {}", e);
    Error::CachingFailed(e)
}

#[cfg(unix)]
fn grant_read_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o400))
}

// Read-only files block directory removal on Windows, so the grant there is
// carried by the read-only storage items instead.
#[cfg(not(unix))]
fn grant_read_only(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: ShareSource) -> ShareRequest {
        ShareRequest {
            filename: "notes.txt".into(),
            content_type: "text/plain".into(),
            source,
            title: "Share".into(),
        }
    }

    fn entries(root: &Path) -> Vec<PathBuf> {
        match fs::read_dir(root) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn inline_payload_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let area = StagingArea::new(tmp.path().join("filesharer"));
        let original = b"\x00\x01binary\xffpayload".to_vec();
        let encoded = general_purpose::STANDARD.encode(&original);

        let artifact = area.stage(&request(ShareSource::Inline(encoded))).unwrap();
        assert_eq!(fs::read(artifact.path()).unwrap(), original);
        assert_eq!(artifact.path().file_name().unwrap(), "notes.txt");
        assert_eq!(artifact.url().scheme(), "file");
    }

    #[test]
    fn wrapped_base64_is_accepted() {
        assert_eq!(decode_base64("aGVs\nbG8=\r\n").unwrap(), b"hello");
    }

    #[test]
    fn malformed_base64_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("filesharer");
        let area = StagingArea::new(&root);

        let err = area
            .stage(&request(ShareSource::Inline("not*base64!".into())))
            .unwrap_err();
        assert!(matches!(err, Error::DataInvalid(_)));
        assert!(!root.exists());
    }

    #[test]
    fn missing_local_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let area = StagingArea::new(tmp.path().join("filesharer"));
        let missing = tmp.path().join("nope.pdf");

        let err = area
            .stage(&request(ShareSource::LocalPath(missing.clone())))
            .unwrap_err();
        match err {
            Error::LocalFileNotFound { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(entries(area.root()).is_empty());
    }

    #[test]
    fn local_file_is_copied() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("capture.jpg");
        fs::write(&source, b"jpeg bytes").unwrap();
        let area = StagingArea::new(tmp.path().join("filesharer"));

        let artifact = area.stage(&request(ShareSource::LocalPath(source))).unwrap();
        assert_eq!(fs::read(artifact.path()).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn dropping_artifact_removes_request_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("filesharer");
        let area = StagingArea::new(&root);

        let artifact = area
            .stage(&request(ShareSource::Inline("aGVsbG8=".into())))
            .unwrap();
        assert_eq!(entries(&root).len(), 1);
        drop(artifact);
        assert!(entries(&root).is_empty());
    }

    #[test]
    fn retired_artifact_survives_until_next_sweep() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("filesharer");
        let area = StagingArea::new(&root);

        let artifact = area
            .stage(&request(ShareSource::Inline("aGVsbG8=".into())))
            .unwrap();
        let path = artifact.path().to_path_buf();
        artifact.retire();
        assert_eq!(fs::read(&path).unwrap(), b"hello");

        assert_eq!(area.sweep(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn next_stage_sweeps_stale_entries_but_keeps_live_ones() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("filesharer");
        fs::create_dir_all(root.join("leftover")).unwrap();
        fs::write(root.join("stray.bin"), b"x").unwrap();
        let area = StagingArea::new(&root);

        let first = area
            .stage(&request(ShareSource::Inline("Zmlyc3Q=".into())))
            .unwrap();
        assert_eq!(entries(&root).len(), 1);

        let second = area
            .stage(&request(ShareSource::Inline("c2Vjb25k".into())))
            .unwrap();
        assert_eq!(entries(&root).len(), 2);
        assert_eq!(fs::read(first.path()).unwrap(), b"first");
        assert_eq!(fs::read(second.path()).unwrap(), b"second");
    }

    #[cfg(unix)]
    #[test]
    fn staged_file_is_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let area = StagingArea::new(tmp.path().join("filesharer"));
        let artifact = area
            .stage(&request(ShareSource::Inline("aGVsbG8=".into())))
            .unwrap();
        let mode = fs::metadata(artifact.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o400);
    }

    #[test]
    fn directory_path_is_reported_as_missing_local_file() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("albums");
        fs::create_dir(&folder).unwrap();
        let area = StagingArea::new(tmp.path().join("filesharer"));

        let err = area
            .stage(&request(ShareSource::LocalPath(folder)))
            .unwrap_err();
        assert_eq!(err.code(), Some("ERR_LOCAL_FILE_NOT_FOUND"));
        assert!(entries(area.root()).is_empty());
    }

    #[test]
    fn concurrent_stages_and_sweeps_never_lose_live_files() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let tmp = tempfile::tempdir().unwrap();
        let area = StagingArea::new(tmp.path().join("filesharer"));
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let sweeper = scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    area.sweep();
                }
            });

            let stagers: Vec<_> = (0..8u8)
                .map(|worker| {
                    let area = &area;
                    scope.spawn(move || {
                        let payload = vec![worker; 64];
                        let encoded = general_purpose::STANDARD.encode(&payload);
                        for _ in 0..100 {
                            let artifact = area
                                .stage(&request(ShareSource::Inline(encoded.clone())))
                                .unwrap();
                            assert_eq!(fs::read(artifact.path()).unwrap(), payload);
                        }
                    })
                })
                .collect();

            for stager in stagers {
                stager.join().unwrap();
            }
            done.store(true, Ordering::SeqCst);
            sweeper.join().unwrap();
        });

        area.sweep();
        assert!(entries(area.root()).is_empty());
    }
}
