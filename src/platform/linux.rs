//! Linux has no system share sheet. Receivers come from the freedesktop
//! desktop entries, the chooser itself is rendered by the webview, and the
//! chosen application is started with its `Exec` line.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use log::{debug, info, warn};
use tauri::{Emitter, Runtime, Window};
use walkdir::WalkDir;

use crate::chooser::{Chooser, ChooserPresenter, ChooserRegistry, ChooserTargets};
use crate::pending::PendingCallback;
use crate::receivers::{expand_exec, DesktopEntry, ReceiverCandidate, ReceiverResolver};
use crate::{Error, Result};

/// Event the frontend listens on to render a chooser.
pub const CHOOSER_EVENT: &str = "file-sharer://chooser";

pub fn receiver_resolver() -> Box<dyn ReceiverResolver> {
    Box::new(XdgReceivers::from_env())
}

/// Looks up applications in the XDG `applications` directories.
#[derive(Debug, Clone)]
pub struct XdgReceivers {
    dirs: Vec<PathBuf>,
}

impl XdgReceivers {
    pub fn from_env() -> Self {
        let data_home = env::var_os("XDG_DATA_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".local/share")));
        let data_dirs = env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());

        let dirs = data_home
            .into_iter()
            .chain(data_dirs.split(':').filter(|d| !d.is_empty()).map(PathBuf::from))
            .map(|dir| dir.join("applications"))
            .collect();
        Self { dirs }
    }

    /// Directories in priority order; an id found earlier hides later ones.
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl ReceiverResolver for XdgReceivers {
    fn resolve(&self, content_type: &str) -> Result<Vec<ReceiverCandidate>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for dir in &self.dirs {
            for entry in WalkDir::new(dir).follow_links(true).into_iter().flatten() {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("desktop")
                {
                    continue;
                }
                let Some(id) = desktop_file_id(dir, path) else {
                    continue;
                };
                if !seen.insert(id.clone()) {
                    continue;
                }
                let contents = match fs::read_to_string(path) {
                    Ok(contents) => contents,
                    Err(e) => {
                        debug!("skipping unreadable {}: {}", path.display(), e);
                        continue;
                    }
                };
                if let Some(desktop) = DesktopEntry::parse(&contents) {
                    if desktop.accepts(content_type) {
                        candidates.push(desktop.into_candidate(id));
                    }
                }
            }
        }

        candidates.sort_by_key(|c| c.label.to_lowercase());
        debug!("{} receiver(s) for {}", candidates.len(), content_type);
        Ok(candidates)
    }
}

/// `applications/kde4/okular.desktop` has the id `kde4-okular.desktop`.
fn desktop_file_id(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("-"))
}

pub struct NativePresenter<R: Runtime> {
    window: Window<R>,
    registry: Arc<ChooserRegistry>,
}

impl<R: Runtime> NativePresenter<R> {
    pub fn new(window: Window<R>, registry: Arc<ChooserRegistry>) -> Self {
        Self { window, registry }
    }
}

impl<R: Runtime> ChooserPresenter for NativePresenter<R> {
    fn present(&self, chooser: Chooser, callback: PendingCallback) -> Result<()> {
        let candidates = match &chooser.targets {
            ChooserTargets::Explicit(candidates) => candidates.clone(),
            ChooserTargets::System => XdgReceivers::from_env().resolve(&chooser.content_type)?,
        };
        let id = callback.id();
        let request = self.registry.register(chooser, candidates, callback);

        if let Err(e) = self.window.emit(CHOOSER_EVENT, &request) {
            self.registry.withdraw(id);
            return Err(e.into());
        }
        info!(
            "chooser {} sent to window {} with {} candidate(s)",
            id,
            self.window.label(),
            request.candidates.len()
        );
        Ok(())
    }
}

/// Starts the chosen application on the chooser's references.
pub fn launch_receiver(candidate: &ReceiverCandidate, chooser: &Chooser) -> Result<()> {
    let paths = chooser.local_paths();
    let urls: Vec<String> = chooser.references.iter().map(|u| u.to_string()).collect();
    let args = expand_exec(&candidate.invocation, &paths, &urls);
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Error::NativeApi(format!("{} has an empty Exec line", candidate.id)))?;

    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::NativeApi(format!("Failed to launch {}: {}", candidate.id, e)))?;

    let id = candidate.id.clone();
    std::thread::spawn(move || {
        if let Err(e) = child.wait() {
            warn!("waiting on {} failed: {}", id, e);
        }
    });
    Ok(())
}
