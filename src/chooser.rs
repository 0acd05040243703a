use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::{info, warn};
use url::Url;

use crate::models::{ChooserRequest, ChooserResponse};
use crate::pending::{CallbackId, PendingCallback, ShareOutcome};
use crate::receivers::ReceiverCandidate;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooserTargets {
    /// Receivers we enumerated ourselves.
    Explicit(Vec<ReceiverCandidate>),
    /// Let the platform list receivers for the content type.
    System,
}

/// Everything a platform needs to put a share chooser on screen.
#[derive(Debug, Clone)]
pub struct Chooser {
    pub title: String,
    pub content_type: String,
    pub references: Vec<Url>,
    pub targets: ChooserTargets,
}

impl Chooser {
    /// Local paths behind `file://` references, for launchers that want paths.
    pub fn local_paths(&self) -> Vec<String> {
        self.references
            .iter()
            .filter_map(|url| url.to_file_path().ok())
            .map(|path| path.display().to_string())
            .collect()
    }
}

/// Puts a chooser in front of the user.
///
/// `present` returns as soon as the chooser is up. The outcome is reported
/// later by settling `callback`, from whatever the platform uses to signal
/// that the chooser went away.
pub trait ChooserPresenter: Send + Sync {
    fn present(&self, chooser: Chooser, callback: PendingCallback) -> Result<()>;
}

#[cfg_attr(mobile, allow(dead_code))]
struct PresentedChooser {
    chooser: Chooser,
    candidates: Vec<ReceiverCandidate>,
    callback: PendingCallback,
}

/// Choosers rendered by the webview, waiting for the frontend's answer.
#[cfg_attr(mobile, allow(dead_code))]
#[derive(Default)]
pub struct ChooserRegistry {
    presented: Mutex<HashMap<CallbackId, PresentedChooser>>,
}

#[cfg_attr(mobile, allow(dead_code))]
impl ChooserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn presented(&self) -> MutexGuard<'_, HashMap<CallbackId, PresentedChooser>> {
        match self.presented.lock() {
            Ok(presented) => presented,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Parks `chooser` with the given candidates and returns the event
    /// payload describing it to the frontend.
    pub fn register(
        &self,
        chooser: Chooser,
        candidates: Vec<ReceiverCandidate>,
        callback: PendingCallback,
    ) -> ChooserRequest {
        let request = ChooserRequest {
            id: callback.id(),
            title: chooser.title.clone(),
            content_type: chooser.content_type.clone(),
            candidates: candidates.clone(),
        };
        self.presented().insert(
            callback.id(),
            PresentedChooser {
                chooser,
                candidates,
                callback,
            },
        );
        request
    }

    /// Withdraws a chooser that could not be shown, without settling it.
    pub fn withdraw(&self, id: CallbackId) -> bool {
        self.presented().remove(&id).is_some()
    }

    /// Applies the frontend's answer. A chosen receiver is handed to `launch`;
    /// the parked request is settled with the result either way.
    pub fn respond<F>(&self, response: ChooserResponse, launch: F) -> Result<()>
    where
        F: FnOnce(&ReceiverCandidate, &Chooser) -> Result<()>,
    {
        let presented = self
            .presented()
            .remove(&response.id)
            .ok_or(Error::UnknownCallback(response.id))?;

        let Some(receiver_id) = response.receiver else {
            info!("chooser {} dismissed", response.id);
            return presented.callback.settle(ShareOutcome::Cancelled);
        };

        let outcome = match presented.candidates.iter().find(|c| c.id == receiver_id) {
            Some(candidate) => match launch(candidate, &presented.chooser) {
                Ok(()) => {
                    info!("shared to {} ({})", candidate.label, candidate.id);
                    ShareOutcome::Completed
                }
                Err(e) => {
                    warn!("launching {} failed: {}", candidate.id, e);
                    ShareOutcome::Failed(e.to_string())
                }
            },
            None => {
                warn!("chooser {} answered with unknown receiver {}", response.id, receiver_id);
                ShareOutcome::Failed(format!("Unknown receiver: {}", receiver_id))
            }
        };
        presented.callback.settle(outcome)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.presented().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
