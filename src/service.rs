//! The share-request lifecycle, independent of any particular platform.

use std::sync::Arc;

use log::{info, warn};

use crate::chooser::{Chooser, ChooserPresenter, ChooserTargets};
use crate::models::{Config, ShareFileOptions, ShareMultipleOptions};
use crate::pending::{PendingResults, ShareLifecycle, ShareOutcome};
use crate::receivers::{normalize_content_type, ReceiverResolver};
use crate::request::{FileReference, MultiShareRequest, ShareRequest};
use crate::staging::StagingArea;
use crate::{Error, Result};

pub struct ShareService {
    config: Config,
    staging: StagingArea,
    resolver: Box<dyn ReceiverResolver>,
    pending: Arc<PendingResults>,
}

impl ShareService {
    pub fn new(config: Config, staging: StagingArea, resolver: Box<dyn ReceiverResolver>) -> Self {
        Self {
            config,
            staging,
            resolver,
            pending: PendingResults::new(),
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> &Arc<PendingResults> {
        &self.pending
    }

    /// Shares one file and waits until the chooser reports back.
    ///
    /// Resolves once a receiver was launched (or the chooser closed in a way
    /// indistinguishable from that) and rejects with [`Error::UserCancelled`]
    /// when the user dismissed it.
    pub async fn share<P>(&self, presenter: &P, options: ShareFileOptions) -> Result<()>
    where
        P: ChooserPresenter + ?Sized,
    {
        let request = ShareRequest::from_options(options, &self.config.default_dialog_title)?;
        let mut lifecycle = ShareLifecycle::new();

        let artifact = self.staging.stage(&request)?;
        track(lifecycle.on_staged(), "staged");

        let content_type = normalize_content_type(&request.content_type);
        let chooser = Chooser {
            targets: self.targets_for(&content_type),
            title: request.title,
            content_type,
            references: vec![artifact.url().clone()],
        };

        let outcome = self.present_and_wait(presenter, chooser, &mut lifecycle).await?;

        match outcome {
            ShareOutcome::Completed => {
                // the receiver may still be reading; the next sweep removes it
                artifact.retire();
                Ok(())
            }
            ShareOutcome::Cancelled => Err(Error::UserCancelled),
            ShareOutcome::Failed(message) => Err(Error::NativeApi(message)),
        }
    }

    /// Shares existing files or URIs. Cancellation is not reported as an
    /// error on this path.
    pub async fn share_multiple<P>(&self, presenter: &P, options: ShareMultipleOptions) -> Result<()>
    where
        P: ChooserPresenter + ?Sized,
    {
        let request = MultiShareRequest::from_options(options, &self.config.default_dialog_title)?;
        let mut lifecycle = ShareLifecycle::new();

        let references = request
            .files
            .into_iter()
            .map(FileReference::resolve)
            .collect::<Result<Vec<_>>>()?;
        track(lifecycle.on_staged(), "staged");

        let chooser = Chooser {
            title: request.title,
            content_type: normalize_content_type(&request.content_type),
            references,
            targets: ChooserTargets::System,
        };

        match self.present_and_wait(presenter, chooser, &mut lifecycle).await? {
            ShareOutcome::Completed => Ok(()),
            ShareOutcome::Cancelled => {
                info!("multi-file share dismissed");
                Ok(())
            }
            ShareOutcome::Failed(message) => Err(Error::NativeApi(message)),
        }
    }

    /// Removes staged files no in-flight request still needs.
    pub fn cleanup(&self) -> usize {
        self.staging.sweep()
    }

    /// Drops every parked request, e.g. because the app is going away.
    pub fn abandon_pending(&self) {
        let abandoned = self.pending.abandon_all();
        if abandoned > 0 {
            warn!("abandoned {} share request(s) still waiting on a chooser", abandoned);
        }
    }

    fn targets_for(&self, content_type: &str) -> ChooserTargets {
        if !self.config.explicit_receivers {
            return ChooserTargets::System;
        }
        match self.resolver.resolve(content_type) {
            Ok(candidates) if !candidates.is_empty() => ChooserTargets::Explicit(candidates),
            Ok(_) => ChooserTargets::System,
            Err(e) => {
                warn!("resolving receivers for {} failed: {}", content_type, e);
                ChooserTargets::System
            }
        }
    }

    async fn present_and_wait<P>(
        &self,
        presenter: &P,
        chooser: Chooser,
        lifecycle: &mut ShareLifecycle,
    ) -> Result<ShareOutcome>
    where
        P: ChooserPresenter + ?Sized,
    {
        let (callback, outcome) = self.pending.park();
        let id = callback.id();
        info!(
            "presenting chooser {} for {} reference(s) of {}",
            id,
            chooser.references.len(),
            chooser.content_type
        );

        if let Err(e) = presenter.present(chooser, callback) {
            self.pending.discard(id);
            return Err(e);
        }
        track(lifecycle.on_presented(), "presented");

        let outcome = outcome.await.map_err(|_| Error::Abandoned)?;
        track(lifecycle.on_resolved(outcome.clone()), "resolved");
        info!("chooser {} finished: {:?}", id, outcome);
        Ok(outcome)
    }
}

fn track(advanced: bool, phase: &str) {
    if !advanced {
        warn!("share request reached {} out of order", phase);
    }
}
