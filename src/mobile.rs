//! Mobile bridge. Staging and correlation stay in Rust; the native half only
//! lists receivers and puts the platform chooser on screen.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tauri::{
    plugin::{PluginApi, PluginHandle},
    AppHandle, Manager, Runtime, Window,
};

use crate::chooser::{Chooser, ChooserPresenter, ChooserTargets};
use crate::models::*;
use crate::pending::{PendingCallback, ShareOutcome};
use crate::receivers::{ReceiverCandidate, ReceiverResolver};
use crate::service::ShareService;
use crate::staging::StagingArea;
use crate::{Error, Result};

#[cfg(target_os = "android")]
const PLUGIN_IDENTIFIER: &str = "plugin.vnidrop.filesharer";

#[cfg(target_os = "ios")]
tauri::ios_plugin_binding!(init_plugin_file_sharer);

// initializes the Kotlin or Swift plugin classes
pub fn init<R: Runtime>(
    app: &AppHandle<R>,
    api: PluginApi<R, Option<Config>>,
) -> crate::Result<FileSharer<R>> {
    let config = api.config().clone().unwrap_or_default();

    #[cfg(target_os = "android")]
    let handle = api.register_android_plugin(PLUGIN_IDENTIFIER, "FileSharerPlugin")?;
    #[cfg(target_os = "ios")]
    let handle = api.register_ios_plugin(init_plugin_file_sharer)?;

    let root = app.path().app_cache_dir()?.join(&config.staging_dir_name);
    debug!("staging shared files under {}", root.display());

    let resolver = NativeReceivers {
        handle: handle.clone(),
    };
    let service = ShareService::new(config, StagingArea::new(root), Box::new(resolver));
    Ok(FileSharer { handle, service })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListReceiversArgs<'a> {
    content_type: &'a str,
}

#[derive(Deserialize)]
struct ListReceiversResponse {
    receivers: Vec<ReceiverCandidate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresentChooserArgs {
    title: String,
    content_type: String,
    files: Vec<String>,
    /// Receiver ids to offer explicitly; empty leaves the listing to the OS.
    explicit_targets: Vec<String>,
}

#[derive(Deserialize)]
struct PresentChooserResponse {
    cancelled: bool,
}

/// Asks the native half which activities take a content type. iOS answers
/// with an empty list.
struct NativeReceivers<R: Runtime> {
    handle: PluginHandle<R>,
}

impl<R: Runtime> ReceiverResolver for NativeReceivers<R> {
    fn resolve(&self, content_type: &str) -> Result<Vec<ReceiverCandidate>> {
        let response: ListReceiversResponse = self
            .handle
            .run_mobile_plugin("listReceivers", ListReceiversArgs { content_type })?;
        Ok(response.receivers)
    }
}

struct MobilePresenter<R: Runtime> {
    handle: PluginHandle<R>,
}

impl<R: Runtime> ChooserPresenter for MobilePresenter<R> {
    fn present(&self, chooser: Chooser, callback: PendingCallback) -> Result<()> {
        let explicit_targets = match chooser.targets {
            ChooserTargets::Explicit(candidates) => candidates.into_iter().map(|c| c.id).collect(),
            ChooserTargets::System => Vec::new(),
        };
        let args = PresentChooserArgs {
            title: chooser.title,
            content_type: chooser.content_type,
            files: chooser.references.iter().map(|u| u.to_string()).collect(),
            explicit_targets,
        };

        // The native call only returns once the chooser is gone.
        let handle = self.handle.clone();
        tauri::async_runtime::spawn_blocking(move || {
            let outcome =
                match handle.run_mobile_plugin::<PresentChooserResponse>("presentChooser", args) {
                    Ok(response) if response.cancelled => ShareOutcome::Cancelled,
                    Ok(_) => ShareOutcome::Completed,
                    Err(e) => match Error::from(e) {
                        Error::UserCancelled => ShareOutcome::Cancelled,
                        other => ShareOutcome::Failed(other.to_string()),
                    },
                };
            let id = callback.id();
            if let Err(e) = callback.settle(outcome) {
                warn!("chooser {} reported back too late: {}", id, e);
            }
        });
        Ok(())
    }
}

/// Access to the file sharer APIs.
pub struct FileSharer<R: Runtime> {
    handle: PluginHandle<R>,
    service: ShareService,
}

impl<R: Runtime> FileSharer<R> {
    fn presenter(&self) -> MobilePresenter<R> {
        MobilePresenter {
            handle: self.handle.clone(),
        }
    }

    pub async fn share(&self, _window: Window<R>, options: ShareFileOptions) -> Result<()> {
        self.service.share(&self.presenter(), options).await
    }

    pub async fn share_multiple(
        &self,
        _window: Window<R>,
        options: ShareMultipleOptions,
    ) -> Result<()> {
        self.service.share_multiple(&self.presenter(), options).await
    }

    /// Native choosers report back on their own, so there is never a chooser
    /// waiting for the webview here.
    pub fn respond_chooser(&self, response: ChooserResponse) -> Result<()> {
        Err(Error::UnknownCallback(response.id))
    }

    pub fn cleanup(&self) -> usize {
        self.service.cleanup()
    }

    pub(crate) fn shutdown(&self) {
        self.service.abandon_pending();
        self.service.cleanup();
    }
}
