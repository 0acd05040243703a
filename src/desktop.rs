use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;
use tauri::{plugin::PluginApi, AppHandle, Manager, Runtime, Window};

use crate::chooser::ChooserRegistry;
use crate::models::*;
use crate::platform::{self, NativePresenter};
use crate::service::ShareService;
use crate::staging::StagingArea;
use crate::Result;

pub fn init<R: Runtime>(
    app: &AppHandle<R>,
    api: PluginApi<R, Option<Config>>,
) -> crate::Result<FileSharer<R>> {
    let config = api.config().clone().unwrap_or_default();
    let root = app.path().app_cache_dir()?.join(&config.staging_dir_name);
    debug!("staging shared files under {}", root.display());

    let service = ShareService::new(config, StagingArea::new(root), platform::receiver_resolver());
    Ok(FileSharer {
        service,
        registry: Arc::new(ChooserRegistry::new()),
        _runtime: PhantomData,
    })
}

/// Access to the file sharer APIs.
pub struct FileSharer<R: Runtime> {
    service: ShareService,
    registry: Arc<ChooserRegistry>,
    _runtime: PhantomData<fn() -> R>,
}

impl<R: Runtime> FileSharer<R> {
    /// Stages one file and shows the chooser over `window`.
    pub async fn share(&self, window: Window<R>, options: ShareFileOptions) -> Result<()> {
        let presenter = NativePresenter::new(window, self.registry.clone());
        self.service.share(&presenter, options).await
    }

    pub async fn share_multiple(
        &self,
        window: Window<R>,
        options: ShareMultipleOptions,
    ) -> Result<()> {
        let presenter = NativePresenter::new(window, self.registry.clone());
        self.service.share_multiple(&presenter, options).await
    }

    /// Answers a chooser the webview rendered. Only Linux emits those; on
    /// other desktops every id is unknown.
    pub fn respond_chooser(&self, response: ChooserResponse) -> Result<()> {
        self.registry.respond(response, platform::launch_receiver)
    }

    pub fn cleanup(&self) -> usize {
        self.service.cleanup()
    }

    pub(crate) fn shutdown(&self) {
        self.service.abandon_pending();
        self.service.cleanup();
    }
}
