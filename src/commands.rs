use log::debug;
use tauri::{command, AppHandle, Runtime, Window};

use crate::{error, models, FileSharerExt};

#[command]
pub async fn share<R: Runtime>(
    app: AppHandle<R>,
    window: Window<R>,
    options: models::ShareFileOptions,
) -> Result<(), error::Error> {
    app.file_sharer().share(window, options).await
}

#[command]
pub async fn share_multiple<R: Runtime>(
    app: AppHandle<R>,
    window: Window<R>,
    options: models::ShareMultipleOptions,
) -> Result<(), error::Error> {
    app.file_sharer().share_multiple(window, options).await
}

#[command]
pub async fn respond_chooser<R: Runtime>(
    app: AppHandle<R>,
    response: models::ChooserResponse,
) -> Result<(), error::Error> {
    app.file_sharer().respond_chooser(response)
}

#[command]
pub async fn cleanup<R: Runtime>(app: AppHandle<R>) -> Result<(), error::Error> {
    let removed = app.file_sharer().cleanup();
    debug!("cleanup removed {} stale staging entries", removed);
    Ok(())
}
