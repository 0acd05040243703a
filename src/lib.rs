//! # tauri-plugin-file-sharer
//!
//! A Tauri plugin that hands files to the system's share chooser on Android,
//! iOS, macOS and Windows, and to a webview-rendered chooser on Linux.
//!
//! A single file is shared from Base64 content or from a local path. The
//! plugin copies it into a private staging directory under the app cache dir,
//! hands the chooser a read-only reference to that copy, and resolves the
//! call once the chooser reports back. Several existing files or URIs can be
//! shared at once with `share_multiple`.
//!
//! ## Installation
//!
//! ```toml
//! # Cargo.toml
//! [dependencies]
//! tauri-plugin-file-sharer = { git = "https://github.com/vnidrop/plugin-file-sharer" }
//! ```
//!
//! ## Usage
//!
//! ### Rust
//!
//! ```rust,ignore
//! // src/main.rs
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(tauri_plugin_file_sharer::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! ### Configuration
//!
//! Everything is optional:
//!
//! ```json
//! {
//!   "plugins": {
//!     "file-sharer": {
//!       "stagingDirName": "filesharer",
//!       "defaultDialogTitle": "Share",
//!       "explicitReceivers": true
//!     }
//!   }
//! }
//! ```
//!
//! ### Frontend (JavaScript/TypeScript)
//!
//! ```js
//! import { invoke } from '@tauri-apps/api/core';
//!
//! try {
//!   await invoke('plugin:file-sharer|share', {
//!     options: {
//!       filename: 'report.pdf',
//!       contentType: 'application/pdf',
//!       base64Data: pdfBase64,
//!       chooserTitle: 'Send report',
//!     },
//!   });
//! } catch (e) {
//!   if (e === 'USER_CANCELLED') { /* dismissed */ }
//! }
//!
//! await invoke('plugin:file-sharer|share_multiple', {
//!   options: { files: ['/path/a.png', 'content://media/external/images/1'] },
//! });
//! ```
//!
//! On Linux the chooser is drawn by the app. Listen for `file-sharer://chooser`,
//! render its `candidates`, and answer with
//! `invoke('plugin:file-sharer|respond_chooser', { response: { id, receiver } })`,
//! leaving `receiver` out when the user dismissed it.

use tauri::{
    plugin::{Builder, TauriPlugin},
    Manager, Runtime,
};

pub use models::*;

#[cfg(desktop)]
mod desktop;
#[cfg(mobile)]
mod mobile;

mod chooser;
mod commands;
mod error;
mod models;
mod pending;
#[cfg(desktop)]
mod platform;
mod receivers;
mod request;
mod service;
mod staging;

pub use error::{Error, Result};
pub use pending::CallbackId;
pub use receivers::ReceiverCandidate;

#[cfg(desktop)]
use desktop::FileSharer;
#[cfg(mobile)]
use mobile::FileSharer;

/// Extensions to [`tauri::App`], [`tauri::AppHandle`] and [`tauri::Window`] to access the file sharer APIs.
pub trait FileSharerExt<R: Runtime> {
    fn file_sharer(&self) -> &FileSharer<R>;
}

impl<R: Runtime, T: Manager<R>> crate::FileSharerExt<R> for T {
    fn file_sharer(&self) -> &FileSharer<R> {
        self.state::<FileSharer<R>>().inner()
    }
}

/// Initializes the plugin.
///
/// Share requests still waiting on a chooser are abandoned and the staging
/// directory is swept when the plugin is dropped.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<Config>> {
    Builder::<R, Option<Config>>::new("file-sharer")
        .invoke_handler(tauri::generate_handler![
            commands::share,
            commands::share_multiple,
            commands::respond_chooser,
            commands::cleanup,
        ])
        .setup(|app, api| {
            #[cfg(mobile)]
            let file_sharer = mobile::init(app, api)?;
            #[cfg(desktop)]
            let file_sharer = desktop::init(app, api)?;
            app.manage(file_sharer);
            Ok(())
        })
        .on_drop(|app| {
            if let Some(file_sharer) = app.try_state::<FileSharer<R>>() {
                file_sharer.shutdown();
            }
        })
        .build()
}
