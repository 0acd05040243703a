use std::cell::RefCell;
use std::sync::{mpsc, Arc};

use log::warn;
use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use tauri::{Runtime, Window};
use url::Url;
use windows::ApplicationModel::DataTransfer::{DataRequestedEventArgs, DataTransferManager};
use windows::Storage::IStorageItem;
use windows::{
    core::{Interface, HSTRING},
    Foundation::TypedEventHandler,
    Storage::StorageFile,
    Win32::{
        Foundation::HWND,
        System::WinRT::{RoInitialize, RO_INIT_SINGLETHREADED},
        UI::Shell::IDataTransferManagerInterop,
    },
};
use windows_collections::IIterable;

use super::focus::{begin_focus_wait, cancel_focus_wait};
use crate::chooser::{Chooser, ChooserPresenter, ChooserRegistry};
use crate::pending::PendingCallback;
use crate::receivers::{ReceiverCandidate, ReceiverResolver, SystemReceivers};
use crate::Error;

// Holds the DataTransferManager and its event registration token for the
// duration of the share operation. Only touched on the main thread, where
// these non-thread-safe WinRT types live.
thread_local! {
    static SHARE_STATE: RefCell<Option<(DataTransferManager, i64)>> = const { RefCell::new(None) };
}

impl From<windows::core::Error> for Error {
    fn from(err: windows::core::Error) -> Self {
        Error::NativeApi(err.message().to_string())
    }
}

/// The share UI lists targets itself.
pub fn receiver_resolver() -> Box<dyn ReceiverResolver> {
    Box::new(SystemReceivers)
}

pub fn launch_receiver(candidate: &ReceiverCandidate, _chooser: &Chooser) -> Result<(), Error> {
    Err(Error::NativeApi(format!(
        "{} is launched by the system share UI",
        candidate.id
    )))
}

/// Shows the Windows share UI for the window through `DataTransferManager`.
pub struct NativePresenter<R: Runtime> {
    window: Window<R>,
}

impl<R: Runtime> NativePresenter<R> {
    pub fn new(window: Window<R>, _registry: Arc<ChooserRegistry>) -> Self {
        Self { window }
    }
}

impl<R: Runtime> ChooserPresenter for NativePresenter<R> {
    fn present(&self, chooser: Chooser, callback: PendingCallback) -> Result<(), Error> {
        begin_focus_wait(&self.window, callback)?;

        let (tx, rx) = mpsc::channel();
        let window = self.window.clone();
        let dispatched = self.window.run_on_main_thread(move || {
            let _ = tx.send(show_share_ui(&window, chooser));
        });

        let shown = match dispatched {
            Ok(()) => rx.recv().unwrap_or_else(|_| {
                Err(Error::NativeApi(
                    "Failed to receive result from main thread".to_string(),
                ))
            }),
            Err(e) => Err(e.into()),
        };
        if shown.is_err() {
            let _ = cancel_focus_wait(&self.window);
        }
        shown
    }
}

fn show_share_ui<R: Runtime>(window: &Window<R>, chooser: Chooser) -> Result<(), Error> {
    initialize_winrt_thread()?;
    let hwnd = get_hwnd(window)?;
    let (dtm, interop) = get_data_transfer_manager(hwnd)?;

    let title = chooser.title;
    let (files, uris): (Vec<Url>, Vec<Url>) = chooser
        .references
        .into_iter()
        .partition(|url| url.scheme() == "file");
    let files: Vec<String> = files
        .iter()
        .filter_map(|url| url.to_file_path().ok())
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    let uri_text = uris
        .iter()
        .map(Url::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    let data_requested_handler = TypedEventHandler::new(
        move |_, args: windows::core::Ref<'_, DataRequestedEventArgs>| -> windows::core::Result<()> {
            if let Some(request_args) = (*args).as_ref() {
                let request = request_args.Request()?;
                let data = request.Data()?;
                data.Properties()?.SetTitle(&HSTRING::from(title.as_str()))?;

                if !uri_text.is_empty() {
                    data.SetText(&HSTRING::from(uri_text.as_str()))?;
                }

                if !files.is_empty() {
                    let deferral = request.GetDeferral()?;
                    let data = data.clone();
                    let files = files.clone();
                    tauri::async_runtime::spawn(async move {
                        let mut storage_items: Vec<Option<IStorageItem>> = Vec::new();
                        for path in files {
                            match StorageFile::GetFileFromPathAsync(&HSTRING::from(path.as_str()))
                                .and_then(|op| op.get())
                                .and_then(|file| file.cast::<IStorageItem>())
                            {
                                Ok(item) => storage_items.push(Some(item)),
                                Err(e) => warn!("cannot open {} as a storage item: {}", path, e),
                            }
                        }

                        if !storage_items.is_empty() {
                            let items: Result<IIterable<IStorageItem>, _> = storage_items.try_into();
                            match items {
                                // receivers only get read access to the staged files
                                Ok(items) => {
                                    if let Err(e) = data.SetStorageItemsReadOnly(&items) {
                                        warn!("failed to set storage items on data package: {}", e);
                                    }
                                }
                                Err(e) => warn!("failed to convert storage items: {}", e),
                            }
                        }
                        deferral.Complete()
                    });
                }

                SHARE_STATE.with(|state| {
                    if let Some((manager, token)) = state.borrow_mut().take() {
                        let _ = manager.RemoveDataRequested(token);
                    }
                });
            }
            Ok(())
        },
    );

    let token = dtm.DataRequested(&data_requested_handler)?;
    SHARE_STATE.with(|state| {
        *state.borrow_mut() = Some((dtm, token));
    });

    unsafe { interop.ShowShareUIForWindow(hwnd) }?;
    Ok(())
}

/// Initializes the Windows Runtime on the current thread.
fn initialize_winrt_thread() -> Result<(), Error> {
    // S_FALSE on repeated calls is not an error.
    unsafe { RoInitialize(RO_INIT_SINGLETHREADED) }
        .map_err(|e| Error::NativeApi(format!("Failed to initialize WinRT: {}", e)))
}

/// Retrieves the native window handle (HWND) from the Tauri window.
fn get_hwnd<R: Runtime>(window: &Window<R>) -> Result<HWND, Error> {
    let handle = window
        .window_handle()
        .map_err(|e| Error::NativeApi(e.to_string()))?;

    match handle.as_raw() {
        RawWindowHandle::Win32(handle) => Ok(HWND(handle.hwnd.get() as *mut std::ffi::c_void)),
        _ => Err(Error::NativeApi(
            "Unsupported window handle type".to_string(),
        )),
    }
}

/// Gets the DataTransferManager bound to the window; desktop (non-UWP) apps
/// must go through the interop interface.
fn get_data_transfer_manager(
    hwnd: HWND,
) -> Result<(DataTransferManager, IDataTransferManagerInterop), Error> {
    let interop = windows::core::factory::<DataTransferManager, IDataTransferManagerInterop>()?;
    let dtm = unsafe { interop.GetForWindow(hwnd) }?;
    Ok((dtm, interop))
}
