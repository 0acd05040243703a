use std::sync::{mpsc, Arc};

use objc2::{
    rc::{autoreleasepool, Retained},
    AnyThread,
};
use objc2_app_kit::{NSSharingServicePicker, NSView};
use objc2_core_foundation::{CGPoint, CGRect, CGSize};
use objc2_foundation::{NSArray, NSString, NSURL};
use raw_window_handle::{HasWindowHandle, RawWindowHandle, WindowHandle};
use tauri::{Runtime, Window};
use url::Url;

use super::focus::{begin_focus_wait, cancel_focus_wait};
use crate::chooser::{Chooser, ChooserPresenter, ChooserRegistry};
use crate::pending::PendingCallback;
use crate::receivers::{ReceiverCandidate, ReceiverResolver, SystemReceivers};
use crate::Error;

/// The sharing picker lists services itself.
pub fn receiver_resolver() -> Box<dyn ReceiverResolver> {
    Box::new(SystemReceivers)
}

pub fn launch_receiver(candidate: &ReceiverCandidate, _chooser: &Chooser) -> Result<(), Error> {
    Err(Error::NativeApi(format!(
        "{} is launched by the system sharing picker",
        candidate.id
    )))
}

/// Shows `NSSharingServicePicker` anchored to the window's content view.
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
        let references = chooser.references;
        let dispatched = self.window.run_on_main_thread(move || {
            let _ = tx.send(show_picker(&window, &references));
        });

        let shown = match dispatched {
            Ok(()) => rx
                .recv()
                .unwrap_or_else(|_| Err(Error::NativeApi("Main thread dropped the picker".to_string()))),
            Err(e) => Err(e.into()),
        };
        if shown.is_err() {
            // the request is discarded by the caller; nothing to settle
            let _ = cancel_focus_wait(&self.window);
        }
        shown
    }
}

fn show_picker<R: Runtime>(window: &Window<R>, references: &[Url]) -> Result<(), Error> {
    let ns_view = get_ns_view(window)?;

    autoreleasepool(|_pool| {
        let urls: Vec<Retained<NSURL>> = references.iter().filter_map(ns_url).collect();
        if urls.is_empty() {
            return Err(Error::InvalidArgs("No file references to share.".to_string()));
        }
        let items = NSArray::from_retained_slice(&urls);
        let items: Retained<NSArray> = unsafe { Retained::cast_unchecked(items) };
        let picker = unsafe {
            NSSharingServicePicker::initWithItems(NSSharingServicePicker::alloc(), &items)
        };

        let bounds = ns_view.bounds();
        unsafe {
            picker.showRelativeToRect_ofView_preferredEdge(
                CGRect {
                    origin: CGPoint {
                        x: bounds.size.width / 2.0,
                        y: bounds.size.height / 2.0,
                    },
                    size: CGSize {
                        width: 0.0,
                        height: 0.0,
                    },
                },
                &ns_view,
                objc2_foundation::NSRectEdge::NSMinYEdge,
            );
        }
        Ok(())
    })
}

fn ns_url(reference: &Url) -> Option<Retained<NSURL>> {
    match reference.to_file_path() {
        Ok(path) => {
            let path = NSString::from_str(&path.to_string_lossy());
            Some(unsafe { NSURL::fileURLWithPath(&path) })
        }
        Err(()) => unsafe { NSURL::URLWithString(&NSString::from_str(reference.as_str())) },
    }
}

/// Retrieves the native `NSView` pointer from the Tauri window, compatible with `raw-window-handle`.
fn get_ns_view<R: Runtime>(window: &Window<R>) -> Result<Retained<NSView>, Error> {
    let window_handle: WindowHandle<'_> = window
        .window_handle()
        .map_err(|e| Error::NativeApi(e.to_string()))?;
    if let RawWindowHandle::AppKit(handle) = window_handle.as_raw() {
        let ns_view_ptr = handle.ns_view.as_ptr();
        unsafe { Retained::retain(ns_view_ptr.cast()) }
            .ok_or_else(|| Error::NativeApi("Window has no content view.".to_string()))
    } else {
        Err(Error::NativeApi(
            "Unsupported window handle type on macOS.".to_string(),
        ))
    }
}
