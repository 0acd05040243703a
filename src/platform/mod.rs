//! Native choosers for desktop platforms.
//!
//! Each platform module exposes the same surface: a `NativePresenter` bound to
//! the requesting window, `receiver_resolver()` for explicit enumeration and
//! `launch_receiver()` for choosers answered by the webview.

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use self::windows::*;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::*;

#[cfg(any(target_os = "windows", target_os = "macos"))]
mod focus;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use self::macos::*;
