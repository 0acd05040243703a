//! Infers when a system share sheet went away from the window's focus changes.
//!
//! Neither the macOS picker nor the Windows share UI tells us how it was
//! closed, so a chooser counts as finished once the window lost focus and got
//! it back, or was destroyed. If focus never leaves within the grace period
//! the sheet is assumed to have closed on its own.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, OnceLock,
};
use std::time::Duration;

use log::{debug, warn};
use tauri::{Runtime, Window, WindowEvent};

use crate::pending::{PendingCallback, ShareOutcome};
use crate::Error;

const FOCUS_WAIT_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FocusPhase {
    WaitingForLoss,
    WaitingForRegain,
    Completed,
}

#[derive(Debug)]
struct FocusState {
    phase: FocusPhase,
}

impl FocusState {
    fn new() -> Self {
        Self {
            phase: FocusPhase::WaitingForLoss,
        }
    }

    fn reset(&mut self) {
        self.phase = FocusPhase::WaitingForLoss;
    }

    fn on_focus_change(&mut self, focused: bool) -> bool {
        match (self.phase, focused) {
            (FocusPhase::WaitingForLoss, false) => {
                self.phase = FocusPhase::WaitingForRegain;
                false
            }
            (FocusPhase::WaitingForRegain, true) => {
                self.phase = FocusPhase::Completed;
                true
            }
            _ => false,
        }
    }

    fn on_destroyed(&mut self) -> bool {
        let was_waiting = self.phase != FocusPhase::Completed;
        self.phase = FocusPhase::Completed;
        was_waiting
    }

    fn on_grace_elapsed(&mut self) -> bool {
        if self.phase == FocusPhase::WaitingForLoss {
            self.phase = FocusPhase::Completed;
            return true;
        }
        false
    }
}

/// Per-window slot holding the callback of the sheet currently shown there.
struct FocusWaiter {
    label: String,
    pending: Mutex<Option<PendingCallback>>,
    state: Mutex<FocusState>,
    listener_registered: AtomicBool,
}

impl FocusWaiter {
    fn new(label: String) -> Self {
        Self {
            label,
            pending: Mutex::new(None),
            state: Mutex::new(FocusState::new()),
            listener_registered: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, FocusState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<PendingCallback>> {
        match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Arms the waiter for `window`; `callback` is settled once the sheet is
/// considered closed. Only one sheet per window may be pending at a time.
pub fn begin_focus_wait<R: Runtime>(
    window: &Window<R>,
    callback: PendingCallback,
) -> Result<(), Error> {
    let waiter = get_focus_waiter(window)?;
    ensure_focus_listener(window, waiter.clone());

    {
        let mut pending = waiter.pending();
        if pending.is_some() {
            return Err(Error::NativeApi("Share already in progress.".to_string()));
        }
        *pending = Some(callback);
    }
    waiter.state().reset();

    spawn_focus_grace_timer(waiter);
    Ok(())
}

/// Disarms the waiter without settling, for sheets that failed to show.
/// Hands the callback back so the caller can decide what to do with it.
pub fn cancel_focus_wait<R: Runtime>(window: &Window<R>) -> Option<PendingCallback> {
    let waiter = focus_waiters().lock().ok()?.get(window.label()).cloned()?;
    let callback = waiter.pending().take();
    waiter.state().phase = FocusPhase::Completed;
    callback
}

fn get_focus_waiter<R: Runtime>(window: &Window<R>) -> Result<Arc<FocusWaiter>, Error> {
    let mut map = focus_waiters()
        .lock()
        .map_err(|_| Error::NativeApi("Focus wait registry poisoned.".to_string()))?;
    Ok(map
        .entry(window.label().to_string())
        .or_insert_with(|| Arc::new(FocusWaiter::new(window.label().to_string())))
        .clone())
}

fn ensure_focus_listener<R: Runtime>(window: &Window<R>, waiter: Arc<FocusWaiter>) {
    if waiter.listener_registered.swap(true, Ordering::SeqCst) {
        return;
    }

    window.on_window_event(move |event| match event {
        WindowEvent::Focused(focused) => {
            if waiter.state().on_focus_change(*focused) {
                complete_wait(&waiter);
            }
        }
        WindowEvent::Destroyed => {
            if waiter.state().on_destroyed() {
                complete_wait(&waiter);
            }
            remove_focus_waiter(&waiter.label);
        }
        _ => {}
    });
}

fn spawn_focus_grace_timer(waiter: Arc<FocusWaiter>) {
    std::thread::spawn(move || {
        std::thread::sleep(FOCUS_WAIT_GRACE);
        let should_complete = waiter.state().on_grace_elapsed();
        if should_complete {
            debug!("share sheet on {} never took focus", waiter.label);
            complete_wait(&waiter);
        }
    });
}

fn complete_wait(waiter: &FocusWaiter) {
    let callback = waiter.pending().take();
    if let Some(callback) = callback {
        if let Err(e) = callback.settle(ShareOutcome::Completed) {
            warn!("share sheet on {} closed after its request was gone: {}", waiter.label, e);
        }
    }
}

fn remove_focus_waiter(label: &str) {
    if let Ok(mut map) = focus_waiters().lock() {
        map.remove(label);
    }
}

fn focus_waiters() -> &'static Mutex<HashMap<String, Arc<FocusWaiter>>> {
    static WAITERS: OnceLock<Mutex<HashMap<String, Arc<FocusWaiter>>>> = OnceLock::new();
    WAITERS.get_or_init(|| Mutex::new(HashMap::new()))
}
