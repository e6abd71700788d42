//! Per-frame scheduling for the live renderer.
//!
//! A [`Scheduler`] owns one recurring task. [`FrameLoop`] binds that task to
//! the lifetime of an editor view: it starts on [`FrameLoop::mount`] and is
//! cancelled on [`FrameLoop::teardown`] or when the loop is dropped.
//!
//! | Scheduler | Driven by |
//! |-----------|-----------|
//! | [`AnimationFrameScheduler`] | `window.requestAnimationFrame` |
//! | [`ManualScheduler`] | explicit [`ManualScheduler::tick`] calls |

#[cfg(test)]
#[path = "schedule_test.rs"]
mod schedule_test;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

/// A frame task. Receives the frame timestamp in milliseconds.
pub type FrameTask = Box<dyn FnMut(f64)>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("no browser window")]
    NoWindow,
    #[error("frame request failed: {0}")]
    Request(String),
}

impl From<JsValue> for ScheduleError {
    fn from(value: JsValue) -> Self {
        Self::Request(format!("{value:?}"))
    }
}

/// Runs one recurring task once per frame until cancelled.
pub trait Scheduler {
    /// Start running `task` every frame, replacing any previous task.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the host cannot schedule frames.
    fn start(&mut self, task: FrameTask) -> Result<(), ScheduleError>;

    /// Stop the task. No further frames run. Idempotent.
    fn cancel(&mut self);

    #[must_use]
    fn is_running(&self) -> bool;
}

// =============================================================
// FrameLoop
// =============================================================

/// The editor view's render loop.
pub struct FrameLoop<S: Scheduler> {
    scheduler: S,
}

impl<S: Scheduler> FrameLoop<S> {
    #[must_use]
    pub fn new(scheduler: S) -> Self {
        Self { scheduler }
    }

    /// Start the loop for a newly mounted view.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the scheduler cannot start.
    pub fn mount(&mut self, task: FrameTask) -> Result<(), ScheduleError> {
        self.scheduler.start(task)?;
        log::debug!("frame loop: mounted");
        Ok(())
    }

    /// Stop the loop. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.scheduler.is_running() {
            self.scheduler.cancel();
            log::debug!("frame loop: torn down");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

impl<S: Scheduler> Drop for FrameLoop<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================
// ManualScheduler
// =============================================================

/// Scheduler advanced by hand, for headless hosts and tests.
#[derive(Default)]
pub struct ManualScheduler {
    task: Option<FrameTask>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame at `now_ms`. Returns `false` if nothing is scheduled.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        task(now_ms);
        true
    }
}

impl Scheduler for ManualScheduler {
    fn start(&mut self, task: FrameTask) -> Result<(), ScheduleError> {
        self.task = Some(task);
        Ok(())
    }

    fn cancel(&mut self) {
        self.task = None;
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

// =============================================================
// AnimationFrameScheduler
// =============================================================

struct FrameState<C> {
    running: bool,
    /// The callback is executing right now.
    in_frame: bool,
    /// Bumped on every `start`; a callback only re-requests its own generation.
    generation: u64,
    handle: Option<i32>,
    callback: Option<C>,
}

impl<C> Default for FrameState<C> {
    fn default() -> Self {
        Self { running: false, in_frame: false, generation: 0, handle: None, callback: None }
    }
}

type FrameCallback = Closure<dyn FnMut(f64)>;

/// Detach the callback, breaking the `state -> callback -> state` cycle.
///
/// A callback that is mid-call must not be freed under itself, so it goes to
/// `defer` instead of being dropped here.
fn release_callback<C>(state: &RefCell<FrameState<C>>, defer: impl FnOnce(C)) {
    let (callback, in_frame) = {
        let mut st = state.borrow_mut();
        (st.callback.take(), st.in_frame)
    };
    match callback {
        Some(callback) if in_frame => defer(callback),
        Some(callback) => drop(callback),
        None => {}
    }
}

/// Drop `callback` from a zero-delay timeout, after the current frame returns.
fn drop_after_frame(callback: FrameCallback) {
    let Some(window) = web_sys::window() else {
        log::warn!("frame loop: no window to release the frame callback");
        callback.forget();
        return;
    };
    let release = Closure::once_into_js(move || drop(callback));
    if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(release.unchecked_ref(), 0) {
        log::warn!("frame loop: could not schedule callback release: {e:?}");
    }
}

/// Scheduler backed by `requestAnimationFrame`.
///
/// The callback re-requests itself each frame while running. Cancelling stops
/// the pending request and releases the callback, so nothing the task captured
/// outlives the scheduler. A callback cancelled from inside its own frame is
/// released right after that frame.
#[derive(Default)]
pub struct AnimationFrameScheduler {
    state: Rc<RefCell<FrameState<FrameCallback>>>,
}

impl AnimationFrameScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for AnimationFrameScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn request_next(state: &Rc<RefCell<FrameState<FrameCallback>>>) -> Result<(), ScheduleError> {
    let window = web_sys::window().ok_or(ScheduleError::NoWindow)?;
    let mut st = state.borrow_mut();
    if !st.running {
        return Ok(());
    }
    let Some(callback) = st.callback.as_ref() else {
        return Ok(());
    };
    let handle = window.request_animation_frame(callback.as_ref().unchecked_ref())?;
    st.handle = Some(handle);
    Ok(())
}

impl Scheduler for AnimationFrameScheduler {
    fn start(&mut self, mut task: FrameTask) -> Result<(), ScheduleError> {
        self.cancel();

        let generation = {
            let mut st = self.state.borrow_mut();
            st.generation += 1;
            st.generation
        };
        let state_for_cb = Rc::clone(&self.state);
        let callback = Closure::wrap(Box::new(move |ts: f64| {
            {
                let mut st = state_for_cb.borrow_mut();
                if !st.running {
                    return;
                }
                st.handle = None;
                st.in_frame = true;
            }
            task(ts);
            let current = {
                let mut st = state_for_cb.borrow_mut();
                st.in_frame = false;
                st.generation == generation
            };
            if !current {
                return;
            }
            if let Err(e) = request_next(&state_for_cb) {
                log::error!("frame loop stopped: {e}");
                state_for_cb.borrow_mut().running = false;
            }
        }) as Box<dyn FnMut(f64)>);

        {
            let mut st = self.state.borrow_mut();
            st.callback = Some(callback);
            st.running = true;
        }
        if let Err(e) = request_next(&self.state) {
            self.cancel();
            return Err(e);
        }
        Ok(())
    }

    fn cancel(&mut self) {
        let handle = {
            let mut st = self.state.borrow_mut();
            st.running = false;
            st.handle.take()
        };
        if let Some(handle) = handle {
            match web_sys::window() {
                Some(window) => {
                    if let Err(e) = window.cancel_animation_frame(handle) {
                        log::warn!("cancel_animation_frame failed: {e:?}");
                    }
                }
                None => log::warn!("frame loop: no window to cancel frame {handle}"),
            }
        }
        release_callback(&self.state, drop_after_frame);
    }

    fn is_running(&self) -> bool {
        self.state.borrow().running
    }
}
