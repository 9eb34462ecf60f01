//! Session lifecycle: loading, start, the per-tick loop, and teardown.
//!
//! A [`Session`] is driven from a single thread by an event-driven host. The
//! host forwards key, resize, start and teardown events as they arrive and
//! calls [`Session::poll`] whenever it gets a turn; nothing here blocks.

use std::future::poll_fn;
use std::rc::Rc;
use std::task::{Context, Poll, ready};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use thiserror::Error;

use crate::clock::{DEFAULT_TICK_INTERVAL, FrameClock};
use crate::config::{ClientConfig, ConfigError};
use crate::engine::{EngineError, EngineHandle, EngineLoader};
use crate::input::{ActionMap, ActionSet, InputAggregator, KeyCode};
use crate::viewport::{
    BackgroundSource, ImageBackground, Margins, SyncRequest, Viewport, ViewportError,
    ViewportManager, ViewportSync,
};

// ── SessionState ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Ready,
    Playing,
    Terminated,
}

impl SessionState {
    /// Legal edges of the lifecycle. Teardown may jump to `Terminated` from
    /// any state the session can actually be observed in.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Uninitialized, next) => next == Loading,
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Loading, Ready) | (Ready, Playing) => true,
            _ => false,
        }
    }

    /// Short status line for the host UI.
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Uninitialized | SessionState::Loading => "Loading...",
            SessionState::Ready => "Press Enter to play",
            SessionState::Playing => "Playing",
            SessionState::Terminated => "Stopped",
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Failures that reach the host. Per-tick and resize failures are contained
/// inside the session and only show up in logs and failure counters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session failed to initialize: {0}")]
    Initialization(EngineError),
    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
    #[error(transparent)]
    Viewport(#[from] ViewportError),
    #[error("session was torn down")]
    Terminated,
}

// ── Listeners ───────────────────────────────────────────────────────────────

/// Which host event streams the session currently acts upon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Listeners {
    keyboard: bool,
    resize: bool,
}

impl Listeners {
    /// Returns `true` if anything changed.
    pub fn register(&mut self) -> bool {
        let changed = !(self.keyboard && self.resize);
        self.keyboard = true;
        self.resize = true;
        changed
    }

    /// Returns `true` if anything changed.
    pub fn unregister(&mut self) -> bool {
        let changed = self.keyboard || self.resize;
        self.keyboard = false;
        self.resize = false;
        changed
    }

    pub fn keyboard(&self) -> bool { self.keyboard }
    pub fn resize(&self) -> bool { self.resize }
}

// ── SessionBuilder ──────────────────────────────────────────────────────────

pub struct SessionBuilder {
    margins: Margins,
    min_width: u32,
    min_height: u32,
    tick_interval: Duration,
    action_map: ActionMap,
    background: Option<Rc<dyn BackgroundSource>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            margins: Margins::default(),
            min_width: 1,
            min_height: 1,
            tick_interval: DEFAULT_TICK_INTERVAL,
            action_map: ActionMap::with_default_bindings(),
            background: None,
        }
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut builder = Self::default()
            .with_margins(config.margins)
            .with_min_viewport(config.min_viewport_width, config.min_viewport_height)
            .with_tick_interval(config.tick_interval())
            .with_action_map(config.action_map()?);
        if let Some(path) = &config.background {
            builder = builder.with_background(Rc::new(ImageBackground::from_path(path)));
        }
        Ok(builder)
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn with_min_viewport(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_action_map(mut self, map: ActionMap) -> Self {
        self.action_map = map;
        self
    }

    /// Enables background sync: every viewport change rasterizes this image
    /// and hands the buffer to the engine before `resize`.
    pub fn with_background(mut self, source: Rc<dyn BackgroundSource>) -> Self {
        self.background = Some(source);
        self
    }

    /// Creates the session and immediately starts both setup operations.
    pub fn build<L: EngineLoader>(self, loader: L) -> Session<L::Handle> {
        let mut viewport =
            ViewportManager::new(self.margins).with_min_size(self.min_width, self.min_height);
        if let Some(source) = self.background {
            viewport = viewport.with_background(source);
        }

        let mut session = Session {
            state: SessionState::Uninitialized,
            loading: None,
            engine: None,
            input: InputAggregator::new(self.action_map),
            viewport,
            clock: FrameClock::new(self.tick_interval),
            listeners: Listeners::default(),
            init_error: None,
            frame_failures: 0,
            resize_failures: 0,
        };
        session.begin_loading(loader);
        session
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

type LoadingFuture<H> = LocalBoxFuture<'static, (Result<H, EngineError>, Result<(), EngineError>)>;

/// One run of the client, from construction to teardown.
///
/// The session exclusively owns the engine handle. The frame clock and the
/// viewport manager never touch the engine themselves: they tell the session
/// when a tick is due or a sync has finished, and the session makes the call.
/// Once torn down the handle is gone, so no engine call can follow.
pub struct Session<H: EngineHandle> {
    state: SessionState,
    loading: Option<LoadingFuture<H>>,
    engine: Option<H>,
    input: InputAggregator,
    viewport: ViewportManager,
    clock: FrameClock,
    listeners: Listeners,
    init_error: Option<SessionError>,
    frame_failures: u64,
    resize_failures: u64,
}

impl<H: EngineHandle> Session<H> {
    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState { self.state }
    pub fn is_playing(&self) -> bool { self.state == SessionState::Playing }
    pub fn viewport(&self) -> Option<Viewport> { self.viewport.current() }
    pub fn current_actions(&self) -> ActionSet { self.input.current_actions() }
    pub fn listeners(&self) -> Listeners { self.listeners }
    pub fn ticks(&self) -> u64 { self.clock.ticks() }
    pub fn is_clock_running(&self) -> bool { self.clock.is_running() }
    pub fn is_syncing(&self) -> bool { self.viewport.is_syncing() }

    /// The initialization failure, if loading failed.
    pub fn init_error(&self) -> Option<&SessionError> { self.init_error.as_ref() }

    /// Per-tick engine failures that were logged and skipped.
    pub fn frame_failures(&self) -> u64 { self.frame_failures }

    /// Viewport or resize failures that were logged and skipped.
    pub fn resize_failures(&self) -> u64 { self.resize_failures }

    /// When the host should wake up next to keep the tick cadence.
    pub fn next_wakeup(&self) -> Option<Instant> { self.clock.next_deadline() }

    // ── Lifecycle ──────────────────────────────────────────────────────────

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition { from: self.state, to: next });
        }
        tracing::info!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
        Ok(())
    }

    fn begin_loading<L>(&mut self, mut loader: L)
    where
        L: EngineLoader<Handle = H>,
        H: 'static,
    {
        if let Err(error) = self.transition(SessionState::Loading) {
            tracing::error!(%error, "cannot start loading");
            return;
        }
        let engine = loader.initialize_engine();
        let actor = loader.initialize_actor();
        self.loading = Some(future::join(engine, actor).boxed_local());
    }

    /// Drives both setup operations.
    ///
    /// Resolves with `Ok` once the session has reached `Ready` (or later), and
    /// with the initialization error if either operation failed. A failed
    /// session stays in `Loading` with nothing left to poll; it is not retried.
    pub fn poll_loading(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), SessionError>> {
        let Some(loading) = self.loading.as_mut() else {
            return Poll::Ready(match (&self.init_error, self.state) {
                (Some(error), _) => Err(error.clone()),
                (None, SessionState::Terminated) => Err(SessionError::Terminated),
                _ => Ok(()),
            });
        };
        let (engine, actor) = ready!(loading.poll_unpin(cx));
        self.loading = None;

        let error = match (engine, actor) {
            (Ok(handle), Ok(())) => {
                self.engine = Some(handle);
                self.transition(SessionState::Ready)?;
                return Poll::Ready(Ok(()));
            }
            (Err(error), actor) => {
                if let Err(actor_error) = actor {
                    tracing::warn!(error = %actor_error, "actor setup failed as well");
                }
                error
            }
            (Ok(mut handle), Err(error)) => {
                if let Err(dispose_error) = handle.dispose() {
                    tracing::warn!(error = %dispose_error, "failed to dispose engine after actor setup failure");
                }
                error
            }
        };

        let error = SessionError::Initialization(error);
        tracing::error!(%error, "session initialization failed");
        self.init_error = Some(error.clone());
        Poll::Ready(Err(error))
    }

    /// Awaitable form of [`Session::poll_loading`].
    pub async fn wait_loaded(&mut self) -> Result<(), SessionError> {
        poll_fn(|cx| self.poll_loading(cx)).await
    }

    /// The user's start signal.
    ///
    /// Returns `Ok(true)` when the session moved from `Ready` to `Playing`,
    /// `Ok(false)` when the signal was ignored (still loading, already
    /// playing, torn down). An unusable window size is an error and leaves the
    /// session in `Ready`.
    pub fn start(&mut self, window_width: u32, window_height: u32, now: Instant) -> Result<bool, SessionError> {
        if self.state != SessionState::Ready {
            tracing::debug!(state = ?self.state, "start signal ignored");
            return Ok(false);
        }

        let request = self.viewport.request(window_width, window_height)?;
        self.transition(SessionState::Playing)?;
        self.listeners.register();
        self.clock.start(now);
        self.handle_sync_request(request);
        Ok(true)
    }

    /// Ends the session from any state.
    ///
    /// Stops the clock first, so no tick can run once this has begun, then
    /// drops listeners, pending syncs and loading work, and disposes the
    /// engine. A failing `dispose` is logged and teardown still completes.
    /// Calling it again does nothing.
    pub fn teardown(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.clock.stop();
        self.listeners.unregister();
        self.input.release_all();
        self.viewport.release();
        self.loading = None;

        if let Some(mut engine) = self.engine.take() {
            if let Err(error) = engine.dispose() {
                tracing::warn!(%error, "engine dispose failed during teardown");
            }
        }

        let from = std::mem::replace(&mut self.state, SessionState::Terminated);
        tracing::info!(?from, "session terminated");
    }

    // ── Events ─────────────────────────────────────────────────────────────

    /// Returns `true` if the key is bound and the session is listening.
    pub fn key_down(&mut self, code: KeyCode) -> bool {
        self.listeners.keyboard() && self.input.key_down(code)
    }

    /// Returns `true` if the key is bound and the session is listening.
    pub fn key_up(&mut self, code: KeyCode) -> bool {
        self.listeners.keyboard() && self.input.key_up(code)
    }

    /// Releases every held action (focus loss).
    pub fn release_all_keys(&mut self) {
        self.input.release_all();
    }

    /// Window resize. Recomputes the viewport and schedules a full resync;
    /// ignored unless playing.
    pub fn resize(&mut self, window_width: u32, window_height: u32) {
        if !self.listeners.resize() {
            tracing::debug!(state = ?self.state, window_width, window_height, "resize ignored");
            return;
        }
        match self.viewport.request(window_width, window_height) {
            Ok(request) => self.handle_sync_request(request),
            Err(error) => {
                self.resize_failures += 1;
                tracing::warn!(%error, "viewport recompute failed");
            }
        }
    }

    // ── Polling ────────────────────────────────────────────────────────────

    /// Gives the session a turn: advances loading, finished viewport syncs,
    /// and the frame clock.
    pub fn poll(&mut self, cx: &mut Context<'_>, now: Instant) {
        match self.state {
            SessionState::Loading => {
                let _ = self.poll_loading(cx);
            }
            SessionState::Playing => {
                self.poll_viewport(cx);
                self.tick(now);
            }
            _ => {}
        }
    }

    /// Applies every viewport sync that has finished.
    pub fn poll_viewport(&mut self, cx: &mut Context<'_>) {
        if self.state != SessionState::Playing {
            return;
        }
        while let Poll::Ready(Some(result)) = self.viewport.poll_sync(cx) {
            match result {
                Ok(sync) => self.apply_sync(sync),
                Err(error) => {
                    self.resize_failures += 1;
                    tracing::warn!(%error, "background sync failed");
                }
            }
        }
    }

    /// Runs one tick if the clock says one is due: forwards the held actions
    /// to the engine, then redraws. Engine failures are logged and the loop
    /// carries on. Returns `true` if a tick ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state != SessionState::Playing {
            return false;
        }
        let Some(tick) = self.clock.poll_tick(now) else {
            return false;
        };
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };

        let actions = self.input.current_actions().active();
        if let Err(error) = engine.update(&actions) {
            self.frame_failures += 1;
            tracing::warn!(tick, %error, "engine update failed");
        }
        if let Err(error) = engine.render() {
            self.frame_failures += 1;
            tracing::warn!(tick, %error, "engine render failed");
        }
        true
    }

    fn handle_sync_request(&mut self, request: SyncRequest) {
        match request {
            SyncRequest::Ready(sync) => self.apply_sync(sync),
            SyncRequest::Started(viewport) => tracing::debug!(?viewport, "background sync started"),
            SyncRequest::Queued(viewport) => tracing::debug!(?viewport, "background sync queued"),
        }
    }

    /// Background first, then the size it was built for.
    fn apply_sync(&mut self, sync: ViewportSync) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let Viewport { width, height, .. } = sync.viewport;

        if let Some(buffer) = sync.background {
            if let Err(error) = engine.sync_background(buffer) {
                self.resize_failures += 1;
                tracing::warn!(%error, width, height, "engine background sync failed; skipping resize");
                return;
            }
        }
        match engine.resize(width, height) {
            Ok(()) => tracing::debug!(width, height, "engine resized"),
            Err(error) => {
                self.resize_failures += 1;
                tracing::warn!(%error, width, height, "engine resize failed");
            }
        }
    }
}

impl<H: EngineHandle> Drop for Session<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
