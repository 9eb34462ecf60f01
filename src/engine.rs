//! Call contract of the external simulation engine.
//!
//! The session is the only caller. It obtains a handle from an
//! [`EngineLoader`] while loading and routes every later call (resize, tick,
//! background sync, teardown) through that handle.

use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::input::Action;
use crate::viewport::BackgroundBuffer;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    Init(String),
    #[error("actor setup failed: {0}")]
    Actor(String),
    #[error("engine call `{call}` failed: {reason}")]
    Call { call: &'static str, reason: String },
}

impl EngineError {
    pub fn call(call: &'static str, reason: impl Into<String>) -> Self {
        Self::Call { call, reason: reason.into() }
    }
}

// ── Loader ──────────────────────────────────────────────────────────────────

/// Starts the two independent setup operations of a session.
///
/// Both are called exactly once, on session construction. The returned
/// futures must not borrow the loader.
pub trait EngineLoader {
    type Handle: EngineHandle + 'static;

    /// Loads the engine and returns the handle all later calls go through.
    fn initialize_engine(&mut self) -> LocalBoxFuture<'static, Result<Self::Handle, EngineError>>;

    /// Prepares the player actor (sprite decode and the like).
    fn initialize_actor(&mut self) -> LocalBoxFuture<'static, Result<(), EngineError>>;
}

// ── Handle ──────────────────────────────────────────────────────────────────

/// An initialized engine.
pub trait EngineHandle {
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError>;

    /// Advances the simulation one tick with the currently held actions.
    fn update(&mut self, actions: &[Action]) -> Result<(), EngineError>;

    /// Draws the current frame. Called after `update` on every tick.
    fn render(&mut self) -> Result<(), EngineError>;

    /// Receives the background for the viewport about to be passed to
    /// `resize`. Engines without a background can ignore it.
    fn sync_background(&mut self, buffer: BackgroundBuffer) -> Result<(), EngineError> {
        let _ = buffer;
        Ok(())
    }

    /// Releases engine resources. Must tolerate being called more than once.
    fn dispose(&mut self) -> Result<(), EngineError>;
}

// ── Discrete-control engines ────────────────────────────────────────────────

/// Older engine surface with one call per movement instead of a batched
/// `update`.
pub trait DiscreteControls {
    fn jump(&mut self) -> Result<(), EngineError>;
    fn move_left(&mut self) -> Result<(), EngineError>;
    fn move_right(&mut self) -> Result<(), EngineError>;
    /// Integrates gravity and velocity for one tick.
    fn apply_physics(&mut self) -> Result<(), EngineError>;
    fn draw(&mut self) -> Result<(), EngineError>;
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError>;
    fn dispose(&mut self) -> Result<(), EngineError> { Ok(()) }
}

/// Adapts a [`DiscreteControls`] engine to [`EngineHandle`].
///
/// `update` calls `jump`, `move_left`, `move_right` for the held actions, in
/// that order, and then `apply_physics`.
/// `MoveDown` has no discrete counterpart and is ignored.
pub struct Discrete<E>(pub E);

impl<E> Discrete<E> {
    pub fn into_inner(self) -> E { self.0 }
}

impl<E: DiscreteControls> EngineHandle for Discrete<E> {
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        self.0.resize(width, height)
    }

    fn update(&mut self, actions: &[Action]) -> Result<(), EngineError> {
        if actions.contains(&Action::Jump) {
            self.0.jump()?;
        }
        if actions.contains(&Action::MoveLeft) {
            self.0.move_left()?;
        }
        if actions.contains(&Action::MoveRight) {
            self.0.move_right()?;
        }
        self.0.apply_physics()
    }

    fn render(&mut self) -> Result<(), EngineError> {
        self.0.draw()
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        self.0.dispose()
    }
}
