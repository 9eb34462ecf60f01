//! Client-side controller for a game whose simulation lives in a separate
//! engine: session lifecycle, held-action input, a fixed-tick loop and
//! viewport/background sync.

pub mod app;
pub mod clock;
pub mod config;
pub mod engine;
pub mod input;
pub mod session;
pub mod viewport;

pub use clock::FrameClock;
pub use config::ClientConfig;
pub use engine::{EngineError, EngineHandle, EngineLoader};
pub use input::{Action, ActionSet, InputAggregator};
pub use session::{Session, SessionBuilder, SessionError, SessionState};
pub use viewport::{BackgroundBuffer, Viewport, ViewportManager};
