use std::sync::Arc;
use std::task::Context;
use std::time::Instant;

use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use crate::config::{ClientConfig, WindowMode};
use crate::engine::EngineLoader;
use crate::session::{Session, SessionBuilder, SessionState};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Opens a window and runs a session in it until the window is closed.
///
/// `make_loader` is called once the window exists, so engines that render
/// into the window surface can capture it.
pub fn run<L, F>(config: ClientConfig, builder: SessionBuilder, make_loader: F) -> Result<(), AppError>
where
    L: EngineLoader,
    F: FnMut(Arc<Window>) -> L,
{
    let event_loop = EventLoop::new()?;
    let mut app = App {
        config,
        builder: Some(builder),
        make_loader,
        session: None,
        window: None,
        shown_status: None,
    };
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn window_attributes(config: &ClientConfig) -> WindowAttributes {
    let attrs = Window::default_attributes()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.window_width, config.window_height))
        .with_resizable(true);
    match config.window_mode {
        WindowMode::Windowed => attrs,
        // Borderless(None) targets whichever monitor the window lands on.
        WindowMode::Borderless => attrs.with_fullscreen(Some(Fullscreen::Borderless(None))),
    }
}

// ── App (winit ApplicationHandler) ──────────────────────────────────────────

struct App<L: EngineLoader, F> {
    config: ClientConfig,
    builder: Option<SessionBuilder>,
    make_loader: F,
    // Declared before `window` so the engine is released while the window
    // still exists.
    session: Option<Session<L::Handle>>,
    window: Option<Arc<Window>>,
    /// Status the window title was last updated for.
    shown_status: Option<(SessionState, bool)>,
}

impl<L, F> App<L, F>
where
    L: EngineLoader,
    F: FnMut(Arc<Window>) -> L,
{
    /// The window title doubles as the loading indicator and start prompt.
    fn refresh_title(&mut self) {
        let (Some(window), Some(session)) = (self.window.as_ref(), self.session.as_ref()) else {
            return;
        };
        let state = session.state();
        let status = (state, session.init_error().is_some());
        if self.shown_status == Some(status) {
            return;
        }
        self.shown_status = Some(status);

        let status = match session.init_error() {
            Some(error) => format!("failed to load: {error}"),
            None => state.label().to_string(),
        };
        window.set_title(&format!("{} | {status}", self.config.title));
    }

    fn request_start(&mut self) {
        let (Some(window), Some(session)) = (self.window.as_ref(), self.session.as_mut()) else {
            return;
        };
        let size = window.inner_size();
        if let Err(error) = session.start(size.width, size.height, Instant::now()) {
            tracing::warn!(%error, "could not start session");
        }
    }
}

impl<L, F> ApplicationHandler for App<L, F>
where
    L: EngineLoader,
    F: FnMut(Arc<Window>) -> L,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // Only the first resume creates the session.
        let Some(builder) = self.builder.take() else { return };

        let window = match event_loop.create_window(window_attributes(&self.config)) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                tracing::error!(%error, "failed to create window");
                event_loop.exit();
                return;
            }
        };
        let loader = (self.make_loader)(Arc::clone(&window));
        self.session = Some(builder.build(loader));
        self.window = Some(window);
        self.refresh_title();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(session) = self.session.as_mut() else { return };

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        session.poll(&mut cx, Instant::now());

        // Pending futures are re-polled on every turn; while they are
        // outstanding the loop spins instead of sleeping.
        let flow = match session.state() {
            SessionState::Loading if session.init_error().is_none() => ControlFlow::Poll,
            SessionState::Playing if session.is_syncing() => ControlFlow::Poll,
            SessionState::Playing => match session.next_wakeup() {
                Some(deadline) => ControlFlow::WaitUntil(deadline),
                None => ControlFlow::Wait,
            },
            _ => ControlFlow::Wait,
        };
        event_loop.set_control_flow(flow);
        self.refresh_title();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(session) = self.session.as_mut() else { return };

        match event {
            WindowEvent::CloseRequested => {
                session.teardown();
                event_loop.exit();
            }

            WindowEvent::Destroyed => session.teardown(),

            WindowEvent::Resized(size) => session.resize(size.width, size.height),

            WindowEvent::Focused(false) => session.release_all_keys(),

            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                if session.state() == SessionState::Ready {
                    self.request_start();
                }
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                ..
            } => match state {
                ElementState::Pressed => {
                    if session.state() == SessionState::Ready
                        && matches!(code, KeyCode::Enter | KeyCode::Space)
                    {
                        self.request_start();
                    } else {
                        session.key_down(code);
                    }
                }
                ElementState::Released => {
                    session.key_up(code);
                }
            },

            _ => {}
        }
    }
}
