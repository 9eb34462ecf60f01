//! Small wgpu engine used by the binary: a background and one jumping box.

mod renderer;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use glam::Vec2;
use winit::window::Window;

use jclient::engine::{EngineError, EngineHandle, EngineLoader};
use jclient::input::Action;
use jclient::viewport::{BackgroundBuffer, Margins};

use renderer::{Rect, Renderer};

const GRAVITY: f32 = 0.5;
const JUMP_VELOCITY: f32 = -10.0;
const WALK_SPEED: f32 = 5.0;
const FAST_FALL: f32 = 1.0;
const ACTOR_COLOR: [f32; 4] = [0.2, 0.4, 1.0, 1.0];

// ── Actor ───────────────────────────────────────────────────────────────────

/// The player box, in game-area pixels (origin top-left).
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
}

impl Actor {
    pub fn spawn() -> Self {
        Self {
            position: Vec2::new(100.0, 0.0),
            velocity: Vec2::ZERO,
            size: Vec2::splat(64.0),
        }
    }

    pub fn on_ground(&self, floor: f32) -> bool {
        self.position.y + self.size.y >= floor
    }

    /// One tick of movement inside a `bounds`-sized area.
    pub fn step(&mut self, actions: &[Action], bounds: Vec2) {
        let floor = bounds.y;
        for action in actions {
            match action {
                Action::MoveLeft => self.position.x -= WALK_SPEED,
                Action::MoveRight => self.position.x += WALK_SPEED,
                Action::Jump if self.on_ground(floor) => self.velocity.y = JUMP_VELOCITY,
                Action::Jump => {}
                Action::MoveDown => self.velocity.y += FAST_FALL,
            }
        }

        self.velocity.y += GRAVITY;
        self.position += self.velocity;

        let max = (bounds - self.size).max(Vec2::ZERO);
        self.position = self.position.clamp(Vec2::ZERO, max);
        if self.on_ground(floor) {
            self.velocity.y = 0.0;
        }
    }
}

// ── Loader ──────────────────────────────────────────────────────────────────

pub struct DemoLoader {
    window: Arc<Window>,
    margins: Margins,
    /// Filled by actor setup, picked up by the engine on its first tick.
    actor: Rc<RefCell<Option<Actor>>>,
}

impl DemoLoader {
    pub fn new(window: Arc<Window>, margins: Margins) -> Self {
        Self { window, margins, actor: Rc::new(RefCell::new(None)) }
    }
}

impl EngineLoader for DemoLoader {
    type Handle = DemoEngine;

    fn initialize_engine(&mut self) -> LocalBoxFuture<'static, Result<DemoEngine, EngineError>> {
        let window = Arc::clone(&self.window);
        let actor_slot = Rc::clone(&self.actor);
        let margins = self.margins;
        async move {
            let renderer = Renderer::new(window, ACTOR_COLOR).await?;
            tracing::info!("demo renderer ready");
            Ok::<_, EngineError>(DemoEngine {
                renderer: Some(renderer),
                margins,
                area: Vec2::ZERO,
                actor_slot,
                actor: None,
            })
        }
        .boxed_local()
    }

    fn initialize_actor(&mut self) -> LocalBoxFuture<'static, Result<(), EngineError>> {
        let slot = Rc::clone(&self.actor);
        async move {
            *slot.borrow_mut() = Some(Actor::spawn());
            Ok(())
        }
        .boxed_local()
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

pub struct DemoEngine {
    /// `None` once disposed.
    renderer: Option<Renderer>,
    margins: Margins,
    /// Game area size from the last resize.
    area: Vec2,
    actor_slot: Rc<RefCell<Option<Actor>>>,
    actor: Option<Actor>,
}

impl DemoEngine {
    fn renderer(&mut self, call: &'static str) -> Result<&mut Renderer, EngineError> {
        self.renderer.as_mut().ok_or_else(|| EngineError::call(call, "engine disposed"))
    }

    /// Game area placed inside the window the way the margins describe.
    fn area_rect(&self) -> Rect {
        Rect {
            x: (self.margins.horizontal / 2) as f32,
            y: (self.margins.vertical / 2) as f32,
            w: self.area.x,
            h: self.area.y,
        }
    }
}

impl EngineHandle for DemoEngine {
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        self.renderer("resize")?.resize_surface();
        self.area = Vec2::new(width as f32, height as f32);
        Ok(())
    }

    fn update(&mut self, actions: &[Action]) -> Result<(), EngineError> {
        if self.actor.is_none() {
            self.actor = self.actor_slot.borrow_mut().take();
        }
        let area = self.area;
        if let Some(actor) = self.actor.as_mut() {
            actor.step(actions, area);
        }
        Ok(())
    }

    fn render(&mut self) -> Result<(), EngineError> {
        let area = self.area_rect();
        let actor = self.actor.as_ref().map(|a| Rect {
            x: area.x + a.position.x,
            y: area.y + a.position.y,
            w: a.size.x,
            h: a.size.y,
        });
        let renderer = self.renderer("render")?;
        match renderer.render(area, actor) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize_surface();
                Ok(())
            }
            Err(e) => Err(EngineError::call("render", e.to_string())),
        }
    }

    fn sync_background(&mut self, buffer: BackgroundBuffer) -> Result<(), EngineError> {
        self.renderer("sync_background")?
            .set_background(buffer.width, buffer.height, &buffer.pixels);
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        if self.renderer.take().is_some() {
            tracing::info!("demo renderer released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_lands_on_floor() {
        let mut actor = Actor::spawn();
        for _ in 0..200 {
            actor.step(&[], Vec2::new(800.0, 400.0));
        }
        assert!(actor.on_ground(400.0));
        assert_eq!(actor.velocity.y, 0.0);
    }

    #[test]
    fn jump_only_from_ground() {
        let bounds = Vec2::new(800.0, 400.0);
        let mut actor = Actor::spawn();
        actor.step(&[Action::Jump], bounds);
        assert!(actor.velocity.y > 0.0, "mid-air jump must not launch");

        for _ in 0..200 {
            actor.step(&[], bounds);
        }
        actor.step(&[Action::Jump], bounds);
        assert!(actor.velocity.y < 0.0);
    }

    #[test]
    fn walking_is_clamped_to_area() {
        let bounds = Vec2::new(200.0, 400.0);
        let mut actor = Actor::spawn();
        for _ in 0..100 {
            actor.step(&[Action::MoveRight], bounds);
        }
        assert_eq!(actor.position.x, 200.0 - 64.0);
    }
}
