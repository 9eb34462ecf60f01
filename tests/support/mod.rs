// Fake engine, loaders and background sources shared by the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::task::Context;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use image::{Rgba, RgbaImage};

use jclient::engine::{EngineError, EngineHandle, EngineLoader};
use jclient::input::Action;
use jclient::session::{Session, SessionBuilder, SessionState};
use jclient::viewport::{BackgroundBuffer, BackgroundSource, ViewportError};

pub const TICK: Duration = Duration::from_millis(16);

/// Window used by most tests; with default margins the viewport is 1000×720.
pub const WINDOW: (u32, u32) = (1040, 920);

pub fn noop_cx() -> Context<'static> {
    Context::from_waker(futures::task::noop_waker_ref())
}

// ── Recording engine ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Resize(u32, u32),
    Update(Vec<Action>),
    Render,
    SyncBackground { width: u32, height: u32, samples: usize },
    Dispose,
}

#[derive(Debug, Default)]
pub struct Log {
    pub calls: Vec<Call>,
    pub engine_inits: u32,
    pub actor_inits: u32,
    pub fail_update: bool,
    pub fail_render: bool,
    pub fail_resize: bool,
    pub fail_dispose: bool,
}

pub type SharedLog = Rc<RefCell<Log>>;

pub fn new_log() -> SharedLog {
    Rc::new(RefCell::new(Log::default()))
}

pub fn calls(log: &SharedLog) -> Vec<Call> {
    log.borrow().calls.clone()
}

pub fn count(log: &SharedLog, pred: impl Fn(&Call) -> bool) -> usize {
    log.borrow().calls.iter().filter(|c| pred(c)).count()
}

pub fn resizes(log: &SharedLog) -> Vec<(u32, u32)> {
    log.borrow()
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::Resize(w, h) => Some((*w, *h)),
            _ => None,
        })
        .collect()
}

pub fn updates(log: &SharedLog) -> Vec<Vec<Action>> {
    log.borrow()
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::Update(a) => Some(a.clone()),
            _ => None,
        })
        .collect()
}

pub struct FakeEngine {
    log: SharedLog,
}

impl FakeEngine {
    fn record(&self, call: Call, fail: bool, name: &'static str) -> Result<(), EngineError> {
        self.log.borrow_mut().calls.push(call);
        if fail { Err(EngineError::call(name, "injected failure")) } else { Ok(()) }
    }
}

impl EngineHandle for FakeEngine {
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        let fail = self.log.borrow().fail_resize;
        self.record(Call::Resize(width, height), fail, "resize")
    }

    fn update(&mut self, actions: &[Action]) -> Result<(), EngineError> {
        let fail = self.log.borrow().fail_update;
        self.record(Call::Update(actions.to_vec()), fail, "update")
    }

    fn render(&mut self) -> Result<(), EngineError> {
        let fail = self.log.borrow().fail_render;
        self.record(Call::Render, fail, "render")
    }

    fn sync_background(&mut self, buffer: BackgroundBuffer) -> Result<(), EngineError> {
        let call = Call::SyncBackground {
            width: buffer.width,
            height: buffer.height,
            samples: buffer.sample_count(),
        };
        self.record(call, false, "sync_background")
    }

    fn dispose(&mut self) -> Result<(), EngineError> {
        let fail = self.log.borrow().fail_dispose;
        self.record(Call::Dispose, fail, "dispose")
    }
}

// ── Loaders ─────────────────────────────────────────────────────────────────

type Gate = oneshot::Receiver<Result<(), String>>;

enum Init {
    Now(Result<(), String>),
    Gated(Gate),
}

fn settle(init: Init) -> LocalBoxFuture<'static, Result<(), String>> {
    match init {
        Init::Now(result) => futures::future::ready(result).boxed_local(),
        Init::Gated(rx) => rx
            .map(|r| r.unwrap_or_else(|_| Err("gate dropped".to_string())))
            .boxed_local(),
    }
}

pub struct FakeLoader {
    log: SharedLog,
    engine: Option<Init>,
    actor: Option<Init>,
}

/// Test-side ends of a gated loader.
pub struct InitGates {
    pub engine: oneshot::Sender<Result<(), String>>,
    pub actor: oneshot::Sender<Result<(), String>>,
}

impl FakeLoader {
    /// Both setup operations succeed on first poll.
    pub fn ready(log: &SharedLog) -> Self {
        Self::with_results(log, Ok(()), Ok(()))
    }

    pub fn with_results(log: &SharedLog, engine: Result<(), String>, actor: Result<(), String>) -> Self {
        Self {
            log: Rc::clone(log),
            engine: Some(Init::Now(engine)),
            actor: Some(Init::Now(actor)),
        }
    }

    /// Setup operations settle only when the test sends on the gates.
    pub fn gated(log: &SharedLog) -> (Self, InitGates) {
        let (engine_tx, engine_rx) = oneshot::channel();
        let (actor_tx, actor_rx) = oneshot::channel();
        let loader = Self {
            log: Rc::clone(log),
            engine: Some(Init::Gated(engine_rx)),
            actor: Some(Init::Gated(actor_rx)),
        };
        (loader, InitGates { engine: engine_tx, actor: actor_tx })
    }
}

impl EngineLoader for FakeLoader {
    type Handle = FakeEngine;

    fn initialize_engine(&mut self) -> LocalBoxFuture<'static, Result<FakeEngine, EngineError>> {
        self.log.borrow_mut().engine_inits += 1;
        let log = Rc::clone(&self.log);
        let init = self.engine.take().unwrap_or(Init::Now(Err("initialized twice".into())));
        settle(init)
            .map(move |r| r.map(|()| FakeEngine { log }).map_err(EngineError::Init))
            .boxed_local()
    }

    fn initialize_actor(&mut self) -> LocalBoxFuture<'static, Result<(), EngineError>> {
        self.log.borrow_mut().actor_inits += 1;
        let init = self.actor.take().unwrap_or(Init::Now(Err("initialized twice".into())));
        settle(init).map(|r| r.map_err(EngineError::Actor)).boxed_local()
    }
}

// ── Backgrounds ─────────────────────────────────────────────────────────────

pub fn checker(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) }
    })
}

/// Background whose loads finish only when the test releases them, oldest
/// first.
pub struct GatedBackground {
    image: Rc<RgbaImage>,
    pending: RefCell<VecDeque<oneshot::Sender<()>>>,
    pub loads: RefCell<u32>,
}

impl GatedBackground {
    pub fn new(image: RgbaImage) -> Rc<Self> {
        Rc::new(Self {
            image: Rc::new(image),
            pending: RefCell::new(VecDeque::new()),
            loads: RefCell::new(0),
        })
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Lets the oldest outstanding load finish. Returns `false` if none.
    pub fn release_next(&self) -> bool {
        match self.pending.borrow_mut().pop_front() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl BackgroundSource for GatedBackground {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<RgbaImage>, ViewportError>> {
        *self.loads.borrow_mut() += 1;
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push_back(tx);
        let image = Rc::clone(&self.image);
        async move {
            rx.await.map_err(|_| ViewportError::Decode("load abandoned".into()))?;
            Ok::<_, ViewportError>(image)
        }
        .boxed_local()
    }
}

// ── Sessions ────────────────────────────────────────────────────────────────

/// Session whose setup has already succeeded.
pub fn ready_session(log: &SharedLog, builder: SessionBuilder) -> Session<FakeEngine> {
    let mut session = builder.build(FakeLoader::ready(log));
    assert!(session.poll_loading(&mut noop_cx()).is_ready());
    assert_eq!(session.state(), SessionState::Ready);
    session
}

/// Session already playing in `WINDOW`, started at `t0`.
pub fn playing_session(log: &SharedLog, builder: SessionBuilder, t0: Instant) -> Session<FakeEngine> {
    let mut session = ready_session(log, builder);
    assert_eq!(session.start(WINDOW.0, WINDOW.1, t0), Ok(true));
    session
}
