use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
pub use winit::keyboard::KeyCode;

// ── Action ──────────────────────────────────────────────────────────────────

/// Logical game command, decoupled from whatever physical key produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Jump,
    MoveDown,
}

impl Action {
    /// Every action, in the order `ActionSet::active` reports them.
    pub const ALL: [Action; 4] = [Action::MoveLeft, Action::MoveRight, Action::Jump, Action::MoveDown];
    pub const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        match self {
            Action::MoveLeft => 0,
            Action::MoveRight => 1,
            Action::Jump => 2,
            Action::MoveDown => 3,
        }
    }
}

// ── ActionSet ───────────────────────────────────────────────────────────────

/// Held/not-held flag for each `Action`.
///
/// The key set is closed: every action always has an entry, so a snapshot is a
/// plain `Copy` value that can be handed to the tick without borrowing the
/// aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSet {
    held: [bool; Action::COUNT],
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, action: Action) -> bool { self.held[action.index()] }

    pub fn set(&mut self, action: Action, active: bool) {
        self.held[action.index()] = active;
    }

    /// Active actions in `Action::ALL` order.
    pub fn active(&self) -> Vec<Action> {
        Action::ALL.into_iter().filter(|a| self.is_active(*a)).collect()
    }

    pub fn is_empty(&self) -> bool { !self.held.iter().any(|h| *h) }

    pub fn clear(&mut self) {
        self.held = [false; Action::COUNT];
    }
}

// ── ActionMap ───────────────────────────────────────────────────────────────

/// Fixed lookup table from physical key codes to logical actions.
///
/// A code is bound to at most one action; binding it again replaces the old
/// entry. Several codes may share one action (arrows and WASD).
#[derive(Debug, Clone, Default)]
pub struct ActionMap {
    bindings: HashMap<KeyCode, Action>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self { bindings: HashMap::new() }
    }

    /// Arrow keys plus WASD.
    pub fn with_default_bindings() -> Self {
        let mut map = Self::new();
        for (code, action) in DEFAULT_BINDINGS {
            map.bind(code, action);
        }
        map
    }

    /// Binds `code` to `action`, returning the action it was bound to before.
    pub fn bind(&mut self, code: KeyCode, action: Action) -> Option<Action> {
        self.bindings.insert(code, action)
    }

    pub fn action_for(&self, code: KeyCode) -> Option<Action> {
        self.bindings.get(&code).copied()
    }

    pub fn len(&self) -> usize { self.bindings.len() }

    pub fn is_empty(&self) -> bool { self.bindings.is_empty() }
}

pub const DEFAULT_BINDINGS: [(KeyCode, Action); 8] = [
    (KeyCode::ArrowUp, Action::Jump),
    (KeyCode::KeyW, Action::Jump),
    (KeyCode::ArrowDown, Action::MoveDown),
    (KeyCode::KeyS, Action::MoveDown),
    (KeyCode::ArrowLeft, Action::MoveLeft),
    (KeyCode::KeyA, Action::MoveLeft),
    (KeyCode::ArrowRight, Action::MoveRight),
    (KeyCode::KeyD, Action::MoveRight),
];

// ── InputAggregator ─────────────────────────────────────────────────────────

/// Tracks which bound keys are currently held and derives the held actions.
///
/// Events are applied synchronously as they arrive, so a burst of presses and
/// releases between two ticks is never lost. An action is held while any key
/// bound to it is held: releasing `ArrowUp` keeps Jump active if `KeyW` is
/// still down. OS key-repeat produces extra key-down events; pressing an
/// already-held key is a no-op.
#[derive(Debug, Clone)]
pub struct InputAggregator {
    map: ActionMap,
    keys_held: HashSet<KeyCode>,
}

impl InputAggregator {
    pub fn new(map: ActionMap) -> Self {
        Self { map, keys_held: HashSet::new() }
    }

    /// Returns `true` if `code` is bound to an action.
    pub fn key_down(&mut self, code: KeyCode) -> bool {
        if self.map.action_for(code).is_none() {
            return false;
        }
        self.keys_held.insert(code);
        true
    }

    /// Returns `true` if `code` is bound to an action.
    pub fn key_up(&mut self, code: KeyCode) -> bool {
        if self.map.action_for(code).is_none() {
            return false;
        }
        self.keys_held.remove(&code);
        true
    }

    pub fn is_key_held(&self, code: KeyCode) -> bool { self.keys_held.contains(&code) }

    /// Snapshot of the held actions.
    pub fn current_actions(&self) -> ActionSet {
        let mut actions = ActionSet::new();
        for action in self.keys_held.iter().filter_map(|k| self.map.action_for(*k)) {
            actions.set(action, true);
        }
        actions
    }

    /// Drops every held key, e.g. when the window loses focus and the
    /// matching key-up events will never arrive.
    pub fn release_all(&mut self) {
        self.keys_held.clear();
    }

    pub fn action_map(&self) -> &ActionMap { &self.map }
}

impl Default for InputAggregator {
    fn default() -> Self { Self::new(ActionMap::with_default_bindings()) }
}
