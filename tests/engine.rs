use jclient::engine::*;
use jclient::input::Action;

/// Records discrete calls by name.
#[derive(Default)]
struct Legacy {
    calls: Vec<&'static str>,
    fail_jump: bool,
}

impl DiscreteControls for Legacy {
    fn jump(&mut self) -> Result<(), EngineError> {
        self.calls.push("jump");
        if self.fail_jump { Err(EngineError::call("jump", "no")) } else { Ok(()) }
    }
    fn move_left(&mut self) -> Result<(), EngineError> {
        self.calls.push("move_left");
        Ok(())
    }
    fn move_right(&mut self) -> Result<(), EngineError> {
        self.calls.push("move_right");
        Ok(())
    }
    fn apply_physics(&mut self) -> Result<(), EngineError> {
        self.calls.push("apply_physics");
        Ok(())
    }
    fn draw(&mut self) -> Result<(), EngineError> {
        self.calls.push("draw");
        Ok(())
    }
    fn resize(&mut self, _width: u32, _height: u32) -> Result<(), EngineError> {
        self.calls.push("resize");
        Ok(())
    }
}

#[test]
fn idle_update_only_applies_physics() {
    let mut engine = Discrete(Legacy::default());
    engine.update(&[]).unwrap();
    assert_eq!(engine.0.calls, ["apply_physics"]);
}

#[test]
fn held_actions_map_to_discrete_calls_in_order() {
    let mut engine = Discrete(Legacy::default());
    engine
        .update(&[Action::MoveLeft, Action::MoveRight, Action::Jump])
        .unwrap();
    assert_eq!(engine.0.calls, ["jump", "move_left", "move_right", "apply_physics"]);
}

#[test]
fn move_down_has_no_discrete_call() {
    let mut engine = Discrete(Legacy::default());
    engine.update(&[Action::MoveDown]).unwrap();
    assert_eq!(engine.0.calls, ["apply_physics"]);
}

#[test]
fn render_draws_and_resize_forwards() {
    let mut engine = Discrete(Legacy::default());
    engine.render().unwrap();
    engine.resize(100, 50).unwrap();
    engine.dispose().unwrap();
    assert_eq!(engine.into_inner().calls, ["draw", "resize"]);
}

#[test]
fn failing_call_stops_the_update() {
    let mut engine = Discrete(Legacy { fail_jump: true, ..Default::default() });
    let err = engine.update(&[Action::Jump, Action::MoveLeft]).unwrap_err();
    assert_eq!(err, EngineError::call("jump", "no"));
    assert_eq!(engine.0.calls, ["jump"]);
}

#[test]
fn error_messages_name_the_call() {
    let err = EngineError::call("render", "surface lost");
    assert_eq!(err.to_string(), "engine call `render` failed: surface lost");
}
