use gridbot::{Facing, GridCoordinate, Level, LevelSession, ParseError, RunOutcome, SessionError, SessionState, StepEvent, Unpaced};

const ARENA: &str = r#"
name = "arena"
grid_size = 5
instruction_budget = 40
objective = { x = 4, z = 4 }

[actor]
x = 0
z = 0
facing = "east"

[[obstacles]]
x_min = 2
x_max = 2
z_min = 0
z_max = 2

[[obstacles]]
x_min = 4
x_max = 4
z_min = 1
z_max = 1

[[hazards]]
x = 1
z = 3

[[hazards]]
x = 3
z = 3
kind = "hole"
"#;

fn play(session: &mut LevelSession, source: &str) -> (Option<RunOutcome>, Vec<StepEvent>) {
	session.start_run(source).expect("program should parse");
	let mut events = Vec::new();
	while let Some(event) = session.tick() {
		events.push(event);
	}
	(session.last_outcome().cloned(), events)
}

#[test]
fn straight_run_wins_the_first_level() {
	let mut session = LevelSession::new(Level::phase_one());
	let (outcome, events) = play(&mut session, "forward 9; collect");
	assert_eq!(outcome, Some(RunOutcome::Completed));
	assert_eq!(events.len(), 10);
	assert!(session.is_won());
	assert!(!session.snapshot().objective_visible);
}

#[test]
fn repeat_wins_within_the_same_budget() {
	let mut session = LevelSession::new(Level::phase_one());
	let outcome = futures::executor::block_on(async {
		session.start_run("repeat 3 { forward 3 }\ncollect()").expect("program should parse");
		session.run_paced(&mut Unpaced).await
	});
	assert_eq!(outcome, Some(RunOutcome::Completed));
	assert_eq!(session.state(), SessionState::Won);
}

#[test]
fn oversized_program_is_rejected_before_running() {
	let mut session = LevelSession::new(Level::phase_one());
	let err = session.start_run("forward 3; turnRight; forward 100").expect_err("over budget");
	assert_eq!(err, SessionError::Parse(ParseError::BudgetExceeded { required: 104, budget: 10 }));
	assert!(!session.is_running());
	assert_eq!(session.level_state().actor.position, GridCoordinate::new(0, 5));
}

#[test]
fn walking_into_a_wall_wastes_steps() {
	let mut session = LevelSession::new(Level::phase_one());
	let (outcome, events) = play(&mut session, "turnLeft; forward 2");
	assert_eq!(outcome, Some(RunOutcome::Completed));
	assert_eq!(events.len(), 3);
	assert!(matches!(events[1], StepEvent::Bumped { .. }));
	assert_eq!(session.level_state().actor.position, GridCoordinate::new(0, 5));
	assert_eq!(session.level_state().actor.facing, Facing::North);
	assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn actor_never_stands_in_a_wall() {
	const FRAGMENTS: [&str; 8] = [
		"forward 2",
		"backward 1",
		"turnLeft",
		"turnRight",
		"collect",
		"repeat 2 { forward 1 turnRight }",
		"if onFire { extinguish } else { forward 1 }",
		"if !onFire { cover }",
	];
	let mut session = LevelSession::new(Level::from_toml(ARENA).expect("arena should load"));
	let mut seed: u32 = 7;
	let mut next = || {
		seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
		(seed >> 16) as usize % FRAGMENTS.len()
	};

	for _ in 0..200 {
		let program: Vec<&str> = (0..6).map(|_| FRAGMENTS[next()]).collect();
		if session.is_won() {
			session.reset_level().expect("not running");
		}
		let (_, events) = play(&mut session, &program.join("; "));
		for event in &events {
			if let StepEvent::Moved { to, .. } = event {
				let grid = &session.level_state().grid;
				assert!(grid.contains(*to) && !grid.is_obstacle(*to), "moved into {to} running {program:?}");
			}
			if let StepEvent::Collected { at } = event {
				assert_eq!(*at, GridCoordinate::new(4, 4));
			}
		}
	}
}

#[test]
fn cancelled_run_keeps_only_a_prefix_then_resets() {
	let mut session = LevelSession::new(Level::phase_one());
	session.start_run("forward 6; collect").expect("program should parse");
	let token = session.cancel_token().expect("running");
	let mut seen = Vec::new();
	while let Some(event) = session.tick() {
		seen.push(event);
		if seen.len() == 3 {
			token.cancel();
		}
	}
	assert_eq!(seen.len(), 3);
	assert!(seen.iter().all(|e| matches!(e, StepEvent::Moved { .. })));
	assert_eq!(session.last_outcome(), Some(&RunOutcome::Cancelled));
	assert_eq!(session.level_state().actor, session.level_state().spawn());
}

#[test]
fn fire_puts_out_and_resets_with_the_level() {
	let mut session = LevelSession::new(Level::phase_one());
	let (_, events) = play(&mut session, "forward 5; if onFire { extinguish }");
	assert_eq!(events.last(), Some(&StepEvent::Extinguished { at: GridCoordinate::new(5, 5) }));
	assert!(!session.is_on_fire());

	session.reset_level().expect("idle");
	let first = session.snapshot();
	session.reset_level().expect("idle");
	assert_eq!(session.snapshot(), first);
	assert_eq!(first.hazards, vec![(GridCoordinate::new(5, 5), true)]);
}
