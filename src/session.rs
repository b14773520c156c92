//! One playable level: owns the level state, drives runs, keeps the console
//! transcript the player sees, and decides win/lose.

use log::{error, info};
use thiserror::Error;

use crate::{
	ParseError,
	grid::{GridCoordinate, WorldPosition},
	interpreter::{CancelToken, ExecutionContext, Executor, Pacer, RunOutcome, Step, StepEvent},
	level::{ACTOR_HEIGHT, Level, LevelState},
	parse,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Idle,
	Running,
	Won,
	/// A run hit an internal fault; the level may be inconsistent until reset.
	Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
	#[error("a program is already running")]
	AlreadyRunning,
	#[error("the level is complete; reset it to play again")]
	AlreadyWon,
	#[error(transparent)]
	Parse(#[from] ParseError),
}

/// What a renderer needs to draw the level.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
	pub actor: WorldPosition,
	pub actor_yaw_degrees: f32,
	pub objective: WorldPosition,
	pub objective_visible: bool,
	pub hazards: Vec<(GridCoordinate, bool)>,
}

struct ActiveRun {
	executor: Executor,
	context: ExecutionContext,
}

pub struct LevelSession {
	level: Level,
	state: LevelState,
	phase: SessionState,
	run: Option<ActiveRun>,
	last_outcome: Option<RunOutcome>,
	console: Vec<String>,
}

impl LevelSession {
	pub fn new(level: Level) -> Self {
		let state = level.build_state();
		info!("level \"{}\" ready", level.name());
		Self {
			level,
			state,
			phase: SessionState::Idle,
			run: None,
			last_outcome: None,
			console: Vec::new(),
		}
	}

	// --------------------------------------------------
	// UI operations
	// --------------------------------------------------

	/// Resets the level, parses `source` and, if it is valid, starts running it.
	/// Steps are applied by [`tick`](Self::tick) or one of the run helpers.
	pub fn start_run(&mut self, source: &str) -> Result<(), SessionError> {
		match self.phase {
			SessionState::Running => return Err(SessionError::AlreadyRunning),
			SessionState::Won => return Err(SessionError::AlreadyWon),
			SessionState::Idle | SessionState::Blocked => {},
		}

		self.state.reset();
		self.phase = SessionState::Idle;
		self.last_outcome = None;
		let budget = self.level.instruction_budget();
		let commands = match parse(source, budget) {
			Ok(commands) => commands,
			Err(err) => {
				info!("program rejected: {err}");
				self.console.push(format!("Program rejected: {err}"));
				return Err(err.into());
			},
		};

		info!("starting run of {} commands", commands.len());
		self.run = Some(ActiveRun {
			executor: Executor::new(commands),
			context: ExecutionContext::new(budget),
		});
		self.phase = SessionState::Running;
		Ok(())
	}

	/// Stops the active run and puts the level back to its start. Returns
	/// `false` when nothing was running.
	pub fn cancel_run(&mut self) -> bool {
		let Some(run) = self.run.take() else {
			return false;
		};
		run.context.cancel.cancel();
		self.state.reset();
		self.phase = SessionState::Idle;
		self.last_outcome = Some(RunOutcome::Cancelled);
		self.console.push("Execution cancelled.".into());
		info!("run cancelled by the player");
		true
	}

	pub fn reset_level(&mut self) -> Result<(), SessionError> {
		if self.phase == SessionState::Running {
			return Err(SessionError::AlreadyRunning);
		}
		self.state.reset();
		self.phase = SessionState::Idle;
		Ok(())
	}

	pub fn clear_output(&mut self) {
		self.console.clear();
	}

	// --------------------------------------------------
	// Driving a run
	// --------------------------------------------------

	/// Applies one step of the active run. Returns `None` once there is nothing
	/// (left) to run.
	pub fn tick(&mut self) -> Option<StepEvent> {
		let run = self.run.as_mut()?;
		match run.executor.step(&mut self.state, &mut run.context) {
			Step::Applied(event) => {
				self.narrate(&event);
				Some(event)
			},
			Step::Finished(outcome) => {
				self.finish(outcome);
				None
			},
		}
	}

	/// Like [`tick`](Self::tick), but only while `token` still belongs to the
	/// active run. A driver that outlives its run (cancelled, then replaced by
	/// a new one) gets `None` instead of stepping somebody else's run.
	pub fn tick_run(&mut self, token: &CancelToken) -> Option<StepEvent> {
		if !self.cancel_token()?.same_run(token) {
			return None;
		}
		self.tick()
	}

	pub fn run_to_completion(&mut self) -> Option<RunOutcome> {
		while self.tick().is_some() {}
		self.last_outcome.clone()
	}

	/// Like [`run_to_completion`](Self::run_to_completion) but awaits `pacer`
	/// after every step.
	pub async fn run_paced<P: Pacer>(&mut self, pacer: &mut P) -> Option<RunOutcome> {
		while let Some(event) = self.tick() {
			pacer.pace(&event).await;
		}
		self.last_outcome.clone()
	}

	fn narrate(&mut self, event: &StepEvent) {
		let line = match event {
			StepEvent::Collected { .. } => "Crystal collected.",
			StepEvent::CollectMissed { .. } if self.state.objective.collected => "The crystal was already collected.",
			StepEvent::CollectMissed { .. } => "The robot is not on the crystal.",
			StepEvent::Extinguished { .. } => "Fire put out.",
			StepEvent::NothingToExtinguish { .. } => "There is no fire here.",
			StepEvent::Covered { .. } => "Hole covered.",
			StepEvent::NothingToCover { .. } => "There is nothing to cover here.",
			StepEvent::Moved { .. } | StepEvent::Bumped { .. } | StepEvent::Turned { .. } => return,
		};
		self.console.push(line.into());
	}

	fn finish(&mut self, outcome: RunOutcome) {
		self.run = None;
		match &outcome {
			RunOutcome::Completed if self.state.win_condition() => {
				info!("level \"{}\" complete", self.level.name());
				self.console.push("Level complete!".into());
				self.phase = SessionState::Won;
			},
			RunOutcome::Completed => {
				info!("run finished without collecting the crystal");
				self.phase = SessionState::Idle;
			},
			RunOutcome::Cancelled => {
				self.state.reset();
				self.console.push("Execution cancelled.".into());
				self.phase = SessionState::Idle;
			},
			RunOutcome::Failed(fault) => {
				error!("run aborted: {fault}");
				self.phase = SessionState::Blocked;
			},
		}
		self.last_outcome = Some(outcome);
	}

	// --------------------------------------------------
	// Queries
	// --------------------------------------------------

	pub fn state(&self) -> SessionState {
		self.phase
	}

	pub fn is_running(&self) -> bool {
		self.phase == SessionState::Running
	}

	pub fn is_won(&self) -> bool {
		self.phase == SessionState::Won
	}

	pub fn is_on_fire(&self) -> bool {
		self.state.is_on_fire()
	}

	pub fn level(&self) -> &Level {
		&self.level
	}

	pub fn level_state(&self) -> &LevelState {
		&self.state
	}

	pub fn last_outcome(&self) -> Option<&RunOutcome> {
		self.last_outcome.as_ref()
	}

	pub fn console(&self) -> &[String] {
		&self.console
	}

	/// Token of the active run, for cancelling from outside the session.
	pub fn cancel_token(&self) -> Option<CancelToken> {
		self.run.as_ref().map(|run| run.context.cancel.clone())
	}

	pub fn snapshot(&self) -> SceneSnapshot {
		let grid = &self.state.grid;
		let mut actor = grid.coord_to_world(self.state.actor.position);
		actor.y = ACTOR_HEIGHT;
		SceneSnapshot {
			actor,
			actor_yaw_degrees: self.state.actor.facing.yaw_degrees(),
			objective: grid.coord_to_world(self.state.objective.position),
			objective_visible: self.state.objective.visible(),
			hazards: grid.hazards().map(|(at, h)| (at, h.active)).collect(),
		}
	}
}
