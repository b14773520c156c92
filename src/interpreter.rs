//! Step-wise executor for validated programs.
//!
//! Pending work lives in a queue. Control commands (`repeat`, `if`) never take
//! a step themselves: they splice their body into the front of the queue, the
//! way a cooperative script scheduler splices nested blocks into a task. Every
//! primitive command applies exactly one state change per call to
//! [`Executor::step`], and moves are broken into one step per grid cell, so a
//! caller can animate and cancel between any two cells.

use std::{cell::Cell, collections::VecDeque, future::Future, rc::Rc};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
	ast::{Command, Query},
	grid::{Facing, GridCoordinate, HazardKind},
	level::LevelState,
};

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
	pub fn cancel(&self) {
		self.0.set(true);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.get()
	}

	/// Both tokens were handed out for the same run.
	pub fn same_run(&self, other: &CancelToken) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
	pub cancel: CancelToken,
	pub instruction_count: u32,
	pub instruction_budget: u32,
}

impl ExecutionContext {
	pub fn new(instruction_budget: u32) -> Self {
		Self {
			cancel: CancelToken::default(),
			instruction_count: 0,
			instruction_budget,
		}
	}
}

/// Internal invariant violations. These point at a defect in the level data or
/// the parser, never at the player's program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
	#[error("actor is outside the grid at {0}")]
	ActorOffGrid(GridCoordinate),
	#[error("program ran past its instruction budget of {0}")]
	BudgetOverrun(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
	Completed,
	Cancelled,
	Failed(Fault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
	Moved { from: GridCoordinate, to: GridCoordinate, on_fire: bool },
	Bumped { at: GridCoordinate, wall: GridCoordinate },
	Turned { facing: Facing },
	Collected { at: GridCoordinate },
	CollectMissed { at: GridCoordinate },
	Extinguished { at: GridCoordinate },
	NothingToExtinguish { at: GridCoordinate },
	Covered { at: GridCoordinate },
	NothingToCover { at: GridCoordinate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
	Applied(StepEvent),
	Finished(RunOutcome),
}

/// Paces a run: awaited after every applied step.
pub trait Pacer {
	fn pace(&mut self, event: &StepEvent) -> impl Future<Output = ()>;
}

/// Runs as fast as the caller polls.
#[derive(Debug, Default)]
pub struct Unpaced;

impl Pacer for Unpaced {
	fn pace(&mut self, _event: &StepEvent) -> impl Future<Output = ()> {
		std::future::ready(())
	}
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Heading {
	Forward,
	Backward,
}

#[derive(Debug, Clone)]
enum Op {
	Run(Command),
	/// Rest of a multi-cell move.
	Stride { heading: Heading, remaining: u32 },
}

impl Op {
	fn is_primitive(&self) -> bool {
		match self {
			Op::Run(cmd) => cmd.is_primitive(),
			Op::Stride { .. } => true,
		}
	}
}

enum Action {
	Splice(Vec<Op>),
	Applied { event: StepEvent, resume: Option<Op> },
}

#[derive(Debug)]
pub struct Executor {
	pending: VecDeque<Op>,
	finished: Option<RunOutcome>,
}

impl Executor {
	pub fn new(commands: Vec<Command>) -> Self {
		Self {
			pending: commands.into_iter().map(Op::Run).collect(),
			finished: None,
		}
	}

	pub fn is_finished(&self) -> bool {
		self.finished.is_some()
	}

	/// Applies at most one primitive step. Once finished, keeps returning the
	/// same outcome.
	pub fn step(&mut self, level: &mut LevelState, ctx: &mut ExecutionContext) -> Step {
		if let Some(outcome) = &self.finished {
			return Step::Finished(outcome.clone());
		}
		loop {
			if ctx.cancel.is_cancelled() {
				info!("run cancelled after {} steps", ctx.instruction_count);
				return self.finish(RunOutcome::Cancelled);
			}
			let Some(op) = self.pending.pop_front() else {
				info!("run completed in {} steps", ctx.instruction_count);
				return self.finish(RunOutcome::Completed);
			};
			if op.is_primitive() && ctx.instruction_count >= ctx.instruction_budget {
				return self.finish(RunOutcome::Failed(Fault::BudgetOverrun(ctx.instruction_budget)));
			}

			match exec_op(op, level) {
				Ok(Action::Splice(items)) => {
					for item in items.into_iter().rev() {
						self.pending.push_front(item);
					}
				},
				Ok(Action::Applied { event, resume }) => {
					ctx.instruction_count += 1;
					if let Some(op) = resume {
						self.pending.push_front(op);
					}
					debug!("step {}: {:?}", ctx.instruction_count, event);
					return Step::Applied(event);
				},
				Err(fault) => return self.finish(RunOutcome::Failed(fault)),
			}
		}
	}

	/// Drives the program to its end without pausing.
	pub fn run(mut self, level: &mut LevelState, ctx: &mut ExecutionContext) -> RunOutcome {
		loop {
			if let Step::Finished(outcome) = self.step(level, ctx) {
				return outcome;
			}
		}
	}

	fn finish(&mut self, outcome: RunOutcome) -> Step {
		self.pending.clear();
		self.finished = Some(outcome.clone());
		Step::Finished(outcome)
	}
}

fn exec_op(op: Op, level: &mut LevelState) -> Result<Action, Fault> {
	let cmd = match op {
		Op::Stride { heading, remaining } => return stride(heading, remaining, level),
		Op::Run(cmd) => cmd,
	};
	let at = level.actor.position;
	let applied = |event: StepEvent| -> Result<Action, Fault> { Ok(Action::Applied { event, resume: None }) };

	match cmd {
		Command::MoveForward(n) => stride(Heading::Forward, n, level),
		Command::MoveBackward(n) => stride(Heading::Backward, n, level),
		Command::TurnLeft => {
			level.actor.facing = level.actor.facing.left();
			applied(StepEvent::Turned { facing: level.actor.facing })
		},
		Command::TurnRight => {
			level.actor.facing = level.actor.facing.right();
			applied(StepEvent::Turned { facing: level.actor.facing })
		},
		Command::Collect => {
			if level.actor_on_objective() && !level.objective.collected {
				level.objective.collected = true;
				info!("crystal collected at {at}");
				applied(StepEvent::Collected { at })
			} else {
				warn!("collect at {at} did nothing");
				applied(StepEvent::CollectMissed { at })
			}
		},
		Command::Extinguish => {
			if level.grid.deactivate_hazard(at, Some(HazardKind::Fire)) {
				applied(StepEvent::Extinguished { at })
			} else {
				warn!("no fire to put out at {at}");
				applied(StepEvent::NothingToExtinguish { at })
			}
		},
		Command::CoverHole => {
			if level.grid.deactivate_hazard(at, None) {
				applied(StepEvent::Covered { at })
			} else {
				warn!("no hole to cover at {at}");
				applied(StepEvent::NothingToCover { at })
			}
		},
		Command::Repeat(count, body) => {
			let mut items = Vec::with_capacity(body.len() * count as usize);
			for _ in 0..count {
				items.extend(body.iter().cloned().map(Op::Run));
			}
			Ok(Action::Splice(items))
		},
		Command::When {
			query,
			negated,
			then_commands,
			else_commands,
		} => {
			let holds = sense(query, level) != negated;
			debug!("{query:?} (negated: {negated}) is {holds} at {at}");
			let branch = if holds { then_commands } else { else_commands };
			Ok(Action::Splice(branch.into_iter().map(Op::Run).collect()))
		},
	}
}

fn sense(query: Query, level: &LevelState) -> bool {
	match query {
		Query::OnFire => level.is_on_fire(),
	}
}

/// One cell of a move. Walls and the grid edge leave the actor in place.
fn stride(heading: Heading, remaining: u32, level: &mut LevelState) -> Result<Action, Fault> {
	let from = level.actor.position;
	if !level.grid.contains(from) {
		return Err(Fault::ActorOffGrid(from));
	}
	let direction = match heading {
		Heading::Forward => level.actor.facing,
		Heading::Backward => level.actor.facing.opposite(),
	};
	let to = from.offset(direction.offset());

	let event = if level.grid.is_passable(to) {
		level.actor.position = to;
		let on_fire = level.grid.is_on_fire(to);
		if on_fire {
			warn!("actor walked into fire at {to}");
		}
		StepEvent::Moved { from, to, on_fire }
	} else {
		debug!("actor bumped into {to}");
		StepEvent::Bumped { at: from, wall: to }
	};
	let resume = (remaining > 1).then(|| Op::Stride {
		heading,
		remaining: remaining - 1,
	});
	Ok(Action::Applied { event, resume })
}
