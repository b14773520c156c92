//! Turns the syntax tree into validated [`Command`]s, charging every
//! primitive step against the instruction budget as it goes.

use log::debug;

use crate::{
	ParseError,
	ast::{Call, Command, IfStatement, Location, Query, RepeatStatement, Statement},
};

/// Largest step count for a move and largest repeat count.
pub const MAX_ARGUMENT: u32 = 50;

#[derive(Debug, Clone)]
enum Verb {
	Move { backward: bool },
	Simple(Command),
}

fn verb_from_name(name: &str) -> Option<Verb> {
	Some(match name {
		"forward" | "moveForward" => Verb::Move { backward: false },
		"backward" | "back" | "moveBackward" => Verb::Move { backward: true },
		"turnLeft" | "left" => Verb::Simple(Command::TurnLeft),
		"turnRight" | "right" => Verb::Simple(Command::TurnRight),
		"collect" => Verb::Simple(Command::Collect),
		"extinguish" => Verb::Simple(Command::Extinguish),
		"cover" => Verb::Simple(Command::CoverHole),
		_ => return None,
	})
}

fn query_from_name(name: &str) -> Option<Query> {
	match name {
		"onFire" | "isOnFire" => Some(Query::OnFire),
		_ => None,
	}
}

/// Running total of expanded steps.
#[derive(Debug, Clone, Copy)]
struct Meter {
	used: u32,
	budget: u32,
}

impl Meter {
	fn charge(&mut self, cost: u32) -> Result<(), ParseError> {
		self.used = self.used.saturating_add(cost);
		if self.used > self.budget {
			Err(ParseError::BudgetExceeded {
				required: self.used,
				budget: self.budget,
			})
		} else {
			Ok(())
		}
	}
}

pub(crate) fn lower(statements: &[Statement], budget: u32) -> Result<Vec<Command>, ParseError> {
	let mut meter = Meter { used: 0, budget };
	let commands = lower_block(statements, &mut meter)?;
	debug!("program expands to {} of {} allowed steps", meter.used, budget);
	Ok(commands)
}

fn lower_block(statements: &[Statement], meter: &mut Meter) -> Result<Vec<Command>, ParseError> {
	let mut out = Vec::with_capacity(statements.len());
	for stmt in statements {
		let lowered = match stmt {
			Statement::Call(call) => Some(lower_call(call, meter)?),
			Statement::Repeat(rep) => lower_repeat(rep, meter)?,
			Statement::If(branch) => lower_if(branch, meter)?,
		};
		out.extend(lowered);
	}
	Ok(out)
}

fn invalid(fragment: &str, at: Location, reason: impl Into<String>) -> ParseError {
	ParseError::InvalidArgument {
		fragment: fragment.to_string(),
		line: at.line,
		reason: reason.into(),
	}
}

/// Lower bound only; the upper bound is checked after charging so an oversized
/// count reports the budget first.
fn positive(raw: &str, fragment: &str, at: Location) -> Result<u32, ParseError> {
	match raw.parse::<i64>() {
		Ok(n) if n >= 1 => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
		Ok(_) => Err(invalid(fragment, at, "must be at least 1")),
		Err(_) => Err(invalid(fragment, at, format!("must be at most {MAX_ARGUMENT}"))),
	}
}

fn at_most(n: u32, fragment: &str, at: Location) -> Result<u32, ParseError> {
	if n > MAX_ARGUMENT {
		Err(invalid(fragment, at, format!("must be at most {MAX_ARGUMENT}")))
	} else {
		Ok(n)
	}
}

fn lower_call(call: &Call, meter: &mut Meter) -> Result<Command, ParseError> {
	let verb = verb_from_name(&call.name).ok_or_else(|| ParseError::UnrecognizedConstruct {
		fragment: call.text.clone(),
		line: call.location.line,
		column: call.location.column,
	})?;

	match verb {
		Verb::Move { backward } => {
			let raw = call
				.argument
				.as_deref()
				.ok_or_else(|| invalid(&call.text, call.location, "needs a number of steps, e.g. `forward 3`"))?;
			let n = positive(raw, &call.text, call.location)?;
			meter.charge(n)?;
			let n = at_most(n, &call.text, call.location)?;
			Ok(if backward { Command::MoveBackward(n) } else { Command::MoveForward(n) })
		},
		Verb::Simple(command) => {
			if call.argument.is_some() {
				return Err(invalid(&call.text, call.location, "takes no argument"));
			}
			meter.charge(1)?;
			Ok(command)
		},
	}
}

fn lower_repeat(rep: &RepeatStatement, meter: &mut Meter) -> Result<Option<Command>, ParseError> {
	let fragment = format!("repeat {}", rep.count);
	let count = positive(&rep.count, &fragment, rep.location)?;

	let mut inner = *meter;
	let body = lower_block(&rep.body.statements, &mut inner)?;
	let body_cost = inner.used - meter.used;
	meter.charge(body_cost.saturating_mul(count))?;
	let count = at_most(count, &fragment, rep.location)?;

	if body_cost == 0 {
		debug!("dropping repeat with nothing to do at line {}", rep.location.line);
		return Ok(None);
	}
	Ok(Some(Command::Repeat(count, body)))
}

fn lower_if(branch: &IfStatement, meter: &mut Meter) -> Result<Option<Command>, ParseError> {
	let cond = &branch.condition;
	let query = query_from_name(&cond.sensor).ok_or_else(|| ParseError::UnrecognizedConstruct {
		fragment: cond.sensor.clone(),
		line: cond.location.line,
		column: cond.location.column,
	})?;

	let mut then_meter = *meter;
	let then_commands = lower_block(&branch.then_block.statements, &mut then_meter)?;
	let mut else_meter = *meter;
	let else_commands = match &branch.else_block {
		Some(block) => lower_block(&block.statements, &mut else_meter)?,
		None => Vec::new(),
	};

	let cost = then_meter.used.max(else_meter.used) - meter.used;
	meter.charge(cost)?;
	if cost == 0 {
		return Ok(None);
	}
	Ok(Some(Command::When {
		query,
		negated: cond.negated,
		then_commands,
		else_commands,
	}))
}
