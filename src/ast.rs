//! Syntax tree produced by the pest grammar, and the validated [`Command`]
//! form the executor consumes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
	pub line: usize,
	pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
	pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
	Call(Call),
	Repeat(RepeatStatement),
	If(IfStatement),
}

/// `name`, `name 3`, `name(3)` or `name()`. The argument is kept as written so
/// range errors can quote it back to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
	pub name: String,
	pub argument: Option<String>,
	pub text: String,
	pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatStatement {
	pub count: String,
	pub body: Block,
	pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
	pub condition: Condition,
	pub then_block: Block,
	pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
	pub negated: bool,
	pub sensor: String,
	pub location: Location,
}

// ---------------------------------------------------------------------------
// Validated program
// ---------------------------------------------------------------------------

/// Actor sensors a program may branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
	OnFire,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	MoveForward(u32),
	MoveBackward(u32),
	TurnLeft,
	TurnRight,
	Collect,
	Extinguish,
	CoverHole,
	Repeat(u32, Vec<Command>),
	When {
		query: Query,
		negated: bool,
		then_commands: Vec<Command>,
		else_commands: Vec<Command>,
	},
}

impl Command {
	/// Worst-case number of primitive steps this command expands to.
	pub fn cost(&self) -> u32 {
		match self {
			Command::MoveForward(n) | Command::MoveBackward(n) => *n,
			Command::TurnLeft | Command::TurnRight | Command::Collect | Command::Extinguish | Command::CoverHole => 1,
			Command::Repeat(count, body) => count.saturating_mul(sequence_cost(body)),
			Command::When {
				then_commands, else_commands, ..
			} => sequence_cost(then_commands).max(sequence_cost(else_commands)),
		}
	}

	/// Whether executing this command changes the level (and therefore takes a step).
	pub fn is_primitive(&self) -> bool {
		!matches!(self, Command::Repeat(..) | Command::When { .. })
	}
}

pub fn sequence_cost(commands: &[Command]) -> u32 {
	commands.iter().fold(0u32, |acc, c| acc.saturating_add(c.cost()))
}
