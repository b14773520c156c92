pub mod ast;
pub mod grid;
pub mod interpreter;
pub mod level;
mod lower;
pub mod session;
mod web;

use ast::{Block, Call, Condition, IfStatement, Location, RepeatStatement, Statement};
use log::debug;
use pest::{
	Parser,
	error::{InputLocation, LineColLocation},
	iterators::Pair,
};
use thiserror::Error;

pub use ast::Command;
pub use grid::{Facing, GridCoordinate, GridMap, HazardKind, HazardState, WorldPosition};
pub use interpreter::{CancelToken, ExecutionContext, Executor, Fault, Pacer, RunOutcome, Step, StepEvent, Unpaced};
pub use level::{Level, LevelConfig, LevelError, LevelState};
pub use lower::MAX_ARGUMENT;
pub use session::{LevelSession, SceneSnapshot, SessionError, SessionState};
pub use web::{WebSession, start};

#[derive(pest_derive::Parser)]
#[grammar = "grammar.pest"]
struct ProgramParser;

/// Why a player program was rejected. Rendered verbatim in the level console.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("line {line}, column {column}: I don't understand `{fragment}`")]
	UnrecognizedConstruct { fragment: String, line: usize, column: usize },
	#[error("line {line}: `{fragment}` {reason}")]
	InvalidArgument { fragment: String, line: usize, reason: String },
	#[error("program needs at least {required} instructions but only {budget} are allowed")]
	BudgetExceeded { required: u32, budget: u32 },
}

fn location(pair: &Pair<Rule>) -> Location {
	let (line, column) = pair.as_span().start_pos().line_col();
	Location { line, column }
}

fn parse_block(pair: Pair<Rule>) -> Block {
	Block {
		statements: pair.into_inner().filter_map(parse_statement).collect(),
	}
}

/// Children of a statement pair, minus its keyword tokens.
fn operands(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
	pair.into_inner().filter(|p| !matches!(p.as_rule(), Rule::repeat_kw | Rule::if_kw | Rule::else_kw))
}

fn parse_statement(pair: Pair<Rule>) -> Option<Statement> {
	match pair.as_rule() {
		Rule::call => {
			let location = location(&pair);
			// The span can swallow whitespace probed for a missing argument.
			let text = pair.as_str().trim_end().to_string();
			let mut inner = pair.into_inner();
			let name = inner.next()?.as_str().to_string();
			let argument = inner.next().and_then(|arg| arg.into_inner().next()).map(|n| n.as_str().to_string());
			Some(Statement::Call(Call {
				name,
				argument,
				text,
				location,
			}))
		},
		Rule::repeat_stmt => {
			let location = location(&pair);
			let mut inner = operands(pair);
			let count = inner.next()?.as_str().to_string();
			let body = parse_block(inner.next()?);
			Some(Statement::Repeat(RepeatStatement { count, body, location }))
		},
		Rule::if_stmt => {
			let mut inner = operands(pair);
			let condition = parse_condition(inner.next()?)?;
			let then_block = parse_block(inner.next()?);
			let else_block = inner.next().map(|p| {
				if p.as_rule() == Rule::if_stmt {
					// else if: a nested if wrapped in a block
					Block {
						statements: parse_statement(p).into_iter().collect(),
					}
				} else {
					parse_block(p)
				}
			});
			Some(Statement::If(IfStatement {
				condition,
				then_block,
				else_block,
			}))
		},
		_ => None,
	}
}

fn parse_condition(pair: Pair<Rule>) -> Option<Condition> {
	let mut negated = false;
	let mut current = pair;
	loop {
		let mut inner = current.into_inner();
		let first = inner.next()?;
		match first.as_rule() {
			Rule::negation => {
				negated = !negated;
				current = inner.next()?;
			},
			Rule::condition => current = first,
			Rule::query => {
				let location = location(&first);
				let sensor = first.into_inner().next()?.as_str().to_string();
				return Some(Condition { negated, sensor, location });
			},
			_ => return None,
		}
	}
}

fn unrecognized(input: &str, err: &pest::error::Error<Rule>) -> ParseError {
	let offset = match err.location {
		InputLocation::Pos(p) => p,
		InputLocation::Span((start, _)) => start,
	};
	let (line, column) = match err.line_col {
		LineColLocation::Pos(lc) => lc,
		LineColLocation::Span(lc, _) => lc,
	};
	let fragment: String = input
		.get(offset..)
		.unwrap_or_default()
		.trim_start()
		.chars()
		.take_while(|c| !c.is_whitespace() && *c != ';')
		.collect();
	ParseError::UnrecognizedConstruct {
		fragment: if fragment.is_empty() { "<end of program>".to_string() } else { fragment },
		line,
		column,
	}
}

/// Syntax only: builds the statement tree without checking verbs, arguments
/// or the instruction budget.
pub fn parse_str(input: &str) -> Result<Vec<Statement>, ParseError> {
	let pairs = ProgramParser::parse(Rule::program, input).map_err(|e| unrecognized(input, &e))?;
	let mut statements = Vec::new();
	for pair in pairs {
		if pair.as_rule() == Rule::program {
			statements.extend(pair.into_inner().filter_map(parse_statement));
		}
	}
	Ok(statements)
}

/// Parses and validates a player program against `instruction_budget`
/// fully-expanded primitive steps.
pub fn parse(source: &str, instruction_budget: u32) -> Result<Vec<Command>, ParseError> {
	let statements = parse_str(source)?;
	debug!("parsed {} top-level statements", statements.len());
	lower::lower(&statements, instruction_budget)
}

pub fn set_panic_hook() {
	// When the `console_error_panic_hook` feature is enabled, we can call the
	// `set_panic_hook` function at least once during initialization, and then
	// we will get better error messages if our code ever panics.
	#[cfg(feature = "console_error_panic_hook")]
	console_error_panic_hook::set_once();
}

/// Browser console on wasm32, stderr elsewhere (`RUST_LOG` overrides `level`).
pub fn init_logging(level: log::LevelFilter) {
	#[cfg(target_arch = "wasm32")]
	{
		let level = level.to_level().unwrap_or(log::Level::Error);
		if console_log::init_with_level(level).is_err() {
			log::warn!("logger already initialised");
		}
	}

	#[cfg(not(target_arch = "wasm32"))]
	{
		if env_logger::Builder::new().filter_level(level).parse_default_env().try_init().is_err() {
			log::warn!("logger already initialised");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::Query;

	fn parse_ok(src: &str) -> Vec<Statement> {
		parse_str(src).expect("parse failed")
	}

	fn parse_err(src: &str) -> ParseError {
		parse(src, 100).expect_err("program should be rejected")
	}

	fn compile(src: &str) -> Vec<Command> {
		parse(src, 100).expect("program should compile")
	}

	#[test]
	fn calls_with_and_without_parentheses() {
		let ast = parse_ok("forward 3; turnRight()\nforward(2)");
		assert_eq!(ast.len(), 3);
		let Statement::Call(first) = &ast[0] else { panic!("expected call") };
		assert_eq!(first.name, "forward");
		assert_eq!(first.argument.as_deref(), Some("3"));
		assert_eq!(first.text, "forward 3");
		let Statement::Call(second) = &ast[1] else { panic!("expected call") };
		assert_eq!(second.argument, None);
		assert_eq!(second.location, Location { line: 1, column: 12 });
	}

	#[test]
	fn verbs_and_aliases() {
		let cmds = compile("moveForward 1 back 2 left right collect extinguish cover");
		assert_eq!(
			cmds,
			vec![
				Command::MoveForward(1),
				Command::MoveBackward(2),
				Command::TurnLeft,
				Command::TurnRight,
				Command::Collect,
				Command::Extinguish,
				Command::CoverHole,
			]
		);
	}

	#[test]
	fn repeat_block() {
		let cmds = compile("repeat 3 { forward 1; turnLeft }");
		assert_eq!(cmds, vec![Command::Repeat(3, vec![Command::MoveForward(1), Command::TurnLeft])]);
		assert_eq!(compile("repeat(2) { collect }"), vec![Command::Repeat(2, vec![Command::Collect])]);
	}

	#[test]
	fn if_else_on_fire() {
		let cmds = compile("if onFire() { extinguish } else { forward 1 }");
		assert_eq!(
			cmds,
			vec![Command::When {
				query: Query::OnFire,
				negated: false,
				then_commands: vec![Command::Extinguish],
				else_commands: vec![Command::MoveForward(1)],
			}]
		);
	}

	#[test]
	fn negated_and_parenthesised_condition() {
		let ast = parse_ok("if (!(onFire)) { forward 1 }");
		let Statement::If(stmt) = &ast[0] else { panic!("expected if") };
		assert!(stmt.condition.negated);
		assert_eq!(stmt.condition.sensor, "onFire");
		assert!(stmt.else_block.is_none());

		let ast = parse_ok("if !!onFire { forward 1 }");
		let Statement::If(stmt) = &ast[0] else { panic!("expected if") };
		assert!(!stmt.condition.negated);
	}

	#[test]
	fn else_if_nests() {
		let ast = parse_ok("if onFire { cover } else if !onFire { collect } else { left }");
		let Statement::If(stmt) = &ast[0] else { panic!("expected if") };
		let else_block = stmt.else_block.as_ref().expect("else block");
		assert!(matches!(else_block.statements.as_slice(), [Statement::If(_)]));
	}

	#[test]
	fn comments_are_ignored() {
		let src = r#"// walk to the fire
forward 5 # then put it out
/* multi-line
   comment */
extinguish"#;
		assert_eq!(compile(src), vec![Command::MoveForward(5), Command::Extinguish]);
	}

	#[test]
	fn empty_program_is_valid() {
		assert_eq!(compile(""), vec![]);
		assert_eq!(compile("  // nothing\n"), vec![]);
	}

	#[test]
	fn unknown_verb_is_unrecognized() {
		let err = parse_err("forward 1\njump 2");
		assert_eq!(
			err,
			ParseError::UnrecognizedConstruct {
				fragment: "jump 2".into(),
				line: 2,
				column: 1,
			}
		);
	}

	#[test]
	fn stray_syntax_is_unrecognized() {
		let ParseError::UnrecognizedConstruct { fragment, line, .. } = parse_err("forward 1; @launch") else {
			panic!("expected unrecognized construct");
		};
		assert_eq!(fragment, "@launch");
		assert_eq!(line, 1);
	}

	#[test]
	fn unclosed_block_points_at_end() {
		let ParseError::UnrecognizedConstruct { fragment, .. } = parse_err("repeat 2 { forward 1") else {
			panic!("expected unrecognized construct");
		};
		assert_eq!(fragment, "<end of program>");
	}

	#[test]
	fn unknown_sensor_is_unrecognized() {
		let err = parse_err("if raining { forward 1 }");
		assert!(matches!(err, ParseError::UnrecognizedConstruct { ref fragment, .. } if fragment == "raining"));
	}

	#[test]
	fn keywords_are_not_verbs() {
		assert!(matches!(parse_err("repeat"), ParseError::UnrecognizedConstruct { .. }));
		assert!(matches!(parse_err("else { collect }"), ParseError::UnrecognizedConstruct { .. }));
	}

	#[test]
	fn keywords_need_a_word_boundary() {
		assert!(matches!(parse_err("ifonFire { extinguish }"), ParseError::UnrecognizedConstruct { .. }));
		assert!(matches!(parse_err("repeat3{collect}"), ParseError::UnrecognizedConstruct { .. }));
		assert!(matches!(parse_err("if onFire { cover } elseif onFire { cover }"), ParseError::UnrecognizedConstruct { .. }));
		assert_eq!(compile("repeat(3){collect}"), vec![Command::Repeat(3, vec![Command::Collect])]);
		assert_eq!(compile("if(onFire){cover}else{collect}").len(), 1);
	}

	#[test]
	fn move_arguments_are_checked() {
		assert!(matches!(parse_err("forward"), ParseError::InvalidArgument { .. }));
		assert!(matches!(parse_err("forward()"), ParseError::InvalidArgument { .. }));
		assert!(matches!(parse_err("forward 0"), ParseError::InvalidArgument { .. }));
		assert!(matches!(parse_err("backward -2"), ParseError::InvalidArgument { .. }));
		assert!(matches!(parse_err("forward 51"), ParseError::InvalidArgument { .. }));
		assert!(matches!(parse_err("turnLeft 2"), ParseError::InvalidArgument { .. }));
		assert_eq!(compile("forward 50"), vec![Command::MoveForward(50)]);
	}

	#[test]
	fn repeat_count_is_checked() {
		assert!(matches!(parse_err("repeat 0 { collect }"), ParseError::InvalidArgument { .. }));
		let err = parse("repeat 51 { collect }", 1000).expect_err("too many repetitions");
		assert!(matches!(err, ParseError::InvalidArgument { ref fragment, .. } if fragment == "repeat 51"));
	}

	#[test]
	fn budget_counts_expanded_steps() {
		assert!(parse("forward 4; repeat 3 { turnLeft; turnRight }", 10).is_ok());
		assert_eq!(
			parse("forward 5; repeat 3 { turnLeft; turnRight }", 10),
			Err(ParseError::BudgetExceeded { required: 11, budget: 10 })
		);
		assert_eq!(
			parse("repeat 2 { repeat 3 { forward 2 } }", 10),
			Err(ParseError::BudgetExceeded { required: 12, budget: 10 })
		);
	}

	#[test]
	fn budget_charges_longest_branch() {
		assert!(parse("if onFire { forward 3 } else { left }; forward 7", 10).is_ok());
		assert!(matches!(parse("if onFire { forward 4 } else { left }; forward 7", 10), Err(ParseError::BudgetExceeded { .. })));
	}

	#[test]
	fn oversized_move_reports_budget_first() {
		assert_eq!(
			parse("forward 3; turnRight; forward 100", 10),
			Err(ParseError::BudgetExceeded { required: 104, budget: 10 })
		);
	}

	#[test]
	fn zero_cost_blocks_are_dropped() {
		let src = "repeat 50 { repeat 50 { repeat 50 { } } } if onFire { } collect";
		assert_eq!(compile(src), vec![Command::Collect]);
	}

	#[test]
	fn every_program_within_budget_parses() {
		let budget = 10;
		for forward in 1..=10u32 {
			for reps in 1..=5u32 {
				let src = format!("forward {forward}\nrepeat {reps} {{ turnLeft }}");
				let cost = forward + reps;
				match parse(&src, budget) {
					Ok(cmds) => {
						assert!(cost <= budget, "{src:?} should be over budget");
						assert_eq!(ast::sequence_cost(&cmds), cost);
					},
					Err(ParseError::BudgetExceeded { required, .. }) => {
						assert!(cost > budget, "{src:?} should fit the budget");
						assert!(required > budget && required <= cost);
					},
					Err(other) => panic!("unexpected error for {src:?}: {other}"),
				}
			}
		}
	}

	#[test]
	fn error_messages_quote_the_fragment() {
		let msg = parse_err("forward 1\nfly").to_string();
		assert_eq!(msg, "line 2, column 1: I don't understand `fly`");
		let msg = parse_err("forward 0").to_string();
		assert!(msg.starts_with("line 1: `forward 0`"), "{msg}");
	}
}
