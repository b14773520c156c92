use anyhow::{Context, Result, bail};
use gridbot::{Level, LevelSession, Pacer, RunOutcome, StepEvent, init_logging};
use log::info;
use std::{env, fs, future::Future};

/// Prints every step as it happens.
struct TracePacer {
	steps: u32,
}

impl Pacer for TracePacer {
	fn pace(&mut self, event: &StepEvent) -> impl Future<Output = ()> {
		self.steps += 1;
		println!("{:3}: {}", self.steps, describe(event));
		std::future::ready(())
	}
}

fn describe(event: &StepEvent) -> String {
	match event {
		StepEvent::Moved { to, on_fire: true, .. } => format!("moved to {to} (on fire!)"),
		StepEvent::Moved { to, .. } => format!("moved to {to}"),
		StepEvent::Bumped { wall, .. } => format!("bumped into {wall}"),
		StepEvent::Turned { facing } => format!("now facing {facing:?}"),
		StepEvent::Collected { at } => format!("collected the crystal at {at}"),
		StepEvent::CollectMissed { at } => format!("nothing to collect at {at}"),
		StepEvent::Extinguished { at } => format!("put out the fire at {at}"),
		StepEvent::NothingToExtinguish { at } => format!("no fire to put out at {at}"),
		StepEvent::Covered { at } => format!("covered the hole at {at}"),
		StepEvent::NothingToCover { at } => format!("nothing to cover at {at}"),
	}
}

fn main() -> Result<()> {
	init_logging(log::LevelFilter::Info);

	let mut args = env::args().skip(1);
	let program_path = args.next().context("Usage: gridbot <program> [level.toml]")?;
	let source = fs::read_to_string(&program_path).with_context(|| format!("reading {program_path}"))?;

	let level = match args.next() {
		Some(path) => {
			let src = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
			Level::from_toml(&src).with_context(|| format!("loading level {path}"))?
		},
		None => Level::phase_one(),
	};
	info!("playing \"{}\" with a budget of {}", level.name(), level.instruction_budget());

	let mut session = LevelSession::new(level);
	let started = session.start_run(&source);
	for line in session.console() {
		println!("{line}");
	}
	started?;
	session.clear_output();

	let outcome = futures::executor::block_on(session.run_paced(&mut TracePacer { steps: 0 }));
	for line in session.console() {
		println!("{line}");
	}

	match outcome {
		Some(RunOutcome::Completed) if session.is_won() => println!("Won!"),
		Some(RunOutcome::Completed) => println!("Program finished without completing the level."),
		Some(RunOutcome::Cancelled) => println!("Cancelled."),
		Some(RunOutcome::Failed(fault)) => bail!("run failed: {fault}"),
		None => bail!("program never started"),
	}
	Ok(())
}
