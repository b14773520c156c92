//! Level description (loadable from TOML) and the mutable state a run acts on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{DEFAULT_CELL_SIZE, DEFAULT_GRID_SIZE, Facing, GridCoordinate, GridMap, HazardKind};

/// Height of the actor's origin above the ground plane, for renderers.
pub const ACTOR_HEIGHT: f32 = 1.0;

pub const PHASE_ONE_BUDGET: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
	pub name: String,
	#[serde(default = "default_grid_size")]
	pub grid_size: i32,
	pub instruction_budget: u32,
	pub actor: ActorSpawn,
	pub objective: GridCoordinate,
	#[serde(default)]
	pub obstacles: Vec<ObstacleRect>,
	#[serde(default)]
	pub hazards: Vec<HazardSpec>,
}

fn default_grid_size() -> i32 {
	DEFAULT_GRID_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorSpawn {
	pub x: i32,
	pub z: i32,
	pub facing: Facing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleRect {
	pub x_min: i32,
	pub x_max: i32,
	pub z_min: i32,
	pub z_max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardSpec {
	pub x: i32,
	pub z: i32,
	#[serde(default = "default_hazard_kind")]
	pub kind: HazardKind,
}

fn default_hazard_kind() -> HazardKind {
	HazardKind::Fire
}

#[derive(Debug, Error)]
pub enum LevelError {
	#[error("invalid level file: {0}")]
	Toml(#[from] toml::de::Error),
	#[error("grid size must be positive, got {0}")]
	GridSize(i32),
	#[error("instruction budget must be at least 1")]
	ZeroBudget,
	#[error("{what} at {at} is outside the {size}x{size} grid")]
	OutOfGrid { what: &'static str, at: GridCoordinate, size: i32 },
	#[error("obstacle x {0}..={1}, z {2}..={3} is inverted")]
	InvertedObstacle(i32, i32, i32, i32),
	#[error("{what} at {at} is inside a wall")]
	Walled { what: &'static str, at: GridCoordinate },
}

/// A validated level. Building a [`LevelState`] from it cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
	config: LevelConfig,
}

impl Level {
	pub fn new(config: LevelConfig) -> Result<Self, LevelError> {
		validate(&config)?;
		Ok(Self { config })
	}

	pub fn from_toml(src: &str) -> Result<Self, LevelError> {
		Self::new(toml::from_str(src)?)
	}

	/// Corridor between two walls with a fire halfway and the crystal at the far end.
	pub fn phase_one() -> Self {
		let wall = |z| ObstacleRect {
			x_min: 0,
			x_max: 9,
			z_min: z,
			z_max: z,
		};
		Self {
			config: LevelConfig {
				name: "Corridor of fire".into(),
				grid_size: DEFAULT_GRID_SIZE,
				instruction_budget: PHASE_ONE_BUDGET,
				actor: ActorSpawn {
					x: 0,
					z: 5,
					facing: Facing::East,
				},
				objective: GridCoordinate::new(9, 5),
				obstacles: vec![wall(4), wall(6)],
				hazards: vec![HazardSpec {
					x: 5,
					z: 5,
					kind: HazardKind::Fire,
				}],
			},
		}
	}

	pub fn config(&self) -> &LevelConfig {
		&self.config
	}

	pub fn name(&self) -> &str {
		&self.config.name
	}

	pub fn instruction_budget(&self) -> u32 {
		self.config.instruction_budget
	}

	pub fn build_state(&self) -> LevelState {
		let cfg = &self.config;
		let mut grid = GridMap::new(cfg.grid_size, DEFAULT_CELL_SIZE);
		for o in &cfg.obstacles {
			grid.add_obstacle(o.x_min, o.x_max, o.z_min, o.z_max);
		}
		for h in &cfg.hazards {
			match h.kind {
				HazardKind::Fire => grid.add_hazard(h.x, h.z),
				HazardKind::Hole => grid.add_hole(h.x, h.z),
			}
		}
		let spawn = ActorState {
			position: GridCoordinate::new(cfg.actor.x, cfg.actor.z),
			facing: cfg.actor.facing,
		};
		LevelState {
			grid,
			actor: spawn,
			objective: ObjectiveState {
				position: cfg.objective,
				collected: false,
			},
			spawn,
		}
	}
}

fn validate(cfg: &LevelConfig) -> Result<(), LevelError> {
	if cfg.grid_size <= 0 {
		return Err(LevelError::GridSize(cfg.grid_size));
	}
	if cfg.instruction_budget == 0 {
		return Err(LevelError::ZeroBudget);
	}
	let size = cfg.grid_size;
	let inside = |what, at: GridCoordinate| {
		if (0..size).contains(&at.x) && (0..size).contains(&at.z) {
			Ok(())
		} else {
			Err(LevelError::OutOfGrid { what, at, size })
		}
	};

	for o in &cfg.obstacles {
		if o.x_min > o.x_max || o.z_min > o.z_max {
			return Err(LevelError::InvertedObstacle(o.x_min, o.x_max, o.z_min, o.z_max));
		}
		inside("obstacle corner", GridCoordinate::new(o.x_min, o.z_min))?;
		inside("obstacle corner", GridCoordinate::new(o.x_max, o.z_max))?;
	}
	for h in &cfg.hazards {
		inside("hazard", GridCoordinate::new(h.x, h.z))?;
	}

	let walled = |at: GridCoordinate| cfg.obstacles.iter().any(|o| (o.x_min..=o.x_max).contains(&at.x) && (o.z_min..=o.z_max).contains(&at.z));
	let actor = GridCoordinate::new(cfg.actor.x, cfg.actor.z);
	inside("actor", actor)?;
	inside("objective", cfg.objective)?;
	if walled(actor) {
		return Err(LevelError::Walled { what: "actor", at: actor });
	}
	if walled(cfg.objective) {
		return Err(LevelError::Walled {
			what: "objective",
			at: cfg.objective,
		});
	}
	Ok(())
}

// ---------------------------------------------------------------------------
// Mutable state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorState {
	pub position: GridCoordinate,
	pub facing: Facing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectiveState {
	pub position: GridCoordinate,
	pub collected: bool,
}

impl ObjectiveState {
	pub fn visible(&self) -> bool {
		!self.collected
	}
}

#[derive(Debug, Clone)]
pub struct LevelState {
	pub grid: GridMap,
	pub actor: ActorState,
	pub objective: ObjectiveState,
	spawn: ActorState,
}

impl LevelState {
	/// Actor back to spawn, hazards re-armed, objective uncollected.
	pub fn reset(&mut self) {
		self.actor = self.spawn;
		self.objective.collected = false;
		self.grid.reset_hazards();
	}

	pub fn spawn(&self) -> ActorState {
		self.spawn
	}

	pub fn is_on_fire(&self) -> bool {
		self.grid.is_on_fire(self.actor.position)
	}

	pub fn actor_on_objective(&self) -> bool {
		self.actor.position == self.objective.position
	}

	pub fn win_condition(&self) -> bool {
		self.actor_on_objective() && self.objective.collected
	}
}
