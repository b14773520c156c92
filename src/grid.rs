//! Discrete grid the actor walks on: walls, hazards and the mapping between
//! cells and scene coordinates.

use std::{collections::HashSet, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GRID_SIZE: i32 = 10;
pub const DEFAULT_CELL_SIZE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoordinate {
	pub x: i32,
	pub z: i32,
}

impl GridCoordinate {
	pub const fn new(x: i32, z: i32) -> Self {
		Self { x, z }
	}

	pub fn offset(self, (dx, dz): (i32, i32)) -> Self {
		Self::new(self.x + dx, self.z + dz)
	}
}

impl fmt::Display for GridCoordinate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {})", self.x, self.z)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPosition {
	pub x: f32,
	pub y: f32,
	pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
	North,
	East,
	South,
	West,
}

impl Facing {
	/// Unit step in grid space. +x is east, +z is south.
	pub fn offset(self) -> (i32, i32) {
		match self {
			Facing::North => (0, -1),
			Facing::East => (1, 0),
			Facing::South => (0, 1),
			Facing::West => (-1, 0),
		}
	}

	pub fn left(self) -> Self {
		match self {
			Facing::North => Facing::West,
			Facing::West => Facing::South,
			Facing::South => Facing::East,
			Facing::East => Facing::North,
		}
	}

	pub fn right(self) -> Self {
		match self {
			Facing::North => Facing::East,
			Facing::East => Facing::South,
			Facing::South => Facing::West,
			Facing::West => Facing::North,
		}
	}

	pub fn opposite(self) -> Self {
		self.left().left()
	}

	/// Rotation about the vertical axis for a model whose rest pose looks down +z.
	pub fn yaw_degrees(self) -> f32 {
		match self {
			Facing::South => 0.0,
			Facing::East => 90.0,
			Facing::North => 180.0,
			Facing::West => 270.0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardKind {
	/// Burning hole; put out with `extinguish` or `cover`.
	Fire,
	/// Open hole; only `cover` deals with it.
	Hole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardState {
	pub active: bool,
	pub kind: HazardKind,
}

#[derive(Debug, Clone, Copy)]
struct Hazard {
	initial: HazardState,
	current: HazardState,
}

#[derive(Debug, Clone)]
pub struct GridMap {
	size: i32,
	cell_size: f32,
	obstacles: HashSet<GridCoordinate>,
	hazards: IndexMap<GridCoordinate, Hazard>,
}

impl Default for GridMap {
	fn default() -> Self {
		Self::new(DEFAULT_GRID_SIZE, DEFAULT_CELL_SIZE)
	}
}

impl GridMap {
	pub fn new(size: i32, cell_size: f32) -> Self {
		assert!(size > 0, "grid size must be positive, got {size}");
		assert!(cell_size > 0.0, "cell size must be positive, got {cell_size}");
		Self {
			size,
			cell_size,
			obstacles: HashSet::new(),
			hazards: IndexMap::new(),
		}
	}

	pub fn size(&self) -> i32 {
		self.size
	}

	pub fn cell_size(&self) -> f32 {
		self.cell_size
	}

	fn origin(&self) -> f32 {
		-(self.size as f32) * self.cell_size / 2.0
	}

	pub fn contains(&self, coord: GridCoordinate) -> bool {
		(0..self.size).contains(&coord.x) && (0..self.size).contains(&coord.z)
	}

	// --------------------------------------------------
	// Cell <-> scene mapping
	// --------------------------------------------------

	/// Centre of `coord` on the ground plane.
	pub fn coord_to_world(&self, coord: GridCoordinate) -> WorldPosition {
		WorldPosition {
			x: self.axis_to_world(coord.x),
			y: 0.0,
			z: self.axis_to_world(coord.z),
		}
	}

	/// Nearest cell to `position`, or `None` when it falls outside the grid.
	pub fn world_to_coord(&self, position: WorldPosition) -> Option<GridCoordinate> {
		let coord = GridCoordinate::new(self.axis_to_coord(position.x), self.axis_to_coord(position.z));
		self.contains(coord).then_some(coord)
	}

	fn axis_to_world(&self, c: i32) -> f32 {
		self.origin() + self.cell_size * (c as f32 + 0.5)
	}

	fn axis_to_coord(&self, w: f32) -> i32 {
		((w - self.origin()) / self.cell_size - 0.5).round() as i32
	}

	// --------------------------------------------------
	// Obstacles
	// --------------------------------------------------

	/// Marks the inclusive rectangle `[x_min, x_max] × [z_min, z_max]` as wall.
	///
	/// Panics when the rectangle is inverted or leaves the grid; level data is
	/// validated before it reaches this call.
	pub fn add_obstacle(&mut self, x_min: i32, x_max: i32, z_min: i32, z_max: i32) {
		assert!(x_min <= x_max && z_min <= z_max, "inverted obstacle range x {x_min}..={x_max}, z {z_min}..={z_max}");
		let corners = [GridCoordinate::new(x_min, z_min), GridCoordinate::new(x_max, z_max)];
		assert!(
			corners.iter().all(|c| self.contains(*c)),
			"obstacle x {x_min}..={x_max}, z {z_min}..={z_max} leaves the {0}x{0} grid",
			self.size
		);
		for x in x_min..=x_max {
			for z in z_min..=z_max {
				self.obstacles.insert(GridCoordinate::new(x, z));
			}
		}
	}

	pub fn is_obstacle(&self, coord: GridCoordinate) -> bool {
		self.obstacles.contains(&coord)
	}

	/// The actor may stand on `coord`: inside the grid and not a wall.
	pub fn is_passable(&self, coord: GridCoordinate) -> bool {
		self.contains(coord) && !self.is_obstacle(coord)
	}

	pub fn obstacles(&self) -> impl Iterator<Item = GridCoordinate> + '_ {
		self.obstacles.iter().copied()
	}

	// --------------------------------------------------
	// Hazards
	// --------------------------------------------------

	/// Registers an active fire at `(x, z)`. Re-registering a cell replaces it.
	pub fn add_hazard(&mut self, x: i32, z: i32) {
		self.insert_hazard(GridCoordinate::new(x, z), HazardKind::Fire);
	}

	/// Registers an active open hole at `(x, z)`.
	pub fn add_hole(&mut self, x: i32, z: i32) {
		self.insert_hazard(GridCoordinate::new(x, z), HazardKind::Hole);
	}

	fn insert_hazard(&mut self, coord: GridCoordinate, kind: HazardKind) {
		assert!(self.contains(coord), "hazard {coord} is outside the {0}x{0} grid", self.size);
		let state = HazardState { active: true, kind };
		self.hazards.insert(coord, Hazard { initial: state, current: state });
	}

	pub fn hazard_at(&self, coord: GridCoordinate) -> Option<HazardState> {
		self.hazards.get(&coord).map(|h| h.current)
	}

	pub fn is_on_fire(&self, coord: GridCoordinate) -> bool {
		matches!(
			self.hazard_at(coord),
			Some(HazardState {
				active: true,
				kind: HazardKind::Fire
			})
		)
	}

	/// Deactivates the hazard at `coord` if it is active and `kind` is either
	/// unspecified or equal to the hazard's kind.
	pub fn deactivate_hazard(&mut self, coord: GridCoordinate, kind: Option<HazardKind>) -> bool {
		match self.hazards.get_mut(&coord) {
			Some(h) if h.current.active && kind.is_none_or(|k| k == h.current.kind) => {
				h.current.active = false;
				true
			},
			_ => false,
		}
	}

	pub fn reset_hazards(&mut self) {
		for hazard in self.hazards.values_mut() {
			hazard.current = hazard.initial;
		}
	}

	/// Hazards in registration order.
	pub fn hazards(&self) -> impl Iterator<Item = (GridCoordinate, HazardState)> + '_ {
		self.hazards.iter().map(|(c, h)| (*c, h.current))
	}
}
