//! Browser bindings. JavaScript owns the render loop; it drives a
//! [`WebSession`] and reads back positions each frame.

use std::{cell::RefCell, rc::Rc};

use log::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};

use crate::{
	GridCoordinate, init_logging,
	level::Level,
	session::{LevelSession, SceneSnapshot},
	set_panic_hook,
};

#[wasm_bindgen]
pub fn start() {
	set_panic_hook();
	init_logging(log::LevelFilter::Info);
	info!("gridbot {} loaded", env!("CARGO_PKG_VERSION"));
}

fn window() -> Result<web_sys::Window, JsValue> {
	web_sys::window().ok_or_else(|| JsValue::from_str("no global `window` exists"))
}

async fn sleep(ms: u32) -> Result<(), JsValue> {
	let window = window()?;
	let timeout = i32::try_from(ms).unwrap_or(i32::MAX);
	let mut scheduled = Ok(0);
	let promise = js_sys::Promise::new(&mut |resolve, _reject| {
		scheduled = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, timeout);
	});
	scheduled?;
	JsFuture::from(promise).await?;
	Ok(())
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
	JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct WebSession {
	inner: Rc<RefCell<LevelSession>>,
}

impl WebSession {
	fn wrap(level: Level) -> Self {
		Self {
			inner: Rc::new(RefCell::new(LevelSession::new(level))),
		}
	}

	fn snapshot(&self) -> SceneSnapshot {
		self.inner.borrow().snapshot()
	}
}

#[wasm_bindgen]
impl WebSession {
	/// Session on the built-in first level.
	#[wasm_bindgen(constructor)]
	pub fn new() -> WebSession {
		Self::wrap(Level::phase_one())
	}

	#[wasm_bindgen(js_name = fromToml)]
	pub fn from_toml(src: &str) -> Result<WebSession, JsValue> {
		Level::from_toml(src).map(Self::wrap).map_err(to_js)
	}

	/// Rejected programs throw with the message already written to the console.
	#[wasm_bindgen(js_name = startRun)]
	pub fn start_run(&self, source: &str) -> Result<(), JsValue> {
		self.inner.borrow_mut().start_run(source).map_err(to_js)
	}

	/// One step. `false` once the run is over.
	pub fn tick(&self) -> bool {
		self.inner.borrow_mut().tick().is_some()
	}

	/// Runs the active program with `step_ms` between steps. Resolves to
	/// whether that run won the level. The session stays usable while playing:
	/// `cancelRun` stops the loop at its next step and resolves it with `false`,
	/// even if another run has been started in the meantime.
	pub fn play(&self, step_ms: u32) -> js_sys::Promise {
		let inner = Rc::clone(&self.inner);
		let token = self.inner.borrow().cancel_token();
		future_to_promise(async move {
			let Some(token) = token else {
				return Ok(JsValue::FALSE);
			};
			while inner.borrow_mut().tick_run(&token).is_some() {
				sleep(step_ms).await?;
			}
			let won = !token.is_cancelled() && inner.borrow().is_won();
			Ok(JsValue::from_bool(won))
		})
	}

	#[wasm_bindgen(js_name = cancelRun)]
	pub fn cancel_run(&self) -> bool {
		self.inner.borrow_mut().cancel_run()
	}

	#[wasm_bindgen(js_name = resetLevel)]
	pub fn reset_level(&self) -> Result<(), JsValue> {
		self.inner.borrow_mut().reset_level().map_err(to_js)
	}

	#[wasm_bindgen(js_name = clearOutput)]
	pub fn clear_output(&self) {
		self.inner.borrow_mut().clear_output();
	}

	#[wasm_bindgen(js_name = consoleText)]
	pub fn console_text(&self) -> String {
		self.inner.borrow().console().join("\n")
	}

	#[wasm_bindgen(js_name = isRunning)]
	pub fn is_running(&self) -> bool {
		self.inner.borrow().is_running()
	}

	#[wasm_bindgen(js_name = isWon)]
	pub fn is_won(&self) -> bool {
		self.inner.borrow().is_won()
	}

	#[wasm_bindgen(js_name = isOnFire)]
	pub fn is_on_fire(&self) -> bool {
		self.inner.borrow().is_on_fire()
	}

	#[wasm_bindgen(js_name = actorX)]
	pub fn actor_x(&self) -> f32 {
		self.snapshot().actor.x
	}

	#[wasm_bindgen(js_name = actorY)]
	pub fn actor_y(&self) -> f32 {
		self.snapshot().actor.y
	}

	#[wasm_bindgen(js_name = actorZ)]
	pub fn actor_z(&self) -> f32 {
		self.snapshot().actor.z
	}

	#[wasm_bindgen(js_name = actorYaw)]
	pub fn actor_yaw(&self) -> f32 {
		self.snapshot().actor_yaw_degrees
	}

	#[wasm_bindgen(js_name = objectiveVisible)]
	pub fn objective_visible(&self) -> bool {
		self.snapshot().objective_visible
	}

	/// Whether the hazard at grid cell (`x`, `z`) should still be drawn.
	#[wasm_bindgen(js_name = hazardVisible)]
	pub fn hazard_visible(&self, x: i32, z: i32) -> bool {
		let at = GridCoordinate::new(x, z);
		self.inner.borrow().level_state().grid.hazard_at(at).is_some_and(|h| h.active)
	}
}

impl Default for WebSession {
	fn default() -> Self {
		Self::new()
	}
}
