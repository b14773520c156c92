#![cfg(target_arch = "wasm32")]

use gridbot::WebSession;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn ticking_moves_the_actor() {
	let session = WebSession::new();
	assert_eq!(session.actor_x(), -9.0);
	session.start_run("forward 2").expect("valid program");
	assert!(session.is_running());
	assert!(session.tick());
	assert!(session.tick());
	assert!(!session.tick());
	assert_eq!(session.actor_x(), -5.0);
	assert!(session.hazard_visible(5, 5));
}

#[wasm_bindgen_test]
async fn play_resolves_with_the_win() {
	let session = WebSession::new();
	session.start_run("forward 9 collect").expect("valid program");
	let won = JsFuture::from(session.play(0)).await.expect("play should resolve");
	assert_eq!(won.as_bool(), Some(true));
	assert!(!session.objective_visible());
	assert_eq!(session.console_text(), "Crystal collected.\nLevel complete!");
}

async fn wait(ms: i32) {
	let promise = js_sys::Promise::new(&mut |resolve, _reject| {
		web_sys::window()
			.expect("browser window")
			.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
			.expect("timer scheduled");
	});
	JsFuture::from(promise).await.expect("timer fired");
}

#[wasm_bindgen_test]
async fn replaced_run_is_not_driven_by_the_old_play() {
	let session = WebSession::new();
	session.start_run("forward 9 collect").expect("valid program");
	let first = session.play(50);
	wait(10).await;
	assert_eq!(session.actor_x(), -7.0);

	assert!(session.cancel_run());
	session.start_run("forward 9 collect").expect("valid program");
	// The first loop wakes up in here and must leave the new run alone.
	wait(60).await;
	let first = JsFuture::from(first).await.expect("first play resolves");
	assert_eq!(first, JsValue::FALSE);
	assert_eq!(session.actor_x(), -9.0);
	assert!(session.is_running());

	let second = JsFuture::from(session.play(0)).await.expect("second play resolves");
	assert_eq!(second, JsValue::TRUE);
	assert!(session.is_won());
}

#[wasm_bindgen_test]
fn rejected_program_throws_and_reports() {
	let session = WebSession::new();
	assert!(session.start_run("jump").is_err());
	assert!(session.console_text().starts_with("Program rejected:"));
	session.clear_output();
	assert_eq!(session.console_text(), "");
}
