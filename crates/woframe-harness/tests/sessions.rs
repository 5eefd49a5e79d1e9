//! Session creation, checkout serialization and restoration failures.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serial_test::serial;
use tracing::Level;
use woframe_core::{status, KeyValueCoding, Value, SESSION_ID_KEY};
use woframe_harness::fixtures::markup;
use woframe_harness::{LogCapture, TestApp, TestAppBuilder};
use woframe_runtime::{ActionResult, ComponentDefinition, SessionStore};

fn desk() -> ComponentDefinition {
    ComponentDefinition::new("Desk", markup("<p>desk</p>"))
        .with_action("start", |_page, ctx| Ok(ActionResult::Text(ctx.session()?.session_id())))
        .with_action("hit", |_page, ctx| {
            let session = ctx.session()?;
            let hits = session.value_for_key("hits").int_value();
            thread::sleep(Duration::from_millis(20));
            session.take_value_for_key(Value::Int(hits + 1), "hits")?;
            Ok(ActionResult::Text((hits + 1).to_string()))
        })
        .with_action("peek", |_page, ctx| {
            let hits = ctx.existing_session().map_or(0, |s| s.value_for_key("hits").int_value());
            Ok(ActionResult::Text(hits.to_string()))
        })
        .with_action("nap", |_page, _ctx| {
            thread::sleep(Duration::from_millis(300));
            Ok(ActionResult::Text("rested".to_owned()))
        })
}

fn builder() -> TestAppBuilder {
    TestApp::builder().component(desk())
}

fn start(app: &TestApp) -> String {
    app.get("/wa/Desk/start").content_string().into_owned()
}

#[test]
#[serial]
fn concurrent_requests_for_one_session_run_one_at_a_time() {
    let app = builder().build();
    let sid = start(&app);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let app = app.clone();
            let uri = format!("/wa/Desk/hit?{SESSION_ID_KEY}={sid}");
            thread::spawn(move || app.get(&uri))
        })
        .collect();
    let mut seen: Vec<String> = workers
        .into_iter()
        .map(|w| w.join().expect("worker").content_string().into_owned())
        .collect();
    seen.sort();

    // every read-modify-write saw the previous one's result
    assert_eq!(seen, vec!["1", "2", "3", "4"]);
    assert_eq!(app.get(&format!("/wa/Desk/peek?{SESSION_ID_KEY}={sid}")).content_string(), "4");
    assert!(!app.session_store().ledger().is_checked_out(&sid));
}

#[test]
#[serial]
fn checkout_gives_up_after_the_configured_timeout() {
    let app = builder().configure(|c| c.session_checkout_timeout_ms = 50).build();
    let sid = start(&app);

    let sleeper = {
        let app = app.clone();
        let uri = format!("/wa/Desk/nap?{SESSION_ID_KEY}={sid}");
        thread::spawn(move || app.get(&uri))
    };
    thread::sleep(Duration::from_millis(60));
    let blocked = app.get(&format!("/wa/Desk/peek?{SESSION_ID_KEY}={sid}"));
    assert_eq!(blocked.status(), status::OK);
    assert!(blocked.content_string().starts_with("sn fail: timed out"), "{}", blocked.content_string());

    assert_eq!(sleeper.join().expect("sleeper").content_string(), "rested");
    // the session is usable again once the first request checked it in
    assert_eq!(app.get(&format!("/wa/Desk/peek?{SESSION_ID_KEY}={sid}")).content_string(), "0");
}

#[test]
fn autocreated_sessions_are_stored() {
    let app = builder().configure(|c| c.autocreate_session = true).build();
    assert_eq!(app.session_store().session_count(), 0);
    assert_eq!(app.get("/wa/Desk/peek").content_string(), "0");
    assert_eq!(app.session_store().session_count(), 1);
}

#[test]
fn refusing_new_sessions() {
    let app = builder()
        .configure(|c| {
            c.autocreate_session = true;
            c.refuses_new_sessions = true;
        })
        .build();
    let response = app.get("/wa/Desk/peek");
    assert!(response.content_string().starts_with("sn fail"), "{}", response.content_string());
    assert_eq!(app.session_store().session_count(), 0);

    // without autocreation the refusal surfaces where an action asks for one
    let app = builder().configure(|c| c.refuses_new_sessions = true).build();
    let failed = app.get("/wa/Desk/start");
    assert_eq!(failed.status(), status::INTERNAL_ERROR);
    assert!(failed.content_string().contains("refuses new sessions"));
}

#[test]
fn sessions_without_ids_never_touch_the_store() {
    let app = builder().build();
    assert_eq!(app.get("/wa/Desk/peek").content_string(), "0");
    assert_eq!(app.session_store().session_count(), 0);
}

#[test]
fn rejected_candidates_are_logged() {
    let app = builder().build();
    let capture = LogCapture::new();
    let response = capture.in_scope(|| app.get(&format!("/wa/Desk/peek?{SESSION_ID_KEY}=ghost")));

    assert!(response.content_string().starts_with("sn fail"));
    let rejected: Vec<_> = capture
        .with_target("woframe::app")
        .into_iter()
        .filter(|e| e.message == "session candidate rejected")
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].level, Level::DEBUG);
    assert_eq!(rejected[0].field("session"), Some("ghost"));
}

#[test]
fn store_checkout_is_exclusive() {
    let app = builder().configure(|c| c.session_checkout_timeout_ms = 30).build();
    let sid = start(&app);
    let store: &Arc<_> = app.session_store();

    let session = store.check_out_session_for_id(&sid).expect("first checkout");
    assert!(store.check_out_session_for_id(&sid).is_err());
    let response = app.get(&format!("/wa/Desk/peek?{SESSION_ID_KEY}={sid}"));
    assert!(response.content_string().starts_with("sn fail"));

    store.release_session_id(&session.session_id());
    assert_eq!(app.get(&format!("/wa/Desk/peek?{SESSION_ID_KEY}={sid}")).content_string(), "0");
}
