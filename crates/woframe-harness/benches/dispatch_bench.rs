//! Benchmarks for full request dispatch against the guestbook fixture.
//!
//! Run with: cargo bench -p woframe-harness --bench dispatch_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use woframe_core::SESSION_ID_KEY;
use woframe_harness::{ComponentActionUrl, TestApp, fixtures, form_actions, unescape_html};

/// A guestbook app with one session holding `entries` entries. Returns the
/// app and the session ID.
fn app_with_entries(entries: usize) -> (TestApp, String) {
    let app = TestApp::builder()
        .component(fixtures::guestbook().expect("guestbook"))
        .build();
    let first = unescape_html(
        &app.post_form("/wa", &[(":action", "submit"), ("title", "entry 0")])
            .content_string(),
    );
    let sid = ComponentActionUrl::parse(&form_actions(&first)[0], "wo")
        .expect("url")
        .session_id;
    for i in 1..entries {
        let title = format!("entry {i}");
        app.post_form(
            &format!("/wa?{SESSION_ID_KEY}={sid}"),
            &[(":action", "submit"), ("title", title.as_str())],
        );
    }
    (app, sid)
}

fn bench_direct_action_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/direct_action");
    for entries in [1, 10, 100] {
        let (app, sid) = app_with_entries(entries);
        let uri = format!("/wa/default?{SESSION_ID_KEY}={sid}");
        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::new("render", entries), &uri, |b, uri| {
            b.iter(|| black_box(app.get(uri)));
        });
    }
    group.finish();
}

fn bench_component_action(c: &mut Criterion) {
    let (app, sid) = app_with_entries(10);
    let page = unescape_html(&app.get(&format!("/wa/default?{SESSION_ID_KEY}={sid}")).content_string());
    let url = ComponentActionUrl::parse(&form_actions(&page)[0], "wo").expect("url");
    let refresh = format!("/wo/{}/{}", url.session_id, url.context_id);
    c.bench_function("dispatch/component_refresh", |b| {
        b.iter(|| black_box(app.get(&refresh)));
    });
}

criterion_group!(benches, bench_direct_action_render, bench_component_action);
criterion_main!(benches);
