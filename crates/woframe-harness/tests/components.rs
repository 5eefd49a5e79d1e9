//! Nested components and wrapped content through the request pipeline.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tracing::Level;
use woframe_core::{constant, key_path, status, KeyValueCoding, Value};
use woframe_elements::{
    ChildComponentReference, ComponentContent, Compound, Conditional, DynamicString, Hyperlink, Repetition,
};
use woframe_harness::fixtures::{bindings, markup};
use woframe_harness::{hrefs, unescape_html, ComponentActionUrl, LogCapture, TestApp};
use woframe_runtime::component::Bindings;
use woframe_runtime::{ActionResult, ComponentDefinition, ElementRef};

fn show(path: &str, when_empty: &str) -> ElementRef {
    Arc::new(
        DynamicString::new(bindings(&[("value", key_path(path)), ("valueWhenEmpty", constant(when_empty))]))
            .expect("string"),
    )
}

/// `Shell` wraps a click counter in a `Frame`; the counter and its link
/// belong to `Shell`, the title to `Frame`.
fn shell_app(max_depth: Option<usize>) -> TestApp {
    let content = Arc::new(Compound::new(vec![
        show("clicks", "0"),
        Arc::new(
            Hyperlink::new(bindings(&[("action", key_path("bump")), ("string", constant("bump"))]), None)
                .expect("link"),
        ),
    ]));
    let shell = Compound::new(vec![
        markup("<main>"),
        Arc::new(ChildComponentReference::new("frame", Some(content))),
        markup("</main>"),
    ]);
    let frame = Compound::new(vec![
        markup("<div>"),
        show("title", ""),
        Arc::new(ComponentContent::new()),
        Arc::new(ChildComponentReference::new("badge", None)),
        markup("</div>"),
    ]);
    let badge = Compound::new(vec![markup("<b>"), show("label", ""), markup("</b>")]);

    TestApp::builder()
        .configure(|c| {
            if let Some(depth) = max_depth {
                c.max_component_stack_depth = depth;
            }
        })
        .component(
            ComponentDefinition::new("Shell", Arc::new(shell))
                .with_child("frame", "Frame", bindings(&[("title", key_path("heading"))]))
                .with_action("default", |page, _ctx| {
                    page.take_value_for_key(Value::from("Inbox"), "heading")?;
                    Ok(ActionResult::None)
                })
                .with_action("bump", |page, _ctx| {
                    let clicks = page.value_for_key("clicks").int_value();
                    page.take_value_for_key(Value::Int(clicks + 1), "clicks")?;
                    Ok(ActionResult::None)
                }),
        )
        .component(
            ComponentDefinition::new("Frame", Arc::new(frame))
                .with_child("badge", "Badge", bindings(&[("label", key_path("title"))])),
        )
        .component(ComponentDefinition::new("Badge", Arc::new(badge)))
        .build()
}

#[test]
fn wrapped_content_renders_and_acts_in_the_caller() {
    let app = shell_app(None);
    let mut client = app.client();
    let first = unescape_html(&client.get("/wa/Shell/default").content_string());
    let link = hrefs(&first).remove(0);
    assert_eq!(
        ComponentActionUrl::parse(&link, "wo").expect("url").element_id.as_deref(),
        Some("1.2.1")
    );
    assert!(first.starts_with("<main><div>Inbox0<a href="), "{first}");
    // the badge pulls its label through two levels of bindings
    assert!(first.ends_with("</a><b>Inbox</b></div></main>"), "{first}");

    let clicked = client.get(&link);
    assert_eq!(clicked.status(), status::OK);
    let page = unescape_html(&clicked.content_string());
    assert!(page.starts_with("<main><div>Inbox1<a href="), "{page}");
}

#[test]
fn element_ids_are_stable_across_renders() {
    let app = shell_app(None);
    let mut client = app.client();
    let first = hrefs(&unescape_html(&client.get("/wa/Shell/default").content_string())).remove(0);
    let second = hrefs(&unescape_html(&client.get(&first).content_string())).remove(0);

    let (a, b) = (
        ComponentActionUrl::parse(&first, "wo").expect("first"),
        ComponentActionUrl::parse(&second, "wo").expect("second"),
    );
    assert_ne!(a.context_id, b.context_id);
    assert_eq!(a.element_id, b.element_id);
}

/// Each byte adds a link (`% 4 == 0`) or wraps the children so far in a
/// shown conditional, a hidden conditional, or a repetition of 1..=3 passes.
fn nested_tree(shape: &[u8]) -> ElementRef {
    let mut children: Vec<ElementRef> = Vec::new();
    for b in shape {
        if b % 4 == 0 {
            children.push(Arc::new(
                Hyperlink::new(bindings(&[("action", key_path("noop")), ("string", constant("go"))]), None)
                    .expect("link"),
            ));
            continue;
        }
        let wrapped: ElementRef = Arc::new(Compound::new(std::mem::take(&mut children)));
        let element: ElementRef = match b % 4 {
            1 => Arc::new(Conditional::new(bindings(&[("condition", constant(true))]), wrapped).expect("if")),
            2 => Arc::new(Conditional::new(bindings(&[("condition", constant(false))]), wrapped).expect("if")),
            _ => {
                let passes = i64::from(b / 4 % 3) + 1;
                Arc::new(Repetition::new(bindings(&[("count", constant(passes))]), wrapped).expect("repetition"))
            }
        };
        children.push(element);
    }
    Arc::new(Compound::new(children))
}

fn link_element_ids(markup: &str) -> Vec<String> {
    hrefs(&unescape_html(markup))
        .iter()
        .filter_map(|href| ComponentActionUrl::parse(href, "wo")?.element_id)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn nested_trees_render_the_same_element_ids(shape in proptest::collection::vec(any::<u8>(), 0..16)) {
        let app = TestApp::builder()
            .component(
                ComponentDefinition::new("Tree", nested_tree(&shape))
                    .with_action("default", |_page, _ctx| Ok(ActionResult::None))
                    .with_action("noop", |_page, _ctx| Ok(ActionResult::None)),
            )
            .build();
        let mut client = app.client();
        let first = link_element_ids(&client.get("/wa/Tree/default").content_string());
        let second = link_element_ids(&client.get("/wa/Tree/default").content_string());

        prop_assert_eq!(&first, &second);
        let mut unique = first.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), first.len());
    }
}

#[test]
fn stack_depth_is_bounded() {
    let app = shell_app(Some(2));
    let response = app.get("/wa/Shell/default");
    assert_eq!(response.status(), status::INTERNAL_ERROR);
    assert_eq!(
        response.content_string(),
        "fail: component stack overflow: depth 3 exceeds maximum 2"
    );
}

#[test]
fn missing_children_are_marked_and_logged() {
    let app = TestApp::builder()
        .component(
            ComponentDefinition::new(
                "Main",
                Arc::new(Compound::new(vec![Arc::new(ChildComponentReference::new("side", None))])),
            )
            .with_child("side", "Sidebar", Bindings::new())
            .with_action("default", |_page, _ctx| Ok(ActionResult::None)),
        )
        .build();
    let capture = LogCapture::new();
    let response = capture.in_scope(|| app.get("/wa"));

    assert_eq!(response.status(), status::OK);
    assert_eq!(response.content_string(), "<pre>[missing component: side]</pre>");
    let warnings: Vec<_> = capture
        .with_target("woframe::elements")
        .into_iter()
        .filter(|e| e.level == Level::WARN)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "missing child component");
    assert_eq!(warnings[0].field("child"), Some("side"));
}
