//! Comprehensive tests for fos-headless
//!
//! Engine configuration, page bridging and user-input automation.

use std::cell::RefCell;
use std::rc::Rc;

use fos_headless::bindings::{HostKind, HostObject, HostValue, host_function, standard};
use fos_headless::dom::{
    Completion, DomTree, Event, EventHandler, HandlerResult, ListenerOptions, NodeId,
};
use fos_headless::{Config, Engine, Page};

type Log = Rc<RefCell<Vec<String>>>;

fn s(v: &str) -> HostValue {
    HostValue::from(v)
}

fn value(page: &mut Page, object: &Rc<HostObject>, name: &str) -> HostValue {
    page.get(object, name).unwrap().into_value()
}

/// Page with `<input name="q">` and `<button id="go">` inside a form
fn form_page(engine: &Engine) -> (Page, NodeId, NodeId) {
    let mut page = engine.new_page("https://example.test/search");
    let body = page.document().body().unwrap();
    let tree = page.document_mut().tree_mut();
    let form = tree.create_element("form");
    let input = tree.create_element("input");
    let button = tree.create_element("button");
    tree.set_attribute(input, "name", "q").unwrap();
    tree.set_attribute(button, "id", "go").unwrap();
    tree.append_child(body, form).unwrap();
    tree.append_child(form, input).unwrap();
    tree.append_child(form, button).unwrap();
    (page, input, button)
}

/// Script listener appending the event type to `log`
fn recorder(log: &Log, result: HostValue) -> HostValue {
    let log = log.clone();
    HostValue::Function(host_function(move |_, _, args| {
        log.borrow_mut().push(args[0].to_display_string());
        Ok(result.clone())
    }))
}

// ============================================================================
// ENGINE AND CONFIGURATION
// ============================================================================

#[test]
fn test_engine_from_json_enables_legacy_properties() {
    let config = Config::from_json(
        r#"{
            "profile": { "name": "legacy", "features": ["DOCUMENT_ALL", "HTMLELEMENT_INNER_TEXT"] },
            "log_filter": "fos_bindings=debug"
        }"#,
    )
    .unwrap();
    let engine = Engine::new(config).unwrap();
    assert_eq!(engine.registry().profile().name(), "legacy");

    let mut page = engine.new_page("about:blank");
    let document = page.document_object().unwrap();
    let all = value(&mut page, &document, "all");
    let all = all.as_object().unwrap().clone();
    assert_eq!(all.kind(), HostKind::HtmlCollection);
    assert_eq!(value(&mut page, &all, "length"), HostValue::Number(3.0));

    let body = value(&mut page, &document, "body");
    let body = body.as_object().unwrap().clone();
    assert!(page.get(&body, "innerText").unwrap().is_found());
}

#[test]
fn test_default_profile_hides_legacy_properties() {
    let engine = Engine::new(Config::default()).unwrap();
    let mut page = engine.new_page("about:blank");
    let document = page.document_object().unwrap();
    assert!(!page.get(&document, "all").unwrap().is_found());
    assert!(page.get(&document, "getElementById").unwrap().is_found());
}

#[test]
fn test_clone_listener_flag_reaches_profile() {
    let config = Config {
        clone_copies_listeners: true,
        ..Config::default()
    };
    let engine = Engine::new(config).unwrap();
    assert!(engine.registry().profile().has_feature(standard::CLONE_NODE_COPIES_LISTENERS));

    let (mut page, _, button) = form_page(&engine);
    let log: Log = Rc::default();
    let button = page.host_object(button).unwrap();
    page.call(&button, "addEventListener", &[s("click"), recorder(&log, HostValue::Undefined)])
        .unwrap();
    let copy = page.call(&button, "cloneNode", &[HostValue::Bool(false)]).unwrap();
    let copy = copy.as_node().unwrap();
    assert!(page.document().tree().has_event_listeners(copy));
}

// ============================================================================
// BRIDGE THROUGH THE PAGE
// ============================================================================

#[test]
fn test_page_bridge_reads_and_writes() {
    let engine = Engine::new(Config::default()).unwrap();
    let (mut page, input, _) = form_page(&engine);
    let input_obj = page.host_object(input).unwrap();
    assert_eq!(value(&mut page, &input_obj, "tagName"), s("INPUT"));

    page.set(&input_obj, "value", s("rust")).unwrap();
    assert_eq!(
        page.document().tree().get_attribute(input, "value").unwrap(),
        Some("rust")
    );

    let document = page.document_object().unwrap();
    let found = page.call(&document, "getElementById", &[s("go")]).unwrap();
    assert_eq!(found.as_node(), page.find_by_id("go").ok());
    assert!(Rc::ptr_eq(&page.host_object(input).unwrap(), &input_obj));
}

#[test]
fn test_whitespace_filter_applies_to_script_collections() {
    let build = |skip: bool| {
        let mut config = Config::default();
        config.collection_filters.skip_whitespace_text = skip;
        let engine = Engine::new(config).unwrap();
        let mut page = engine.new_page("about:blank");
        let body = page.document().body().unwrap();
        let tree = page.document_mut().tree_mut();
        let gap = tree.create_text("\n   ");
        let div = tree.create_element("div");
        tree.append_child(body, gap).unwrap();
        tree.append_child(body, div).unwrap();
        let body = page.host_object(body).unwrap();
        let children = value(&mut page, &body, "childNodes");
        let children = children.as_object().unwrap().clone();
        value(&mut page, &children, "length")
    };
    assert_eq!(build(false), HostValue::Number(2.0));
    assert_eq!(build(true), HostValue::Number(1.0));
}

#[test]
fn test_noscript_filter_on_page_collections() {
    let mut config = Config::default();
    config.collection_filters.skip_noscript_content = true;
    let engine = Engine::new(config).unwrap();
    let mut page = engine.new_page("about:blank");
    let body = page.document().body().unwrap();
    let tree = page.document_mut().tree_mut();
    let noscript = tree.create_element("noscript");
    let hidden = tree.create_element("p");
    let shown = tree.create_element("p");
    tree.append_child(body, noscript).unwrap();
    tree.append_child(noscript, hidden).unwrap();
    tree.append_child(body, shown).unwrap();

    let paragraphs = page.collection("//p").unwrap();
    assert_eq!(&*paragraphs.get(page.document().tree()).unwrap(), &[shown]);
    assert_eq!(page.find_all_by_tag("p").unwrap(), vec![shown]);
}

// ============================================================================
// AUTOMATION
// ============================================================================

#[test]
fn test_find_helpers() {
    let engine = Engine::new(Config::default()).unwrap();
    let (page, input, button) = form_page(&engine);
    assert_eq!(page.find_by_id("go").unwrap(), button);
    assert_eq!(page.find_by_name("q").unwrap(), input);
    assert_eq!(page.find_by_tag("input").unwrap(), input);
    assert_eq!(page.find_by_path("//form/button[@id='go']").unwrap(), button);
    assert_eq!(page.find_by_path("/html/body/form/*[1]").unwrap(), input);
}

#[test]
fn test_click_fires_mouse_sequence_that_bubbles() {
    let engine = Engine::new(Config::default()).unwrap();
    let (mut page, _, button) = form_page(&engine);
    let log: Log = Rc::default();
    let body = page.document().body().unwrap();
    let body = page.host_object(body).unwrap();
    let listener = recorder(&log, HostValue::Undefined);
    for event_type in ["mousedown", "mouseup", "click"] {
        page.call(&body, "addEventListener", &[s(event_type), listener.clone()]).unwrap();
    }

    assert!(page.click(button).unwrap());
    assert_eq!(*log.borrow(), vec!["mousedown", "mouseup", "click"]);
}

#[test]
fn test_click_reports_cancellation() {
    let engine = Engine::new(Config::default()).unwrap();
    let (mut page, _, button) = form_page(&engine);
    let log: Log = Rc::default();
    let button_obj = page.host_object(button).unwrap();
    page.call(&button_obj, "addEventListener", &[s("click"), recorder(&log, HostValue::Bool(false))])
        .unwrap();
    assert!(!page.click(button).unwrap());
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_focus_and_blur_stay_on_target() {
    let engine = Engine::new(Config::default()).unwrap();
    let (mut page, input, _) = form_page(&engine);
    let log: Log = Rc::default();
    let document = page.document_object().unwrap();
    let input_obj = page.host_object(input).unwrap();
    let listener = recorder(&log, HostValue::Undefined);
    for target in [&document, &input_obj] {
        page.call(target, "addEventListener", &[s("focus"), listener.clone()]).unwrap();
        page.call(target, "addEventListener", &[s("blur"), listener.clone()]).unwrap();
    }

    page.focus(input).unwrap();
    page.blur(input).unwrap();
    assert_eq!(*log.borrow(), vec!["focus", "blur"]);
}

#[test]
fn test_type_text_fires_key_sequence() {
    let engine = Engine::new(Config::default()).unwrap();
    let (mut page, input, _) = form_page(&engine);
    let log: Log = Rc::default();
    let input_obj = page.host_object(input).unwrap();
    let listener = recorder(&log, HostValue::Undefined);
    for event_type in ["keydown", "keypress", "input", "keyup"] {
        page.call(&input_obj, "addEventListener", &[s(event_type), listener.clone()]).unwrap();
    }

    assert_eq!(page.type_text(input, "hi").unwrap(), "hi");
    assert_eq!(
        *log.borrow(),
        vec!["keydown", "keypress", "input", "keyup", "keydown", "keypress", "input", "keyup"]
    );
    assert_eq!(value(&mut page, &input_obj, "value"), s("hi"));
}

#[test]
fn test_type_text_keypress_veto_drops_character() {
    let engine = Engine::new(Config::default()).unwrap();
    let (mut page, input, _) = form_page(&engine);
    let keys: Log = Rc::default();
    let veto: Rc<dyn EventHandler> = {
        let keys = keys.clone();
        Rc::new(move |_: &mut DomTree, event: &mut Event| -> HandlerResult {
            let key = event.key().unwrap_or_default().to_string();
            if key == "x" {
                event.prevent_default();
            }
            keys.borrow_mut().push(key);
            Ok(Completion::Normal)
        })
    };
    page.document_mut()
        .tree_mut()
        .add_event_listener(input, "keypress", veto, ListenerOptions::default())
        .unwrap();
    page.document_mut().tree_mut().set_attribute(input, "value", ">").unwrap();

    assert_eq!(page.type_text(input, "axb").unwrap(), ">ab");
    assert_eq!(*keys.borrow(), vec!["a", "x", "b"]);
}
