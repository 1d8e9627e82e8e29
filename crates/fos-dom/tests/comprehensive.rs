//! Comprehensive tests for fos-dom
//!
//! Tree structure, mutation notification, live collections and event
//! propagation working together.

use std::cell::RefCell;
use std::rc::Rc;

use fos_dom::{
    ClonePolicy, CollectionOptions, Completion, Document, DomError, DomTree, Event, EventDispatcher,
    EventHandler, HandlerResult, ListenerOptions, ListenerScope, LiveCollection, MutationListener,
    MutationObserver, MutationObserverInit, MutationRecord, NamedItem, NodeData, NodeId,
    SourcePosition,
};

fn children(tree: &DomTree, id: NodeId) -> Vec<NodeId> {
    tree.children(id).collect()
}

// ============================================================================
// NODE STORE
// ============================================================================

#[test]
fn test_remove_then_insert_before() {
    // <a><b/><c/></a>
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    let b = tree.create_element("b");
    let c = tree.create_element("c");
    tree.append_child(NodeId::ROOT, a).unwrap();
    tree.append_child(a, b).unwrap();
    tree.append_child(a, c).unwrap();

    tree.remove(b).unwrap();
    assert_eq!(children(&tree, a), vec![c]);
    assert_eq!(tree.parent(b), None);

    tree.insert_before(c, b).unwrap();
    assert_eq!(children(&tree, a), vec![b, c]);
}

#[test]
fn test_removed_node_absent_from_descendants() {
    let mut tree = DomTree::new();
    let html = tree.create_element("html");
    let body = tree.create_element("body");
    let p = tree.create_element("p");
    tree.append_child(NodeId::ROOT, html).unwrap();
    tree.append_child(html, body).unwrap();
    tree.append_child(body, p).unwrap();

    tree.remove(p).unwrap();
    let node = tree.get(p).unwrap();
    assert!(node.parent().is_none());
    assert!(node.next_sibling().is_none());
    assert!(node.prev_sibling().is_none());
    for ancestor in [NodeId::ROOT, html, body] {
        assert!(!tree.descendants(ancestor).any(|d| d == p));
    }
}

fn shape(tree: &DomTree, id: NodeId) -> (NodeData, Vec<(NodeData, usize)>) {
    let node = tree.get(id).unwrap();
    let kids = tree
        .descendants(id)
        .map(|d| (tree.get(d).unwrap().data().clone(), tree.children(d).count()))
        .collect();
    (node.data().clone(), kids)
}

#[test]
fn test_deep_clone_matches_shape() {
    let mut tree = DomTree::new();
    let ul = tree.create_element("ul");
    tree.append_child(NodeId::ROOT, ul).unwrap();
    for i in 0..3 {
        let li = tree.create_element("li");
        let text = tree.create_text(&format!("item {i}"));
        tree.append_child(ul, li).unwrap();
        tree.append_child(li, text).unwrap();
        tree.set_attribute(li, "data-index", &i.to_string()).unwrap();
    }
    let host: Rc<dyn std::any::Any> = Rc::new("wrapper");
    tree.bind_host_object(ul, host).unwrap();

    let copy = tree.clone_subtree(ul, true, &ClonePolicy::default()).unwrap();
    assert_eq!(shape(&tree, ul), shape(&tree, copy));
    assert!(tree.host_object(copy).is_none());
    assert!(tree.host_object(ul).is_some());
}

#[test]
fn test_clone_listener_policy() {
    let mut tree = DomTree::new();
    let button = tree.create_element("button");
    let handler: Rc<dyn EventHandler> =
        Rc::new(|_: &mut DomTree, _: &mut Event| -> HandlerResult { Ok(Completion::Normal) });
    tree.add_event_listener(button, "click", handler, ListenerOptions::default())
        .unwrap();

    let plain = tree.clone_subtree(button, false, &ClonePolicy::default()).unwrap();
    assert!(tree.event_listeners(plain, "click").is_empty());

    let policy = ClonePolicy {
        copy_event_listeners: true,
    };
    let with_listeners = tree.clone_subtree(button, false, &policy).unwrap();
    assert_eq!(tree.event_listeners(with_listeners, "click").len(), 1);
}

#[test]
fn test_source_positions() {
    let mut tree = DomTree::new();
    let pos = SourcePosition::new(3, 5, 3, 20);
    let div = tree.create_node(
        NodeData::Element(fos_dom::ElementData::new("div")),
        Some(pos),
    );
    assert_eq!(tree.get(div).unwrap().position(), Some(pos));
    let scripted = tree.create_element("p");
    assert_eq!(tree.get(scripted).unwrap().position(), None);
}

#[test]
fn test_script_wrappers_validate_parent() {
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    let b = tree.create_element("b");
    let stranger = tree.create_element("x");
    tree.append_child(a, b).unwrap();

    let new = tree.create_element("n");
    assert!(matches!(
        tree.insert_before_child(a, new, Some(stranger)),
        Err(DomError::InvalidState(_))
    ));
    assert!(matches!(tree.remove_child(a, stranger), Err(DomError::InvalidState(_))));
    tree.insert_before_child(a, new, None).unwrap();
    assert_eq!(children(&tree, a), vec![b, new]);
    tree.insert_before_child(a, stranger, Some(b)).unwrap();
    assert_eq!(children(&tree, a), vec![stranger, b, new]);
}

// ============================================================================
// MUTATION NOTIFIER
// ============================================================================

struct Recorder(RefCell<Vec<MutationRecord>>);

impl MutationListener for Recorder {
    fn on_mutation(&self, _tree: &DomTree, record: &MutationRecord) {
        self.0.borrow_mut().push(record.clone());
    }
}

#[test]
fn test_replace_fires_added_then_removed() {
    let mut tree = DomTree::new();
    let p = tree.create_element("p");
    let old = tree.create_element("old");
    let new = tree.create_element("new");
    tree.append_child(NodeId::ROOT, p).unwrap();
    tree.append_child(p, old).unwrap();

    let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
    tree.notifier().subscribe(ListenerScope::Tree, &recorder);
    tree.replace(old, new).unwrap();

    assert_eq!(
        *recorder.0.borrow(),
        vec![
            MutationRecord::NodeAdded { node: new, parent: p },
            MutationRecord::NodeRemoved { node: old, old_parent: p },
        ]
    );
}

#[test]
fn test_move_fires_removed_before_added() {
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    let b = tree.create_element("b");
    let x = tree.create_element("x");
    tree.append_child(a, x).unwrap();

    let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
    tree.notifier().subscribe(ListenerScope::Tree, &recorder);
    tree.append_child(b, x).unwrap();

    assert_eq!(
        *recorder.0.borrow(),
        vec![
            MutationRecord::NodeRemoved { node: x, old_parent: a },
            MutationRecord::NodeAdded { node: x, parent: b },
        ]
    );
}

#[test]
fn test_subtree_scope() {
    let mut tree = DomTree::new();
    let left = tree.create_element("left");
    let right = tree.create_element("right");
    tree.append_child(NodeId::ROOT, left).unwrap();
    tree.append_child(NodeId::ROOT, right).unwrap();

    let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
    tree.notifier().subscribe(ListenerScope::Subtree(left), &recorder);

    let inside = tree.create_element("i");
    let outside = tree.create_element("o");
    tree.append_child(left, inside).unwrap();
    tree.append_child(right, outside).unwrap();
    tree.set_attribute(inside, "k", "v").unwrap();
    tree.set_attribute(outside, "k", "v").unwrap();

    assert_eq!(recorder.0.borrow().len(), 2);
}

#[test]
fn test_attribute_change_records() {
    let mut tree = DomTree::new();
    let div = tree.create_element("div");
    tree.append_child(NodeId::ROOT, div).unwrap();
    let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
    tree.notifier().subscribe(ListenerScope::Tree, &recorder);

    tree.set_attribute(div, "class", "a").unwrap();
    tree.set_attribute(div, "class", "b").unwrap();
    tree.remove_attribute(div, "class").unwrap();
    // absent attribute: no record
    tree.remove_attribute(div, "class").unwrap();

    let records = recorder.0.borrow();
    assert_eq!(records.len(), 3);
    assert_eq!(
        records[1],
        MutationRecord::AttributeChanged {
            element: div,
            name: "class".into(),
            old_value: Some("a".into()),
            new_value: Some("b".into()),
        }
    );
    assert!(matches!(
        &records[2],
        MutationRecord::AttributeChanged { new_value: None, .. }
    ));
}

#[test]
fn test_mutation_observer() {
    let mut tree = DomTree::new();
    let form = tree.create_element("form");
    let input = tree.create_element("input");
    tree.append_child(NodeId::ROOT, form).unwrap();

    let observer = MutationObserver::new();
    observer.observe(
        &tree,
        form,
        MutationObserverInit {
            child_list: true,
            attributes: true,
            subtree: true,
            attribute_old_value: false,
            attribute_filter: Some(vec!["value".into()]),
        },
    );

    tree.append_child(form, input).unwrap();
    tree.set_attribute(input, "value", "x").unwrap();
    tree.set_attribute(input, "value", "y").unwrap();
    tree.set_attribute(input, "type", "text").unwrap();

    let records = observer.take_records();
    assert_eq!(records.len(), 3);
    assert!(matches!(
        &records[2],
        MutationRecord::AttributeChanged { old_value: None, .. }
    ));
    assert!(observer.take_records().is_empty());

    observer.disconnect(&tree);
    tree.set_attribute(input, "value", "z").unwrap();
    assert!(observer.take_records().is_empty());
}

// ============================================================================
// LIVE QUERY CACHE
// ============================================================================

#[test]
fn test_collection_identity_and_refresh() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let tree = doc.tree_mut();
    for _ in 0..2 {
        let p = tree.create_element("p");
        tree.append_child(body, p).unwrap();
    }
    let ps = LiveCollection::new(doc.tree(), NodeId::ROOT, "//p").unwrap();

    let a = ps.get(doc.tree()).unwrap();
    let b = ps.get(doc.tree()).unwrap();
    assert!(Rc::ptr_eq(&a, &b));

    // a mutation outside the matched set still forces a recompute
    let head = doc.head().unwrap();
    let meta = doc.tree_mut().create_element("meta");
    doc.tree_mut().append_child(head, meta).unwrap();
    let c = ps.get(doc.tree()).unwrap();
    assert!(!Rc::ptr_eq(&a, &c));
    assert_eq!(a, c);
}

#[test]
fn test_named_lookup_sub_collection() {
    let mut tree = DomTree::new();
    let form = tree.create_element("form");
    tree.append_child(NodeId::ROOT, form).unwrap();
    let first = tree.create_element("input");
    let second = tree.create_element("input");
    tree.append_child(form, first).unwrap();
    tree.append_child(form, second).unwrap();
    tree.set_attribute(first, "name", "x").unwrap();
    tree.set_attribute(second, "name", "x").unwrap();

    let inputs = LiveCollection::new(&tree, form, ".//input").unwrap();
    let NamedItem::Collection(sub) = inputs.named_item(&tree, "x").unwrap() else {
        panic!("two matches must give a sub-collection");
    };
    assert_eq!(sub.len(&tree).unwrap(), 2);

    tree.set_attribute(second, "name", "y").unwrap();
    assert!(matches!(inputs.named_item(&tree, "x").unwrap(), NamedItem::Element(id) if id == first));
    // the sub-collection is live too
    assert_eq!(sub.len(&tree).unwrap(), 1);
}

#[test]
fn test_detached_nodes_not_in_collection() {
    let mut tree = DomTree::new();
    let body = tree.create_element("body");
    tree.append_child(NodeId::ROOT, body).unwrap();
    let all = LiveCollection::new(&tree, NodeId::ROOT, "//*").unwrap();
    let detached = tree.create_element("div");
    assert!(!all.get(&tree).unwrap().contains(&detached));
}

#[test]
fn test_tags_sub_collection() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let tree = doc.tree_mut();
    let div = tree.create_element("div");
    let span = tree.create_element("span");
    tree.append_child(body, div).unwrap();
    tree.append_child(body, span).unwrap();
    let all = doc.all(CollectionOptions::default()).unwrap();
    let spans = all.tags(doc.tree(), "SPAN");
    assert_eq!(&*spans.get(doc.tree()).unwrap(), &[span]);
}

#[test]
fn test_tag_names_are_matched_literally() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let tree = doc.tree_mut();
    let div = tree.create_element("div");
    tree.append_child(body, div).unwrap();
    tree.set_attribute(div, "id", "d").unwrap();

    let by_tag = |tag: &str| doc.elements_by_tag_name(tag, CollectionOptions::default()).unwrap();
    assert_eq!(&*by_tag("DIV").get(doc.tree()).unwrap(), &[div]);
    assert_eq!(by_tag("*").len(doc.tree()).unwrap(), 4);
    for odd in ["", "1x", "a b", "div[@id]", "div | body", "]"] {
        let found = by_tag(odd);
        assert!(found.is_empty(doc.tree()).unwrap(), "{odd:?} matched something");
    }
}

// ============================================================================
// EVENT DISPATCHER
// ============================================================================

type Log = Rc<RefCell<Vec<&'static str>>>;

fn logging(log: &Log, label: &'static str, stop: bool) -> Rc<dyn EventHandler> {
    let log = log.clone();
    Rc::new(move |_: &mut DomTree, event: &mut Event| -> HandlerResult {
        log.borrow_mut().push(label);
        if stop {
            event.stop_propagation();
        }
        Ok(Completion::Normal)
    })
}

#[test]
fn test_stop_during_capture_never_reaches_target() {
    let mut tree = DomTree::new();
    let root = tree.create_element("root");
    let mid = tree.create_element("mid");
    let leaf = tree.create_element("leaf");
    tree.append_child(NodeId::ROOT, root).unwrap();
    tree.append_child(root, mid).unwrap();
    tree.append_child(mid, leaf).unwrap();

    let log: Log = Rc::default();
    let capture = ListenerOptions::capture();
    let bubble = ListenerOptions::default();
    tree.add_event_listener(root, "click", logging(&log, "root-capture", false), capture).unwrap();
    tree.add_event_listener(root, "click", logging(&log, "root-bubble", false), bubble).unwrap();
    tree.add_event_listener(mid, "click", logging(&log, "mid-capture", true), capture).unwrap();
    tree.add_event_listener(mid, "click", logging(&log, "mid-bubble", false), bubble).unwrap();
    tree.add_event_listener(leaf, "click", logging(&log, "leaf", false), bubble).unwrap();

    tree.dispatch_event(leaf, &mut Event::for_type("click")).unwrap();
    assert_eq!(*log.borrow(), vec!["root-capture", "mid-capture"]);
}

#[test]
fn test_stop_propagation_finishes_current_node() {
    let mut tree = DomTree::new();
    let parent = tree.create_element("parent");
    let child = tree.create_element("child");
    tree.append_child(NodeId::ROOT, parent).unwrap();
    tree.append_child(parent, child).unwrap();

    let log: Log = Rc::default();
    let bubble = ListenerOptions::default();
    tree.add_event_listener(child, "click", logging(&log, "first", true), bubble).unwrap();
    tree.add_event_listener(child, "click", logging(&log, "second", false), bubble).unwrap();
    tree.add_event_listener(parent, "click", logging(&log, "parent", false), bubble).unwrap();

    tree.dispatch_event(child, &mut Event::for_type("click")).unwrap();
    assert_eq!(*log.borrow(), vec!["first", "second"]);
}

#[test]
fn test_path_snapshot_survives_mutation() {
    let mut tree = DomTree::new();
    let outer = tree.create_element("outer");
    let inner = tree.create_element("inner");
    let target = tree.create_element("target");
    tree.append_child(NodeId::ROOT, outer).unwrap();
    tree.append_child(outer, inner).unwrap();
    tree.append_child(inner, target).unwrap();

    let log: Log = Rc::default();
    let detach: Rc<dyn EventHandler> = Rc::new(move |tree: &mut DomTree, _: &mut Event| -> HandlerResult {
        tree.remove(target)?;
        Ok(Completion::Normal)
    });
    tree.add_event_listener(target, "click", detach, ListenerOptions::default()).unwrap();
    tree.add_event_listener(outer, "click", logging(&log, "outer", false), ListenerOptions::default())
        .unwrap();

    tree.dispatch_event(target, &mut Event::for_type("click")).unwrap();
    assert_eq!(*log.borrow(), vec!["outer"]);
    assert_eq!(tree.parent(target), None);
}

#[test]
fn test_non_bubbling_event() {
    let mut tree = DomTree::new();
    let form = tree.create_element("form");
    let input = tree.create_element("input");
    tree.append_child(NodeId::ROOT, form).unwrap();
    tree.append_child(form, input).unwrap();

    let log: Log = Rc::default();
    tree.add_event_listener(form, "focus", logging(&log, "form-bubble", false), ListenerOptions::default())
        .unwrap();
    tree.add_event_listener(form, "focus", logging(&log, "form-capture", false), ListenerOptions::capture())
        .unwrap();
    tree.add_event_listener(input, "focus", logging(&log, "input", false), ListenerOptions::default())
        .unwrap();

    tree.dispatch_event(input, &mut Event::for_type("focus")).unwrap();
    assert_eq!(*log.borrow(), vec!["form-capture", "input"]);
}
