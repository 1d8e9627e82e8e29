//! Edge case and stress tests for fos-dom
//!
//! These tests cover rare scenarios, boundary conditions, and stress testing.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use fos_dom::{
    Completion, DomError, DomTree, Event, EventDispatcher, EventError, EventHandler, EventInit,
    HandlerResult, ListenerId, ListenerOptions, LiveCollection, NodeId, PathQuery, QueryError,
};

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

/// Check every link agrees with every other link.
fn assert_consistent(tree: &DomTree, ids: &[NodeId]) {
    for &id in ids {
        let node = tree.get(id).unwrap();

        let kids: Vec<NodeId> = tree.children(id).collect();
        assert_eq!(node.first_child(), kids.first().copied(), "first_child of {id}");
        assert_eq!(node.last_child(), kids.last().copied(), "last_child of {id}");
        let mut prev = None;
        for &kid in &kids {
            let k = tree.get(kid).unwrap();
            assert_eq!(k.parent(), Some(id), "parent of {kid}");
            assert_eq!(k.prev_sibling(), prev, "prev_sibling of {kid}");
            prev = Some(kid);
        }

        if node.parent().is_none() {
            assert!(node.prev_sibling().is_none() && node.next_sibling().is_none());
        }

        // no cycles: the ancestor walk terminates without revisiting
        let mut seen = HashSet::new();
        for ancestor in tree.ancestors(id) {
            assert!(seen.insert(ancestor), "cycle above {id}");
            assert_ne!(ancestor, id);
        }
    }
}

// ============================================================================
// RANDOMIZED STRUCTURE
// ============================================================================

#[test]
fn test_random_operations_keep_tree_consistent() {
    let mut tree = DomTree::new();
    let mut rng = Lcg(0x5eed);
    let mut nodes = vec![NodeId::ROOT];
    for i in 0..24 {
        nodes.push(tree.create_element(&format!("e{i}")));
    }

    let watched = LiveCollection::new(&tree, NodeId::ROOT, "//*").unwrap();

    for _ in 0..2000 {
        let a = nodes[rng.below(nodes.len())];
        let b = nodes[1 + rng.below(nodes.len() - 1)];
        let result = match rng.below(4) {
            0 => tree.append_child(a, b).map(|_| ()),
            1 => tree.insert_before(a, b).map(|_| ()),
            2 => tree.remove(b),
            _ => tree.replace(a, b),
        };
        match result {
            Ok(())
            | Err(DomError::InvalidState(_))
            | Err(DomError::CyclicInsertion { .. }) => {}
            Err(other) => panic!("unexpected error {other}"),
        }
        if rng.below(50) == 0 {
            let expected: Vec<NodeId> = tree.descendants(NodeId::ROOT).collect();
            assert_eq!(&*watched.get(&tree).unwrap(), expected.as_slice());
        }
    }
    assert_consistent(&tree, &nodes);
}

#[test]
fn test_cyclic_insertion_deep() {
    let mut tree = DomTree::new();
    let top = tree.create_element("top");
    let mut at = top;
    for _ in 0..50 {
        let next = tree.create_element("n");
        tree.append_child(at, next).unwrap();
        at = next;
    }
    assert!(matches!(
        tree.append_child(at, top),
        Err(DomError::CyclicInsertion { .. })
    ));
    let sibling = tree.create_element("s");
    tree.append_child(top, sibling).unwrap();
    assert!(matches!(
        tree.insert_before(sibling, top),
        Err(DomError::CyclicInsertion { .. })
    ));
}

#[test]
fn test_deep_tree_iteration_without_recursion() {
    let mut tree = DomTree::new();
    let mut at = NodeId::ROOT;
    for _ in 0..5_000 {
        let next = tree.create_element("d");
        tree.append_child(at, next).unwrap();
        at = next;
    }
    assert_eq!(tree.descendants(NodeId::ROOT).count(), 5_000);
    assert_eq!(tree.ancestors(at).count(), 5_000);
    assert_eq!(
        PathQuery::parse("//d").unwrap().evaluate(&tree, NodeId::ROOT).unwrap().len(),
        5_000
    );
}

// ============================================================================
// INVALID OPERATIONS
// ============================================================================

#[test]
fn test_document_cannot_be_inserted() {
    let mut tree = DomTree::new();
    let div = tree.create_element("div");
    assert!(matches!(
        tree.append_child(div, NodeId::ROOT),
        Err(DomError::InvalidState(_))
    ));
}

#[test]
fn test_text_cannot_have_children() {
    let mut tree = DomTree::new();
    let text = tree.create_text("t");
    let span = tree.create_element("span");
    assert!(matches!(tree.append_child(text, span), Err(DomError::InvalidState(_))));
}

#[test]
fn test_remove_document_root_is_invalid() {
    let mut tree = DomTree::new();
    assert!(matches!(tree.remove(NodeId::ROOT), Err(DomError::InvalidState(_))));
}

#[test]
fn test_replace_with_self_is_noop() {
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    tree.append_child(NodeId::ROOT, a).unwrap();
    let before = tree.generation();
    tree.replace(a, a).unwrap();
    assert_eq!(tree.generation(), before);
    assert_eq!(tree.parent(a), Some(NodeId::ROOT));
}

#[test]
fn test_insert_before_own_sibling_position() {
    let mut tree = DomTree::new();
    let p = tree.create_element("p");
    let a = tree.create_element("a");
    let b = tree.create_element("b");
    tree.append_child(p, a).unwrap();
    tree.append_child(p, b).unwrap();
    // a already sits before b: moving it there again keeps the order
    tree.insert_before(b, a).unwrap();
    assert_eq!(tree.children(p).collect::<Vec<_>>(), vec![a, b]);
    tree.insert_before(a, b).unwrap();
    assert_eq!(tree.children(p).collect::<Vec<_>>(), vec![b, a]);
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn test_parse_error_reports_position() {
    match PathQuery::parse("//div[@id='x'") {
        Err(QueryError::Parse { position, .. }) => assert_eq!(position, 13),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(LiveCollection::new(&DomTree::new(), NodeId::ROOT, "//[").is_err());
}

#[test]
fn test_query_on_detached_subtree() {
    let mut tree = DomTree::new();
    let frag = tree.create_element("div");
    let p = tree.create_element("p");
    tree.append_child(frag, p).unwrap();
    let rel = PathQuery::parse(".//p").unwrap();
    assert_eq!(rel.evaluate(&tree, frag).unwrap(), vec![p]);
    // absolute queries start at the top of the detached subtree
    let abs = PathQuery::parse("/p").unwrap();
    assert_eq!(abs.evaluate(&tree, frag).unwrap(), vec![p]);
}

#[test]
fn test_literal_with_quotes() {
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    tree.append_child(NodeId::ROOT, a).unwrap();
    tree.set_attribute(a, "title", "it's").unwrap();
    let q = PathQuery::parse("//a[@title=\"it's\"]").unwrap();
    assert_eq!(q.evaluate(&tree, NodeId::ROOT).unwrap(), vec![a]);
    let built = PathQuery::parse("//a").unwrap().with_attribute_equals("title", "it's");
    assert_eq!(built.source(), "//a[@title=\"it's\"]");
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_listener_removed_mid_dispatch_is_skipped() {
    let mut tree = DomTree::new();
    let node = tree.create_element("n");
    tree.append_child(NodeId::ROOT, node).unwrap();

    let victim_ran = Rc::new(Cell::new(false));
    let victim_id: Rc<Cell<Option<ListenerId>>> = Rc::default();

    let remover: Rc<dyn EventHandler> = {
        let victim_id = victim_id.clone();
        Rc::new(move |tree: &mut DomTree, _: &mut Event| -> HandlerResult {
            if let Some(id) = victim_id.get() {
                tree.remove_listener(node, id)?;
            }
            Ok(Completion::Normal)
        })
    };
    let victim: Rc<dyn EventHandler> = {
        let ran = victim_ran.clone();
        Rc::new(move |_: &mut DomTree, _: &mut Event| -> HandlerResult {
            ran.set(true);
            Ok(Completion::Normal)
        })
    };
    tree.add_event_listener(node, "x", remover, ListenerOptions::default()).unwrap();
    let id = tree.add_event_listener(node, "x", victim, ListenerOptions::default()).unwrap();
    victim_id.set(Some(id));

    tree.dispatch_event(node, &mut Event::for_type("x")).unwrap();
    assert!(!victim_ran.get());
}

#[test]
fn test_nested_dispatch() {
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    let b = tree.create_element("b");
    tree.append_child(NodeId::ROOT, a).unwrap();
    tree.append_child(NodeId::ROOT, b).unwrap();

    let inner_ran = Rc::new(Cell::new(0));
    let counter: Rc<dyn EventHandler> = {
        let inner_ran = inner_ran.clone();
        Rc::new(move |_: &mut DomTree, _: &mut Event| -> HandlerResult {
            inner_ran.set(inner_ran.get() + 1);
            Ok(Completion::Normal)
        })
    };
    let relay: Rc<dyn EventHandler> = Rc::new(move |tree: &mut DomTree, _: &mut Event| -> HandlerResult {
        tree.dispatch_event(b, &mut Event::for_type("inner"))?;
        Ok(Completion::Normal)
    });
    tree.add_event_listener(b, "inner", counter, ListenerOptions::default()).unwrap();
    tree.add_event_listener(a, "outer", relay, ListenerOptions::default()).unwrap();

    tree.dispatch_event(a, &mut Event::for_type("outer")).unwrap();
    assert_eq!(inner_ran.get(), 1);
}

#[test]
fn test_dispatch_in_progress_rejected() {
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    tree.append_child(NodeId::ROOT, a).unwrap();
    let rejected = Rc::new(Cell::new(false));
    let handler: Rc<dyn EventHandler> = {
        let rejected = rejected.clone();
        Rc::new(move |tree: &mut DomTree, event: &mut Event| -> HandlerResult {
            let result = tree.dispatch_event(a, event);
            rejected.set(matches!(
                result,
                Err(DomError::Event(EventError::DispatchInProgress { .. }))
            ));
            Ok(Completion::Normal)
        })
    };
    tree.add_event_listener(a, "x", handler, ListenerOptions::default()).unwrap();
    tree.dispatch_event(a, &mut Event::for_type("x")).unwrap();
    assert!(rejected.get());
}

#[test]
fn test_non_cancelable_custom_event() {
    let mut tree = DomTree::new();
    let a = tree.create_element("a");
    let handler: Rc<dyn EventHandler> = Rc::new(|_: &mut DomTree, e: &mut Event| -> HandlerResult {
        e.prevent_default();
        Ok(Completion::Falsy)
    });
    tree.add_event_listener(a, "custom", handler, ListenerOptions::default()).unwrap();
    let init = EventInit {
        bubbles: false,
        cancelable: false,
    };
    let mut event = Event::new("custom", init);
    assert!(tree.dispatch_event(a, &mut event).unwrap());
    assert!(!event.is_default_prevented());
}

#[test]
fn test_dispatch_on_unknown_node() {
    let mut tree = DomTree::new();
    let mut other = DomTree::new();
    let far = (0..5).map(|_| other.create_element("x")).last().unwrap();
    assert!(matches!(
        tree.dispatch_event(far, &mut Event::for_type("x")),
        Err(DomError::UnknownNode(_))
    ));
}
