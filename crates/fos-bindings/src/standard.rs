//! Standard DOM descriptor set
//!
//! Node navigation, attribute reflection, text, mutation functions,
//! collections and event registration, plus the profile-gated quirks.

use fos_dom::{
    ClonePolicy, DocumentMode, DomTree, Event, EventDispatcher, ListenerOptions, LiveCollection,
    NamedItem, NodeData, NodeId, PathQuery,
};

use crate::bridge::HostContext;
use crate::error::{BindingResult, ConfigurationError, ScriptError};
use crate::kind::HostKind;
use crate::profile::{Enablement, Profile};
use crate::registry::{PropertyRegistry, RegistryBuilder};
use crate::value::{HostObject, HostValue};

/// `HTMLElement.innerText`
pub const HTMLELEMENT_INNER_TEXT: &str = "HTMLELEMENT_INNER_TEXT";
/// `document.all`
pub const DOCUMENT_ALL: &str = "DOCUMENT_ALL";
/// Hides `Node.textContent`
pub const NO_TEXT_CONTENT: &str = "NO_TEXT_CONTENT";
/// `cloneNode` carries event listeners over to the copy
pub const CLONE_NODE_COPIES_LISTENERS: &str = "CLONE_NODE_COPIES_LISTENERS";

/// Builder holding every standard declaration
pub fn builder() -> RegistryBuilder {
    let mut b = RegistryBuilder::new();
    event_target(&mut b);
    node(&mut b);
    character_data(&mut b);
    attr(&mut b);
    element(&mut b);
    html_element(&mut b);
    document(&mut b);
    doctype(&mut b);
    processing_instruction(&mut b);
    html_collection(&mut b);
    b
}

/// Standard registry for `profile`
pub fn registry(profile: &Profile) -> Result<PropertyRegistry, ConfigurationError> {
    builder().build(profile)
}

// ============================================================================
// Argument helpers
// ============================================================================

fn node_of(obj: &HostObject) -> BindingResult<NodeId> {
    obj.node()
        .ok_or_else(|| ScriptError::TypeError(format!("{} is not a node", obj.kind())))
}

/// `childNodes`/`children`: reads return the same object for as long as
/// the script keeps one alive
fn child_list(cx: &HostContext<'_>, obj: &HostObject, expression: &'static str) -> BindingResult<HostValue> {
    if let Some(list) = obj.cached_child_list(expression) {
        return Ok(HostValue::Object(list));
    }
    let list = cx.wrap_collection(cx.collection(node_of(obj)?, expression)?);
    obj.cache_child_list(expression, &list);
    Ok(HostValue::Object(list))
}

fn collection_of(obj: &HostObject) -> BindingResult<&LiveCollection> {
    obj.collection()
        .ok_or_else(|| ScriptError::TypeError(format!("{} is not a collection", obj.kind())))
}

fn this_node(this: &HostValue) -> BindingResult<NodeId> {
    this.as_node()
        .ok_or_else(|| ScriptError::TypeError("Illegal invocation".into()))
}

fn this_collection(this: &HostValue) -> BindingResult<LiveCollection> {
    this.as_object()
        .and_then(|obj| obj.collection().cloned())
        .ok_or_else(|| ScriptError::TypeError("Illegal invocation".into()))
}

fn arg(args: &[HostValue], index: usize) -> HostValue {
    args.get(index).cloned().unwrap_or_default()
}

fn string_arg(args: &[HostValue], index: usize, function: &str) -> BindingResult<String> {
    match args.get(index) {
        Some(v) => Ok(v.to_display_string()),
        None => Err(ScriptError::TypeError(format!(
            "{function}: at least {} argument(s) required",
            index + 1
        ))),
    }
}

fn node_arg(args: &[HostValue], index: usize, function: &str) -> BindingResult<NodeId> {
    args.get(index).and_then(HostValue::as_node).ok_or_else(|| {
        ScriptError::TypeError(format!("{function}: parameter {} is not of type 'Node'", index + 1))
    })
}

fn index_arg(args: &[HostValue], index: usize) -> Option<usize> {
    let n = arg(args, index).to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    (n >= 0.0 && n.is_finite()).then_some(n as usize)
}

fn text_or_empty(value: &HostValue) -> String {
    if value.is_nullish() {
        String::new()
    } else {
        value.to_display_string()
    }
}

/// `nodeName`, uppercased for elements of HTML documents
fn node_name(tree: &DomTree, id: NodeId) -> BindingResult<String> {
    let node = tree.node(id)?;
    let name = node.data().node_name();
    Ok(if node.is_element() && tree.mode() == DocumentMode::Html {
        name.to_ascii_uppercase()
    } else {
        name
    })
}

fn find_element(tree: &DomTree, root: NodeId, pred: impl Fn(&fos_dom::Node) -> bool) -> Option<NodeId> {
    tree.descendants(root)
        .find(|&id| tree.get(id).is_some_and(|n| n.is_element() && pred(n)))
}

/// Data property backed by an element attribute; absent reads as ""
fn reflect(b: &mut RegistryBuilder, kind: HostKind, property: &str, attribute: &'static str) {
    b.accessor(
        kind,
        property,
        move |cx, obj| {
            let id = node_of(obj)?;
            Ok(HostValue::from(cx.tree().get_attribute(id, attribute)?.unwrap_or("").to_string()))
        },
        move |cx, obj, value| {
            let id = node_of(obj)?;
            cx.tree_mut().set_attribute(id, attribute, &value.to_display_string())?;
            Ok(())
        },
    );
}

fn fire(cx: &mut HostContext<'_>, target: NodeId, event_type: &str) -> BindingResult<bool> {
    let mut event = Event::for_type(event_type);
    Ok(cx.tree_mut().dispatch_event(target, &mut event)?)
}

// ============================================================================
// EventTarget
// ============================================================================

fn event_target(b: &mut RegistryBuilder) {
    b.function(HostKind::EventTarget, "addEventListener", |cx, this, args| {
        let node = this_node(this)?;
        let event_type = string_arg(args, 0, "addEventListener")?;
        let callback = arg(args, 1);
        let Some(function) = callback.as_function() else {
            if callback.is_nullish() {
                return Ok(HostValue::Undefined);
            }
            return Err(ScriptError::TypeError(
                "addEventListener: parameter 2 is not a function".into(),
            ));
        };
        let handler = cx.env().script_handler(function);
        let options = ListenerOptions {
            capture: arg(args, 2).is_truthy(),
            ..ListenerOptions::default()
        };
        cx.tree_mut().add_event_listener(node, &event_type, handler, options)?;
        Ok(HostValue::Undefined)
    })
    .function(HostKind::EventTarget, "removeEventListener", |cx, this, args| {
        let node = this_node(this)?;
        let event_type = string_arg(args, 0, "removeEventListener")?;
        let callback = arg(args, 1);
        let handler = callback.as_function().and_then(|f| cx.env().find_script_handler(f));
        if let Some(handler) = handler {
            let capture = arg(args, 2).is_truthy();
            cx.tree_mut().remove_event_listener(node, &event_type, &handler, capture)?;
        }
        Ok(HostValue::Undefined)
    })
    .function(HostKind::EventTarget, "dispatchEvent", |cx, this, args| {
        let node = this_node(this)?;
        let event_type = string_arg(args, 0, "dispatchEvent")?;
        Ok(HostValue::Bool(fire(cx, node, &event_type)?))
    });
}

// ============================================================================
// Node
// ============================================================================

fn node(b: &mut RegistryBuilder) {
    let k = HostKind::Node;

    b.getter(k, "nodeName", |cx, obj| Ok(node_name(cx.tree(), node_of(obj)?)?.into()))
        .getter(k, "nodeType", |cx, obj| {
            let code = cx.tree().node(node_of(obj)?)?.kind().code();
            Ok(HostValue::Number(f64::from(code)))
        })
        .accessor(
            k,
            "nodeValue",
            |cx, obj| {
                let data = cx.tree().character_data(node_of(obj)?)?;
                Ok(data.map(str::to_string).into())
            },
            |cx, obj, value| {
                let id = node_of(obj)?;
                if cx.tree().character_data(id)?.is_some() {
                    cx.tree_mut().set_character_data(id, &text_or_empty(&value))?;
                }
                Ok(())
            },
        )
        .getter(k, "parentNode", |cx, obj| {
            let parent = cx.tree().node(node_of(obj)?)?.parent();
            cx.node_value(parent)
        })
        .getter(k, "firstChild", |cx, obj| {
            let child = cx.tree().node(node_of(obj)?)?.first_child();
            cx.node_value(child)
        })
        .getter(k, "lastChild", |cx, obj| {
            let child = cx.tree().node(node_of(obj)?)?.last_child();
            cx.node_value(child)
        })
        .getter(k, "previousSibling", |cx, obj| {
            let sibling = cx.tree().node(node_of(obj)?)?.prev_sibling();
            cx.node_value(sibling)
        })
        .getter(k, "nextSibling", |cx, obj| {
            let sibling = cx.tree().node(node_of(obj)?)?.next_sibling();
            cx.node_value(sibling)
        })
        .getter(k, "childNodes", |cx, obj| child_list(cx, obj, "node()"))
        .getter(k, "ownerDocument", |cx, obj| {
            if node_of(obj)? == NodeId::ROOT {
                return Ok(HostValue::Null);
            }
            cx.node_value(Some(NodeId::ROOT))
        })
        .getter(k, "isConnected", |cx, obj| Ok(cx.tree().is_attached(node_of(obj)?).into()))
        .accessor_when(
            k,
            "textContent",
            Enablement::unless(NO_TEXT_CONTENT),
            |cx, obj| Ok(cx.tree().text_content(node_of(obj)?)?.into()),
            |cx, obj, value| {
                cx.tree_mut().set_text_content(node_of(obj)?, &text_or_empty(&value))?;
                Ok(())
            },
        );

    b.function(k, "appendChild", |cx, this, args| {
        let parent = this_node(this)?;
        let child = node_arg(args, 0, "appendChild")?;
        cx.tree_mut().append_child(parent, child)?;
        Ok(arg(args, 0))
    })
    .function(k, "insertBefore", |cx, this, args| {
        let parent = this_node(this)?;
        let child = node_arg(args, 0, "insertBefore")?;
        let reference = match arg(args, 1) {
            v if v.is_nullish() => None,
            _ => Some(node_arg(args, 1, "insertBefore")?),
        };
        cx.tree_mut().insert_before_child(parent, child, reference)?;
        Ok(arg(args, 0))
    })
    .function(k, "removeChild", |cx, this, args| {
        let parent = this_node(this)?;
        let child = node_arg(args, 0, "removeChild")?;
        cx.tree_mut().remove_child(parent, child)?;
        Ok(arg(args, 0))
    })
    .function(k, "replaceChild", |cx, this, args| {
        let parent = this_node(this)?;
        let new = node_arg(args, 0, "replaceChild")?;
        let old = node_arg(args, 1, "replaceChild")?;
        cx.tree_mut().replace_child(parent, new, old)?;
        Ok(arg(args, 1))
    })
    .function(k, "cloneNode", |cx, this, args| {
        let id = this_node(this)?;
        let policy = ClonePolicy {
            copy_event_listeners: cx.profile().has_feature(CLONE_NODE_COPIES_LISTENERS),
        };
        let copy = cx.tree_mut().clone_subtree(id, arg(args, 0).is_truthy(), &policy)?;
        cx.node_value(Some(copy))
    })
    .function(k, "hasChildNodes", |cx, this, _| {
        let first = cx.tree().node(this_node(this)?)?.first_child();
        Ok(first.is_some().into())
    })
    .function(k, "contains", |cx, this, args| {
        let id = this_node(this)?;
        let Some(other) = arg(args, 0).as_node() else {
            return Ok(false.into());
        };
        Ok((id == other || cx.tree().is_ancestor_of(id, other)).into())
    });
}

// ============================================================================
// CharacterData, Attr, DocumentType, ProcessingInstruction
// ============================================================================

fn character_data(b: &mut RegistryBuilder) {
    b.accessor(
        HostKind::CharacterData,
        "data",
        |cx, obj| {
            let data = cx.tree().character_data(node_of(obj)?)?.unwrap_or("");
            Ok(data.into())
        },
        |cx, obj, value| {
            cx.tree_mut().set_character_data(node_of(obj)?, &text_or_empty(&value))?;
            Ok(())
        },
    )
    .getter(HostKind::CharacterData, "length", |cx, obj| {
        let data = cx.tree().character_data(node_of(obj)?)?.unwrap_or("");
        Ok(data.chars().count().into())
    });
}

fn attr(b: &mut RegistryBuilder) {
    b.getter(HostKind::Attr, "name", |cx, obj| {
        Ok(cx.tree().node(node_of(obj)?)?.data().node_name().into())
    })
    .accessor(
        HostKind::Attr,
        "value",
        |cx, obj| Ok(cx.tree().character_data(node_of(obj)?)?.unwrap_or("").into()),
        |cx, obj, value| {
            cx.tree_mut().set_character_data(node_of(obj)?, &value.to_display_string())?;
            Ok(())
        },
    );
}

fn doctype(b: &mut RegistryBuilder) {
    fn field(tree: &DomTree, id: NodeId, pick: fn(&NodeData) -> Option<&str>) -> BindingResult<HostValue> {
        Ok(pick(tree.node(id)?.data()).unwrap_or("").into())
    }

    b.getter(HostKind::DocumentType, "name", |cx, obj| {
        field(cx.tree(), node_of(obj)?, |d| match d {
            NodeData::Doctype { name, .. } => Some(name.as_str()),
            _ => None,
        })
    })
    .getter(HostKind::DocumentType, "publicId", |cx, obj| {
        field(cx.tree(), node_of(obj)?, |d| match d {
            NodeData::Doctype { public_id, .. } => Some(public_id.as_str()),
            _ => None,
        })
    })
    .getter(HostKind::DocumentType, "systemId", |cx, obj| {
        field(cx.tree(), node_of(obj)?, |d| match d {
            NodeData::Doctype { system_id, .. } => Some(system_id.as_str()),
            _ => None,
        })
    });
}

fn processing_instruction(b: &mut RegistryBuilder) {
    b.getter(HostKind::ProcessingInstruction, "target", |cx, obj| {
        match cx.tree().node(node_of(obj)?)?.data() {
            NodeData::ProcessingInstruction { target, .. } => Ok(target.as_str().into()),
            _ => Ok(HostValue::Null),
        }
    });
}

// ============================================================================
// Element
// ============================================================================

fn element(b: &mut RegistryBuilder) {
    let k = HostKind::Element;

    b.getter(k, "tagName", |cx, obj| {
        let tag = cx.tree().node(node_of(obj)?)?.tag_name().unwrap_or("").to_string();
        Ok(tag.into())
    })
    .getter(k, "children", |cx, obj| child_list(cx, obj, "*"));
    reflect(b, k, "id", "id");
    reflect(b, k, "className", "class");

    b.function(k, "getAttribute", |cx, this, args| {
        let id = this_node(this)?;
        let name = string_arg(args, 0, "getAttribute")?;
        Ok(cx.tree().get_attribute(id, &name)?.map(str::to_string).into())
    })
    .function(k, "setAttribute", |cx, this, args| {
        let id = this_node(this)?;
        let name = string_arg(args, 0, "setAttribute")?;
        let value = string_arg(args, 1, "setAttribute")?;
        cx.tree_mut().set_attribute(id, &name, &value)?;
        Ok(HostValue::Undefined)
    })
    .function(k, "removeAttribute", |cx, this, args| {
        let id = this_node(this)?;
        let name = string_arg(args, 0, "removeAttribute")?;
        cx.tree_mut().remove_attribute(id, &name)?;
        Ok(HostValue::Undefined)
    })
    .function(k, "hasAttribute", |cx, this, args| {
        let id = this_node(this)?;
        let name = string_arg(args, 0, "hasAttribute")?;
        Ok(cx.tree().has_attribute(id, &name)?.into())
    })
    .function(k, "getElementsByTagName", |cx, this, args| {
        let id = this_node(this)?;
        let tag = string_arg(args, 0, "getElementsByTagName")?;
        let collection = cx.collection_for(id, PathQuery::elements_named(&tag, false)?);
        Ok(HostValue::Object(cx.wrap_collection(collection)))
    });
}

fn html_element(b: &mut RegistryBuilder) {
    let k = HostKind::HtmlElement;

    b.getter(k, "tagName", |cx, obj| Ok(node_name(cx.tree(), node_of(obj)?)?.into()))
        .accessor_when(
            k,
            "innerText",
            Enablement::feature(HTMLELEMENT_INNER_TEXT),
            |cx, obj| Ok(cx.tree().text_content(node_of(obj)?)?.unwrap_or_default().into()),
            |cx, obj, value| {
                cx.tree_mut().set_text_content(node_of(obj)?, &text_or_empty(&value))?;
                Ok(())
            },
        );
    reflect(b, k, "title", "title");
    reflect(b, k, "name", "name");
    reflect(b, k, "value", "value");

    for event_type in ["click", "focus", "blur"] {
        b.function(k, event_type, move |cx, this, _| {
            fire(cx, this_node(this)?, event_type)?;
            Ok(HostValue::Undefined)
        });
    }
}

// ============================================================================
// Document
// ============================================================================

fn document(b: &mut RegistryBuilder) {
    let k = HostKind::Document;

    b.getter(k, "documentElement", |cx, _| {
        let root = cx.tree().document_element();
        cx.node_value(root)
    })
    .getter(k, "body", |cx, _| {
        let tree = cx.tree();
        let body = tree.document_element().and_then(|html| {
            tree.children(html).find(|&c| {
                tree.get(c)
                    .and_then(|n| n.tag_name())
                    .is_some_and(|t| t.eq_ignore_ascii_case("body"))
            })
        });
        cx.node_value(body)
    })
    .getter(k, "title", |cx, obj| {
        let tree = cx.tree();
        let title = find_element(tree, node_of(obj)?, |n| {
            n.tag_name().is_some_and(|t| t.eq_ignore_ascii_case("title"))
        });
        let text = match title {
            Some(t) => tree.text_content(t)?.unwrap_or_default(),
            None => String::new(),
        };
        Ok(text.trim().into())
    })
    .getter_when(k, "all", Enablement::feature(DOCUMENT_ALL), |cx, obj| {
        cx.collection_value(node_of(obj)?, "//*")
    });

    b.function(k, "getElementById", |cx, this, args| {
        let root = this_node(this)?;
        let wanted = string_arg(args, 0, "getElementById")?;
        let found = find_element(cx.tree(), root, |n| n.attribute("id") == Some(wanted.as_str()));
        cx.node_value(found)
    })
    .function(k, "getElementsByTagName", |cx, this, args| {
        let root = this_node(this)?;
        let tag = string_arg(args, 0, "getElementsByTagName")?;
        let collection = cx.collection_for(root, PathQuery::elements_named(&tag, true)?);
        Ok(HostValue::Object(cx.wrap_collection(collection)))
    })
    .function(k, "getElementsByName", |cx, this, args| {
        let root = this_node(this)?;
        let name = string_arg(args, 0, "getElementsByName")?;
        let query = PathQuery::parse("//*")?.with_attribute_equals("name", &name);
        let collection = cx.collection_for(root, query);
        Ok(HostValue::Object(cx.wrap_collection(collection)))
    })
    .function(k, "createElement", |cx, _, args| {
        let tag = string_arg(args, 0, "createElement")?;
        let tag = match cx.tree().mode() {
            DocumentMode::Html => tag.to_ascii_lowercase(),
            DocumentMode::Xml => tag,
        };
        let id = cx.tree_mut().create_element(&tag);
        cx.node_value(Some(id))
    })
    .function(k, "createTextNode", |cx, _, args| {
        let text = string_arg(args, 0, "createTextNode")?;
        let id = cx.tree_mut().create_text(&text);
        cx.node_value(Some(id))
    })
    .function(k, "createComment", |cx, _, args| {
        let text = string_arg(args, 0, "createComment")?;
        let id = cx.tree_mut().create_comment(&text);
        cx.node_value(Some(id))
    });
}

// ============================================================================
// HTMLCollection
// ============================================================================

fn html_collection(b: &mut RegistryBuilder) {
    let k = HostKind::HtmlCollection;

    b.getter(k, "length", |cx, obj| {
        Ok(collection_of(obj)?.len(cx.tree())?.into())
    });

    b.function(k, "item", |cx, this, args| {
        let collection = this_collection(this)?;
        let node = match index_arg(args, 0) {
            Some(i) => collection.item(cx.tree(), i)?,
            None => None,
        };
        cx.node_value(node)
    })
    .function(k, "namedItem", |cx, this, args| {
        let collection = this_collection(this)?;
        let name = string_arg(args, 0, "namedItem")?;
        match collection.named_item(cx.tree(), &name)? {
            NamedItem::Element(id) => cx.node_value(Some(id)),
            NamedItem::Collection(sub) => Ok(HostValue::Object(cx.wrap_collection(sub))),
            NamedItem::NotFound => Ok(HostValue::Null),
        }
    })
    .function(k, "tags", |cx, this, args| {
        let collection = this_collection(this)?;
        let tag = string_arg(args, 0, "tags")?;
        let sub = collection.tags(cx.tree(), &tag);
        Ok(HostValue::Object(cx.wrap_collection(sub)))
    });
}
