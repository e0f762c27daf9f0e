use alloc::{rc::Rc, string::String};

use super::{Cx, ImportTable, flag};
use crate::host::{Event, EventTarget, NodeId};
use crate::value::{HostObject, HostValue};
use crate::{HostError, Result};

pub(super) fn register(table: &mut ImportTable) {
    // globals
    table
        .func("window", |cx, ()| cx.put(HostObject::Window))
        .func("static_accessor_WINDOW", |cx, ()| cx.put(HostObject::Window))
        .func("instanceof_Window", |cx, handle: i32| {
            Ok(flag(matches!(cx.value(handle)?, HostValue::Object(HostObject::Window))))
        })
        .func("document", |cx, window: i32| {
            cx.object(window, HostObject::Window)?;
            cx.put(HostObject::Document)
        })
        .func("documentElement", |cx, document: i32| {
            cx.object(document, HostObject::Document)?;
            let element = cx.host().document().document_element();
            cx.put(element)
        })
        .func("body", |cx, document: i32| {
            cx.object(document, HostObject::Document)?;
            let body = cx.host().document().body();
            cx.put(body)
        })
        .func("set_title", |cx, (document, ptr, len): (i32, i32, i32)| {
            cx.object(document, HostObject::Document)?;
            let title = cx.string(ptr, len)?;
            cx.host().document_mut().set_title(title);
            Ok(())
        });

    // tree
    table
        .catching("createElement", |cx, (document, ptr, len): (i32, i32, i32)| {
            cx.object(document, HostObject::Document)?;
            let tag = cx.string(ptr, len)?;
            let node = cx.host().document_mut().create_element(&tag)?;
            cx.put(node)
        })
        .func("getElementById", |cx, (document, ptr, len): (i32, i32, i32)| {
            cx.object(document, HostObject::Document)?;
            let id = cx.string(ptr, len)?;
            let node = cx.host().document().get_element_by_id(&id);
            cx.put_opt(node)
        })
        .catching("querySelector", |cx, (scope, ptr, len): (i32, i32, i32)| {
            let scope = cx.node(scope)?;
            let selector = cx.string(ptr, len)?;
            let node = cx.host().document().query_selector(scope, &selector)?;
            cx.put_opt(node)
        })
        .catching("querySelectorAll", |cx, (scope, ptr, len): (i32, i32, i32)| {
            let scope = cx.node(scope)?;
            let selector = cx.string(ptr, len)?;
            let nodes = cx.host().document().query_selector_all(scope, &selector)?;
            cx.put(HostValue::NodeList(nodes.into()))
        })
        .func("length", |cx, list: i32| Ok(node_list(cx, list)?.len() as i32))
        .func("item", |cx, (list, index): (i32, i32)| {
            let nodes = node_list(cx, list)?;
            let node = usize::try_from(index).ok().and_then(|index| nodes.get(index).copied());
            cx.put_opt(node)
        })
        .func("firstChild", |cx, node: i32| {
            let node = cx.node(node)?;
            let child = cx.host().document().first_child(node);
            cx.put_opt(child)
        })
        .catching("appendChild", |cx, (parent, child): (i32, i32)| {
            let (parent, child) = (cx.node(parent)?, cx.node(child)?);
            let child = cx.host().document_mut().append_child(parent, child)?;
            cx.put(child)
        })
        .catching("insertBefore", |cx, (parent, child, reference): (i32, i32, i32)| {
            let (parent, child) = (cx.node(parent)?, cx.node(child)?);
            let reference = match cx.value(reference)?.is_nullish() {
                true => None,
                false => Some(cx.node(reference)?),
            };
            let child = cx.host().document_mut().insert_before(parent, child, reference)?;
            cx.put(child)
        })
        .catching("removeChild", |cx, (parent, child): (i32, i32)| {
            let (parent, child) = (cx.node(parent)?, cx.node(child)?);
            let mut document = cx.host().document_mut();
            if document.parent(child) != Some(parent) {
                return Err(HostError::not_found("the node to be removed is not a child of this node").into());
            }
            document.remove(child);
            drop(document);
            cx.put(child)
        });

    // attributes and text
    table
        .catching("setAttribute", |cx, (element, name_ptr, name_len, value_ptr, value_len): (i32, i32, i32, i32, i32)| {
            let element = cx.node(element)?;
            let name = cx.string(name_ptr, name_len)?;
            let value = cx.string(value_ptr, value_len)?;
            Ok(cx.host().document_mut().set_attribute(element, &name, &value)?)
        })
        .func("getAttribute", |cx, (ret, element, ptr, len): (i32, i32, i32, i32)| {
            let element = cx.node(element)?;
            let name = cx.string(ptr, len)?;
            let value = cx.host().document().get_attribute(element, &name).map(String::from);
            cx.put_string_ret(ret, value.as_deref())
        })
        .func("id", |cx, (ret, element): (i32, i32)| {
            let element = cx.node(element)?;
            let id = String::from(cx.host().document().id(element));
            cx.put_string_ret(ret, Some(&id))
        })
        .func("textContent", |cx, (ret, node): (i32, i32)| {
            let node = cx.node(node)?;
            let text = cx.host().document().text_content(node);
            cx.put_string_ret(ret, text.as_deref())
        })
        .func("set_textContent", |cx, (node, ptr, len): (i32, i32, i32)| {
            let node = cx.node(node)?;
            let text = cx.opt_string(ptr, len)?;
            cx.host().document_mut().set_text_content(node, text.as_deref());
            Ok(())
        })
        .catching("closest", |cx, (element, ptr, len): (i32, i32, i32)| {
            let element = cx.node(element)?;
            let selector = cx.string(ptr, len)?;
            let found = cx.host().document().closest(element, &selector)?;
            cx.put_opt(found)
        });

    // class lists
    table
        .func("classList", |cx, element: i32| {
            let element = cx.node(element)?;
            cx.put(HostObject::ClassList(element))
        })
        .catching("add", |cx, (list, ptr, len): (i32, i32, i32)| {
            let element = class_list(cx, list)?;
            let token = cx.string(ptr, len)?;
            Ok(cx.host().document_mut().class_add(element, &token)?)
        })
        .catching("remove", |cx, (list, ptr, len): (i32, i32, i32)| {
            let element = class_list(cx, list)?;
            let token = cx.string(ptr, len)?;
            Ok(cx.host().document_mut().class_remove(element, &token)?)
        })
        .catching("toggle", |cx, (list, ptr, len): (i32, i32, i32)| {
            let element = class_list(cx, list)?;
            let token = cx.string(ptr, len)?;
            Ok(flag(cx.host().document_mut().class_toggle(element, &token)?))
        })
        // DOMTokenList.contains(token) or Node.contains(other)
        .func("contains", |cx, (this, other): (i32, i32)| {
            if let HostValue::Object(HostObject::ClassList(element)) = cx.value(this)? {
                let token = cx.value(other)?;
                let token = token.as_str().ok_or_else(|| token.mismatch("string"))?;
                return Ok(flag(cx.host().document().class_contains(element, token)));
            }

            let this = cx.node(this)?;
            let contained = match cx.value(other)?.is_nullish() {
                true => false,
                false => cx.host().document().contains(this, cx.node(other)?),
            };
            Ok(flag(contained))
        });

    // events
    table
        .catching("addEventListener", |cx, (target, ptr, len, callback): (i32, i32, i32, i32)| {
            let target = cx.target(target)?;
            let event_type = cx.string(ptr, len)?;
            let callback = cx.closure(callback)?;
            cx.host().document_mut().add_event_listener(target, &event_type, callback);
            Ok(())
        })
        .catching("newEvent", |cx, (ptr, len): (i32, i32)| {
            let event_type = cx.string(ptr, len)?;
            cx.put(HostValue::Event(Rc::new(Event::new(event_type))))
        })
        .catching("dispatchEvent", |cx, (target, event): (i32, i32)| {
            let target = cx.target(target)?;
            let event = cx.value(event)?.as_event()?.clone();
            let shared = cx.shared();
            Ok(flag(shared.dispatch(cx.guest(), target, event)?))
        })
        .func("preventDefault", |cx, event: i32| {
            cx.value(event)?.as_event()?.prevent_default();
            Ok(())
        })
        .func("target", |cx, handle: i32| {
            let target = match cx.value(handle)? {
                HostValue::Event(event) => event.target(),
                HostValue::ObserverEntry(entry) => Some(EventTarget::Node(entry.target)),
                other => return Err(other.mismatch("Event")),
            };
            match target {
                Some(EventTarget::Window) => cx.put(HostObject::Window),
                Some(EventTarget::Node(node)) => cx.put(node),
                None => Ok(0),
            }
        });
}

fn node_list(cx: &Cx<'_, '_>, handle: i32) -> Result<Rc<[NodeId]>> {
    match cx.value(handle)? {
        HostValue::NodeList(nodes) => Ok(nodes),
        other => Err(other.mismatch("NodeList")),
    }
}

fn class_list(cx: &Cx<'_, '_>, handle: i32) -> Result<NodeId> {
    match cx.value(handle)? {
        HostValue::Object(HostObject::ClassList(element)) => Ok(element),
        other => Err(other.mismatch("DOMTokenList")),
    }
}
