use alloc::{format, rc::Rc, string::String, vec::Vec};

use crate::closure::HostClosure;
use crate::host::{Event, NodeId, ObserverEntry, ObserverId, Response};
use crate::{Error, HostError, Result};

/// A host object without state of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostObject {
    Window,
    Document,
    Storage,
    History,
    Location,
    Navigator,
    Clipboard,
    /// The class list of an element
    ClassList(NodeId),
}

impl HostObject {
    /// The class name a browser would report for this object
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Window => "Window",
            Self::Document => "HTMLDocument",
            Self::Storage => "Storage",
            Self::History => "History",
            Self::Location => "Location",
            Self::Navigator => "Navigator",
            Self::Clipboard => "Clipboard",
            Self::ClassList(_) => "DOMTokenList",
        }
    }
}

/// A value living on the host side of the boundary
///
/// Modules never see these directly; they hold handles into the
/// [`ExternrefTable`](crate::heap::ExternrefTable).
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Json(serde_json::Value),
    Node(NodeId),
    NodeList(Rc<[NodeId]>),
    Object(HostObject),
    Event(Rc<Event>),
    Response(Rc<Response>),
    Observer(ObserverId),
    ObserverEntry(ObserverEntry),
    Closure(HostClosure),
    Error(HostError),
}

impl HostValue {
    /// A short name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Json(_) => "object",
            Self::Node(_) => "node",
            Self::NodeList(_) => "node list",
            Self::Object(object) => object.class_name(),
            Self::Event(_) => "event",
            Self::Response(_) => "response",
            Self::Observer(_) => "intersection observer",
            Self::ObserverEntry(_) => "intersection observer entry",
            Self::Closure(_) => "function",
            Self::Error(_) => "error",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::Closure(_))
    }

    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Json(serde_json::Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Json(serde_json::Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Result<NodeId> {
        match self {
            Self::Node(node) => Ok(*node),
            other => Err(other.mismatch("node")),
        }
    }

    pub fn as_closure(&self) -> Result<&HostClosure> {
        match self {
            Self::Closure(closure) => Ok(closure),
            other => Err(other.mismatch("function")),
        }
    }

    pub fn as_event(&self) -> Result<&Rc<Event>> {
        match self {
            Self::Event(event) => Ok(event),
            other => Err(other.mismatch("event")),
        }
    }

    pub fn as_response(&self) -> Result<&Rc<Response>> {
        match self {
            Self::Response(response) => Ok(response),
            other => Err(other.mismatch("response")),
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch { expected, found: self.type_name() }
    }

    /// Convert the value to JSON, if it has a JSON representation
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Null => Some(serde_json::Value::Null),
            Self::Bool(b) => Some((*b).into()),
            Self::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number),
            Self::String(s) => Some(s.as_str().into()),
            Self::Json(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Render the value for `__wbindgen_debug_string`
    ///
    /// Primitives render as their literal, strings are quoted, arrays
    /// recurse and plain objects render as `Object(<json>)`.
    pub fn debug_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(b) => format!("{b}"),
            Self::Number(n) => format_number(*n),
            Self::String(s) => format!("\"{s}\""),
            Self::Json(value) => debug_json(value),
            Self::Node(_) => "Element".into(),
            Self::NodeList(_) => "NodeList".into(),
            Self::Object(object) => object.class_name().into(),
            Self::Event(_) => "Event".into(),
            Self::Response(_) => "Response".into(),
            Self::Observer(_) => "IntersectionObserver".into(),
            Self::ObserverEntry(_) => "IntersectionObserverEntry".into(),
            Self::Closure(_) => "Function".into(),
            Self::Error(err) => format!("{}: {}", err.name(), err.message()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<NodeId> for HostValue {
    fn from(value: NodeId) -> Self {
        Self::Node(value)
    }
}

impl From<HostObject> for HostValue {
    fn from(value: HostObject) -> Self {
        Self::Object(value)
    }
}

impl From<HostError> for HostValue {
    fn from(value: HostError) -> Self {
        Self::Error(value)
    }
}

impl From<Option<NodeId>> for HostValue {
    fn from(value: Option<NodeId>) -> Self {
        value.map_or(Self::Null, Self::Node)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn debug_json(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("{b}"),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), format_number),
        Value::String(s) => format!("\"{s}\""),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(debug_json).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(_) => format!("Object({value})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn debug_string_renders_primitives() {
        assert_eq!(HostValue::Undefined.debug_string(), "undefined");
        assert_eq!(HostValue::Null.debug_string(), "null");
        assert_eq!(HostValue::Bool(true).debug_string(), "true");
        assert_eq!(HostValue::Number(3.0).debug_string(), "3");
        assert_eq!(HostValue::Number(-0.5).debug_string(), "-0.5");
        assert_eq!(HostValue::Number(f64::NAN).debug_string(), "NaN");
        assert_eq!(HostValue::Number(f64::NEG_INFINITY).debug_string(), "-Infinity");
        assert_eq!(HostValue::from("hi").debug_string(), "\"hi\"");
    }

    #[test]
    fn debug_string_renders_structures() {
        let value = HostValue::Json(json!([1, "a", [true, null]]));
        assert_eq!(value.debug_string(), "[1, \"a\", [true, null]]");

        let value = HostValue::Json(json!({"a": 1}));
        assert_eq!(value.debug_string(), "Object({\"a\":1})");

        let value = HostValue::Error(HostError::not_found("missing"));
        assert_eq!(value.debug_string(), "NotFoundError: missing");
        assert_eq!(HostValue::Object(HostObject::Window).debug_string(), "Window");
    }

    #[test]
    fn mismatches_name_both_types() {
        let err = HostValue::Number(1.0).as_node().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "node", found: "number" }));
    }
}
