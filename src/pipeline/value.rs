//! Renderable values.
//!
//! Everything interpolated into a template becomes a [`Value`] through
//! [`IntoValue`]. Plain data renders once; signals and closures render live.

use std::fmt;
use std::rc::Rc;

use tracing::error;

use crate::dom::{Event, Node, NodeType};
use crate::error::Error;
use crate::signals::{Deferred, Derived, ReadSignal, Readable, Signal};

/// Anything that renders to a value: components and other view records.
pub trait Render {
    fn render(&self) -> Value;
}

/// A value interpolated into a template.
#[derive(Clone, Default)]
pub enum Value {
    /// Renders nothing. Removes the attribute in attribute position.
    #[default]
    Empty,
    Text(String),
    /// `true` sets an attribute to the empty string, `false` removes it.
    Bool(bool),
    Node(Node),
    List(Vec<Value>),
    /// Computed through a memoized derived signal and bound live.
    Function(Rc<dyn Fn() -> Value>),
    /// Bound live; re-rendered on every emission.
    Reactive(ReadSignal<Value>),
    Render(Rc<dyn Render>),
    /// Event listener for an `on<event>` attribute.
    Handler(Rc<dyn Fn(&Event)>),
    /// Called with the element when placed in attribute-name position.
    Directive(Rc<dyn Fn(&Node)>),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn render(view: impl Render + 'static) -> Self {
        Value::Render(Rc::new(view))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Whether the value changes over time.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Reactive(_))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "Empty"),
            Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Function(_) => write!(f, "Function(..)"),
            Value::Reactive(signal) => f.debug_tuple("Reactive").field(signal).finish(),
            Value::Render(_) => write!(f, "Render(..)"),
            Value::Handler(_) => write!(f, "Handler(..)"),
            Value::Directive(_) => write!(f, "Directive(..)"),
        }
    }
}

/// Event listener value for an `on<event>` attribute slot.
///
/// ```ignore
/// html!("<button onclick=" {on(move |_| count.update(|n| *n += 1))} ">+</button>")
/// ```
pub fn on(handler: impl Fn(&Event) + 'static) -> Value {
    Value::Handler(Rc::new(handler))
}

/// Element callback for an attribute-name slot.
pub fn directive(f: impl Fn(&Node) + 'static) -> Value {
    Value::Directive(Rc::new(f))
}

// =============================================================================
// Conversions
// =============================================================================

/// Conversion into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Empty
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoValue for char {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

macro_rules! impl_into_value_display {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Text(self.to_string())
                }
            }
        )*
    };
}

impl_into_value_display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// A fragment becomes the list of nodes it stands for, so a cached value
/// renders the same nodes every time.
impl IntoValue for Node {
    fn into_value(self) -> Value {
        match self.node_type() {
            NodeType::Fragment => Value::List(self.fragment_nodes().into_iter().map(Value::Node).collect()),
            _ => Value::Node(self),
        }
    }
}

impl IntoValue for &Node {
    fn into_value(self) -> Value {
        self.clone().into_value()
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Empty, IntoValue::into_value)
    }
}

/// Template errors inside nested views are logged and render nothing.
impl<T: IntoValue> IntoValue for Result<T, Error> {
    fn into_value(self) -> Value {
        match self {
            Ok(value) => value.into_value(),
            Err(err) => {
                error!("nested template failed: {err}");
                Value::Empty
            }
        }
    }
}

impl IntoValue for Rc<dyn Render> {
    fn into_value(self) -> Value {
        Value::Render(self)
    }
}

impl IntoValue for Rc<dyn Fn() -> Value> {
    fn into_value(self) -> Value {
        Value::Function(self)
    }
}

impl<F, R> IntoValue for F
where
    F: Fn() -> R + 'static,
    R: IntoValue,
{
    fn into_value(self) -> Value {
        Value::Function(Rc::new(move || self().into_value()))
    }
}

fn reactive<T, S>(signal: S) -> Value
where
    T: IntoValue + Clone + 'static,
    S: Readable<T> + 'static,
{
    Value::Reactive(ReadSignal::new(Derived::new(move || signal.get().into_value())))
}

impl<T: IntoValue + Clone + 'static> IntoValue for Signal<T> {
    fn into_value(self) -> Value {
        reactive(self)
    }
}

impl<T: IntoValue + Clone + 'static> IntoValue for &Signal<T> {
    fn into_value(self) -> Value {
        reactive(self.clone())
    }
}

impl<T: IntoValue + Clone + 'static> IntoValue for Derived<T> {
    fn into_value(self) -> Value {
        reactive(self)
    }
}

impl<T: IntoValue + Clone + 'static> IntoValue for &Derived<T> {
    fn into_value(self) -> Value {
        reactive(self.clone())
    }
}

impl<T: IntoValue + Clone + 'static> IntoValue for ReadSignal<T> {
    fn into_value(self) -> Value {
        reactive(self)
    }
}

impl<T: IntoValue + Clone + 'static> IntoValue for Deferred<T> {
    fn into_value(self) -> Value {
        reactive(self)
    }
}
