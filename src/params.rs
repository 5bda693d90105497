//! Positional Parameter Binding
//!
//! Resolves a loosely typed, variable-length argument list against declared
//! names, kinds and defaults, so callers can pass 1, 2 or N arguments and let
//! the rest fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, warn};

use crate::error::{PopupError, Result};

/// A point on screen (display pixels or terminal cells, depending on the host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Parse `"x,y"`, tolerating whitespace around both parts
    pub fn parse(raw: &str) -> Option<Self> {
        let (x, y) = raw.split_once(',')?;
        Some(Self {
            x: x.trim().parse().ok()?,
            y: y.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Declared kind of a parameter position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Text,
    Integer,
    Decimal,
    Boolean,
    Location,
}

impl Kind {
    /// Accepts the one-letter codes (`s`, `i`, `d`, `b`, `e`/`l`) as well as
    /// the spelled-out names, case-insensitively.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "s" | "text" | "string" => Some(Kind::Text),
            "i" | "integer" | "int" => Some(Kind::Integer),
            "d" | "decimal" | "double" => Some(Kind::Decimal),
            "b" | "boolean" | "bool" => Some(Kind::Boolean),
            "e" | "l" | "location" | "region" | "point" => Some(Kind::Location),
            _ => None,
        }
    }
}

/// A supplied or default argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Location(Location),
}

impl Value {
    /// Runtime kind of this value
    pub fn kind(&self) -> Kind {
        match self {
            Value::Text(_) => Kind::Text,
            Value::Integer(_) => Kind::Integer,
            Value::Decimal(_) => Kind::Decimal,
            Value::Boolean(_) => Kind::Boolean,
            Value::Location(_) => Kind::Location,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Value::Decimal(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<Location> {
        match self {
            Value::Location(l) => Some(*l),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Decimal(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Location> for Value {
    fn from(l: Location) -> Self {
        Value::Location(l)
    }
}

/// Build a `Vec<Value>` from mixed literals:
/// `popup_args!["Proceed?", "Deploy", "", false, 1000]`
#[macro_export]
macro_rules! popup_args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::params::Value::from($arg)),*]
    };
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    /// `None` when the declared kind was not recognised; such a slot never
    /// accepts a supplied argument.
    kind: Option<Kind>,
    default: Value,
}

/// Declared names, kinds and defaults of a variadic call
#[derive(Debug, Clone)]
pub struct ParamSpec {
    slots: Vec<Slot>,
}

impl ParamSpec {
    /// Build a spec from comma-separated `names` and `kinds` plus one default
    /// per name.
    pub fn parse(names: &str, kinds: &str, defaults: Vec<Value>) -> Result<Self> {
        let names: Vec<&str> = names.split(',').map(str::trim).collect();
        let kinds: Vec<&str> = kinds.split(',').map(str::trim).collect();

        if names.len() != kinds.len() {
            return Err(PopupError::ParameterMismatch {
                names: names.len(),
                kinds: kinds.len(),
            });
        }
        if defaults.len() < names.len() {
            return Err(PopupError::MissingDefaults {
                expected: names.len(),
                found: defaults.len(),
            });
        }

        let slots = names
            .into_iter()
            .zip(kinds)
            .zip(defaults)
            .map(|((name, code), default)| {
                let kind = Kind::parse(code);
                if kind.is_none() {
                    warn!("Parameter {} has unknown kind {:?}, default only", name, code);
                }
                Slot {
                    name: name.to_string(),
                    kind,
                    default,
                }
            })
            .collect();

        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Declared names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Bind positionally: argument `i` fills position `i` only when its
    /// runtime kind matches the declared kind. A mismatched argument is
    /// dropped and the position keeps its default.
    pub fn bind(&self, args: &[Value]) -> Bindings {
        let mut values = HashMap::with_capacity(self.slots.len());

        for (index, slot) in self.slots.iter().enumerate() {
            let value = match args.get(index) {
                Some(arg) if Some(arg.kind()) == slot.kind => arg.clone(),
                Some(arg) => {
                    debug!(
                        "Parameter {}: {:?} does not match {:?}, using default",
                        slot.name,
                        arg.kind(),
                        slot.kind
                    );
                    slot.default.clone()
                }
                None => slot.default.clone(),
            };
            values.insert(slot.name.clone(), value);
        }

        if args.len() > self.slots.len() {
            debug!(
                "Ignoring {} surplus argument(s)",
                args.len() - self.slots.len()
            );
        }

        Bindings { values }
    }
}

/// Parse a spec and bind `args` against it in one step. A broken spec is a
/// configuration error: it is logged and produces no bindings at all.
pub fn bind_args(names: &str, kinds: &str, defaults: Vec<Value>, args: &[Value]) -> Bindings {
    match ParamSpec::parse(names, kinds, defaults) {
        Ok(spec) => spec.bind(args),
        Err(e) => {
            error!("Parameters: {} (names: {:?}, kinds: {:?})", e, names, kinds);
            Bindings::default()
        }
    }
}

/// Resolved name → value map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_integer)
    }

    pub fn decimal(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_decimal)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_boolean)
    }

    pub fn location(&self, name: &str) -> Option<Location> {
        self.get(name).and_then(Value::as_location)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> ParamSpec {
        ParamSpec::parse(
            "message,title,hidden,timeout",
            "s,s,b,i",
            vec![
                Value::from("not set"),
                Value::from("App"),
                Value::from(false),
                Value::from(i64::MAX),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_no_args_yields_defaults() {
        let bound = sample_spec().bind(&[]);
        assert_eq!(bound.len(), 4);
        assert_eq!(bound.text("message"), Some("not set"));
        assert_eq!(bound.text("title"), Some("App"));
        assert_eq!(bound.boolean("hidden"), Some(false));
        assert_eq!(bound.integer("timeout"), Some(i64::MAX));
    }

    #[test]
    fn test_leading_args_fill_trailing_defaults() {
        let bound = sample_spec().bind(&popup_args!["Hello", "Greeting"]);
        assert_eq!(bound.text("message"), Some("Hello"));
        assert_eq!(bound.text("title"), Some("Greeting"));
        assert_eq!(bound.boolean("hidden"), Some(false));
    }

    #[test]
    fn test_mismatched_arg_keeps_default_and_is_dropped() {
        // 1000 sits at the title position: title keeps its default and the
        // integer is not retried against the later timeout position.
        let bound = sample_spec().bind(&popup_args!["Hello", 1000]);
        assert_eq!(bound.text("title"), Some("App"));
        assert_eq!(bound.integer("timeout"), Some(i64::MAX));
    }

    #[test]
    fn test_later_positions_still_bind_after_mismatch() {
        let bound = sample_spec().bind(&popup_args!["Hello", 7, true, 250]);
        assert_eq!(bound.text("title"), Some("App"));
        assert_eq!(bound.boolean("hidden"), Some(true));
        assert_eq!(bound.integer("timeout"), Some(250));
    }

    #[test]
    fn test_text_and_integer_scenario() {
        let bound = bind_args(
            "a,b",
            "Text,Integer",
            vec![Value::from("da"), Value::from(42)],
            &popup_args!["x"],
        );
        assert_eq!(bound.text("a"), Some("x"));
        assert_eq!(bound.integer("b"), Some(42));
    }

    #[test]
    fn test_length_mismatch_produces_nothing() {
        let bound = bind_args(
            "a,b,c",
            "s,i",
            vec![Value::from(""), Value::from(0), Value::from(0)],
            &popup_args!["x"],
        );
        assert!(bound.is_empty());

        let err = ParamSpec::parse("a,b", "s", vec![]).unwrap_err();
        assert!(matches!(err, PopupError::ParameterMismatch { names: 2, kinds: 1 }));
    }

    #[test]
    fn test_missing_defaults_rejected() {
        let err = ParamSpec::parse("a,b", "s,s", vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, PopupError::MissingDefaults { expected: 2, found: 1 }));
    }

    #[test]
    fn test_unknown_kind_never_accepts() {
        let spec = ParamSpec::parse("a", "widget", vec![Value::from("keep")]).unwrap();
        assert_eq!(spec.bind(&popup_args!["other"]).text("a"), Some("keep"));
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(Kind::parse("S"), Some(Kind::Text));
        assert_eq!(Kind::parse(" i "), Some(Kind::Integer));
        assert_eq!(Kind::parse("double"), Some(Kind::Decimal));
        assert_eq!(Kind::parse("Boolean"), Some(Kind::Boolean));
        assert_eq!(Kind::parse("e"), Some(Kind::Location));
        assert_eq!(Kind::parse("region"), Some(Kind::Location));
        assert_eq!(Kind::parse("x"), None);
    }

    #[test]
    fn test_surplus_args_ignored() {
        let spec = ParamSpec::parse("a", "s", vec![Value::from("")]).unwrap();
        let bound = spec.bind(&popup_args!["one", "two", "three"]);
        assert_eq!(bound.len(), 1);
        assert_eq!(bound.text("a"), Some("one"));
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(Location::parse("10, 20"), Some(Location::new(10, 20)));
        assert_eq!(Location::parse("-5,7"), Some(Location::new(-5, 7)));
        assert_eq!(Location::parse("10"), None);
        assert_eq!(Location::parse("a,b"), None);
        assert_eq!(Location::new(3, 4).to_string(), "3,4");
    }
}
