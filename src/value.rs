//! # Values
//!
//! Owned, value-typed payloads for spec fields and time samples. Inverse
//! operations store these by value rather than holding references into a live
//! layer, so a captured inverse stays valid even if the spec it refers to is
//! destroyed and later re-created.

/// A field value.
#[derive(Clone, Debug, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vec3([f64; 3]),
    /// Short symbolic name, e.g. a type name or child name.
    Token(String),
    Str(String),
    List(Vec<Value>),
    Dict(hashbrown::HashMap<String, Value>),
}

impl Value {
    /// Name of this value's kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }
    #[must_use]
    pub fn token(name: impl Into<String>) -> Self {
        Self::Token(name.into())
    }
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
    pub(crate) fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_dict(&self) -> Option<&hashbrown::HashMap<String, Value>> {
        match self {
            Self::Dict(entries) => Some(entries),
            _ => None,
        }
    }
    pub(crate) fn as_dict_mut(&mut self) -> Option<&mut hashbrown::HashMap<String, Value>> {
        match self {
            Self::Dict(entries) => Some(entries),
            _ => None,
        }
    }
}

/// A time coordinate keying one sample of a time-varying field.
///
/// Wraps `f64` with a total order (`total_cmp`) so samples can live in a
/// `BTreeMap`. NaN times are representable but sort after everything else;
/// callers are expected not to use them.
#[derive(Copy, Clone, Debug)]
pub struct TimeCode(pub f64);

impl PartialEq for TimeCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == std::cmp::Ordering::Equal
    }
}
impl Eq for TimeCode {}
impl PartialOrd for TimeCode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimeCode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}
impl From<f64> for TimeCode {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
impl std::fmt::Display for TimeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
