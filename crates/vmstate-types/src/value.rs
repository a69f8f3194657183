use std::fmt;

use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// Kind tag of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Nil,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    String,
    Ref,
}

impl Kind {
    /// Stable one-byte tag used by map key computation.
    pub fn tag(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "nil",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::String => "string",
            Self::Ref => "ref",
        };
        f.write_str(name)
    }
}

/// A runtime value.
///
/// Scalars are held inline and copied by value. Composite values live in an
/// object arena and are reached through [`Value::Ref`]; copying a `Value`
/// therefore never duplicates an object, it only copies the reference.
/// Crossing a store boundary with a composite requires an explicit deep clone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint(u64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    String(String),
    Ref(ObjectId),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Nil => Kind::Nil,
            Self::Bool(_) => Kind::Bool,
            Self::Int(_) => Kind::Int,
            Self::Int8(_) => Kind::Int8,
            Self::Int16(_) => Kind::Int16,
            Self::Int32(_) => Kind::Int32,
            Self::Int64(_) => Kind::Int64,
            Self::Uint(_) => Kind::Uint,
            Self::Uint8(_) => Kind::Uint8,
            Self::Uint16(_) => Kind::Uint16,
            Self::Uint32(_) => Kind::Uint32,
            Self::Uint64(_) => Kind::Uint64,
            Self::String(_) => Kind::String,
            Self::Ref(_) => Kind::Ref,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Signed integer payload, widened to `i64`.
    pub fn get_int(&self) -> Option<i64> {
        match *self {
            Self::Int(v) | Self::Int64(v) => Some(v),
            Self::Int8(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Unsigned integer payload, widened to `u64`.
    pub fn get_uint(&self) -> Option<u64> {
        match *self {
            Self::Uint(v) | Self::Uint64(v) => Some(v),
            Self::Uint8(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Overwrite this value with an `int`.
    pub fn set_int(&mut self, v: i64) {
        *self = Self::Int(v);
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The referenced object id, if this value points at a composite.
    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Ref(id) => Some(id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Ref(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::PkgId;

    #[test]
    fn default_is_nil() {
        assert!(Value::default().is_nil());
        assert_eq!(Value::default().kind(), Kind::Nil);
    }

    #[test]
    fn integer_family_widens() {
        assert_eq!(Value::Int8(-3).get_int(), Some(-3));
        assert_eq!(Value::Int32(70_000).get_int(), Some(70_000));
        assert_eq!(Value::Uint16(9).get_uint(), Some(9));
        assert_eq!(Value::Uint8(1).get_int(), None);
        assert_eq!(Value::from("x").get_int(), None);
    }

    #[test]
    fn set_int_replaces_payload() {
        let mut v = Value::Int(42);
        v.set_int(100);
        assert_eq!(v.get_int(), Some(100));
    }

    #[test]
    fn ref_exposes_object_id() {
        let id = crate::ObjectId::new(PkgId::from_path("p"), 3);
        let v = Value::from(id);
        assert_eq!(v.kind(), Kind::Ref);
        assert_eq!(v.object_id(), Some(&id));
        assert_eq!(Value::Bool(true).object_id(), None);
    }

    #[test]
    fn kind_display() {
        assert_eq!(Kind::Uint32.to_string(), "uint32");
        assert_eq!(Value::from("s").kind().to_string(), "string");
    }

    #[test]
    fn serde_roundtrip() {
        let v = Value::String("hello".into());
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
