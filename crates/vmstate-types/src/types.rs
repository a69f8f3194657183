use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a declared type: `<pkg_path>.<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(String);

impl TypeId {
    pub fn new(pkg_path: &str, name: &str) -> Self {
        Self(format!("{pkg_path}.{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
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
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
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
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub ty: Type,
}

/// Structural description of a type.
///
/// Named types are referenced by [`TypeId`] rather than embedded, so a
/// recursive declaration (a struct holding a pointer to itself) is finite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Primitive(PrimitiveType),
    Declared(TypeId),
    Pointer(Box<Type>),
    Array { len: u64, elem: Box<Type> },
    Slice(Box<Type>),
    Map { key: Box<Type>, value: Box<Type> },
    Struct(Vec<FieldType>),
    Func { params: Vec<Type>, results: Vec<Type> },
}

impl Type {
    pub const BOOL: Type = Type::Primitive(PrimitiveType::Bool);
    pub const INT: Type = Type::Primitive(PrimitiveType::Int);
    pub const STRING: Type = Type::Primitive(PrimitiveType::String);
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
            for (i, t) in types.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{t}")?;
            }
            Ok(())
        }

        match self {
            Self::Primitive(p) => write!(f, "{p}"),
            Self::Declared(id) => write!(f, "{id}"),
            Self::Pointer(t) => write!(f, "*{t}"),
            Self::Array { len, elem } => write!(f, "[{len}]{elem}"),
            Self::Slice(t) => write!(f, "[]{t}"),
            Self::Map { key, value } => write!(f, "map[{key}]{value}"),
            Self::Struct(fields) => {
                f.write_str("struct{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{} {}", field.name, field.ty)?;
                }
                f.write_str("}")
            }
            Self::Func { params, results } => {
                f.write_str("func(")?;
                list(f, params)?;
                f.write_str(")")?;
                match results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", results[0]),
                    _ => {
                        f.write_str(" (")?;
                        list(f, results)?;
                        f.write_str(")")
                    }
                }
            }
        }
    }
}

/// A named type declared in a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredType {
    pub pkg_path: String,
    pub name: String,
    pub base: Type,
    pub methods: Vec<String>,
}

impl DeclaredType {
    pub fn new(pkg_path: impl Into<String>, name: impl Into<String>, base: Type) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            name: name.into(),
            base,
            methods: Vec::new(),
        }
    }

    pub fn id(&self) -> TypeId {
        TypeId::new(&self.pkg_path, &self.name)
    }
}
