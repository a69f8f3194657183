//! Value model for the VM state store.
//!
//! This crate provides the runtime values, object identities, package
//! bundles, and declared types that the store persists and caches. Every
//! other `vmstate` crate depends on `vmstate-types`.
//!
//! # Key Types
//!
//! - [`Value`] -- Scalar runtime value or a reference to a composite [`Object`]
//! - [`Object`] -- Composite value (block, array, struct, map, package)
//! - [`ObjectInfo`] -- Identity and ownership metadata carried by every object
//! - [`ObjectId`] -- Store-scoped object identifier (package id + creation time)
//! - [`MemPackage`] -- Path-identified bundle of source files
//! - [`DeclaredType`] -- Named, package-scoped type definition

pub mod composite;
pub mod error;
pub mod object;
pub mod package;
pub mod types;
pub mod value;

pub use composite::{
    ArrayValue, Block, MapEntry, MapKey, MapValue, Object, ObjectKind, PackageValue, StructField,
    StructValue,
};
pub use error::TypeError;
pub use object::{ObjectId, ObjectInfo, PkgId};
pub use package::{MemFile, MemPackage, MemPackageType};
pub use types::{DeclaredType, FieldType, PrimitiveType, Type, TypeId};
pub use value::{Kind, Value};
