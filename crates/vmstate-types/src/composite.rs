use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::object::{ObjectId, ObjectInfo, PkgId};
use crate::value::Value;

/// The kind of a composite object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Block,
    Array,
    Struct,
    Map,
    Package,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Array => write!(f, "array"),
            Self::Struct => write!(f, "struct"),
            Self::Map => write!(f, "map"),
            Self::Package => write!(f, "package"),
        }
    }
}

/// A composite value held in an object arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Object {
    Block(Block),
    Array(ArrayValue),
    Struct(StructValue),
    Map(MapValue),
    Package(PackageValue),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Block(_) => ObjectKind::Block,
            Self::Array(_) => ObjectKind::Array,
            Self::Struct(_) => ObjectKind::Struct,
            Self::Map(_) => ObjectKind::Map,
            Self::Package(_) => ObjectKind::Package,
        }
    }

    pub fn info(&self) -> &ObjectInfo {
        match self {
            Self::Block(b) => &b.info,
            Self::Array(a) => &a.info,
            Self::Struct(s) => &s.info,
            Self::Map(m) => &m.info,
            Self::Package(p) => &p.info,
        }
    }

    pub fn info_mut(&mut self) -> &mut ObjectInfo {
        match self {
            Self::Block(b) => &mut b.info,
            Self::Array(a) => &mut a.info,
            Self::Struct(s) => &mut s.info,
            Self::Map(m) => &mut m.info,
            Self::Package(p) => &mut p.info,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.info().id
    }

    /// Ids of every object this object references directly, in field order.
    pub fn children(&self) -> Vec<ObjectId> {
        match self {
            Self::Block(b) => collect_refs(b.values.iter()),
            Self::Array(a) => collect_refs(a.list.iter()),
            Self::Struct(s) => collect_refs(s.fields.iter().map(|f| &f.value)),
            Self::Map(m) => collect_refs(m.list.iter().flat_map(|e| [&e.key, &e.value])),
            Self::Package(p) => vec![p.block],
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Self::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Self::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut ArrayValue> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapValue> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_package(&self) -> Option<&PackageValue> {
        match self {
            Self::Package(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_package_mut(&mut self) -> Option<&mut PackageValue> {
        match self {
            Self::Package(p) => Some(p),
            _ => None,
        }
    }
}

fn collect_refs<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<ObjectId> {
    values.filter_map(|v| v.object_id().copied()).collect()
}

impl From<Block> for Object {
    fn from(b: Block) -> Self {
        Self::Block(b)
    }
}

impl From<ArrayValue> for Object {
    fn from(a: ArrayValue) -> Self {
        Self::Array(a)
    }
}

impl From<StructValue> for Object {
    fn from(s: StructValue) -> Self {
        Self::Struct(s)
    }
}

impl From<MapValue> for Object {
    fn from(m: MapValue) -> Self {
        Self::Map(m)
    }
}

impl From<PackageValue> for Object {
    fn from(p: PackageValue) -> Self {
        Self::Package(p)
    }
}

// ---------------------------------------------------------------------------
// Block / Array / Struct
// ---------------------------------------------------------------------------

/// An ordered block of values: one lexical scope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub info: ObjectInfo,
    pub values: Vec<Value>,
}

impl Block {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            info: ObjectInfo::default(),
            values,
        }
    }
}

/// A fixed-size array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub info: ObjectInfo,
    pub list: Vec<Value>,
}

impl ArrayValue {
    pub fn new(list: Vec<Value>) -> Self {
        Self {
            info: ObjectInfo::default(),
            list,
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// A named struct field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub value: Value,
}

impl StructField {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A struct with ordered, named fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructValue {
    pub info: ObjectInfo,
    pub fields: Vec<StructField>,
}

impl StructValue {
    pub fn new(fields: Vec<StructField>) -> Self {
        Self {
            info: ObjectInfo::default(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .map(|f| &mut f.value)
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// Lookup key computed from a map key value.
///
/// Scalars hash by kind and payload, so `Int(1)` and `Uint(1)` are distinct
/// keys. References hash by object identity: two keys pointing at different
/// objects are different even if the objects hold equal contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapKey(Vec<u8>);

impl MapKey {
    pub fn compute(key: &Value) -> Self {
        let mut bytes = vec![key.kind().tag()];
        match key {
            Value::Nil => {}
            Value::Bool(b) => bytes.push(u8::from(*b)),
            Value::Int(v) | Value::Int64(v) => bytes.extend_from_slice(&v.to_be_bytes()),
            Value::Int8(v) => bytes.extend_from_slice(&v.to_be_bytes()),
            Value::Int16(v) => bytes.extend_from_slice(&v.to_be_bytes()),
            Value::Int32(v) => bytes.extend_from_slice(&v.to_be_bytes()),
            Value::Uint(v) | Value::Uint64(v) => bytes.extend_from_slice(&v.to_be_bytes()),
            Value::Uint8(v) => bytes.push(*v),
            Value::Uint16(v) => bytes.extend_from_slice(&v.to_be_bytes()),
            Value::Uint32(v) => bytes.extend_from_slice(&v.to_be_bytes()),
            Value::String(s) => bytes.extend_from_slice(s.as_bytes()),
            Value::Ref(id) => bytes.extend_from_slice(&id.to_bytes()),
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// One key/value association of a [`MapValue`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Value,
    pub value: Value,
}

/// An insertion-ordered map.
///
/// Entries live in `list` in insertion order; `index` maps each computed
/// [`MapKey`] to its position in `list`. The index is derived data: it is
/// never serialized and must be rebuilt with [`MapValue::rebuild_index`]
/// after decoding or after editing `list` directly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapValue {
    pub info: ObjectInfo,
    pub list: Vec<MapEntry>,
    #[serde(skip)]
    index: HashMap<MapKey, usize>,
}

impl PartialEq for MapValue {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && self.list == other.list
    }
}

impl Eq for MapValue {}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from entries in order. Later duplicates overwrite the
    /// value of the first occurrence without moving it.
    pub fn from_entries(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut map = Self::new();
        for (k, v) in entries {
            map.set(k, v);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        let pos = *self.index.get(&MapKey::compute(key))?;
        self.list.get(pos).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        let pos = *self.index.get(&MapKey::compute(key))?;
        self.list.get_mut(pos).map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(&MapKey::compute(key))
    }

    /// Insert or update. An update keeps the entry's original position.
    /// Returns the previous value, if any.
    pub fn set(&mut self, key: Value, value: Value) -> Option<Value> {
        let mk = MapKey::compute(&key);
        if let Some(&pos) = self.index.get(&mk) {
            return Some(std::mem::replace(&mut self.list[pos].value, value));
        }
        self.index.insert(mk, self.list.len());
        self.list.push(MapEntry { key, value });
        None
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let pos = self.index.remove(&MapKey::compute(key))?;
        let entry = self.list.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.list.iter().map(|e| (&e.key, &e.value))
    }

    /// Recompute the lookup index from `list`.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, entry) in self.list.iter().enumerate() {
            self.index.entry(MapKey::compute(&entry.key)).or_insert(pos);
        }
    }

    /// Number of keys in the lookup index.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// A loaded package: its top-level block plus exported function names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageValue {
    pub info: ObjectInfo,
    pub name: String,
    pub path: String,
    /// The package's top-level block. Always present.
    pub block: ObjectId,
    pub fnames: Vec<String>,
}

impl PackageValue {
    pub fn new(name: impl Into<String>, path: impl Into<String>, block: ObjectId) -> Self {
        Self {
            info: ObjectInfo::default(),
            name: name.into(),
            path: path.into(),
            block,
            fnames: Vec::new(),
        }
    }

    pub fn pkg_id(&self) -> PkgId {
        PkgId::from_path(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn oid(t: u64) -> ObjectId {
        ObjectId::new(PkgId::from_path("p"), t)
    }

    #[test]
    fn object_kind_display() {
        assert_eq!(ObjectKind::Block.to_string(), "block");
        assert_eq!(ObjectKind::Map.to_string(), "map");
        assert_eq!(ObjectKind::Package.to_string(), "package");
    }

    #[test]
    fn children_follow_field_order() {
        let s = StructValue::new(vec![
            StructField::new("a", Value::Ref(oid(2))),
            StructField::new("b", Value::Int(1)),
            StructField::new("c", Value::Ref(oid(1))),
        ]);
        assert_eq!(Object::from(s).children(), vec![oid(2), oid(1)]);

        let pkg = PackageValue::new("p", "p", oid(9));
        assert_eq!(Object::from(pkg).children(), vec![oid(9)]);
    }

    #[test]
    fn map_children_include_keys_and_values() {
        let m = MapValue::from_entries([(Value::Ref(oid(1)), Value::Ref(oid(2)))]);
        assert_eq!(Object::from(m).children(), vec![oid(1), oid(2)]);
    }

    #[test]
    fn struct_field_lookup() {
        let mut s = StructValue::new(vec![StructField::new("x", Value::Int(1))]);
        assert_eq!(s.field("x"), Some(&Value::Int(1)));
        *s.field_mut("x").unwrap() = Value::Int(2);
        assert_eq!(s.field("x"), Some(&Value::Int(2)));
        assert!(s.field("y").is_none());
    }

    #[test]
    fn map_keys_distinguish_kinds() {
        assert_ne!(
            MapKey::compute(&Value::Int(1)),
            MapKey::compute(&Value::Uint(1))
        );
        assert_ne!(
            MapKey::compute(&Value::from("a")),
            MapKey::compute(&Value::from("b"))
        );
        assert_eq!(MapKey::compute(&Value::Nil), MapKey::compute(&Value::Nil));
    }

    #[test]
    fn map_preserves_insertion_order_on_update() {
        let mut m = MapValue::new();
        m.set("b".into(), Value::Int(1));
        m.set("a".into(), Value::Int(2));
        assert_eq!(m.set("b".into(), Value::Int(3)), Some(Value::Int(1)));
        let keys: Vec<_> = m.iter().map(|(k, _)| k.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(m.get(&"b".into()), Some(&Value::Int(3)));
    }

    #[test]
    fn map_remove_reindexes_tail() {
        let mut m = MapValue::from_entries([
            ("a".into(), Value::Int(1)),
            ("b".into(), Value::Int(2)),
            ("c".into(), Value::Int(3)),
        ]);
        assert_eq!(m.remove(&"a".into()), Some(Value::Int(1)));
        assert_eq!(m.get(&"c".into()), Some(&Value::Int(3)));
        assert_eq!(m.get(&"b".into()), Some(&Value::Int(2)));
        assert_eq!(m.len(), 2);
        assert!(m.remove(&"zz".into()).is_none());
    }

    #[test]
    fn map_index_rebuilt_after_decode() {
        let m = MapValue::from_entries([("k".into(), Value::Bool(true))]);
        let json = serde_json::to_string(&m).unwrap();
        let mut decoded: MapValue = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.index_len(), 0);
        decoded.rebuild_index();
        assert_eq!(decoded.get(&"k".into()), Some(&Value::Bool(true)));
        assert_eq!(decoded, m);
    }

    proptest! {
        #[test]
        fn map_matches_ordered_model(
            ops in prop::collection::vec((0i64..8, any::<Option<i64>>()), 0..64)
        ) {
            let mut map = MapValue::new();
            let mut model: Vec<(i64, i64)> = Vec::new();
            for (k, op) in ops {
                match op {
                    Some(v) => {
                        map.set(Value::Int(k), Value::Int(v));
                        match model.iter_mut().find(|e| e.0 == k) {
                            Some(e) => e.1 = v,
                            None => model.push((k, v)),
                        }
                    }
                    None => {
                        map.remove(&Value::Int(k));
                        model.retain(|e| e.0 != k);
                    }
                }
            }
            let got: Vec<(i64, i64)> = map
                .iter()
                .map(|(k, v)| (k.get_int().unwrap(), v.get_int().unwrap()))
                .collect();
            prop_assert_eq!(&got, &model);
            for (k, v) in model {
                prop_assert_eq!(map.get(&Value::Int(k)), Some(&Value::Int(v)));
            }
        }
    }
}
