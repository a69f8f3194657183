//! Deep cloning of object graphs across stores.
//!
//! Objects live in arenas (a [`Heap`](crate::heap::Heap) or a store) and
//! point at each other by [`ObjectId`]. Cloning walks the graph from a root,
//! reads each object from an [`ObjectSource`], and writes a fresh copy under
//! a fresh id into an [`ObjectSink`]. The clone shares no storage with the
//! original: mutating one never affects the other.
//!
//! A memo table maps source ids to clone ids for the duration of one
//! [`DeepCloner`]. An object reached twice is cloned once, so shared
//! sub-graphs stay shared and cycles terminate, pointing back into the
//! clone rather than the original.

use std::collections::HashMap;

use tracing::debug;
use vmstate_types::{
    ArrayValue, Block, MapValue, Object, ObjectId, ObjectInfo, PackageValue, PkgId, StructField,
    StructValue, Value,
};

use crate::alloc::Allocator;
use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

/// Somewhere objects can be read from.
pub trait ObjectSource {
    fn load_object(&self, id: &ObjectId) -> StoreResult<Option<Object>>;
}

/// Somewhere cloned objects can be written to.
pub trait ObjectSink {
    /// Hand out a fresh id for an object about to be written.
    fn reserve_object_id(&mut self) -> StoreResult<ObjectId>;

    /// Store an object under the id in its info.
    fn put_object(&mut self, obj: Object) -> StoreResult<()>;
}

/// Reads objects from a [`Store`].
pub struct StoreSource<'a>(pub &'a dyn Store);

impl ObjectSource for StoreSource<'_> {
    fn load_object(&self, id: &ObjectId) -> StoreResult<Option<Object>> {
        self.0.get_object(id)
    }
}

/// Writes objects into a [`Store`], allocating ids in one package.
pub struct StoreSink<'a> {
    store: &'a dyn Store,
    pkg: PkgId,
}

impl<'a> StoreSink<'a> {
    pub fn new(store: &'a dyn Store, pkg: PkgId) -> Self {
        Self { store, pkg }
    }
}

impl ObjectSink for StoreSink<'_> {
    fn reserve_object_id(&mut self) -> StoreResult<ObjectId> {
        self.store.next_object_id(&self.pkg)
    }

    fn put_object(&mut self, obj: Object) -> StoreResult<()> {
        self.store.set_object(&obj)
    }
}

/// An object whose clone id is reserved but whose copy is not yet written.
struct Pending {
    original: Object,
    info: ObjectInfo,
}

/// One deep-clone operation.
///
/// Every composite cloned is charged to the allocator for its shallow
/// footprint before its children are visited. The graph is walked with an
/// explicit work list, so nesting depth is bounded only by memory.
pub struct DeepCloner<'a> {
    alloc: &'a Allocator,
    memo: HashMap<ObjectId, ObjectId>,
}

impl<'a> DeepCloner<'a> {
    pub fn new(alloc: &'a Allocator) -> Self {
        Self {
            alloc,
            memo: HashMap::new(),
        }
    }

    /// Number of objects cloned so far.
    pub fn cloned(&self) -> usize {
        self.memo.len()
    }

    /// Clone a value. Scalars are copied; references are cloned deeply.
    pub fn clone_value<S, D>(&mut self, src: &S, dst: &mut D, value: &Value) -> StoreResult<Value>
    where
        S: ObjectSource + ?Sized,
        D: ObjectSink + ?Sized,
    {
        match value {
            Value::Ref(id) => Ok(Value::Ref(self.clone_graph(src, dst, id)?)),
            scalar => Ok(scalar.clone()),
        }
    }

    /// Clone the object `id` names. `None` clones to `None`.
    pub fn clone_object<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        id: Option<&ObjectId>,
    ) -> StoreResult<Option<ObjectId>>
    where
        S: ObjectSource + ?Sized,
        D: ObjectSink + ?Sized,
    {
        match id {
            Some(id) => self.clone_graph(src, dst, id).map(Some),
            None => Ok(None),
        }
    }

    fn clone_graph<S, D>(&mut self, src: &S, dst: &mut D, root: &ObjectId) -> StoreResult<ObjectId>
    where
        S: ObjectSource + ?Sized,
        D: ObjectSink + ?Sized,
    {
        let mut work = Vec::new();
        let new_root = self.visit(src, dst, root, None, &mut work)?;
        while let Some(pending) = work.pop() {
            let cloned = self.rebuild(src, dst, pending, &mut work)?;
            dst.put_object(cloned)?;
        }
        Ok(new_root)
    }

    /// Map `id` to its clone id, queueing the object on first sight.
    fn visit<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        id: &ObjectId,
        owner: Option<ObjectId>,
        work: &mut Vec<Pending>,
    ) -> StoreResult<ObjectId>
    where
        S: ObjectSource + ?Sized,
        D: ObjectSink + ?Sized,
    {
        if let Some(done) = self.memo.get(id) {
            return Ok(*done);
        }

        let original = src
            .load_object(id)?
            .ok_or(StoreError::ObjectNotFound(*id))?;
        self.alloc.allocate_object(&original)?;

        // Registered before any child is visited so cycles resolve to the clone.
        let new_id = dst.reserve_object_id()?;
        self.memo.insert(*id, new_id);

        let info = match owner {
            Some(owner) => ObjectInfo::owned_by(new_id, owner),
            None => ObjectInfo::new(new_id),
        };
        work.push(Pending { original, info });
        Ok(new_id)
    }

    fn child<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        value: &Value,
        owner: ObjectId,
        work: &mut Vec<Pending>,
    ) -> StoreResult<Value>
    where
        S: ObjectSource + ?Sized,
        D: ObjectSink + ?Sized,
    {
        match value {
            Value::Ref(id) => Ok(Value::Ref(self.visit(src, dst, id, Some(owner), work)?)),
            scalar => Ok(scalar.clone()),
        }
    }

    fn children<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        values: &[Value],
        owner: ObjectId,
        work: &mut Vec<Pending>,
    ) -> StoreResult<Vec<Value>>
    where
        S: ObjectSource + ?Sized,
        D: ObjectSink + ?Sized,
    {
        values
            .iter()
            .map(|v| self.child(src, dst, v, owner, work))
            .collect()
    }

    /// Build the copy of one object. Its children are only mapped to their
    /// reserved ids here; their own copies are built from the work list.
    fn rebuild<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        pending: Pending,
        work: &mut Vec<Pending>,
    ) -> StoreResult<Object>
    where
        S: ObjectSource + ?Sized,
        D: ObjectSink + ?Sized,
    {
        let Pending { original, info } = pending;
        let owner = info.id;
        let cloned = match original {
            Object::Block(b) => Object::Block(Block {
                info,
                values: self.children(src, dst, &b.values, owner, work)?,
            }),
            Object::Array(a) => Object::Array(ArrayValue {
                info,
                list: self.children(src, dst, &a.list, owner, work)?,
            }),
            Object::Struct(s) => {
                let mut fields = Vec::with_capacity(s.fields.len());
                for field in &s.fields {
                    let value = self.child(src, dst, &field.value, owner, work)?;
                    fields.push(StructField::new(field.name.clone(), value));
                }
                Object::Struct(StructValue { info, fields })
            }
            Object::Map(m) => {
                let mut map = MapValue::new();
                map.info = info;
                for entry in &m.list {
                    let key = self.child(src, dst, &entry.key, owner, work)?;
                    let value = self.child(src, dst, &entry.value, owner, work)?;
                    map.set(key, value);
                }
                Object::Map(map)
            }
            Object::Package(p) => Object::Package(PackageValue {
                info,
                name: p.name,
                path: p.path,
                block: self.visit(src, dst, &p.block, Some(owner), work)?,
                fnames: p.fnames,
            }),
        };
        Ok(cloned)
    }
}

/// Clone `value` from `src` into `dst` with a fresh memo table.
pub fn deep_clone_value<S, D>(
    src: &S,
    dst: &mut D,
    alloc: &Allocator,
    value: &Value,
) -> StoreResult<Value>
where
    S: ObjectSource + ?Sized,
    D: ObjectSink + ?Sized,
{
    let mut cloner = DeepCloner::new(alloc);
    let out = cloner.clone_value(src, dst, value)?;
    debug!(objects = cloner.cloned(), "value cloned");
    Ok(out)
}

/// Clone the object `id` names from `src` into `dst` with a fresh memo table.
pub fn deep_clone_object<S, D>(
    src: &S,
    dst: &mut D,
    alloc: &Allocator,
    id: Option<&ObjectId>,
) -> StoreResult<Option<ObjectId>>
where
    S: ObjectSource + ?Sized,
    D: ObjectSink + ?Sized,
{
    DeepCloner::new(alloc).clone_object(src, dst, id)
}

/// Move `value` across a store boundary: clone it out of `src` into `dst`,
/// allocating new ids under `pkg` and charging `dst`'s allocator.
pub fn transfer_value(
    src: &dyn Store,
    dst: &dyn Store,
    pkg: PkgId,
    value: &Value,
) -> StoreResult<Value> {
    let alloc = dst.allocator();
    let mut sink = StoreSink::new(dst, pkg);
    deep_clone_value(&StoreSource(src), &mut sink, &alloc, value)
}
