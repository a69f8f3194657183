use std::collections::BTreeMap;

use vmstate_types::{Object, ObjectId, PkgId, Value};

use crate::alloc::Allocator;
use crate::clone::{deep_clone_value, ObjectSink, ObjectSource};
use crate::error::StoreResult;

/// An object arena outside any store.
///
/// The evaluator builds object graphs here before persisting them. Ids are
/// allocated under one package with a monotonically increasing time, and
/// are never reused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heap {
    pkg: PkgId,
    next_time: u64,
    objects: BTreeMap<ObjectId, Object>,
}

impl Heap {
    /// An empty heap allocating ids for the package at `pkg_path`.
    pub fn new(pkg_path: &str) -> Self {
        Self::for_package(PkgId::from_path(pkg_path))
    }

    pub fn for_package(pkg: PkgId) -> Self {
        Self {
            pkg,
            next_time: 1,
            objects: BTreeMap::new(),
        }
    }

    pub fn pkg(&self) -> PkgId {
        self.pkg
    }

    /// Place `obj` in the heap under a fresh id, overwriting whatever id it
    /// carried. Returns the id.
    pub fn alloc(&mut self, mut obj: Object) -> ObjectId {
        let id = self.fresh_id();
        obj.info_mut().id = id;
        self.objects.insert(id, obj);
        id
    }

    pub fn get(&self, id: &ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    pub fn remove(&mut self, id: &ObjectId) -> Option<Object> {
        self.objects.remove(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &Object)> {
        self.objects.iter()
    }

    /// Deep-clone `value` within this heap.
    pub fn deep_clone(&mut self, alloc: &Allocator, value: &Value) -> StoreResult<Value> {
        let mut scratch = Heap {
            pkg: self.pkg,
            next_time: self.next_time,
            objects: BTreeMap::new(),
        };
        let cloned = deep_clone_value(&*self, &mut scratch, alloc, value)?;
        self.next_time = scratch.next_time;
        self.objects.extend(scratch.objects);
        Ok(cloned)
    }

    fn fresh_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.pkg, self.next_time);
        self.next_time += 1;
        id
    }
}

impl ObjectSource for Heap {
    fn load_object(&self, id: &ObjectId) -> StoreResult<Option<Object>> {
        Ok(self.objects.get(id).cloned())
    }
}

impl ObjectSink for Heap {
    fn reserve_object_id(&mut self) -> StoreResult<ObjectId> {
        Ok(self.fresh_id())
    }

    fn put_object(&mut self, obj: Object) -> StoreResult<()> {
        self.objects.insert(obj.id(), obj);
        Ok(())
    }
}
