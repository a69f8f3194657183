use std::sync::atomic::{AtomicU64, Ordering};

use vmstate_types::{MemPackage, Object};

use crate::error::{StoreError, StoreResult};

// Shallow footprints, in bytes, charged per allocation.
const ALLOC_SLOT: u64 = 40;
const ALLOC_STRING: u64 = 24;
const ALLOC_BLOCK: u64 = 464;
const ALLOC_ARRAY: u64 = 176;
const ALLOC_STRUCT: u64 = 152;
const ALLOC_MAP: u64 = 144;
const ALLOC_MAP_ITEM: u64 = 2 * ALLOC_SLOT + 32;
const ALLOC_PACKAGE: u64 = 266;
const ALLOC_TYPE: u64 = 200;
const ALLOC_MEM_PACKAGE: u64 = 64;
const ALLOC_MEM_FILE: u64 = 48;

/// A byte budget with a usage counter.
///
/// Usage never exceeds the budget: an allocation that would overflow it
/// fails and leaves usage unchanged. The counter is atomic, so one
/// allocator can be shared (`&Allocator` or `Arc<Allocator>`) by a store,
/// its transactions, and any number of clone operations.
#[derive(Debug)]
pub struct Allocator {
    max: u64,
    used: AtomicU64,
}

impl Allocator {
    pub fn new(max: u64) -> Self {
        Self {
            max,
            used: AtomicU64::new(0),
        }
    }

    /// An allocator with no effective budget.
    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub fn remaining(&self) -> u64 {
        self.max - self.used()
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::Release);
    }

    /// Charge `size` bytes against the budget.
    pub fn allocate(&self, size: u64) -> StoreResult<()> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|next| *next <= self.max)
            })
            .map(|_| ())
            .map_err(|used| StoreError::OutOfMemory {
                requested: size,
                used,
                max: self.max,
            })
    }

    /// Return `size` bytes to the budget.
    pub fn release(&self, size: u64) {
        // Saturating: releasing more than was charged clamps at zero.
        let _ = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(size))
            });
    }

    // -----------------------------------------------------------------------
    // Shallow footprints
    // -----------------------------------------------------------------------

    pub fn allocate_block(&self, values: usize) -> StoreResult<()> {
        self.allocate(ALLOC_BLOCK + slots(values))
    }

    pub fn allocate_array(&self, len: usize) -> StoreResult<()> {
        self.allocate(ALLOC_ARRAY + slots(len))
    }

    pub fn allocate_struct(&self, fields: usize) -> StoreResult<()> {
        self.allocate(ALLOC_STRUCT + slots(fields))
    }

    pub fn allocate_map(&self, entries: usize) -> StoreResult<()> {
        self.allocate(ALLOC_MAP + ALLOC_MAP_ITEM * entries as u64)
    }

    pub fn allocate_package(&self, fnames: usize) -> StoreResult<()> {
        self.allocate(ALLOC_PACKAGE + ALLOC_STRING * fnames as u64)
    }

    pub fn allocate_string(&self, len: usize) -> StoreResult<()> {
        self.allocate(ALLOC_STRING + len as u64)
    }

    pub fn allocate_type(&self) -> StoreResult<()> {
        self.allocate(ALLOC_TYPE)
    }

    pub fn allocate_mem_package(&self, pkg: &MemPackage) -> StoreResult<()> {
        let files = ALLOC_MEM_FILE * pkg.files.len() as u64;
        self.allocate(ALLOC_MEM_PACKAGE + files + pkg.source_len() as u64)
    }

    /// Charge the shallow footprint of `obj`, dispatching on its kind.
    /// Referenced objects are not included.
    pub fn allocate_object(&self, obj: &Object) -> StoreResult<()> {
        match obj {
            Object::Block(b) => self.allocate_block(b.values.len()),
            Object::Array(a) => self.allocate_array(a.list.len()),
            Object::Struct(s) => self.allocate_struct(s.fields.len()),
            Object::Map(m) => self.allocate_map(m.len()),
            Object::Package(p) => self.allocate_package(p.fnames.len()),
        }
    }
}

fn slots(n: usize) -> u64 {
    ALLOC_SLOT * n as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmstate_types::{ArrayValue, Block, Value};

    #[test]
    fn allocate_and_release() {
        let alloc = Allocator::new(100);
        alloc.allocate(60).unwrap();
        assert_eq!(alloc.used(), 60);
        assert_eq!(alloc.remaining(), 40);
        alloc.release(20);
        assert_eq!(alloc.used(), 40);
        alloc.release(1000);
        assert_eq!(alloc.used(), 0);
    }

    #[test]
    fn over_budget_fails_and_leaves_usage_unchanged() {
        let alloc = Allocator::new(100);
        alloc.allocate(90).unwrap();
        let err = alloc.allocate(11).unwrap_err();
        assert!(matches!(
            err,
            StoreError::OutOfMemory {
                requested: 11,
                used: 90,
                max: 100
            }
        ));
        assert_eq!(alloc.used(), 90);
        alloc.allocate(10).unwrap();
        assert_eq!(alloc.used(), 100);
    }

    #[test]
    fn unlimited_never_overflows() {
        let alloc = Allocator::unlimited();
        alloc.allocate(u64::MAX / 2).unwrap();
        alloc.allocate(u64::MAX / 2).unwrap();
        assert!(alloc.allocate(u64::MAX).is_err());
    }

    #[test]
    fn object_footprints_grow_with_size() {
        let alloc = Allocator::unlimited();
        alloc
            .allocate_object(&Object::Block(Block::new(vec![Value::Int(1)])))
            .unwrap();
        let one = alloc.used();
        alloc.reset();
        alloc
            .allocate_object(&Object::Array(ArrayValue::new(vec![Value::Nil; 4])))
            .unwrap();
        assert!(alloc.used() > 0);
        assert_eq!(one, ALLOC_BLOCK + ALLOC_SLOT);
    }

    #[test]
    fn shared_across_threads() {
        let alloc = std::sync::Arc::new(Allocator::new(1000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let alloc = alloc.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = alloc.allocate(3);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(alloc.used() <= 1000);
        assert_eq!(alloc.used() % 3, 0);
    }
}
