//! The oblist: the symbol intern table.
//!
//! A power-of-two vector of bucket lists, itself built from heap cells so
//! the collector traces it like any other structure (the table cell is a
//! static root). Each bucket is a list of symbol cells; a symbol stores
//! its character hash in the car at interning time, so bucket search
//! compares hashes before strings and interned symbols compare equal by
//! identity ever after.
//!
//! Runtime-generated symbols (`gensym`) never enter the table.

use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;

use crate::{
    cell::{CellId, Tag},
    error::RunResult,
    heap::Heap,
};

/// Bucket count; must be a power of two so the modulus is a mask.
const OBLIST_BUCKETS: usize = 1024;

/// Fixed hasher seeds: symbol hashes must be stable for the lifetime of
/// the heap because they are stored in the symbol cells.
fn hash_state() -> RandomState {
    RandomState::with_seeds(0x6c69, 0x7370, 0x7269, 0x6721)
}

/// Hash of a symbol's characters, as stored in its car slot.
#[must_use]
pub(crate) fn hash_name(name: &str) -> u64 {
    let mut hasher = hash_state().build_hasher();
    hasher.write(name.as_bytes());
    hasher.finish()
}

#[derive(Debug)]
pub(crate) struct Oblist {
    table: CellId,
    count: usize,
}

impl Oblist {
    /// Builds the table and registers it as a GC root.
    pub fn new(heap: &mut Heap) -> RunResult<Self> {
        let table = heap.svec_pow2_cell(OBLIST_BUCKETS, CellId::NIL)?;
        heap.add_static_root(table);
        Ok(Self { table, count: 0 })
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.count
    }

    fn bucket_of(hash: u64) -> usize {
        (hash & (OBLIST_BUCKETS as u64 - 1)) as usize
    }

    /// Returns the unique symbol cell for `name`, creating one if absent.
    pub fn intern(&mut self, heap: &mut Heap, name: &str) -> RunResult<CellId> {
        let hash = hash_name(name);
        let bucket = Self::bucket_of(hash);
        if let Some(sym) = self.search(heap, bucket, hash, name) {
            return Ok(sym);
        }
        let sym = heap.symbol_cell(hash, name, CellId::NIL)?;
        heap.root_push(sym);
        let head = heap.svec_get(self.table, bucket)?;
        let link = heap.cons(sym, head, CellId::NIL)?;
        heap.svec_set(self.table, bucket, link)?;
        heap.root_pop(1);
        self.count += 1;
        Ok(sym)
    }

    /// Returns the symbol cell for `name`, or `None` if never interned.
    pub fn lookup(&self, heap: &Heap, name: &str) -> Option<CellId> {
        let hash = hash_name(name);
        self.search(heap, Self::bucket_of(hash), hash, name)
    }

    fn search(&self, heap: &Heap, bucket: usize, hash: u64, name: &str) -> Option<CellId> {
        let mut cur = heap.svec_get(self.table, bucket).ok()?;
        while heap.tag(cur) == Tag::Pair {
            let sym = heap.car(cur);
            if heap.cell(sym).sym_hash() == hash && heap.sym_name(sym) == name {
                return Some(sym);
            }
            cur = heap.cdr(cur);
        }
        None
    }
}
