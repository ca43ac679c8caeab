//! Equivalence predicates and value hashing.
//!
//! `eq?` is identity plus same-value equality for the simple atoms; `eqv?`
//! adds numeric equality across the int/rational/real coercions; `equal?`
//! extends `eqv?` structurally over pairs, strings, vectors and
//! bytevectors with bounded depth so cyclic structures terminate.

use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;

use crate::{
    cell::{CellId, Tag},
    error::{LispError, RunResult},
    heap::Heap,
    limits::MAX_DATA_RECURSION_DEPTH,
};

/// A number lifted out of its cell for comparison and arithmetic.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Int(i64),
    Rational(i64, i64),
    Real(f64),
}

impl Num {
    /// The value as a real, for mixed comparisons.
    pub fn to_real(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Rational(n, d) => n as f64 / d as f64,
            Self::Real(x) => x,
        }
    }

    /// Exact numeric equality with promotion to the wider representation.
    pub fn num_eq(self, other: Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Rational(an, ad), Self::Rational(bn, bd)) => an == bn && ad == bd,
            (Self::Int(a), Self::Rational(bn, bd)) | (Self::Rational(bn, bd), Self::Int(a)) => {
                bd == 1 && bn == a
            }
            (a, b) => a.to_real() == b.to_real(),
        }
    }
}

/// Lifts a numeric cell into a [`Num`]; `None` for non-numbers.
pub(crate) fn num_of(heap: &Heap, id: CellId) -> Option<Num> {
    let cell = heap.cell(id);
    match cell.tag() {
        Tag::Int => Some(Num::Int(cell.as_int())),
        Tag::Real => Some(Num::Real(cell.as_real())),
        Tag::Rational => {
            let (n, d) = cell.as_rational();
            Some(Num::Rational(n, d))
        }
        _ => None,
    }
}

/// Pointer identity plus same-value equality for simple atoms.
pub(crate) fn eq_cells(heap: &Heap, a: CellId, b: CellId) -> bool {
    if a == b {
        return true;
    }
    let (ta, tb) = (heap.tag(a), heap.tag(b));
    if ta != tb {
        return false;
    }
    match ta {
        Tag::Int => heap.cell(a).as_int() == heap.cell(b).as_int(),
        Tag::Char => heap.cell(a).as_char() == heap.cell(b).as_char(),
        // Booleans, nil, eof, void and undef are singletons; interned
        // symbols are unique by construction. Identity already decided.
        _ => false,
    }
}

/// `eq?` plus numeric equality across int/rational/real coercion.
pub(crate) fn eqv_cells(heap: &Heap, a: CellId, b: CellId) -> bool {
    if eq_cells(heap, a, b) {
        return true;
    }
    match (num_of(heap, a), num_of(heap, b)) {
        (Some(x), Some(y)) => x.num_eq(y),
        _ => false,
    }
}

/// Structural equality, recursing through pairs and vectors with bounded
/// depth. Exceeding the bound raises a `resource-error` rather than
/// looping on cyclic data.
pub(crate) fn equal_cells(heap: &Heap, a: CellId, b: CellId) -> RunResult<bool> {
    equal_rec(heap, a, b, MAX_DATA_RECURSION_DEPTH)
}

fn equal_rec(heap: &Heap, a: CellId, b: CellId, depth: usize) -> RunResult<bool> {
    if depth == 0 {
        return Err(LispError::resource("equal?: maximum structure depth exceeded"));
    }
    if eqv_cells(heap, a, b) {
        return Ok(true);
    }
    let (ta, tb) = (heap.tag(a), heap.tag(b));
    let (fa, fb) = (ta.features(), tb.features());
    if fa.is_any_str && fb.is_any_str {
        return Ok(heap.str_value(a) == heap.str_value(b));
    }
    if fa.is_any_bvec && fb.is_any_bvec {
        return Ok(heap.bytevec_value(a) == heap.bytevec_value(b));
    }
    if fa.is_any_svec && fb.is_any_svec {
        let len = heap.svec_len(a);
        if len != heap.svec_len(b) {
            return Ok(false);
        }
        for i in 0..len {
            if !equal_rec(heap, heap.svec_get(a, i)?, heap.svec_get(b, i)?, depth - 1)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    if ta == Tag::Pair && tb == Tag::Pair {
        return Ok(equal_rec(heap, heap.car(a), heap.car(b), depth - 1)?
            && equal_rec(heap, heap.cdr(a), heap.cdr(b), depth - 1)?);
    }
    Ok(false)
}

/// Stable hash of a cell: the stored hash for interned symbols, a hash of
/// the numeric/character value for simple atoms, and a hash of the arena
/// index otherwise.
pub(crate) fn hash_cell(heap: &Heap, id: CellId) -> u64 {
    let cell = heap.cell(id);
    match cell.tag() {
        Tag::SymHeap => cell.sym_hash(),
        Tag::Int | Tag::Char | Tag::Bool => word_hash(cell.car_word()),
        _ => word_hash(id.index() as u64),
    }
}

fn word_hash(word: u64) -> u64 {
    let mut hasher = RandomState::with_seeds(0x6b65, 0x7973, 0x2121, 0x2121).build_hasher();
    hasher.write_u64(word);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;

    #[test]
    fn eqv_coerces_across_numeric_representations() {
        let mut heap = Heap::new(Limits::default());
        let i = heap.int_cell(2, CellId::NIL).unwrap();
        heap.root_push(i);
        let r = heap.real_cell(2.0, CellId::NIL).unwrap();
        heap.root_push(r);
        let q = heap.rational_cell(4, 2, CellId::NIL).unwrap(); // normalizes to int 2
        heap.root_push(q);
        assert!(eqv_cells(&heap, i, r));
        assert!(eqv_cells(&heap, i, q));
        assert!(!eq_cells(&heap, i, r));
        let half = heap.rational_cell(1, 2, CellId::NIL).unwrap();
        heap.root_push(half);
        let half_real = heap.real_cell(0.5, CellId::NIL).unwrap();
        heap.root_push(half_real);
        assert!(eqv_cells(&heap, half, half_real));
        heap.root_pop(5);
    }

    #[test]
    fn equal_recurses_through_structure() {
        let mut heap = Heap::new(Limits::default());
        let one_a = heap.int_cell(1, CellId::NIL).unwrap();
        heap.root_push(one_a);
        let one_b = heap.int_cell(1, CellId::NIL).unwrap();
        heap.root_push(one_b);
        let la = heap.list_from_slice(&[one_a, one_a], CellId::NIL).unwrap();
        heap.root_push(la);
        let lb = heap.list_from_slice(&[one_b, one_b], CellId::NIL).unwrap();
        heap.root_push(lb);
        assert!(equal_cells(&heap, la, lb).unwrap());
        assert!(!eq_cells(&heap, la, lb));
        heap.root_pop(4);
    }

    #[test]
    fn equal_bounds_cyclic_structures() {
        let mut heap = Heap::new(Limits::default());
        let a = heap.cons(CellId::NIL, CellId::NIL, CellId::NIL).unwrap();
        heap.root_push(a);
        let b = heap.cons(CellId::NIL, CellId::NIL, CellId::NIL).unwrap();
        heap.root_push(b);
        heap.set_cdr(a, a);
        heap.set_cdr(b, b);
        let err = equal_cells(&heap, a, b).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrKind::ResourceError);
        heap.root_pop(2);
    }
}
