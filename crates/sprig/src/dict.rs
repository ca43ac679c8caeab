//! Hierarchical dictionaries: lexical environments and first-class maps.
//!
//! A dictionary is a pair-shaped cell `(frame . parent)`. A frame is
//! either an association list of `(key . value)` binding pairs, or a
//! power-of-two vector of buckets where each bucket is such an alist and
//! the bucket is selected by masking the key hash. Lookup walks frames
//! top-down and returns the first binding found; rebinding mutates the
//! innermost frame holding the key.

use smallvec::SmallVec;

use crate::{
    cell::{CellId, Tag},
    equiv::{eq_cells, hash_cell},
    error::{LispError, RunResult},
    heap::Heap,
};

/// A fresh dictionary with no parent. `frame_size` 0 selects an alist top
/// frame; otherwise a hash table of at least that many buckets.
pub fn dict_new(heap: &mut Heap, frame_size: usize, protect: CellId) -> RunResult<CellId> {
    push_frame(heap, CellId::NIL, frame_size, protect)
}

/// A new dictionary with an empty top frame over `parent`.
pub fn push_frame(heap: &mut Heap, parent: CellId, frame_size: usize, protect: CellId) -> RunResult<CellId> {
    let frame = if frame_size == 0 {
        CellId::NIL
    } else {
        heap.svec_pow2_cell(frame_size.next_power_of_two(), protect)?
    };
    heap.cons_typed(Tag::Dict, frame, parent, protect)
}

/// A new dictionary binding `formals` to `vals` in a fresh alist frame
/// over `parent`. Handles the three formal shapes: a proper list, a
/// dotted list with a rest symbol, and a bare rest symbol.
pub fn push_bindings(
    heap: &mut Heap,
    parent: CellId,
    formals: CellId,
    vals: CellId,
    protect: CellId,
) -> RunResult<CellId> {
    let saved = heap.root_depth();
    let result = push_bindings_inner(heap, parent, formals, vals, protect);
    heap.root_truncate(saved);
    result
}

fn push_bindings_inner(
    heap: &mut Heap,
    parent: CellId,
    formals: CellId,
    vals: CellId,
    protect: CellId,
) -> RunResult<CellId> {
    let dict = push_frame(heap, parent, 0, protect)?;
    heap.root_push(dict);

    let mut formal = formals;
    let mut val = vals;
    loop {
        match heap.tag(formal) {
            Tag::Nil => {
                if heap.tag(val) != Tag::Nil {
                    let (extra, _) = heap.list_elems_and_tail(val);
                    return Err(LispError::new(
                        crate::error::ErrKind::ArityError,
                        format!("too many arguments: {} left over", extra.len()),
                    ));
                }
                return Ok(dict);
            }
            // A bare symbol (or dotted tail) takes the rest of the values.
            tag if tag.features().is_any_sym => {
                frame_insert(heap, dict, formal, val, protect)?;
                return Ok(dict);
            }
            Tag::Pair => {
                let name = heap.car(formal);
                if !heap.tag(name).features().is_any_sym {
                    return Err(LispError::expected("symbol in formals", heap.tag(name).name()));
                }
                if !heap.tag(val).is_any_pair() {
                    return Err(LispError::new(
                        crate::error::ErrKind::ArityError,
                        "too few arguments".to_owned(),
                    ));
                }
                let value = heap.car(val);
                frame_insert(heap, dict, name, value, protect)?;
                formal = heap.cdr(formal);
                val = heap.cdr(val);
            }
            tag => return Err(LispError::expected("formals list", tag.name())),
        }
    }
}

/// The binding pair for `key`, searching all frames top-down.
#[must_use]
pub fn find_binding(heap: &Heap, dict: CellId, key: CellId) -> Option<CellId> {
    let mut cur = dict;
    while heap.tag(cur) == Tag::Dict {
        let frame = heap.car(cur);
        if let Some(pair) = frame_find(heap, frame, key) {
            return Some(pair);
        }
        cur = heap.cdr(cur);
    }
    None
}

fn frame_find(heap: &Heap, frame: CellId, key: CellId) -> Option<CellId> {
    let chain = match heap.tag(frame) {
        Tag::Nil | Tag::Pair => frame,
        Tag::SvecPow2Heap | Tag::SvecImm => {
            let len = heap.svec_len(frame);
            if len == 0 {
                return None;
            }
            let bucket = (hash_cell(heap, key) & (len as u64 - 1)) as usize;
            heap.svec_get(frame, bucket).ok()?
        }
        _ => return None,
    };
    alist_find(heap, chain, key)
}

fn alist_find(heap: &Heap, mut chain: CellId, key: CellId) -> Option<CellId> {
    while heap.tag(chain) == Tag::Pair {
        let pair = heap.car(chain);
        if heap.tag(pair).is_any_pair() && eq_cells(heap, heap.car(pair), key) {
            return Some(pair);
        }
        chain = heap.cdr(chain);
    }
    None
}

/// Value bound to `key`; raises `unbound` on a miss.
pub fn dict_ref(heap: &Heap, dict: CellId, key: CellId) -> RunResult<CellId> {
    find_binding(heap, dict, key)
        .map(|pair| heap.cdr(pair))
        .ok_or_else(|| unbound_err(heap, key))
}

/// Value bound to `key`, or `None` on a miss.
#[must_use]
pub fn dict_ref_q(heap: &Heap, dict: CellId, key: CellId) -> Option<CellId> {
    find_binding(heap, dict, key).map(|pair| heap.cdr(pair))
}

/// Mutates the binding wherever first found, else creates one in the top
/// frame.
pub fn bind(heap: &mut Heap, dict: CellId, key: CellId, value: CellId, protect: CellId) -> RunResult<()> {
    if let Some(pair) = find_binding(heap, dict, key) {
        heap.set_cdr(pair, value);
        Ok(())
    } else {
        frame_insert(heap, dict, key, value, protect)
    }
}

/// Mutates the binding wherever first found; raises `unbound` otherwise.
pub fn rebind(heap: &mut Heap, dict: CellId, key: CellId, value: CellId) -> RunResult<()> {
    match find_binding(heap, dict, key) {
        Some(pair) => {
            heap.set_cdr(pair, value);
            Ok(())
        }
        None => Err(unbound_err(heap, key)),
    }
}

/// Creates a binding in the top frame of `dict` unconditionally, even
/// when an enclosing frame already binds the key. This is what `let*` and
/// `letrec` need; [`bind`] would mutate the shadowed binding instead.
pub fn insert(heap: &mut Heap, dict: CellId, key: CellId, value: CellId, protect: CellId) -> RunResult<()> {
    frame_insert(heap, dict, key, value, protect)
}

/// Creates a binding in the top frame of `dict`.
fn frame_insert(heap: &mut Heap, dict: CellId, key: CellId, value: CellId, protect: CellId) -> RunResult<()> {
    let frame = heap.car(dict);
    let pair = heap.cons(key, value, protect)?;
    match heap.tag(frame) {
        Tag::Nil | Tag::Pair => {
            heap.root_push(pair);
            let link = heap.cons(pair, frame, protect)?;
            heap.root_pop(1);
            heap.set_car(dict, link);
            Ok(())
        }
        Tag::SvecPow2Heap | Tag::SvecImm => {
            let len = heap.svec_len(frame);
            let bucket = (hash_cell(heap, key) & (len as u64 - 1)) as usize;
            heap.root_push(pair);
            let head = heap.svec_get(frame, bucket)?;
            let link = heap.cons(pair, head, protect)?;
            heap.root_pop(1);
            heap.svec_set(frame, bucket, link)
        }
        tag => Err(LispError::expected("dictionary frame", tag.name())),
    }
}

/// All keys, including shadowed ones, top frame first; positionally
/// aligned with [`dict_values`].
pub fn dict_keys(heap: &mut Heap, dict: CellId, protect: CellId) -> RunResult<CellId> {
    let pairs = all_binding_pairs(heap, dict);
    let keys: Vec<CellId> = pairs.iter().map(|&p| heap.car(p)).collect();
    heap.list_from_slice(&keys, protect)
}

/// All values, aligned with [`dict_keys`].
pub fn dict_values(heap: &mut Heap, dict: CellId, protect: CellId) -> RunResult<CellId> {
    let pairs = all_binding_pairs(heap, dict);
    let values: Vec<CellId> = pairs.iter().map(|&p| heap.cdr(p)).collect();
    heap.list_from_slice(&values, protect)
}

fn all_binding_pairs(heap: &Heap, dict: CellId) -> Vec<CellId> {
    let mut out = Vec::new();
    let mut cur = dict;
    while heap.tag(cur) == Tag::Dict {
        let frame = heap.car(cur);
        match heap.tag(frame) {
            Tag::Nil | Tag::Pair => collect_chain(heap, frame, &mut out),
            Tag::SvecPow2Heap | Tag::SvecImm => {
                let buckets: SmallVec<[CellId; 16]> = heap.svec_elems(frame).into_iter().collect();
                for bucket in buckets {
                    collect_chain(heap, bucket, &mut out);
                }
            }
            _ => {}
        }
        cur = heap.cdr(cur);
    }
    out
}

fn collect_chain(heap: &Heap, mut chain: CellId, out: &mut Vec<CellId>) {
    while heap.tag(chain) == Tag::Pair {
        let pair = heap.car(chain);
        if heap.tag(pair).is_any_pair() {
            out.push(pair);
        }
        chain = heap.cdr(chain);
    }
}

fn unbound_err(heap: &Heap, key: CellId) -> LispError {
    if heap.tag(key).features().is_any_sym {
        LispError::unbound(&heap.sym_name(key))
    } else {
        LispError::new(crate::error::ErrKind::Unbound, "key not found in dictionary".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{limits::Limits, oblist::Oblist};

    struct Fixture {
        heap: Heap,
        oblist: Oblist,
    }

    fn fixture() -> Fixture {
        let mut heap = Heap::new(Limits::default());
        let oblist = Oblist::new(&mut heap).unwrap();
        Fixture { heap, oblist }
    }

    impl Fixture {
        fn sym(&mut self, name: &str) -> CellId {
            self.oblist.intern(&mut self.heap, name).unwrap()
        }

        fn int(&mut self, value: i64) -> CellId {
            let id = self.heap.int_cell(value, CellId::NIL).unwrap();
            self.heap.root_push(id);
            id
        }
    }

    #[test]
    fn bind_then_ref_round_trips() {
        let mut fx = fixture();
        let env = dict_new(&mut fx.heap, 0, CellId::NIL).unwrap();
        fx.heap.root_push(env);
        let k = fx.sym("x");
        let v1 = fx.int(1);
        bind(&mut fx.heap, env, k, v1, CellId::NIL).unwrap();
        assert_eq!(dict_ref(&fx.heap, env, k).unwrap(), v1);

        // Rebinding through bind mutates in place: no new frame, new value.
        let v2 = fx.int(2);
        bind(&mut fx.heap, env, k, v2, CellId::NIL).unwrap();
        assert_eq!(dict_ref(&fx.heap, env, k).unwrap(), v2);
        let keys = dict_keys(&mut fx.heap, env, CellId::NIL).unwrap();
        assert_eq!(fx.heap.list_len(keys).unwrap(), 1, "bind must not duplicate the binding");
    }

    #[test]
    fn hash_frames_behave_like_alist_frames() {
        let mut fx = fixture();
        let env = dict_new(&mut fx.heap, 64, CellId::NIL).unwrap();
        fx.heap.root_push(env);
        for i in 0..100 {
            let k = fx.sym(&format!("k{i}"));
            let v = fx.int(i);
            bind(&mut fx.heap, env, k, v, CellId::NIL).unwrap();
        }
        for i in 0..100 {
            let k = fx.sym(&format!("k{i}"));
            let v = dict_ref(&fx.heap, env, k).unwrap();
            assert_eq!(fx.heap.cell(v).as_int(), i);
        }
        let keys = dict_keys(&mut fx.heap, env, CellId::NIL).unwrap();
        assert_eq!(fx.heap.list_len(keys).unwrap(), 100);
    }

    #[test]
    fn lookup_walks_frames_and_shadowing_wins() {
        let mut fx = fixture();
        let outer = dict_new(&mut fx.heap, 0, CellId::NIL).unwrap();
        fx.heap.root_push(outer);
        let k = fx.sym("x");
        let outer_v = fx.int(1);
        bind(&mut fx.heap, outer, k, outer_v, CellId::NIL).unwrap();

        let inner = push_frame(&mut fx.heap, outer, 0, CellId::NIL).unwrap();
        fx.heap.root_push(inner);
        let inner_v = fx.int(2);
        bind(&mut fx.heap, inner, k, inner_v, CellId::NIL).unwrap();

        assert_eq!(dict_ref(&fx.heap, inner, k).unwrap(), inner_v);
        assert_eq!(dict_ref(&fx.heap, outer, k).unwrap(), outer_v);

        // Keys and values include shadowed bindings, innermost first.
        let keys = dict_keys(&mut fx.heap, inner, CellId::NIL).unwrap();
        let values = dict_values(&mut fx.heap, inner, CellId::NIL).unwrap();
        assert_eq!(fx.heap.list_len(keys).unwrap(), 2);
        let vals = fx.heap.list_to_vec(values).unwrap();
        assert_eq!(fx.heap.cell(vals[0]).as_int(), 2);
        assert_eq!(fx.heap.cell(vals[1]).as_int(), 1);
    }

    #[test]
    fn rebind_mutates_innermost_and_misses_raise_unbound() {
        let mut fx = fixture();
        let outer = dict_new(&mut fx.heap, 0, CellId::NIL).unwrap();
        fx.heap.root_push(outer);
        let k = fx.sym("x");
        let v = fx.int(1);
        bind(&mut fx.heap, outer, k, v, CellId::NIL).unwrap();
        let inner = push_frame(&mut fx.heap, outer, 0, CellId::NIL).unwrap();
        fx.heap.root_push(inner);

        // x lives only in the outer frame: rebind through inner mutates it.
        let v2 = fx.int(2);
        rebind(&mut fx.heap, inner, k, v2).unwrap();
        assert_eq!(dict_ref(&fx.heap, outer, k).unwrap(), v2);

        let missing = fx.sym("missing");
        let err = rebind(&mut fx.heap, inner, missing, v2).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrKind::Unbound);
        assert!(dict_ref_q(&fx.heap, inner, missing).is_none());
    }

    #[test]
    fn push_bindings_matches_formal_shapes() {
        let mut fx = fixture();
        let base = dict_new(&mut fx.heap, 0, CellId::NIL).unwrap();
        fx.heap.root_push(base);

        let a = fx.sym("a");
        let b = fx.sym("b");
        let rest = fx.sym("rest");
        let v1 = fx.int(1);
        let v2 = fx.int(2);
        let v3 = fx.int(3);

        // Proper formals (a b).
        let formals = fx.heap.list_from_slice(&[a, b], CellId::NIL).unwrap();
        fx.heap.root_push(formals);
        let vals = fx.heap.list_from_slice(&[v1, v2], CellId::NIL).unwrap();
        fx.heap.root_push(vals);
        let env = push_bindings(&mut fx.heap, base, formals, vals, CellId::NIL).unwrap();
        fx.heap.root_push(env);
        assert_eq!(dict_ref(&fx.heap, env, a).unwrap(), v1);
        assert_eq!(dict_ref(&fx.heap, env, b).unwrap(), v2);

        // Dotted formals (a . rest).
        let dotted = fx.heap.list_with_tail(&[a], rest, CellId::NIL).unwrap();
        fx.heap.root_push(dotted);
        let vals3 = fx.heap.list_from_slice(&[v1, v2, v3], CellId::NIL).unwrap();
        fx.heap.root_push(vals3);
        let env2 = push_bindings(&mut fx.heap, base, dotted, vals3, CellId::NIL).unwrap();
        fx.heap.root_push(env2);
        assert_eq!(dict_ref(&fx.heap, env2, a).unwrap(), v1);
        let r = dict_ref(&fx.heap, env2, rest).unwrap();
        assert_eq!(fx.heap.list_len(r).unwrap(), 2);

        // Bare rest symbol.
        let env3 = push_bindings(&mut fx.heap, base, rest, vals3, CellId::NIL).unwrap();
        fx.heap.root_push(env3);
        let r = dict_ref(&fx.heap, env3, rest).unwrap();
        assert_eq!(fx.heap.list_len(r).unwrap(), 3);

        // Arity mismatches.
        let too_few = push_bindings(&mut fx.heap, base, formals, CellId::NIL, CellId::NIL);
        assert_eq!(too_few.unwrap_err().kind, crate::error::ErrKind::ArityError);
        let too_many = push_bindings(&mut fx.heap, base, formals, vals3, CellId::NIL);
        assert_eq!(too_many.unwrap_err().kind, crate::error::ErrKind::ArityError);
    }
}
