//! The native procedure ABI: host functions callable from Lisp.
//!
//! Every native shares one signature: the VM, the argument list (already
//! evaluated for a `NativeProc`, raw forms for a `NativeNproc`), and the
//! evaluation environment. A native may allocate (protecting what it
//! holds via the root stack), raise errors, and return any cell including
//! a thunk to participate in the trampoline.
//!
//! Natives live in a registry owned by the VM; the cell representing a
//! native stores the registry index in its car word. Installers register
//! `(symbol, function)` pairs into a target environment.

use smallvec::SmallVec;

use crate::{
    cell::{CellId, Tag},
    error::{LispError, RunResult},
    heap::Heap,
    vm::Vm,
};

/// The uniform native signature.
pub type NativeFn = fn(&mut Vm, CellId, CellId) -> RunResult<CellId>;

/// A registered native: its surface name and entry point.
pub(crate) struct NativeDef {
    pub name: &'static str,
    pub func: NativeFn,
}

/// Registry of host functions; cells index into it.
#[derive(Default)]
pub(crate) struct Natives {
    defs: Vec<NativeDef>,
}

impl Natives {
    pub fn register(&mut self, name: &'static str, func: NativeFn) -> u32 {
        let index = u32::try_from(self.defs.len()).expect("native registry index exceeds u32");
        self.defs.push(NativeDef { name, func });
        index
    }

    pub fn get(&self, index: u32) -> Option<&NativeDef> {
        self.defs.get(index as usize)
    }

    pub fn name_of(&self, index: u32) -> &'static str {
        self.get(index).map_or("?", |def| def.name)
    }
}

// ----------------------------------------------------------------------
// argument plumbing helpers shared by the builtin families
// ----------------------------------------------------------------------

/// Collects a proper argument list into a small vector.
pub(crate) fn args_vec(heap: &Heap, args: CellId) -> RunResult<SmallVec<[CellId; 8]>> {
    let mut out = SmallVec::new();
    let mut cur = args;
    loop {
        match heap.tag(cur) {
            Tag::Nil => return Ok(out),
            tag if tag.is_any_pair() => {
                out.push(heap.car(cur));
                cur = heap.cdr(cur);
            }
            tag => return Err(LispError::expected("argument list", tag.name())),
        }
    }
}

/// Exactly `n` arguments.
pub(crate) fn expect_n(name: &str, args: &[CellId], n: usize) -> RunResult<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(LispError::arity(name, &n.to_string(), args.len()))
    }
}

/// Between `min` and `max` arguments.
pub(crate) fn expect_range(name: &str, args: &[CellId], min: usize, max: usize) -> RunResult<()> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(LispError::arity(name, &format!("{min} to {max}"), args.len()))
    }
}

/// At least `min` arguments.
pub(crate) fn expect_at_least(name: &str, args: &[CellId], min: usize) -> RunResult<()> {
    if args.len() >= min {
        Ok(())
    } else {
        Err(LispError::arity(name, &format!("at least {min}"), args.len()))
    }
}

pub(crate) fn want_int(heap: &Heap, id: CellId) -> RunResult<i64> {
    let cell = heap.cell(id);
    if cell.tag() == Tag::Int {
        Ok(cell.as_int())
    } else {
        Err(LispError::expected("integer", cell.tag().name()))
    }
}

pub(crate) fn want_char(heap: &Heap, id: CellId) -> RunResult<char> {
    let cell = heap.cell(id);
    if cell.tag() == Tag::Char {
        Ok(cell.as_char())
    } else {
        Err(LispError::expected("char", cell.tag().name()))
    }
}

pub(crate) fn want_str(heap: &Heap, id: CellId) -> RunResult<String> {
    let tag = heap.tag(id);
    if tag.features().is_any_str {
        Ok(heap.str_value(id).into_owned())
    } else {
        Err(LispError::expected("string", tag.name()))
    }
}

pub(crate) fn want_sym(heap: &Heap, id: CellId) -> RunResult<CellId> {
    let tag = heap.tag(id);
    if tag.features().is_any_sym {
        Ok(id)
    } else {
        Err(LispError::expected("symbol", tag.name()))
    }
}

pub(crate) fn want_svec(heap: &Heap, id: CellId) -> RunResult<CellId> {
    let tag = heap.tag(id);
    if tag.features().is_any_svec {
        Ok(id)
    } else {
        Err(LispError::expected("vector", tag.name()))
    }
}

pub(crate) fn want_pair(heap: &Heap, id: CellId) -> RunResult<CellId> {
    let tag = heap.tag(id);
    if tag == Tag::Pair {
        Ok(id)
    } else {
        Err(LispError::expected("pair", tag.name()))
    }
}

pub(crate) fn want_dict(heap: &Heap, id: CellId) -> RunResult<CellId> {
    let tag = heap.tag(id);
    if tag == Tag::Dict {
        Ok(id)
    } else {
        Err(LispError::expected("dictionary", tag.name()))
    }
}

pub(crate) fn want_port(heap: &Heap, id: CellId) -> RunResult<CellId> {
    let tag = heap.tag(id);
    if tag == Tag::PortHeap {
        Ok(id)
    } else {
        Err(LispError::expected("port", tag.name()))
    }
}

/// A non-negative index that fits `usize`.
pub(crate) fn want_index(heap: &Heap, id: CellId) -> RunResult<usize> {
    let n = want_int(heap, id)?;
    usize::try_from(n).map_err(|_| LispError::range(format!("negative index {n}")))
}
