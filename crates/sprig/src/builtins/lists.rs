//! Pair and list procedures.
//!
//! `car`/`cdr` accept any pair-shaped cell (dictionaries, errors and the
//! other extended pair types are pairs to the list machinery), while
//! `pair?` stays strict. `append` shares the final argument's structure
//! per R5RS; the others copy.

use crate::{
    cell::{CellId, Tag},
    equiv::{eq_cells, eqv_cells, equal_cells},
    error::{LispError, RunResult},
    heap::Heap,
    native::{args_vec, expect_n, want_index, want_pair},
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm, env: CellId) -> RunResult<()> {
    vm.def_native(env, "cons", nat_cons)?;
    vm.def_native(env, "car", nat_car)?;
    vm.def_native(env, "cdr", nat_cdr)?;
    vm.def_native(env, "caar", nat_caar)?;
    vm.def_native(env, "cadr", nat_cadr)?;
    vm.def_native(env, "cdar", nat_cdar)?;
    vm.def_native(env, "cddr", nat_cddr)?;
    vm.def_native(env, "set-car!", nat_set_car)?;
    vm.def_native(env, "set-cdr!", nat_set_cdr)?;
    vm.def_native(env, "list", nat_list)?;
    vm.def_native(env, "length", nat_length)?;
    vm.def_native(env, "append", nat_append)?;
    vm.def_native(env, "reverse", nat_reverse)?;
    vm.def_native(env, "list-ref", nat_list_ref)?;
    vm.def_native(env, "list-tail", nat_list_tail)?;
    vm.def_native(env, "memq", nat_memq)?;
    vm.def_native(env, "memv", nat_memv)?;
    vm.def_native(env, "member", nat_member)?;
    vm.def_native(env, "assq", nat_assq)?;
    vm.def_native(env, "assv", nat_assv)?;
    vm.def_native(env, "assoc", nat_assoc)?;
    Ok(())
}

fn one_pair(vm: &Vm, name: &str, args: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n(name, &argv, 1)?;
    let id = argv[0];
    if vm.heap.tag(id).is_any_pair() {
        Ok(id)
    } else {
        Err(LispError::expected("pair", vm.heap.tag(id).name()))
    }
}

fn nat_cons(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("cons", &argv, 2)?;
    vm.heap.cons(argv[0], argv[1], env)
}

fn nat_car(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let pair = one_pair(vm, "car", args)?;
    Ok(vm.heap.car(pair))
}

fn nat_cdr(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let pair = one_pair(vm, "cdr", args)?;
    Ok(vm.heap.cdr(pair))
}

fn compose2(vm: &mut Vm, name: &str, args: CellId, outer_car: bool, inner_car: bool) -> RunResult<CellId> {
    let pair = one_pair(vm, name, args)?;
    let inner = if inner_car { vm.heap.car(pair) } else { vm.heap.cdr(pair) };
    if !vm.heap.tag(inner).is_any_pair() {
        return Err(LispError::expected("pair", vm.heap.tag(inner).name()));
    }
    Ok(if outer_car { vm.heap.car(inner) } else { vm.heap.cdr(inner) })
}

fn nat_caar(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compose2(vm, "caar", args, true, true)
}

fn nat_cadr(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compose2(vm, "cadr", args, true, false)
}

fn nat_cdar(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compose2(vm, "cdar", args, false, true)
}

fn nat_cddr(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compose2(vm, "cddr", args, false, false)
}

fn nat_set_car(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("set-car!", &argv, 2)?;
    let pair = want_pair(&vm.heap, argv[0])?;
    vm.heap.set_car(pair, argv[1]);
    Ok(CellId::VOID)
}

fn nat_set_cdr(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("set-cdr!", &argv, 2)?;
    let pair = want_pair(&vm.heap, argv[0])?;
    vm.heap.set_cdr(pair, argv[1]);
    Ok(CellId::VOID)
}

fn nat_list(_vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    // The evaluated argument list already is the result.
    Ok(args)
}

fn nat_length(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("length", &argv, 1)?;
    let len = vm.heap.list_len(argv[0])?;
    vm.heap.int_cell(len as i64, env)
}

fn nat_append(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    let Some((&last, prefix)) = argv.split_last() else {
        return Ok(CellId::NIL);
    };
    let mut elems = Vec::new();
    for &list in prefix {
        elems.extend(vm.heap.list_to_vec(list)?);
    }
    vm.heap.list_with_tail(&elems, last, env)
}

fn nat_reverse(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("reverse", &argv, 1)?;
    let mut elems = vm.heap.list_to_vec(argv[0])?;
    elems.reverse();
    vm.heap.list_from_slice(&elems, env)
}

fn list_tail_of(heap: &Heap, list: CellId, k: usize) -> RunResult<CellId> {
    let mut cur = list;
    for _ in 0..k {
        if !heap.tag(cur).is_any_pair() {
            return Err(LispError::range(format!("list is shorter than {k}")));
        }
        cur = heap.cdr(cur);
    }
    Ok(cur)
}

fn nat_list_ref(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("list-ref", &argv, 2)?;
    let k = want_index(&vm.heap, argv[1])?;
    let tail = list_tail_of(&vm.heap, argv[0], k)?;
    if !vm.heap.tag(tail).is_any_pair() {
        return Err(LispError::range(format!("list-ref: index {k} out of range")));
    }
    Ok(vm.heap.car(tail))
}

fn nat_list_tail(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("list-tail", &argv, 2)?;
    let k = want_index(&vm.heap, argv[1])?;
    list_tail_of(&vm.heap, argv[0], k)
}

type EqFn = fn(&Heap, CellId, CellId) -> RunResult<bool>;

fn eq_shim(heap: &Heap, a: CellId, b: CellId) -> RunResult<bool> {
    Ok(eq_cells(heap, a, b))
}

fn eqv_shim(heap: &Heap, a: CellId, b: CellId) -> RunResult<bool> {
    Ok(eqv_cells(heap, a, b))
}

fn member_by(vm: &Vm, name: &str, args: CellId, pred: EqFn) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n(name, &argv, 2)?;
    let mut cur = argv[1];
    while vm.heap.tag(cur) == Tag::Pair {
        if pred(&vm.heap, vm.heap.car(cur), argv[0])? {
            return Ok(cur);
        }
        cur = vm.heap.cdr(cur);
    }
    Ok(CellId::FALSE)
}

fn nat_memq(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    member_by(vm, "memq", args, eq_shim)
}

fn nat_memv(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    member_by(vm, "memv", args, eqv_shim)
}

fn nat_member(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    member_by(vm, "member", args, equal_cells)
}

fn assoc_by(vm: &Vm, name: &str, args: CellId, pred: EqFn) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n(name, &argv, 2)?;
    let mut cur = argv[1];
    while vm.heap.tag(cur) == Tag::Pair {
        let entry = vm.heap.car(cur);
        if vm.heap.tag(entry).is_any_pair() && pred(&vm.heap, vm.heap.car(entry), argv[0])? {
            return Ok(entry);
        }
        cur = vm.heap.cdr(cur);
    }
    Ok(CellId::FALSE)
}

fn nat_assq(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    assoc_by(vm, "assq", args, eq_shim)
}

fn nat_assv(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    assoc_by(vm, "assv", args, eqv_shim)
}

fn nat_assoc(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    assoc_by(vm, "assoc", args, equal_cells)
}
