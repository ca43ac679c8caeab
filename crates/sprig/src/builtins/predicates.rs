//! Type and equivalence predicates.
//!
//! Most of these are one ordered comparison or one features-table lookup,
//! which is the point of the tag layout. `atom?` answers for everything
//! that is not an ordinary pair, so dictionaries and the other extended
//! pair types count as atoms even though list operations accept them.

use crate::{
    cell::{CellId, Tag},
    equiv::{eq_cells, eqv_cells, equal_cells},
    error::RunResult,
    heap::Heap,
    native::{args_vec, expect_n},
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm, env: CellId) -> RunResult<()> {
    vm.def_native(env, "null?", nat_null_p)?;
    vm.def_native(env, "pair?", nat_pair_p)?;
    vm.def_native(env, "atom?", nat_atom_p)?;
    vm.def_native(env, "list?", nat_list_p)?;
    vm.def_native(env, "symbol?", nat_symbol_p)?;
    vm.def_native(env, "string?", nat_string_p)?;
    vm.def_native(env, "char?", nat_char_p)?;
    vm.def_native(env, "boolean?", nat_boolean_p)?;
    vm.def_native(env, "procedure?", nat_procedure_p)?;
    vm.def_native(env, "vector?", nat_vector_p)?;
    vm.def_native(env, "bytevector?", nat_bytevector_p)?;
    vm.def_native(env, "dict?", nat_dict_p)?;
    vm.def_native(env, "eof-object?", nat_eof_p)?;
    vm.def_native(env, "void?", nat_void_p)?;
    vm.def_native(env, "error-object?", nat_error_p)?;
    vm.def_native(env, "port?", nat_port_p)?;
    vm.def_native(env, "not", nat_not)?;
    vm.def_native(env, "eq?", nat_eq_p)?;
    vm.def_native(env, "eqv?", nat_eqv_p)?;
    vm.def_native(env, "equal?", nat_equal_p)?;
    Ok(())
}

fn one(vm: &Vm, name: &str, args: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n(name, &argv, 1)?;
    Ok(argv[0])
}

fn two(vm: &Vm, name: &str, args: CellId) -> RunResult<(CellId, CellId)> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n(name, &argv, 2)?;
    Ok((argv[0], argv[1]))
}

fn nat_null_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "null?", args)?;
    Ok(Heap::bool_id(id == CellId::NIL))
}

fn nat_pair_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "pair?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id).is_pair()))
}

fn nat_atom_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "atom?", args)?;
    Ok(Heap::bool_id(!vm.heap.tag(id).is_pair()))
}

/// A proper (finite, nil-terminated) list.
fn nat_list_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "list?", args)?;
    Ok(Heap::bool_id(vm.heap.list_to_vec(id).is_ok()))
}

fn nat_symbol_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "symbol?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id).features().is_any_sym))
}

fn nat_string_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "string?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id).features().is_any_str))
}

fn nat_char_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "char?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id) == Tag::Char))
}

fn nat_boolean_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "boolean?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id) == Tag::Bool))
}

fn nat_procedure_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "procedure?", args)?;
    let is_proc = matches!(
        vm.heap.tag(id),
        Tag::Proc | Tag::Nproc | Tag::NativeProc | Tag::NativeNproc
    );
    Ok(Heap::bool_id(is_proc))
}

fn nat_vector_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "vector?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id).features().is_any_svec))
}

fn nat_bytevector_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "bytevector?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id).features().is_any_bvec))
}

fn nat_dict_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "dict?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id) == Tag::Dict))
}

fn nat_eof_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "eof-object?", args)?;
    Ok(Heap::bool_id(id == CellId::EOF))
}

fn nat_void_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "void?", args)?;
    Ok(Heap::bool_id(id == CellId::VOID))
}

fn nat_error_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "error-object?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id) == Tag::Error))
}

fn nat_port_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "port?", args)?;
    Ok(Heap::bool_id(vm.heap.tag(id) == Tag::PortHeap))
}

fn nat_not(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let id = one(vm, "not", args)?;
    Ok(Heap::bool_id(id == CellId::FALSE))
}

fn nat_eq_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let (a, b) = two(vm, "eq?", args)?;
    Ok(Heap::bool_id(eq_cells(&vm.heap, a, b)))
}

fn nat_eqv_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let (a, b) = two(vm, "eqv?", args)?;
    Ok(Heap::bool_id(eqv_cells(&vm.heap, a, b)))
}

fn nat_equal_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let (a, b) = two(vm, "equal?", args)?;
    Ok(Heap::bool_id(equal_cells(&vm.heap, a, b)?))
}
