//! Vector procedures. The immediate (0/1/2 element) and heap-backed
//! forms are interchangeable here.

use crate::{
    cell::CellId,
    error::RunResult,
    native::{args_vec, expect_n, expect_range, want_index, want_svec},
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm, env: CellId) -> RunResult<()> {
    vm.def_native(env, "vector", nat_vector)?;
    vm.def_native(env, "make-vector", nat_make_vector)?;
    vm.def_native(env, "vector-length", nat_vector_length)?;
    vm.def_native(env, "vector-ref", nat_vector_ref)?;
    vm.def_native(env, "vector-set!", nat_vector_set)?;
    vm.def_native(env, "vector->list", nat_vector_to_list)?;
    vm.def_native(env, "list->vector", nat_list_to_vector)?;
    vm.def_native(env, "vector-fill!", nat_vector_fill)?;
    Ok(())
}

fn nat_vector(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    vm.heap.svec_cell(&argv, env)
}

fn nat_make_vector(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("make-vector", &argv, 1, 2)?;
    let len = want_index(&vm.heap, argv[0])?;
    let fill = argv.get(1).copied().unwrap_or(CellId::NIL);
    let elems = vec![fill; len];
    vm.heap.svec_cell(&elems, env)
}

fn nat_vector_length(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("vector-length", &argv, 1)?;
    let vec = want_svec(&vm.heap, argv[0])?;
    vm.heap.int_cell(vm.heap.svec_len(vec) as i64, env)
}

fn nat_vector_ref(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("vector-ref", &argv, 2)?;
    let vec = want_svec(&vm.heap, argv[0])?;
    let index = want_index(&vm.heap, argv[1])?;
    vm.heap.svec_get(vec, index)
}

fn nat_vector_set(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("vector-set!", &argv, 3)?;
    let vec = want_svec(&vm.heap, argv[0])?;
    let index = want_index(&vm.heap, argv[1])?;
    vm.heap.svec_set(vec, index, argv[2])?;
    Ok(CellId::VOID)
}

fn nat_vector_to_list(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("vector->list", &argv, 1)?;
    let vec = want_svec(&vm.heap, argv[0])?;
    let elems = vm.heap.svec_elems(vec);
    vm.heap.list_from_slice(&elems, env)
}

fn nat_list_to_vector(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("list->vector", &argv, 1)?;
    let elems = vm.heap.list_to_vec(argv[0])?;
    vm.heap.svec_cell(&elems, env)
}

fn nat_vector_fill(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("vector-fill!", &argv, 2)?;
    let vec = want_svec(&vm.heap, argv[0])?;
    let len = vm.heap.svec_len(vec);
    for i in 0..len {
        vm.heap.svec_set(vec, i, argv[1])?;
    }
    Ok(CellId::VOID)
}

#[cfg(test)]
mod tests {
    use crate::error::LispError;

    // Arity errors surface with the procedure name; spot-check the
    // formatting once here rather than per procedure.
    #[test]
    fn arity_error_names_the_procedure() {
        let err = LispError::arity("vector-ref", "2", 3);
        assert!(err.to_string().contains("vector-ref"));
    }
}
