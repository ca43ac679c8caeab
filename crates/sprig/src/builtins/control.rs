//! Control, error raising, dictionaries, and VM introspection.

use crate::{
    cell::CellId,
    dict,
    error::{LispError, RunResult},
    native::{args_vec, expect_at_least, expect_n, expect_range, want_dict, want_index, want_str},
    printer::WriteOpts,
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm, env: CellId) -> RunResult<()> {
    vm.def_native(env, "apply", nat_apply)?;
    vm.def_native(env, "eval", nat_eval)?;
    vm.def_native(env, "error", nat_error)?;
    vm.def_native(env, "void", nat_void)?;
    vm.def_native(env, "exit", nat_exit)?;
    vm.def_native(env, "gensym", nat_gensym)?;
    vm.def_native(env, "gc", nat_gc)?;
    vm.def_native(env, "heap-stats", nat_heap_stats)?;
    vm.def_native(env, "interaction-environment", nat_interaction_environment)?;
    vm.def_native(env, "make-dict", nat_make_dict)?;
    vm.def_native(env, "dict-ref", nat_dict_ref)?;
    vm.def_native(env, "dict-set!", nat_dict_set)?;
    vm.def_native(env, "dict-keys", nat_dict_keys)?;
    vm.def_native(env, "dict-values", nat_dict_values)?;
    Ok(())
}

/// `(apply proc arg ... arg-list)`: the final argument supplies the tail
/// of the argument list. The result may be a thunk; the evaluator's
/// trampoline unwraps it, so `apply` in tail position is still a tail
/// call.
fn nat_apply(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_at_least("apply", &argv, 2)?;
    let proc = argv[0];
    let (&last, middle) = argv[1..].split_last().expect("at least one more argument");
    // The final argument must itself be a list.
    vm.heap.list_to_vec(last)?;
    let call_args = vm.heap.list_with_tail(middle, last, env)?;
    vm.heap.root_push(call_args);
    let result = vm.apply(proc, call_args, env);
    vm.heap.root_pop(1);
    result
}

/// `(eval expr [env])` evaluates a datum as a program, in the given
/// dictionary or the interaction environment. Returns a tail thunk, so
/// `eval` in tail position consumes no stack.
fn nat_eval(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("eval", &argv, 1, 2)?;
    let target_env = match argv.get(1) {
        Some(&id) => want_dict(&vm.heap, id)?,
        None => vm.interaction_environment(),
    };
    vm.make_tail_call(argv[0], target_env)
}

/// `(error message irritant ...)` raises a user error; the irritants are
/// rendered with `write` into the error's irritants list.
fn nat_error(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_at_least("error", &argv, 1)?;
    let message = if vm.heap.tag(argv[0]).features().is_any_str {
        want_str(&vm.heap, argv[0])?
    } else {
        vm.write_sexpr(argv[0], &WriteOpts::display())
    };
    let irritants = argv[1..]
        .iter()
        .map(|&id| vm.write_sexpr(id, &WriteOpts::default()))
        .collect();
    Err(LispError::user(message, irritants))
}

fn nat_void(_vm: &mut Vm, _args: CellId, _env: CellId) -> RunResult<CellId> {
    Ok(CellId::VOID)
}

/// `(exit [code])` requests termination; the driving harness checks
/// [`Vm::exit_requested`] and stops its loop.
fn nat_exit(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("exit", &argv, 0, 1)?;
    let code = match argv.first() {
        Some(&id) => i32::try_from(crate::native::want_int(&vm.heap, id)?).unwrap_or(1),
        None => 0,
    };
    vm.request_exit(code);
    Ok(CellId::VOID)
}

fn nat_gensym(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("gensym", &argv, 0)?;
    vm.heap.gensym_cell(env)
}

/// Forces one full collection cycle.
fn nat_gc(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("gc", &argv, 0)?;
    vm.heap.collect();
    Ok(CellId::VOID)
}

/// Returns the heap snapshot as a display string.
fn nat_heap_stats(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("heap-stats", &argv, 0)?;
    let stats = vm.heap_stats();
    let mut text = format!(
        "live {} free {} total {} symbols {}",
        stats.live_cells, stats.free_cells, stats.total_cells, stats.interned_symbols
    );
    for (name, count) in &stats.cells_by_tag {
        text.push_str(&format!("\n  {name}: {count}"));
    }
    vm.heap.string_cell(&text, env)
}

fn nat_interaction_environment(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("interaction-environment", &argv, 0)?;
    Ok(vm.interaction_environment())
}

fn nat_make_dict(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("make-dict", &argv, 0, 1)?;
    let size = match argv.first() {
        Some(&id) => want_index(&vm.heap, id)?,
        None => 0,
    };
    dict::dict_new(&mut vm.heap, size, env)
}

fn nat_dict_ref(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("dict-ref", &argv, 2, 3)?;
    let d = want_dict(&vm.heap, argv[0])?;
    match dict::dict_ref_q(&vm.heap, d, argv[1]) {
        Some(value) => Ok(value),
        None => match argv.get(2) {
            Some(&default) => Ok(default),
            None => dict::dict_ref(&vm.heap, d, argv[1]),
        },
    }
}

fn nat_dict_set(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("dict-set!", &argv, 3)?;
    let d = want_dict(&vm.heap, argv[0])?;
    dict::bind(&mut vm.heap, d, argv[1], argv[2], env)?;
    Ok(CellId::VOID)
}

fn nat_dict_keys(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("dict-keys", &argv, 1)?;
    let d = want_dict(&vm.heap, argv[0])?;
    dict::dict_keys(&mut vm.heap, d, env)
}

fn nat_dict_values(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("dict-values", &argv, 1)?;
    let d = want_dict(&vm.heap, argv[0])?;
    dict::dict_values(&mut vm.heap, d, env)
}
