//! Output, input and string-port procedures.

use crate::{
    cell::CellId,
    error::{LispError, RunResult},
    native::{args_vec, expect_n, expect_range, want_port, want_str},
    port::{StringInputPort, StringOutputPort},
    printer::{WriteMode, WriteOpts},
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm, env: CellId) -> RunResult<()> {
    vm.def_native(env, "display", nat_display)?;
    vm.def_native(env, "write", nat_write)?;
    vm.def_native(env, "newline", nat_newline)?;
    vm.def_native(env, "read", nat_read)?;
    vm.def_native(env, "read-char", nat_read_char)?;
    vm.def_native(env, "peek-char", nat_peek_char)?;
    vm.def_native(env, "open-input-string", nat_open_input_string)?;
    vm.def_native(env, "open-output-string", nat_open_output_string)?;
    vm.def_native(env, "get-output-string", nat_get_output_string)?;
    vm.def_native(env, "current-input-port", nat_current_input_port)?;
    vm.def_native(env, "current-output-port", nat_current_output_port)?;
    vm.def_native(env, "current-error-port", nat_current_error_port)?;
    vm.def_native(env, "load", nat_load)?;
    Ok(())
}

fn emit(vm: &mut Vm, args: CellId, name: &str, mode: WriteMode) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range(name, &argv, 1, 2)?;
    let port = match argv.get(1) {
        Some(&id) => want_port(&vm.heap, id)?,
        None => vm.current_output(),
    };
    let opts = WriteOpts { mode, ..WriteOpts::default() };
    let text = vm.write_sexpr(argv[0], &opts);
    vm.heap.port_mut(port)?.write_str(&text)?;
    Ok(CellId::VOID)
}

fn nat_display(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    emit(vm, args, "display", WriteMode::Display)
}

fn nat_write(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    emit(vm, args, "write", WriteMode::Write)
}

fn nat_newline(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("newline", &argv, 0, 1)?;
    let port = match argv.first() {
        Some(&id) => want_port(&vm.heap, id)?,
        None => vm.current_output(),
    };
    let port = vm.heap.port_mut(port)?;
    port.write_str("\n")?;
    port.flush()?;
    Ok(CellId::VOID)
}

/// `(read [port])`: one S-expression from the port, or the eof object.
fn nat_read(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("read", &argv, 0, 1)?;
    let port = match argv.first() {
        Some(&id) => want_port(&vm.heap, id)?,
        None => vm.current_input(),
    };
    vm.read_port(port)
}

fn nat_read_char(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("read-char", &argv, 0, 1)?;
    let port = match argv.first() {
        Some(&id) => want_port(&vm.heap, id)?,
        None => vm.current_input(),
    };
    let c = vm.heap.port_mut(port)?.read_char()?;
    match c {
        Some(c) => vm.heap.char_cell(c, env),
        None => Ok(CellId::EOF),
    }
}

fn nat_peek_char(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("peek-char", &argv, 0, 1)?;
    let port = match argv.first() {
        Some(&id) => want_port(&vm.heap, id)?,
        None => vm.current_input(),
    };
    let c = vm.heap.port_mut(port)?.peek_char()?;
    match c {
        Some(c) => vm.heap.char_cell(c, env),
        None => Ok(CellId::EOF),
    }
}

fn nat_open_input_string(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("open-input-string", &argv, 1)?;
    let text = want_str(&vm.heap, argv[0])?;
    vm.heap.port_cell(Box::new(StringInputPort::new(&text)), env)
}

fn nat_open_output_string(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("open-output-string", &argv, 0)?;
    vm.heap.port_cell(Box::new(StringOutputPort::new()), env)
}

fn nat_get_output_string(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("get-output-string", &argv, 1)?;
    let port = want_port(&vm.heap, argv[0])?;
    let text = {
        let boxed = vm.heap.port_mut(port)?;
        let out = boxed
            .as_any_mut()
            .downcast_mut::<StringOutputPort>()
            .ok_or_else(|| LispError::type_error("get-output-string: not a string output port"))?;
        out.contents().to_owned()
    };
    vm.heap.string_cell(&text, env)
}

fn nat_current_input_port(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    expect_n("current-input-port", &args_vec(&vm.heap, args)?, 0)?;
    Ok(vm.current_input())
}

fn nat_current_output_port(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    expect_n("current-output-port", &args_vec(&vm.heap, args)?, 0)?;
    Ok(vm.current_output())
}

fn nat_current_error_port(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    expect_n("current-error-port", &args_vec(&vm.heap, args)?, 0)?;
    Ok(vm.current_error())
}

/// `(load "file.scm")`: read and evaluate every form from the file in
/// the interaction environment; returns the last result.
fn nat_load(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("load", &argv, 1)?;
    let path = want_str(&vm.heap, argv[0])?;
    vm.load(std::path::Path::new(&path))
}
