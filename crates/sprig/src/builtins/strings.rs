//! String, symbol and character procedures.
//!
//! Strings index by character, not byte; the immediate/heap/external
//! storage split never shows through here.

use crate::{
    cell::CellId,
    error::{LispError, RunResult},
    native::{args_vec, expect_n, expect_range, want_char, want_index, want_int, want_str, want_sym},
    printer::WriteOpts,
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm, env: CellId) -> RunResult<()> {
    vm.def_native(env, "string-length", nat_string_length)?;
    vm.def_native(env, "string-ref", nat_string_ref)?;
    vm.def_native(env, "string-append", nat_string_append)?;
    vm.def_native(env, "substring", nat_substring)?;
    vm.def_native(env, "make-string", nat_make_string)?;
    vm.def_native(env, "string-copy", nat_string_copy)?;
    vm.def_native(env, "string=?", nat_string_eq)?;
    vm.def_native(env, "string->symbol", nat_string_to_symbol)?;
    vm.def_native(env, "symbol->string", nat_symbol_to_string)?;
    vm.def_native(env, "number->string", nat_number_to_string)?;
    vm.def_native(env, "string->number", nat_string_to_number)?;
    vm.def_native(env, "char->integer", nat_char_to_integer)?;
    vm.def_native(env, "integer->char", nat_integer_to_char)?;
    Ok(())
}

fn nat_string_length(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("string-length", &argv, 1)?;
    let text = want_str(&vm.heap, argv[0])?;
    vm.heap.int_cell(text.chars().count() as i64, env)
}

fn nat_string_ref(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("string-ref", &argv, 2)?;
    let text = want_str(&vm.heap, argv[0])?;
    let index = want_index(&vm.heap, argv[1])?;
    let c = text
        .chars()
        .nth(index)
        .ok_or_else(|| LispError::range(format!("string-ref: index {index} out of range")))?;
    vm.heap.char_cell(c, env)
}

fn nat_string_append(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    let mut out = String::new();
    for id in argv {
        out.push_str(&want_str(&vm.heap, id)?);
    }
    vm.heap.string_cell(&out, env)
}

fn nat_substring(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("substring", &argv, 2, 3)?;
    let text = want_str(&vm.heap, argv[0])?;
    let chars: Vec<char> = text.chars().collect();
    let start = want_index(&vm.heap, argv[1])?;
    let end = match argv.get(2) {
        Some(&id) => want_index(&vm.heap, id)?,
        None => chars.len(),
    };
    if start > end || end > chars.len() {
        return Err(LispError::range(format!(
            "substring: range {start}..{end} out of bounds for length {}",
            chars.len()
        )));
    }
    let out: String = chars[start..end].iter().collect();
    vm.heap.string_cell(&out, env)
}

fn nat_make_string(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_range("make-string", &argv, 1, 2)?;
    let len = want_index(&vm.heap, argv[0])?;
    let fill = match argv.get(1) {
        Some(&id) => want_char(&vm.heap, id)?,
        None => ' ',
    };
    let out: String = std::iter::repeat_n(fill, len).collect();
    vm.heap.string_cell(&out, env)
}

fn nat_string_copy(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("string-copy", &argv, 1)?;
    let text = want_str(&vm.heap, argv[0])?;
    vm.heap.string_cell(&text, env)
}

fn nat_string_eq(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    if argv.len() < 2 {
        return Err(LispError::arity("string=?", "at least 2", argv.len()));
    }
    let first = want_str(&vm.heap, argv[0])?;
    for &id in &argv[1..] {
        if want_str(&vm.heap, id)? != first {
            return Ok(CellId::FALSE);
        }
    }
    Ok(CellId::TRUE)
}

fn nat_string_to_symbol(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("string->symbol", &argv, 1)?;
    let text = want_str(&vm.heap, argv[0])?;
    vm.intern(&text)
}

fn nat_symbol_to_string(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("symbol->string", &argv, 1)?;
    let sym = want_sym(&vm.heap, argv[0])?;
    let name = vm.heap.sym_name(sym).into_owned();
    vm.heap.string_cell(&name, env)
}

fn nat_number_to_string(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("number->string", &argv, 1)?;
    if crate::equiv::num_of(&vm.heap, argv[0]).is_none() {
        return Err(LispError::expected("number", vm.heap.tag(argv[0]).name()));
    }
    let text = vm.write_sexpr(argv[0], &WriteOpts::default());
    vm.heap.string_cell(&text, env)
}

fn nat_string_to_number(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("string->number", &argv, 1)?;
    let text = want_str(&vm.heap, argv[0])?;
    match crate::reader::parse_number(&mut vm.heap, text.trim())? {
        Some(id) => Ok(id),
        None => Ok(CellId::FALSE),
    }
}

fn nat_char_to_integer(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("char->integer", &argv, 1)?;
    let c = want_char(&vm.heap, argv[0])?;
    vm.heap.int_cell(i64::from(u32::from(c)), env)
}

fn nat_integer_to_char(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("integer->char", &argv, 1)?;
    let n = want_int(&vm.heap, argv[0])?;
    let scalar = u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| LispError::range(format!("integer->char: {n} is not a character")))?;
    vm.heap.char_cell(scalar, env)
}
