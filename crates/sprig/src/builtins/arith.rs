//! Arithmetic over the int/rational/real tower.
//!
//! Integer arithmetic is checked: overflow raises a range error rather
//! than wrapping or promoting (there is no bignum tier). Rational results
//! normalize through the heap constructor, which also demotes
//! denominator-1 rationals back to integers. Any real operand makes the
//! whole operation inexact.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::{
    cell::{CellId, Tag},
    equiv::{Num, num_of},
    error::{LispError, RunResult},
    heap::Heap,
    native::{args_vec, expect_n, want_int},
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm, env: CellId) -> RunResult<()> {
    vm.def_native(env, "+", nat_add)?;
    vm.def_native(env, "-", nat_sub)?;
    vm.def_native(env, "*", nat_mul)?;
    vm.def_native(env, "/", nat_div)?;
    vm.def_native(env, "=", nat_num_eq)?;
    vm.def_native(env, "<", nat_lt)?;
    vm.def_native(env, ">", nat_gt)?;
    vm.def_native(env, "<=", nat_le)?;
    vm.def_native(env, ">=", nat_ge)?;
    vm.def_native(env, "abs", nat_abs)?;
    vm.def_native(env, "min", nat_min)?;
    vm.def_native(env, "max", nat_max)?;
    vm.def_native(env, "quotient", nat_quotient)?;
    vm.def_native(env, "remainder", nat_remainder)?;
    vm.def_native(env, "modulo", nat_modulo)?;
    vm.def_native(env, "zero?", nat_zero_p)?;
    vm.def_native(env, "positive?", nat_positive_p)?;
    vm.def_native(env, "negative?", nat_negative_p)?;
    vm.def_native(env, "number?", nat_number_p)?;
    vm.def_native(env, "integer?", nat_integer_p)?;
    vm.def_native(env, "real?", nat_real_p)?;
    vm.def_native(env, "rational?", nat_rational_p)?;
    Ok(())
}

fn nums(heap: &Heap, name: &str, args: CellId) -> RunResult<SmallVec<[Num; 8]>> {
    let argv = args_vec(heap, args)?;
    let mut out = SmallVec::with_capacity(argv.len());
    for id in argv {
        out.push(
            num_of(heap, id)
                .ok_or_else(|| LispError::expected(&format!("number for {name}"), heap.tag(id).name()))?,
        );
    }
    Ok(out)
}

fn materialize(heap: &mut Heap, num: Num, env: CellId) -> RunResult<CellId> {
    match num {
        Num::Int(n) => heap.int_cell(n, env),
        Num::Rational(n, d) => heap.rational_cell(n, d, env),
        Num::Real(x) => heap.real_cell(x, env),
    }
}

fn overflow(op: &str) -> LispError {
    LispError::range(format!("integer overflow in {op}"))
}

/// Reduces an i128 ratio back into i64 numerator/denominator.
fn fit_rational(n: i128, d: i128, op: &str) -> RunResult<Num> {
    if d == 0 {
        return Err(LispError::range("division by zero"));
    }
    let g = num_integer::gcd(n, d);
    let (n, d) = if g == 0 { (0, 1) } else { (n / g, d / g) };
    let (n, d) = if d < 0 { (-n, -d) } else { (n, d) };
    match (i64::try_from(n), i64::try_from(d)) {
        (Ok(n), Ok(d)) => {
            if d == 1 {
                Ok(Num::Int(n))
            } else {
                Ok(Num::Rational(n, d))
            }
        }
        _ => Err(overflow(op)),
    }
}

fn as_ratio(num: Num) -> Option<(i128, i128)> {
    match num {
        Num::Int(n) => Some((i128::from(n), 1)),
        Num::Rational(n, d) => Some((i128::from(n), i128::from(d))),
        Num::Real(_) => None,
    }
}

fn num_add(a: Num, b: Num) -> RunResult<Num> {
    match (as_ratio(a), as_ratio(b)) {
        (Some((an, ad)), Some((bn, bd))) => fit_rational(an * bd + bn * ad, ad * bd, "+"),
        _ => Ok(Num::Real(a.to_real() + b.to_real())),
    }
}

fn num_sub(a: Num, b: Num) -> RunResult<Num> {
    match (as_ratio(a), as_ratio(b)) {
        (Some((an, ad)), Some((bn, bd))) => fit_rational(an * bd - bn * ad, ad * bd, "-"),
        _ => Ok(Num::Real(a.to_real() - b.to_real())),
    }
}

fn num_mul(a: Num, b: Num) -> RunResult<Num> {
    match (as_ratio(a), as_ratio(b)) {
        (Some((an, ad)), Some((bn, bd))) => fit_rational(an * bn, ad * bd, "*"),
        _ => Ok(Num::Real(a.to_real() * b.to_real())),
    }
}

fn num_div(a: Num, b: Num) -> RunResult<Num> {
    match (as_ratio(a), as_ratio(b)) {
        (Some((an, ad)), Some((bn, bd))) => fit_rational(an * bd, ad * bn, "/"),
        _ => Ok(Num::Real(a.to_real() / b.to_real())),
    }
}

/// Exact ordering where both sides are exact, float ordering otherwise.
/// `None` only for NaN comparisons.
fn num_cmp(a: Num, b: Num) -> Option<Ordering> {
    match (as_ratio(a), as_ratio(b)) {
        (Some((an, ad)), Some((bn, bd))) => Some((an * bd).cmp(&(bn * ad))),
        _ => a.to_real().partial_cmp(&b.to_real()),
    }
}

fn nat_add(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let operands = nums(&vm.heap, "+", args)?;
    let mut acc = Num::Int(0);
    for num in operands {
        acc = num_add(acc, num)?;
    }
    materialize(&mut vm.heap, acc, env)
}

fn nat_sub(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let operands = nums(&vm.heap, "-", args)?;
    match operands.split_first() {
        None => Err(LispError::arity("-", "at least 1", 0)),
        Some((&first, [])) => {
            let negated = num_sub(Num::Int(0), first)?;
            materialize(&mut vm.heap, negated, env)
        }
        Some((&first, rest)) => {
            let mut acc = first;
            for &num in rest {
                acc = num_sub(acc, num)?;
            }
            materialize(&mut vm.heap, acc, env)
        }
    }
}

fn nat_mul(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let operands = nums(&vm.heap, "*", args)?;
    let mut acc = Num::Int(1);
    for num in operands {
        acc = num_mul(acc, num)?;
    }
    materialize(&mut vm.heap, acc, env)
}

fn nat_div(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let operands = nums(&vm.heap, "/", args)?;
    match operands.split_first() {
        None => Err(LispError::arity("/", "at least 1", 0)),
        Some((&first, [])) => {
            let inverted = num_div(Num::Int(1), first)?;
            materialize(&mut vm.heap, inverted, env)
        }
        Some((&first, rest)) => {
            let mut acc = first;
            for &num in rest {
                acc = num_div(acc, num)?;
            }
            materialize(&mut vm.heap, acc, env)
        }
    }
}

fn compare_chain(vm: &Vm, name: &str, args: CellId, accept: fn(Ordering) -> bool) -> RunResult<CellId> {
    let operands = nums(&vm.heap, name, args)?;
    if operands.len() < 2 {
        return Err(LispError::arity(name, "at least 2", operands.len()));
    }
    for window in operands.windows(2) {
        let ord = num_cmp(window[0], window[1])
            .ok_or_else(|| LispError::range(format!("{name}: unordered comparison")))?;
        if !accept(ord) {
            return Ok(CellId::FALSE);
        }
    }
    Ok(CellId::TRUE)
}

fn nat_num_eq(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compare_chain(vm, "=", args, Ordering::is_eq)
}

fn nat_lt(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compare_chain(vm, "<", args, Ordering::is_lt)
}

fn nat_gt(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compare_chain(vm, ">", args, Ordering::is_gt)
}

fn nat_le(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compare_chain(vm, "<=", args, Ordering::is_le)
}

fn nat_ge(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    compare_chain(vm, ">=", args, Ordering::is_ge)
}

fn nat_abs(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let operands = nums(&vm.heap, "abs", args)?;
    if operands.len() != 1 {
        return Err(LispError::arity("abs", "1", operands.len()));
    }
    let result = match operands[0] {
        Num::Int(n) => Num::Int(n.checked_abs().ok_or_else(|| overflow("abs"))?),
        Num::Rational(n, d) => Num::Rational(n.checked_abs().ok_or_else(|| overflow("abs"))?, d),
        Num::Real(x) => Num::Real(x.abs()),
    };
    materialize(&mut vm.heap, result, env)
}

fn extremum(vm: &mut Vm, name: &str, args: CellId, env: CellId, keep: fn(Ordering) -> bool) -> RunResult<CellId> {
    let operands = nums(&vm.heap, name, args)?;
    let Some((&first, rest)) = operands.split_first() else {
        return Err(LispError::arity(name, "at least 1", 0));
    };
    let mut best = first;
    for &num in rest {
        let ord = num_cmp(num, best)
            .ok_or_else(|| LispError::range(format!("{name}: unordered comparison")))?;
        if keep(ord) {
            best = num;
        }
    }
    materialize(&mut vm.heap, best, env)
}

fn nat_min(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    extremum(vm, "min", args, env, Ordering::is_lt)
}

fn nat_max(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    extremum(vm, "max", args, env, Ordering::is_gt)
}

fn int_pair(vm: &Vm, name: &str, args: CellId) -> RunResult<(i64, i64)> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n(name, &argv, 2)?;
    let a = want_int(&vm.heap, argv[0])?;
    let b = want_int(&vm.heap, argv[1])?;
    if b == 0 {
        return Err(LispError::range("division by zero"));
    }
    Ok((a, b))
}

fn nat_quotient(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let (a, b) = int_pair(vm, "quotient", args)?;
    let q = a.checked_div(b).ok_or_else(|| overflow("quotient"))?;
    vm.heap.int_cell(q, env)
}

fn nat_remainder(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let (a, b) = int_pair(vm, "remainder", args)?;
    let r = a.checked_rem(b).ok_or_else(|| overflow("remainder"))?;
    vm.heap.int_cell(r, env)
}

fn nat_modulo(vm: &mut Vm, args: CellId, env: CellId) -> RunResult<CellId> {
    let (a, b) = int_pair(vm, "modulo", args)?;
    let r = a.checked_rem(b).ok_or_else(|| overflow("modulo"))?;
    let m = if r != 0 && (r < 0) != (b < 0) { r + b } else { r };
    vm.heap.int_cell(m, env)
}

fn sign_test(vm: &Vm, name: &str, args: CellId, accept: fn(Ordering) -> bool) -> RunResult<CellId> {
    let operands = nums(&vm.heap, name, args)?;
    if operands.len() != 1 {
        return Err(LispError::arity(name, "1", operands.len()));
    }
    let ord = num_cmp(operands[0], Num::Int(0))
        .ok_or_else(|| LispError::range(format!("{name}: unordered comparison")))?;
    Ok(Heap::bool_id(accept(ord)))
}

fn nat_zero_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    sign_test(vm, "zero?", args, Ordering::is_eq)
}

fn nat_positive_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    sign_test(vm, "positive?", args, Ordering::is_gt)
}

fn nat_negative_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    sign_test(vm, "negative?", args, Ordering::is_lt)
}

fn tag_test(vm: &Vm, name: &str, args: CellId, test: fn(Tag) -> bool) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n(name, &argv, 1)?;
    Ok(Heap::bool_id(test(vm.heap.tag(argv[0]))))
}

fn nat_number_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    tag_test(vm, "number?", args, |t| matches!(t, Tag::Int | Tag::Real | Tag::Rational))
}

fn nat_integer_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    let argv = args_vec(&vm.heap, args)?;
    expect_n("integer?", &argv, 1)?;
    let cell = vm.heap.cell(argv[0]);
    let is_integer = match cell.tag() {
        Tag::Int => true,
        Tag::Real => cell.as_real().fract() == 0.0,
        _ => false,
    };
    Ok(Heap::bool_id(is_integer))
}

fn nat_real_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    // Every number in the tower is real.
    tag_test(vm, "real?", args, |t| matches!(t, Tag::Int | Tag::Real | Tag::Rational))
}

fn nat_rational_p(vm: &mut Vm, args: CellId, _env: CellId) -> RunResult<CellId> {
    tag_test(vm, "rational?", args, |t| matches!(t, Tag::Int | Tag::Rational))
}
