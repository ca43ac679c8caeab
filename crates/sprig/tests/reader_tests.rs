//! Reader behavior: token shapes, sharp constants, sugar rewrites, and
//! the read/write round trip.

use pretty_assertions::assert_eq;
use sprig::{ErrKind, Limits, Vm, WriteOpts};

fn vm() -> Vm {
    Vm::new(Limits::default())
}

fn read_write(vm: &mut Vm, src: &str) -> String {
    let form = vm
        .read_str(src)
        .unwrap_or_else(|err| panic!("{src}: {err}"))
        .unwrap_or_else(|| panic!("{src}: expected a form"));
    vm.write_sexpr(form, &WriteOpts::default())
}

// =============================================================================
// 1. Atoms
// =============================================================================

#[test]
fn numbers_classify_by_shape() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, "42"), "42");
    assert_eq!(read_write(&mut vm, "-7"), "-7");
    assert_eq!(read_write(&mut vm, "+5"), "5");
    assert_eq!(read_write(&mut vm, "2.5"), "2.5");
    assert_eq!(read_write(&mut vm, ".5"), "0.5");
    assert_eq!(read_write(&mut vm, "1e3"), "1000.0");
    assert_eq!(read_write(&mut vm, "3/4"), "3/4");
    assert_eq!(read_write(&mut vm, "6/4"), "3/2");
    assert_eq!(read_write(&mut vm, "4/2"), "2");
}

#[test]
fn number_like_symbols_stay_symbols() {
    let mut vm = vm();
    for name in ["+", "-", "...", "=>", "::", "1+", "a1", "-abc", "inf", "nan"] {
        let form = vm.read_str(name).unwrap().unwrap();
        assert!(
            vm.as_sym_name(form).is_some(),
            "{name} should read as a symbol, got {}",
            vm.write_sexpr(form, &WriteOpts::default())
        );
    }
}

#[test]
fn sharp_constants() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, "#t"), "#t");
    assert_eq!(read_write(&mut vm, "#f"), "#f");
    assert_eq!(read_write(&mut vm, "#\\a"), "#\\a");
    assert_eq!(read_write(&mut vm, "#\\space"), "#\\space");
    assert_eq!(read_write(&mut vm, "#\\newline"), "#\\newline");
    assert_eq!(read_write(&mut vm, "#x1F"), "31");
    assert_eq!(read_write(&mut vm, "#x-a"), "-10");
    assert_eq!(read_write(&mut vm, "#o17"), "15");
    assert_eq!(read_write(&mut vm, "#b1010"), "10");
    assert_eq!(read_write(&mut vm, "#d42"), "42");
    assert_eq!(read_write(&mut vm, "#e2.0"), "2");
    assert_eq!(read_write(&mut vm, "#i3"), "3.0");
}

#[test]
fn strings_with_escapes() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, r#""plain""#), r#""plain""#);
    assert_eq!(read_write(&mut vm, r#""a\"b""#), r#""a\"b""#);
    assert_eq!(read_write(&mut vm, r#""line\nnext""#), r#""line\nnext""#);
    assert_eq!(read_write(&mut vm, r#""tab\there""#), r#""tab\there""#);
}

// =============================================================================
// 2. Lists, dots and comments
// =============================================================================

#[test]
fn proper_and_dotted_lists() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, "(1 2 3)"), "(1 2 3)");
    assert_eq!(read_write(&mut vm, "(1 . 2)"), "(1 . 2)");
    assert_eq!(read_write(&mut vm, "(1 2 . 3)"), "(1 2 . 3)");
    assert_eq!(read_write(&mut vm, "()"), "()");
    assert_eq!(read_write(&mut vm, "((a) (b c))"), "((a) (b c))");
}

#[test]
fn comments_and_whitespace_are_skipped() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, "; leading comment\n  (1 ; inline\n 2)"), "(1 2)");
    assert_eq!(read_write(&mut vm, "\t\r\n  42"), "42");
}

#[test]
fn multiple_forms_read_in_sequence() {
    let mut vm = vm();
    let result = vm.eval_str("(define a 1) (define b 2) (+ a b)").unwrap();
    assert_eq!(vm.as_int(result), Some(3));
}

// =============================================================================
// 3. Sugar rewrites
// =============================================================================

#[test]
fn quote_family_sugar() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, "'x"), "(quote x)");
    assert_eq!(read_write(&mut vm, "`x"), "(quasiquote x)");
    assert_eq!(read_write(&mut vm, ",x"), "(unquote x)");
    assert_eq!(read_write(&mut vm, ",@x"), "(unquote-splicing x)");
    assert_eq!(read_write(&mut vm, "'(1 'a)"), "(quote (1 (quote a)))");
}

/// `#(...)` is rewritten to the `(apply vector (quote (...)))` form the
/// evaluator turns into a real vector.
#[test]
fn vector_literals_rewrite_to_apply_vector() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, "#(1 2 3)"), "(apply vector (quote (1 2 3)))");
    let value = vm.eval_str("#(1 2 3)").unwrap();
    assert_eq!(vm.write_sexpr(value, &WriteOpts::default()), "#(1 2 3)");
}

#[test]
fn bytevector_literals() {
    let mut vm = vm();
    assert_eq!(read_write(&mut vm, "#u8(1 2 255)"), "#u8(1 2 255)");
    let err = vm.read_str("#u8(1 300)").unwrap_err();
    assert_eq!(err.kind, ErrKind::ReadError);
}

// =============================================================================
// 4. Read errors
// =============================================================================

#[test]
fn malformed_input_raises_read_errors() {
    let mut vm = vm();
    for src in ["(1 2", ")", "(1 . 2 3)", "\"unterminated", "(1 .", "#\\frobnicate", "#zz"] {
        let err = vm.read_str(src).expect_err(src);
        assert_eq!(err.kind, ErrKind::ReadError, "{src} should be a read error, got {err}");
    }
}

#[test]
fn read_errors_carry_positions() {
    let mut vm = vm();
    let err = vm.read_str("(a\nb\n\"oops").unwrap_err();
    assert!(err.message.starts_with("3:"), "line 3 expected in: {}", err.message);
}

// =============================================================================
// 5. Round trip (write then read back)
// =============================================================================

#[test]
fn write_read_round_trip_is_equal() {
    let mut vm = vm();
    let cases = [
        "42",
        "-3",
        "2.5",
        "1/3",
        "#t",
        "#f",
        "#\\x",
        "#\\space",
        "\"string with \\\"quotes\\\" and \\n\"",
        "sym",
        "(1 2 3)",
        "(1 (2 (3)) . 4)",
        "()",
        "#u8(0 128 255)",
    ];
    for src in cases {
        let original = vm.read_str(src).unwrap().unwrap();
        vm.protect(original);
        let written = vm.write_sexpr(original, &WriteOpts::default());
        let reread = vm.read_str(&written).unwrap().unwrap();
        vm.protect(reread);
        assert!(
            vm.equal(original, reread).unwrap(),
            "{src}: reading back {written} must be equal? to the original"
        );
        assert_eq!(
            vm.write_sexpr(reread, &WriteOpts::default()),
            written,
            "{src} must round trip"
        );
        vm.unprotect(2);
    }
}

/// Vectors round trip through one evaluation because the reader rewrites
/// the literal into the vector-building form.
#[test]
fn vectors_round_trip_through_evaluation() {
    let mut vm = vm();
    let original = vm.eval_str("#(1 (2) \"x\")").unwrap();
    vm.protect(original);
    let written = vm.write_sexpr(original, &WriteOpts::default());
    let rebuilt = vm.eval_str(&written).unwrap();
    vm.protect(rebuilt);
    assert!(vm.equal(original, rebuilt).unwrap());
    assert_eq!(vm.write_sexpr(rebuilt, &WriteOpts::default()), written);
    vm.unprotect(2);
}
