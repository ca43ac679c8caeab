//! Evaluator behavior: self-evaluation, special forms, quasiquotation,
//! macros, and application.

use pretty_assertions::assert_eq;
use sprig::{Limits, Vm, WriteOpts};

fn vm() -> Vm {
    Vm::new(Limits::default())
}

fn eval_int(vm: &mut Vm, src: &str) -> i64 {
    let result = vm.eval_str(src).unwrap_or_else(|err| panic!("{src}: {err}"));
    vm.as_int(result).unwrap_or_else(|| panic!("{src}: expected an integer result"))
}

fn eval_write(vm: &mut Vm, src: &str) -> String {
    let result = vm.eval_str(src).unwrap_or_else(|err| panic!("{src}: {err}"));
    vm.write_sexpr(result, &WriteOpts::default())
}

// =============================================================================
// 1. Self-evaluating values and variable reference
// =============================================================================

#[test]
fn atoms_self_evaluate() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "42"), "42");
    assert_eq!(eval_write(&mut vm, "2.5"), "2.5");
    assert_eq!(eval_write(&mut vm, "1/2"), "1/2");
    assert_eq!(eval_write(&mut vm, "#t"), "#t");
    assert_eq!(eval_write(&mut vm, "#f"), "#f");
    assert_eq!(eval_write(&mut vm, "#\\a"), "#\\a");
    assert_eq!(eval_write(&mut vm, "\"hi\""), "\"hi\"");
}

#[test]
fn define_then_reference() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(define x 10) x"), 10);
    // define returns void, which the writer renders distinctly
    assert_eq!(eval_write(&mut vm, "(define y 1)"), "#<void>");
}

// =============================================================================
// 2. Arithmetic and application
// =============================================================================

#[test]
fn addition_of_three_operands() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(+ 1 2 3)"), 6);
}

#[test]
fn numeric_tower_mixes() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "(+ 1/2 1/3)"), "5/6");
    assert_eq!(eval_write(&mut vm, "(+ 1/2 1/2)"), "1");
    assert_eq!(eval_write(&mut vm, "(* 2 2.5)"), "5.0");
    assert_eq!(eval_write(&mut vm, "(/ 1 2)"), "1/2");
    assert_eq!(eval_int(&mut vm, "(quotient 7 2)"), 3);
    assert_eq!(eval_int(&mut vm, "(modulo -7 2)"), 1);
    assert_eq!(eval_int(&mut vm, "(remainder -7 2)"), -1);
}

#[test]
fn comparison_chains() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "(< 1 2 3)"), "#t");
    assert_eq!(eval_write(&mut vm, "(< 1 3 2)"), "#f");
    assert_eq!(eval_write(&mut vm, "(= 2 2.0)"), "#t");
    assert_eq!(eval_write(&mut vm, "(<= 1 1 2)"), "#t");
}

// =============================================================================
// 3. Conditionals and boolean forms
// =============================================================================

#[test]
fn if_selects_branches_and_defaults_void() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(if #t 1 2)"), 1);
    assert_eq!(eval_int(&mut vm, "(if #f 1 2)"), 2);
    // Everything except #f is true.
    assert_eq!(eval_int(&mut vm, "(if 0 1 2)"), 1);
    assert_eq!(eval_int(&mut vm, "(if '() 1 2)"), 1);
    assert_eq!(eval_write(&mut vm, "(if #f 1)"), "#<void>");
}

#[test]
fn cond_clauses_and_else() {
    let mut vm = vm();
    let src = "(define (classify n)
                 (cond ((< n 0) 'negative)
                       ((= n 0) 'zero)
                       (else 'positive)))
               (classify -3)";
    assert_eq!(eval_write(&mut vm, src), "negative");
    assert_eq!(eval_write(&mut vm, "(classify 0)"), "zero");
    assert_eq!(eval_write(&mut vm, "(classify 9)"), "positive");
    // A clause with no body returns the test value.
    assert_eq!(eval_int(&mut vm, "(cond (#f 1) (42))"), 42);
    assert_eq!(eval_write(&mut vm, "(cond (#f 1))"), "#<void>");
}

#[test]
fn case_dispatches_on_eqv() {
    let mut vm = vm();
    let src = "(define (kind x)
                 (case x
                   ((1 2 3) 'small)
                   ((10) 'ten)
                   (else 'other)))
               (kind 2)";
    assert_eq!(eval_write(&mut vm, src), "small");
    assert_eq!(eval_write(&mut vm, "(kind 10)"), "ten");
    assert_eq!(eval_write(&mut vm, "(kind 99)"), "other");
}

#[test]
fn and_or_short_circuit() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "(and)"), "#t");
    assert_eq!(eval_write(&mut vm, "(or)"), "#f");
    assert_eq!(eval_int(&mut vm, "(and 1 2 3)"), 3);
    assert_eq!(eval_write(&mut vm, "(and 1 #f 3)"), "#f");
    assert_eq!(eval_int(&mut vm, "(or #f 2)"), 2);
    // Short-circuit must not evaluate later operands.
    assert_eq!(eval_int(&mut vm, "(define hits 0) (or 1 (set! hits 99)) hits"), 0);
}

#[test]
fn when_and_unless() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(when #t 1 2)"), 2);
    assert_eq!(eval_write(&mut vm, "(when #f 1 2)"), "#<void>");
    assert_eq!(eval_int(&mut vm, "(unless #f 5)"), 5);
}

// =============================================================================
// 4. Binding forms and assignment
// =============================================================================

#[test]
fn nested_let_shadows_and_set_hits_innermost() {
    let mut vm = vm();
    let src = "(define trace '())
               (let ((x 1))
                 (let ((x 2))
                   (set! x 3)
                   (set! trace (cons x trace)))
                 (set! trace (cons x trace)))
               trace";
    // Inner observed 3; the outer x stayed 1.
    assert_eq!(eval_write(&mut vm, src), "(1 3)");
}

#[test]
fn let_star_sees_earlier_bindings() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(let* ((a 1) (b (+ a 1)) (c (* b 10))) c)"), 20);
}

#[test]
fn letrec_supports_mutual_recursion() {
    let mut vm = vm();
    let src = "(letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                        (odd?  (lambda (n) (if (= n 0) #f (even? (- n 1))))))
                 (even? 10))";
    assert_eq!(eval_write(&mut vm, src), "#t");
}

#[test]
fn named_let_loops() {
    let mut vm = vm();
    let src = "(let loop ((n 5) (acc 1))
                 (if (= n 0) acc (loop (- n 1) (* acc n))))";
    assert_eq!(eval_int(&mut vm, src), 120);
}

#[test]
fn named_let_does_not_clobber_outer_bindings() {
    let mut vm = vm();
    vm.eval_str("(define walk 'outer)").unwrap();
    assert_eq!(eval_int(&mut vm, "(let walk ((n 2)) (if (= n 0) 9 (walk (- n 1))))"), 9);
    assert_eq!(eval_write(&mut vm, "walk"), "outer");
}

#[test]
fn begin_sequences_and_returns_last() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(begin 1 2 3)"), 3);
    assert_eq!(eval_write(&mut vm, "(begin)"), "#<void>");
}

#[test]
fn closures_capture_their_environment() {
    let mut vm = vm();
    let src = "(define (adder n) (lambda (x) (+ x n)))
               (define add3 (adder 3))
               (add3 4)";
    assert_eq!(eval_int(&mut vm, src), 7);
    // The captured environment survives collection.
    vm.heap_mut().collect();
    assert_eq!(eval_int(&mut vm, "(add3 10)"), 13);
}

#[test]
fn variadic_formals() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "(define (rest . xs) xs) (rest 1 2 3)"), "(1 2 3)");
    assert_eq!(eval_write(&mut vm, "(define (pairish a . more) more) (pairish 1 2 3)"), "(2 3)");
    assert_eq!(eval_write(&mut vm, "((lambda xs xs) 1 2)"), "(1 2)");
}

// =============================================================================
// 5. Quotation and quasiquotation
// =============================================================================

#[test]
fn quote_returns_datum_unevaluated() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "'(+ 1 2)"), "(+ 1 2)");
    assert_eq!(eval_write(&mut vm, "'sym"), "sym");
}

#[test]
fn quasiquote_unquote_and_splicing() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "`(1 ,(+ 1 1) ,@(list 3 4) 5)"), "(1 2 3 4 5)");
    assert_eq!(eval_write(&mut vm, "`(a b)"), "(a b)");
    assert_eq!(eval_write(&mut vm, "`(1 . ,(+ 1 1))"), "(1 . 2)");
    // Splicing at the end.
    assert_eq!(eval_write(&mut vm, "`(0 ,@(list 1 2))"), "(0 1 2)");
}

#[test]
fn nested_quasiquote_counts_levels() {
    let mut vm = vm();
    // Two quasiquote levels: only the innermost unquote reaches level 0
    // and evaluates.
    assert_eq!(eval_write(&mut vm, "``(a ,(b ,(+ 1 2)))"), "(quasiquote (a (unquote (b 3))))");
}

#[test]
fn misplaced_unquote_is_an_error() {
    let mut vm = vm();
    assert!(vm.eval_str("(unquote 1)").is_err());
    assert!(vm.eval_str("(unquote-splicing 1)").is_err());
}

// =============================================================================
// 6. Macros
// =============================================================================

#[test]
fn define_macro_swap() {
    let mut vm = vm();
    let src = "(define-macro swap
                 (lambda (a b) `(let ((t ,a)) (set! ,a ,b) (set! ,b t))))
               (define x 1)
               (define y 2)
               (swap x y)
               (list x y)";
    assert_eq!(eval_write(&mut vm, src), "(2 1)");
}

#[test]
fn define_macro_sugar_form() {
    let mut vm = vm();
    let src = "(define-macro (unless2 test . body) `(if ,test '() (begin ,@body)))
               (unless2 #f 1 2 3)";
    assert_eq!(eval_int(&mut vm, src), 3);
}

// =============================================================================
// 7. Application details
// =============================================================================

#[test]
fn apply_spreads_final_list() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(apply + '(1 2 3))"), 6);
    assert_eq!(eval_int(&mut vm, "(apply + 1 2 '(3 4))"), 10);
    assert_eq!(eval_write(&mut vm, "(apply list 1 '(2 3))"), "(1 2 3)");
}

#[test]
fn applying_a_non_procedure_is_a_type_error() {
    let mut vm = vm();
    let err = vm.eval_str("(1 2 3)").unwrap_err();
    assert_eq!(err.kind, sprig::ErrKind::TypeError);
}

#[test]
fn nproc_receives_unevaluated_forms() {
    let mut vm = vm();
    let src = "(define q (nlambda (form) form))
               (q (+ 1 2))";
    // The argument list arrives unevaluated: ((+ 1 2)).
    assert_eq!(eval_write(&mut vm, src), "(+ 1 2)");
}

#[test]
fn eval_native_evaluates_data_as_programs() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(eval '(+ 1 2))"), 3);
    assert_eq!(eval_int(&mut vm, "(eval (list '+ 1 2) (interaction-environment))"), 3);
    // eval participates in the trampoline: a tail call through it must
    // not consume host stack.
    let src = "(define (via-eval n) (if (= n 0) 'done (eval (list 'via-eval (- n 1)))))
               (if (eq? (via-eval 50000) 'done) 1 0)";
    assert_eq!(eval_int(&mut vm, src), 1);
}

#[test]
fn gensym_produces_fresh_uninterned_symbols() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "(symbol? (gensym))"), "#t");
    assert_eq!(eval_write(&mut vm, "(eq? (gensym) (gensym))"), "#f");
}

// =============================================================================
// 8. List and vector library
// =============================================================================

#[test]
fn list_library_basics() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "(cons 1 2)"), "(1 . 2)");
    assert_eq!(eval_int(&mut vm, "(length '(a b c))"), 3);
    assert_eq!(eval_write(&mut vm, "(append '(1 2) '(3) '())"), "(1 2 3)");
    assert_eq!(eval_write(&mut vm, "(reverse '(1 2 3))"), "(3 2 1)");
    assert_eq!(eval_int(&mut vm, "(list-ref '(10 20 30) 1)"), 20);
    assert_eq!(eval_write(&mut vm, "(memv 2 '(1 2 3))"), "(2 3)");
    assert_eq!(eval_write(&mut vm, "(assq 'b '((a 1) (b 2)))"), "(b 2)");
    assert_eq!(eval_write(&mut vm, "(member '(1) '((0) (1) (2)))"), "((1) (2))");
}

#[test]
fn vector_library_basics() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(vector-length (vector 1 2 3))"), 3);
    assert_eq!(eval_int(&mut vm, "(vector-ref #(5 6 7) 2)"), 7);
    assert_eq!(
        eval_write(&mut vm, "(define v (make-vector 3 0)) (vector-set! v 1 'x) (vector->list v)"),
        "(0 x 0)"
    );
    assert_eq!(eval_write(&mut vm, "(list->vector '(1 2))"), "#(1 2)");
    // Immediate (len <= 2) and heap vectors behave identically.
    assert_eq!(eval_int(&mut vm, "(vector-length (vector))"), 0);
    assert_eq!(eval_int(&mut vm, "(vector-ref (vector 9) 0)"), 9);
}

#[test]
fn equivalence_predicates() {
    let mut vm = vm();
    assert_eq!(eval_write(&mut vm, "(eq? 'a 'a)"), "#t");
    assert_eq!(eval_write(&mut vm, "(eq? \"a\" \"a\")"), "#f");
    assert_eq!(eval_write(&mut vm, "(eqv? 1 1.0)"), "#t");
    assert_eq!(eval_write(&mut vm, "(equal? '(1 (2 3)) '(1 (2 3)))"), "#t");
    assert_eq!(eval_write(&mut vm, "(equal? #(1 2) #(1 2))"), "#t");
    assert_eq!(eval_write(&mut vm, "(equal? \"ab\" \"ab\")"), "#t");
}

#[test]
fn string_library_basics() {
    let mut vm = vm();
    assert_eq!(eval_int(&mut vm, "(string-length \"hello\")"), 5);
    assert_eq!(eval_write(&mut vm, "(string-ref \"abc\" 1)"), "#\\b");
    assert_eq!(eval_write(&mut vm, "(string-append \"foo\" \"bar\")"), "\"foobar\"");
    assert_eq!(eval_write(&mut vm, "(substring \"hello\" 1 3)"), "\"el\"");
    assert_eq!(eval_write(&mut vm, "(string->symbol \"abc\")"), "abc");
    assert_eq!(eval_write(&mut vm, "(symbol->string 'abc)"), "\"abc\"");
    assert_eq!(eval_write(&mut vm, "(string->number \"1/2\")"), "1/2");
    assert_eq!(eval_write(&mut vm, "(string->number \"nope\")"), "#f");
    assert_eq!(eval_write(&mut vm, "(number->string 42)"), "\"42\"");
    assert_eq!(eval_int(&mut vm, "(char->integer #\\A)"), 65);
    assert_eq!(eval_write(&mut vm, "(integer->char 97)"), "#\\a");
}

// =============================================================================
// 9. String ports
// =============================================================================

#[test]
fn string_ports_round_output_and_input() {
    let mut vm = vm();
    let src = "(define p (open-output-string))
               (display \"hi \" p)
               (write \"there\" p)
               (get-output-string p)";
    assert_eq!(eval_write(&mut vm, src), "\"hi \\\"there\\\"\"");

    let src = "(read (open-input-string \"(1 2 3)\"))";
    assert_eq!(eval_write(&mut vm, src), "(1 2 3)");

    // Reading an exhausted port yields the eof object.
    let src = "(define ip (open-input-string \"\"))
               (eof-object? (read ip))";
    assert_eq!(eval_write(&mut vm, src), "#t");
}
