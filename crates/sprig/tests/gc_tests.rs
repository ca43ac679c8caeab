//! Collector behavior through the public API: reclamation, reachability,
//! incremental stepping, and the introspection natives.

use sprig::{GcPhase, GcState, Limits, Vm};

fn vm() -> Vm {
    Vm::new(Limits::default())
}

fn eval_int(vm: &mut Vm, src: &str) -> i64 {
    let result = vm.eval_str(src).unwrap_or_else(|err| panic!("{src}: {err}"));
    vm.as_int(result).unwrap_or_else(|| panic!("{src}: expected an integer result"))
}

// =============================================================================
// 1. Reclamation and reachability
// =============================================================================

#[test]
fn unreferenced_results_are_reclaimed() {
    let mut vm = vm();
    vm.eval_str("(define (mk n) (if (= n 0) '() (cons n (mk (- n 1)))))")
        .unwrap();
    // Build a big list and drop the reference on the floor.
    vm.eval_str("(begin (mk 500) 'done)").unwrap();
    let before = vm.heap_stats();
    vm.heap_mut().collect();
    let after = vm.heap_stats();
    assert!(
        after.live_cells < before.live_cells,
        "collection should reclaim the dropped list: before={b} after={a}",
        b = before.live_cells,
        a = after.live_cells
    );
}

#[test]
fn defined_values_survive_collection() {
    let mut vm = vm();
    vm.eval_str("(define (mk n) (if (= n 0) '() (cons n (mk (- n 1)))))")
        .unwrap();
    vm.eval_str("(define keep (mk 100))").unwrap();
    vm.heap_mut().collect();
    vm.heap_mut().collect();
    assert_eq!(eval_int(&mut vm, "(length keep)"), 100);
    assert_eq!(eval_int(&mut vm, "(car keep)"), 100);
}

/// Invariant: after a full cycle, a cell is reachable from a root iff its
/// state is not free.
#[test]
fn unreachable_result_cell_goes_free() {
    let mut vm = vm();
    let result = vm.eval_str("(cons 1 2)").unwrap();
    assert_ne!(vm.heap().gc_state(result), GcState::Free);
    vm.heap_mut().collect();
    assert_eq!(
        vm.heap().gc_state(result),
        GcState::Free,
        "a result nothing references must be swept"
    );

    let result = vm.eval_str("(cons 1 2)").unwrap();
    vm.protect(result);
    vm.heap_mut().collect();
    assert_eq!(vm.heap().gc_state(result), GcState::Idle, "a protected result survives");
    vm.unprotect(1);
}

#[test]
fn cyclic_environments_are_collected() {
    let mut vm = vm();
    // A closure whose defining environment binds the closure's own name
    // forms a cycle; rebinding the name makes the whole cycle garbage.
    vm.eval_str("(define (cycle) cycle)").unwrap();
    vm.eval_str("(define cycle 0)").unwrap();
    let before = vm.heap_stats();
    vm.heap_mut().collect();
    let after = vm.heap_stats();
    assert!(after.live_cells <= before.live_cells);
    // And the heap is still consistent.
    assert!(vm.heap().check_integrity().is_empty(), "{:?}", vm.heap().check_integrity());
}

// =============================================================================
// 2. Incremental stepping
// =============================================================================

#[test]
fn step_drives_a_cycle_to_completion() {
    let mut vm = vm();
    vm.eval_str("(define (mk n) (if (= n 0) '() (cons n (mk (- n 1))))) (mk 300) 'x")
        .unwrap();
    vm.heap_mut().start_cycle();
    assert_ne!(vm.heap().gc_phase(), GcPhase::Off);
    let mut steps = 0;
    while vm.step() {
        steps += 1;
        assert!(steps < 1_000_000, "a cycle must terminate");
    }
    assert_eq!(vm.heap().gc_phase(), GcPhase::Off);
    // Mutator results are still intact afterwards.
    assert_eq!(eval_int(&mut vm, "(+ 1 1)"), 2);
}

#[test]
fn evaluation_interleaves_with_collection() {
    let mut vm = vm();
    vm.eval_str("(define (mk n) (if (= n 0) '() (cons n (mk (- n 1)))))")
        .unwrap();
    vm.heap_mut().start_cycle();
    // Run real mutator work while the cycle is in flight; allocation
    // piggy-backs collector slices.
    assert_eq!(eval_int(&mut vm, "(length (mk 200))"), 200);
    vm.heap_mut().collect();
    assert_eq!(eval_int(&mut vm, "(length (mk 50))"), 50);
}

// =============================================================================
// 3. Long-running allocation churn
// =============================================================================

/// A loop that allocates far more cells than the heap holds must be
/// sustained by collection, not by growth alone.
#[test]
fn allocation_churn_recycles_cells() {
    let mut vm = vm();
    let src = "(define (churn n acc)
                 (if (= n 0)
                     acc
                     (churn (- n 1) (car (cons (+ acc 1) '())))))
               (churn 50000 0)";
    assert_eq!(eval_int(&mut vm, src), 50_000);
    let stats = vm.heap_stats();
    assert!(
        stats.total_cells < 200_000,
        "50k iterations allocating several cells each must reuse space, total={}",
        stats.total_cells
    );
}

// =============================================================================
// 4. Introspection natives
// =============================================================================

#[test]
fn gc_native_forces_a_cycle() {
    let mut vm = vm();
    vm.eval_str("(begin (cons 1 2) (cons 3 4) '())").unwrap();
    let before = vm.heap_stats();
    vm.eval_str("(gc)").unwrap();
    let after = vm.heap_stats();
    assert!(after.free_cells >= before.free_cells);
}

#[test]
fn heap_stats_native_reports_counts() {
    let mut vm = vm();
    let result = vm.eval_str("(heap-stats)").unwrap();
    let text = vm.as_str(result).expect("heap-stats returns a string");
    assert!(text.contains("live"), "stats text should mention live cells: {text}");
    assert!(text.contains("symbols"), "stats text should mention symbols: {text}");
}

#[test]
fn stats_track_interned_symbols() {
    let mut vm = vm();
    let before = vm.heap_stats();
    vm.eval_str("'fresh-symbol-name-xyzzy").unwrap();
    let after = vm.heap_stats();
    assert_eq!(
        before.diff(&after).interned_symbols_delta,
        1,
        "reading a new symbol interns it exactly once"
    );
    vm.eval_str("'fresh-symbol-name-xyzzy").unwrap();
    let again = vm.heap_stats();
    assert_eq!(after.diff(&again).interned_symbols_delta, 0);
}
