//! The evaluator: a trampolined eval/apply over S-expressions.
//!
//! `eval` case-analyzes the tag of its expression: simple atoms, strings,
//! vectors, procedures and friends are self-evaluating; symbols are
//! looked up; pairs are combinations. Special forms are recognized by the
//! identity of the head symbol before any evaluation, so they cannot be
//! shadowed.
//!
//! Tail positions do not recurse into the host stack. Applying an
//! interpreted procedure returns a thunk cell (`thunk-body` carrying the
//! body and the extended environment); the selected branch of `if`, the
//! chosen `cond`/`case` clause, the final `and`/`or` operand and the last
//! body form likewise continue the outer loop rather than recursing. The
//! loop replaces its current work with the thunk's contents until a
//! non-thunk value emerges, so host-stack depth stays constant over tail
//! chains of any length. Non-tail positions (operands, `if` tests, body
//! prefixes) recurse and count against the depth limit.

use smallvec::SmallVec;

use crate::{
    cell::{CellId, Tag},
    dict,
    error::{ErrKind, LispError, RunResult},
    native::{args_vec, expect_n, expect_range, want_sym},
    vm::Vm,
};

/// Special forms, dispatched by head-symbol identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Special {
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    If,
    Cond,
    Case,
    And,
    Or,
    When,
    Unless,
    Set,
    Define,
    DefineMacro,
    Lambda,
    Nlambda,
    Let,
    LetStar,
    Letrec,
    Begin,
}

/// Table of special-form names, consumed at setup.
pub(crate) const SPECIAL_FORMS: &[(&str, Special)] = &[
    ("quote", Special::Quote),
    ("quasiquote", Special::Quasiquote),
    ("unquote", Special::Unquote),
    ("unquote-splicing", Special::UnquoteSplicing),
    ("if", Special::If),
    ("cond", Special::Cond),
    ("case", Special::Case),
    ("and", Special::And),
    ("or", Special::Or),
    ("when", Special::When),
    ("unless", Special::Unless),
    ("set!", Special::Set),
    ("define", Special::Define),
    ("define-macro", Special::DefineMacro),
    ("lambda", Special::Lambda),
    ("nlambda", Special::Nlambda),
    ("let", Special::Let),
    ("let*", Special::LetStar),
    ("letrec", Special::Letrec),
    ("begin", Special::Begin),
];

/// What a special form hands back to the trampoline: a finished value, or
/// the next (expression, environment) to continue with in tail position.
enum Flow {
    Done(CellId),
    Tail(CellId, CellId),
}

#[inline]
fn truthy(id: CellId) -> bool {
    id != CellId::FALSE
}

impl Vm {
    /// Evaluates an expression in an environment, returning the result
    /// cell. The root stack is restored to its entry depth on both the
    /// success and error paths, which is what unwinds native-held roots
    /// when an error propagates to a catch point.
    pub fn eval(&mut self, expr: CellId, env: CellId) -> RunResult<CellId> {
        self.depth += 1;
        let result = match self.heap.limits().check_depth(self.depth) {
            Ok(()) => {
                let saved = self.heap.root_depth();
                let result = self.eval_work(expr, env);
                self.heap.root_truncate(saved);
                result
            }
            Err(err) => Err(err),
        };
        self.depth -= 1;
        result
    }

    fn eval_work(&mut self, mut expr: CellId, mut env: CellId) -> RunResult<CellId> {
        let base = self.heap.root_depth();
        loop {
            self.heap.root_truncate(base);
            self.heap.root_push(expr);
            self.heap.root_push(env);

            let tag = self.heap.tag(expr);
            if tag.features().is_any_sym {
                return dict::dict_ref(&self.heap, env, expr);
            }
            if tag != Tag::Pair {
                // Everything that is not a symbol or a combination is
                // self-evaluating: atoms, strings, vectors, procedures,
                // dictionaries, errors, thunk values held as data.
                return Ok(expr);
            }

            let head = self.heap.car(expr);
            let args = self.heap.cdr(expr);

            if self.heap.tag(head).features().is_any_sym
                && let Some(&special) = self.specials.get(&head)
            {
                match self.eval_special(special, args, env)? {
                    Flow::Tail(next_expr, next_env) => {
                        expr = next_expr;
                        env = next_env;
                        continue;
                    }
                    Flow::Done(value) => {
                        self.heap.root_push(value);
                        match self.step_thunk(value)? {
                            Flow::Done(value) => return Ok(value),
                            Flow::Tail(next_expr, next_env) => {
                                expr = next_expr;
                                env = next_env;
                                continue;
                            }
                        }
                    }
                }
            }

            // Combination: evaluate the operator, then dispatch on what
            // it turned out to be.
            let op = self.eval(head, env)?;
            self.heap.root_push(op);
            let result = match self.heap.tag(op) {
                Tag::Macro => {
                    // Expand once, then evaluate the expansion in place.
                    let expansion = self.expand_macro(op, args, env)?;
                    expr = expansion;
                    continue;
                }
                Tag::NativeNproc => self.call_native(op, args, env)?,
                Tag::Nproc => self.apply_interp(op, args, env)?,
                Tag::NativeProc => {
                    let vals = self.eval_args(args, env)?;
                    self.heap.root_push(vals);
                    self.call_native(op, vals, env)?
                }
                Tag::Proc => {
                    let vals = self.eval_args(args, env)?;
                    self.heap.root_push(vals);
                    self.apply_interp(op, vals, env)?
                }
                other => {
                    return Err(LispError::type_error(format!(
                        "attempt to apply a non-procedure ({})",
                        other.name()
                    )));
                }
            };
            self.heap.root_push(result);
            match self.step_thunk(result)? {
                Flow::Done(value) => return Ok(value),
                Flow::Tail(next_expr, next_env) => {
                    expr = next_expr;
                    env = next_env;
                }
            }
        }
    }

    /// Applies a procedure to an argument list. Interpreted procedures
    /// come back as a thunk so callers in tail position keep the
    /// trampoline; use [`Vm::apply_full`] for a finished value.
    pub(crate) fn apply(&mut self, op: CellId, args: CellId, env: CellId) -> RunResult<CellId> {
        match self.heap.tag(op) {
            Tag::NativeProc | Tag::NativeNproc => self.call_native(op, args, env),
            Tag::Proc | Tag::Nproc => self.apply_interp(op, args, env),
            Tag::Macro => Err(LispError::type_error("cannot apply a macro as a procedure")),
            other => Err(LispError::type_error(format!(
                "attempt to apply a non-procedure ({})",
                other.name()
            ))),
        }
    }

    /// Applies and forces the result to a non-thunk value.
    pub(crate) fn apply_full(&mut self, op: CellId, args: CellId, env: CellId) -> RunResult<CellId> {
        let result = self.apply(op, args, env)?;
        self.force(result)
    }

    /// Forces a (possible) thunk to its final value.
    pub(crate) fn force(&mut self, value: CellId) -> RunResult<CellId> {
        self.heap.root_push(value);
        let result = match self.step_thunk(value) {
            Ok(Flow::Done(v)) => Ok(v),
            Ok(Flow::Tail(expr, env)) => self.eval(expr, env),
            Err(err) => Err(err),
        };
        self.heap.root_pop(1);
        result
    }

    /// One trampoline step: unwraps a thunk into the next work item.
    fn step_thunk(&mut self, value: CellId) -> RunResult<Flow> {
        match self.heap.tag(value) {
            Tag::ThunkSexpr => {
                debug_assert!(self.heap.is_tail(value), "thunks carry the tail flag");
                Ok(Flow::Tail(self.heap.car(value), self.heap.cdr(value)))
            }
            Tag::ThunkBody => {
                debug_assert!(self.heap.is_tail(value), "thunks carry the tail flag");
                let body = self.heap.car(value);
                let env = self.heap.cdr(value);
                self.body_flow(body, env)
            }
            _ => Ok(Flow::Done(value)),
        }
    }

    /// Evaluates an implicit-begin body: every form but the last fully,
    /// the last in tail position.
    fn body_flow(&mut self, body: CellId, env: CellId) -> RunResult<Flow> {
        let (forms, _) = self.heap.list_elems_and_tail(body);
        match forms.split_last() {
            None => Ok(Flow::Done(CellId::VOID)),
            Some((&last, prefix)) => {
                for &form in prefix {
                    self.eval(form, env)?;
                }
                Ok(Flow::Tail(last, env))
            }
        }
    }

    /// Evaluates each argument left to right, returning a fresh value
    /// list (rooted entries; caller truncation cleans up).
    fn eval_args(&mut self, args: CellId, env: CellId) -> RunResult<CellId> {
        let (forms, tail) = self.heap.list_elems_and_tail(args);
        if tail != CellId::NIL {
            return Err(LispError::type_error("improper argument list in combination"));
        }
        let mut vals: SmallVec<[CellId; 8]> = SmallVec::with_capacity(forms.len());
        for form in forms {
            let value = self.eval(form, env)?;
            self.heap.root_push(value);
            vals.push(value);
        }
        self.heap.list_from_slice(&vals, env)
    }

    /// Applies an interpreted procedure: binds formals over the captured
    /// environment and returns the body as a tail thunk.
    fn apply_interp(&mut self, op: CellId, args: CellId, env: CellId) -> RunResult<CellId> {
        let lambda = self.heap.car(op);
        let closure_env = self.heap.cdr(op);
        let formals = self.heap.car(lambda);
        let body = self.heap.cdr(lambda);
        let new_env = dict::push_bindings(&mut self.heap, closure_env, formals, args, env)?;
        self.heap.root_push(new_env);
        let thunk = self.heap.thunk_body(body, new_env, env);
        self.heap.root_pop(1);
        thunk
    }

    /// Invokes a native through the registry.
    fn call_native(&mut self, op: CellId, args: CellId, env: CellId) -> RunResult<CellId> {
        let index = self.heap.cell(op).native_index();
        let func = self
            .natives
            .get(index)
            .ok_or_else(|| LispError::type_error("native procedure is not registered"))?
            .func;
        let saved = self.heap.root_depth();
        self.heap.root_push(args);
        self.heap.root_push(env);
        let result = func(self, args, env);
        self.heap.root_truncate(saved);
        result
    }

    /// Expands a macro use once: the transformer runs on the raw operand
    /// forms, and the expansion replaces the original expression.
    fn expand_macro(&mut self, op: CellId, args: CellId, env: CellId) -> RunResult<CellId> {
        let transformer = self.heap.car(op);
        self.apply_full(transformer, args, env)
    }

    // ------------------------------------------------------------------
    // special forms
    // ------------------------------------------------------------------

    fn eval_special(&mut self, special: Special, args: CellId, env: CellId) -> RunResult<Flow> {
        match special {
            Special::Quote => {
                let forms = args_vec(&self.heap, args)?;
                expect_n("quote", &forms, 1)?;
                Ok(Flow::Done(forms[0]))
            }
            Special::Quasiquote => {
                let forms = args_vec(&self.heap, args)?;
                expect_n("quasiquote", &forms, 1)?;
                let value = self.quasi(forms[0], env, 1)?;
                Ok(Flow::Done(value))
            }
            Special::Unquote => {
                Err(LispError::type_error("unquote outside quasiquote"))
            }
            Special::UnquoteSplicing => {
                Err(LispError::type_error("unquote-splicing outside quasiquote"))
            }
            Special::If => self.sf_if(args, env),
            Special::Cond => self.sf_cond(args, env),
            Special::Case => self.sf_case(args, env),
            Special::And => self.sf_and(args, env),
            Special::Or => self.sf_or(args, env),
            Special::When => self.sf_when(args, env, true),
            Special::Unless => self.sf_when(args, env, false),
            Special::Set => self.sf_set(args, env),
            Special::Define => self.sf_define(args, env),
            Special::DefineMacro => self.sf_define_macro(args, env),
            Special::Lambda => {
                let proc = self.make_proc(args, env, Tag::Proc)?;
                Ok(Flow::Done(proc))
            }
            Special::Nlambda => {
                let proc = self.make_proc(args, env, Tag::Nproc)?;
                Ok(Flow::Done(proc))
            }
            Special::Let => self.sf_let(args, env),
            Special::LetStar => self.sf_let_star(args, env),
            Special::Letrec => self.sf_letrec(args, env),
            Special::Begin => self.body_flow(args, env),
        }
    }

    /// Builds an interpreted procedure from `(formals body...)`.
    fn make_proc(&mut self, args: CellId, env: CellId, tag: Tag) -> RunResult<CellId> {
        if !self.heap.tag(args).is_any_pair() {
            return Err(LispError::type_error("lambda: missing formals"));
        }
        let formals = self.heap.car(args);
        let body = self.heap.cdr(args);
        let lambda = self.heap.cons(formals, body, env)?;
        self.heap.root_push(lambda);
        let proc = self.heap.cons_typed(tag, lambda, env, env);
        self.heap.root_pop(1);
        proc
    }

    fn sf_if(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        let forms = args_vec(&self.heap, args)?;
        expect_range("if", &forms, 2, 3)?;
        let test = self.eval(forms[0], env)?;
        if truthy(test) {
            Ok(Flow::Tail(forms[1], env))
        } else if let Some(&alt) = forms.get(2) {
            Ok(Flow::Tail(alt, env))
        } else {
            Ok(Flow::Done(CellId::VOID))
        }
    }

    fn sf_cond(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        let (clauses, _) = self.heap.list_elems_and_tail(args);
        for clause in clauses {
            if !self.heap.tag(clause).is_any_pair() {
                return Err(LispError::type_error("cond: clause is not a list"));
            }
            let test = self.heap.car(clause);
            let body = self.heap.cdr(clause);
            if test == self.syms.else_sym {
                return self.body_flow(body, env);
            }
            let value = self.eval(test, env)?;
            if truthy(value) {
                if self.heap.tag(body) == Tag::Nil {
                    return Ok(Flow::Done(value));
                }
                return self.body_flow(body, env);
            }
        }
        Ok(Flow::Done(CellId::VOID))
    }

    fn sf_case(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        let (forms, _) = self.heap.list_elems_and_tail(args);
        let Some((&key_form, clauses)) = forms.split_first() else {
            return Err(LispError::arity("case", "at least 1", 0));
        };
        let key = self.eval(key_form, env)?;
        self.heap.root_push(key);
        for &clause in clauses {
            if !self.heap.tag(clause).is_any_pair() {
                return Err(LispError::type_error("case: clause is not a list"));
            }
            let datums = self.heap.car(clause);
            let body = self.heap.cdr(clause);
            if datums == self.syms.else_sym {
                return self.body_flow(body, env);
            }
            let (items, _) = self.heap.list_elems_and_tail(datums);
            if items.iter().any(|&d| crate::equiv::eqv_cells(&self.heap, key, d)) {
                return self.body_flow(body, env);
            }
        }
        Ok(Flow::Done(CellId::VOID))
    }

    fn sf_and(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        let (forms, _) = self.heap.list_elems_and_tail(args);
        match forms.split_last() {
            None => Ok(Flow::Done(CellId::TRUE)),
            Some((&last, prefix)) => {
                for &form in prefix {
                    let value = self.eval(form, env)?;
                    if !truthy(value) {
                        return Ok(Flow::Done(value));
                    }
                }
                Ok(Flow::Tail(last, env))
            }
        }
    }

    fn sf_or(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        let (forms, _) = self.heap.list_elems_and_tail(args);
        match forms.split_last() {
            None => Ok(Flow::Done(CellId::FALSE)),
            Some((&last, prefix)) => {
                for &form in prefix {
                    let value = self.eval(form, env)?;
                    if truthy(value) {
                        return Ok(Flow::Done(value));
                    }
                }
                Ok(Flow::Tail(last, env))
            }
        }
    }

    fn sf_when(&mut self, args: CellId, env: CellId, wanted: bool) -> RunResult<Flow> {
        if !self.heap.tag(args).is_any_pair() {
            return Err(LispError::arity("when", "at least 1", 0));
        }
        let test = self.heap.car(args);
        let body = self.heap.cdr(args);
        let value = self.eval(test, env)?;
        if truthy(value) == wanted {
            self.body_flow(body, env)
        } else {
            Ok(Flow::Done(CellId::VOID))
        }
    }

    fn sf_set(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        let forms = args_vec(&self.heap, args)?;
        expect_n("set!", &forms, 2)?;
        let name = want_sym(&self.heap, forms[0])?;
        let value = self.eval(forms[1], env)?;
        dict::rebind(&mut self.heap, env, name, value)?;
        Ok(Flow::Done(CellId::VOID))
    }

    fn sf_define(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        if !self.heap.tag(args).is_any_pair() {
            return Err(LispError::arity("define", "at least 1", 0));
        }
        let first = self.heap.car(args);
        if self.heap.tag(first).is_any_pair() {
            // (define (name . formals) body...)
            let name = want_sym(&self.heap, self.heap.car(first))?;
            let formals = self.heap.cdr(first);
            let body = self.heap.cdr(args);
            self.heap.root_push(name);
            let spec = self.heap.cons(formals, body, env)?;
            self.heap.root_push(spec);
            let proc = self.make_proc(spec, env, Tag::Proc)?;
            self.heap.root_push(proc);
            dict::bind(&mut self.heap, env, name, proc, env)?;
        } else {
            let name = want_sym(&self.heap, first)?;
            let rest = self.heap.cdr(args);
            let value = if self.heap.tag(rest).is_any_pair() {
                self.eval(self.heap.car(rest), env)?
            } else {
                CellId::UNDEF
            };
            self.heap.root_push(value);
            dict::bind(&mut self.heap, env, name, value, env)?;
        }
        Ok(Flow::Done(CellId::VOID))
    }

    fn sf_define_macro(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        if !self.heap.tag(args).is_any_pair() {
            return Err(LispError::arity("define-macro", "at least 2", 0));
        }
        let first = self.heap.car(args);
        let (name, transformer) = if self.heap.tag(first).is_any_pair() {
            // (define-macro (name . formals) body...)
            let name = want_sym(&self.heap, self.heap.car(first))?;
            let formals = self.heap.cdr(first);
            let body = self.heap.cdr(args);
            let spec = self.heap.cons(formals, body, env)?;
            self.heap.root_push(spec);
            let proc = self.make_proc(spec, env, Tag::Proc)?;
            self.heap.root_pop(1);
            (name, proc)
        } else {
            // (define-macro name transformer)
            let name = want_sym(&self.heap, first)?;
            let rest = self.heap.cdr(args);
            if !self.heap.tag(rest).is_any_pair() {
                return Err(LispError::arity("define-macro", "2", 1));
            }
            let transformer = self.eval(self.heap.car(rest), env)?;
            if self.heap.tag(transformer) != Tag::Proc {
                return Err(LispError::expected(
                    "procedure as macro transformer",
                    self.heap.tag(transformer).name(),
                ));
            }
            (name, transformer)
        };
        self.heap.root_push(transformer);
        let macro_cell = self.heap.cons_typed(Tag::Macro, transformer, env, env)?;
        self.heap.root_push(macro_cell);
        dict::bind(&mut self.heap, env, name, macro_cell, env)?;
        Ok(Flow::Done(CellId::VOID))
    }

    fn sf_let(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        if !self.heap.tag(args).is_any_pair() {
            return Err(LispError::arity("let", "at least 1", 0));
        }
        let first = self.heap.car(args);
        if self.heap.tag(first).features().is_any_sym {
            return self.sf_named_let(args, env);
        }
        let body = self.heap.cdr(args);
        let (names, vals) = self.eval_let_bindings(first, env)?;
        let names_list = self.heap.list_from_slice(&names, env)?;
        self.heap.root_push(names_list);
        let vals_list = self.heap.list_from_slice(&vals, env)?;
        self.heap.root_push(vals_list);
        let new_env = dict::push_bindings(&mut self.heap, env, names_list, vals_list, env)?;
        self.heap.root_push(new_env);
        self.body_flow(body, new_env)
    }

    /// `(let loop ((n init) ...) body...)`: a procedure bound to `loop`
    /// in a fresh frame, applied to the inits.
    fn sf_named_let(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        let forms = args_vec(&self.heap, args)?;
        if forms.len() < 2 {
            return Err(LispError::arity("named let", "at least 2", forms.len()));
        }
        let name = forms[0];
        let bindings = forms[1];
        let (names, vals) = self.eval_let_bindings(bindings, env)?;
        let names_list = self.heap.list_from_slice(&names, env)?;
        self.heap.root_push(names_list);
        let vals_list = self.heap.list_from_slice(&vals, env)?;
        self.heap.root_push(vals_list);

        // The loop procedure closes over a frame that binds its own name.
        let loop_env = dict::push_frame(&mut self.heap, env, 0, env)?;
        self.heap.root_push(loop_env);
        let body = self.heap.cdr(self.heap.cdr(args));
        let spec = self.heap.cons(names_list, body, env)?;
        self.heap.root_push(spec);
        let proc = self.make_proc(spec, loop_env, Tag::Proc)?;
        self.heap.root_push(proc);
        // A fresh lexical binding: an outer variable of the same name
        // must not be touched.
        dict::insert(&mut self.heap, loop_env, name, proc, env)?;
        let thunk = self.apply_interp(proc, vals_list, env)?;
        Ok(Flow::Done(thunk))
    }

    fn sf_let_star(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        if !self.heap.tag(args).is_any_pair() {
            return Err(LispError::arity("let*", "at least 1", 0));
        }
        let bindings = self.heap.car(args);
        let body = self.heap.cdr(args);
        let new_env = dict::push_frame(&mut self.heap, env, 0, env)?;
        self.heap.root_push(new_env);
        let (pairs, _) = self.heap.list_elems_and_tail(bindings);
        for binding in pairs {
            let (name, init) = self.split_binding(binding)?;
            // Each init sees the bindings established before it.
            let value = self.eval(init, new_env)?;
            self.heap.root_push(value);
            dict::insert(&mut self.heap, new_env, name, value, env)?;
            self.heap.root_pop(1);
        }
        self.body_flow(body, new_env)
    }

    fn sf_letrec(&mut self, args: CellId, env: CellId) -> RunResult<Flow> {
        if !self.heap.tag(args).is_any_pair() {
            return Err(LispError::arity("letrec", "at least 1", 0));
        }
        let bindings = self.heap.car(args);
        let body = self.heap.cdr(args);
        let new_env = dict::push_frame(&mut self.heap, env, 0, env)?;
        self.heap.root_push(new_env);
        let (pairs, _) = self.heap.list_elems_and_tail(bindings);
        // First pass: every name bound to undef so inits can close over
        // any of them.
        for &binding in &pairs {
            let (name, _) = self.split_binding(binding)?;
            dict::insert(&mut self.heap, new_env, name, CellId::UNDEF, env)?;
        }
        for binding in pairs {
            let (name, init) = self.split_binding(binding)?;
            let value = self.eval(init, new_env)?;
            self.heap.root_push(value);
            dict::rebind(&mut self.heap, new_env, name, value)?;
            self.heap.root_pop(1);
        }
        self.body_flow(body, new_env)
    }

    fn split_binding(&self, binding: CellId) -> RunResult<(CellId, CellId)> {
        if !self.heap.tag(binding).is_any_pair() {
            return Err(LispError::type_error("let: binding is not a (name value) pair"));
        }
        let name = want_sym(&self.heap, self.heap.car(binding))?;
        let rest = self.heap.cdr(binding);
        let init = if self.heap.tag(rest).is_any_pair() {
            self.heap.car(rest)
        } else {
            CellId::UNDEF
        };
        Ok((name, init))
    }

    /// Evaluates `((name init) ...)` bindings in `env`, returning rooted
    /// name and value vectors.
    fn eval_let_bindings(&mut self, bindings: CellId, env: CellId) -> RunResult<(Vec<CellId>, Vec<CellId>)> {
        let (pairs, _) = self.heap.list_elems_and_tail(bindings);
        let mut names = Vec::with_capacity(pairs.len());
        let mut vals = Vec::with_capacity(pairs.len());
        for binding in pairs {
            let (name, init) = self.split_binding(binding)?;
            let value = self.eval(init, env)?;
            self.heap.root_push(value);
            names.push(name);
            vals.push(value);
        }
        Ok((names, vals))
    }

    // ------------------------------------------------------------------
    // quasiquotation
    // ------------------------------------------------------------------

    /// Level-counted quasiquote walk: `quasiquote` increments the level,
    /// `unquote` decrements, level-0 expressions evaluate and substitute,
    /// and `unquote-splicing` concatenates its (list) result into the
    /// surrounding list.
    fn quasi(&mut self, template: CellId, env: CellId, level: usize) -> RunResult<CellId> {
        if self.heap.tag(template) != Tag::Pair {
            return Ok(template);
        }
        let head = self.heap.car(template);

        if head == self.syms.unquote {
            let forms = args_vec(&self.heap, self.heap.cdr(template))?;
            expect_n("unquote", &forms, 1)?;
            if level == 1 {
                return self.eval(forms[0], env);
            }
            let inner = self.quasi(forms[0], env, level - 1)?;
            return self.rebuild_quoted(self.syms.unquote, inner, env);
        }
        if head == self.syms.quasiquote {
            let forms = args_vec(&self.heap, self.heap.cdr(template))?;
            expect_n("quasiquote", &forms, 1)?;
            let inner = self.quasi(forms[0], env, level + 1)?;
            return self.rebuild_quoted(self.syms.quasiquote, inner, env);
        }

        // Walk the list, splicing where asked.
        let mut items: Vec<CellId> = Vec::new();
        let mut cur = template;
        let tail;
        loop {
            match self.heap.tag(cur) {
                Tag::Pair => {
                    // A dotted unquote tail: `(a . ,b)
                    if self.heap.car(cur) == self.syms.unquote && cur != template {
                        let forms = args_vec(&self.heap, self.heap.cdr(cur))?;
                        expect_n("unquote", &forms, 1)?;
                        tail = if level == 1 {
                            self.eval(forms[0], env)?
                        } else {
                            let inner = self.quasi(forms[0], env, level - 1)?;
                            self.rebuild_quoted(self.syms.unquote, inner, env)?
                        };
                        break;
                    }
                    let elem = self.heap.car(cur);
                    if self.heap.tag(elem) == Tag::Pair
                        && self.heap.car(elem) == self.syms.unquote_splicing
                    {
                        let forms = args_vec(&self.heap, self.heap.cdr(elem))?;
                        expect_n("unquote-splicing", &forms, 1)?;
                        if level == 1 {
                            let spliced = self.eval(forms[0], env)?;
                            self.heap.root_push(spliced);
                            let (elems, splice_tail) = self.heap.list_elems_and_tail(spliced);
                            if splice_tail != CellId::NIL {
                                return Err(LispError::type_error(
                                    "unquote-splicing: result is not a list",
                                ));
                            }
                            for e in elems {
                                self.heap.root_push(e);
                                items.push(e);
                            }
                        } else {
                            let inner = self.quasi(forms[0], env, level - 1)?;
                            let rebuilt =
                                self.rebuild_quoted(self.syms.unquote_splicing, inner, env)?;
                            self.heap.root_push(rebuilt);
                            items.push(rebuilt);
                        }
                    } else {
                        let value = self.quasi(elem, env, level)?;
                        self.heap.root_push(value);
                        items.push(value);
                    }
                    cur = self.heap.cdr(cur);
                }
                _ => {
                    tail = self.quasi(cur, env, level)?;
                    break;
                }
            }
        }
        self.heap.root_push(tail);
        self.heap.list_with_tail(&items, tail, env)
    }

    fn rebuild_quoted(&mut self, sym: CellId, inner: CellId, env: CellId) -> RunResult<CellId> {
        self.heap.root_push(inner);
        let list = self.heap.list_from_slice(&[sym, inner], env);
        self.heap.root_pop(1);
        list
    }
}
