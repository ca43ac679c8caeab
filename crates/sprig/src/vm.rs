//! The embeddable VM: setup, evaluation entry points, teardown.
//!
//! `Vm::new` performs setup in dependency order: heap and singletons,
//! oblist, special-form symbols, base environment with the native
//! library, the interaction environment over it, and the three current
//! ports. Teardown is `Drop`: every slab and port is released by
//! ownership, after which a fresh `Vm::new` is the supported restart
//! path.
//!
//! Returned [`CellId`]s stay valid while they are reachable or protected;
//! a host holding a result across further evaluation should wrap it in
//! [`Vm::protect`] / [`Vm::unprotect`].

use ahash::AHashMap;

use crate::{
    cell::{CellId, Tag},
    dict,
    error::{LispError, RunResult},
    eval::{SPECIAL_FORMS, Special},
    heap::{GcPhase, Heap, HeapStats},
    limits::Limits,
    native::{NativeFn, Natives},
    oblist::Oblist,
    port::{StdOutputPort, StdinPort, StringInputPort},
    printer::{self, WriteOpts},
    reader::Reader,
};

/// Bucket count of the base environment's hash frame.
const BASE_ENV_BUCKETS: usize = 512;
/// Bucket count of the interaction environment's hash frame.
const INTERACTION_ENV_BUCKETS: usize = 128;

/// Symbols the evaluator compares against by identity.
pub(crate) struct Syms {
    pub quasiquote: CellId,
    pub unquote: CellId,
    pub unquote_splicing: CellId,
    pub else_sym: CellId,
}

/// One virtual machine: heap, oblist, environments, natives, ports.
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) oblist: Oblist,
    pub(crate) natives: Natives,
    pub(crate) syms: Syms,
    pub(crate) specials: AHashMap<CellId, Special>,
    pub(crate) depth: usize,
    base_env: CellId,
    interaction_env: CellId,
    cur_in: CellId,
    cur_out: CellId,
    cur_err: CellId,
    exit_code: Option<i32>,
}

impl Vm {
    /// Builds and initializes a VM.
    ///
    /// # Panics
    /// Panics only if setup allocation fails, which cannot happen: the
    /// heap clamps its limit to at least one block, and setup needs a
    /// fraction of one.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self::setup(limits).expect("VM setup fits in the minimum heap")
    }

    fn setup(limits: Limits) -> RunResult<Self> {
        let mut heap = Heap::new(limits);
        let mut oblist = Oblist::new(&mut heap)?;

        let syms = Syms {
            quasiquote: oblist.intern(&mut heap, "quasiquote")?,
            unquote: oblist.intern(&mut heap, "unquote")?,
            unquote_splicing: oblist.intern(&mut heap, "unquote-splicing")?,
            else_sym: oblist.intern(&mut heap, "else")?,
        };

        let mut specials = AHashMap::with_capacity(SPECIAL_FORMS.len());
        for &(name, special) in SPECIAL_FORMS {
            let sym = oblist.intern(&mut heap, name)?;
            specials.insert(sym, special);
        }

        let base_env = dict::dict_new(&mut heap, BASE_ENV_BUCKETS, CellId::NIL)?;
        heap.add_static_root(base_env);
        let interaction_env = dict::push_frame(&mut heap, base_env, INTERACTION_ENV_BUCKETS, CellId::NIL)?;
        heap.add_static_root(interaction_env);

        let cur_in = heap.port_cell(Box::new(StdinPort::new()), CellId::NIL)?;
        heap.add_static_root(cur_in);
        let cur_out = heap.port_cell(Box::new(StdOutputPort::stdout()), CellId::NIL)?;
        heap.add_static_root(cur_out);
        let cur_err = heap.port_cell(Box::new(StdOutputPort::stderr()), CellId::NIL)?;
        heap.add_static_root(cur_err);

        let mut vm = Self {
            heap,
            oblist,
            natives: Natives::default(),
            syms,
            specials,
            depth: 0,
            base_env,
            interaction_env,
            cur_in,
            cur_out,
            cur_err,
            exit_code: None,
        };
        crate::builtins::install_all(&mut vm, base_env)?;
        tracing::debug!(
            symbols = vm.oblist.len(),
            heap_cells = vm.heap.stats().live_cells,
            "vm setup complete"
        );
        Ok(vm)
    }

    // ------------------------------------------------------------------
    // environments and ports
    // ------------------------------------------------------------------

    /// The environment holding the native library.
    #[must_use]
    pub fn base_environment(&self) -> CellId {
        self.base_env
    }

    /// The environment user definitions land in.
    #[must_use]
    pub fn interaction_environment(&self) -> CellId {
        self.interaction_env
    }

    #[must_use]
    pub fn current_input(&self) -> CellId {
        self.cur_in
    }

    #[must_use]
    pub fn current_output(&self) -> CellId {
        self.cur_out
    }

    #[must_use]
    pub fn current_error(&self) -> CellId {
        self.cur_err
    }

    /// Read-only heap access, mainly for introspection and tests.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable heap access for native procedures (allocation, rooting).
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    // ------------------------------------------------------------------
    // interning and native registration
    // ------------------------------------------------------------------

    /// Interns a symbol by name.
    pub fn intern(&mut self, name: &str) -> RunResult<CellId> {
        self.oblist.intern(&mut self.heap, name)
    }

    /// Registers a native procedure (evaluated arguments) under `name`
    /// in `env`. This is the installer half of the native ABI.
    pub fn register_native(&mut self, env: CellId, name: &'static str, func: NativeFn) -> RunResult<()> {
        self.def_native_tagged(env, name, func, Tag::NativeProc)
    }

    /// Registers a non-evaluating native: it receives its argument forms
    /// unevaluated.
    pub fn register_native_nproc(&mut self, env: CellId, name: &'static str, func: NativeFn) -> RunResult<()> {
        self.def_native_tagged(env, name, func, Tag::NativeNproc)
    }

    pub(crate) fn def_native(&mut self, env: CellId, name: &'static str, func: NativeFn) -> RunResult<()> {
        self.def_native_tagged(env, name, func, Tag::NativeProc)
    }

    fn def_native_tagged(&mut self, env: CellId, name: &'static str, func: NativeFn, tag: Tag) -> RunResult<()> {
        let index = self.natives.register(name, func);
        let sym = self.oblist.intern(&mut self.heap, name)?;
        let cell = self.heap.alloc(tag, u64::from(index), 0, env)?;
        self.heap.root_push(cell);
        let result = dict::bind(&mut self.heap, env, sym, cell, env);
        self.heap.root_pop(1);
        result
    }

    // ------------------------------------------------------------------
    // evaluation entry points
    // ------------------------------------------------------------------

    /// Reads and evaluates every form in `source` in the interaction
    /// environment, returning the last result (void if empty).
    pub fn eval_str(&mut self, source: &str) -> RunResult<CellId> {
        let saved = self.heap.root_depth();
        let result = self.eval_str_inner(source);
        self.heap.root_truncate(saved);
        result
    }

    fn eval_str_inner(&mut self, source: &str) -> RunResult<CellId> {
        let mut port = StringInputPort::new(source);
        let mut reader = Reader::new(&mut port);
        let forms = reader.read_all(&mut self.heap, &mut self.oblist)?;
        let mut last = CellId::VOID;
        for form in forms {
            last = self.eval(form, self.interaction_env)?;
            self.heap.root_push(last);
        }
        Ok(last)
    }

    /// Reads a single S-expression from `source`; `None` when empty.
    pub fn read_str(&mut self, source: &str) -> RunResult<Option<CellId>> {
        let mut port = StringInputPort::new(source);
        let mut reader = Reader::new(&mut port);
        let form = reader.read(&mut self.heap, &mut self.oblist)?;
        if let Some(form) = form {
            self.heap.root_push(form);
        }
        Ok(form)
    }

    /// Parses one S-expression from a port cell; the eof object at end
    /// of input.
    pub fn read_port(&mut self, port: CellId) -> RunResult<CellId> {
        self.heap.root_push(port);
        let result = match self.heap.take_port(port) {
            Ok(mut boxed) => {
                let mut reader = Reader::new(boxed.as_mut());
                let result = reader.read(&mut self.heap, &mut self.oblist);
                self.heap.restore_port(port, boxed);
                result.map(|form| match form {
                    Some(form) => {
                        self.heap.root_push(form);
                        form
                    }
                    None => CellId::EOF,
                })
            }
            Err(err) => Err(err),
        };
        self.heap.root_pop(1);
        result
    }

    /// Serializes a cell per the write options.
    #[must_use]
    pub fn write_sexpr(&self, id: CellId, opts: &WriteOpts) -> String {
        printer::write_to_string(&self.heap, &self.natives, id, opts)
    }

    /// Reads and evaluates a file in the interaction environment.
    pub fn load(&mut self, path: &std::path::Path) -> RunResult<CellId> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| LispError::io(format!("load {}: {err}", path.display())))?;
        tracing::info!(path = %path.display(), bytes = source.len(), "loading file");
        self.eval_str(&source)
    }

    /// Advances one unit of collector work; returns true while a cycle
    /// is in progress. The mutator side of "one unit of work" is
    /// [`Vm::eval`] itself.
    pub fn step(&mut self) -> bool {
        if self.heap.gc_phase() != GcPhase::Off {
            self.heap.gc_step(64)
        } else if self.heap.should_gc() {
            self.heap.start_cycle();
            true
        } else {
            false
        }
    }

    /// Renders an error into an error cell (`(message . irritants)`),
    /// falling back to the pre-allocated system error cell.
    pub fn error_cell(&mut self, err: &LispError) -> CellId {
        self.heap.error_cell(err)
    }

    /// Builds a tail-call thunk: "evaluate `expr` in `env` later".
    ///
    /// A native procedure that ends by evaluating an expression should
    /// return this instead of calling [`Vm::eval`], so the call
    /// participates in the trampoline and stays a proper tail call.
    pub fn make_tail_call(&mut self, expr: CellId, env: CellId) -> RunResult<CellId> {
        self.heap.thunk_sexpr(expr, env, env)
    }

    // ------------------------------------------------------------------
    // host-side protection and introspection
    // ------------------------------------------------------------------

    /// Protects a cell from collection until [`Vm::unprotect`].
    pub fn protect(&mut self, id: CellId) {
        self.heap.root_push(id);
    }

    /// Releases the most recent `n` protections.
    pub fn unprotect(&mut self, n: usize) {
        self.heap.root_pop(n);
    }

    /// Heap snapshot including the interned symbol count.
    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        let mut stats = self.heap.stats();
        stats.interned_symbols = self.oblist.len();
        stats
    }

    /// Set by `(exit code)`; the driving harness checks this after each
    /// evaluation.
    #[must_use]
    pub fn exit_requested(&self) -> Option<i32> {
        self.exit_code
    }

    pub(crate) fn request_exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    #[must_use]
    pub fn as_int(&self, id: CellId) -> Option<i64> {
        let cell = self.heap.cell(id);
        (cell.tag() == Tag::Int).then(|| cell.as_int())
    }

    #[must_use]
    pub fn as_real(&self, id: CellId) -> Option<f64> {
        let cell = self.heap.cell(id);
        (cell.tag() == Tag::Real).then(|| cell.as_real())
    }

    #[must_use]
    pub fn as_char(&self, id: CellId) -> Option<char> {
        let cell = self.heap.cell(id);
        (cell.tag() == Tag::Char).then(|| cell.as_char())
    }

    #[must_use]
    pub fn as_bool(&self, id: CellId) -> Option<bool> {
        match id {
            CellId::TRUE => Some(true),
            CellId::FALSE => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self, id: CellId) -> Option<String> {
        self.heap
            .tag(id)
            .features()
            .is_any_str
            .then(|| self.heap.str_value(id).into_owned())
    }

    #[must_use]
    pub fn as_sym_name(&self, id: CellId) -> Option<String> {
        self.heap
            .tag(id)
            .features()
            .is_any_sym
            .then(|| self.heap.sym_name(id).into_owned())
    }

    /// The elements of a proper list, or `None` for anything else.
    #[must_use]
    pub fn list_vec(&self, id: CellId) -> Option<Vec<CellId>> {
        self.heap.list_to_vec(id).ok()
    }

    /// Structural equality (`equal?`) between two values. Errors only on
    /// data deeper than the recursion bound.
    pub fn equal(&self, a: CellId, b: CellId) -> RunResult<bool> {
        crate::equiv::equal_cells(&self.heap, a, b)
    }
}
