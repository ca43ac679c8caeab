//! The printer: serializes cells back to surface syntax.
//!
//! Two modes per R5RS: `write` produces read-back-able text (strings
//! quoted and escaped, characters as `#\c`), `display` produces
//! human-facing text. Traversal is bounded twice over: nesting depth by
//! `max_depth_limit`, dictionary parent chains by `env_depth_limit`, and
//! a node budget keeps cyclic structures (which environments naturally
//! form) from spinning.

use std::fmt::Write as _;

use crate::{
    cell::{CellId, Tag},
    heap::Heap,
    native::Natives,
};

/// `write` or `display` rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Read-back-able representation.
    Write,
    /// Human-facing representation.
    Display,
}

/// Options for [`crate::Vm::write_sexpr`].
#[derive(Debug, Clone, Copy)]
pub struct WriteOpts {
    pub mode: WriteMode,
    /// How many dictionary parent frames to render before eliding.
    pub env_depth_limit: usize,
    /// Maximum nesting depth before eliding with `...`.
    pub max_depth_limit: usize,
}

impl Default for WriteOpts {
    fn default() -> Self {
        Self { mode: WriteMode::Write, env_depth_limit: 2, max_depth_limit: 64 }
    }
}

impl WriteOpts {
    #[must_use]
    pub fn display() -> Self {
        Self { mode: WriteMode::Display, ..Self::default() }
    }
}

/// Total cells rendered before the printer gives up on a structure;
/// bounds cyclic cdr chains that depth alone cannot.
const NODE_BUDGET: usize = 65_536;

pub(crate) fn write_to_string(heap: &Heap, natives: &Natives, id: CellId, opts: &WriteOpts) -> String {
    let mut printer = Printer { heap, natives, opts, nodes_left: NODE_BUDGET };
    let mut out = String::new();
    printer.fmt(id, 0, &mut out);
    out
}

struct Printer<'a> {
    heap: &'a Heap,
    natives: &'a Natives,
    opts: &'a WriteOpts,
    nodes_left: usize,
}

impl Printer<'_> {
    fn spend(&mut self) -> bool {
        if self.nodes_left == 0 {
            return false;
        }
        self.nodes_left -= 1;
        true
    }

    fn fmt(&mut self, id: CellId, depth: usize, out: &mut String) {
        if depth > self.opts.max_depth_limit || !self.spend() {
            out.push_str("...");
            return;
        }
        let heap = self.heap;
        let cell = heap.cell(id);
        match cell.tag() {
            Tag::Nil => out.push_str("()"),
            Tag::Bool => out.push_str(if id == CellId::TRUE { "#t" } else { "#f" }),
            Tag::Eof => out.push_str("#<eof>"),
            Tag::Void => out.push_str("#<void>"),
            Tag::Undef => out.push_str("#<undef>"),
            Tag::Int => {
                let _ = write!(out, "{}", cell.as_int());
            }
            Tag::Real => out.push_str(&format_real(cell.as_real())),
            Tag::Rational => {
                let (n, d) = cell.as_rational();
                let _ = write!(out, "{n}/{d}");
            }
            Tag::Char => {
                if self.opts.mode == WriteMode::Write {
                    out.push_str(&write_char(cell.as_char()));
                } else {
                    out.push(cell.as_char());
                }
            }
            Tag::SymHeap | Tag::Gensym => out.push_str(&heap.sym_name(id)),
            Tag::StrHeap | Tag::StrExt | Tag::StrImm => {
                let text = heap.str_value(id);
                if self.opts.mode == WriteMode::Write {
                    out.push('"');
                    for c in text.chars() {
                        match c {
                            '"' => out.push_str("\\\""),
                            '\\' => out.push_str("\\\\"),
                            '\n' => out.push_str("\\n"),
                            '\t' => out.push_str("\\t"),
                            '\r' => out.push_str("\\r"),
                            c => out.push(c),
                        }
                    }
                    out.push('"');
                } else {
                    out.push_str(&text);
                }
            }
            Tag::BvecHeap | Tag::BvecExt | Tag::BvecImm => {
                out.push_str("#u8(");
                let bytes = heap.bytevec_value(id);
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "{b}");
                }
                out.push(')');
            }
            Tag::SvecHeap | Tag::SvecPow2Heap | Tag::SvecImm => {
                out.push_str("#(");
                for (i, elem) in heap.svec_elems(id).into_iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.fmt(elem, depth + 1, out);
                }
                out.push(')');
            }
            Tag::Pair => self.fmt_list(id, depth, out),
            Tag::NativeProc | Tag::NativeNproc => {
                let _ = write!(out, "#<native {}>", self.natives.name_of(cell.native_index()));
            }
            Tag::Proc | Tag::Nproc => {
                out.push_str(if cell.tag() == Tag::Proc { "#<procedure " } else { "#<nproc " });
                let lambda = heap.car(id);
                if heap.tag(lambda).is_any_pair() {
                    self.fmt(heap.car(lambda), depth + 1, out);
                } else {
                    out.push('?');
                }
                out.push('>');
            }
            Tag::Macro => out.push_str("#<macro>"),
            Tag::Dict => self.fmt_dict(id, depth, self.opts.env_depth_limit, out),
            Tag::ThunkSexpr | Tag::ThunkBody => out.push_str("#<thunk>"),
            Tag::PortHeap => out.push_str("#<port>"),
            Tag::ObjHeap => out.push_str("#<host-object>"),
            Tag::Error => {
                if id == CellId::SYSERROR {
                    out.push_str("#<error heap exhausted>");
                    return;
                }
                out.push_str("#<error ");
                let message = heap.car(id);
                if heap.tag(message).features().is_any_str {
                    out.push_str(&heap.str_value(message));
                } else {
                    self.fmt(message, depth + 1, out);
                }
                let mut irritant = heap.cdr(id);
                while self.heap.tag(irritant) == Tag::Pair {
                    out.push(' ');
                    let item = self.heap.car(irritant);
                    if self.heap.tag(item).features().is_any_str {
                        out.push_str(&self.heap.str_value(item));
                    } else {
                        self.fmt(item, depth + 1, out);
                    }
                    irritant = self.heap.cdr(irritant);
                }
                out.push('>');
            }
        }
    }

    fn fmt_list(&mut self, id: CellId, depth: usize, out: &mut String) {
        out.push('(');
        let mut cur = id;
        let mut first = true;
        loop {
            if !self.spend() {
                out.push_str(" ...");
                break;
            }
            if !first {
                out.push(' ');
            }
            first = false;
            self.fmt(self.heap.car(cur), depth + 1, out);
            cur = self.heap.cdr(cur);
            match self.heap.tag(cur) {
                Tag::Nil => break,
                Tag::Pair => {}
                _ => {
                    out.push_str(" . ");
                    self.fmt(cur, depth + 1, out);
                    break;
                }
            }
        }
        out.push(')');
    }

    fn fmt_dict(&mut self, id: CellId, depth: usize, env_depth: usize, out: &mut String) {
        out.push_str("#<dict");
        let frame = self.heap.car(id);
        let pairs = self.frame_pairs(frame);
        for pair in pairs {
            out.push(' ');
            self.fmt(pair, depth + 1, out);
        }
        let parent = self.heap.cdr(id);
        if self.heap.tag(parent) == Tag::Dict {
            out.push_str(" | ");
            if env_depth == 0 {
                out.push_str("...");
            } else {
                self.fmt_dict(parent, depth + 1, env_depth - 1, out);
            }
        }
        out.push('>');
    }

    fn frame_pairs(&self, frame: CellId) -> Vec<CellId> {
        let mut pairs = Vec::new();
        match self.heap.tag(frame) {
            Tag::Nil | Tag::Pair => collect_chain(self.heap, frame, &mut pairs),
            Tag::SvecPow2Heap | Tag::SvecImm | Tag::SvecHeap => {
                for bucket in self.heap.svec_elems(frame) {
                    collect_chain(self.heap, bucket, &mut pairs);
                }
            }
            _ => {}
        }
        pairs
    }
}

fn collect_chain(heap: &Heap, mut chain: CellId, out: &mut Vec<CellId>) {
    while heap.tag(chain) == Tag::Pair {
        out.push(heap.car(chain));
        chain = heap.cdr(chain);
    }
}

/// Shortest round-trip formatting for reals; non-finite values use the
/// Scheme spellings.
fn format_real(x: f64) -> String {
    if x.is_nan() {
        "+nan.0".to_owned()
    } else if x.is_infinite() {
        if x > 0.0 { "+inf.0".to_owned() } else { "-inf.0".to_owned() }
    } else {
        let mut buffer = ryu::Buffer::new();
        buffer.format(x).to_owned()
    }
}

fn write_char(c: char) -> String {
    match c {
        ' ' => "#\\space".to_owned(),
        '\n' => "#\\newline".to_owned(),
        '\t' => "#\\tab".to_owned(),
        '\r' => "#\\return".to_owned(),
        '\0' => "#\\null".to_owned(),
        c => format!("#\\{c}"),
    }
}
