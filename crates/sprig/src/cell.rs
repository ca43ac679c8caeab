//! The uniform tagged cell: every runtime value is one of these.
//!
//! A [`Cell`] is exactly three 64-bit words. Word 0 packs the type tag, the
//! flag byte (three GC-state bits plus the tail-call marker), and six bytes
//! that immediate strings and bytevectors use as overflow payload. Words 1
//! and 2 are the generic car and cdr slots, interpreted per tag as an
//! integer, character, float bits, slab index, native-registry index, or a
//! [`CellId`] reference into the heap arena.
//!
//! The [`Tag`] enumeration is ordered so that the common groupings reduce to
//! integer comparisons: vector-backed cells needing specialized marking come
//! first, then cells whose cdr owns heap storage (finalized at sweep), then
//! external and immediate variants, simple atoms, the singletons, and
//! finally the pair-shaped types. [`FEATURES`] supplies the projections that
//! a single inequality cannot express.

use strum::{FromRepr, IntoStaticStr};

/// Identity of a cell: an index into the heap arena.
///
/// Cells reference each other by `CellId`, never by Rust reference; the
/// arena may grow (its backing storage moves) but indices stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

/// Number of pinned singleton slots at the bottom of the arena.
///
/// These cells are created at setup, live outside the collector's
/// jurisdiction, and are neither marked nor swept.
pub(crate) const N_SINGLETONS: usize = 7;

impl CellId {
    /// The empty list. Both an atom and a list, but not a pair.
    pub const NIL: Self = Self(0);
    /// The canonical true value.
    pub const TRUE: Self = Self(1);
    /// The canonical false value. The only value that is not truthy.
    pub const FALSE: Self = Self(2);
    /// The end-of-file object returned by reads at end of input.
    pub const EOF: Self = Self(3);
    /// The undefined value: initializes letrec slots, prints as `#<undef>`.
    pub const UNDEF: Self = Self(4);
    /// The void value returned by effectful forms; the REPL discards it.
    pub const VOID: Self = Self(5);
    /// Pre-allocated error cell, used when the heap is too exhausted to
    /// build a fresh one.
    pub const SYSERROR: Self = Self(6);

    #[inline]
    #[must_use]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("cell index exceeds u32"))
    }

    /// Returns the raw arena index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Reconstructs an id from a car/cdr payload word.
    #[inline]
    pub(crate) fn from_word(word: u64) -> Self {
        Self(word as u32)
    }

    /// The id as a payload word, for storing into a car/cdr slot.
    #[inline]
    pub(crate) fn to_word(self) -> u64 {
        u64::from(self.0)
    }

    /// True for the pinned singleton cells (nil, booleans, eof, undef,
    /// void, the system error).
    #[inline]
    #[must_use]
    pub fn is_singleton(self) -> bool {
        self.index() < N_SINGLETONS
    }
}

/// Cell type tags, ordered so group membership is an inequality.
///
/// The salient boundaries:
///
/// - `tag <= Tag::SvecPow2Heap`: heap vectors of cells; specialized marking.
/// - `tag <= Tag::PortHeap`: the cdr owns heap storage; finalize at sweep.
/// - `tag <= Tag::Nil`: atoms.
/// - `tag >= Tag::Nil`: lists.
/// - `tag > Tag::Nil`: pair-shaped (car and cdr are cell references), but
///   only [`Tag::Pair`] answers the user-level `pair?`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, IntoStaticStr)]
pub enum Tag {
    /// Vector of cells; car is unused, cdr indexes the svec slab.
    SvecHeap = 0,
    /// Same as [`Tag::SvecHeap`] but the length is a power of two; backs
    /// hash-table frames and the oblist.
    SvecPow2Heap = 1,
    /// Interned symbol; car stores the character hash, cdr indexes the
    /// string slab.
    SymHeap = 2,
    /// Bytevector with heap storage.
    BvecHeap = 3,
    /// String with heap storage.
    StrHeap = 4,
    /// Host object; cdr indexes the object slab, whose `Drop` is the
    /// deleter.
    ObjHeap = 5,
    /// I/O port; cdr indexes the port slab. Closed at sweep.
    PortHeap = 6,
    /// Bytevector over external (static) storage; never freed by the
    /// collector.
    BvecExt = 7,
    /// String over external (static) storage.
    StrExt = 8,
    /// Bytevector embedded in the cell itself (up to [`IMM_CAP`] bytes).
    BvecImm = 9,
    /// String embedded in the cell itself.
    StrImm = 10,
    /// Runtime-generated symbol; never interned, printable form derived
    /// from the arena index stored in its car.
    Gensym = 11,
    /// Boolean atom. Only the two pinned singletons exist.
    Bool = 12,
    /// Character atom; car holds the scalar value.
    Char = 13,
    /// Integer atom; car holds an `i64`.
    Int = 14,
    /// Real atom; car holds `f64` bits. (On 32-bit hosts the double would
    /// span both payload words.)
    Real = 15,
    /// Rational atom; car and cdr hold numerator and denominator.
    Rational = 16,
    /// End-of-file atom. Only the pinned singleton exists.
    Eof = 17,
    /// Native procedure (arguments evaluated); car indexes the registry.
    NativeProc = 18,
    /// Native non-evaluating procedure; receives its argument forms raw.
    NativeNproc = 19,
    /// The void singleton's tag.
    Void = 20,
    /// The undefined singleton's tag.
    Undef = 21,
    /// The empty list singleton's tag.
    Nil = 22,
    /// The ordinary cons pair.
    Pair = 23,
    /// Vector of zero, one or two elements stored in the car/cdr slots;
    /// `imm_len` holds the count, unused slots hold nil.
    SvecImm = 24,
    /// Interpreted procedure; car is `(formals . body)`, cdr is the
    /// captured environment.
    Proc = 25,
    /// Interpreted non-evaluating procedure.
    Nproc = 26,
    /// Macro; car is the transformer procedure, cdr its environment.
    Macro = 27,
    /// Dictionary; car is the top frame, cdr the parent dictionary.
    Dict = 28,
    /// Trampoline thunk: evaluate the car expression in the cdr
    /// environment.
    ThunkSexpr = 29,
    /// Trampoline thunk: evaluate the car body (implicit begin) in the cdr
    /// environment.
    ThunkBody = 30,
    /// Error value; car is the message string, cdr the irritants list.
    Error = 31,
}

/// Number of defined tags; sizes the features table.
pub(crate) const NTAGS: usize = 32;

impl Tag {
    /// Tags at or below this one are heap vectors of cell references and
    /// need specialized marking during the GC mark phase.
    pub const ANY_HEAP_SVEC: Self = Self::SvecPow2Heap;
    /// Tags at or below this one own heap storage through their cdr and
    /// need finalizing at sweep.
    pub const NEEDS_FINALIZING: Self = Self::PortHeap;

    #[inline]
    #[must_use]
    pub fn is_atom(self) -> bool {
        self <= Self::Nil
    }

    /// Pair-shaped: car and cdr are cell references the collector traces.
    #[inline]
    #[must_use]
    pub fn is_any_pair(self) -> bool {
        self > Self::Nil
    }

    /// The user-level `pair?`.
    #[inline]
    #[must_use]
    pub fn is_pair(self) -> bool {
        self == Self::Pair
    }

    #[inline]
    #[must_use]
    pub fn is_list(self) -> bool {
        self >= Self::Nil
    }

    #[inline]
    #[must_use]
    pub fn needs_finalizing(self) -> bool {
        self <= Self::NEEDS_FINALIZING
    }

    #[inline]
    #[must_use]
    pub fn needs_svec_marking(self) -> bool {
        self <= Self::ANY_HEAP_SVEC
    }

    /// The features-table row for this tag.
    #[inline]
    #[must_use]
    pub fn features(self) -> &'static CellFeatures {
        &FEATURES[self as usize]
    }

    /// Printable type name, as used in error messages.
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        self.features().name
    }
}

/// Boolean projections over the tag space that are not expressible as a
/// single inequality, plus the printable type name.
#[derive(Debug, Clone, Copy)]
pub struct CellFeatures {
    pub is_any_svec: bool,
    pub is_any_str: bool,
    pub is_any_sym: bool,
    pub is_any_bvec: bool,
    pub name: &'static str,
}

const fn feat(
    is_any_svec: bool,
    is_any_str: bool,
    is_any_sym: bool,
    is_any_bvec: bool,
    name: &'static str,
) -> CellFeatures {
    CellFeatures { is_any_svec, is_any_str, is_any_sym, is_any_bvec, name }
}

/// Static features table, indexed by tag discriminant.
pub static FEATURES: [CellFeatures; NTAGS] = [
    feat(true, false, false, false, "vector"),            // SvecHeap
    feat(true, false, false, false, "vector"),            // SvecPow2Heap
    feat(false, false, true, false, "symbol"),            // SymHeap
    feat(false, false, false, true, "bytevector"),        // BvecHeap
    feat(false, true, false, false, "string"),            // StrHeap
    feat(false, false, false, false, "host-object"),      // ObjHeap
    feat(false, false, false, false, "port"),             // PortHeap
    feat(false, false, false, true, "bytevector"),        // BvecExt
    feat(false, true, false, false, "string"),            // StrExt
    feat(false, false, false, true, "bytevector"),        // BvecImm
    feat(false, true, false, false, "string"),            // StrImm
    feat(false, false, true, false, "symbol"),            // Gensym
    feat(false, false, false, false, "boolean"),          // Bool
    feat(false, false, false, false, "char"),             // Char
    feat(false, false, false, false, "integer"),          // Int
    feat(false, false, false, false, "real"),             // Real
    feat(false, false, false, false, "rational"),         // Rational
    feat(false, false, false, false, "eof-object"),       // Eof
    feat(false, false, false, false, "native-procedure"), // NativeProc
    feat(false, false, false, false, "native-procedure"), // NativeNproc
    feat(false, false, false, false, "void"),             // Void
    feat(false, false, false, false, "undefined"),        // Undef
    feat(false, false, false, false, "nil"),              // Nil
    feat(false, false, false, false, "pair"),             // Pair
    feat(true, false, false, false, "vector"),            // SvecImm
    feat(false, false, false, false, "procedure"),        // Proc
    feat(false, false, false, false, "procedure"),        // Nproc
    feat(false, false, false, false, "macro"),            // Macro
    feat(false, false, false, false, "dictionary"),       // Dict
    feat(false, false, false, false, "thunk"),            // ThunkSexpr
    feat(false, false, false, false, "thunk"),            // ThunkBody
    feat(false, false, false, false, "error"),            // Error
];

/// Garbage-collection life-cycle state, stored in three flag bits.
///
/// The ordering matters: during a cycle a live cell only ever advances
/// (idle, issued, stacked, marked), except for the write barrier which may
/// move a cell from marked territory's perspective by re-issuing an idle
/// child. Cells on the free list are `Free`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromRepr)]
pub enum GcState {
    /// Unreachable so far, or not yet discovered this cycle.
    Idle = 0,
    /// Discovered (from a root or the barrier), not yet processed.
    Issued = 1,
    /// Currently being traced off the mark stack.
    Stacked = 2,
    /// Fully traced; all reachable children scheduled.
    Marked = 3,
    /// On the free list.
    Free = 4,
}

const GC_STATE_MASK: u8 = 0b0000_0111;
const F_TAIL: u8 = 0b0000_1000;

/// Capacity of the immediate payload: the five head bytes plus both
/// payload words.
pub const IMM_CAP: usize = 21;

/// Immediate payload copied out of a cell; derefs to the byte slice.
#[derive(Debug, Clone, Copy)]
pub struct ImmBytes {
    buf: [u8; IMM_CAP],
    len: u8,
}

impl std::ops::Deref for ImmBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

/// The three-word cell. See the module docs for the layout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cell {
    tag: Tag,
    flags: u8,
    imm_len: u8,
    head: [u8; 5],
    car: u64,
    cdr: u64,
}

impl Cell {
    /// Raw constructor. The words are installed verbatim (this is the
    /// `rplaca`/`rplacd` path): only legal before the cell is published to
    /// any mutator.
    pub fn new(tag: Tag, car: u64, cdr: u64) -> Self {
        Self { tag, flags: 0, imm_len: 0, head: [0; 5], car, cdr }
    }

    pub fn nil() -> Self {
        Self::new(Tag::Nil, 0, 0)
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    #[inline]
    pub fn set_tag(&mut self, tag: Tag) {
        self.tag = tag;
    }

    #[inline]
    pub fn gc_state(&self) -> GcState {
        GcState::from_repr(self.flags & GC_STATE_MASK).unwrap_or(GcState::Idle)
    }

    #[inline]
    pub fn set_gc_state(&mut self, state: GcState) {
        self.flags = (self.flags & !GC_STATE_MASK) | (state as u8);
    }

    #[inline]
    pub fn is_tail(&self) -> bool {
        self.flags & F_TAIL != 0
    }

    #[inline]
    pub fn set_tail(&mut self, tail: bool) {
        if tail {
            self.flags |= F_TAIL;
        } else {
            self.flags &= !F_TAIL;
        }
    }

    // --- raw word access (rplaca / rplacd) ---

    #[inline]
    pub fn car_word(&self) -> u64 {
        self.car
    }

    #[inline]
    pub fn cdr_word(&self) -> u64 {
        self.cdr
    }

    #[inline]
    pub fn rplaca(&mut self, word: u64) {
        self.car = word;
    }

    #[inline]
    pub fn rplacd(&mut self, word: u64) {
        self.cdr = word;
    }

    // --- typed payload views ---

    #[inline]
    pub fn as_int(&self) -> i64 {
        self.car as i64
    }

    #[inline]
    pub fn as_real(&self) -> f64 {
        f64::from_bits(self.car)
    }

    #[inline]
    pub fn as_char(&self) -> char {
        char::from_u32(self.car as u32).unwrap_or('\u{fffd}')
    }

    /// Numerator and denominator of a rational cell.
    #[inline]
    pub fn as_rational(&self) -> (i64, i64) {
        (self.car as i64, self.cdr as i64)
    }

    /// Stored character hash of an interned symbol.
    #[inline]
    pub fn sym_hash(&self) -> u64 {
        self.car
    }

    /// Car interpreted as a cell reference.
    #[inline]
    pub fn car_id(&self) -> CellId {
        CellId::from_word(self.car)
    }

    /// Cdr interpreted as a cell reference.
    #[inline]
    pub fn cdr_id(&self) -> CellId {
        CellId::from_word(self.cdr)
    }

    /// Cdr interpreted as a side-slab index.
    #[inline]
    pub fn slab_index(&self) -> u32 {
        self.cdr as u32
    }

    /// Car interpreted as a native-registry index.
    #[inline]
    pub fn native_index(&self) -> u32 {
        self.car as u32
    }

    // --- immediate payload ---

    /// Packs `bytes` into the head bytes and payload words.
    ///
    /// # Panics
    /// Panics if `bytes` exceeds [`IMM_CAP`]; callers check the length when
    /// choosing the immediate form.
    pub fn set_imm(&mut self, bytes: &[u8]) {
        assert!(bytes.len() <= IMM_CAP, "immediate payload too long");
        let mut buf = [0_u8; IMM_CAP];
        buf[..bytes.len()].copy_from_slice(bytes);
        self.imm_len = bytes.len() as u8;
        self.head.copy_from_slice(&buf[..5]);
        self.car = u64::from_le_bytes(buf[5..13].try_into().expect("8-byte slice"));
        self.cdr = u64::from_le_bytes(buf[13..21].try_into().expect("8-byte slice"));
    }

    #[inline]
    pub fn imm_len(&self) -> usize {
        self.imm_len as usize
    }

    /// Copies the immediate payload back out.
    pub fn imm(&self) -> ImmBytes {
        let mut buf = [0_u8; IMM_CAP];
        buf[..5].copy_from_slice(&self.head);
        buf[5..13].copy_from_slice(&self.car.to_le_bytes());
        buf[13..21].copy_from_slice(&self.cdr.to_le_bytes());
        ImmBytes { buf, len: self.imm_len }
    }

    /// Count of elements in an immediate vector (0, 1 or 2).
    #[inline]
    pub fn imm_vec_len(&self) -> usize {
        self.imm_len as usize
    }

    #[inline]
    pub fn set_imm_vec_len(&mut self, len: usize) {
        debug_assert!(len <= 2);
        self.imm_len = len as u8;
    }
}
