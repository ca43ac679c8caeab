#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "payload words narrow by construction")]
#![expect(clippy::cast_sign_loss, reason = "integer payloads round-trip through u64 words")]
#![expect(clippy::cast_possible_wrap, reason = "word-to-integer views are intentional")]

mod builtins;
mod cell;
mod dict;
mod equiv;
mod error;
mod eval;
mod heap;
mod limits;
mod native;
mod oblist;
mod port;
mod printer;
mod reader;
mod vm;

pub use crate::{
    cell::{CellFeatures, CellId, FEATURES, GcState, IMM_CAP, Tag},
    error::{ErrKind, LispError, RunResult},
    heap::{GcPhase, Heap, HeapDiff, HeapStats, HostObject},
    limits::{DEFAULT_MAX_CELLS, DEFAULT_MAX_DEPTH, Limits},
    native::NativeFn,
    port::{
        FileInputPort, FileOutputPort, Port, StdOutputPort, StdinPort, StringInputPort,
        StringOutputPort,
    },
    printer::{WriteMode, WriteOpts},
    vm::Vm,
};
