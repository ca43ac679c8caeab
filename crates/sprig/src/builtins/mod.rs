//! The base native library, grouped by family. Each module exposes an
//! `install` that registers its procedures into a target environment;
//! [`install_all`] is what VM setup calls on the base environment.

pub(crate) mod arith;
pub(crate) mod control;
pub(crate) mod io;
pub(crate) mod lists;
pub(crate) mod predicates;
pub(crate) mod strings;
pub(crate) mod vectors;

use crate::{cell::CellId, error::RunResult, vm::Vm};

pub(crate) fn install_all(vm: &mut Vm, env: CellId) -> RunResult<()> {
    arith::install(vm, env)?;
    lists::install(vm, env)?;
    predicates::install(vm, env)?;
    strings::install(vm, env)?;
    vectors::install(vm, env)?;
    control::install(vm, env)?;
    io::install(vm, env)?;
    Ok(())
}
