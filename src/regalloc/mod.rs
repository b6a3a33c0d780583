//! Linear-scan register allocation (§4.8), grounded in the same
//! unhandled/active/inactive/handled structure as a from-scratch linear
//! scan implementation, adapted to this crate's `Value`-indexed live ranges
//! instead of a pre-computed fragment/range-index table.

mod lsra;
mod regmask;
mod vreg;

pub(crate) use lsra::{allocate, rename_to_vregs, LsraResult};
pub(crate) use regmask::{PhysReg, RegClass, RegMask, CLASS_FLOAT, CLASS_INT};
pub(crate) use vreg::{LiveRange, VReg};
