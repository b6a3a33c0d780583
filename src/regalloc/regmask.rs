//! Register classes and masks (§3 "RegMask"). A target's `constraint`
//! implementation hands LSRA one of these per live range; everything in this
//! module is backend-agnostic bit twiddling over whatever class/width the
//! target declares.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RegClass(pub(crate) u8);

pub(crate) const CLASS_INT: RegClass = RegClass(0);
pub(crate) const CLASS_FLOAT: RegClass = RegClass(1);
/// Pseudo-class for the stack slots LSRA hands out to spilled values; never
/// passed to `Target::constraint`, never competes with a real register class.
pub(crate) const CLASS_STK: RegClass = RegClass(2);
/// First stack-slot index, offset well past any plausible hardware register
/// count so a `PhysReg` in `CLASS_STK` is visibly not a machine register when
/// printed.
pub(crate) const STACK_BASE: u8 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PhysReg(pub(crate) u8);

/// `may_spill = false` marks a constraint that must be satisfied even after
/// every spill/restart round runs out — e.g. a hardware-fixed argument or
/// return register. LSRA treats such a range as a "fixed interval" per §9.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RegMask {
    pub(crate) class: RegClass,
    pub(crate) bits: u64,
    pub(crate) may_spill: bool,
}

impl RegMask {
    pub(crate) fn any(class: RegClass, num_regs: u32) -> Self {
        let bits = if num_regs >= 64 {
            u64::MAX
        } else {
            (1u64 << num_regs) - 1
        };
        RegMask {
            class,
            bits,
            may_spill: true,
        }
    }

    pub(crate) fn fixed(class: RegClass, reg: PhysReg) -> Self {
        RegMask {
            class,
            bits: 1u64 << reg.0,
            may_spill: false,
        }
    }

    pub(crate) fn contains(&self, reg: PhysReg) -> bool {
        self.bits & (1u64 << reg.0) != 0
    }

    pub(crate) fn intersect(&self, other: &RegMask) -> RegMask {
        debug_assert_eq!(self.class, other.class, "intersecting masks of different classes");
        RegMask {
            class: self.class,
            bits: self.bits & other.bits,
            may_spill: self.may_spill && other.may_spill,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = PhysReg> + '_ {
        (0..64).filter(move |&b| self.bits & (1u64 << b) != 0).map(|b| PhysReg(b as u8))
    }
}
