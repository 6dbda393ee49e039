//! Program Status Registers (CPSR and SPSR).
//!
//! ```text
//! 31 30 29 28          8 7 6 5 4   0
//! ┌──┬──┬──┬──┬──────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │ Reserved │I│F│T│Mode │
//! └──┴──┴──┴──┴──────────┴─┴─┴─┴─────┘
//! ```
//!
//! - flags N/Z/C/V (bits 31-28) are tested by [`Condition`] codes,
//! - I/F (bits 7-6) disable IRQ/FIQ when set,
//! - T (bit 5) selects Thumb state,
//! - bits 4-0 hold the operating [`Mode`].
//!
//! Each exception mode keeps a SPSR copy of the CPSR taken on entry; see
//! [`register_bank`](super::register_bank).

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::alu::ArithmeticOpResult;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;

/// A CPSR or SPSR value with typed accessors for each field.
#[derive(Default, Clone, Copy, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    /// Evaluate a condition code against the current flags.
    pub(crate) fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match cond {
            EQ => self.zero_flag(),
            NE => !self.zero_flag(),
            CS => self.carry_flag(),
            CC => !self.carry_flag(),
            MI => self.sign_flag(),
            PL => !self.sign_flag(),
            VS => self.overflow_flag(),
            VC => !self.overflow_flag(),
            HI => self.carry_flag() && !self.zero_flag(),
            LS => !self.carry_flag() || self.zero_flag(),
            GE => self.sign_flag() == self.overflow_flag(),
            LT => self.sign_flag() != self.overflow_flag(),
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()),
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()),
            AL => true,
            NV => false,
        }
    }

    /// N, bit 31.
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.0.get_bit(31)
    }

    /// Z, bit 30.
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.0.get_bit(30)
    }

    /// C, bit 29. On subtraction, set means "no borrow".
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.0.get_bit(29)
    }

    /// V, bit 28.
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.0.get_bit(28)
    }

    /// I, bit 7 (1 = IRQ disabled).
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// F, bit 6 (1 = FIQ disabled).
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.0.get_bit(6)
    }

    /// T, bit 5 (1 = Thumb state).
    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(5)
    }

    /// Operating mode from bits 4-0.
    ///
    /// The BIOS occasionally writes invalid mode patterns to a SPSR; those
    /// decode to Supervisor rather than bringing the emulator down.
    #[must_use]
    pub fn mode(self) -> Mode {
        let mode_bits = self.0.get_bits(0..=4);
        Mode::try_from(mode_bits).unwrap_or_else(|_| {
            tracing::debug!(
                "invalid mode bits {mode_bits:#07b} in PSR {:#010X}, defaulting to Supervisor",
                self.0
            );
            Mode::Supervisor
        })
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    /// Latch all four flags from an ALU result.
    pub fn set_flags(&mut self, outcome: &ArithmeticOpResult) {
        self.set_sign_flag(outcome.sign);
        self.set_zero_flag(outcome.zero);
        self.set_carry_flag(outcome.carry);
        self.set_overflow_flag(outcome.overflow);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.0.set_bit(6, value);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.0 = (self.0 & !0b11111) | mode as u32;
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        if self.state_bit() {
            CpuState::Thumb
        } else {
            CpuState::Arm
        }
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.0.set_bit(5, matches!(state, CpuState::Thumb));
    }
}

impl From<Mode> for Psr {
    fn from(mode: Mode) -> Self {
        let mut psr = Self(0);
        psr.set_mode(mode);
        psr
    }
}

impl From<Psr> for u32 {
    fn from(psr: Psr) -> Self {
        psr.0
    }
}

/// The CPU execution state, selected by the T bit. `BX` switches it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CpuState {
    /// 16-bit instructions, see the `thumb` module.
    Thumb,
    /// 32-bit instructions; decoded outside this crate.
    Arm,
}
