//! Banked register storage for the exception modes.
//!
//! Every exception mode owns a private R13/R14 pair so that taking an
//! exception cannot corrupt the interrupted code's stack pointer or return
//! address. FIQ additionally banks R8-R12, which is what makes it "fast":
//! the handler gets five scratch registers without saving anything.
//!
//! ```text
//! Register │ User/Sys │  FIQ   │  IRQ   │  SVC   │ Abort  │ Undef  │
//! ─────────┼──────────┼────────┼────────┼────────┼────────┼────────┤
//!   R8-R12 │  shared  │ banked │ shared │ shared │ shared │ shared │
//!   R13/R14│  `_old`  │ banked │ banked │ banked │ banked │ banked │
//!   SPSR   │   ---    │ banked │ banked │ banked │ banked │ banked │
//! ```
//!
//! The `_old` slots hold the User/System copies while another bank is
//! swapped in. `Arm7tdmi::swap_mode` moves values between this storage and
//! the visible [`Registers`](super::registers::Registers).

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;

#[derive(Default, Serialize, Deserialize)]
pub struct RegisterBank {
    // User/System copies, parked here while FIQ (r8-r12) or any exception
    // mode (r13-r14) has its own bank swapped in.
    pub r8_old: u32,
    pub r9_old: u32,
    pub r10_old: u32,
    pub r11_old: u32,
    pub r12_old: u32,
    pub r13_old: u32,
    pub r14_old: u32,

    pub r8_fiq: u32,
    pub r9_fiq: u32,
    pub r10_fiq: u32,
    pub r11_fiq: u32,
    pub r12_fiq: u32,
    pub r13_fiq: u32,
    pub r14_fiq: u32,

    pub r13_svc: u32,
    pub r14_svc: u32,

    pub r13_abt: u32,
    pub r14_abt: u32,

    pub r13_irq: u32,
    pub r14_irq: u32,

    pub r13_und: u32,
    pub r14_und: u32,

    pub spsr_fiq: Psr,
    pub spsr_svc: Psr,
    pub spsr_abt: Psr,
    pub spsr_irq: Psr,
    pub spsr_und: Psr,
}

impl RegisterBank {
    /// The R13/R14/SPSR storage backing a mode.
    ///
    /// User and System share the `_old` pair and carry no SPSR.
    pub(crate) fn slots(&mut self, mode: Mode) -> (&mut u32, &mut u32, Option<&mut Psr>) {
        match mode {
            Mode::User | Mode::System => (&mut self.r13_old, &mut self.r14_old, None),
            Mode::Fiq => (
                &mut self.r13_fiq,
                &mut self.r14_fiq,
                Some(&mut self.spsr_fiq),
            ),
            Mode::Supervisor => (
                &mut self.r13_svc,
                &mut self.r14_svc,
                Some(&mut self.spsr_svc),
            ),
            Mode::Abort => (
                &mut self.r13_abt,
                &mut self.r14_abt,
                Some(&mut self.spsr_abt),
            ),
            Mode::Irq => (
                &mut self.r13_irq,
                &mut self.r14_irq,
                Some(&mut self.spsr_irq),
            ),
            Mode::Undefined => (
                &mut self.r13_und,
                &mut self.r14_und,
                Some(&mut self.spsr_und),
            ),
        }
    }

    /// One of the two R8-R12 shadow sets: the FIQ bank, or the `_old`
    /// copies every other mode shares.
    pub(crate) fn high_bank(&mut self, fiq: bool) -> [&mut u32; 5] {
        if fiq {
            [
                &mut self.r8_fiq,
                &mut self.r9_fiq,
                &mut self.r10_fiq,
                &mut self.r11_fiq,
                &mut self.r12_fiq,
            ]
        } else {
            [
                &mut self.r8_old,
                &mut self.r9_old,
                &mut self.r10_old,
                &mut self.r11_old,
                &mut self.r12_old,
            ]
        }
    }
}
