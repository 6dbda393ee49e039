//! The visible register file.
//!
//! Sixteen 32-bit registers are visible at any time. R13 is the stack
//! pointer by convention, R14 the link register, R15 the program counter.
//! Which physical register backs R8-R14 depends on the operating mode; the
//! swap happens in `Arm7tdmi::swap_mode`, this struct only holds what is
//! currently visible.
//!
//! Because of the 3-stage pipeline, R15 reads two instructions ahead of the
//! one being executed: +4 in Thumb state, +8 in ARM state.

use serde::{Deserialize, Serialize};

/// Stack pointer register index.
pub const REG_SP: usize = 13;

/// Link register index (subroutine return address).
pub const REG_LR: usize = 14;

/// Program counter register index.
pub const REG_PC: usize = 15;

#[derive(Default, Serialize, Deserialize)]
pub struct Registers([u32; 16]);

impl Registers {
    pub const fn program_counter(&self) -> u32 {
        self.0[REG_PC]
    }

    pub const fn set_program_counter(&mut self, value: u32) {
        self.0[REG_PC] = value;
    }

    pub const fn register_at(&self, reg: usize) -> u32 {
        self.0[reg]
    }

    pub fn set_register_at(&mut self, reg: usize, value: u32) {
        assert!(reg <= REG_PC, "invalid register index: {reg}");
        self.0[reg] = value;
    }
}
