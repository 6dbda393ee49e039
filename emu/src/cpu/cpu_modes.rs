//! ARM7TDMI operating modes.
//!
//! Seven modes share the visible register file; exception modes see their
//! own banked R13/R14 (and R8-R12 for FIQ), see
//! [`register_bank`](super::register_bank). The mode lives in bits 4-0 of
//! the CPSR:
//!
//! | Mode       | Bits    | Entered by                         |
//! |------------|---------|------------------------------------|
//! | User       | `10000` | normal execution (unprivileged)    |
//! | FIQ        | `10001` | fast interrupt                     |
//! | IRQ        | `10010` | VBlank/HBlank/timer/DMA interrupts |
//! | Supervisor | `10011` | reset, SWI                         |
//! | Abort      | `10111` | failed memory access               |
//! | Undefined  | `11011` | unrecognized instruction           |
//! | System     | `11111` | privileged, shares User registers  |

use serde::{Deserialize, Serialize};

/// The CPU operating mode, as encoded in CPSR bits 4-0.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Mode {
    /// Normal program execution (unprivileged).
    User = 0b10000,

    /// Fast interrupt handling; banks R8-R14.
    Fiq = 0b10001,

    /// General interrupt handling.
    Irq = 0b10010,

    /// Privileged mode for reset and software interrupts. The BIOS runs
    /// SWI handlers here.
    Supervisor = 0b10011,

    /// Entered after a failed instruction fetch or data access.
    Abort = 0b10111,

    /// Entered on an unrecognized instruction.
    Undefined = 0b11011,

    /// Privileged mode that shares the User register bank.
    System = 0b11111,
}

impl From<Mode> for u32 {
    fn from(mode: Mode) -> Self {
        mode as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(format!("invalid mode bits {value:#07b}")),
        }
    }
}
