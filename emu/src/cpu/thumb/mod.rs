//! The Thumb (16-bit) instruction set.
//!
//! [`dispatch`] maps the top 10 bits of an opcode to one of the 19 format
//! handlers; [`operations`] implements the handlers as methods on the CPU.

pub mod alu_instructions;
pub mod dispatch;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod operations;
