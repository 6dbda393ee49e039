//! # satsuma emulation core
//!
//! GBA hardware emulation centered on the ARM7TDMI's Thumb execution
//! engine and the LCD register block. No UI code lives here.
//!
//! ## Module overview
//!
//! | Module  | Description                                          |
//! |---------|------------------------------------------------------|
//! | [`cpu`] | ARM7TDMI context, Thumb dispatch table and handlers  |
//! | [`bus`] | The memory bus contract the CPU drives               |
//! | [`ppu`] | Memory-mapped LCD registers                          |
//!
//! ## Quick start
//!
//! ```ignore
//! use emu::cpu::arm7tdmi::Arm7tdmi;
//!
//! let mut cpu = Arm7tdmi::new(Box::new(my_bus));
//! cpu.registers.set_program_counter(entry_point);
//! cpu.refill_pipeline();
//! loop { cpu.step(); }
//! ```
//!
//! The bus, DMA engines, rasterizer, cartridge and frontend are external
//! collaborators: the CPU consumes the [`bus::Bus`] trait and the
//! rasterizer reads [`ppu::LcdRegisters`] between instructions.

#[allow(clippy::cast_possible_truncation)]
mod bitwise;

pub mod bus;
pub mod cpu;
pub mod ppu;
