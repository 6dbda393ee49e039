//! The ARM7TDMI CPU context.
//!
//! [`Arm7tdmi`] ties together the visible register file, the banked
//! registers, the status registers and the prefetch pipeline, and drives
//! instruction execution against the external [`Bus`].
//!
//! ## Pipeline discipline
//!
//! The three pipeline primitives live here because they need both the bus
//! and R15:
//!
//! - `prefetch_thumb` fetches the next opcode into the slot vacated by the
//!   executing one,
//! - `advance_pc_thumb` rotates the pipeline and moves R15 to the next
//!   halfword,
//! - `refill_thumb` / `refill_arm` restart the pipeline after a branch,
//!   leaving R15 two instructions ahead again.
//!
//! Handlers call exactly one prefetch and then either advance or refill.

use logger::log;

use crate::bus::{Bus, MemoryAccess};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::pipeline::Pipeline;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::Registers;
use crate::cpu::thumb::dispatch::THUMB_LUT;

pub struct Arm7tdmi {
    pub bus: Box<dyn Bus>,

    pub cpsr: Psr,
    pub spsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,
    pub pipeline: Pipeline,

    /// When set, SWI is serviced by the registered hook instead of entering
    /// Supervisor mode at the exception vector.
    pub fake_swi: bool,
    swi_hook: Option<Box<dyn FnMut(u8)>>,
}

impl Arm7tdmi {
    pub fn new(bus: Box<dyn Bus>) -> Self {
        let mut cpsr = Psr::from(Mode::Supervisor);
        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);

        Self {
            bus,
            cpsr,
            spsr: Psr::default(),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            pipeline: Pipeline::default(),
            fake_swi: false,
            swi_hook: None,
        }
    }

    /// Register the high-level SWI handler used when `fake_swi` is set.
    pub fn set_swi_hook(&mut self, hook: impl FnMut(u8) + 'static) {
        self.swi_hook = Some(Box::new(hook));
    }

    pub(crate) fn dispatch_swi(&mut self, comment: u8) {
        if let Some(hook) = self.swi_hook.as_mut() {
            hook(comment);
        }
    }

    /// Execute the instruction the pipeline points at.
    ///
    /// Only Thumb state is dispatched here. BX and SWI legitimately leave
    /// the CPU in ARM state; stepping then is a no-op so the embedding
    /// loop can hand control to the 32-bit decoder, which owns that half
    /// of the instruction set.
    pub fn step(&mut self) {
        match self.cpsr.cpu_state() {
            CpuState::Thumb => {
                let opcode = self.pipeline.current() as u16;
                let executing = self.registers.program_counter().wrapping_sub(4);
                log(format!("{executing:#010X}: {opcode:#06X}"));

                self.execute_thumb(opcode);
            }
            CpuState::Arm => {
                tracing::debug!("step in ARM state ignored; the 32-bit decoder drives it");
            }
        }
    }

    /// Look up and run the handler for a 16-bit opcode.
    pub fn execute_thumb(&mut self, opcode: u16) {
        THUMB_LUT[usize::from(opcode >> 6)](self, opcode);
    }

    /// Restart the pipeline at the current R15, e.g. after the frontend
    /// placed the entry point there.
    pub fn refill_pipeline(&mut self) {
        match self.cpsr.cpu_state() {
            CpuState::Thumb => self.refill_thumb(),
            CpuState::Arm => self.refill_arm(),
        }
    }

    pub(crate) fn prefetch_thumb(&mut self, access: MemoryAccess) {
        let slot = self.pipeline.fetch_slot();
        let opcode = self
            .bus
            .read16(self.registers.program_counter(), access);
        self.pipeline.set_slot(slot, opcode);
    }

    pub(crate) fn advance_pc_thumb(&mut self) {
        self.pipeline.rotate();
        let pc = self.registers.program_counter();
        self.registers.set_program_counter(pc.wrapping_add(2));
    }

    pub(crate) fn refill_thumb(&mut self) {
        let pc = self.registers.program_counter();
        let first = self.bus.read16(pc, MemoryAccess::NONSEQ);
        let second = self.bus.read16(pc.wrapping_add(2), MemoryAccess::SEQ);

        self.pipeline.restart(first, second);
        self.registers.set_program_counter(pc.wrapping_add(4));
    }

    pub(crate) fn refill_arm(&mut self) {
        let pc = self.registers.program_counter();
        let first = self.bus.read32(pc, MemoryAccess::NONSEQ);
        let second = self.bus.read32(pc.wrapping_add(4), MemoryAccess::SEQ);

        self.pipeline.restart(first, second);
        self.registers.set_program_counter(pc.wrapping_add(8));
    }

    /// Switch operating mode, swapping the banked registers in and out.
    ///
    /// The visible R13/R14 (and SPSR, for exception modes) are parked in
    /// the departing mode's slots and the arriving mode's slots become
    /// visible. Crossing the FIQ boundary additionally trades R8-R12
    /// against their shadow set.
    pub fn swap_mode(&mut self, new_mode: Mode) {
        let old_mode = self.cpsr.mode();
        if old_mode == new_mode {
            return;
        }

        // R8-R12 only move when FIQ is entered or left. The visible set
        // goes into the departing side's bank; the other side's set
        // becomes visible.
        if (old_mode == Mode::Fiq) != (new_mode == Mode::Fiq) {
            for (reg, slot) in (8..).zip(self.register_bank.high_bank(old_mode == Mode::Fiq)) {
                *slot = self.registers.register_at(reg);
            }
            for (reg, slot) in (8..).zip(self.register_bank.high_bank(new_mode == Mode::Fiq)) {
                self.registers.set_register_at(reg, *slot);
            }
        }

        let departing = (
            self.registers.register_at(13),
            self.registers.register_at(14),
        );
        let (r13, r14, saved) = self.register_bank.slots(old_mode);
        *r13 = departing.0;
        *r14 = departing.1;
        if let Some(slot) = saved {
            *slot = self.spsr;
        }

        let (r13, r14, saved) = self.register_bank.slots(new_mode);
        let arriving = (*r13, *r14, saved.map(|slot| *slot));
        self.registers.set_register_at(13, arriving.0);
        self.registers.set_register_at(14, arriving.1);
        if let Some(psr) = arriving.2 {
            self.spsr = psr;
        }

        self.cpsr.set_mode(new_mode);
    }
}
