//! The 19 Thumb format handlers.
//!
//! Every handler follows the same contract: decode the fields it needs from
//! the opcode, issue exactly one prefetch, perform its work against the CPU
//! context and the bus, then either advance the program counter or refill
//! the pipeline (never both). Memory accesses happen in source order and
//! carry the sequential/non-sequential flags the cycle accounting depends
//! on.

use crate::bitwise::Bits;
use crate::bus::MemoryAccess;
use crate::cpu::alu::{self, ShiftKind, ShiftOutput};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::CpuState;
use crate::cpu::registers::{REG_LR, REG_PC, REG_SP};
use crate::cpu::thumb::alu_instructions::{HiRegisterOp, ThumbAluOp};

/// SWI exception vector.
const SWI_VECTOR: u32 = 0x08;

impl Arm7tdmi {
    fn set_logical_result(&mut self, rd: usize, value: u32) {
        self.registers.set_register_at(rd, value);
        self.cpsr.set_sign_flag(value.get_bit(31));
        self.cpsr.set_zero_flag(value == 0);
    }

    fn set_shift_result(&mut self, rd: usize, out: ShiftOutput) {
        self.registers.set_register_at(rd, out.value);
        self.cpsr.set_carry_flag(out.carry);
        self.cpsr.set_sign_flag(out.value.get_bit(31));
        self.cpsr.set_zero_flag(out.value == 0);
    }

    /// Format 1: `LSL/LSR/ASR Rd, Rs, #imm5`.
    pub(crate) fn move_shifted_register(&mut self, opcode: u16) {
        let rd = usize::from(opcode & 7);
        let rs = usize::from((opcode >> 3) & 7);
        let amount = u32::from(opcode.get_bits(6..=10));
        let kind = ShiftKind::from((opcode >> 11) & 3);

        self.prefetch_thumb(MemoryAccess::SEQ);

        let out = alu::shift_by_immediate(
            kind,
            self.registers.register_at(rs),
            amount,
            self.cpsr.carry_flag(),
        );
        self.set_shift_result(rd, out);

        self.advance_pc_thumb();
    }

    /// Format 2: `ADD/SUB Rd, Rs, Rn` or `ADD/SUB Rd, Rs, #imm3`.
    pub(crate) fn add_subtract(&mut self, opcode: u16) {
        let rd = usize::from(opcode & 7);
        let rs = usize::from((opcode >> 3) & 7);
        let field = (opcode >> 6) & 7;
        let immediate = opcode.get_bit(10);
        let subtract = opcode.get_bit(9);

        self.prefetch_thumb(MemoryAccess::SEQ);

        let operand = if immediate {
            u32::from(field)
        } else {
            self.registers.register_at(usize::from(field))
        };
        let lhs = self.registers.register_at(rs);

        let outcome = if subtract {
            alu::sub(lhs, operand)
        } else {
            alu::add(lhs, operand)
        };
        self.registers.set_register_at(rd, outcome.result);
        self.cpsr.set_flags(&outcome);

        self.advance_pc_thumb();
    }

    /// Format 3: `MOV/CMP/ADD/SUB Rd, #imm8`.
    pub(crate) fn move_compare_add_sub_imm(&mut self, opcode: u16) {
        let imm = u32::from(opcode & 0xFF);
        let rd = usize::from((opcode >> 8) & 7);

        self.prefetch_thumb(MemoryAccess::SEQ);

        let lhs = self.registers.register_at(rd);
        match (opcode >> 11) & 3 {
            // MOV only touches N and Z; it must not fall through to the
            // arithmetic flag update below.
            0b00 => {
                self.registers.set_register_at(rd, imm);
                self.cpsr.set_sign_flag(false);
                self.cpsr.set_zero_flag(imm == 0);

                self.advance_pc_thumb();
                return;
            }
            0b01 => {
                let outcome = alu::sub(lhs, imm);
                self.cpsr.set_flags(&outcome);
            }
            0b10 => {
                let outcome = alu::add(lhs, imm);
                self.registers.set_register_at(rd, outcome.result);
                self.cpsr.set_flags(&outcome);
            }
            _ => {
                let outcome = alu::sub(lhs, imm);
                self.registers.set_register_at(rd, outcome.result);
                self.cpsr.set_flags(&outcome);
            }
        }

        self.advance_pc_thumb();
    }

    /// Format 4: the sixteen register-to-register ALU operations.
    pub(crate) fn alu_operation(&mut self, opcode: u16) {
        let rd = usize::from(opcode & 7);
        let rs = usize::from((opcode >> 3) & 7);
        let op = ThumbAluOp::from((opcode >> 6) & 0xF);

        self.prefetch_thumb(MemoryAccess::SEQ);

        let lhs = self.registers.register_at(rd);
        let rhs = self.registers.register_at(rs);
        let carry = self.cpsr.carry_flag();

        match op {
            ThumbAluOp::And => self.set_logical_result(rd, lhs & rhs),
            ThumbAluOp::Eor => self.set_logical_result(rd, lhs ^ rhs),
            ThumbAluOp::Lsl => {
                let out = alu::shift_by_register(ShiftKind::Lsl, lhs, rhs, carry);
                self.set_shift_result(rd, out);
            }
            ThumbAluOp::Lsr => {
                let out = alu::shift_by_register(ShiftKind::Lsr, lhs, rhs, carry);
                self.set_shift_result(rd, out);
            }
            ThumbAluOp::Asr => {
                let out = alu::shift_by_register(ShiftKind::Asr, lhs, rhs, carry);
                self.set_shift_result(rd, out);
            }
            ThumbAluOp::Adc => {
                let outcome = alu::adc(lhs, rhs, carry);
                self.registers.set_register_at(rd, outcome.result);
                self.cpsr.set_flags(&outcome);
            }
            ThumbAluOp::Sbc => {
                let outcome = alu::sbc(lhs, rhs, carry);
                self.registers.set_register_at(rd, outcome.result);
                self.cpsr.set_flags(&outcome);
            }
            ThumbAluOp::Ror => {
                let out = alu::shift_by_register(ShiftKind::Ror, lhs, rhs, carry);
                self.set_shift_result(rd, out);
            }
            ThumbAluOp::Tst => {
                let value = lhs & rhs;
                self.cpsr.set_sign_flag(value.get_bit(31));
                self.cpsr.set_zero_flag(value == 0);
            }
            ThumbAluOp::Neg => {
                let outcome = alu::sub(0, rhs);
                self.registers.set_register_at(rd, outcome.result);
                self.cpsr.set_flags(&outcome);
            }
            ThumbAluOp::Cmp => {
                let outcome = alu::sub(lhs, rhs);
                self.cpsr.set_flags(&outcome);
            }
            ThumbAluOp::Cmn => {
                let outcome = alu::add(lhs, rhs);
                self.cpsr.set_flags(&outcome);
            }
            ThumbAluOp::Orr => self.set_logical_result(rd, lhs | rhs),
            ThumbAluOp::Mul => {
                // Timing is approximated with a single internal cycle
                // instead of scaling with the multiplier magnitude.
                self.bus.internal_cycles(1);

                let value = lhs.wrapping_mul(rhs);
                self.registers.set_register_at(rd, value);
                self.cpsr.set_sign_flag(value.get_bit(31));
                self.cpsr.set_zero_flag(value == 0);
                // Hardware leaves carry unpredictable here; it is pinned
                // to cleared.
                self.cpsr.set_carry_flag(false);
            }
            ThumbAluOp::Bic => self.set_logical_result(rd, lhs & !rhs),
            ThumbAluOp::Mvn => self.set_logical_result(rd, !rhs),
        }

        self.advance_pc_thumb();
    }

    /// Format 5: `ADD/CMP/MOV` with high registers, and `BX`.
    pub(crate) fn hi_register_op_or_bx(&mut self, opcode: u16) {
        let mut rd = usize::from(opcode & 7);
        let mut rs = usize::from((opcode >> 3) & 7);
        let op = HiRegisterOp::from((opcode >> 8) & 3);

        self.prefetch_thumb(MemoryAccess::SEQ);

        if opcode.get_bit(7) {
            rd += 8;
        }
        if opcode.get_bit(6) {
            rs += 8;
        }

        let mut operand = self.registers.register_at(rs);
        if rs == REG_PC {
            operand &= !1;
        }

        match op {
            HiRegisterOp::Add => {
                let value = self.registers.register_at(rd).wrapping_add(operand);
                self.registers.set_register_at(rd, value);
            }
            HiRegisterOp::Cmp => {
                // CMP never writes back, so a PC destination cannot branch.
                let outcome = alu::sub(self.registers.register_at(rd), operand);
                self.cpsr.set_flags(&outcome);

                self.advance_pc_thumb();
                return;
            }
            HiRegisterOp::Mov => {
                self.registers.set_register_at(rd, operand);
            }
            HiRegisterOp::Bx => {
                if operand & 1 != 0 {
                    self.registers.set_program_counter(operand & !1);
                    self.refill_thumb();
                } else {
                    self.cpsr.set_cpu_state(CpuState::Arm);
                    self.registers.set_program_counter(operand & !3);
                    self.refill_arm();
                }
                return;
            }
        }

        if rd == REG_PC {
            let value = self.registers.program_counter() & !1;
            self.registers.set_program_counter(value);
            self.refill_thumb();
            return;
        }

        self.advance_pc_thumb();
    }

    /// Format 6: `LDR Rd, [PC, #imm8 << 2]`.
    pub(crate) fn pc_relative_load(&mut self, opcode: u16) {
        let rd = usize::from((opcode >> 8) & 7);
        let imm = u32::from(opcode & 0xFF) << 2;
        let address = (self.registers.program_counter() & !2).wrapping_add(imm);

        self.prefetch_thumb(MemoryAccess::NONSEQ);
        self.bus.internal_cycles(1);

        let value = self
            .bus
            .read32(address, MemoryAccess::NONSEQ | MemoryAccess::ROTATE);
        self.registers.set_register_at(rd, value);

        self.advance_pc_thumb();
    }

    /// Format 7: `STR/STRB/LDR/LDRB Rd, [Rb, Ro]`.
    pub(crate) fn load_store_register_offset(&mut self, opcode: u16) {
        let rd = usize::from(opcode & 7);
        let rb = usize::from((opcode >> 3) & 7);
        let ro = usize::from((opcode >> 6) & 7);
        let address = self
            .registers
            .register_at(rb)
            .wrapping_add(self.registers.register_at(ro));

        self.prefetch_thumb(MemoryAccess::NONSEQ);

        match (opcode >> 10) & 3 {
            0b00 => {
                let value = self.registers.register_at(rd);
                self.bus.write32(address, value, MemoryAccess::NONSEQ);
            }
            0b01 => {
                let value = self.registers.register_at(rd) as u8;
                self.bus.write8(address, value, MemoryAccess::NONSEQ);
            }
            0b10 => {
                self.bus.internal_cycles(1);
                let value = self
                    .bus
                    .read32(address, MemoryAccess::NONSEQ | MemoryAccess::ROTATE);
                self.registers.set_register_at(rd, value);
            }
            _ => {
                self.bus.internal_cycles(1);
                let value = self.bus.read8(address, MemoryAccess::NONSEQ);
                self.registers.set_register_at(rd, value);
            }
        }

        self.advance_pc_thumb();
    }

    /// Format 8: `STRH/LDSB/LDRH/LDSH Rd, [Rb, Ro]`.
    pub(crate) fn load_store_sign_extended(&mut self, opcode: u16) {
        let rd = usize::from(opcode & 7);
        let rb = usize::from((opcode >> 3) & 7);
        let ro = usize::from((opcode >> 6) & 7);
        let address = self
            .registers
            .register_at(rb)
            .wrapping_add(self.registers.register_at(ro));

        self.prefetch_thumb(MemoryAccess::NONSEQ);

        match (opcode >> 10) & 3 {
            0b00 => {
                let value = self.registers.register_at(rd) as u16;
                self.bus.write16(address, value, MemoryAccess::NONSEQ);
            }
            0b01 => {
                self.bus.internal_cycles(1);
                let value = self
                    .bus
                    .read8(address, MemoryAccess::NONSEQ | MemoryAccess::SIGNED);
                self.registers.set_register_at(rd, value);
            }
            0b10 => {
                self.bus.internal_cycles(1);
                let value = self
                    .bus
                    .read16(address, MemoryAccess::NONSEQ | MemoryAccess::ROTATE);
                self.registers.set_register_at(rd, value);
            }
            _ => {
                self.bus.internal_cycles(1);
                let value = self
                    .bus
                    .read16(address, MemoryAccess::NONSEQ | MemoryAccess::SIGNED);
                self.registers.set_register_at(rd, value);
            }
        }

        self.advance_pc_thumb();
    }

    /// Format 9: `STR/LDR/STRB/LDRB Rd, [Rb, #imm5]`.
    ///
    /// Word offsets are `imm5 << 2`; byte offsets use the raw field.
    pub(crate) fn load_store_immediate_offset(&mut self, opcode: u16) {
        let rd = usize::from(opcode & 7);
        let rb = usize::from((opcode >> 3) & 7);
        let imm = u32::from((opcode >> 6) & 0x1F);
        let base = self.registers.register_at(rb);

        self.prefetch_thumb(MemoryAccess::NONSEQ);

        match (opcode >> 11) & 3 {
            0b00 => {
                let value = self.registers.register_at(rd);
                self.bus
                    .write32(base.wrapping_add(imm << 2), value, MemoryAccess::NONSEQ);
            }
            0b01 => {
                self.bus.internal_cycles(1);
                let value = self.bus.read32(
                    base.wrapping_add(imm << 2),
                    MemoryAccess::NONSEQ | MemoryAccess::ROTATE,
                );
                self.registers.set_register_at(rd, value);
            }
            0b10 => {
                let value = self.registers.register_at(rd) as u8;
                self.bus
                    .write8(base.wrapping_add(imm), value, MemoryAccess::NONSEQ);
            }
            _ => {
                self.bus.internal_cycles(1);
                let value = self
                    .bus
                    .read8(base.wrapping_add(imm), MemoryAccess::NONSEQ);
                self.registers.set_register_at(rd, value);
            }
        }

        self.advance_pc_thumb();
    }

    /// Format 10: `STRH/LDRH Rd, [Rb, #imm5 << 1]`.
    pub(crate) fn load_store_halfword(&mut self, opcode: u16) {
        let rd = usize::from(opcode & 7);
        let rb = usize::from((opcode >> 3) & 7);
        let imm = u32::from((opcode >> 6) & 0x1F) << 1;
        let address = self.registers.register_at(rb).wrapping_add(imm);

        self.prefetch_thumb(MemoryAccess::NONSEQ);

        if opcode.get_bit(11) {
            self.bus.internal_cycles(1);
            let value = self
                .bus
                .read16(address, MemoryAccess::NONSEQ | MemoryAccess::ROTATE);
            self.registers.set_register_at(rd, value);
        } else {
            let value = self.registers.register_at(rd) as u16;
            self.bus.write16(address, value, MemoryAccess::NONSEQ);
        }

        self.advance_pc_thumb();
    }

    /// Format 11: `STR/LDR Rd, [SP, #imm8 << 2]`.
    ///
    /// Unlike the other load/store formats the prefetch happens after the
    /// data access here; the bus sees the transactions in that order.
    pub(crate) fn sp_relative_load_store(&mut self, opcode: u16) {
        let rd = usize::from((opcode >> 8) & 7);
        let imm = u32::from(opcode & 0xFF) << 2;
        let address = self.registers.register_at(REG_SP).wrapping_add(imm);

        if opcode.get_bit(11) {
            self.bus.internal_cycles(1);
            let value = self
                .bus
                .read32(address, MemoryAccess::NONSEQ | MemoryAccess::ROTATE);
            self.registers.set_register_at(rd, value);
            self.prefetch_thumb(MemoryAccess::NONSEQ);
        } else {
            let value = self.registers.register_at(rd);
            self.bus.write32(address, value, MemoryAccess::NONSEQ);
            self.prefetch_thumb(MemoryAccess::NONSEQ);
        }

        self.advance_pc_thumb();
    }

    /// Format 12: `ADD Rd, PC/SP, #imm8 << 2`.
    pub(crate) fn load_address(&mut self, opcode: u16) {
        let rd = usize::from((opcode >> 8) & 7);
        let imm = u32::from(opcode & 0xFF) << 2;

        self.prefetch_thumb(MemoryAccess::SEQ);

        let base = if opcode.get_bit(11) {
            self.registers.register_at(REG_SP)
        } else {
            self.registers.program_counter() & !2
        };
        self.registers.set_register_at(rd, base.wrapping_add(imm));

        self.advance_pc_thumb();
    }

    /// Format 13: `ADD SP, #±imm7 << 2`.
    pub(crate) fn add_offset_to_sp(&mut self, opcode: u16) {
        let imm = u32::from(opcode & 0x7F) << 2;

        self.prefetch_thumb(MemoryAccess::SEQ);

        let sp = self.registers.register_at(REG_SP);
        let sp = if opcode.get_bit(7) {
            sp.wrapping_sub(imm)
        } else {
            sp.wrapping_add(imm)
        };
        self.registers.set_register_at(REG_SP, sp);

        self.advance_pc_thumb();
    }

    /// Format 14: `PUSH {Rlist, LR}` / `POP {Rlist, PC}`.
    pub(crate) fn push_pop_registers(&mut self, opcode: u16) {
        let pop = opcode.get_bit(11);
        let store_extra = opcode.get_bit(8);
        let list = opcode & 0xFF;
        let mut address = self.registers.register_at(REG_SP);

        self.prefetch_thumb(MemoryAccess::SEQ);

        // An empty register list is not modeled; hardware would transfer
        // R15 alone and move SP by 0x40.

        if !pop {
            let count = u32::from(list.count_ones()) + u32::from(store_extra);
            address = address.wrapping_sub(count << 2);
            self.registers.set_register_at(REG_SP, address);
        }

        for reg in 0..8 {
            if list & (1 << reg) != 0 {
                if pop {
                    let value = self.bus.read32(address, MemoryAccess::NONE);
                    self.registers.set_register_at(reg, value);
                } else {
                    let value = self.registers.register_at(reg);
                    self.bus.write32(address, value, MemoryAccess::NONE);
                }
                address = address.wrapping_add(4);
            }
        }

        if store_extra {
            if pop {
                let value = self.bus.read32(address, MemoryAccess::NONE) & !1;
                self.registers.set_program_counter(value);
                self.refill_thumb();
                self.registers
                    .set_register_at(REG_SP, address.wrapping_add(4));
                return;
            }

            let value = self.registers.register_at(REG_LR);
            self.bus.write32(address, value, MemoryAccess::NONE);
            address = address.wrapping_add(4);
        }

        if pop {
            self.registers.set_register_at(REG_SP, address);
        }

        self.advance_pc_thumb();
    }

    /// Format 15: `STMIA/LDMIA Rb!, {Rlist}`.
    pub(crate) fn multiple_load_store(&mut self, opcode: u16) {
        let base = usize::from((opcode >> 8) & 7);
        let list = opcode & 0xFF;

        // An empty register list is not modeled, same as push/pop.

        if opcode.get_bit(11) {
            self.prefetch_thumb(MemoryAccess::SEQ);

            let mut address = self.registers.register_at(base);
            for reg in 0..8 {
                if list & (1 << reg) != 0 {
                    let value = self.bus.read32(address, MemoryAccess::NONE);
                    self.registers.set_register_at(reg, value);
                    address = address.wrapping_add(4);
                }
            }

            // A loaded base overrides the write-back.
            if list & (1 << base) == 0 {
                self.registers.set_register_at(base, address);
            }
        } else {
            self.prefetch_thumb(MemoryAccess::NONSEQ);

            let initial_base = self.registers.register_at(base);
            let mut first = true;
            for reg in 0..8 {
                if list & (1 << reg) != 0 {
                    let access = if first {
                        MemoryAccess::NONSEQ
                    } else {
                        MemoryAccess::SEQ
                    };
                    // If the base is the first register stored, its original
                    // value goes to memory; later list positions see the
                    // incremented base.
                    let value = if first && reg == base {
                        initial_base
                    } else {
                        self.registers.register_at(reg)
                    };

                    let address = self.registers.register_at(base);
                    self.bus.write32(address, value, access);
                    self.registers
                        .set_register_at(base, address.wrapping_add(4));
                    first = false;
                }
            }
        }

        self.advance_pc_thumb();
    }

    /// Format 16: conditional branch. Condition 15 never reaches this
    /// handler; the table routes it to the software interrupt.
    pub(crate) fn conditional_branch(&mut self, opcode: u16) {
        let condition = Condition::from(((opcode >> 8) & 0xF) as u8);

        self.prefetch_thumb(MemoryAccess::SEQ);

        if self.cpsr.can_execute(condition) {
            let offset = i32::from((opcode & 0xFF) as u8 as i8) << 1;
            let pc = self
                .registers
                .program_counter()
                .wrapping_add(offset as u32);
            self.registers.set_program_counter(pc);
            self.refill_thumb();
        } else {
            self.advance_pc_thumb();
        }
    }

    /// Format 17: software interrupt.
    pub(crate) fn software_interrupt(&mut self, _opcode: u16) {
        // The comment byte sits in the low byte of the SWI opcode itself,
        // two instructions behind the program counter.
        let comment = self
            .bus
            .read8(
                self.registers.program_counter().wrapping_sub(4),
                MemoryAccess::NONE,
            ) as u8;

        self.prefetch_thumb(MemoryAccess::SEQ);

        if self.fake_swi {
            self.dispatch_swi(comment);
            self.advance_pc_thumb();
            return;
        }

        let return_address = self.registers.program_counter().wrapping_sub(2);
        let saved_cpsr = self.cpsr;

        self.swap_mode(Mode::Supervisor);
        self.spsr = saved_cpsr;
        self.register_bank.spsr_svc = saved_cpsr;
        self.registers.set_register_at(REG_LR, return_address);

        // Exceptions run as ARM code with IRQs masked.
        self.cpsr.set_irq_disable(true);
        self.cpsr.set_cpu_state(CpuState::Arm);
        self.registers.set_program_counter(SWI_VECTOR);
        self.refill_arm();
    }

    /// Format 18: unconditional branch, 11-bit signed halfword offset.
    pub(crate) fn unconditional_branch(&mut self, opcode: u16) {
        let mut offset = u32::from(opcode & 0x3FF) << 1;

        self.prefetch_thumb(MemoryAccess::SEQ);

        if opcode.get_bit(10) {
            offset |= 0xFFFF_F800;
        }

        let pc = self.registers.program_counter().wrapping_add(offset);
        self.registers.set_program_counter(pc);
        self.refill_thumb();
    }

    /// Format 19: long branch with link, split across two opcodes.
    ///
    /// The two halves need not be contiguous; an interrupt may run between
    /// them, so each half only relies on LR and the opcode it holds.
    pub(crate) fn long_branch_link(&mut self, opcode: u16) {
        let imm = u32::from(opcode & 0x7FF);

        self.prefetch_thumb(MemoryAccess::SEQ);

        if !opcode.get_bit(11) {
            // First half: LR = PC + sign-extended upper offset.
            let mut offset = imm << 12;
            if offset.get_bit(22) {
                offset |= 0xFF80_0000;
            }
            let value = self.registers.program_counter().wrapping_add(offset);
            self.registers.set_register_at(REG_LR, value);

            self.advance_pc_thumb();
        } else {
            // Second half: branch to LR + lower offset, leave the return
            // address (with the Thumb bit set) in LR.
            let return_address = self.registers.program_counter().wrapping_sub(2);
            let target = self
                .registers
                .register_at(REG_LR)
                .wrapping_add(imm << 1)
                & !1;

            self.registers.set_program_counter(target);
            self.registers.set_register_at(REG_LR, return_address | 1);
            self.refill_thumb();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use crate::bus::testing::{AccessKind, BusState, RecordingBus};
    use crate::bus::MemoryAccess;
    use crate::cpu::arm7tdmi::Arm7tdmi;
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::psr::CpuState;
    use crate::cpu::registers::{REG_LR, REG_SP};

    fn thumb_cpu(pc: u32) -> (Arm7tdmi, Rc<RefCell<BusState>>) {
        let (bus, state) = RecordingBus::new();
        let mut cpu = Arm7tdmi::new(Box::new(bus));
        cpu.cpsr.set_cpu_state(CpuState::Thumb);
        cpu.registers.set_program_counter(pc);
        cpu.refill_pipeline();
        state.borrow_mut().clear_log();

        (cpu, state)
    }

    #[test]
    fn move_shifted_register_lsl() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x4000_0001);

        // LSL R0, R1, #2
        cpu.execute_thumb(0b000_00_00010_001_000);

        assert_eq!(cpu.registers.register_at(0), 4);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn move_shifted_register_lsr_zero_amount_is_32() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x8000_0000);

        // LSR R0, R1, #0
        cpu.execute_thumb(0b000_01_00000_001_000);

        assert_eq!(cpu.registers.register_at(0), 0);
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.zero_flag());
    }

    #[test]
    fn add_imm3_overflow() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x7FFF_FFFF);

        // ADD R0, R1, #1
        cpu.execute_thumb(0x1C48);

        assert_eq!(cpu.registers.register_at(0), 0x8000_0000);
        assert!(cpu.cpsr.sign_flag());
        assert!(cpu.cpsr.overflow_flag());
        assert!(!cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn sub_register_sets_no_borrow_carry() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 10);
        cpu.registers.set_register_at(2, 4);

        // SUB R0, R1, R2
        cpu.execute_thumb(0b000_11_0_1_010_001_000);

        assert_eq!(cpu.registers.register_at(0), 6);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
    }

    #[test]
    fn mov_imm_clears_sign_flag() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0xDEAD_BEEF);
        cpu.cpsr.set_sign_flag(true);
        cpu.cpsr.set_carry_flag(true);

        // MOV R0, #0
        cpu.execute_thumb(0x2000);

        assert_eq!(cpu.registers.register_at(0), 0);
        assert!(cpu.cpsr.zero_flag());
        assert!(!cpu.cpsr.sign_flag());
        // MOV must skip the arithmetic flag path: carry survives.
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn cmp_imm_only_sets_flags() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(3, 5);

        // CMP R3, #5
        cpu.execute_thumb(0x2B05);

        assert_eq!(cpu.registers.register_at(3), 5);
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn alu_and_orr_update_nz_only() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0b1100);
        cpu.registers.set_register_at(1, 0b1010);
        cpu.cpsr.set_carry_flag(true);

        // AND R0, R1
        cpu.execute_thumb(0x4008);

        assert_eq!(cpu.registers.register_at(0), 0b1000);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn alu_shift_by_register_uses_full_byte_amount() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 1);
        cpu.registers.set_register_at(1, 32);

        // LSL R0, R1
        cpu.execute_thumb(0x4088);

        assert_eq!(cpu.registers.register_at(0), 0);
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.zero_flag());
    }

    #[test]
    fn alu_neg_and_cmp() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 5);

        // NEG R0, R1
        cpu.execute_thumb(0x4248);
        assert_eq!(cpu.registers.register_at(0), (-5_i32) as u32);
        assert!(cpu.cpsr.sign_flag());

        // CMP R0, R1
        cpu.execute_thumb(0x4288);
        assert!(!cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn alu_mul_clears_carry() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0xFFFF_FFFF);
        cpu.registers.set_register_at(4, 1);
        cpu.cpsr.set_carry_flag(true);

        // MUL R0, R4
        cpu.execute_thumb(0x4360);

        assert_eq!(cpu.registers.register_at(0), 0xFFFF_FFFF);
        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
        assert!(!cpu.cpsr.carry_flag());
        assert_eq!(state.borrow().idle_cycles, 1);
    }

    #[test]
    fn alu_adc_uses_carry_in() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 1);
        cpu.registers.set_register_at(1, 2);
        cpu.cpsr.set_carry_flag(true);

        // ADC R0, R1
        cpu.execute_thumb(0x4148);

        assert_eq!(cpu.registers.register_at(0), 4);
    }

    #[test]
    fn hi_register_add_and_mov() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(8, 10);
        cpu.registers.set_register_at(1, 5);

        // ADD R1, R8
        cpu.execute_thumb(0x4441);
        assert_eq!(cpu.registers.register_at(1), 15);

        // MOV R8, R0
        cpu.registers.set_register_at(0, 77);
        cpu.execute_thumb(0x4680);
        assert_eq!(cpu.registers.register_at(8), 77);
    }

    #[test]
    fn hi_register_cmp_sets_flags_and_advances() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(8, 10);
        cpu.registers.set_register_at(9, 10);

        let pc_before = cpu.registers.program_counter();
        // CMP R8, R9
        cpu.execute_thumb(0x45C8);

        assert!(cpu.cpsr.zero_flag());
        assert_eq!(cpu.registers.program_counter(), pc_before + 2);
    }

    #[test]
    fn hi_register_add_to_pc_refills() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        // R15 reads 0x1004; adding R1 = 0xFC lands on 0x1100.
        cpu.registers.set_register_at(1, 0xFC);

        // ADD PC, R1
        cpu.execute_thumb(0x448F);

        assert_eq!(cpu.registers.program_counter(), 0x1104);
        let state = state.borrow();
        let refill: Vec<_> = state.reads().skip(1).collect();
        assert_eq!(refill[0].address, 0x1100);
        assert!(refill[0].flags.contains(MemoryAccess::NONSEQ));
        assert_eq!(refill[1].address, 0x1102);
        assert!(refill[1].flags.contains(MemoryAccess::SEQ));
    }

    #[test]
    fn bx_with_thumb_target_stays_in_thumb() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x301);

        // BX R1
        cpu.execute_thumb(0x4708);

        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
        assert_eq!(cpu.registers.program_counter(), 0x304);
    }

    #[test]
    fn bx_with_clear_bit_enters_arm_state() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x402);

        // BX R1; bit 1 is dropped by the word alignment.
        cpu.execute_thumb(0x4708);

        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.registers.program_counter(), 0x408);
        let state = state.borrow();
        let refill: Vec<_> = state.reads().skip(1).collect();
        assert_eq!(refill[0].width, 4);
        assert_eq!(refill[0].address, 0x400);
        assert_eq!(refill[1].address, 0x404);
    }

    #[test]
    fn pc_relative_load() {
        let (mut cpu, state) = thumb_cpu(0x100);
        state.borrow_mut().poke32(0x144, 0xCAFE_BABE);

        // LDR R1, [PC, #0x40]
        cpu.execute_thumb(0x4910);

        assert_eq!(cpu.registers.register_at(1), 0xCAFE_BABE);
        assert_eq!(state.borrow().idle_cycles, 1);
    }

    #[test]
    fn load_store_register_offset() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0x200);
        cpu.registers.set_register_at(1, 0x10);
        cpu.registers.set_register_at(2, 0xFEEF_AC1F);

        // STR R2, [R0, R1]
        cpu.execute_thumb(0x5042);
        assert_eq!(state.borrow().peek32(0x210), 0xFEEF_AC1F);

        // LDRB R3, [R0, R1]
        cpu.execute_thumb(0x5C43);
        assert_eq!(cpu.registers.register_at(3), 0x1F);

        // STRB R2, [R0, R1]
        cpu.registers.set_register_at(2, 0xABCD);
        cpu.execute_thumb(0x5442);
        assert_eq!(state.borrow().peek8(0x210), 0xCD);
    }

    #[test]
    fn load_store_sign_extended() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0x300);
        cpu.registers.set_register_at(1, 0);
        state.borrow_mut().poke16(0x300, 0x8001);

        // LDSH R2, [R0, R1]
        cpu.execute_thumb(0x5E42);
        assert_eq!(cpu.registers.register_at(2), 0xFFFF_8001);

        // LDSB R2, [R0, R1]
        cpu.execute_thumb(0x5642);
        assert_eq!(cpu.registers.register_at(2), 0x0000_0001);

        // STRH R3, [R0, R1]
        cpu.registers.set_register_at(3, 0x1_2345);
        cpu.execute_thumb(0x5243);
        assert_eq!(state.borrow().peek32(0x300) & 0xFFFF, 0x2345);
    }

    #[test]
    fn load_store_immediate_offset() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x500);
        cpu.registers.set_register_at(0, 0xFFFF_FFFF);

        // STR R0, [R1, #4]
        cpu.execute_thumb(0x6048);
        assert_eq!(state.borrow().peek32(0x504), 0xFFFF_FFFF);

        // LDR R2, [R1, #4]
        cpu.execute_thumb(0x684A);
        assert_eq!(cpu.registers.register_at(2), 0xFFFF_FFFF);

        // STRB R0, [R1, #2]
        cpu.execute_thumb(0x7088);
        assert_eq!(state.borrow().peek8(0x502), 0xFF);
    }

    #[test]
    fn rotated_word_load() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        state.borrow_mut().poke32(0x500, 0x1122_3344);
        cpu.registers.set_register_at(1, 0x501);

        // LDR R2, [R1, #0]: misaligned by one byte, rotated.
        cpu.execute_thumb(0x680A);

        assert_eq!(cpu.registers.register_at(2), 0x4411_2233);
    }

    #[test]
    fn load_store_halfword() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x600);
        cpu.registers.set_register_at(0, 0xFFFF_1234);

        // STRH R0, [R1, #2]
        cpu.execute_thumb(0x8048);
        assert_eq!(state.borrow().peek32(0x600) >> 16, 0x1234);

        // LDRH R2, [R1, #2]
        cpu.execute_thumb(0x884A);
        assert_eq!(cpu.registers.register_at(2), 0x1234);
    }

    #[test]
    fn sp_relative_store_prefetches_after_the_data_access() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(REG_SP, 0x700);
        cpu.registers.set_register_at(0, 999);

        // STR R0, [SP, #4]
        cpu.execute_thumb(0x9001);

        let state = state.borrow();
        assert_eq!(state.peek32(0x704), 999);
        assert_eq!(state.accesses[0].kind, AccessKind::Write);
        assert_eq!(state.accesses[0].width, 4);
        assert_eq!(state.accesses[1].kind, AccessKind::Read);
        assert_eq!(state.accesses[1].width, 2);
    }

    #[test]
    fn sp_relative_load() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(REG_SP, 0x700);
        state.borrow_mut().poke32(0x71C, 999);

        // LDR R0, [SP, #0x1C]
        cpu.execute_thumb(0x9807);

        assert_eq!(cpu.registers.register_at(0), 999);
    }

    #[test]
    fn load_address_from_pc_and_sp() {
        let (mut cpu, _state) = thumb_cpu(0x1002);
        // R15 reads 0x1006; the PC base drops bit 1.
        cpu.execute_thumb(0xA004); // ADD R0, PC, #16
        assert_eq!(cpu.registers.register_at(0), 0x1014);

        cpu.registers.set_register_at(REG_SP, 0x2000);
        cpu.execute_thumb(0xA804); // ADD R0, SP, #16
        assert_eq!(cpu.registers.register_at(0), 0x2010);
    }

    #[test]
    fn add_offset_to_sp() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(REG_SP, 0x1000);

        cpu.execute_thumb(0xB007); // ADD SP, #28
        assert_eq!(cpu.registers.register_at(REG_SP), 0x1000 + 28);

        cpu.execute_thumb(0xB087); // SUB SP, #28
        assert_eq!(cpu.registers.register_at(REG_SP), 0x1000);
    }

    #[test]
    fn push_with_link_register() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(REG_SP, 0x0300_7F00);
        cpu.registers.set_register_at(0, 1);
        cpu.registers.set_register_at(4, 2);
        cpu.registers.set_register_at(REG_LR, 3);

        // PUSH {R0, R4, LR}
        cpu.execute_thumb(0xB511);

        assert_eq!(cpu.registers.register_at(REG_SP), 0x0300_7EF4);
        let state = state.borrow();
        assert_eq!(state.peek32(0x0300_7EF4), 1);
        assert_eq!(state.peek32(0x0300_7EF8), 2);
        assert_eq!(state.peek32(0x0300_7EFC), 3);
    }

    #[test]
    fn pop_with_program_counter_refills() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(REG_SP, 0x2000);
        state.borrow_mut().poke32(0x2000, 0xAA);
        state.borrow_mut().poke32(0x2004, 0x205);

        // POP {R0, PC}
        cpu.execute_thumb(0xBD01);

        assert_eq!(cpu.registers.register_at(0), 0xAA);
        // The loaded value drops its Thumb bit and the pipeline refills.
        assert_eq!(cpu.registers.program_counter(), 0x204 + 4);
        assert_eq!(cpu.registers.register_at(REG_SP), 0x2008);
    }

    #[test]
    fn stm_with_base_first_in_list_stores_original_base() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0x100);
        cpu.registers.set_register_at(1, 7);

        // STMIA R0!, {R0, R1}
        cpu.execute_thumb(0xC003);

        let state = state.borrow();
        assert_eq!(state.peek32(0x100), 0x100);
        assert_eq!(state.peek32(0x104), 7);
        assert_eq!(cpu.registers.register_at(0), 0x108);

        // First store is non-sequential, the rest sequential.
        let writes: Vec<_> = state.writes().collect();
        assert!(writes[0].flags.contains(MemoryAccess::NONSEQ));
        assert!(writes[1].flags.contains(MemoryAccess::SEQ));
    }

    #[test]
    fn stm_with_base_not_first_stores_updated_base() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0xAA);
        cpu.registers.set_register_at(1, 0x200);

        // STMIA R1!, {R0, R1}
        cpu.execute_thumb(0xC103);

        let state = state.borrow();
        assert_eq!(state.peek32(0x200), 0xAA);
        // The base has already advanced by the time it is stored.
        assert_eq!(state.peek32(0x204), 0x204);
        assert_eq!(cpu.registers.register_at(1), 0x208);
    }

    #[test]
    fn ldm_with_base_in_list_suppresses_write_back() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(1, 0x300);
        state.borrow_mut().poke32(0x300, 0xAA);
        state.borrow_mut().poke32(0x304, 0xBB);

        // LDMIA R1!, {R1, R2}
        cpu.execute_thumb(0xC906);

        assert_eq!(cpu.registers.register_at(1), 0xAA);
        assert_eq!(cpu.registers.register_at(2), 0xBB);
    }

    #[test]
    fn ldm_writes_back_when_base_not_in_list() {
        let (mut cpu, state) = thumb_cpu(0x1000);
        cpu.registers.set_register_at(0, 0x400);
        state.borrow_mut().poke32(0x400, 0xCC);

        // LDMIA R0!, {R1}
        cpu.execute_thumb(0xC802);

        assert_eq!(cpu.registers.register_at(1), 0xCC);
        assert_eq!(cpu.registers.register_at(0), 0x404);
    }

    #[test]
    fn conditional_branch_taken_and_not_taken() {
        let (mut cpu, _state) = thumb_cpu(0x1000);

        // BEQ -4 with Z clear: falls through.
        cpu.execute_thumb(0xD0FE);
        assert_eq!(cpu.registers.program_counter(), 0x1006);

        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.cpsr.set_zero_flag(true);

        // BEQ -4 with Z set: R15 = 0x1004 - 4, plus the refill.
        cpu.execute_thumb(0xD0FE);
        assert_eq!(cpu.registers.program_counter(), 0x1004);
    }

    #[test]
    fn conditional_branch_cond_14_always_taken() {
        let (mut cpu, _state) = thumb_cpu(0x1000);

        // Condition 14 is AL; offset +2.
        cpu.execute_thumb(0xDE01);
        assert_eq!(cpu.registers.program_counter(), 0x1004 + 2 + 4);
    }

    #[test]
    fn unconditional_branch_forward_and_backward() {
        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.execute_thumb(0xE002); // B +4
        assert_eq!(cpu.registers.program_counter(), 0x1004 + 4 + 4);

        let (mut cpu, _state) = thumb_cpu(0x1000);
        cpu.execute_thumb(0xE7FD); // B -6
        assert_eq!(cpu.registers.program_counter(), 0x1004 - 6 + 4);
    }

    #[test]
    fn branch_link_pair() {
        let (mut cpu, state) = thumb_cpu(0x8000);

        // BL +8, first half: LR = R15 + 0.
        cpu.execute_thumb(0xF000);
        assert_eq!(cpu.registers.register_at(REG_LR), 0x8004);

        // Second half: branch to LR + 8, LR = old PC | 1.
        cpu.execute_thumb(0xF804);
        assert_eq!(cpu.registers.register_at(REG_LR), 0x8005);
        assert_eq!(cpu.registers.program_counter(), 0x800C + 4);

        let state = state.borrow();
        let last_two: Vec<_> = state.reads().rev().take(2).collect();
        assert_eq!(last_two[1].address, 0x800C);
        assert_eq!(last_two[0].address, 0x800E);
    }

    #[test]
    fn branch_link_negative_offset() {
        let (mut cpu, _state) = thumb_cpu(0x8000);

        // BL -8: upper half carries the sign.
        cpu.execute_thumb(0xF7FF);
        cpu.execute_thumb(0xFFFC);

        assert_eq!(cpu.registers.program_counter(), 0x8004 - 8 + 4);
        assert_eq!(cpu.registers.register_at(REG_LR), 0x8005);
    }

    #[test]
    fn swi_enters_supervisor_at_the_vector() {
        let (mut cpu, state) = thumb_cpu(0x200);
        cpu.cpsr.set_carry_flag(true);

        // SWI #5
        cpu.execute_thumb(0xDF05);

        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert!(cpu.cpsr.irq_disable());
        // Return address is the instruction after the SWI.
        assert_eq!(cpu.registers.register_at(REG_LR), 0x202);
        // The saved status still carries the Thumb bit and the flags.
        assert!(cpu.spsr.carry_flag());
        assert_eq!(cpu.spsr.cpu_state(), CpuState::Thumb);
        // Vector 0x08 plus the ARM-width refill.
        assert_eq!(cpu.registers.program_counter(), 0x08 + 8);

        let state = state.borrow();
        let refill: Vec<_> = state.reads().filter(|a| a.width == 4).collect();
        assert_eq!(refill[0].address, 0x08);
        assert_eq!(refill[1].address, 0x0C);
    }

    #[test]
    fn swi_with_fake_swi_calls_the_hook() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&calls);

        let (mut cpu, state) = thumb_cpu(0x200);
        cpu.fake_swi = true;
        cpu.set_swi_hook(move |number| seen.borrow_mut().push(number));

        // The comment byte lives in the opcode itself.
        state.borrow_mut().poke16(0x200, 0xDF2A);
        cpu.execute_thumb(0xDF2A);

        assert_eq!(*calls.borrow(), vec![0x2A]);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
        assert_eq!(cpu.registers.program_counter(), 0x206);
    }

    #[test]
    fn every_instruction_prefetches_exactly_once() {
        // A spread of formats with no data accesses of halfword size, so
        // every 2-byte read is the prefetch.
        for opcode in [
            0x0048u16, // LSL R0, R1, #1
            0x1C48,    // ADD R0, R1, #1
            0x2A01,    // CMP R2, #1
            0x4048,    // EOR R0, R1
            0x4445,    // ADD R5, R8
            0xA001,    // ADD R0, PC, #4
            0xB081,    // SUB SP, #4
        ] {
            let (mut cpu, state) = thumb_cpu(0x1000);
            cpu.execute_thumb(opcode);
            assert_eq!(
                state.borrow().reads().filter(|a| a.width == 2).count(),
                1,
                "opcode {opcode:#06X} must prefetch exactly once"
            );
        }
    }
}
