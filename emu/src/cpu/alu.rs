//! Flag computation and the barrel shifter.
//!
//! Every arithmetic helper returns an [`ArithmeticOpResult`] carrying the
//! value and the four flags, so handlers latch them with a single
//! `Psr::set_flags`. Carry on subtraction means "no borrow"
//! (`lhs >= rhs` unsigned).
//!
//! The shifter comes in two variants with different zero-amount rules:
//!
//! - **amount from immediate** (shift field of an opcode): a zero amount
//!   encodes LSL by 0 (identity, carry untouched), LSR/ASR by 32, or RRX;
//! - **amount from register** (bottom byte of Rs): zero leaves value and
//!   carry untouched, amounts of 32 and above saturate per instruction set
//!   rules.

use crate::bitwise::Bits;

/// Value plus the N/Z/C/V flags it produced.
#[derive(Default)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

impl ArithmeticOpResult {
    fn new(result: u32, carry: bool, overflow: bool) -> Self {
        Self {
            result,
            carry,
            overflow,
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }
}

/// The four shift operations of the barrel shifter.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl From<u16> for ShiftKind {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Lsl,
            1 => Self::Lsr,
            2 => Self::Asr,
            _ => Self::Ror,
        }
    }
}

/// Shifter result: the shifted value and the carry-out.
pub struct ShiftOutput {
    pub value: u32,
    pub carry: bool,
}

pub fn add(lhs: u32, rhs: u32) -> ArithmeticOpResult {
    adc(lhs, rhs, false)
}

pub fn adc(lhs: u32, rhs: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = u64::from(lhs) + u64::from(rhs) + u64::from(carry_in);
    let result = wide as u32;

    ArithmeticOpResult::new(
        result,
        wide > u64::from(u32::MAX),
        (!(lhs ^ rhs) & (lhs ^ result)).get_bit(31),
    )
}

pub fn sub(lhs: u32, rhs: u32) -> ArithmeticOpResult {
    let result = lhs.wrapping_sub(rhs);

    ArithmeticOpResult::new(result, lhs >= rhs, ((lhs ^ rhs) & (lhs ^ result)).get_bit(31))
}

/// `lhs - rhs - !carry_in`, the SBC operand rule.
pub fn sbc(lhs: u32, rhs: u32, carry_in: bool) -> ArithmeticOpResult {
    let borrow = u64::from(!carry_in);
    let result = lhs.wrapping_sub(rhs).wrapping_sub(borrow as u32);

    ArithmeticOpResult::new(
        result,
        u64::from(lhs) >= u64::from(rhs) + borrow,
        ((lhs ^ rhs) & (lhs ^ result)).get_bit(31),
    )
}

/// Shift by an opcode-encoded amount (0-31).
pub fn shift_by_immediate(
    kind: ShiftKind,
    value: u32,
    amount: u32,
    carry_in: bool,
) -> ShiftOutput {
    debug_assert!(amount < 32);

    match kind {
        ShiftKind::Lsl => {
            if amount == 0 {
                ShiftOutput { value, carry: carry_in }
            } else {
                ShiftOutput {
                    value: value << amount,
                    carry: value.get_bit((32 - amount) as u8),
                }
            }
        }
        ShiftKind::Lsr => {
            // LSR #0 encodes LSR #32.
            if amount == 0 {
                ShiftOutput {
                    value: 0,
                    carry: value.get_bit(31),
                }
            } else {
                ShiftOutput {
                    value: value >> amount,
                    carry: value.get_bit((amount - 1) as u8),
                }
            }
        }
        ShiftKind::Asr => {
            // ASR #0 encodes ASR #32.
            if amount == 0 {
                let sign = value.get_bit(31);
                ShiftOutput {
                    value: if sign { u32::MAX } else { 0 },
                    carry: sign,
                }
            } else {
                ShiftOutput {
                    value: ((value as i32) >> amount) as u32,
                    carry: value.get_bit((amount - 1) as u8),
                }
            }
        }
        ShiftKind::Ror => {
            // ROR #0 encodes RRX: rotate right by one through carry.
            if amount == 0 {
                ShiftOutput {
                    value: (u32::from(carry_in) << 31) | (value >> 1),
                    carry: value.get_bit(0),
                }
            } else {
                ShiftOutput {
                    value: value.rotate_right(amount),
                    carry: value.get_bit((amount - 1) as u8),
                }
            }
        }
    }
}

/// Shift by a register-supplied amount (bottom byte of Rs).
pub fn shift_by_register(
    kind: ShiftKind,
    value: u32,
    amount: u32,
    carry_in: bool,
) -> ShiftOutput {
    let amount = amount & 0xFF;
    if amount == 0 {
        return ShiftOutput { value, carry: carry_in };
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => ShiftOutput {
                value: value << amount,
                carry: value.get_bit((32 - amount) as u8),
            },
            32 => ShiftOutput {
                value: 0,
                carry: value.get_bit(0),
            },
            _ => ShiftOutput {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Lsr => match amount {
            1..=31 => ShiftOutput {
                value: value >> amount,
                carry: value.get_bit((amount - 1) as u8),
            },
            32 => ShiftOutput {
                value: 0,
                carry: value.get_bit(31),
            },
            _ => ShiftOutput {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Asr => {
            if amount < 32 {
                ShiftOutput {
                    value: ((value as i32) >> amount) as u32,
                    carry: value.get_bit((amount - 1) as u8),
                }
            } else {
                let sign = value.get_bit(31);
                ShiftOutput {
                    value: if sign { u32::MAX } else { 0 },
                    carry: sign,
                }
            }
        }
        ShiftKind::Ror => {
            let rotation = amount & 31;
            if rotation == 0 {
                // A multiple of 32 leaves the value alone but still
                // updates carry from bit 31.
                ShiftOutput {
                    value,
                    carry: value.get_bit(31),
                }
            } else {
                ShiftOutput {
                    value: value.rotate_right(rotation),
                    carry: value.get_bit((rotation - 1) as u8),
                }
            }
        }
    }
}
