//! # ULP FSM instructions
//!
//! ## Overview
//!
//! Every ULP FSM instruction is a single 32-bit word with the opcode in bits
//! 31:28. [`Insn`] wraps such a word and offers one `const` constructor per
//! instruction form, so programs can be written as `const` tables and loaded
//! with [`load_program`](crate::program::load_program).
//!
//! Constructor arguments are checked with `assert!`. Inside a `const`
//! initializer a violated precondition is a compile error.
//!
//! Three pseudo instructions (macros) carry label information for the
//! loader and never reach the coprocessor: [`Insn::label`],
//! [`Insn::branch`] and [`Insn::label_pc`]. A `branch` macro placed in
//! front of a jump resolves the jump target to the label, a `label_pc` macro
//! in front of an ALU immediate instruction loads the label address.
//!
//! ## Examples
//!
//! ```rust
//! use esp_ulp_fsm::insn::{Insn, Reg};
//!
//! // Count from 0 to 10 and store the result in word 100.
//! const PROGRAM: &[Insn] = &[
//!     Insn::movi(Reg::R0, 0),
//!     Insn::movi(Reg::R2, 100),
//!     Insn::label(1),
//!     Insn::addi(Reg::R0, Reg::R0, 1),
//!     Insn::branch(1),
//!     Insn::bl(0, 10),
//!     Insn::st(Reg::R0, Reg::R2, 0),
//!     Insn::halt(),
//! ];
//! # assert_eq!(PROGRAM.len(), 8);
//! ```

mod decode;
pub(crate) mod format;

use core::fmt;

pub use self::decode::{DecodeError, JumpTarget, Macro, Op};
use crate::soc;

pub(crate) const OPCODE_WR_REG: u32 = 1;
pub(crate) const OPCODE_RD_REG: u32 = 2;
pub(crate) const OPCODE_I2C: u32 = 3;
pub(crate) const OPCODE_DELAY: u32 = 4;
pub(crate) const OPCODE_ADC: u32 = 5;
pub(crate) const OPCODE_ST: u32 = 6;
pub(crate) const OPCODE_ALU: u32 = 7;
pub(crate) const OPCODE_BRANCH: u32 = 8;
pub(crate) const OPCODE_END: u32 = 9;
pub(crate) const OPCODE_TSENS: u32 = 10;
pub(crate) const OPCODE_HALT: u32 = 11;
pub(crate) const OPCODE_LD: u32 = 13;
pub(crate) const OPCODE_MACRO: u32 = 15;

pub(crate) const SUB_OPCODE_ST: u32 = 4;

pub(crate) const SUB_OPCODE_ALU_REG: u32 = 0;
pub(crate) const SUB_OPCODE_ALU_IMM: u32 = 1;
pub(crate) const SUB_OPCODE_ALU_CNT: u32 = 2;

pub(crate) const SUB_OPCODE_BX: u32 = 0;
pub(crate) const SUB_OPCODE_BR: u32 = 1;
pub(crate) const SUB_OPCODE_BS: u32 = 2;

pub(crate) const SUB_OPCODE_END: u32 = 0;
pub(crate) const SUB_OPCODE_SLEEP: u32 = 1;

pub(crate) const SUB_OPCODE_MACRO_LABEL: u32 = 0;
pub(crate) const SUB_OPCODE_MACRO_BRANCH: u32 = 1;
pub(crate) const SUB_OPCODE_MACRO_LABELPC: u32 = 2;

/// Largest distance, in words, a relative branch can cover.
pub const MAX_BRANCH_OFFSET: u16 = 127;
/// Largest absolute jump target and ST/LD offset (11 bits).
pub const MAX_ADDRESS: u16 = 0x7ff;
/// Number of `ULP_CP_SLEEP_CYCn` registers a `SLEEP` can select.
pub const SLEEP_CYCLE_REGISTERS: u8 = 5;

const fn field(value: u32, lsb: u32, width: u32) -> u32 {
    (value & ((1 << width) - 1)) << lsb
}

const fn opcode(op: u32) -> u32 {
    op << 28
}

const fn sub_opcode(sub: u32) -> u32 {
    field(sub, 25, 3)
}

/// General purpose register of the ULP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Reg {
    /// R0, also the implicit destination of `REG_RD` and `I2C_RD` and the
    /// operand compared by `JUMPR`
    R0 = 0,
    /// R1
    R1 = 1,
    /// R2
    R2 = 2,
    /// R3
    R3 = 3,
}

impl Reg {
    /// All registers in index order.
    pub const ALL: [Reg; 4] = [Reg::R0, Reg::R1, Reg::R2, Reg::R3];

    /// Register from the low two bits of `bits`.
    pub const fn from_bits(bits: u32) -> Self {
        Self::ALL[(bits & 0b11) as usize]
    }

    /// Register index, 0 to 3.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Operation of an ALU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AluOp {
    /// `dst = a + b`
    Add  = 0,
    /// `dst = a - b`
    Sub  = 1,
    /// `dst = a & b`
    And  = 2,
    /// `dst = a | b`
    Or   = 3,
    /// `dst = src`, the source register or the immediate
    Move = 4,
    /// `dst = a << b`
    Lsh  = 5,
    /// `dst = a >> b`
    Rsh  = 6,
}

impl AluOp {
    pub(crate) const fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::And,
            3 => Self::Or,
            4 => Self::Move,
            5 => Self::Lsh,
            6 => Self::Rsh,
            _ => return None,
        })
    }

    pub(crate) const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Move => "MOVE",
            Self::Lsh => "LSH",
            Self::Rsh => "RSH",
        }
    }
}

/// Operation on the 8-bit stage counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StageOp {
    /// Increment by the immediate
    Inc   = 0,
    /// Decrement by the immediate
    Dec   = 1,
    /// Reset to zero
    Reset = 2,
}

impl StageOp {
    pub(crate) const fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Inc,
            1 => Self::Dec,
            2 => Self::Reset,
            _ => return None,
        })
    }
}

/// Condition of an absolute `JUMP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum JumpCondition {
    /// Jump unconditionally
    Always   = 0,
    /// Jump if the last ALU result was zero (`EQ`)
    Zero     = 1,
    /// Jump if the last ALU operation overflowed (`OV`)
    Overflow = 2,
}

impl JumpCondition {
    pub(crate) const fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Always,
            1 => Self::Zero,
            2 => Self::Overflow,
            _ => return None,
        })
    }
}

/// Comparison of R0 against the immediate of a `JUMPR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum R0Condition {
    /// Branch if `R0 < threshold`
    Lt = 0,
    /// Branch if `R0 >= threshold`
    Ge = 1,
}

/// Comparison of the stage counter against the immediate of a `JUMPS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StageCondition {
    /// Branch if `stage < threshold`
    Lt = 0,
    /// Branch if `stage >= threshold`
    Ge = 1,
    /// Branch if `stage <= threshold`
    Le = 2,
}

impl StageCondition {
    pub(crate) const fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Lt,
            1 => Self::Ge,
            2 => Self::Le,
            _ => return None,
        })
    }
}

/// SAR ADC used by an `ADC` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SarAdc {
    /// SAR ADC1, 8 channels
    Adc1 = 0,
    /// SAR ADC2, 10 channels
    Adc2 = 1,
}

impl SarAdc {
    /// Number of input channels of this ADC.
    pub const fn channels(self) -> u8 {
        match self {
            Self::Adc1 => 8,
            Self::Adc2 => 10,
        }
    }
}

/// A single ULP FSM instruction word.
///
/// The layout matches what the coprocessor fetches from RTC slow memory, so
/// a `&[Insn]` can be copied there word by word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Insn(u32);

impl Insn {
    /// Wraps a raw instruction word.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw instruction word.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Instruction from its little-endian memory representation.
    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// Little-endian memory representation.
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// The 4-bit opcode.
    pub const fn opcode(self) -> u8 {
        (self.0 >> 28) as u8
    }

    /// Returns `true` for the loader pseudo instructions.
    pub const fn is_macro(self) -> bool {
        self.0 >> 28 == OPCODE_MACRO
    }

    /// `REG_WR`: writes `data` to bits `[high:low]` of the RTC register at
    /// SoC address `reg`.
    ///
    /// At most 8 bits can be written by one instruction.
    pub const fn wr_reg(reg: u32, low: u8, high: u8, data: u8) -> Self {
        let (periph_sel, addr) = match soc::ulp_register(reg) {
            Some(pair) => pair,
            None => core::panic!("register is not reachable by the ULP"),
        };
        core::assert!(low <= high && high < 32, "invalid bit range");
        core::assert!(high - low < 8, "REG_WR can write at most 8 bits");
        core::assert!(
            (data as u32) >> (high - low + 1) == 0,
            "value does not fit the bit range"
        );

        Self(
            field(addr as u32, 0, 8)
                | field(periph_sel as u32, 8, 2)
                | field(data as u32, 10, 8)
                | field(low as u32, 18, 5)
                | field(high as u32, 23, 5)
                | opcode(OPCODE_WR_REG),
        )
    }

    /// `REG_WR` of a single bit.
    pub const fn wr_reg_bit(reg: u32, bit: u8, value: bool) -> Self {
        Self::wr_reg(reg, bit, bit, value as u8)
    }

    /// `REG_RD`: loads bits `[high:low]` of the RTC register at SoC address
    /// `reg` into R0.
    pub const fn rd_reg(reg: u32, low: u8, high: u8) -> Self {
        let (periph_sel, addr) = match soc::ulp_register(reg) {
            Some(pair) => pair,
            None => core::panic!("register is not reachable by the ULP"),
        };
        core::assert!(low <= high && high < 32, "invalid bit range");
        core::assert!(high - low < 16, "REG_RD can read at most 16 bits");

        Self(
            field(addr as u32, 0, 8)
                | field(periph_sel as u32, 8, 2)
                | field(low as u32, 18, 5)
                | field(high as u32, 23, 5)
                | opcode(OPCODE_RD_REG),
        )
    }

    /// `REG_RD` of a single bit.
    pub const fn rd_reg_bit(reg: u32, bit: u8) -> Self {
        Self::rd_reg(reg, bit, bit)
    }

    /// `I2C_RD` / `I2C_WR` on bits `[high:low]` of register `sub_addr` of the
    /// slave selected by `slave_sel` (index of `SENS_I2C_SLAVE_ADDRn`).
    pub const fn i2c_rw(slave_sel: u8, sub_addr: u8, value: u8, low: u8, high: u8, write: bool) -> Self {
        core::assert!(slave_sel < 8, "slave select out of range");
        core::assert!(low <= high && high < 8, "invalid bit range");

        Self(
            field(sub_addr as u32, 0, 8)
                | field(value as u32, 8, 8)
                | field(low as u32, 16, 3)
                | field(high as u32, 19, 3)
                | field(slave_sel as u32, 22, 4)
                | field(write as u32, 27, 1)
                | opcode(OPCODE_I2C),
        )
    }

    /// `I2C_RD` of a whole register byte into R0.
    pub const fn i2c_read(slave_sel: u8, sub_addr: u8) -> Self {
        Self::i2c_rw(slave_sel, sub_addr, 0, 0, 7, false)
    }

    /// `I2C_WR` of a whole register byte.
    pub const fn i2c_write(slave_sel: u8, sub_addr: u8, value: u8) -> Self {
        Self::i2c_rw(slave_sel, sub_addr, value, 0, 7, true)
    }

    /// `WAIT`: idles for `cycles` clock cycles.
    pub const fn delay(cycles: u16) -> Self {
        Self(field(cycles as u32, 0, 16) | opcode(OPCODE_DELAY))
    }

    /// `ADC`: samples `channel` of `sar` into `dst`.
    pub const fn adc(dst: Reg, sar: SarAdc, channel: u8) -> Self {
        core::assert!(channel < sar.channels(), "ADC channel out of range");

        Self(
            field(dst as u32, 0, 2)
                | field(channel as u32 + 1, 2, 4)
                | field(sar as u32, 6, 1)
                | opcode(OPCODE_ADC),
        )
    }

    /// `ST`: stores the low 16 bits of `src` at word `addr + offset`.
    ///
    /// The upper half of the stored word receives the program counter of
    /// the `ST` instruction.
    pub const fn st(src: Reg, addr: Reg, offset: u16) -> Self {
        core::assert!(offset <= MAX_ADDRESS, "offset out of range");

        Self(
            field(src as u32, 0, 2)
                | field(addr as u32, 2, 2)
                | field(offset as u32, 10, 11)
                | sub_opcode(SUB_OPCODE_ST)
                | opcode(OPCODE_ST),
        )
    }

    /// `LD`: loads the low 16 bits of word `addr + offset` into `dst`.
    pub const fn ld(dst: Reg, addr: Reg, offset: u16) -> Self {
        core::assert!(offset <= MAX_ADDRESS, "offset out of range");

        Self(
            field(dst as u32, 0, 2)
                | field(addr as u32, 2, 2)
                | field(offset as u32, 10, 11)
                | opcode(OPCODE_LD),
        )
    }

    /// ALU operation on two registers: `dst = src1 <op> src2`.
    pub const fn alu_reg(op: AluOp, dst: Reg, src1: Reg, src2: Reg) -> Self {
        Self(
            field(dst as u32, 0, 2)
                | field(src1 as u32, 2, 2)
                | field(src2 as u32, 4, 2)
                | field(op as u32, 21, 4)
                | sub_opcode(SUB_OPCODE_ALU_REG)
                | opcode(OPCODE_ALU),
        )
    }

    /// ALU operation with an immediate: `dst = src <op> imm`.
    pub const fn alu_imm(op: AluOp, dst: Reg, src: Reg, imm: u16) -> Self {
        Self(
            field(dst as u32, 0, 2)
                | field(src as u32, 2, 2)
                | field(imm as u32, 4, 16)
                | field(op as u32, 21, 4)
                | sub_opcode(SUB_OPCODE_ALU_IMM)
                | opcode(OPCODE_ALU),
        )
    }

    /// `ADD dst, src1, src2`
    pub const fn addr(dst: Reg, src1: Reg, src2: Reg) -> Self {
        Self::alu_reg(AluOp::Add, dst, src1, src2)
    }

    /// `SUB dst, src1, src2`
    pub const fn subr(dst: Reg, src1: Reg, src2: Reg) -> Self {
        Self::alu_reg(AluOp::Sub, dst, src1, src2)
    }

    /// `AND dst, src1, src2`
    pub const fn andr(dst: Reg, src1: Reg, src2: Reg) -> Self {
        Self::alu_reg(AluOp::And, dst, src1, src2)
    }

    /// `OR dst, src1, src2`
    pub const fn orr(dst: Reg, src1: Reg, src2: Reg) -> Self {
        Self::alu_reg(AluOp::Or, dst, src1, src2)
    }

    /// `MOVE dst, src`
    pub const fn movr(dst: Reg, src: Reg) -> Self {
        Self::alu_reg(AluOp::Move, dst, src, Reg::R0)
    }

    /// `LSH dst, src1, src2`
    pub const fn lshr(dst: Reg, src1: Reg, src2: Reg) -> Self {
        Self::alu_reg(AluOp::Lsh, dst, src1, src2)
    }

    /// `RSH dst, src1, src2`
    pub const fn rshr(dst: Reg, src1: Reg, src2: Reg) -> Self {
        Self::alu_reg(AluOp::Rsh, dst, src1, src2)
    }

    /// `ADD dst, src, imm`
    pub const fn addi(dst: Reg, src: Reg, imm: u16) -> Self {
        Self::alu_imm(AluOp::Add, dst, src, imm)
    }

    /// `SUB dst, src, imm`
    pub const fn subi(dst: Reg, src: Reg, imm: u16) -> Self {
        Self::alu_imm(AluOp::Sub, dst, src, imm)
    }

    /// `AND dst, src, imm`
    pub const fn andi(dst: Reg, src: Reg, imm: u16) -> Self {
        Self::alu_imm(AluOp::And, dst, src, imm)
    }

    /// `OR dst, src, imm`
    pub const fn ori(dst: Reg, src: Reg, imm: u16) -> Self {
        Self::alu_imm(AluOp::Or, dst, src, imm)
    }

    /// `MOVE dst, imm`
    pub const fn movi(dst: Reg, imm: u16) -> Self {
        Self::alu_imm(AluOp::Move, dst, Reg::R0, imm)
    }

    /// `LSH dst, src, imm`
    pub const fn lshi(dst: Reg, src: Reg, imm: u16) -> Self {
        Self::alu_imm(AluOp::Lsh, dst, src, imm)
    }

    /// `RSH dst, src, imm`
    pub const fn rshi(dst: Reg, src: Reg, imm: u16) -> Self {
        Self::alu_imm(AluOp::Rsh, dst, src, imm)
    }

    /// Stage counter operation.
    pub const fn stage(op: StageOp, imm: u8) -> Self {
        Self(
            field(imm as u32, 4, 8)
                | field(op as u32, 21, 4)
                | sub_opcode(SUB_OPCODE_ALU_CNT)
                | opcode(OPCODE_ALU),
        )
    }

    /// `STAGE_INC imm`
    pub const fn stage_inc(imm: u8) -> Self {
        Self::stage(StageOp::Inc, imm)
    }

    /// `STAGE_DEC imm`
    pub const fn stage_dec(imm: u8) -> Self {
        Self::stage(StageOp::Dec, imm)
    }

    /// `STAGE_RST`
    pub const fn stage_rst() -> Self {
        Self::stage(StageOp::Reset, 0)
    }

    /// `JUMP addr`: absolute jump to word `addr` of RTC slow memory.
    pub const fn jump(addr: u16, cond: JumpCondition) -> Self {
        core::assert!(addr <= MAX_ADDRESS, "jump target out of range");

        Self(
            field(addr as u32, 2, 11)
                | field(cond as u32, 22, 3)
                | sub_opcode(SUB_OPCODE_BX)
                | opcode(OPCODE_BRANCH),
        )
    }

    /// `JUMP reg`: absolute jump to the word address held in `reg`.
    pub const fn jump_reg(reg: Reg, cond: JumpCondition) -> Self {
        Self(
            field(reg as u32, 0, 2)
                | field(1, 21, 1)
                | field(cond as u32, 22, 3)
                | sub_opcode(SUB_OPCODE_BX)
                | opcode(OPCODE_BRANCH),
        )
    }

    /// `JUMPR`: relative branch by `offset` words if R0 compares to
    /// `threshold` as `cond` says.
    pub const fn jumpr(offset: i8, threshold: u16, cond: R0Condition) -> Self {
        core::assert!(offset != i8::MIN, "branch offset out of range");

        Self(
            field(threshold as u32, 0, 16)
                | field(cond as u32, 16, 1)
                | field(offset.unsigned_abs() as u32, 17, 7)
                | field((offset < 0) as u32, 24, 1)
                | sub_opcode(SUB_OPCODE_BR)
                | opcode(OPCODE_BRANCH),
        )
    }

    /// Relative branch if `R0 < threshold`.
    pub const fn bl(offset: i8, threshold: u16) -> Self {
        Self::jumpr(offset, threshold, R0Condition::Lt)
    }

    /// Relative branch if `R0 >= threshold`.
    pub const fn bge(offset: i8, threshold: u16) -> Self {
        Self::jumpr(offset, threshold, R0Condition::Ge)
    }

    /// `JUMPS`: relative branch by `offset` words if the stage counter
    /// compares to `threshold` as `cond` says.
    pub const fn jumps(offset: i8, threshold: u8, cond: StageCondition) -> Self {
        core::assert!(offset != i8::MIN, "branch offset out of range");

        Self(
            field(threshold as u32, 0, 8)
                | field(cond as u32, 15, 2)
                | field(offset.unsigned_abs() as u32, 17, 7)
                | field((offset < 0) as u32, 24, 1)
                | sub_opcode(SUB_OPCODE_BS)
                | opcode(OPCODE_BRANCH),
        )
    }

    /// `WAKE`: wakes the SoC, or raises the ULP interrupt if it is awake.
    pub const fn wake() -> Self {
        Self(field(1, 0, 1) | sub_opcode(SUB_OPCODE_END) | opcode(OPCODE_END))
    }

    /// `SLEEP`: selects which `ULP_CP_SLEEP_CYCn` register times the next
    /// sleep period.
    pub const fn sleep_cycle_sel(index: u8) -> Self {
        core::assert!(index < SLEEP_CYCLE_REGISTERS, "sleep cycle register out of range");

        Self(field(index as u32, 0, 4) | sub_opcode(SUB_OPCODE_SLEEP) | opcode(OPCODE_END))
    }

    /// `TSENS`: measures the temperature sensor into `dst`.
    pub const fn tsens(dst: Reg, wait_delay: u16) -> Self {
        core::assert!(wait_delay < 1 << 14, "wait delay out of range");

        Self(field(dst as u32, 0, 2) | field(wait_delay as u32, 2, 14) | opcode(OPCODE_TSENS))
    }

    /// `HALT`: ends the program; the ULP sleeps until the timer fires again.
    pub const fn halt() -> Self {
        Self(opcode(OPCODE_HALT))
    }

    const fn macro_insn(sub: u32, label: u16) -> Self {
        Self(field(label as u32, 0, 16) | field(sub, 24, 4) | opcode(OPCODE_MACRO))
    }

    /// Loader macro: defines label `label` at the next real instruction.
    pub const fn label(label: u16) -> Self {
        Self::macro_insn(SUB_OPCODE_MACRO_LABEL, label)
    }

    /// Loader macro: resolves the target of the following `JUMP`, `JUMPR` or
    /// `JUMPS` to `label`.
    pub const fn branch(label: u16) -> Self {
        Self::macro_insn(SUB_OPCODE_MACRO_BRANCH, label)
    }

    /// Loader macro: replaces the immediate of the following ALU immediate
    /// instruction with the address of `label`.
    pub const fn label_pc(label: u16) -> Self {
        Self::macro_insn(SUB_OPCODE_MACRO_LABELPC, label)
    }

    /// Decodes the instruction.
    pub fn decode(self) -> Result<Op, DecodeError> {
        Op::decode(self)
    }
}

impl From<Insn> for u32 {
    fn from(insn: Insn) -> Self {
        insn.0
    }
}

impl From<u32> for Insn {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Insn({:#010x})", self.0)
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(op) => fmt::Display::fmt(&op, f),
            Err(_) => write!(f, ".long {:#010x}", self.0),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Insn {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Insn({=u32:#010x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soc::{rtc_cntl, rtc_io, sens};

    #[test]
    fn encodes_register_access() {
        // RTC_CNTL_STORE0[7:0] = 0xaa
        let insn = Insn::wr_reg(rtc_cntl::STORE0, 0, 7, 0xaa);
        assert_eq!(insn.bits(), 0x1 << 28 | 7 << 23 | 0xaa << 10 | 0x4c / 4);

        // RTC_GPIO_OUT_W1TS, bit 14 + 10, peripheral select 1
        let insn = Insn::wr_reg_bit(rtc_io::RTC_GPIO_OUT_W1TS, 24, true);
        assert_eq!(insn.bits(), 0x1 << 28 | 24 << 23 | 24 << 18 | 1 << 10 | 1 << 8 | 1);

        let insn = Insn::rd_reg(sens::SAR_START_FORCE, 11, 21);
        assert_eq!(insn.bits(), 0x2 << 28 | 21 << 23 | 11 << 18 | 2 << 8 | 0x2c / 4);
    }

    #[test]
    fn encodes_alu() {
        assert_eq!(Insn::movi(Reg::R3, 0x1234).bits(), 0x7 << 28 | 1 << 25 | 4 << 21 | 0x1234 << 4 | 3);
        assert_eq!(Insn::addr(Reg::R0, Reg::R1, Reg::R2).bits(), 0x7 << 28 | 2 << 4 | 1 << 2);
        assert_eq!(Insn::movr(Reg::R1, Reg::R2).bits(), 0x7 << 28 | 4 << 21 | 2 << 2 | 1);
        assert_eq!(Insn::stage_inc(3).bits(), 0x7 << 28 | 2 << 25 | 3 << 4);
        assert_eq!(Insn::stage_rst().bits(), 0x7 << 28 | 2 << 25 | 2 << 21);
    }

    #[test]
    fn encodes_branches() {
        assert_eq!(Insn::jump(0x123, JumpCondition::Zero).bits(), 0x8 << 28 | 1 << 22 | 0x123 << 2);
        assert_eq!(Insn::jump_reg(Reg::R2, JumpCondition::Always).bits(), 0x8 << 28 | 1 << 21 | 2);
        assert_eq!(Insn::bl(-3, 10).bits(), 0x8 << 28 | 1 << 25 | 1 << 24 | 3 << 17 | 10);
        assert_eq!(Insn::bge(5, 0xffff).bits(), 0x8 << 28 | 1 << 25 | 5 << 17 | 1 << 16 | 0xffff);
        assert_eq!(
            Insn::jumps(2, 7, StageCondition::Le).bits(),
            0x8 << 28 | 2 << 25 | 2 << 17 | 2 << 15 | 7
        );
    }

    #[test]
    fn encodes_misc() {
        assert_eq!(Insn::halt().bits(), 0xb000_0000);
        assert_eq!(Insn::wake().bits(), 0x9000_0001);
        assert_eq!(Insn::sleep_cycle_sel(4).bits(), 0x9200_0004);
        assert_eq!(Insn::delay(0xffff).bits(), 0x4000_ffff);
        assert_eq!(Insn::tsens(Reg::R1, 8000).bits(), 0xa << 28 | 8000 << 2 | 1);
        assert_eq!(Insn::adc(Reg::R2, SarAdc::Adc2, 9).bits(), 0x5 << 28 | 1 << 6 | 10 << 2 | 2);
        assert_eq!(Insn::st(Reg::R1, Reg::R2, 3).bits(), 0x6 << 28 | 4 << 25 | 3 << 10 | 2 << 2 | 1);
        assert_eq!(Insn::ld(Reg::R1, Reg::R2, 3).bits(), 0xd << 28 | 3 << 10 | 2 << 2 | 1);
        assert_eq!(Insn::i2c_write(2, 0x10, 0x5a).bits(), 0x3 << 28 | 1 << 27 | 2 << 22 | 7 << 19 | 0x5a << 8 | 0x10);
    }

    #[test]
    fn macro_words() {
        assert!(Insn::label(7).is_macro());
        assert!(!Insn::halt().is_macro());
        assert_eq!(Insn::branch(0xbeef).bits(), 0xf100_beef);
        assert_eq!(Insn::label_pc(1).bits(), 0xf200_0001);
    }

    #[test]
    fn byte_representation() {
        let insn = Insn::wake();
        assert_eq!(insn.to_le_bytes(), [0x01, 0x00, 0x00, 0x90]);
        assert_eq!(Insn::from_le_bytes(insn.to_le_bytes()), insn);
    }

    #[test]
    #[should_panic(expected = "REG_WR can write at most 8 bits")]
    fn wide_register_write_is_rejected() {
        let _ = Insn::wr_reg(rtc_cntl::STORE0, 0, 8, 0);
    }

    #[test]
    #[should_panic(expected = "register is not reachable by the ULP")]
    fn foreign_register_is_rejected() {
        let _ = Insn::rd_reg(0x3ff4_0000, 0, 0);
    }
}
