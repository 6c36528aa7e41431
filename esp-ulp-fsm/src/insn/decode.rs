use core::fmt;

use super::{
    format,
    AluOp,
    Insn,
    JumpCondition,
    R0Condition,
    Reg,
    SarAdc,
    StageCondition,
    StageOp,
    OPCODE_ADC,
    OPCODE_ALU,
    OPCODE_BRANCH,
    OPCODE_DELAY,
    OPCODE_END,
    OPCODE_HALT,
    OPCODE_I2C,
    OPCODE_LD,
    OPCODE_MACRO,
    OPCODE_RD_REG,
    OPCODE_ST,
    OPCODE_TSENS,
    OPCODE_WR_REG,
    SUB_OPCODE_ALU_CNT,
    SUB_OPCODE_ALU_IMM,
    SUB_OPCODE_ALU_REG,
    SUB_OPCODE_BR,
    SUB_OPCODE_BS,
    SUB_OPCODE_BX,
    SUB_OPCODE_END,
    SUB_OPCODE_MACRO_BRANCH,
    SUB_OPCODE_MACRO_LABEL,
    SUB_OPCODE_MACRO_LABELPC,
    SUB_OPCODE_SLEEP,
    SUB_OPCODE_ST,
};
use crate::soc;

/// Instruction decoding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum DecodeError {
    /// The opcode does not name an instruction.
    UnknownOpcode,
    /// The opcode is valid but its sub-opcode is not.
    UnknownSubOpcode,
    /// A selector field (ALU operation, condition, ...) holds an unused
    /// value.
    InvalidField,
}

impl core::error::Error for DecodeError {}

#[cfg(feature = "defmt")]
impl defmt::Format for DecodeError {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", defmt::Debug2Format(self))
    }
}

/// Target of an absolute `JUMP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JumpTarget {
    /// Fixed word address
    Addr(u16),
    /// Word address held in a register
    Reg(Reg),
}

/// Loader pseudo instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Macro {
    /// Label definition
    Label(u16),
    /// Branch target reference for the next instruction
    Branch(u16),
    /// Label address reference for the next instruction
    LabelPc(u16),
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Op {
    /// `REG_WR`, `addr` is the SoC register address
    WrReg { addr: u32, low: u8, high: u8, data: u8 },
    /// `REG_RD`, `addr` is the SoC register address
    RdReg { addr: u32, low: u8, high: u8 },
    /// `I2C_RD` / `I2C_WR`
    I2c {
        slave_sel: u8,
        sub_addr: u8,
        data: u8,
        low: u8,
        high: u8,
        write: bool,
    },
    /// `WAIT`
    Wait { cycles: u16 },
    /// `ADC`, `mux` is the channel plus one
    Adc { dst: Reg, sar: SarAdc, mux: u8 },
    /// `ST`
    St { src: Reg, addr: Reg, offset: u16 },
    /// `LD`
    Ld { dst: Reg, addr: Reg, offset: u16 },
    /// ALU operation on registers
    AluReg { op: AluOp, dst: Reg, src1: Reg, src2: Reg },
    /// ALU operation with an immediate
    AluImm { op: AluOp, dst: Reg, src: Reg, imm: u16 },
    /// Stage counter operation
    Stage { op: StageOp, imm: u8 },
    /// `JUMP`
    Jump { target: JumpTarget, cond: JumpCondition },
    /// `JUMPR`, `offset` in words
    JumpR { offset: i8, threshold: u16, cond: R0Condition },
    /// `JUMPS`, `offset` in words
    JumpS { offset: i8, threshold: u8, cond: StageCondition },
    /// `WAKE`
    Wake,
    /// `SLEEP`
    Sleep { cycle_sel: u8 },
    /// `TSENS`
    Tsens { dst: Reg, wait_delay: u16 },
    /// `HALT`
    Halt,
    /// Loader pseudo instruction
    Macro(Macro),
}

fn signed_offset(magnitude: u8, negative: bool) -> i8 {
    // magnitude is a 7-bit field
    let magnitude = magnitude as i8;
    if negative { -magnitude } else { magnitude }
}

impl Op {
    /// Decodes `insn`.
    pub fn decode(insn: Insn) -> Result<Self, DecodeError> {
        let bits = insn.bits();
        let common = format::Common::new(bits);

        let op = match common.opcode() as u32 {
            OPCODE_WR_REG => {
                let f = format::RegAccess::new(bits);
                Op::WrReg {
                    addr: soc::soc_register(f.periph_sel(), f.addr()),
                    low: f.low(),
                    high: f.high(),
                    data: f.data(),
                }
            }
            OPCODE_RD_REG => {
                let f = format::RegAccess::new(bits);
                Op::RdReg {
                    addr: soc::soc_register(f.periph_sel(), f.addr()),
                    low: f.low(),
                    high: f.high(),
                }
            }
            OPCODE_I2C => {
                let f = format::I2c::new(bits);
                Op::I2c {
                    slave_sel: f.i2c_sel(),
                    sub_addr: f.sub_addr(),
                    data: f.data(),
                    low: f.low(),
                    high: f.high(),
                    write: f.rw(),
                }
            }
            OPCODE_DELAY => Op::Wait {
                cycles: format::Delay::new(bits).cycles(),
            },
            OPCODE_ADC => {
                let f = format::Adc::new(bits);
                Op::Adc {
                    dst: Reg::from_bits(f.dreg() as u32),
                    sar: if f.sar_sel() { SarAdc::Adc2 } else { SarAdc::Adc1 },
                    mux: f.mux(),
                }
            }
            OPCODE_ST => {
                if common.sub_opcode() as u32 != SUB_OPCODE_ST {
                    return Err(DecodeError::UnknownSubOpcode);
                }
                let f = format::Mem::new(bits);
                Op::St {
                    src: Reg::from_bits(f.dreg() as u32),
                    addr: Reg::from_bits(f.sreg() as u32),
                    offset: f.offset(),
                }
            }
            OPCODE_LD => {
                let f = format::Mem::new(bits);
                Op::Ld {
                    dst: Reg::from_bits(f.dreg() as u32),
                    addr: Reg::from_bits(f.sreg() as u32),
                    offset: f.offset(),
                }
            }
            OPCODE_ALU => Self::decode_alu(bits, common.sub_opcode() as u32)?,
            OPCODE_BRANCH => Self::decode_branch(bits, common.sub_opcode() as u32)?,
            OPCODE_END => {
                let f = format::End::new(bits);
                match common.sub_opcode() as u32 {
                    SUB_OPCODE_END if f.wakeup() => Op::Wake,
                    SUB_OPCODE_END => return Err(DecodeError::InvalidField),
                    SUB_OPCODE_SLEEP => Op::Sleep {
                        cycle_sel: f.cycle_sel(),
                    },
                    _ => return Err(DecodeError::UnknownSubOpcode),
                }
            }
            OPCODE_TSENS => {
                let f = format::Tsens::new(bits);
                Op::Tsens {
                    dst: Reg::from_bits(f.dreg() as u32),
                    wait_delay: f.wait_delay(),
                }
            }
            OPCODE_HALT => Op::Halt,
            OPCODE_MACRO => {
                let f = format::Macro::new(bits);
                Op::Macro(match f.sub_opcode() as u32 {
                    SUB_OPCODE_MACRO_LABEL => Macro::Label(f.label()),
                    SUB_OPCODE_MACRO_BRANCH => Macro::Branch(f.label()),
                    SUB_OPCODE_MACRO_LABELPC => Macro::LabelPc(f.label()),
                    _ => return Err(DecodeError::UnknownSubOpcode),
                })
            }
            _ => return Err(DecodeError::UnknownOpcode),
        };

        Ok(op)
    }

    fn decode_alu(bits: u32, sub_opcode: u32) -> Result<Self, DecodeError> {
        let f = format::Alu::new(bits);
        let dst = Reg::from_bits(f.dreg() as u32);
        let src = Reg::from_bits(f.sreg() as u32);

        Ok(match sub_opcode {
            SUB_OPCODE_ALU_REG => Op::AluReg {
                op: AluOp::from_bits(f.sel() as u32).ok_or(DecodeError::InvalidField)?,
                dst,
                src1: src,
                src2: Reg::from_bits(f.treg() as u32),
            },
            SUB_OPCODE_ALU_IMM => Op::AluImm {
                op: AluOp::from_bits(f.sel() as u32).ok_or(DecodeError::InvalidField)?,
                dst,
                src,
                imm: f.imm(),
            },
            SUB_OPCODE_ALU_CNT => Op::Stage {
                op: StageOp::from_bits(f.sel() as u32).ok_or(DecodeError::InvalidField)?,
                imm: f.stage_imm(),
            },
            _ => return Err(DecodeError::UnknownSubOpcode),
        })
    }

    fn decode_branch(bits: u32, sub_opcode: u32) -> Result<Self, DecodeError> {
        let f = format::Branch::new(bits);

        Ok(match sub_opcode {
            SUB_OPCODE_BX => Op::Jump {
                target: if f.bx_reg() {
                    JumpTarget::Reg(Reg::from_bits(f.bx_dreg() as u32))
                } else {
                    JumpTarget::Addr(f.bx_addr())
                },
                cond: JumpCondition::from_bits(f.bx_type() as u32).ok_or(DecodeError::InvalidField)?,
            },
            SUB_OPCODE_BR => Op::JumpR {
                offset: signed_offset(f.offset(), f.sign()),
                threshold: f.br_imm(),
                cond: if f.br_cmp() { R0Condition::Ge } else { R0Condition::Lt },
            },
            SUB_OPCODE_BS => Op::JumpS {
                offset: signed_offset(f.offset(), f.sign()),
                threshold: f.bs_imm(),
                cond: StageCondition::from_bits(f.bs_cmp() as u32).ok_or(DecodeError::InvalidField)?,
            },
            _ => return Err(DecodeError::UnknownSubOpcode),
        })
    }
}

fn cond_suffix(cond: JumpCondition) -> &'static str {
    match cond {
        JumpCondition::Always => "",
        JumpCondition::Zero => ", EQ",
        JumpCondition::Overflow => ", OV",
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::WrReg { addr, low, high, data } => {
                write!(f, "REG_WR {addr:#010x}, {high}, {low}, {data}")
            }
            Op::RdReg { addr, low, high } => write!(f, "REG_RD {addr:#010x}, {high}, {low}"),
            Op::I2c {
                slave_sel,
                sub_addr,
                data,
                low,
                high,
                write: true,
            } => write!(f, "I2C_WR {sub_addr:#04x}, {data}, {high}, {low}, {slave_sel}"),
            Op::I2c {
                slave_sel,
                sub_addr,
                low,
                high,
                ..
            } => write!(f, "I2C_RD {sub_addr:#04x}, {high}, {low}, {slave_sel}"),
            Op::Wait { cycles } => write!(f, "WAIT {cycles}"),
            Op::Adc { dst, sar, mux } => write!(f, "ADC {dst:?}, {}, {mux}", sar as u8),
            Op::St { src, addr, offset } => write!(f, "ST {src:?}, {addr:?}, {offset}"),
            Op::Ld { dst, addr, offset } => write!(f, "LD {dst:?}, {addr:?}, {offset}"),
            Op::AluReg {
                op: AluOp::Move,
                dst,
                src1,
                ..
            } => write!(f, "MOVE {dst:?}, {src1:?}"),
            Op::AluReg { op, dst, src1, src2 } => {
                write!(f, "{} {dst:?}, {src1:?}, {src2:?}", op.mnemonic())
            }
            Op::AluImm {
                op: AluOp::Move,
                dst,
                imm,
                ..
            } => write!(f, "MOVE {dst:?}, {imm}"),
            Op::AluImm { op, dst, src, imm } => {
                write!(f, "{} {dst:?}, {src:?}, {imm}", op.mnemonic())
            }
            Op::Stage { op: StageOp::Inc, imm } => write!(f, "STAGE_INC {imm}"),
            Op::Stage { op: StageOp::Dec, imm } => write!(f, "STAGE_DEC {imm}"),
            Op::Stage {
                op: StageOp::Reset, ..
            } => write!(f, "STAGE_RST"),
            Op::Jump {
                target: JumpTarget::Addr(addr),
                cond,
            } => write!(f, "JUMP {addr}{}", cond_suffix(cond)),
            Op::Jump {
                target: JumpTarget::Reg(reg),
                cond,
            } => write!(f, "JUMP {reg:?}{}", cond_suffix(cond)),
            Op::JumpR {
                offset,
                threshold,
                cond,
            } => {
                let cond = match cond {
                    R0Condition::Lt => "LT",
                    R0Condition::Ge => "GE",
                };
                write!(f, "JUMPR {offset:+}, {threshold}, {cond}")
            }
            Op::JumpS {
                offset,
                threshold,
                cond,
            } => {
                let cond = match cond {
                    StageCondition::Lt => "LT",
                    StageCondition::Ge => "GE",
                    StageCondition::Le => "LE",
                };
                write!(f, "JUMPS {offset:+}, {threshold}, {cond}")
            }
            Op::Wake => write!(f, "WAKE"),
            Op::Sleep { cycle_sel } => write!(f, "SLEEP {cycle_sel}"),
            Op::Tsens { dst, wait_delay } => write!(f, "TSENS {dst:?}, {wait_delay}"),
            Op::Halt => write!(f, "HALT"),
            Op::Macro(Macro::Label(label)) => write!(f, "LABEL {label}"),
            Op::Macro(Macro::Branch(label)) => write!(f, "BRANCH {label}"),
            Op::Macro(Macro::LabelPc(label)) => write!(f, "LABELPC {label}"),
        }
    }
}
