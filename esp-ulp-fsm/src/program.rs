//! # Program loader
//!
//! ## Overview
//!
//! Loads a table of [`Insn`]s into slow memory. Label macros are stripped
//! and the relocation macros are resolved on the way:
//!
//! - [`Insn::label`] records the address of the next real instruction.
//! - [`Insn::branch`] patches the following `JUMP` with the absolute label
//!   address, or the following `JUMPR` / `JUMPS` with the relative distance
//!   to the label.
//! - [`Insn::label_pc`] replaces the immediate of the following ALU
//!   immediate instruction with the label address.
//!
//! The whole program is validated before the first word is written, so a
//! failed load leaves memory untouched.
//!
//! ## Examples
//!
//! ```rust
//! use esp_ulp_fsm::{
//!     insn::{Insn, Reg},
//!     program::load_program,
//! };
//!
//! let mut mem = [0u32; 64];
//! let program = [
//!     Insn::movi(Reg::R0, 0),
//!     Insn::label(1),
//!     Insn::addi(Reg::R0, Reg::R0, 1),
//!     Insn::branch(1),
//!     Insn::bl(0, 5),
//!     Insn::halt(),
//! ];
//!
//! let words = load_program(&mut mem[..], 64, 8, &program).unwrap();
//! assert_eq!(words, 4);
//! // the branch at word 10 jumps back to word 9
//! assert_eq!(Insn::from_bits(mem[10]), Insn::bl(-1, 5));
//! ```

use heapless::FnvIndexMap;

use crate::{
    Error,
    insn::{JumpTarget, Macro, Op, format, Insn, MAX_BRANCH_OFFSET},
    memory::SlowMemory,
    soc::RTC_SLOW_MEM_WORDS,
};

/// Number of distinct labels a single program can define.
pub const MAX_LABELS: usize = 128;

type LabelTable = FnvIndexMap<u16, u16, MAX_LABELS>;

#[derive(Debug, Clone, Copy)]
enum Relocation {
    Branch(u16),
    LabelPc(u16),
}

/// Loads `program` at word `load_addr` of `mem`.
///
/// Only the first `reserved_words` words of `mem` may be used. Returns the
/// number of words written, which is the program length without macros.
/// The reservation may not exceed the [`RTC_SLOW_MEM_WORDS`] the ULP can
/// address.
pub fn load_program<M>(
    mem: &mut M,
    reserved_words: usize,
    load_addr: usize,
    program: &[Insn],
) -> Result<usize, Error>
where
    M: SlowMemory + ?Sized,
{
    if reserved_words > mem.len_words() || reserved_words > RTC_SLOW_MEM_WORDS {
        warn!("Reservation of {} words is not addressable by the ULP", reserved_words);
        return Err(Error::InvalidArgument);
    }

    let macros = program.iter().filter(|insn| insn.is_macro()).count();
    let size = program.len() - macros;

    if load_addr > reserved_words {
        warn!("Program load address {} is past the reserved {} words", load_addr, reserved_words);
        return Err(Error::SizeTooBig);
    }
    if load_addr + size > reserved_words {
        warn!(
            "Program of {} words at {} does not fit into the reserved {} words",
            size, load_addr, reserved_words
        );
        return Err(Error::SizeTooBig);
    }

    let labels = collect_labels(program, load_addr)?;

    // dry run, every error surfaces here
    relocate(program, load_addr, &labels, |_, _| {})?;

    let loaded = relocate(program, load_addr, &labels, |pc, insn| {
        mem.write_word(pc, insn.bits());
    })?;

    debug!(
        "Loaded {} words at {}, {} macros, {} labels",
        loaded,
        load_addr,
        macros,
        labels.len()
    );

    Ok(loaded)
}

fn decode_macro(insn: Insn) -> Result<Macro, Error> {
    match insn.decode() {
        Ok(Op::Macro(m)) => Ok(m),
        _ => Err(Error::InvalidMacro),
    }
}

fn collect_labels(program: &[Insn], load_addr: usize) -> Result<LabelTable, Error> {
    let mut labels = LabelTable::new();
    let mut pc = load_addr;

    if program.last().is_some_and(|insn| insn.is_macro()) {
        warn!("Program ends with a macro");
        return Err(Error::TrailingMacro);
    }

    for &insn in program {
        if !insn.is_macro() {
            pc += 1;
            continue;
        }

        if let Macro::Label(label) = decode_macro(insn)? {
            // the reservation is at most 2048 words, so pc fits in 11 bits
            let pc = pc as u16;
            match labels.insert(label, pc) {
                Ok(None) => trace!("Label {} at {}", label, pc),
                Ok(Some(_)) => {
                    warn!("Label {} defined twice", label);
                    return Err(Error::DuplicateLabel);
                }
                Err(_) => return Err(Error::TooManyLabels),
            }
        }
    }

    Ok(labels)
}

fn relocate(
    program: &[Insn],
    load_addr: usize,
    labels: &LabelTable,
    mut emit: impl FnMut(usize, Insn),
) -> Result<usize, Error> {
    let mut pending = None;
    let mut pc = load_addr;

    for &insn in program {
        if insn.is_macro() {
            let relocation = match decode_macro(insn)? {
                Macro::Label(_) => continue,
                Macro::Branch(label) => Relocation::Branch(label),
                Macro::LabelPc(label) => Relocation::LabelPc(label),
            };
            if pending.replace(relocation).is_some() {
                warn!("Two relocation macros in front of the instruction at {}", pc);
                return Err(Error::InvalidRelocation);
            }
            continue;
        }

        let insn = match pending.take() {
            Some(relocation) => patch(insn, relocation, pc, labels)?,
            None => insn,
        };
        emit(pc, insn);
        pc += 1;
    }

    Ok(pc - load_addr)
}

fn patch(insn: Insn, relocation: Relocation, pc: usize, labels: &LabelTable) -> Result<Insn, Error> {
    let label = match relocation {
        Relocation::Branch(label) | Relocation::LabelPc(label) => label,
    };
    let Some(&target) = labels.get(&label) else {
        warn!("Label {} referenced at {} is not defined", label, pc);
        return Err(Error::UndefinedLabel);
    };

    let bits = match (relocation, insn.decode()) {
        (
            Relocation::Branch(_),
            Ok(Op::Jump {
                target: JumpTarget::Addr(_),
                ..
            }),
        ) => {
            let mut f = format::Branch::new(insn.bits());
            f.set_bx_addr(target);
            f.bits()
        }
        (Relocation::Branch(_), Ok(Op::JumpR { .. } | Op::JumpS { .. })) => {
            let offset = target as isize - pc as isize;
            if offset.unsigned_abs() > MAX_BRANCH_OFFSET as usize {
                warn!("Branch at {} to label {} is out of range", pc, label);
                return Err(Error::BranchOutOfRange);
            }
            let mut f = format::Branch::new(insn.bits());
            f.set_offset(offset.unsigned_abs() as u8);
            f.set_sign(offset < 0);
            f.bits()
        }
        (Relocation::LabelPc(_), Ok(Op::AluImm { .. })) => {
            let mut f = format::Alu::new(insn.bits());
            f.set_imm(target);
            f.bits()
        }
        _ => {
            warn!("Instruction at {} cannot be relocated", pc);
            return Err(Error::InvalidRelocation);
        }
    };

    Ok(Insn::from_bits(bits))
}
