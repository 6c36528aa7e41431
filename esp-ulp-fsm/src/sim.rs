//! # Host model of the RTC domain
//!
//! ## Overview
//!
//! [`SimRtc`] models the parts of the ESP32 RTC domain the ULP works with:
//!
//! - the RTC_CNTL, RTC_IO, SENS and RTC_I2C register blocks, with the side
//!   effects of the interrupt and GPIO set/clear registers,
//! - the 8 KiB of RTC slow memory,
//! - the ULP FSM core, including its sleep timer,
//! - the deep sleep state of the main CPU,
//! - the analog inputs (SAR ADCs, temperature sensor) and the registers of
//!   the RTC I2C slaves, which tests set up directly.
//!
//! It implements [`RegisterBus`] and [`SlowMemory`], so the
//! [`UlpFsm`](crate::fsm::UlpFsm) driver works on it unchanged. Time only
//! advances in [`SimRtc::run_period`], which lets the sleep timer expire once
//! and runs the program to its `HALT`.
//!
//! Instruction timing follows the cycle counts of the ESP32 technical
//! reference manual where it gives fixed numbers. ADC and I2C transfers are
//! modelled with a fixed cost.

use embedded_hal::delay::DelayNs;

use crate::{
    bus::RegisterBus,
    insn::{
        AluOp,
        Insn,
        JumpCondition,
        JumpTarget,
        Op,
        R0Condition,
        SarAdc,
        StageCondition,
        StageOp,
        SLEEP_CYCLE_REGISTERS,
    },
    memory::SlowMemory,
    soc::{self, RTC_SLOW_MEM_WORDS, rtc_cntl, rtc_io, sens},
};

/// Default instruction budget of one period.
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

const PERIPHERALS: usize = 4;
const PERIPHERAL_WORDS: usize = 256;
const I2C_SLAVES: usize = 8;
const ADC_CHANNELS: usize = 10;

const GPIO_OUT_MASK: u32 = rtc_io::RTC_GPIO_OUT_DATA_V << rtc_io::RTC_GPIO_OUT_DATA_S;

/// Errors of the simulated core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimError {
    /// The ULP timer is not enabled, the core never starts.
    TimerDisabled,
    /// The word at `pc` is not an instruction the core executes.
    InvalidInstruction {
        /// Word address of the instruction.
        pc: u16,
        /// The instruction word.
        bits: u32,
    },
    /// Execution left RTC slow memory.
    PcOutOfRange {
        /// The offending program counter.
        pc: i32,
    },
    /// The program did not reach `HALT` within the instruction budget.
    StepLimit,
}

impl core::error::Error for SimError {}

/// Architectural state of the ULP FSM core.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Core {
    /// Program counter, in words.
    pub pc: u16,
    /// General purpose registers R0 to R3.
    pub regs: [u16; 4],
    /// Stage counter.
    pub stage: u8,
    /// Result of the last ALU operation was zero.
    pub zero: bool,
    /// Last ALU operation overflowed.
    pub overflow: bool,
    /// Sleep cycle register timing the next period.
    pub sleep_cycle_sel: u8,
    /// Core clock cycles spent executing, over all periods.
    pub cycles: u64,
}

/// Report of one ULP period.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Period {
    /// Slow clock cycles the timer slept before starting the program.
    pub sleep_cycles: u32,
    /// Entry point the program started at.
    pub entry: u16,
    /// Instructions executed, including the final `HALT`.
    pub instructions: usize,
    /// Core clock cycles spent executing.
    pub cycles: u64,
    /// The program executed `WAKE`.
    pub wake: bool,
    /// A `WAKE` brought the main CPU out of deep sleep.
    pub woke_cpu: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Jump(i32),
    Halt,
}

/// The ESP32 RTC domain with its ULP coprocessor.
#[derive(Debug, Clone)]
pub struct SimRtc {
    regs: [[u32; PERIPHERAL_WORDS]; PERIPHERALS],
    memory: [u32; RTC_SLOW_MEM_WORDS],
    adc: [[u16; ADC_CHANNELS]; 2],
    temperature: u16,
    i2c: [[u8; 256]; I2C_SLAVES],
    core: Core,
    step_limit: usize,
}

impl Default for SimRtc {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRtc {
    /// RTC domain out of reset, with cleared slow memory.
    pub fn new() -> Self {
        let mut this = Self {
            regs: [[0; PERIPHERAL_WORDS]; PERIPHERALS],
            memory: [0; RTC_SLOW_MEM_WORDS],
            adc: [[0; ADC_CHANNELS]; 2],
            temperature: 0,
            i2c: [[0; 256]; I2C_SLAVES],
            core: Core::default(),
            step_limit: DEFAULT_STEP_LIMIT,
        };

        this.store(rtc_cntl::TIMER2, rtc_cntl::TIMER2_RESET);
        this.store(rtc_cntl::TIMER5, rtc_cntl::TIMER5_RESET);
        this.store(rtc_cntl::WAKEUP_STATE, rtc_cntl::WAKEUP_STATE_RESET);
        this.store(sens::SAR_START_FORCE, sens::SAR_START_FORCE_RESET);
        for index in 0..sens::ULP_CP_SLEEP_CYC_COUNT {
            this.store(sens::ulp_cp_sleep_cyc(index), sens::ULP_CP_SLEEP_CYC_RESET);
        }

        this
    }

    /// Sets the instruction budget of one period.
    pub fn set_step_limit(&mut self, limit: usize) {
        self.step_limit = limit;
    }

    /// The core state.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Mutable core state.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    /// Sets the value the ULP reads from `channel` of `sar`.
    pub fn set_adc_reading(&mut self, sar: SarAdc, channel: u8, value: u16) {
        assert!(channel < sar.channels(), "ADC channel out of range");
        self.adc[sar as usize][channel as usize] = value;
    }

    /// Sets the code the ULP reads from the temperature sensor.
    pub fn set_temperature(&mut self, code: u16) {
        self.temperature = code;
    }

    /// Register `sub_addr` of the I2C slave selected by `slave_sel`.
    pub fn i2c_register(&self, slave_sel: u8, sub_addr: u8) -> u8 {
        self.i2c[slave_sel as usize][sub_addr as usize]
    }

    /// Sets register `sub_addr` of the I2C slave selected by `slave_sel`.
    pub fn set_i2c_register(&mut self, slave_sel: u8, sub_addr: u8, value: u8) {
        self.i2c[slave_sel as usize][sub_addr as usize] = value;
    }

    /// The output level of RTC GPIO `pin`.
    pub fn rtc_gpio_level(&self, pin: u8) -> bool {
        assert!(pin < 18, "RTC GPIO out of range");
        self.read_field(
            rtc_io::RTC_GPIO_OUT,
            rtc_io::RTC_GPIO_OUT_DATA_V,
            rtc_io::RTC_GPIO_OUT_DATA_S,
        ) & (1 << pin)
            != 0
    }

    /// Puts the main CPU into deep sleep.
    ///
    /// Clears the wakeup cause of the previous wakeup.
    pub fn enter_deep_sleep(&mut self) {
        self.write_field(
            rtc_cntl::WAKEUP_STATE,
            rtc_cntl::WAKEUP_CAUSE_V,
            rtc_cntl::WAKEUP_CAUSE_S,
            0,
        );
        self.set_bits(rtc_cntl::STATE0, rtc_cntl::SLEEP_EN);
    }

    /// Returns `true` while the main CPU is in deep sleep.
    pub fn is_cpu_asleep(&self) -> bool {
        self.read(rtc_cntl::STATE0) & rtc_cntl::SLEEP_EN != 0
    }

    fn slot(addr: u32) -> Option<(usize, usize)> {
        soc::ulp_register(addr).map(|(periph, word)| (periph as usize, word as usize))
    }

    fn load(&self, addr: u32) -> u32 {
        match Self::slot(addr) {
            Some((periph, word)) => self.regs[periph][word],
            None => 0,
        }
    }

    fn store(&mut self, addr: u32, value: u32) {
        if let Some((periph, word)) = Self::slot(addr) {
            self.regs[periph][word] = value;
        }
    }

    /// Lets the sleep timer expire once and runs the program until `HALT`.
    pub fn run_period(&mut self) -> Result<Period, SimError> {
        if self.read(rtc_cntl::STATE0) & rtc_cntl::ULP_CP_SLP_TIMER_EN == 0 {
            return Err(SimError::TimerDisabled);
        }

        let sleep_cycles = self.read(sens::ulp_cp_sleep_cyc(self.core.sleep_cycle_sel as usize));
        let entry = self.read_field(sens::SAR_START_FORCE, sens::PC_INIT_V, sens::PC_INIT_S) as u16;

        let mut period = Period {
            sleep_cycles,
            entry,
            ..Default::default()
        };

        self.core.pc = entry;
        loop {
            if period.instructions == self.step_limit {
                return Err(SimError::StepLimit);
            }

            let pc = self.core.pc;
            let insn = self.fetch(pc)?;
            let op = insn.decode().map_err(|_| SimError::InvalidInstruction {
                pc,
                bits: insn.bits(),
            })?;

            let flow = self.execute(pc, insn, op, &mut period)?;
            let cycles = cost(&op);
            period.instructions += 1;
            period.cycles += cycles as u64;
            self.core.cycles += cycles as u64;

            let next = match flow {
                Flow::Next => pc as i32 + 1,
                Flow::Jump(target) => target,
                Flow::Halt => break,
            };
            if !(0..RTC_SLOW_MEM_WORDS as i32).contains(&next) {
                return Err(SimError::PcOutOfRange { pc: next });
            }
            self.core.pc = next as u16;
        }

        trace!(
            "ULP period: {} instructions, {} cycles, wake {}",
            period.instructions, period.cycles, period.wake
        );

        Ok(period)
    }

    fn fetch(&self, pc: u16) -> Result<Insn, SimError> {
        match self.memory.get(pc as usize) {
            Some(word) => Ok(Insn::from_bits(*word)),
            None => Err(SimError::PcOutOfRange { pc: pc as i32 }),
        }
    }

    fn reg(&self, reg: crate::insn::Reg) -> u16 {
        self.core.regs[reg.index()]
    }

    fn set_reg(&mut self, reg: crate::insn::Reg, value: u16) {
        self.core.regs[reg.index()] = value;
    }

    fn execute(&mut self, pc: u16, insn: Insn, op: Op, period: &mut Period) -> Result<Flow, SimError> {
        let invalid = SimError::InvalidInstruction {
            pc,
            bits: insn.bits(),
        };

        match op {
            Op::WrReg { addr, low, high, data } => {
                if low > high {
                    return Err(invalid);
                }
                let mask = field_mask(low, high);
                self.modify(addr, |r| (r & !mask) | (((data as u32) << low) & mask));
            }
            Op::RdReg { addr, low, high } => {
                if low > high {
                    return Err(invalid);
                }
                let value = (self.read(addr) & field_mask(low, high)) >> low;
                self.core.regs[0] = value as u16;
            }
            Op::I2c {
                slave_sel,
                sub_addr,
                data,
                low,
                high,
                write,
            } => {
                if slave_sel as usize >= I2C_SLAVES || low > high {
                    return Err(invalid);
                }
                let mask = field_mask(low, high) as u8;
                let register = &mut self.i2c[slave_sel as usize][sub_addr as usize];
                if write {
                    *register = (*register & !mask) | ((data << low) & mask);
                } else {
                    self.core.regs[0] = ((*register & mask) >> low) as u16;
                }
            }
            Op::Wait { .. } => {}
            Op::Adc { dst, sar, mux } => {
                if mux == 0 || mux > sar.channels() {
                    return Err(invalid);
                }
                let value = self.adc[sar as usize][mux as usize - 1];
                self.set_reg(dst, value);
            }
            Op::Tsens { dst, .. } => self.set_reg(dst, self.temperature),
            Op::St { src, addr, offset } => {
                let index = (self.reg(addr) as usize + offset as usize) & 0x7ff;
                let word = ((pc as u32 & 0x7ff) << 21) | ((addr.index() as u32) << 16) | self.reg(src) as u32;
                self.memory[index] = word;
            }
            Op::Ld { dst, addr, offset } => {
                let index = (self.reg(addr) as usize + offset as usize) & 0x7ff;
                self.set_reg(dst, self.memory[index] as u16);
            }
            Op::AluReg { op, dst, src1, src2 } => {
                let result = self.alu(op, self.reg(src1), self.reg(src2));
                self.set_reg(dst, result);
            }
            Op::AluImm { op, dst, src, imm } => {
                let a = match op {
                    AluOp::Move => imm,
                    _ => self.reg(src),
                };
                let result = self.alu(op, a, imm);
                self.set_reg(dst, result);
            }
            Op::Stage { op, imm } => {
                self.core.stage = match op {
                    StageOp::Inc => self.core.stage.wrapping_add(imm),
                    StageOp::Dec => self.core.stage.wrapping_sub(imm),
                    StageOp::Reset => 0,
                };
            }
            Op::Jump { target, cond } => {
                let taken = match cond {
                    JumpCondition::Always => true,
                    JumpCondition::Zero => self.core.zero,
                    JumpCondition::Overflow => self.core.overflow,
                };
                if taken {
                    let target = match target {
                        JumpTarget::Addr(addr) => addr,
                        JumpTarget::Reg(reg) => self.reg(reg) & 0x7ff,
                    };
                    return Ok(Flow::Jump(target as i32));
                }
            }
            Op::JumpR {
                offset,
                threshold,
                cond,
            } => {
                let r0 = self.core.regs[0];
                let taken = match cond {
                    R0Condition::Lt => r0 < threshold,
                    R0Condition::Ge => r0 >= threshold,
                };
                if taken {
                    return Ok(Flow::Jump(pc as i32 + offset as i32));
                }
            }
            Op::JumpS {
                offset,
                threshold,
                cond,
            } => {
                let stage = self.core.stage;
                let taken = match cond {
                    StageCondition::Lt => stage < threshold,
                    StageCondition::Ge => stage >= threshold,
                    StageCondition::Le => stage <= threshold,
                };
                if taken {
                    return Ok(Flow::Jump(pc as i32 + offset as i32));
                }
            }
            Op::Wake => self.wake(period),
            Op::Sleep { cycle_sel } => {
                if cycle_sel >= SLEEP_CYCLE_REGISTERS {
                    return Err(invalid);
                }
                self.core.sleep_cycle_sel = cycle_sel;
            }
            Op::Halt => return Ok(Flow::Halt),
            Op::Macro(_) => return Err(invalid),
        }

        Ok(Flow::Next)
    }

    fn alu(&mut self, op: AluOp, a: u16, b: u16) -> u16 {
        let (result, overflow) = match op {
            AluOp::Add => a.overflowing_add(b),
            AluOp::Sub => a.overflowing_sub(b),
            AluOp::And => (a & b, false),
            AluOp::Or => (a | b, false),
            AluOp::Move => (a, false),
            AluOp::Lsh => (a.checked_shl(b as u32).unwrap_or(0), false),
            AluOp::Rsh => (a.checked_shr(b as u32).unwrap_or(0), false),
        };

        self.core.zero = result == 0;
        self.core.overflow = overflow;
        result
    }

    fn wake(&mut self, period: &mut Period) {
        period.wake = true;

        let ulp_enabled = self.read_field(
            rtc_cntl::WAKEUP_STATE,
            rtc_cntl::WAKEUP_ENA_V,
            rtc_cntl::WAKEUP_ENA_S,
        ) & soc::RTC_ULP_TRIG_EN
            != 0;

        if self.is_cpu_asleep() && ulp_enabled {
            self.set_bits(
                rtc_cntl::WAKEUP_STATE,
                soc::RTC_ULP_TRIG_EN << rtc_cntl::WAKEUP_CAUSE_S,
            );
            self.clear_bits(rtc_cntl::STATE0, rtc_cntl::SLEEP_EN);
            period.woke_cpu = true;
            debug!("ULP woke the main CPU");
        } else {
            self.set_bits(rtc_cntl::INT_RAW, rtc_cntl::ULP_CP_INT);
        }
    }
}

fn field_mask(low: u8, high: u8) -> u32 {
    let width = (high - low) as u32 + 1;
    (((1u64 << width) - 1) << low) as u32
}

fn cost(op: &Op) -> u32 {
    match *op {
        Op::WrReg { .. } => 12,
        Op::RdReg { .. } => 8,
        Op::I2c { .. } => 120,
        Op::Wait { cycles } => 2 + cycles as u32,
        Op::Adc { .. } => 24,
        Op::Tsens { wait_delay, .. } => 2 + wait_delay as u32,
        Op::St { .. } | Op::Ld { .. } => 8,
        Op::AluReg { .. } | Op::AluImm { .. } | Op::Stage { .. } => 6,
        Op::Jump { .. } | Op::JumpR { .. } | Op::JumpS { .. } => 4,
        Op::Wake | Op::Sleep { .. } | Op::Halt => 2,
        Op::Macro(_) => 0,
    }
}

impl RegisterBus for SimRtc {
    fn read(&self, addr: u32) -> u32 {
        match addr {
            rtc_cntl::INT_ST => self.load(rtc_cntl::INT_RAW) & self.load(rtc_cntl::INT_ENA),
            rtc_cntl::INT_CLR | rtc_io::RTC_GPIO_OUT_W1TS | rtc_io::RTC_GPIO_OUT_W1TC => 0,
            _ => self.load(addr),
        }
    }

    fn write(&mut self, addr: u32, value: u32) {
        match addr {
            rtc_cntl::INT_CLR => {
                let raw = self.load(rtc_cntl::INT_RAW);
                self.store(rtc_cntl::INT_RAW, raw & !value);
            }
            rtc_cntl::INT_ST => {}
            rtc_io::RTC_GPIO_OUT_W1TS => {
                let out = self.load(rtc_io::RTC_GPIO_OUT);
                self.store(rtc_io::RTC_GPIO_OUT, out | (value & GPIO_OUT_MASK));
            }
            rtc_io::RTC_GPIO_OUT_W1TC => {
                let out = self.load(rtc_io::RTC_GPIO_OUT);
                self.store(rtc_io::RTC_GPIO_OUT, out & !(value & GPIO_OUT_MASK));
            }
            _ => self.store(addr, value),
        }
    }
}

impl SlowMemory for SimRtc {
    fn len_words(&self) -> usize {
        RTC_SLOW_MEM_WORDS
    }

    fn read_word(&self, index: usize) -> u32 {
        self.memory[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.memory[index] = value;
    }

    fn write_words(&mut self, index: usize, words: &[u32]) {
        self.memory[index..][..words.len()].copy_from_slice(words);
    }
}

/// A [`DelayNs`] that returns immediately, time is simulated anyway.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::Reg;

    fn sim_with(program: &[Insn]) -> SimRtc {
        let mut sim = SimRtc::new();
        for (i, insn) in program.iter().enumerate() {
            sim.write_word(i, insn.bits());
        }
        sim.set_bits(rtc_cntl::STATE0, rtc_cntl::ULP_CP_SLP_TIMER_EN);
        sim
    }

    #[test]
    fn reset_values() {
        let sim = SimRtc::new();

        assert_eq!(sim.read(rtc_cntl::TIMER2) >> rtc_cntl::ULPCP_TOUCH_START_WAIT_S, 0x10);
        assert_eq!(sim.read(rtc_cntl::TIMER5) >> rtc_cntl::MIN_SLP_VAL_S & 0xff, 0x80);
        assert_eq!(sim.read(sens::ulp_cp_sleep_cyc(3)), 200);
        assert_ne!(sim.read(sens::SAR_START_FORCE) & sens::ULP_CP_FORCE_START_TOP, 0);
        assert!(!sim.is_cpu_asleep());
    }

    #[test]
    fn register_side_effects() {
        let mut sim = SimRtc::new();

        sim.write(rtc_cntl::INT_RAW, rtc_cntl::ULP_CP_INT | 1);
        assert_eq!(sim.read(rtc_cntl::INT_ST), 0);
        sim.write(rtc_cntl::INT_ENA, rtc_cntl::ULP_CP_INT);
        assert_eq!(sim.read(rtc_cntl::INT_ST), rtc_cntl::ULP_CP_INT);
        sim.write(rtc_cntl::INT_CLR, rtc_cntl::ULP_CP_INT);
        assert_eq!(sim.read(rtc_cntl::INT_RAW), 1);

        sim.write(rtc_io::RTC_GPIO_OUT_W1TS, 0b101 << rtc_io::RTC_GPIO_OUT_DATA_S | 1);
        assert!(sim.rtc_gpio_level(0) && !sim.rtc_gpio_level(1) && sim.rtc_gpio_level(2));
        assert_eq!(sim.read(rtc_io::RTC_GPIO_OUT) & 1, 0);
        sim.write(rtc_io::RTC_GPIO_OUT_W1TC, 1 << rtc_io::RTC_GPIO_OUT_DATA_S);
        assert!(!sim.rtc_gpio_level(0) && sim.rtc_gpio_level(2));
        assert_eq!(sim.read(rtc_io::RTC_GPIO_OUT_W1TS), 0);

        // outside the RTC peripherals
        sim.write(0x3ff4_0000, 1);
        assert_eq!(sim.read(0x3ff4_0000), 0);
    }

    #[test]
    fn alu_flags() {
        let mut sim = sim_with(&[
            Insn::movi(Reg::R0, 0xffff),
            Insn::addi(Reg::R1, Reg::R0, 1),
            Insn::jump(4, JumpCondition::Overflow),
            Insn::halt(),
            Insn::subi(Reg::R2, Reg::R1, 1),
            Insn::jump(7, JumpCondition::Overflow),
            Insn::halt(),
            Insn::movi(Reg::R3, 0x8001),
            Insn::lshi(Reg::R3, Reg::R3, 1),
            Insn::rshi(Reg::R0, Reg::R0, 12),
            Insn::halt(),
        ]);

        let period = sim.run_period().unwrap();
        assert_eq!(sim.core().regs, [0x000f, 0, 0xffff, 0x0002]);
        assert!(!sim.core().overflow && !sim.core().zero);
        assert_eq!(period.instructions, 9);
        assert_eq!(period.cycles, 6 * 6 + 2 * 4 + 2);
        assert_eq!(period.sleep_cycles, 200);
    }

    #[test]
    fn move_copies_the_source_register() {
        let mut sim = sim_with(&[
            Insn::movi(Reg::R2, 7),
            Insn::movi(Reg::R0, 3),
            Insn::movr(Reg::R1, Reg::R2),
            Insn::movr(Reg::R3, Reg::R0),
            Insn::halt(),
        ]);

        sim.run_period().unwrap();
        assert_eq!(sim.core().regs, [3, 7, 7, 3]);
    }

    #[test]
    fn long_period_counts_cycles_past_u32() {
        let mut sim = sim_with(&[
            Insn::stage_rst(),
            Insn::movi(Reg::R0, 0),
            Insn::delay(0xffff),
            Insn::addi(Reg::R0, Reg::R0, 1),
            Insn::bl(-2, 1000),
            Insn::stage_inc(1),
            Insn::jumps(-5, 70, StageCondition::Lt),
            Insn::halt(),
        ]);
        sim.set_step_limit(1_000_000);

        let period = sim.run_period().unwrap();
        assert_eq!(period.instructions, 1 + 70 * (3 + 3 * 1000) + 1);
        assert_eq!(period.cycles, 6 + 70 * (16 + 1000 * (65537 + 6 + 4)) + 2);
        assert!(period.cycles > u32::MAX as u64);
        assert_eq!(sim.core().cycles, period.cycles);
    }

    #[test]
    fn store_stamps_pc_and_register() {
        let mut sim = sim_with(&[
            Insn::movi(Reg::R2, 0x300),
            Insn::movi(Reg::R1, 0xbeef),
            Insn::st(Reg::R1, Reg::R2, 4),
            Insn::ld(Reg::R3, Reg::R2, 4),
            Insn::halt(),
        ]);

        sim.run_period().unwrap();
        assert_eq!(sim.read_word(0x304), 2 << 21 | 2 << 16 | 0xbeef);
        assert_eq!(sim.store_pc(0x304), 2);
        assert_eq!(sim.core().regs[3], 0xbeef);
    }

    #[test]
    fn reports_errors() {
        let mut sim = SimRtc::new();
        assert_eq!(sim.run_period(), Err(SimError::TimerDisabled));

        let mut sim = sim_with(&[Insn::movi(Reg::R0, 1), Insn::from_bits(0)]);
        assert_eq!(
            sim.run_period(),
            Err(SimError::InvalidInstruction { pc: 1, bits: 0 })
        );

        let mut sim = sim_with(&[Insn::label(1)]);
        assert_eq!(
            sim.run_period(),
            Err(SimError::InvalidInstruction {
                pc: 0,
                bits: Insn::label(1).bits()
            })
        );

        let mut sim = sim_with(&[Insn::bl(-1, 1)]);
        assert_eq!(sim.run_period(), Err(SimError::PcOutOfRange { pc: -1 }));

        let mut sim = sim_with(&[Insn::jump(0, JumpCondition::Always)]);
        sim.set_step_limit(50);
        assert_eq!(sim.run_period(), Err(SimError::StepLimit));
    }

    #[test]
    fn field_masks() {
        assert_eq!(field_mask(0, 31), u32::MAX);
        assert_eq!(field_mask(4, 7), 0xf0);
        assert_eq!(field_mask(31, 31), 1 << 31);
    }
}
