//! Loader Tests
//!
//! Program tables and binary images loaded through the driver.

use esp_ulp_fsm::{
    Error,
    SlowMemory,
    binary::{BINARY_MAGIC, HEADER_SIZE},
    fsm::{Config, UlpFsm},
    insn::{Insn, Reg},
    sim::{NoDelay, SimRtc},
};

fn image(text: &[Insn], data: &[u16], bss_words: u16) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(&BINARY_MAGIC.to_le_bytes());
    image.extend_from_slice(&(HEADER_SIZE as u16).to_le_bytes());
    image.extend_from_slice(&(text.len() as u16 * 4).to_le_bytes());
    image.extend_from_slice(&(data.len() as u16 * 4).to_le_bytes());
    image.extend_from_slice(&(bss_words * 4).to_le_bytes());

    for insn in text {
        image.extend_from_slice(&insn.to_le_bytes());
    }
    for word in data {
        image.extend_from_slice(&(*word as u32).to_le_bytes());
    }

    image
}

#[test]
fn test_binary_runs() {
    // text at word 0, `counter` in data at word 6, `result` in bss at word 7
    const TEXT: &[Insn] = &[
        Insn::movi(Reg::R3, 6),
        Insn::ld(Reg::R0, Reg::R3, 0),
        Insn::addi(Reg::R0, Reg::R0, 5),
        Insn::st(Reg::R0, Reg::R3, 0),
        Insn::st(Reg::R0, Reg::R3, 1),
        Insn::halt(),
    ];

    let mut rtc = SimRtc::new();
    rtc.fill_bytes(0, 64, 0xa5);

    let mut ulp = UlpFsm::new(&mut rtc, Config::default()).unwrap();
    let image = image(TEXT, &[37], 2);
    let header = ulp.load_binary(0, &image).unwrap();
    assert_eq!(header.load_size(), 4 * (6 + 1 + 2));

    assert_eq!(ulp.rtc().read_u16(6), 37);
    assert_eq!(ulp.rtc().read_word(7), 0);
    assert_eq!(ulp.rtc().read_word(8), 0);
    assert_eq!(ulp.rtc().read_word(9), 0xa5a5_a5a5);

    ulp.run(0, &mut NoDelay).unwrap();
    ulp.rtc_mut().run_period().unwrap();
    ulp.rtc_mut().run_period().unwrap();

    assert_eq!(ulp.rtc().read_u16(6), 47);
    assert_eq!(ulp.rtc().read_u16(7), 47);
}

#[test]
fn test_binary_at_offset() {
    const TEXT: &[Insn] = &[Insn::movi(Reg::R2, 0x77), Insn::halt()];

    let mut rtc = SimRtc::new();
    let mut ulp = UlpFsm::new(&mut rtc, Config::default()).unwrap();

    ulp.load_binary(32, &image(TEXT, &[], 0)).unwrap();
    assert_eq!(ulp.rtc().read_word(32), TEXT[0].bits());

    ulp.run(32, &mut NoDelay).unwrap();
    ulp.rtc_mut().run_period().unwrap();
    assert_eq!(ulp.rtc().core().regs[2], 0x77);
}

#[test]
fn test_binary_rejected_without_writes() {
    let text = [Insn::halt(); 4];
    let mut rtc = SimRtc::new();
    let mut ulp = UlpFsm::new(&mut rtc, Config::default().with_reserved_memory(32)).unwrap();

    let mut bad_magic = image(&text, &[], 0);
    bad_magic[0] = b'U';
    assert_eq!(ulp.load_binary(0, &bad_magic), Err(Error::InvalidMagic));

    let mut truncated = image(&text, &[], 0);
    truncated.pop();
    assert_eq!(ulp.load_binary(0, &truncated), Err(Error::InvalidSize));

    assert_eq!(ulp.load_binary(0, &image(&text, &[], 5)), Err(Error::SizeTooBig));
    assert_eq!(ulp.load_binary(9, &image(&text, &[], 0)), Err(Error::LoadAddressOutOfRange));

    assert!((0..64).all(|index| ulp.rtc().read_word(index) == 0));

    assert_eq!(ulp.load_binary(0, &image(&text, &[], 4)).map(|h| h.bss_size), Ok(16));
}

#[test]
fn test_program_rejected_without_writes() {
    let mut rtc = SimRtc::new();
    let mut ulp = UlpFsm::new(&mut rtc, Config::default()).unwrap();

    let undefined = [Insn::branch(3), Insn::bl(0, 1), Insn::halt()];
    assert_eq!(ulp.load_program(0, &undefined), Err(Error::UndefinedLabel));

    let duplicate = [Insn::label(1), Insn::halt(), Insn::label(1), Insn::halt()];
    assert_eq!(ulp.load_program(0, &duplicate), Err(Error::DuplicateLabel));

    let trailing = [Insn::halt(), Insn::label(1)];
    assert_eq!(ulp.load_program(0, &trailing), Err(Error::TrailingMacro));

    let unpatchable = [Insn::label(1), Insn::branch(1), Insn::halt()];
    assert_eq!(ulp.load_program(0, &unpatchable), Err(Error::InvalidRelocation));

    assert_eq!(ulp.load_program(200, &[Insn::halt()]), Err(Error::SizeTooBig));

    assert!((0..256).all(|index| ulp.rtc().read_word(index) == 0));
}

#[test]
fn test_macros_take_no_space() {
    const PROGRAM: &[Insn] = &[
        Insn::label(1),
        Insn::movi(Reg::R0, 0),
        Insn::label(2),
        Insn::label(3),
        Insn::addi(Reg::R0, Reg::R0, 1),
        Insn::branch(2),
        Insn::bl(0, 4),
        Insn::halt(),
    ];

    let mut rtc = SimRtc::new();
    let mut ulp = UlpFsm::new(&mut rtc, Config::default()).unwrap();

    assert_eq!(ulp.load_program(4, PROGRAM), Ok(4));
    assert_eq!(ulp.rtc().read_word(7), Insn::halt().bits());
    assert_eq!(ulp.rtc().read_word(6), Insn::bl(-1, 4).bits());
    assert_eq!(ulp.rtc().read_word(8), 0);
}
