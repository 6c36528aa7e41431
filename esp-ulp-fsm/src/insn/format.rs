//! Bitfield views of the instruction formats.
//!
//! Fields with a setter are the ones the loader patches while resolving
//! labels.

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    pub struct Common(u32);

    pub u8, sub_opcode, _: 27, 25;
    pub u8, opcode    , _: 31, 28;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    // REG_WR and REG_RD
    pub struct RegAccess(u32);

    pub u8, addr      , _: 7, 0;
    pub u8, periph_sel, _: 9, 8;
    pub u8, data      , _: 17, 10;
    pub u8, low       , _: 22, 18;
    pub u8, high      , _: 27, 23;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    pub struct I2c(u32);

    pub u8,   sub_addr, _: 7, 0;
    pub u8,   data    , _: 15, 8;
    pub u8,   low     , _: 18, 16;
    pub u8,   high    , _: 21, 19;
    pub u8,   i2c_sel , _: 25, 22;
    pub bool, rw      , _: 27;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    pub struct Delay(u32);

    pub u16, cycles, _: 15, 0;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    pub struct Adc(u32);

    pub u8,   dreg   , _: 1, 0;
    pub u8,   mux    , _: 5, 2;
    pub bool, sar_sel, _: 6;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    // ST and LD
    pub struct Mem(u32);

    pub u8,  dreg  , _: 1, 0;
    pub u8,  sreg  , _: 3, 2;
    pub u16, offset, _: 20, 10;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    // register, immediate and stage counter forms
    pub struct Alu(u32);

    pub u8,  dreg     , _       : 1, 0;
    pub u8,  sreg     , _       : 3, 2;
    pub u8,  treg     , _       : 5, 4;
    pub u16, imm      , set_imm : 19, 4;
    pub u8,  stage_imm, _       : 11, 4;
    pub u8,  sel      , _       : 24, 21;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    // JUMP (bx), JUMPR (br) and JUMPS (bs)
    pub struct Branch(u32);

    pub u8,   bx_dreg, _          : 1, 0;
    pub u16,  bx_addr, set_bx_addr: 12, 2;
    pub bool, bx_reg , _          : 21;
    pub u8,   bx_type, _          : 24, 22;
    pub u16,  br_imm , _          : 15, 0;
    pub bool, br_cmp , _          : 16;
    pub u8,   bs_imm , _          : 7, 0;
    pub u8,   bs_cmp , _          : 16, 15;
    pub u8,   offset , set_offset : 23, 17;
    pub bool, sign   , set_sign   : 24;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    // WAKE and SLEEP
    pub struct End(u32);

    pub bool, wakeup   , _: 0;
    pub u8,   cycle_sel, _: 3, 0;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    pub struct Tsens(u32);

    pub u8,  dreg      , _: 1, 0;
    pub u16, wait_delay, _: 15, 2;
}

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    pub struct Macro(u32);

    pub u16, label     , _: 15, 0;
    pub u8,  sub_opcode, _: 27, 24;
}

macro_rules! views {
    ($($name:ident),* $(,)?) => {
        $(
            #[allow(dead_code)]
            impl $name {
                pub const fn new(bits: u32) -> Self {
                    Self(bits)
                }

                pub const fn bits(self) -> u32 {
                    self.0
                }
            }
        )*
    };
}

views!(Common, RegAccess, I2c, Delay, Adc, Mem, Alu, Branch, End, Tsens, Macro);
