use crate::{data::ExecError, memory::Width};
use std::{fmt, str::FromStr};

/// A 32 bit register with the x86 16/8 bit sub-views aliased onto its low bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Register32 {
    value: u32,
}

impl Register32 {
    pub fn new(value: u32) -> Self {
        Self { value }
    }

    pub fn get32(self) -> u32 {
        self.value
    }
    pub fn set32(&mut self, value: u32) {
        self.value = value;
    }

    pub fn get16(self) -> u32 {
        self.value & 0xffff
    }
    pub fn set16(&mut self, value: u32) {
        self.value = (self.value & 0xffff_0000) | (value & 0x0000_ffff);
    }

    pub fn get8h(self) -> u32 {
        (self.value & 0xffff) >> 8
    }
    pub fn set8h(&mut self, value: u32) {
        self.value = (self.value & 0xffff_00ff) | ((value << 8) & 0x0000_ff00);
    }

    pub fn get8l(self) -> u32 {
        self.value & 0xff
    }
    pub fn set8l(&mut self, value: u32) {
        self.value = (self.value & 0xffff_ff00) | (value & 0x0000_00ff);
    }

    pub fn get(self, view: View) -> u32 {
        match view {
            View::Full => self.get32(),
            View::Low16 => self.get16(),
            View::High8 => self.get8h(),
            View::Low8 => self.get8l(),
        }
    }

    pub fn set(&mut self, view: View, value: u32) {
        match view {
            View::Full => self.set32(value),
            View::Low16 => self.set16(value),
            View::High8 => self.set8h(value),
            View::Low8 => self.set8l(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gpr {
    Eax,
    Ebx,
    Ecx,
    Edx,
    Esi,
    Edi,
    Esp,
    Ebp,
    Eip,
}

impl Gpr {
    pub const ALL: [Gpr; 9] = [
        Gpr::Eax,
        Gpr::Ebx,
        Gpr::Ecx,
        Gpr::Edx,
        Gpr::Esi,
        Gpr::Edi,
        Gpr::Esp,
        Gpr::Ebp,
        Gpr::Eip,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Gpr::Eax => "eax",
            Gpr::Ebx => "ebx",
            Gpr::Ecx => "ecx",
            Gpr::Edx => "edx",
            Gpr::Esi => "esi",
            Gpr::Edi => "edi",
            Gpr::Esp => "esp",
            Gpr::Ebp => "ebp",
            Gpr::Eip => "eip",
        }
    }
}

/// Which bits of the register a name addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// bits [0, 32), `e` prefixed names
    Full,
    /// bits [0, 16), `x` suffixed names
    Low16,
    /// bits [8, 16), `h` suffixed names
    High8,
    /// bits [0, 8), `l` suffixed names
    Low8,
}

impl View {
    pub fn width(self) -> Width {
        match self {
            View::Full => Width::Dword,
            View::Low16 => Width::Word,
            View::High8 | View::Low8 => Width::Byte,
        }
    }
}

/// A register name as written in source, e.g. `eax`, `bx`, `ch` or `dl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterRef {
    pub reg: Gpr,
    pub view: View,
}

impl RegisterRef {
    pub fn new(reg: Gpr, view: View) -> Self {
        Self { reg, view }
    }

    pub fn width(self) -> Width {
        self.view.width()
    }
}

impl FromStr for RegisterRef {
    type Err = ExecError;

    /// First character `e` selects the full register, otherwise the second
    /// character picks the `x`/`h`/`l` sub-view of `e?x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let unrecognized = || ExecError::UnrecognizedRegister(s.to_string());
        if lower.starts_with('e') {
            let reg = Gpr::ALL
                .into_iter()
                .find(|r| r.name() == lower)
                .ok_or_else(unrecognized)?;
            return Ok(Self::new(reg, View::Full));
        }
        let mut chars = lower.chars();
        let (Some(base), Some(suffix), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(unrecognized());
        };
        let reg = match base {
            'a' => Gpr::Eax,
            'b' => Gpr::Ebx,
            'c' => Gpr::Ecx,
            'd' => Gpr::Edx,
            _ => return Err(unrecognized()),
        };
        let view = match suffix {
            'x' => View::Low16,
            'h' => View::High8,
            'l' => View::Low8,
            _ => return Err(unrecognized()),
        };
        Ok(Self::new(reg, view))
    }
}

impl fmt::Display for RegisterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = self.reg.name();
        match self.view {
            View::Full => write!(f, "{full}"),
            View::Low16 => write!(f, "{}", &full[1..]),
            View::High8 => write!(f, "{}h", &full[1..2]),
            View::Low8 => write!(f, "{}l", &full[1..2]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    pub eax: Register32,
    pub ebx: Register32,
    pub ecx: Register32,
    pub edx: Register32,
    pub esi: Register32,
    pub edi: Register32,
    pub esp: Register32,
    pub ebp: Register32,
    pub eip: Register32,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, reg: Gpr) -> &Register32 {
        match reg {
            Gpr::Eax => &self.eax,
            Gpr::Ebx => &self.ebx,
            Gpr::Ecx => &self.ecx,
            Gpr::Edx => &self.edx,
            Gpr::Esi => &self.esi,
            Gpr::Edi => &self.edi,
            Gpr::Esp => &self.esp,
            Gpr::Ebp => &self.ebp,
            Gpr::Eip => &self.eip,
        }
    }

    pub fn cell_mut(&mut self, reg: Gpr) -> &mut Register32 {
        match reg {
            Gpr::Eax => &mut self.eax,
            Gpr::Ebx => &mut self.ebx,
            Gpr::Ecx => &mut self.ecx,
            Gpr::Edx => &mut self.edx,
            Gpr::Esi => &mut self.esi,
            Gpr::Edi => &mut self.edi,
            Gpr::Esp => &mut self.esp,
            Gpr::Ebp => &mut self.ebp,
            Gpr::Eip => &mut self.eip,
        }
    }

    pub fn read(&self, r: RegisterRef) -> u32 {
        self.cell(r.reg).get(r.view)
    }

    pub fn write(&mut self, r: RegisterRef, value: u32) {
        self.cell_mut(r.reg).set(r.view, value)
    }

    pub fn eip(&self) -> u32 {
        self.eip.get32()
    }
    pub fn set_eip(&mut self, value: u32) {
        self.eip.set32(value)
    }
    /// Moves EIP to the next instruction slot.
    pub fn advance(&mut self) {
        let next = self.eip().wrapping_add(crate::constant::INSTRUCTION_SLOT);
        self.eip.set32(next);
    }
    pub fn esp(&self) -> u32 {
        self.esp.get32()
    }
    pub fn set_esp(&mut self, value: u32) {
        self.esp.set32(value)
    }
    pub fn ebp(&self) -> u32 {
        self.ebp.get32()
    }
    pub fn set_ebp(&mut self, value: u32) {
        self.ebp.set32(value)
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reg) in Gpr::ALL.into_iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={:#010x}", reg.name(), self.cell(reg).get32())?;
        }
        Ok(())
    }
}

/// Status flags. Only CF, ZF and SF are ever computed; PF, AF and OF stay false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub cf: bool,
    pub pf: bool,
    pub af: bool,
    pub zf: bool,
    pub sf: bool,
    pub of: bool,
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |b: bool| if b { 1 } else { 0 };
        write!(
            f,
            "CF={} PF={} AF={} ZF={} SF={} OF={}",
            bit(self.cf),
            bit(self.pf),
            bit(self.af),
            bit(self.zf),
            bit(self.sf),
            bit(self.of)
        )
    }
}
