use crate::{app::App, data::ExecError, memory::Width, register::RegisterRef};
use std::fmt;

/// One instruction operand, tagged by addressing mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Const(u32),
    Register(RegisterRef),
    MemDirect(u32),
    /// A loaded `[name]`: the constant's address and its `db`/`dw`/`dd` width.
    DataMem(u32, Width),
    MemIndirect(RegisterRef),
    MemIndexed(RegisterRef, i32),
    MemDoubleIndexed(RegisterRef, RegisterRef),
    /// Text label, rewritten to `Const` by the loader.
    Label(String),
    String(String),
    /// `offset name`, rewritten to `Const` by the loader.
    DataOffset(String),
    /// `[name]`, rewritten to `DataMem` by the loader.
    DataMemReference(String),
}

impl Operand {
    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            Operand::MemDirect(_)
                | Operand::DataMem(..)
                | Operand::MemIndirect(_)
                | Operand::MemIndexed(..)
                | Operand::MemDoubleIndexed(..)
                | Operand::DataMemReference(_)
        )
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Operand::Const(_))
    }

    /// Whether something can be stored through this operand.
    pub fn is_mutable(&self) -> bool {
        matches!(self, Operand::Register(_)) || self.is_memory()
    }

    /// Registers and loaded data references carry an inherent width.
    pub fn required_width(&self) -> Option<Width> {
        match self {
            Operand::Register(r) => Some(r.width()),
            Operand::DataMem(_, width) => Some(*width),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Const(_) => "constant",
            Operand::Register(_) => "register",
            Operand::MemDirect(_) => "direct memory",
            Operand::DataMem(..) => "data memory",
            Operand::MemIndirect(_) => "indirect memory",
            Operand::MemIndexed(..) => "indexed memory",
            Operand::MemDoubleIndexed(..) => "double indexed memory",
            Operand::Label(_) => "label",
            Operand::String(_) => "string",
            Operand::DataOffset(_) => "data offset",
            Operand::DataMemReference(_) => "data reference",
        }
    }

    pub fn resolve_address(&self, app: &App) -> Result<u32, ExecError> {
        let regs = &app.registers;
        match self {
            Operand::MemDirect(address) | Operand::DataMem(address, _) => Ok(*address),
            Operand::MemIndirect(r) => Ok(regs.read(*r)),
            Operand::MemIndexed(r, offset) => Ok(regs.read(*r).wrapping_add_signed(*offset)),
            Operand::MemDoubleIndexed(a, b) => Ok(regs.read(*a).wrapping_add(regs.read(*b))),
            Operand::DataMemReference(name) => Err(ExecError::UnresolvedSymbol(name.clone())),
            other => Err(ExecError::NotAddressable(other.to_string())),
        }
    }

    /// Value zero-extended from `width`.
    pub fn read_unsigned(&self, app: &App, width: Width) -> Result<u32, ExecError> {
        let mask = width.mask() as u32;
        match self {
            Operand::Const(value) => Ok(value & mask),
            Operand::Register(r) => Ok(app.registers.read(*r) & mask),
            Operand::Label(name) | Operand::DataOffset(name) => {
                Err(ExecError::UnresolvedSymbol(name.clone()))
            }
            Operand::String(_) => Err(ExecError::NoValue(self.to_string())),
            memory => app.memory.read(memory.resolve_address(app)?, width),
        }
    }

    /// Value sign-extended from `width`.
    pub fn read_signed(&self, app: &App, width: Width) -> Result<i32, ExecError> {
        let raw = self.read_unsigned(app, width)?;
        let shift = 32 - width.bits();
        Ok(((raw << shift) as i32) >> shift)
    }

    pub fn write(&self, app: &mut App, width: Width, value: u32) -> Result<(), ExecError> {
        let value = value & width.mask() as u32;
        match self {
            Operand::Const(_) => Err(ExecError::ImmediateNotWritable),
            Operand::Register(r) => {
                app.registers.write(*r, value);
                Ok(())
            }
            Operand::Label(name) | Operand::DataOffset(name) => {
                Err(ExecError::UnresolvedSymbol(name.clone()))
            }
            Operand::String(_) => Err(ExecError::NotAddressable(self.to_string())),
            memory => {
                let address = memory.resolve_address(app)?;
                app.memory.write(address, width, value)
            }
        }
    }
}

/// Common width of an operand list: the smallest inherent width present.
pub fn unify_width(operands: &[&Operand]) -> Option<Width> {
    operands.iter().filter_map(|op| op.required_width()).min()
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(value) => write!(f, "{value:#x}"),
            Operand::Register(r) => write!(f, "{r}"),
            Operand::MemDirect(address) => write!(f, "[{address:#x}]"),
            Operand::DataMem(address, width) => {
                let size = match width {
                    Width::Byte => "byte",
                    Width::Word => "word",
                    Width::Dword => "dword",
                };
                write!(f, "{size} [{address:#x}]")
            }
            Operand::MemIndirect(r) => write!(f, "[{r}]"),
            Operand::MemIndexed(r, offset) if *offset < 0 => {
                write!(f, "[{r}-{}]", offset.unsigned_abs())
            }
            Operand::MemIndexed(r, offset) => write!(f, "[{r}+{offset}]"),
            Operand::MemDoubleIndexed(a, b) => write!(f, "[{a}][{b}]"),
            Operand::Label(name) => write!(f, "{name}"),
            Operand::String(text) => write!(f, "\"{text}\""),
            Operand::DataOffset(name) => write!(f, "offset {name}"),
            Operand::DataMemReference(name) => write!(f, "[{name}]"),
        }
    }
}
