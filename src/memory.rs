use crate::{constant::MEMORY_SIZE, data::ExecError};
use std::fmt;

/// Operand width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Width {
    Byte = 1,
    Word = 2,
    Dword = 4,
}

impl Width {
    pub fn bytes(self) -> usize {
        self as usize
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn mask(self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    /// `db`, `dw` or `dd`, case-insensitive.
    pub fn from_directive(directive: &str) -> Option<Self> {
        match directive.to_ascii_lowercase().as_str() {
            "db" => Some(Width::Byte),
            "dw" => Some(Width::Word),
            "dd" => Some(Width::Dword),
            _ => None,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// Flat byte addressable memory, little-endian.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memory({} bytes)", self.bytes.len())
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn span(&self, address: u32, width: usize) -> Result<std::ops::Range<usize>, ExecError> {
        let start = address as usize;
        match start.checked_add(width) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(ExecError::AddressOutOfRange { address, width }),
        }
    }

    pub fn read(&self, address: u32, width: Width) -> Result<u32, ExecError> {
        let span = self.span(address, width.bytes())?;
        let mut buf = [0u8; 4];
        buf[..width.bytes()].copy_from_slice(&self.bytes[span]);
        Ok(u32::from_le_bytes(buf))
    }

    /// Writes the low `width` bytes of `value`.
    pub fn write(&mut self, address: u32, width: Width, value: u32) -> Result<(), ExecError> {
        let span = self.span(address, width.bytes())?;
        self.bytes[span].copy_from_slice(&value.to_le_bytes()[..width.bytes()]);
        Ok(())
    }

    pub fn read_u8(&self, address: u32) -> Result<u8, ExecError> {
        Ok(self.read(address, Width::Byte)? as u8)
    }

    pub fn read_u32(&self, address: u32) -> Result<u32, ExecError> {
        self.read(address, Width::Dword)
    }

    pub fn write_u32(&mut self, address: u32, value: u32) -> Result<(), ExecError> {
        self.write(address, Width::Dword, value)
    }

    pub fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<(), ExecError> {
        let span = self.span(address, bytes.len())?;
        self.bytes[span].copy_from_slice(bytes);
        Ok(())
    }

    pub fn slice(&self, address: u32, len: usize) -> Result<&[u8], ExecError> {
        let span = self.span(address, len)?;
        Ok(&self.bytes[span])
    }
}
