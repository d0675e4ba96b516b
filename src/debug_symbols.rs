use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Constant,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Label => write!(f, "label"),
            SymbolKind::Constant => write!(f, "constant"),
        }
    }
}

/// Absolute addresses assigned to labels and data constants by one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugSymbols {
    table: Vec<(u32, SymbolKind, String)>, // address, kind, name
}

impl DebugSymbols {
    pub fn new() -> Self {
        Self { table: vec![] }
    }

    pub fn add_label(&mut self, name: &str, address: u32) {
        self.table.push((address, SymbolKind::Label, name.to_string()));
    }

    pub fn add_constant(&mut self, name: &str, address: u32) {
        self.table.push((address, SymbolKind::Constant, name.to_string()));
    }

    pub fn address_of(&self, name: &str) -> Option<u32> {
        self.table
            .iter()
            .find(|(_, _, n)| n == name)
            .map(|(address, _, _)| *address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, SymbolKind, &str)> {
        self.table
            .iter()
            .map(|(address, kind, name)| (*address, *kind, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    // structure, per entry
    //  address 4 bytes
    //  kind 1 byte (0 label, 1 constant)
    //  length of name 4 bytes
    //  name ...
    pub fn serialize(&self) -> Vec<u8> {
        let mut byte_buffer: Vec<u8> = vec![];
        for (address, kind, name) in &self.table {
            trace!("adding symbol entry ({address:#x}|{kind}|{}|{name})", name.len());
            byte_buffer.extend_from_slice(&address.to_le_bytes());
            byte_buffer.push(match kind {
                SymbolKind::Label => 0,
                SymbolKind::Constant => 1,
            });
            byte_buffer.extend_from_slice(&(name.len() as u32).to_le_bytes());
            byte_buffer.extend_from_slice(name.as_bytes());
        }
        byte_buffer
    }
}

impl fmt::Display for DebugSymbols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (address, kind, name) in self.iter() {
            writeln!(f, "{address:#06x} {kind:<8} {name}")?;
        }
        Ok(())
    }
}
