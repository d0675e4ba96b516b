use crate::{memory::Width, operand::Operand};
use std::fmt;

/// A parsed instruction: lower-case mnemonic plus operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    pub line: usize,
    /// Set for instructions spliced in from a library.
    pub is_lib_code: bool,
}

impl Instruction {
    pub fn new(mnemonic: &str, operands: Vec<Operand>, line: usize) -> Self {
        Self {
            mnemonic: mnemonic.to_ascii_lowercase(),
            operands,
            line,
            is_lib_code: false,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{operand}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDef {
    pub name: String,
    pub line: usize,
}

/// One element of an assembled text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEntry {
    Label(LabelDef),
    Instruction(Instruction),
}

impl TextEntry {
    pub fn line(&self) -> usize {
        match self {
            TextEntry::Label(label) => label.line,
            TextEntry::Instruction(instruction) => instruction.line,
        }
    }

    pub fn set_line(&mut self, line: usize) {
        match self {
            TextEntry::Label(label) => label.line = line,
            TextEntry::Instruction(instruction) => instruction.line = line,
        }
    }

    pub fn as_instruction(&self) -> Option<&Instruction> {
        match self {
            TextEntry::Instruction(instruction) => Some(instruction),
            TextEntry::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            TextEntry::Label(label) => Some(&label.name),
            TextEntry::Instruction(_) => None,
        }
    }
}

/// A named run of data elements; `None` elements are reserved and load as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConstant {
    pub name: String,
    pub width: Width,
    pub values: Vec<Option<u32>>,
    pub line: usize,
}

impl DataConstant {
    pub fn new(name: &str, width: Width, values: Vec<Option<u32>>, line: usize) -> Self {
        Self {
            name: name.to_string(),
            width,
            values,
            line,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width.bytes() * self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_print_as_source() {
        let instruction = Instruction::new(
            "MOV",
            vec![
                Operand::Register("al".parse().unwrap()),
                Operand::DataMemReference("a".into()),
            ],
            3,
        );
        assert_eq!(instruction.to_string(), "mov al, [a]");
        assert_eq!(Instruction::new("ret", vec![], 0).to_string(), "ret");
    }

    #[test]
    fn data_size_counts_every_element() {
        let constant = DataConstant::new("buf", Width::Word, vec![Some(1), None, None], 0);
        assert_eq!(constant.byte_len(), 6);
    }
}
