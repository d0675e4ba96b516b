use crate::{
    app::App,
    constant::{HALT_SENTINEL, INSTRUCTION_SLOT, MEMORY_SIZE},
    data::ExecError,
    debug_symbols::DebugSymbols,
    instruction::{DataConstant, Instruction, TextEntry},
    memory::Width,
    operand::Operand,
};
use std::collections::HashMap;
use tracing::debug;

fn lookup<T: Copy>(table: &HashMap<&str, T>, name: &str) -> Result<T, ExecError> {
    table
        .get(name)
        .copied()
        .ok_or_else(|| ExecError::UnresolvedSymbol(name.to_string()))
}

/// An assembled unit: text entries in source order, data constants, global
/// options and the libraries it included. Labels and data names are still
/// symbolic until [`Programm::write`] places the unit in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Programm {
    pub text: Vec<TextEntry>,
    pub data: Vec<DataConstant>,
    pub options: HashMap<String, String>,
    pub dependencies: Vec<String>,
}

impl Programm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.text.iter().filter_map(TextEntry::as_instruction)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.text.iter().filter_map(TextEntry::as_label)
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions().count()
    }

    pub fn data_size(&self) -> usize {
        self.data.iter().map(DataConstant::byte_len).sum()
    }

    /// Links the unit and loads it so that its last instruction slot ends at
    /// `entry`. Data sits directly below the text and the stack grows down
    /// from below the data. A halt sentinel is written at `entry`.
    ///
    /// Nothing is written unless the whole unit, the sentinel included, fits
    /// into memory and the instruction arena.
    pub fn write(&self, app: &mut App, entry: u32) -> Result<DebugSymbols, ExecError> {
        let mut labels: HashMap<&str, u64> = HashMap::new();
        let mut count = 0u64;
        for item in &self.text {
            match item {
                TextEntry::Label(label) => {
                    labels.insert(&label.name, count * u64::from(INSTRUCTION_SLOT));
                }
                TextEntry::Instruction(_) => count += 1,
            }
        }
        let text_bytes = count * u64::from(INSTRUCTION_SLOT);
        let data_bytes = self.data_size() as u64;
        let too_large = || ExecError::ProgramTooLarge {
            needed: text_bytes + data_bytes + 1,
            entry,
        };
        let text_pos = u64::from(entry).checked_sub(text_bytes).ok_or_else(too_large)?;
        let data_pos = text_pos.checked_sub(data_bytes).ok_or_else(too_large)?;
        let stack_top = data_pos.checked_sub(1).ok_or_else(too_large)?;
        if u64::from(entry) + u64::from(INSTRUCTION_SLOT) > MEMORY_SIZE as u64 {
            return Err(ExecError::AddressOutOfRange {
                address: entry,
                width: INSTRUCTION_SLOT as usize,
            });
        }
        if app.instructions().len() as u64 + count > u64::from(HALT_SENTINEL) {
            return Err(ExecError::ArenaFull);
        }
        // all three are at most `entry`
        let (text_pos, data_pos, stack_top) = (text_pos as u32, data_pos as u32, stack_top as u32);

        let mut symbols = DebugSymbols::new();
        let label_addresses: HashMap<&str, u32> = labels
            .iter()
            .map(|(name, offset)| (*name, text_pos + *offset as u32))
            .collect();
        for label in self.labels() {
            symbols.add_label(label, label_addresses[label]);
        }

        let mut constants: HashMap<&str, (u32, Width)> = HashMap::new();
        let mut position = data_pos;
        for constant in &self.data {
            constants.insert(&constant.name, (position, constant.width));
            symbols.add_constant(&constant.name, position);
            position += constant.byte_len() as u32;
        }

        let resolve = |operand: &Operand| -> Result<Operand, ExecError> {
            Ok(match operand {
                Operand::Label(name) => Operand::Const(lookup(&label_addresses, name)?),
                Operand::DataOffset(name) => Operand::Const(lookup(&constants, name)?.0),
                Operand::DataMemReference(name) => {
                    let (address, width) = lookup(&constants, name)?;
                    Operand::DataMem(address, width)
                }
                other => other.clone(),
            })
        };
        let linked = self
            .instructions()
            .map(|instruction| {
                let operands = instruction
                    .operands
                    .iter()
                    .map(&resolve)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Instruction {
                    operands,
                    ..instruction.clone()
                })
            })
            .collect::<Result<Vec<_>, ExecError>>()?;

        let mut position = data_pos;
        for constant in &self.data {
            for value in &constant.values {
                app.memory.write(position, constant.width, value.unwrap_or(0))?;
                position += constant.width.bytes() as u32;
            }
        }

        let mut position = text_pos;
        for instruction in linked {
            let index = app.push_instruction(instruction)?;
            app.memory.write_u32(position, index)?;
            position += INSTRUCTION_SLOT;
        }
        app.memory.write_u32(entry, HALT_SENTINEL)?;

        app.registers.set_eip(text_pos);
        app.registers.set_esp(stack_top);
        app.registers.set_ebp(stack_top);
        app.resume();
        debug!(
            text_pos,
            data_pos,
            instructions = count,
            constants = self.data.len(),
            "unit written"
        );
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{instruction::LabelDef, memory::Width, register::RegisterRef};

    fn label(name: &str) -> TextEntry {
        TextEntry::Label(LabelDef {
            name: name.into(),
            line: 0,
        })
    }

    fn instruction(mnemonic: &str, operands: Vec<Operand>) -> TextEntry {
        TextEntry::Instruction(Instruction::new(mnemonic, operands, 0))
    }

    fn eax() -> Operand {
        Operand::Register("eax".parse::<RegisterRef>().unwrap())
    }

    fn sample() -> Programm {
        Programm {
            text: vec![
                label("start"),
                instruction("mov", vec![eax(), Operand::DataOffset("value".into())]),
                instruction("mov", vec![eax(), Operand::DataMemReference("value".into())]),
                label("end"),
                instruction("jmp", vec![Operand::Label("start".into())]),
            ],
            data: vec![
                DataConstant::new("pad", Width::Byte, vec![Some(0x1ff), None], 0),
                DataConstant::new("value", Width::Word, vec![Some(0xbeef)], 1),
            ],
            ..Programm::default()
        }
    }

    #[test]
    fn layout_grows_down_from_the_entry() {
        let mut app = App::new();
        let symbols = sample().write(&mut app, 0x100).unwrap();
        // 3 instructions, 4 bytes of data
        assert_eq!(app.registers.eip(), 0x100 - 12);
        assert_eq!(symbols.address_of("start"), Some(0xf4));
        assert_eq!(symbols.address_of("end"), Some(0xfc));
        assert_eq!(symbols.address_of("pad"), Some(0xf0));
        assert_eq!(symbols.address_of("value"), Some(0xf2));
        assert_eq!(app.registers.esp(), 0xef);
        assert_eq!(app.registers.ebp(), 0xef);
        assert_eq!(app.memory.slice(0xf0, 4), Ok(&[0xff, 0x00, 0xef, 0xbe][..]));
        assert_eq!(app.memory.read_u32(0x100), Ok(HALT_SENTINEL));
    }

    #[test]
    fn symbols_are_rewritten_to_addresses() {
        let mut app = App::new();
        sample().write(&mut app, 0x100).unwrap();
        let loaded = app.instructions();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].operands[1], Operand::Const(0xf2));
        assert_eq!(loaded[1].operands[1], Operand::DataMem(0xf2, Width::Word));
        assert_eq!(loaded[2].operands[0], Operand::Const(0xf4));
        assert_eq!(app.memory.read_u32(0xf4), Ok(0));
        assert_eq!(app.memory.read_u32(0xfc), Ok(2));
    }

    #[test]
    fn reloading_appends_to_the_arena() {
        let mut app = App::new();
        sample().write(&mut app, 0x100).unwrap();
        sample().write(&mut app, 0x200).unwrap();
        assert_eq!(app.instructions().len(), 6);
        assert_eq!(app.memory.read_u32(0x200 - 12), Ok(3));
    }

    #[test]
    fn units_that_do_not_fit_are_rejected() {
        let mut app = App::new();
        assert_eq!(
            sample().write(&mut app, 8),
            Err(ExecError::ProgramTooLarge {
                needed: 17,
                entry: 8
            })
        );
        assert!(app.instructions().is_empty());
    }

    #[test]
    fn entries_without_room_for_the_sentinel_leave_the_cpu_untouched() {
        let mut app = App::new();
        for entry in [0xfffe, 0x1_0000] {
            assert_eq!(
                sample().write(&mut app, entry),
                Err(ExecError::AddressOutOfRange {
                    address: entry,
                    width: 4
                })
            );
        }
        assert!(app.instructions().is_empty());
        assert_eq!(app.memory, App::new().memory);
        assert_eq!(app.registers.eip(), 0);

        let symbols = sample().write(&mut app, 0xfffb).unwrap();
        assert_eq!(symbols.address_of("start"), Some(0xfffb - 12));
        assert_eq!(app.memory.read_u32(0xfffb), Ok(HALT_SENTINEL));
    }

    #[test]
    fn unknown_symbols_fail_the_load() {
        let unit = Programm {
            text: vec![instruction("jmp", vec![Operand::Label("nowhere".into())])],
            ..Programm::default()
        };
        assert_eq!(
            unit.write(&mut App::new(), 0x100),
            Err(ExecError::UnresolvedSymbol("nowhere".into()))
        );
    }
}
