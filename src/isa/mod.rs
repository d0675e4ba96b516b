//! Instruction set: one module per category, each contributing its opcode
//! entries to the [`OpcodeTable`] used by both the assembler and the engine.

use crate::{app::App, data::ExecError, memory::Width, operand::Operand};
use std::collections::HashMap;

pub mod arithmetic;
pub mod checks;
pub mod control;
pub mod custom;
pub mod flag;
pub mod logic;
pub mod transport;

/// Mutates the engine for one instruction. Every handler advances EIP by one
/// slot, except control transfers which set it explicitly.
pub type ExecuteFn = fn(&mut App, &[Operand]) -> Result<(), ExecError>;
/// Compile time operand validation; the message becomes the diagnostic detail.
pub type CheckFn = fn(&[Operand]) -> Result<(), String>;

#[derive(Clone, Copy)]
pub struct OpcodeEntry {
    pub mnemonic: &'static str,
    pub execute: ExecuteFn,
    pub check: Option<CheckFn>,
}

impl std::fmt::Debug for OpcodeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcodeEntry")
            .field("mnemonic", &self.mnemonic)
            .field("checked", &self.check.is_some())
            .finish()
    }
}

impl OpcodeEntry {
    pub const fn new(mnemonic: &'static str, execute: ExecuteFn, check: Option<CheckFn>) -> Self {
        Self {
            mnemonic,
            execute,
            check,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpcodeTable {
    table: HashMap<&'static str, OpcodeEntry>,
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::build_table()
    }
}

impl OpcodeTable {
    pub fn build_table() -> Self {
        let table = [
            arithmetic::OPCODES,
            logic::OPCODES,
            transport::OPCODES,
            control::OPCODES,
            flag::OPCODES,
            custom::OPCODES,
        ]
        .into_iter()
        .flatten()
        .map(|entry| (entry.mnemonic, *entry))
        .collect();
        Self { table }
    }

    pub fn get_opcode(&self, key: &str) -> Result<&OpcodeEntry, ExecError> {
        self.table
            .get(key)
            .ok_or_else(|| ExecError::UnknownOpcode(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }
}

/// Borrows exactly `N` operands or fails with an arity error.
pub(crate) fn operands<'a, const N: usize>(
    mnemonic: &'static str,
    ops: &'a [Operand],
) -> Result<[&'a Operand; N], ExecError> {
    if ops.len() != N {
        return Err(ExecError::OperandCount {
            mnemonic,
            expected: N,
            got: ops.len(),
        });
    }
    Ok(std::array::from_fn(|i| &ops[i]))
}

pub(crate) fn reject_mem2mem(lhs: &Operand, rhs: &Operand) -> Result<(), ExecError> {
    if lhs.is_memory() && rhs.is_memory() {
        return Err(ExecError::Mem2Mem);
    }
    Ok(())
}

pub(crate) fn invalid(mnemonic: &'static str, reason: impl Into<String>) -> ExecError {
    ExecError::InvalidOperand {
        mnemonic,
        reason: reason.into(),
    }
}

/// ZF from the truncated result; SF reads it as a signed 32 bit value, so it
/// only ever fires for dword results.
pub(crate) fn set_zero_sign(app: &mut App, truncated: u64, width: Width) {
    app.flags.zf = truncated == 0;
    app.flags.sf = width == Width::Dword && (truncated as u32 as i32) < 0;
}

#[cfg(test)]
pub(crate) fn reg(name: &str) -> Operand {
    Operand::Register(name.parse().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_category() {
        let table = OpcodeTable::build_table();
        for mnemonic in [
            "add", "adc", "sub", "sbb", "cmp", "inc", "dec", "mul", "div", "and", "or", "xor",
            "not", "shl", "shr", "rol", "ror", "bt", "mov", "push", "pop", "in", "out", "jmp",
            "jz", "je", "jnz", "jne", "jc", "jnc", "call", "ret", "nop", "exit", "stc", "clc",
            "cmc", "alert",
        ] {
            assert!(table.contains(mnemonic), "missing {mnemonic}");
        }
        assert_eq!(
            table.get_opcode("wrong").unwrap_err(),
            ExecError::UnknownOpcode("wrong".into())
        );
        assert!(table.get_opcode("alert").unwrap().check.is_none());
        assert!(table.get_opcode("mov").unwrap().check.is_some());
    }

    #[test]
    fn operand_arity_is_enforced() {
        let ops = [Operand::Const(1)];
        assert!(operands::<1>("nop", &ops).is_ok());
        assert_eq!(
            operands::<2>("mov", &ops).unwrap_err(),
            ExecError::OperandCount {
                mnemonic: "mov",
                expected: 2,
                got: 1
            }
        );
    }
}
