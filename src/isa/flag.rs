use super::{checks, operands, OpcodeEntry};
use crate::{app::App, data::ExecError, operand::Operand};

pub(crate) const OPCODES: &[OpcodeEntry] = &[
    OpcodeEntry::new("stc", stc, Some(checks::no_operands)),
    OpcodeEntry::new("clc", clc, Some(checks::no_operands)),
    OpcodeEntry::new("cmc", cmc, Some(checks::no_operands)),
];

fn set_carry(
    app: &mut App,
    ops: &[Operand],
    mnemonic: &'static str,
    update: fn(bool) -> bool,
) -> Result<(), ExecError> {
    operands::<0>(mnemonic, ops)?;
    app.flags.cf = update(app.flags.cf);
    app.registers.advance();
    Ok(())
}

pub fn stc(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    set_carry(app, ops, "stc", |_| true)
}

pub fn clc(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    set_carry(app, ops, "clc", |_| false)
}

pub fn cmc(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    set_carry(app, ops, "cmc", |cf| !cf)
}
