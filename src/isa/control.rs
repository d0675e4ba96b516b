use super::{checks, invalid, operands, OpcodeEntry};
use crate::{app::App, data::ExecError, memory::Width, operand::Operand};

pub(crate) const OPCODES: &[OpcodeEntry] = &[
    OpcodeEntry::new("jmp", jmp, Some(checks::jump_like)),
    OpcodeEntry::new("jz", jz, Some(checks::jump_like)),
    OpcodeEntry::new("je", jz, Some(checks::jump_like)),
    OpcodeEntry::new("jnz", jnz, Some(checks::jump_like)),
    OpcodeEntry::new("jne", jnz, Some(checks::jump_like)),
    OpcodeEntry::new("jc", jc, Some(checks::jump_like)),
    OpcodeEntry::new("jnc", jnc, Some(checks::jump_like)),
    OpcodeEntry::new("call", call, Some(checks::jump_like)),
    OpcodeEntry::new("ret", ret, Some(checks::no_operands)),
    OpcodeEntry::new("nop", nop, Some(checks::no_operands)),
    OpcodeEntry::new("exit", exit, Some(checks::no_operands)),
];

fn target(app: &App, op: &Operand) -> Result<u32, ExecError> {
    op.read_unsigned(app, op.required_width().unwrap_or(Width::Dword))
}

fn jump_if(
    app: &mut App,
    ops: &[Operand],
    mnemonic: &'static str,
    taken: bool,
) -> Result<(), ExecError> {
    let [op] = operands::<1>(mnemonic, ops)?;
    if taken {
        let eip = target(app, op)?;
        app.registers.set_eip(eip);
    } else {
        app.registers.advance();
    }
    Ok(())
}

pub fn jmp(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    jump_if(app, ops, "jmp", true)
}

pub fn jz(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let taken = app.flags.zf;
    jump_if(app, ops, "jz", taken)
}

pub fn jnz(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let taken = !app.flags.zf;
    jump_if(app, ops, "jnz", taken)
}

pub fn jc(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let taken = app.flags.cf;
    jump_if(app, ops, "jc", taken)
}

pub fn jnc(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let taken = !app.flags.cf;
    jump_if(app, ops, "jnc", taken)
}

/// Pushes EBP and the return address, then opens a new frame at ESP.
/// Arguments pushed by the caller sit at `[esp+8]` and up.
pub fn call(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [op] = operands::<1>("call", ops)?;
    if op.is_memory() {
        return Err(invalid("call", format!("{op} must not be memory")));
    }
    let destination = target(app, op)?;
    app.registers.advance();
    let (ret, ebp) = (app.registers.eip(), app.registers.ebp());
    app.push_u32(ebp)?;
    app.push_u32(ret)?;
    let esp = app.registers.esp();
    app.registers.set_ebp(esp);
    app.registers.set_eip(destination);
    Ok(())
}

/// Pops the return address and the caller's EBP. No underflow check.
pub fn ret(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    operands::<0>("ret", ops)?;
    let eip = app.pop_u32()?;
    let ebp = app.pop_u32()?;
    app.registers.set_eip(eip);
    app.registers.set_ebp(ebp);
    Ok(())
}

pub fn nop(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    operands::<0>("nop", ops)?;
    app.registers.advance();
    Ok(())
}

/// Stops the run loop after this cycle.
pub fn exit(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    operands::<0>("exit", ops)?;
    app.halt();
    Ok(())
}
