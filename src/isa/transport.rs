use super::{checks, invalid, operands, reject_mem2mem, OpcodeEntry};
use crate::{
    app::App,
    data::ExecError,
    memory::Width,
    operand::{unify_width, Operand},
};

pub(crate) const OPCODES: &[OpcodeEntry] = &[
    OpcodeEntry::new("mov", mov, Some(checks::mov)),
    OpcodeEntry::new("push", push, Some(checks::push)),
    OpcodeEntry::new("pop", pop, Some(checks::pop)),
    OpcodeEntry::new("in", port_in, Some(checks::port_in)),
    OpcodeEntry::new("out", port_out, Some(checks::port_out)),
];

/// Copies `src` into `dst` at their common width. A string source is written
/// byte by byte into memory, followed by a zero terminator.
pub fn mov(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [dst, src] = operands::<2>("mov", ops)?;
    reject_mem2mem(dst, src)?;
    if let Operand::String(text) = src {
        let address = dst.resolve_address(app)?;
        let mut bytes: Vec<u8> = text.chars().map(|c| u32::from(c).min(0xff) as u8).collect();
        bytes.push(0);
        app.memory.write_bytes(address, &bytes)?;
    } else {
        let width = unify_width(&[dst, src]).unwrap_or(Width::Dword);
        let value = src.read_unsigned(app, width)?;
        dst.write(app, width, value)?;
    }
    app.registers.advance();
    Ok(())
}

pub fn push(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [src] = operands::<1>("push", ops)?;
    if src.is_memory() {
        return Err(invalid("push", format!("{src} must not be memory")));
    }
    if let Some(width) = src.required_width().filter(|w| *w != Width::Dword) {
        return Err(invalid("push", format!("expected 32 bit, got {} bit", width.bits())));
    }
    let value = src.read_unsigned(app, Width::Dword)?;
    app.push_u32(value)?;
    app.registers.advance();
    Ok(())
}

/// Fails when the stack holds nothing above EBP.
pub fn pop(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [dst] = operands::<1>("pop", ops)?;
    if !matches!(dst, Operand::Register(r) if r.width() == Width::Dword) {
        return Err(invalid("pop", format!("{dst} is not a 32 bit register")));
    }
    let (esp, ebp) = (app.registers.esp(), app.registers.ebp());
    if esp >= ebp {
        return Err(ExecError::StackUnderflow { esp, ebp });
    }
    let value = app.pop_u32()?;
    dst.write(app, Width::Dword, value)?;
    app.registers.advance();
    Ok(())
}

/// `in dst, port`
pub fn port_in(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [dst, port] = operands::<2>("in", ops)?;
    let width = dst.required_width().unwrap_or(Width::Dword);
    let port = port.read_unsigned(app, Width::Dword)?;
    let value = app.io_read(port);
    dst.write(app, width, value)?;
    app.registers.advance();
    Ok(())
}

/// `out port, src`
pub fn port_out(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [port, src] = operands::<2>("out", ops)?;
    let width = src.required_width().unwrap_or(Width::Dword);
    let port = port.read_unsigned(app, Width::Dword)?;
    let value = src.read_unsigned(app, width)?;
    app.io_write(port, value);
    app.registers.advance();
    Ok(())
}
