//! Bitwise instructions. Only the shifts, rotates and `bt` touch flags.

use super::{checks, invalid, operands, reject_mem2mem, OpcodeEntry};
use crate::{
    app::App,
    data::ExecError,
    memory::Width,
    operand::{unify_width, Operand},
};

pub(crate) const OPCODES: &[OpcodeEntry] = &[
    OpcodeEntry::new("and", and, Some(checks::binary)),
    OpcodeEntry::new("or", or, Some(checks::binary)),
    OpcodeEntry::new("xor", xor, Some(checks::binary)),
    OpcodeEntry::new("not", not, Some(checks::unary)),
    OpcodeEntry::new("shl", shl, Some(checks::shift)),
    OpcodeEntry::new("shr", shr, Some(checks::shift)),
    OpcodeEntry::new("rol", rol, Some(checks::shift)),
    OpcodeEntry::new("ror", ror, Some(checks::shift)),
    OpcodeEntry::new("bt", bt, Some(checks::bit_test)),
];

fn bitwise(
    app: &mut App,
    ops: &[Operand],
    mnemonic: &'static str,
    op: fn(u32, u32) -> u32,
) -> Result<(), ExecError> {
    let [dst, src] = operands::<2>(mnemonic, ops)?;
    reject_mem2mem(dst, src)?;
    let width = unify_width(&[dst, src]).unwrap_or(Width::Dword);
    let result = op(dst.read_unsigned(app, width)?, src.read_unsigned(app, width)?);
    dst.write(app, width, result)?;
    app.registers.advance();
    Ok(())
}

pub fn and(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    bitwise(app, ops, "and", |a, b| a & b)
}

pub fn or(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    bitwise(app, ops, "or", |a, b| a | b)
}

pub fn xor(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    bitwise(app, ops, "xor", |a, b| a ^ b)
}

pub fn not(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [op] = operands::<1>("not", ops)?;
    let width = op.required_width().unwrap_or(Width::Dword);
    let value = op.read_unsigned(app, width)?;
    op.write(app, width, !value)?;
    app.registers.advance();
    Ok(())
}

#[derive(Clone, Copy)]
enum Direction {
    Left,
    Right,
}

/// Destination width plus its current value and the shift count.
fn shift_operands(
    app: &App,
    ops: &[Operand],
    mnemonic: &'static str,
) -> Result<(Width, u64, u32), ExecError> {
    let [dst, count] = operands::<2>(mnemonic, ops)?;
    if dst.is_memory() {
        return Err(invalid(mnemonic, format!("{dst} must be a register")));
    }
    let width = dst.required_width().unwrap_or(Width::Dword);
    let value = u64::from(dst.read_unsigned(app, width)?);
    Ok((width, value, count.read_unsigned(app, Width::Dword)?))
}

/// CF receives the last bit shifted out; counts past the width clear it.
fn shift(
    app: &mut App,
    ops: &[Operand],
    mnemonic: &'static str,
    direction: Direction,
) -> Result<(), ExecError> {
    let (width, value, count) = shift_operands(app, ops, mnemonic)?;
    let bits = width.bits();
    if count > 0 {
        let (result, carry) = match direction {
            _ if count > bits => (0, false),
            Direction::Left => (
                (value << count) & width.mask(),
                (value >> (bits - count)) & 1 == 1,
            ),
            Direction::Right => (value >> count, (value >> (count - 1)) & 1 == 1),
        };
        app.flags.cf = carry;
        ops[0].write(app, width, result as u32)?;
    }
    app.registers.advance();
    Ok(())
}

/// Rotates within the destination width; CF mirrors the bit that wrapped.
fn rotate(
    app: &mut App,
    ops: &[Operand],
    mnemonic: &'static str,
    direction: Direction,
) -> Result<(), ExecError> {
    let (width, value, count) = shift_operands(app, ops, mnemonic)?;
    let bits = width.bits();
    let count = count % bits;
    if count > 0 {
        let (result, carry) = match direction {
            Direction::Left => {
                let result = ((value << count) | (value >> (bits - count))) & width.mask();
                (result, result & 1 == 1)
            }
            Direction::Right => {
                let result = ((value >> count) | (value << (bits - count))) & width.mask();
                (result, (result >> (bits - 1)) & 1 == 1)
            }
        };
        app.flags.cf = carry;
        ops[0].write(app, width, result as u32)?;
    }
    app.registers.advance();
    Ok(())
}

pub fn shl(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    shift(app, ops, "shl", Direction::Left)
}

pub fn shr(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    shift(app, ops, "shr", Direction::Right)
}

pub fn rol(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    rotate(app, ops, "rol", Direction::Left)
}

pub fn ror(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    rotate(app, ops, "ror", Direction::Right)
}

/// Copies the selected bit of the destination into CF.
pub fn bt(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let [dst, index] = operands::<2>("bt", ops)?;
    let width = dst.required_width().unwrap_or(Width::Dword);
    let bits = width.bits();
    let index = index.read_unsigned(app, Width::Dword)?;
    if index >= bits {
        return Err(ExecError::BitIndexOutOfRange { index, bits });
    }
    app.flags.cf = (dst.read_unsigned(app, width)? >> index) & 1 == 1;
    app.registers.advance();
    Ok(())
}
