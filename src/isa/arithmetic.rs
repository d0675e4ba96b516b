use super::{checks, invalid, operands, reject_mem2mem, set_zero_sign, OpcodeEntry};
use crate::{
    app::App,
    data::ExecError,
    memory::Width,
    operand::{unify_width, Operand},
};

pub(crate) const OPCODES: &[OpcodeEntry] = &[
    OpcodeEntry::new("add", add, Some(checks::binary)),
    OpcodeEntry::new("adc", adc, Some(checks::binary)),
    OpcodeEntry::new("sub", sub, Some(checks::binary)),
    OpcodeEntry::new("sbb", sbb, Some(checks::binary)),
    OpcodeEntry::new("cmp", cmp, Some(checks::compare)),
    OpcodeEntry::new("inc", inc, Some(checks::unary_register)),
    OpcodeEntry::new("dec", dec, Some(checks::unary_register)),
    OpcodeEntry::new("mul", mul, Some(checks::register32)),
    OpcodeEntry::new("div", div, Some(checks::register32)),
];

/// Reads both sides of a binary operation at their common width.
fn binary_operands(
    app: &App,
    mnemonic: &'static str,
    ops: &[Operand],
) -> Result<(Width, u64, u64), ExecError> {
    let [dst, src] = operands::<2>(mnemonic, ops)?;
    reject_mem2mem(dst, src)?;
    let width = unify_width(&[dst, src]).unwrap_or(Width::Dword);
    let lhs = u64::from(dst.read_unsigned(app, width)?);
    let rhs = u64::from(src.read_unsigned(app, width)?);
    Ok((width, lhs, rhs))
}

/// CF deliberately compares the truncated result with `lhs & rhs` rather
/// than detecting a real carry; programs rely on that exact behaviour.
fn set_arith_flags(app: &mut App, truncated: u64, lhs: u64, rhs: u64, width: Width) {
    app.flags.cf = truncated != (lhs & rhs);
    set_zero_sign(app, truncated, width);
}

fn add_with(
    app: &mut App,
    ops: &[Operand],
    mnemonic: &'static str,
    carry_in: bool,
) -> Result<(), ExecError> {
    let (width, lhs, rhs) = binary_operands(app, mnemonic, ops)?;
    let carry = u64::from(carry_in && app.flags.cf);
    let truncated = (lhs + rhs + carry) & width.mask();
    set_arith_flags(app, truncated, lhs, rhs, width);
    ops[0].write(app, width, truncated as u32)?;
    app.registers.advance();
    Ok(())
}

fn sub_with(
    app: &mut App,
    ops: &[Operand],
    mnemonic: &'static str,
    borrow_in: bool,
    store: bool,
) -> Result<(), ExecError> {
    let (width, lhs, rhs) = binary_operands(app, mnemonic, ops)?;
    let borrow = u64::from(borrow_in && app.flags.cf);
    let truncated = lhs.wrapping_sub(rhs).wrapping_sub(borrow) & width.mask();
    set_arith_flags(app, truncated, lhs, rhs, width);
    if store {
        ops[0].write(app, width, truncated as u32)?;
    }
    app.registers.advance();
    Ok(())
}

pub fn add(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    add_with(app, ops, "add", false)
}

pub fn adc(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    add_with(app, ops, "adc", true)
}

pub fn sub(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    sub_with(app, ops, "sub", false, true)
}

pub fn sbb(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    sub_with(app, ops, "sbb", true, true)
}

/// `sub` without the store.
pub fn cmp(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    sub_with(app, ops, "cmp", false, false)
}

fn step(app: &mut App, ops: &[Operand], mnemonic: &'static str, up: bool) -> Result<(), ExecError> {
    let [op] = operands::<1>(mnemonic, ops)?;
    if op.is_memory() || !op.is_mutable() {
        return Err(invalid(mnemonic, format!("{op} is not a register")));
    }
    let width = op.required_width().unwrap_or(Width::Dword);
    let value = u64::from(op.read_unsigned(app, width)?);
    let next = if up { value + 1 } else { value.wrapping_sub(1) };
    let truncated = next & width.mask();
    set_zero_sign(app, truncated, width);
    op.write(app, width, truncated as u32)?;
    app.registers.advance();
    Ok(())
}

pub fn inc(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    step(app, ops, "inc", true)
}

pub fn dec(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    step(app, ops, "dec", false)
}

fn register32(app: &App, ops: &[Operand], mnemonic: &'static str) -> Result<u32, ExecError> {
    match operands::<1>(mnemonic, ops)? {
        [Operand::Register(r)] if r.width() == Width::Dword => Ok(app.registers.read(*r)),
        [other] => Err(invalid(mnemonic, format!("{other} is not a 32 bit register"))),
    }
}

/// `eax = eax * src`, wrapping to 32 bits.
pub fn mul(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let factor = register32(app, ops, "mul")?;
    let product = app.registers.eax.get32().wrapping_mul(factor);
    app.registers.eax.set32(product);
    app.registers.advance();
    Ok(())
}

/// `eax = eax / src`, unsigned.
pub fn div(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    let divisor = register32(app, ops, "div")?;
    let quotient = app
        .registers
        .eax
        .get32()
        .checked_div(divisor)
        .ok_or(ExecError::DivideByZero)?;
    app.registers.eax.set32(quotient);
    app.registers.advance();
    Ok(())
}
