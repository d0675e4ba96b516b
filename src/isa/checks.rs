//! Operand checkers run by the assembler after an instruction line is parsed.

use crate::{memory::Width, operand::Operand};

pub fn expect_count(ops: &[Operand], count: usize) -> Result<(), String> {
    if ops.len() != count {
        return Err(format!(
            "invalid number of operands, expected {count}, got {}",
            ops.len()
        ));
    }
    Ok(())
}

pub fn expect_mutable(op: &Operand) -> Result<(), String> {
    if !op.is_mutable() {
        return Err(format!("left operand must be mutable, got {}", op.kind()));
    }
    Ok(())
}

pub fn expect_not_memory(op: &Operand) -> Result<(), String> {
    if op.is_memory() {
        return Err(format!("{op} must not be a memory operand"));
    }
    Ok(())
}

pub fn expect_not_mem2mem(lhs: &Operand, rhs: &Operand) -> Result<(), String> {
    if lhs.is_memory() && rhs.is_memory() {
        return Err("only one operand can be memory".to_string());
    }
    Ok(())
}

pub fn expect_scalar(op: &Operand) -> Result<(), String> {
    if let Operand::String(_) = op {
        return Err("a string is only valid as source of mov".to_string());
    }
    Ok(())
}

fn expect_register(op: &Operand, width: Option<Width>) -> Result<(), String> {
    match (op, width) {
        (Operand::Register(_), None) => Ok(()),
        (Operand::Register(r), Some(w)) if r.width() == w => Ok(()),
        (_, Some(w)) => Err(format!("expected a {} bit register, got {op}", w.bits())),
        (_, None) => Err(format!("expected a register, got {op}")),
    }
}

pub fn no_operands(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 0)
}

/// Jump and call targets: labels, immediates or registers.
pub fn jump_like(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 1)?;
    match &ops[0] {
        Operand::Label(_) | Operand::Const(_) | Operand::Register(_) => Ok(()),
        other => Err(format!("expected a label, got {}", other.kind())),
    }
}

/// `op dst, src` for arithmetic and logic instructions.
pub fn binary(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 2)?;
    expect_mutable(&ops[0])?;
    expect_scalar(&ops[1])?;
    expect_not_mem2mem(&ops[0], &ops[1])
}

pub fn compare(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 2)?;
    expect_scalar(&ops[0])?;
    expect_scalar(&ops[1])?;
    expect_not_mem2mem(&ops[0], &ops[1])
}

pub fn unary(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 1)?;
    expect_mutable(&ops[0])
}

/// `inc`/`dec`: a single mutable operand that is not memory.
pub fn unary_register(ops: &[Operand]) -> Result<(), String> {
    unary(ops)?;
    expect_not_memory(&ops[0])
}

pub fn register32(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 1)?;
    expect_register(&ops[0], Some(Width::Dword))
}

/// `shl`/`shr`/`rol`/`ror dst, count`.
pub fn shift(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 2)?;
    expect_register(&ops[0], None)?;
    if !ops[1].is_const() {
        return Err(format!("shift count must be a constant, got {}", ops[1].kind()));
    }
    Ok(())
}

/// `bt dst, index` with `index` inside the operand width.
pub fn bit_test(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 2)?;
    expect_scalar(&ops[0])?;
    let Operand::Const(index) = ops[1] else {
        return Err(format!("bit index must be a constant, got {}", ops[1].kind()));
    };
    let bits = ops[0].required_width().unwrap_or(Width::Dword).bits();
    if index >= bits {
        return Err(format!("bit index {index} is outside of [0, {bits})"));
    }
    Ok(())
}

pub fn mov(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 2)?;
    expect_mutable(&ops[0])?;
    expect_not_mem2mem(&ops[0], &ops[1])?;
    if let Operand::String(_) = ops[1] {
        if !ops[0].is_memory() {
            return Err("a string can only be moved into memory".to_string());
        }
    }
    Ok(())
}

pub fn push(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 1)?;
    expect_scalar(&ops[0])?;
    expect_not_memory(&ops[0])?;
    match ops[0].required_width() {
        Some(w) if w != Width::Dword => Err(format!("push requires 32 bit, got {} bit", w.bits())),
        _ => Ok(()),
    }
}

pub fn pop(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 1)?;
    expect_register(&ops[0], Some(Width::Dword))
}

fn expect_port(op: &Operand) -> Result<(), String> {
    match op {
        Operand::Const(_) | Operand::Register(_) => Ok(()),
        other => Err(format!("port must be a constant or register, got {}", other.kind())),
    }
}

/// `in dst, port`
pub fn port_in(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 2)?;
    expect_register(&ops[0], None)?;
    expect_port(&ops[1])
}

/// `out port, src`
pub fn port_out(ops: &[Operand]) -> Result<(), String> {
    expect_count(ops, 2)?;
    expect_port(&ops[0])?;
    match &ops[1] {
        Operand::Const(_) | Operand::Register(_) => Ok(()),
        other => Err(format!("expected a register or constant, got {}", other.kind())),
    }
}
