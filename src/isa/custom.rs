//! Instructions with no x86 counterpart.

use super::OpcodeEntry;
use crate::{app::App, data::ExecError, memory::Width, operand::Operand};
use tracing::info;

pub(crate) const OPCODES: &[OpcodeEntry] = &[OpcodeEntry::new("alert", alert, None)];

/// Logs every operand with its current value. Accepts any operand list.
pub fn alert(app: &mut App, ops: &[Operand]) -> Result<(), ExecError> {
    for op in ops {
        match op {
            Operand::String(text) => info!(target: "alert", "{text}"),
            _ => {
                let width = op.required_width().unwrap_or(Width::Dword);
                let value = op.read_unsigned(app, width)?;
                info!(target: "alert", kind = op.kind(), "{op} = {value} ({value:#x})");
            }
        }
    }
    app.registers.advance();
    Ok(())
}
