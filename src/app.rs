use crate::{
    constant::{DEFAULT_ENTRY, INSTRUCTION_SLOT},
    data::ExecError,
    debug_symbols::DebugSymbols,
    instruction::Instruction,
    io::IoDevice,
    isa::OpcodeTable,
    memory::Memory,
    program::Programm,
    register::{Flags, RegisterFile},
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};
use tracing::{debug, trace};

type Observer = Box<dyn FnMut(&App)>;

/// Pacing and budget for [`App::run`]. Neither changes the end state of a
/// program that halts within the budget.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub max_cycles: Option<u64>,
    pub delay: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No instruction at EIP, or `exit` ran.
    Halted,
    /// The running flag was cleared between two cycles.
    Cancelled,
    CycleLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub cycles: u64,
    pub stop: StopReason,
}

/// The virtual CPU: registers, flags, memory and the instruction arena that
/// memory slots index into.
pub struct App {
    pub registers: RegisterFile,
    pub flags: Flags,
    pub memory: Memory,
    /// Append-only; every load adds its instructions behind earlier ones.
    instructions: Vec<Instruction>,
    opcodes: OpcodeTable,
    devices: Vec<Box<dyn IoDevice>>,
    observer: Option<Observer>,
    halted: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            registers: RegisterFile::new(),
            flags: Flags::default(),
            memory: Memory::new(),
            instructions: Vec::new(),
            opcodes: OpcodeTable::build_table(),
            devices: Vec::new(),
            observer: None,
            halted: false,
        }
    }

    pub fn opcodes(&self) -> &OpcodeTable {
        &self.opcodes
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Appends to the arena and returns the slot index to store in memory.
    pub fn push_instruction(&mut self, instruction: Instruction) -> Result<u32, ExecError> {
        let index = u32::try_from(self.instructions.len())
            .ok()
            .filter(|index| *index != crate::constant::HALT_SENTINEL)
            .ok_or(ExecError::ArenaFull)?;
        self.instructions.push(instruction);
        Ok(index)
    }

    /// Loads an assembled unit at [`DEFAULT_ENTRY`].
    pub fn run_program(&mut self, unit: &Programm) -> Result<DebugSymbols, ExecError> {
        self.run_program_at(unit, DEFAULT_ENTRY)
    }

    pub fn run_program_at(&mut self, unit: &Programm, entry: u32) -> Result<DebugSymbols, ExecError> {
        let symbols = unit.write(self, entry)?;
        debug!(
            eip = self.registers.eip(),
            esp = self.registers.esp(),
            "program loaded"
        );
        Ok(symbols)
    }

    /// The instruction EIP points at, or `None` once the program has halted.
    pub fn fetch(&self) -> Result<Option<&Instruction>, ExecError> {
        if self.halted {
            return Ok(None);
        }
        let index = self.memory.read_u32(self.registers.eip())?;
        Ok(self.instructions.get(index as usize))
    }

    /// Runs a single instruction. `Ok(false)` means the CPU is halted.
    pub fn instruction_cycle(&mut self) -> Result<bool, ExecError> {
        let Some(instruction) = self.fetch()?.cloned() else {
            return Ok(false);
        };
        trace!(eip = self.registers.eip(), "{instruction}");
        let execute = self.opcodes.get_opcode(&instruction.mnemonic)?.execute;
        execute(self, &instruction.operands)?;

        if let Some(mut observer) = self.observer.take() {
            observer(self);
            self.observer = Some(observer);
        }
        Ok(!self.halted)
    }

    /// Cycles until the program halts, `running` is cleared or the cycle budget
    /// is spent. Cancellation is only observed between instructions.
    pub fn run(&mut self, config: &RunConfig, running: &AtomicBool) -> Result<RunOutcome, ExecError> {
        let mut cycles = 0;
        let stop = loop {
            if !running.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }
            if self.fetch()?.is_none() {
                break StopReason::Halted;
            }
            if config.max_cycles.is_some_and(|max| cycles >= max) {
                break StopReason::CycleLimit;
            }
            self.instruction_cycle()?;
            cycles += 1;
            if let Some(delay) = config.delay {
                thread::sleep(delay);
            }
        };
        debug!(cycles, ?stop, "run finished");
        Ok(RunOutcome { cycles, stop })
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Clears a previous halt; called whenever a new unit is loaded.
    pub(crate) fn resume(&mut self) {
        self.halted = false;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Whether the instruction about to run was spliced in from a library.
    pub fn is_in_lib_mode(&self) -> bool {
        matches!(self.fetch(), Ok(Some(instruction)) if instruction.is_lib_code)
    }

    pub fn set_observer(&mut self, observer: impl FnMut(&App) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    pub fn attach_device(&mut self, device: Box<dyn IoDevice>) {
        self.devices.push(device);
    }

    /// Reads from the device serving `port`; unclaimed ports read as zero.
    pub fn io_read(&mut self, port: u32) -> u32 {
        match self.devices.iter_mut().find(|d| d.ports().contains(&port)) {
            Some(device) => device.on_input(port),
            None => {
                trace!(port, "read from unclaimed port");
                0
            }
        }
    }

    /// Writes to the device serving `port`; unclaimed ports drop the value.
    pub fn io_write(&mut self, port: u32, value: u32) {
        match self.devices.iter_mut().find(|d| d.ports().contains(&port)) {
            Some(device) => device.on_output(port, value),
            None => trace!(port, value, "write to unclaimed port"),
        }
    }

    /// `ESP -= 4`, then stores `value` at ESP.
    pub fn push_u32(&mut self, value: u32) -> Result<(), ExecError> {
        let esp = self.registers.esp().wrapping_sub(INSTRUCTION_SLOT);
        self.memory.write_u32(esp, value)?;
        self.registers.set_esp(esp);
        Ok(())
    }

    /// Loads the value at ESP, then `ESP += 4`.
    pub fn pop_u32(&mut self) -> Result<u32, ExecError> {
        let esp = self.registers.esp();
        let value = self.memory.read_u32(esp)?;
        self.registers.set_esp(esp.wrapping_add(INSTRUCTION_SLOT));
        Ok(value)
    }
}
