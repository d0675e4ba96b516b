//! An assembler for a small x86-flavoured assembly dialect and the virtual
//! 32-bit CPU that runs what it produces.
//!
//! ```text
//! source --Assembler::parse--> Programm --Programm::write--> App memory --App::run-->
//! ```

pub mod app;
pub mod assembler;
pub mod constant;
pub mod data;
pub mod debug_symbols;
pub mod instruction;
pub mod io;
pub mod isa;
pub mod library;
pub mod memory;
pub mod operand;
pub mod parser;
pub mod program;
pub mod register;
pub mod tokenizer;

pub use app::{App, RunConfig, RunOutcome, StopReason};
pub use assembler::Assembler;
pub use data::{CompileError, CompileErrorCode, ExecError, Range};
pub use debug_symbols::DebugSymbols;
pub use io::IoDevice;
pub use library::{LibrarySource, LibraryStore};
pub use memory::{Memory, Width};
pub use operand::Operand;
pub use program::Programm;
pub use register::{Flags, RegisterFile, RegisterRef};
