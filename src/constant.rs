pub const NAME: &str = "x86emu";

/// Size of the flat CPU memory in bytes.
pub const MEMORY_SIZE: usize = 0xffff;
/// Every loaded instruction occupies one 4 byte slot holding its arena index.
pub const INSTRUCTION_SLOT: u32 = 4;
/// Conventional top of the writable program region.
pub const DEFAULT_ENTRY: u32 = 0x7fff;
/// Index written behind the last instruction of a loaded unit; never a valid arena slot.
pub const HALT_SENTINEL: u32 = 0xffff_ffff;
pub const MAX_OPERANDS: usize = 4;

pub const TEXT_MARKER: &str = ".text:";
pub const DATA_MARKER: &str = ".data:";
pub const INCLUDE: &str = "#include";
pub const EXPORT: &str = "@export ";
pub const OFFSET: &str = "offset ";

pub const LIB_PREFIX: &str = "__lib_";
pub const LIB_MAIN: &str = "libmain";
pub const RESERVED_PREFIX: &str = "__";

pub const COMMENT: char = ';';
pub const STR: char = '"';
pub const COMMA: char = ',';
pub const LABEL_END: char = ':';
pub const RESERVED: char = '?';
pub const REPEAT: char = '*';
pub const OPEN_BRACKET: char = '[';
pub const CLOSE_BRACKET: char = ']';

pub const HEX: char = 'x';
pub const BINARY: char = 'b';
pub const HEX_SUFFIX: char = 'h';
