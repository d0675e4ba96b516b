use crate::{
    constant::{
        COMMENT, DATA_MARKER, EXPORT, INCLUDE, LABEL_END, LIB_MAIN, LIB_PREFIX, RESERVED_PREFIX,
        STR, TEXT_MARKER,
    },
    data::{CompileError, CompileErrorCode, Range},
    instruction::{DataConstant, Instruction, LabelDef, TextEntry},
    isa::OpcodeTable,
    library::{LibrarySource, LibraryStore},
    memory::Width,
    operand::Operand,
    parser::{is_identifier, is_label_name, parse_data_values, parse_operands},
    program::Programm,
    tokenizer::LineCursor,
};
use std::{
    collections::{HashMap, HashSet},
    time::Instant,
};
use tracing::{debug, warn};

/// Source section the line parser is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Global,
    Text,
    Data,
}

fn err(code: CompileErrorCode, line: usize, range: Range) -> CompileError {
    CompileError::new(code, line, range)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Turns source text into [`Programm`] units and owns the table of assembled
/// libraries that `#include` splices from.
#[derive(Debug, Clone)]
pub struct Assembler {
    libs: HashMap<String, Programm>,
    opcodes: OpcodeTable,
    debug: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            libs: HashMap::new(),
            opcodes: OpcodeTable::build_table(),
            debug: false,
        }
    }

    /// An assembler with `fib.h` and `string.h` already assembled.
    pub fn with_default_libs() -> Result<Self, CompileError> {
        let mut assembler = Self::new();
        assembler.load_libraries(&LibraryStore::with_defaults())?;
        Ok(assembler)
    }

    /// In debug mode instructions without an operand checker are reported.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn library(&self, name: &str) -> Option<&Programm> {
        self.libs.get(name)
    }

    pub fn library_names(&self) -> impl Iterator<Item = &str> {
        self.libs.keys().map(String::as_str)
    }

    /// Assembles every library of `source` in the order it lists them.
    pub fn load_libraries(&mut self, source: &dyn LibrarySource) -> Result<(), CompileError> {
        for name in source.names() {
            if let Some(text) = source.get(&name) {
                self.parse_lib(&name, text)?;
            }
        }
        Ok(())
    }

    pub fn parse(&self, text: &str) -> Result<Programm, CompileError> {
        self.parse_with_exports(text, &mut Vec::new())
    }

    /// Like [`Assembler::parse`], additionally collecting `@export` labels.
    pub fn parse_with_exports(
        &self,
        text: &str,
        exports: &mut Vec<String>,
    ) -> Result<Programm, CompileError> {
        let started = Instant::now();
        let mut unit = Programm::new();
        let mut mode = Mode::Global;
        let mut line_count = 0;

        for (line, source) in text.lines().enumerate() {
            line_count += 1;
            let mut cursor = LineCursor::new(source);
            if cursor.at_line_end() {
                continue;
            }
            if cursor.starts_with(INCLUDE, false) {
                self.parse_include(&mut cursor, line, &mut unit)?;
                continue;
            }
            if let Some(next) = parse_marker(&mut cursor, line)? {
                mode = next;
                continue;
            }
            match mode {
                Mode::Global => parse_global(&mut cursor, line, &mut unit)?,
                Mode::Text => self.parse_text(&mut cursor, line, &mut unit, exports)?,
                Mode::Data => parse_data(&mut cursor, line, &mut unit)?,
            }
        }

        validate(&unit)?;
        let labels = unit.labels().count();
        debug!(
            lines = line_count,
            elapsed = ?started.elapsed(),
            labels,
            instructions = unit.text.len() - labels,
            constants = unit.data.len(),
            exports = exports.len(),
            "parsed unit"
        );
        Ok(unit)
    }

    /// Assembles a library and stores it under `name`.
    ///
    /// Labels not exported are prefixed with `__lib_<name>_`, body instructions
    /// are flagged as library code, and the body is wrapped in a jump to a
    /// trailing `__lib_<name>_libmain` label so that falling into an included
    /// library skips it. Without `@export` markers the label named like the
    /// library, or like its file stem (`fib` for `fib.h`), is the only export.
    pub fn parse_lib(&mut self, name: &str, text: &str) -> Result<Programm, CompileError> {
        debug!(library = name, "preparing library");
        let prefix = format!("{LIB_PREFIX}{name}_");
        let mut exports = Vec::new();
        let mut unit = self.parse_with_exports(text, &mut exports)?;
        if exports.is_empty() {
            let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
            exports.extend(
                unit.labels()
                    .filter(|label| *label == name || *label == stem)
                    .map(str::to_string),
            );
        }

        for entry in &mut unit.text {
            match entry {
                TextEntry::Label(label) => {
                    if !exports.contains(&label.name) {
                        label.name.insert_str(0, &prefix);
                    }
                }
                TextEntry::Instruction(instruction) => {
                    instruction.is_lib_code = true;
                    for operand in &mut instruction.operands {
                        if let Operand::Label(target) = operand {
                            if !exports.contains(target) {
                                target.insert_str(0, &prefix);
                            }
                        }
                    }
                }
            }
        }

        let libmain = format!("{prefix}{LIB_MAIN}");
        unit.text.insert(
            0,
            TextEntry::Instruction(Instruction::new(
                "jmp",
                vec![Operand::Label(libmain.clone())],
                0,
            )),
        );
        unit.text.push(TextEntry::Label(LabelDef {
            name: libmain,
            line: 0,
        }));

        debug!(library = name, exports = ?exports, "finished library");
        self.libs.insert(name.to_string(), unit.clone());
        Ok(unit)
    }

    /// `#include "name"`: splices an assembled library at this line.
    fn parse_include(
        &self,
        cursor: &mut LineCursor,
        line: usize,
        unit: &mut Programm,
    ) -> Result<(), CompileError> {
        cursor.skip(INCLUDE.len());
        if cursor.at_line_end() {
            return Err(err(CompileErrorCode::MissingLibraryIdentifier, line, Range::from(0)));
        }
        let open = cursor.position();
        if !cursor.eat(STR) {
            return Err(err(CompileErrorCode::UnexpectedToken, line, Range::from(open))
                .with_detail("expected `\"` after #include"));
        }
        let name = cursor.eat_while(|c| c != STR);
        if !cursor.eat(STR) {
            return Err(
                err(CompileErrorCode::MissingToken, line, Range::span(open, cursor.position()))
                    .with_detail("closing `\"` of #include"),
            );
        }
        let Some(lib) = self.libs.get(&name) else {
            return Err(err(
                CompileErrorCode::UnknownLibraryIdentifier,
                line,
                Range::span(open, cursor.position()),
            )
            .with_detail(format!("\"{name}\"")));
        };
        if !cursor.at_line_end() {
            return Err(err(CompileErrorCode::UnexpectedToken, line, Range::from(cursor.position())));
        }

        unit.text.extend(lib.text.iter().cloned().map(|mut entry| {
            entry.set_line(line);
            entry
        }));
        unit.data.extend(lib.data.iter().cloned().map(|mut constant| {
            constant.line = line;
            constant
        }));
        if !unit.dependencies.contains(&name) {
            unit.dependencies.push(name.clone());
        }
        debug!(
            library = %name,
            entries = lib.text.len(),
            constants = lib.data.len(),
            "including library"
        );
        Ok(())
    }

    fn parse_text(
        &self,
        cursor: &mut LineCursor,
        line: usize,
        unit: &mut Programm,
        exports: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        let start = cursor.position();
        let export = cursor.match_str(EXPORT, true);
        cursor.eat_whitespace();
        let word_start = cursor.position();
        let word = cursor.eat_while(is_word_char);

        if cursor.eat(LABEL_END) {
            if word == LIB_MAIN || word.starts_with(RESERVED_PREFIX) {
                return Err(err(
                    CompileErrorCode::IllegalLabel,
                    line,
                    Range::span(start, cursor.position()),
                )
                .with_detail(format!("\"{word}\" is reserved for libraries")));
            }
            if !is_label_name(&word) {
                return Err(err(
                    CompileErrorCode::IllegalNamingScheme,
                    line,
                    Range::span(word_start, cursor.position()),
                )
                .with_detail(format!("\"{word}\", expected [A-Za-z][A-Za-z0-9_]*")));
            }
            unit.text.push(TextEntry::Label(LabelDef {
                name: word.clone(),
                line,
            }));
            if export {
                exports.push(word);
            }
            if cursor.at_line_end() {
                return Ok(());
            }
        } else if export {
            return Err(err(CompileErrorCode::UnexpectedToken, line, Range::from(word_start))
                .with_detail("@export must be followed by a label definition"));
        } else {
            cursor.rewind(word_start);
        }
        self.parse_instruction(cursor, line, unit)
    }

    fn parse_instruction(
        &self,
        cursor: &mut LineCursor,
        line: usize,
        unit: &mut Programm,
    ) -> Result<(), CompileError> {
        let pre_cn = cursor.position();
        let mnemonic = cursor.eat_while(is_word_char).to_ascii_lowercase();
        if mnemonic.is_empty() {
            return Err(err(CompileErrorCode::UnexpectedToken, line, Range::from(pre_cn))
                .with_detail(format!("unexpected \"{}\"", cursor.rest().trim())));
        }
        let Ok(entry) = self.opcodes.get_opcode(&mnemonic) else {
            return Err(err(
                CompileErrorCode::InvalidInstruction,
                line,
                Range::span(pre_cn, cursor.position()),
            )
            .with_detail(format!("\"{mnemonic}\"")));
        };

        let operands = parse_operands(cursor, line)?;
        match entry.check {
            Some(check) => check(&operands).map_err(|reason| {
                err(CompileErrorCode::IllegalOperands, line, Range::from(pre_cn)).with_detail(reason)
            })?,
            None if self.debug => {
                warn!(line = line + 1, "`{mnemonic}` has no operand checker, accepted unchecked")
            }
            None => {}
        }
        unit.text.push(TextEntry::Instruction(Instruction::new(
            &mnemonic, operands, line,
        )));
        Ok(())
    }
}

/// `.text:` or `.data:`, recognized in every mode.
fn parse_marker(cursor: &mut LineCursor, line: usize) -> Result<Option<Mode>, CompileError> {
    let mode = if cursor.match_str(TEXT_MARKER, true) {
        Mode::Text
    } else if cursor.match_str(DATA_MARKER, true) {
        Mode::Data
    } else {
        return Ok(None);
    };
    if !cursor.at_line_end() {
        return Err(err(CompileErrorCode::UnexpectedToken, line, Range::from(cursor.position())));
    }
    Ok(Some(mode))
}

/// `name: value` option declarations.
fn parse_global(cursor: &mut LineCursor, line: usize, unit: &mut Programm) -> Result<(), CompileError> {
    let start = cursor.position();
    let name = cursor.eat_while(|c| is_word_char(c) || c == '-');
    if !is_identifier(&name) || !cursor.eat(LABEL_END) {
        return Err(err(CompileErrorCode::InvalidGlobalSymbol, line, Range::from(start))
            .with_detail(format!("\"{}\"", cursor.rest().trim())));
    }
    let value = cursor.eat_while(|c| c != COMMENT);
    let value = value.trim();
    if value.is_empty() {
        return Err(err(CompileErrorCode::MissingOptionValue, line, Range::from(start))
            .with_detail(format!("option \"{name}\"")));
    }
    unit.options.insert(name, value.to_string());
    Ok(())
}

/// `name db|dw|dd value[, value...]`
fn parse_data(cursor: &mut LineCursor, line: usize, unit: &mut Programm) -> Result<(), CompileError> {
    let start = cursor.position();
    let name = cursor.eat_while(|c| !c.is_whitespace() && c != COMMENT);
    if !is_identifier(&name) {
        return Err(err(
            CompileErrorCode::IllegalNamingScheme,
            line,
            Range::span(start, cursor.position()),
        )
        .with_detail(format!("\"{name}\", expected [A-z][A-z0-9_-]*")));
    }
    cursor.eat_whitespace();
    let size_start = cursor.position();
    let size = cursor.eat_while(|c| c.is_ascii_alphanumeric());
    let Some(width) = Width::from_directive(&size) else {
        return Err(err(
            CompileErrorCode::IllegalSizeScheme,
            line,
            Range::span(size_start, cursor.position()),
        )
        .with_detail(format!("\"{size}\", expected db, dw or dd")));
    };
    if cursor.at_line_end() {
        return Err(err(CompileErrorCode::MissingToken, line, Range::from(cursor.position()))
            .with_detail("value"));
    }
    let values = parse_data_values(cursor, line, width)?;
    unit.data.push(DataConstant::new(&name, width, values, line));
    Ok(())
}

/// Unit wide checks: unique labels and constants, and every referenced label
/// or constant defined. Reference errors point at the referencing line.
fn validate(unit: &Programm) -> Result<(), CompileError> {
    let mut labels = HashSet::new();
    for entry in &unit.text {
        if let TextEntry::Label(label) = entry {
            if !labels.insert(label.name.as_str()) {
                return Err(err(
                    CompileErrorCode::IllegalLabelRedefinition,
                    label.line,
                    Range::from(0),
                )
                .with_detail(format!("\"{}\"", label.name)));
            }
        }
    }

    let mut constants = HashSet::new();
    for constant in &unit.data {
        if !constants.insert(constant.name.as_str()) {
            return Err(err(
                CompileErrorCode::IllegalConstantRedefinition,
                constant.line,
                Range::from(0),
            )
            .with_detail(format!("\"{}\"", constant.name)));
        }
    }

    for instruction in unit.instructions() {
        for operand in &instruction.operands {
            let missing = match operand {
                Operand::Label(name) if !labels.contains(name.as_str()) => {
                    Some((CompileErrorCode::UndefinedLabel, name))
                }
                Operand::DataOffset(name) | Operand::DataMemReference(name)
                    if !constants.contains(name.as_str()) =>
                {
                    Some((CompileErrorCode::UndefinedConstant, name))
                }
                _ => None,
            };
            if let Some((code, name)) = missing {
                return Err(err(code, instruction.line, Range::from(0))
                    .with_detail(format!("\"{name}\"")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::RegisterRef;

    fn code(result: Result<Programm, CompileError>) -> (CompileErrorCode, usize) {
        let error = result.unwrap_err();
        (error.code, error.line)
    }

    fn reg(name: &str) -> Operand {
        Operand::Register(name.parse::<RegisterRef>().unwrap())
    }

    #[test]
    fn modes_switch_on_markers() {
        let unit = Assembler::new()
            .parse(
                "author: me ; comment\n\
                 .data:\n\
                 msg db \"Hi\"\n\
                 nums dw 1, 2*?, 0x10\n\
                 .text:\n\
                 main:\n\
                 \x20   mov eax, offset msg\n\
                 \x20   mov bl, [msg]\n\
                 \x20   jmp main\n",
            )
            .unwrap();
        assert_eq!(unit.options["author"], "me");
        assert_eq!(unit.data.len(), 2);
        assert_eq!(unit.data[0].values, vec![Some(b'H' as u32), Some(b'i' as u32), Some(0)]);
        assert_eq!(unit.data[1].width, Width::Word);
        assert_eq!(unit.data[1].values, vec![Some(1), None, None, Some(0x10)]);
        assert_eq!(unit.labels().collect::<Vec<_>>(), vec!["main"]);
        let instructions: Vec<_> = unit.instructions().collect();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0].operands[1], Operand::DataOffset("msg".into()));
        assert_eq!(instructions[1].operands[0], reg("bl"));
        assert_eq!(instructions[2].line, 8);
    }

    #[test]
    fn label_may_share_a_line_with_an_instruction() {
        let unit = Assembler::new()
            .parse(".text:\nloop: dec ecx\n  jnz loop ; again\n")
            .unwrap();
        assert_eq!(unit.text.len(), 3);
        assert_eq!(unit.text[0].as_label(), Some("loop"));
        assert_eq!(unit.text[1].as_instruction().map(|i| i.line), Some(1));
    }

    #[test]
    fn text_mode_errors() {
        let assembler = Assembler::new();
        let cases = [
            ("wrong eax, 1", CompileErrorCode::InvalidInstruction),
            ("mov eax, [123hsd]", CompileErrorCode::InvalidTokenDirectMemory),
            ("mov eax, 123hsd", CompileErrorCode::InvalidTokenNumber),
            ("mov eax, [EAX][NOREG]", CompileErrorCode::InvalidTokenRegister),
            ("mov eax ebx", CompileErrorCode::UnexpectedToken),
            ("mov eax, [EDX", CompileErrorCode::MissingToken),
            ("libmain:", CompileErrorCode::IllegalLabel),
            ("__hidden:", CompileErrorCode::IllegalLabel),
            ("_start:", CompileErrorCode::IllegalNamingScheme),
            ("jmp _start", CompileErrorCode::UnexpectedToken),
            ("mov 1, eax", CompileErrorCode::IllegalOperands),
            ("BT EAX, 123", CompileErrorCode::IllegalOperands),
            ("@export mov eax, 1", CompileErrorCode::UnexpectedToken),
        ];
        for (line, expected) in cases {
            let result = assembler.parse(&format!(".text:\n{line}"));
            assert_eq!(code(result), (expected, 1), "{line}");
        }
    }

    #[test]
    fn instruction_errors_carry_a_range() {
        let error = Assembler::new().parse(".text:\n  wrong eax").unwrap_err();
        assert_eq!(error.range, Range::span(2, 7));
        assert_eq!(error.detail.as_deref(), Some("\"wrong\""));
    }

    #[test]
    fn data_mode_errors() {
        let assembler = Assembler::new();
        let cases = [
            ("1abc db 1", CompileErrorCode::IllegalNamingScheme),
            ("abc dq 1", CompileErrorCode::IllegalSizeScheme),
            ("abc dd \"text\"", CompileErrorCode::IllegalStringSizeScheme),
            ("abc db", CompileErrorCode::MissingToken),
            ("abc db 1 2", CompileErrorCode::InvalidTokenNumber),
        ];
        for (line, expected) in cases {
            let result = assembler.parse(&format!(".data:\n{line}"));
            assert_eq!(code(result), (expected, 1), "{line}");
        }
    }

    #[test]
    fn global_mode_errors() {
        let assembler = Assembler::new();
        assert_eq!(
            code(assembler.parse("mov eax, 1")),
            (CompileErrorCode::InvalidGlobalSymbol, 0)
        );
        assert_eq!(
            code(assembler.parse("\n.bss:")),
            (CompileErrorCode::InvalidGlobalSymbol, 1)
        );
        assert_eq!(
            code(assembler.parse("name:   ; nothing")),
            (CompileErrorCode::MissingOptionValue, 0)
        );
    }

    #[test]
    fn whole_unit_validation_points_at_the_right_line() {
        let assembler = Assembler::new();
        assert_eq!(
            code(assembler.parse(".text:\na:\nnop\na:")),
            (CompileErrorCode::IllegalLabelRedefinition, 3)
        );
        assert_eq!(
            code(assembler.parse(".text:\nnop\njmp nowhere")),
            (CompileErrorCode::UndefinedLabel, 2)
        );
        assert_eq!(
            code(assembler.parse(".text:\nmov eax, offset nothing")),
            (CompileErrorCode::UndefinedConstant, 1)
        );
        assert_eq!(
            code(assembler.parse(".text:\nmov eax, [nothing]")),
            (CompileErrorCode::UndefinedConstant, 1)
        );
        assert_eq!(
            code(assembler.parse(".data:\nx db 1\nx dw 2")),
            (CompileErrorCode::IllegalConstantRedefinition, 2)
        );
    }

    #[test]
    fn default_libraries_are_registered() {
        let assembler = Assembler::with_default_libs().unwrap();
        let mut names: Vec<_> = assembler.library_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["fib.h", "string.h"]);
        assert!(Assembler::new().library_names().next().is_none());
    }

    #[test]
    fn include_errors() {
        let assembler = Assembler::with_default_libs().unwrap();
        let cases = [
            ("#include", CompileErrorCode::MissingLibraryIdentifier),
            ("#include fib.h", CompileErrorCode::UnexpectedToken),
            ("#include \"fib.h", CompileErrorCode::MissingToken),
            ("#include \"nope.h\"", CompileErrorCode::UnknownLibraryIdentifier),
        ];
        for (line, expected) in cases {
            assert_eq!(code(assembler.parse(line)), (expected, 0), "{line}");
        }
        for marker in [".text:", ".data:"] {
            let source = format!("{marker}\n#include \"nonexistent\"");
            assert_eq!(
                code(assembler.parse(&source)),
                (CompileErrorCode::UnknownLibraryIdentifier, 1),
                "{marker}"
            );
        }
    }

    #[test]
    fn includes_work_in_data_mode() {
        let assembler = Assembler::with_default_libs().unwrap();
        let unit = assembler
            .parse(".data:\nn dd 3\n#include \"fib.h\"\nm dd 4\n")
            .unwrap();
        assert_eq!(unit.dependencies, vec!["fib.h"]);
        assert_eq!(unit.data.len(), 2);
    }

    #[test]
    fn mnemonics_and_size_directives_ignore_case() {
        let unit = Assembler::new()
            .parse(".data:\n a DB 0x41, 0x42\n.text:\n MOV AL, [a]\n")
            .unwrap();
        assert_eq!(unit.data.len(), 1);
        assert_eq!(unit.data[0].width, Width::Byte);
        assert_eq!(unit.data[0].values, vec![Some(0x41), Some(0x42)]);
        let mov = unit.instructions().next().unwrap();
        assert_eq!(mov.mnemonic, "mov");
        assert_eq!(mov.operands, vec![reg("al"), Operand::DataMemReference("a".into())]);
    }

    #[test]
    fn libraries_are_namespaced_and_wrapped() {
        let mut assembler = Assembler::new();
        let lib = assembler
            .parse_lib(
                "util",
                ".text:\n@export twice:\n  call helper\n  ret\nhelper:\n  add eax, eax\n  ret\n",
            )
            .unwrap();
        let labels: Vec<_> = lib.labels().collect();
        assert_eq!(labels, vec!["twice", "__lib_util_helper", "__lib_util_libmain"]);
        let first = lib.text[0].as_instruction().unwrap();
        assert_eq!(first.mnemonic, "jmp");
        assert_eq!(first.operands, vec![Operand::Label("__lib_util_libmain".into())]);
        assert!(!first.is_lib_code);
        let body: Vec<_> = lib.instructions().skip(1).collect();
        assert!(body.iter().all(|i| i.is_lib_code));
        assert_eq!(body[0].operands, vec![Operand::Label("__lib_util_helper".into())]);
        assert!(assembler.library("util").is_some());
    }

    #[test]
    fn library_name_is_the_default_export() {
        let mut assembler = Assembler::new();
        let lib = assembler
            .parse_lib("square", ".text:\nsquare:\n  mul eax\n  ret\n")
            .unwrap();
        assert!(lib.labels().any(|l| l == "square"));
        let lib = assembler
            .parse_lib("cube.h", ".text:\ncube:\n  ret\nother:\n  ret\n")
            .unwrap();
        assert!(lib.labels().any(|l| l == "cube"));
        assert!(lib.labels().any(|l| l == "__lib_cube.h_other"));
    }

    #[test]
    fn includes_splice_at_the_include_line() {
        let assembler = Assembler::with_default_libs().unwrap();
        let unit = assembler
            .parse("; prelude\n#include \"fib.h\"\n.text:\n  push 10\n  call fib\n")
            .unwrap();
        assert_eq!(unit.dependencies, vec!["fib.h"]);
        let lib_len = assembler.library("fib.h").unwrap().text.len();
        assert!(unit.text[..lib_len].iter().all(|entry| entry.line() == 1));
        assert_eq!(unit.text[lib_len].line(), 3);
    }

    #[test]
    fn exports_are_collected() {
        let mut exports = Vec::new();
        Assembler::new()
            .parse_with_exports(".text:\n@export a:\nnop\nb:\n@EXPORT c:\n", &mut exports)
            .unwrap();
        assert_eq!(exports, vec!["a", "c"]);
    }
}
