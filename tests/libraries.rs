use std::{cell::Cell, rc::Rc, sync::atomic::AtomicBool};
use x86emu::{
    App, Assembler, CompileErrorCode, DebugSymbols, LibrarySource, LibraryStore, Programm,
    RunConfig, StopReason,
};

fn execute(assembler: &Assembler, source: &str) -> (App, Programm) {
    let program = assembler.parse(source).unwrap();
    let mut app = App::new();
    app.run_program(&program).unwrap();
    let outcome = app
        .run(&RunConfig::default(), &AtomicBool::new(true))
        .unwrap();
    assert_eq!(outcome.stop, StopReason::Halted);
    (app, program)
}

/// Runs `source` against the bundled `string.h`.
fn run_string_h(source: &str) -> (App, DebugSymbols) {
    let assembler = Assembler::with_default_libs().unwrap();
    let program = assembler
        .parse(&format!("#include \"string.h\"\n{source}"))
        .unwrap();
    let mut app = App::new();
    let symbols = app.run_program(&program).unwrap();
    let outcome = app
        .run(&RunConfig::default(), &AtomicBool::new(true))
        .unwrap();
    assert_eq!(outcome.stop, StopReason::Halted);
    (app, symbols)
}

#[test]
fn fib_of_ten() {
    let assembler = Assembler::with_default_libs().unwrap();
    let (app, program) = execute(
        &assembler,
        "#include \"fib.h\"
        .text:
            push 10
            call fib
        ",
    );
    assert_eq!(app.registers.ebx.get32(), 55);
    assert_eq!(program.dependencies, vec!["fib.h"]);
}

#[test]
fn library_labels_do_not_clash_with_the_program() {
    let assembler = Assembler::with_default_libs().unwrap();
    let (app, _) = execute(
        &assembler,
        "#include \"fib.h\"
        .text:
            push 6
            call fib
            jmp fib_loop
            mov ebx, 0
        fib_loop:
        ",
    );
    assert_eq!(app.registers.ebx.get32(), 8);
}

#[test]
fn strlen_strcpy_strcmp() {
    let assembler = Assembler::with_default_libs().unwrap();
    let (app, _) = execute(
        &assembler,
        "#include \"string.h\"
        .data:
        msg db \"hello\"
        copy db 6*?
        .text:
            push offset msg
            push 0
            call strlen
            pop eax

            push offset copy
            push offset msg
            call strcpy

            push offset msg
            push offset copy
            push 0
            call strcmp
            pop edx
        ",
    );
    assert_eq!(app.registers.eax.get32(), 5);
    assert_eq!(app.registers.edx.get32(), 1);
}

#[test]
fn strcmp_detects_differences() {
    let assembler = Assembler::with_default_libs().unwrap();
    let (app, _) = execute(
        &assembler,
        "#include \"string.h\"
        .data:
        a db \"abc\"
        b db \"abd\"
        .text:
            push offset a
            push offset b
            push 1
            call strcmp
            pop edx
        ",
    );
    assert_eq!(app.registers.edx.get32(), 0);
}

#[test]
fn lib_mode_is_visible_while_library_code_runs() {
    let assembler = Assembler::with_default_libs().unwrap();
    let program = assembler
        .parse("#include \"fib.h\"\n.text:\n push 3\n call fib\n")
        .unwrap();
    let mut app = App::new();
    app.run_program(&program).unwrap();
    let lib_cycles = Rc::new(Cell::new(0));
    let counter = Rc::clone(&lib_cycles);
    app.set_observer(move |app| {
        if app.is_in_lib_mode() {
            counter.set(counter.get() + 1);
        }
    });
    let outcome = app
        .run(&RunConfig::default(), &AtomicBool::new(true))
        .unwrap();
    assert!(lib_cycles.get() > 0);
    assert!(lib_cycles.get() < outcome.cycles);
}

#[test]
fn user_libraries_can_include_earlier_ones() {
    let mut store = LibraryStore::with_defaults();
    store.store(
        "twice.h",
        ".text:
        @export twice:
            mov eax, [esp + 8]
            add eax, eax
            ret
        "
        .into(),
    );
    store.store(
        "quad.h",
        "#include \"twice.h\"
        .text:
        quad:
            mov ebx, [esp + 8]
            push ebx
            call twice
            pop ebx
            push eax
            call twice
            pop ebx
            ret
        "
        .into(),
    );
    let mut assembler = Assembler::new();
    assembler.load_libraries(&store).unwrap();
    assert!(assembler.library("quad.h").is_some());

    let (app, _) = execute(
        &assembler,
        "#include \"quad.h\"
        .text:
            push 5
            call quad
        ",
    );
    assert_eq!(app.registers.eax.get32(), 20);
}

#[test]
fn including_twice_redefines_labels() {
    let assembler = Assembler::with_default_libs().unwrap();
    let err = assembler
        .parse("#include \"fib.h\"\n#include \"fib.h\"")
        .unwrap_err();
    assert_eq!(err.code, CompileErrorCode::IllegalLabelRedefinition);
}

#[test]
fn broken_library_fails_loading() {
    let mut store = LibraryStore::new();
    store.store("bad.h", ".text:\n frobnicate eax".into());
    let err = Assembler::new().load_libraries(&store).unwrap_err();
    assert_eq!(err.code, CompileErrorCode::InvalidInstruction);
    assert_eq!(err.line, 1);
}

#[test]
fn strcat_appends_the_suffix() {
    let (app, symbols) = run_string_h(
        ".data:
        dst db \"foo\", 4*?
        suf db \"bar\"
        .text:
            push offset dst
            push offset suf
            call strcat
        ",
    );
    let dst = symbols.address_of("dst").unwrap();
    assert_eq!(app.memory.slice(dst, 7), Ok(&b"foobar\0"[..]));
}

#[test]
fn strncat_appends_at_most_count_bytes() {
    let (app, symbols) = run_string_h(
        ".data:
        dst db \"ab\", 4*?
        src db \"cdef\"
        .text:
            push offset dst
            push offset src
            push 2
            call strncat
            pop eax
        ",
    );
    let dst = symbols.address_of("dst").unwrap();
    assert_eq!(app.memory.slice(dst, 5), Ok(&b"abcd\0"[..]));
    assert_eq!(app.registers.eax.get32(), 2);
}

#[test]
fn memcpy_copies_length_bytes() {
    let (app, symbols) = run_string_h(
        ".data:
        src db 1, 2, 3
        dst db 4*?
        .text:
            push offset dst
            push offset src
            push 3
            call memcpy
        ",
    );
    let dst = symbols.address_of("dst").unwrap();
    assert_eq!(app.memory.slice(dst, 4), Ok(&[1, 2, 3, 0][..]));
}

#[test]
fn strstr_finds_the_first_occurrence() {
    let (app, symbols) = run_string_h(
        ".data:
        hay db \"hello world\"
        hit db \"wor\"
        miss db \"xyz\"
        .text:
            push offset hay
            push offset hit
            push 0
            call strstr
            pop eax

            push offset hay
            push offset miss
            push 1
            call strstr
            pop ebx
        ",
    );
    let hay = symbols.address_of("hay").unwrap();
    assert_eq!(app.registers.eax.get32(), hay + 6);
    assert_eq!(app.registers.ebx.get32(), 0);
}

#[test]
fn strrchr_finds_the_last_occurrence() {
    let (app, symbols) = run_string_h(
        ".data:
        s db \"banana\"
        .text:
            push offset s
            push 97
            push 0
            call strrchr
            pop eax
        ",
    );
    let s = symbols.address_of("s").unwrap();
    assert_eq!(app.registers.eax.get32(), s + 5);
}

#[test]
fn strchr_finds_the_first_occurrence() {
    let (app, symbols) = run_string_h(
        ".data:
        s db \"banana\"
        .text:
            push offset s
            push 97
            push 0
            call strchr
            pop eax

            push offset s
            push 122
            push 1
            call strchr
            pop ebx
        ",
    );
    let s = symbols.address_of("s").unwrap();
    assert_eq!(app.registers.eax.get32(), s + 1);
    assert_eq!(app.registers.ebx.get32(), 0);
}
