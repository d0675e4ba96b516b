use clap::Parser;
use colorize::AnsiColor;
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    process::exit,
    sync::atomic::AtomicBool,
    time::Duration,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use x86emu::{
    constant::{DEFAULT_ENTRY, NAME},
    parser::parse_number,
    App, Assembler, CompileError, LibrarySource, LibraryStore, RunConfig, StopReason,
};

#[derive(Parser, Debug)]
#[command(name = NAME, about = "Assemble and run a program on the virtual x86 CPU")]
struct Cli {
    /// Program source file
    source: PathBuf,

    /// Extra library, assembled before the program and available to #include
    #[arg(short, long = "lib", value_name = "NAME=PATH", value_parser = parse_lib_arg)]
    libs: Vec<(String, PathBuf)>,

    /// Do not bundle fib.h and string.h
    #[arg(long)]
    no_default_libs: bool,

    /// Address the last instruction slot of the program ends at
    #[arg(short, long, value_name = "ADDR", value_parser = parse_number, default_value_t = DEFAULT_ENTRY)]
    entry: u32,

    /// Stop after this many cycles
    #[arg(short, long, value_name = "N")]
    max_cycles: Option<u64>,

    /// Pause between cycles
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Assemble only, do not run
    #[arg(short, long)]
    check: bool,

    /// Write the loader's symbol table to this file
    #[arg(long, value_name = "FILE")]
    symbols: Option<PathBuf>,

    /// -v info, -vv debug, -vvv trace; RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_lib_arg(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("[ {raw} ] expected NAME=PATH")),
    }
}

fn fatal(msg: &str) -> ! {
    eprintln!("{NAME}: {} {msg}", "error:".red());
    exit(1)
}

fn handle_compile_err(err: CompileError, source: &str) -> ! {
    eprintln!("{err}\n{}", err.traceback(source));
    exit(1)
}

fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| {
        fatal(&format!("error reading file {} :: {err}", path.display()))
    })
}

fn write_file(image: &[u8], output_file: &Path) -> Result<(), String> {
    let mut outf = File::create(output_file)
        .map_err(|err| format!("error opening file {} :: {err}", output_file.display()))?;
    outf.write_all(image)
        .map_err(|err| format!("error writing to file {} :: {err}", output_file.display()))
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut store = if cli.no_default_libs {
        LibraryStore::new()
    } else {
        LibraryStore::with_defaults()
    };
    for (name, path) in &cli.libs {
        debug!(library = %name, path = %path.display(), "adding library source");
        store.store(name, read_file(path));
    }

    let mut assembler = Assembler::new();
    assembler.set_debug(cli.verbose >= 2);
    if let Err(err) = assembler.load_libraries(&store) {
        let name = err_library(&assembler, &store);
        let source = store.get(&name).unwrap_or_default().to_string();
        eprintln!("{NAME}: in library \"{name}\"");
        handle_compile_err(err, &source);
    }
    let mut loaded: Vec<&str> = assembler.library_names().collect();
    loaded.sort_unstable();
    debug!(libraries = ?loaded, "libraries assembled");

    let source = read_file(&cli.source);
    let program = match assembler.parse(&source) {
        Ok(program) => program,
        Err(err) => handle_compile_err(err, &source),
    };
    info!(
        instructions = program.instruction_count(),
        data_bytes = program.data_size(),
        "assembled {}",
        cli.source.display()
    );
    for (name, value) in &program.options {
        info!("option {name}: {value}");
    }
    if cli.check {
        println!("{}: {}", cli.source.display(), "ok".green());
        return;
    }

    let mut app = App::new();
    let symbols = match app.run_program_at(&program, cli.entry) {
        Ok(symbols) => symbols,
        Err(err) => fatal(&format!("cannot load program :: {err}")),
    };
    debug!("symbols:\n{symbols}");
    if let Some(path) = &cli.symbols {
        if let Err(why) = write_file(&symbols.serialize(), path) {
            fatal(&why)
        }
        info!("wrote symbol table {}", path.display());
    }

    let config = RunConfig {
        max_cycles: cli.max_cycles,
        delay: cli.delay_ms.map(Duration::from_millis),
    };
    let running = AtomicBool::new(true);
    let outcome = match app.run(&config, &running) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{}", app.registers);
            fatal(&format!("execution failed at eip {:#x} :: {err}", app.registers.eip()))
        }
    };

    let stop = match outcome.stop {
        StopReason::Halted => "halted".green(),
        StopReason::Cancelled => "cancelled".yellow(),
        StopReason::CycleLimit => "cycle limit reached".yellow(),
    };
    println!("{stop} after {} cycles", outcome.cycles);
    println!("{}", app.registers);
    println!("{}", app.flags);
}

/// The first library of `store` that did not make it into the assembler.
fn err_library(assembler: &Assembler, store: &LibraryStore) -> String {
    store
        .names()
        .into_iter()
        .find(|name| assembler.library(name).is_none())
        .unwrap_or_default()
}
