use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{value_t, App, Arg};
use log::{error, info, LevelFilter};
use thiserror::Error;

use mcpu::{Console, Fault, InstructionSet, Memory, Processor, RegistryError};

#[derive(Debug, Error)]
enum Error {
    #[error("reading {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("instruction set registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("assembly failed: {0}")]
    Assemble(#[from] masm::AssembleError),

    #[error("{0}")]
    Fault(#[from] Fault),
}

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("SOURCE")
                .help("The assembly source file to run")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("debug")
                .help("Log per-cycle pipeline traces")
                .short("d")
                .long("debug"),
        )
        .arg(
            Arg::with_name("text-size")
                .help("Size of the text segment in bytes")
                .long("text-size")
                .takes_value(true)
                .default_value("4096"),
        )
        .arg(
            Arg::with_name("data-size")
                .help("Size of the data segment in bytes")
                .long("data-size")
                .takes_value(true)
                .default_value("4096"),
        )
}

fn run(matches: &clap::ArgMatches) -> Result<(), Error> {
    let text_size = value_t!(matches, "text-size", usize).unwrap_or_else(|e| e.exit());
    let data_size = value_t!(matches, "data-size", usize).unwrap_or_else(|e| e.exit());

    let path = PathBuf::from(matches.value_of("SOURCE").unwrap());
    let source = fs::read_to_string(&path).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })?;

    let set = InstructionSet::mips()?;
    let mut memory = Memory::new(text_size, data_size);

    masm::assemble(&source, &set, &mut memory)?;

    let mut console = Console::stdio();
    let mut processor = Processor::new();
    let stats = processor.run(&set, &mut memory, &mut console)?;

    info!(
        "program exited after {} cycle(s): {} instruction(s), {} nop(s)",
        stats.cycles, stats.instructions, stats.nops
    );
    Ok(())
}

fn main() {
    let matches = app().get_matches();

    let level = if matches.is_present("debug") {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    process::exit(match run(&matches) {
        Ok(()) => 0,
        Err(err) => {
            error!("{}", err);
            1
        }
    });
}
