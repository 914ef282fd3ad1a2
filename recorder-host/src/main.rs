//! wav-recorder - command prompt for recording and playing WAV files
//!
//! Reads one command per line from stdin and feeds the recorder.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use crossbeam_channel::{unbounded, Sender};
use log::info;

use recorder_core::{Command, Recorder};
use recorder_host::cli::{self, Args};
use recorder_host::console::{self, ConsoleDelegate};
use recorder_host::{FsStore, HostError, SimulatedSink, SimulatedSource};

fn main() -> ExitCode {
    // Parse command-line arguments and initialize logging
    let args = Args::parse();
    cli::init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("wav-recorder: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), HostError> {
    let config = args.recorder_config()?;
    let store = Arc::new(FsStore::open_dir(&args.store_dir)?);
    info!("Recordings are stored in {}", store.root().display());

    let realtime = args.realtime();
    let source = SimulatedSource::new(&config, args.tone_hz, realtime);
    let sink = SimulatedSink::new(&config, realtime);
    let mut recorder = Recorder::new(config, source, sink, store)?;
    recorder.set_delegate(Arc::new(ConsoleDelegate::new(io::stdout())));

    let (commands_tx, commands_rx) = unbounded();
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || read_commands(commands_tx))
        .map_err(|_| HostError::Spawn("stdin".into()))?;

    println!("=== WAV Recorder ===");
    println!("{}", recorder_core::USAGE);
    recorder.run(&commands_rx, |command, result| {
        println!("{}", console::describe(command, result));
    });
    info!("Input closed, recorder shut down");
    Ok(())
}

/// Parse stdin lines into commands until EOF or `quit`.
fn read_commands(commands_tx: Sender<Command>) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if commands_tx.send(command).is_err() {
                    break;
                }
            }
            Err(e) => println!("{}", e),
        }
    }
}
