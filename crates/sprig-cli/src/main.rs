//! Script runner and REPL for the sprig VM.
//!
//! With a file argument, loads and evaluates it; without one, runs an
//! interactive read-eval-print loop on stdin. `RUST_LOG=sprig=debug`
//! surfaces GC and load tracing.

use std::{
    env,
    io::{self, BufRead, Write},
    path::Path,
    process::ExitCode,
};

use sprig::{Limits, Vm, WriteOpts};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut vm = Vm::new(Limits::default());

    match args.get(1) {
        Some(path) => run_file(&mut vm, Path::new(path)),
        None => repl(&mut vm),
    }
}

fn run_file(vm: &mut Vm, path: &Path) -> ExitCode {
    match vm.load(path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(code) = vm.exit_requested() {
                return exit_code_of(code);
            }
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn repl(vm: &mut Vm) -> ExitCode {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("sprig> ");
        let _ = io::stdout().flush();
        let Some(line) = lines.next() else {
            return ExitCode::SUCCESS; // end of input
        };
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match vm.eval_str(&line) {
            Ok(value) => {
                // Void results print nothing, like define and set!.
                let text = vm.write_sexpr(value, &WriteOpts::default());
                if text != "#<void>" {
                    println!("{text}");
                }
            }
            Err(err) => eprintln!("error: {err}"),
        }
        if let Some(code) = vm.exit_requested() {
            return exit_code_of(code);
        }
    }
}

fn exit_code_of(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
