use clap::Parser;
use lc3_vm::{TermiosConsole, Vm};

use std::process;

/// Runs an LC-3 object file.
#[derive(Parser)]
#[command(name = "lc3-vm")]
struct Cli {
    /// Path to the .obj image to load and run.
    image: String,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli.image) {
        eprintln!("lc3-vm: {}", e);
        process::exit(1);
    }
}

fn run(image: &str) -> Result<(), lc3_vm::VmError> {
    let console = TermiosConsole::new()?;
    let mut vm = Vm::new(Box::new(console));
    vm.load_image(image)?;
    vm.run()
}
