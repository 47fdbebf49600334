//! l0c: lexes, parses, checks, and lowers one or more L0 source files to
//! LLVM IR, writing a `<stem>.ll` file beside each input.

mod cli;

use cli::Cli;

use std::fs;

use log::error;

fn main() {
    let args = Cli::init();

    simple_logger::init_with_level((&args.verbosity).into()).expect("only one logger is ever initialized");

    match l0c::compile(args.files) {
        Ok(outputs) => {
            for (name, ir) in outputs {
                let path = format!("{name}.ll");
                if let Err(e) = fs::write(&path, ir) {
                    error!("failed to write '{path}': {e}");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
