//! Provides the main entry point to the program.
use human_panic::{metadata, setup_panic};
use osversion::cli::run_cli;

fn main() {
    setup_panic!(metadata!().support("Open an issue with the contents of the crash report"));

    if let Err(err) = run_cli() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
