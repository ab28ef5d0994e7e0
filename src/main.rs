//! Offline index builder: comic catalog rows to client-side search artifacts.
//!
//! Binary crate entry point. All CLI logic is in the `cli` module.

mod cli;

fn main() {
    std::process::exit(cli::run());
}
