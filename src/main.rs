use clap::Parser;
use strategy_arena::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
