// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use wsrpc_lib::commands::{self, Cli};

/// Makes a single call, either directly or through the credential agent, and prints the result.
///
/// Any failure is printed to stderr and the process exits with status 1. Usage errors exit with
/// status 2.
fn main() {
    let args = Cli::parse();
    commands::init_tracing(args.verbose);

    if let Err(e) = commands::main(&args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
