//! The `tml` command dispatcher.
//!
//! Routes subcommands to the driver. Tool commands (`fmt`, `lint`, `test`,
//! `mcp`) and the front end (`lex`, `parse`, and the parsing stage of
//! `build`/`run`/`check`) resolve their capability from loaded plugins;
//! a missing provider is the stable `L013` toolchain error.
//!
//! Exit codes: 0 on success, 1 on toolchain/plugin errors and on
//! diagnostic-caused failures (diagnostics print their own stable codes).

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use crate::driver::{self, BuildConfig};
use tml_common::explain;

#[derive(Parser)]
#[command(name = "tml", version, about = "The TML compiler")]
struct Cli {
    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a TML source file or project
    Build {
        /// Source file or project directory
        path: PathBuf,

        /// Optimization level (0-3)
        #[arg(long = "opt-level", default_value = "0")]
        opt_level: u8,

        /// Emit the IR (.ll) alongside the binary
        #[arg(long = "emit-ir")]
        emit_ir: bool,

        /// Output path for the compiled binary
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target triple for cross-compilation
        #[arg(long)]
        target: Option<String>,

        /// Compilation-group worker threads
        #[arg(long = "num-threads", default_value = "1")]
        num_threads: usize,

        /// Instrument builtin and intrinsic call sites for coverage
        #[arg(long)]
        coverage: bool,
    },
    /// Build and run immediately
    Run {
        path: PathBuf,
        /// Arguments passed through to the program
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Type check without code generation
    Check { path: PathBuf },
    /// Run tests
    Test {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Format source code
    Fmt { path: PathBuf },
    /// Lint source code
    Lint { path: PathBuf },
    /// Show lexer tokens
    Lex { path: PathBuf },
    /// Show the parse tree
    Parse { path: PathBuf },
    /// Initialize a new project
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Start the MCP server
    Mcp,
    /// Explain an error code
    Explain { code: String },
}

/// Entry point shared by the plugin export and the launcher fallback.
/// Returns the process exit code.
pub fn run(args: Vec<String>) -> i32 {
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders help/version through the same path.
            let _ = err.print();
            return if err.use_stderr() { 2 } else { 0 };
        }
    };

    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let outcome = match cli.command {
        Commands::Build {
            path,
            opt_level,
            emit_ir,
            output,
            target,
            num_threads,
            coverage,
        } => driver::build(&BuildConfig {
            path,
            opt_level,
            emit_ir,
            output,
            target,
            num_threads,
            coverage,
            verbose: cli.verbose,
        })
        .map(|_| ()),
        Commands::Run { path, args } => driver::run_program(&path, &args),
        Commands::Check { path } => driver::check(&path),
        Commands::Test { path } => driver::tool_command("test_run", &path),
        Commands::Fmt { path } => driver::tool_command("format", &path),
        Commands::Lint { path } => driver::tool_command("lint", &path),
        Commands::Lex { path } => driver::front_end_command("lex", &path),
        Commands::Parse { path } => driver::front_end_command("parse", &path),
        Commands::Init { path } => driver::init_project(&path),
        Commands::Mcp => driver::tool_command("mcp_server", &PathBuf::from(".")),
        Commands::Explain { code } => {
            match explain::explain(&code) {
                Some(text) => {
                    println!("{code}: {text}");
                    Ok(())
                }
                None => {
                    eprintln!("error: no explanation recorded for '{code}'");
                    return 1;
                }
            }
        }
    };

    match outcome {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

/// Convenience wrapper used by tests: run and exit.
pub fn run_and_exit(args: Vec<String>) -> ! {
    process::exit(run(args))
}
