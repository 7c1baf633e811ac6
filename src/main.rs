//! Binary entry point.
//!
//! Parses the CLI, initializes stderr logging (stdout is reserved for MCP
//! protocol messages and command output), runs the command, and maps
//! errors to exit codes.

use std::process::ExitCode;

use clap::Parser;

use govreporter::cli::{Cli, execute};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match execute(&cli).await {
        Ok(output) => {
            if !output.is_empty() {
                #[allow(clippy::print_stdout)]
                {
                    println!("{}", output.trim_end());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("error: {e}");
            }
            exit_code(e.exit_code())
        }
    }
}

/// Logging goes to stderr with an env-filter; `RUST_LOG` overrides the
/// `--log-level` flag when set.
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("govreporter={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}
