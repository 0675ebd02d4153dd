use anyhow::{Context, Result};
use opsh::Interpreter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Log level comes from OPSH_LOG ("debug", "info", ...); warnings only by
/// default so the prompt stays clean.
fn init_logging() -> Result<()> {
    let level = std::env::var("OPSH_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(log::LevelFilter::Warn);
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("installing logger")
}

fn main() -> Result<()> {
    init_logging()?;
    Interpreter::default().repl()
}
