use std::io;
use std::process::ExitCode;

use anyhow::Result;
use smtp_health::SmtpHealthCheck;
use tracing_subscriber::EnvFilter;

#[path = "smtp-health-check/args.rs"]
mod args;
#[path = "smtp-health-check/output.rs"]
mod output;

use args::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("smtp-health-check: {err:#}");
            // codes de sortie : 0 OK, 1 CRITICAL, 2 fatal
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let format = cli.parsed_format()?;
    let results = SmtpHealthCheck::new(cli.options()).run(&cli.target());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    output::write_report(&results, format, &mut out)
}

fn init_logging(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(io::stderr)
        .init();
}
