use anyhow::{Result, bail};
use clap::{ArgAction, Parser};
use smtp_health::{CheckOptions, DEFAULT_PORT, Target};

const ABOUT: &str = "\
Connects to a remote SMTP server, verifying that it responds with a banner code
that indicates a healthy system (e.g. 220). Each step of the connection may be
timed. The output of this health check shows the results of the check, and the
length of time taken by each piece of the operation.";

#[derive(Parser, Debug)]
#[command(name = "smtp-health-check", version, about = ABOUT)]
pub struct Cli {
    /// host name or IP address of the SMTP server (one host per run)
    pub host: String,

    /// the port to connect to
    #[arg(short, long, value_name = "NUM", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// initiate an SSL handshake before getting the banner
    #[arg(short, long)]
    pub ssl: bool,

    /// the DNS lookup failure timeout (0 disables it)
    #[arg(short, long, value_name = "SEC", default_value_t = 10)]
    pub dns_timeout: u64,

    /// the connection failure timeout (0 disables it)
    #[arg(short, long, value_name = "SEC", default_value_t = 10)]
    pub connect_timeout: u64,

    /// the SSL handshake failure timeout (0 disables it)
    #[arg(short = 'e', long, value_name = "SEC", default_value_t = 10)]
    pub ssl_timeout: u64,

    /// the banner failure timeout (0 disables it)
    #[arg(short, long, value_name = "SEC", default_value_t = 10)]
    pub banner_timeout: u64,

    /// format: text|json
    #[arg(long, default_value = "text")]
    pub format: String,

    /// more logs on stderr (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn target(&self) -> Target {
        Target::new(self.host.as_str())
            .port(self.port)
            .with_ssl(self.ssl)
    }

    pub fn options(&self) -> CheckOptions {
        CheckOptions::from_secs(
            Some(self.dns_timeout),
            Some(self.connect_timeout),
            Some(self.ssl_timeout),
            Some(self.banner_timeout),
        )
    }

    pub fn parsed_format(&self) -> Result<Format> {
        format_from_str(&self.format)
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

pub fn format_from_str(s: &str) -> Result<Format> {
    match s {
        "text" => Ok(Format::Text),
        "json" => Ok(Format::Json),
        other => bail!("unknown --format '{other}', use: text|json"),
    }
}
