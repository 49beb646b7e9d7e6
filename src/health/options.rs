use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 25;

/// Per-stage deadlines for [`SmtpHealthCheck`](crate::SmtpHealthCheck).
/// `None` leaves the stage unbounded.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub dns_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub ssl_timeout: Option<Duration>,
    pub banner_timeout: Option<Duration>,
}

impl CheckOptions {
    /// Builds options from whole seconds. Zero disables the deadline, like an
    /// absent value.
    pub fn from_secs(
        dns: Option<u64>,
        connect: Option<u64>,
        ssl: Option<u64>,
        banner: Option<u64>,
    ) -> Self {
        Self {
            dns_timeout: secs(dns),
            connect_timeout: secs(connect),
            ssl_timeout: secs(ssl),
            banner_timeout: secs(banner),
        }
    }

    pub fn uniform(timeout: Duration) -> Self {
        Self {
            dns_timeout: Some(timeout),
            connect_timeout: Some(timeout),
            ssl_timeout: Some(timeout),
            banner_timeout: Some(timeout),
        }
    }
}

fn secs(value: Option<u64>) -> Option<Duration> {
    value.filter(|s| *s > 0).map(Duration::from_secs)
}

/// Host to check.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub with_ssl: bool,
}

impl Target {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            with_ssl: false,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssl(mut self, with_ssl: bool) -> Self {
        self.with_ssl = with_ssl;
        self
    }
}
