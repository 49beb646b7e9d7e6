use std::error::Error as _;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::health::types::Stage;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{}", .stage.timeout_message())]
    Timeout { stage: Stage },
    #[error("DNS lookup returned no results.")]
    NoRecords,
    #[error("invalid host name {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: io::Error,
    },
    #[error("DNS lookup failed: {source}")]
    Lookup {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("TLS handshake failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
    #[error("Received too much data from banner.")]
    BannerTooLong,
    #[error("Invalid banner received: {raw:?}")]
    InvalidBanner { raw: String },
    #[error("Banner reported failure code: {code}")]
    BannerRejected { code: String, message: String },
}

impl CheckError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NoRecords | Self::InvalidHost { .. } => ErrorKind::Dns,
            Self::BannerTooLong | Self::InvalidBanner { .. } => ErrorKind::BannerSyntax,
            Self::BannerRejected { .. } => ErrorKind::Banner,
            Self::ResolverInit { .. }
            | Self::Lookup { .. }
            | Self::Connect { .. }
            | Self::Tls { .. }
            | Self::Io { .. } => ErrorKind::Other,
        }
    }

    pub(crate) fn invalid_host(host: &str, reason: impl fmt::Display) -> Self {
        Self::InvalidHost {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(source: io::Error) -> Self {
        Self::Io { source }
    }

    /// Renders the failing stage and the whole source chain as one quoted
    /// line, so it survives line-oriented output.
    pub fn diagnostic_trace(&self, stage: Stage) -> String {
        let mut lines = vec![
            format!("stage: {stage}"),
            format!("{}: {}", self.kind(), self),
        ];
        let mut source = self.source();
        while let Some(err) = source {
            lines.push(format!("caused by: {err}"));
            source = err.source();
        }
        format!("{:?}", lines.join("\n"))
    }
}

/// Failure categories reported in `Exception-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Dns,
    BannerSyntax,
    Banner,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::Dns => "DNSError",
            Self::BannerSyntax => "BannerSyntaxError",
            Self::Banner => "BannerError",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
