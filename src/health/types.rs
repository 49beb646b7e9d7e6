use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// One ordered step of a health check.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Resolve,
    Connect,
    SecureUpgrade,
    ReceiveBanner,
    ValidateBanner,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Connect => "connect",
            Self::SecureUpgrade => "ssl",
            Self::ReceiveBanner => "banner",
            Self::ValidateBanner => "validate",
        }
    }

    /// Message carried by the `Timeout` error raised when this stage runs out
    /// of time.
    pub fn timeout_message(&self) -> &'static str {
        match self {
            Self::Resolve => "DNS lookup timed out.",
            Self::Connect => "Connection timed out.",
            Self::SecureUpgrade => "SSL handshake timed out.",
            Self::ReceiveBanner => "Receiving banner timed out.",
            Self::ValidateBanner => "Request timed out",
        }
    }

    /// Result field holding the stage's elapsed time. Validation is not
    /// timed.
    pub fn elapsed_field(&self) -> Option<Field> {
        match self {
            Self::Resolve => Some(Field::DnsElapsed),
            Self::Connect => Some(Field::ConnectElapsed),
            Self::SecureUpgrade => Some(Field::SslElapsed),
            Self::ReceiveBanner => Some(Field::BannerElapsed),
            Self::ValidateBanner => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall verdict of a check. Starts out `Critical`.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    Ok,
    #[default]
    Critical,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Critical => 1,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known result keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Status,
    DnsElapsed,
    ConnectElapsed,
    SslElapsed,
    BannerElapsed,
    BannerCode,
    BannerMessage,
    ExceptionType,
    ExceptionValue,
    ExceptionTraceback,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::DnsElapsed => "Dns-Elapsed",
            Self::ConnectElapsed => "Connect-Elapsed",
            Self::SslElapsed => "Ssl-Elapsed",
            Self::BannerElapsed => "Banner-Elapsed",
            Self::BannerCode => "Banner-Code",
            Self::BannerMessage => "Banner-Message",
            Self::ExceptionType => "Exception-Type",
            Self::ExceptionValue => "Exception-Value",
            Self::ExceptionTraceback => "Exception-Traceback",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.as_str().to_string()
    }
}
