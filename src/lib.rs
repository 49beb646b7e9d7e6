#![forbid(unsafe_code)]
//! smtp_health — single-shot SMTP health check

pub mod health;
pub use health::{
    Banner,
    CheckError,
    CheckOptions,
    DEFAULT_PORT,
    ErrorKind,
    Field,
    MAX_BANNER_BYTES,
    Resolve,
    ResultSet,
    SmtpHealthCheck,
    Stage,
    Status,
    SystemResolver,
    Target,
    Value,
};
