//! SMTP banner health checking.
//!
//! The public entry point is [`SmtpHealthCheck`], which resolves a host,
//! connects (optionally over TLS), reads the greeting banner and reports
//! per-stage timings plus a final status in a [`ResultSet`].

mod banner;
mod check;
mod connection;
mod dns;
mod error;
mod options;
mod results;
mod timer;
mod types;

pub use banner::Banner;
pub use check::SmtpHealthCheck;
pub use connection::MAX_BANNER_BYTES;
pub use dns::{Resolve, SystemResolver};
pub use error::{CheckError, ErrorKind};
pub use options::{CheckOptions, DEFAULT_PORT, Target};
pub use results::{ResultSet, Value};
pub use timer::{Deadline, Timed, timed};
pub use types::{Field, Stage, Status};
