use std::sync::LazyLock;

use regex::Regex;

use crate::health::error::CheckError;

static BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{3})(?:\s+|-)(.*?)\r?\n$").expect("banner pattern is valid")
});

/// Greeting line sent by an SMTP server right after the connection opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub code: String,
    pub message: String,
}

impl Banner {
    /// Parses the received greeting, which must be exactly one terminated
    /// line. A `-` separator is accepted like a space, but a buffer holding
    /// a second line does not match.
    pub fn parse(received: &str) -> Result<Self, CheckError> {
        let caps = BANNER
            .captures(received)
            .ok_or_else(|| CheckError::InvalidBanner {
                raw: received.to_string(),
            })?;
        Ok(Self {
            code: caps[1].to_string(),
            message: caps[2].to_string(),
        })
    }

    pub fn is_positive_completion(&self) -> bool {
        self.code.starts_with('2')
    }

    /// `Ok` for a 2xx greeting, `BannerRejected` otherwise.
    pub fn classify(&self) -> Result<(), CheckError> {
        if self.is_positive_completion() {
            Ok(())
        } else {
            Err(CheckError::BannerRejected {
                code: self.code.clone(),
                message: self.message.clone(),
            })
        }
    }
}
