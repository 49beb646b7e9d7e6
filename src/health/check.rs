use std::io;
use std::net::SocketAddr;

use crate::health::banner::Banner;
use crate::health::connection::{Channel, Transport, read_banner, release};
use crate::health::dns::{Resolve, SystemResolver};
use crate::health::error::CheckError;
use crate::health::options::{CheckOptions, Target};
use crate::health::results::ResultSet;
use crate::health::timer::{Timed, timed};
use crate::health::types::{Field, Stage};

/// One-shot SMTP health check.
///
/// Resolves the target, connects, optionally negotiates TLS, reads the
/// greeting banner and classifies it. Every stage runs under its own
/// deadline from [`CheckOptions`]. [`run`](Self::run) consumes the check, so
/// each instance probes exactly one target.
#[derive(Debug)]
pub struct SmtpHealthCheck {
    options: CheckOptions,
    results: ResultSet,
    transport: Option<Transport>,
}

struct Failure {
    stage: Stage,
    error: CheckError,
}

impl Failure {
    fn at(stage: Stage) -> impl FnOnce(CheckError) -> Self {
        move |error| Self { stage, error }
    }
}

impl SmtpHealthCheck {
    pub fn new(options: CheckOptions) -> Self {
        Self {
            options,
            results: ResultSet::new(),
            transport: None,
        }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Runs the check with the system resolver. Never fails: every error
    /// ends up in the returned [`ResultSet`].
    pub fn run(self, target: &Target) -> ResultSet {
        self.run_with_resolver(target, &SystemResolver)
    }

    pub fn run_with_resolver<R>(mut self, target: &Target, resolver: &R) -> ResultSet
    where
        R: Resolve + ?Sized,
    {
        let span = tracing::info_span!(
            "smtp_health_check",
            host = %target.host,
            port = target.port,
            ssl = target.with_ssl
        );
        let _entered = span.enter();

        match self.execute(target, resolver) {
            Ok(()) => tracing::info!("server is healthy"),
            Err(failure) => {
                tracing::warn!(
                    stage = %failure.stage,
                    kind = %failure.error.kind(),
                    error = %failure.error,
                    "health check failed"
                );
                self.record_failure(&failure);
            }
        }
        conclude(self.results, self.transport.take())
    }

    fn execute<R>(&mut self, target: &Target, resolver: &R) -> Result<(), Failure>
    where
        R: Resolve + ?Sized,
    {
        let records = self
            .lookup(target, resolver)
            .map_err(Failure::at(Stage::Resolve))?;
        self.connect(&records)
            .map_err(Failure::at(Stage::Connect))?;
        if target.with_ssl {
            self.wrap_ssl(&target.host)
                .map_err(Failure::at(Stage::SecureUpgrade))?;
        }
        let banner = self
            .get_banner()
            .map_err(Failure::at(Stage::ReceiveBanner))?;
        self.check_banner(&banner)
            .map_err(Failure::at(Stage::ValidateBanner))
    }

    fn lookup<R>(&mut self, target: &Target, resolver: &R) -> Result<Vec<SocketAddr>, CheckError>
    where
        R: Resolve + ?Sized,
    {
        let records = timed(Stage::Resolve, self.options.dns_timeout, |deadline| {
            resolver.resolve(&target.host, target.port, deadline)
        })?;
        self.record_elapsed(Stage::Resolve, &records);
        Ok(records.value)
    }

    fn connect(&mut self, records: &[SocketAddr]) -> Result<(), CheckError> {
        let addr = records.first().ok_or(CheckError::NoRecords)?;
        let transport = timed(Stage::Connect, self.options.connect_timeout, |deadline| {
            Transport::connect(addr, deadline)
        })?;
        self.record_elapsed(Stage::Connect, &transport);
        self.transport = Some(transport.value);
        Ok(())
    }

    fn wrap_ssl(&mut self, host: &str) -> Result<(), CheckError> {
        let plain = self.transport.take().ok_or_else(not_connected)?;
        let secure = timed(Stage::SecureUpgrade, self.options.ssl_timeout, |deadline| {
            plain.upgrade(host, deadline)
        })?;
        self.record_elapsed(Stage::SecureUpgrade, &secure);
        self.transport = Some(secure.value);
        Ok(())
    }

    fn get_banner(&mut self) -> Result<String, CheckError> {
        let transport = self.transport.as_mut().ok_or_else(not_connected)?;
        let received = timed(
            Stage::ReceiveBanner,
            self.options.banner_timeout,
            |deadline| read_banner(transport, deadline),
        )?;
        self.record_elapsed(Stage::ReceiveBanner, &received);
        Ok(received.value)
    }

    fn check_banner(&mut self, received: &str) -> Result<(), CheckError> {
        let banner = Banner::parse(received)?;
        self.results.insert(Field::BannerCode, banner.code.as_str());
        self.results
            .insert(Field::BannerMessage, banner.message.as_str());
        banner.classify()?;
        self.results.mark_healthy();
        Ok(())
    }

    fn record_elapsed<T>(&mut self, stage: Stage, timed: &Timed<T>) {
        if let Some(field) = stage.elapsed_field() {
            self.results.insert(field, timed.elapsed_secs());
        }
    }

    fn record_failure(&mut self, failure: &Failure) {
        let error = &failure.error;
        self.results
            .insert(Field::ExceptionType, error.kind().as_str());
        self.results.insert(Field::ExceptionValue, error.to_string());
        self.results.insert(
            Field::ExceptionTraceback,
            error.diagnostic_trace(failure.stage),
        );
    }

}

/// Tears down whatever connection is left and hands back the results.
/// Teardown failures are only logged; recorded fields stay as they are.
fn conclude<C: Channel>(results: ResultSet, channel: Option<C>) -> ResultSet {
    if let Some(channel) = channel {
        release(channel);
    }
    results
}

fn not_connected() -> CheckError {
    CheckError::io(io::Error::new(
        io::ErrorKind::NotConnected,
        "no open connection to the server",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::Status;
    use crate::health::results::Value;

    fn check() -> SmtpHealthCheck {
        SmtpHealthCheck::new(CheckOptions::default())
    }

    #[test]
    fn starts_with_critical_status_only() {
        let check = check();
        assert_eq!(check.results().status(), Status::Critical);
        assert_eq!(check.results().len(), 1);
    }

    #[test]
    fn connect_without_records_is_dns_error() {
        let mut check = check();
        let err = check.connect(&[]).expect_err("no records");
        assert!(matches!(err, CheckError::NoRecords));
        assert!(!check.results().contains("Connect-Elapsed"));
    }

    #[test]
    fn check_banner_marks_healthy() {
        let mut check = check();
        check.check_banner("220 Ok\r\n").expect("healthy banner");
        assert_eq!(check.results().get("Banner-Code"), Some(Value::from("220")));
        assert_eq!(check.results().get("Banner-Message"), Some(Value::from("Ok")));
        assert_eq!(check.results().status(), Status::Ok);
    }

    #[test]
    fn check_banner_invalid_stays_critical() {
        let mut check = check();
        let err = check.check_banner("asdf\r\n").expect_err("invalid");
        assert!(matches!(err, CheckError::InvalidBanner { .. }));
        assert_eq!(check.results().status(), Status::Critical);
        assert!(!check.results().contains("Banner-Code"));
    }

    #[test]
    fn check_banner_failure_records_code() {
        let mut check = check();
        let err = check.check_banner("520 No!\r\n").expect_err("failure code");
        assert!(matches!(err, CheckError::BannerRejected { .. }));
        assert_eq!(check.results().get("Banner-Code"), Some(Value::from("520")));
        assert_eq!(check.results().status(), Status::Critical);
    }

    #[test]
    fn check_banner_rejects_several_lines() {
        let mut check = check();
        let err = check
            .check_banner("220-first\r\n554 second\r\n")
            .expect_err("two lines in one read");
        assert!(matches!(err, CheckError::InvalidBanner { .. }));
        assert_eq!(check.results().status(), Status::Critical);
        assert!(!check.results().contains("Banner-Code"));
    }

    #[test]
    fn banner_without_connection_fails() {
        let mut check = check();
        let err = check.get_banner().expect_err("not connected");
        assert_eq!(err.kind().as_str(), "Other");
        assert!(!check.results().contains("Banner-Elapsed"));
    }

    /// Connection whose teardown always fails.
    struct BrokenTeardown {
        calls: Vec<&'static str>,
    }

    impl io::Read for BrokenTeardown {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Channel for BrokenTeardown {
        fn arm(&self, _: &crate::health::timer::Deadline) -> Result<(), CheckError> {
            Ok(())
        }

        fn is_secure(&self) -> bool {
            true
        }

        fn shutdown_secure(&mut self) -> io::Result<()> {
            self.calls.push("shutdown_secure");
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
        }

        fn close(&mut self) -> io::Result<()> {
            self.calls.push("close");
            Err(io::Error::new(io::ErrorKind::NotConnected, "already closed"))
        }
    }

    #[test]
    fn failed_teardown_keeps_recorded_failure() {
        let mut check = check();
        check.record_failure(&Failure {
            stage: Stage::ValidateBanner,
            error: CheckError::BannerRejected {
                code: "554".to_string(),
                message: "go away".to_string(),
            },
        });
        let recorded = check.results().clone();

        let mut channel = BrokenTeardown { calls: Vec::new() };
        let results = conclude(check.results, Some(&mut channel));

        assert_eq!(channel.calls, vec!["shutdown_secure", "close"]);
        assert_eq!(results, recorded);
        assert_eq!(results.status(), Status::Critical);
        assert_eq!(
            results.get("Exception-Type"),
            Some(Value::from("BannerError"))
        );
    }

    #[test]
    fn failed_teardown_keeps_healthy_status() {
        let mut check = check();
        check.check_banner("220 Ok\r\n").expect("healthy banner");
        let recorded = check.results().clone();

        let mut channel = BrokenTeardown { calls: Vec::new() };
        let results = conclude(check.results, Some(&mut channel));
        assert_eq!(results, recorded);
        assert_eq!(results.exit_code(), 0);
    }

    #[test]
    fn failure_fields_are_recorded() {
        let mut check = check();
        check.record_failure(&Failure {
            stage: Stage::ReceiveBanner,
            error: CheckError::BannerTooLong,
        });
        let results = check.results();
        assert_eq!(
            results.get("Exception-Type"),
            Some(Value::from("BannerSyntaxError"))
        );
        assert_eq!(
            results.get("Exception-Value"),
            Some(Value::from("Received too much data from banner."))
        );
        assert!(results.contains("Exception-Traceback"));
    }
}
