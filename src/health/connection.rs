use std::io::{self, Read};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};

use native_tls::{HandshakeError, TlsConnector, TlsStream};

use crate::health::error::CheckError;
use crate::health::timer::Deadline;

/// Hard cap on greeting data accepted before a line terminator shows up.
pub const MAX_BANNER_BYTES: usize = 10_240;
const READ_CHUNK: usize = 1_024;

/// A live connection the pipeline can read a banner from and tear down.
pub(crate) trait Channel: Read {
    /// Bounds the next blocking call by what is left of `deadline`.
    fn arm(&self, deadline: &Deadline) -> Result<(), CheckError>;

    fn is_secure(&self) -> bool;

    /// Sends the TLS close notification. Only called on secure channels.
    fn shutdown_secure(&mut self) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;
}

#[derive(Debug)]
pub(crate) enum Transport {
    Plain(TcpStream),
    Secure(TlsStream<TcpStream>),
}

impl Transport {
    pub(crate) fn connect(addr: &SocketAddr, deadline: &Deadline) -> Result<Self, CheckError> {
        let stream = match deadline.remaining()? {
            Some(left) => TcpStream::connect_timeout(addr, left),
            None => TcpStream::connect(addr),
        }
        .map_err(|err| {
            if is_timeout(&err) {
                deadline.timeout()
            } else {
                CheckError::Connect {
                    addr: *addr,
                    source: err,
                }
            }
        })?;
        Ok(Self::Plain(stream))
    }

    /// Negotiates TLS over a plain transport. The handshake is resumed after
    /// every read that blocked until it completes or the deadline runs out.
    pub(crate) fn upgrade(self, host: &str, deadline: &Deadline) -> Result<Self, CheckError> {
        let plain = match self {
            Self::Plain(stream) => stream,
            secure @ Self::Secure(_) => return Ok(secure),
        };

        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .use_sni(host.parse::<IpAddr>().is_err())
            .build()
            .map_err(|source| CheckError::Tls { source })?;

        arm_stream(&plain, deadline)?;
        let tls = match connector.connect(host, plain) {
            Ok(tls) => tls,
            Err(HandshakeError::Failure(source)) => return Err(handshake_failure(source, deadline)),
            Err(HandshakeError::WouldBlock(mut mid)) => loop {
                arm_stream(mid.get_ref(), deadline)?;
                match mid.handshake() {
                    Ok(tls) => break tls,
                    Err(HandshakeError::Failure(source)) => {
                        return Err(handshake_failure(source, deadline));
                    }
                    Err(HandshakeError::WouldBlock(next)) => mid = next,
                }
            },
        };
        Ok(Self::Secure(tls))
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(stream) => stream,
            Self::Secure(stream) => stream.get_ref(),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Secure(stream) => stream.read(buf),
        }
    }
}

impl Channel for Transport {
    fn arm(&self, deadline: &Deadline) -> Result<(), CheckError> {
        arm_stream(self.tcp(), deadline)
    }

    fn is_secure(&self) -> bool {
        matches!(self, Self::Secure(_))
    }

    fn shutdown_secure(&mut self) -> io::Result<()> {
        match self {
            Self::Secure(stream) => stream.shutdown(),
            Self::Plain(_) => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.tcp().shutdown(Shutdown::Both)
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn arm(&self, deadline: &Deadline) -> Result<(), CheckError> {
        (**self).arm(deadline)
    }

    fn is_secure(&self) -> bool {
        (**self).is_secure()
    }

    fn shutdown_secure(&mut self) -> io::Result<()> {
        (**self).shutdown_secure()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

fn arm_stream(stream: &TcpStream, deadline: &Deadline) -> Result<(), CheckError> {
    let left = deadline.remaining()?;
    stream.set_read_timeout(left).map_err(CheckError::io)?;
    stream.set_write_timeout(left).map_err(CheckError::io)?;
    Ok(())
}

fn handshake_failure(source: native_tls::Error, deadline: &Deadline) -> CheckError {
    if deadline.expired() {
        deadline.timeout()
    } else {
        CheckError::Tls { source }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Reads until the accumulated data ends with `\n`.
///
/// Fails once more than [`MAX_BANNER_BYTES`] arrive without a terminator.
pub(crate) fn read_banner<C: Channel>(
    channel: &mut C,
    deadline: &Deadline,
) -> Result<String, CheckError> {
    let mut received = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        channel.arm(deadline)?;
        let read = match channel.read(&mut chunk) {
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => return Err(deadline.timeout()),
            Err(err) => return Err(CheckError::io(err)),
        };
        if read == 0 {
            return Err(CheckError::io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a complete banner was received",
            )));
        }
        received.extend_from_slice(&chunk[..read]);
        if received.ends_with(b"\n") {
            return Ok(String::from_utf8_lossy(&received).into_owned());
        }
        if received.len() > MAX_BANNER_BYTES {
            return Err(CheckError::BannerTooLong);
        }
    }
}

/// Best-effort teardown: secure layer first, then the transport. Errors are
/// logged and dropped.
pub(crate) fn release<C: Channel>(mut channel: C) {
    if channel.is_secure() {
        if let Err(err) = channel.shutdown_secure() {
            tracing::debug!(error = %err, "TLS shutdown failed");
        }
    }
    if let Err(err) = channel.close() {
        tracing::debug!(error = %err, "socket close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::Stage;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays scripted reads and fails teardown on demand.
    #[derive(Default)]
    struct ScriptedChannel {
        chunks: VecDeque<io::Result<Vec<u8>>>,
        secure: bool,
        fail_shutdown: bool,
        fail_close: bool,
        calls: Vec<&'static str>,
    }

    impl ScriptedChannel {
        fn with_chunks<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: AsRef<[u8]>,
        {
            Self {
                chunks: chunks.into_iter().map(|c| Ok(c.as_ref().to_vec())).collect(),
                ..Self::default()
            }
        }
    }

    impl Read for ScriptedChannel {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Ok(chunk)) => {
                    assert!(chunk.len() <= buf.len(), "chunk larger than read buffer");
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(err)) => Err(err),
                None => Ok(0),
            }
        }
    }

    impl Channel for ScriptedChannel {
        fn arm(&self, deadline: &Deadline) -> Result<(), CheckError> {
            deadline.remaining().map(|_| ())
        }

        fn is_secure(&self) -> bool {
            self.secure
        }

        fn shutdown_secure(&mut self) -> io::Result<()> {
            self.calls.push("shutdown_secure");
            if self.fail_shutdown {
                Err(io::Error::new(io::ErrorKind::Other, "unwrap failed"))
            } else {
                Ok(())
            }
        }

        fn close(&mut self) -> io::Result<()> {
            self.calls.push("close");
            if self.fail_close {
                Err(io::Error::new(io::ErrorKind::NotConnected, "close failed"))
            } else {
                Ok(())
            }
        }
    }

    fn deadline() -> Deadline {
        Deadline::start(Stage::ReceiveBanner, Some(Duration::from_secs(5)))
    }

    #[test]
    fn reads_single_chunk_banner() {
        let mut channel = ScriptedChannel::with_chunks(["220 Ok\r\n"]);
        let banner = read_banner(&mut channel, &deadline()).expect("banner");
        assert_eq!(banner, "220 Ok\r\n");
    }

    #[test]
    fn reads_multiline_marker_banner() {
        let mut channel = ScriptedChannel::with_chunks(["220-Part One\r\n"]);
        let banner = read_banner(&mut channel, &deadline()).expect("banner");
        assert_eq!(banner, "220-Part One\r\n");
    }

    #[test]
    fn accumulates_slow_banner() {
        let mut channel = ScriptedChannel::with_chunks(["2", "2", "0", " ", "O", "k", "\r", "\n"]);
        let banner = read_banner(&mut channel, &deadline()).expect("banner");
        assert_eq!(banner, "220 Ok\r\n");
    }

    #[test]
    fn rejects_oversized_banner() {
        let block = vec![b'a'; READ_CHUNK];
        let mut chunks: Vec<Vec<u8>> = vec![block; MAX_BANNER_BYTES / READ_CHUNK];
        chunks.push(b"a".to_vec());
        let mut channel = ScriptedChannel::with_chunks(chunks);
        let err = read_banner(&mut channel, &deadline()).expect_err("too much data");
        assert!(matches!(err, CheckError::BannerTooLong));
        assert_eq!(err.kind().as_str(), "BannerSyntaxError");
    }

    #[test]
    fn exactly_at_cap_keeps_reading() {
        let block = vec![b'a'; READ_CHUNK];
        let mut chunks: Vec<Vec<u8>> = vec![block; MAX_BANNER_BYTES / READ_CHUNK];
        chunks.push(b"\n".to_vec());
        let mut channel = ScriptedChannel::with_chunks(chunks);
        let banner = read_banner(&mut channel, &deadline()).expect("terminated at cap + 1");
        assert_eq!(banner.len(), MAX_BANNER_BYTES + 1);
    }

    #[test]
    fn eof_before_terminator_is_io_error() {
        let mut channel = ScriptedChannel::with_chunks(["220 Ok"]);
        let err = read_banner(&mut channel, &deadline()).expect_err("eof");
        assert!(matches!(err, CheckError::Io { .. }));
    }

    #[test]
    fn blocked_read_maps_to_stage_timeout() {
        let mut channel = ScriptedChannel::default();
        channel
            .chunks
            .push_back(Err(io::Error::new(io::ErrorKind::WouldBlock, "timed out")));
        let err = read_banner(&mut channel, &deadline()).expect_err("timeout");
        assert_eq!(err.to_string(), "Receiving banner timed out.");
    }

    #[test]
    fn release_swallows_teardown_errors_in_order() {
        let mut channel = ScriptedChannel {
            secure: true,
            fail_shutdown: true,
            fail_close: true,
            ..ScriptedChannel::default()
        };
        release(&mut channel);
        assert_eq!(channel.calls, vec!["shutdown_secure", "close"]);
    }

    #[test]
    fn release_skips_tls_shutdown_on_plain_channel() {
        let mut channel = ScriptedChannel::default();
        release(&mut channel);
        assert_eq!(channel.calls, vec!["close"]);
    }
}
