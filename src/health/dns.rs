use std::net::{IpAddr, SocketAddr};

use trust_dns_resolver::Resolver;
use trust_dns_resolver::config::LookupIpStrategy;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::system_conf::read_system_conf;

use crate::health::error::CheckError;
use crate::health::timer::Deadline;

/// Turns a host name into IPv4 stream addresses.
///
/// An empty answer is not an error here; the connect stage decides what an
/// empty list means. Implementations must not block past `deadline`;
/// [`Deadline::wait_for`] bounds calls that cannot be armed directly.
pub trait Resolve {
    fn resolve(
        &self,
        host: &str,
        port: u16,
        deadline: &Deadline,
    ) -> Result<Vec<SocketAddr>, CheckError>;
}

/// Resolver backed by the system DNS configuration (`/etc/resolv.conf`,
/// hosts file). IP literals never touch the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(
        &self,
        host: &str,
        port: u16,
        deadline: &Deadline,
    ) -> Result<Vec<SocketAddr>, CheckError> {
        if let Some(ip) = parse_ip_literal(host) {
            return Ok(ipv4_only([ip], port));
        }
        let ascii = normalize_host(host)?;

        let (config, mut opts) =
            read_system_conf().map_err(|source| CheckError::ResolverInit { source })?;
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;
        opts.attempts = 1;
        if let Some(left) = deadline.remaining()? {
            opts.timeout = left;
        }

        // the query timeout restarts on every search-list name and server;
        // the whole lookup still has to end by the stage deadline
        let bound = *deadline;
        deadline.wait_for(move || {
            let resolver = Resolver::new(config, opts)
                .map_err(|source| CheckError::ResolverInit { source })?;
            match resolver.lookup_ip(ascii.as_str()) {
                Ok(lookup) => Ok(ipv4_only(lookup.iter(), port)),
                Err(err) => classify_lookup_error(err, &bound),
            }
        })
    }
}

fn classify_lookup_error(
    err: ResolveError,
    deadline: &Deadline,
) -> Result<Vec<SocketAddr>, CheckError> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
        ResolveErrorKind::Timeout => Err(deadline.timeout()),
        _ => Err(CheckError::Lookup { source: err }),
    }
}

fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let trimmed = host.trim();
    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    unbracketed.parse().ok()
}

fn ipv4_only<I>(ips: I, port: u16) -> Vec<SocketAddr>
where
    I: IntoIterator<Item = IpAddr>,
{
    ips.into_iter()
        .filter(IpAddr::is_ipv4)
        .map(|ip| SocketAddr::new(ip, port))
        .collect()
}

pub(crate) fn normalize_host(host: &str) -> Result<String, CheckError> {
    let trimmed = host.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(CheckError::invalid_host(host, "host name is empty"));
    }
    idna::domain_to_ascii(trimmed).map_err(|err| CheckError::invalid_host(host, err))
}
