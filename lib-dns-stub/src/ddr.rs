//! Discovery of Designated Resolvers, RFC 9462.
//!
//! A resolver bootstraps encrypted transport by asking its current
//! (plaintext) nameservers for `_dns.resolver.arpa SVCB`.  Each
//! returned service binding names a designated resolver; a candidate
//! is adopted only if a TLS connection to it presents a certificate
//! whose subject-alternative names cover the target hostname or the
//! bootstrap address.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use dns_wire::message::types::{RecordData, SvcParam};
use dns_wire::name::Name;

use crate::answer::Answer;
use crate::resolver::{Family, ResolveOptions, Resolver};
use crate::transport::{Nameserver, Transport};

/// The port used when a service binding does not carry one.
const DEFAULT_TLS_PORT: u16 = 853;

/// Extract, validate, and return the designated resolvers advertised
/// in an SVCB answer.  Candidate bootstrap addresses come from the
/// records' address hints, in record priority order; a record without
/// hints falls back to its target name, as a literal address or by
/// resolving it.
pub(crate) async fn validated_nameservers<T: Transport>(
    resolver: &Resolver<T>,
    answer: &Answer,
    lifetime: Duration,
) -> Vec<Nameserver> {
    let deadline = Instant::now() + lifetime;

    let mut bindings: Vec<(u16, &Name, &[SvcParam])> = Vec::new();
    if let Some(rrs) = &answer.rrset {
        for rr in rrs {
            if let RecordData::Svcb {
                priority,
                target,
                params,
            } = &rr.rdata
            {
                // priority zero is AliasMode, which DDR does not use
                if *priority > 0 {
                    bindings.push((*priority, target, params));
                }
            }
        }
    }
    bindings.sort_by_key(|(priority, _, _)| *priority);

    let mut nameservers = Vec::new();
    'bindings: for (_, target, params) in bindings {
        let port = params
            .iter()
            .find_map(|param| match param {
                SvcParam::Port(port) => Some(*port),
                _ => None,
            })
            .unwrap_or(DEFAULT_TLS_PORT);
        let hostname = target.to_text(true);

        for address in bootstrap_candidates(resolver, target, params, deadline).await {
            let Some(remaining) = remaining_time(deadline) else {
                break 'bindings;
            };
            match resolver
                .transport()
                .tls_probe(SocketAddr::new(address, port), &hostname, remaining)
                .await
            {
                Ok(identity)
                    if identity.matches_hostname(&hostname)
                        || identity.matches_address(address) =>
                {
                    tracing::debug!(%address, port, %hostname, "validated designated resolver");
                    nameservers.push(Nameserver::tls(address, port, hostname.clone()));
                    continue 'bindings;
                }
                Ok(_) => {
                    tracing::debug!(%address, %hostname, "certificate does not cover the resolver");
                }
                Err(error) => {
                    tracing::debug!(%address, %error, "TLS probe failed");
                }
            }
        }
    }
    nameservers
}

/// The addresses to try for one service binding: the address hints if
/// any, else the target as an address literal, else whatever the
/// target resolves to.
async fn bootstrap_candidates<T: Transport>(
    resolver: &Resolver<T>,
    target: &Name,
    params: &[SvcParam],
    deadline: Instant,
) -> Vec<IpAddr> {
    let mut addresses = Vec::new();
    for param in params {
        if let SvcParam::Ipv4Hint(hints) = param {
            addresses.extend(hints.iter().copied().map(IpAddr::V4));
        }
    }
    for param in params {
        if let SvcParam::Ipv6Hint(hints) = param {
            addresses.extend(hints.iter().copied().map(IpAddr::V6));
        }
    }
    if !addresses.is_empty() {
        return addresses;
    }

    let text = target.to_text(true);
    if let Ok(address) = text.parse() {
        return vec![address];
    }

    let Some(remaining) = remaining_time(deadline) else {
        return Vec::new();
    };
    let options = ResolveOptions {
        lifetime: Some(remaining),
        ..ResolveOptions::default()
    };
    match resolver.resolve_name(target, Family::Unspec, options).await {
        Ok(answers) => answers.addresses(),
        Err(error) => {
            tracing::debug!(%target, %error, "could not resolve designated resolver target");
            Vec::new()
        }
    }
}

fn remaining_time(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if now >= deadline {
        None
    } else {
        Some(deadline - now)
    }
}
