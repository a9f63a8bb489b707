#![warn(clippy::pedantic)]
// Sometimes a redundant else is clearer
#![allow(clippy::redundant_else)]
// Don't care enough to fix
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

//! A DNS stub resolver: caching resolution over pluggable
//! transports, plus the inbound zone-transfer machinery.

pub mod answer;
pub mod cache;
pub mod config;
mod ddr;
pub mod resolver;
pub mod transport;
pub mod xfr;
pub mod zone;
pub mod zonefile;

#[cfg(test)]
pub(crate) mod testing;

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dns_wire::message::types::{RdataClass, RdataType};
use dns_wire::name::Name;

use self::answer::{Answer, HostAnswers};
use self::config::ResolverConfig;
use self::resolver::{Family, ResolveError, ResolveOptions, Resolver};
use self::transport::SystemTransport;

/// The process-wide default resolver, created on first use.  Held
/// behind a mutex so tests (and applications reacting to network
/// changes) can replace or reset it.
static DEFAULT_RESOLVER: Mutex<Option<Arc<Resolver<SystemTransport>>>> = Mutex::new(None);

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] default resolver mutex poisoned, cannot recover from this - aborting";

/// Get the default resolver, initialising it if necessary.  The
/// fresh instance has default configuration and no nameservers;
/// configure it (or install your own with
/// [`set_default_resolver`]) before resolving.
pub fn default_resolver() -> Arc<Resolver<SystemTransport>> {
    let mut holder = DEFAULT_RESOLVER.lock().expect(MUTEX_POISON_MESSAGE);
    holder
        .get_or_insert_with(|| {
            Arc::new(Resolver::new(ResolverConfig::default(), SystemTransport))
        })
        .clone()
}

/// Install a resolver as the process-wide default.
pub fn set_default_resolver(resolver: Resolver<SystemTransport>) {
    let mut holder = DEFAULT_RESOLVER.lock().expect(MUTEX_POISON_MESSAGE);
    *holder = Some(Arc::new(resolver));
}

/// Drop the default resolver; the next use builds a fresh one.
pub fn reset_default_resolver() {
    let mut holder = DEFAULT_RESOLVER.lock().expect(MUTEX_POISON_MESSAGE);
    *holder = None;
}

/// Resolve through the default resolver.  See
/// [`Resolver::resolve`].
///
/// # Errors
///
/// As for [`Resolver::resolve`].
pub async fn resolve(
    qname: &Name,
    rdtype: RdataType,
    rdclass: RdataClass,
    options: ResolveOptions,
) -> Result<Answer, ResolveError> {
    default_resolver()
        .resolve(qname, rdtype, rdclass, options)
        .await
}

/// Reverse-resolve through the default resolver.  See
/// [`Resolver::resolve_address`].
///
/// # Errors
///
/// As for [`Resolver::resolve_address`].
pub async fn resolve_address(
    address: IpAddr,
    options: ResolveOptions,
) -> Result<Answer, ResolveError> {
    default_resolver().resolve_address(address, options).await
}

/// Look up host addresses through the default resolver.  See
/// [`Resolver::resolve_name`].
///
/// # Errors
///
/// As for [`Resolver::resolve_name`].
pub async fn resolve_name(
    name: &Name,
    family: Family,
    options: ResolveOptions,
) -> Result<HostAnswers, ResolveError> {
    default_resolver().resolve_name(name, family, options).await
}

/// Determine a canonical name through the default resolver.  See
/// [`Resolver::canonical_name`].
///
/// # Errors
///
/// As for [`Resolver::canonical_name`].
pub async fn canonical_name(name: &Name) -> Result<Name, ResolveError> {
    default_resolver().canonical_name(name).await
}

/// Run DDR discovery on the default resolver.  See
/// [`Resolver::try_ddr`].
pub async fn try_ddr(lifetime: Duration) {
    default_resolver().try_ddr(lifetime).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    // one test, because the holder is process-wide state
    #[test]
    fn default_resolver_lifecycle() {
        reset_default_resolver();
        let first = default_resolver();
        let second = default_resolver();
        assert!(Arc::ptr_eq(&first, &second));

        reset_default_resolver();
        let third = default_resolver();
        assert!(!Arc::ptr_eq(&first, &third));

        let mut config = ResolverConfig::default();
        config.rotate = true;
        set_default_resolver(Resolver::new(config, SystemTransport));
        assert!(default_resolver().config().rotate);
        reset_default_resolver();
    }
}
