//! Resolver configuration, and the resolv.conf directive set that
//! fills it in.
//!
//! Platform discovery (which file to read, registry lookups) is the
//! caller's business: this module only understands the text format.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dns_wire::edns;
use dns_wire::name::{Name, NameError};
use dns_wire::tsig;

use crate::transport::Nameserver;

/// A TSIG key paired with the signing capability which can use it.
#[derive(Clone)]
pub struct TsigConfig {
    pub key: tsig::Key,
    pub signer: Arc<dyn tsig::Signer + Send + Sync>,
}

impl fmt::Debug for TsigConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigConfig")
            .field("key", &self.key.name)
            .field("algorithm", &self.key.algorithm)
            .finish()
    }
}

/// Everything a [`crate::resolver::Resolver`] is configured with.
/// Treated as immutable while a resolve is in flight.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// The local domain, appended to relative names when no search
    /// list is set.
    pub domain: Name,

    /// Suffixes to try for relative names, in order.
    pub search: Vec<Name>,

    /// Relative names with more than this many dots are tried bare
    /// before the search list.  `None` means 1.
    pub ndots: Option<usize>,

    /// Port used for nameservers read from configuration text.
    pub port: u16,

    /// Budget for one transport call.
    pub timeout: Duration,

    /// Budget for a whole resolve.
    pub lifetime: Duration,

    /// Attach an EDNS OPT record to queries.
    pub edns: bool,

    /// Advertised UDP payload size, when EDNS is on.
    pub payload: u16,

    /// The OPT TTL word: extended rcode, version, and flags.
    pub ednsflags: u32,

    /// Override the query header flags.  `None` asks for recursion.
    pub flags: Option<u16>,

    /// Retry a server which answered SERVFAIL instead of crossing it
    /// off.
    pub retry_servfail: bool,

    /// Rotate the nameserver list by one on each query.
    pub rotate: bool,

    /// Whether `resolve` applies the search list when not told
    /// explicitly.
    pub use_search_by_default: bool,

    /// The initial nameserver list.
    pub nameservers: Vec<Nameserver>,

    /// Sign queries with TSIG.
    pub tsig: Option<TsigConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            domain: Name::empty(),
            search: Vec::new(),
            ndots: None,
            port: 53,
            timeout: Duration::from_secs(2),
            lifetime: Duration::from_secs(5),
            edns: false,
            payload: edns::DEFAULT_PAYLOAD,
            ednsflags: 0,
            flags: None,
            retry_servfail: false,
            rotate: false,
            use_search_by_default: true,
            nameservers: Vec::new(),
            tsig: None,
        }
    }
}

/// A resolv.conf directive could not be understood.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    BadAddress(String),
    BadName(String, NameError),
    BadOption(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::BadAddress(text) => write!(f, "bad nameserver address: {text}"),
            ConfigError::BadName(text, err) => write!(f, "bad name '{text}': {err}"),
            ConfigError::BadOption(text) => write!(f, "bad option: {text}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl ResolverConfig {
    /// Apply a string in the /etc/resolv.conf format.
    ///
    /// Interprets `nameserver`, `domain`, `search`, and the
    /// `rotate`, `timeout:N`, `edns0`, and `ndots:N` options.
    /// Unrecognised directives and options are ignored, as every
    /// stub resolver does.
    ///
    /// # Errors
    ///
    /// If a recognised directive carries a malformed value.
    pub fn read_resolv_conf(&mut self, text: &str) -> Result<(), ConfigError> {
        let root = Name::root();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                continue;
            }
            match tokens[0] {
                "nameserver" => {
                    for token in &tokens[1..] {
                        let address = token
                            .parse()
                            .map_err(|_| ConfigError::BadAddress((*token).to_string()))?;
                        self.nameservers.push(Nameserver::do53(address, self.port));
                    }
                }
                "domain" => {
                    self.domain = Name::from_text(tokens[1], Some(&root))
                        .map_err(|err| ConfigError::BadName(tokens[1].to_string(), err))?;
                }
                "search" => {
                    self.search.clear();
                    for token in &tokens[1..] {
                        let entry = Name::from_text(token, Some(&root))
                            .map_err(|err| ConfigError::BadName((*token).to_string(), err))?;
                        self.search.push(entry);
                    }
                }
                "options" => {
                    for token in &tokens[1..] {
                        self.apply_option(token)?;
                    }
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn apply_option(&mut self, token: &str) -> Result<(), ConfigError> {
        if token == "rotate" {
            self.rotate = true;
        } else if token == "edns0" {
            self.edns = true;
        } else if let Some(value) = token.strip_prefix("timeout:") {
            let seconds: f64 = value
                .parse()
                .map_err(|_| ConfigError::BadOption(token.to_string()))?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(ConfigError::BadOption(token.to_string()));
            }
            self.timeout = Duration::from_secs_f64(seconds);
        } else if let Some(value) = token.strip_prefix("ndots:") {
            let ndots = value
                .parse()
                .map_err(|_| ConfigError::BadOption(token.to_string()))?;
            self.ndots = Some(ndots);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Protocol;

    #[test]
    fn defaults_match_a_stub_resolver() {
        let config = ResolverConfig::default();
        assert_eq!(53, config.port);
        assert_eq!(Duration::from_secs(2), config.timeout);
        assert_eq!(Duration::from_secs(5), config.lifetime);
        assert!(!config.edns);
        assert!(config.use_search_by_default);
        assert!(config.nameservers.is_empty());
    }

    #[test]
    fn parses_the_directive_set() {
        let mut config = ResolverConfig::default();
        config
            .read_resolv_conf(
                "# local config\n\
                 nameserver 192.0.2.1\n\
                 nameserver 2001:db8::1\n\
                 domain example.com\n\
                 search a.test b.test\n\
                 options rotate timeout:3.5 edns0 ndots:2\n",
            )
            .unwrap();

        assert_eq!(2, config.nameservers.len());
        assert_eq!(Protocol::Do53, config.nameservers[0].protocol);
        assert_eq!("192.0.2.1:53".parse(), Ok(config.nameservers[0].address));
        assert_eq!("example.com.", config.domain.to_text(false));
        assert_eq!(2, config.search.len());
        assert_eq!("a.test.", config.search[0].to_text(false));
        assert!(config.rotate);
        assert!(config.edns);
        assert_eq!(Duration::from_secs_f64(3.5), config.timeout);
        assert_eq!(Some(2), config.ndots);
    }

    #[test]
    fn comments_and_unknown_directives_are_ignored(){
        let mut config = ResolverConfig::default();
        config
            .read_resolv_conf(
                "; a comment\n\
                 # another\n\
                 sortlist 130.155.160.0/255.255.240.0\n\
                 options no-such-option\n\
                 nameserver 192.0.2.1\n",
            )
            .unwrap();
        assert_eq!(1, config.nameservers.len());
    }

    #[test]
    fn bad_values_surface() {
        let mut config = ResolverConfig::default();
        assert_eq!(
            Err(ConfigError::BadAddress("not-an-ip".to_string())),
            config.read_resolv_conf("nameserver not-an-ip\n")
        );
        assert_eq!(
            Err(ConfigError::BadOption("ndots:x".to_string())),
            config.read_resolv_conf("options ndots:x\n")
        );
        assert_eq!(
            Err(ConfigError::BadOption("timeout:-1".to_string())),
            config.read_resolv_conf("options timeout:-1\n")
        );
    }
}
