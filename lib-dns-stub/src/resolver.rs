//! The stub resolver engine.
//!
//! A resolve is a plan executed over two axes: candidate query names
//! produced from the search list, and nameservers tried with retry,
//! rotation, and TCP fallback.  The cache short-circuits both.  All
//! network traffic goes through the [`Transport`] capability; all
//! waiting is bounded by the per-call timeout and the whole-resolve
//! lifetime.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use dns_wire::flags;
use dns_wire::message::deserialise::FormError;
use dns_wire::message::types::{Message, Opcode, Question, RdataClass, RdataType, RecordData};
use dns_wire::name::{Name, NameError};
use dns_wire::rcode::Rcode;
use dns_wire::renderer::{Renderer, RendererError};
use dns_wire::reversename;

use crate::answer::{Answer, HostAnswers};
use crate::cache::{AnswerCache, CacheKey};
use crate::config::ResolverConfig;
use crate::transport::{Nameserver, Protocol, Transport, TransportError};

/// The SVCB-bearing name DDR queries, RFC 9462.
pub const DDR_NAME: &str = "_dns.resolver.arpa.";

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] resolver mutex poisoned, cannot recover from this - aborting";

/// Longest pause between retry rounds over the nameserver list.
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// First pause between retry rounds.
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Bound on the CNAME links `canonical_name` will follow across
/// queries.
const MAX_CANONICAL_CHASE: usize = 16;

/// Per-call options for one resolve.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Use TCP for the initial query instead of UDP.
    pub tcp: bool,

    /// Surface [`ResolveError::NoAnswer`] when the name exists but
    /// has no RRset of the requested type.  When false, the answer is
    /// returned with `rrset` absent.
    pub raise_on_no_answer: bool,

    /// Override the configured lifetime for this call.
    pub lifetime: Option<Duration>,

    /// Apply the search list: `None` defers to the configuration.
    pub search: Option<bool>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            tcp: false,
            raise_on_no_answer: true,
            lifetime: None,
            search: None,
        }
    }
}

/// Which address families `resolve_name` queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Family {
    V4,
    V6,
    Unspec,
}

/// The per-server errors collected while a resolve works through its
/// nameservers.
#[derive(Debug, Clone, Default)]
pub struct ErrorTrace {
    entries: Vec<(Nameserver, String)>,
}

impl ErrorTrace {
    pub fn push(&mut self, server: Nameserver, detail: String) {
        self.entries.push((server, detail));
    }

    pub fn entries(&self) -> &[(Nameserver, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ErrorTrace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, (server, detail)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{server}: {detail}")?;
        }
        Ok(())
    }
}

/// An aggregated authoritative non-existence result: every candidate
/// name that was tried, in order, with the response each received.
#[derive(Debug, Clone)]
pub struct NxDomain {
    qnames: Vec<Name>,
    responses: HashMap<Name, Message>,
}

impl NxDomain {
    pub fn new(qnames: Vec<Name>, responses: HashMap<Name, Message>) -> Self {
        Self { qnames, responses }
    }

    /// All of the names that were tried, in candidate order.
    pub fn qnames(&self) -> &[Name] {
        &self.qnames
    }

    /// The response received for one tried name.
    pub fn response(&self, qname: &Name) -> Option<&Message> {
        self.responses.get(qname)
    }

    /// The unresolved canonical name: the last candidate tried.
    pub fn canonical_name(&self) -> Option<&Name> {
        self.qnames.last()
    }

    /// Combine with the results of another attempt, unioning the
    /// tried names (preserving order) and merging the response maps.
    pub fn merge(mut self, other: NxDomain) -> NxDomain {
        for qname in other.qnames {
            if !self.qnames.contains(&qname) {
                self.qnames.push(qname);
            }
        }
        for (qname, response) in other.responses {
            self.responses.insert(qname, response);
        }
        self
    }
}

/// Why a resolve did not produce an answer.
#[derive(Debug)]
pub enum ResolveError {
    /// The query name does not exist, under any candidate.
    NxDomain(NxDomain),

    /// The name exists, but not with the requested type.
    NoAnswer { response: Option<Box<Message>> },

    /// The resolution lifetime expired.
    LifetimeTimeout { elapsed: Duration, errors: ErrorTrace },

    /// Every nameserver failed without a terminal response.
    NoNameservers { errors: ErrorTrace },

    /// The resolver has no nameservers configured at all.
    NoNameserversConfigured,

    /// Metatype and metaclass queries are refused.
    NoMetaqueries,

    /// The query name could not be turned into candidates.
    Name(NameError),

    /// The query could not be rendered.
    Render(RendererError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolveError::NxDomain(nx) => {
                let qnames = nx.qnames();
                if qnames.len() > 1 {
                    write!(f, "None of DNS query names exist: ")?;
                } else {
                    write!(f, "The DNS query name does not exist: ")?;
                }
                for (i, qname) in qnames.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{qname}")?;
                }
                Ok(())
            }
            ResolveError::NoAnswer { .. } => {
                write!(f, "The DNS response does not contain an answer to the question")
            }
            ResolveError::LifetimeTimeout { elapsed, errors } => {
                write!(
                    f,
                    "The resolution lifetime expired after {:.3} seconds",
                    elapsed.as_secs_f64()
                )?;
                if !errors.is_empty() {
                    write!(f, ": {errors}")?;
                }
                Ok(())
            }
            ResolveError::NoNameservers { errors } => {
                write!(f, "All nameservers failed to answer the query")?;
                if !errors.is_empty() {
                    write!(f, ": {errors}")?;
                }
                Ok(())
            }
            ResolveError::NoNameserversConfigured => {
                write!(f, "no nameservers are configured")
            }
            ResolveError::NoMetaqueries => write!(f, "DNS metaqueries are not allowed"),
            ResolveError::Name(err) => write!(f, "bad query name: {err}"),
            ResolveError::Render(err) => write!(f, "could not build query: {err}"),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<NameError> for ResolveError {
    fn from(err: NameError) -> Self {
        ResolveError::Name(err)
    }
}

impl From<RendererError> for ResolveError {
    fn from(err: RendererError) -> Self {
        ResolveError::Render(err)
    }
}

/// One transport exchange's failure, kept apart from `ResolveError`
/// because only timeouts leave the server in rotation.
#[derive(Debug)]
enum DispatchError {
    Transport(TransportError),
    Form(FormError),
    Mismatch,
}

impl DispatchError {
    fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Transport(TransportError::Timeout))
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DispatchError::Transport(err) => write!(f, "{err}"),
            DispatchError::Form(err) => write!(f, "malformed response: {err}"),
            DispatchError::Mismatch => write!(f, "response did not match the query"),
        }
    }
}

/// A DNS stub resolver.
///
/// The configuration is immutable during a resolve; the nameserver
/// list and the cache are shared, so concurrent resolves on one
/// resolver cooperate rather than interfere.
pub struct Resolver<T> {
    transport: T,
    config: ResolverConfig,
    nameservers: Mutex<Vec<Nameserver>>,
    cache: Option<Arc<dyn AnswerCache>>,
}

impl<T: Transport> Resolver<T> {
    pub fn new(config: ResolverConfig, transport: T) -> Self {
        let nameservers = Mutex::new(config.nameservers.clone());
        Self {
            transport,
            config,
            nameservers,
            cache: None,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Attach an answer cache.
    pub fn set_cache(&mut self, cache: Arc<dyn AnswerCache>) {
        self.cache = Some(cache);
    }

    pub fn cache(&self) -> Option<&Arc<dyn AnswerCache>> {
        self.cache.as_ref()
    }

    pub fn nameservers(&self) -> Vec<Nameserver> {
        self.nameservers.lock().expect(MUTEX_POISON_MESSAGE).clone()
    }

    /// Replace the nameserver list.  Resolves already in flight keep
    /// the snapshot they started with.
    pub fn set_nameservers(&self, nameservers: Vec<Nameserver>) {
        *self.nameservers.lock().expect(MUTEX_POISON_MESSAGE) = nameservers;
    }

    /// The candidate absolute names to try for *qname*, in order.
    ///
    /// An absolute name is its own single candidate.  A relative name
    /// with more than `ndots` dots is tried bare first and then under
    /// each search suffix; with `ndots` or fewer, the suffixes come
    /// first and bare last.
    ///
    /// # Errors
    ///
    /// If the bare name cannot be made absolute.
    pub fn qnames_to_try(
        &self,
        qname: &Name,
        search: Option<bool>,
    ) -> Result<Vec<Name>, NameError> {
        if qname.is_absolute() {
            return Ok(vec![qname.clone()]);
        }

        let bare = qname.derelativize(&Name::root())?;
        let use_search = search.unwrap_or(self.config.use_search_by_default);
        if !use_search {
            return Ok(vec![bare]);
        }

        let suffixes: Vec<&Name> = if self.config.search.is_empty() {
            if self.config.domain.is_empty() {
                Vec::new()
            } else {
                vec![&self.config.domain]
            }
        } else {
            self.config.search.iter().collect()
        };

        let mut searched = Vec::with_capacity(suffixes.len());
        for suffix in suffixes {
            // skip suffixes which would push the name over the limit
            if let Ok(candidate) = qname.concatenate(suffix) {
                searched.push(candidate);
            }
        }

        let ndots = self.config.ndots.unwrap_or(1);
        let dots = qname.len().saturating_sub(1);
        let mut candidates = Vec::with_capacity(searched.len() + 1);
        if dots > ndots {
            candidates.push(bare);
            candidates.extend(searched);
        } else {
            candidates.extend(searched);
            candidates.push(bare);
        }
        Ok(candidates)
    }

    /// Query nameservers to find the answer to the question.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`] for the full taxonomy: `NxDomain`
    /// aggregates across candidates, `NoAnswer` obeys
    /// `raise_on_no_answer`, and the timeout/no-nameserver variants
    /// carry the per-server error trace.
    pub async fn resolve(
        &self,
        qname: &Name,
        rdtype: RdataType,
        rdclass: RdataClass,
        options: ResolveOptions,
    ) -> Result<Answer, ResolveError> {
        if rdtype.is_metatype() || rdclass.is_metaclass() {
            return Err(ResolveError::NoMetaqueries);
        }

        let start = Instant::now();
        let lifetime = options.lifetime.unwrap_or(self.config.lifetime);
        let candidates = self.qnames_to_try(qname, options.search)?;
        let mut resolution = Resolution::new(candidates, self.rotation()?);

        loop {
            let qname = match resolution.next_request(
                self.cache.as_deref(),
                rdtype,
                rdclass,
                options.raise_on_no_answer,
            )? {
                NextStep::Answer(answer) => {
                    tracing::trace!(qname = %answer.qname, "cache HIT");
                    return Ok(answer);
                }
                NextStep::Query(qname) => qname,
                NextStep::Exhausted => {
                    return Err(ResolveError::NxDomain(resolution.into_nxdomain()));
                }
            };

            let (id, request, question) = self.build_query(&qname, rdtype, rdclass)?;
            let (server, response) = match self
                .query_servers(&mut resolution, id, &request, &question, &options, start, lifetime)
                .await?
            {
                Some(terminal) => terminal,
                None => {
                    return Err(ResolveError::NoNameservers {
                        errors: resolution.errors,
                    })
                }
            };

            if response.extended_rcode() == Rcode::NxDomain {
                tracing::debug!(%qname, %server, "NXDOMAIN, advancing to next candidate");
                if let Some(cache) = &self.cache {
                    // non-existence covers every type, so it is cached
                    // under the ANY key
                    let answer = Answer::new(
                        qname.clone(),
                        RdataType::ANY,
                        RdataClass::IN,
                        response.clone(),
                        SystemTime::now(),
                    );
                    cache.put((qname.clone(), RdataType::ANY, RdataClass::IN), answer);
                }
                resolution.record_nxdomain(qname, response);
                continue;
            }

            let answer = Answer::new(
                qname.clone(),
                rdtype,
                rdclass,
                response,
                SystemTime::now(),
            );
            if answer.rrset.is_none() && options.raise_on_no_answer {
                return Err(ResolveError::NoAnswer {
                    response: Some(Box::new(answer.response)),
                });
            }
            if let Some(cache) = &self.cache {
                cache.put((qname.clone(), rdtype, rdclass), answer.clone());
            }
            tracing::debug!(%qname, %server, "resolved");
            return Ok(answer);
        }
    }

    /// Work through the nameservers until one gives a terminal
    /// (NOERROR or NXDOMAIN) response.  `Ok(None)` means every server
    /// was crossed off.
    #[allow(clippy::too_many_arguments)]
    async fn query_servers(
        &self,
        resolution: &mut Resolution,
        id: u16,
        request: &[u8],
        question: &Question,
        options: &ResolveOptions,
        start: Instant,
        lifetime: Duration,
    ) -> Result<Option<(Nameserver, Message)>, ResolveError> {
        loop {
            let Some((server, backoff)) = resolution.next_nameserver() else {
                return Ok(None);
            };
            if let Some(pause) = backoff {
                tokio::time::sleep(pause).await;
            }

            // the lifetime is checked before each transport call; a
            // call already in flight is bounded by its own timeout
            let per_try = self.remaining_timeout(start, lifetime, &resolution.errors)?;
            match self.dispatch(&server, request, per_try, options.tcp).await {
                Err(error) => {
                    tracing::debug!(%server, %error, "query failed");
                    if !error.is_timeout() {
                        resolution.deactivate(&server);
                    }
                    resolution.errors.push(server, error.to_string());
                }
                Ok(response) if !response_matches(id, question, &response) => {
                    tracing::debug!(%server, "mismatched response");
                    resolution.deactivate(&server);
                    resolution
                        .errors
                        .push(server, DispatchError::Mismatch.to_string());
                }
                Ok(response) => match response.extended_rcode() {
                    Rcode::NoError | Rcode::NxDomain => return Ok(Some((server, response))),
                    Rcode::ServFail => {
                        tracing::debug!(%server, "SERVFAIL");
                        if !self.config.retry_servfail {
                            resolution.deactivate(&server);
                        }
                        resolution.errors.push(server, Rcode::ServFail.to_string());
                    }
                    rcode => {
                        tracing::debug!(%server, %rcode, "unusable rcode");
                        resolution.deactivate(&server);
                        resolution.errors.push(server, rcode.to_string());
                    }
                },
            }
        }
    }

    /// One exchange with one server: UDP with a TCP retry when the
    /// response comes back truncated, or straight TCP/TLS.
    async fn dispatch(
        &self,
        server: &Nameserver,
        request: &[u8],
        timeout: Duration,
        tcp: bool,
    ) -> Result<Message, DispatchError> {
        let parse =
            |bytes: Vec<u8>| Message::from_octets(&bytes).map_err(DispatchError::Form);

        match server.protocol {
            Protocol::Do53 if tcp => {
                let bytes = self
                    .transport
                    .tcp_query(server.address, request, timeout)
                    .await
                    .map_err(DispatchError::Transport)?;
                parse(bytes)
            }
            Protocol::Do53 => {
                let bytes = self
                    .transport
                    .udp_query(server.address, request, timeout)
                    .await
                    .map_err(DispatchError::Transport)?;
                let response = parse(bytes)?;
                if response.header.is_truncated {
                    tracing::debug!(%server, "truncated over UDP, retrying over TCP");
                    let bytes = self
                        .transport
                        .tcp_query(server.address, request, timeout)
                        .await
                        .map_err(DispatchError::Transport)?;
                    parse(bytes)
                } else {
                    Ok(response)
                }
            }
            Protocol::Tls | Protocol::Https => {
                let server_name = server.server_name.as_deref().unwrap_or_default();
                let bytes = self
                    .transport
                    .tls_query(server.address, server_name, request, timeout)
                    .await
                    .map_err(DispatchError::Transport)?;
                parse(bytes)
            }
        }
    }

    fn build_query(
        &self,
        qname: &Name,
        rdtype: RdataType,
        rdclass: RdataClass,
    ) -> Result<(u16, Vec<u8>, Question), ResolveError> {
        let question = Question {
            name: qname.clone(),
            rdtype,
            rdclass,
        };
        let header_flags = self.config.flags.unwrap_or(flags::RD);
        let mut renderer = Renderer::new(None, header_flags, 65535, None);
        renderer.add_question(&question)?;
        if self.config.edns {
            renderer.add_edns(0, self.config.ednsflags, self.config.payload, Vec::new())?;
        }
        renderer.write_header();
        if let Some(tsig) = &self.config.tsig {
            renderer.add_tsig(tsig.signer.as_ref(), &tsig.key, 300, 0, &[], &[])?;
        }
        let id = renderer.id;
        Ok((id, renderer.into_wire(), question))
    }

    fn remaining_timeout(
        &self,
        start: Instant,
        lifetime: Duration,
        errors: &ErrorTrace,
    ) -> Result<Duration, ResolveError> {
        let elapsed = start.elapsed();
        if elapsed >= lifetime {
            return Err(ResolveError::LifetimeTimeout {
                elapsed,
                errors: errors.clone(),
            });
        }
        Ok(self.config.timeout.min(lifetime - elapsed))
    }

    /// Snapshot the nameserver list for one resolve, rotating the
    /// shared list by one when configured to.
    fn rotation(&self) -> Result<Vec<Nameserver>, ResolveError> {
        let mut list = self.nameservers.lock().expect(MUTEX_POISON_MESSAGE);
        if list.is_empty() {
            return Err(ResolveError::NoNameserversConfigured);
        }
        let snapshot = list.clone();
        if self.config.rotate {
            let first = list.remove(0);
            list.push(first);
        }
        Ok(snapshot)
    }

    /// Reverse lookup: PTR for an address.
    ///
    /// # Errors
    ///
    /// As for [`Resolver::resolve`].
    pub async fn resolve_address(
        &self,
        address: IpAddr,
        options: ResolveOptions,
    ) -> Result<Answer, ResolveError> {
        let qname = reversename::from_address(address);
        self.resolve(&qname, RdataType::PTR, RdataClass::IN, options)
            .await
    }

    /// Address lookup: A and/or AAAA depending on *family*.
    ///
    /// # Errors
    ///
    /// `NoAnswer` if no family produced records; otherwise as for
    /// [`Resolver::resolve`].
    pub async fn resolve_name(
        &self,
        name: &Name,
        family: Family,
        options: ResolveOptions,
    ) -> Result<HostAnswers, ResolveError> {
        let mut answers = HostAnswers::default();
        let wanted: &[RdataType] = match family {
            Family::V4 => &[RdataType::A],
            Family::V6 => &[RdataType::AAAA],
            Family::Unspec => &[RdataType::A, RdataType::AAAA],
        };
        for &rdtype in wanted {
            match self
                .resolve(name, rdtype, RdataClass::IN, options.clone())
                .await
            {
                Ok(answer) => answers.insert(answer),
                Err(ResolveError::NoAnswer { .. }) => (),
                Err(err) => return Err(err),
            }
        }
        if answers.is_empty() {
            return Err(ResolveError::NoAnswer { response: None });
        }
        Ok(answers)
    }

    /// The name the resolver would use for queries after all CNAME
    /// renaming: CNAMEs are chased iteratively until a fixpoint (a
    /// name with no CNAME, or one pointing at itself).
    ///
    /// # Errors
    ///
    /// As for [`Resolver::resolve`], except `NoAnswer` and `NxDomain`
    /// which both still determine a canonical name.
    pub async fn canonical_name(&self, name: &Name) -> Result<Name, ResolveError> {
        let options = ResolveOptions {
            raise_on_no_answer: false,
            ..ResolveOptions::default()
        };
        let mut current = name.clone();
        for _ in 0..MAX_CANONICAL_CHASE {
            let answer = match self
                .resolve(&current, RdataType::CNAME, RdataClass::IN, options.clone())
                .await
            {
                Ok(answer) => answer,
                Err(ResolveError::NxDomain(nx)) => {
                    if let Some(last) = nx.canonical_name() {
                        current = last.clone();
                    }
                    break;
                }
                Err(err) => return Err(err),
            };
            let target = answer
                .rrset
                .as_ref()
                .and_then(|rrs| rrs.last())
                .and_then(|rr| match &rr.rdata {
                    RecordData::Cname { cname } => Some(cname.clone()),
                    _ => None,
                });
            match target {
                Some(target) if target != current => current = target,
                _ => break,
            }
        }
        Ok(current)
    }

    /// Try to switch this resolver to encrypted transports using
    /// Discovery of Designated Resolvers.  On success the nameserver
    /// list is replaced; on any failure the resolver is left as it
    /// was.
    pub async fn try_ddr(&self, lifetime: Duration) {
        let Ok(qname) = Name::from_text(DDR_NAME, None) else {
            return;
        };
        let options = ResolveOptions {
            lifetime: Some(lifetime),
            ..ResolveOptions::default()
        };
        let answer = match self
            .resolve(&qname, RdataType::SVCB, RdataClass::IN, options)
            .await
        {
            Ok(answer) => answer,
            Err(error) => {
                tracing::debug!(%error, "DDR discovery query failed");
                return;
            }
        };

        let nameservers = crate::ddr::validated_nameservers(self, &answer, lifetime).await;
        if nameservers.is_empty() {
            tracing::debug!("DDR found no validated resolvers");
        } else {
            tracing::debug!(count = nameservers.len(), "switching to discovered resolvers");
            self.set_nameservers(nameservers);
        }
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}

/// What the planner says to do next.
enum NextStep {
    Answer(Answer),
    Query(Name),
    Exhausted,
}

/// The state of one resolve: remaining candidates, collected
/// NXDOMAIN responses, the error trace, and the nameserver rotation.
struct Resolution {
    qnames: VecDeque<Name>,
    all_qnames: Vec<Name>,
    nxdomain_responses: HashMap<Name, Message>,
    errors: ErrorTrace,
    working: Vec<Nameserver>,
    current: VecDeque<Nameserver>,
    backoff: Option<Duration>,
}

impl Resolution {
    fn new(candidates: Vec<Name>, nameservers: Vec<Nameserver>) -> Self {
        Self {
            qnames: candidates.iter().cloned().collect(),
            all_qnames: candidates,
            nxdomain_responses: HashMap::new(),
            errors: ErrorTrace::default(),
            working: nameservers,
            current: VecDeque::new(),
            backoff: None,
        }
    }

    /// Probe the cache and produce either an answer, the next name to
    /// put on the wire, or exhaustion.  A cached NXDOMAIN is recorded
    /// for the aggregate and skipped over.
    fn next_request(
        &mut self,
        cache: Option<&dyn AnswerCache>,
        rdtype: RdataType,
        rdclass: RdataClass,
        raise_on_no_answer: bool,
    ) -> Result<NextStep, ResolveError> {
        while let Some(qname) = self.qnames.pop_front() {
            if let Some(cache) = cache {
                let key: CacheKey = (qname.clone(), rdtype, rdclass);
                if let Some(answer) = cache.get(&key) {
                    if answer.rrset.is_none() && raise_on_no_answer {
                        return Err(ResolveError::NoAnswer {
                            response: Some(Box::new(answer.response)),
                        });
                    }
                    return Ok(NextStep::Answer(answer));
                }
                // cached non-existence lives under the ANY key: record
                // it for the aggregate and move to the next candidate
                let nx_key: CacheKey = (qname.clone(), RdataType::ANY, RdataClass::IN);
                if let Some(answer) = cache.get(&nx_key) {
                    if answer.response.extended_rcode() == Rcode::NxDomain {
                        self.nxdomain_responses.insert(qname, answer.response);
                        continue;
                    }
                }
            }
            return Ok(NextStep::Query(qname));
        }
        Ok(NextStep::Exhausted)
    }

    fn record_nxdomain(&mut self, qname: Name, response: Message) {
        self.nxdomain_responses.insert(qname, response);
    }

    fn into_nxdomain(self) -> NxDomain {
        NxDomain::new(self.all_qnames, self.nxdomain_responses)
    }

    /// The next server to try.  When a pass over the list is
    /// complete, the next pass starts after a doubling backoff pause,
    /// which is returned for the caller to sleep.
    fn next_nameserver(&mut self) -> Option<(Nameserver, Option<Duration>)> {
        let mut pause = None;
        if self.current.is_empty() {
            if self.working.is_empty() {
                return None;
            }
            self.current = self.working.iter().cloned().collect();
            pause = self.backoff;
            self.backoff = Some(
                self.backoff
                    .map_or(INITIAL_BACKOFF, |b| (b * 2).min(MAX_BACKOFF)),
            );
        }
        self.current.pop_front().map(|server| (server, pause))
    }

    /// Cross a server off for the rest of this resolve.
    fn deactivate(&mut self, server: &Nameserver) {
        self.working.retain(|s| s != server);
    }
}

/// Very basic validation that a response matches the query: the ID,
/// opcode, and question must line up and it must actually be a
/// response.
fn response_matches(id: u16, question: &Question, response: &Message) -> bool {
    response.header.id == id
        && response.header.is_response
        && response.header.opcode == Opcode::Query
        && response.questions.len() == 1
        && response.questions[0] == *question
}
