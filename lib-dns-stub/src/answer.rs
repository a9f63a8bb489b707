//! The result of a successful resolution: the response message, the
//! CNAME-chased canonical name, the answering RRset, and an absolute
//! expiration time.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use dns_wire::message::types::{Message, RdataClass, RdataType, RecordData, ResourceRecord};
use dns_wire::name::Name;

/// Cap on the TTL an answer may carry into the cache: one week.
pub const MAX_CHAIN_TTL: u32 = 604_800;

/// How many CNAME links inside one response are followed before
/// giving up.  A response needing more than this is nonsense.
const MAX_CHAIN_DEPTH: usize = 16;

/// A resolved answer.
///
/// `rrset` is `None` for a NOERROR response with no records of the
/// requested type (and for the cached form of an NXDOMAIN response).
/// `expiration` is the receive time plus the minimum TTL along the
/// CNAME chain, which is what the caches index on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub qname: Name,
    pub rdtype: RdataType,
    pub rdclass: RdataClass,
    pub response: Message,
    pub canonical_name: Name,
    pub rrset: Option<Vec<ResourceRecord>>,
    pub expiration: SystemTime,
}

impl Answer {
    /// Build an answer from a response received at *now*.
    pub fn new(
        qname: Name,
        rdtype: RdataType,
        rdclass: RdataClass,
        response: Message,
        now: SystemTime,
    ) -> Self {
        let chaining = resolve_chaining(&response, &qname, rdtype, rdclass);
        Self {
            qname,
            rdtype,
            rdclass,
            response,
            canonical_name: chaining.canonical_name,
            rrset: chaining.rrset,
            expiration: now + Duration::from_secs(chaining.min_ttl.into()),
        }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expiration <= now
    }

    /// The addresses in the answering RRset, for A/AAAA answers.
    pub fn addresses(&self) -> Vec<IpAddr> {
        let mut out = Vec::new();
        if let Some(rrs) = &self.rrset {
            for rr in rrs {
                match &rr.rdata {
                    RecordData::A { address } => out.push(IpAddr::V4(*address)),
                    RecordData::Aaaa { address } => out.push(IpAddr::V6(*address)),
                    _ => (),
                }
            }
        }
        out
    }
}

pub(crate) struct Chaining {
    pub canonical_name: Name,
    pub rrset: Option<Vec<ResourceRecord>>,
    pub min_ttl: u32,
}

/// Follow the CNAME chain inside *response* from *qname* towards the
/// records answering *rdtype*.  The minimum TTL seen along the chain
/// bounds how long the whole answer may be cached; a chain with no
/// terminal records falls back to the negative TTL of the authority
/// SOA, or zero.
pub(crate) fn resolve_chaining(
    response: &Message,
    qname: &Name,
    rdtype: RdataType,
    rdclass: RdataClass,
) -> Chaining {
    let mut cname = qname.clone();
    let mut min_ttl = MAX_CHAIN_TTL;

    for _ in 0..MAX_CHAIN_DEPTH {
        let matching: Vec<ResourceRecord> = response
            .answers
            .iter()
            .filter(|rr| rr.name == cname && rr.rclass.matches(rdclass) && rr.rtype().matches(rdtype))
            .cloned()
            .collect();
        if !matching.is_empty() {
            for rr in &matching {
                min_ttl = min_ttl.min(rr.ttl);
            }
            return Chaining {
                canonical_name: cname,
                rrset: Some(matching),
                min_ttl,
            };
        }

        let link = response.answers.iter().find_map(|rr| {
            if rr.name == cname {
                if let RecordData::Cname { cname: target } = &rr.rdata {
                    return Some((target.clone(), rr.ttl));
                }
            }
            None
        });
        match link {
            Some((target, ttl)) => {
                min_ttl = min_ttl.min(ttl);
                cname = target;
            }
            None => break,
        }
    }

    let negative_ttl = response.authority.iter().find_map(|rr| {
        if let RecordData::Soa { minimum, .. } = &rr.rdata {
            Some(rr.ttl.min(*minimum))
        } else {
            None
        }
    });

    Chaining {
        canonical_name: cname,
        rrset: None,
        min_ttl: min_ttl.min(negative_ttl.unwrap_or(0)),
    }
}

/// Answers to a host lookup, indexed by record type.
#[derive(Debug, Clone, Default)]
pub struct HostAnswers {
    answers: HashMap<RdataType, Answer>,
}

impl HostAnswers {
    pub fn insert(&mut self, answer: Answer) {
        self.answers.insert(answer.rdtype, answer);
    }

    pub fn get(&self, rdtype: RdataType) -> Option<&Answer> {
        self.answers.get(&rdtype)
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// All addresses, IPv4 first.
    pub fn addresses(&self) -> Vec<IpAddr> {
        let mut out = Vec::new();
        for rdtype in [RdataType::A, RdataType::AAAA] {
            if let Some(answer) = self.answers.get(&rdtype) {
                out.extend(answer.addresses());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_wire::message::types::test_util::*;

    fn response_for(qname: &str, rdtype: RdataType, answers: Vec<ResourceRecord>) -> Message {
        let mut response = Message::from_question(1, question(qname, rdtype)).make_response();
        response.answers = answers;
        response
    }

    #[test]
    fn direct_answer_has_no_chain() {
        let response = response_for(
            "www.example.com.",
            RdataType::A,
            vec![a_record("www.example.com.", "1.2.3.4")],
        );
        let answer = Answer::new(
            name("www.example.com."),
            RdataType::A,
            RdataClass::IN,
            response,
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(name("www.example.com."), answer.canonical_name);
        assert_eq!(1, answer.rrset.as_ref().unwrap().len());
        assert_eq!(
            SystemTime::UNIX_EPOCH + Duration::from_secs(300),
            answer.expiration
        );
    }

    #[test]
    fn chain_is_followed_and_ttl_minimised() {
        let mut chain = cname_record("www.example.com.", "cdn.example.net.");
        chain.ttl = 60;
        let response = response_for(
            "www.example.com.",
            RdataType::A,
            vec![chain, a_record("cdn.example.net.", "9.9.9.9")],
        );
        let answer = Answer::new(
            name("www.example.com."),
            RdataType::A,
            RdataClass::IN,
            response,
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(name("cdn.example.net."), answer.canonical_name);
        assert_eq!(
            vec!["9.9.9.9".parse::<IpAddr>().unwrap()],
            answer.addresses()
        );
        // the 60s CNAME bounds the 300s A record
        assert_eq!(
            SystemTime::UNIX_EPOCH + Duration::from_secs(60),
            answer.expiration
        );
    }

    #[test]
    fn nodata_uses_soa_negative_ttl() {
        let mut response = response_for("www.example.com.", RdataType::AAAA, Vec::new());
        let mut soa = soa_record("example.com.", 1);
        soa.ttl = 900;
        response.authority = vec![soa];

        let answer = Answer::new(
            name("www.example.com."),
            RdataType::AAAA,
            RdataClass::IN,
            response,
            SystemTime::UNIX_EPOCH,
        );
        assert!(answer.rrset.is_none());
        // min(authority ttl 900, soa minimum 3600)
        assert_eq!(
            SystemTime::UNIX_EPOCH + Duration::from_secs(900),
            answer.expiration
        );
    }

    #[test]
    fn nodata_without_soa_expires_immediately() {
        let response = response_for("www.example.com.", RdataType::AAAA, Vec::new());
        let answer = Answer::new(
            name("www.example.com."),
            RdataType::AAAA,
            RdataClass::IN,
            response,
            SystemTime::UNIX_EPOCH,
        );
        assert!(answer.is_expired(SystemTime::UNIX_EPOCH));
    }

    #[test]
    fn cname_loop_terminates() {
        let response = response_for(
            "a.example.",
            RdataType::A,
            vec![
                cname_record("a.example.", "b.example."),
                cname_record("b.example.", "a.example."),
            ],
        );
        let answer = Answer::new(
            name("a.example."),
            RdataType::A,
            RdataClass::IN,
            response,
            SystemTime::UNIX_EPOCH,
        );
        assert!(answer.rrset.is_none());
    }

    #[test]
    fn host_answers_collects_both_families() {
        let a = Answer::new(
            name("host.example."),
            RdataType::A,
            RdataClass::IN,
            response_for(
                "host.example.",
                RdataType::A,
                vec![a_record("host.example.", "1.2.3.4")],
            ),
            SystemTime::UNIX_EPOCH,
        );
        let aaaa = Answer::new(
            name("host.example."),
            RdataType::AAAA,
            RdataClass::IN,
            response_for(
                "host.example.",
                RdataType::AAAA,
                vec![aaaa_record("host.example.", "2001:db8::1")],
            ),
            SystemTime::UNIX_EPOCH,
        );

        let mut answers = HostAnswers::default();
        assert!(answers.is_empty());
        answers.insert(a);
        answers.insert(aaaa);
        assert_eq!(2, answers.addresses().len());
        assert!(answers.get(RdataType::A).is_some());
    }
}
