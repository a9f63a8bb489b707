//! A scriptable [`Transport`] for exercising the resolver and
//! discovery without a network.  Replies are consumed in order; a
//! fallback reply (if set) answers everything after the script runs
//! out, and anything else panics the test.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dns_wire::message::types::{Message, RecordData, ResourceRecord};
use dns_wire::message::types::test_util::*;
use dns_wire::rcode::Rcode;

use crate::transport::{TlsIdentity, Transport, TransportError};

pub type Responder = Box<dyn Fn(&Message) -> Message + Send + Sync>;

pub enum Reply {
    /// Build a response from the request.
    Respond(Responder),
    /// Fail immediately with a timeout.
    Timeout,
    /// Consume the whole per-call timeout, then time out.
    Blackhole,
    /// For `tls_probe`: present this certificate identity.
    Identity(TlsIdentity),
}

/// What the transport was asked to do, for assertions.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Exchange {
    Udp(SocketAddr),
    Tcp(SocketAddr),
    Tls(SocketAddr, String),
    Probe(SocketAddr, String),
}

#[derive(Default)]
struct Inner {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    log: Mutex<Vec<Exchange>>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Reply) {
        self.inner.replies.lock().unwrap().push_back(reply);
    }

    pub fn set_fallback(&self, reply: Reply) {
        *self.inner.fallback.lock().unwrap() = Some(reply);
    }

    pub fn log(&self) -> Vec<Exchange> {
        self.inner.log.lock().unwrap().clone()
    }

    pub fn exchanges(&self) -> usize {
        self.inner.log.lock().unwrap().len()
    }

    async fn reply_to(
        &self,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        enum Action {
            Bytes(Vec<u8>),
            Timeout,
            Blackhole,
        }

        // resolve the reply to an action without holding any lock
        // across an await
        let action = {
            let scripted = self.inner.replies.lock().unwrap().pop_front();
            let fallback = self.inner.fallback.lock().unwrap();
            let reply = match (&scripted, &*fallback) {
                (Some(reply), _) => reply,
                (None, Some(reply)) => reply,
                (None, None) => panic!("unscripted query reached the transport"),
            };
            match reply {
                Reply::Respond(f) => {
                    let request = Message::from_octets(request).unwrap();
                    Action::Bytes(f(&request).to_octets().unwrap())
                }
                Reply::Timeout => Action::Timeout,
                Reply::Blackhole => Action::Blackhole,
                Reply::Identity(_) => panic!("certificate reply to a query"),
            }
        };

        match action {
            Action::Bytes(bytes) => Ok(bytes),
            Action::Timeout => Err(TransportError::Timeout),
            Action::Blackhole => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout)
            }
        }
    }
}

impl Transport for ScriptedTransport {
    async fn udp_query(
        &self,
        server: SocketAddr,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.inner.log.lock().unwrap().push(Exchange::Udp(server));
        self.reply_to(request, timeout).await
    }

    async fn tcp_query(
        &self,
        server: SocketAddr,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.inner.log.lock().unwrap().push(Exchange::Tcp(server));
        self.reply_to(request, timeout).await
    }

    async fn tls_query(
        &self,
        server: SocketAddr,
        server_name: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.inner
            .log
            .lock()
            .unwrap()
            .push(Exchange::Tls(server, server_name.to_string()));
        self.reply_to(request, timeout).await
    }

    async fn tls_probe(
        &self,
        server: SocketAddr,
        server_name: &str,
        _timeout: Duration,
    ) -> Result<TlsIdentity, TransportError> {
        self.inner
            .log
            .lock()
            .unwrap()
            .push(Exchange::Probe(server, server_name.to_string()));
        let reply = self.inner.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Identity(identity)) => Ok(identity),
            Some(Reply::Timeout) | None => Err(TransportError::Timeout),
            Some(_) => panic!("query reply to a certificate probe"),
        }
    }
}

/// A reply answering with the given records, owned by whatever name
/// was asked.
pub fn records_reply(rdatas: Vec<RecordData>) -> Reply {
    Reply::Respond(Box::new(move |request| {
        let mut response = request.make_response();
        let qname = request.questions[0].name.clone();
        response.answers = rdatas
            .iter()
            .map(|rdata| ResourceRecord {
                name: qname.clone(),
                rdata: rdata.clone(),
                rclass: request.questions[0].rdclass,
                ttl: 300,
            })
            .collect();
        response
    }))
}

/// A reply with one A record for the question name.
pub fn a_reply(address: &str) -> Reply {
    let address = address.parse().unwrap();
    records_reply(vec![RecordData::A { address }])
}

/// A reply with one AAAA record for the question name.
pub fn aaaa_reply(address: &str) -> Reply {
    let address = address.parse().unwrap();
    records_reply(vec![RecordData::Aaaa { address }])
}

/// An empty NOERROR reply (NODATA).
pub fn empty_reply() -> Reply {
    records_reply(Vec::new())
}

/// A bare rcode reply.
pub fn rcode_reply(rcode: Rcode) -> Reply {
    Reply::Respond(Box::new(move |request| {
        let mut response = request.make_response();
        response.header.rcode = rcode;
        response
    }))
}

/// An NXDOMAIN reply carrying an authority SOA, so negative caching
/// has a TTL to work with.
pub fn nxdomain_reply() -> Reply {
    Reply::Respond(Box::new(|request| {
        let mut response = request.make_response();
        response.header.rcode = Rcode::NxDomain;
        let mut soa = soa_record("example-authority.test.", 1);
        soa.ttl = 900;
        response.authority = vec![soa];
        response
    }))
}

/// A truncated reply, inviting a TCP retry.
pub fn truncated_reply() -> Reply {
    Reply::Respond(Box::new(|request| {
        let mut response = request.make_response();
        response.header.is_truncated = true;
        response
    }))
}
