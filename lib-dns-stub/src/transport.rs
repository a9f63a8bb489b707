//! The I/O capability boundary.
//!
//! The resolver never opens a socket itself: it calls through the
//! [`Transport`] trait, which an embedding application can replace
//! wholesale (tests script it).  [`SystemTransport`] is the stock
//! implementation over tokio UDP and TCP.  Encrypted transports are
//! external collaborators: `SystemTransport` reports them as
//! unsupported rather than dragging a TLS stack in here.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

/// How to reach a nameserver.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Protocol {
    /// Plaintext port-53 DNS over UDP and TCP.
    Do53,
    /// DNS over TLS.
    Tls,
    /// DNS over HTTPS.
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::Do53 => write!(f, "do53"),
            Protocol::Tls => write!(f, "tls"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// A nameserver: an address, a transport kind, and (for encrypted
/// transports) the server name to authenticate against.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Nameserver {
    pub address: SocketAddr,
    pub protocol: Protocol,
    pub server_name: Option<String>,
}

impl Nameserver {
    pub fn do53(address: IpAddr, port: u16) -> Self {
        Self {
            address: SocketAddr::new(address, port),
            protocol: Protocol::Do53,
            server_name: None,
        }
    }

    pub fn tls(address: IpAddr, port: u16, server_name: String) -> Self {
        Self {
            address: SocketAddr::new(address, port),
            protocol: Protocol::Tls,
            server_name: Some(server_name),
        }
    }
}

impl fmt::Display for Nameserver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.protocol {
            Protocol::Do53 => write!(f, "{}", self.address),
            proto => write!(f, "{proto}://{}", self.address),
        }
    }
}

/// What a TLS peer proved about itself: the subject-alternative-name
/// entries of its certificate.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TlsIdentity {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl TlsIdentity {
    /// Does a SAN DNS entry match *hostname*?  Comparison is
    /// case-insensitive and ignores a trailing dot.
    pub fn matches_hostname(&self, hostname: &str) -> bool {
        let wanted = hostname.trim_end_matches('.');
        self.dns_names
            .iter()
            .any(|san| san.trim_end_matches('.').eq_ignore_ascii_case(wanted))
    }

    pub fn matches_address(&self, address: IpAddr) -> bool {
        self.ip_addresses.contains(&address)
    }
}

/// An error from a single transport call.
#[derive(Debug)]
pub enum TransportError {
    /// The call did not complete within its timeout.
    Timeout,
    Io(io::Error),
    /// The transport kind is not available in this implementation.
    Unsupported(Protocol),
    /// A TCP message ended before its length prefix said it would.
    TooShort { expected: usize, actual: usize },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "timed out"),
            TransportError::Io(err) => write!(f, "{err}"),
            TransportError::Unsupported(protocol) => {
                write!(f, "{protocol} transport is not available")
            }
            TransportError::TooShort { expected, actual } => {
                write!(f, "message ended after {actual} of {expected} octets")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(err)
    }
}

/// The narrow surface the resolver talks to the network through.
/// Every method is a single request/response exchange bounded by
/// *timeout*; suspension only ever happens inside these calls.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// Send a serialised query over UDP and return one datagram.
    async fn udp_query(
        &self,
        server: SocketAddr,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Send a serialised query over TCP with the two-octet length
    /// prefix and read one framed response.
    async fn tcp_query(
        &self,
        server: SocketAddr,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// As `tcp_query`, over TLS authenticated against *server_name*.
    async fn tls_query(
        &self,
        server: SocketAddr,
        server_name: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Open a TLS connection, complete the handshake, and report the
    /// peer certificate's subject-alternative names.  Used by
    /// discovery to validate candidate resolvers.
    async fn tls_probe(
        &self,
        server: SocketAddr,
        server_name: &str,
        timeout: Duration,
    ) -> Result<TlsIdentity, TransportError>;
}

/// The stock transport: tokio UDP/TCP, no TLS.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemTransport;

impl Transport for SystemTransport {
    async fn udp_query(
        &self,
        server: SocketAddr,
        request: &[u8],
        time_limit: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        match timeout(time_limit, udp_exchange(server, request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn tcp_query(
        &self,
        server: SocketAddr,
        request: &[u8],
        time_limit: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        match timeout(time_limit, tcp_exchange(server, request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn tls_query(
        &self,
        _server: SocketAddr,
        _server_name: &str,
        _request: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Unsupported(Protocol::Tls))
    }

    async fn tls_probe(
        &self,
        _server: SocketAddr,
        _server_name: &str,
        _timeout: Duration,
    ) -> Result<TlsIdentity, TransportError> {
        Err(TransportError::Unsupported(Protocol::Tls))
    }
}

async fn udp_exchange(server: SocketAddr, request: &[u8]) -> Result<Vec<u8>, TransportError> {
    let bind_address: SocketAddr = if server.is_ipv4() {
        "0.0.0.0:0".parse().map_err(|_| TransportError::Timeout)?
    } else {
        "[::]:0".parse().map_err(|_| TransportError::Timeout)?
    };
    let sock = UdpSocket::bind(bind_address).await?;
    sock.connect(server).await?;
    sock.send(request).await?;

    let mut buf = vec![0; 65535];
    let received = sock.recv(&mut buf).await?;
    buf.truncate(received);
    Ok(buf)
}

async fn tcp_exchange(server: SocketAddr, request: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut stream = TcpStream::connect(server).await?;
    send_tcp_bytes(&mut stream, request).await?;
    let bytes = read_tcp_bytes(&mut stream).await?;
    Ok(bytes.to_vec())
}

/// Write a serialised message to a TCP stream, prefixed with its
/// big-endian u16 length.
pub async fn send_tcp_bytes(stream: &mut TcpStream, bytes: &[u8]) -> Result<(), TransportError> {
    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&bytes[..usize::from(len)]).await?;
    Ok(())
}

/// Read a DNS message from a TCP stream.
///
/// A DNS TCP message differs from a UDP one: it has a big-endian u16
/// prefix giving the total length, so the entire message can be read
/// before parsing begins.
pub async fn read_tcp_bytes(stream: &mut TcpStream) -> Result<BytesMut, TransportError> {
    let expected = usize::from(stream.read_u16().await?);
    let mut bytes = BytesMut::with_capacity(expected);
    while bytes.len() < expected {
        match stream.read_buf(&mut bytes).await {
            Ok(0) => {
                return Err(TransportError::TooShort {
                    expected,
                    actual: bytes.len(),
                })
            }
            Ok(_) => (),
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(bytes)
}
