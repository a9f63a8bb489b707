use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::edns::EdnsOption;
use crate::flags;
use crate::name::Name;
use crate::rcode::Rcode;

/// Basic DNS message format, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
///     |      Authority      | RRs pointing toward an authority
///     +---------------------+
///     |      Additional     | RRs holding additional information
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// A response skeleton echoing this message's id, opcode, RD
    /// flag, and questions.
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: true,
                rcode: Rcode::NoError,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// The OPT pseudo-record, if the additional section carries one.
    pub fn opt(&self) -> Option<&ResourceRecord> {
        self.additional
            .iter()
            .find(|rr| rr.rtype() == RdataType::OPT)
    }

    /// The full 12-bit response code: the header bits, extended by
    /// the high bits stowed in the OPT TTL when EDNS is in play.
    pub fn extended_rcode(&self) -> Rcode {
        let flags = u16::from(self.header.rcode) & flags::RCODE_MASK;
        match self.opt() {
            Some(opt) => Rcode::from_flags(flags, opt.ttl),
            None => Rcode::from(flags),
        }
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.1 of RFC 1035.  The count fields are not stored:
/// they are derived from the section vectors during serialisation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Header {
    /// A 16 bit identifier, copied into the corresponding reply so
    /// the requester can match up replies to outstanding queries.
    pub id: u16,

    /// Query (false) or response (true).
    pub is_response: bool,

    /// What kind of query this is.
    pub opcode: Opcode,

    /// Valid in responses: the responding name server is an
    /// authority for the domain name in the question section.
    pub is_authoritative: bool,

    /// The message was cut down to fit the transmission channel; the
    /// requester should retry over TCP.
    pub is_truncated: bool,

    /// Set in a query to direct the name server to pursue the query
    /// recursively; copied into the response.
    pub recursion_desired: bool,

    /// Set in a response to advertise recursive query support.
    pub recursion_available: bool,

    /// The 4-bit response code carried in the header itself.  EDNS
    /// responses extend this: see [`Message::extended_rcode`].
    pub rcode: Rcode,
}

impl Header {
    /// Assemble the 16-bit flags word.  Only the low four bits of the
    /// rcode fit here; the rest belong in an OPT record.
    pub fn flags(&self) -> u16 {
        let mut word = self.opcode.to_flags() | (u16::from(self.rcode) & flags::RCODE_MASK);
        if self.is_response {
            word |= flags::QR;
        }
        if self.is_authoritative {
            word |= flags::AA;
        }
        if self.is_truncated {
            word |= flags::TC;
        }
        if self.recursion_desired {
            word |= flags::RD;
        }
        if self.recursion_available {
            word |= flags::RA;
        }
        word
    }

    pub fn from_flags(id: u16, word: u16) -> Self {
        Self {
            id,
            is_response: word & flags::QR != 0,
            opcode: Opcode::from_flags(word),
            is_authoritative: word & flags::AA != 0,
            is_truncated: word & flags::TC != 0,
            recursion_desired: word & flags::RD != 0,
            recursion_available: word & flags::RA != 0,
            rcode: Rcode::from(word & flags::RCODE_MASK),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Header {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        // round-tripping through the flags word keeps the rcode to
        // the four bits the header can actually carry
        Ok(Self::from_flags(u.arbitrary()?, u.arbitrary()?))
    }
}

/// What sort of query this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Opcode {
    Query,
    IQuery,
    Status,
    Notify,
    Update,
    Reserved(OpcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Opcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OpcodeReserved(u8);

impl Opcode {
    pub fn to_flags(self) -> u16 {
        u16::from(u8::from(self)) << 11
    }

    pub fn from_flags(word: u16) -> Self {
        Self::from(((word & flags::OPCODE_MASK) >> 11) as u8)
    }
}

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Query,
            1 => Opcode::IQuery,
            2 => Opcode::Status,
            4 => Opcode::Notify,
            5 => Opcode::Update,
            other => Opcode::Reserved(OpcodeReserved(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::IQuery => 1,
            Opcode::Status => 2,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Reserved(OpcodeReserved(octet)) => octet,
        }
    }
}

/// A single entry of the question section.
///
/// See section 4.1.2 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Question {
    pub name: Name,
    pub rdtype: RdataType,
    pub rdclass: RdataClass,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.rdclass, self.rdtype)
    }
}

/// A single resource record from the answer, authority, or
/// additional section.
///
/// ```text
///     name / type / class / ttl / rdlength / rdata
/// ```
///
/// See section 4.1.3 of RFC 1035.  The type and the rdata travel
/// together in [`RecordData`] so they cannot disagree.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct ResourceRecord {
    pub name: Name,
    pub rdata: RecordData,
    pub rclass: RdataClass,
    pub ttl: u32,
}

impl ResourceRecord {
    pub fn rtype(&self) -> RdataType {
        self.rdata.rtype()
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.rtype().matches(question.rdtype) && self.rclass.matches(question.rdclass)
    }
}

/// A record type with its associated, deserialised, data.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RecordData {
    /// A 32 bit Internet address.
    A { address: Ipv4Addr },

    /// A host which should be authoritative for the owner domain.
    Ns { nsdname: Name },

    /// The canonical name for the owner, which is an alias.
    Cname { cname: Name },

    /// Start of a zone of authority.  The serial drives zone
    /// transfers; the minimum bounds negative caching.
    Soa {
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },

    /// A pointer to some other location in the name space.
    Ptr { ptrdname: Name },

    /// A mail exchange for the owner, lower preferences preferred.
    Mx { preference: u16, exchange: Name },

    /// One or more character strings, kept as raw octets.
    Txt { octets: Vec<u8> },

    /// A 128 bit Internet address.
    Aaaa { address: Ipv6Addr },

    /// The location of a service, RFC 2782.
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: Name,
    },

    /// A service binding, RFC 9460.  The parameters this library
    /// consumes are kept typed; the rest stay opaque.
    Svcb {
        priority: u16,
        target: Name,
        params: Vec<SvcParam>,
    },

    /// The EDNS OPT pseudo-record's options.  Its fixed fields are
    /// carried by the enclosing record's class and TTL.
    Opt { options: Vec<EdnsOption> },

    /// Any other record, uninterpreted.
    Opaque { rtype: RdataType, octets: Vec<u8> },
}

impl RecordData {
    pub fn rtype(&self) -> RdataType {
        match self {
            RecordData::A { .. } => RdataType::A,
            RecordData::Ns { .. } => RdataType::NS,
            RecordData::Cname { .. } => RdataType::CNAME,
            RecordData::Soa { .. } => RdataType::SOA,
            RecordData::Ptr { .. } => RdataType::PTR,
            RecordData::Mx { .. } => RdataType::MX,
            RecordData::Txt { .. } => RdataType::TXT,
            RecordData::Aaaa { .. } => RdataType::AAAA,
            RecordData::Srv { .. } => RdataType::SRV,
            RecordData::Svcb { .. } => RdataType::SVCB,
            RecordData::Opt { .. } => RdataType::OPT,
            RecordData::Opaque { rtype, .. } => *rtype,
        }
    }
}

/// A single SVCB/HTTPS service parameter.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SvcParam {
    /// Key 3: the port the service listens on.
    Port(u16),
    /// Key 4: IPv4 address hints for the target.
    Ipv4Hint(Vec<Ipv4Addr>),
    /// Key 6: IPv6 address hints for the target.
    Ipv6Hint(Vec<Ipv6Addr>),
    Unknown { key: u16, value: Vec<u8> },
}

impl SvcParam {
    pub fn key(&self) -> u16 {
        match self {
            SvcParam::Port(_) => 3,
            SvcParam::Ipv4Hint(_) => 4,
            SvcParam::Ipv6Hint(_) => 6,
            SvcParam::Unknown { key, .. } => *key,
        }
    }
}

/// Record types, used by both questions and resource records.  The
/// metatypes (OPT, TSIG, IXFR, AXFR, ANY) only ever appear in
/// questions or in pseudo-records.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RdataType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    SVCB,
    TSIG,
    IXFR,
    AXFR,
    ANY,
    Unknown(UnknownRdataType),
}

/// A struct with a private constructor, to ensure invalid
/// `RdataType`s cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UnknownRdataType(u16);

impl RdataType {
    pub fn is_unknown(self) -> bool {
        matches!(self, RdataType::Unknown(_))
    }

    /// Is this a type which can only appear in queries and
    /// pseudo-records, never in zone data?
    pub fn is_metatype(self) -> bool {
        matches!(
            self,
            RdataType::OPT | RdataType::TSIG | RdataType::IXFR | RdataType::AXFR | RdataType::ANY
        )
    }

    /// Does a record of this type answer a question of type *qtype*?
    pub fn matches(self, qtype: RdataType) -> bool {
        qtype == RdataType::ANY || qtype == self
    }
}

impl From<u16> for RdataType {
    fn from(value: u16) -> Self {
        match value {
            1 => RdataType::A,
            2 => RdataType::NS,
            5 => RdataType::CNAME,
            6 => RdataType::SOA,
            12 => RdataType::PTR,
            15 => RdataType::MX,
            16 => RdataType::TXT,
            28 => RdataType::AAAA,
            33 => RdataType::SRV,
            41 => RdataType::OPT,
            64 => RdataType::SVCB,
            250 => RdataType::TSIG,
            251 => RdataType::IXFR,
            252 => RdataType::AXFR,
            255 => RdataType::ANY,
            _ => RdataType::Unknown(UnknownRdataType(value)),
        }
    }
}

impl From<RdataType> for u16 {
    fn from(value: RdataType) -> Self {
        match value {
            RdataType::A => 1,
            RdataType::NS => 2,
            RdataType::CNAME => 5,
            RdataType::SOA => 6,
            RdataType::PTR => 12,
            RdataType::MX => 15,
            RdataType::TXT => 16,
            RdataType::AAAA => 28,
            RdataType::SRV => 33,
            RdataType::OPT => 41,
            RdataType::SVCB => 64,
            RdataType::TSIG => 250,
            RdataType::IXFR => 251,
            RdataType::AXFR => 252,
            RdataType::ANY => 255,
            RdataType::Unknown(UnknownRdataType(value)) => value,
        }
    }
}

impl fmt::Display for RdataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RdataType::A => write!(f, "A"),
            RdataType::NS => write!(f, "NS"),
            RdataType::CNAME => write!(f, "CNAME"),
            RdataType::SOA => write!(f, "SOA"),
            RdataType::PTR => write!(f, "PTR"),
            RdataType::MX => write!(f, "MX"),
            RdataType::TXT => write!(f, "TXT"),
            RdataType::AAAA => write!(f, "AAAA"),
            RdataType::SRV => write!(f, "SRV"),
            RdataType::OPT => write!(f, "OPT"),
            RdataType::SVCB => write!(f, "SVCB"),
            RdataType::TSIG => write!(f, "TSIG"),
            RdataType::IXFR => write!(f, "IXFR"),
            RdataType::AXFR => write!(f, "AXFR"),
            RdataType::ANY => write!(f, "ANY"),
            RdataType::Unknown(UnknownRdataType(value)) => write!(f, "TYPE{value}"),
        }
    }
}

/// A type mnemonic (or `TYPEnnn` form) is not recognised.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UnknownMnemonic(pub String);

impl fmt::Display for UnknownMnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown mnemonic: {}", self.0)
    }
}

impl std::error::Error for UnknownMnemonic {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl FromStr for RdataType {
    type Err = UnknownMnemonic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let known = [
            RdataType::A,
            RdataType::NS,
            RdataType::CNAME,
            RdataType::SOA,
            RdataType::PTR,
            RdataType::MX,
            RdataType::TXT,
            RdataType::AAAA,
            RdataType::SRV,
            RdataType::OPT,
            RdataType::SVCB,
            RdataType::TSIG,
            RdataType::IXFR,
            RdataType::AXFR,
            RdataType::ANY,
        ];
        for rdtype in known {
            if rdtype.to_string() == upper {
                return Ok(rdtype);
            }
        }
        if let Some(rest) = upper.strip_prefix("TYPE") {
            if let Ok(value) = rest.parse::<u16>() {
                return Ok(Self::from(value));
            }
        }
        Err(UnknownMnemonic(s.to_string()))
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RdataType {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// Record classes, used by both questions and resource records.  The
/// NONE and ANY metaclasses only appear in dynamic updates and
/// queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RdataClass {
    IN,
    CH,
    HS,
    NONE,
    ANY,
    Unknown(UnknownRdataClass),
}

/// A struct with a private constructor, to ensure invalid
/// `RdataClass`es cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UnknownRdataClass(u16);

impl RdataClass {
    pub fn is_metaclass(self) -> bool {
        matches!(self, RdataClass::NONE | RdataClass::ANY)
    }

    pub fn matches(self, qclass: RdataClass) -> bool {
        qclass == RdataClass::ANY || qclass == self
    }
}

impl From<u16> for RdataClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RdataClass::IN,
            3 => RdataClass::CH,
            4 => RdataClass::HS,
            254 => RdataClass::NONE,
            255 => RdataClass::ANY,
            _ => RdataClass::Unknown(UnknownRdataClass(value)),
        }
    }
}

impl From<RdataClass> for u16 {
    fn from(value: RdataClass) -> Self {
        match value {
            RdataClass::IN => 1,
            RdataClass::CH => 3,
            RdataClass::HS => 4,
            RdataClass::NONE => 254,
            RdataClass::ANY => 255,
            RdataClass::Unknown(UnknownRdataClass(value)) => value,
        }
    }
}

impl fmt::Display for RdataClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RdataClass::IN => write!(f, "IN"),
            RdataClass::CH => write!(f, "CH"),
            RdataClass::HS => write!(f, "HS"),
            RdataClass::NONE => write!(f, "NONE"),
            RdataClass::ANY => write!(f, "ANY"),
            RdataClass::Unknown(UnknownRdataClass(value)) => write!(f, "CLASS{value}"),
        }
    }
}

impl FromStr for RdataClass {
    type Err = UnknownMnemonic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        for rdclass in [
            RdataClass::IN,
            RdataClass::CH,
            RdataClass::HS,
            RdataClass::NONE,
            RdataClass::ANY,
        ] {
            if rdclass.to_string() == upper {
                return Ok(rdclass);
            }
        }
        if let Some(rest) = upper.strip_prefix("CLASS") {
            if let Ok(value) = rest.parse::<u16>() {
                return Ok(Self::from(value));
            }
        }
        Err(UnknownMnemonic(s.to_string()))
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RdataClass {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordData {
    // this is pretty verbose but it keeps the opaque payloads small
    // and the type/data pairing consistent
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let len = u.int_in_range(0..=64)?;
        let octets = Vec::from(u.bytes(len)?);

        let rdata = match u.arbitrary::<RdataType>()? {
            RdataType::A => RecordData::A {
                address: Ipv4Addr::from(u.arbitrary::<u32>()?),
            },
            RdataType::NS => RecordData::Ns {
                nsdname: u.arbitrary()?,
            },
            RdataType::CNAME => RecordData::Cname {
                cname: u.arbitrary()?,
            },
            RdataType::SOA => RecordData::Soa {
                mname: u.arbitrary()?,
                rname: u.arbitrary()?,
                serial: u.arbitrary()?,
                refresh: u.arbitrary()?,
                retry: u.arbitrary()?,
                expire: u.arbitrary()?,
                minimum: u.arbitrary()?,
            },
            RdataType::PTR => RecordData::Ptr {
                ptrdname: u.arbitrary()?,
            },
            RdataType::MX => RecordData::Mx {
                preference: u.arbitrary()?,
                exchange: u.arbitrary()?,
            },
            RdataType::TXT => RecordData::Txt { octets },
            RdataType::AAAA => RecordData::Aaaa {
                address: Ipv6Addr::from(u.arbitrary::<u128>()?),
            },
            RdataType::SRV => RecordData::Srv {
                priority: u.arbitrary()?,
                weight: u.arbitrary()?,
                port: u.arbitrary()?,
                target: u.arbitrary()?,
            },
            RdataType::SVCB => RecordData::Svcb {
                priority: u.arbitrary()?,
                target: u.arbitrary()?,
                params: vec![SvcParam::Port(u.arbitrary()?)],
            },
            RdataType::OPT => RecordData::Opt {
                options: vec![EdnsOption {
                    code: u.arbitrary()?,
                    data: octets,
                }],
            },
            other => RecordData::Opaque {
                rtype: other,
                octets,
            },
        };
        Ok(rdata)
    }
}

#[cfg(any(feature = "test-util", test))]
pub mod test_util {
    use super::*;

    pub fn name(text: &str) -> Name {
        Name::from_text(text, None).unwrap()
    }

    pub fn question(text: &str, rdtype: RdataType) -> Question {
        Question {
            name: name(text),
            rdtype,
            rdclass: RdataClass::IN,
        }
    }

    pub fn a_record(owner: &str, address: &str) -> ResourceRecord {
        ResourceRecord {
            name: name(owner),
            rdata: RecordData::A {
                address: address.parse().unwrap(),
            },
            rclass: RdataClass::IN,
            ttl: 300,
        }
    }

    pub fn aaaa_record(owner: &str, address: &str) -> ResourceRecord {
        ResourceRecord {
            name: name(owner),
            rdata: RecordData::Aaaa {
                address: address.parse().unwrap(),
            },
            rclass: RdataClass::IN,
            ttl: 300,
        }
    }

    pub fn cname_record(owner: &str, target: &str) -> ResourceRecord {
        ResourceRecord {
            name: name(owner),
            rdata: RecordData::Cname {
                cname: name(target),
            },
            rclass: RdataClass::IN,
            ttl: 300,
        }
    }

    pub fn soa_record(owner: &str, serial: u32) -> ResourceRecord {
        ResourceRecord {
            name: name(owner),
            rdata: RecordData::Soa {
                mname: name("ns1.example.com."),
                rname: name("hostmaster.example.com."),
                serial,
                refresh: 10800,
                retry: 3600,
                expire: 604_800,
                minimum: 3600,
            },
            rclass: RdataClass::IN,
            ttl: 3600,
        }
    }

    pub fn opt_record(payload: u16, ttl: u32) -> ResourceRecord {
        ResourceRecord {
            name: Name::root(),
            rdata: RecordData::Opt {
                options: Vec::new(),
            },
            rclass: RdataClass::from(payload),
            ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_rdatatype_round_trip() {
        for value in 0..300 {
            assert_eq!(value, u16::from(RdataType::from(value)));
        }
    }

    #[test]
    fn u16_rdataclass_round_trip() {
        for value in 0..300 {
            assert_eq!(value, u16::from(RdataClass::from(value)));
        }
    }

    #[test]
    fn u8_opcode_round_trip() {
        for value in 0..15 {
            assert_eq!(value, u8::from(Opcode::from(value)));
        }
    }

    #[test]
    fn rdatatype_text_forms() {
        assert_eq!(Ok(RdataType::AAAA), "aaaa".parse());
        assert_eq!(Ok(RdataType::from(999)), "TYPE999".parse());
        assert_eq!("TYPE999", RdataType::from(999).to_string());
        assert!("BOGUS".parse::<RdataType>().is_err());
    }

    #[test]
    fn metatypes_and_metaclasses() {
        for rdtype in [
            RdataType::OPT,
            RdataType::TSIG,
            RdataType::IXFR,
            RdataType::AXFR,
            RdataType::ANY,
        ] {
            assert!(rdtype.is_metatype());
        }
        assert!(!RdataType::A.is_metatype());
        assert!(RdataClass::ANY.is_metaclass());
        assert!(RdataClass::NONE.is_metaclass());
        assert!(!RdataClass::IN.is_metaclass());
    }

    #[test]
    fn any_matches_every_type() {
        assert!(RdataType::A.matches(RdataType::ANY));
        assert!(RdataType::A.matches(RdataType::A));
        assert!(!RdataType::A.matches(RdataType::AAAA));
    }

    #[test]
    fn header_flags_round_trip() {
        let header = Header {
            id: 1234,
            is_response: true,
            opcode: Opcode::Update,
            is_authoritative: false,
            is_truncated: true,
            recursion_desired: true,
            recursion_available: false,
            rcode: Rcode::Refused,
        };
        assert_eq!(header, Header::from_flags(1234, header.flags()));
    }

    #[test]
    fn extended_rcode_combines_opt_bits() {
        let mut message = Message::from_question(
            1,
            Question {
                name: Name::from_text("example.", None).unwrap(),
                rdtype: RdataType::A,
                rdclass: RdataClass::IN,
            },
        );
        message.header.rcode = Rcode::NoError;
        assert_eq!(Rcode::NoError, message.extended_rcode());

        let (hdr, ednsflags) = Rcode::BadVers.to_flags();
        message.header.rcode = Rcode::from(hdr);
        message.additional.push(ResourceRecord {
            name: Name::root(),
            rdata: RecordData::Opt { options: vec![] },
            rclass: RdataClass::from(1232),
            ttl: ednsflags,
        });
        assert_eq!(Rcode::BadVers, message.extended_rcode());
    }
}
