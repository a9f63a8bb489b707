//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::edns;
use crate::message::types::*;
use crate::name::{Name, NameError};
use crate::wire::Parser;

/// Errors encountered when parsing a message.  The errors which carry
/// a `u16` include the ID from the header, so that an error response
/// can be sent back to the right query.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FormError {
    /// The message is not even 2 octets long, so it does not contain
    /// an ID to answer with.
    CompletelyBusted,

    /// The header is missing one or more required fields.
    HeaderTooShort(u16),

    /// A question ends with an incomplete field.
    QuestionTooShort(u16),

    /// A resource record ends with an incomplete field.
    RecordTooShort(u16),

    /// A resource record's RDATA does not match its RDLENGTH, or an
    /// embedded structure (EDNS options, SVCB parameters) is
    /// malformed.
    RecordInvalid(u16),

    /// A name failed to parse: a bad compression pointer, a reserved
    /// label type, or an over-long name.
    BadName(u16, NameError),
}

impl FormError {
    pub fn id(self) -> Option<u16> {
        match self {
            FormError::CompletelyBusted => None,
            FormError::HeaderTooShort(id)
            | FormError::QuestionTooShort(id)
            | FormError::RecordTooShort(id)
            | FormError::RecordInvalid(id)
            | FormError::BadName(id, _) => Some(id),
        }
    }
}

impl std::fmt::Display for FormError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FormError::CompletelyBusted => write!(f, "message too short to hold an ID"),
            FormError::HeaderTooShort(_) => write!(f, "header too short"),
            FormError::QuestionTooShort(_) => write!(f, "question too short"),
            FormError::RecordTooShort(_) => write!(f, "resource record too short"),
            FormError::RecordInvalid(_) => write!(f, "resource record malformed"),
            FormError::BadName(_, err) => write!(f, "bad name: {err}"),
        }
    }
}

impl std::error::Error for FormError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, FormError> {
        Self::deserialise(&mut Parser::new(octets))
    }

    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(parser: &mut Parser<'_>) -> Result<Self, FormError> {
        let id = parser.next_u16().ok_or(FormError::CompletelyBusted)?;
        let flags = parser.next_u16().ok_or(FormError::HeaderTooShort(id))?;
        let qdcount = parser.next_u16().ok_or(FormError::HeaderTooShort(id))?;
        let ancount = parser.next_u16().ok_or(FormError::HeaderTooShort(id))?;
        let nscount = parser.next_u16().ok_or(FormError::HeaderTooShort(id))?;
        let arcount = parser.next_u16().ok_or(FormError::HeaderTooShort(id))?;

        let header = Header::from_flags(id, flags);

        let mut questions = Vec::with_capacity(qdcount.into());
        let mut answers = Vec::with_capacity(ancount.into());
        let mut authority = Vec::with_capacity(nscount.into());
        let mut additional = Vec::with_capacity(arcount.into());

        for _ in 0..qdcount {
            questions.push(Question::deserialise(id, parser)?);
        }
        for _ in 0..ancount {
            answers.push(ResourceRecord::deserialise(id, parser)?);
        }
        for _ in 0..nscount {
            authority.push(ResourceRecord::deserialise(id, parser)?);
        }
        for _ in 0..arcount {
            additional.push(ResourceRecord::deserialise(id, parser)?);
        }

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(id: u16, parser: &mut Parser<'_>) -> Result<Self, FormError> {
        let name = Name::from_wire(parser).map_err(|err| FormError::BadName(id, err))?;
        let rdtype = parser.next_u16().ok_or(FormError::QuestionTooShort(id))?;
        let rdclass = parser.next_u16().ok_or(FormError::QuestionTooShort(id))?;

        Ok(Self {
            name,
            rdtype: RdataType::from(rdtype),
            rdclass: RdataClass::from(rdclass),
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed, or its RDATA does not exactly
    /// fill its RDLENGTH.
    pub fn deserialise(id: u16, parser: &mut Parser<'_>) -> Result<Self, FormError> {
        let name = Name::from_wire(parser).map_err(|err| FormError::BadName(id, err))?;
        let rtype = parser.next_u16().ok_or(FormError::RecordTooShort(id))?;
        let rclass = parser.next_u16().ok_or(FormError::RecordTooShort(id))?;
        let ttl = parser.next_u32().ok_or(FormError::RecordTooShort(id))?;
        let rdlength = parser.next_u16().ok_or(FormError::RecordTooShort(id))?;

        let rdata_start = parser.position();
        let rdata = RecordData::deserialise(id, RdataType::from(rtype), parser, rdlength)?;

        if parser.position() == rdata_start + usize::from(rdlength) {
            Ok(Self {
                name,
                rdata,
                rclass: RdataClass::from(rclass),
                ttl,
            })
        } else {
            Err(FormError::RecordInvalid(id))
        }
    }
}

impl RecordData {
    /// Parse RDATA of the given type.  Names inside the RDATA of the
    /// well-known types are deserialised, expanding any compression
    /// pointers.
    ///
    /// # Errors
    ///
    /// If the RDATA cannot be parsed.
    pub fn deserialise(
        id: u16,
        rtype: RdataType,
        parser: &mut Parser<'_>,
        rdlength: u16,
    ) -> Result<Self, FormError> {
        let too_short = FormError::RecordTooShort(id);
        let bad_name = |err| FormError::BadName(id, err);
        let rdata_stop = parser.position() + usize::from(rdlength);

        // empty RDATA is legitimate for the ANY/NONE sentinels of
        // dynamic updates, whatever the type field says
        if rdlength == 0 {
            return Ok(match rtype {
                RdataType::TXT => RecordData::Txt { octets: Vec::new() },
                RdataType::OPT => RecordData::Opt {
                    options: Vec::new(),
                },
                other => RecordData::Opaque {
                    rtype: other,
                    octets: Vec::new(),
                },
            });
        }

        let rdata = match rtype {
            RdataType::A => RecordData::A {
                address: Ipv4Addr::from(parser.next_u32().ok_or(too_short)?),
            },
            RdataType::NS => RecordData::Ns {
                nsdname: Name::from_wire(parser).map_err(bad_name)?,
            },
            RdataType::CNAME => RecordData::Cname {
                cname: Name::from_wire(parser).map_err(bad_name)?,
            },
            RdataType::SOA => RecordData::Soa {
                mname: Name::from_wire(parser).map_err(bad_name)?,
                rname: Name::from_wire(parser).map_err(bad_name)?,
                serial: parser.next_u32().ok_or(too_short)?,
                refresh: parser.next_u32().ok_or(too_short)?,
                retry: parser.next_u32().ok_or(too_short)?,
                expire: parser.next_u32().ok_or(too_short)?,
                minimum: parser.next_u32().ok_or(too_short)?,
            },
            RdataType::PTR => RecordData::Ptr {
                ptrdname: Name::from_wire(parser).map_err(bad_name)?,
            },
            RdataType::MX => RecordData::Mx {
                preference: parser.next_u16().ok_or(too_short)?,
                exchange: Name::from_wire(parser).map_err(bad_name)?,
            },
            RdataType::TXT => RecordData::Txt {
                octets: parser
                    .take(rdlength.into())
                    .ok_or(too_short)?
                    .to_vec(),
            },
            RdataType::AAAA => {
                let octets = parser.take(16).ok_or(too_short)?;
                let mut bs = [0; 16];
                bs.copy_from_slice(octets);
                RecordData::Aaaa {
                    address: Ipv6Addr::from(bs),
                }
            }
            RdataType::SRV => RecordData::Srv {
                priority: parser.next_u16().ok_or(too_short)?,
                weight: parser.next_u16().ok_or(too_short)?,
                port: parser.next_u16().ok_or(too_short)?,
                target: Name::from_wire(parser).map_err(bad_name)?,
            },
            RdataType::SVCB => {
                let priority = parser.next_u16().ok_or(too_short)?;
                let target = Name::from_wire(parser).map_err(bad_name)?;
                let mut params = Vec::new();
                while parser.position() < rdata_stop {
                    params.push(SvcParam::deserialise(id, parser)?);
                }
                RecordData::Svcb {
                    priority,
                    target,
                    params,
                }
            }
            RdataType::OPT => {
                let octets = parser.take(rdlength.into()).ok_or(too_short)?;
                let options =
                    edns::decode_options(octets).map_err(|_| FormError::RecordInvalid(id))?;
                RecordData::Opt { options }
            }
            other => RecordData::Opaque {
                rtype: other,
                octets: parser
                    .take(rdlength.into())
                    .ok_or(too_short)?
                    .to_vec(),
            },
        };

        Ok(rdata)
    }
}

impl SvcParam {
    /// # Errors
    ///
    /// If the parameter is cut short, or a known key carries a
    /// payload of the wrong shape.
    pub fn deserialise(id: u16, parser: &mut Parser<'_>) -> Result<Self, FormError> {
        let too_short = FormError::RecordTooShort(id);
        let key = parser.next_u16().ok_or(too_short)?;
        let len = parser.next_u16().ok_or(too_short)?;
        let value = parser.take(len.into()).ok_or(too_short)?;

        match key {
            3 => {
                if value.len() != 2 {
                    return Err(FormError::RecordInvalid(id));
                }
                Ok(SvcParam::Port(u16::from_be_bytes([value[0], value[1]])))
            }
            4 => {
                if value.is_empty() || value.len() % 4 != 0 {
                    return Err(FormError::RecordInvalid(id));
                }
                let addresses = value
                    .chunks_exact(4)
                    .map(|c| Ipv4Addr::new(c[0], c[1], c[2], c[3]))
                    .collect();
                Ok(SvcParam::Ipv4Hint(addresses))
            }
            6 => {
                if value.is_empty() || value.len() % 16 != 0 {
                    return Err(FormError::RecordInvalid(id));
                }
                let addresses = value
                    .chunks_exact(16)
                    .map(|c| {
                        let mut bs = [0; 16];
                        bs.copy_from_slice(c);
                        Ipv6Addr::from(bs)
                    })
                    .collect();
                Ok(SvcParam::Ipv6Hint(addresses))
            }
            key => Ok(SvcParam::Unknown {
                key,
                value: value.to_vec(),
            }),
        }
    }
}
