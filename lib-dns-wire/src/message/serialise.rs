//! Serialisation of DNS messages to the wire format, without name
//! compression.  The `renderer` module is the compressing path.

use crate::edns;
use crate::message::types::*;
use crate::name::{CompressTable, Name, NameError};

/// Errors encountered when serialising a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SerialiseError {
    /// A section has more than 65535 entries.
    CounterTooLarge { counter: usize },

    /// A name could not be written, e.g. a relative name with no
    /// origin to complete it.
    Name(NameError),

    /// An RDATA is over 65535 octets.
    RdataTooLong { length: usize },
}

impl std::fmt::Display for SerialiseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SerialiseError::CounterTooLarge { counter } => {
                write!(f, "'{counter}' cannot be converted to a u16")
            }
            SerialiseError::Name(err) => write!(f, "cannot write name: {err}"),
            SerialiseError::RdataTooLong { length } => {
                write!(f, "rdata of {length} octets does not fit in a record")
            }
        }
    }
}

impl std::error::Error for SerialiseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<NameError> for SerialiseError {
    fn from(err: NameError) -> Self {
        SerialiseError::Name(err)
    }
}

impl Message {
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed).
    pub fn to_octets(&self) -> Result<Vec<u8>, SerialiseError> {
        let mut buf = Vec::with_capacity(512);

        buf.extend_from_slice(&self.header.id.to_be_bytes());
        buf.extend_from_slice(&self.header.flags().to_be_bytes());
        buf.extend_from_slice(&usize_to_u16(self.questions.len())?.to_be_bytes());
        buf.extend_from_slice(&usize_to_u16(self.answers.len())?.to_be_bytes());
        buf.extend_from_slice(&usize_to_u16(self.authority.len())?.to_be_bytes());
        buf.extend_from_slice(&usize_to_u16(self.additional.len())?.to_be_bytes());

        for question in &self.questions {
            question.serialise(&mut buf)?;
        }
        for rr in &self.answers {
            rr.serialise(&mut buf)?;
        }
        for rr in &self.authority {
            rr.serialise(&mut buf)?;
        }
        for rr in &self.additional {
            rr.serialise(&mut buf)?;
        }

        Ok(buf)
    }
}

impl Question {
    /// # Errors
    ///
    /// If the name cannot be written.
    pub fn serialise(&self, buf: &mut Vec<u8>) -> Result<(), SerialiseError> {
        self.name.to_wire(buf, None, None, false)?;
        buf.extend_from_slice(&u16::from(self.rdtype).to_be_bytes());
        buf.extend_from_slice(&u16::from(self.rdclass).to_be_bytes());
        Ok(())
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the RDATA is too long or a name cannot be written.
    pub fn serialise(&self, buf: &mut Vec<u8>) -> Result<(), SerialiseError> {
        self.name.to_wire(buf, None, None, false)?;
        buf.extend_from_slice(&u16::from(self.rtype()).to_be_bytes());
        buf.extend_from_slice(&u16::from(self.rclass).to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());

        // filled in below
        let rdlength_index = buf.len();
        buf.extend_from_slice(&[0, 0]);

        self.rdata.serialise(buf, None)?;

        let rdlength = buf.len() - rdlength_index - 2;
        if rdlength > usize::from(u16::MAX) {
            return Err(SerialiseError::RdataTooLong { length: rdlength });
        }
        let [hi, lo] = (rdlength as u16).to_be_bytes();
        buf[rdlength_index] = hi;
        buf[rdlength_index + 1] = lo;

        Ok(())
    }
}

impl RecordData {
    /// Write the RDATA.  When a compression table is given, names in
    /// the RDATA of the RFC 1035 types are compressed against it;
    /// newer types always carry uncompressed names.
    ///
    /// # Errors
    ///
    /// If a name cannot be written.
    pub fn serialise(
        &self,
        buf: &mut Vec<u8>,
        mut compress: Option<&mut CompressTable>,
    ) -> Result<(), NameError> {
        match self {
            RecordData::A { address } => buf.extend_from_slice(&address.octets()),
            RecordData::Ns { nsdname } => {
                nsdname.to_wire(buf, compress.as_deref_mut(), None, false)?;
            }
            RecordData::Cname { cname } => {
                cname.to_wire(buf, compress.as_deref_mut(), None, false)?;
            }
            RecordData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                mname.to_wire(buf, compress.as_deref_mut(), None, false)?;
                rname.to_wire(buf, compress.as_deref_mut(), None, false)?;
                buf.extend_from_slice(&serial.to_be_bytes());
                buf.extend_from_slice(&refresh.to_be_bytes());
                buf.extend_from_slice(&retry.to_be_bytes());
                buf.extend_from_slice(&expire.to_be_bytes());
                buf.extend_from_slice(&minimum.to_be_bytes());
            }
            RecordData::Ptr { ptrdname } => {
                ptrdname.to_wire(buf, compress.as_deref_mut(), None, false)?;
            }
            RecordData::Mx {
                preference,
                exchange,
            } => {
                buf.extend_from_slice(&preference.to_be_bytes());
                exchange.to_wire(buf, compress.as_deref_mut(), None, false)?;
            }
            RecordData::Txt { octets } => buf.extend_from_slice(octets),
            RecordData::Aaaa { address } => buf.extend_from_slice(&address.octets()),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                buf.extend_from_slice(&priority.to_be_bytes());
                buf.extend_from_slice(&weight.to_be_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
                target.to_wire(buf, None, None, false)?;
            }
            RecordData::Svcb {
                priority,
                target,
                params,
            } => {
                buf.extend_from_slice(&priority.to_be_bytes());
                target.to_wire(buf, None, None, false)?;
                for param in params {
                    param.serialise(buf);
                }
            }
            RecordData::Opt { options } => edns::encode_options(options, buf),
            RecordData::Opaque { octets, .. } => buf.extend_from_slice(octets),
        }
        Ok(())
    }
}

impl SvcParam {
    pub fn serialise(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.key().to_be_bytes());
        match self {
            SvcParam::Port(port) => {
                buf.extend_from_slice(&2u16.to_be_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            SvcParam::Ipv4Hint(addresses) => {
                buf.extend_from_slice(&((addresses.len() * 4) as u16).to_be_bytes());
                for address in addresses {
                    buf.extend_from_slice(&address.octets());
                }
            }
            SvcParam::Ipv6Hint(addresses) => {
                buf.extend_from_slice(&((addresses.len() * 16) as u16).to_be_bytes());
                for address in addresses {
                    buf.extend_from_slice(&address.octets());
                }
            }
            SvcParam::Unknown { value, .. } => {
                buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
                buf.extend_from_slice(value);
            }
        }
    }
}

fn usize_to_u16(counter: usize) -> Result<u16, SerialiseError> {
    u16::try_from(counter).map_err(|_| SerialiseError::CounterTooLarge { counter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::types::test_util::*;
    use crate::rcode::Rcode;

    #[test]
    #[rustfmt::skip]
    fn serialise_sets_rdlength() {
        let rr = ResourceRecord {
            name: name("www.example.com."),
            rdata: RecordData::Mx {
                preference: 32,
                exchange: name("mx.example.com."),
            },
            rclass: RdataClass::IN,
            ttl: 300,
        };
        let mut buf = Vec::new();
        rr.serialise(&mut buf).unwrap();

        assert_eq!(
            vec![
                // NAME
                3, 119, 119, 119, // "www"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
                // TYPE
                0, 15, // MX
                // CLASS
                0, 1, // IN
                // TTL
                0, 0, 1, 0b0010_1100, // 300
                // RDLENGTH
                0, 18,
                // RDATA
                0, 32, // preference
                2, 109, 120, // "mx"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
            ],
            buf,
        );
    }

    #[test]
    fn message_round_trips() {
        let mut message = Message::from_question(
            1234,
            Question {
                name: name("www.example.com."),
                rdtype: RdataType::A,
                rdclass: RdataClass::IN,
            },
        )
        .make_response();
        message.answers = vec![a_record("www.example.com.", "1.2.3.4")];
        message.authority = vec![soa_record("example.com.", 2024010101)];
        message.additional = vec![
            aaaa_record("www.example.com.", "2001:db8::1"),
            ResourceRecord {
                name: name("_dns.example.com."),
                rdata: RecordData::Svcb {
                    priority: 1,
                    target: name("dot.example.com."),
                    params: vec![
                        SvcParam::Port(853),
                        SvcParam::Ipv4Hint(vec!["9.9.9.9".parse().unwrap()]),
                    ],
                },
                rclass: RdataClass::IN,
                ttl: 300,
            },
        ];

        let octets = message.to_octets().unwrap();
        assert_eq!(Ok(message), Message::from_octets(&octets));
    }

    #[test]
    fn opt_round_trips_with_extended_rcode() {
        let mut message = Message::from_question(
            77,
            Question {
                name: name("example.com."),
                rdtype: RdataType::A,
                rdclass: RdataClass::IN,
            },
        );
        let (hdr, ednsflags) = Rcode::BadVers.to_flags();
        message.header.rcode = Rcode::from(hdr);
        message.additional.push(opt_record(1232, ednsflags));

        let octets = message.to_octets().unwrap();
        let parsed = Message::from_octets(&octets).unwrap();
        assert_eq!(Rcode::BadVers, parsed.extended_rcode());
        assert_eq!(message, parsed);
    }
}
