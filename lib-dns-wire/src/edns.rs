//! EDNS(0) support: the OPT pseudo-record layout and its option
//! list.  See RFC 6891.
//!
//! On the wire an OPT record borrows the fixed resource-record
//! fields: the owner is the root name, the class carries the
//! requestor's UDP payload size, and the TTL packs the extended
//! rcode, the EDNS version, and the EDNS flags:
//!
//! ```text
//!     +------------+--------------+------------------------------+
//!     | EXT-RCODE  |   VERSION    |  DO |        Z               |
//!     +------------+--------------+------------------------------+
//! ```

use std::fmt;

/// The payload size advertised by default.  1232 avoids IPv6
/// fragmentation on common paths.
pub const DEFAULT_PAYLOAD: u16 = 1232;

/// The DO ("DNSSEC OK") bit within the OPT TTL.
pub const DO: u32 = 0x0000_8000;

/// Option code for message padding, RFC 7830.
pub const OPTION_PADDING: u16 = 12;

/// A single EDNS option: a code and its uninterpreted payload.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

/// The fixed fields of an OPT record, plus its options, in a form
/// convenient for building queries.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Opt {
    /// Requestor's maximum UDP payload size (the wire-format class).
    pub payload: u16,
    /// The wire-format TTL: extended rcode, version, and flags.
    pub ttl: u32,
    pub options: Vec<EdnsOption>,
}

impl Opt {
    pub fn new(version: u8, ednsflags: u32, payload: u16, options: Vec<EdnsOption>) -> Self {
        let ttl = (ednsflags & 0xff00_ffff) | (u32::from(version) << 16);
        Self {
            payload,
            ttl,
            options,
        }
    }

    pub fn version(&self) -> u8 {
        ((self.ttl >> 16) & 0xff) as u8
    }
}

/// An option list ended with a truncated option.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OptionsTooShort;

impl fmt::Display for OptionsTooShort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EDNS option list ends with an incomplete option")
    }
}

impl std::error::Error for OptionsTooShort {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Append the wire form of an option list to *buf*.
pub fn encode_options(options: &[EdnsOption], buf: &mut Vec<u8>) {
    for option in options {
        buf.extend_from_slice(&option.code.to_be_bytes());
        buf.extend_from_slice(&(option.data.len() as u16).to_be_bytes());
        buf.extend_from_slice(&option.data);
    }
}

/// Parse an OPT record's RDATA into its option list.
///
/// # Errors
///
/// If an option header or payload is cut short.
pub fn decode_options(mut octets: &[u8]) -> Result<Vec<EdnsOption>, OptionsTooShort> {
    let mut options = Vec::new();
    while !octets.is_empty() {
        if octets.len() < 4 {
            return Err(OptionsTooShort);
        }
        let code = u16::from_be_bytes([octets[0], octets[1]]);
        let len = usize::from(u16::from_be_bytes([octets[2], octets[3]]));
        if octets.len() < 4 + len {
            return Err(OptionsTooShort);
        }
        options.push(EdnsOption {
            code,
            data: octets[4..4 + len].to_vec(),
        });
        octets = &octets[4 + len..];
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_round_trip() {
        let options = vec![
            EdnsOption {
                code: 10,
                data: vec![1, 2, 3, 4],
            },
            EdnsOption {
                code: OPTION_PADDING,
                data: vec![0; 8],
            },
        ];
        let mut buf = Vec::new();
        encode_options(&options, &mut buf);
        assert_eq!(Ok(options), decode_options(&buf));
    }

    #[test]
    fn truncated_options_are_rejected() {
        assert_eq!(Err(OptionsTooShort), decode_options(&[0, 10, 0, 5, 1]));
        assert_eq!(Err(OptionsTooShort), decode_options(&[0, 10]));
    }

    #[test]
    fn opt_packs_version() {
        let opt = Opt::new(0, DO, DEFAULT_PAYLOAD, Vec::new());
        assert_eq!(0, opt.version());
        assert_eq!(DO, opt.ttl);

        let opt = Opt::new(1, 0, 512, Vec::new());
        assert_eq!(1, opt.version());
        assert_eq!(0x0001_0000, opt.ttl);
    }
}
