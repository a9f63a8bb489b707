//! DNS response codes.
//!
//! An rcode is 12 bits wide: the low 4 bits live in the message
//! header flags, and the high 8 bits in the extended-rcode octet of
//! the EDNS OPT TTL.  See RFC 6891 section 6.1.3.

use std::fmt;
use std::str::FromStr;

/// A response code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Rcode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    YXDomain,
    YXRRSet,
    NXRRSet,
    NotAuth,
    NotZone,
    DSOTypeNI,
    BadVers,
    BadKey,
    BadTime,
    BadMode,
    BadName,
    BadAlg,
    BadTrunc,
    BadCookie,
    Unknown(UnknownRcode),
}

/// A struct with a private constructor, to ensure out-of-band
/// `Rcode`s cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UnknownRcode(u16);

/// An rcode does not fit in 12 bits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RcodeOutOfRange(pub u16);

impl fmt::Display for RcodeOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rcode {} is out of the 0..=4095 range", self.0)
    }
}

impl std::error::Error for RcodeOutOfRange {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl Rcode {
    /// Assemble the rcode encoded by the header flags and EDNS flags.
    pub fn from_flags(flags: u16, ednsflags: u32) -> Self {
        let value = (flags & 0x000f) | ((ednsflags >> 20) & 0x0ff0) as u16;
        Self::from(value)
    }

    /// The `(flags, ednsflags)` pair which encodes this rcode.  The
    /// values only cover the rcode bits; callers OR them into the
    /// full fields.
    pub fn to_flags(self) -> (u16, u32) {
        let value = u16::from(self);
        let flags = value & 0x000f;
        let ednsflags = u32::from(value & 0x0ff0) << 20;
        (flags, ednsflags)
    }

    /// Does this rcode need EDNS to be expressed?
    pub fn is_extended(self) -> bool {
        u16::from(self) > 0x000f
    }
}

impl From<u16> for Rcode {
    fn from(value: u16) -> Self {
        match value & 0x0fff {
            0 => Rcode::NoError,
            1 => Rcode::FormErr,
            2 => Rcode::ServFail,
            3 => Rcode::NxDomain,
            4 => Rcode::NotImp,
            5 => Rcode::Refused,
            6 => Rcode::YXDomain,
            7 => Rcode::YXRRSet,
            8 => Rcode::NXRRSet,
            9 => Rcode::NotAuth,
            10 => Rcode::NotZone,
            11 => Rcode::DSOTypeNI,
            16 => Rcode::BadVers,
            17 => Rcode::BadKey,
            18 => Rcode::BadTime,
            19 => Rcode::BadMode,
            20 => Rcode::BadName,
            21 => Rcode::BadAlg,
            22 => Rcode::BadTrunc,
            23 => Rcode::BadCookie,
            other => Rcode::Unknown(UnknownRcode(other)),
        }
    }
}

impl From<Rcode> for u16 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormErr => 1,
            Rcode::ServFail => 2,
            Rcode::NxDomain => 3,
            Rcode::NotImp => 4,
            Rcode::Refused => 5,
            Rcode::YXDomain => 6,
            Rcode::YXRRSet => 7,
            Rcode::NXRRSet => 8,
            Rcode::NotAuth => 9,
            Rcode::NotZone => 10,
            Rcode::DSOTypeNI => 11,
            Rcode::BadVers => 16,
            Rcode::BadKey => 17,
            Rcode::BadTime => 18,
            Rcode::BadMode => 19,
            Rcode::BadName => 20,
            Rcode::BadAlg => 21,
            Rcode::BadTrunc => 22,
            Rcode::BadCookie => 23,
            Rcode::Unknown(UnknownRcode(value)) => value,
        }
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rcode::NoError => write!(f, "NOERROR"),
            Rcode::FormErr => write!(f, "FORMERR"),
            Rcode::ServFail => write!(f, "SERVFAIL"),
            Rcode::NxDomain => write!(f, "NXDOMAIN"),
            Rcode::NotImp => write!(f, "NOTIMP"),
            Rcode::Refused => write!(f, "REFUSED"),
            Rcode::YXDomain => write!(f, "YXDOMAIN"),
            Rcode::YXRRSet => write!(f, "YXRRSET"),
            Rcode::NXRRSet => write!(f, "NXRRSET"),
            Rcode::NotAuth => write!(f, "NOTAUTH"),
            Rcode::NotZone => write!(f, "NOTZONE"),
            Rcode::DSOTypeNI => write!(f, "DSOTYPENI"),
            Rcode::BadVers => write!(f, "BADVERS"),
            Rcode::BadKey => write!(f, "BADKEY"),
            Rcode::BadTime => write!(f, "BADTIME"),
            Rcode::BadMode => write!(f, "BADMODE"),
            Rcode::BadName => write!(f, "BADNAME"),
            Rcode::BadAlg => write!(f, "BADALG"),
            Rcode::BadTrunc => write!(f, "BADTRUNC"),
            Rcode::BadCookie => write!(f, "BADCOOKIE"),
            Rcode::Unknown(UnknownRcode(value)) => write!(f, "{value}"),
        }
    }
}

/// An rcode mnemonic (or decimal form) is unknown or out of range.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UnknownRcodeText(pub String);

impl fmt::Display for UnknownRcodeText {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown rcode: {}", self.0)
    }
}

impl std::error::Error for UnknownRcodeText {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl FromStr for Rcode {
    type Err = UnknownRcodeText;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let known = [
            Rcode::NoError,
            Rcode::FormErr,
            Rcode::ServFail,
            Rcode::NxDomain,
            Rcode::NotImp,
            Rcode::Refused,
            Rcode::YXDomain,
            Rcode::YXRRSet,
            Rcode::NXRRSet,
            Rcode::NotAuth,
            Rcode::NotZone,
            Rcode::DSOTypeNI,
            Rcode::BadVers,
            Rcode::BadKey,
            Rcode::BadTime,
            Rcode::BadMode,
            Rcode::BadName,
            Rcode::BadAlg,
            Rcode::BadTrunc,
            Rcode::BadCookie,
        ];
        let upper = s.to_ascii_uppercase();
        for rcode in known {
            if rcode.to_string() == upper {
                return Ok(rcode);
            }
        }
        match upper.parse::<u16>() {
            Ok(value) if value <= 0x0fff => Ok(Self::from(value)),
            _ => Err(UnknownRcodeText(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_round_trip_whole_range() {
        for value in 0..=4095 {
            let rcode = Rcode::from(value);
            let (flags, ednsflags) = rcode.to_flags();
            assert_eq!(rcode, Rcode::from_flags(flags, ednsflags));
            assert_eq!(value, u16::from(rcode));
        }
    }

    #[test]
    fn badvers_splits_across_fields() {
        assert_eq!((0, 0x0100_0000), Rcode::BadVers.to_flags());
        assert_eq!(Rcode::BadVers, Rcode::from_flags(0, 0x0100_0000));
        assert!(Rcode::BadVers.is_extended());
        assert!(!Rcode::NxDomain.is_extended());
    }

    #[test]
    fn text_round_trips() {
        assert_eq!(Ok(Rcode::NxDomain), "NXDOMAIN".parse());
        assert_eq!(Ok(Rcode::NxDomain), "nxdomain".parse());
        assert_eq!(Ok(Rcode::from(42)), "42".parse());
        assert_eq!("4095", Rcode::from(4095).to_string());
        assert!("WHAT".parse::<Rcode>().is_err());
        assert!("5000".parse::<Rcode>().is_err());
    }
}
