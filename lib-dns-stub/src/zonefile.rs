//! Master-file (zone file) parsing, RFC 1035 section 5.
//!
//! Supports the standard presentation syntax: `;` comments,
//! parentheses continuing a record across lines, quoted strings,
//! escapes, `@` for the origin, blank owners repeating the previous
//! one, and the `$ORIGIN`, `$TTL`, and `$GENERATE` directives.
//! `$INCLUDE` is recognised and refused: pulling other files in would
//! drag filesystem policy into a text parser.

use std::fmt;

use dns_wire::message::types::{RdataClass, RdataType, RecordData, ResourceRecord, SvcParam};
use dns_wire::name::{Name, NameError};
use dns_wire::ttl::{self, BadTtl};

/// What a zone file parses into.
#[derive(Debug, Clone)]
pub struct ParsedZone {
    /// The origin in effect at the end of the file.
    pub origin: Option<Name>,
    pub records: Vec<ResourceRecord>,
}

/// A zone file could not be parsed.  Every variant carries the line
/// the problem was found on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ZoneFileError {
    UnbalancedParentheses { line: usize },
    UnterminatedString { line: usize },
    /// An indented record with no previous owner to inherit.
    MissingOwner { line: usize },
    /// No TTL on the record, no `$TTL`, and no previous record.
    MissingTtl { line: usize },
    /// A relative name with no origin in effect.
    NoOrigin { line: usize },
    UnknownType { line: usize, text: String },
    UnknownDirective { line: usize, text: String },
    IncludeNotSupported { line: usize },
    BadName { line: usize, error: NameError },
    BadTtl { line: usize, error: BadTtl },
    BadRdata { line: usize, reason: String },
    BadGenerate { line: usize, reason: String },
}

impl ZoneFileError {
    pub fn line(&self) -> usize {
        match self {
            ZoneFileError::UnbalancedParentheses { line }
            | ZoneFileError::UnterminatedString { line }
            | ZoneFileError::MissingOwner { line }
            | ZoneFileError::MissingTtl { line }
            | ZoneFileError::NoOrigin { line }
            | ZoneFileError::UnknownType { line, .. }
            | ZoneFileError::UnknownDirective { line, .. }
            | ZoneFileError::IncludeNotSupported { line }
            | ZoneFileError::BadName { line, .. }
            | ZoneFileError::BadTtl { line, .. }
            | ZoneFileError::BadRdata { line, .. }
            | ZoneFileError::BadGenerate { line, .. } => *line,
        }
    }
}

impl fmt::Display for ZoneFileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}: ", self.line())?;
        match self {
            ZoneFileError::UnbalancedParentheses { .. } => write!(f, "unbalanced parentheses"),
            ZoneFileError::UnterminatedString { .. } => write!(f, "unterminated string"),
            ZoneFileError::MissingOwner { .. } => write!(f, "no owner name to continue from"),
            ZoneFileError::MissingTtl { .. } => write!(f, "no TTL and no $TTL default"),
            ZoneFileError::NoOrigin { .. } => write!(f, "relative name with no origin"),
            ZoneFileError::UnknownType { text, .. } => write!(f, "unknown record type '{text}'"),
            ZoneFileError::UnknownDirective { text, .. } => {
                write!(f, "unknown directive '{text}'")
            }
            ZoneFileError::IncludeNotSupported { .. } => {
                write!(f, "'$INCLUDE' directive not supported")
            }
            ZoneFileError::BadName { error, .. } => write!(f, "bad name: {error}"),
            ZoneFileError::BadTtl { error, .. } => write!(f, "bad TTL: {error}"),
            ZoneFileError::BadRdata { reason, .. } => write!(f, "bad rdata: {reason}"),
            ZoneFileError::BadGenerate { reason, .. } => write!(f, "bad $GENERATE: {reason}"),
        }
    }
}

impl std::error::Error for ZoneFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Parse zone file text.  *origin* seeds the `@`/relative-name
/// handling and can be overridden by `$ORIGIN` inside the text.
///
/// # Errors
///
/// See [`ZoneFileError`].
pub fn parse(text: &str, origin: Option<&Name>) -> Result<ParsedZone, ZoneFileError> {
    let mut state = State {
        origin: origin.cloned(),
        default_ttl: None,
        previous_owner: None,
        previous_ttl: None,
    };
    let mut records = Vec::new();

    for entry in split_entries(text)? {
        let first = entry.tokens[0].as_str();
        if let Some(directive) = first.strip_prefix('$') {
            match directive.to_ascii_uppercase().as_str() {
                "ORIGIN" => {
                    let token = entry.argument(1)?;
                    let name = Name::from_text(token, state.origin.as_ref())
                        .map_err(|error| ZoneFileError::BadName { line: entry.line, error })?;
                    if !name.is_absolute() {
                        return Err(ZoneFileError::NoOrigin { line: entry.line });
                    }
                    state.origin = Some(name);
                }
                "TTL" => {
                    let token = entry.argument(1)?;
                    state.default_ttl = Some(ttl::from_text(token).map_err(|error| {
                        ZoneFileError::BadTtl { line: entry.line, error }
                    })?);
                }
                "INCLUDE" => {
                    return Err(ZoneFileError::IncludeNotSupported { line: entry.line })
                }
                "GENERATE" => expand_generate(&entry, &mut state, &mut records)?,
                _ => {
                    return Err(ZoneFileError::UnknownDirective {
                        line: entry.line,
                        text: first.to_string(),
                    })
                }
            }
        } else {
            records.push(parse_record(
                &entry.tokens,
                entry.owner_on_line,
                entry.line,
                &mut state,
            )?);
        }
    }

    Ok(ParsedZone {
        origin: state.origin,
        records,
    })
}

struct State {
    origin: Option<Name>,
    default_ttl: Option<u32>,
    previous_owner: Option<Name>,
    previous_ttl: Option<u32>,
}

struct Entry {
    line: usize,
    owner_on_line: bool,
    tokens: Vec<String>,
}

impl Entry {
    fn argument(&self, index: usize) -> Result<&str, ZoneFileError> {
        self.tokens
            .get(index)
            .map(String::as_str)
            .ok_or(ZoneFileError::BadRdata {
                line: self.line,
                reason: "missing argument".to_string(),
            })
    }
}

/// Split the text into logical entries: tokens grouped by line, with
/// parentheses continuing an entry across lines and comments
/// stripped.
fn split_entries(text: &str) -> Result<Vec<Entry>, ZoneFileError> {
    let mut entries = Vec::new();
    let mut current: Option<Entry> = None;
    let mut depth = 0usize;
    let mut last_line = 0;

    for (index, line) in text.lines().enumerate() {
        let lineno = index + 1;
        last_line = lineno;
        let starts_flush = line.chars().next().is_some_and(|c| !c.is_whitespace());
        let mut chars = line.chars().peekable();

        loop {
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            let Some(&c) = chars.peek() else { break };

            if c == ';' {
                break;
            }
            if c == '(' {
                chars.next();
                depth += 1;
                continue;
            }
            if c == ')' {
                chars.next();
                depth = depth
                    .checked_sub(1)
                    .ok_or(ZoneFileError::UnbalancedParentheses { line: lineno })?;
                continue;
            }

            let token = if c == '"' {
                chars.next();
                let mut token = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => {
                            token.push('\\');
                            match chars.next() {
                                Some(escaped) => token.push(escaped),
                                None => {
                                    return Err(ZoneFileError::UnterminatedString {
                                        line: lineno,
                                    })
                                }
                            }
                        }
                        Some(other) => token.push(other),
                        None => {
                            return Err(ZoneFileError::UnterminatedString { line: lineno })
                        }
                    }
                }
                token
            } else {
                let mut token = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == ';' || c == '"' {
                        break;
                    }
                    chars.next();
                    if c == '\\' {
                        token.push('\\');
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    } else {
                        token.push(c);
                    }
                }
                token
            };

            match &mut current {
                Some(entry) => entry.tokens.push(token),
                None => {
                    current = Some(Entry {
                        line: lineno,
                        owner_on_line: starts_flush,
                        tokens: vec![token],
                    });
                }
            }
        }

        if depth == 0 {
            if let Some(entry) = current.take() {
                if !entry.tokens.is_empty() {
                    entries.push(entry);
                }
            }
        }
    }

    if depth != 0 {
        return Err(ZoneFileError::UnbalancedParentheses { line: last_line });
    }
    Ok(entries)
}

fn parse_record(
    tokens: &[String],
    owner_on_line: bool,
    line: usize,
    state: &mut State,
) -> Result<ResourceRecord, ZoneFileError> {
    let mut index = 0;
    let owner = if owner_on_line {
        index = 1;
        let name = Name::from_text(&tokens[0], state.origin.as_ref())
            .map_err(|error| ZoneFileError::BadName { line, error })?;
        if !name.is_absolute() {
            return Err(ZoneFileError::NoOrigin { line });
        }
        name
    } else {
        state
            .previous_owner
            .clone()
            .ok_or(ZoneFileError::MissingOwner { line })?
    };

    // an optional TTL and an optional class, in either order
    let mut record_ttl = None;
    let mut rdclass = RdataClass::IN;
    while let Some(token) = tokens.get(index) {
        if record_ttl.is_none() && token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            if let Ok(value) = ttl::from_text(token) {
                record_ttl = Some(value);
                index += 1;
                continue;
            }
        }
        if let Ok(class) = token.parse::<RdataClass>() {
            if !class.is_metaclass() {
                rdclass = class;
                index += 1;
                continue;
            }
        }
        break;
    }

    let type_token = tokens.get(index).ok_or(ZoneFileError::BadRdata {
        line,
        reason: "record has no type".to_string(),
    })?;
    let rdtype: RdataType = type_token.parse().map_err(|_| ZoneFileError::UnknownType {
        line,
        text: type_token.clone(),
    })?;
    if rdtype.is_metatype() {
        return Err(ZoneFileError::UnknownType {
            line,
            text: type_token.clone(),
        });
    }
    index += 1;

    let ttl = record_ttl
        .or(state.default_ttl)
        .or(state.previous_ttl)
        .ok_or(ZoneFileError::MissingTtl { line })?;

    let rdata = parse_rdata(rdtype, &tokens[index..], state.origin.as_ref(), line)?;

    state.previous_owner = Some(owner.clone());
    state.previous_ttl = Some(ttl);
    Ok(ResourceRecord {
        name: owner,
        rdata,
        rclass: rdclass,
        ttl,
    })
}

fn parse_rdata(
    rdtype: RdataType,
    tokens: &[String],
    origin: Option<&Name>,
    line: usize,
) -> Result<RecordData, ZoneFileError> {
    let bad = |reason: &str| ZoneFileError::BadRdata {
        line,
        reason: reason.to_string(),
    };
    let arg = |index: usize| {
        tokens
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| bad("too few fields"))
    };
    let exactly = |count: usize| {
        if tokens.len() == count {
            Ok(())
        } else {
            Err(bad("wrong number of fields"))
        }
    };
    let name_arg = |index: usize| -> Result<Name, ZoneFileError> {
        let name = Name::from_text(arg(index)?, origin)
            .map_err(|error| ZoneFileError::BadName { line, error })?;
        if name.is_absolute() {
            Ok(name)
        } else {
            Err(ZoneFileError::NoOrigin { line })
        }
    };
    let ttl_arg = |index: usize| -> Result<u32, ZoneFileError> {
        ttl::from_text(arg(index)?).map_err(|error| ZoneFileError::BadTtl { line, error })
    };

    // RFC 3597 generic syntax works for any type
    if tokens.first().map(String::as_str) == Some("\\#") {
        let length: usize = arg(1)?.parse().map_err(|_| bad("bad generic length"))?;
        let mut octets = Vec::with_capacity(length);
        let hex: String = tokens[2..].concat();
        if hex.len() % 2 != 0 {
            return Err(bad("odd number of hex digits"));
        }
        for pair in hex.as_bytes().chunks_exact(2) {
            let high = (pair[0] as char).to_digit(16).ok_or_else(|| bad("bad hex digit"))?;
            let low = (pair[1] as char).to_digit(16).ok_or_else(|| bad("bad hex digit"))?;
            octets.push((high * 16 + low) as u8);
        }
        if octets.len() != length {
            return Err(bad("generic length does not match the data"));
        }
        return Ok(RecordData::Opaque {
            rtype: rdtype,
            octets,
        });
    }

    match rdtype {
        RdataType::A => {
            exactly(1)?;
            let address = arg(0)?.parse().map_err(|_| bad("bad IPv4 address"))?;
            Ok(RecordData::A { address })
        }
        RdataType::AAAA => {
            exactly(1)?;
            let address = arg(0)?.parse().map_err(|_| bad("bad IPv6 address"))?;
            Ok(RecordData::Aaaa { address })
        }
        RdataType::NS => {
            exactly(1)?;
            Ok(RecordData::Ns { nsdname: name_arg(0)? })
        }
        RdataType::CNAME => {
            exactly(1)?;
            Ok(RecordData::Cname { cname: name_arg(0)? })
        }
        RdataType::PTR => {
            exactly(1)?;
            Ok(RecordData::Ptr { ptrdname: name_arg(0)? })
        }
        RdataType::MX => {
            exactly(2)?;
            let preference = arg(0)?.parse().map_err(|_| bad("bad preference"))?;
            Ok(RecordData::Mx {
                preference,
                exchange: name_arg(1)?,
            })
        }
        RdataType::TXT => {
            if tokens.is_empty() {
                return Err(bad("TXT needs at least one string"));
            }
            let mut octets = Vec::new();
            for token in tokens {
                let bytes = unescape(token).map_err(|()| bad("bad escape"))?;
                if bytes.len() > 255 {
                    return Err(bad("string over 255 octets"));
                }
                octets.push(bytes.len() as u8);
                octets.extend_from_slice(&bytes);
            }
            Ok(RecordData::Txt { octets })
        }
        RdataType::SOA => {
            exactly(7)?;
            Ok(RecordData::Soa {
                mname: name_arg(0)?,
                rname: name_arg(1)?,
                serial: arg(2)?.parse().map_err(|_| bad("bad serial"))?,
                refresh: ttl_arg(3)?,
                retry: ttl_arg(4)?,
                expire: ttl_arg(5)?,
                minimum: ttl_arg(6)?,
            })
        }
        RdataType::SRV => {
            exactly(4)?;
            Ok(RecordData::Srv {
                priority: arg(0)?.parse().map_err(|_| bad("bad priority"))?,
                weight: arg(1)?.parse().map_err(|_| bad("bad weight"))?,
                port: arg(2)?.parse().map_err(|_| bad("bad port"))?,
                target: name_arg(3)?,
            })
        }
        RdataType::SVCB => {
            let priority = arg(0)?.parse().map_err(|_| bad("bad priority"))?;
            let target = name_arg(1)?;
            let mut params = Vec::new();
            for token in &tokens[2..] {
                params.push(parse_svc_param(token, line)?);
            }
            Ok(RecordData::Svcb {
                priority,
                target,
                params,
            })
        }
        other => Err(ZoneFileError::UnknownType {
            line,
            text: other.to_string(),
        }),
    }
}

fn parse_svc_param(token: &str, line: usize) -> Result<SvcParam, ZoneFileError> {
    let bad = |reason: &str| ZoneFileError::BadRdata {
        line,
        reason: reason.to_string(),
    };
    let (key, value) = match token.split_once('=') {
        Some((key, value)) => (key, value),
        None => (token, ""),
    };
    match key {
        "port" => Ok(SvcParam::Port(
            value.parse().map_err(|_| bad("bad port parameter"))?,
        )),
        "ipv4hint" => {
            let mut addresses = Vec::new();
            for piece in value.split(',') {
                addresses.push(piece.parse().map_err(|_| bad("bad ipv4hint"))?);
            }
            Ok(SvcParam::Ipv4Hint(addresses))
        }
        "ipv6hint" => {
            let mut addresses = Vec::new();
            for piece in value.split(',') {
                addresses.push(piece.parse().map_err(|_| bad("bad ipv6hint"))?);
            }
            Ok(SvcParam::Ipv6Hint(addresses))
        }
        "alpn" => {
            let mut encoded = Vec::new();
            for piece in value.split(',') {
                if piece.is_empty() || piece.len() > 255 {
                    return Err(bad("bad alpn"));
                }
                encoded.push(piece.len() as u8);
                encoded.extend_from_slice(piece.as_bytes());
            }
            Ok(SvcParam::Unknown {
                key: 1,
                value: encoded,
            })
        }
        "no-default-alpn" => Ok(SvcParam::Unknown {
            key: 2,
            value: Vec::new(),
        }),
        other => {
            if let Some(number) = other.strip_prefix("key") {
                let key = number.parse().map_err(|_| bad("bad parameter key"))?;
                Ok(SvcParam::Unknown {
                    key,
                    value: value.as_bytes().to_vec(),
                })
            } else {
                Err(bad("unknown service parameter"))
            }
        }
    }
}

/// The `$GENERATE range lhs [ttl] [class] type rhs` directive.
fn expand_generate(
    entry: &Entry,
    state: &mut State,
    records: &mut Vec<ResourceRecord>,
) -> Result<(), ZoneFileError> {
    let line = entry.line;
    let bad = |reason: &str| ZoneFileError::BadGenerate {
        line,
        reason: reason.to_string(),
    };

    if entry.tokens.len() < 4 {
        return Err(bad("too few fields"));
    }

    let range = &entry.tokens[1];
    let (bounds, step) = match range.split_once('/') {
        Some((bounds, step)) => (
            bounds,
            step.parse::<u64>().map_err(|_| bad("bad step"))?,
        ),
        None => (range.as_str(), 1),
    };
    if step == 0 {
        return Err(bad("step cannot be zero"));
    }
    let (start, stop) = bounds.split_once('-').ok_or_else(|| bad("bad range"))?;
    let start: u64 = start.parse().map_err(|_| bad("bad range start"))?;
    let stop: u64 = stop.parse().map_err(|_| bad("bad range stop"))?;
    if stop < start {
        return Err(bad("range stop before start"));
    }

    let lhs = &entry.tokens[2];
    let rest = &entry.tokens[3..];

    let mut index = start;
    while index <= stop {
        let mut tokens = Vec::with_capacity(rest.len() + 1);
        tokens.push(substitute(lhs, index, line)?);
        for token in rest {
            tokens.push(substitute(token, index, line)?);
        }
        records.push(parse_record(&tokens, true, line, state)?);
        match index.checked_add(step) {
            Some(next) => index = next,
            None => break,
        }
    }
    Ok(())
}

/// `$GENERATE` substitution: `$` is the index, `${offset[,width[,base]]}`
/// formats it, `$$` is a literal dollar sign.
fn substitute(template: &str, index: u64, line: usize) -> Result<String, ZoneFileError> {
    let bad = |reason: &str| ZoneFileError::BadGenerate {
        line,
        reason: reason.to_string(),
    };

    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let mut spec = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => spec.push(c),
                        None => return Err(bad("unterminated ${...}")),
                    }
                }
                let parts: Vec<&str> = spec.split(',').collect();
                if parts.len() > 3 {
                    return Err(bad("too many modifiers"));
                }
                let offset: i64 = if parts[0].is_empty() {
                    0
                } else {
                    parts[0].parse().map_err(|_| bad("bad offset"))?
                };
                let width: usize = match parts.get(1) {
                    Some(w) if !w.is_empty() => w.parse().map_err(|_| bad("bad width"))?,
                    _ => 0,
                };
                let value = i64::try_from(index)
                    .ok()
                    .and_then(|i| i.checked_add(offset))
                    .ok_or_else(|| bad("index overflow"))?;
                if value < 0 {
                    return Err(bad("index underflow"));
                }
                let formatted = match parts.get(2).copied().unwrap_or("d") {
                    "d" => format!("{value:0width$}"),
                    "o" => format!("{value:0width$o}"),
                    "x" => format!("{value:0width$x}"),
                    "X" => format!("{value:0width$X}"),
                    _ => return Err(bad("bad base")),
                };
                out.push_str(&formatted);
            }
            _ => out.push_str(&index.to_string()),
        }
    }
    Ok(out)
}

/// Undo presentation escapes: `\c` is a literal character and `\DDD`
/// a decimal octet.
fn unescape(token: &str) -> Result<Vec<u8>, ()> {
    let mut out = Vec::new();
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            if !c.is_ascii() {
                return Err(());
            }
            out.push(c as u8);
            continue;
        }
        match chars.next() {
            Some(d) if d.is_ascii_digit() => {
                let mut value = d.to_digit(10).ok_or(())?;
                for _ in 0..2 {
                    let digit = chars.next().and_then(|c| c.to_digit(10)).ok_or(())?;
                    value = value * 10 + digit;
                }
                if value > 255 {
                    return Err(());
                }
                out.push(value as u8);
            }
            Some(c) if c.is_ascii() => out.push(c as u8),
            _ => return Err(()),
        }
    }
    Ok(out)
}
