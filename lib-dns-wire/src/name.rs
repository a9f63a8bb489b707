//! Domain names as immutable sequences of labels.
//!
//! A label is up to 63 octets of arbitrary bytes; a whole name is up
//! to 255 octets in wire form, including the length prefixes.  The
//! empty label may only appear at the end of a name, where it denotes
//! the DNS root and makes the name *absolute*.  A name with no labels
//! at all is the *empty* name, which is distinct from the root.
//!
//! Comparison, equality, and hashing are case-insensitive over ASCII:
//! a case-folded copy of the labels is made once at construction and
//! consulted by all of them, so the original spelling is preserved for
//! display but never influences ordering.
//!
//! See sections 2.3 and 3.1 of RFC 1035, and RFC 4034 section 6.1 for
//! the canonical ordering used by `successor` and `predecessor`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::wire::Parser;

/// Maximum length of a name in wire form, including length octets.
pub const MAX_WIRE_LEN: usize = 255;

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

/// The largest buffer offset which may be the target of a compression
/// pointer: offsets need to fit in 14 bits.
pub const MAX_COMPRESSION_OFFSET: usize = 0x3fff;

/// Compression state shared by every name written to one message:
/// maps a name suffix to the offset where it was first emitted.
pub type CompressTable = HashMap<Name, usize>;

/// How two names relate, as reported by [`Name::fullcompare`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NameRelation {
    /// No common ancestry (e.g. one name is absolute, the other not).
    None,
    /// The first name is a strict superdomain of the second.
    Superdomain,
    /// The first name is a strict subdomain of the second.
    Subdomain,
    /// The names are equal, ignoring case.
    Equal,
    /// The names share a suffix but neither contains the other.
    CommonAncestor,
}

/// Errors from constructing, parsing, or transforming names.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NameError {
    /// An empty label in a position other than the end of the name.
    EmptyLabel,
    /// A label is over 63 octets.
    LabelTooLong,
    /// A name is over 255 octets in wire form.
    NameTooLong,
    /// A malformed `\` escape in a textual name.
    BadEscape,
    /// A non-ASCII character in a textual name.
    NotAscii,
    /// A compression pointer which does not point strictly backwards.
    BadPointer,
    /// A label type other than `00` (label) or `11` (pointer).
    BadLabelType,
    /// The wire form ran out of octets mid-name.
    Incomplete,
    /// A relative name was used where an absolute name (or an origin)
    /// was required.
    NeedAbsoluteNameOrOrigin,
    /// An absolute name was used where a subdomain of the origin was
    /// required.
    NeedSubdomainOfOrigin,
    /// Something other than the empty name was appended to an
    /// absolute name.
    AbsoluteConcatenation,
    /// The root and the empty name have no parent.
    NoParent,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NameError::EmptyLabel => write!(f, "empty label"),
            NameError::LabelTooLong => write!(f, "label is over 63 octets"),
            NameError::NameTooLong => write!(f, "name is over 255 octets"),
            NameError::BadEscape => write!(f, "bad escape sequence"),
            NameError::NotAscii => write!(f, "name contains non-ASCII characters"),
            NameError::BadPointer => write!(f, "compression pointer does not point backwards"),
            NameError::BadLabelType => write!(f, "unknown label type"),
            NameError::Incomplete => write!(f, "name is incomplete"),
            NameError::NeedAbsoluteNameOrOrigin => {
                write!(f, "relative name without an absolute origin")
            }
            NameError::NeedSubdomainOfOrigin => {
                write!(f, "name is not a subdomain of the origin")
            }
            NameError::AbsoluteConcatenation => {
                write!(f, "cannot append to an absolute name")
            }
            NameError::NoParent => write!(f, "name has no parent"),
        }
    }
}

impl std::error::Error for NameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A domain name.
///
/// Instances are immutable and freely shareable.  `Eq`, `Ord`, and
/// `Hash` are all case-insensitive.
#[derive(Clone)]
pub struct Name {
    labels: Vec<Vec<u8>>,
    folded: Vec<Vec<u8>>,
}

impl Name {
    /// Make a name from a sequence of labels, validating the label
    /// and name length limits and the position of the empty label.
    ///
    /// # Errors
    ///
    /// If the labels do not form a valid name.
    pub fn new(labels: Vec<Vec<u8>>) -> Result<Self, NameError> {
        let mut total = 0;
        for (i, label) in labels.iter().enumerate() {
            if label.len() > MAX_LABEL_LEN {
                return Err(NameError::LabelTooLong);
            }
            if label.is_empty() && i != labels.len() - 1 {
                return Err(NameError::EmptyLabel);
            }
            total += label.len() + 1;
        }
        if total > MAX_WIRE_LEN {
            return Err(NameError::NameTooLong);
        }
        Ok(Self::from_labels_unchecked(labels))
    }

    /// The root name, a single empty label.
    pub fn root() -> Self {
        Self::from_labels_unchecked(vec![Vec::new()])
    }

    /// The empty name, no labels at all.
    pub fn empty() -> Self {
        Self::from_labels_unchecked(Vec::new())
    }

    fn from_labels_unchecked(labels: Vec<Vec<u8>>) -> Self {
        let folded = labels.iter().map(|l| l.to_ascii_lowercase()).collect();
        Self { labels, folded }
    }

    /// Parse the presentation format: labels separated by `.`, with
    /// `\c` escaping a literal character and `\DDD` a decimal octet.
    /// A trailing dot makes the name absolute, a lone `@` denotes the
    /// origin, and a relative result is concatenated with *origin*
    /// when one is given.
    ///
    /// # Errors
    ///
    /// If the text is not a well-formed name.
    pub fn from_text(text: &str, origin: Option<&Name>) -> Result<Self, NameError> {
        let text = if text == "@" { "" } else { text };

        let mut labels: Vec<Vec<u8>> = Vec::new();
        if !text.is_empty() {
            if text == "." {
                return Ok(Self::root());
            }

            let mut label: Vec<u8> = Vec::new();
            let mut escaping = false;
            let mut edigits = 0;
            let mut total: u32 = 0;
            for c in text.chars() {
                if !c.is_ascii() {
                    return Err(NameError::NotAscii);
                }
                let octet = c as u8;
                if escaping {
                    if c.is_ascii_digit() {
                        total = total * 10 + u32::from(octet - b'0');
                        edigits += 1;
                        if edigits == 3 {
                            if total > 255 {
                                return Err(NameError::BadEscape);
                            }
                            label.push(total as u8);
                            escaping = false;
                        }
                    } else if edigits == 0 {
                        label.push(octet);
                        escaping = false;
                    } else {
                        return Err(NameError::BadEscape);
                    }
                } else if octet == b'.' {
                    if label.is_empty() {
                        return Err(NameError::EmptyLabel);
                    }
                    labels.push(std::mem::take(&mut label));
                } else if octet == b'\\' {
                    escaping = true;
                    edigits = 0;
                    total = 0;
                } else {
                    label.push(octet);
                }
            }
            if escaping {
                return Err(NameError::BadEscape);
            }
            if label.is_empty() {
                // the text ended with an unescaped dot
                labels.push(Vec::new());
            } else {
                labels.push(label);
            }
        }

        let name = Self::new(labels)?;
        match origin {
            Some(origin) if !name.is_absolute() => name.concatenate(origin),
            _ => Ok(name),
        }
    }

    /// Render the presentation format, escaping the characters which
    /// need it.
    pub fn to_text(&self, omit_final_dot: bool) -> String {
        if self.labels.is_empty() {
            return "@".to_string();
        }
        if self.is_root() {
            return ".".to_string();
        }

        let labels = if omit_final_dot && self.is_absolute() {
            &self.labels[..self.labels.len() - 1]
        } else {
            &self.labels[..]
        };

        // the empty label of an absolute name contributes the final dot
        let mut out = String::new();
        for (i, label) in labels.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            escapify(label, &mut out);
        }
        out
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    /// The number of labels, counting the root label of an absolute
    /// name.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Is the most significant label of this name the root label?
    pub fn is_absolute(&self) -> bool {
        matches!(self.labels.last(), Some(label) if label.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.labels.len() == 1 && self.labels[0].is_empty()
    }

    /// Is the least significant label `*`?
    pub fn is_wild(&self) -> bool {
        matches!(self.labels.first(), Some(label) if label.as_slice() == b"*")
    }

    /// The length of the name in uncompressed wire form.
    pub fn wire_len(&self) -> usize {
        wire_len(&self.labels)
    }

    /// Compare this name with another, returning the relation between
    /// them, their ordering, and the number of trailing labels they
    /// share:
    ///
    /// ```text
    /// self           other          relation         order    nlabels
    /// =============  =============  ===============  =======  =======
    /// www.example.   www.example.   Equal            Equal    3
    /// www.example.   example.       Subdomain        Greater  2
    /// example.       www.example.   Superdomain      Less     2
    /// example1.com.  example2.com.  CommonAncestor   Less     2
    /// example1       example2.      None             Less     0
    /// example1.      example2       None             Greater  0
    /// ```
    ///
    /// Labels are compared from the most significant end, on their
    /// case-folded forms.  When one name is absolute and the other is
    /// not there is no common ancestry, and the absolute name sorts
    /// after the relative one.
    pub fn fullcompare(&self, other: &Name) -> (NameRelation, Ordering, usize) {
        let sabs = self.is_absolute();
        let oabs = other.is_absolute();
        if sabs != oabs {
            let order = if sabs { Ordering::Greater } else { Ordering::Less };
            return (NameRelation::None, order, 0);
        }

        let l1 = self.labels.len();
        let l2 = other.labels.len();
        let mut nlabels = 0;
        for i in 1..=l1.min(l2) {
            match self.folded[l1 - i].cmp(&other.folded[l2 - i]) {
                Ordering::Equal => nlabels += 1,
                order => {
                    let relation = if nlabels > 0 {
                        NameRelation::CommonAncestor
                    } else {
                        NameRelation::None
                    };
                    return (relation, order, nlabels);
                }
            }
        }

        match l1.cmp(&l2) {
            Ordering::Less => (NameRelation::Superdomain, Ordering::Less, nlabels),
            Ordering::Greater => (NameRelation::Subdomain, Ordering::Greater, nlabels),
            Ordering::Equal => (NameRelation::Equal, Ordering::Equal, nlabels),
        }
    }

    /// Is this name a subdomain of *other*?  Subdomain includes
    /// equality: every name is a subdomain of itself.
    pub fn is_subdomain(&self, other: &Name) -> bool {
        matches!(
            self.fullcompare(other).0,
            NameRelation::Subdomain | NameRelation::Equal
        )
    }

    /// Is this name a superdomain of *other*?  Also includes equality.
    pub fn is_superdomain(&self, other: &Name) -> bool {
        matches!(
            self.fullcompare(other).0,
            NameRelation::Superdomain | NameRelation::Equal
        )
    }

    /// A name equal to this one, in DNSSEC canonical (lowercase) form.
    pub fn canonicalize(&self) -> Name {
        Self {
            labels: self.folded.clone(),
            folded: self.folded.clone(),
        }
    }

    /// Split into a prefix and a suffix of *depth* labels.
    ///
    /// # Panics
    ///
    /// If *depth* is greater than the number of labels.
    pub fn split(&self, depth: usize) -> (Name, Name) {
        assert!(depth <= self.labels.len(), "split depth out of range");
        let at = self.labels.len() - depth;
        (
            Self::from_labels_unchecked(self.labels[..at].to_vec()),
            Self::from_labels_unchecked(self.labels[at..].to_vec()),
        )
    }

    /// The concatenation of this name and *other*.
    ///
    /// # Errors
    ///
    /// `AbsoluteConcatenation` if this name is absolute and *other*
    /// is not the empty name; `NameTooLong` if the result is over 255
    /// octets.
    pub fn concatenate(&self, other: &Name) -> Result<Name, NameError> {
        if self.is_absolute() && !other.is_empty() {
            return Err(NameError::AbsoluteConcatenation);
        }
        let mut labels = self.labels.clone();
        labels.extend(other.labels.iter().cloned());
        Self::new(labels)
    }

    /// If this name is a subdomain of *origin*, the name relative to
    /// it; otherwise the name unchanged.
    pub fn relativize(&self, origin: &Name) -> Name {
        if self.is_subdomain(origin) {
            Self::from_labels_unchecked(self.labels[..self.labels.len() - origin.len()].to_vec())
        } else {
            self.clone()
        }
    }

    /// If this name is relative, its concatenation with *origin*;
    /// otherwise the name unchanged.
    ///
    /// # Errors
    ///
    /// If the concatenation is over 255 octets.
    pub fn derelativize(&self, origin: &Name) -> Result<Name, NameError> {
        if self.is_absolute() {
            Ok(self.clone())
        } else {
            self.concatenate(origin)
        }
    }

    /// Return this name with the relativity the caller wants: if
    /// *origin* is given, relativized or derelativized to it, and
    /// otherwise unchanged.
    ///
    /// # Errors
    ///
    /// If derelativizing makes the name too long.
    pub fn choose_relativity(
        &self,
        origin: Option<&Name>,
        relativize: bool,
    ) -> Result<Name, NameError> {
        match origin {
            None => Ok(self.clone()),
            Some(origin) => {
                if relativize {
                    Ok(self.relativize(origin))
                } else {
                    self.derelativize(origin)
                }
            }
        }
    }

    /// The name with its least significant label removed.
    ///
    /// # Errors
    ///
    /// `NoParent` for the root and the empty name.
    pub fn parent(&self) -> Result<Name, NameError> {
        if self.is_empty() || self.is_root() {
            return Err(NameError::NoParent);
        }
        Ok(Self::from_labels_unchecked(self.labels[1..].to_vec()))
    }

    /// Write the wire form, compressing against (and extending) the
    /// table if one is given.  A relative name is derelativized to
    /// *origin* first.  `canonicalize` forces lowercase output and
    /// disables compression.
    ///
    /// Compression offsets are relative to the start of *buf*, which
    /// must therefore be the whole message being built.
    ///
    /// # Errors
    ///
    /// `NeedAbsoluteNameOrOrigin` if the name is relative and no
    /// absolute origin was provided.
    pub fn to_wire(
        &self,
        buf: &mut Vec<u8>,
        mut compress: Option<&mut CompressTable>,
        origin: Option<&Name>,
        canonicalize: bool,
    ) -> Result<(), NameError> {
        let full = match origin {
            _ if self.is_absolute() => self.clone(),
            Some(origin) if origin.is_absolute() => self.concatenate(origin)?,
            _ => return Err(NameError::NeedAbsoluteNameOrOrigin),
        };
        let full = if canonicalize { full.canonicalize() } else { full };
        if canonicalize {
            compress = None;
        }

        for i in 0..full.labels.len() {
            let label = &full.labels[i];
            // the root label is always cheaper to emit than to point at
            if !label.is_empty() {
                if let Some(table) = compress.as_deref_mut() {
                    let suffix = Self::from_labels_unchecked(full.labels[i..].to_vec());
                    if let Some(&offset) = table.get(&suffix) {
                        let pointer = 0xc000 | offset as u16;
                        buf.extend_from_slice(&pointer.to_be_bytes());
                        return Ok(());
                    }
                    let offset = buf.len();
                    if offset <= MAX_COMPRESSION_OFFSET {
                        table.insert(suffix, offset);
                    }
                }
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label);
        }
        Ok(())
    }

    /// The canonical uncompressed wire form, suitable for digesting.
    ///
    /// # Errors
    ///
    /// If the name is relative and no origin was provided.
    pub fn to_digestable(&self, origin: Option<&Name>) -> Result<Vec<u8>, NameError> {
        let mut buf = Vec::with_capacity(self.wire_len());
        self.to_wire(&mut buf, None, origin, true)?;
        Ok(buf)
    }

    /// Read a possibly-compressed name from the wire.  The parser is
    /// left positioned after the name as it appeared in place, not
    /// after any pointer target.
    ///
    /// # Errors
    ///
    /// `BadPointer` if a compression pointer does not point strictly
    /// backwards, `BadLabelType` for the reserved label types, and
    /// `NameTooLong`/`Incomplete` for truncated or oversized names.
    pub fn from_wire(parser: &mut Parser<'_>) -> Result<Self, NameError> {
        let mut labels: Vec<Vec<u8>> = Vec::new();
        let mut total = 0;
        let mut biggest_pointer = parser.position();
        let mut resume = None;

        loop {
            let size = parser.next_u8().ok_or(NameError::Incomplete)?;
            if usize::from(size) <= MAX_LABEL_LEN {
                total += usize::from(size) + 1;
                if total > MAX_WIRE_LEN {
                    return Err(NameError::NameTooLong);
                }
                if size == 0 {
                    labels.push(Vec::new());
                    break;
                }
                let octets = parser.take(size.into()).ok_or(NameError::Incomplete)?;
                labels.push(octets.to_vec());
            } else if size >= 0b1100_0000 {
                let lo = parser.next_u8().ok_or(NameError::Incomplete)?;
                let pointer = (usize::from(size) & 0x3f) << 8 | usize::from(lo);
                if pointer >= biggest_pointer {
                    return Err(NameError::BadPointer);
                }
                biggest_pointer = pointer;
                if resume.is_none() {
                    resume = Some(parser.position());
                }
                parser.seek(pointer);
            } else {
                return Err(NameError::BadLabelType);
            }
        }

        if let Some(position) = resume {
            parser.seek(position);
        }
        Ok(Self::from_labels_unchecked(labels))
    }

    /// The minimal name which sorts immediately after this one in the
    /// DNSSEC canonical ordering of the zone rooted at *origin*, or
    /// *origin* itself if no successor fits in the name length limits
    /// (wrapping around is how NSEC chains express "end of zone").
    ///
    /// `prefix_ok` allows prefixing a new minimal label; pass `false`
    /// when computing a successor at a zone cut.
    ///
    /// The relativity of the input is preserved.
    ///
    /// # Errors
    ///
    /// If *origin* is not absolute, or this name is neither relative
    /// nor a subdomain of *origin*.
    pub fn successor(&self, origin: &Name, prefix_ok: bool) -> Result<Name, NameError> {
        self.with_zone_order(origin, |name, origin| {
            absolute_successor(name, origin, prefix_ok)
        })
    }

    /// The maximal name which sorts immediately before this one in
    /// the zone rooted at *origin*, wrapping around to the longest
    /// name under *origin* when applied to *origin* itself.  The dual
    /// of [`Name::successor`].
    ///
    /// # Errors
    ///
    /// As for `successor`.
    pub fn predecessor(&self, origin: &Name, prefix_ok: bool) -> Result<Name, NameError> {
        self.with_zone_order(origin, |name, origin| {
            absolute_predecessor(name, origin, prefix_ok)
        })
    }

    fn with_zone_order<F>(&self, origin: &Name, f: F) -> Result<Name, NameError>
    where
        F: FnOnce(&Name, &Name) -> Result<Name, NameError>,
    {
        if !origin.is_absolute() {
            return Err(NameError::NeedAbsoluteNameOrOrigin);
        }
        let relative = !self.is_absolute();
        let name = if relative {
            self.derelativize(origin)?
        } else {
            if !self.is_subdomain(origin) {
                return Err(NameError::NeedSubdomainOfOrigin);
            }
            self.clone()
        };
        let result = f(&name, origin)?;
        Ok(if relative {
            result.relativize(origin)
        } else {
            result
        })
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fullcompare(other).1
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_text(false))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Name")
            .field("to_text()", &self.to_text(false))
            .finish()
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s, None)
    }
}

/// Characters which need a backslash in presentation format.
const ESCAPED: &[u8] = b"\"().;\\@$";

fn escapify(label: &[u8], out: &mut String) {
    for &octet in label {
        if ESCAPED.contains(&octet) {
            out.push('\\');
            out.push(octet as char);
        } else if (0x20..0x7f).contains(&octet) {
            out.push(octet as char);
        } else {
            out.push_str(&format!("\\{octet:03}"));
        }
    }
}

fn wire_len(labels: &[Vec<u8>]) -> usize {
    labels.iter().map(|l| l.len() + 1).sum()
}

fn absolute_successor(name: &Name, origin: &Name, prefix_ok: bool) -> Result<Name, NameError> {
    // the immediate successor prefixes a minimal label, when that is
    // allowed and fits
    if prefix_ok && name.wire_len() + 2 <= MAX_WIRE_LEN {
        let mut labels = vec![vec![0u8]];
        labels.extend(name.labels.iter().cloned());
        return Ok(Name::from_labels_unchecked(labels));
    }

    if name == origin {
        // nothing can be appended to the origin's own labels without
        // leaving the zone, so wrap around
        return Ok(origin.clone());
    }

    // extend the least significant label with a minimal octet
    let least = &name.labels[0];
    if least.len() < MAX_LABEL_LEN && name.wire_len() + 1 <= MAX_WIRE_LEN {
        let mut labels = name.labels.clone();
        labels[0].push(0x00);
        return Ok(Name::from_labels_unchecked(labels));
    }

    // increment the label as a big-endian integer, truncating the
    // maximal octets it carries out of
    let mut octets = least.clone();
    for i in (0..octets.len()).rev() {
        if octets[i] != 0xff {
            octets[i] += 1;
            octets.truncate(i + 1);
            let mut labels = name.labels.clone();
            labels[0] = octets;
            return Ok(Name::from_labels_unchecked(labels));
        }
    }

    // the label was all-maximal: this branch of the tree is exhausted,
    // so the successor is the parent's, without descending again
    let parent = name.parent()?;
    absolute_successor(&parent, origin, false)
}

fn absolute_predecessor(name: &Name, origin: &Name, prefix_ok: bool) -> Result<Name, NameError> {
    if name == origin {
        // wrap around to the longest name in the zone
        return Ok(if prefix_ok {
            maximize(origin)
        } else {
            origin.clone()
        });
    }

    let least = &name.labels[0];
    if least.as_slice() == [0x00] {
        // nothing sorts between a name and it with a minimal label
        // prefixed, so strip the label
        return name.parent();
    }

    let mut octets = least.clone();
    if octets.ends_with(&[0x00]) {
        // "x\000" sorts immediately after everything under "x"
        octets.pop();
    } else {
        // decrement the final octet, then extend the label maximally
        let last = octets.len() - 1;
        octets[last] -= 1;
        let budget = MAX_WIRE_LEN - wire_len(&name.labels[1..]) - 1;
        while octets.len() < budget.min(MAX_LABEL_LEN) {
            octets.push(0xff);
        }
    }
    let mut labels = name.labels.clone();
    labels[0] = octets;
    let sibling = Name::from_labels_unchecked(labels);
    Ok(if prefix_ok { maximize(&sibling) } else { sibling })
}

/// The longest name under *name*: as many maximal labels as the
/// length limit allows, prefixed to it.
fn maximize(name: &Name) -> Name {
    let mut avail = MAX_WIRE_LEN - name.wire_len();
    let mut labels = Vec::new();
    while avail >= 2 {
        let len = MAX_LABEL_LEN.min(avail - 1);
        labels.push(vec![0xff; len]);
        avail -= len + 1;
    }
    labels.extend(name.labels.iter().cloned());
    Name::from_labels_unchecked(labels)
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Name {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_labels = u.int_in_range::<usize>(0..=6)?;
        let mut labels = Vec::with_capacity(num_labels + 1);
        for _ in 0..num_labels {
            let label_len = u.int_in_range::<usize>(1..=20)?;
            let mut label = Vec::with_capacity(label_len);
            for b in u.bytes(label_len)? {
                label.push(if b.is_ascii() { *b } else { *b % 128 });
            }
            labels.push(label);
        }
        labels.push(Vec::new());
        Ok(Self::from_labels_unchecked(labels))
    }
}
