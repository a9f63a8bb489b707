//! Help for building DNS wire-format messages.
//!
//! The renderer owns a growable buffer and writes one message into
//! it: sections strictly in order, names compressed against a shared
//! table, an optional padded OPT record, and an optional trailing
//! TSIG.  The 12-octet header is reserved up front and written last,
//! once the section counts are known.
//!
//! Typical use:
//!
//! ```
//! use dns_wire::message::types::{Question, RdataType, RdataClass};
//! use dns_wire::name::Name;
//! use dns_wire::renderer::Renderer;
//!
//! let mut renderer = Renderer::new(Some(1), 0x0100, 512, None);
//! renderer
//!     .add_question(&Question {
//!         name: Name::from_text("www.example.com.", None).unwrap(),
//!         rdtype: RdataType::A,
//!         rdclass: RdataClass::IN,
//!     })
//!     .unwrap();
//! renderer.add_edns(0, 0, 1232, Vec::new()).unwrap();
//! renderer.write_header();
//! let wire = renderer.into_wire();
//! # assert_eq!(1, wire[1]);
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::edns::{self, Opt};
use crate::message::types::{Question, RdataClass, RdataType, RecordData, ResourceRecord};
use crate::name::{CompressTable, Name, NameError};
use crate::tsig::{self, Context, Key, SignError, Signer};

/// Length of the fixed message header.
pub const HEADER_LEN: usize = 12;

/// The four sections of a rendered message, in the order they must be
/// written.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    fn index(self) -> usize {
        match self {
            Section::Question => 0,
            Section::Answer => 1,
            Section::Authority => 2,
            Section::Additional => 3,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Section::Question => write!(f, "QUESTION"),
            Section::Answer => write!(f, "ANSWER"),
            Section::Authority => write!(f, "AUTHORITY"),
            Section::Additional => write!(f, "ADDITIONAL"),
        }
    }
}

/// Errors encountered while rendering.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RendererError {
    /// Sections must be rendered in order QUESTION, ANSWER,
    /// AUTHORITY, ADDITIONAL; going backwards is a form error.
    SectionOutOfOrder { current: Section, requested: Section },

    /// Writing this item would exceed `max_size` minus the reserved
    /// octets.  The buffer is rolled back to where the item started.
    MessageTooLong { limit: usize },

    /// A name could not be written.
    Name(NameError),

    /// The signing capability failed.
    Sign(SignError),
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RendererError::SectionOutOfOrder { current, requested } => write!(
                f,
                "sections must be rendered in order: cannot go back from {current} to {requested}"
            ),
            RendererError::MessageTooLong { limit } => {
                write!(f, "message does not fit in {limit} octets")
            }
            RendererError::Name(err) => write!(f, "cannot write name: {err}"),
            RendererError::Sign(err) => write!(f, "cannot sign message: {err}"),
        }
    }
}

impl std::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<NameError> for RendererError {
    fn from(err: NameError) -> Self {
        RendererError::Name(err)
    }
}

impl From<SignError> for RendererError {
    fn from(err: SignError) -> Self {
        RendererError::Sign(err)
    }
}

/// A snapshot of the renderer's buffer position, for rolling back an
/// item which turned out not to fit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Mark(usize);

/// Helper class for building DNS wire-format messages.
pub struct Renderer {
    output: Vec<u8>,
    pub id: u16,
    pub flags: u16,
    max_size: usize,
    origin: Option<Name>,
    compress: CompressTable,
    section: Section,
    counts: [u16; 4],
    reserved: usize,
    mac: Option<Vec<u8>>,
}

impl Renderer {
    /// Start a message.  A `None` id draws a uniform random one.
    /// Relative names are completed with *origin* when one is given.
    pub fn new(id: Option<u16>, flags: u16, max_size: usize, origin: Option<Name>) -> Self {
        let id = id.unwrap_or_else(|| rand::thread_rng().gen());
        let mut compress = CompressTable::new();
        // the root is in the table at offset 0 but is never emitted
        // via a pointer: a bare zero octet is shorter
        compress.insert(Name::root(), 0);
        Self {
            output: vec![0; HEADER_LEN],
            id,
            flags,
            max_size,
            origin,
            compress,
            section: Section::Question,
            counts: [0; 4],
            reserved: 0,
            mac: None,
        }
    }

    /// The current end of the buffer, for a later
    /// [`Renderer::rollback_to`].
    pub fn mark(&self) -> Mark {
        Mark(self.output.len())
    }

    /// Truncate the buffer to *mark* and drop every compression table
    /// entry at or past it.  Section counts are not touched: roll
    /// back only content which has not been counted yet.
    pub fn rollback_to(&mut self, mark: Mark) {
        self.output.truncate(mark.0);
        self.compress.retain(|_, offset| *offset < mark.0);
    }

    /// Shrink the effective maximum size by *size* octets, so a later
    /// required item (e.g. a TSIG) is guaranteed to fit.
    pub fn reserve(&mut self, size: usize) {
        self.reserved += size;
    }

    /// Release all reserved octets.
    pub fn release_reserved(&mut self) {
        self.reserved = 0;
    }

    /// The MAC of the rendered message, if a TSIG was added.
    pub fn mac(&self) -> Option<&[u8]> {
        self.mac.as_deref()
    }

    pub fn current_section(&self) -> Section {
        self.section
    }

    fn set_section(&mut self, section: Section) -> Result<(), RendererError> {
        if self.section > section {
            return Err(RendererError::SectionOutOfOrder {
                current: self.section,
                requested: section,
            });
        }
        self.section = section;
        Ok(())
    }

    /// Run a write, rolling the buffer back if it fails or busts the
    /// size limit.
    fn guarded<F>(&mut self, f: F) -> Result<(), RendererError>
    where
        F: FnOnce(&mut Self) -> Result<(), RendererError>,
    {
        let mark = self.mark();
        let result = f(self).and_then(|()| {
            if self.output.len() > self.max_size.saturating_sub(self.reserved) {
                Err(RendererError::MessageTooLong {
                    limit: self.max_size,
                })
            } else {
                Ok(())
            }
        });
        if result.is_err() {
            self.rollback_to(mark);
        }
        result
    }

    /// Add a question to the message.
    ///
    /// # Errors
    ///
    /// If a later section has already been started, the name cannot
    /// be written, or the question does not fit.
    pub fn add_question(&mut self, question: &Question) -> Result<(), RendererError> {
        self.set_section(Section::Question)?;
        self.guarded(|r| {
            let origin = r.origin.clone();
            question
                .name
                .to_wire(&mut r.output, Some(&mut r.compress), origin.as_ref(), false)?;
            r.output
                .extend_from_slice(&u16::from(question.rdtype).to_be_bytes());
            r.output
                .extend_from_slice(&u16::from(question.rdclass).to_be_bytes());
            Ok(())
        })?;
        self.counts[Section::Question.index()] += 1;
        Ok(())
    }

    /// Add a resource record to the given section.
    ///
    /// # Errors
    ///
    /// As for [`Renderer::add_question`].
    pub fn add_rr(&mut self, section: Section, rr: &ResourceRecord) -> Result<(), RendererError> {
        self.add_record(section, &rr.name, rr.rtype(), rr.rclass, rr.ttl, Some(&rr.rdata))
    }

    /// Add a record from its parts.  A `None` rdata writes an empty
    /// RDATA, as the ANY/NONE sentinels of dynamic updates need.
    ///
    /// # Errors
    ///
    /// As for [`Renderer::add_question`].
    pub fn add_record(
        &mut self,
        section: Section,
        name: &Name,
        rtype: RdataType,
        rclass: RdataClass,
        ttl: u32,
        rdata: Option<&RecordData>,
    ) -> Result<(), RendererError> {
        self.set_section(section)?;
        self.guarded(|r| {
            let origin = r.origin.clone();
            name.to_wire(&mut r.output, Some(&mut r.compress), origin.as_ref(), false)?;
            r.output.extend_from_slice(&u16::from(rtype).to_be_bytes());
            r.output.extend_from_slice(&u16::from(rclass).to_be_bytes());
            r.output.extend_from_slice(&ttl.to_be_bytes());

            let rdlength_index = r.output.len();
            r.output.extend_from_slice(&[0, 0]);
            if let Some(rdata) = rdata {
                rdata.serialise(&mut r.output, Some(&mut r.compress))?;
            }
            r.patch_rdlength(rdlength_index)
        })?;
        self.counts[section.index()] += 1;
        Ok(())
    }

    /// Add an OPT record, applying padding if desired.  The padding
    /// brings the total message length - including this OPT and a
    /// TSIG of the precomputed *tsig_size* - up to a multiple of
    /// *pad*.  Digest sizes which cannot be known in advance (GSS)
    /// make this best-effort.
    ///
    /// # Errors
    ///
    /// As for [`Renderer::add_question`].
    pub fn add_opt(
        &mut self,
        opt: &Opt,
        pad: usize,
        opt_size: usize,
        tsig_size: usize,
    ) -> Result<(), RendererError> {
        self.set_section(Section::Additional)?;
        self.guarded(|r| {
            let before = r.output.len();
            r.output.push(0); // the empty owner name
            r.output
                .extend_from_slice(&u16::from(RdataType::OPT).to_be_bytes());
            r.output.extend_from_slice(&opt.payload.to_be_bytes());
            r.output.extend_from_slice(&opt.ttl.to_be_bytes());

            let rdlength_index = r.output.len();
            r.output.extend_from_slice(&[0, 0]);
            edns::encode_options(&opt.options, &mut r.output);

            if pad > 0 {
                let desired = (((before + opt_size + tsig_size).saturating_sub(1) / pad) + 1) * pad;
                let current = r.output.len() + tsig_size;
                let mut pad_len = desired.saturating_sub(current);
                // the padding travels as an RFC 7830 option, which
                // needs 4 octets of header; too-small remainders are
                // bumped up by one more pad block
                if pad_len > 0 && pad_len < 4 {
                    pad_len += pad;
                }
                if pad_len >= 4 {
                    r.output
                        .extend_from_slice(&edns::OPTION_PADDING.to_be_bytes());
                    r.output
                        .extend_from_slice(&((pad_len - 4) as u16).to_be_bytes());
                    r.output.resize(r.output.len() + pad_len - 4, 0);
                }
            }
            r.patch_rdlength(rdlength_index)
        })?;
        self.counts[Section::Additional.index()] += 1;
        Ok(())
    }

    /// Add an EDNS OPT record without padding.
    ///
    /// # Errors
    ///
    /// As for [`Renderer::add_question`].
    pub fn add_edns(
        &mut self,
        version: u8,
        ednsflags: u32,
        payload: u16,
        options: Vec<edns::EdnsOption>,
    ) -> Result<(), RendererError> {
        let opt = Opt::new(version, ednsflags, payload, options);
        self.add_opt(&opt, 0, 0, 0)
    }

    /// Sign the message as rendered so far and append the TSIG
    /// record.  Call [`Renderer::write_header`] first: the signed
    /// octets are the buffer contents as of entry.
    ///
    /// # Errors
    ///
    /// If the signer fails or the record does not fit.
    pub fn add_tsig(
        &mut self,
        signer: &dyn Signer,
        key: &Key,
        fudge: u16,
        tsig_error: u16,
        other: &[u8],
        request_mac: &[u8],
    ) -> Result<(), RendererError> {
        self.tsig_impl(None, signer, key, fudge, tsig_error, other, request_mac)?;
        Ok(())
    }

    /// Like [`Renderer::add_tsig`], but for a series of consecutive
    /// envelopes, e.g. a zone transfer over TCP.  Give `None` for the
    /// first message and thread the returned context through each
    /// subsequent call.
    ///
    /// # Errors
    ///
    /// As for [`Renderer::add_tsig`].
    pub fn add_multi_tsig(
        &mut self,
        ctx: Option<Context>,
        signer: &dyn Signer,
        key: &Key,
        fudge: u16,
        tsig_error: u16,
        other: &[u8],
        request_mac: &[u8],
    ) -> Result<Context, RendererError> {
        self.tsig_impl(Some(ctx), signer, key, fudge, tsig_error, other, request_mac)
    }

    #[allow(clippy::too_many_arguments)]
    fn tsig_impl(
        &mut self,
        multi_ctx: Option<Option<Context>>,
        signer: &dyn Signer,
        key: &Key,
        fudge: u16,
        tsig_error: u16,
        other: &[u8],
        request_mac: &[u8],
    ) -> Result<Context, RendererError> {
        self.set_section(Section::Additional)?;

        let time_signed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let blob = match &multi_ctx {
            Some(Some(ctx)) => tsig::multi_signing_blob(&ctx.mac, &self.output, time_signed, fudge),
            _ => tsig::signing_blob(
                &self.output,
                key,
                time_signed,
                fudge,
                tsig_error,
                other,
                request_mac,
            )?,
        };
        let mac = signer.sign(&key.algorithm, &key.secret, &blob)?;

        self.guarded(|r| {
            let origin = r.origin.clone();
            key.name
                .to_wire(&mut r.output, Some(&mut r.compress), origin.as_ref(), false)?;
            r.output
                .extend_from_slice(&u16::from(RdataType::TSIG).to_be_bytes());
            r.output
                .extend_from_slice(&u16::from(RdataClass::ANY).to_be_bytes());
            r.output.extend_from_slice(&0u32.to_be_bytes());

            let rdlength_index = r.output.len();
            r.output.extend_from_slice(&[0, 0]);
            r.output.extend_from_slice(&key.algorithm.to_digestable(None)?);
            tsig::push_u48(&mut r.output, time_signed);
            r.output.extend_from_slice(&fudge.to_be_bytes());
            r.output
                .extend_from_slice(&(mac.len() as u16).to_be_bytes());
            r.output.extend_from_slice(&mac);
            r.output.extend_from_slice(&r.id.to_be_bytes());
            r.output.extend_from_slice(&tsig_error.to_be_bytes());
            r.output
                .extend_from_slice(&(other.len() as u16).to_be_bytes());
            r.output.extend_from_slice(other);
            r.patch_rdlength(rdlength_index)
        })?;
        self.counts[Section::Additional.index()] += 1;
        // the TSIG is excluded from the MAC but included in ARCOUNT,
        // so the already-written header needs its count refreshed
        self.output[10..12]
            .copy_from_slice(&self.counts[Section::Additional.index()].to_be_bytes());
        self.mac = Some(mac.clone());
        Ok(Context { mac })
    }

    fn patch_rdlength(&mut self, rdlength_index: usize) -> Result<(), RendererError> {
        let rdlength = self.output.len() - rdlength_index - 2;
        let Ok(rdlength) = u16::try_from(rdlength) else {
            return Err(RendererError::MessageTooLong {
                limit: self.max_size,
            });
        };
        let [hi, lo] = rdlength.to_be_bytes();
        self.output[rdlength_index] = hi;
        self.output[rdlength_index + 1] = lo;
        Ok(())
    }

    /// Write the message header.  Do this after all sections have
    /// been rendered, but before the optional TSIG is added.
    pub fn write_header(&mut self) {
        self.output[0..2].copy_from_slice(&self.id.to_be_bytes());
        self.output[2..4].copy_from_slice(&self.flags.to_be_bytes());
        for (i, count) in self.counts.iter().enumerate() {
            let at = 4 + 2 * i;
            self.output[at..at + 2].copy_from_slice(&count.to_be_bytes());
        }
    }

    /// The wire format message rendered so far.
    pub fn get_wire(&self) -> &[u8] {
        &self.output
    }

    pub fn into_wire(self) -> Vec<u8> {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::types::test_util::*;
    use crate::message::types::Message;

    struct FakeSigner;

    impl Signer for FakeSigner {
        fn sign(&self, _: &Name, _: &[u8], data: &[u8]) -> Result<Vec<u8>, SignError> {
            // a stand-in "MAC": fixed width, derived from the input
            // length so tests can tell different inputs apart
            let mut mac = vec![0xaa; 14];
            mac.extend_from_slice(&(data.len() as u16).to_be_bytes());
            Ok(mac)
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(Some(0x1234), 0x0100, 512, None)
    }

    #[test]
    fn renders_a_parseable_query() {
        let mut r = renderer();
        r.add_question(&question("www.example.com.", RdataType::A))
            .unwrap();
        r.add_edns(0, 0, 1232, Vec::new()).unwrap();
        r.write_header();

        let message = Message::from_octets(r.get_wire()).unwrap();
        assert_eq!(0x1234, message.header.id);
        assert!(message.header.recursion_desired);
        assert_eq!(1, message.questions.len());
        assert_eq!(name("www.example.com."), message.questions[0].name);
        assert!(message.opt().is_some());
    }

    #[test]
    fn sections_cannot_go_backwards() {
        let mut r = renderer();
        r.add_rr(Section::Additional, &a_record("a.example.", "1.1.1.1"))
            .unwrap();
        assert_eq!(
            Err(RendererError::SectionOutOfOrder {
                current: Section::Additional,
                requested: Section::Answer,
            }),
            r.add_rr(Section::Answer, &a_record("a.example.", "1.1.1.1"))
        );
    }

    #[test]
    fn names_are_compressed_across_records() {
        let mut r = renderer();
        r.add_question(&question("www.example.com.", RdataType::A))
            .unwrap();
        let mark = r.mark();
        r.add_rr(Section::Answer, &a_record("www.example.com.", "1.2.3.4"))
            .unwrap();
        // the answer's owner collapses to a 2-octet pointer
        assert_eq!(2 + 2 + 2 + 4 + 2 + 4, r.get_wire().len() - {
            let Mark(m) = mark;
            m
        });

        r.write_header();
        let message = Message::from_octets(r.get_wire()).unwrap();
        assert_eq!(name("www.example.com."), message.answers[0].name);
    }

    #[test]
    fn compression_only_targets_low_offsets() {
        let mut r = Renderer::new(Some(1), 0, 0x8000, None);
        for i in 0..600 {
            r.add_rr(
                Section::Answer,
                &ResourceRecord {
                    name: name(&format!("x{i}.example.")),
                    rdata: RecordData::Txt {
                        octets: vec![b'x'; 20],
                    },
                    rclass: RdataClass::IN,
                    ttl: 1,
                },
            )
            .unwrap();
        }
        // by now the buffer is past 0x3fff; a fresh name written here
        // must not be remembered at an unpointable offset
        assert!(r.get_wire().len() > MAX_COMPRESSION_OFFSET_GUARD);
        r.add_rr(Section::Answer, &a_record("fresh.test.", "1.1.1.1"))
            .unwrap();
        r.add_rr(Section::Answer, &a_record("deep.fresh.test.", "1.1.1.1"))
            .unwrap();
        r.write_header();
        let message = Message::from_octets(r.get_wire()).unwrap();
        assert_eq!(name("fresh.test."), message.answers[600].name);
        assert_eq!(name("deep.fresh.test."), message.answers[601].name);
    }

    const MAX_COMPRESSION_OFFSET_GUARD: usize = 0x3fff;

    #[test]
    fn rollback_truncates_buffer_and_table() {
        let mut r = renderer();
        r.add_question(&question("example.com.", RdataType::A))
            .unwrap();
        let mark = r.mark();
        r.add_rr(Section::Answer, &a_record("www.example.com.", "1.2.3.4"))
            .unwrap();
        r.rollback_to(mark);

        // "www.example.com." must be gone from the table: writing it
        // again may not produce a pointer past the truncation point
        r.add_rr(Section::Answer, &a_record("www.example.com.", "5.6.7.8"))
            .unwrap();
        r.counts[1] -= 1; // the rolled-back record was counted by the test flow
        r.write_header();
        let message = Message::from_octets(r.get_wire()).unwrap();
        assert_eq!(name("www.example.com."), message.answers[0].name);
        assert_eq!(
            RecordData::A {
                address: "5.6.7.8".parse().unwrap()
            },
            message.answers[0].rdata
        );
    }

    #[test]
    fn max_size_is_enforced_and_rolled_back() {
        let mut r = Renderer::new(Some(1), 0, 30, None);
        let before = r.get_wire().len();
        assert_eq!(
            Err(RendererError::MessageTooLong { limit: 30 }),
            r.add_question(&question("a-rather-long-name.example.com.", RdataType::A))
        );
        assert_eq!(before, r.get_wire().len());
    }

    #[test]
    fn reserve_shrinks_the_limit() {
        let mut r = Renderer::new(Some(1), 0, 64, None);
        r.reserve(40);
        assert!(r
            .add_question(&question("www.example.com.", RdataType::A))
            .is_err());
        r.release_reserved();
        assert!(r
            .add_question(&question("www.example.com.", RdataType::A))
            .is_ok());
    }

    #[test]
    fn opt_padding_rounds_message_length() {
        for pad in [128, 468] {
            let mut r = renderer();
            r.add_question(&question("www.example.com.", RdataType::A))
                .unwrap();
            let opt = Opt::new(0, 0, 1232, Vec::new());
            r.add_opt(&opt, pad, 0, 0).unwrap();
            assert_eq!(0, r.get_wire().len() % pad, "pad={pad}");

            r.write_header();
            let message = Message::from_octets(r.get_wire()).unwrap();
            let parsed_opt = message.opt().unwrap();
            match &parsed_opt.rdata {
                RecordData::Opt { options } => {
                    assert_eq!(edns::OPTION_PADDING, options[0].code);
                }
                other => panic!("unexpected rdata: {other:?}"),
            }
        }
    }

    #[test]
    fn tsig_signs_buffer_and_records_mac() {
        let key = Key::new(name("transfer-key."), b"secret".to_vec());
        let mut r = renderer();
        r.add_question(&question("example.com.", RdataType::AXFR))
            .unwrap();
        r.write_header();
        let unsigned_len = r.get_wire().len();

        r.add_tsig(&FakeSigner, &key, 300, 0, &[], &[]).unwrap();
        assert!(r.mac().is_some());
        assert!(r.get_wire().len() > unsigned_len);

        // the TSIG RR parses as the last record of ADDITIONAL, with
        // ARCOUNT refreshed to include it
        let message = Message::from_octets(r.get_wire()).unwrap();
        let tsig_rr = message.additional.last().unwrap();
        assert_eq!(RdataType::TSIG, tsig_rr.rtype());
        assert_eq!(RdataClass::ANY, tsig_rr.rclass);
        assert_eq!(name("transfer-key."), tsig_rr.name);
    }

    #[test]
    fn multi_tsig_threads_context() {
        let key = Key::new(name("transfer-key."), b"secret".to_vec());

        let mut first = renderer();
        first
            .add_question(&question("example.com.", RdataType::AXFR))
            .unwrap();
        first.write_header();
        let ctx = first
            .add_multi_tsig(None, &FakeSigner, &key, 300, 0, &[], &[])
            .unwrap();
        assert_eq!(first.mac().unwrap(), &ctx.mac[..]);

        let mut second = renderer();
        second
            .add_rr(Section::Answer, &a_record("example.com.", "1.2.3.4"))
            .unwrap();
        second.write_header();
        let ctx2 = second
            .add_multi_tsig(Some(ctx.clone()), &FakeSigner, &key, 300, 0, &[], &[])
            .unwrap();
        assert_ne!(ctx.mac, ctx2.mac);
    }
}
