//! Inbound zone transfers: the AXFR/IXFR state machine, and the
//! transaction capability it drives.
//!
//! Messages are fed in arrival order to [`Inbound::process_message`],
//! which emits add/delete operations into a transaction obtained from
//! the caller's [`TransactionManager`].  The transaction commits on
//! the terminal SOA and rolls back on every other exit path,
//! including drop.

use std::cmp::Ordering;
use std::fmt;

use rand::Rng;

use dns_wire::message::types::{
    Message, Question, RdataClass, RdataType, RecordData, ResourceRecord,
};
use dns_wire::name::Name;
use dns_wire::rcode::Rcode;
use dns_wire::serial::Serial;

/// A write transaction over a zone's contents.
pub trait Transaction: Send {
    /// Stage a record.  An identical record (same name, type, class,
    /// and data) is replaced; an SOA replaces the staged SOA.
    fn add(&mut self, rr: &ResourceRecord) -> Result<(), TransactionError>;

    /// Unstage the record matching by name, type, and data.  Deleting
    /// a record which is not present is not an error.
    fn delete(&mut self, rr: &ResourceRecord) -> Result<(), TransactionError>;

    /// Make the staged contents visible.
    fn commit(&mut self) -> Result<(), TransactionError>;

    /// Discard the staged contents.
    fn rollback(&mut self);
}

/// Something which can hand out transactions over a zone.
pub trait TransactionManager {
    fn origin(&self) -> Name;

    /// The zone's current SOA serial, if it has one.
    fn serial(&self) -> Option<u32>;

    /// Open a write transaction.  With *replacement*, the transaction
    /// starts from an empty zone (a full transfer); otherwise it
    /// starts from the current contents (an incremental one).
    fn writer(&self, replacement: bool) -> Box<dyn Transaction>;
}

/// An operation on an already-finished transaction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TransactionError;

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "transaction is already finished")
    }
}

impl std::error::Error for TransactionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Errors from driving a zone transfer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum XfrError {
    /// IXFR needs the serial to diff against.
    SerialRequired,

    /// AXFR cannot run over UDP.
    UdpNotAllowed,

    /// Only AXFR and IXFR drive transfers.
    NotATransferType(RdataType),

    /// The transfer response had a non-zero rcode.
    TransferError(Rcode),

    /// The first record of a transfer must be an SOA.
    FirstRecordNotSoa,

    /// A full transfer ended with an SOA different from its opening
    /// one.
    SoaMismatch,

    /// This IXFR does not fit in a datagram; retry over TCP.
    UseTcp,

    /// A message arrived after the transfer completed.
    AlreadyFinished,

    /// An IXFR query's authority section does not carry exactly one
    /// SOA.
    BadIxfrQuery,

    Transaction(TransactionError),
}

impl fmt::Display for XfrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            XfrError::SerialRequired => {
                write!(f, "a starting serial must be supplied for IXFRs")
            }
            XfrError::UdpNotAllowed => write!(f, "cannot do a full transfer over UDP"),
            XfrError::NotATransferType(rdtype) => {
                write!(f, "{rdtype} is not a transfer type")
            }
            XfrError::TransferError(rcode) => write!(f, "Zone transfer error: {rcode}"),
            XfrError::FirstRecordNotSoa => write!(f, "first record is not an SOA"),
            XfrError::SoaMismatch => {
                write!(f, "final SOA does not match the one which opened the transfer")
            }
            XfrError::UseTcp => write!(f, "IXFR is too large for UDP; retry over TCP"),
            XfrError::AlreadyFinished => write!(f, "the transfer has already completed"),
            XfrError::BadIxfrQuery => {
                write!(f, "IXFR query does not have exactly one authority SOA")
            }
            XfrError::Transaction(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for XfrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<TransactionError> for XfrError {
    fn from(err: TransactionError) -> Self {
        XfrError::Transaction(err)
    }
}

/// State machine for inbound zone transfers.
pub struct Inbound<'a> {
    manager: &'a dyn TransactionManager,
    txn: Option<Box<dyn Transaction>>,
    rdtype: RdataType,
    serial: Option<Serial>,
    is_udp: bool,
    soa: Option<ResourceRecord>,
    delete_mode: bool,
    done: bool,
}

impl<'a> Inbound<'a> {
    /// Initialise a transfer.  *rdtype* must be AXFR or IXFR; IXFR
    /// requires the base *serial*; AXFR disallows UDP.
    ///
    /// # Errors
    ///
    /// If those constraints are violated.
    pub fn new(
        manager: &'a dyn TransactionManager,
        rdtype: RdataType,
        serial: Option<u32>,
        is_udp: bool,
    ) -> Result<Self, XfrError> {
        match rdtype {
            RdataType::IXFR => {
                if serial.is_none() {
                    return Err(XfrError::SerialRequired);
                }
            }
            RdataType::AXFR => {
                if is_udp {
                    return Err(XfrError::UdpNotAllowed);
                }
            }
            other => return Err(XfrError::NotATransferType(other)),
        }
        Ok(Self {
            manager,
            txn: None,
            rdtype,
            serial: serial.map(Serial),
            is_udp,
            soa: None,
            delete_mode: false,
            done: false,
        })
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Process one message of the transfer, in order.  Returns `true`
    /// once the transfer is complete.
    ///
    /// # Errors
    ///
    /// `TransferError` for a non-NOERROR response, `UseTcp` when an
    /// IXFR over UDP does not complete in its one datagram, and form
    /// errors for streams violating the SOA framing.  Any error
    /// leaves the zone untouched: the transaction is rolled back when
    /// the `Inbound` goes away.
    pub fn process_message(&mut self, message: &Message) -> Result<bool, XfrError> {
        if self.done {
            return Err(XfrError::AlreadyFinished);
        }
        let rcode = message.extended_rcode();
        if rcode != Rcode::NoError {
            return Err(XfrError::TransferError(rcode));
        }
        if self.txn.is_none() {
            self.txn = Some(self.manager.writer(self.rdtype == RdataType::AXFR));
        }

        let complete = match self.rdtype {
            RdataType::AXFR => self.process_axfr(message)?,
            RdataType::IXFR => self.process_ixfr(message)?,
            other => return Err(XfrError::NotATransferType(other)),
        };

        if !complete && self.is_udp {
            return Err(XfrError::UseTcp);
        }
        Ok(complete)
    }

    fn process_axfr(&mut self, message: &Message) -> Result<bool, XfrError> {
        for rr in &message.answers {
            if self.soa.is_none() {
                if rr.rtype() != RdataType::SOA {
                    return Err(XfrError::FirstRecordNotSoa);
                }
                self.soa = Some(rr.clone());
                self.txn_add(rr)?;
            } else if rr.rtype() == RdataType::SOA {
                let matches_opening = self
                    .soa
                    .as_ref()
                    .is_some_and(|opening| opening.rdata == rr.rdata);
                if !matches_opening {
                    return Err(XfrError::SoaMismatch);
                }
                self.commit()?;
                return Ok(true);
            } else {
                self.txn_add(rr)?;
            }
        }
        Ok(false)
    }

    fn process_ixfr(&mut self, message: &Message) -> Result<bool, XfrError> {
        let base = self.serial.ok_or(XfrError::SerialRequired)?;
        for rr in &message.answers {
            if rr.rtype() == RdataType::SOA {
                if self.soa.is_none() {
                    let serial = soa_serial(rr).ok_or(XfrError::FirstRecordNotSoa)?;
                    self.soa = Some(rr.clone());
                    // condensed "no changes" response: we already hold
                    // this serial (or a newer one)
                    if Serial(serial).partial_cmp(&base) != Some(Ordering::Greater) {
                        self.done = true;
                        return Ok(true);
                    }
                } else {
                    self.delete_mode = !self.delete_mode;
                    // the opening SOA again, where a deletion set
                    // would start: end of the diff stream
                    let terminal = self.delete_mode
                        && self
                            .soa
                            .as_ref()
                            .is_some_and(|opening| opening.rdata == rr.rdata);
                    if terminal {
                        self.commit()?;
                        return Ok(true);
                    }
                    if self.delete_mode {
                        self.txn_delete(rr)?;
                    } else {
                        self.txn_add(rr)?;
                    }
                }
            } else {
                if self.soa.is_none() {
                    return Err(XfrError::FirstRecordNotSoa);
                }
                if self.delete_mode {
                    self.txn_delete(rr)?;
                } else {
                    self.txn_add(rr)?;
                }
            }
        }
        Ok(false)
    }

    fn txn_add(&mut self, rr: &ResourceRecord) -> Result<(), XfrError> {
        match self.txn.as_mut() {
            Some(txn) => Ok(txn.add(rr)?),
            None => Err(XfrError::AlreadyFinished),
        }
    }

    fn txn_delete(&mut self, rr: &ResourceRecord) -> Result<(), XfrError> {
        match self.txn.as_mut() {
            Some(txn) => Ok(txn.delete(rr)?),
            None => Err(XfrError::AlreadyFinished),
        }
    }

    fn commit(&mut self) -> Result<(), XfrError> {
        match self.txn.as_mut() {
            Some(txn) => txn.commit()?,
            None => return Err(XfrError::AlreadyFinished),
        }
        self.txn = None;
        self.done = true;
        Ok(())
    }
}

impl Drop for Inbound<'_> {
    fn drop(&mut self) {
        // commit clears `txn`, so anything left here is an abandoned
        // transfer
        if let Some(mut txn) = self.txn.take() {
            txn.rollback();
        }
    }
}

fn soa_serial(rr: &ResourceRecord) -> Option<u32> {
    match &rr.rdata {
        RecordData::Soa { serial, .. } => Some(*serial),
        _ => None,
    }
}

/// Build an AXFR or IXFR query for the manager's zone.
///
/// A *serial* of `None` forces AXFR.  `Some(0)` asks for an IXFR from
/// the manager's own serial, falling back to AXFR if it has none.
/// Any other value is the IXFR base serial.  Returns the query and
/// the serial actually used.
pub fn make_query(
    manager: &dyn TransactionManager,
    serial: Option<u32>,
) -> (Message, Option<u32>) {
    let (rdtype, serial) = match serial {
        None => (RdataType::AXFR, None),
        Some(0) => match manager.serial() {
            Some(current) => (RdataType::IXFR, Some(current)),
            None => (RdataType::AXFR, None),
        },
        Some(base) => (RdataType::IXFR, Some(base)),
    };

    let origin = manager.origin();
    let mut query = Message::from_question(
        rand::thread_rng().gen(),
        Question {
            name: origin.clone(),
            rdtype,
            rdclass: RdataClass::IN,
        },
    );
    if let Some(base) = serial {
        query.authority.push(ResourceRecord {
            name: origin,
            rdata: RecordData::Soa {
                mname: Name::root(),
                rname: Name::root(),
                serial: base,
                refresh: 0,
                retry: 0,
                expire: 0,
                minimum: 0,
            },
            rclass: RdataClass::IN,
            ttl: 0,
        });
    }
    (query, serial)
}

/// The base serial of a transfer query: `Some` for an IXFR, `None`
/// for an AXFR.
///
/// # Errors
///
/// If the query is not a transfer, or an IXFR lacks its authority
/// SOA.
pub fn extract_serial_from_query(query: &Message) -> Result<Option<u32>, XfrError> {
    let question = query.questions.first().ok_or(XfrError::BadIxfrQuery)?;
    match question.rdtype {
        RdataType::AXFR => Ok(None),
        RdataType::IXFR => {
            if query.authority.len() != 1 {
                return Err(XfrError::BadIxfrQuery);
            }
            soa_serial(&query.authority[0])
                .map(Some)
                .ok_or(XfrError::BadIxfrQuery)
        }
        other => Err(XfrError::NotATransferType(other)),
    }
}

#[cfg(test)]
mod tests {
    use dns_wire::message::types::test_util::*;

    use super::*;
    use crate::zone::Zone;

    fn transfer_message(zone: &str, answers: Vec<ResourceRecord>) -> Message {
        let mut response = Message::from_question(
            7,
            Question {
                name: name(zone),
                rdtype: RdataType::AXFR,
                rdclass: RdataClass::IN,
            },
        )
        .make_response();
        response.answers = answers;
        response
    }

    #[test]
    fn initialisation_enforces_the_mode_rules() {
        let zone = Zone::new(name("example.com."));
        assert!(matches!(
            Inbound::new(&zone, RdataType::IXFR, None, false),
            Err(XfrError::SerialRequired)
        ));
        assert!(matches!(
            Inbound::new(&zone, RdataType::AXFR, None, true),
            Err(XfrError::UdpNotAllowed)
        ));
        assert!(matches!(
            Inbound::new(&zone, RdataType::A, None, false),
            Err(XfrError::NotATransferType(RdataType::A))
        ));
    }

    #[test]
    fn axfr_single_message_transfer() {
        let zone = Zone::new(name("example.com."));
        let mut inbound = Inbound::new(&zone, RdataType::AXFR, None, false).unwrap();

        let soa = soa_record("example.com.", 2024010101);
        let message = transfer_message(
            "example.com.",
            vec![
                soa.clone(),
                a_record("www.example.com.", "192.0.2.1"),
                a_record("mail.example.com.", "192.0.2.2"),
                soa.clone(),
            ],
        );
        assert_eq!(Ok(true), inbound.process_message(&message));
        assert!(inbound.is_done());

        assert_eq!(Some(2024010101), zone.serial());
        assert_eq!(
            1,
            zone.find(&name("www.example.com."), RdataType::A).len()
        );
        assert_eq!(3, zone.len());
    }

    #[test]
    fn axfr_spans_messages() {
        let zone = Zone::new(name("example.com."));
        let mut inbound = Inbound::new(&zone, RdataType::AXFR, None, false).unwrap();

        let soa = soa_record("example.com.", 1);
        let first = transfer_message(
            "example.com.",
            vec![soa.clone(), a_record("a.example.com.", "192.0.2.1")],
        );
        let second = transfer_message(
            "example.com.",
            vec![a_record("b.example.com.", "192.0.2.2"), soa.clone()],
        );

        assert_eq!(Ok(false), inbound.process_message(&first));
        assert!(!inbound.is_done());
        // nothing visible until the commit
        assert_eq!(0, zone.len());

        assert_eq!(Ok(true), inbound.process_message(&second));
        assert_eq!(3, zone.len());
    }

    #[test]
    fn axfr_rejects_a_leading_non_soa() {
        let zone = Zone::new(name("example.com."));
        let mut inbound = Inbound::new(&zone, RdataType::AXFR, None, false).unwrap();
        let message = transfer_message(
            "example.com.",
            vec![a_record("www.example.com.", "192.0.2.1")],
        );
        assert_eq!(
            Err(XfrError::FirstRecordNotSoa),
            inbound.process_message(&message)
        );
    }

    #[test]
    fn axfr_rejects_a_mismatched_final_soa() {
        let zone = Zone::new(name("example.com."));
        let mut inbound = Inbound::new(&zone, RdataType::AXFR, None, false).unwrap();
        let message = transfer_message(
            "example.com.",
            vec![
                soa_record("example.com.", 1),
                soa_record("example.com.", 2),
            ],
        );
        assert_eq!(Err(XfrError::SoaMismatch), inbound.process_message(&message));
        assert_eq!(0, zone.len());
    }

    #[test]
    fn abandoned_transfer_rolls_back() {
        let zone = Zone::new(name("example.com."));
        {
            let mut inbound = Inbound::new(&zone, RdataType::AXFR, None, false).unwrap();
            let message = transfer_message(
                "example.com.",
                vec![
                    soa_record("example.com.", 1),
                    a_record("www.example.com.", "192.0.2.1"),
                ],
            );
            assert_eq!(Ok(false), inbound.process_message(&message));
        }
        assert_eq!(0, zone.len());
    }

    #[test]
    fn transfer_error_rcode_surfaces() {
        let zone = Zone::new(name("example.com."));
        let mut inbound = Inbound::new(&zone, RdataType::AXFR, None, false).unwrap();
        let mut message = transfer_message("example.com.", Vec::new());
        message.header.rcode = Rcode::Refused;
        assert_eq!(
            Err(XfrError::TransferError(Rcode::Refused)),
            inbound.process_message(&message)
        );
    }

    #[test]
    fn ixfr_condensed_no_change() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![
                soa_record("example.com.", 100),
                a_record("www.example.com.", "192.0.2.1"),
            ],
        );
        let mut inbound = Inbound::new(&zone, RdataType::IXFR, Some(100), false).unwrap();

        let message = transfer_message(
            "example.com.",
            vec![soa_record("example.com.", 100)],
        );
        assert_eq!(Ok(true), inbound.process_message(&message));
        drop(inbound);

        // no transaction was committed; the zone is untouched
        assert_eq!(Some(100), zone.serial());
        assert_eq!(2, zone.len());
    }

    #[test]
    fn ixfr_applies_a_diff_sequence() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![
                soa_record("example.com.", 1),
                a_record("old.example.com.", "192.0.2.1"),
                a_record("kept.example.com.", "192.0.2.3"),
            ],
        );
        let mut inbound = Inbound::new(&zone, RdataType::IXFR, Some(1), false).unwrap();

        let message = transfer_message(
            "example.com.",
            vec![
                soa_record("example.com.", 3), // opening, new serial
                soa_record("example.com.", 1), // deletions from serial 1
                a_record("old.example.com.", "192.0.2.1"),
                soa_record("example.com.", 3), // additions up to serial 3
                a_record("new.example.com.", "192.0.2.2"),
                soa_record("example.com.", 3), // terminator
            ],
        );
        assert_eq!(Ok(true), inbound.process_message(&message));

        assert_eq!(Some(3), zone.serial());
        assert!(zone.find(&name("old.example.com."), RdataType::A).is_empty());
        assert_eq!(1, zone.find(&name("new.example.com."), RdataType::A).len());
        assert_eq!(1, zone.find(&name("kept.example.com."), RdataType::A).len());
    }

    #[test]
    fn ixfr_over_udp_demands_tcp_when_incomplete() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![soa_record("example.com.", 1)],
        );
        let mut inbound = Inbound::new(&zone, RdataType::IXFR, Some(1), true).unwrap();

        // opening SOA with a newer serial, but no diff stream: the
        // datagram did not complete the transfer
        let message = transfer_message(
            "example.com.",
            vec![soa_record("example.com.", 5)],
        );
        assert_eq!(Err(XfrError::UseTcp), inbound.process_message(&message));
        drop(inbound);
        assert_eq!(Some(1), zone.serial());
    }

    #[test]
    fn messages_after_completion_are_refused() {
        let zone = Zone::new(name("example.com."));
        let mut inbound = Inbound::new(&zone, RdataType::AXFR, None, false).unwrap();
        let soa = soa_record("example.com.", 1);
        let message = transfer_message("example.com.", vec![soa.clone(), soa.clone()]);
        assert_eq!(Ok(true), inbound.process_message(&message));
        assert_eq!(
            Err(XfrError::AlreadyFinished),
            inbound.process_message(&message)
        );
    }

    #[test]
    fn make_query_without_serial_is_axfr() {
        let zone = Zone::new(name("example.com."));
        let (query, serial) = make_query(&zone, None);
        assert_eq!(RdataType::AXFR, query.questions[0].rdtype);
        assert_eq!(None, serial);
        assert!(query.authority.is_empty());
        assert_eq!(Ok(None), extract_serial_from_query(&query));
    }

    #[test]
    fn make_query_with_zero_uses_the_zone_serial() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![soa_record("example.com.", 42)],
        );
        let (query, serial) = make_query(&zone, Some(0));
        assert_eq!(RdataType::IXFR, query.questions[0].rdtype);
        assert_eq!(Some(42), serial);
        assert_eq!(1, query.authority.len());
        assert_eq!(Ok(Some(42)), extract_serial_from_query(&query));

        // a zone with no SOA forces AXFR
        let empty = Zone::new(name("example.com."));
        let (query, serial) = make_query(&empty, Some(0));
        assert_eq!(RdataType::AXFR, query.questions[0].rdtype);
        assert_eq!(None, serial);
    }

    #[test]
    fn extract_serial_rejects_malformed_queries() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![soa_record("example.com.", 42)],
        );
        let (mut query, _) = make_query(&zone, Some(7));
        query.authority.clear();
        assert_eq!(Err(XfrError::BadIxfrQuery), extract_serial_from_query(&query));

        let plain = Message::from_question(
            1,
            Question {
                name: name("example.com."),
                rdtype: RdataType::A,
                rdclass: RdataClass::IN,
            },
        );
        assert_eq!(
            Err(XfrError::NotATransferType(RdataType::A)),
            extract_serial_from_query(&plain)
        );
    }
}
