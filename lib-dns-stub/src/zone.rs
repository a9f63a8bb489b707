//! An owned, transactional store of one zone's records.
//!
//! This is the concrete [`TransactionManager`] the transfer machine
//! writes into.  Writes stage a private copy of the contents; commit
//! swaps it in atomically, rollback drops it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dns_wire::message::types::{RdataType, RecordData, ResourceRecord};
use dns_wire::name::Name;

use crate::xfr::{Transaction, TransactionError, TransactionManager};

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] zone mutex poisoned, cannot recover from this - aborting";

type Records = HashMap<Name, Vec<ResourceRecord>>;

/// A zone: an origin and the records under it.  Cloning is cheap and
/// shares the contents.
#[derive(Debug, Clone)]
pub struct Zone {
    inner: Arc<Mutex<ZoneData>>,
}

#[derive(Debug)]
struct ZoneData {
    origin: Name,
    records: Records,
}

impl Zone {
    pub fn new(origin: Name) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ZoneData {
                origin,
                records: HashMap::new(),
            })),
        }
    }

    /// Build a zone from parsed records, e.g. the output of
    /// [`crate::zonefile::parse`].
    pub fn from_records(origin: Name, records: Vec<ResourceRecord>) -> Self {
        let zone = Self::new(origin);
        {
            let mut inner = zone.inner.lock().expect(MUTEX_POISON_MESSAGE);
            for rr in records {
                add_record(&mut inner.records, &rr);
            }
        }
        zone
    }

    /// The records at a name with the given type (or all of them, for
    /// ANY).
    pub fn find(&self, name: &Name, rdtype: RdataType) -> Vec<ResourceRecord> {
        let inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        match inner.records.get(name) {
            Some(rrs) => rrs
                .iter()
                .filter(|rr| rr.rtype().matches(rdtype))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every record in the zone, in no particular order.
    pub fn all_records(&self) -> Vec<ResourceRecord> {
        let inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        inner.records.values().flatten().cloned().collect()
    }

    /// The zone's SOA record, at its origin.
    pub fn soa(&self) -> Option<ResourceRecord> {
        let inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        inner
            .records
            .get(&inner.origin)
            .and_then(|rrs| rrs.iter().find(|rr| rr.rtype() == RdataType::SOA))
            .cloned()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        inner.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionManager for Zone {
    fn origin(&self) -> Name {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).origin.clone()
    }

    fn serial(&self) -> Option<u32> {
        match self.soa()?.rdata {
            RecordData::Soa { serial, .. } => Some(serial),
            _ => None,
        }
    }

    fn writer(&self, replacement: bool) -> Box<dyn Transaction> {
        let staged = if replacement {
            HashMap::new()
        } else {
            self.inner.lock().expect(MUTEX_POISON_MESSAGE).records.clone()
        };
        Box::new(ZoneTransaction {
            target: self.clone(),
            staged,
            finished: false,
        })
    }
}

/// Replace-then-push: an identical record only exists once, and an
/// SOA replaces the SOA.
fn add_record(records: &mut Records, rr: &ResourceRecord) {
    let entry = records.entry(rr.name.clone()).or_default();
    if rr.rtype() == RdataType::SOA {
        entry.retain(|existing| existing.rtype() != RdataType::SOA);
    } else {
        entry.retain(|existing| {
            !(existing.rtype() == rr.rtype()
                && existing.rclass == rr.rclass
                && existing.rdata == rr.rdata)
        });
    }
    entry.push(rr.clone());
}

fn delete_record(records: &mut Records, rr: &ResourceRecord) {
    if let Some(entry) = records.get_mut(&rr.name) {
        entry.retain(|existing| {
            !(existing.rtype() == rr.rtype() && existing.rdata == rr.rdata)
        });
        if entry.is_empty() {
            records.remove(&rr.name);
        }
    }
}

struct ZoneTransaction {
    target: Zone,
    staged: Records,
    finished: bool,
}

impl Transaction for ZoneTransaction {
    fn add(&mut self, rr: &ResourceRecord) -> Result<(), TransactionError> {
        if self.finished {
            return Err(TransactionError);
        }
        add_record(&mut self.staged, rr);
        Ok(())
    }

    fn delete(&mut self, rr: &ResourceRecord) -> Result<(), TransactionError> {
        if self.finished {
            return Err(TransactionError);
        }
        delete_record(&mut self.staged, rr);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TransactionError> {
        if self.finished {
            return Err(TransactionError);
        }
        self.finished = true;
        let mut inner = self.target.inner.lock().expect(MUTEX_POISON_MESSAGE);
        inner.records = std::mem::take(&mut self.staged);
        Ok(())
    }

    fn rollback(&mut self) {
        self.finished = true;
        self.staged.clear();
    }
}

#[cfg(test)]
mod tests {
    use dns_wire::message::types::test_util::*;

    use super::*;

    #[test]
    fn records_are_found_by_name_and_type() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![
                soa_record("example.com.", 1),
                a_record("www.example.com.", "192.0.2.1"),
                a_record("www.example.com.", "192.0.2.2"),
                cname_record("alias.example.com.", "www.example.com."),
            ],
        );

        assert_eq!(2, zone.find(&name("www.example.com."), RdataType::A).len());
        assert_eq!(
            1,
            zone.find(&name("alias.example.com."), RdataType::ANY).len()
        );
        assert!(zone.find(&name("www.example.com."), RdataType::MX).is_empty());
        assert!(zone.find(&name("missing.example.com."), RdataType::A).is_empty());
        assert_eq!(Some(1), zone.serial());
    }

    #[test]
    fn duplicate_records_collapse() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![
                a_record("www.example.com.", "192.0.2.1"),
                a_record("www.example.com.", "192.0.2.1"),
            ],
        );
        assert_eq!(1, zone.len());
    }

    #[test]
    fn a_new_soa_replaces_the_old_one() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![soa_record("example.com.", 1), soa_record("example.com.", 2)],
        );
        assert_eq!(Some(2), zone.serial());
        assert_eq!(1, zone.len());
    }

    #[test]
    fn transactions_are_atomic() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![a_record("www.example.com.", "192.0.2.1")],
        );

        let mut txn = zone.writer(false);
        txn.add(&a_record("new.example.com.", "192.0.2.9")).unwrap();
        txn.delete(&a_record("www.example.com.", "192.0.2.1")).unwrap();
        // not yet visible
        assert_eq!(1, zone.len());
        assert!(zone.find(&name("new.example.com."), RdataType::A).is_empty());

        txn.commit().unwrap();
        assert_eq!(1, zone.len());
        assert_eq!(1, zone.find(&name("new.example.com."), RdataType::A).len());
        assert!(zone.find(&name("www.example.com."), RdataType::A).is_empty());
    }

    #[test]
    fn rollback_discards_staged_changes() {
        let zone = Zone::new(name("example.com."));
        let mut txn = zone.writer(false);
        txn.add(&a_record("a.example.com.", "192.0.2.1")).unwrap();
        txn.rollback();
        assert!(zone.is_empty());
        assert_eq!(Err(TransactionError), txn.add(&a_record("a.example.com.", "192.0.2.1")));
        assert_eq!(Err(TransactionError), txn.commit());
    }

    #[test]
    fn replacement_writer_starts_empty() {
        let zone = Zone::from_records(
            name("example.com."),
            vec![a_record("www.example.com.", "192.0.2.1")],
        );
        let mut txn = zone.writer(true);
        txn.add(&a_record("only.example.com.", "192.0.2.9")).unwrap();
        txn.commit().unwrap();

        assert_eq!(1, zone.len());
        assert!(zone.find(&name("www.example.com."), RdataType::A).is_empty());
    }

    #[test]
    fn deleting_a_missing_record_is_fine() {
        let zone = Zone::new(name("example.com."));
        let mut txn = zone.writer(false);
        assert_eq!(Ok(()), txn.delete(&a_record("nope.example.com.", "192.0.2.1")));
        txn.commit().unwrap();
        assert!(zone.is_empty());
    }
}
