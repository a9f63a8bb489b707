//! DNS dynamic update messages, RFC 2136.
//!
//! An update message reuses the four message sections under new
//! names: ZONE is the question area, PREREQ the answer area, UPDATE
//! the authority area.  Prerequisites and deletions are expressed
//! with the ANY and NONE sentinel classes and empty RDATA.

use crate::message::types::{Opcode, Question, RdataClass, RdataType, RecordData, ResourceRecord};
use crate::name::Name;
use crate::renderer::{Renderer, RendererError, Section};
use crate::tsig::{Key, Signer};

/// One entry of the prerequisite or update section.  Unlike a
/// [`ResourceRecord`], the type and data are decoupled: the ANY/NONE
/// sentinels pair a bare type with empty RDATA.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UpdateRecord {
    pub name: Name,
    pub rtype: RdataType,
    pub rclass: RdataClass,
    pub ttl: u32,
    pub rdata: Option<RecordData>,
}

/// A message with opcode UPDATE under construction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UpdateMessage {
    pub id: u16,
    zone_name: Name,
    zone_class: RdataClass,
    prerequisites: Vec<UpdateRecord>,
    updates: Vec<UpdateRecord>,
    additional: Vec<ResourceRecord>,
}

impl UpdateMessage {
    /// Start an update for *zone*.  The ZONE section is a single
    /// SOA-typed question naming it.
    pub fn new(id: u16, zone: Name, rdclass: RdataClass) -> Self {
        Self {
            id,
            zone_name: zone,
            zone_class: rdclass,
            prerequisites: Vec::new(),
            updates: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn zone(&self) -> Question {
        Question {
            name: self.zone_name.clone(),
            rdtype: RdataType::SOA,
            rdclass: self.zone_class,
        }
    }

    pub fn prerequisites(&self) -> &[UpdateRecord] {
        &self.prerequisites
    }

    pub fn updates(&self) -> &[UpdateRecord] {
        &self.updates
    }

    /// Add a record to the zone.
    pub fn add(&mut self, name: Name, ttl: u32, rdata: RecordData) {
        self.updates.push(UpdateRecord {
            name,
            rtype: rdata.rtype(),
            rclass: self.zone_class,
            ttl,
            rdata: Some(rdata),
        });
    }

    /// Delete every record at a name.
    pub fn delete_name(&mut self, name: Name) {
        self.updates.push(UpdateRecord {
            name,
            rtype: RdataType::ANY,
            rclass: RdataClass::ANY,
            ttl: 0,
            rdata: None,
        });
    }

    /// Delete an entire RRset.
    pub fn delete_rrset(&mut self, name: Name, rtype: RdataType) {
        self.updates.push(UpdateRecord {
            name,
            rtype,
            rclass: RdataClass::ANY,
            ttl: 0,
            rdata: None,
        });
    }

    /// Delete one specific record.
    pub fn delete_rdata(&mut self, name: Name, rdata: RecordData) {
        self.updates.push(UpdateRecord {
            name,
            rtype: rdata.rtype(),
            rclass: RdataClass::NONE,
            ttl: 0,
            rdata: Some(rdata),
        });
    }

    /// Replace an RRset with the given record: a delete of the RRset
    /// followed by an add.
    pub fn replace(&mut self, name: Name, ttl: u32, rdata: RecordData) {
        self.delete_rrset(name.clone(), rdata.rtype());
        self.add(name, ttl, rdata);
    }

    /// Require that the name owns at least one record.
    pub fn present_name(&mut self, name: Name) {
        self.prerequisites.push(UpdateRecord {
            name,
            rtype: RdataType::ANY,
            rclass: RdataClass::ANY,
            ttl: 0,
            rdata: None,
        });
    }

    /// Require that an RRset of the given type exists, whatever its
    /// value.
    pub fn present_rtype(&mut self, name: Name, rtype: RdataType) {
        self.prerequisites.push(UpdateRecord {
            name,
            rtype,
            rclass: RdataClass::ANY,
            ttl: 0,
            rdata: None,
        });
    }

    /// Require that this exact record exists.
    pub fn present_rdata(&mut self, name: Name, rdata: RecordData) {
        self.prerequisites.push(UpdateRecord {
            name,
            rtype: rdata.rtype(),
            rclass: self.zone_class,
            ttl: 0,
            rdata: Some(rdata),
        });
    }

    /// Require that the name (or, with a type, the RRset) does not
    /// exist.
    pub fn absent(&mut self, name: Name, rtype: Option<RdataType>) {
        self.prerequisites.push(UpdateRecord {
            name,
            rtype: rtype.unwrap_or(RdataType::ANY),
            rclass: RdataClass::NONE,
            ttl: 0,
            rdata: None,
        });
    }

    /// Carry an additional record, e.g. an OPT.
    pub fn add_additional(&mut self, rr: ResourceRecord) {
        self.additional.push(rr);
    }

    /// Render the update to wire format, optionally signing it.
    ///
    /// # Errors
    ///
    /// If the message does not fit in *max_size* or a name cannot be
    /// written.
    pub fn to_wire(
        &self,
        max_size: usize,
        tsig: Option<(&dyn Signer, &Key)>,
    ) -> Result<Vec<u8>, RendererError> {
        let flags = Opcode::Update.to_flags();
        let mut renderer = Renderer::new(Some(self.id), flags, max_size, None);

        renderer.add_question(&self.zone())?;
        for record in &self.prerequisites {
            renderer.add_record(
                Section::Answer,
                &record.name,
                record.rtype,
                record.rclass,
                record.ttl,
                record.rdata.as_ref(),
            )?;
        }
        for record in &self.updates {
            renderer.add_record(
                Section::Authority,
                &record.name,
                record.rtype,
                record.rclass,
                record.ttl,
                record.rdata.as_ref(),
            )?;
        }
        for rr in &self.additional {
            renderer.add_rr(Section::Additional, rr)?;
        }
        renderer.write_header();
        if let Some((signer, key)) = tsig {
            renderer.add_tsig(signer, key, 300, 0, &[], &[])?;
        }
        Ok(renderer.into_wire())
    }
}
