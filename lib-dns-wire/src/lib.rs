#![warn(clippy::pedantic)]
// Sometimes a redundant else is clearer
#![allow(clippy::redundant_else)]
// Don't care enough to fix
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

//! The wire side of a DNS stub resolver: names, messages, and the
//! machinery for building and signing them.

pub mod edns;
pub mod flags;
pub mod message;
pub mod name;
pub mod rcode;
pub mod renderer;
pub mod reversename;
pub mod serial;
pub mod tsig;
pub mod ttl;
pub mod update;
pub mod wire;
