//! DNS messages: the in-memory model and its wire codec.
//!
//! Serialisation here writes uncompressed names; the `renderer`
//! module is the compressing, size-aware path used to build queries.

pub mod deserialise;
pub mod serialise;
pub mod types;
