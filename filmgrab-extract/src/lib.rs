//! Poster and synopsis extraction from rendered film pages.
//!
//! - [`cascade`]: ordered poster strategies with placeholder rejection
//! - [`overview`]: synopsis text probes
//! - [`assemble`]: URL canonicalisation and the result record
//! - [`alternate`]: optional third-party metadata lookup
//! - [`normalize`]: pure helpers shared by the above
//! - [`pipeline`]: browser-backed end-to-end run
//!
//! The pipeline never fails outright: [`pipeline::extract`] always returns
//! a well-formed [`filmgrab_common::ExtractionResult`].

pub mod alternate;
pub mod assemble;
pub mod cascade;
pub mod normalize;
pub mod overview;
pub mod pipeline;

pub use pipeline::{Extractor, extract};
