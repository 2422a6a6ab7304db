//! Provenance assertions
//!
//! An assertion is the canonical serialized graph relating a document to
//! its file, transcript, and metadata, plus the extraction activities that
//! produced them. The graph is built per ingestion, serialized, and
//! discarded; the serialized form is what gets content-addressed and
//! persisted.

mod builder;
pub mod canon;
mod term;
pub mod vocab;


pub use builder::{
    AssertionBuilder, AssertionInput, IncompleteAssertionInput, ReadBack, UriPolicy,
};
pub use term::{Iri, Literal, Statement, Term};
