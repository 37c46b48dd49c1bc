#![forbid(unsafe_code)]

//! corpair — aligned corpus pair builder.
//!
//! Ingests a flat CSV of talk-page contributions plus a CSV of reference
//! documents, infers a reply-to parent for every message from arrival order
//! and leading-quote depth, joins the two sources on document id, and emits
//! two aligned CSV tables (threads and documents) ready for topic-model
//! training.

pub mod error;
pub mod ingest;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod resolver;
