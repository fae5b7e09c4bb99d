//! # Tweet Indexer Shared
//!
//! Types shared by every layer of the tweet indexer:
//!
//! - [`SourceEvent`] and its nested sub-objects, as received from the stream
//! - [`Document`], the dynamically-typed record written to the search index
//! - [`FieldValue`] / [`FieldType`], the typed values and the field-name
//!   suffix convention that ties them together

pub mod document;
pub mod event;

pub use document::{
    document_id, Document, DocumentError, FieldType, FieldValue, DOCUMENT_ID_PREFIX,
};
pub use event::{
    Entities, GeoLocation, Hashtag, Place, PlaceAttributes, SourceEvent, User, UserMention,
};
