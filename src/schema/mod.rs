//! Schema index: typed model, ingestion from the raw dictionary payload,
//! and the TTL-based cache that owns the current snapshot.

pub mod cache;
pub mod ingest;
pub mod model;

pub use cache::{SchemaCache, SchemaFetcher};
pub use ingest::build_index;
pub use model::{
    Entity, EntitySummary, FieldType, GraphPosition, Multiplicity, Property, RelDirection,
    RelationshipRef, SchemaIndex,
};
