//! Page normalization and field extraction.

pub mod builder;
pub mod fields;
pub mod normalize;
pub mod rules;

pub use builder::{prepare_upsert, PageMetadata, PolicyRecordBuilder};
pub use fields::{ExtractedFields, Extracted, ExtractionHints, FieldExtractor};
pub use normalize::{NormalizedPage, TextNormalizer};
