//! Extraction logic for the voice-to-quote pipeline.
//!
//! Everything in this crate is pure: no I/O, no clock beyond timestamps
//! passed in by the caller. The api crate feeds it raw model output and
//! user corrections; it hands back validated, normalized quote data.
//!
//! - `normalize`: vague spoken quantities, ranges and unit aliases
//! - `parse`: strict schema parse of the inference response
//! - `gate`: confidence and validation gate (review decisions)
//! - `merge`: fail-closed merge of user corrections

pub mod gate;
pub mod merge;
pub mod normalize;
pub mod parse;

pub use gate::{can_confirm, confidence_band, remaining_issues, requires_review};
pub use merge::apply_corrections;
pub use normalize::{canonical_unit, parse_numeric_phrase, ParsedNumber};
pub use parse::parse_extraction;
