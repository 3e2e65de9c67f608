//! Parsers for ENEX note records and their ENML bodies.

pub mod enml;
pub mod note;

pub use enml::parse_enml;
pub use note::{ParseOptions, parse_note, parse_timestamp};
