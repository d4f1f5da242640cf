pub mod gazetteer;
pub mod patterns;
pub mod records;
pub mod validate;

pub use gazetteer::{Gazetteer, GAZETTEER_TYPES};
pub use patterns::PatternExtractor;
pub use records::{parse_records, parse_records_value};
pub use validate::{validate, ValidationReport};
