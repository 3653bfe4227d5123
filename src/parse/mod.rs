pub mod nlp_parser;

pub use nlp_parser::{ParsedTask, parse, parse_at};
