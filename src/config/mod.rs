pub mod settings;

pub use settings::{BatchConfig, ParserConfig, Settings, UnknownKeywords};
