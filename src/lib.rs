pub mod config;
pub mod error;
pub mod rules;

pub use config::Settings;
pub use error::{Result, RuleError};
pub use rules::{parse_rule, Rule, RuleParser};
