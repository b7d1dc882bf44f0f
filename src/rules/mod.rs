// Rule engine - Snort/Suricata rule parsing and regex synthesis
pub mod batch;
pub mod content;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod rule;
pub mod synth;

pub use lexer::{tokenize, Lexer, Token};
pub use options::{Clause, ClauseState, Keyword, Value};
pub use parser::{parse_rule, RuleParser};
pub use rule::{BufferContext, Content, ContentOption, FastPattern, Network, Reference, Rule};
