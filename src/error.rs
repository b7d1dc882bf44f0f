use thiserror::Error;

/// Main error type for ks-rules
#[derive(Error, Debug)]
pub enum RuleError {
    /// Unterminated quoted string or an invalid direction marker
    #[error("Lex error: {0}")]
    LexError(String),

    /// Header or option list does not follow the rule grammar
    #[error("Syntax error: {0}")]
    SyntaxError(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// A clause value could not be interpreted (bad number, bad content literal, ...)
    #[error("Invalid field value: {0}")]
    InvalidFieldValue(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Thread error: {0}")]
    ThreadError(String),
}

impl RuleError {
    /// True for the error kinds produced while parsing rule text
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            RuleError::LexError(_)
                | RuleError::SyntaxError(_)
                | RuleError::MissingRequiredField(_)
                | RuleError::InvalidFieldValue(_)
        )
    }
}

/// Result type alias for ks-rules operations
pub type Result<T> = std::result::Result<T, RuleError>;
