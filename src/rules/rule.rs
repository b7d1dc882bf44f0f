/// Snort/Suricata rule structures
use super::content;
use super::options::Keyword;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Address and port half of a rule header.
///
/// Tokens are kept verbatim: they may reference rule variables (`$HOME_NET`),
/// carry negations (`!80`) or ranges (`1024:`), none of which are validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub nets: Vec<String>,
    pub ports: Vec<String>,
}

impl Network {
    pub fn new<N, P>(nets: N, ports: P) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            nets: nets.into_iter().map(Into::into).collect(),
            ports: ports.into_iter().map(Into::into).collect(),
        }
    }
}

fn write_spec_list(f: &mut fmt::Formatter<'_>, list: &[String]) -> fmt::Result {
    match list {
        [single] => write!(f, "{}", single),
        _ => write!(f, "[{}]", list.join(",")),
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_spec_list(f, &self.nets)?;
        write!(f, " ")?;
        write_spec_list(f, &self.ports)
    }
}

/// Logical data region a content is evaluated against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferContext {
    /// Packet payload (or reassembled stream)
    #[default]
    Packet,
    /// Reconstructed file data (HTTP bodies, SMTP attachments, ...)
    FileData,
    /// Output of a preceding base64_decode
    Base64Data,
}

impl BufferContext {
    /// Keyword that switches a rule into this buffer
    pub fn keyword(&self) -> &'static str {
        match self {
            BufferContext::Packet => "pkt_data",
            BufferContext::FileData => "file_data",
            BufferContext::Base64Data => "base64_data",
        }
    }
}

impl fmt::Display for BufferContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Fast pattern selection for a content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FastPattern {
    #[default]
    Disabled,
    /// `fast_pattern`
    Enabled,
    /// `fast_pattern:only`
    EnabledOnly,
    /// `fast_pattern:<offset>,<length>`
    EnabledRange { offset: u32, length: u32 },
}

impl FastPattern {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, FastPattern::Disabled)
    }
}

impl fmt::Display for FastPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FastPattern::Disabled => Ok(()),
            FastPattern::Enabled => write!(f, "fast_pattern"),
            FastPattern::EnabledOnly => write!(f, "fast_pattern:only"),
            FastPattern::EnabledRange { offset, length } => {
                write!(f, "fast_pattern:{},{}", offset, length)
            }
        }
    }
}

/// Modifier attached to a content (`nocase`, `offset:3`, `http_uri`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentOption {
    pub name: String,
    /// Argument of the modifier, 0 for modifiers that take none
    pub value: i64,
}

impl ContentOption {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, 0)
    }
}

impl fmt::Display for ContentOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Keyword::lookup(&self.name) {
            Keyword::ContentFlag => write!(f, "{}", self.name),
            _ => write!(f, "{}:{}", self.name, self.value),
        }
    }
}

/// One `content` clause and the modifiers that followed it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Decoded bytes of the content literal
    pub pattern: Vec<u8>,
    pub negate: bool,
    /// Buffer that was active when the content was declared
    pub buffer: BufferContext,
    pub options: Vec<ContentOption>,
    pub fast_pattern: FastPattern,
}

impl Content {
    pub fn new(pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    /// Value of the first modifier with this name
    pub fn option(&self, name: &str) -> Option<i64> {
        self.options
            .iter()
            .find(|opt| opt.name == name)
            .map(|opt| opt.value)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|opt| opt.name == name)
    }

    pub fn distance(&self) -> Option<i64> {
        self.option("distance")
    }

    pub fn within(&self) -> Option<i64> {
        self.option("within")
    }

    /// Pattern as a regex fragment matching the bytes literally
    pub fn to_regex(&self) -> String {
        content::to_regex_fragment(&self.pattern)
    }

    /// Pattern in canonical content-literal form (without quotes)
    pub fn format_pattern(&self) -> String {
        content::to_canonical_form(&self.pattern)
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "content:{}\"{}\"",
            if self.negate { "!" } else { "" },
            self.format_pattern()
        )?;
        for opt in &self.options {
            write!(f, "; {}", opt)?;
        }
        if self.fast_pattern.is_enabled() {
            write!(f, "; {}", self.fast_pattern)?;
        }
        Ok(())
    }
}

/// External reference (`reference:cve,2014-0160`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Reference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reference:{},{}", self.kind, self.value)
    }
}

/// Complete parsed rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule action (alert, drop, pass, ...)
    pub action: String,
    pub protocol: String,
    pub source: Network,
    pub destination: Network,
    /// True when the header used `<>`
    pub bidirectional: bool,
    /// Signature ID
    pub sid: u32,
    pub revision: u32,
    /// Text of the `msg` clause
    pub description: String,
    /// Content clauses in rule order
    pub contents: Vec<Content>,
    pub references: Vec<Reference>,
    /// Raw values of tag keywords (`classtype`, `flow`, ...)
    pub tags: HashMap<String, String>,
}

impl Rule {
    pub fn tag(&self, keyword: &str) -> Option<&str> {
        self.tags.get(keyword).map(String::as_str)
    }
}

impl FromStr for Rule {
    type Err = crate::error::RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::parser::parse_rule(s)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} (",
            self.action,
            self.protocol,
            self.source,
            if self.bidirectional { "<>" } else { "->" },
            self.destination
        )?;

        let mut clauses = Vec::new();
        if !self.description.is_empty() {
            clauses.push(format!(
                "msg:\"{}\"",
                content::escape_text(&self.description)
            ));
        }

        let mut buffer = BufferContext::default();
        for c in &self.contents {
            if c.buffer != buffer {
                clauses.push(c.buffer.keyword().to_string());
                buffer = c.buffer;
            }
            clauses.push(c.to_string());
        }

        clauses.extend(self.references.iter().map(ToString::to_string));

        let mut tags: Vec<_> = self.tags.iter().collect();
        tags.sort();
        clauses.extend(tags.into_iter().map(|(k, v)| format!("{}:{}", k, v)));

        clauses.push(format!("sid:{}", self.sid));
        if self.revision != 0 {
            clauses.push(format!("rev:{}", self.revision));
        }

        write!(f, "{};)", clauses.join("; "))
    }
}
