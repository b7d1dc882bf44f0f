/// Option keyword table and per-rule clause state
use super::content;
use super::rule::{BufferContext, Content, ContentOption, FastPattern, Reference, Rule};
use crate::config::{ParserConfig, UnknownKeywords};
use crate::error::{RuleError, Result};
use std::str::FromStr;
use tracing::{debug, trace, warn};

/// Content modifiers that take no argument
const CONTENT_FLAGS: &[&str] = &[
    "nocase",
    "rawbytes",
    "startswith",
    "endswith",
    "http_header",
    "http_raw_header",
    "http_uri",
    "http_raw_uri",
    "http_method",
    "http_cookie",
    "http_raw_cookie",
    "http_client_body",
    "http_stat_code",
    "http_stat_msg",
    "http_host",
    "http_raw_host",
    "http_user_agent",
];

/// Content modifiers with an integer argument
const CONTENT_NUMERIC: &[&str] = &["depth", "offset", "distance", "within"];

/// Keywords whose raw value is kept in `Rule::tags`
const TAG_KEYWORDS: &[&str] = &[
    "classtype",
    "flow",
    "flowbits",
    "flowint",
    "priority",
    "threshold",
    "detection_filter",
    "tag",
    "target",
    "app-layer-protocol",
    "dsize",
    "itype",
    "icode",
    "ttl",
    "gid",
    "flags",
    "ipopts",
    "ip_proto",
    "geoip",
    "fragbits",
    "fragoffset",
    "tos",
    "window",
];

/// What a clause keyword does to the rule being built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Sid,
    Rev,
    Msg,
    Content,
    ContentFlag,
    ContentNumeric,
    FastPattern,
    Buffer(BufferContext),
    Reference,
    Tag,
    /// Accepted and discarded (`metadata`, `pcre`, ...)
    Unknown,
}

impl Keyword {
    pub fn lookup(name: &str) -> Keyword {
        match name {
            "sid" => Keyword::Sid,
            "rev" => Keyword::Rev,
            "msg" => Keyword::Msg,
            "content" => Keyword::Content,
            "fast_pattern" => Keyword::FastPattern,
            "pkt_data" => Keyword::Buffer(BufferContext::Packet),
            "file_data" => Keyword::Buffer(BufferContext::FileData),
            "base64_data" => Keyword::Buffer(BufferContext::Base64Data),
            "reference" => Keyword::Reference,
            _ if CONTENT_FLAGS.contains(&name) => Keyword::ContentFlag,
            _ if CONTENT_NUMERIC.contains(&name) => Keyword::ContentNumeric,
            _ if TAG_KEYWORDS.contains(&name) => Keyword::Tag,
            _ => Keyword::Unknown,
        }
    }
}

/// Value part of a clause, after the `:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    /// Quoted string contents, escapes not yet resolved
    Quoted(&'a str),
    /// Unquoted text
    Bare(&'a str),
    /// `:` followed directly by `;` or `)`
    Empty,
}

/// One `keyword[:[!]value]` clause of the option list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clause<'a> {
    pub keyword: &'a str,
    pub negated: bool,
    /// `None` when the keyword had no `:`
    pub value: Option<Value<'a>>,
}

impl<'a> Clause<'a> {
    pub fn bare(keyword: &'a str) -> Self {
        Self {
            keyword,
            negated: false,
            value: None,
        }
    }

    pub fn with_value(keyword: &'a str, value: Value<'a>) -> Self {
        Self {
            keyword,
            negated: false,
            value: Some(value),
        }
    }

    /// Value text as written in the rule
    fn raw(&self) -> Result<String> {
        let bang = if self.negated { "!" } else { "" };
        match self.value {
            Some(Value::Quoted(s)) => Ok(format!("{}\"{}\"", bang, s)),
            Some(Value::Bare(s)) => Ok(format!("{}{}", bang, s)),
            Some(Value::Empty) => Err(self.invalid("empty value")),
            None => Err(self.missing_value()),
        }
    }

    fn integer<T: FromStr>(&self) -> Result<T> {
        match self.value {
            Some(Value::Bare(raw)) if !self.negated => raw
                .trim()
                .parse()
                .map_err(|_| self.invalid(&format!("expected integer, got {:?}", raw))),
            Some(Value::Quoted(raw)) => {
                Err(self.invalid(&format!("expected integer, got \"{}\"", raw)))
            }
            Some(_) => Err(self.invalid("expected integer")),
            None => Err(self.missing_value()),
        }
    }

    fn invalid(&self, message: &str) -> RuleError {
        RuleError::InvalidFieldValue(format!("{}: {}", self.keyword, message))
    }

    fn missing_value(&self) -> RuleError {
        RuleError::SyntaxError(format!("{}: missing ':' and value", self.keyword))
    }

    fn reject_value(&self) -> Result<()> {
        match self.value {
            None => Ok(()),
            Some(_) => Err(self.invalid("takes no value")),
        }
    }
}

/// State carried from clause to clause while one rule is parsed
#[derive(Debug)]
pub struct ClauseState<'c> {
    config: &'c ParserConfig,
    /// Index of the content that modifiers attach to
    active_content: Option<usize>,
    buffer: BufferContext,
    seen_sid: bool,
}

impl<'c> ClauseState<'c> {
    pub fn new(config: &'c ParserConfig) -> Self {
        Self {
            config,
            active_content: None,
            buffer: BufferContext::default(),
            seen_sid: false,
        }
    }

    /// Apply one clause to the rule
    pub fn apply(&mut self, rule: &mut Rule, clause: &Clause<'_>) -> Result<()> {
        let keyword = Keyword::lookup(clause.keyword);
        trace!("Clause {} -> {:?}", clause.keyword, keyword);

        match keyword {
            Keyword::Sid => {
                rule.sid = clause.integer()?;
                self.seen_sid = true;
            }
            Keyword::Rev => rule.revision = clause.integer()?,
            Keyword::Msg => match clause.value {
                Some(Value::Quoted(raw)) if !clause.negated => {
                    rule.description = content::unescape_text(raw)?;
                }
                _ => return Err(clause.invalid("expected quoted string")),
            },
            Keyword::Content => self.add_content(rule, clause)?,
            Keyword::ContentFlag => {
                let active = self.active_content(rule, clause)?;
                clause.reject_value()?;
                active.options.push(ContentOption::flag(clause.keyword));
            }
            Keyword::ContentNumeric => {
                let active = self.active_content(rule, clause)?;
                let value = clause.integer()?;
                active.options.push(ContentOption::new(clause.keyword, value));
            }
            Keyword::FastPattern => {
                let active = self.active_content(rule, clause)?;
                active.fast_pattern = parse_fast_pattern(clause)?;
            }
            Keyword::Buffer(buffer) => {
                clause.reject_value()?;
                self.buffer = buffer;
            }
            Keyword::Reference => rule.references.push(parse_reference(clause)?),
            Keyword::Tag => {
                rule.tags.insert(clause.keyword.to_string(), clause.raw()?);
            }
            Keyword::Unknown => match self.config.unknown_keywords {
                UnknownKeywords::Ignore => debug!("Ignoring option: {}", clause.keyword),
                UnknownKeywords::Warn => warn!("Ignoring unsupported option: {}", clause.keyword),
            },
        }

        Ok(())
    }

    /// Close the option list, checking required fields
    pub fn finish(self, rule: Rule) -> Result<Rule> {
        if !self.seen_sid {
            return Err(RuleError::MissingRequiredField("sid".to_string()));
        }
        Ok(rule)
    }

    fn add_content(&mut self, rule: &mut Rule, clause: &Clause<'_>) -> Result<()> {
        let raw = match clause.value {
            Some(Value::Quoted(raw)) => raw,
            Some(Value::Empty) => return Err(clause.invalid("empty content")),
            Some(Value::Bare(raw)) => {
                return Err(clause.invalid(&format!("expected quoted literal, got {:?}", raw)))
            }
            None => return Err(clause.missing_value()),
        };

        let pattern = content::decode(raw)?;
        rule.contents.push(Content {
            pattern,
            negate: clause.negated,
            buffer: self.buffer,
            ..Default::default()
        });
        self.active_content = Some(rule.contents.len() - 1);
        Ok(())
    }

    fn active_content<'r>(
        &self,
        rule: &'r mut Rule,
        clause: &Clause<'_>,
    ) -> Result<&'r mut Content> {
        self.active_content
            .and_then(|i| rule.contents.get_mut(i))
            .ok_or_else(|| {
                RuleError::SyntaxError(format!(
                    "{} must follow a content clause",
                    clause.keyword
                ))
            })
    }
}

fn parse_fast_pattern(clause: &Clause<'_>) -> Result<FastPattern> {
    let raw = match clause.value {
        None => return Ok(FastPattern::Enabled),
        Some(Value::Bare(raw)) if !clause.negated => raw.trim(),
        Some(_) => return Err(clause.invalid("expected 'only' or <offset>,<length>")),
    };

    if raw == "only" {
        return Ok(FastPattern::EnabledOnly);
    }

    let range = raw
        .split_once(',')
        .and_then(|(offset, length)| {
            Some(FastPattern::EnabledRange {
                offset: offset.trim().parse().ok()?,
                length: length.trim().parse().ok()?,
            })
        });

    range.ok_or_else(|| {
        clause.invalid(&format!(
            "expected 'only' or <offset>,<length>, got {:?}",
            raw
        ))
    })
}

fn parse_reference(clause: &Clause<'_>) -> Result<Reference> {
    let raw = clause.raw()?;
    match raw.split_once(',') {
        Some((kind, value)) if !kind.trim().is_empty() => {
            Ok(Reference::new(kind.trim(), value.trim()))
        }
        _ => Err(clause.invalid(&format!("expected <type>,<value>, got {:?}", raw))),
    }
}
