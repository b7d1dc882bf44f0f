/// Snort/Suricata rule parser
use super::lexer::{Lexer, Token};
use super::options::{Clause, ClauseState, Value};
use super::rule::{Network, Rule};
use crate::config::{ParserConfig, Settings};
use crate::error::{Result, RuleError};
use tracing::debug;

/// Deepest bracket nesting accepted in address and port lists
const MAX_LIST_DEPTH: usize = 16;

/// Parse a complete rule with the default configuration
/// Example: alert tcp $EXTERNAL_NET any -> $HOME_NET 80 (msg:"Test"; sid:1;)
pub fn parse_rule(input: &str) -> Result<Rule> {
    RuleParser::default().parse(input)
}

/// Rule parser holding the configuration shared by every parse call
#[derive(Debug, Clone, Default)]
pub struct RuleParser {
    pub(crate) config: ParserConfig,
    pub(crate) worker_threads: usize,
}

impl RuleParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            worker_threads: 0,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            config: settings.parser.clone(),
            worker_threads: settings.batch.worker_threads,
        }
    }

    /// Set the number of threads used by `parse_all`, 0 = one per CPU
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Parse one rule
    pub fn parse(&self, input: &str) -> Result<Rule> {
        let mut cursor = Cursor::new(input);

        let rule = parse_header(&mut cursor)?;
        let rule = parse_options(&mut cursor, rule, &self.config)?;

        debug!(
            "Parsed rule sid:{} ({} contents, {} references)",
            rule.sid,
            rule.contents.len(),
            rule.references.len()
        );
        Ok(rule)
    }
}

/// Token stream with one token of lookahead
struct Cursor<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Option<Token<'a>>> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next_token()?;
        }
        Ok(self.peeked)
    }

    fn next(&mut self) -> Result<Option<Token<'a>>> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.lexer.next_token(),
        }
    }

    fn unexpected(&self, expected: &str, found: Option<Token<'_>>) -> RuleError {
        let found = match found {
            Some(token) => format!("{:?}", token),
            None => "end of input".to_string(),
        };
        RuleError::SyntaxError(format!(
            "expected {}, found {} near offset {}",
            expected,
            found,
            self.lexer.offset()
        ))
    }
}

fn parse_header(cursor: &mut Cursor<'_>) -> Result<Rule> {
    // Parse action
    let action = parse_word(cursor, "action")?;

    // Parse protocol
    let protocol = parse_word(cursor, "protocol")?;

    // Parse source addresses and ports
    let source = parse_network(cursor, "source")?;

    // Parse direction
    let bidirectional = match cursor.next()? {
        Some(Token::Arrow) => false,
        Some(Token::BothArrow) => true,
        other => return Err(cursor.unexpected("direction '->' or '<>'", other)),
    };

    // Parse destination addresses and ports
    let destination = parse_network(cursor, "destination")?;

    match cursor.next()? {
        Some(Token::LParen) => {}
        other => return Err(cursor.unexpected("'(' opening the option list", other)),
    }

    Ok(Rule {
        action,
        protocol,
        source,
        destination,
        bidirectional,
        ..Default::default()
    })
}

fn parse_word(cursor: &mut Cursor<'_>, what: &str) -> Result<String> {
    match cursor.next()? {
        Some(Token::Word(word)) => Ok(word.to_string()),
        other => Err(cursor.unexpected(what, other)),
    }
}

fn parse_network(cursor: &mut Cursor<'_>, side: &str) -> Result<Network> {
    let nets = parse_spec(cursor, &format!("{} address", side))?;
    let ports = parse_spec(cursor, &format!("{} port", side))?;
    Ok(Network { nets, ports })
}

/// Single token or top-level `[a,b,...]` list
fn parse_spec(cursor: &mut Cursor<'_>, what: &str) -> Result<Vec<String>> {
    match cursor.next()? {
        Some(Token::Word(word)) | Some(Token::Number(word)) => Ok(vec![word.to_string()]),
        Some(Token::LBracket) => parse_list_items(cursor, what, 1),
        Some(Token::Bang) => Ok(vec![parse_negated_list(cursor, what, 1)?]),
        other => Err(cursor.unexpected(what, other)),
    }
}

/// Items of a list whose `[` was just consumed
fn parse_list_items(cursor: &mut Cursor<'_>, what: &str, depth: usize) -> Result<Vec<String>> {
    if depth > MAX_LIST_DEPTH {
        return Err(RuleError::SyntaxError(format!(
            "{} list nested deeper than {}",
            what, MAX_LIST_DEPTH
        )));
    }

    let mut items = Vec::new();
    loop {
        let item = match cursor.next()? {
            Some(Token::Word(word)) | Some(Token::Number(word)) => word.to_string(),
            Some(Token::LBracket) => {
                format!("[{}]", parse_list_items(cursor, what, depth + 1)?.join(","))
            }
            Some(Token::Bang) => parse_negated_list(cursor, what, depth + 1)?,
            other => return Err(cursor.unexpected(what, other)),
        };
        items.push(item);

        match cursor.next()? {
            Some(Token::Comma) => continue,
            Some(Token::RBracket) => return Ok(items),
            other => return Err(cursor.unexpected("',' or ']'", other)),
        }
    }
}

/// `![...]`, kept verbatim as one item
fn parse_negated_list(cursor: &mut Cursor<'_>, what: &str, depth: usize) -> Result<String> {
    match cursor.next()? {
        Some(Token::LBracket) => Ok(format!(
            "![{}]",
            parse_list_items(cursor, what, depth)?.join(",")
        )),
        other => Err(cursor.unexpected("'[' after '!'", other)),
    }
}

/// Parse the option list after its opening parenthesis
fn parse_options(cursor: &mut Cursor<'_>, mut rule: Rule, config: &ParserConfig) -> Result<Rule> {
    let mut state = ClauseState::new(config);

    loop {
        let keyword = match cursor.next()? {
            Some(Token::Word(keyword)) => keyword,
            Some(Token::RParen) => break,
            // Empty clause (`;;`)
            Some(Token::Semicolon) => continue,
            None => {
                return Err(RuleError::SyntaxError(
                    "unterminated option list".to_string(),
                ))
            }
            other => return Err(cursor.unexpected("option keyword", other)),
        };

        let clause = parse_clause(cursor, keyword)?;
        state.apply(&mut rule, &clause)?;

        match cursor.next()? {
            Some(Token::Semicolon) => continue,
            Some(Token::RParen) => break,
            None => {
                return Err(RuleError::SyntaxError(
                    "unterminated option list".to_string(),
                ))
            }
            other => return Err(cursor.unexpected("';' after option", other)),
        }
    }

    // Optional trailing ';'
    if cursor.peek()? == Some(Token::Semicolon) {
        cursor.next()?;
    }
    if let Some(token) = cursor.next()? {
        return Err(cursor.unexpected("end of rule", Some(token)));
    }

    state.finish(rule)
}

/// Read `[:[!]value]` following a keyword
fn parse_clause<'a>(cursor: &mut Cursor<'a>, keyword: &'a str) -> Result<Clause<'a>> {
    if cursor.peek()? != Some(Token::Colon) {
        return Ok(Clause::bare(keyword));
    }
    cursor.next()?;

    let negated = cursor.peek()? == Some(Token::Bang);
    if negated {
        cursor.next()?;
    }

    let value = match cursor.peek()? {
        Some(Token::Str(s)) => {
            cursor.next()?;
            Value::Quoted(s)
        }
        Some(Token::Word(w)) | Some(Token::Number(w)) => {
            cursor.next()?;
            Value::Bare(w)
        }
        _ => Value::Empty,
    };

    Ok(Clause {
        keyword,
        negated,
        value: Some(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::rule::{BufferContext, Content, ContentOption, FastPattern, Reference};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn udp_rule(contents: Vec<Content>) -> Rule {
        Rule {
            action: "alert".to_string(),
            protocol: "udp".to_string(),
            source: Network::new(["$HOME_NET"], ["any"]),
            destination: Network::new(["$EXTERNAL_NET"], ["any"]),
            sid: 1337,
            description: "foo".to_string(),
            contents,
            ..Default::default()
        }
    }

    fn content_with(pattern: &[u8], options: Vec<ContentOption>) -> Content {
        Content {
            pattern: pattern.to_vec(),
            options,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_simple_rule() {
        let rule = parse_rule(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1337; msg:"foo"; content:"AA"; rev:2);"#,
        )
        .unwrap();

        let mut expected = udp_rule(vec![Content::new(vec![0x41, 0x41])]);
        expected.revision = 2;
        assert_eq!(rule, expected);
    }

    #[test]
    fn test_parse_bidirectional() {
        let rule = parse_rule(
            r#"alert udp $HOME_NET any <> $EXTERNAL_NET any (sid:1337; msg:"foo"; content:"AA"; rev:2);"#,
        )
        .unwrap();
        assert!(rule.bidirectional);
        assert_eq!(rule.revision, 2);
    }

    #[test]
    fn test_parse_negated_content() {
        let rule = parse_rule(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1337; msg:"foo"; content:!"AA");"#,
        )
        .unwrap();

        let expected = udp_rule(vec![Content {
            pattern: b"AA".to_vec(),
            negate: true,
            ..Default::default()
        }]);
        assert_eq!(rule, expected);
    }

    #[test]
    fn test_parse_multiple_and_hex_contents() {
        let rule = parse_rule(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1337; msg:"foo"; content:"AA"; content:"A|42 43|D|45|");"#,
        )
        .unwrap();

        let expected = udp_rule(vec![Content::new("AA"), Content::new("ABCDE")]);
        assert_eq!(rule, expected);
    }

    #[test]
    fn test_parse_tags_and_references() {
        let rule = parse_rule(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1337; msg:"foo"; content:"A"; classtype:foo; reference:cve,2014; reference:url,www.suricata-ids.org);"#,
        )
        .unwrap();

        let mut expected = udp_rule(vec![Content::new("A")]);
        expected.tags = HashMap::from([("classtype".to_string(), "foo".to_string())]);
        expected.references = vec![
            Reference::new("cve", "2014"),
            Reference::new("url", "www.suricata-ids.org"),
        ];
        assert_eq!(rule, expected);
    }

    #[test]
    fn test_parse_content_options() {
        let rule = parse_rule(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1; msg:"a"; content:"A"; http_header; fast_pattern:0,42; nocase; content:"B"; http_uri; offset:3);"#,
        )
        .unwrap();

        assert_eq!(
            rule.contents,
            vec![
                Content {
                    fast_pattern: FastPattern::EnabledRange {
                        offset: 0,
                        length: 42
                    },
                    ..content_with(
                        b"A",
                        vec![ContentOption::flag("http_header"), ContentOption::flag("nocase")]
                    )
                },
                content_with(
                    b"B",
                    vec![ContentOption::flag("http_uri"), ContentOption::new("offset", 3)]
                ),
            ]
        );
    }

    #[test]
    fn test_parse_file_data_and_pkt_data() {
        let rule = parse_rule(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1; msg:"a"; content:"Z"; file_data; content:"A"; http_header; nocase; content:"B"; http_uri; pkt_data; content:"C"; http_uri;)"#,
        )
        .unwrap();

        let buffers: Vec<_> = rule.contents.iter().map(|c| c.buffer).collect();
        assert_eq!(
            buffers,
            vec![
                BufferContext::Packet,
                BufferContext::FileData,
                BufferContext::FileData,
                BufferContext::Packet,
            ]
        );
        assert_eq!(rule.contents[3].options, vec![ContentOption::flag("http_uri")]);
    }

    #[test]
    fn test_parse_complex_vrt_rule() {
        let rule = parse_rule(
            r#"alert tcp $HOME_NET any -> $EXTERNAL_NET $HTTP_PORTS (msg:"VRT BLACKLIST URI request for known malicious URI - /tongji.js"; flow:to_server,established; content:"/tongji.js"; fast_pattern:only; http_uri; content:"Host|3A| "; http_header; pcre:"/Host\x3a[^\r\n]*?\.tongji/Hi"; metadata:impact_flag red, policy balanced-ips drop, policy security-ips drop, ruleset community, service http; reference:url,labs.snort.org/docs/17904.html; classtype:trojan-activity; sid:17904; rev:6;)"#,
        )
        .unwrap();

        let expected = Rule {
            action: "alert".to_string(),
            protocol: "tcp".to_string(),
            source: Network::new(["$HOME_NET"], ["any"]),
            destination: Network::new(["$EXTERNAL_NET"], ["$HTTP_PORTS"]),
            sid: 17904,
            revision: 6,
            description: "VRT BLACKLIST URI request for known malicious URI - /tongji.js"
                .to_string(),
            references: vec![Reference::new("url", "labs.snort.org/docs/17904.html")],
            contents: vec![
                Content {
                    fast_pattern: FastPattern::EnabledOnly,
                    ..content_with(b"/tongji.js", vec![ContentOption::flag("http_uri")])
                },
                content_with(b"Host: ", vec![ContentOption::flag("http_header")]),
            ],
            tags: HashMap::from([
                ("flow".to_string(), "to_server,established".to_string()),
                ("classtype".to_string(), "trojan-activity".to_string()),
            ]),
            ..Default::default()
        };
        assert_eq!(rule, expected);
    }

    #[test]
    fn test_parse_network_lists() {
        let rule = parse_rule(
            "alert tcp [10.0.0.0/8, !10.1.0.0/16] [80,8080:8090] -> ![1.1.1.1,[2.2.2.2,3.3.3.3]] !443 (sid:5;)",
        )
        .unwrap();

        assert_eq!(rule.source.nets, vec!["10.0.0.0/8", "!10.1.0.0/16"]);
        assert_eq!(rule.source.ports, vec!["80", "8080:8090"]);
        assert_eq!(rule.destination.nets, vec!["![1.1.1.1,[2.2.2.2,3.3.3.3]]"]);
        assert_eq!(rule.destination.ports, vec!["!443"]);
    }

    #[test]
    fn test_parse_msg_escapes() {
        let rule = parse_rule(r#"alert ip any any -> any any (msg:"a \"b\"\; c"; sid:9)"#).unwrap();
        assert_eq!(rule.description, "a \"b\"; c");
        assert_eq!(rule.sid, 9);
    }

    #[test]
    fn test_unknown_keywords_are_tolerated() {
        let rule = parse_rule(
            r#"alert tcp any any -> any any (sid:1; metadata:created_at 2010_01_01; pcre:!"/x/"; isdataat:!1,relative; byte_test:4,>,1000,0; noalert;)"#,
        )
        .unwrap();
        assert!(rule.tags.is_empty());
        assert!(rule.contents.is_empty());
    }

    #[test]
    fn test_header_match_keywords_are_tags() {
        let rule = parse_rule(
            r#"alert tcp any any -> any any (sid:1; flags:S; ip_proto:6; window:55808; metadata:service http; pcre:"/x/";)"#,
        )
        .unwrap();

        assert_eq!(
            rule.tags,
            HashMap::from([
                ("flags".to_string(), "S".to_string()),
                ("ip_proto".to_string(), "6".to_string()),
                ("window".to_string(), "55808".to_string()),
            ])
        );
        assert_eq!(
            rule.to_string(),
            "alert tcp any any -> any any (flags:S; ip_proto:6; window:55808; sid:1;)"
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = r#"alert tcp $HOME_NET any -> any any (msg:"x"; content:"a|00|b"; depth:10; classtype:misc; flow:established; sid:3;)"#;
        assert_eq!(parse_rule(text).unwrap(), parse_rule(text).unwrap());
    }

    #[test]
    fn test_display_roundtrip() {
        let rules = [
            r#"alert tcp $HOME_NET any -> $EXTERNAL_NET $HTTP_PORTS (msg:"VRT \"quoted\""; flow:to_server,established; content:"/tongji.js"; fast_pattern:only; http_uri; content:!"Host|3A 0D 0A|"; http_header; distance:-2; within:10; file_data; content:"|00 FF|MZ"; reference:url,labs.snort.org/docs/17904.html; classtype:trojan-activity; sid:17904; rev:6;)"#,
            r#"drop udp [1.1.1.1,![2.2.2.2,3.3.3.3]] any <> any [53,5353] (sid:2; content:"a"; fast_pattern:1,2; base64_data; content:"b"; pkt_data; content:"c";)"#,
        ];
        for text in rules {
            let rule = parse_rule(text).unwrap();
            let reparsed = parse_rule(&rule.to_string()).unwrap();
            assert_eq!(rule, reparsed);
        }
    }

    #[test]
    fn test_from_str() {
        let rule: Rule = "pass ip any any -> any any (sid:0;)".parse().unwrap();
        assert_eq!(rule.action, "pass");
        assert_eq!(rule.sid, 0);
    }

    fn parse_err(text: &str) -> RuleError {
        match parse_rule(text) {
            Ok(rule) => panic!("{:?} parsed to {:?}", text, rule),
            Err(e) => e,
        }
    }

    #[test]
    fn test_invalid_sid() {
        let err = parse_err(r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:"a");"#);
        assert!(matches!(err, RuleError::InvalidFieldValue(_)));
    }

    #[test]
    fn test_invalid_content_option() {
        let err = parse_err(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1; content:"foo"; offset:"a");"#,
        );
        assert!(matches!(err, RuleError::InvalidFieldValue(_)));
    }

    #[test]
    fn test_invalid_content_value() {
        let err = parse_err(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:1; content:!; offset:"a");"#,
        );
        match err {
            RuleError::InvalidFieldValue(message) => assert!(message.starts_with("content")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_invalid_msg() {
        let err = parse_err(
            r#"alert udp $HOME_NET any -> $EXTERNAL_NET any (sid:2; msg; content:"A");"#,
        );
        assert!(matches!(err, RuleError::InvalidFieldValue(_)));
    }

    #[test]
    fn test_invalid_direction() {
        let err = parse_err(
            r#"alert udp $HOME_NET any *# $EXTERNAL_NET any (sid:2; msg:"foo"; content:"A");"#,
        );
        assert!(matches!(err, RuleError::SyntaxError(_)));

        let err = parse_err(
            r#"alert udp $HOME_NET any <- $EXTERNAL_NET any (sid:2; msg:"foo"; content:"A");"#,
        );
        assert!(matches!(err, RuleError::LexError(_)));
    }

    #[test]
    fn test_missing_sid() {
        let err = parse_err(r#"alert udp any any -> any any (msg:"no sid"; content:"A";)"#);
        assert!(matches!(err, RuleError::MissingRequiredField(_)));
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            "",
            "alert",
            "alert udp any any -> any any",
            "alert udp any any -> any any sid:1;",
            "alert udp any any -> any any (sid:1;",
            "alert udp any any -> any any (sid:1; nocase;)",
            "alert udp any any -> any any (sid:1;) extra",
            r#"alert udp any any -> any any (msg:"a" b; sid:1;)"#,
            "alert udp [any any -> any any (sid:1;)",
            "alert udp any any -> any any (\"sid\":1;)",
        ];
        for text in cases {
            let err = parse_err(text);
            assert!(matches!(err, RuleError::SyntaxError(_)), "{:?} gave {:?}", text, err);
        }
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_err(r#"alert udp any any -> any any (msg:"abc; sid:1;)"#);
        assert!(matches!(err, RuleError::LexError(_)));
    }
}
