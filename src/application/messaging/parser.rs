//! Message parser - splits prefixed messages into a command name, positional
//! arguments and flags

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::BTreeMap;

use crate::application::errors::CommandError;
use crate::domain::entities::FlagDef;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*)"|'([^']*)'|(\S+)"#).expect("token pattern is valid"));

/// Flag name every command answers to
pub const HELP_FLAG: &str = "help";

/// A prefixed message split into command name and the rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub rest: String,
}

/// Recognises text commands by prefix
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// `None` unless the text starts with the prefix and names something
    pub fn parse(&self, text: &str) -> Option<Invocation> {
        if self.command_prefix.is_empty() {
            return None;
        }
        let body = text.trim_start().strip_prefix(&self.command_prefix)?;
        // "! ping" is not a command
        if body.starts_with(char::is_whitespace) {
            return None;
        }
        let (name, rest) = match body.find(char::is_whitespace) {
            Some(idx) => (&body[..idx], body[idx..].trim()),
            None => (body, ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(Invocation {
            name: name.to_lowercase(),
            rest: rest.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Present,
    Value(String),
}

/// Positional arguments and flags of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub args: Vec<String>,
    pub flags: BTreeMap<String, FlagValue>,
    pub raw: String,
}

impl ParsedArgs {
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    pub fn flag_value(&self, name: &str) -> Option<&str> {
        match self.flags.get(name) {
            Some(FlagValue::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn wants_help(&self) -> bool {
        self.has_flag(HELP_FLAG)
    }

    /// No positional arguments and no flags
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.flags.is_empty()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

struct Token {
    text: String,
    quoted: bool,
}

fn tokens(input: &str) -> Vec<Token> {
    TOKEN_RE
        .captures_iter(input)
        .filter_map(|caps| {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                Some(Token { text: m.as_str().to_string(), quoted: true })
            } else {
                caps.get(3).map(|m| Token { text: m.as_str().to_string(), quoted: false })
            }
        })
        .collect()
}

/// Split on whitespace, keeping quoted sections together
pub fn tokenize(input: &str) -> Vec<String> {
    tokens(input).into_iter().map(|t| t.text).collect()
}

fn looks_numeric(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

/// Parse arguments against the command's flag definitions.
///
/// Unknown flags are kept as present so `--help` works for every command.
/// Quoted tokens and everything after `--` are positional.
pub fn parse_args(input: &str, defs: &[FlagDef]) -> Result<ParsedArgs, CommandError> {
    let mut parsed = ParsedArgs {
        raw: input.to_string(),
        ..Default::default()
    };
    let mut iter = tokens(input).into_iter();
    let mut positional_only = false;

    while let Some(token) = iter.next() {
        if positional_only || token.quoted {
            parsed.args.push(token.text);
            continue;
        }
        let text = token.text;

        if text == "--" {
            positional_only = true;
            continue;
        }

        if let Some(long) = text.strip_prefix("--") {
            let (name, inline) = match long.split_once('=') {
                Some((n, v)) => (n.to_lowercase(), Some(v.to_string())),
                None => (long.to_lowercase(), None),
            };
            let takes_value = defs.iter().any(|d| d.name == name && d.takes_value);
            let value = match inline {
                Some(v) => FlagValue::Value(v),
                None if takes_value => {
                    let next = iter
                        .next()
                        .ok_or_else(|| CommandError::InvalidArgs(format!("--{} needs a value", name)))?;
                    FlagValue::Value(next.text)
                }
                None => FlagValue::Present,
            };
            parsed.flags.insert(name, value);
            continue;
        }

        if text.len() > 1 && text.starts_with('-') && !looks_numeric(&text) {
            let shorts: Vec<char> = text[1..].chars().collect();
            for (i, c) in shorts.iter().enumerate() {
                let def = defs.iter().find(|d| d.short == Some(*c));
                let name = match def {
                    Some(d) => d.name.clone(),
                    None if *c == 'h' => HELP_FLAG.to_string(),
                    None => c.to_string(),
                };
                if def.map(|d| d.takes_value).unwrap_or(false) {
                    let attached: String = shorts[i + 1..].iter().collect();
                    let value = if !attached.is_empty() {
                        attached
                    } else {
                        iter.next()
                            .map(|t| t.text)
                            .ok_or_else(|| CommandError::InvalidArgs(format!("-{} needs a value", c)))?
                    };
                    parsed.flags.insert(name, FlagValue::Value(value));
                    break;
                }
                parsed.flags.insert(name, FlagValue::Present);
            }
            continue;
        }

        parsed.args.push(text);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Vec<FlagDef> {
        vec![
            FlagDef::new("verbose", "More output").with_short('v'),
            FlagDef::new("count", "How many").with_short('n').with_value(),
        ]
    }

    #[test]
    fn test_parse_invocation() {
        let parser = MessageParser::new("!");
        let inv = parser.parse("!Ping  hello world ").unwrap();
        assert_eq!(inv.name, "ping");
        assert_eq!(inv.rest, "hello world");

        assert!(parser.parse("ping").is_none());
        assert!(parser.parse("! ping").is_none());
        assert!(parser.parse("!").is_none());
    }

    #[test]
    fn test_multi_char_prefix() {
        let parser = MessageParser::new("bot.");
        assert_eq!(parser.parse("bot.help").unwrap().name, "help");
        assert!(parser.parse("bot help").is_none());
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"say "hello there" 'and you'"#),
            vec!["say", "hello there", "and you"]
        );
    }

    #[test]
    fn test_long_flags() {
        let parsed = parse_args("a --verbose --count 3 b --mode=fast", &defs()).unwrap();
        assert_eq!(parsed.args, vec!["a", "b"]);
        assert!(parsed.has_flag("verbose"));
        assert_eq!(parsed.flag_value("count"), Some("3"));
        assert_eq!(parsed.flag_value("mode"), Some("fast"));
    }

    #[test]
    fn test_short_flags() {
        let parsed = parse_args("-vn5 x", &defs()).unwrap();
        assert!(parsed.has_flag("verbose"));
        assert_eq!(parsed.flag_value("count"), Some("5"));
        assert_eq!(parsed.args, vec!["x"]);

        let parsed = parse_args("-n 7", &defs()).unwrap();
        assert_eq!(parsed.flag_value("count"), Some("7"));
    }

    #[test]
    fn test_help_flag_always_recognised() {
        assert!(parse_args("--help", &[]).unwrap().wants_help());
        assert!(parse_args("-h", &[]).unwrap().wants_help());
    }

    #[test]
    fn test_missing_value_is_an_error() {
        assert!(matches!(
            parse_args("--count", &defs()),
            Err(CommandError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_positional_escapes() {
        let parsed = parse_args(r#"-5 "--verbose" -- --count"#, &defs()).unwrap();
        assert_eq!(parsed.args, vec!["-5", "--verbose", "--count"]);
        assert!(parsed.flags.is_empty());
    }
}
