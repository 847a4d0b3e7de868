use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CharsetError {
    #[error("allow-list is empty")]
    Empty,
    #[error("range '{start}-{end}' is reversed")]
    ReversedRange { start: char, end: char },
    #[error("dangling escape at end of allow-list")]
    DanglingEscape,
    #[error("unknown escape '\\{0}'")]
    UnknownEscape(char),
}

/// An explicit set of characters a field value may contain.
///
/// Parsed from character-class shorthand: literal characters, `a-z` style
/// ranges, the `\d`, `\w` and `\s` classes, and backslash escapes for
/// `\\`, `\-`, `\]`, `\^`. Nothing is ever handed to a regex engine, so the
/// fragment has no special syntax beyond what is listed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedChars {
    source: String,
    items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Range(RangeInclusive<char>),
    Digit,
    Word,
    Space,
}

impl Item {
    fn matches(&self, c: char) -> bool {
        match self {
            Item::Range(r) => r.contains(&c),
            Item::Digit => c.is_ascii_digit(),
            Item::Word => c.is_alphanumeric() || c == '_',
            Item::Space => c.is_whitespace(),
        }
    }
}

/// One position in the fragment. An unescaped '-' is kept apart from
/// literals so that `\-` never forms a range.
enum Token {
    Literal(char),
    Dash,
    Class(Item),
}

impl AllowedChars {
    pub fn parse(fragment: &str) -> Result<Self, CharsetError> {
        let tokens = tokenize(fragment)?;
        let mut items = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Class(item) => {
                    items.push(item.clone());
                    i += 1;
                }
                Token::Dash => {
                    items.push(Item::Range('-'..='-'));
                    i += 1;
                }
                Token::Literal(start) => {
                    // `a-z` needs a literal on both sides; a leading or trailing
                    // '-' is itself a literal.
                    if let (Some(Token::Dash), Some(Token::Literal(end))) =
                        (tokens.get(i + 1), tokens.get(i + 2))
                    {
                        if start > end {
                            return Err(CharsetError::ReversedRange { start: *start, end: *end });
                        }
                        items.push(Item::Range(*start..=*end));
                        i += 3;
                    } else {
                        items.push(Item::Range(*start..=*start));
                        i += 1;
                    }
                }
            }
        }
        if items.is_empty() {
            return Err(CharsetError::Empty);
        }
        Ok(Self { source: fragment.to_string(), items })
    }

    pub fn contains(&self, c: char) -> bool {
        self.items.iter().any(|item| item.matches(c))
    }

    /// Drop every character that is not on the list.
    pub fn filter(&self, text: &str) -> String {
        text.chars().filter(|&c| self.contains(c)).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn tokenize(fragment: &str) -> Result<Vec<Token>, CharsetError> {
    let mut tokens = Vec::new();
    let mut chars = fragment.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '-' => Token::Dash,
            '\\' => match chars.next().ok_or(CharsetError::DanglingEscape)? {
                'd' => Token::Class(Item::Digit),
                'w' => Token::Class(Item::Word),
                's' => Token::Class(Item::Space),
                't' => Token::Literal('\t'),
                'n' => Token::Literal('\n'),
                e @ ('\\' | '-' | ']' | '[' | '^' | '.' | '/' | '#' | ' ') => Token::Literal(e),
                other => return Err(CharsetError::UnknownEscape(other)),
            },
            _ => Token::Literal(c),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

impl FromStr for AllowedChars {
    type Err = CharsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AllowedChars::parse(s)
    }
}

impl fmt::Display for AllowedChars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Serialize for AllowedChars {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for AllowedChars {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AllowedChars::parse(&s).map_err(serde::de::Error::custom)
    }
}
