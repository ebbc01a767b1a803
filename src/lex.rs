//! Rule driven longest-match tokenizer.
//!
//! A [`Rules`] set is an ordered list of `(regex, action)` pairs. At every
//! position all rules whose match starts exactly there are collected and
//! tried from the longest match to the shortest; rules matching the same
//! length keep their declaration order.

use std::collections::VecDeque;

use miette::{Diagnostic, NamedSource, SourceSpan};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
#[error("Unexpected character at index {index}: {token}")]
#[diagnostic(help("remove or correct the character: `{token}`"))]
pub struct LexError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this character")]
    bad_bit: SourceSpan,

    /// Character (not byte) position of `token`.
    pub index: usize,
    pub token: char,
}

impl LexError {
    /// `offset` is the byte offset of `token` in `whole`.
    pub fn new(whole: &str, offset: usize, token: char) -> Self {
        let index = whole
            .get(..offset)
            .map_or(offset, |before| before.chars().count());
        LexError {
            src: NamedSource::new("<input>", whole.to_string()),
            bad_bit: SourceSpan::from(offset..offset + token.len_utf8()),
            index,
            token,
        }
    }
}

/// What a rule action makes of its match.
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme<T> {
    Token(T),
    /// The first token is returned, the rest are queued for later calls.
    Tokens(Vec<T>),
    /// Consume the match without producing a token.
    Skip,
    /// Veto this match and let the next candidate at the position try.
    Reject,
}

type Action<T, C, E> = Box<dyn Fn(&str, &C) -> Result<Lexeme<T>, E>>;
type Fallback<T, E> = Box<dyn Fn(&str, usize, char) -> Result<Option<T>, E>>;

struct Rule<T, C, E> {
    pattern: Regex,
    action: Action<T, C, E>,
}

/// An immutable rule set, shared by every [`Lexer`] run over it.
///
/// `C` is a read-only context handed to each action, `E` the error type
/// actions and the fallback may return.
pub struct Rules<T, C, E> {
    rules: Vec<Rule<T, C, E>>,
    fallback: Fallback<T, E>,
}

impl<T, C, E: From<LexError>> Rules<T, C, E> {
    /// An empty rule set whose fallback fails on the unmatched character.
    pub fn new() -> Self {
        Rules {
            rules: Vec::new(),
            fallback: Box::new(|whole, offset, token| Err(LexError::new(whole, offset, token).into())),
        }
    }
}

impl<T, C, E: From<LexError>> Default for Rules<T, C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, E> Rules<T, C, E> {
    /// Appends a rule. The pattern is anchored to the scan position.
    pub fn add_rule(
        &mut self,
        pattern: &str,
        action: impl Fn(&str, &C) -> Result<Lexeme<T>, E> + 'static,
    ) -> Result<&mut Self, regex::Error> {
        let pattern = Regex::new(&format!("^(?:{pattern})"))?;
        self.rules.push(Rule {
            pattern,
            action: Box::new(action),
        });
        Ok(self)
    }

    /// Replaces the handler called with the skipped character when nothing
    /// at a position produced a token.
    pub fn with_fallback(
        mut self,
        fallback: impl Fn(&str, usize, char) -> Result<Option<T>, E> + 'static,
    ) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    /// Candidates at `index` as `(rule, length)`, longest first, ties in
    /// declaration order.
    fn scan(&self, input: &str, index: usize) -> Vec<(usize, usize)> {
        let rest = &input[index..];
        let mut matches: Vec<(usize, usize)> = self
            .rules
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| rule.pattern.find(rest).map(|m| (i, m.end())))
            .collect();
        // stable, so equal lengths keep rule order
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches
    }
}

pub struct Lexer<'r, 'de, 'c, T, C, E> {
    rules: &'r Rules<T, C, E>,
    context: &'c C,
    whole: &'de str,
    index: usize,
    /// Candidates at the current position already tried.
    remove: usize,
    pending: VecDeque<T>,
    done: bool,
}

impl<'r, 'de, 'c, T, C, E> Lexer<'r, 'de, 'c, T, C, E> {
    pub fn new(rules: &'r Rules<T, C, E>, input: &'de str, context: &'c C) -> Self {
        Lexer {
            rules,
            context,
            whole: input,
            index: 0,
            remove: 0,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Restarts scanning on a new input.
    pub fn set_input(&mut self, input: &'de str) {
        self.whole = input;
        self.index = 0;
        self.remove = 0;
        self.pending.clear();
        self.done = false;
    }

    /// Byte offset of the scan position.
    pub fn index(&self) -> usize {
        self.index
    }

    fn emit(&mut self, lexeme: Lexeme<T>) -> Option<T> {
        match lexeme {
            Lexeme::Token(token) => Some(token),
            Lexeme::Tokens(tokens) => {
                self.pending.extend(tokens);
                self.pending.pop_front()
            }
            Lexeme::Skip | Lexeme::Reject => None,
        }
    }

    fn lex(&mut self) -> Result<Option<T>, E> {
        if let Some(token) = self.pending.pop_front() {
            return Ok(Some(token));
        }

        let whole = self.whole;
        while self.index <= whole.len() {
            let start = self.index;
            let matches = self.rules.scan(whole, start);
            let total = matches.len();
            let mut accepted = false;

            for (rule, length) in matches.into_iter().skip(self.remove) {
                self.remove += 1;
                let text = &whole[start..start + length];
                let lexeme = (self.rules.rules[rule].action)(text, self.context)?;
                if matches!(lexeme, Lexeme::Reject) {
                    log::trace!("rule {rule} rejected {text:?} at {start}");
                    continue;
                }
                accepted = true;
                self.index = start + length;
                if length > 0 {
                    self.remove = 0;
                }
                log::trace!("rule {rule} matched {text:?} at {start}");
                if let Some(token) = self.emit(lexeme) {
                    return Ok(Some(token));
                }
                break;
            }

            if start < whole.len() {
                if !accepted {
                    self.remove = 0;
                    let Some(c) = whole[start..].chars().next() else {
                        break;
                    };
                    self.index += c.len_utf8();
                    if let Some(token) = (self.rules.fallback)(whole, start, c)? {
                        return Ok(Some(token));
                    }
                } else if self.index != start {
                    self.remove = 0;
                }
            } else if !accepted || self.remove >= total {
                break;
            }
        }
        Ok(None)
    }
}

impl<T, C, E> Iterator for Lexer<'_, '_, '_, T, C, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.lex() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
