//! CIF 1.1 tokenizer.
//!
//! The scanner is a pushdown automaton: `state` is the state to run next and
//! `stack` holds the states to resume once a sub-scan (a tag, a value, a run
//! of whitespace) finishes. Each step consumes input, emits at most one
//! token, or stops. The first error ends the token stream.

use std::borrow::Cow;
use std::fmt;
use std::iter::FusedIterator;

use crate::chars::{is_newline, is_non_blank, is_ordinary, is_printable, is_whitespace};

/// Prefix of the optional version line, e.g. `#\#CIF_1.1`.
pub const VERSION_PREFIX: &str = "#\\#";

/// Kinds of token produced by the [`Scanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Version,
    Comment,
    DataBlockStart,
    SaveFrameStart,
    SaveFrameEnd,
    Loop,
    DataTag,
    Omitted,
    Missing,
    Integer,
    Float,
    String,
    Eof,
    Error,
}

impl TokenKind {
    /// Returns `true` for tokens that carry a data value.
    pub fn is_value(self) -> bool {
        matches!(
            self,
            TokenKind::Omitted
                | TokenKind::Missing
                | TokenKind::Integer
                | TokenKind::Float
                | TokenKind::String
        )
    }

    /// Returns `true` for the `.` and `?` markers.
    pub fn is_null(self) -> bool {
        matches!(self, TokenKind::Omitted | TokenKind::Missing)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Version => "version",
            TokenKind::Comment => "comment",
            TokenKind::DataBlockStart => "data block heading",
            TokenKind::SaveFrameStart => "save frame heading",
            TokenKind::SaveFrameEnd => "save frame end",
            TokenKind::Loop => "loop_",
            TokenKind::DataTag => "data tag",
            TokenKind::Omitted => "omitted value",
            TokenKind::Missing => "missing value",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::Eof => "end of input",
            TokenKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// A token with its raw text and 1-based source line.
///
/// Tags, block names and frame names exclude their `_`, `data_` and `save_`
/// prefixes. Quoted strings and text fields exclude their delimiters. For
/// [`TokenKind::Error`] the text is the error message.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: Cow<'a, str>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    NonBlank,
    Printable,
}

impl Class {
    fn contains(self, b: u8) -> bool {
        match self {
            Class::NonBlank => is_non_blank(b),
            Class::Printable => is_printable(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    VersionEnd,
    TopLevel,
    DataBlockHeading,
    SaveFrameHeading,
    BlockBody,
    SaveFrameBody,
    DataItem,
    LoopFirstTag,
    LoopTags,
    LoopFirstValue,
    LoopValues,
    DataTag,
    Name(Class),
    Run(Class),
    WhiteSpace,
    WhiteSpaceContinue,
    SpaceOrEof,
    Comment,
    Value,
    ValueEnd,
    SignedNumber,
    Integer,
    Fraction { digits: bool },
    ExponentSign,
    Exponent { digits: bool },
    TextFieldFirstLine,
    TextField,
    Unquoted,
    Quoted(u8),
}

type Step = Option<State>;

/// Pull-based tokenizer over a complete CIF text.
///
/// Yields tokens until (and including) a single [`TokenKind::Eof`] or
/// [`TokenKind::Error`] token, then `None`.
pub struct Scanner<'a> {
    input: &'a str,
    bytes: &'a [u8],
    start: usize,
    start_line: usize,
    pos: usize,
    line: usize,
    stepped_back: bool,
    state: Option<State>,
    stack: Vec<State>,
    emitted: Option<Token<'a>>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            start: 0,
            start_line: 1,
            pos: 0,
            line: 1,
            stepped_back: false,
            state: Some(State::Initial),
            stack: Vec::with_capacity(16),
            emitted: None,
        }
    }

    // --- Cursor ---

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.peek()?;
        if b == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
        self.stepped_back = false;
        Some(b)
    }

    /// Step back over the byte returned by the last `next_byte`.
    fn backup(&mut self) {
        if self.stepped_back || self.pos == 0 {
            return;
        }
        self.pos -= 1;
        self.stepped_back = true;
        if self.bytes[self.pos] == b'\n' {
            self.line -= 1;
        }
    }

    fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.next_byte();
        }
    }

    /// Case-insensitive look-ahead for a keyword.
    fn ahead_is(&self, word: &str) -> bool {
        self.bytes
            .get(self.pos..self.pos + word.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(word.as_bytes()))
    }

    /// Look-ahead for a keyword standing alone (followed by whitespace or
    /// end of input).
    fn ahead_is_word(&self, word: &str) -> bool {
        self.ahead_is(word) && self.peek_at(word.len()).map_or(true, is_whitespace)
    }

    fn at_space_or_eof(&self) -> bool {
        self.peek().map_or(true, is_whitespace)
    }

    fn ignore(&mut self) {
        self.start = self.pos;
        self.start_line = self.line;
    }

    fn current(&self) -> &'a str {
        self.input.get(self.start..self.pos).unwrap_or_default()
    }

    // --- Emission ---

    fn emit(&mut self, kind: TokenKind) {
        debug_assert!(self.emitted.is_none(), "one token per step");
        self.emitted = Some(Token {
            kind,
            text: Cow::Borrowed(self.current()),
            line: self.start_line,
        });
        self.ignore();
    }

    fn error(&mut self, message: String) -> Step {
        self.emitted = Some(Token {
            kind: TokenKind::Error,
            text: Cow::Owned(message),
            line: self.line,
        });
        None
    }

    fn stop(&mut self) -> Step {
        self.ignore();
        self.emit(TokenKind::Eof);
        None
    }

    // --- Continuations ---

    fn push(&mut self, state: State) {
        self.stack.push(state);
    }

    fn pop(&mut self) -> Step {
        match self.stack.pop() {
            Some(state) => Some(state),
            None => self.error("internal scanner error: no state to resume".into()),
        }
    }

    /// Require at least one whitespace character, then continue at `next`.
    fn white_space(&mut self, next: State) -> Step {
        self.push(next);
        Some(State::WhiteSpace)
    }

    /// Require whitespace or end of input, then continue at `next`.
    fn space_or_eof(&mut self, next: State) -> Step {
        self.push(next);
        Some(State::SpaceOrEof)
    }

    /// Scan a name made of `class` characters, then continue at `next`.
    fn name(&mut self, class: Class, next: State) -> Step {
        self.push(next);
        Some(State::Name(class))
    }

    /// Reclassify the numeric run scanned so far as an unquoted string.
    fn unquoted_fallback(&mut self) -> Step {
        self.push(State::Unquoted);
        Some(State::Run(Class::NonBlank))
    }

    fn emit_value(&mut self, kind: TokenKind) -> Step {
        self.emit(kind);
        self.space_or_eof(State::ValueEnd)
    }

    // --- States ---

    fn step(&mut self, state: State) -> Step {
        match state {
            State::Initial => self.lex_initial(),
            State::VersionEnd => {
                self.emit(TokenKind::Version);
                self.push(State::TopLevel);
                Some(State::Comment)
            }
            State::TopLevel => self.lex_top_level(),
            State::DataBlockHeading => {
                self.emit(TokenKind::DataBlockStart);
                self.space_or_eof(State::BlockBody)
            }
            State::SaveFrameHeading => {
                self.emit(TokenKind::SaveFrameStart);
                self.white_space(State::SaveFrameBody)
            }
            State::BlockBody => self.lex_block_body(),
            State::SaveFrameBody => self.lex_save_frame_body(),
            State::DataItem => self.lex_data_item(),
            State::LoopFirstTag => self.lex_loop_first_tag(),
            State::LoopTags => self.lex_loop_tags(),
            State::LoopFirstValue => self.lex_loop_first_value(),
            State::LoopValues => self.lex_loop_values(),
            State::DataTag => {
                self.emit(TokenKind::DataTag);
                let next = self.pop()?;
                self.white_space(next)
            }
            State::Name(class) => self.lex_name(class),
            State::Run(class) => {
                while self.peek().is_some_and(|b| class.contains(b)) {
                    self.next_byte();
                }
                self.pop()
            }
            State::WhiteSpace => match self.next_byte() {
                Some(b) if is_whitespace(b) => Some(State::WhiteSpaceContinue),
                other => self.error(format!(
                    "Expected white space, but got '{}' instead.",
                    describe(other)
                )),
            },
            State::WhiteSpaceContinue => self.lex_white_space_continue(),
            State::SpaceOrEof => match self.peek() {
                None => self.stop(),
                Some(b) if is_whitespace(b) => self.pop(),
                other => self.error(format!(
                    "Expected whitespace or EOF, but got '{}' instead.",
                    describe(other)
                )),
            },
            State::Comment => {
                while self.peek().is_some_and(|b| !is_newline(b)) {
                    self.next_byte();
                }
                self.emit(TokenKind::Comment);
                Some(State::WhiteSpaceContinue)
            }
            State::Value => self.lex_value(),
            State::ValueEnd => {
                let next = self.pop()?;
                self.white_space(next)
            }
            State::SignedNumber => self.lex_signed_number(),
            State::Integer => self.lex_integer(),
            State::Fraction { digits } => self.lex_fraction(digits),
            State::ExponentSign => {
                if matches!(self.peek(), Some(b'+' | b'-')) {
                    self.next_byte();
                }
                Some(State::Exponent { digits: false })
            }
            State::Exponent { digits } => self.lex_exponent(digits),
            State::TextFieldFirstLine => {
                self.push(State::TextField);
                Some(State::Run(Class::Printable))
            }
            State::TextField => self.lex_text_field(),
            State::Unquoted => self.lex_unquoted(),
            State::Quoted(quote) => self.lex_quoted(quote),
        }
    }

    /// Recognize the optional `#\#CIF_<version>` line.
    fn lex_initial(&mut self) -> Step {
        let prefix = "#\\#CIF_";
        if self.ahead_is(prefix) && self.peek_at(prefix.len()).is_some_and(is_non_blank) {
            self.skip(prefix.len());
            return self.name(Class::NonBlank, State::VersionEnd);
        }
        Some(State::TopLevel)
    }

    /// Everything before the first data block: whitespace and comments only.
    fn lex_top_level(&mut self) -> Step {
        let Some(b) = self.peek() else {
            return self.stop();
        };
        if b == b'#' || is_whitespace(b) {
            self.push(State::TopLevel);
            self.ignore();
            return Some(State::WhiteSpaceContinue);
        }
        if let Some(step) = self.reject_reserved() {
            return step;
        }
        if self.ahead_is("data_") {
            self.skip(5);
            self.ignore();
            return self.name(Class::NonBlank, State::DataBlockHeading);
        }
        self.error(format!(
            "Expected comments, whitespace or a data block heading, but got '{}' instead.",
            describe(Some(b))
        ))
    }

    fn reject_reserved(&mut self) -> Option<Step> {
        for word in ["global_", "stop_"] {
            if self.ahead_is(word) {
                return Some(self.error(format!("{word} is not supported in the CIF format.")));
            }
        }
        None
    }

    /// Items, tables and save frames of a data block, up to the next
    /// `data_` heading.
    fn lex_block_body(&mut self) -> Step {
        let Some(b) = self.peek() else {
            return self.stop();
        };
        if is_whitespace(b) {
            return self.white_space(State::BlockBody);
        }
        if let Some(step) = self.reject_reserved() {
            return step;
        }
        if self.ahead_is("data_") {
            self.skip(5);
            self.ignore();
            return self.name(Class::NonBlank, State::DataBlockHeading);
        }
        if self.ahead_is_word("save_") {
            return self.error("Found 'save_' outside of a save frame.".into());
        }
        if self.ahead_is("save_") {
            self.skip(5);
            self.ignore();
            return self.name(Class::NonBlank, State::SaveFrameHeading);
        }
        self.push(State::BlockBody);
        Some(State::DataItem)
    }

    /// Items and tables of a save frame, up to its closing `save_`.
    fn lex_save_frame_body(&mut self) -> Step {
        if self.ahead_is_word("save_") {
            self.ignore();
            self.skip(5);
            self.emit(TokenKind::SaveFrameEnd);
            return self.space_or_eof(State::BlockBody);
        }
        if let Some(step) = self.reject_reserved() {
            return step;
        }
        if self.peek() == Some(b'_') || self.ahead_is("loop_") {
            self.push(State::SaveFrameBody);
            return Some(State::DataItem);
        }
        if self.ahead_is("save_") {
            return self.error("Save frames may not be nested.".into());
        }
        if self.ahead_is("data_") {
            return self.error(
                "Expected the end of the save frame ('save_') before the next data block.".into(),
            );
        }
        self.error(format!(
            "Expected either a data item or the end of a save frame, but got '{}' instead.",
            describe(self.peek())
        ))
    }

    /// One item (tag and value) or one `loop_` table.
    fn lex_data_item(&mut self) -> Step {
        if self.ahead_is("loop_") {
            self.ignore();
            self.skip(5);
            self.emit(TokenKind::Loop);
            return self.white_space(State::LoopFirstTag);
        }
        match self.next_byte() {
            Some(b'_') => {
                self.ignore();
                self.push(State::Value);
                self.name(Class::NonBlank, State::DataTag)
            }
            other => self.error(format!(
                "Expected data item name starting with '_' but got '{}' instead. \
                 (Strings with spaces must be quoted and all data tags must begin \
                 with an underscore.)",
                describe(other)
            )),
        }
    }

    fn lex_loop_first_tag(&mut self) -> Step {
        match self.next_byte() {
            Some(b'_') => {
                self.ignore();
                self.push(State::LoopTags);
                self.name(Class::NonBlank, State::DataTag)
            }
            other => self.error(format!(
                "Every 'loop_' must declare at least one data tag (starting with \
                 a '_'), but found '{}' instead.",
                describe(other)
            )),
        }
    }

    fn lex_loop_tags(&mut self) -> Step {
        if self.peek() == Some(b'_') {
            self.next_byte();
            self.ignore();
            self.push(State::LoopTags);
            return self.name(Class::NonBlank, State::DataTag);
        }
        Some(State::LoopFirstValue)
    }

    fn loop_values_end(&self) -> bool {
        self.peek() == Some(b'_')
            || self.ahead_is("data_")
            || self.ahead_is("save_")
            || self.ahead_is("loop_")
    }

    /// The first value of a table. A table without values is left for the
    /// parser to report.
    fn lex_loop_first_value(&mut self) -> Step {
        if self.peek().is_none() {
            return self.stop();
        }
        if self.loop_values_end() {
            return self.pop();
        }
        self.push(State::LoopValues);
        Some(State::Value)
    }

    fn lex_loop_values(&mut self) -> Step {
        if self.peek().is_none() {
            return self.stop();
        }
        if self.loop_values_end() {
            return self.pop();
        }
        self.push(State::LoopValues);
        Some(State::Value)
    }

    fn lex_name(&mut self, class: Class) -> Step {
        match self.next_byte() {
            Some(b) if class.contains(b) => Some(State::Run(class)),
            other => self.error(format!(
                "Expected a name, but got '{}' instead.",
                describe(other)
            )),
        }
    }

    /// Zero or more whitespace characters and comments.
    fn lex_white_space_continue(&mut self) -> Step {
        loop {
            match self.peek() {
                Some(b'#') => {
                    self.next_byte();
                    self.ignore();
                    return Some(State::Comment);
                }
                Some(b) if is_whitespace(b) => {
                    self.next_byte();
                }
                _ => {
                    self.ignore();
                    return self.pop();
                }
            }
        }
    }

    /// Classify a value by its leading character.
    fn lex_value(&mut self) -> Step {
        let after_newline = match self.pos.checked_sub(1) {
            Some(prev) => is_newline(self.bytes[prev]),
            None => true,
        };
        for word in ["data_", "save_"] {
            if self.ahead_is(word) {
                return self.error(format!(
                    "{word} cannot be used in the beginning of an unquoted value."
                ));
            }
        }

        let r = self.next_byte();
        match r {
            Some(b'.') if self.at_space_or_eof() => self.emit_value(TokenKind::Omitted),
            Some(b'?') if self.at_space_or_eof() => self.emit_value(TokenKind::Missing),
            Some(b'+' | b'-') => Some(State::SignedNumber),
            Some(b) if b.is_ascii_digit() => Some(State::Integer),
            Some(b'.') => Some(State::Fraction { digits: false }),
            Some(quote @ (b'\'' | b'"')) => {
                self.ignore();
                Some(State::Quoted(quote))
            }
            Some(b';') if after_newline => {
                self.ignore();
                Some(State::TextFieldFirstLine)
            }
            Some(b) if is_ordinary(b) || b == b';' => {
                self.push(State::Unquoted);
                Some(State::Run(Class::NonBlank))
            }
            other => self.error(format!(
                "Expected a value ('.', '?', numeric or string), but got '{}'.",
                describe(other)
            )),
        }
    }

    fn lex_signed_number(&mut self) -> Step {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {
                self.next_byte();
                Some(State::Integer)
            }
            Some(b'.') => {
                self.next_byte();
                Some(State::Fraction { digits: false })
            }
            _ => self.unquoted_fallback(),
        }
    }

    fn lex_integer(&mut self) -> Step {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {
                self.next_byte();
                Some(State::Integer)
            }
            Some(b'.') => {
                self.next_byte();
                Some(State::Fraction { digits: true })
            }
            Some(b'e' | b'E') => {
                self.next_byte();
                Some(State::ExponentSign)
            }
            None => self.emit_value(TokenKind::Integer),
            Some(b) if is_whitespace(b) => self.emit_value(TokenKind::Integer),
            _ => self.unquoted_fallback(),
        }
    }

    /// Digits after the decimal point. `digits` records whether the mantissa
    /// has any digit so far.
    fn lex_fraction(&mut self, digits: bool) -> Step {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {
                self.next_byte();
                Some(State::Fraction { digits: true })
            }
            Some(b'e' | b'E') if digits => {
                self.next_byte();
                Some(State::ExponentSign)
            }
            _ if digits && self.at_space_or_eof() => self.emit_value(TokenKind::Float),
            _ => self.unquoted_fallback(),
        }
    }

    fn lex_exponent(&mut self, digits: bool) -> Step {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {
                self.next_byte();
                Some(State::Exponent { digits: true })
            }
            _ if digits && self.at_space_or_eof() => self.emit_value(TokenKind::Float),
            _ => self.unquoted_fallback(),
        }
    }

    /// Body of a semicolon text field after its first line. The field ends at
    /// a line starting with `;`; the newline before it is not part of the
    /// value.
    fn lex_text_field(&mut self) -> Step {
        let terminator = match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some(b'\n'), Some(b';'), _) => Some(2),
            (Some(b'\r'), Some(b';'), _) => Some(2),
            (Some(b'\r'), Some(b'\n'), Some(b';')) => Some(3),
            _ => None,
        };
        if let Some(len) = terminator {
            self.emit(TokenKind::String);
            self.skip(len);
            self.ignore();
            return self.space_or_eof(State::ValueEnd);
        }

        match self.next_byte() {
            Some(b) if is_newline(b) => {
                self.push(State::TextField);
                Some(State::Run(Class::Printable))
            }
            None => self.error("Expected a semi-colon terminator, but got EOF.".into()),
            other => self.error(format!(
                "The character '{}' is not allowed in a text field.",
                describe(other)
            )),
        }
    }

    fn lex_unquoted(&mut self) -> Step {
        let text = self.current();
        for word in ["loop_", "stop_", "global_"] {
            if text.eq_ignore_ascii_case(word) {
                return self.error(format!("{word} cannot be used as an unquoted string value."));
            }
        }
        self.emit_value(TokenKind::String)
    }

    /// A quoted string ends at the matching quote followed by whitespace or
    /// end of input, so `'it's'` holds `it's`.
    fn lex_quoted(&mut self, quote: u8) -> Step {
        loop {
            match self.next_byte() {
                None => return self.error("Expected end of quoted string, but got EOF.".into()),
                Some(b) if is_newline(b) => {
                    return self.error("Quoted strings may not contain new lines.".into())
                }
                Some(b) if b == quote && self.at_space_or_eof() => {
                    self.backup();
                    self.emit(TokenKind::String);
                    self.next_byte();
                    self.ignore();
                    return self.space_or_eof(State::ValueEnd);
                }
                Some(_) => {}
            }
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            if let Some(token) = self.emitted.take() {
                return Some(token);
            }
            let state = self.state.take()?;
            self.state = self.step(state);
        }
    }
}

impl FusedIterator for Scanner<'_> {}

/// Tokenize a complete CIF text.
pub fn tokenize(input: &str) -> Scanner<'_> {
    Scanner::new(input)
}

/// Printable rendering of a byte for error messages.
fn describe(b: Option<u8>) -> String {
    match b {
        None => "EOF".into(),
        Some(b'\n') => "\\n".into(),
        Some(b'\r') => "\\r".into(),
        Some(b'\t') => "\\t".into(),
        Some(b) if b.is_ascii_graphic() || b == b' ' => (b as char).to_string(),
        Some(b) => format!("\\x{b:02x}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .filter(|t| t.kind != TokenKind::Comment)
            .map(|t| t.kind)
            .collect()
    }

    fn values(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input)
            .filter(|t| t.kind.is_value())
            .map(|t| (t.kind, t.text.into_owned()))
            .collect()
    }

    fn error(input: &str) -> Token<'_> {
        let last = tokenize(input).last().unwrap();
        assert_eq!(last.kind, TokenKind::Error, "no error for {input:?}");
        last
    }

    use TokenKind::{
        Comment, DataBlockStart, DataTag, Eof, Error, Float, Integer, Loop, Missing, Omitted,
        SaveFrameEnd, SaveFrameStart, String as Str, Version,
    };

    #[test]
    fn empty_input() {
        assert_eq!(kinds(""), vec![Eof]);
        assert_eq!(kinds("  \n# only a comment\n"), vec![Eof]);
    }

    #[test]
    fn version_line() {
        let tokens: Vec<_> = tokenize("#\\#CIF_1.1\ndata_x\n").collect();
        assert_eq!(tokens[0].kind, Version);
        assert_eq!(tokens[0].text, "#\\#CIF_1.1");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(
            kinds("#\\#CIF_1.1\ndata_x\n"),
            vec![Version, DataBlockStart, Eof]
        );
    }

    #[test]
    fn plain_comment_is_not_a_version() {
        let tokens: Vec<_> = tokenize("# CIF_1.1\ndata_x\n").collect();
        assert_eq!(tokens[0].kind, Comment);
        assert_eq!(tokens[0].text, " CIF_1.1");
    }

    #[test]
    fn items_and_heading() {
        let tokens: Vec<_> = tokenize("data_Test\n_Entry.ID 1CTF\n").collect();
        assert_eq!(tokens[0].kind, DataBlockStart);
        assert_eq!(tokens[0].text, "Test");
        assert_eq!(tokens[1].kind, DataTag);
        assert_eq!(tokens[1].text, "Entry.ID");
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].kind, Str);
        assert_eq!(tokens[2].text, "1CTF");
        assert_eq!(tokens[3].kind, Eof);
    }

    #[test]
    fn numeric_classification() {
        let input = "data_x\nloop_\n_v\n1 -2 +3 1.5 -.5 5. 1e5 2.5E-3 .\n? 12abc 1.5(3) + -. 1e 1e+ .e5\n";
        assert_eq!(
            values(input),
            vec![
                (Integer, "1".into()),
                (Integer, "-2".into()),
                (Integer, "+3".into()),
                (Float, "1.5".into()),
                (Float, "-.5".into()),
                (Float, "5.".into()),
                (Float, "1e5".into()),
                (Float, "2.5E-3".into()),
                (Omitted, ".".into()),
                (Missing, "?".into()),
                (Str, "12abc".into()),
                (Str, "1.5(3)".into()),
                (Str, "+".into()),
                (Str, "-.".into()),
                (Str, "1e".into()),
                (Str, "1e+".into()),
                (Str, ".e5".into()),
            ]
        );
    }

    #[test]
    fn null_markers_need_separation() {
        assert_eq!(
            values("data_x\n_a .5\n_b ?x\n_c .\n"),
            vec![
                (Float, ".5".into()),
                (Str, "?x".into()),
                (Omitted, ".".into()),
            ]
        );
    }

    #[test]
    fn quoted_strings() {
        assert_eq!(
            values("data_x\n_a 'hello world'\n_b \"it's fine\"\n_c 'say \"hi\"'\n_d ''\n"),
            vec![
                (Str, "hello world".into()),
                (Str, "it's fine".into()),
                (Str, "say \"hi\"".into()),
                (Str, "".into()),
            ]
        );
        assert_eq!(
            values("data_x\n_a 'andrew's pet'\n"),
            vec![(Str, "andrew's pet".into())]
        );
    }

    #[test]
    fn text_field() {
        let tokens: Vec<_> = tokenize("data_x\n_a\n;line one\nline two\n;\n_b c\n").collect();
        let field = &tokens[2];
        assert_eq!(field.kind, Str);
        assert_eq!(field.text, "line one\nline two");
        assert_eq!(field.line, 3);
        assert_eq!(tokens[3].kind, DataTag);
        assert_eq!(tokens[3].line, 6);
    }

    #[test]
    fn text_field_with_crlf() {
        assert_eq!(
            values("data_x\r\n_a\r\n;one\r\ntwo\r\n;\r\n"),
            vec![(Str, "one\r\ntwo".into())]
        );
    }

    #[test]
    fn semicolon_mid_line_is_unquoted() {
        assert_eq!(
            values("data_x\nloop_\n_a\n_b\nx ;y\n"),
            vec![(Str, "x".into()), (Str, ";y".into())]
        );
    }

    #[test]
    fn loop_structure() {
        assert_eq!(
            kinds("data_x\nloop_\n_a\n_b\n1 2\n3 4\n_c d\n"),
            vec![
                DataBlockStart,
                Loop,
                DataTag,
                DataTag,
                Integer,
                Integer,
                Integer,
                Integer,
                DataTag,
                Str,
                Eof
            ]
        );
    }

    #[test]
    fn loop_ends_at_keywords() {
        assert_eq!(
            kinds("data_x\nloop_\n_a\n1\nLOOP_\n_b\n2\ndata_y\n"),
            vec![
                DataBlockStart,
                Loop,
                DataTag,
                Integer,
                Loop,
                DataTag,
                Integer,
                DataBlockStart,
                Eof
            ]
        );
    }

    #[test]
    fn loop_without_values_hands_back_to_parser() {
        assert_eq!(
            kinds("data_x\nloop_\n_a\n"),
            vec![DataBlockStart, Loop, DataTag, Eof]
        );
    }

    #[test]
    fn save_frames() {
        assert_eq!(
            kinds("data_d\nsave_f\n_a 1\nloop_\n_b\n2\nsave_\n_c 3\n"),
            vec![
                DataBlockStart,
                SaveFrameStart,
                DataTag,
                Integer,
                Loop,
                DataTag,
                Integer,
                SaveFrameEnd,
                DataTag,
                Integer,
                Eof
            ]
        );
    }

    #[test]
    fn comments_between_tokens() {
        let tokens: Vec<_> = tokenize("data_x # heading\n_a 1 # one\n#\n_b 2\n").collect();
        let comments: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == Comment)
            .map(|t| t.text.as_ref())
            .collect();
        assert_eq!(comments, vec![" heading", " one", ""]);
        assert_eq!(
            kinds("data_x # heading\n_a 1 # one\n#\n_b 2\n"),
            vec![DataBlockStart, DataTag, Integer, DataTag, Integer, Eof]
        );
    }

    #[test]
    fn reserved_words() {
        assert!(error("data_x\n_a loop_\n").text.contains("loop_"));
        assert!(error("data_x\n_a STOP_\n").text.contains("stop_"));
        assert!(error("data_x\nglobal_\n").text.contains("global_"));
        assert!(error("global_\n").text.contains("global_"));
        assert!(error("data_x\n_a data_y\n").text.contains("data_"));
        assert!(error("data_x\n_a save_y\n").text.contains("save_"));
    }

    #[test]
    fn stray_save_end() {
        assert!(error("data_x\n_a 1\nsave_\n").text.contains("outside"));
    }

    #[test]
    fn nested_save_frames() {
        assert!(error("data_x\nsave_a\n_a 1\nsave_b\n").text.contains("nested"));
    }

    #[test]
    fn unterminated_save_frame_before_next_block() {
        assert!(error("data_x\nsave_a\n_a 1\ndata_y\n").text.contains("save_"));
    }

    #[test]
    fn content_before_first_block() {
        let err = error("hello\ndata_x\n");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unterminated_quote() {
        let err = error("data_x\n_a 'open");
        assert!(err.text.contains("EOF"));
        assert_eq!(err.line, 2);
        assert!(error("data_x\n_a 'open\n'\n").text.contains("new lines"));
    }

    #[test]
    fn unterminated_text_field() {
        let err = error("data_x\n_a\n;never\nclosed\n");
        assert!(err.text.contains("EOF"));
        assert_eq!(err.line, 5);
    }

    #[test]
    fn non_printable_in_text_field() {
        let err = error("data_x\n_a\n;bad\x07bell\n;\n");
        assert!(err.text.contains("\\x07"));
    }

    #[test]
    fn tag_needs_a_value() {
        assert_eq!(error("data_x\n_a _b\n").line, 2);
        assert!(error("data_x\n_a").text.contains("EOF"));
    }

    #[test]
    fn heading_needs_a_name() {
        assert!(error("data_\n").text.contains("name"));
    }

    #[test]
    fn error_ends_the_stream() {
        let mut scanner = tokenize("data_x\n_a loop_\n_b 1\n");
        let kinds: Vec<_> = scanner.by_ref().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![DataBlockStart, DataTag, Error]);
        assert!(scanner.next().is_none());
    }

    #[test]
    fn eof_is_yielded_once() {
        let mut scanner = tokenize("data_x\n");
        assert_eq!(scanner.next().map(|t| t.kind), Some(DataBlockStart));
        assert_eq!(scanner.next().map(|t| t.kind), Some(Eof));
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }
}
