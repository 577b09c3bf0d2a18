//! CIF text parser.
//!
//! Drives the [`Scanner`] one token at a time and builds a [`Document`],
//! enforcing name uniqueness and table shape. Table columns are typed once
//! all of their values are known: integer if every value is an integer,
//! float if every value is numeric, string otherwise. `.` and `?` fit any
//! column type.

use std::borrow::Cow;
use std::io::Read;
use std::str::FromStr;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::dom::{normalize_name, Block, DataBlock, Document, Table};
use crate::lex::{Scanner, Token, TokenKind, VERSION_PREFIX};
use crate::value::{Column, Value, MISSING, OMITTED};

/// Errors that can occur while reading a CIF document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("CIF parse error (line {line}): {message}")]
    Scan { line: usize, message: String },
    #[error("CIF parse error (line {line}): expected {expected}, but got a {found} instead")]
    Unexpected {
        line: usize,
        expected: String,
        found: TokenKind,
    },
    #[error("CIF parse error (line {line}): data block with name '{name}' already exists")]
    DuplicateBlock { line: usize, name: String },
    #[error(
        "CIF parse error (line {line}): save frame with name '{name}' already exists in data block '{block}'"
    )]
    DuplicateFrame {
        line: usize,
        name: String,
        block: String,
    },
    #[error(
        "CIF parse error (line {line}): data item with name '{tag}' already exists in block '{block}'"
    )]
    DuplicateTag {
        line: usize,
        tag: String,
        block: String,
    },
    #[error(
        "CIF parse error (line {line}): there are {values} values in the loop starting on line {line}, \
         which is not a multiple of the number of columns in the loop ({columns})"
    )]
    LoopShape {
        line: usize,
        values: usize,
        columns: usize,
    },
    #[error("CIF parse error (line {line}): could not parse '{text}' as {kind}: {reason}")]
    InvalidNumber {
        line: usize,
        text: String,
        kind: TokenKind,
        reason: String,
    },
    #[error("could not read CIF input: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// The 1-based line the error was detected on. `None` for I/O errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Scan { line, .. }
            | ParseError::Unexpected { line, .. }
            | ParseError::DuplicateBlock { line, .. }
            | ParseError::DuplicateFrame { line, .. }
            | ParseError::DuplicateTag { line, .. }
            | ParseError::LoopShape { line, .. }
            | ParseError::InvalidNumber { line, .. } => Some(*line),
            ParseError::Io(_) => None,
        }
    }
}

/// What to do with `.` and `?` cells in a column that is otherwise numeric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullPolicy {
    /// Store them as `0`. The column stays numeric, but `.` and `?` can no
    /// longer be told apart from a real zero.
    #[default]
    Zero,
    /// Keep such a column as strings, holding every cell's raw text.
    KeepAsString,
}

/// Options for [`read_with`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub null_policy: NullPolicy,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }
}

/// Parse CIF text into a [`Document`].
pub fn read(input: &str) -> Result<Document, ParseError> {
    read_with(input, &ReadOptions::default())
}

/// Parse CIF text into a [`Document`] with explicit options.
pub fn read_with(input: &str, options: &ReadOptions) -> Result<Document, ParseError> {
    let doc = Parser::new(input, options).parse_document()?;
    debug!(
        bytes = input.len(),
        blocks = doc.blocks.len(),
        "parsed CIF document"
    );
    Ok(doc)
}

/// Read all of `reader`, then parse it.
pub fn read_from<R: Read>(reader: R) -> Result<Document, ParseError> {
    read_from_with(reader, &ReadOptions::default())
}

pub fn read_from_with<R: Read>(mut reader: R, options: &ReadOptions) -> Result<Document, ParseError> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;
    read_with(&input, options)
}

impl FromStr for Document {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        read(s)
    }
}

// ---------------------------------------------------------------------------
// Column typing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Only `.` / `?` seen so far.
    Unset,
    Int,
    Float,
    Str,
}

impl ColumnKind {
    fn absorb(self, token: TokenKind) -> ColumnKind {
        match (self, token) {
            (_, TokenKind::Omitted | TokenKind::Missing) => self,
            (ColumnKind::Unset | ColumnKind::Int, TokenKind::Integer) => ColumnKind::Int,
            (ColumnKind::Unset | ColumnKind::Int | ColumnKind::Float, TokenKind::Float)
            | (ColumnKind::Float, TokenKind::Integer) => ColumnKind::Float,
            _ => ColumnKind::Str,
        }
    }
}

struct Cell<'a> {
    kind: TokenKind,
    text: Cow<'a, str>,
    line: usize,
}

/// One table column while its values are being collected.
struct PendingColumn<'a> {
    tag: String,
    cells: Vec<Cell<'a>>,
    kind: ColumnKind,
    has_null: bool,
}

impl<'a> PendingColumn<'a> {
    fn new(tag: String) -> Self {
        Self {
            tag,
            cells: Vec::new(),
            kind: ColumnKind::Unset,
            has_null: false,
        }
    }

    fn push(&mut self, token: Token<'a>) {
        self.kind = self.kind.absorb(token.kind);
        self.has_null |= token.kind.is_null();
        self.cells.push(Cell {
            kind: token.kind,
            text: token.text,
            line: token.line,
        });
    }

    fn into_column(self, policy: NullPolicy) -> Result<Column, ParseError> {
        let keep_text = self.has_null && policy == NullPolicy::KeepAsString;
        match self.kind {
            ColumnKind::Int if !keep_text => self
                .cells
                .iter()
                .map(|cell| match cell.kind {
                    TokenKind::Omitted | TokenKind::Missing => Ok(0),
                    _ => parse_int(cell),
                })
                .collect::<Result<_, _>>()
                .map(Column::Ints),
            ColumnKind::Float if !keep_text => self
                .cells
                .iter()
                .map(|cell| match cell.kind {
                    TokenKind::Omitted | TokenKind::Missing => Ok(0.0),
                    _ => parse_float(cell),
                })
                .collect::<Result<_, _>>()
                .map(Column::Floats),
            _ => Ok(Column::Strs(
                self.cells
                    .into_iter()
                    .map(|cell| cell.text.into_owned())
                    .collect(),
            )),
        }
    }
}

fn parse_int(cell: &Cell<'_>) -> Result<i64, ParseError> {
    cell.text
        .parse::<i64>()
        .map_err(|e| ParseError::InvalidNumber {
            line: cell.line,
            text: cell.text.to_string(),
            kind: TokenKind::Integer,
            reason: e.to_string(),
        })
}

/// Literals beyond `f64` range parse to infinity; those are rejected.
fn parse_float(cell: &Cell<'_>) -> Result<f64, ParseError> {
    let invalid = |reason: String| ParseError::InvalidNumber {
        line: cell.line,
        text: cell.text.to_string(),
        kind: TokenKind::Float,
        reason,
    };
    let value = cell
        .text
        .parse::<f64>()
        .map_err(|e| invalid(e.to_string()))?;
    if !value.is_finite() {
        return Err(invalid("out of range".into()));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Structure parsing
// ---------------------------------------------------------------------------

struct Parser<'a, 'o> {
    tokens: Scanner<'a>,
    pending: Option<Token<'a>>,
    line: usize,
    options: &'o ReadOptions,
}

impl<'a, 'o> Parser<'a, 'o> {
    fn new(input: &'a str, options: &'o ReadOptions) -> Self {
        Self {
            tokens: Scanner::new(input),
            pending: None,
            line: 1,
            options,
        }
    }

    /// The next meaningful token. Comments are skipped and scan errors are
    /// raised.
    fn next(&mut self) -> Result<Token<'a>, ParseError> {
        if let Some(t) = self.pending.take() {
            return Ok(t);
        }
        loop {
            let Some(token) = self.tokens.next() else {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    text: Cow::Borrowed(""),
                    line: self.line,
                });
            };
            self.line = token.line;
            match token.kind {
                TokenKind::Comment => continue,
                TokenKind::Error => {
                    return Err(ParseError::Scan {
                        line: token.line,
                        message: token.text.into_owned(),
                    })
                }
                _ => return Ok(token),
            }
        }
    }

    fn push_back(&mut self, token: Token<'a>) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(token);
    }

    fn unexpected(&self, expected: impl Into<String>, token: &Token<'_>) -> ParseError {
        ParseError::Unexpected {
            line: token.line,
            expected: expected.into(),
            found: token.kind,
        }
    }

    fn parse_document(&mut self) -> Result<Document, ParseError> {
        let mut doc = Document::new();
        let first = self.next()?;
        if first.kind == TokenKind::Version {
            let version = first
                .text
                .strip_prefix(VERSION_PREFIX)
                .unwrap_or(first.text.as_ref());
            doc.version = Some(version.to_string());
        } else {
            self.push_back(first);
        }

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::DataBlockStart => {
                    let name = normalize_name(&token.text);
                    self.parse_data_block(&mut doc, name)?;
                }
                _ => {
                    return Err(self.unexpected("comments, whitespace or a data block heading", &token))
                }
            }
        }
        Ok(doc)
    }

    fn parse_data_block(&mut self, doc: &mut Document, name: String) -> Result<(), ParseError> {
        if doc.blocks.contains_key(&name) {
            return Err(ParseError::DuplicateBlock {
                line: self.line,
                name,
            });
        }
        let mut block = DataBlock::new(&name);

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::Eof | TokenKind::DataBlockStart => {
                    self.push_back(token);
                    break;
                }
                TokenKind::SaveFrameStart => {
                    let frame_name = normalize_name(&token.text);
                    self.parse_save_frame(&mut block, frame_name)?;
                }
                TokenKind::Loop => self.parse_loop(&mut block.block)?,
                TokenKind::DataTag => self.parse_item(&mut block.block, &token.text)?,
                _ => {
                    return Err(self.unexpected(
                        "a data item, a table, a save frame or a data block heading",
                        &token,
                    ))
                }
            }
        }

        debug!(
            block = %name,
            items = block.items.len(),
            tables = block.distinct_tables().len(),
            frames = block.frames.len(),
            "parsed data block"
        );
        doc.blocks.insert(name, block);
        Ok(())
    }

    fn parse_save_frame(&mut self, parent: &mut DataBlock, name: String) -> Result<(), ParseError> {
        if parent.frames.contains_key(&name) {
            return Err(ParseError::DuplicateFrame {
                line: self.line,
                name,
                block: parent.name.clone(),
            });
        }
        let mut frame = Block::new(&name);

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::SaveFrameEnd => break,
                TokenKind::Loop => self.parse_loop(&mut frame)?,
                TokenKind::DataTag => self.parse_item(&mut frame, &token.text)?,
                _ => {
                    return Err(self.unexpected(
                        "a data item, a table or the end of the save frame",
                        &token,
                    ))
                }
            }
        }

        parent.frames.insert(name, frame);
        Ok(())
    }

    fn parse_item(&mut self, block: &mut Block, raw_tag: &str) -> Result<(), ParseError> {
        let tag = raw_tag.to_ascii_lowercase();
        self.assert_unique_tag(block, &tag)?;
        let token = self.next()?;
        let value = match token.kind {
            TokenKind::Omitted => Value::Str(OMITTED.into()),
            TokenKind::Missing => Value::Str(MISSING.into()),
            TokenKind::Integer => Value::Int(parse_int(&cell_of(&token))?),
            TokenKind::Float => Value::Float(parse_float(&cell_of(&token))?),
            TokenKind::String => Value::Str(token.text.into_owned()),
            _ => {
                return Err(self.unexpected(
                    format!("a value for data tag '{tag}' in block '{}'", block.name),
                    &token,
                ))
            }
        };
        block.items.insert(tag, value);
        Ok(())
    }

    /// Parse the tags and values following `loop_` and install the table
    /// under each of its tags.
    fn parse_loop(&mut self, block: &mut Block) -> Result<(), ParseError> {
        let loop_line = self.line;

        let mut token = self.next()?;
        if token.kind != TokenKind::DataTag {
            return Err(self.unexpected("at least one data tag after 'loop_'", &token));
        }
        let mut columns: Vec<PendingColumn<'a>> = Vec::new();
        while token.kind == TokenKind::DataTag {
            let tag = token.text.to_ascii_lowercase();
            self.assert_unique_tag(block, &tag)?;
            if columns.iter().any(|c| c.tag == tag) {
                return Err(ParseError::DuplicateTag {
                    line: self.line,
                    tag,
                    block: block.name.clone(),
                });
            }
            columns.push(PendingColumn::new(tag));
            token = self.next()?;
        }

        if !token.kind.is_value() {
            return Err(self.unexpected(
                "at least one value after the data tags of 'loop_'",
                &token,
            ));
        }
        let mut count = 0;
        while token.kind.is_value() {
            let column = count % columns.len();
            columns[column].push(token);
            count += 1;
            token = self.next()?;
        }
        self.push_back(token);

        if count % columns.len() != 0 {
            return Err(ParseError::LoopShape {
                line: loop_line,
                values: count,
                columns: columns.len(),
            });
        }

        let mut index = IndexMap::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.into_iter().enumerate() {
            index.insert(column.tag.clone(), i);
            values.push(column.into_column(self.options.null_policy)?);
        }
        let table = block.insert_table(Table::from_checked(index, values));
        trace!(
            block = %block.name,
            line = loop_line,
            columns = table.ncols(),
            rows = table.nrows(),
            "installed table"
        );
        Ok(())
    }

    fn assert_unique_tag(&self, block: &Block, tag: &str) -> Result<(), ParseError> {
        if block.items.contains_key(tag) || block.tables.contains_key(tag) {
            return Err(ParseError::DuplicateTag {
                line: self.line,
                tag: tag.to_string(),
                block: block.name.clone(),
            });
        }
        Ok(())
    }
}

fn cell_of<'t>(token: &'t Token<'_>) -> Cell<'t> {
    Cell {
        kind: token.kind,
        text: Cow::Borrowed(token.text.as_ref()),
        line: token.line,
    }
}
