//! CIF text writer.
//!
//! Serializes a [`Document`] so that reading the output back yields an equal
//! document. Each string value is written in the lightest form that
//! re-reads as the same string: bare, quoted, or as a semicolon text field.

use std::borrow::Cow;
use std::io::{self, BufWriter, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::chars::{is_newline, is_non_blank, is_ordinary, is_printable};
use crate::dom::{Block, DataBlock, Document, Table};
use crate::lex::VERSION_PREFIX;
use crate::value::{format_float, Column, Value, MISSING, OMITTED};

/// Text the scanner would read as a number.
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap());

/// Errors that can occur while writing a CIF document.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("{context}: the character {ch:?} cannot be written to CIF")]
    Unprintable { context: String, ch: char },
    #[error("{context}: text with a line starting with ';' cannot be written to CIF")]
    TextFieldTerminator { context: String },
    #[error("{context}: the float {value} cannot be written to CIF")]
    NonFinite { context: String, value: f64 },
    #[error("invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },
    #[error("could not write CIF output: {0}")]
    Io(#[from] io::Error),
}

/// Why a single value could not be formatted. Gets its context attached by
/// the caller.
#[derive(Debug)]
enum Problem {
    Unprintable(char),
    Terminator,
    NonFinite(f64),
}

impl Problem {
    fn at(self, context: String) -> WriteError {
        match self {
            Problem::Unprintable(ch) => WriteError::Unprintable { context, ch },
            Problem::Terminator => WriteError::TextFieldTerminator { context },
            Problem::NonFinite(value) => WriteError::NonFinite { context, value },
        }
    }
}

/// A value ready to be written.
#[derive(Debug, PartialEq)]
enum Formatted<'a> {
    /// Fits on the current line.
    Inline(Cow<'a, str>),
    /// Needs a semicolon text field, which must start its own line.
    TextField(&'a str),
}

/// Write `doc` as CIF text.
pub fn write<W: Write>(doc: &Document, out: W) -> Result<(), WriteError> {
    let mut writer = Writer {
        out: BufWriter::new(out),
    };
    writer.document(doc)?;
    writer.out.flush()?;
    debug!(blocks = doc.blocks.len(), "wrote CIF document");
    Ok(())
}

/// Render `doc` as a CIF string.
pub fn to_string(doc: &Document) -> Result<String, WriteError> {
    let mut buf = Vec::new();
    write(doc, &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

impl Document {
    /// Write this document as CIF text.
    pub fn write_to<W: Write>(&self, out: W) -> Result<(), WriteError> {
        write(self, out)
    }
}

// ---------------------------------------------------------------------------
// Value formatting
// ---------------------------------------------------------------------------

fn format_value(value: &Value) -> Result<Formatted<'_>, Problem> {
    match value {
        Value::Str(s) => format_str(s),
        Value::Int(n) => Ok(Formatted::Inline(Cow::Owned(n.to_string()))),
        Value::Float(f) => format_f64(*f),
    }
}

fn format_f64(f: f64) -> Result<Formatted<'static>, Problem> {
    if !f.is_finite() {
        return Err(Problem::NonFinite(f));
    }
    Ok(Formatted::Inline(Cow::Owned(format_float(f))))
}

fn format_str(s: &str) -> Result<Formatted<'_>, Problem> {
    if let Some(ch) = s
        .chars()
        .find(|&c| !is_newline_char(c) && !is_printable_char(c))
    {
        return Err(Problem::Unprintable(ch));
    }
    if s.contains(is_newline_char) {
        return text_field(s);
    }
    match (s.contains('\''), s.contains('"')) {
        (true, true) => text_field(s),
        (false, true) => Ok(Formatted::Inline(Cow::Owned(format!("'{s}'")))),
        (true, false) => Ok(Formatted::Inline(Cow::Owned(format!("\"{s}\"")))),
        (false, false) if s == OMITTED || s == MISSING || !needs_quotes(s) => {
            Ok(Formatted::Inline(Cow::Borrowed(s)))
        }
        (false, false) => Ok(Formatted::Inline(Cow::Owned(format!("\"{s}\"")))),
    }
}

fn text_field(s: &str) -> Result<Formatted<'_>, Problem> {
    if s.contains("\n;") || s.contains("\r;") {
        return Err(Problem::Terminator);
    }
    Ok(Formatted::TextField(s))
}

/// The closing delimiter for a text field holding `text`.
///
/// A trailing `\r` would pair with a plain `\n;` and be read as part of
/// the terminator, so it gets a `\r\n;` of its own.
fn text_field_end(text: &str) -> &'static str {
    if text.ends_with('\r') {
        "\r\n;"
    } else {
        "\n;"
    }
}

fn is_printable_char(c: char) -> bool {
    c.is_ascii() && is_printable(c as u8)
}

fn is_newline_char(c: char) -> bool {
    c.is_ascii() && is_newline(c as u8)
}

/// Returns `true` unless `s` would re-read unquoted as the same string.
fn needs_quotes(s: &str) -> bool {
    let bytes = s.as_bytes();
    if !bytes.first().is_some_and(|&b| is_ordinary(b)) {
        return true;
    }
    if !bytes.iter().all(|&b| is_non_blank(b)) {
        return true;
    }
    if NUMERIC.is_match(s) {
        return true;
    }
    let lower = s.to_ascii_lowercase();
    ["data_", "save_", "loop_", "stop_", "global_"]
        .iter()
        .any(|word| lower.starts_with(word))
}

fn check_name(kind: &'static str, name: &str) -> Result<(), WriteError> {
    if name.is_empty() || !name.bytes().all(is_non_blank) {
        return Err(WriteError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Document layout
// ---------------------------------------------------------------------------

struct Writer<W: Write> {
    out: W,
}

impl<W: Write> Writer<W> {
    fn document(&mut self, doc: &Document) -> Result<(), WriteError> {
        if let Some(version) = &doc.version {
            if !version.starts_with("CIF_") {
                return Err(WriteError::InvalidName {
                    kind: "version",
                    name: version.clone(),
                });
            }
            check_name("version", version)?;
            writeln!(self.out, "{VERSION_PREFIX}{version}")?;
        }
        for (i, block) in doc.blocks.values().enumerate() {
            if i > 0 {
                writeln!(self.out)?;
            }
            self.data_block(block)?;
        }
        Ok(())
    }

    fn data_block(&mut self, block: &DataBlock) -> Result<(), WriteError> {
        check_name("data block", &block.name)?;
        writeln!(self.out, "data_{}", block.name)?;
        for frame in block.frames.values() {
            check_name("save frame", &frame.name)?;
            writeln!(self.out, "save_{}", frame.name)?;
            self.body(frame)?;
            writeln!(self.out, "save_")?;
        }
        self.body(block)
    }

    /// Items first, then each table once.
    fn body(&mut self, block: &Block) -> Result<(), WriteError> {
        for (tag, value) in &block.items {
            check_name("tag", tag)?;
            let formatted = format_value(value)
                .map_err(|p| p.at(format!("data item '_{tag}' in block '{}'", block.name)))?;
            match formatted {
                Formatted::Inline(text) => writeln!(self.out, "_{tag}  {text}")?,
                Formatted::TextField(text) => {
                    writeln!(self.out, "_{tag}\n;{text}{}", text_field_end(text))?
                }
            }
        }
        for table in block.distinct_tables() {
            self.table(block, table)?;
        }
        Ok(())
    }

    fn table(&mut self, block: &Block, table: &Table) -> Result<(), WriteError> {
        writeln!(self.out, "loop_")?;
        for tag in table.tags() {
            check_name("tag", tag)?;
            writeln!(self.out, "_{tag}")?;
        }

        let tags: Vec<&str> = table.tags().collect();
        for row in 0..table.nrows() {
            let mut line_open = false;
            for (column, tag) in table.columns().iter().zip(&tags) {
                let formatted = format_cell(column, row).map_err(|p| {
                    p.at(format!(
                        "row {row} of column '_{tag}' in block '{}'",
                        block.name
                    ))
                })?;
                match formatted {
                    Formatted::Inline(text) => {
                        if line_open {
                            write!(self.out, "  ")?;
                        }
                        write!(self.out, "{text}")?;
                    }
                    Formatted::TextField(text) => {
                        if line_open {
                            writeln!(self.out)?;
                        }
                        write!(self.out, ";{text}{}", text_field_end(text))?;
                    }
                }
                line_open = true;
            }
            writeln!(self.out)?;
        }
        trace!(
            block = %block.name,
            columns = table.ncols(),
            rows = table.nrows(),
            "wrote table"
        );
        Ok(())
    }
}

fn format_cell(column: &Column, row: usize) -> Result<Formatted<'_>, Problem> {
    match column {
        Column::Strs(v) => format_str(&v[row]),
        Column::Ints(v) => Ok(Formatted::Inline(Cow::Owned(v[row].to_string()))),
        Column::Floats(v) => format_f64(v[row]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::read;

    fn inline(s: &str) -> String {
        match format_str(s).unwrap() {
            Formatted::Inline(text) => text.into_owned(),
            Formatted::TextField(_) => panic!("{s:?} became a text field"),
        }
    }

    fn single_item_doc(value: impl Into<Value>) -> Document {
        let mut block = DataBlock::new("t");
        block.insert_item("v", value);
        let mut doc = Document::new();
        doc.insert_block(block);
        doc
    }

    #[test]
    fn bare_strings() {
        assert_eq!(inline("ALA"), "ALA");
        assert_eq!(inline("1.5(3)"), "1.5(3)");
        assert_eq!(inline("."), ".");
        assert_eq!(inline("?"), "?");
        assert_eq!(inline("it's"), "\"it's\"");
    }

    #[test]
    fn numeric_looking_strings_are_quoted() {
        assert_eq!(inline("1.5"), "\"1.5\"");
        assert_eq!(inline("-12"), "\"-12\"");
        assert_eq!(inline(".5e-3"), "\".5e-3\"");
        assert_eq!(inline("1e"), "1e");
    }

    #[test]
    fn structural_strings_are_quoted() {
        assert_eq!(inline(""), "\"\"");
        assert_eq!(inline("P 21 21 21"), "\"P 21 21 21\"");
        assert_eq!(inline("O'Brien"), "\"O'Brien\"");
        assert_eq!(inline("say \"hi\""), "'say \"hi\"'");
        assert_eq!(inline("_tag"), "\"_tag\"");
        assert_eq!(inline("#x"), "\"#x\"");
        assert_eq!(inline("Data_x"), "\"Data_x\"");
        assert_eq!(inline("loop_"), "\"loop_\"");
        assert_eq!(inline("global_"), "\"global_\"");
    }

    #[test]
    fn text_fields() {
        assert_eq!(format_str("a\nb").unwrap(), Formatted::TextField("a\nb"));
        assert_eq!(format_str("a\rb").unwrap(), Formatted::TextField("a\rb"));
        assert_eq!(
            format_str("one\r\ntwo").unwrap(),
            Formatted::TextField("one\r\ntwo")
        );
        assert_eq!(
            format_str("it's \"both\"").unwrap(),
            Formatted::TextField("it's \"both\"")
        );
    }

    #[test]
    fn unwritable_values() {
        let err = to_string(&single_item_doc("x\n;y")).unwrap_err();
        assert!(matches!(err, WriteError::TextFieldTerminator { .. }));
        let err = to_string(&single_item_doc("x\r;y")).unwrap_err();
        assert!(matches!(err, WriteError::TextFieldTerminator { .. }));

        let err = to_string(&single_item_doc("bell\u{7}")).unwrap_err();
        assert!(matches!(err, WriteError::Unprintable { ch: '\u{7}', .. }));
        assert!(err.to_string().contains("'_v'"));

        let err = to_string(&single_item_doc("caf\u{e9}")).unwrap_err();
        assert!(matches!(err, WriteError::Unprintable { .. }));

        let err = to_string(&single_item_doc(f64::NAN)).unwrap_err();
        assert!(matches!(err, WriteError::NonFinite { .. }));
    }

    #[test]
    fn invalid_names() {
        let mut doc = Document::new();
        doc.insert_block(DataBlock::new(""));
        assert!(matches!(
            to_string(&doc).unwrap_err(),
            WriteError::InvalidName {
                kind: "data block",
                ..
            }
        ));

        let mut doc = single_item_doc(1);
        doc.version = Some("CIF 1.1".into());
        assert!(matches!(
            to_string(&doc).unwrap_err(),
            WriteError::InvalidName { kind: "version", .. }
        ));
    }

    #[test]
    fn layout() {
        let mut block = DataBlock::new("B");
        block.insert_item("a", 1);
        block.insert_table(
            Table::new(vec![
                ("x", Column::from(vec![1i64, 2])),
                ("y", Column::from(vec!["p", "q r"])),
            ])
            .unwrap(),
        );
        let mut frame = Block::new("f");
        frame.insert_item("note", "multi\nline");
        block.insert_frame(frame);

        let mut doc = Document::new();
        doc.version = Some("CIF_1.1".into());
        doc.insert_block(block);
        doc.insert_block(DataBlock::new("empty"));

        let expected = "#\\#CIF_1.1\n\
                        data_b\n\
                        save_f\n\
                        _note\n;multi\nline\n;\n\
                        save_\n\
                        _a  1\n\
                        loop_\n_x\n_y\n1  p\n2  \"q r\"\n\
                        \n\
                        data_empty\n";
        assert_eq!(to_string(&doc).unwrap(), expected);
    }

    #[test]
    fn text_field_cells_start_their_own_line() {
        let mut block = DataBlock::new("t");
        block.insert_table(
            Table::new(vec![
                ("a", Column::from(vec!["x", "y"])),
                ("b", Column::from(vec!["one\ntwo", "z"])),
                ("c", Column::from(vec![1.5, 2.0])),
            ])
            .unwrap(),
        );
        let mut doc = Document::new();
        doc.insert_block(block);

        let text = to_string(&doc).unwrap();
        assert!(text.contains("x\n;one\ntwo\n;  1.5\ny  z  2.0\n"), "{text}");
        assert_eq!(read(&text).unwrap(), doc);
    }

    #[test]
    fn tricky_strings_round_trip() {
        for s in [
            "",
            "1.5",
            "O'Brien",
            "say \"hi\"",
            "both ' and \"",
            "a\nb",
            "one\r\ntwo",
            "ends in cr\r",
            "\r",
            "a\r\n",
            "tab\there",
            ";leading",
            "data_x",
            "  padded  ",
            ".",
            "?",
            "'",
        ] {
            let doc = single_item_doc(s);
            let text = to_string(&doc).unwrap();
            let back = read(&text).unwrap();
            assert_eq!(back, doc, "{s:?} -> {text}");
        }
    }

    #[test]
    fn write_to_matches_to_string() {
        let doc = single_item_doc(2.5);
        let mut buf = Vec::new();
        doc.write_to(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), to_string(&doc).unwrap());
        assert_eq!(to_string(&doc).unwrap(), "data_t\n_v  2.5\n");
    }
}
