//! CIF 1.1 reader and writer.
//!
//! Three layers, each usable on its own:
//! - **Scanner** ([`lex`]): turns text into a stream of [`Token`]s.
//! - **Builder** ([`parse`]): checks structure and names, types table columns,
//!   and yields a [`Document`].
//! - **Writer** ([`write`]): turns a [`Document`] back into CIF text that
//!   re-reads as an equal document.
//!
//! ```ignore
//! let doc = cif_io::read(input)?;
//! let block = doc.block("1ctf").unwrap();
//!
//! let ids = block.column("_entity_poly_seq.num").unwrap().ints();
//! let name = block.item("_entry.id").map(|v| v.as_str());
//!
//! let text = cif_io::to_string(&doc)?;
//! ```

mod chars;
pub mod dom;
pub mod lex;
pub mod parse;
pub mod value;
pub mod write;

// DOM types
pub use dom::{Block, Columns, DataBlock, Document, RowIter, SaveFrame, Table, TableError};
pub use value::{Column, Value, MISSING, OMITTED};

// Scanner
pub use lex::{tokenize, Scanner, Token, TokenKind};

// Reading
pub use parse::{read, read_from, read_from_with, read_with, NullPolicy, ParseError, ReadOptions};

// Writing
pub use write::{to_string, write, WriteError};
