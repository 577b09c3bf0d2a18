//! CIF 1.1 character classes.
//!
//! CIF text is ASCII. The classes nest: every ordinary character is
//! non-blank, and every non-blank character other than `;` at line start is
//! printable.

/// Letters, digits and the unreserved punctuation set.
pub(crate) fn is_ordinary(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'%'
                | b'&'
                | b'('
                | b')'
                | b'*'
                | b'+'
                | b','
                | b'-'
                | b'.'
                | b'/'
                | b':'
                | b'<'
                | b'='
                | b'>'
                | b'?'
                | b'@'
                | b'\\'
                | b'^'
                | b'`'
                | b'{'
                | b'|'
                | b'}'
                | b'~'
        )
}

/// Characters allowed inside tags, block names and unquoted values.
pub(crate) fn is_non_blank(b: u8) -> bool {
    is_ordinary(b) || matches!(b, b'"' | b'#' | b'$' | b'\'' | b'_' | b';' | b'[' | b']')
}

/// Characters allowed inside text fields and quoted strings.
pub(crate) fn is_printable(b: u8) -> bool {
    is_non_blank(b) || b == b' ' || b == b'\t'
}

pub(crate) fn is_newline(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

pub(crate) fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t' || is_newline(b)
}
