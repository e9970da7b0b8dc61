use std::fmt;

/// A zero-based line/character position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open span of source text between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceRange {
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand constructor from raw line/character components.
    pub fn of(start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Self {
        Self {
            start: Position::new(start_line, start_char),
            end: Position::new(end_line, end_char),
        }
    }

}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.character, self.end.line, self.end.character
        )
    }
}

/// Encodes a range as a stable interned-string identifier.
///
/// The identifier (`"line|char|line|char"`) is the value-equality cache key
/// used for tree node attributes, token lookup and cascade keys.
pub fn range_identifier(range: &SourceRange) -> String {
    format!(
        "{}|{}|{}|{}",
        range.start.line, range.start.character, range.end.line, range.end.character
    )
}

/// Decodes an identifier produced by [`range_identifier`] back into a range.
///
/// Returns `None` for identifiers that do not hold four numeric fields.
pub fn identifier_to_range(ident: &str) -> Option<SourceRange> {
    let mut parts = ident.split('|').map(|n| n.parse::<u32>().ok());
    let start_line = parts.next()??;
    let start_char = parts.next()??;
    let end_line = parts.next()??;
    let end_char = parts.next()??;
    Some(SourceRange::of(start_line, start_char, end_line, end_char))
}

/// Byte offsets of every line start, for position/offset conversion.
///
/// A [`Position`]'s character component counts UTF-16 code units, the
/// encoding token providers emit columns in; offsets are byte indices
/// into the text.
#[derive(Clone, Debug)]
pub struct LineMap<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineMap<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { text, starts }
    }

    /// Byte offset of a position, clamped to the enclosing line.
    pub fn offset_at(&self, pos: Position) -> usize {
        let Some(&line_start) = self.starts.get(pos.line as usize) else {
            return self.text.len();
        };
        let line_end = self
            .starts
            .get(pos.line as usize + 1)
            .copied()
            .unwrap_or(self.text.len());
        let mut units = 0;
        for (byte, ch) in self.text[line_start..line_end].char_indices() {
            if units >= pos.character as usize {
                return line_start + byte;
            }
            units += ch.len_utf16();
        }
        line_end
    }

    /// Position of a byte offset sitting on a character boundary.
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let units: usize = self.text[self.starts[line]..offset]
            .chars()
            .map(char::len_utf16)
            .sum();
        Position::new(line as u32, units as u32)
    }
}
