use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// 1-based location inside a source unit.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    pub(crate) fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_tracks_lines() {
        let mut pos = Position::default();
        for c in "ab\nc".chars() {
            pos.advance(c);
        }
        assert_eq!(pos, Position::new(2, 2));
        assert_eq!(pos.to_string(), "2:2");
    }
}
