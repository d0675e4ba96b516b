/// Character cursor over a single source line. Positions are char offsets,
/// which is what diagnostics ranges refer to.
#[derive(Debug, Clone)]
pub struct LineCursor {
    chars: Vec<char>,
    position: usize,
}

impl LineCursor {
    pub fn new(line: &str) -> Self {
        Self {
            chars: line.trim_end_matches('\r').chars().collect(),
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves back to a position previously returned by [`LineCursor::position`].
    pub fn rewind(&mut self, position: usize) {
        self.position = position.min(self.chars.len());
    }

    pub fn eol(&self) -> bool {
        self.position >= self.chars.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<char> {
        let chr = self.peek()?;
        self.position += 1;
        Some(chr)
    }

    /// Skips `n` chars, returns false if the line ran out first.
    pub fn skip(&mut self, n: usize) -> bool {
        let target = self.position + n;
        self.position = target.min(self.chars.len());
        target <= self.chars.len()
    }

    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_while(&mut self, mut accept: impl FnMut(char) -> bool) -> String {
        let start = self.position;
        while let Some(chr) = self.peek() {
            if !accept(chr) {
                break;
            }
            self.position += 1;
        }
        self.chars[start..self.position].iter().collect()
    }

    pub fn eat_whitespace(&mut self) -> bool {
        let start = self.position;
        self.eat_while(char::is_whitespace);
        self.position > start
    }

    /// Whether the remaining text starts with `pattern`; ASCII case is ignored
    /// when `ignore_case` is set.
    pub fn starts_with(&self, pattern: &str, ignore_case: bool) -> bool {
        let mut rest = self.chars[self.position.min(self.chars.len())..].iter();
        pattern.chars().all(|p| match rest.next() {
            Some(c) if ignore_case => c.eq_ignore_ascii_case(&p),
            Some(c) => *c == p,
            None => false,
        })
    }

    /// Consumes `pattern` if the remaining text starts with it.
    pub fn match_str(&mut self, pattern: &str, ignore_case: bool) -> bool {
        if self.starts_with(pattern, ignore_case) {
            self.position += pattern.chars().count();
            true
        } else {
            false
        }
    }

    pub fn rest(&self) -> String {
        self.chars[self.position.min(self.chars.len())..].iter().collect()
    }

    /// True when only whitespace or a comment remains.
    pub fn at_line_end(&mut self) -> bool {
        self.eat_whitespace();
        self.eol() || self.peek() == Some(crate::constant::COMMENT)
    }
}
