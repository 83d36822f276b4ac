use crate::cell::{Wint, Wstr, Wsubstr};
use crate::throw::{Throw, Wres1};

pub const SOURCE_HOST: Wint = 0;
pub const SOURCE_EVAL: Wint = -1;

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Scan position inside an input buffer, cheap to snapshot so a parsing
/// word that runs out of text can be retried after more arrives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mark {
    pos: usize,
    line: u32,
    col: u32,
}

/// One source buffer with a scan cursor. Columns count characters, not
/// bytes; delimiters are ASCII so slices never split a UTF-8 sequence.
#[derive(Clone, Debug)]
pub struct Input {
    buf: Wstr,
    pos: usize,
    line: u32,
    col: u32,
    tok_pos: usize,
    tok_line: u32,
    tok_col: u32,
    source_id: Wint,
}

impl Input {
    pub fn new(text: &str, source_id: Wint) -> Input {
        Input {
            buf: Wstr::from(text),
            pos: 0,
            line: 1,
            col: 1,
            tok_pos: 0,
            tok_line: 1,
            tok_col: 1,
            source_id,
        }
    }

    pub fn empty() -> Input {
        Input::new("", SOURCE_HOST)
    }

    pub fn source_id(&self) -> Wint {
        self.source_id
    }

    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    pub fn rewind(&mut self, m: Mark) {
        self.pos = m.pos;
        self.line = m.line;
        self.col = m.col;
    }

    /// Extend the buffer with another line of source, keeping the cursor.
    pub fn append_line(&mut self, more: &str) {
        let mut s = String::with_capacity(self.buf.len() + more.len() + 1);
        s.push_str(&self.buf);
        s.push('\n');
        s.push_str(more);
        self.buf = Wstr::from(s);
    }

    pub fn is_exhausted(&self) -> bool {
        self.buf.as_bytes()[self.pos..].iter().all(|b| is_space(*b))
    }

    fn advance_to(&mut self, to: usize) {
        let bytes = self.buf.as_bytes();
        let mut at = self.pos;
        while at < to && at < bytes.len() {
            let b = bytes[at];
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else if b & 0xc0 != 0x80 {
                // count the lead byte of each char only
                self.col += 1;
            }
            at += 1;
        }
        self.pos = at;
    }

    fn skip_spaces(&mut self) {
        let bytes = self.buf.as_bytes();
        let mut at = self.pos;
        while at < bytes.len() && is_space(bytes[at]) {
            at += 1;
        }
        self.advance_to(at);
    }

    /// Next whitespace-delimited token, or None at end of buffer.
    pub fn next_token(&mut self) -> Option<Wsubstr> {
        self.skip_spaces();
        let bytes = self.buf.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }
        self.tok_pos = self.pos;
        self.tok_line = self.line;
        self.tok_col = self.col;
        let start = self.pos;
        let mut end = start;
        while end < bytes.len() && !is_space(bytes[end]) {
            end += 1;
        }
        self.advance_to(end);
        Some(self.buf.substr(start..end))
    }

    /// Text up to `delim`, consuming the delimiter but not including it.
    /// One leading space is the conventional separator after the parsing
    /// word and is skipped. A missing delimiter asks for more input.
    pub fn parse_until(&mut self, delim: char) -> Wres1<Wsubstr> {
        self.skip_one_space();
        let start = self.pos;
        let bytes = self.buf.as_bytes();
        match memchr::memchr(delim as u8, &bytes[start..]) {
            Some(at) => {
                let end = start + at;
                let s = self.buf.substr(start..end);
                self.advance_to(end + 1);
                Ok(s)
            }
            None => Err(Throw::INCOMPLETE_INPUT),
        }
    }

    /// Like `parse_until` but an absent delimiter just takes the rest of
    /// the buffer, the way a comment open at end of input closes itself.
    pub fn parse_until_or_end(&mut self, delim: char) -> Wsubstr {
        self.skip_one_space();
        let start = self.pos;
        let bytes = self.buf.as_bytes();
        match memchr::memchr(delim as u8, &bytes[start..]) {
            Some(at) => {
                let end = start + at;
                let s = self.buf.substr(start..end);
                self.advance_to(end + 1);
                s
            }
            None => {
                let s = self.buf.substr(start..);
                self.advance_to(bytes.len());
                s
            }
        }
    }

    fn skip_one_space(&mut self) {
        if self.buf.as_bytes().get(self.pos) == Some(&b' ') {
            self.advance_to(self.pos + 1);
        }
    }

    pub fn skip_line(&mut self) {
        let bytes = self.buf.as_bytes();
        match memchr::memchr(b'\n', &bytes[self.pos..]) {
            Some(at) => self.advance_to(self.pos + at + 1),
            None => self.advance_to(bytes.len()),
        }
    }

    /// Location of the token most recently scanned, 1-based.
    pub fn token_location(&self) -> (u32, u32) {
        (self.tok_line, self.tok_col)
    }

    /// Full source line holding the most recent token, for diagnostics.
    pub fn token_line_text(&self) -> Wsubstr {
        let bytes = self.buf.as_bytes();
        let at = self.tok_pos.min(bytes.len());
        let start = match memchr::memrchr(b'\n', &bytes[..at]) {
            Some(nl) => nl + 1,
            None => 0,
        };
        let end = match memchr::memchr(b'\n', &bytes[at..]) {
            Some(nl) => at + nl,
            None => bytes.len(),
        };
        self.buf.substr(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_scan() {
        let mut inp = Input::new("  1 2\n\tswap  ", SOURCE_HOST);
        assert_eq!("1", inp.next_token().unwrap().as_str());
        assert_eq!((1, 3), inp.token_location());
        assert_eq!("2", inp.next_token().unwrap().as_str());
        assert_eq!("swap", inp.next_token().unwrap().as_str());
        assert_eq!((2, 2), inp.token_location());
        assert_eq!(None, inp.next_token());
        assert!(inp.is_exhausted());
    }

    #[test]
    fn test_parse_until() {
        let mut inp = Input::new(r#"s" hello world" 5"#, SOURCE_HOST);
        assert_eq!("s\"", inp.next_token().unwrap().as_str());
        assert_eq!("hello world", inp.parse_until('"').unwrap().as_str());
        assert_eq!("5", inp.next_token().unwrap().as_str());
    }

    #[test]
    fn test_parse_preserves_extra_spaces() {
        let mut inp = Input::new("s\"  padded\" x", SOURCE_HOST);
        inp.next_token();
        assert_eq!(" padded", inp.parse_until('"').unwrap().as_str());
    }

    #[test]
    fn test_parse_until_missing_delim() {
        let mut inp = Input::new("s\" no end", SOURCE_HOST);
        inp.next_token();
        let m = inp.mark();
        assert_eq!(Err(Throw::INCOMPLETE_INPUT), inp.parse_until('"'));
        inp.rewind(m);
        inp.append_line("still open\" done");
        assert_eq!("no end\nstill open", inp.parse_until('"').unwrap().as_str());
        assert_eq!("done", inp.next_token().unwrap().as_str());
    }

    #[test]
    fn test_comment_to_end() {
        let mut inp = Input::new("( open comment", SOURCE_HOST);
        inp.next_token();
        assert_eq!("open comment", inp.parse_until_or_end(')').as_str());
        assert_eq!(None, inp.next_token());
    }

    #[test]
    fn test_skip_line() {
        let mut inp = Input::new("\\ a comment\n7", SOURCE_HOST);
        inp.next_token();
        inp.skip_line();
        assert_eq!("7", inp.next_token().unwrap().as_str());
        assert_eq!((2, 1), inp.token_location());
    }

    #[test]
    fn test_line_text_and_unicode_columns() {
        let mut inp = Input::new("1 2\nπ λсловоx 4", SOURCE_HOST);
        inp.next_token();
        inp.next_token();
        assert_eq!("π", inp.next_token().unwrap().as_str());
        assert_eq!((2, 1), inp.token_location());
        assert_eq!("λсловоx", inp.next_token().unwrap().as_str());
        assert_eq!((2, 3), inp.token_location());
        assert_eq!("π λсловоx 4", inp.token_line_text().as_str());
    }
}
