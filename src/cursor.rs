//! Byte cursor over one raw message.
//!
//! The cursor owns all positional context while a script steps through a
//! message: byte position, line tracking, and the bounded check/scan
//! primitives the Check and Scan operators are built from. Checks never
//! move the cursor. Scans leave it where the target was found, or at the
//! end of the scan range.

use crate::errors::{DecoderError, EndOfData};

const NL: u8 = b'\n';
const CR: u8 = b'\r';

/// Forward/backward cursor with line tracking over a message buffer.
pub struct DataCursor<'a> {
    data: &'a [u8],
    pos: usize,
    cur_line: u32,
    start_line: u32,
    /// Allow scans to cross an end-of-line
    scan_past_eol: bool,
    saved_pos: usize,
    saved_line: u32,
}

impl<'a> DataCursor<'a> {
    pub fn new(data: &'a [u8], start_line: u32) -> Self {
        Self {
            data,
            pos: 0,
            cur_line: start_line,
            start_line,
            scan_past_eol: false,
            saved_pos: 0,
            saved_line: start_line,
        }
    }

    pub fn with_scan_past_eol(mut self, yes: bool) -> Self {
        self.scan_past_eol = yes;
        self
    }

    fn end_of_data(&self) -> EndOfData {
        EndOfData {
            position: self.pos,
            length: self.data.len(),
        }
    }

    /// Current byte, without moving.
    pub fn current_byte(&self) -> Result<u8, EndOfData> {
        if self.pos >= self.data.len() {
            return Err(self.end_of_data());
        }
        Ok(self.data[self.pos])
    }

    /// True while the cursor has not consumed the whole buffer.
    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// 1-based line number of the current position.
    pub fn current_line(&self) -> u32 {
        self.cur_line + 1
    }

    /// Unconsumed tail of the buffer.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
        // recount lines from the start, seeks are rare
        self.cur_line = self.start_line
            + self.data[..self.pos].iter().filter(|&&b| b == NL).count() as u32;
    }

    pub fn save_position(&mut self) {
        self.saved_pos = self.pos;
        self.saved_line = self.cur_line;
    }

    pub fn restore_position(&mut self) {
        self.pos = self.saved_pos;
        self.cur_line = self.saved_line;
    }

    /// Moves one byte forward. The position one past the last byte is
    /// legal; moving beyond it is not.
    pub fn advance(&mut self) -> Result<(), EndOfData> {
        if self.pos + 1 > self.data.len() {
            return Err(self.end_of_data());
        }
        self.pos += 1;
        if self.pos > 0 && self.data[self.pos - 1] == NL {
            self.cur_line += 1;
        }
        Ok(())
    }

    /// Moves one byte backward.
    pub fn backspace(&mut self) -> Result<(), DecoderError> {
        if self.pos == 0 {
            return Err(DecoderError::Script(
                "attempt to read before start of data".to_string(),
            ));
        }
        self.pos -= 1;
        if self.pos < self.data.len() && self.data[self.pos] == NL {
            self.cur_line -= 1;
        }
        Ok(())
    }

    /// Skips `n` characters, backward when `n` is negative.
    pub fn skip_characters(&mut self, n: i32) -> Result<(), DecoderError> {
        if n >= 0 {
            for _ in 0..n {
                self.advance()?;
            }
        } else {
            for _ in 0..(-n) {
                self.backspace()?;
            }
        }
        Ok(())
    }

    /// Positions the cursor on the n'th character of the current line
    /// (1-based). A line shorter than `n` leaves the cursor at its
    /// end-of-line.
    pub fn position_on_line(&mut self, n: i32) -> Result<(), DecoderError> {
        // if sitting on the EOL itself, back onto the line
        if self.current_byte().map(|b| b == NL).unwrap_or(false) {
            self.backspace()?;
        }
        let mut c = b' ';
        while self.pos > 0 {
            c = self.current_byte()?;
            if c == NL {
                break;
            }
            self.backspace()?;
        }
        if c == NL {
            self.advance()?;
        }
        let mut n = n;
        while n > 1 {
            if self.current_byte()? == NL {
                break;
            }
            self.advance()?;
            n -= 1;
        }
        Ok(())
    }

    /// Skips `n` lines of data, backward when `n` is negative. Forward
    /// skips land on the first character after the next end-of-line.
    pub fn skip_lines(&mut self, n: i32) -> Result<(), DecoderError> {
        if n >= 0 {
            let mut n = n;
            while self.has_more() && n > 0 {
                while self.has_more() && self.current_byte()? != NL {
                    self.advance()?;
                }
                if self.has_more() {
                    self.advance()?;
                }
                n -= 1;
            }
        } else {
            let mut n = -n;
            while self.pos > 0 && n > 0 {
                // back to the EOL of the previous line, then to its start
                while self.pos > 0 && self.peek() != Some(NL) {
                    self.backspace()?;
                }
                self.backspace()?;
                let mut c = b' ';
                while self.pos > 0 {
                    c = self.peek().unwrap_or(b' ');
                    if c == NL {
                        break;
                    }
                    self.backspace()?;
                }
                if c == NL {
                    self.advance()?;
                }
                n -= 1;
            }
        }
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    // ------------------------------------------------------------------
    // check primitives: position is left unchanged
    // ------------------------------------------------------------------

    pub fn check_char(&self, c: u8) -> Result<bool, EndOfData> {
        Ok(self.current_byte()? == c)
    }

    pub fn check_sign(&self) -> Result<bool, EndOfData> {
        let b = self.current_byte()?;
        Ok(b == b'+' || b == b'-')
    }

    /// True when the buffer matches `s` at the current position.
    pub fn check_literal(&self, s: &[u8], ignore_case: bool) -> Result<bool, EndOfData> {
        self.current_byte()?;
        let end = self.pos + s.len();
        if end > self.data.len() {
            return Ok(false);
        }
        let window = &self.data[self.pos..end];
        if ignore_case {
            Ok(window.eq_ignore_ascii_case(s))
        } else {
            Ok(window == s)
        }
    }

    /// True when the next `n` characters are digits (signs and a decimal
    /// point count as part of a number).
    pub fn check_digits(&self, n: u32) -> Result<bool, EndOfData> {
        self.current_byte()?;
        let mut i = 0;
        let mut pos = self.pos;
        while i < n && pos < self.data.len() {
            let c = self.data[pos];
            if !(c.is_ascii_digit() || c == b'.' || c == b'+' || c == b'-') {
                break;
            }
            pos += 1;
            i += 1;
        }
        Ok(i == n)
    }

    /// True when the next `n` characters fall in the pseudo-binary range.
    /// The `/` missing indicator counts as pseudo-binary.
    pub fn check_pseudo_binary(&self, n: u32) -> Result<bool, EndOfData> {
        self.current_byte()?;
        let mut i = 0;
        let mut pos = self.pos;
        while i < n && pos < self.data.len() {
            if !is_pseudo_binary(self.data[pos]) {
                break;
            }
            pos += 1;
            i += 1;
        }
        Ok(i == n)
    }

    // ------------------------------------------------------------------
    // scan primitives: bounded forward search.
    // n == 0 tests the current position without moving.
    // ------------------------------------------------------------------

    fn scan<F: Fn(&mut Self) -> bool>(&mut self, n: i32, hit: F) -> Result<bool, EndOfData> {
        self.current_byte()?;
        if n < 0 {
            return Ok(false);
        }
        if n == 0 {
            return Ok(hit(self));
        }
        let mut n = n;
        while self.has_more() && n > 0 {
            if !self.scan_past_eol && self.data[self.pos] == NL {
                break;
            }
            if hit(self) {
                return Ok(true);
            }
            if self.advance().is_err() {
                return Ok(false);
            }
            n -= 1;
        }
        Ok(false)
    }

    pub fn scan_char(&mut self, n: i32, c: u8) -> Result<bool, EndOfData> {
        self.scan(n, |s| s.current_byte().map(|b| b == c).unwrap_or(false))
    }

    pub fn scan_sign(&mut self, n: i32) -> Result<bool, EndOfData> {
        self.scan(n, |s| s.check_sign().unwrap_or(false))
    }

    pub fn scan_digit(&mut self, n: i32) -> Result<bool, EndOfData> {
        self.scan(n, |s| {
            s.check_digits(1).unwrap_or(false) || s.check_sign().unwrap_or(false)
        })
    }

    pub fn scan_letter(&mut self, n: i32) -> Result<bool, EndOfData> {
        self.scan(n, |s| {
            s.current_byte()
                .map(|b| b.is_ascii_alphabetic())
                .unwrap_or(false)
        })
    }

    pub fn scan_pseudo_binary(&mut self, n: i32) -> Result<bool, EndOfData> {
        self.scan(n, |s| s.check_pseudo_binary(1).unwrap_or(false))
    }

    pub fn scan_literal(
        &mut self,
        n: i32,
        lit: &[u8],
        ignore_case: bool,
    ) -> Result<bool, EndOfData> {
        self.current_byte()?;
        if n < 0 {
            return Ok(false);
        }
        if n == 0 {
            return self.check_literal(lit, ignore_case);
        }
        let mut n = n;
        while self.has_more() && n > 0 {
            if !self.scan_past_eol && self.data[self.pos] == NL {
                break;
            }
            if self.check_literal(lit, ignore_case)? {
                return Ok(true);
            }
            if self.advance().is_err() {
                return Ok(false);
            }
            n -= 1;
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // field extraction
    // ------------------------------------------------------------------

    /// Extracts a field of up to `length` bytes starting at the cursor.
    ///
    /// The field ends early at CR/LF or at any byte of `delimiters`
    /// (binary fields honor neither). An empty field is only legal when
    /// `is_string` is set. The `!` pseudo-delimiter additionally ends the
    /// field at the first non-numeric character.
    pub fn get_field(
        &mut self,
        length: usize,
        delimiters: Option<&str>,
        is_binary: bool,
        is_string: bool,
    ) -> Result<Vec<u8>, EndOfData> {
        self.current_byte()?;
        let mut field = Vec::with_capacity(length);
        for i in 0..length {
            if !self.has_more() {
                break;
            }
            let c = self.data[self.pos];
            if !is_binary {
                let delim_hit = (is_string || i > 0)
                    && delimiters.map(|d| d.as_bytes().contains(&c)).unwrap_or(false);
                if c == CR || c == NL || delim_hit {
                    break;
                }
                if i > 0
                    && delimiters.map(|d| d.contains('!')).unwrap_or(false)
                    && !is_number_char(c)
                {
                    break;
                }
            }
            field.push(c);
            if self.advance().is_err() {
                break;
            }
        }
        Ok(field)
    }

    /// Skips to the first non-whitespace character or end of message.
    pub fn skip_whitespace(&mut self) {
        while self.pos < self.data.len() {
            match self.data[self.pos] {
                b' ' | b'\t' | CR | NL | 0xAE => {
                    let _ = self.advance();
                }
                _ => break,
            }
        }
    }
}

fn is_number_char(c: u8) -> bool {
    c.is_ascii_digit() || matches!(c, b'.' | b'+' | b'-' | b'e' | b'E')
}

/// Printable pseudo-binary range, plus the `/` missing indicator.
pub fn is_pseudo_binary(b: u8) -> bool {
    b == b'/' || (0x3F..=0x7F).contains(&b)
}
