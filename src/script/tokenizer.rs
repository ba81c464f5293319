//! Format statement tokenizer.
//!
//! A statement is a sequence of operator tokens: an optional signed
//! repetition count followed by the operator. Single letters ahead of a
//! parenthesis are built-ins first, decoding-function names second.
//! Parenthesized arguments may nest and may quote, so the scanner pairs
//! parens with quote awareness and fails loudly on a mismatch.

use crate::errors::ScriptFormatError;
use crate::field::FieldType;
use crate::function::{FunctionRegistry, ScriptContext};
use crate::script::field_op::FieldOp;
use crate::script::op::{
    CheckTarget, FunctionOp, Operation, ScanTarget, Span, TruncateBoundary,
};

/// Tokenizes one statement into its operation list.
pub(crate) fn tokenize_statement(
    text: &str,
    registry: &FunctionRegistry,
    ctx: &ScriptContext,
) -> Result<Vec<Operation>, ScriptFormatError> {
    let mut t = Tokenizer {
        text: text.as_bytes(),
        pos: 0,
        last_operator: String::new(),
    };
    t.parse_ops(text.len(), registry, ctx).map_err(|mut e| {
        if e.statement.is_empty() {
            e.statement = text.to_string();
        }
        if e.last_operator.is_empty() {
            e.last_operator = t.last_operator.clone();
        }
        if e.char_index == 0 {
            e.char_index = t.pos.min(text.len());
        }
        e
    })
}

struct Tokenizer<'a> {
    text: &'a [u8],
    pos: usize,
    last_operator: String,
}

impl<'a> Tokenizer<'a> {
    fn parse_ops(
        &mut self,
        end: usize,
        registry: &FunctionRegistry,
        ctx: &ScriptContext,
    ) -> Result<Vec<Operation>, ScriptFormatError> {
        let mut ops = Vec::new();

        loop {
            while self.pos < end
                && (self.text[self.pos].is_ascii_whitespace() || self.text[self.pos] == b',')
            {
                self.pos += 1;
            }
            if self.pos >= end {
                break;
            }
            let token_start = self.pos;

            if self.text[self.pos] == b'#' {
                // rest-of-statement comment
                self.pos = end;
                break;
            }

            // optional signed repetition count
            let mut negate = false;
            if self.text[self.pos] == b'-' {
                negate = true;
                self.pos += 1;
            }
            let mut reps: i32 = 1;
            let digits_start = self.pos;
            while self.pos < end && self.text[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            if self.pos > digits_start {
                reps = std::str::from_utf8(&self.text[digits_start..self.pos])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| ScriptFormatError::new("bad repetition count"))?;
            }
            if negate {
                reps = -reps;
            }
            if self.pos >= end {
                return Err(self.err("operator expected after repetition count", token_start));
            }

            let c = self.text[self.pos];
            let op = match c {
                b'(' => {
                    self.last_operator = "(".to_string();
                    let close = self.find_closing_paren(self.pos, end, token_start)?;
                    self.pos += 1;
                    let inner = self.parse_ops(close, registry, ctx)?;
                    self.pos = close + 1;
                    Operation::Group {
                        reps,
                        ops: inner,
                        span: self.span(token_start),
                    }
                }
                b'x' | b'X' if !self.letter_ahead() => {
                    self.last_operator = "x".to_string();
                    self.pos += 1;
                    Operation::SkipCharacters {
                        reps,
                        span: self.span(token_start),
                    }
                }
                b'p' | b'P' if !self.letter_ahead() => {
                    self.last_operator = "p".to_string();
                    self.pos += 1;
                    Operation::Position {
                        reps,
                        span: self.span(token_start),
                    }
                }
                b'/' => {
                    self.last_operator = "/".to_string();
                    self.pos += 1;
                    Operation::SkipLines {
                        reps,
                        span: self.span(token_start),
                    }
                }
                b'\\' => {
                    self.last_operator = "\\".to_string();
                    self.pos += 1;
                    Operation::SkipLines {
                        reps: -reps,
                        span: self.span(token_start),
                    }
                }
                b'>' => {
                    self.last_operator = ">".to_string();
                    self.pos += 1;
                    let label = self.parse_label(end, token_start)?;
                    Operation::GotoLabel {
                        label,
                        span: self.span(token_start),
                    }
                }
                c if c.is_ascii_alphabetic() => {
                    self.parse_named(reps, end, token_start, registry, ctx)?
                }
                _ => {
                    return Err(self.err(
                        format!("unrecognized character '{}'", c as char),
                        token_start,
                    ))
                }
            };
            ops.push(op);
        }
        Ok(ops)
    }

    /// An operator spelled with letters: a built-in when a single known
    /// letter, otherwise a decoding-function name.
    fn parse_named(
        &mut self,
        reps: i32,
        end: usize,
        token_start: usize,
        registry: &FunctionRegistry,
        ctx: &ScriptContext,
    ) -> Result<Operation, ScriptFormatError> {
        let name_start = self.pos;
        while self.pos < end
            && (self.text[self.pos].is_ascii_alphanumeric() || self.text[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.text[name_start..self.pos])
            .unwrap_or("")
            .to_string();
        self.last_operator = name.clone();

        if self.pos >= end || self.text[self.pos] != b'(' {
            // `w` tolerates the bare form
            if name.eq_ignore_ascii_case("w") {
                return Ok(Operation::WhitespaceSkip {
                    span: self.span(token_start),
                });
            }
            return Err(self.err(
                format!("expected '(' after operator '{}'", name),
                token_start,
            ));
        }
        let close = self.find_closing_paren(self.pos, end, token_start)?;
        let args = std::str::from_utf8(&self.text[self.pos + 1..close])
            .map_err(|_| self.err("non-ascii bytes in arguments", token_start))?
            .to_string();
        self.pos = close + 1;
        let span = self.span(token_start);

        if name.len() == 1 {
            match name.as_bytes()[0].to_ascii_lowercase() {
                b'c' => return self.parse_check(&args, span, token_start),
                b's' => return self.parse_scan(&args, span, token_start),
                b'f' => return Ok(Operation::Field(FieldOp::from_args(reps, &args, span)?)),
                b't' => return self.parse_truncate(&args, span, token_start),
                b'w' => return Ok(Operation::WhitespaceSkip { span }),
                _ => {}
            }
        }

        match registry.lookup(&name) {
            Some(mut func) => {
                func.set_arguments(&args, ctx)?;
                Ok(Operation::Function(FunctionOp {
                    name: name.to_ascii_lowercase(),
                    prototype: func,
                    span,
                }))
            }
            None => Err(self.err(
                format!("unknown operator or decoding function '{}'", name),
                token_start,
            )),
        }
    }

    /// `c(target, label)`: a sign, N digits, or a quoted literal.
    fn parse_check(
        &self,
        args: &str,
        span: Span,
        token_start: usize,
    ) -> Result<Operation, ScriptFormatError> {
        let toks = split_args(args);
        if toks.len() != 2 {
            return Err(self.err("check operation needs a target and a label", token_start));
        }
        let (t, quoted) = &toks[0];
        let target = if *quoted {
            CheckTarget::Literal(t.clone())
        } else if t.eq_ignore_ascii_case("s") {
            CheckTarget::Sign
        } else {
            let digits = t
                .strip_suffix('n')
                .or_else(|| t.strip_suffix('N'))
                .unwrap_or(t)
                .parse::<u32>()
                .map_err(|_| self.err(format!("bad check target '{}'", t), token_start))?;
            CheckTarget::Digits(digits)
        };
        Ok(Operation::Check {
            target,
            label: toks[1].0.clone(),
            span,
        })
    }

    /// `s(count, target, label)`: bounded scan for a sign, digit, letter,
    /// pseudo-binary character or literal.
    fn parse_scan(
        &self,
        args: &str,
        span: Span,
        token_start: usize,
    ) -> Result<Operation, ScriptFormatError> {
        let toks = split_args(args);
        if toks.len() != 3 {
            return Err(self.err(
                "scan operation needs a count, a target and a label",
                token_start,
            ));
        }
        let count = toks[0]
            .0
            .parse::<u32>()
            .map_err(|_| self.err(format!("bad scan count '{}'", toks[0].0), token_start))?;
        let (t, quoted) = &toks[1];
        let target = if *quoted {
            ScanTarget::Literal(t.clone())
        } else {
            match t.to_ascii_lowercase().as_str() {
                "s" => ScanTarget::Sign,
                "n" => ScanTarget::Digit,
                "a" => ScanTarget::Letter,
                "p" => ScanTarget::PseudoBinary,
                _ => {
                    return Err(self.err(format!("bad scan target '{}'", t), token_start));
                }
            }
        };
        Ok(Operation::Scan {
            count,
            target,
            label: toks[2].0.clone(),
            span,
        })
    }

    /// `t(m)`, `t(h)`, `t(s)` or `t(Nm)`.
    fn parse_truncate(
        &self,
        args: &str,
        span: Span,
        token_start: usize,
    ) -> Result<Operation, ScriptFormatError> {
        let a = args.trim().to_ascii_lowercase();
        let boundary = if a == "m" || a == "s" {
            TruncateBoundary::Minute
        } else if a == "h" {
            TruncateBoundary::Hour
        } else if let Some(n) = a.strip_suffix('m') {
            let n = n
                .trim()
                .parse::<u32>()
                .map_err(|_| self.err(format!("bad truncation boundary '{}'", args), token_start))?;
            TruncateBoundary::Minutes(n)
        } else {
            return Err(self.err(format!("bad truncation boundary '{}'", args), token_start));
        };
        Ok(Operation::TimeTruncate { boundary, span })
    }

    /// Label after `>`: letters, digits, underscore and dash. Leading
    /// whitespace is trimmed, a space after the first character ends it.
    fn parse_label(&mut self, end: usize, token_start: usize) -> Result<String, ScriptFormatError> {
        while self.pos < end && self.text[self.pos] == b' ' {
            self.pos += 1;
        }
        let start = self.pos;
        while self.pos < end {
            let c = self.text[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err("empty label after '>'", token_start));
        }
        Ok(String::from_utf8_lossy(&self.text[start..self.pos]).into_owned())
    }

    /// True when the next byte starts a longer name (keeps `p` usable as
    /// an operator while `pluginname(...)` resolves as a function).
    fn letter_ahead(&self) -> bool {
        self.text
            .get(self.pos + 1)
            .map(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .unwrap_or(false)
    }

    /// Matching close paren with nesting, single and double quotes do not
    /// count toward the balance.
    fn find_closing_paren(
        &self,
        open: usize,
        end: usize,
        token_start: usize,
    ) -> Result<usize, ScriptFormatError> {
        let mut depth = 0;
        let mut in_single = false;
        let mut in_double = false;
        for i in open..end {
            let c = self.text[i];
            if in_single {
                if c == b'\'' {
                    in_single = false;
                }
            } else if in_double {
                if c == b'"' {
                    in_double = false;
                }
            } else {
                match c {
                    b'\'' => in_single = true,
                    b'"' => in_double = true,
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(i);
                        }
                    }
                    _ => {}
                }
            }
        }
        Err(self.err("mismatched parenthesis", token_start))
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start,
            end: self.pos,
        }
    }

    fn err<S: Into<String>>(&self, message: S, token_start: usize) -> ScriptFormatError {
        ScriptFormatError {
            message: message.into(),
            statement: String::from_utf8_lossy(self.text).into_owned(),
            last_operator: self.last_operator.clone(),
            char_index: token_start,
        }
    }
}

/// Splits an argument list on commas and spaces, respecting quotes.
/// Returns each token with a flag telling whether it was quoted.
fn split_args(s: &str) -> Vec<(String, bool)> {
    let mut toks = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut in_single = false;
    let mut in_double = false;
    for c in s.chars() {
        if in_single {
            if c == '\'' {
                in_single = false;
            } else {
                cur.push(c);
            }
        } else if in_double {
            if c == '"' {
                in_double = false;
            } else {
                cur.push(c);
            }
        } else if c == '\'' {
            in_single = true;
            quoted = true;
        } else if c == '"' {
            in_double = true;
            quoted = true;
        } else if c == ',' || c.is_whitespace() {
            if !cur.is_empty() || quoted {
                toks.push((std::mem::take(&mut cur), quoted));
                quoted = false;
            }
        } else {
            cur.push(c);
        }
    }
    if !cur.is_empty() || quoted {
        toks.push((cur, quoted));
    }
    toks
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::platform::DataOrder;
    use crate::settings::DecoderSettings;

    fn tokenize(text: &str) -> Result<Vec<Operation>, ScriptFormatError> {
        let settings = DecoderSettings::default();
        let ctx = ScriptContext {
            data_order: DataOrder::Undefined,
            missing_symbol: None,
            settings: &settings,
        };
        tokenize_statement(text, &FunctionRegistry::default(), &ctx)
    }

    #[test]
    fn group_with_field_and_check() {
        let ops = tokenize("3(2f(5) 1c('X' lbl))").unwrap();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Operation::Group { reps, ops, .. } => {
                assert_eq!(*reps, 3);
                assert_eq!(ops.len(), 2);
                match &ops[0] {
                    Operation::Field(f) => {
                        assert_eq!(f.reps, 2);
                        assert_eq!(f.width, 5);
                    }
                    other => panic!("expected field, got {:?}", other),
                }
                match &ops[1] {
                    Operation::Check { target, label, .. } => {
                        assert_eq!(*target, CheckTarget::Literal("X".to_string()));
                        assert_eq!(label, "lbl");
                    }
                    other => panic!("expected check, got {:?}", other),
                }
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_paren_fails() {
        let e = tokenize("2f(5) 1c('X' lbl) 3(").unwrap_err();
        assert!(e.message.contains("mismatched parenthesis"));
        assert_eq!(e.char_index, 18);
        let e = tokenize("f(s,a,3,1").unwrap_err();
        assert!(e.message.contains("mismatched parenthesis"));
    }

    #[test]
    fn quotes_hide_parens_from_balance() {
        let ops = tokenize("c(')' other)").unwrap();
        match &ops[0] {
            Operation::Check { target, .. } => {
                assert_eq!(*target, CheckTarget::Literal(")".to_string()));
            }
            other => panic!("expected check, got {:?}", other),
        }
    }

    #[test]
    fn skip_and_position_operators() {
        let ops = tokenize("5x -2x 3p 2/ \\").unwrap();
        assert_eq!(ops.len(), 5);
        assert!(matches!(ops[0], Operation::SkipCharacters { reps: 5, .. }));
        assert!(matches!(ops[1], Operation::SkipCharacters { reps: -2, .. }));
        assert!(matches!(ops[2], Operation::Position { reps: 3, .. }));
        assert!(matches!(ops[3], Operation::SkipLines { reps: 2, .. }));
        assert!(matches!(ops[4], Operation::SkipLines { reps: -1, .. }));
    }

    #[test]
    fn goto_and_comment() {
        let ops = tokenize(">next_fmt # everything after is comment >other").unwrap();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Operation::GotoLabel { label, .. } => assert_eq!(label, "next_fmt"),
            other => panic!("expected goto, got {:?}", other),
        }
    }

    #[test]
    fn label_ends_at_inner_space() {
        // leading whitespace trimmed, a space after the first characters
        // terminates the label
        let ops = tokenize("> lbl 2x").unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            Operation::GotoLabel { label, .. } => assert_eq!(label, "lbl"),
            other => panic!("expected goto, got {:?}", other),
        }
        assert!(matches!(ops[1], Operation::SkipCharacters { reps: 2, .. }));
    }

    #[test]
    fn check_digit_and_sign_targets() {
        let ops = tokenize("c(3n,numeric) c(S,signed)").unwrap();
        assert!(matches!(
            ops[0],
            Operation::Check {
                target: CheckTarget::Digits(3),
                ..
            }
        ));
        assert!(matches!(
            ops[1],
            Operation::Check {
                target: CheckTarget::Sign,
                ..
            }
        ));
    }

    #[test]
    fn scan_targets() {
        let ops = tokenize("s(10,'ID',found) s(5,A,alpha) s(8,P,pb) s(4,N,num)").unwrap();
        assert!(matches!(
            &ops[0],
            Operation::Scan {
                count: 10,
                target: ScanTarget::Literal(s),
                ..
            } if s == "ID"
        ));
        assert!(matches!(
            ops[1],
            Operation::Scan {
                target: ScanTarget::Letter,
                ..
            }
        ));
        assert!(matches!(
            ops[2],
            Operation::Scan {
                target: ScanTarget::PseudoBinary,
                ..
            }
        ));
        assert!(matches!(
            ops[3],
            Operation::Scan {
                target: ScanTarget::Digit,
                ..
            }
        ));
    }

    #[test]
    fn truncate_boundaries() {
        let ops = tokenize("t(m) t(h) t(30m)").unwrap();
        assert!(matches!(
            ops[0],
            Operation::TimeTruncate {
                boundary: TruncateBoundary::Minute,
                ..
            }
        ));
        assert!(matches!(
            ops[1],
            Operation::TimeTruncate {
                boundary: TruncateBoundary::Hour,
                ..
            }
        ));
        assert!(matches!(
            ops[2],
            Operation::TimeTruncate {
                boundary: TruncateBoundary::Minutes(30),
                ..
            }
        ));
    }

    #[test]
    fn function_lookup_by_name() {
        let ops = tokenize("csv(1,2,3)").unwrap();
        match &ops[0] {
            Operation::Function(f) => assert_eq!(f.name, "csv"),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn unknown_name_fails_with_context() {
        let e = tokenize("2x nosuchfunc(1,2)").unwrap_err();
        assert!(e.message.contains("nosuchfunc"));
        assert_eq!(e.last_operator, "nosuchfunc");
        assert_eq!(e.char_index, 3);
        assert_eq!(e.statement, "2x nosuchfunc(1,2)");
    }

    #[test]
    fn whitespace_skip_forms() {
        let ops = tokenize("w() w").unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], Operation::WhitespaceSkip { .. }));
        assert!(matches!(ops[1], Operation::WhitespaceSkip { .. }));
    }
}
