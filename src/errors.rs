//! Decoder error taxonomy.
//!
//! Script faults are split from data faults on purpose. A malformed script
//! ([`ScriptFormatError`]) is fatal at load time and never per message. A
//! malformed field ([`FieldParseError`]) must be caught at the point of use
//! and turned into a flagged sample, so one bad field never aborts the rest
//! of the message. Buffer exhaustion ([`EndOfData`]) escaping an operation
//! ends the decode pass normally.

use thiserror::Error;

/// Malformed format statement, detected while tokenizing or while a
/// decoding function parses its arguments. Fatal to script load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (statement \"{statement}\", last operator '{last_operator}', column {char_index})")]
pub struct ScriptFormatError {
    /// What went wrong
    pub message: String,
    /// Full text of the offending statement
    pub statement: String,
    /// Last operator token processed before the fault
    pub last_operator: String,
    /// 0-based character offset into the statement text
    pub char_index: usize,
}

impl ScriptFormatError {
    /// Builds an error with no statement context yet. The tokenizer fills
    /// in the statement text and offsets before letting it escape.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            statement: String::new(),
            last_operator: String::new(),
            char_index: 0,
        }
    }
}

/// One raw data field could not be converted to a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FieldParseError {
    pub message: String,
}

impl FieldParseError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Cursor moved past the end of the message buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("attempt to read past end of data (position {position}, length {length})")]
pub struct EndOfData {
    pub position: usize,
    pub length: usize,
}

/// The statement-switch trampoline detected a cycle, either by revisiting a
/// statement at an unchanged cursor position or by exceeding the switch
/// bound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("endless loop detected at format label '{label}', position {position}")]
pub struct EndlessLoop {
    pub label: String,
    pub position: usize,
}

/// Any fault that aborts decoding of the current message.
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error(transparent)]
    ScriptFormat(#[from] ScriptFormatError),
    #[error(transparent)]
    FieldParse(#[from] FieldParseError),
    #[error(transparent)]
    EndOfData(#[from] EndOfData),
    #[error(transparent)]
    EndlessLoop(#[from] EndlessLoop),
    /// Runtime script fault, like backing the cursor up past the start of
    /// the buffer or switching to a label that no longer resolves.
    #[error("script fault: {0}")]
    Script(String),
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn script_format_error_formatting() {
        let e = ScriptFormatError {
            message: "mismatched parenthesis".to_string(),
            statement: "2f(3".to_string(),
            last_operator: "f".to_string(),
            char_index: 2,
        };
        let s = e.to_string();
        assert!(s.contains("mismatched parenthesis"));
        assert!(s.contains("2f(3"));
        assert!(s.contains("column 2"));
    }
}
