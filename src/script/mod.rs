//! Decoding scripts: named sequences of format statements.
//!
//! A script is compiled once, is immutable afterwards and can be shared
//! across threads; everything mutable during a decode lives in the
//! per-message state. Statements execute in declaration order with
//! fallthrough, and the Check/Scan/Goto operators jump between them by
//! label.

pub mod field_op;
pub mod op;
mod tokenizer;

pub use field_op::{FieldKind, FieldOp};
pub use op::{CheckTarget, FunctionOp, OpOutcome, Operation, ScanTarget, Span, TruncateBoundary};

use itertools::Itertools;

use crate::errors::ScriptFormatError;
use crate::function::{FunctionRegistry, ScriptContext};
use crate::platform::DataOrder;
use crate::settings::DecoderSettings;

/// One named, ordered sequence of operations.
#[derive(Debug)]
pub struct FormatStatement {
    pub label: String,
    /// Original statement text, kept for diagnostics
    pub source: String,
    pub ops: Vec<Operation>,
}

/// A compiled decoding script.
#[derive(Debug)]
pub struct Script {
    pub name: String,
    /// Chronological order of the data this script decodes
    pub data_order: DataOrder,
    statements: Vec<FormatStatement>,
    missing_symbol: Option<String>,
}

impl Script {
    /// Compiles the labeled statements in declaration order. Fails on the
    /// first malformed statement or on a Check/Scan/Goto label that does
    /// not resolve.
    pub fn compile(
        name: &str,
        statements: &[(&str, &str)],
        data_order: DataOrder,
        registry: &FunctionRegistry,
        settings: &DecoderSettings,
    ) -> Result<Self, ScriptFormatError> {
        if let Some(dup) = statements
            .iter()
            .map(|(label, _)| label.to_ascii_lowercase())
            .duplicates()
            .next()
        {
            return Err(ScriptFormatError::new(format!(
                "duplicate format label '{}'",
                dup
            )));
        }

        let ctx = ScriptContext {
            data_order,
            missing_symbol: None,
            settings,
        };
        let mut compiled = Vec::with_capacity(statements.len());
        for (label, text) in statements {
            let ops = tokenizer::tokenize_statement(text, registry, &ctx)?;
            compiled.push(FormatStatement {
                label: label.to_string(),
                source: text.to_string(),
                ops,
            });
        }

        let script = Self {
            name: name.to_string(),
            data_order,
            statements: compiled,
            missing_symbol: None,
        };

        // every switch target must exist at load time
        for st in &script.statements {
            script.validate_labels(&st.ops, st, settings)?;
        }
        Ok(script)
    }

    fn validate_labels(
        &self,
        ops: &[Operation],
        st: &FormatStatement,
        settings: &DecoderSettings,
    ) -> Result<(), ScriptFormatError> {
        for op in ops {
            let (label, span) = match op {
                Operation::Check { label, span, .. }
                | Operation::Scan { label, span, .. }
                | Operation::GotoLabel { label, span } => (label, *span),
                Operation::Group { ops, .. } => {
                    self.validate_labels(ops, st, settings)?;
                    continue;
                }
                _ => continue,
            };
            if self.statement_index(label, settings).is_none() {
                return Err(ScriptFormatError {
                    message: format!("no format statement with label '{}'", label),
                    statement: st.source.clone(),
                    last_operator: label.clone(),
                    char_index: span.start,
                });
            }
        }
        Ok(())
    }

    /// Script-level missing-value symbol, checked in addition to the
    /// universal markers.
    pub fn with_missing_symbol<S: Into<String>>(mut self, symbol: S) -> Self {
        self.missing_symbol = Some(symbol.into());
        self
    }

    pub fn is_missing_symbol(&self, s: &str) -> bool {
        self.missing_symbol
            .as_deref()
            .map(|m| m.eq_ignore_ascii_case(s))
            .unwrap_or(false)
    }

    pub fn statements(&self) -> &[FormatStatement] {
        &self.statements
    }

    pub fn statement(&self, idx: usize) -> Option<&FormatStatement> {
        self.statements.get(idx)
    }

    /// Position of the statement with the given label, honoring the
    /// configured label case mode.
    pub fn statement_index(&self, label: &str, settings: &DecoderSettings) -> Option<usize> {
        self.statements
            .iter()
            .position(|s| settings.labels_match(&s.label, label))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::LabelMode;

    fn compile(statements: &[(&str, &str)]) -> Result<Script, ScriptFormatError> {
        Script::compile(
            "test",
            statements,
            DataOrder::Undefined,
            &FunctionRegistry::default(),
            &DecoderSettings::default(),
        )
    }

    #[test]
    fn labels_resolve_in_order() {
        let s = compile(&[("first", "2x"), ("second", "3x")]).unwrap();
        let settings = DecoderSettings::default();
        assert_eq!(s.statement_index("first", &settings), Some(0));
        assert_eq!(s.statement_index("SECOND", &settings), Some(1));
        assert_eq!(s.statement_index("nope", &settings), None);
    }

    #[test]
    fn case_sensitive_labels() {
        let s = compile(&[("Fmt", "2x")]).unwrap();
        let mut settings = DecoderSettings::default();
        settings.label_mode = LabelMode::CaseSensitive;
        assert_eq!(s.statement_index("fmt", &settings), None);
        assert_eq!(s.statement_index("Fmt", &settings), Some(0));
    }

    #[test]
    fn unresolved_switch_target_fails_compile() {
        let e = compile(&[("only", "c('X',nowhere)")]).unwrap_err();
        assert!(e.message.contains("nowhere"));
        assert_eq!(e.statement, "c('X',nowhere)");
    }

    #[test]
    fn unresolved_target_inside_group_fails_compile() {
        assert!(compile(&[("only", "3(2x >gone)")]).is_err());
        assert!(compile(&[("a", "3(2x >b)"), ("b", "1x")]).is_ok());
    }

    #[test]
    fn duplicate_labels_fail_compile() {
        let e = compile(&[("fmt", "1x"), ("FMT", "2x")]).unwrap_err();
        assert!(e.message.contains("duplicate"));
    }

    #[test]
    fn missing_symbol_lookup() {
        let s = compile(&[("a", "1x")]).unwrap().with_missing_symbol("NaN");
        assert!(s.is_missing_symbol("nan"));
        assert!(!s.is_missing_symbol("42"));
    }
}
