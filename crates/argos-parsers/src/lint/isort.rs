//! Import-sorter (isort-like) check output: `ERROR: FILE ...` lines yield
//! one WARNING with code ISORT001.

use argos_core::errors::ParseError;
use argos_core::types::entity::Severity;

use super::{normalize_path, LintViolationData};

const PREFIX: &str = "ERROR: ";

pub(super) fn parse(input: &str) -> Result<Vec<LintViolationData>, ParseError> {
    let mut violations = Vec::new();
    for line in input.lines() {
        let Some(rest) = line.trim().strip_prefix(PREFIX) else {
            continue;
        };
        // The file path runs until the first space; the remainder is the
        // tool's explanation.
        let (file, message) = match rest.split_once(' ') {
            Some((file, message)) => (file, message.trim()),
            None => (rest, "imports are incorrectly sorted"),
        };
        violations.push(LintViolationData {
            file_path: normalize_path(file),
            line: 1,
            column: None,
            severity: Severity::Warning,
            code: "ISORT001".to_string(),
            message: message.to_string(),
        });
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_error_lines() {
        let input = "ERROR: src/a.py Imports are incorrectly sorted and/or formatted.\nSkipped 2 files\n";
        let violations = parse(input).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file_path, "src/a.py");
        assert_eq!(violations[0].code, "ISORT001");
        assert_eq!(violations[0].severity, Severity::Warning);
    }

    #[test]
    fn clean_output_has_no_violations() {
        assert!(parse("Skipped 4 files\n").unwrap().is_empty());
    }
}
