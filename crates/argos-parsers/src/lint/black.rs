//! Formatter-style (black-like) check output: each `would reformat FILE`
//! line is one WARNING with code BLACK001 at line 1. Stderr noise is
//! ignored.

use argos_core::errors::ParseError;
use argos_core::types::entity::Severity;

use super::{normalize_path, LintViolationData};

const PREFIX: &str = "would reformat ";

pub(super) fn parse(input: &str) -> Result<Vec<LintViolationData>, ParseError> {
    let mut violations = Vec::new();
    for line in input.lines() {
        let Some(file) = line.trim().strip_prefix(PREFIX) else {
            continue;
        };
        violations.push(LintViolationData {
            file_path: normalize_path(file.trim()),
            line: 1,
            column: None,
            severity: Severity::Warning,
            code: "BLACK001".to_string(),
            message: "file would be reformatted".to_string(),
        });
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_reformat_lines() {
        let input = "would reformat src/a.py\nAll done!\n1 file would be reformatted.\n";
        let violations = parse(input).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file_path, "src/a.py");
        assert_eq!(violations[0].code, "BLACK001");
        assert_eq!(violations[0].line, 1);
        assert_eq!(violations[0].severity, Severity::Warning);
    }

    #[test]
    fn clean_output_has_no_violations() {
        let violations = parse("All done! \u{2728} 3 files left unchanged.\n").unwrap();
        assert!(violations.is_empty());
    }
}
