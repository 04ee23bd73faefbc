//! Cobertura-like coverage XML parser.
//!
//! File-level rows are the source of truth: per-file totals come from the
//! `<line>` elements and the overall percentage is recomputed from those,
//! ignoring any aggregate attributes in the XML.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use argos_core::errors::ParseError;

/// Coverage for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub file_path: String,
    pub total_statements: u64,
    pub covered_statements: u64,
    /// `covered / total * 100` rounded to two decimals; 0 when empty.
    pub coverage_percentage: f64,
    pub missing_lines: Vec<u32>,
}

/// Parsed coverage report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageData {
    pub total_coverage: f64,
    pub files_analyzed: u64,
    pub total_statements: u64,
    pub covered_statements: u64,
    pub per_file: Vec<FileCoverage>,
}

/// One file's coverage drop relative to a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRegression {
    pub file_path: String,
    pub baseline: f64,
    pub current: f64,
    pub drop: f64,
}

/// Per-file delta between two reports (positive delta = improvement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageDelta {
    pub file_path: String,
    pub baseline: Option<f64>,
    pub current: Option<f64>,
    pub delta: f64,
}

/// Round to two decimals, away-from-zero ties like the reporting tools do.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Percentage helper honoring the zero-statement edge case.
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(covered as f64 / total as f64 * 100.0)
    }
}

struct FileAccumulator {
    file_path: String,
    total: u64,
    covered: u64,
    missing: Vec<u32>,
}

/// Parse a Cobertura-like XML document.
pub fn parse(input: &str) -> Result<CoverageData, ParseError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut per_file: Vec<FileCoverage> = Vec::new();
    let mut current: Option<FileAccumulator> = None;
    let mut saw_coverage_root = false;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| ParseError::Syntax {
            line: 0,
            message: format!("XML error at offset {}: {e}", reader.buffer_position()),
        })?;
        match event {
            Event::Start(e) | Event::Empty(e) => {
                match e.name().as_ref() {
                    b"coverage" => saw_coverage_root = true,
                    b"class" => {
                        // A new class flushes nothing by itself; classes can
                        // repeat per file, so accumulate by filename.
                        let mut filename = None;
                        for attr in e.attributes() {
                            let attr = attr.map_err(|err| ParseError::Syntax {
                                line: 0,
                                message: format!("bad attribute: {err}"),
                            })?;
                            if attr.key.as_ref() == b"filename" {
                                filename =
                                    Some(String::from_utf8_lossy(&attr.value).into_owned());
                            }
                        }
                        if let Some(filename) = filename {
                            let normalized = filename.replace('\\', "/");
                            let switch = match &current {
                                Some(acc) => acc.file_path != normalized,
                                None => true,
                            };
                            if switch {
                                if let Some(done) = current.take() {
                                    per_file.push(finish_file(done));
                                }
                                current = Some(FileAccumulator {
                                    file_path: normalized,
                                    total: 0,
                                    covered: 0,
                                    missing: Vec::new(),
                                });
                            }
                        }
                    }
                    b"line" => {
                        if let Some(acc) = current.as_mut() {
                            let mut number: Option<u32> = None;
                            let mut hits: Option<u64> = None;
                            for attr in e.attributes() {
                                let attr = attr.map_err(|err| ParseError::Syntax {
                                    line: 0,
                                    message: format!("bad attribute: {err}"),
                                })?;
                                match attr.key.as_ref() {
                                    b"number" => {
                                        number = String::from_utf8_lossy(&attr.value)
                                            .parse()
                                            .ok();
                                    }
                                    b"hits" => {
                                        hits = String::from_utf8_lossy(&attr.value).parse().ok();
                                    }
                                    _ => {}
                                }
                            }
                            if let (Some(number), Some(hits)) = (number, hits) {
                                acc.total += 1;
                                if hits > 0 {
                                    acc.covered += 1;
                                } else {
                                    acc.missing.push(number);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(done) = current.take() {
        per_file.push(finish_file(done));
    }

    if !saw_coverage_root {
        return Err(ParseError::UnknownFormat {
            message: "no <coverage> root element".to_string(),
        });
    }

    per_file.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    let total_statements: u64 = per_file.iter().map(|f| f.total_statements).sum();
    let covered_statements: u64 = per_file.iter().map(|f| f.covered_statements).sum();

    Ok(CoverageData {
        total_coverage: percentage(covered_statements, total_statements),
        files_analyzed: per_file.len() as u64,
        total_statements,
        covered_statements,
        per_file,
    })
}

fn finish_file(acc: FileAccumulator) -> FileCoverage {
    let mut missing = acc.missing;
    missing.sort_unstable();
    missing.dedup();
    FileCoverage {
        coverage_percentage: percentage(acc.covered, acc.total),
        file_path: acc.file_path,
        total_statements: acc.total,
        covered_statements: acc.covered,
        missing_lines: missing,
    }
}

/// Per-file delta of `current` against `baseline`, ordered by path.
/// Files present on only one side report the other as `None`.
pub fn diff(current: &CoverageData, baseline: &CoverageData) -> Vec<CoverageDelta> {
    let mut paths: Vec<&str> = current
        .per_file
        .iter()
        .map(|f| f.file_path.as_str())
        .chain(baseline.per_file.iter().map(|f| f.file_path.as_str()))
        .collect();
    paths.sort_unstable();
    paths.dedup();

    let lookup = |data: &CoverageData, path: &str| -> Option<f64> {
        data.per_file
            .iter()
            .find(|f| f.file_path == path)
            .map(|f| f.coverage_percentage)
    };

    paths
        .into_iter()
        .map(|path| {
            let cur = lookup(current, path);
            let base = lookup(baseline, path);
            CoverageDelta {
                file_path: path.to_string(),
                delta: round2(cur.unwrap_or(0.0) - base.unwrap_or(0.0)),
                baseline: base,
                current: cur,
            }
        })
        .collect()
}

/// Files whose coverage dropped by at least `threshold_percent` relative
/// to the baseline, worst drop first.
pub fn regressions(
    current: &CoverageData,
    baseline: &CoverageData,
    threshold_percent: f64,
) -> Vec<CoverageRegression> {
    let mut out: Vec<CoverageRegression> = diff(current, baseline)
        .into_iter()
        .filter_map(|d| match (d.baseline, d.current) {
            (Some(base), Some(cur)) if base - cur >= threshold_percent => {
                Some(CoverageRegression {
                    file_path: d.file_path,
                    baseline: base,
                    current: cur,
                    drop: round2(base - cur),
                })
            }
            _ => None,
        })
        .collect();
    out.sort_by(|a, b| {
        b.drop
            .partial_cmp(&a.drop)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<coverage version="7.3">
  <packages>
    <package name="src">
      <classes>
        <class name="x.py" filename="src/x.py">
          <methods/>
          <lines>
            <line number="1" hits="1"/>
            <line number="2" hits="1"/>
            <line number="3" hits="0"/>
            <line number="4" hits="2"/>
          </lines>
        </class>
        <class name="y.py" filename="src/y.py">
          <lines>
            <line number="1" hits="1"/>
            <line number="2" hits="1"/>
          </lines>
        </class>
      </classes>
    </package>
  </packages>
</coverage>"#;

    #[test]
    fn parses_per_file_rows() {
        let data = parse(SAMPLE).unwrap();
        assert_eq!(data.files_analyzed, 2);
        assert_eq!(data.total_statements, 6);
        assert_eq!(data.covered_statements, 5);
        let x = &data.per_file[0];
        assert_eq!(x.file_path, "src/x.py");
        assert_eq!(x.total_statements, 4);
        assert_eq!(x.covered_statements, 3);
        assert_eq!(x.missing_lines, vec![3]);
        assert!((x.coverage_percentage - 75.0).abs() < 1e-9);
    }

    #[test]
    fn total_is_recomputed_from_files() {
        let data = parse(SAMPLE).unwrap();
        let expected = round2(5.0 / 6.0 * 100.0);
        assert!((data.total_coverage - expected).abs() < 0.005);
    }

    #[test]
    fn zero_statements_is_zero_percent() {
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn missing_root_is_unknown_format() {
        let err = parse("<report></report>").unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat { .. }));
    }

    #[test]
    fn regression_detects_drop() {
        let baseline = parse(SAMPLE).unwrap();
        let mut current = baseline.clone();
        current.per_file[0].covered_statements = 2;
        current.per_file[0].coverage_percentage = 50.0;
        let regs = regressions(&current, &baseline, 1.0);
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].file_path, "src/x.py");
        assert!((regs[0].drop - 25.0).abs() < 1e-9);
    }

    #[test]
    fn diff_reports_new_files() {
        let baseline = CoverageData::default();
        let current = parse(SAMPLE).unwrap();
        let deltas = diff(&current, &baseline);
        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| d.baseline.is_none()));
    }
}
