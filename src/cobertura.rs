//! Minimal reader for the Cobertura coverage interchange schema.
//!
//! Both collection flows normalize to Cobertura XML before the merge; this
//! module only verifies that a candidate file really is one and extracts the
//! headline rates for annotations. Full parsing belongs to the merge tool.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoberturaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("root element is `{found}`, expected `coverage`")]
    NotCobertura { found: String },
    #[error("document has no root element")]
    Empty,
}

/// Headline numbers from a Cobertura document's root element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageSummary {
    pub line_rate: f64,
    pub lines_covered: Option<u64>,
    pub lines_valid: Option<u64>,
}

/// Inspect `path` and return its summary if it is a Cobertura document.
pub fn inspect(path: &Path) -> Result<CoverageSummary, CoberturaError> {
    let text = std::fs::read_to_string(path).map_err(|source| CoberturaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    inspect_str(&text)
}

/// Schema check on the document text: the root element must be `coverage`.
pub fn inspect_str(text: &str) -> Result<CoverageSummary, CoberturaError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name != "coverage" {
                    return Err(CoberturaError::NotCobertura { found: name });
                }

                let mut summary = CoverageSummary {
                    line_rate: 0.0,
                    lines_covered: None,
                    lines_valid: None,
                };
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value()?;
                    match attr.key.as_ref() {
                        b"line-rate" => summary.line_rate = value.parse().unwrap_or(0.0),
                        b"lines-covered" => summary.lines_covered = value.parse().ok(),
                        b"lines-valid" => summary.lines_valid = value.parse().ok(),
                        _ => {}
                    }
                }
                return Ok(summary);
            }
            Event::Eof => return Err(CoberturaError::Empty),
            // Declarations, doctype, comments and whitespace before the root.
            _ => {}
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
<coverage line-rate="0.8321" branch-rate="0.75" lines-covered="832" lines-valid="1000" version="1.9" timestamp="0">
  <packages/>
</coverage>"#;

    #[test]
    fn test_inspect_reads_line_rate() {
        let summary = inspect_str(SAMPLE).unwrap();
        assert!((summary.line_rate - 0.8321).abs() < 1e-9);
        assert_eq!(summary.lines_covered, Some(832));
        assert_eq!(summary.lines_valid, Some(1000));
    }

    #[test]
    fn test_inspect_rejects_foreign_root() {
        let err = inspect_str("<testsuites><testsuite/></testsuites>").unwrap_err();
        match err {
            CoberturaError::NotCobertura { found } => assert_eq!(found, "testsuites"),
            other => panic!("expected NotCobertura, got {other:?}"),
        }
    }

    #[test]
    fn test_inspect_rejects_empty_document() {
        assert!(matches!(
            inspect_str("<?xml version=\"1.0\"?>"),
            Err(CoberturaError::Empty)
        ));
    }

    #[test]
    fn test_inspect_accepts_empty_coverage_element() {
        let summary = inspect_str(r#"<coverage line-rate="1.0"/>"#).unwrap();
        assert!((summary.line_rate - 1.0).abs() < 1e-9);
        assert_eq!(summary.lines_covered, None);
    }

    #[test]
    fn test_inspect_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coverage.cobertura.xml");
        fs::write(&path, SAMPLE).unwrap();
        let summary = inspect(&path).unwrap();
        assert!((summary.line_rate - 0.8321).abs() < 1e-9);
    }

    #[test]
    fn test_inspect_missing_file_is_io_error() {
        let err = inspect(Path::new("/nonexistent/coverage.xml")).unwrap_err();
        assert!(matches!(err, CoberturaError::Io { .. }));
    }
}
