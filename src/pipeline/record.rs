//! Output records.
//!
//! One record is written per fully traversed
//! (root, line, category, normalized category, node, normalized node)
//! tuple, as a single line of JSON:
//!
//! ```json
//! {"path":{"linum":1,"text":"src"},
//!  "line":{"linum":3,"content":". lib.sh","path":"src/a.sh"},
//!  "category":{"origin":{"index":0,"name":"shell","result":"bash"},
//!              "normalized":{"index":-1,"result":"bash"}},
//!  "node":{"origin":{"index":0,"name":"source","result":"lib.sh"},
//!          "normalized":{"index":-1,"result":"lib.sh"}}}
//! ```
//!
//! In category-only mode the `node` field is omitted.

use serde::Serialize;
use std::io::Write;

use crate::selector::{NormalizedResult, SelectionResult};
use crate::walk::{Line, ReadLine};

/// A selection and its normalization.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Selected<'a> {
    /// What the rule produced
    pub origin: &'a SelectionResult,
    /// What the normalizers turned it into
    pub normalized: &'a NormalizedResult,
}

/// One line of output.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Record<'a> {
    /// The input line naming the walked root
    pub path: &'a ReadLine,
    /// The file line
    pub line: &'a Line,
    /// The category of the file
    pub category: Selected<'a>,
    /// The node found on the line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<Selected<'a>>,
}

impl Record<'_> {
    /// Writes the record as one JSON line.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), crate::core::GrdepError> {
        serde_json::to_writer(&mut *out, self)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let path = ReadLine {
            linum: 1,
            text: "src".to_string(),
            err: None,
        };
        let line = Line {
            linum: 3,
            content: ". lib.sh".to_string(),
            path: "src/a.sh".to_string(),
            err: None,
        };
        let category = SelectionResult {
            index: 0,
            name: "shell".to_string(),
            result: Some("bash".to_string()),
            err: None,
        };
        let normalized_category = NormalizedResult::identity("bash");
        let node = SelectionResult {
            index: 0,
            name: "source".to_string(),
            result: Some("lib.sh".to_string()),
            err: None,
        };
        let normalized_node = NormalizedResult {
            index: 2,
            name: Some("strip".to_string()),
            result: "lib".to_string(),
        };

        let mut record = Record {
            path: &path,
            line: &line,
            category: Selected {
                origin: &category,
                normalized: &normalized_category,
            },
            node: Some(Selected {
                origin: &node,
                normalized: &normalized_node,
            }),
        };

        let mut out = Vec::new();
        record.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            concat!(
                r#"{"path":{"linum":1,"text":"src"},"#,
                r#""line":{"linum":3,"content":". lib.sh","path":"src/a.sh"},"#,
                r#""category":{"origin":{"index":0,"name":"shell","result":"bash"},"normalized":{"index":-1,"result":"bash"}},"#,
                r#""node":{"origin":{"index":0,"name":"source","result":"lib.sh"},"normalized":{"index":2,"name":"strip","result":"lib"}}}"#,
                "\n"
            )
        );

        record.node = None;
        let json = serde_json::to_value(record).unwrap();
        assert!(json.get("node").is_none());
    }
}
