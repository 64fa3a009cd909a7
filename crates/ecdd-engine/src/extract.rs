//! Structured-payload extraction from free-form model output
//!
//! Generative back-ends return narrative text with zero or more JSON objects
//! embedded anywhere inside it, often wrapped in code fences or surrounded by
//! commentary. The extractor scans for balanced top-level objects and keeps
//! the ones `serde_json` accepts, preserving source order. Classification of
//! the surviving objects is by marker key, not position, so report order in
//! the output does not matter.

use serde_json::Value;

/// Every parseable JSON object embedded in `text`, in source order.
///
/// Malformed candidates are skipped; scanning resumes one byte past the
/// opening brace so objects nested inside broken outer text are still found.
#[must_use]
pub fn extract_objects(text: &str) -> Vec<Value> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        // '{' is ASCII, so byte scanning never lands mid-codepoint
        let Some(offset) = bytes[pos..].iter().position(|&b| b == b'{') else {
            break;
        };
        let start = pos + offset;

        match balanced_end(bytes, start) {
            Some(end) => match serde_json::from_slice::<Value>(&bytes[start..end]) {
                Ok(value) if value.is_object() => {
                    found.push(value);
                    pos = end;
                }
                _ => pos = start + 1,
            },
            None => pos = start + 1,
        }
    }

    found
}

/// One byte past the brace balancing `bytes[start]`, honoring string
/// literals and escapes. `None` when the input ends unbalanced.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Assessment and checklist payloads classified out of a report response.
#[derive(Debug, Default)]
pub struct ExtractedReports {
    pub assessment: Option<Value>,
    pub checklist: Option<Value>,
}

/// Classify extracted objects by marker key. First match per slot wins.
#[must_use]
pub fn classify_reports(objects: &[Value]) -> ExtractedReports {
    let mut reports = ExtractedReports::default();
    for obj in objects {
        if reports.assessment.is_none() && is_assessment(obj) {
            reports.assessment = Some(obj.clone());
        } else if reports.checklist.is_none() && is_checklist(obj) {
            reports.checklist = Some(obj.clone());
        }
    }
    reports
}

/// First extracted object that looks like a questionnaire.
#[must_use]
pub fn find_questionnaire(objects: &[Value]) -> Option<&Value> {
    objects.iter().find(|obj| obj.get("sections").is_some())
}

fn is_assessment(obj: &Value) -> bool {
    obj.get("compliance_flags").is_some()
        || obj.get("overall_rating").is_some()
        || obj.get("overall_risk_rating").is_some()
}

fn is_checklist(obj: &Value) -> bool {
    obj.get("identity_documents").is_some()
}
