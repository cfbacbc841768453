//! Free-text editor: a line-anchored replacement for artifact kinds
//! with no structural parser (spec §4.4: "for free text, a line-anchored
//! replacement").

use crate::finding::Finding;

use super::builtin::BuiltinPattern;
use super::FixError;

pub fn apply(pattern: BuiltinPattern, finding: &Finding, text: &str) -> Result<String, FixError> {
    match pattern {
        BuiltinPattern::TextRedactSecret => Ok(redact_secret(finding, text)),
        _ => Ok(text.to_string()),
    }
}

/// Replace the flagged line wholesale with a redaction placeholder. Free
/// text has no grammar to preserve, so unlike the Python/HCL/manifest
/// editors this never needs a post-edit parse step (spec §4.4 step 4
/// only applies where a parser exists).
fn redact_secret(finding: &Finding, text: &str) -> String {
    if finding.line == 0 {
        return text.to_string();
    }
    let idx = (finding.line - 1) as usize;
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let Some(line) = lines.get(idx) else {
        return text.to_string();
    };
    let leading_ws: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    lines[idx] = format!("{leading_ws}# <redacted by remedy: possible secret removed>");

    let mut result = lines.join("\n");
    if text.ends_with('\n') {
        result.push('\n');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Confidence, Fingerprint, Severity};
    use serde_json::Value;

    fn finding(line: u32) -> Finding {
        Finding {
            id: "f1".to_string(),
            fingerprint: Fingerprint("fp-1".to_string()),
            rule_id: "generic-api-key".to_string(),
            scanner: "gitleaks".to_string(),
            severity: Severity::Critical,
            confidence: Confidence::Medium,
            file: ".env".to_string(),
            line,
            column: None,
            snippet: String::new(),
            message: "secret detected".to_string(),
            cwe: None,
            compliance_tags: Default::default(),
            fix_available: true,
            metadata: Value::Null,
        }
    }

    #[test]
    fn redacts_only_the_flagged_line() {
        let text = "FOO=bar\nTOKEN=sk-abcdef1234567890\nBAZ=qux\n";
        let result = apply(BuiltinPattern::TextRedactSecret, &finding(2), text).unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines[0], "FOO=bar");
        assert!(lines[1].contains("redacted"));
        assert_eq!(lines[2], "BAZ=qux");
    }
}
