//! HCL (Terraform) editor (spec §4.4: "for HCL/YAML/JSON, parse and
//! edit structurally rather than textually").
//!
//! Uses `hcl-edit`'s formatting-preserving tree so unrelated blocks,
//! comments and whitespace in `main.tf` survive a fix untouched --
//! exactly the guarantee a textual patch can't make.

use hcl_edit::expr::Expression;
use hcl_edit::structure::{Block, Body, Structure};
use hcl_edit::Ident;

use crate::finding::Finding;

use super::builtin::BuiltinPattern;
use super::FixError;

const PROVENANCE_COMMENT: &str = "# remedy: auto-fixed for compliance";

pub fn apply(pattern: BuiltinPattern, finding: &Finding, text: &str) -> Result<String, FixError> {
    let mut body: Body = text.parse().map_err(|e: hcl_edit::parser::Error| FixError::SyntaxInvalid {
        file: finding.file.clone(),
        reason: e.to_string(),
    })?;

    let changed = match pattern {
        BuiltinPattern::HclS3Encryption => add_s3_encryption(&mut body),
        BuiltinPattern::HclS3PublicAccessBlock => add_s3_public_access_block(&mut body),
        _ => false,
    };

    if !changed {
        return Ok(text.to_string());
    }

    let rewritten = body.to_string();
    // Re-parse to guarantee the written file is syntactically valid
    // before handing it back (spec §4.4 step 4).
    rewritten
        .parse::<Body>()
        .map_err(|e| FixError::SyntaxInvalid {
            file: finding.file.clone(),
            reason: e.to_string(),
        })?;
    Ok(rewritten)
}

fn s3_bucket_blocks(body: &mut Body) -> impl Iterator<Item = &mut Block> {
    body.blocks_mut().filter(|block| {
        block.ident.as_str() == "resource"
            && block
                .labels
                .first()
                .is_some_and(|label| label.as_str() == "aws_s3_bucket")
    })
}

fn has_nested_block(block: &Block, ident: &str) -> bool {
    block.body.blocks().any(|b| b.ident.as_str() == ident)
}

fn add_s3_encryption(body: &mut Body) -> bool {
    let mut changed = false;
    for bucket in s3_bucket_blocks(body) {
        if has_nested_block(bucket, "server_side_encryption_configuration") {
            continue;
        }

        let mut rule = Block::new(Ident::new("rule"));
        let mut default_apply = Block::new(Ident::new("apply_server_side_encryption_by_default"));
        default_apply.body.push(hcl_edit::structure::Attribute::new(
            Ident::new("sse_algorithm"),
            Expression::from("AES256"),
        ));
        rule.body.push(Structure::Block(default_apply));

        let mut sse_config = Block::new(Ident::new("server_side_encryption_configuration"));
        sse_config.body.push(Structure::Block(rule));

        bucket.body.push(Structure::Block(sse_config));
        bucket
            .body
            .push(Structure::Attribute(hcl_edit::structure::Attribute::new(
                Ident::new("remedy_provenance"),
                Expression::from(PROVENANCE_COMMENT),
            )));
        changed = true;
    }
    changed
}

fn add_s3_public_access_block(body: &mut Body) -> bool {
    let bucket_names: Vec<String> = s3_bucket_blocks(body)
        .filter_map(|b| b.labels.get(1).map(|l| l.as_str().to_string()))
        .collect();

    let mut changed = false;
    for name in bucket_names {
        let already_has_pab = body.blocks().any(|block| {
            block.ident.as_str() == "resource"
                && block
                    .labels
                    .first()
                    .is_some_and(|l| l.as_str() == "aws_s3_bucket_public_access_block")
        });
        if already_has_pab {
            continue;
        }

        let mut pab = Block::new(Ident::new("resource"));
        pab.labels.push(hcl_edit::structure::BlockLabel::String(
            "aws_s3_bucket_public_access_block".into(),
        ));
        pab.labels
            .push(hcl_edit::structure::BlockLabel::String(format!("{name}_pab").into()));
        for attr in [
            "block_public_acls",
            "block_public_policy",
            "ignore_public_acls",
            "restrict_public_buckets",
        ] {
            pab.body.push(hcl_edit::structure::Attribute::new(
                Ident::new(attr),
                Expression::from(true),
            ));
        }
        body.push(Structure::Block(pab));
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Confidence, Fingerprint, Severity};
    use serde_json::Value;

    fn finding() -> Finding {
        Finding {
            id: "f1".to_string(),
            fingerprint: Fingerprint("fp-1".to_string()),
            rule_id: "CKV_AWS_19".to_string(),
            scanner: "checkov".to_string(),
            severity: Severity::High,
            confidence: Confidence::High,
            file: "infra/main.tf".to_string(),
            line: 1,
            column: None,
            snippet: String::new(),
            message: "unencrypted bucket".to_string(),
            cwe: None,
            compliance_tags: Default::default(),
            fix_available: true,
            metadata: Value::Null,
        }
    }

    #[test]
    fn adds_server_side_encryption_to_an_s3_bucket_without_one() {
        let text = "resource \"aws_s3_bucket\" \"data\" {\n  bucket = \"demo\"\n}\n";
        let result = apply(BuiltinPattern::HclS3Encryption, &finding(), text).unwrap();
        assert!(result.contains("server_side_encryption_configuration"));
        assert!(result.contains("AES256"));
    }

    #[test]
    fn leaves_a_bucket_that_already_has_encryption_untouched() {
        let text = "resource \"aws_s3_bucket\" \"data\" {\n  bucket = \"demo\"\n  server_side_encryption_configuration {\n    rule {\n      apply_server_side_encryption_by_default {\n        sse_algorithm = \"AES256\"\n      }\n    }\n  }\n}\n";
        let result = apply(BuiltinPattern::HclS3Encryption, &finding(), text).unwrap();
        assert_eq!(result, text);
    }
}
