//! Setup verification behind `prompt-deploy check`.
//!
//! Each probe yields [`CheckOutcome`]s; nothing here aborts early, so a single
//! run reports every problem with the local checkout and the AWS account.

use std::fmt::Write as _;

use aws_config::SdkConfig;
use aws_credential_types::provider::ProvideCredentials;
use prompt_deploy_core::config::ModelParams;
use prompt_deploy_core::contract::ModelRuntime;
use prompt_deploy_core::generation::GenerationClient;
use prompt_deploy_core::pipeline::Layout;

use crate::account::AccountInspector;

/// Small, cheap model used to prove Bedrock access.
pub const PROBE_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";
pub const PROBE_MAX_TOKENS: u32 = 100;
const CLAUDE_MARKER: &str = "claude";
const PROBE_PROMPT: &str = "Say 'Hello from Bedrock!' in exactly 5 words.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub outcomes: Vec<CheckOutcome>,
    /// Checks that could not run, e.g. an unset bucket variable.
    pub skipped: Vec<String>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Setup verification\n");
        for outcome in &self.outcomes {
            let mark = if outcome.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(out, "  [{mark}] {}: {}", outcome.name, outcome.detail);
        }
        for skipped in &self.skipped {
            let _ = writeln!(out, "  [SKIP] {skipped}");
        }
        let passed = self.outcomes.iter().filter(|o| o.passed).count();
        let _ = writeln!(out, "{passed}/{} checks passed", self.outcomes.len());
        out
    }
}

pub fn project_structure(layout: &Layout) -> Vec<CheckOutcome> {
    layout
        .dirs()
        .into_iter()
        .map(|dir| {
            let name = format!("directory {}", dir.display());
            if dir.is_dir() {
                CheckOutcome::pass(name, "exists")
            } else {
                CheckOutcome::fail(name, "missing")
            }
        })
        .collect()
}

/// Shows the first four characters of an access key id.
fn mask_key(key: &str) -> String {
    let head: String = key.chars().take(4).collect();
    format!("{head}****")
}

pub async fn credentials(sdk_config: &SdkConfig) -> CheckOutcome {
    let Some(provider) = sdk_config.credentials_provider() else {
        return CheckOutcome::fail("AWS credentials", "no credentials provider configured");
    };
    match provider.provide_credentials().await {
        Ok(creds) => CheckOutcome::pass(
            "AWS credentials",
            format!("resolved access key {}", mask_key(creds.access_key_id())),
        ),
        Err(e) => CheckOutcome::fail("AWS credentials", e.to_string()),
    }
}

/// Proves the credentials are accepted by AWS, not just present.
pub async fn identity<A: AccountInspector>(account: &A) -> CheckOutcome {
    match account.caller_identity().await {
        Ok(id) => CheckOutcome::pass(
            "AWS identity",
            format!("account {}, arn {}", id.account, id.arn),
        ),
        Err(e) => {
            let detail = match e.code.as_str() {
                "InvalidClientTokenId" | "ExpiredToken" | "SignatureDoesNotMatch" => {
                    format!("credentials rejected by AWS ({}): {}", e.code, e.message)
                }
                _ => format!("{} - {}", e.code, e.message),
            };
            CheckOutcome::fail("AWS identity", detail)
        }
    }
}

/// Lists foundation models and reports the Claude ones.
pub async fn bedrock_models<A: AccountInspector>(account: &A) -> CheckOutcome {
    const NAME: &str = "Bedrock models";
    let ids = match account.foundation_model_ids().await {
        Ok(ids) => ids,
        Err(e) if e.code == "AccessDeniedException" => {
            return CheckOutcome::fail(
                NAME,
                "access denied; check IAM permissions for bedrock:ListFoundationModels",
            )
        }
        Err(e) => return CheckOutcome::fail(NAME, format!("{} - {}", e.code, e.message)),
    };
    if ids.is_empty() {
        return CheckOutcome::fail(
            NAME,
            "no models found; enable model access in the Bedrock console",
        );
    }

    let claude: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| id.to_lowercase().contains(CLAUDE_MARKER))
        .collect();
    if claude.is_empty() {
        return CheckOutcome::pass(
            NAME,
            format!(
                "{} models available, none from Claude; enable Claude models in the Bedrock console",
                ids.len()
            ),
        );
    }
    let shown = claude.iter().take(3).copied().collect::<Vec<_>>().join(", ");
    CheckOutcome::pass(
        NAME,
        format!("found {} Claude model(s): {shown}", claude.len()),
    )
}

pub async fn model_runtime<R: ModelRuntime>(generator: &GenerationClient<R>) -> CheckOutcome {
    let params = ModelParams {
        max_tokens: PROBE_MAX_TOKENS,
        ..ModelParams::default()
    };
    match generator
        .invoke(PROBE_PROMPT, Some(PROBE_MODEL_ID), Some(&params))
        .await
    {
        Ok(reply) => CheckOutcome::pass(
            "Bedrock runtime",
            format!("{PROBE_MODEL_ID} replied: {}", reply.trim()),
        ),
        Err(e) => CheckOutcome::fail("Bedrock runtime", e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{CallerIdentity, MockAccountInspector, ServiceError};
    use prompt_deploy_core::contract::MockModelRuntime;
    use prompt_deploy_core::PipelineError;
    use tempfile::tempdir;

    #[test]
    fn project_structure_reports_each_directory() {
        let dir = tempdir().unwrap();
        let layout = Layout::rooted_at(dir.path());
        std::fs::create_dir_all(&layout.prompts_dir).unwrap();
        std::fs::create_dir_all(&layout.outputs_dir).unwrap();

        let outcomes = project_structure(&layout);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert!(outcomes[1].name.ends_with("prompt_templates"));
        assert!(outcomes[2].passed);
    }

    #[test]
    fn report_renders_and_fails_on_any_failure() {
        let mut report = CheckReport::default();
        report.outcomes.push(CheckOutcome::pass("a", "ok"));
        report.skipped.push("S3_BUCKET_PROD not set".into());
        assert!(report.passed());

        report.outcomes.push(CheckOutcome::fail("b", "broken"));
        assert!(!report.passed());

        let text = report.render();
        assert!(text.contains("[PASS] a: ok"));
        assert!(text.contains("[FAIL] b: broken"));
        assert!(text.contains("[SKIP] S3_BUCKET_PROD not set"));
        assert!(text.contains("1/2 checks passed"));
    }

    #[test]
    fn access_keys_are_masked() {
        assert_eq!(mask_key("AKIAABCDEFGH"), "AKIA****");
        assert_eq!(mask_key("AK"), "AK****");
    }

    #[tokio::test]
    async fn model_runtime_uses_probe_model() {
        let mut runtime = MockModelRuntime::new();
        runtime
            .expect_invoke_model()
            .withf(|req| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                req.model_id == PROBE_MODEL_ID && body["max_tokens"] == 100
            })
            .times(1)
            .returning(|_| {
                Ok(br#"{"content":[{"type":"text","text":" Hello from Bedrock, friend! "}]}"#.to_vec())
            });

        let outcome = model_runtime(&GenerationClient::new(runtime)).await;
        assert!(outcome.passed, "{outcome:?}");
        assert!(outcome.detail.ends_with("Hello from Bedrock, friend!"));
    }

    #[tokio::test]
    async fn model_runtime_failure_is_reported() {
        let mut runtime = MockModelRuntime::new();
        runtime.expect_invoke_model().returning(|_| {
            Err(PipelineError::Generation {
                code: "AccessDeniedException".into(),
                message: "model access not granted".into(),
            })
        });

        let outcome = model_runtime(&GenerationClient::new(runtime)).await;
        assert!(!outcome.passed);
        assert!(outcome.detail.contains("AccessDeniedException"));
    }

    fn service_error(code: &str, message: &str) -> ServiceError {
        ServiceError {
            code: code.into(),
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn identity_reports_account_and_arn() {
        let mut account = MockAccountInspector::new();
        account.expect_caller_identity().times(1).returning(|| {
            Ok(CallerIdentity {
                account: "123456789012".into(),
                arn: "arn:aws:iam::123456789012:user/deployer".into(),
            })
        });

        let outcome = identity(&account).await;
        assert!(outcome.passed);
        assert_eq!(
            outcome.detail,
            "account 123456789012, arn arn:aws:iam::123456789012:user/deployer"
        );
    }

    #[tokio::test]
    async fn identity_fails_for_rejected_keys() {
        let mut account = MockAccountInspector::new();
        account.expect_caller_identity().returning(|| {
            Err(service_error(
                "InvalidClientTokenId",
                "The security token included in the request is invalid.",
            ))
        });

        let outcome = identity(&account).await;
        assert!(!outcome.passed);
        assert!(outcome.detail.starts_with("credentials rejected by AWS (InvalidClientTokenId)"));
    }

    #[tokio::test]
    async fn bedrock_models_lists_claude_models() {
        let mut account = MockAccountInspector::new();
        account.expect_foundation_model_ids().returning(|| {
            Ok(vec![
                "amazon.titan-text-express-v1".into(),
                "anthropic.claude-3-haiku-20240307-v1:0".into(),
                "anthropic.claude-3-sonnet-20240229-v1:0".into(),
            ])
        });

        let outcome = bedrock_models(&account).await;
        assert!(outcome.passed);
        assert_eq!(
            outcome.detail,
            "found 2 Claude model(s): anthropic.claude-3-haiku-20240307-v1:0, anthropic.claude-3-sonnet-20240229-v1:0"
        );
    }

    #[tokio::test]
    async fn bedrock_models_without_claude_still_passes_with_hint() {
        let mut account = MockAccountInspector::new();
        account
            .expect_foundation_model_ids()
            .returning(|| Ok(vec!["amazon.titan-text-express-v1".into()]));

        let outcome = bedrock_models(&account).await;
        assert!(outcome.passed);
        assert!(outcome.detail.contains("none from Claude"));
    }

    #[tokio::test]
    async fn bedrock_models_fails_when_empty_or_denied() {
        let mut empty = MockAccountInspector::new();
        empty.expect_foundation_model_ids().returning(|| Ok(Vec::new()));
        let outcome = bedrock_models(&empty).await;
        assert!(!outcome.passed);
        assert!(outcome.detail.starts_with("no models found"));

        let mut denied = MockAccountInspector::new();
        denied
            .expect_foundation_model_ids()
            .returning(|| Err(service_error("AccessDeniedException", "not authorized")));
        let outcome = bedrock_models(&denied).await;
        assert!(!outcome.passed);
        assert!(outcome.detail.contains("bedrock:ListFoundationModels"));
    }
}
