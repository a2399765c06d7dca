//! Fraud-alert caller.
//!
//! The agent loads a case by customer name, asks its security question,
//! and only after the model reports a correct answer walks the customer
//! through confirming or denying the flagged transaction. Every status
//! change is written straight to the `fraud_cases` table.

mod store;

pub use store::{CaseStatus, FraudCase, FraudStore, NewCase, SAMPLE_CASE};

use async_trait::async_trait;
use parley_core::conversation::{Conversation, TurnMode};
use parley_core::tools::{ToolDefinition, ToolOutput, ToolRegistry};
use parley_core::{CoreError, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const INSTRUCTIONS: &str = "You are a calm, professional fraud prevention representative calling a bank customer \
about a suspicious card transaction. Follow this order strictly:
1. Ask for the customer's name and call load_case with it.
2. Ask the security question returned by load_case. Judge whether the spoken answer matches the expected answer \
and call verify_security with exactly \"correct\" or \"incorrect\". Never reveal the expected answer.
3. Once verified, read the transaction details, ask whether the customer made it, and call confirm_transaction \
with \"yes\" or \"no\".
Never ask for full card numbers, PINs or passwords. Keep every reply short and spoken-friendly.";

const REOPEN_NOTE: &str = "Case reopened for a new review.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoadCaseArgs {
    /// The customer's name as they said it.
    pub user_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VerifyArgs {
    /// Your judgment of the security answer: "correct" or "incorrect".
    pub result: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfirmArgs {
    /// Whether the customer made the transaction: "yes" or "no".
    pub answer: String,
}

pub struct FraudSession {
    store: FraudStore,
    case: Option<FraudCase>,
    verified: bool,
    tools: Arc<ToolRegistry<FraudSession>>,
}

fn storage(e: anyhow::Error) -> CoreError {
    CoreError::Storage(format!("{:#}", e))
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("unknown")
}

impl FraudSession {
    pub fn new(store: FraudStore) -> Self {
        Self {
            store,
            case: None,
            verified: false,
            tools: Arc::new(Self::registry()),
        }
    }

    /// Opens the database at `path`, making sure the sample case exists.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let store = FraudStore::connect(path).await?;
        store.seed_sample().await?;
        Ok(Self::new(store))
    }

    pub(crate) fn registry() -> ToolRegistry<Self> {
        ToolRegistry::new()
            .register(
                "load_case",
                "Look up the pending fraud case for a customer by name. Must be called before anything else.",
                |s: &mut FraudSession, a: LoadCaseArgs| {
                    Box::pin(async move { s.load_case(a).await })
                },
            )
            .register(
                "verify_security",
                "Report whether the customer's security answer was correct.",
                |s: &mut FraudSession, a: VerifyArgs| {
                    Box::pin(async move { s.verify_security(a).await })
                },
            )
            .register(
                "confirm_transaction",
                "Record whether the verified customer made the flagged transaction.",
                |s: &mut FraudSession, a: ConfirmArgs| {
                    Box::pin(async move { s.confirm_transaction(a).await })
                },
            )
    }

    pub fn case(&self) -> Option<&FraudCase> {
        self.case.as_ref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    fn status(&self) -> Option<CaseStatus> {
        self.case.as_ref().and_then(|c| c.status)
    }

    fn closed_sentence(case: &FraudCase) -> Option<String> {
        match case.status {
            Some(CaseStatus::PendingReview) | None => None,
            Some(status) => Some(format!(
                "The case for {} is already closed with status {}. No further action is needed. Thank you for your time.",
                case.user_name, status
            )),
        }
    }

    /// Looks the customer up and asks the security question.
    ///
    /// A case closed by an earlier call is put back to `pending_review` so
    /// the verification runs again from the start.
    async fn load_case(&mut self, args: LoadCaseArgs) -> Result<ToolOutput> {
        let name = args.user_name.trim();
        let Some(mut case) = self.store.find_by_user_name(name).await.map_err(storage)? else {
            info!(user = %name, "No fraud case found");
            return Ok(format!(
                "I couldn't find a case under the name {}. Could you repeat the name on the account?",
                name
            )
            .into());
        };
        info!(case_id = case.id, user = %case.user_name, "Loaded fraud case");

        if let Some(previous) = case.status.filter(|s| *s != CaseStatus::PendingReview) {
            let reopened = self
                .store
                .update_status(case.id, CaseStatus::PendingReview, REOPEN_NOTE)
                .await
                .map_err(storage)?;
            if !reopened {
                warn!(case_id = case.id, "Reopen matched no rows");
                return Ok(format!(
                    "I wasn't able to reopen case {}. Please try again or escalate to a supervisor.",
                    case.id
                )
                .into());
            }
            info!(case_id = case.id, %previous, "Reopened fraud case for a new review");
            case.status = Some(CaseStatus::PendingReview);
            case.note = Some(REOPEN_NOTE.to_string());
        }

        self.verified = false;
        let reply = format!(
            "I found the case for {}. Before we continue, I need to verify your identity. {} \
             [Expected answer: {}. Do not reveal it.]",
            case.user_name,
            field(&case.security_question),
            field(&case.security_answer)
        );
        self.case = Some(case);
        Ok(reply.into())
    }

    async fn verify_security(&mut self, args: VerifyArgs) -> Result<ToolOutput> {
        let Some(case) = self.case.as_ref() else {
            return Ok("I need to load the case first. May I have your name, please?".into());
        };
        if let Some(closed) = Self::closed_sentence(case) {
            return Ok(closed.into());
        }

        match args.result.trim().to_lowercase().as_str() {
            "correct" => {
                self.verified = true;
                info!(case_id = case.id, "Customer verified");
                Ok(format!(
                    "Thank you, you're verified. We flagged a charge of {} at {} ({}, {}) on your card ending {}, \
                     made in {} on {}. Did you make this transaction? Please answer yes or no.",
                    field(&case.amount),
                    field(&case.merchant),
                    field(&case.transaction_source),
                    field(&case.transaction_category),
                    field(&case.card_ending),
                    field(&case.location),
                    field(&case.timestamp)
                )
                .into())
            }
            "incorrect" => {
                let id = case.id;
                self.write_status(
                    id,
                    CaseStatus::VerificationFailed,
                    "Customer failed security verification.",
                    "I'm sorry, that answer doesn't match our records, so I can't continue this call. \
                     Please contact us using the number on the back of your card.",
                )
                .await
            }
            other => {
                warn!(result = %other, "Unrecognized verification result");
                Ok(format!(
                    "Let's try that again. {}",
                    field(&case.security_question)
                )
                .into())
            }
        }
    }

    async fn confirm_transaction(&mut self, args: ConfirmArgs) -> Result<ToolOutput> {
        let Some(case) = self.case.as_ref() else {
            return Ok("I need to load the case first. May I have your name, please?".into());
        };
        if let Some(closed) = Self::closed_sentence(case) {
            return Ok(closed.into());
        }
        if !self.verified {
            return Ok(format!(
                "I can't discuss the transaction until your identity is verified. {}",
                field(&case.security_question)
            )
            .into());
        }

        let id = case.id;
        let card = field(&case.card_ending).to_string();
        match args.answer.trim().to_lowercase().as_str() {
            "yes" => {
                self.write_status(
                    id,
                    CaseStatus::ConfirmedSafe,
                    "Customer confirmed the transaction as legitimate.",
                    "Thank you for confirming. I've marked the transaction as legitimate and your card \
                     remains active. Have a great day.",
                )
                .await
            }
            "no" => {
                let note = format!(
                    "Customer denied the transaction. Card ending {} blocked and dispute raised.",
                    card
                );
                let reply = format!(
                    "Thank you. I've blocked your card ending {} and raised a dispute for this charge. \
                     A replacement card will be sent to you. Is there anything else I can help with?",
                    card
                );
                self.write_status(id, CaseStatus::ConfirmedFraud, &note, &reply)
                    .await
            }
            _ => Ok(format!(
                "Sorry, I need a clear yes or no. Did you make the {} purchase at {}?",
                field(&case.amount),
                field(&case.merchant)
            )
            .into()),
        }
    }

    /// Persists a transition and mirrors it in memory only when a row was updated.
    async fn write_status(
        &mut self,
        id: i64,
        status: CaseStatus,
        note: &str,
        reply: &str,
    ) -> Result<ToolOutput> {
        let updated = self
            .store
            .update_status(id, status, note)
            .await
            .map_err(storage)?;
        if !updated {
            warn!(case_id = id, %status, "Status update matched no rows");
            return Ok(format!(
                "I wasn't able to update case {} to {}. Please try again or escalate to a supervisor.",
                id, status
            )
            .into());
        }
        info!(case_id = id, %status, "Fraud case updated");
        if let Some(case) = self.case.as_mut() {
            case.status = Some(status);
            case.note = Some(note.to_string());
        }
        Ok(reply.into())
    }
}

#[async_trait]
impl Conversation for FraudSession {
    fn demo(&self) -> &'static str {
        "fraud"
    }

    fn mode(&self) -> TurnMode {
        TurnMode::ToolCalling
    }

    fn instructions(&self) -> String {
        INSTRUCTIONS.to_string()
    }

    async fn opening(&mut self) -> Result<String> {
        Ok("Hello, this is the fraud prevention team calling about recent activity on your card. \
            May I have your name, please?"
            .to_string())
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    async fn call_tool(&mut self, name: &str, args: Value) -> Result<ToolOutput> {
        let tools = Arc::clone(&self.tools);
        tools.dispatch(self, name, args).await
    }

    fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        if let Some(case) = &self.case {
            meta.insert("case_id".into(), json!(case.id));
            meta.insert("user_name".into(), json!(case.user_name));
        }
        meta.insert("verified".into(), json!(self.verified));
        if let Some(status) = self.status() {
            meta.insert("status".into(), json!(status));
        }
        meta
    }

    fn is_finished(&self) -> bool {
        !matches!(self.status(), None | Some(CaseStatus::PendingReview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::temp_store;

    async fn session(dir: &tempfile::TempDir) -> FraudSession {
        FraudSession::new(temp_store(dir).await)
    }

    async fn stored_status(session: &FraudSession) -> Option<CaseStatus> {
        let id = session.case().unwrap().id;
        session.store.get(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_raj_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(&dir).await;

        let out = s
            .call_tool("load_case", json!({ "user_name": "raj" }))
            .await
            .unwrap();
        assert!(out.text().contains("What is your favorite color?"));

        let out = s
            .call_tool("verify_security", json!({ "result": "correct" }))
            .await
            .unwrap();
        assert!(out.text().contains("ABC Industry"));
        assert!(s.is_verified());
        assert_eq!(stored_status(&s).await, Some(CaseStatus::PendingReview));
        assert!(!s.is_finished());

        s.call_tool("confirm_transaction", json!({ "answer": "no" }))
            .await
            .unwrap();
        let id = s.case().unwrap().id;
        let stored = s.store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, Some(CaseStatus::ConfirmedFraud));
        assert_eq!(
            stored.note.as_deref(),
            Some("Customer denied the transaction. Card ending **** 4242 blocked and dispute raised.")
        );
        assert!(s.is_finished());
        assert_eq!(s.meta()["status"], "confirmed_fraud");
    }

    #[tokio::test]
    async fn test_incorrect_answer_persists_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(&dir).await;
        s.call_tool("load_case", json!({ "user_name": "Raj" }))
            .await
            .unwrap();

        s.call_tool("verify_security", json!({ "result": "incorrect" }))
            .await
            .unwrap();
        assert!(!s.is_verified());
        assert_eq!(stored_status(&s).await, Some(CaseStatus::VerificationFailed));

        let out = s
            .call_tool("confirm_transaction", json!({ "answer": "yes" }))
            .await
            .unwrap();
        assert!(out.text().contains("already closed"));
        assert_eq!(stored_status(&s).await, Some(CaseStatus::VerificationFailed));
    }

    #[tokio::test]
    async fn test_closed_case_is_reviewed_again_in_a_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = session(&dir).await;
        first
            .call_tool("load_case", json!({ "user_name": "Raj" }))
            .await
            .unwrap();
        first
            .call_tool("verify_security", json!({ "result": "incorrect" }))
            .await
            .unwrap();
        assert!(first.is_finished());

        let mut second = FraudSession::open(&dir.path().join("fraud.db")).await.unwrap();
        let out = second
            .call_tool("load_case", json!({ "user_name": "Raj" }))
            .await
            .unwrap();
        assert!(out.text().contains("What is your favorite color?"));
        assert_eq!(stored_status(&second).await, Some(CaseStatus::PendingReview));
        assert!(!second.is_finished());

        second
            .call_tool("verify_security", json!({ "result": "correct" }))
            .await
            .unwrap();
        assert_eq!(stored_status(&second).await, Some(CaseStatus::PendingReview));
        second
            .call_tool("confirm_transaction", json!({ "answer": "no" }))
            .await
            .unwrap();
        assert_eq!(stored_status(&second).await, Some(CaseStatus::ConfirmedFraud));
    }

    #[tokio::test]
    async fn test_confirm_before_verify_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(&dir).await;

        let out = s
            .call_tool("confirm_transaction", json!({ "answer": "yes" }))
            .await
            .unwrap();
        assert!(out.text().contains("load the case first"));

        s.call_tool("load_case", json!({ "user_name": "Raj" }))
            .await
            .unwrap();
        let out = s
            .call_tool("confirm_transaction", json!({ "answer": "yes" }))
            .await
            .unwrap();
        assert!(out.text().contains("until your identity is verified"));
        assert_eq!(stored_status(&s).await, Some(CaseStatus::PendingReview));
    }

    #[tokio::test]
    async fn test_unclear_tokens_repeat_the_question() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(&dir).await;
        s.call_tool("load_case", json!({ "user_name": "Raj" }))
            .await
            .unwrap();

        let out = s
            .call_tool("verify_security", json!({ "result": "maybe" }))
            .await
            .unwrap();
        assert!(out.text().contains("What is your favorite color?"));
        assert!(!s.is_verified());

        s.call_tool("verify_security", json!({ "result": "Correct" }))
            .await
            .unwrap();
        let out = s
            .call_tool("confirm_transaction", json!({ "answer": "not sure" }))
            .await
            .unwrap();
        assert!(out.text().contains("yes or no"));
        assert_eq!(stored_status(&s).await, Some(CaseStatus::PendingReview));
    }

    #[tokio::test]
    async fn test_yes_confirms_safe() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(&dir).await;
        s.call_tool("load_case", json!({ "user_name": "RAJ" }))
            .await
            .unwrap();
        s.call_tool("verify_security", json!({ "result": "correct" }))
            .await
            .unwrap();
        s.call_tool("confirm_transaction", json!({ "answer": "yes" }))
            .await
            .unwrap();
        assert_eq!(stored_status(&s).await, Some(CaseStatus::ConfirmedSafe));
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(&dir).await;
        let out = s
            .call_tool("load_case", json!({ "user_name": "Priya" }))
            .await
            .unwrap();
        assert!(out.text().contains("couldn't find a case"));
        assert!(s.case().is_none());
    }

    #[tokio::test]
    async fn test_missing_row_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(&dir).await;
        s.call_tool("load_case", json!({ "user_name": "Raj" }))
            .await
            .unwrap();
        s.case.as_mut().unwrap().id += 1000;

        let out = s
            .call_tool("verify_security", json!({ "result": "incorrect" }))
            .await
            .unwrap();
        assert!(out.text().contains("wasn't able to update"));
        assert!(!s.is_finished());
    }
}
