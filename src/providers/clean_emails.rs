//! `General/clean_emails_action`: strips markup from email bodies.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ProviderContext, GENERAL};
use crate::capabilities::{
    formatter, ActionError, AuthContext, CapabilityEntry, CapabilityRegistry, Describe, FieldSpec,
    StatelessHandler, TypeTag,
};

pub const OPERATION: &str = "clean_emails_action";

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").unwrap());

/// A batch of JSON-encoded email records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailBatch {
    pub emails: Vec<String>,
}

impl Describe for EmailBatch {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::list("emails", TypeTag::String)
            .describe("JSON-encoded email records with a `Text` field")]
    }
}

/// Remove markup tags from the `Text` field of every email.
pub async fn clean_emails(
    _auth: Option<AuthContext>,
    batch: EmailBatch,
) -> Result<EmailBatch, ActionError> {
    let emails = batch
        .emails
        .iter()
        .map(|raw| clean_email(raw))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("cleaned {} email(s)", emails.len());
    Ok(EmailBatch { emails })
}

fn clean_email(raw: &str) -> Result<String, ActionError> {
    let mut email: Map<String, Value> = serde_json::from_str(raw)?;
    if let Some(Value::String(text)) = email.get_mut("Text") {
        *text = MARKUP.replace_all(text, "").into_owned();
    }
    Ok(serde_json::to_string(&email)?)
}

fn render(batch: &EmailBatch) -> String {
    let count = batch.emails.len();
    let noun = if count > 1 { "emails" } else { "email" };
    format!("<i>Preprocessed {} {} ✅</i>", count, noun)
}

pub fn register(registry: &mut CapabilityRegistry, _ctx: &ProviderContext) {
    let entry = CapabilityEntry::new(
        OPERATION,
        Arc::new(StatelessHandler::new(clean_emails)),
        Some(formatter(render)),
    )
    .with_description("Strip HTML markup from the text of a batch of emails");
    registry.insert(GENERAL, OPERATION, entry);
}
