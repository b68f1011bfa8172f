use serde::Deserialize;
use serde_json::Value;

/// The provider's webhook envelope is not contractually fixed. Two shapes are
/// known: `{"data":{"id":...}}` and `{"id":...}`, with the id arriving either
/// as a JSON number or a string. Anything else parses to `Unrecognized` and is
/// handled as an explicit no-op by the caller.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WebhookEnvelope {
    Nested { data: WebhookData },
    Flat { id: Value },
    Unrecognized(Value),
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub id: Value,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or(WebhookEnvelope::Unrecognized(Value::Null))
    }

    /// Extracts the payment id, if the envelope carries one.
    pub fn payment_id(&self) -> Option<String> {
        let raw = match self {
            WebhookEnvelope::Nested { data } => &data.id,
            WebhookEnvelope::Flat { id } => id,
            WebhookEnvelope::Unrecognized(_) => return None,
        };
        match raw {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
