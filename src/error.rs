//! Typed outcome of every wallet and contract call.
//!
//! Provider failures are classified into an [`ErrorKind`] once, at the
//! boundary, so callers match on kinds instead of sniffing message text.

use axum::{response::IntoResponse, Json};
use chatbot_abi::{AbiError, UnitsError};
use serde::Serialize;

use crate::provider::ProviderError;

/// Result of a wallet or contract operation.
pub type CallResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    ProviderMissing,
    UserRejected,
    InsufficientFunds,
    Reverted,
    Unauthorized,
    Network,
    Decode,
    InvalidInput,
    NotConnected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("no wallet provider is available")]
    ProviderMissing,
    #[error("request rejected by user")]
    UserRejected,
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected contract response: {0}")]
    Decode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("wallet is not connected")]
    NotConnected,
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::ProviderMissing => ErrorKind::ProviderMissing,
            GatewayError::UserRejected => ErrorKind::UserRejected,
            GatewayError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            GatewayError::Reverted(_) => ErrorKind::Reverted,
            GatewayError::Unauthorized(_) => ErrorKind::Unauthorized,
            GatewayError::Network(_) => ErrorKind::Network,
            GatewayError::Decode(_) => ErrorKind::Decode,
            GatewayError::InvalidInput(_) => ErrorKind::InvalidInput,
            GatewayError::NotConnected => ErrorKind::NotConnected,
        }
    }

    /// Text suitable for a toast in the UI.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::ProviderMissing => {
                "No wallet found. Install MetaMask or another browser wallet to continue.".into()
            }
            GatewayError::UserRejected => "The request was cancelled in your wallet.".into(),
            GatewayError::InsufficientFunds(_) => {
                "Your wallet does not have enough funds to pay for this transaction.".into()
            }
            GatewayError::Reverted(reason) => revert_message(reason).to_string(),
            GatewayError::Unauthorized(msg) | GatewayError::InvalidInput(msg) => msg.clone(),
            GatewayError::Network(_) => "Network request failed. Please try again.".into(),
            GatewayError::Decode(_) => "Received an unexpected response from the contract.".into(),
            GatewayError::NotConnected => "Connect your wallet first.".into(),
        }
    }
}

fn revert_message(reason: &str) -> &'static str {
    let lower = reason.to_lowercase();
    if lower.contains("not yet minted") {
        "This chatbot NFT has not been minted yet"
    } else if lower.contains("already minted") {
        "The NFT for this chatbot has already been minted."
    } else if lower.contains("not the owner") || lower.contains("ownable") {
        "Only the owner can perform this action."
    } else {
        "The transaction was rejected by the contract."
    }
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rpc { code, message } => classify(Some(code), &message),
            ProviderError::Transport(message) => classify(None, &message),
            ProviderError::InvalidResponse(message) => GatewayError::Decode(message),
        }
    }
}

fn classify(code: Option<i64>, message: &str) -> GatewayError {
    let lower = message.to_lowercase();
    if code == Some(ProviderError::USER_REJECTED)
        || lower.contains("user rejected")
        || lower.contains("user denied")
    {
        GatewayError::UserRejected
    } else if lower.contains("insufficient funds") {
        GatewayError::InsufficientFunds(message.to_string())
    } else if lower.contains("revert") {
        let reason = message
            .split_once("reverted:")
            .map(|(_, r)| r.trim())
            .filter(|r| !r.is_empty())
            .unwrap_or(message);
        GatewayError::Reverted(reason.to_string())
    } else {
        GatewayError::Network(message.to_string())
    }
}

impl From<AbiError> for GatewayError {
    fn from(err: AbiError) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

impl From<UnitsError> for GatewayError {
    fn from(err: UnitsError) -> Self {
        GatewayError::InvalidInput(err.to_string())
    }
}

/// Wire shape of a [`CallResult`]: `{success: true, ...value}` or
/// `{success: false, error, kind, detail}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl<T> From<CallResult<T>> for Envelope<T> {
    fn from(result: CallResult<T>) -> Self {
        match result {
            Ok(value) => Envelope {
                success: true,
                value: Some(value),
                error: None,
                kind: None,
                detail: None,
            },
            Err(e) => Envelope {
                success: false,
                value: None,
                error: Some(e.user_message()),
                kind: Some(e.kind()),
                detail: Some(e.to_string()),
            },
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Prompt {
        prompt_template: String,
    }

    #[test]
    fn classify_user_rejection() {
        let err: GatewayError = ProviderError::rpc(4001, "User rejected the request.").into();
        assert_eq!(err, GatewayError::UserRejected);
        let err: GatewayError =
            ProviderError::rpc(-32603, "MetaMask Tx Signature: User denied transaction signature.").into();
        assert_eq!(err.kind(), ErrorKind::UserRejected);
    }

    #[test]
    fn classify_funds_and_reverts() {
        let err: GatewayError =
            ProviderError::rpc(-32000, "insufficient funds for gas * price + value").into();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let err: GatewayError =
            ProviderError::rpc(3, "execution reverted: NFT already minted").into();
        assert_eq!(err, GatewayError::Reverted("NFT already minted".into()));
        assert_eq!(
            err.user_message(),
            "The NFT for this chatbot has already been minted."
        );

        let err: GatewayError = ProviderError::rpc(3, "execution reverted").into();
        assert_eq!(err, GatewayError::Reverted("execution reverted".into()));
    }

    #[test]
    fn classify_network_and_decode() {
        let err: GatewayError = ProviderError::Transport("connection refused".into()).into();
        assert_eq!(err.kind(), ErrorKind::Network);
        let err: GatewayError = ProviderError::InvalidResponse("garbage".into()).into();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn envelope_success_flattens_value() {
        let env: Envelope<Prompt> = Ok(Prompt {
            prompt_template: "You are helpful".into(),
        })
        .into();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "promptTemplate": "You are helpful"})
        );
    }

    #[test]
    fn envelope_failure_carries_kind() {
        let env: Envelope<Prompt> = Err(GatewayError::UserRejected).into();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "userRejected");
        assert_eq!(json["error"], "The request was cancelled in your wallet.");
        assert!(json.get("promptTemplate").is_none());
    }
}
