/// Represents JSON RPC types for the transactionSubscribe method.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed request id; the stream is not correlated by id beyond logging.
pub const REQUEST_ID: u64 = 420;

/// Divisor from lamports to SOL.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    #[default]
    Confirmed,
    Finalized,
    Processed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDetails {
    #[default]
    Full,
    Signatures,
    Accounts,
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEncoding {
    #[default]
    #[serde(rename = "base58")]
    Base58,
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "base64+zstd")]
    Base64Zstd,
    #[serde(rename = "jsonParsed")]
    JsonParsed,
}

/// User-chosen subscription options. Read at request-build time; a request
/// built after a change carries the new values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionOptions {
    pub commitment: CommitmentLevel,
    pub details: TransactionDetails,
    pub encoding: TransactionEncoding,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub account_include: Vec<String>,
    pub account_require: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub commitment: CommitmentLevel,
    pub encoding: TransactionEncoding,
    pub transaction_details: TransactionDetails,
    pub show_rewards: bool,
    pub max_supported_transaction_version: u8,
}

/// The full transactionSubscribe request envelope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransactionSubscribeRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: (TransactionFilter, RequestOptions),
}

/// Builds the subscribe request from already-validated address lists and the
/// current options. Pure; performs no validation and no IO.
pub fn build(
    required: &[String],
    included: &[String],
    options: &SubscriptionOptions,
) -> TransactionSubscribeRequest {
    TransactionSubscribeRequest {
        jsonrpc: "2.0",
        id: REQUEST_ID,
        method: "transactionSubscribe",
        params: (
            TransactionFilter {
                account_include: included.to_vec(),
                account_require: required.to_vec(),
            },
            RequestOptions {
                commitment: options.commitment,
                encoding: options.encoding,
                transaction_details: options.details,
                show_rewards: true,
                max_supported_transaction_version: 1,
            },
        ),
    }
}

/// Acknowledgement frame: the server-assigned subscription id.
#[derive(Deserialize, Debug)]
pub struct SubscriptionReply {
    pub result: u64,
    pub id: u64,
}

/// Borrowed view over a received frame. Push frames carry `params`; the
/// acknowledgement frame does not, so every accessor is optional and a
/// frame without the looked-up field simply yields `None`.
#[derive(Clone, Copy, Debug)]
pub struct NotificationView<'a>(pub &'a Value);

impl<'a> NotificationView<'a> {
    pub fn method(&self) -> Option<&'a str> {
        self.0.get("method")?.as_str()
    }

    pub fn subscription(&self) -> Option<u64> {
        self.0.get("params")?.get("subscription")?.as_u64()
    }

    pub fn signature(&self) -> Option<&'a str> {
        self.result()?.get("signature")?.as_str()
    }

    pub fn compute_units_consumed(&self) -> Option<u64> {
        self.meta()?.get("computeUnitsConsumed")?.as_u64()
    }

    pub fn fee_lamports(&self) -> Option<u64> {
        self.meta()?.get("fee")?.as_u64()
    }

    pub fn fee_sol(&self) -> Option<f64> {
        Some(self.fee_lamports()? as f64 / LAMPORTS_PER_SOL)
    }

    fn result(&self) -> Option<&'a Value> {
        self.0.get("params")?.get("result")
    }

    fn meta(&self) -> Option<&'a Value> {
        self.result()?.get("transaction")?.get("meta")
    }
}
