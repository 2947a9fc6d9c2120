//! Chain queries issued by contracts through `query_chain`.
//!
//! A request is decoded into the closed [`QueryRequest`] union and routed by
//! its [`QueryKind`] to the handler registered for that kind. The handler's
//! JSON result is wrapped as `{"ok":{"ok":"<base64 json>"}}`, or
//! `{"ok":{"error":"<msg>"}}` when the handler rejects the query.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::{Binary, Coin, ContractResult, QueryResponse, SystemResult};
use crate::error::HostError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRequest {
    Bank(BankQuery),
    Wasm(WasmQuery),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankQuery {
    AllBalances { address: String },
    Balance { address: String, denom: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmQuery {
    Smart { contract_addr: String, msg: Binary },
    Raw { contract_addr: String, key: Binary },
}

/// The discriminant of a [`QueryRequest`]; handler table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKind {
    Bank,
    Wasm,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Wasm => "wasm",
        }
    }
}

impl QueryRequest {
    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Bank(_) => QueryKind::Bank,
            Self::Wasm(_) => QueryKind::Wasm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllBalancesResponse {
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub amount: Coin,
}

/// Serves one kind of query.
pub trait QueryHandler: Send + Sync {
    /// The request kind this handler is registered under.
    fn kind(&self) -> QueryKind;

    /// Answer a request. `Err` becomes a contract-level error in the envelope.
    fn handle(&self, request: &QueryRequest) -> Result<serde_json::Value, String>;
}

/// Raw query entry point used by the `query_chain` import.
pub trait Querier: Send {
    /// Answer a JSON-encoded `QueryRequest` with a JSON-encoded envelope.
    fn query_raw(&self, request: &[u8], gas_limit: u64) -> Result<Vec<u8>, HostError>;
}

/// Querier that routes requests through a handler table.
pub struct BasicQuerier {
    handlers: BTreeMap<QueryKind, Box<dyn QueryHandler>>,
}

impl Default for BasicQuerier {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicQuerier {
    /// A querier with an empty `BankQuerier` registered.
    pub fn new() -> Self {
        Self::empty().with_handler(BankQuerier::new())
    }

    /// A querier with no handlers; every request is unsupported.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register `handler` under its kind, replacing any previous one.
    pub fn with_handler(mut self, handler: impl QueryHandler + 'static) -> Self {
        self.handlers.insert(handler.kind(), Box::new(handler));
        self
    }

    pub fn supports(&self, kind: QueryKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

impl Querier for BasicQuerier {
    fn query_raw(&self, request: &[u8], gas_limit: u64) -> Result<Vec<u8>, HostError> {
        let value: serde_json::Value = serde_json::from_slice(request)
            .map_err(|e| HostError::InvalidEncoding(format!("query request: {e}")))?;
        let request: QueryRequest = serde_json::from_value(value)
            .map_err(|e| HostError::UnsupportedQuery(e.to_string()))?;

        let kind = request.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| HostError::UnsupportedQuery(kind.as_str().to_string()))?;
        debug!(kind = kind.as_str(), gas_limit, "dispatching chain query");

        let result = match handler.handle(&request) {
            Ok(json) => {
                let bytes = serde_json::to_vec(&json)
                    .map_err(|e| HostError::InvalidEncoding(e.to_string()))?;
                ContractResult::Ok(Binary(bytes))
            }
            Err(msg) => ContractResult::Error(msg),
        };
        let response: QueryResponse = SystemResult::Ok(result);
        serde_json::to_vec(&response).map_err(|e| HostError::InvalidEncoding(e.to_string()))
    }
}

/// Bank handler over an in-memory balance table.
#[derive(Debug, Clone, Default)]
pub struct BankQuerier {
    balances: HashMap<String, Vec<Coin>>,
}

impl BankQuerier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, address: impl Into<String>, coins: Vec<Coin>) -> Self {
        self.update_balance(address, coins);
        self
    }

    /// Replace the balance of `address`, returning the new balance.
    pub fn update_balance(&mut self, address: impl Into<String>, coins: Vec<Coin>) -> &[Coin] {
        let entry = self.balances.entry(address.into()).or_default();
        *entry = coins;
        entry
    }
}

impl QueryHandler for BankQuerier {
    fn kind(&self) -> QueryKind {
        QueryKind::Bank
    }

    fn handle(&self, request: &QueryRequest) -> Result<serde_json::Value, String> {
        let QueryRequest::Bank(query) = request else {
            return Err(format!("bank handler cannot serve {} queries", request.kind().as_str()));
        };
        let response = match query {
            BankQuery::AllBalances { address } => {
                let amount = self.balances.get(address).cloned().unwrap_or_default();
                serde_json::to_value(AllBalancesResponse { amount })
            }
            BankQuery::Balance { address, denom } => {
                let amount = self
                    .balances
                    .get(address)
                    .and_then(|coins| coins.iter().find(|c| &c.denom == denom).cloned())
                    .unwrap_or_else(|| Coin::new(0, denom.clone()));
                serde_json::to_value(BalanceResponse { amount })
            }
        };
        response.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct EchoWasm;

    impl QueryHandler for EchoWasm {
        fn kind(&self) -> QueryKind {
            QueryKind::Wasm
        }

        fn handle(&self, request: &QueryRequest) -> Result<Value, String> {
            match request {
                QueryRequest::Wasm(WasmQuery::Smart { contract_addr, .. }) => {
                    Ok(json!({ "contract": contract_addr }))
                }
                _ => Err("raw queries unsupported".into()),
            }
        }
    }

    fn decode_ok(raw: &[u8]) -> Value {
        let response: QueryResponse = serde_json::from_slice(raw).unwrap();
        match response {
            SystemResult::Ok(ContractResult::Ok(bin)) => serde_json::from_slice(bin.as_slice()).unwrap(),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_all_balances() {
        let querier = BasicQuerier::empty().with_handler(
            BankQuerier::new().with_balance("terra1alice", vec![Coin::new(100, "uluna")]),
        );
        let raw = querier
            .query_raw(br#"{"bank":{"all_balances":{"address":"terra1alice"}}}"#, 1_000)
            .unwrap();
        assert_eq!(
            decode_ok(&raw),
            json!({ "amount": [{ "denom": "uluna", "amount": "100" }] })
        );
    }

    #[test]
    fn test_envelope_is_double_wrapped_base64() {
        let querier = BasicQuerier::new();
        let raw = querier
            .query_raw(br#"{"bank":{"all_balances":{"address":"nobody"}}}"#, 0)
            .unwrap();
        let value: Value = serde_json::from_slice(&raw).unwrap();
        // base64 of {"amount":[]}
        assert_eq!(value, json!({ "ok": { "ok": "eyJhbW91bnQiOltdfQ==" } }));
    }

    #[test]
    fn test_balance_defaults_to_zero() {
        let querier = BasicQuerier::empty().with_handler(
            BankQuerier::new().with_balance("a", vec![Coin::new(5, "uusd")]),
        );
        let raw = querier
            .query_raw(br#"{"bank":{"balance":{"address":"a","denom":"uluna"}}}"#, 0)
            .unwrap();
        assert_eq!(decode_ok(&raw), json!({ "amount": { "denom": "uluna", "amount": "0" } }));

        let raw = querier
            .query_raw(br#"{"bank":{"balance":{"address":"a","denom":"uusd"}}}"#, 0)
            .unwrap();
        assert_eq!(decode_ok(&raw), json!({ "amount": { "denom": "uusd", "amount": "5" } }));
    }

    #[test]
    fn test_update_balance() {
        let mut bank = BankQuerier::new();
        bank.update_balance("a", vec![Coin::new(1, "x")]);
        let now = bank.update_balance("a", vec![Coin::new(2, "y")]).to_vec();
        assert_eq!(now, vec![Coin::new(2, "y")]);
    }

    #[test]
    fn test_malformed_json() {
        let err = BasicQuerier::new().query_raw(b"{not json", 0).unwrap_err();
        assert!(matches!(err, HostError::InvalidEncoding(_)));
    }

    #[test]
    fn test_unknown_discriminant() {
        let querier = BasicQuerier::new();
        let err = querier.query_raw(br#"{"staking":{"validators":{}}}"#, 0).unwrap_err();
        assert!(matches!(err, HostError::UnsupportedQuery(_)));

        let err = querier.query_raw(br#"{"bank":{"supply":{"denom":"x"}}}"#, 0).unwrap_err();
        assert!(matches!(err, HostError::UnsupportedQuery(_)));
    }

    #[test]
    fn test_missing_handler() {
        let req = br#"{"wasm":{"smart":{"contract_addr":"c","msg":"e30="}}}"#;
        let err = BasicQuerier::new().query_raw(req, 0).unwrap_err();
        assert_eq!(err, HostError::UnsupportedQuery("wasm".into()));

        let querier = BasicQuerier::new().with_handler(EchoWasm);
        assert!(querier.supports(QueryKind::Wasm));
        assert_eq!(decode_ok(&querier.query_raw(req, 0).unwrap()), json!({ "contract": "c" }));
    }

    #[test]
    fn test_handler_error_becomes_contract_error() {
        let querier = BasicQuerier::empty().with_handler(EchoWasm);
        let raw = querier
            .query_raw(br#"{"wasm":{"raw":{"contract_addr":"c","key":"AA=="}}}"#, 0)
            .unwrap();
        let value: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value, json!({ "ok": { "error": "raw queries unsupported" } }));
    }
}
