use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSON-RPC invocation (method + positional params).
///
/// Calls are plain data: a load test owns them and never mutates them after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Call {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// JSON-RPC 2.0 request object for this call.
    #[must_use]
    pub fn to_request(&self, id: u64) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": self.method,
            "params": self.params,
        })
    }

    /// Serialized request body, ready to POST.
    #[must_use]
    pub fn request_body(&self, id: u64) -> Vec<u8> {
        // Serializing a `Value` built from strings/numbers cannot fail.
        serde_json::to_vec(&self.to_request(id)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_is_json_rpc_2() {
        let call = Call::new("eth_getBlockByNumber", vec![json!("0x10"), json!(false)]);
        let body: Value = serde_json::from_slice(&call.request_body(3)).unwrap_or_default();

        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 3);
        assert_eq!(body["method"], "eth_getBlockByNumber");
        assert_eq!(body["params"], json!(["0x10", false]));
    }
}
