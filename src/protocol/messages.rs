//! Wire messages for the query protocol
//!
//! Every message is one UTF-8 JSON object terminated by `\n`. Decoding
//! validates required fields and rejects anything else as malformed.

use crate::protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client request: `{"query": "<term>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    /// JSON line sent on the wire
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    /// Parses a request line received by a server
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let request: QueryRequest = serde_json::from_str(line.trim_end())
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        if request.query.is_empty() {
            return Err(ProtocolError::InvalidQuery);
        }
        Ok(request)
    }
}

/// One search hit: a document path or a numeric id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultRef {
    Path(String),
    Id(u64),
}

impl std::fmt::Display for ResultRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultRef::Path(path) => f.write_str(path),
            ResultRef::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Server response: `{"query": "<term>", "results": [...], "count": n}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<ResultRef>,
    pub count: u64,
}

impl QueryResponse {
    /// Builds a response whose count matches its results
    pub fn new(query: impl Into<String>, results: Vec<ResultRef>) -> Self {
        let count = results.len() as u64;
        Self {
            query: query.into(),
            results,
            count,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes and validates a response line
    ///
    /// An `{"error": "..."}` object is reported as [`ProtocolError::Rejected`].
    /// Missing fields, wrong types or a `count` that disagrees with
    /// `results` are [`ProtocolError::Malformed`].
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end();
        if line.is_empty() {
            return Err(ProtocolError::Malformed("empty response".to_string()));
        }

        let value: Value =
            serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if let Some(message) = value.get("error") {
            let message = message
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| message.to_string());
            return Err(ProtocolError::Rejected(message));
        }

        let response: QueryResponse =
            serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if response.count != response.results.len() as u64 {
            return Err(ProtocolError::Malformed(format!(
                "count {} does not match {} results",
                response.count,
                response.results.len()
            )));
        }

        Ok(response)
    }
}

/// Line a server sends back for a request it cannot serve
pub fn error_line(message: &str) -> String {
    let mut line = serde_json::json!({ "error": message }).to_string();
    line.push('\n');
    line
}
