use super::*;

use snafu::Snafu;

/// Stratum share-rejection codes, matching the legacy pool error map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StratumError {
    Internal = 20,
    LowDifficulty = 23,
    Unauthorized = 24,
}

impl Display for StratumError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Internal => "Internal error",
            Self::LowDifficulty => "Low difficulty share",
            Self::Unauthorized => "Unauthorized worker",
        };
        write!(f, "{message}")
    }
}

impl StratumError {
    pub fn into_response(self) -> JsonRpcError {
        JsonRpcError {
            error_code: self as i32,
            message: self.to_string(),
            traceback: None,
        }
    }
}

/// Wire form of a Stratum error: the `[code, message, traceback]` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    pub error_code: i32,
    pub message: String,
    pub traceback: Option<Value>,
}

impl Serialize for JsonRpcError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.error_code, &self.message, &self.traceback).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonRpcError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (error_code, message, traceback) =
            <(i32, String, Option<Value>)>::deserialize(deserializer)?;

        Ok(JsonRpcError {
            error_code,
            message,
            traceback,
        })
    }
}

impl Display for JsonRpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)
    }
}

/// Failures below the wire: malformed hex, bad lengths, values that do not
/// parse. These never reach a client verbatim; the session layer maps them to
/// a `StratumError`.
#[derive(Debug, Snafu)]
pub enum InternalError {
    #[snafu(display("Failed to parse hex string: {source}"))]
    HexParse { source: hex::FromHexError },

    #[snafu(display("Invalid length: expected {expected}, got {actual}"))]
    InvalidLength { expected: usize, actual: usize },

    #[snafu(display("Invalid value: {reason}"))]
    InvalidValue { reason: String },

    #[snafu(display("Parse error: {message}"))]
    Parse { message: String },
}
