use serde::{Deserialize, Serialize};

/// Framing header carried by every message on a session.
///
/// The same shape is used in both directions: requests leave `error` empty,
/// responses echo the request's `seq` and either leave `error` empty (the
/// body is the reply value) or set it (the body is a placeholder).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Service-qualified method name, `"Service.Method"`.
    pub service_method: String,
    /// Sequence number assigned by the client and echoed by the server.
    pub seq: u64,
    /// Error text, empty on success.
    pub error: String,
}

impl Header {
    /// Creates a request header for the given method and sequence number.
    pub fn request(service_method: impl Into<String>, seq: u64) -> Self {
        Header {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }
}
