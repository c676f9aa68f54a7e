pub mod event;
pub mod session;
pub mod status;

pub use event::{EventPayload, LatestResponse, PublishBody, parse_magnitude};
pub use session::{Role, SessionSignal, WsCloseCode};
pub use status::{ChannelStatus, HealthResponse, SessionStatus, StatusResponse};

use serde::{Deserialize, Serialize};

/// Machine-readable error tag returned in 4xx response bodies.
///
/// ```json
/// {"error":"invalid_symbol"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    InvalidSymbol,
    UnknownChannel,
    UnknownSession,
    InvalidRole,
    Unavailable,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorTag,
}

impl From<ErrorTag> for ErrorBody {
    fn from(error: ErrorTag) -> Self {
        Self { error }
    }
}
