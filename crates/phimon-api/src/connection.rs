// Connection endpoints
//
// The backend holds a single hardware link; these calls open it, close
// it, and report on it.

use serde_json::json;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{ConnectionRequest, ConnectionStatus};

impl ApiClient {
    /// Ask the backend to open its hardware link.
    ///
    /// `POST /connect`
    pub async fn connect(&self, request: &ConnectionRequest) -> Result<ConnectionStatus, Error> {
        let url = self.endpoint(&["connect"])?;
        debug!(server = %request.server_address, port = request.port, "connecting");
        self.post(url, request).await
    }

    /// Close the backend's hardware link.
    ///
    /// `POST /disconnect` with an empty object body.
    pub async fn disconnect(&self) -> Result<(), Error> {
        let url = self.endpoint(&["disconnect"])?;
        debug!("disconnecting");
        self.post_ignore(url, &json!({})).await
    }

    /// Current state of the backend's hardware link. Idempotent.
    ///
    /// `GET /status`
    pub async fn status(&self) -> Result<ConnectionStatus, Error> {
        let url = self.endpoint(&["status"])?;
        self.get(url).await
    }
}
