//! Connection endpoint seam.
//!
//! The relay writes through this trait only. It never opens or closes the
//! underlying connection; that belongs to whoever created the endpoint.

use async_trait::async_trait;
use bytes::Bytes;

use wsrelay_core::error::Result;
use wsrelay_core::protocol::FrameKind;

use crate::client::WriteScope;

#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Write one complete frame.
    ///
    /// Implementations should return promptly once `scope` ends. Its token is
    /// cancelled at the deadline as well as on parent cancellation, and
    /// [`WriteScope::error`] maps the end to the error to report. Callers also
    /// race the returned future against the scope, so an endpoint that ignores
    /// it is still bounded.
    async fn write(&self, scope: &WriteScope, kind: FrameKind, payload: Bytes) -> Result<()>;
}
