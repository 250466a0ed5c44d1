//! `gscp serve` — run the HTTP API (§6) in the foreground.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;
use crate::http::ApiState;

pub async fn execute(state: Arc<ApiState>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    crate::http::serve(state, addr).await
}
