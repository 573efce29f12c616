//! JSON convenience surface.
//!
//! Thin callers of the dispatch loop: they set method and body, treat any
//! non-2xx final response as an error, and decode the body for the caller.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{Client, Request};
use crate::error::{ClientError, Result};

impl Client {
    /// GET `target` and decode the JSON response body.
    pub async fn get_json<T: DeserializeOwned>(&self, target: &str) -> Result<T> {
        let request = Request::new(Method::GET, target);
        self.execute_json(request).await
    }

    /// POST `body` as JSON to `target` and decode the JSON response body.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        target: &str,
        body: &B,
    ) -> Result<T> {
        let request = Request::new(Method::POST, target).json(body)?;
        self.execute_json(request).await
    }

    /// POST `body` as JSON to `target`, discarding the response body.
    pub async fn post_json_discard<B: Serialize>(&self, target: &str, body: &B) -> Result<()> {
        let request = Request::new(Method::POST, target).json(body)?;
        let response = self.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus { status });
        }
        // Drain so the connection can be reused.
        let _ = response.bytes().await.map_err(ClientError::Transport)?;
        Ok(())
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus { status });
        }
        let body = response.bytes().await.map_err(ClientError::Transport)?;
        serde_json::from_slice(&body).map_err(ClientError::Decode)
    }
}
