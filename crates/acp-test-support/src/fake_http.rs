//! A scripted [`HttpBackend`] for exercising `acp-auth`/`acp-transport`
//! callers without a live access point: responses are queued in order and
//! popped one per call, mirroring the reference workspace's preference for
//! hand-rolled fakes over a mocking framework.

use std::path::Path;

use acp_transport::{HttpBackend, MultipartFile, ProgressCallback, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

pub struct FakeHttpBackend {
    responses: Mutex<Vec<Result<Value, String>>>,
}

impl Default for FakeHttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHttpBackend {
    #[must_use]
    pub fn new() -> Self {
        Self { responses: Mutex::new(Vec::new()) }
    }

    /// Queue a successful `post_json` response (FIFO).
    pub fn push_json(&self, value: Value) {
        self.responses.lock().push(Ok(value));
    }

    /// Queue a failing `post_json` call.
    pub fn push_error(&self, message: impl Into<String>) {
        self.responses.lock().push(Err(message.into()));
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl HttpBackend for FakeHttpBackend {
    async fn post_json(&self, _url: &str, _body: &Value) -> Result<Value, TransportError> {
        let mut queue = self.responses.lock();
        if queue.is_empty() {
            return Err(TransportError::Http("no more scripted responses".to_string()));
        }
        match queue.remove(0) {
            Ok(v) => Ok(v),
            Err(e) => Err(TransportError::Http(e)),
        }
    }

    async fn post_multipart(
        &self,
        _url: &str,
        _fields: &[(String, String)],
        _file: &MultipartFile,
        _on_progress: Option<ProgressCallback>,
    ) -> Result<Value, TransportError> {
        Err(TransportError::Http("FakeHttpBackend does not script multipart".to_string()))
    }

    async fn get(&self, _url: &str) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Http("FakeHttpBackend does not script get".to_string()))
    }

    async fn get_to_file(
        &self,
        _url: &str,
        _dest: &Path,
        _on_progress: Option<ProgressCallback>,
    ) -> Result<(), TransportError> {
        Err(TransportError::Http("FakeHttpBackend does not script get_to_file".to_string()))
    }
}
