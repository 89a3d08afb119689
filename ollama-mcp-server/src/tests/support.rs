//! Shared helpers: mock Ollama daemon and a recording tool context.

use std::sync::Mutex;

use axum::Router;

use crate::ollama::ToolContext;

/// Serve `app` on an ephemeral loopback port and return its base URL.
pub async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on.
pub async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// [`ToolContext`] that records notifications instead of sending them.
#[derive(Default)]
pub struct RecordingContext {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingContext {
    pub fn infos(&self) -> Vec<String> {
        self.by_level("info")
    }

    pub fn errors(&self) -> Vec<String> {
        self.by_level("error")
    }

    fn by_level(&self, level: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl ToolContext for RecordingContext {
    fn info(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("info".to_string(), message.to_string()));
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(("error".to_string(), message.to_string()));
    }
}
