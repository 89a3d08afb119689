//! Integration tests for the Ollama MCP adapter
//!
//! Each test spins up a mock Ollama daemon on an ephemeral port and
//! drives the client or dispatcher against it. No live Ollama install
//! is required.

pub mod support;
