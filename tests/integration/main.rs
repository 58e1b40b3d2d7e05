//! Integration tests with mock HTTP server

mod experiment;
mod mock_server;
