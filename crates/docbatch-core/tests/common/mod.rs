//! Shared helpers for integration tests.
#![allow(dead_code)]

pub mod doc_server;
pub mod scripted_session;
