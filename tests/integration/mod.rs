//! Integration tests against a real bound server

pub mod notify_test;
pub mod ws_test;
