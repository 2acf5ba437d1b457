//! Property-based tests

#[cfg(feature = "ssr")]
pub mod registry_proptest;
pub mod reconnect_proptest;
