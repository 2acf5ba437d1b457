//! Authentication test helpers

#[cfg(feature = "ssr")]
use roomchat::backend::auth::JwtValidator;
#[cfg(feature = "ssr")]
use uuid::Uuid;

/// Secret shared by every test server
pub const TEST_SECRET: &str = "integration-test-secret";

/// Validator matching `TEST_SECRET`
#[cfg(feature = "ssr")]
pub fn test_validator() -> JwtValidator {
    JwtValidator::new(TEST_SECRET)
}

/// A valid session token for `user_id`
#[cfg(feature = "ssr")]
pub fn token_for(user_id: Uuid) -> String {
    test_validator()
        .issue(user_id, None)
        .expect("Failed to create test token")
}

/// A service-scoped token, as the persistence side would hold
#[cfg(feature = "ssr")]
pub fn service_token() -> String {
    test_validator()
        .issue_service(Uuid::new_v4())
        .expect("Failed to create service token")
}
