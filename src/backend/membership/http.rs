//! HTTP Membership Provider
//!
//! Fetches `GET {base_url}/chatrooms/{chatroom_id}/members` from the chat
//! REST service. The body is either a bare JSON array of user IDs or an
//! object with a `member_ids` array.
//!
//! The chatroom ID is pushed as a single percent-encoded path segment, so an
//! ID containing `/`, `?` or `#` cannot address a different resource.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use uuid::Uuid;

use super::{MembershipError, MembershipProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
#[serde(untagged)]
enum MembersResponse {
    Ids(Vec<Uuid>),
    Wrapped { member_ids: Vec<Uuid> },
}

impl MembersResponse {
    fn into_ids(self) -> Vec<Uuid> {
        match self {
            Self::Ids(ids) | Self::Wrapped { member_ids: ids } => ids,
        }
    }
}

/// Membership looked up from the chat REST service
#[derive(Debug, Clone)]
pub struct HttpMembership {
    base_url: Url,
    client: Client,
}

impl HttpMembership {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, MembershipError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MembershipError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self, MembershipError> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| MembershipError::Unavailable(format!("Invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MembershipError::Unavailable(format!("Invalid base URL: {}", base_url)));
        }
        Ok(Self { base_url, client })
    }

    fn members_url(&self, chatroom_id: &str) -> Result<Url, MembershipError> {
        // dot segments would be dropped rather than encoded
        if matches!(chatroom_id, "" | "." | "..") {
            return Err(MembershipError::RoomNotFound(chatroom_id.to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MembershipError::Unavailable(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["chatrooms", chatroom_id, "members"]);
        Ok(url)
    }
}

#[async_trait]
impl MembershipProvider for HttpMembership {
    async fn room_member_ids(&self, chatroom_id: &str) -> Result<Vec<Uuid>, MembershipError> {
        let response = self
            .client
            .get(self.members_url(chatroom_id)?)
            .send()
            .await
            .map_err(|e| MembershipError::Unavailable(format!("Network error: {}", e)))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(MembershipError::RoomNotFound(chatroom_id.to_string())),
            status => {
                tracing::warn!(
                    chatroom_id = %chatroom_id,
                    status = %status,
                    "[Membership] Member lookup failed"
                );
                return Err(MembershipError::Unavailable(format!("Request failed: {}", status)));
            }
        }

        let body = response
            .json::<MembersResponse>()
            .await
            .map_err(|e| MembershipError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        Ok(body.into_ids())
    }
}
