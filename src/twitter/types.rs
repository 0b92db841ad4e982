use crate::engine::failure::UpstreamError;
use crate::store::types::{Follower, FollowerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream `created_at` layout, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const PROFILE_CREATED_AT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Position in the follower-id feed. Opaque to callers; `START` requests the
/// first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(i64);

impl Cursor {
    pub const START: Cursor = Cursor(-1);

    pub fn value(self) -> i64 {
        self.0
    }

    /// Upstream reports the end of the feed as `next_cursor = 0`.
    pub fn from_next(raw: i64) -> Option<Cursor> {
        (raw != 0).then_some(Cursor(raw))
    }
}

/// One page of the follower-id feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPage {
    pub ids: Vec<FollowerId>,
    /// `None` once the feed is exhausted.
    pub next: Option<Cursor>,
}

#[derive(Debug, Deserialize)]
pub struct IdsResponse {
    #[serde(default)]
    pub ids: Vec<FollowerId>,
    #[serde(default)]
    pub next_cursor: i64,
}

impl From<IdsResponse> for IdPage {
    fn from(resp: IdsResponse) -> Self {
        IdPage {
            ids: resp.ids,
            next: Cursor::from_next(resp.next_cursor),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub followers_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct UserObject {
    pub id: FollowerId,
    pub name: String,
    pub created_at: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub friends_count: i64,
    #[serde(default)]
    pub verified: bool,
}

impl UserObject {
    pub fn into_follower(self) -> Result<Follower, UpstreamError> {
        let created_at = DateTime::parse_from_str(&self.created_at, PROFILE_CREATED_AT)
            .map_err(|e| {
                UpstreamError::other(format!(
                    "bad created_at {:?} for user {}: {}",
                    self.created_at, self.id, e
                ))
            })?
            .with_timezone(&Utc);
        Ok(Follower {
            id: self.id,
            name: self.name,
            created_at,
            description: self.description.unwrap_or_default(),
            followers_count: self.followers_count,
            friends_count: self.friends_count,
            verified: self.verified,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DirectMessageRequest {
    pub event: DirectMessageEvent,
}

#[derive(Debug, Serialize)]
pub struct DirectMessageEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub message_create: MessageCreate,
}

#[derive(Debug, Serialize)]
pub struct MessageCreate {
    pub target: MessageTarget,
    pub message_data: MessageData,
}

#[derive(Debug, Serialize)]
pub struct MessageTarget {
    pub recipient_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessageData {
    pub text: String,
}

impl DirectMessageRequest {
    pub fn new(recipient: FollowerId, text: &str) -> Self {
        Self {
            event: DirectMessageEvent {
                event_type: "message_create",
                message_create: MessageCreate {
                    target: MessageTarget {
                        recipient_id: recipient.to_string(),
                    },
                    message_data: MessageData {
                        text: text.to_string(),
                    },
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_user_object_into_follower() {
        let json = r#"{
            "id": 6253282,
            "name": "Twitter API",
            "screen_name": "TwitterAPI",
            "created_at": "Wed May 23 06:01:13 +0000 2007",
            "description": null,
            "followers_count": 6133636,
            "friends_count": 12,
            "verified": true
        }"#;
        let user: UserObject = serde_json::from_str(json).unwrap();
        let follower = user.into_follower().unwrap();
        assert_eq!(follower.id, 6253282);
        assert_eq!(follower.description, "");
        assert!(follower.verified);
        assert_eq!(
            follower.created_at,
            Utc.with_ymd_and_hms(2007, 5, 23, 6, 1, 13).unwrap()
        );
    }

    #[test]
    fn test_bad_created_at_is_transient() {
        let user = UserObject {
            id: 1,
            name: "x".to_string(),
            created_at: "2007-05-23".to_string(),
            description: None,
            followers_count: 0,
            friends_count: 0,
            verified: false,
        };
        assert!(matches!(user.into_follower(), Err(UpstreamError::TransientOther(_))));
    }

    #[test]
    fn test_zero_next_cursor_ends_feed() {
        let page: IdPage = serde_json::from_str::<IdsResponse>(r#"{"ids":[1,2],"next_cursor":0}"#)
            .unwrap()
            .into();
        assert_eq!(page.ids, vec![1, 2]);
        assert!(page.next.is_none());

        let body = r#"{"ids":[3],"next_cursor":1374004777531007833}"#;
        let page: IdPage = serde_json::from_str::<IdsResponse>(body).unwrap().into();
        assert_eq!(page.next.map(Cursor::value), Some(1374004777531007833));
    }

    #[test]
    fn test_direct_message_body_shape() {
        let body = serde_json::to_value(DirectMessageRequest::new(99, "hi")).unwrap();
        assert_eq!(body["event"]["type"], "message_create");
        assert_eq!(body["event"]["message_create"]["target"]["recipient_id"], "99");
        assert_eq!(body["event"]["message_create"]["message_data"]["text"], "hi");
    }
}
