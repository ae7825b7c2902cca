use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{error::Error, util::is_blank};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(pub u64);

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    Image,
    Video,
    Link,
    Achievement,
    /// Unknown types coming from the backend are shown as text.
    #[default]
    #[serde(other)]
    Text,
}

impl StoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            StoryType::Text => "text",
            StoryType::Image => "image",
            StoryType::Video => "video",
            StoryType::Link => "link",
            StoryType::Achievement => "achievement",
        }
    }
}

/// Story record as served by the feed endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub author: UserId,
    #[serde(default)]
    pub author_username: String,
    #[serde(default)]
    pub author_display_name: Option<String>,
    #[serde(default)]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub story_type: StoryType,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub link_title: Option<String>,
    #[serde(default)]
    pub link_description: Option<String>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub has_viewed: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl Story {
    /// Stories without an expiration time never expire on the client.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn author(&self) -> Author {
        Author {
            id: self.author,
            username: self.author_username.clone(),
            avatar: self.author_avatar.clone(),
            display_name: self.author_display_name.clone(),
        }
    }

    pub fn background_color(&self) -> &str {
        self.background_color
            .as_deref()
            .filter(|c| !is_blank(c))
            .unwrap_or(DEFAULT_BACKGROUND_COLOR)
    }

    pub fn text_color(&self) -> &str {
        self.text_color
            .as_deref()
            .filter(|c| !is_blank(c))
            .unwrap_or(DEFAULT_TEXT_COLOR)
    }
}

pub const DEFAULT_BACKGROUND_COLOR: &str = "#1F2937";
pub const DEFAULT_TEXT_COLOR: &str = "#FFFFFF";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<String>,
    pub display_name: Option<String>,
}

/// Stories of a single author, in feed order.  Never empty while part of a
/// `StoryGroups` collection.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorStoryGroup {
    pub author: Author,
    pub stories: Vec<Story>,
    pub has_viewed: bool,
}

impl AuthorStoryGroup {
    pub fn new(author: Author) -> Self {
        Self {
            author,
            stories: Vec::new(),
            has_viewed: false,
        }
    }

    pub fn contains(&self, id: StoryId) -> bool {
        self.stories.iter().any(|s| s.id == id)
    }

    /// Push `story` unless a story with the same id is already present.
    pub fn push(&mut self, story: Story) -> bool {
        if self.contains(story.id) {
            return false;
        }
        self.stories.push(story);
        self.update_viewed();
        true
    }

    pub fn update_viewed(&mut self) {
        self.has_viewed = !self.stories.is_empty() && self.stories.iter().all(|s| s.has_viewed);
    }
}

/// Identity of the user running the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

impl CurrentUser {
    /// The backend is not consistent about which identity field it fills in,
    /// so both the id and the username are checked.
    pub fn owns(&self, story: &Story) -> bool {
        story.author == self.id
            || (!self.username.is_empty() && story.author_username == self.username)
    }

    pub fn as_author(&self) -> Author {
        Author {
            id: self.id,
            username: self.username.clone(),
            avatar: self.avatar.clone(),
            display_name: self
                .display_name
                .clone()
                .or_else(|| Some(self.username.clone())),
        }
    }
}

/// Payload for creating a story.  Media uploads are not supported, only text,
/// link and achievement stories.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewStory {
    pub story_type: StoryType,
    pub text_content: String,
    pub background_color: String,
    pub text_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_description: Option<String>,
}

impl NewStory {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            story_type: StoryType::Text,
            text_content: content.into(),
            background_color: DEFAULT_BACKGROUND_COLOR.to_owned(),
            text_color: DEFAULT_TEXT_COLOR.to_owned(),
            link_url: None,
            link_title: None,
            link_description: None,
        }
    }

    pub fn link(url: impl Into<String>, title: Option<String>, description: Option<String>) -> Self {
        Self {
            story_type: StoryType::Link,
            link_url: Some(url.into()),
            link_title: title,
            link_description: description,
            ..Self::text(String::new())
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self.story_type {
            StoryType::Text | StoryType::Achievement if self.text_content.trim().is_empty() => {
                Err(Error::InvalidStory("text content is empty".into()))
            }
            StoryType::Link => match self.link_url.as_deref() {
                Some(url) if url::Url::parse(url).is_ok() => Ok(()),
                Some(url) => Err(Error::InvalidStory(format!("invalid link url: {url}"))),
                None => Err(Error::InvalidStory("link url is missing".into())),
            },
            StoryType::Image | StoryType::Video => Err(Error::InvalidStory(format!(
                "{} uploads are not supported",
                self.story_type.as_str()
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn story_deserializes_with_missing_fields() {
        let story: Story = serde_json::from_str(
            r#"{
                "id": 11,
                "author": 4,
                "author_username": "ada",
                "story_type": "link",
                "link_url": "https://startlinker.com",
                "expires_at": "2026-10-17T10:00:00Z",
                "has_viewed": true
            }"#,
        )
        .unwrap();
        assert_eq!(story.id, StoryId(11));
        assert_eq!(story.author, UserId(4));
        assert_eq!(story.story_type, StoryType::Link);
        assert_eq!(story.expires_at, Some(datetime!(2026-10-17 10:00 UTC)));
        assert!(story.has_viewed);
        assert_eq!(story.created_at, None);
        assert_eq!(story.background_color(), DEFAULT_BACKGROUND_COLOR);
    }

    #[test]
    fn unknown_story_type_falls_back_to_text() {
        let story: Story =
            serde_json::from_str(r#"{"id": 1, "author": 2, "story_type": "poll"}"#).unwrap();
        assert_eq!(story.story_type, StoryType::Text);
    }

    #[test]
    fn known_story_types_parse() {
        for (name, expected) in [
            ("\"text\"", StoryType::Text),
            ("\"image\"", StoryType::Image),
            ("\"video\"", StoryType::Video),
            ("\"link\"", StoryType::Link),
            ("\"achievement\"", StoryType::Achievement),
        ] {
            let parsed: StoryType = serde_json::from_str(name).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(serde_json::to_string(&parsed).unwrap(), name);
        }
        assert_eq!(StoryType::default(), StoryType::Text);
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = datetime!(2026-10-16 12:00 UTC);
        let mut story: Story = serde_json::from_str(r#"{"id": 1, "author": 2}"#).unwrap();
        assert!(!story.is_expired(now));
        story.expires_at = Some(now);
        assert!(story.is_expired(now));
        story.expires_at = Some(datetime!(2026-10-16 12:00:01 UTC));
        assert!(!story.is_expired(now));
    }

    #[test]
    fn ownership_matches_id_or_username() {
        let user = CurrentUser {
            id: UserId(1),
            username: "me".into(),
            ..CurrentUser::default()
        };
        let by_id: Story = serde_json::from_str(r#"{"id": 1, "author": 1}"#).unwrap();
        let by_name: Story =
            serde_json::from_str(r#"{"id": 2, "author": 99, "author_username": "me"}"#).unwrap();
        let other: Story =
            serde_json::from_str(r#"{"id": 3, "author": 5, "author_username": "you"}"#).unwrap();
        assert!(user.owns(&by_id));
        assert!(user.owns(&by_name));
        assert!(!user.owns(&other));
    }

    #[test]
    fn empty_username_does_not_match_anonymous_stories() {
        let user = CurrentUser {
            id: UserId(1),
            ..CurrentUser::default()
        };
        let story: Story = serde_json::from_str(r#"{"id": 3, "author": 5}"#).unwrap();
        assert!(!user.owns(&story));
    }

    #[test]
    fn new_story_validation() {
        assert!(NewStory::text("shipping today").validate().is_ok());
        assert!(NewStory::text("   ").validate().is_err());
        assert!(NewStory::link("https://startlinker.com/jobs", None, None)
            .validate()
            .is_ok());
        assert!(NewStory::link("not a url", None, None).validate().is_err());
        let video = NewStory {
            story_type: StoryType::Video,
            ..NewStory::text("clip")
        };
        assert!(video.validate().is_err());
    }

    #[test]
    fn new_story_skips_absent_link_fields() {
        let json = serde_json::to_value(NewStory::text("hello")).unwrap();
        assert_eq!(json["story_type"], "text");
        assert!(json.get("link_url").is_none());
    }
}
