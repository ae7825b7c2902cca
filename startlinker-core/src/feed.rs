use time::OffsetDateTime;

use crate::model::{AuthorStoryGroup, CurrentUser, Story, StoryId, UserId};

/// One page of the story feed.  `next` is the opaque URL of the following
/// page, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedPage {
    pub stories: Vec<Story>,
    pub next: Option<String>,
}

/// Other authors' story groups, keyed by author id, in the order the authors
/// first appeared in the feed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoryGroups {
    groups: Vec<AuthorStoryGroup>,
}

impl StoryGroups {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, author: UserId) -> Option<&AuthorStoryGroup> {
        self.groups.iter().find(|g| g.author.id == author)
    }

    pub fn get_index(&self, index: usize) -> Option<&AuthorStoryGroup> {
        self.groups.get(index)
    }

    pub fn position(&self, author: UserId) -> Option<usize> {
        self.groups.iter().position(|g| g.author.id == author)
    }

    pub fn contains(&self, author: UserId) -> bool {
        self.position(author).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthorStoryGroup> {
        self.groups.iter()
    }

    pub fn authors(&self) -> impl Iterator<Item = UserId> + '_ {
        self.groups.iter().map(|g| g.author.id)
    }

    /// Append `story` to its author's group, creating the group at the end if
    /// the author is new.  Duplicate story ids are ignored.
    pub fn push_story(&mut self, story: Story) {
        match self.groups.iter_mut().find(|g| g.author.id == story.author) {
            Some(group) => {
                group.push(story);
            }
            None => {
                let mut group = AuthorStoryGroup::new(story.author());
                group.push(story);
                self.groups.push(group);
            }
        }
    }

    /// Additively merge `other` into `self`.  Known authors keep their place
    /// and gain the stories they did not have yet, new authors are appended.
    pub fn merge(&mut self, other: StoryGroups) {
        for group in other.groups {
            for story in group.stories {
                self.push_story(story);
            }
        }
    }

    pub fn remove(&mut self, author: UserId) -> Option<AuthorStoryGroup> {
        let index = self.position(author)?;
        Some(self.groups.remove(index))
    }

    pub fn mark_viewed(&mut self, id: StoryId) -> bool {
        for group in &mut self.groups {
            if let Some(story) = group.stories.iter_mut().find(|s| s.id == id) {
                story.has_viewed = true;
                group.update_viewed();
                return true;
            }
        }
        false
    }
}

/// Result of splitting a list of stories by ownership.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Partition {
    /// Stories that survived the expiry filter, in feed order.
    pub active: Vec<Story>,
    pub mine: Vec<Story>,
    pub others: StoryGroups,
}

/// Drop stories that expired at or before `now`, then split the rest into the
/// user's own stories and other authors' groups.
pub fn partition(stories: Vec<Story>, user: &CurrentUser, now: OffsetDateTime) -> Partition {
    let total = stories.len();
    let mut partition = Partition::default();
    for story in stories {
        if story.is_expired(now) {
            log::debug!(
                "dropping expired story {} from {}",
                story.id,
                story.author_username
            );
            continue;
        }
        if user.owns(&story) {
            partition.mine.push(story.clone());
        } else {
            partition.others.push_story(story.clone());
        }
        partition.active.push(story);
    }
    log::debug!(
        "partitioned {} stories: {} active, {} mine, {} authors",
        total,
        partition.active.len(),
        partition.mine.len(),
        partition.others.len()
    );
    partition
}

/// Client-side view of the story feed.
#[derive(Clone, Debug)]
pub struct StoryFeed {
    stories: Vec<Story>,
    my_stories: Vec<Story>,
    groups: StoryGroups,
    next_page: Option<String>,
    has_more: bool,
}

impl Default for StoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryFeed {
    pub fn new() -> Self {
        Self {
            stories: Vec::new(),
            my_stories: Vec::new(),
            groups: StoryGroups::new(),
            next_page: None,
            has_more: true,
        }
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn my_stories(&self) -> &[Story] {
        &self.my_stories
    }

    pub fn groups(&self) -> &StoryGroups {
        &self.groups
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Replace the whole feed with the first page of a fresh fetch.
    pub fn replace(&mut self, page: FeedPage, user: &CurrentUser, now: OffsetDateTime) {
        let Partition {
            active,
            mine,
            others,
        } = partition(page.stories, user, now);
        self.stories = active;
        self.my_stories = mine;
        self.groups = others;
        self.set_next(page.next);
    }

    /// Merge a follow-up page into the feed without discarding anything that
    /// is already loaded.
    pub fn merge(&mut self, page: FeedPage, user: &CurrentUser, now: OffsetDateTime) {
        let Partition {
            active,
            mine,
            others,
        } = partition(page.stories, user, now);
        for story in active {
            if !self.stories.iter().any(|s| s.id == story.id) {
                self.stories.push(story);
            }
        }
        for story in mine {
            if !self.my_stories.iter().any(|s| s.id == story.id) {
                self.my_stories.push(story);
            }
        }
        self.groups.merge(others);
        self.set_next(page.next);
    }

    /// Stop paginating after a failed fetch.  Loaded stories are kept.
    pub fn fail(&mut self) {
        self.set_next(None);
    }

    /// Remove every story of `author`.  Returns true if anything was removed.
    pub fn remove_author(&mut self, author: UserId) -> bool {
        let before = self.stories.len();
        self.stories.retain(|s| s.author != author);
        let removed_group = self.groups.remove(author).is_some();
        removed_group || before != self.stories.len()
    }

    pub fn mark_viewed(&mut self, id: StoryId) {
        for story in self
            .stories
            .iter_mut()
            .chain(self.my_stories.iter_mut())
            .filter(|s| s.id == id)
        {
            story.has_viewed = true;
        }
        self.groups.mark_viewed(id);
    }

    /// The user's own stories as a group, or `None` if there are none.
    pub fn my_group(&self, user: &CurrentUser) -> Option<AuthorStoryGroup> {
        if self.my_stories.is_empty() {
            return None;
        }
        Some(AuthorStoryGroup {
            author: user.as_author(),
            stories: self.my_stories.clone(),
            has_viewed: true,
        })
    }

    fn set_next(&mut self, next: Option<String>) {
        self.has_more = next.is_some();
        self.next_page = next;
    }
}
