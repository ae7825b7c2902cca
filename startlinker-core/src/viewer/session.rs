use crate::model::{Author, AuthorStoryGroup, Story, StoryId, UserId};

/// Identity of the story group being played.  The user's own stories always
/// come before every other author.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Group {
    Mine,
    Other(UserId),
}

/// State of an open story viewer.  `index` always points into `stories`.
#[derive(Clone, Debug)]
pub struct PlaybackSession {
    group: Group,
    author: Author,
    stories: Vec<Story>,
    index: usize,
    progress: f64,
}

impl PlaybackSession {
    /// Returns `None` if `index` is out of range of the group's stories.
    pub(crate) fn new(group: Group, snapshot: AuthorStoryGroup, index: usize) -> Option<Self> {
        if index >= snapshot.stories.len() {
            return None;
        }
        Some(Self {
            group,
            author: snapshot.author,
            stories: snapshot.stories,
            index,
            progress: 0.0,
        })
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Progress of the current story, in the 0..=100 range.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn current(&self) -> &Story {
        &self.stories[self.index]
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.stories.len()
    }

    pub(crate) fn seek(&mut self, index: usize) {
        debug_assert!(index < self.stories.len());
        self.index = index.min(self.stories.len() - 1);
        self.progress = 0.0;
    }

    /// Advance the progress by `increment` percent.  Returns true once the
    /// story has been shown for its full duration.
    pub(crate) fn advance(&mut self, increment: f64) -> bool {
        self.progress = (self.progress + increment).min(100.0);
        self.progress >= 100.0
    }

    /// Flag the current story as viewed, returning its id if it was not
    /// viewed before.
    pub(crate) fn view_current(&mut self) -> Option<StoryId> {
        let story = &mut self.stories[self.index];
        if story.has_viewed {
            None
        } else {
            story.has_viewed = true;
            Some(story.id)
        }
    }
}
