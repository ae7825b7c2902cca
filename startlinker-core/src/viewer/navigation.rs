use crate::feed::StoryFeed;

use super::session::{Group, PlaybackSession};

/// Outcome of a navigation request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Move to another story of the current group.
    Seek(usize),
    /// Switch to story `index` of another group.
    Enter { group: Group, index: usize },
    /// Nothing left to play.
    Close,
    /// Nowhere to go, keep the current story.
    Stay,
}

pub fn next(session: &PlaybackSession, feed: &StoryFeed) -> Step {
    if !session.is_last() {
        return Step::Seek(session.index() + 1);
    }
    let groups = feed.groups();
    let following = match session.group() {
        Group::Mine => 0,
        // An author that is no longer in the feed (e.g. unfollowed while
        // playing) hands over to the first group.
        Group::Other(author) => groups.position(author).map_or(0, |p| p + 1),
    };
    match groups.get_index(following) {
        Some(group) => Step::Enter {
            group: Group::Other(group.author.id),
            index: 0,
        },
        None => Step::Close,
    }
}

pub fn previous(session: &PlaybackSession, feed: &StoryFeed) -> Step {
    if !session.is_first() {
        return Step::Seek(session.index() - 1);
    }
    let author = match session.group() {
        Group::Mine => return Step::Stay,
        Group::Other(author) => author,
    };
    let groups = feed.groups();
    match groups.position(author) {
        Some(position) if position > 0 => match groups.get_index(position - 1) {
            Some(group) => Step::Enter {
                group: Group::Other(group.author.id),
                index: group.stories.len() - 1,
            },
            None => Step::Stay,
        },
        _ if !feed.my_stories().is_empty() => Step::Enter {
            group: Group::Mine,
            index: feed.my_stories().len() - 1,
        },
        _ => Step::Stay,
    }
}
