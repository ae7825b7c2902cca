pub mod input;
pub mod navigation;
pub mod session;
mod timer;
mod tracker;

use std::{thread, time::Duration};

use crossbeam_channel::{unbounded, Receiver, Sender};
use time::OffsetDateTime;

use crate::{
    error::Error,
    feed::{FeedPage, StoryFeed},
    follow::{FollowAction, FollowBus, FollowStateChanged, Subscription},
    model::{Author, CurrentUser, NewStory, Story, UserId},
    util::send_after,
    webapi::BackendHandle,
};

use self::{
    input::{InputEvent, Navigation},
    navigation::Step,
    session::{Group, PlaybackSession},
    timer::IntervalTimer,
    tracker::ViewTracker,
};

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    /// How long a single story is shown before advancing.
    pub story_duration: Duration,
    /// How often the progress of the current story is updated.
    pub tick_interval: Duration,
    /// Delay before re-fetching the feed after a follow-state change, so the
    /// backend has caught up.
    pub follow_refresh_delay: Duration,
    /// How often the feed is re-fetched to drop expired stories.
    pub expiry_check_interval: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            story_duration: Duration::from_millis(5000),
            tick_interval: Duration::from_millis(50),
            follow_refresh_delay: Duration::from_millis(500),
            expiry_check_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl ViewerConfig {
    fn progress_increment(&self) -> f64 {
        let duration = self.story_duration.as_millis() as f64;
        if duration <= 0.0 {
            return 100.0;
        }
        100.0 * self.tick_interval.as_millis() as f64 / duration
    }
}

/// A story ring as shown in the stories bar.
#[derive(Clone, Debug, PartialEq)]
pub struct Ring {
    pub group: Group,
    pub author: Author,
    pub count: usize,
    pub has_viewed: bool,
}

/// Drives the story feed and the story viewer.  All state changes happen in
/// `handle`, which is fed from `receiver()`; background work (network,
/// timers) reports back through the same channel.
pub struct StoryViewer {
    user: CurrentUser,
    backend: BackendHandle,
    config: ViewerConfig,
    feed: StoryFeed,
    session: Option<PlaybackSession>,
    progress_timer: Option<IntervalTimer>,
    expiry_timer: Option<IntervalTimer>,
    tracker: ViewTracker,
    follow_subscription: Option<Subscription>,
    tick_generation: u64,
    refresh_generation: u64,
    refreshing: bool,
    loading_more: bool,
    sender: Sender<ViewerEvent>,
    receiver: Receiver<ViewerEvent>,
}

impl StoryViewer {
    pub fn new(user: CurrentUser, backend: BackendHandle, config: ViewerConfig) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            tracker: ViewTracker::new(backend.clone()),
            user,
            backend,
            config,
            feed: StoryFeed::new(),
            session: None,
            progress_timer: None,
            expiry_timer: None,
            follow_subscription: None,
            tick_generation: 0,
            refresh_generation: 0,
            refreshing: false,
            loading_more: false,
            sender,
            receiver,
        }
    }

    pub fn sender(&self) -> Sender<ViewerEvent> {
        self.sender.clone()
    }

    pub fn receiver(&self) -> Receiver<ViewerEvent> {
        self.receiver.clone()
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub fn feed(&self) -> &StoryFeed {
        &self.feed
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    /// Load the feed and keep re-loading it periodically so that expired
    /// stories disappear.
    pub fn start(&mut self) {
        self.refresh();
        self.expiry_timer = Some(IntervalTimer::start(
            "story-expiry",
            self.config.expiry_check_interval,
            self.sender.clone(),
            || ViewerEvent::Command(ViewerCommand::Refresh),
        ));
    }

    /// React to follow-state changes published on `bus` for as long as this
    /// viewer lives.
    pub fn subscribe_follows(&mut self, bus: &FollowBus) {
        self.follow_subscription = Some(bus.subscribe(
            self.sender.clone(),
            ViewerEvent::FollowStateChanged,
        ));
    }

    /// Rings in playback order, the user's own stories first.
    pub fn rings(&self) -> Vec<Ring> {
        let mine = self.feed.my_group(&self.user).map(|group| Ring {
            group: Group::Mine,
            count: group.stories.len(),
            has_viewed: group.has_viewed,
            author: group.author,
        });
        let others = self.feed.groups().iter().map(|group| Ring {
            group: Group::Other(group.author.id),
            author: group.author.clone(),
            count: group.stories.len(),
            has_viewed: group.has_viewed,
        });
        mine.into_iter().chain(others).collect()
    }

    pub fn handle(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::Command(cmd) => {
                self.handle_command(cmd);
            }
            ViewerEvent::Tick { generation } => {
                self.handle_tick(generation);
            }
            ViewerEvent::FeedLoaded { request, result } => {
                self.handle_feed_loaded(request, result);
            }
            ViewerEvent::StoryCreated { result } => {
                self.handle_story_created(result);
            }
            ViewerEvent::FollowStateChanged(change) => {
                self.handle_follow_change(change);
            }
            ViewerEvent::FeedUpdated { .. }
            | ViewerEvent::Opened { .. }
            | ViewerEvent::Showing { .. }
            | ViewerEvent::Closed => {}
        }
    }

    fn handle_command(&mut self, cmd: ViewerCommand) {
        match cmd {
            ViewerCommand::Refresh => self.refresh(),
            ViewerCommand::LoadMore => self.load_more(),
            ViewerCommand::ListRings => self.notify_feed(),
            ViewerCommand::OpenMine { index } => self.open(Group::Mine, index),
            ViewerCommand::OpenGroup { author, index } => self.open(Group::Other(author), index),
            ViewerCommand::OpenRing { position } => match self.rings().get(position) {
                Some(ring) => self.open(ring.group, 0),
                None => log::warn!("no story ring at position {}", position),
            },
            ViewerCommand::Next => self.next_story(),
            ViewerCommand::Previous => self.prev_story(),
            ViewerCommand::Close => self.close(),
            ViewerCommand::Input(input) => self.handle_input(input),
            ViewerCommand::CreateStory { story } => self.create_story(story),
        }
    }

    fn handle_tick(&mut self, generation: u64) {
        if generation != self.tick_generation {
            log::trace!("stale progress tick received, ignoring");
            return;
        }
        let increment = self.config.progress_increment();
        let finished = match self.session.as_mut() {
            Some(session) => session.advance(increment),
            None => return,
        };
        if finished {
            self.next_story();
        }
    }

    fn handle_input(&mut self, input: InputEvent) {
        if self.session.is_none() {
            log::debug!("viewer is closed, ignoring {:?}", input);
            return;
        }
        match input.navigation() {
            Some(Navigation::Previous) => self.prev_story(),
            Some(Navigation::Next) => self.next_story(),
            Some(Navigation::Close) => self.close(),
            None => {}
        }
    }

    fn open(&mut self, group: Group, index: usize) {
        let snapshot = match group {
            Group::Mine => self.feed.my_group(&self.user),
            Group::Other(author) => self.feed.groups().get(author).cloned(),
        };
        let Some(session) = snapshot.and_then(|s| PlaybackSession::new(group, s, index)) else {
            log::warn!("nothing to play in {:?} at {}", group, index);
            return;
        };
        log::info!(
            "viewing stories of {} from {}",
            session.author().username,
            index
        );
        self.notify(ViewerEvent::Opened {
            group,
            author: session.author().clone(),
            count: session.stories().len(),
        });
        self.session = Some(session);
        self.show_current();
    }

    fn next_story(&mut self) {
        if let Some(session) = &self.session {
            let step = navigation::next(session, &self.feed);
            self.apply(step);
        }
    }

    fn prev_story(&mut self) {
        if let Some(session) = &self.session {
            let step = navigation::previous(session, &self.feed);
            self.apply(step);
        }
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Seek(index) => {
                if let Some(session) = self.session.as_mut() {
                    session.seek(index);
                }
                self.show_current();
            }
            Step::Enter { group, index } => self.open(group, index),
            Step::Close => self.close(),
            Step::Stay => {}
        }
    }

    /// Restart the progress timer for the current story and report it as
    /// viewed.
    fn show_current(&mut self) {
        self.restart_timer();
        let event = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if let Some(id) = session.view_current() {
                self.tracker.track(id);
                self.feed.mark_viewed(id);
            }
            ViewerEvent::Showing {
                story: session.current().clone(),
                index: session.index(),
                count: session.stories().len(),
            }
        };
        self.notify(event);
    }

    fn restart_timer(&mut self) {
        // The previous timer has to be gone before the next one starts.
        drop(self.progress_timer.take());
        self.tick_generation += 1;
        let generation = self.tick_generation;
        self.progress_timer = Some(IntervalTimer::start(
            "story-progress",
            self.config.tick_interval,
            self.sender.clone(),
            move || ViewerEvent::Tick { generation },
        ));
    }

    fn close(&mut self) {
        drop(self.progress_timer.take());
        if self.session.take().is_some() {
            log::info!("closing story viewer");
            self.notify(ViewerEvent::Closed);
        }
    }

    fn refresh(&mut self) {
        self.refresh_generation += 1;
        self.refreshing = true;
        self.load_in_background(
            FeedRequest::Refresh {
                generation: self.refresh_generation,
            },
            None,
        );
    }

    fn load_more(&mut self) {
        if self.loading_more || self.refreshing || !self.feed.has_more() {
            return;
        }
        let Some(next) = self.feed.next_page().map(str::to_owned) else {
            log::debug!("no more stories to load");
            return;
        };
        self.loading_more = true;
        self.load_in_background(
            FeedRequest::More {
                after: self.refresh_generation,
            },
            Some(next),
        );
    }

    fn load_in_background(&self, request: FeedRequest, page: Option<String>) {
        thread::spawn({
            let backend = self.backend.clone();
            let sender = self.sender.clone();
            move || {
                let result = backend.load_feed(page.as_deref());
                let _ = sender.send(ViewerEvent::FeedLoaded { request, result });
            }
        });
    }

    fn handle_feed_loaded(&mut self, request: FeedRequest, result: Result<FeedPage, Error>) {
        let now = OffsetDateTime::now_utc();
        match request {
            FeedRequest::Refresh { generation } => {
                if generation != self.refresh_generation {
                    log::info!("stale feed refresh received, ignoring");
                    return;
                }
                self.refreshing = false;
                match result {
                    Ok(page) => self.feed.replace(page, &self.user, now),
                    Err(err) => {
                        log::error!("failed to load stories: {}", err);
                        self.feed.fail();
                    }
                }
            }
            FeedRequest::More { after } => {
                self.loading_more = false;
                match result {
                    Ok(mut page) => {
                        if after != self.refresh_generation {
                            // The feed was reloaded meanwhile, only its own
                            // pagination cursor is current.
                            page.next = self.feed.next_page().map(str::to_owned);
                        }
                        log::info!("loaded {} more stories", page.stories.len());
                        self.feed.merge(page, &self.user, now);
                    }
                    Err(err) => {
                        log::error!("failed to load more stories: {}", err);
                        self.feed.fail();
                    }
                }
            }
        }
        self.notify_feed();
    }

    fn handle_follow_change(&mut self, change: FollowStateChanged) {
        match change.action {
            FollowAction::Follow => {
                log::info!("followed {}, refreshing stories", change.user_id);
            }
            FollowAction::Unfollow => {
                log::info!("unfollowed {}, removing their stories", change.user_id);
                if self.feed.remove_author(change.user_id) {
                    self.notify_feed();
                }
            }
        }
        send_after(
            self.config.follow_refresh_delay,
            self.sender.clone(),
            ViewerEvent::Command(ViewerCommand::Refresh),
        );
    }

    fn create_story(&mut self, story: NewStory) {
        if let Err(err) = story.validate() {
            log::error!("not creating story: {}", err);
            return;
        }
        thread::spawn({
            let backend = self.backend.clone();
            let sender = self.sender.clone();
            move || {
                let result = backend.create_story(&story);
                let _ = sender.send(ViewerEvent::StoryCreated { result });
            }
        });
    }

    fn handle_story_created(&mut self, result: Result<Story, Error>) {
        match result {
            Ok(story) => {
                log::info!("created story {}", story.id);
                self.refresh();
            }
            Err(err) => {
                log::error!("failed to create story: {}", err);
            }
        }
    }

    fn notify_feed(&self) {
        self.notify(ViewerEvent::FeedUpdated {
            rings: self.rings(),
            has_more: self.feed.has_more(),
        });
    }

    fn notify(&self, event: ViewerEvent) {
        // We hold the receiver ourselves, sending cannot fail.
        let _ = self.sender.send(event);
    }
}

#[derive(Debug, PartialEq)]
pub enum ViewerCommand {
    /// Re-fetch the first feed page, replacing the loaded feed.
    Refresh,
    /// Fetch the next feed page, if there is one.
    LoadMore,
    /// Emit a `FeedUpdated` event with the current rings.
    ListRings,
    OpenMine {
        index: usize,
    },
    OpenGroup {
        author: UserId,
        index: usize,
    },
    /// Open the ring at `position` of `StoryViewer::rings`.
    OpenRing {
        position: usize,
    },
    Next,
    Previous,
    Close,
    Input(InputEvent),
    CreateStory {
        story: NewStory,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FeedRequest {
    Refresh { generation: u64 },
    /// Follow-up page requested while refresh `after` was current.
    More { after: u64 },
}

pub enum ViewerEvent {
    Command(ViewerCommand),
    /// Progress timer fired.  Ticks of replaced timers are ignored.
    Tick {
        generation: u64,
    },
    /// Feed page loading either succeeded or failed.  `FeedUpdated` follows.
    FeedLoaded {
        request: FeedRequest,
        result: Result<FeedPage, Error>,
    },
    StoryCreated {
        result: Result<Story, Error>,
    },
    FollowStateChanged(FollowStateChanged),
    /// Feed content has changed.
    FeedUpdated {
        rings: Vec<Ring>,
        has_more: bool,
    },
    /// Viewer has been opened on a group.  `Showing` follows.
    Opened {
        group: Group,
        author: Author,
        count: usize,
    },
    /// A story is on screen, its progress starts from zero.
    Showing {
        story: Story,
        index: usize,
        count: usize,
    },
    /// Viewer has been closed, no timer is running.
    Closed,
}
