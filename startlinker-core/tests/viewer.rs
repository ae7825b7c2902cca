use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use startlinker_core::{
    error::Error,
    feed::FeedPage,
    follow::{FollowBus, FollowStateChanged},
    model::{CurrentUser, NewStory, Story, StoryId, UserId},
    viewer::{
        input::{InputEvent, Key},
        session::Group,
        StoryViewer, ViewerCommand, ViewerConfig, ViewerEvent,
    },
    webapi::StoriesBackend,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const ME: UserId = UserId(1);
const ADA: UserId = UserId(10);
const BOB: UserId = UserId(20);

#[derive(Default)]
struct FakeBackend {
    stories: Mutex<Vec<Story>>,
    viewed: Mutex<Vec<StoryId>>,
    created: Mutex<Vec<NewStory>>,
}

impl StoriesBackend for FakeBackend {
    fn load_feed(&self, _page: Option<&str>) -> Result<FeedPage, Error> {
        Ok(FeedPage {
            stories: self.stories.lock().clone(),
            next: None,
        })
    }

    fn mark_viewed(&self, story: StoryId) -> Result<(), Error> {
        self.viewed.lock().push(story);
        Ok(())
    }

    fn create_story(&self, new: &NewStory) -> Result<Story, Error> {
        self.created.lock().push(new.clone());
        let created = story(100, ME, 1);
        self.stories.lock().push(created.clone());
        Ok(created)
    }
}

fn story(id: u64, author: UserId, expires_in_minutes: i64) -> Story {
    let expires_at = OffsetDateTime::now_utc() + time::Duration::minutes(expires_in_minutes);
    serde_json::from_value(serde_json::json!({
        "id": id,
        "author": author.0,
        "author_username": format!("user{}", author.0),
        "text_content": format!("story {id}"),
        "expires_at": expires_at.format(&Rfc3339).unwrap(),
    }))
    .unwrap()
}

fn me() -> CurrentUser {
    CurrentUser {
        id: ME,
        username: "me".into(),
        ..CurrentUser::default()
    }
}

/// Short stories so that timer driven tests finish quickly.
fn fast_config() -> ViewerConfig {
    ViewerConfig {
        story_duration: Duration::from_millis(100),
        tick_interval: Duration::from_millis(10),
        follow_refresh_delay: Duration::from_millis(10),
        ..ViewerConfig::default()
    }
}

fn started_viewer(stories: Vec<Story>, config: ViewerConfig) -> (StoryViewer, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::default());
    *backend.stories.lock() = stories;
    let mut viewer = StoryViewer::new(me(), backend.clone(), config);
    viewer.start();
    pump_until(&mut viewer, |e| matches!(e, ViewerEvent::FeedLoaded { .. }));
    (viewer, backend)
}

fn send(viewer: &mut StoryViewer, cmd: ViewerCommand) {
    viewer.handle(ViewerEvent::Command(cmd));
}

/// Handle incoming events until `done` matches one, returning the
/// notifications seen on the way.
fn pump_until(viewer: &mut StoryViewer, done: impl Fn(&ViewerEvent) -> bool) -> Vec<String> {
    let receiver = viewer.receiver();
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = receiver
            .recv_timeout(remaining)
            .expect("timed out waiting for viewer event");
        if let Some(line) = describe(&event) {
            seen.push(line);
        }
        let matched = done(&event);
        viewer.handle(event);
        if matched {
            return seen;
        }
    }
}

/// Handle every event arriving within `period`.
fn pump_for(viewer: &mut StoryViewer, period: Duration) -> Vec<String> {
    let receiver = viewer.receiver();
    let deadline = Instant::now() + period;
    let mut seen = Vec::new();
    while let Ok(event) = receiver.recv_deadline(deadline) {
        if let Some(line) = describe(&event) {
            seen.push(line);
        }
        viewer.handle(event);
    }
    seen
}

fn describe(event: &ViewerEvent) -> Option<String> {
    match event {
        ViewerEvent::Showing { story, .. } => Some(format!("show {}", story.id)),
        ViewerEvent::Closed => Some("closed".into()),
        _ => None,
    }
}

#[test]
fn stories_play_through_on_their_own() {
    let (mut viewer, backend) = started_viewer(
        vec![story(1, ME, 60), story(3, ADA, 60), story(4, BOB, 60), story(5, BOB, 60)],
        fast_config(),
    );
    send(&mut viewer, ViewerCommand::OpenMine { index: 0 });
    let shown = pump_until(&mut viewer, |e| matches!(e, ViewerEvent::Closed));
    assert_eq!(shown, vec!["show 1", "show 3", "show 4", "show 5", "closed"]);
    assert!(viewer.session().is_none());

    let deadline = Instant::now() + Duration::from_secs(5);
    while backend.viewed.lock().len() < 4 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(
        *backend.viewed.lock(),
        vec![StoryId(1), StoryId(3), StoryId(4), StoryId(5)]
    );
}

#[test]
fn nothing_advances_after_close() {
    let (mut viewer, _) = started_viewer(vec![story(3, ADA, 60), story(4, ADA, 60)], fast_config());
    send(&mut viewer, ViewerCommand::OpenRing { position: 0 });
    pump_for(&mut viewer, Duration::from_millis(30));
    send(&mut viewer, ViewerCommand::Input(InputEvent::Key(Key::Escape)));
    let seen = pump_for(&mut viewer, Duration::from_millis(300));
    assert_eq!(seen, vec!["closed"]);
    assert!(viewer.session().is_none());
}

#[test]
fn manual_navigation_resets_progress() {
    let config = ViewerConfig {
        story_duration: Duration::from_secs(60),
        ..fast_config()
    };
    let (mut viewer, _) = started_viewer(vec![story(3, ADA, 60), story(4, ADA, 60)], config);
    send(
        &mut viewer,
        ViewerCommand::OpenGroup {
            author: ADA,
            index: 0,
        },
    );
    pump_for(&mut viewer, Duration::from_millis(100));
    assert!(viewer.session().unwrap().progress() > 0.0);

    send(
        &mut viewer,
        ViewerCommand::Input(InputEvent::Press {
            x: 290.0,
            width: 300.0,
        }),
    );
    let session = viewer.session().unwrap();
    assert_eq!((session.group(), session.index()), (Group::Other(ADA), 1));
    assert_eq!(session.progress(), 0.0);
}

#[test]
fn expired_stories_are_not_shown() {
    let (viewer, _) = started_viewer(
        vec![story(1, ME, -1), story(3, ADA, -5), story(4, BOB, 60)],
        fast_config(),
    );
    assert!(viewer.feed().my_stories().is_empty());
    let groups: Vec<_> = viewer.rings().into_iter().map(|r| r.group).collect();
    assert_eq!(groups, vec![Group::Other(BOB)]);
}

#[test]
fn unfollowing_drops_the_author_right_away() {
    let (mut viewer, backend) = started_viewer(
        vec![story(3, ADA, 60), story(4, BOB, 60)],
        fast_config(),
    );
    let bus = FollowBus::new();
    viewer.subscribe_follows(&bus);

    // The backend stops returning stories of unfollowed authors.
    backend.stories.lock().retain(|s| s.author != ADA);
    bus.publish(FollowStateChanged::unfollowed(ADA));
    pump_until(&mut viewer, |e| matches!(e, ViewerEvent::FollowStateChanged(_)));
    assert!(!viewer.feed().groups().contains(ADA));

    pump_until(&mut viewer, |e| matches!(e, ViewerEvent::FeedLoaded { .. }));
    assert_eq!(viewer.feed().groups().authors().collect::<Vec<_>>(), vec![BOB]);
}

#[test]
fn created_story_shows_up_after_refresh() {
    let (mut viewer, backend) = started_viewer(vec![story(3, ADA, 60)], fast_config());
    assert!(viewer.feed().my_stories().is_empty());

    send(
        &mut viewer,
        ViewerCommand::CreateStory {
            story: NewStory::text("hello"),
        },
    );
    pump_until(&mut viewer, |e| matches!(e, ViewerEvent::StoryCreated { .. }));
    pump_until(&mut viewer, |e| matches!(e, ViewerEvent::FeedLoaded { .. }));

    assert_eq!(backend.created.lock().len(), 1);
    assert_eq!(viewer.feed().my_stories().len(), 1);
    assert_eq!(viewer.rings()[0].group, Group::Mine);
}

#[test]
fn periodic_refresh_drops_newly_expired_stories() {
    let config = ViewerConfig {
        expiry_check_interval: Duration::from_millis(50),
        ..fast_config()
    };
    let (mut viewer, backend) =
        started_viewer(vec![story(3, ADA, 60), story(4, BOB, 60)], config);
    assert_eq!(viewer.rings().len(), 2);

    // Ada's story runs out while nobody touches the viewer.
    for story in backend.stories.lock().iter_mut() {
        if story.author == ADA {
            story.expires_at = Some(OffsetDateTime::now_utc() - time::Duration::seconds(1));
        }
    }
    pump_until(&mut viewer, |e| {
        matches!(e, ViewerEvent::FeedUpdated { rings, .. } if rings.len() == 1)
    });
    let groups: Vec<_> = viewer.rings().into_iter().map(|r| r.group).collect();
    assert_eq!(groups, vec![Group::Other(BOB)]);
}
