use std::{collections::HashSet, convert::Infallible};

use crate::{
    actor::{Act, Actor, ActorHandle, Capacity},
    model::StoryId,
    webapi::BackendHandle,
};

/// Reports viewed stories to the backend from a background thread.  Each
/// story is reported at most once per tracker, failures are only logged.
pub struct ViewTracker {
    actor: ActorHandle<Report>,
    reported: HashSet<StoryId>,
}

impl ViewTracker {
    pub fn new(backend: BackendHandle) -> Self {
        let actor = Reporter::spawn(Capacity::Unbounded, "view-tracker", move |_| Reporter {
            backend,
        });
        Self {
            actor,
            reported: HashSet::new(),
        }
    }

    /// Queue a view report for `story`.  Returns false if it was already
    /// reported.
    pub fn track(&mut self, story: StoryId) -> bool {
        if !self.reported.insert(story) {
            return false;
        }
        if self.actor.send(Report::Viewed(story)).is_err() {
            log::warn!("view tracker is gone, story {} not reported", story);
        }
        true
    }
}

impl Drop for ViewTracker {
    fn drop(&mut self) {
        // Reports already queued are still sent, the thread exits afterwards.
        let _ = self.actor.send(Report::Shutdown);
    }
}

enum Report {
    Viewed(StoryId),
    Shutdown,
}

struct Reporter {
    backend: BackendHandle,
}

impl Actor for Reporter {
    type Message = Report;
    type Error = Infallible;

    fn handle(&mut self, msg: Report) -> Result<Act<Self>, Infallible> {
        match msg {
            Report::Viewed(story) => {
                match self.backend.mark_viewed(story) {
                    Ok(()) => log::debug!("marked story {} as viewed", story),
                    Err(err) => log::error!("failed to mark story {} as viewed: {}", story, err),
                }
                Ok(Act::Continue)
            }
            Report::Shutdown => Ok(Act::Shutdown),
        }
    }
}
