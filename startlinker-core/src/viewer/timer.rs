use std::{convert::Infallible, time::Duration};

use crossbeam_channel::Sender;

use crate::actor::{Act, Actor, ActorHandle, Capacity};

/// Repeating timer that sends an event every `period` until dropped.
/// Dropping the timer stops its thread and waits for it, so no event is sent
/// after `drop` returns.
pub struct IntervalTimer {
    actor: Option<ActorHandle<Beat>>,
}

impl IntervalTimer {
    pub fn start<E, F>(name: &str, period: Duration, events: Sender<E>, make_event: F) -> Self
    where
        E: Send + 'static,
        F: FnMut() -> E + Send + 'static,
    {
        let actor = Ticker::<E, F>::spawn(Capacity::Bounded(1), name, move |_| Ticker {
            period,
            events,
            make_event,
        });
        Self { actor: Some(actor) }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.actor.as_ref().is_some_and(|actor| !actor.is_finished())
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        if let Some(actor) = self.actor.take() {
            let _ = actor.send(Beat::Stop);
            actor.join();
        }
    }
}

enum Beat {
    Tick,
    Stop,
}

struct Ticker<E, F> {
    period: Duration,
    events: Sender<E>,
    make_event: F,
}

impl<E, F> Ticker<E, F>
where
    E: Send + 'static,
    F: FnMut() -> E + Send + 'static,
{
    fn wait(&self) -> Act<Self> {
        Act::WaitOr {
            timeout: self.period,
            timeout_msg: Beat::Tick,
        }
    }
}

impl<E, F> Actor for Ticker<E, F>
where
    E: Send + 'static,
    F: FnMut() -> E + Send + 'static,
{
    type Message = Beat;
    type Error = Infallible;

    fn first_act(&self) -> Act<Self> {
        self.wait()
    }

    fn handle(&mut self, msg: Beat) -> Result<Act<Self>, Infallible> {
        match msg {
            Beat::Tick => {
                if self.events.send((self.make_event)()).is_err() {
                    // Nobody is listening anymore.
                    return Ok(Act::Shutdown);
                }
                Ok(self.wait())
            }
            Beat::Stop => Ok(Act::Shutdown),
        }
    }
}
