use std::{
    fmt::Display,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, SendError, Sender, TrySendError,
};

/// What the actor loop should do after a message has been handled.
pub enum Act<T: Actor> {
    /// Block until the next message arrives.
    Continue,
    /// Wait for the next message, but feed `timeout_msg` back into the actor if
    /// nothing arrives within `timeout`.
    WaitOr {
        timeout: Duration,
        timeout_msg: T::Message,
    },
    Shutdown,
}

pub trait Actor: Sized {
    type Message: Send + 'static;
    type Error: Display;

    fn handle(&mut self, msg: Self::Message) -> Result<Act<Self>, Self::Error>;

    /// Act the loop starts with, before any message has been received.
    fn first_act(&self) -> Act<Self> {
        Act::Continue
    }

    fn process(mut self, recv: Receiver<Self::Message>) {
        let mut act = self.first_act();
        loop {
            let msg = match act {
                Act::Continue => match recv.recv() {
                    Ok(msg) => msg,
                    Err(_) => {
                        break;
                    }
                },
                Act::WaitOr {
                    timeout,
                    timeout_msg,
                } => match recv.recv_timeout(timeout) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => timeout_msg,
                    Err(RecvTimeoutError::Disconnected) => {
                        break;
                    }
                },
                Act::Shutdown => {
                    break;
                }
            };
            act = match self.handle(msg) {
                Ok(act) => act,
                Err(err) => {
                    log::error!("actor error: {}", err);
                    break;
                }
            };
        }
    }

    fn spawn<F>(cap: Capacity, name: &str, factory: F) -> ActorHandle<Self::Message>
    where
        F: FnOnce(Sender<Self::Message>) -> Self + Send + 'static,
    {
        let (send, recv) = cap.to_channel();
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn({
                let send = send.clone();
                move || {
                    factory(send).process(recv);
                }
            })
            .expect("failed to spawn actor thread");
        ActorHandle {
            sender: send,
            thread,
        }
    }

    fn spawn_default<F>(name: &str, factory: F) -> ActorHandle<Self::Message>
    where
        F: FnOnce(Sender<Self::Message>) -> Self + Send + 'static,
    {
        Self::spawn(Capacity::Bounded(128), name, factory)
    }
}

pub struct ActorHandle<M> {
    thread: JoinHandle<()>,
    sender: Sender<M>,
}

impl<M> ActorHandle<M> {
    pub fn sender(&self) -> Sender<M> {
        self.sender.clone()
    }

    pub fn join(self) {
        let _ = self.thread.join();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn send(&self, msg: M) -> Result<(), SendError<M>> {
        self.sender.send(msg)
    }

    pub fn try_send(&self, msg: M) -> Result<(), TrySendError<M>> {
        self.sender.try_send(msg)
    }
}

pub enum Capacity {
    Sync,
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    pub fn to_channel<T>(&self) -> (Sender<T>, Receiver<T>) {
        match self {
            Capacity::Sync => bounded(0),
            Capacity::Bounded(cap) => bounded(*cap),
            Capacity::Unbounded => unbounded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    struct Echo {
        out: Sender<u32>,
    }

    enum EchoMsg {
        Value(u32),
        Idle,
        Stop,
    }

    impl Actor for Echo {
        type Message = EchoMsg;
        type Error = Infallible;

        fn handle(&mut self, msg: EchoMsg) -> Result<Act<Self>, Infallible> {
            match msg {
                EchoMsg::Value(v) => {
                    let _ = self.out.send(v);
                    Ok(Act::WaitOr {
                        timeout: Duration::from_millis(10),
                        timeout_msg: EchoMsg::Idle,
                    })
                }
                EchoMsg::Idle => {
                    let _ = self.out.send(0);
                    Ok(Act::Continue)
                }
                EchoMsg::Stop => Ok(Act::Shutdown),
            }
        }
    }

    #[test]
    fn timeout_message_is_delivered_when_idle() {
        let (out, results) = unbounded();
        let actor = Echo::spawn_default("echo", move |_| Echo { out });
        actor.send(EchoMsg::Value(3)).unwrap();
        assert_eq!(results.recv_timeout(Duration::from_secs(2)), Ok(3));
        assert_eq!(results.recv_timeout(Duration::from_secs(2)), Ok(0));
        actor.send(EchoMsg::Stop).unwrap();
        actor.join();
    }
}
