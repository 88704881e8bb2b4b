//! Live log follows, one topic per container.
//!
//! The first subscriber for a container opens the engine follow; later
//! subscribers share it. When the last subscription is dropped the follow
//! task is aborted, which closes the upstream request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use fleetdeck_events::{LogDataPayload, LogErrorPayload, ServerEvent};
use fleetdeck_logframe::FrameDecoder;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Lines replayed when a follow starts.
pub const FOLLOW_TAIL: usize = 50;

const TOPIC_CAPACITY: usize = 512;

struct Topic {
    sender: broadcast::Sender<ServerEvent>,
    subscribers: usize,
    task: JoinHandle<()>,
}

type Topics = Arc<Mutex<HashMap<String, Topic>>>;

fn lock(topics: &Topics) -> MutexGuard<'_, HashMap<String, Topic>> {
    topics.lock().unwrap_or_else(|e| e.into_inner())
}

/// Per-container log topics.
#[derive(Clone)]
pub struct LogHub {
    engine: Arc<dyn Engine>,
    idle_timeout: Option<Duration>,
    topics: Topics,
}

impl LogHub {
    pub fn new(engine: Arc<dyn Engine>, idle_timeout: Option<Duration>) -> Self {
        Self {
            engine,
            idle_timeout,
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the topic for `container_id`, starting its follow if needed.
    ///
    /// A topic whose follow already ended is restarted.
    pub fn subscribe(&self, container_id: &str) -> LogSubscription {
        let mut topics = lock(&self.topics);

        let receiver = match topics.get_mut(container_id) {
            Some(topic) => {
                topic.subscribers += 1;
                let receiver = topic.sender.subscribe();
                if topic.task.is_finished() {
                    debug!(container_id, "Restarting finished log follow");
                    topic.task = self.spawn_follow(container_id, topic.sender.clone());
                }
                receiver
            }
            None => {
                let (sender, receiver) = broadcast::channel(TOPIC_CAPACITY);
                let task = self.spawn_follow(container_id, sender.clone());
                topics.insert(
                    container_id.to_string(),
                    Topic {
                        sender,
                        subscribers: 1,
                        task,
                    },
                );
                receiver
            }
        };

        LogSubscription {
            container_id: container_id.to_string(),
            receiver,
            topics: Arc::clone(&self.topics),
        }
    }

    /// Containers with an open topic.
    pub fn active_topics(&self) -> Vec<String> {
        lock(&self.topics).keys().cloned().collect()
    }

    fn spawn_follow(
        &self,
        container_id: &str,
        sender: broadcast::Sender<ServerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(follow(
            Arc::clone(&self.engine),
            container_id.to_string(),
            sender,
            self.idle_timeout,
        ))
    }
}

/// Read the engine follow and publish each decoded frame.
///
/// Payloads are sent as-is, escape sequences included, for terminal-style
/// rendering.
async fn follow(
    engine: Arc<dyn Engine>,
    container_id: String,
    sender: broadcast::Sender<ServerEvent>,
    idle_timeout: Option<Duration>,
) {
    let publish_error = |error: String| {
        let _ = sender.send(ServerEvent::LogError(LogErrorPayload {
            container_id: container_id.clone(),
            error,
        }));
    };

    info!(container_id = %container_id, "Following container log");
    let mut stream = match engine.follow_logs(&container_id, FOLLOW_TAIL).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(container_id = %container_id, error = %e, "Failed to follow container log");
            publish_error(e.to_string());
            return;
        }
    };

    let mut decoder = FrameDecoder::new();
    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!(container_id = %container_id, idle_secs = limit.as_secs(), "Log follow idle, closing");
                    publish_error(format!("log stream idle for {}s", limit.as_secs()));
                    return;
                }
            },
            None => stream.next().await,
        };

        match next {
            Some(Ok(chunk)) => match decoder.push(&chunk) {
                Ok(frames) => {
                    for frame in frames {
                        let _ = sender.send(ServerEvent::LogData(LogDataPayload {
                            container_id: container_id.clone(),
                            data: frame.text(),
                        }));
                    }
                }
                Err(e) => {
                    warn!(container_id = %container_id, error = %e, "Undecodable log stream");
                    publish_error(e.to_string());
                    return;
                }
            },
            Some(Err(e)) => {
                warn!(container_id = %container_id, error = %e, "Log stream error");
                publish_error(e.to_string());
                return;
            }
            None => {
                info!(container_id = %container_id, "Log stream ended");
                return;
            }
        }
    }
}

/// One observer's membership in a log topic. Dropping it leaves the topic.
pub struct LogSubscription {
    container_id: String,
    receiver: broadcast::Receiver<ServerEvent>,
    topics: Topics,
}

impl LogSubscription {
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Next event on the topic. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(container_id = %self.container_id, skipped, "Log subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        let mut topics = lock(&self.topics);
        let last = match topics.get_mut(&self.container_id) {
            Some(topic) => {
                topic.subscribers = topic.subscribers.saturating_sub(1);
                topic.subscribers == 0
            }
            None => false,
        };
        if last {
            if let Some(topic) = topics.remove(&self.container_id) {
                topic.task.abort();
                debug!(container_id = %self.container_id, "Closed log topic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes, BytesMut};

    use super::*;
    use crate::engine::MockEngine;
    use crate::fleet::{record, ContainerState};

    fn frame(tag: u8, payload: &str) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(tag);
        buf.put_bytes(0, 3);
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload.as_bytes());
        buf.freeze()
    }

    fn engine_with(chunks: Vec<Bytes>) -> Arc<MockEngine> {
        let engine = Arc::new(MockEngine::new());
        engine.set_containers(vec![record("c1", "api", ContainerState::Running)]);
        engine.set_follow_chunks("c1", chunks);
        engine
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let whole = frame(1, "\x1b[32mready\x1b[0m\n");
        let engine = engine_with(vec![whole.slice(..5), whole.slice(5..12), whole.slice(12..)]);
        let hub = LogHub::new(engine, None);

        let mut sub = hub.subscribe("c1");
        match sub.recv().await.unwrap() {
            ServerEvent::LogData(p) => {
                assert_eq!(p.container_id, "c1");
                assert_eq!(p.data, "\x1b[32mready\x1b[0m\n");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribers_share_one_follow() {
        let engine = engine_with(vec![frame(1, "a")]);
        let hub = LogHub::new(engine.clone(), None);

        let mut first = hub.subscribe("c1");
        let mut second = hub.subscribe("c1");
        assert!(matches!(first.recv().await, Some(ServerEvent::LogData(_))));
        assert!(matches!(second.recv().await, Some(ServerEvent::LogData(_))));
        assert_eq!(engine.follow_calls(), 1);
    }

    #[tokio::test]
    async fn test_last_drop_closes_topic() {
        let engine = engine_with(vec![]);
        let hub = LogHub::new(engine, None);

        let first = hub.subscribe("c1");
        let second = hub.subscribe("c1");
        drop(first);
        assert_eq!(hub.active_topics(), vec!["c1".to_string()]);
        drop(second);
        assert!(hub.active_topics().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_container_reports_error() {
        let engine = engine_with(vec![]);
        let hub = LogHub::new(engine, None);

        let mut sub = hub.subscribe("ghost");
        match sub.recv().await.unwrap() {
            ServerEvent::LogError(p) => assert_eq!(p.container_id, "ghost"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_raw_stream_reports_error() {
        let engine = engine_with(vec![Bytes::from_static(b"plain tty output\n")]);
        let hub = LogHub::new(engine, None);

        let mut sub = hub.subscribe("c1");
        match sub.recv().await.unwrap() {
            ServerEvent::LogError(p) => {
                assert_eq!(p.container_id, "c1");
                assert!(p.error.contains("not multiplexed"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_follow_times_out() {
        let engine = engine_with(vec![]);
        let hub = LogHub::new(engine, Some(Duration::from_secs(30)));

        let mut sub = hub.subscribe("c1");
        match sub.recv().await.unwrap() {
            ServerEvent::LogError(p) => assert!(p.error.contains("idle")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
