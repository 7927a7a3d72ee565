//! A channel adapter that replays scripted outcomes.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    channels::{ChannelAdapter, SendOutcome},
    models::{Alert, Channel},
};

/// Returns queued outcomes in order, then `fallback` once the queue is empty.
/// Every call is counted and the destinations are recorded.
#[derive(Clone)]
pub struct ScriptedAdapter {
    channel: Channel,
    confirms: bool,
    script: Arc<Mutex<VecDeque<SendOutcome>>>,
    fallback: SendOutcome,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    destinations: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAdapter {
    /// An adapter that accepts everything.
    pub fn accepting(channel: Channel) -> Self {
        Self {
            channel,
            confirms: false,
            script: Arc::default(),
            fallback: SendOutcome::Accepted { external_id: None },
            delay: None,
            calls: Arc::default(),
            destinations: Arc::default(),
        }
    }

    /// An adapter that fails transiently on every call.
    pub fn failing(channel: Channel) -> Self {
        Self::accepting(channel).with_fallback(SendOutcome::TransientError("gateway down".into()))
    }

    /// Queues an outcome for the next call.
    pub fn then(self, outcome: SendOutcome) -> Self {
        self.script.lock().expect("script lock poisoned").push_back(outcome);
        self
    }

    /// Outcome used once the script is exhausted.
    pub fn with_fallback(mut self, outcome: SendOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Sleeps for `delay` inside every call, like a gateway that is slow to answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reports delivery confirmation on acceptance.
    pub fn confirming(mut self) -> Self {
        self.confirms = true;
        self
    }

    /// Number of `send` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Destinations passed to `send`, in call order.
    pub fn destinations(&self) -> Vec<String> {
        self.destinations.lock().expect("destinations lock poisoned").clone()
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn confirms_delivery(&self) -> bool {
        self.confirms
    }

    async fn send(&self, destination: &str, _alert: &Alert) -> SendOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.destinations.lock().expect("destinations lock poisoned").push(destination.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().expect("script lock poisoned").pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
