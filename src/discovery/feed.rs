//! Change events and the feed that carries them.

use std::fmt;
use std::time::Duration;

use futures_util::stream::{BoxStream, Stream, StreamExt};

use crate::discovery::DiscoveryError;

/// Kind of mutation committed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Put { value: String },
    Delete,
}

/// A single committed mutation under the watched prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub key: String,
    /// Store revision at which the mutation was committed.
    pub revision: i64,
}

impl ChangeEvent {
    pub fn put(key: impl Into<String>, value: impl Into<String>, revision: i64) -> Self {
        Self {
            kind: ChangeKind::Put { value: value.into() },
            key: key.into(),
            revision,
        }
    }

    pub fn delete(key: impl Into<String>, revision: i64) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: key.into(),
            revision,
        }
    }
}

/// A lazy, non-restartable sequence of change events.
///
/// Events arrive in commit order. Once the underlying stream ends the feed
/// only yields [`DiscoveryError::FeedClosed`]; recovering means subscribing
/// again.
pub struct ChangeFeed {
    inner: BoxStream<'static, Result<ChangeEvent, DiscoveryError>>,
    finished: bool,
}

impl ChangeFeed {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<ChangeEvent, DiscoveryError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
            finished: false,
        }
    }

    /// Wait for the next event.
    pub async fn next(&mut self) -> Result<ChangeEvent, DiscoveryError> {
        if self.finished {
            return Err(DiscoveryError::FeedClosed);
        }
        match self.inner.next().await {
            Some(Ok(event)) => Ok(event),
            Some(Err(e)) => {
                self.finished = true;
                Err(e)
            }
            None => {
                self.finished = true;
                Err(DiscoveryError::FeedClosed)
            }
        }
    }

    /// Wait for the next event, giving up after `timeout`.
    pub async fn next_within(&mut self, timeout: Duration) -> Result<ChangeEvent, DiscoveryError> {
        match tokio::time::timeout(timeout, self.next()).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::FeedClosed),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("finished", &self.finished)
            .finish()
    }
}
