//! Correlation keys and reply handles.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use super::errors::{CorrelationError, CorrelationResult};

/// Identity of a pending request.
///
/// `Category` keys hold one slot per logical operation ("login",
/// "createRoom"); `Sequence` keys use the request frame's sequence number,
/// which the server echoes in its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    Category(String),
    Sequence(u32),
}

impl CorrelationKey {
    pub fn category(name: impl Into<String>) -> Self {
        CorrelationKey::Category(name.into())
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::Category(name) => write!(f, "category:{name}"),
            CorrelationKey::Sequence(seq) => write!(f, "seq:{seq}"),
        }
    }
}

impl From<&str> for CorrelationKey {
    fn from(name: &str) -> Self {
        CorrelationKey::Category(name.to_string())
    }
}

impl From<u32> for CorrelationKey {
    fn from(seq: u32) -> Self {
        CorrelationKey::Sequence(seq)
    }
}

/// Handle awaited by the caller of [`PendingRequests::begin`].
///
/// Resolves to the response value or the reason the request failed. If the
/// owning map is dropped the reply resolves to [`CorrelationError::Cancelled`].
///
/// [`PendingRequests::begin`]: super::PendingRequests::begin
#[must_use = "a PendingReply does nothing unless awaited"]
#[derive(Debug)]
pub struct PendingReply<T> {
    key: CorrelationKey,
    rx: oneshot::Receiver<CorrelationResult<T>>,
}

impl<T> PendingReply<T> {
    pub(crate) fn new(key: CorrelationKey, rx: oneshot::Receiver<CorrelationResult<T>>) -> Self {
        Self { key, rx }
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }
}

impl<T> Future for PendingReply<T> {
    type Output = CorrelationResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CorrelationError::Cancelled)))
    }
}
