// ── Reactive sensor streams ──
//
// Subscription types for consuming registry changes.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::SensorRecord;

type Snapshot = Arc<Vec<Arc<SensorRecord>>>;

/// A subscription to the sensor registry.
///
/// Offers the snapshot captured at subscription time plus change
/// notification via [`changed`](Self::changed) or as a `Stream`.
pub struct SensorStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl SensorStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot as of the last observed change.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Latest snapshot, whether or not it has been observed.
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the registry is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> SensorWatchStream {
        SensorWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a snapshot per registry mutation.
pub struct SensorWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for SensorWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
