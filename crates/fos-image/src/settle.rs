//! Settle-once bridge
//!
//! Turns the two one-shot completion callbacks of an [`ImageHandle`] into a
//! single asynchronous [`LoadOutcome`]. Any number of [`Settler`] clones may
//! race to settle; only the first call has effect.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use fos_net::Permit;
use smol::channel::{bounded, Receiver, Sender, TryRecvError};

use crate::handle::ImageHandle;
use crate::LoadError;

type Settlement = Result<ImageHandle, LoadError>;

#[derive(Debug)]
struct Shared {
    settled: AtomicBool,
    /// Admission slot held for as long as the load is pending
    permit: Mutex<Option<Permit>>,
}

/// Producer side: resolves or rejects the outcome, once.
#[derive(Debug, Clone)]
pub struct Settler {
    tx: Sender<Settlement>,
    shared: Arc<Shared>,
}

/// Create a pending outcome and its settler.
///
/// `permit` is released the moment the outcome settles, or when every
/// settler has been dropped without settling.
pub fn channel(permit: Option<Permit>) -> (Settler, LoadOutcome) {
    let (tx, rx) = bounded(1);
    let shared = Arc::new(Shared {
        settled: AtomicBool::new(false),
        permit: Mutex::new(permit),
    });
    (Settler { tx, shared }, LoadOutcome { rx, finished: false })
}

impl Settler {
    /// Resolve with the loaded handle. Returns false if already settled.
    pub fn resolve(&self, handle: ImageHandle) -> bool {
        self.settle(Ok(handle))
    }

    /// Reject with a load failure. Returns false if already settled.
    pub fn reject(&self, error: LoadError) -> bool {
        self.settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.shared.settled.load(Ordering::Acquire)
    }

    fn settle(&self, settlement: Settlement) -> bool {
        if self.shared.settled.swap(true, Ordering::AcqRel) {
            tracing::trace!("ignoring second settlement");
            return false;
        }

        drop(
            self.shared
                .permit
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        // Capacity is one and this is the only send. It fails only when the
        // caller dropped the outcome, and then nobody is listening.
        let _ = self.tx.try_send(settlement);
        true
    }
}

/// Consumer side: the single-resolution result of a started load.
///
/// Await it directly, call [`wait`](Self::wait), or poll without blocking
/// via [`try_take`](Self::try_take).
#[derive(Debug)]
pub struct LoadOutcome {
    rx: Receiver<Settlement>,
    finished: bool,
}

impl LoadOutcome {
    /// Wait for settlement
    pub async fn wait(self) -> Result<ImageHandle, LoadError> {
        self.rx.recv().await.unwrap_or(Err(LoadError::Abandoned))
    }

    /// The settlement if it has happened and was not taken yet
    pub fn try_take(&mut self) -> Option<Result<ImageHandle, LoadError>> {
        if self.finished {
            return None;
        }

        let settlement = match self.rx.try_recv() {
            Ok(settlement) => settlement,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(LoadError::Abandoned),
        };
        self.finished = true;
        Some(settlement)
    }

    /// Whether a settlement is waiting to be taken
    pub fn is_ready(&self) -> bool {
        !self.finished && (!self.rx.is_empty() || self.rx.is_closed())
    }
}

impl IntoFuture for LoadOutcome {
    type Output = Result<ImageHandle, LoadError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
