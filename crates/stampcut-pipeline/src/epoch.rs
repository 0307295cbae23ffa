//! Epoch-tagged generation: the last request wins.
//!
//! Every generation request calls [`EpochSlot::begin`] and gets an
//! [`Epoch`] ticket that supersedes all earlier ones. Work finishing
//! under an old ticket is dropped by [`EpochSlot::complete`], so results
//! from two requests are never mixed. [`run_epoch`] drives the staged
//! pipeline as a cooperative task that yields between stages and stops
//! as soon as its ticket goes stale.
//!
//! Scheduling is single-threaded: the slot is shared through `Rc` and the
//! futures are not `Send`.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::pipeline::{Advance, Pipeline, Stage, StagedResult};
use crate::types::{CutterSettings, PipelineConfig, PipelineError};

/// Ticket identifying one generation request. Later epochs compare
/// greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// Sequence number of this ticket.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct SlotState<T> {
    newest: Option<Epoch>,
    value: Option<(Epoch, T)>,
}

/// Single-slot result channel keyed by epoch.
///
/// Clones share the same slot.
#[derive(Debug)]
pub struct EpochSlot<T> {
    state: Rc<RefCell<SlotState<T>>>,
}

impl<T> Clone for EpochSlot<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> Default for EpochSlot<T> {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(SlotState {
                newest: None,
                value: None,
            })),
        }
    }
}

impl<T> EpochSlot<T> {
    /// An empty slot with no epochs begun.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new epoch, superseding every earlier one.
    ///
    /// The last stored value stays readable until the new epoch
    /// completes.
    pub fn begin(&self) -> Epoch {
        let mut state = self.state.borrow_mut();
        let next = Epoch(state.newest.map_or(0, |e| e.0 + 1));
        state.newest = Some(next);
        tracing::debug!(epoch = next.0, "began epoch");
        next
    }

    /// The most recently begun epoch.
    #[must_use]
    pub fn newest(&self) -> Option<Epoch> {
        self.state.borrow().newest
    }

    /// Whether `epoch` is still the newest.
    #[must_use]
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.newest() == Some(epoch)
    }

    /// Store `value` if `epoch` is still the newest.
    ///
    /// Returns `false`, dropping `value`, when a later epoch has begun.
    pub fn complete(&self, epoch: Epoch, value: T) -> bool {
        let mut state = self.state.borrow_mut();
        if state.newest != Some(epoch) {
            tracing::debug!(epoch = epoch.0, "discarded stale result");
            return false;
        }
        state.value = Some((epoch, value));
        true
    }

    /// Epoch of the stored value, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Epoch> {
        self.state.borrow().value.as_ref().map(|(e, _)| *e)
    }

    /// Remove and return the stored value.
    pub fn take(&self) -> Option<(Epoch, T)> {
        self.state.borrow_mut().value.take()
    }
}

impl<T: Clone> EpochSlot<T> {
    /// Copy of the stored value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.state.borrow().value.as_ref().map(|(_, v)| v.clone())
    }
}

/// Slot type fed by [`run_epoch`].
pub type GenerationSlot = EpochSlot<Result<StagedResult, PipelineError>>;

/// What happened to one epoch's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochOutcome {
    /// The result (or error) was stored in the slot.
    Applied,
    /// A newer epoch began first; nothing was stored.
    Superseded,
}

/// Future that returns `Pending` once, then completes.
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Hand control back to the executor once.
pub fn yield_now() -> impl Future<Output = ()> {
    YieldNow { yielded: false }
}

/// Run one generation under `epoch`, yielding between stages.
///
/// Stops early without storing anything once a newer epoch begins.
/// Errors are stored like results so the caller sees them only if they
/// belong to the newest request.
pub async fn run_epoch(
    slot: GenerationSlot,
    epoch: Epoch,
    image_bytes: Vec<u8>,
    settings: CutterSettings,
    config: PipelineConfig,
) -> EpochOutcome {
    let mut stage: Stage = Pipeline::new(image_bytes, settings, config).into();
    let result = loop {
        if !slot.is_current(epoch) {
            tracing::debug!(epoch = epoch.0, stage = stage.name(), "abandoned epoch");
            return EpochOutcome::Superseded;
        }
        match stage.advance() {
            Ok(Advance::Next(next)) => stage = next,
            Ok(Advance::Complete(done)) => break done.complete(),
            Err(err) => break Err(err),
        }
        yield_now().await;
    };

    if slot.complete(epoch, result) {
        EpochOutcome::Applied
    } else {
        EpochOutcome::Superseded
    }
}
