//! Threshold-trigger dispatch.
//!
//! Hands pin-mask events from the platform's interrupt callback to the
//! registered handler without ever blocking the interrupt path: the callback
//! side only performs a non-blocking enqueue or schedules a deferred work
//! item, and the handler runs later in a dispatch context that is allowed to
//! touch the bus.

use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crate::sample::Channel;

/// Default depth of the owned dispatcher's event queue.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// What arms the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerKind {
    /// A new sample finished converting. Not supported by this driver.
    DataReady,
    /// Magnitude on the configured channel crossed the programmed threshold.
    Threshold,
}

/// Descriptor of an armed trigger, handed back to the handler on dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trigger {
    pub kind: TriggerKind,
    pub channel: Channel,
}

/// Callback invoked from the dispatch context.
///
/// The driver never fetches on the handler's behalf; a handler that wants
/// fresh data calls `fetch_all`/`read_channel` itself. The registration slot
/// is held while the handler runs, so the handler must not call
/// `enable_trigger`/`disable_trigger`.
pub type TriggerHandler = Box<dyn FnMut(&Trigger) + Send>;

/// GPIO interrupt-line capability, supplied by the platform already
/// configured as an input.
///
/// Arm/disarm results are not reported; the interrupt-config register write
/// is the fallible half of enabling or disabling a trigger.
pub trait InterruptLine: Send {
    /// Arm edge-triggered activation.
    fn arm(&mut self);
    /// Stop the line from firing.
    fn disarm(&mut self);
    /// This line's bit in dispatched pin masks.
    fn mask(&self) -> u32;
}

/// Deferred-dispatch sink: accepts pin-mask events from interrupt context.
/// Implementations must not block.
pub trait EventSink: Send + Sync {
    fn submit(&self, pins: u32);
}

/// Shared cooperative work queue owned by the platform. `submit` must be
/// callable from interrupt context without blocking.
pub trait WorkQueue: Send + Sync {
    fn submit(&self, work: Box<dyn FnOnce() + Send>);
}

/// How interrupt events reach the dispatch routine; fixed per device at
/// initialization time.
pub enum DispatchModel {
    /// A bounded FIFO plus one long-lived worker thread owned by this
    /// device. Events dispatch in firing order; a full queue silently
    /// discards the newest event.
    OwnedThread { capacity: usize },
    /// Deferred work items on a pre-existing shared queue. Latency and
    /// ordering are whatever the queue provides.
    SharedQueue(Arc<dyn WorkQueue>),
}

impl Default for DispatchModel {
    fn default() -> Self {
        DispatchModel::OwnedThread {
            capacity: EVENT_QUEUE_DEPTH,
        }
    }
}

struct Registration {
    trigger: Trigger,
    handler: TriggerHandler,
}

type Slot = Arc<Mutex<Option<Registration>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Registration>> {
    match slot.lock() {
        Ok(guard) => guard,
        // A handler panic must not wedge dispatch forever.
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Runs in the dispatch context: looks up the registration and invokes the
/// handler.
///
/// An event can outlive its registration (disable only stops future
/// interrupts), so an empty slot is an expected case: it is logged and the
/// event is dropped, never retried.
#[derive(Clone)]
struct DispatchRoutine {
    slot: Slot,
    line_mask: u32,
}

impl DispatchRoutine {
    fn run(&self, pins: u32) {
        let mut slot = lock(&self.slot);
        match slot.as_mut() {
            Some(registration) => {
                if pins & self.line_mask != 0 {
                    let trigger = registration.trigger;
                    (registration.handler)(&trigger);
                }
            }
            None => log::error!("threshold event with no registered handler, dropping"),
        }
    }
}

/// Clonable handle for the platform's interrupt callback. [`notify`]
/// performs a non-blocking submit into the dispatch sink; it never touches
/// the bus and never waits.
///
/// [`notify`]: EventRelay::notify
#[derive(Clone)]
pub struct EventRelay {
    sink: Arc<dyn EventSink>,
}

impl EventRelay {
    /// Hand the triggering pin mask to the dispatch context. Safe to call
    /// from interrupt context.
    pub fn notify(&self, pins: u32) {
        self.sink.submit(pins);
    }
}

/// Bounded FIFO plus a worker thread that dispatches one event at a time,
/// in firing order, for as long as a relay clone is alive.
struct ThreadDispatcher {
    events: SyncSender<u32>,
}

impl ThreadDispatcher {
    fn spawn(capacity: usize, routine: DispatchRoutine) -> Self {
        let (events, queue) = mpsc::sync_channel(capacity);
        thread::spawn(move || {
            while let Ok(pins) = queue.recv() {
                routine.run(pins);
            }
        });
        ThreadDispatcher { events }
    }
}

impl EventSink for ThreadDispatcher {
    fn submit(&self, pins: u32) {
        // Drop on full; the interrupt path never waits for the consumer.
        let _ = self.events.try_send(pins);
    }
}

/// Packages each event as a work item for a shared platform queue.
struct QueueDispatcher {
    queue: Arc<dyn WorkQueue>,
    routine: DispatchRoutine,
}

impl EventSink for QueueDispatcher {
    fn submit(&self, pins: u32) {
        let routine = self.routine.clone();
        self.queue.submit(Box::new(move || routine.run(pins)));
    }
}

/// Trigger-side state owned by a ready device.
pub(crate) struct TriggerContext {
    line: Box<dyn InterruptLine>,
    slot: Slot,
}

impl TriggerContext {
    pub(crate) fn register(&mut self, trigger: Trigger, handler: TriggerHandler) {
        *lock(&self.slot) = Some(Registration { trigger, handler });
    }

    pub(crate) fn clear(&mut self) {
        *lock(&self.slot) = None;
    }

    pub(crate) fn arm(&mut self) {
        self.line.arm();
    }

    pub(crate) fn disarm(&mut self) {
        self.line.disarm();
    }

    #[cfg(test)]
    pub(crate) fn has_handler(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

/// Builds the dispatch plumbing for one device: the shared registration
/// slot, the sink for the chosen model, and the relay the platform callback
/// calls.
pub(crate) fn init(
    line: Box<dyn InterruptLine>,
    dispatch: DispatchModel,
) -> (TriggerContext, EventRelay) {
    let slot: Slot = Arc::new(Mutex::new(None));
    let routine = DispatchRoutine {
        slot: Arc::clone(&slot),
        line_mask: line.mask(),
    };
    let sink: Arc<dyn EventSink> = match dispatch {
        DispatchModel::OwnedThread { capacity } => {
            Arc::new(ThreadDispatcher::spawn(capacity, routine))
        }
        DispatchModel::SharedQueue(queue) => Arc::new(QueueDispatcher { queue, routine }),
    };
    (TriggerContext { line, slot }, EventRelay { sink })
}
