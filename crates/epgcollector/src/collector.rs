//! The collection worker.
//!
//! A producer pushes raw sections into a [`SectionQueue`]. The worker sleeps
//! for the poll interval, takes everything queued in one go and feeds it to a
//! [`SectionSink`] outside the lock. A session ends when the sink reports
//! completion, when the number of entries stops growing, or when it is
//! cancelled through a [`CollectHandler`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dvbsi::psi::Section;
use dvbsi::Pid;
use parking_lot::Mutex;

use crate::config::{CollectorOptions, CompletionMode};

/// Consumer of the sections of a session.
pub trait SectionSink {
    /// Processes a section.
    fn on_section(&mut self, section: &Section);

    /// Returns the number of EPG entries collected so far.
    fn entry_count(&self) -> usize;

    /// Returns `true` once everything the sink waits for has arrived.
    fn is_complete(&self) -> bool;

    /// Returns a new set of PIDs to receive, if the sink wants one.
    fn requested_pids(&mut self) -> Option<Vec<Pid>> {
        None
    }

    /// Called once when the session ends.
    fn finish(&mut self) {}
}

/// Tuner side of a session.
pub trait TuningControl {
    /// Replaces the set of PIDs whose sections are delivered.
    fn change_pid_mapping(&mut self, pids: &[Pid]);
}

/// Sections waiting to be processed.
#[derive(Debug, Clone, Default)]
pub struct SectionQueue(Arc<Mutex<VecDeque<Box<[u8]>>>>);

impl SectionQueue {
    /// Creates an empty queue.
    #[inline]
    pub fn new() -> SectionQueue {
        SectionQueue::default()
    }

    /// Appends a complete section.
    pub fn push(&self, section: impl Into<Box<[u8]>>) {
        self.0.lock().push_back(section.into());
    }

    /// Returns the number of queued sections.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Takes every queued section.
    fn drain(&self) -> VecDeque<Box<[u8]>> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionReason {
    /// The sink reported completion.
    Complete,
    /// No entry was added for the configured number of polls.
    Stagnation,
    /// [`CollectHandler::cancel`] was called.
    Cancelled,
}

/// Result of a session.
#[derive(Debug)]
pub struct CollectionOutcome<S> {
    /// Why the session ended.
    pub reason: CompletionReason,
    /// Entries collected.
    pub entries: usize,
    /// The sink, holding what was collected.
    pub sink: S,
}

#[derive(Debug, Default)]
struct Commands {
    cancel: AtomicBool,
}

/// Runs a collection session.
///
/// [`Collector::handler`] gives a [`CollectHandler`] to cancel the session
/// and [`Collector::queue`] the queue the producer pushes sections into.
pub struct Collector {
    queue: SectionQueue,
    commands: Arc<Commands>,
    parker: crossbeam_utils::sync::Parker,
    options: CollectorOptions,
}

impl Default for Collector {
    fn default() -> Collector {
        Collector::new()
    }
}

impl Collector {
    /// Creates a `Collector` with default options.
    pub fn new() -> Collector {
        Collector {
            queue: SectionQueue::new(),
            commands: Arc::new(Commands::default()),
            parker: crossbeam_utils::sync::Parker::new(),
            options: CollectorOptions::default(),
        }
    }

    /// Returns a [`CollectHandler`] for this session.
    #[inline]
    pub fn handler(&self) -> CollectHandler {
        CollectHandler {
            commands: self.commands.clone(),
            unparker: self.parker.unparker().clone(),
        }
    }

    /// Returns the queue of this session.
    #[inline]
    pub fn queue(&self) -> SectionQueue {
        self.queue.clone()
    }

    /// Sets the options.
    #[inline]
    pub fn options(&mut self, options: CollectorOptions) {
        self.options = options;
    }

    /// Runs the session on a new thread.
    ///
    /// The returned [`JoinHandle`][std::thread::JoinHandle] yields the outcome.
    pub fn spawn<S, T>(self, sink: S, tuner: T) -> std::thread::JoinHandle<CollectionOutcome<S>>
    where
        S: SectionSink + Send + 'static,
        T: TuningControl + Send + 'static,
    {
        std::thread::spawn(move || self.run(sink, tuner))
    }

    /// Runs the session on the current thread.
    pub fn run<S, T>(self, sink: S, tuner: T) -> CollectionOutcome<S>
    where
        S: SectionSink,
        T: TuningControl,
    {
        let worker = Worker {
            parker: self.parker,
            commands: self.commands,
            queue: self.queue,
            options: self.options,
            sink,
            tuner,
        };
        worker.run()
    }
}

/// Controls a running session.
#[derive(Debug, Clone)]
pub struct CollectHandler {
    commands: Arc<Commands>,
    unparker: crossbeam_utils::sync::Unparker,
}

impl CollectHandler {
    /// Ends the session at its next poll.
    pub fn cancel(&self) {
        self.commands.cancel.store(true, Ordering::SeqCst);
        self.unparker.unpark();
    }

    /// Returns `true` if the session has been cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.commands.cancel.load(Ordering::SeqCst)
    }
}

struct Worker<S, T> {
    parker: crossbeam_utils::sync::Parker,
    commands: Arc<Commands>,
    queue: SectionQueue,
    options: CollectorOptions,
    sink: S,
    tuner: T,
}

impl<S: SectionSink, T: TuningControl> Worker<S, T> {
    fn process_batch(&mut self) {
        for buf in self.queue.drain() {
            match Section::parse(&buf) {
                Ok((section, _)) => self.sink.on_section(&section),
                Err(e) => log::debug!("dropped section: {}", e),
            }
        }
        if let Some(pids) = self.sink.requested_pids() {
            log::debug!("PIDs: {:?}", pids);
            self.tuner.change_pid_mapping(&pids);
        }
    }

    fn run(mut self) -> CollectionOutcome<S> {
        if !self.options.pids.is_empty() {
            self.tuner.change_pid_mapping(&self.options.pids);
        }

        let mut last_count = self.sink.entry_count();
        let mut idle_polls = 0;
        let reason = loop {
            self.parker.park_timeout(self.options.poll_interval);
            if self.commands.cancel.load(Ordering::SeqCst) {
                break CompletionReason::Cancelled;
            }

            self.process_batch();

            if self.options.completion == CompletionMode::Predicate && self.sink.is_complete() {
                break CompletionReason::Complete;
            }
            let count = self.sink.entry_count();
            if count > last_count {
                last_count = count;
                idle_polls = 0;
            } else {
                idle_polls += 1;
                if idle_polls >= self.options.stagnation_repeats {
                    break CompletionReason::Stagnation;
                }
            }
        };

        self.sink.finish();
        let entries = self.sink.entry_count();
        log::info!("collection ended ({:?}) with {} entries", reason, entries);
        CollectionOutcome {
            reason,
            entries,
            sink: self.sink,
        }
    }
}
