//! Per-session execution context.
//!
//! Every chart is owned by one [`ChartLoop`] and only ever touched from it.
//! Other sessions reach the chart by sending jobs through a [`Dispatcher`];
//! jobs from one sender run in the order they were sent.
//!
//! A loop that has been closed discards whatever is still queued. Jobs are
//! dropped unrun, so anything a job owns is released.

use crate::error::{SyncError, SyncResult};
use crate::host::Chart;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Work to run against a session's chart.
pub type ChartJob = Box<dyn FnOnce(&mut dyn Chart) + Send>;

/// Hands jobs to the execution context that owns a chart.
pub trait Dispatcher: Send + Sync {
    /// Queue `job` without waiting for it to run. Fails with
    /// [`SyncError::Unreachable`] if the context no longer accepts work.
    fn dispatch(&self, job: ChartJob) -> SyncResult<()>;

    /// Queue `job` to run once `due` has passed.
    fn dispatch_at(&self, due: Instant, job: ChartJob) -> SyncResult<()>;
}

/// Commands accepted by a [`ChartLoop`].
pub enum ChartCommand {
    Run(ChartJob),
    /// Run the job no earlier than the given instant.
    RunAt(Instant, ChartJob),
    Close,
}

/// [`Dispatcher`] backed by the command channel of a [`ChartLoop`].
#[derive(Clone)]
pub struct ChannelDispatcher {
    label: String,
    tx: Sender<ChartCommand>,
}

impl ChannelDispatcher {
    fn send(&self, command: ChartCommand) -> SyncResult<()> {
        self.tx.send(command).map_err(|_| SyncError::Unreachable {
            key: self.label.clone(),
        })
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, job: ChartJob) -> SyncResult<()> {
        self.send(ChartCommand::Run(job))
    }

    fn dispatch_at(&self, due: Instant, job: ChartJob) -> SyncResult<()> {
        self.send(ChartCommand::RunAt(due, job))
    }
}

/// Sending side of a [`ChartLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    label: String,
    tx: Sender<ChartCommand>,
}

impl LoopHandle {
    /// A dispatcher feeding the same loop.
    pub fn dispatcher(&self) -> ChannelDispatcher {
        ChannelDispatcher {
            label: self.label.clone(),
            tx: self.tx.clone(),
        }
    }

    /// Run `f` on the loop's chart.
    pub fn run<F>(&self, f: F) -> SyncResult<()>
    where
        F: FnOnce(&mut dyn Chart) + Send + 'static,
    {
        self.dispatcher().dispatch(Box::new(f))
    }

    /// Ask the loop to stop after the commands already queued. Timed jobs
    /// that are not due yet run right away.
    pub fn close(&self) {
        if self.tx.send(ChartCommand::Close).is_err() {
            log::debug!("{}: loop already stopped", self.label);
        }
    }
}

/// Command loop that owns a chart.
pub struct ChartLoop<C> {
    label: String,
    chart: C,
    rx: Receiver<ChartCommand>,
    /// Timed jobs, in no particular order.
    timers: Vec<(Instant, ChartJob)>,
    closed: bool,
}

impl<C: Chart> ChartLoop<C> {
    /// Create a loop owning `chart` and the handle used to feed it.
    pub fn new(chart: C) -> (Self, LoopHandle) {
        let identity = chart.identity();
        let label = format!("{}/{}", identity.symbol, identity.time_frame);
        let (tx, rx) = channel();
        let handle = LoopHandle {
            label: label.clone(),
            tx,
        };
        let chart_loop = Self {
            label,
            chart,
            rx,
            timers: Vec::new(),
            closed: false,
        };
        (chart_loop, handle)
    }

    pub fn chart(&self) -> &C {
        &self.chart
    }

    /// Direct access to the chart, for work done on the loop's own thread
    /// (session startup, local user edits).
    pub fn chart_mut(&mut self) -> &mut C {
        &mut self.chart
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run every queued job and every timed job that is due, without
    /// blocking. Returns the number of jobs run.
    ///
    /// Once the loop is closed this only discards late commands.
    pub fn run_pending(&mut self) -> usize {
        if self.closed {
            self.discard_queued();
            return 0;
        }

        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(command) => {
                    ran += self.execute(command);
                    if self.closed {
                        return ran;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    ran += self.shutdown();
                    return ran;
                }
            }
        }
        ran + self.run_due(Instant::now())
    }

    /// Block running jobs until the loop is closed or every sender is gone.
    /// Returns the chart.
    pub fn run(mut self) -> C {
        log::debug!("{}: loop started", self.label);
        while !self.closed {
            self.run_due(Instant::now());

            let next_due = self.timers.iter().map(|(due, _)| *due).min();
            let received = match next_due {
                Some(due) => self
                    .rx
                    .recv_timeout(due.saturating_duration_since(Instant::now())),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(command) => {
                    self.execute(command);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("{}: all senders gone", self.label);
                    self.shutdown();
                }
            }
        }
        log::debug!("{}: loop stopped", self.label);
        self.chart
    }

    /// Returns the number of jobs run.
    fn execute(&mut self, command: ChartCommand) -> usize {
        match command {
            ChartCommand::Run(job) => {
                job(&mut self.chart);
                1
            }
            ChartCommand::RunAt(due, job) => {
                self.timers.push((due, job));
                0
            }
            ChartCommand::Close => self.shutdown(),
        }
    }

    /// Run timed jobs due at `now`, earliest first.
    fn run_due(&mut self, now: Instant) -> usize {
        let mut due: Vec<(Instant, ChartJob)> = Vec::new();
        let mut index = 0;
        while index < self.timers.len() {
            if self.timers[index].0 <= now {
                due.push(self.timers.swap_remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|(at, _)| *at);

        let ran = due.len();
        for (_, job) in due {
            job(&mut self.chart);
        }
        ran
    }

    /// Fire the remaining timed jobs, then drop everything still queued.
    fn shutdown(&mut self) -> usize {
        self.closed = true;
        let ran = match self.timers.iter().map(|(due, _)| *due).max() {
            Some(last) => self.run_due(last),
            None => 0,
        };
        self.discard_queued();
        ran
    }

    fn discard_queued(&mut self) {
        let mut discarded = 0;
        while let Ok(command) = self.rx.try_recv() {
            if !matches!(command, ChartCommand::Close) {
                discarded += 1;
            }
        }
        if discarded > 0 {
            log::debug!("{}: discarded {} jobs after close", self.label, discarded);
        }
    }
}

impl<C: Chart + Send + 'static> ChartLoop<C> {
    /// Run the loop on its own thread. Joining yields the chart.
    pub fn spawn(self) -> JoinHandle<C> {
        thread::spawn(move || self.run())
    }
}
