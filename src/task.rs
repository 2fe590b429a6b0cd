// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Channel-coupled execution
//!
//! An [Interpreter] can be moved onto its own thread with [`Interpreter::run_as_task`], where
//! every `IN` instruction blocks on a receive from its input channel, and every `OUT` instruction
//! blocks on a send to its output channel. With zero-capacity channels (see [rendezvous]), each
//! send waits for the matching receive, so interpreters wired together this way run in lockstep
//! with one another and with whatever code is on the other end.
//!
//! When the program halts, the task drops its output [Sender], so anything iterating over the
//! other end sees the stream end, and then reports an [Exit] through [`TaskHandle::halted`].
//!
//! By default, a blocked task waits forever. A timeout can be set with
//! [`TaskOptions::io_timeout`], and [`TaskHandle::cancel`] stops a task that is blocked on I/O.
//!
//! # Example
//!
//! ```
//! use intcode_vm::prelude::*;
//! use intcode_vm::task::rendezvous;
//!
//! // echoes its input back, then halts
//! let (to_vm, vm_in) = rendezvous();
//! let (vm_out, from_vm) = rendezvous();
//! let task = Interpreter::new([3, 0, 4, 0, 99]).run_as_task(vm_in, vm_out).unwrap();
//!
//! to_vm.send(1234).unwrap();
//! assert_eq!(from_vm.iter().collect::<Vec<_>>(), vec![1234]);
//! let interp = task.join().unwrap();
//! assert_eq!(interp.mem_get(0), Ok(1234));
//! ```

use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use crossbeam_channel::{Receiver, Sender};
use crossbeam_channel::{after, bounded, never, select};

use super::internals::Port;
use super::{Interpreter, InterpreterError, State, StepOutcome};

/// Create a zero-capacity channel, where every send blocks until it's received.
pub fn rendezvous() -> (Sender<i64>, Receiver<i64>) {
    bounded(0)
}

/// How a task finished, as reported through [`TaskHandle::halted`]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Exit {
    /// The program executed a `HALT` instruction
    Halted,
    /// The task stopped early; [`TaskHandle::join`] returns the reason
    Failed,
}

/// An error that stopped a channel-coupled interpreter
#[derive(Debug)]
pub enum TaskError {
    /// The interpreter itself hit an error
    Interpreter(InterpreterError),
    /// The program needed input, but every sender for the input channel was dropped
    InputClosed,
    /// The program produced output, but the receiver for the output channel was dropped
    OutputClosed,
    /// Waiting on a channel took longer than the configured timeout
    TimedOut(Duration),
    /// [`TaskHandle::cancel`] was called while the task was waiting on a channel
    Cancelled,
    /// The OS failed to spawn the thread
    Spawn(io::Error),
    /// The task's thread panicked
    Panicked,
}

impl PartialEq for TaskError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Interpreter(lhs), Self::Interpreter(rhs)) => lhs == rhs,
            (Self::TimedOut(lhs), Self::TimedOut(rhs)) => lhs == rhs,
            (Self::Spawn(lhs), Self::Spawn(rhs)) => lhs.kind() == rhs.kind(),
            (Self::InputClosed, Self::InputClosed)
            | (Self::OutputClosed, Self::OutputClosed)
            | (Self::Cancelled, Self::Cancelled)
            | (Self::Panicked, Self::Panicked) => true,
            _ => false,
        }
    }
}

impl Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Interpreter(e) => Display::fmt(e, f),
            TaskError::InputClosed => write!(f, "input channel closed while awaiting input"),
            TaskError::OutputClosed => write!(f, "output channel closed while sending output"),
            TaskError::TimedOut(d) => write!(f, "gave up waiting on a channel after {d:?}"),
            TaskError::Cancelled => write!(f, "task was cancelled"),
            TaskError::Spawn(e) => write!(f, "failed to spawn task: {e}"),
            TaskError::Panicked => write!(f, "task panicked"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskError::Interpreter(e) => Some(e),
            TaskError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InterpreterError> for TaskError {
    fn from(err: InterpreterError) -> Self {
        Self::Interpreter(err)
    }
}

/// Settings for [`Interpreter::run_as_task_with`]
#[derive(Debug, Default, Clone)]
pub struct TaskOptions {
    name: Option<String>,
    io_timeout: Option<Duration>,
}

impl TaskOptions {
    /// Name the task's thread. The name also shows up in log events.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fail with [`TaskError::TimedOut`] if a single `IN` or `OUT` instruction waits longer
    /// than `timeout`.
    #[must_use]
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }
}

/// The channels an interpreter is coupled to while it runs
struct Link<'a> {
    input: &'a Receiver<i64>,
    output: &'a Sender<i64>,
    cancel: Receiver<()>,
    timeout: Option<Duration>,
}

impl Link<'_> {
    fn deadline(&self) -> Receiver<Instant> {
        self.timeout.map_or_else(never, after)
    }

    fn timed_out(&self) -> TaskError {
        TaskError::TimedOut(self.timeout.unwrap_or_default())
    }

    fn recv(&mut self) -> Result<i64, TaskError> {
        let deadline = self.deadline();
        loop {
            select! {
                recv(self.input) -> msg => return msg.map_err(|_| TaskError::InputClosed),
                recv(self.cancel) -> msg => if msg.is_ok() { return Err(TaskError::Cancelled) },
                recv(deadline) -> _ => return Err(self.timed_out()),
            }
            // the handle was dropped without cancelling, and a disconnected channel is always
            // ready, so stop listening to it
            self.cancel = never();
        }
    }

    fn send(&mut self, value: i64) -> Result<(), TaskError> {
        let deadline = self.deadline();
        loop {
            select! {
                send(self.output, value) -> res => return res.map_err(|_| TaskError::OutputClosed),
                recv(self.cancel) -> msg => if msg.is_ok() { return Err(TaskError::Cancelled) },
                recv(deadline) -> _ => return Err(self.timed_out()),
            }
            self.cancel = never();
        }
    }
}

/// Feeds `IN` instructions from the queued inputs, then from the input channel, and hands `OUT`
/// values to the output channel, holding on to whatever stopped it from doing either.
struct ChannelPort<'l, 'a> {
    queued: &'l mut VecDeque<i64>,
    link: &'l mut Link<'a>,
    failure: Option<TaskError>,
}

impl Port for ChannelPort<'_, '_> {
    fn read(&mut self) -> Option<i64> {
        if let Some(val) = self.queued.pop_front() {
            return Some(val);
        }
        match self.link.recv() {
            Ok(val) => Some(val),
            Err(err) => {
                self.failure = Some(err);
                None
            }
        }
    }

    fn write(&mut self, value: i64) -> bool {
        match self.link.send(value) {
            Ok(()) => true,
            Err(err) => {
                self.failure = Some(err);
                false
            }
        }
    }
}

impl Interpreter {
    /// Run on the current thread until the program halts, taking each input from `input` and
    /// sending each output to `output`, blocking for as long as it takes.
    ///
    /// Inputs queued with [`push_input`][Interpreter::push_input] are consumed before anything
    /// is received from `input`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Interpreter`] if the interpreter fails,
    /// [`TaskError::InputClosed`] if input is needed but `input` is disconnected, or
    /// [`TaskError::OutputClosed`] if output is produced but `output` is disconnected.
    pub fn run_with_channels(
        &mut self,
        input: &Receiver<i64>,
        output: &Sender<i64>,
    ) -> Result<(), TaskError> {
        self.run_linked(&mut Link {
            input,
            output,
            cancel: never(),
            timeout: None,
        })
    }

    fn run_linked(&mut self, link: &mut Link<'_>) -> Result<(), TaskError> {
        let mut queued = std::mem::take(&mut self.pending);
        let result = self.pump(link, &mut queued);
        self.pending = queued;
        result
    }

    fn pump(&mut self, link: &mut Link<'_>, queued: &mut VecDeque<i64>) -> Result<(), TaskError> {
        let mut port = ChannelPort {
            queued,
            link,
            failure: None,
        };
        loop {
            match self.step(&mut port)? {
                StepOutcome::Running => (),
                StepOutcome::Stopped(State::Halted) => return Ok(()),
                // the instruction that couldn't do its I/O has not been executed
                StepOutcome::Stopped(State::Awaiting) => {
                    return Err(port.failure.take().unwrap_or(TaskError::InputClosed));
                }
            }
        }
    }

    /// Move the interpreter onto its own thread, coupled to `input` and `output`.
    ///
    /// Equivalent to [`run_as_task_with`][Interpreter::run_as_task_with] with default
    /// [`TaskOptions`], meaning the task blocks for as long as it takes on every `IN` and `OUT`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Spawn`] if the thread could not be spawned.
    pub fn run_as_task(
        self,
        input: Receiver<i64>,
        output: Sender<i64>,
    ) -> Result<TaskHandle, TaskError> {
        self.run_as_task_with(input, output, TaskOptions::default())
    }

    /// Move the interpreter onto its own thread, coupled to `input` and `output`, configured
    /// with `options`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Spawn`] if the thread could not be spawned.
    pub fn run_as_task_with(
        mut self,
        input: Receiver<i64>,
        output: Sender<i64>,
        options: TaskOptions,
    ) -> Result<TaskHandle, TaskError> {
        let name = options.name.unwrap_or_else(|| String::from("intcode"));
        let (cancel_tx, cancel_rx) = bounded(1);
        let (exit_tx, exit_rx) = bounded(1);
        let task_name = name.clone();

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::debug!(task = %task_name, "task started");
                let mut link = Link {
                    input: &input,
                    output: &output,
                    cancel: cancel_rx,
                    timeout: options.io_timeout,
                };
                let result = self.run_linked(&mut link);
                drop(link);
                // closes both channels before reporting the exit
                drop(input);
                drop(output);
                let exit = match &result {
                    Ok(()) => {
                        tracing::debug!(
                            task = %task_name,
                            extended_cells = self.code.sparse_len(),
                            "task halted"
                        );
                        Exit::Halted
                    }
                    Err(TaskError::Cancelled) => {
                        tracing::debug!(task = %task_name, "task cancelled");
                        Exit::Failed
                    }
                    Err(err) => {
                        tracing::warn!(task = %task_name, %err, "task failed");
                        Exit::Failed
                    }
                };
                // nobody may be listening, and that's fine
                let _ = exit_tx.send(exit);
                (self, result)
            })
            .map_err(TaskError::Spawn)?;

        Ok(TaskHandle {
            name,
            cancel: cancel_tx,
            exit: exit_rx,
            thread,
        })
    }
}

/// A handle to an interpreter running on its own thread
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    cancel: Sender<()>,
    exit: Receiver<Exit>,
    thread: JoinHandle<(Interpreter, Result<(), TaskError>)>,
}

impl TaskHandle {
    /// The name of the task
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A channel that receives a single [Exit] once the task stops, after its output channel
    /// has been closed.
    ///
    /// Useful in a [`select!`][crossbeam_channel::select] alongside the task's output channel.
    pub fn halted(&self) -> &Receiver<Exit> {
        &self.exit
    }

    /// Whether the task's thread has finished
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Ask the task to stop. Takes effect the next time it waits on either of its channels, or
    /// immediately if it already is.
    pub fn cancel(&self) {
        // a full buffer means cancellation was already requested
        let _ = self.cancel.try_send(());
    }

    /// Wait for the task to finish, and get back the interpreter in its final state.
    ///
    /// # Errors
    ///
    /// Returns the [`TaskError`] that stopped the task, or [`TaskError::Panicked`] if its
    /// thread panicked.
    pub fn join(self) -> Result<Interpreter, TaskError> {
        let (interp, result) = self.thread.join().map_err(|_| TaskError::Panicked)?;
        result.map(|()| interp)
    }

    /// Wait for the task to finish, and get back the interpreter alongside how it finished, even
    /// if it failed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Panicked`] if the task's thread panicked.
    pub fn join_with_state(self) -> Result<(Interpreter, Result<(), TaskError>), TaskError> {
        self.thread.join().map_err(|_| TaskError::Panicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_thread_channels() {
        let (to_vm, vm_in) = crossbeam_channel::unbounded();
        let (vm_out, from_vm) = crossbeam_channel::unbounded();
        to_vm.send(42).unwrap();
        let mut interp = Interpreter::new([3, 0, 4, 0, 99]);
        assert_eq!(interp.run_with_channels(&vm_in, &vm_out), Ok(()));
        assert_eq!(from_vm.try_recv(), Ok(42));
        assert!(interp.is_halted());
    }

    #[test]
    fn same_thread_input_closed() {
        let (to_vm, vm_in) = crossbeam_channel::unbounded();
        let (vm_out, _from_vm) = crossbeam_channel::unbounded();
        drop(to_vm);
        let mut interp = Interpreter::new([3, 0, 4, 0, 99]);
        let before = interp.clone();
        assert_eq!(
            interp.run_with_channels(&vm_in, &vm_out),
            Err(TaskError::InputClosed)
        );
        // nothing was consumed, so it can be resumed with another channel
        assert_eq!(interp, before);
    }

    #[test]
    fn same_thread_output_closed() {
        let (_to_vm, vm_in) = crossbeam_channel::unbounded();
        let (vm_out, from_vm) = crossbeam_channel::unbounded();
        drop(from_vm);
        let mut interp = Interpreter::new([104, 7, 99]);
        let before = interp.clone();
        assert_eq!(
            interp.run_with_channels(&vm_in, &vm_out),
            Err(TaskError::OutputClosed)
        );
        // the undelivered `OUT` is still the next instruction
        assert_eq!(interp, before);
        assert_eq!(interp.instr_ptr(), 0);
        assert_eq!(interp.result(), 104);

        let (vm_out, from_vm) = crossbeam_channel::unbounded();
        assert_eq!(interp.run_with_channels(&vm_in, &vm_out), Ok(()));
        assert_eq!(from_vm.try_recv(), Ok(7));
        assert_eq!(interp.result(), 7);
    }

    #[test]
    fn queued_inputs_come_first() {
        let (to_vm, vm_in) = crossbeam_channel::unbounded();
        let (vm_out, from_vm) = crossbeam_channel::unbounded();
        to_vm.send(2).unwrap();
        // outputs the difference of two inputs
        let mut interp = Interpreter::new([3, 20, 3, 21, 1002, 21, -1, 21, 1, 20, 21, 20, 4, 20, 99]);
        interp.push_input(5);
        assert_eq!(interp.run_with_channels(&vm_in, &vm_out), Ok(()));
        assert_eq!(from_vm.try_recv(), Ok(3));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            TaskError::from(InterpreterError::UnknownOpcode(42)).to_string(),
            "encountered unknown opcode 42"
        );
        assert!(TaskError::Cancelled.source().is_none());
        assert_ne!(TaskError::Cancelled, TaskError::Panicked);
    }
}
