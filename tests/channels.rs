//! Test interpreters running as tasks, coupled together and to the test over channels.
// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

use intcode_vm::prelude::*;
use intcode_vm::task::{Exit, rendezvous};
use intcode_vm::{InterpreterError, TaskError, TaskHandle, TaskOptions};

use crossbeam_channel::{RecvTimeoutError, TryRecvError, never, select};
use itertools::Itertools;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Reads a single input into address 0 and halts
const READ_ONCE: [i64; 3] = [3, 0, 99];

/// Adds 1 to its input, outputs it, and halts
const INCREMENT: &str = "3,9,1001,9,1,9,4,9,99,0";

/// From the Advent of Code 2019 Day 7 part 2 examples
const FEEDBACK: &str = "3,26,1001,26,-4,26,3,27,1002,27,2,27,1,27,26,27,4,27,1001,28,-1,28,1005,\
                        28,6,99,0,0,5";

#[test]
fn echo_many() {
    // echo inputs until a 0 is read, then halt
    let program = Program::new([3, 13, 1006, 13, 12, 4, 13, 1105, 1, 0, 0, 0, 99, 0]);
    let (to_vm, vm_in) = rendezvous();
    let (vm_out, from_vm) = rendezvous();
    let task = program.interpreter().run_as_task(vm_in, vm_out).unwrap();

    let feeder = thread::spawn(move || {
        for i in [5, -3, 1 << 40, 0] {
            to_vm.send(i).unwrap();
        }
    });
    assert_eq!(from_vm.iter().collect_vec(), vec![5, -3, 1 << 40]);
    feeder.join().unwrap();
    let interp = task.join().unwrap();
    assert!(interp.is_halted());
    assert_eq!(interp.result(), 1 << 40);
}

#[test]
fn chain_of_tasks() {
    let program: Program = INCREMENT.parse().unwrap();
    let (to_first, mut prev) = rendezvous();
    let tasks: Vec<TaskHandle> = (0..10)
        .map(|_| {
            let (tx, rx) = rendezvous();
            let input = std::mem::replace(&mut prev, rx);
            program.interpreter().run_as_task(input, tx).unwrap()
        })
        .collect();
    to_first.send(0).unwrap();
    assert_eq!(prev.recv(), Ok(10));
    for task in tasks {
        assert!(task.join().unwrap().is_halted());
    }
}

#[test]
fn feedback_ring_of_tasks() {
    let program: Program = FEEDBACK.parse().unwrap();
    let (to_first, mut prev) = rendezvous();
    let amps: Vec<TaskHandle> = [9, 8, 7, 6, 5]
        .into_iter()
        .enumerate()
        .map(|(i, phase)| {
            let (tx, rx) = rendezvous();
            let input = std::mem::replace(&mut prev, rx);
            let mut amp = program.interpreter();
            amp.push_input(phase);
            amp.run_as_task_with(input, tx, TaskOptions::default().name(format!("amp-{i}")))
                .unwrap()
        })
        .collect();

    assert_eq!(amps.iter().map(TaskHandle::name).collect_vec(), [
        "amp-0", "amp-1", "amp-2", "amp-3", "amp-4"
    ]);

    let mut signal = 0;
    let _ = to_first.send(signal);
    for out in prev.iter() {
        signal = out;
        let _ = to_first.send(out);
    }
    assert_eq!(signal, 139629729);
    for amp in amps {
        let interp = amp.join().unwrap();
        assert!(interp.is_halted());
        assert_eq!(interp.mem_get(28), Ok(0));
    }
}

#[test]
fn halted_signal_follows_output() {
    let (_to_vm, vm_in) = rendezvous();
    let (vm_out, from_vm) = rendezvous();
    let watcher = from_vm.clone();
    let task = Interpreter::new([104, 7, 104, 8, 99])
        .run_as_task(vm_in, vm_out)
        .unwrap();

    let mut seen = Vec::new();
    let mut output = from_vm;
    let exit = loop {
        let mut closed = false;
        select! {
            recv(output) -> msg => match msg {
                Ok(val) => seen.push(val),
                Err(_) => closed = true,
            },
            recv(task.halted()) -> exit => break exit,
        }
        if closed {
            output = never();
        }
    };
    assert_eq!(exit, Ok(Exit::Halted));
    // the stream was closed before the exit was reported
    assert_eq!(watcher.try_recv(), Err(TryRecvError::Disconnected));
    assert_eq!(seen, [7, 8]);
    task.join().unwrap();
}

#[test]
fn cancel_blocked_task() {
    let (_to_vm, vm_in) = rendezvous();
    let (vm_out, _from_vm) = rendezvous();
    let task = Interpreter::new(READ_ONCE).run_as_task(vm_in, vm_out).unwrap();
    assert_eq!(
        task.halted().recv_timeout(Duration::from_millis(50)),
        Err(RecvTimeoutError::Timeout)
    );
    task.cancel();
    // cancelling twice is harmless
    task.cancel();
    assert_eq!(
        task.halted().recv_timeout(Duration::from_secs(10)),
        Ok(Exit::Failed)
    );
    let (interp, result) = task.join_with_state().unwrap();
    assert_eq!(result, Err(TaskError::Cancelled));
    // still waiting on the same `IN` instruction
    assert_eq!(interp.instr_ptr(), 0);
    assert!(!interp.is_halted());
}

#[test]
fn input_timeout() {
    let timeout = Duration::from_millis(20);
    let (_to_vm, vm_in) = rendezvous();
    let (vm_out, _from_vm) = rendezvous();
    let task = Interpreter::new(READ_ONCE)
        .run_as_task_with(vm_in, vm_out, TaskOptions::default().io_timeout(timeout))
        .unwrap();
    assert_eq!(task.join().unwrap_err(), TaskError::TimedOut(timeout));
}

#[test]
fn output_timeout() {
    let timeout = Duration::from_millis(20);
    let (_to_vm, vm_in) = rendezvous();
    let (vm_out, _from_vm) = rendezvous();
    let task = Interpreter::new([104, 7, 99])
        .run_as_task_with(vm_in, vm_out, TaskOptions::default().io_timeout(timeout))
        .unwrap();
    let (interp, result) = task.join_with_state().unwrap();
    assert_eq!(result, Err(TaskError::TimedOut(timeout)));
    // the value was never received, so the `OUT` hasn't happened yet
    assert_eq!(interp.instr_ptr(), 0);
    assert_eq!(interp.result(), 104);
}

#[test]
fn cancel_blocked_output() {
    let (_to_vm, vm_in) = rendezvous();
    let (vm_out, from_vm) = rendezvous();
    let task = Interpreter::new([104, 7, 99]).run_as_task(vm_in, vm_out).unwrap();
    assert_eq!(
        task.halted().recv_timeout(Duration::from_millis(50)),
        Err(RecvTimeoutError::Timeout)
    );
    task.cancel();
    let (mut interp, result) = task.join_with_state().unwrap();
    assert_eq!(result, Err(TaskError::Cancelled));
    assert_eq!(interp.instr_ptr(), 0);
    assert!(from_vm.try_recv().is_err());

    // running it again delivers the output that was held back
    assert_eq!(interp.run_to_halt(empty()), Ok((7, vec![7])));
}

#[test]
fn closed_channels() {
    let (to_vm, vm_in) = rendezvous();
    let (vm_out, _from_vm) = rendezvous();
    drop(to_vm);
    let task = Interpreter::new(READ_ONCE).run_as_task(vm_in, vm_out).unwrap();
    assert_eq!(task.join().unwrap_err(), TaskError::InputClosed);

    let (_to_vm, vm_in) = rendezvous();
    let (vm_out, from_vm) = rendezvous();
    drop(from_vm);
    let task = Interpreter::new([104, 1, 99]).run_as_task(vm_in, vm_out).unwrap();
    assert_eq!(task.join().unwrap_err(), TaskError::OutputClosed);
}

#[test]
fn interpreter_error_in_task() {
    let (_to_vm, vm_in) = rendezvous();
    let (vm_out, from_vm) = rendezvous();
    let task = Interpreter::new([1101, 1, 1, 5, 50, 0])
        .run_as_task(vm_in, vm_out)
        .unwrap();
    // the output stream still ends
    assert!(from_vm.iter().next().is_none());
    let (mut interp, result) = task.join_with_state().unwrap();
    assert_eq!(
        result,
        Err(TaskError::Interpreter(InterpreterError::UnknownOpcode(50)))
    );
    assert_eq!(
        interp.run_through_inputs(empty()),
        Err(InterpreterError::Poisoned)
    );
}

#[test]
fn hook_runs_on_task_thread() {
    let threads = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&threads);
    let mut interp: Interpreter = INCREMENT.parse::<Program>().unwrap().interpreter();
    interp.on_instruction(move |_| {
        let name = thread::current().name().map(str::to_owned);
        sink.lock().unwrap().push(name);
    });

    let (to_vm, vm_in) = rendezvous();
    let (vm_out, from_vm) = rendezvous();
    let task = interp
        .run_as_task_with(vm_in, vm_out, TaskOptions::default().name("incrementer"))
        .unwrap();
    to_vm.send(1).unwrap();
    assert_eq!(from_vm.recv(), Ok(2));
    task.join().unwrap();

    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 4);
    assert!(
        threads
            .iter()
            .all(|name| name.as_deref() == Some("incrementer"))
    );
}
