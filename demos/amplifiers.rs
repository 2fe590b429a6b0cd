// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! A solution to Advent of Code 2019 Day 7 built using the `intcode_vm` library.
//!
//! Part 1 chains the amplifiers on a single thread with [`Interpreter::run_until_next_output`].
//! Part 2 gives each amplifier its own task, wired into a ring with rendezvous channels.
//!
//! Set `RUST_LOG=debug` to see each task start and halt.

use intcode_vm::prelude::*;
use intcode_vm::task::rendezvous;
use intcode_vm::{TaskHandle, TaskOptions};

use itertools::Itertools;
use tracing_subscriber::EnvFilter;

const AMP_NAMES: [&str; 5] = ["amp-a", "amp-b", "amp-c", "amp-d", "amp-e"];

fn serial(program: &Program, phases: &[i64]) -> i64 {
    phases.iter().fold(0, |signal, &phase| {
        let mut amp = program.interpreter_with_inputs([phase]);
        match amp.run_until_next_output(signal).unwrap() {
            Yielded::Output(out) => out,
            stopped => panic!("amplifier with phase {phase} gave no output: {stopped:?}"),
        }
    })
}

fn feedback(program: &Program, phases: &[i64]) -> i64 {
    let (to_first, mut prev) = rendezvous();
    let amps: Vec<TaskHandle> = phases
        .iter()
        .zip(AMP_NAMES)
        .map(|(&phase, name)| {
            let (tx, rx) = rendezvous();
            let input = std::mem::replace(&mut prev, rx);
            program
                .interpreter_with_inputs([phase])
                .run_as_task_with(input, tx, TaskOptions::default().name(name))
                .expect("failed to spawn amplifier")
        })
        .collect();

    let mut signal = 0;
    // once the first amplifier halts, its input is gone and the last signal goes nowhere
    let _ = to_first.send(signal);
    for out in prev.iter() {
        signal = out;
        let _ = to_first.send(out);
    }
    for amp in amps {
        let name = amp.name().to_owned();
        if let Err(err) = amp.join() {
            panic!("{name} failed: {err}");
        }
    }
    signal
}

fn main() {
    use std::env::args;
    use std::fs::read_to_string;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let program: Program = read_to_string(args().nth(1).as_deref().expect("must provide file"))
        .expect("Failed to read file!")
        .parse()
        .expect("Could not parse program");

    let part1 = (0..5)
        .permutations(5)
        .map(|phases| serial(&program, &phases))
        .max()
        .expect("at least one permutation");
    println!("part 1: {part1}");

    let part2 = (5..10)
        .permutations(5)
        .map(|phases| feedback(&program, &phases))
        .max()
        .expect("at least one permutation");
    println!("part 2: {part2}");
}
