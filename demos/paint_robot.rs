// SPDX-FileCopyrightText: 2024 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! A solution to Advent of Code 2019 Day 11 built using the `intcode_vm` library, with the
//! robot's brain running as a task that the camera and motors talk to over channels.

use intcode_vm::prelude::*;
use intcode_vm::task::rendezvous;

use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum PanelColor {
    #[default]
    Black,
    White,
}

impl PanelColor {
    fn report(self) -> i64 {
        i64::from(self == Self::White)
    }

    fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Black,
            1 => Self::White,
            i => panic!("invalid paint color: {i}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    fn turn(self, code: i64) -> Self {
        match (code, self) {
            (0, Self::Up) | (1, Self::Down) => Self::Left,
            (0, Self::Right) | (1, Self::Left) => Self::Up,
            (0, Self::Down) | (1, Self::Up) => Self::Right,
            (0, Self::Left) | (1, Self::Right) => Self::Down,
            (i, _) => panic!("invalid direction code: {i}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
struct Location {
    x: i32,
    y: i32,
}

impl std::ops::AddAssign<Direction> for Location {
    fn add_assign(&mut self, dir: Direction) {
        match dir {
            Direction::Up => self.y -= 1,
            Direction::Right => self.x += 1,
            Direction::Down => self.y += 1,
            Direction::Left => self.x -= 1,
        }
    }
}

/// Run the robot until its brain halts, returning the color of every panel it saw, and how many
/// distinct panels it painted
fn paint(program: &Program, start: PanelColor) -> (HashMap<Location, PanelColor>, usize) {
    let (camera, brain_in) = rendezvous();
    let (brain_out, motors) = rendezvous();
    let brain = program
        .interpreter()
        .run_as_task(brain_in, brain_out)
        .expect("failed to spawn robot brain");

    let mut panels = HashMap::from([(Location::default(), start)]);
    let mut painted = HashSet::new();
    let mut location = Location::default();
    let mut direction = Direction::Up;

    // the brain drops its input when it halts, which ends the loop
    while camera
        .send(panels.get(&location).copied().unwrap_or_default().report())
        .is_ok()
    {
        let (Ok(color), Ok(turn)) = (motors.recv(), motors.recv()) else {
            break;
        };
        panels.insert(location, PanelColor::from_code(color));
        painted.insert(location);
        direction = direction.turn(turn);
        location += direction;
    }
    brain.join().expect("robot brain failed");
    (panels, painted.len())
}

fn main() {
    use std::env::args;
    use std::fs::read_to_string;
    let program: Program = read_to_string(args().nth(1).as_deref().expect("must provide file"))
        .expect("Failed to read file!")
        .parse()
        .expect("Could not parse program");

    let (_, painted) = paint(&program, PanelColor::Black);
    println!("part 1: {painted}");

    println!("part 2:");
    let (panels, _) = paint(&program, PanelColor::White);
    let (min_x, max_x) = panels
        .keys()
        .map(|l| l.x)
        .fold((i32::MAX, i32::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let (min_y, max_y) = panels
        .keys()
        .map(|l| l.y)
        .fold((i32::MAX, i32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            print!(
                "{}",
                match panels.get(&Location { x, y }).copied().unwrap_or_default() {
                    PanelColor::Black => ' ',
                    PanelColor::White => '#',
                }
            );
        }
        println!();
    }
}
