// SPDX-FileCopyrightText: 2024 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD
#![warn(missing_docs)]

//! Library providing an Intcode virtual machine
//!
//! [`Interpreter`] is a fully-functional Intcode interpreter, with all of the [Opcodes] and
//! [Parameter Modes] defined in the completed Intcode computer for [Day 9]. It uses [`i64`] as
//! the type of Intcode integers, and backs memory past the end of the program image with a sparse
//! map, so programs can freely use addresses far beyond their own length.
//!
//! It can be driven in three ways:
//!
//! * run to completion with all input supplied up front ([`Interpreter::run_to_halt`])
//! * resumed one output at a time ([`Interpreter::run_until_next_output`]), which is enough to
//!   wire several interpreters into a feedback loop on a single thread
//! * run on its own thread, exchanging every input and output over rendezvous channels
//!   ([`Interpreter::run_as_task`])
//!
//! # Example
//!
//! ```rust
//! use intcode_vm::prelude::*;
//! let mut interpreter = Interpreter::new(vec![104, 1024, 99]);
//!
//! assert_eq!(
//!     interpreter.run_through_inputs(empty()).unwrap(),
//!     (vec![1024], State::Halted)
//! );
//! ```
//!
//! # Example: a pair of interpreters talking over channels
//!
//! ```rust
//! use intcode_vm::prelude::*;
//! use intcode_vm::task::rendezvous;
//!
//! // adds 1 to its input, outputs it, and halts
//! let program: Program = "3,9,1001,9,1,9,4,9,99,0".parse().unwrap();
//! let (to_a, a_in) = rendezvous();
//! let (a_out, b_in) = rendezvous();
//! let (b_out, from_b) = rendezvous();
//!
//! let a = program.interpreter().run_as_task(a_in, a_out).unwrap();
//! let b = program.interpreter().run_as_task(b_in, b_out).unwrap();
//!
//! to_a.send(40).unwrap();
//! assert_eq!(from_b.recv(), Ok(42));
//! assert!(a.join().unwrap().is_halted());
//! assert!(b.join().unwrap().is_halted());
//! ```
//!
//! [Opcodes]: https://esolangs.org/wiki/Intcode#Opcodes
//! [Parameter Modes]: https://esolangs.org/wiki/Intcode#Parameter_Modes
//! [Day 9]: https://adventofcode.com/2019/day/9

/// A module implementing internal logic that doesn't fit cleanly into the module hierarchy
mod internals;

/// A module providing the two-tier memory: a dense copy of the program image, and a sparse map
/// for everything past it.
mod mmu;

pub mod program;
pub mod task;
pub mod trace;

use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::iter::{self, empty};
use std::ops::{Index, IndexMut, Range};

pub use program::{ParseProgramError, Program};
pub use task::{TaskError, TaskHandle, TaskOptions};

/// A small module that re-exports items useful when working with the Intcode interpreter
pub mod prelude {
    pub use crate::{Interpreter, Program, State, StepOutcome, Yielded};
    pub use std::iter::empty;
}

use mmu::IntcodeMem;

/// The state of the intcode system, returned whenever the intcode system has stopped.
///
/// [Awaiting](State::Awaiting) means that there are more instructions to execute, but all input
/// has been consumed and the next instruction requires input.
///
/// [Halted](State::Halted) means that a `HALT` instruction has been executed. Once it's been
/// returned, no more instructions will be executed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Execution is awaiting input
    Awaiting,
    /// Execution has halted
    Halted,
}

#[derive(Debug, PartialEq, Eq, Clone)]
/// An error occured when executing an intcode instruction
pub enum InterpreterError {
    /// An invalid opcode was encountered. Contains the two-digit base opcode.
    UnknownOpcode(i64),
    /// An unknown parameter mode was encountered
    UnknownMode(i64),
    /// A parameter referenced a negative memory address
    InvalidAddress(InvalidAddress),
    /// A jump resolved to a negative address
    JumpToNegative(i64),
    /// An instruction tried to write to an immediate destination
    InvalidDestinationMode(i64),
    /// [`Interpreter::run_to_halt`] ran out of input before the program halted
    InputExhausted,
    /// An interpreter was used after previously erroring out
    Poisoned,
}

impl Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterError::UnknownOpcode(n) => write!(f, "encountered unknown opcode {n}"),
            InterpreterError::UnknownMode(mode) => {
                write!(f, "encountered unknown parameter mode {mode}")
            }
            InterpreterError::InvalidAddress(err) => Display::fmt(err, f),
            InterpreterError::JumpToNegative(n) => write!(f, "jumped to negative address {n}"),
            InterpreterError::InvalidDestinationMode(i) => {
                write!(f, "code attempted to write to immediate {i}")
            }
            InterpreterError::InputExhausted => {
                write!(f, "program needed more input than was provided")
            }
            InterpreterError::Poisoned => {
                write!(f, "tried to reuse an interpreter after a fatal error")
            }
        }
    }
}

impl Error for InterpreterError {}

#[repr(transparent)]
/// Attempted to access the contained negative memory address
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct InvalidAddress(pub i64);

impl Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not access negative address {}", self.0)
    }
}

impl Error for InvalidAddress {}

impl From<InvalidAddress> for InterpreterError {
    fn from(i: InvalidAddress) -> Self {
        Self::InvalidAddress(i)
    }
}

/// A mode digit other than `0`, `1`, or `2` was found in an instruction
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct UnknownMode(i64);

impl UnknownMode {
    /// The offending digit
    pub const fn digit(self) -> i64 {
        self.0
    }
}

impl Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown parameter mode {}", self.0)
    }
}

impl Error for UnknownMode {}

impl From<UnknownMode> for InterpreterError {
    fn from(mode: UnknownMode) -> Self {
        Self::UnknownMode(mode.digit())
    }
}

/// Parameter mode for Intcode instruction
///
/// Intcode instruction parameters each have a mode:  [positional], [immediate], or [relative].
///
/// When executing an intcode instruction, the instruction's parameters are interpreted in
/// accordance with their associated modes.
///
/// [positional]: ParamMode::Positional
/// [immediate]: ParamMode::Immediate
/// [relative]: ParamMode::Relative
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ParamMode {
    /// Positional Mode
    ///
    /// A parameter in positional mode evaluates to the value at the address specified by the
    /// parameter.
    Positional = 0,
    /// Immediate Mode
    ///
    /// A parameter in immediate mode evaluates directly to the value specified. Instructions which
    /// write to memory may not use immediate mode for their destinations.
    #[doc(alias = "#")]
    Immediate = 1,
    /// Relative Mode
    ///
    /// A parameter in relative mode evaluates to the value at the address specified by the
    /// parameter, added to the [Relative Base], which starts out as `0` but can be modified
    /// throughout the program's execution.
    ///
    /// [Relative Base]: https://adventofcode.com/2019/day/9
    #[doc(alias = "@")]
    Relative = 2,
}

impl ParamMode {
    /// Extract the modes of all three parameters from an instruction int.
    ///
    /// ```
    /// use intcode_vm::ParamMode;
    /// assert_eq!(
    ///     ParamMode::extract(1002),
    ///     Ok([ParamMode::Positional, ParamMode::Immediate, ParamMode::Positional])
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`UnknownMode`] if any of the mode digits is not `0`, `1`, or `2`.
    pub fn extract(op: i64) -> Result<[ParamMode; 3], UnknownMode> {
        Ok([
            ((op / 100) % 10).try_into()?,   // C (hundreds place)
            ((op / 1000) % 10).try_into()?,  // B (thousands place)
            ((op / 10000) % 10).try_into()?, // A (ten thousands place)
        ])
    }
}

impl Display for ParamMode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamMode::Positional => Ok(()),
            ParamMode::Immediate => write!(fmt, "#"),
            ParamMode::Relative => write!(fmt, "@"),
        }
    }
}

impl TryFrom<i64> for ParamMode {
    type Error = UnknownMode;
    fn try_from(i: i64) -> Result<Self, Self::Error> {
        match i {
            0 => Ok(ParamMode::Positional),
            1 => Ok(ParamMode::Immediate),
            2 => Ok(ParamMode::Relative),
            _ => Err(UnknownMode(i)),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// An Intcode `OpCode`
#[allow(missing_docs, reason = "trivial")]
pub enum OpCode {
    Add = 1,
    Mul = 2,
    In = 3,
    Out = 4,
    Jnz = 5,
    Jz = 6,
    Lt = 7,
    Eq = 8,
    Rbo = 9,
    Halt = 99,
}

impl OpCode {
    /// The number of ints the instruction occupies, including the opcode itself
    pub const fn width(self) -> i64 {
        match self {
            Self::Add | Self::Mul | Self::Lt | Self::Eq => 4,
            Self::Jnz | Self::Jz => 3,
            Self::In | Self::Out | Self::Rbo => 2,
            Self::Halt => 1,
        }
    }
}

impl TryFrom<i64> for OpCode {
    type Error = i64;
    fn try_from(i: i64) -> Result<Self, Self::Error> {
        match i {
            1 => Ok(Self::Add),
            2 => Ok(Self::Mul),
            3 => Ok(Self::In),
            4 => Ok(Self::Out),
            5 => Ok(Self::Jnz),
            6 => Ok(Self::Jz),
            7 => Ok(Self::Lt),
            8 => Ok(Self::Eq),
            9 => Ok(Self::Rbo),
            99 => Ok(Self::Halt),
            _ => Err(i),
        }
    }
}

impl Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "ADD"),
            Self::Mul => write!(f, "MUL"),
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
            Self::Jnz => write!(f, "JNZ"),
            Self::Jz => write!(f, "JZ"),
            Self::Lt => write!(f, "LT"),
            Self::Eq => write!(f, "EQ"),
            Self::Rbo => write!(f, "RBO"),
            Self::Halt => write!(f, "HALT"),
        }
    }
}

/// The outcome when an [Interpreter] tries to execute a single instruction
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StepOutcome {
    /// step ran successfully
    Running,
    /// Step could not run, with the [State] representing why
    Stopped(State),
}

/// What an [Interpreter] gave back when resumed with [`Interpreter::run_until_next_output`]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Yielded {
    /// The program produced this value, and is suspended right after the `OUT` instruction
    Output(i64),
    /// The program stopped without producing another value
    Stopped(State),
}

#[derive(Clone)]
/// An intcode interpreter, which provides optional tracing of executed instructions.
pub struct Interpreter {
    index: i64,
    rel_offset: i64,
    code: IntcodeMem,
    pending: VecDeque<i64>,
    last_output: Option<i64>,
    poisoned: bool,
    halted: bool,
    trace: Option<trace::Trace>,
    hook: Option<trace::TraceHook>,
}

// ignore the trace and hook fields
impl PartialEq for Interpreter {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.rel_offset == other.rel_offset
            && self.code == other.code
            && self.pending == other.pending
            && self.last_output == other.last_output
            && self.poisoned == other.poisoned
            && self.halted == other.halted
    }
}

impl Debug for Interpreter {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Interpreter")
            .field("code", &self.code)
            .field("rbo", &self.rel_offset)
            .field("ip", &self.index)
            .field("pending", &self.pending)
            .field("last_output", &self.last_output)
            .field("poisoned", &self.poisoned)
            .field("halted", &self.halted)
            .field("tracing", &self.trace.is_some())
            .field("hooked", &self.hook.is_some())
            .finish()
    }
}

impl Index<i64> for Interpreter {
    type Output = i64;

    /// Read memory at `i`, which reads as `0` if it was never written.
    ///
    /// # Panics
    ///
    /// Panics if `i` is negative. Use [`Interpreter::mem_get`] to get an error instead.
    fn index(&self, i: i64) -> &Self::Output {
        assert!(i >= 0, "intcode memory cannot be at a negative index");
        self.code.index(i)
    }
}

impl IndexMut<i64> for Interpreter {
    /// Get mutable access to memory at `i`, growing the memory past the image if needed.
    ///
    /// # Panics
    ///
    /// Panics if `i` is negative. Use [`Interpreter::mem_override`] to get an error instead.
    fn index_mut(&mut self, i: i64) -> &mut Self::Output {
        assert!(i >= 0, "intcode memory cannot be at a negative index");
        self.code.index_mut(i)
    }
}

impl Interpreter {
    /// Create a new interpreter. Collects `code` into the starting memory state.
    pub fn new(code: impl IntoIterator<Item = i64>) -> Self {
        Self {
            index: 0,
            rel_offset: 0,
            code: code.into_iter().collect(),
            pending: VecDeque::new(),
            last_output: None,
            poisoned: false,
            halted: false,
            trace: None,
            hook: None,
        }
    }

    /// Manually set a memory location to a provided value
    ///
    /// # Errors
    ///
    /// if `location` is negative, returns an [`InvalidAddress`] error
    #[doc(alias("poke", "write"))]
    #[inline]
    pub fn mem_override(&mut self, location: i64, value: i64) -> Result<(), InvalidAddress> {
        if location >= 0 {
            self.code[location] = value;
            Ok(())
        } else {
            Err(InvalidAddress(location))
        }
    }

    /// Get the memory at `address`. Addresses that were never written read as `0`.
    ///
    /// # Errors
    ///
    /// if `address` is negative, returns an [`InvalidAddress`] error
    #[doc(alias("peek", "read"))]
    #[inline]
    pub fn mem_get(&self, address: i64) -> Result<i64, InvalidAddress> {
        if address >= 0 {
            Ok(self.code[address])
        } else {
            Err(InvalidAddress(address))
        }
    }

    /// Get a range of memory addresses, spanning both the program image and the memory past it.
    ///
    /// ```
    /// use intcode_vm::prelude::*;
    /// let mut interp = Interpreter::new([1101, 90, 9, 4]);
    /// interp.run_through_inputs(empty()).unwrap();
    /// assert_eq!(interp.get_range(0..6).unwrap().as_ref(), &[1101, 90, 9, 4, 99, 0]);
    /// ```
    ///
    /// # Errors
    ///
    /// If the range starts with a negative index, returns [`InvalidAddress`] containing that
    /// index.
    pub fn get_range(&self, range: Range<i64>) -> Result<impl AsRef<[i64]> + Debug, InvalidAddress> {
        if range.start >= 0 {
            Ok(self.code.get_range(range))
        } else {
            Err(InvalidAddress(range.start))
        }
    }

    /// The current position of the instruction pointer
    pub fn instr_ptr(&self) -> i64 {
        self.index
    }

    /// The current relative base
    pub fn rel_base(&self) -> i64 {
        self.rel_offset
    }

    /// Whether a `HALT` instruction has been executed
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The length of the program image the interpreter was created with
    pub fn image_len(&self) -> usize {
        self.code.image_len()
    }

    /// Queue up `value` to be consumed by a future `IN` instruction in
    /// [`run_until_next_output`][Interpreter::run_until_next_output].
    pub fn push_input(&mut self, value: i64) {
        self.pending.push_back(value);
    }

    /// The last value the program output, or the value at address `0` if it has never output
    /// anything.
    pub fn result(&self) -> i64 {
        self.last_output.unwrap_or(self.code[0])
    }

    /// Run a single instruction
    ///
    /// On an error, returns an [Err] containing the appropriate [`InterpreterError`]
    /// Otherwise, returns an [Ok] containing the [`StepOutcome`]
    ///
    /// # Example
    ///
    /// ```
    /// use intcode_vm::prelude::*;
    /// let mut interp = Interpreter::new([1101, 90, 9, 8, 3, 7, 4, -1]);
    /// let mut out = Vec::new();
    ///
    /// // the first instruction is `ADD #90, #9, 8`
    /// assert_eq!(interp.exec_instruction(&mut empty(), &mut out), Ok(StepOutcome::Running));
    /// // the second instruction is `IN 7`, but no input was provided.
    /// assert_eq!(
    ///     interp.exec_instruction(&mut empty(), &mut out),
    ///     Ok(StepOutcome::Stopped(State::Awaiting)),
    /// );
    ///
    /// // now try again, but with input available
    /// assert_eq!(
    ///     interp.exec_instruction(&mut [8].into_iter(), &mut out),
    ///     Ok(StepOutcome::Running)
    /// );
    ///
    /// // the third instruction was originally OUT -1, but the address was overwritten by the
    /// // previous instruction, so it will now read from address 8, where the 1st instruction
    /// // inserted 99.
    /// assert!(out.is_empty());
    /// assert_eq!(interp.exec_instruction(&mut empty(), &mut out), Ok(StepOutcome::Running));
    /// assert_eq!(out.as_slice(), [99].as_slice());
    ///
    /// // finally, the halt instruction
    /// assert_eq!(
    ///     interp.exec_instruction(&mut empty(), &mut out),
    ///     Ok(StepOutcome::Stopped(State::Halted))
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// If the interpreter has previously marked itself as poisoned, returns
    /// [`InterpreterError::Poisoned`] before attempting to do anything.
    ///
    /// Otherwise, if any of the following conditions occur, it marks itself as poisoned and
    /// returns the listed [`InterpreterError`] variant:
    ///
    /// | Condition                                           | Error type                 |
    /// |-----------------------------------------------------|----------------------------|
    /// | Opcode is unrecognized                              | [`UnknownOpcode`]          |
    /// | Mode digit is unrecognized                          | [`UnknownMode`]            |
    /// | Instruction accesses a negative index               | [`InvalidAddress`]         |
    /// | Jump instruction would jump to negative index       | [`JumpToNegative`]         |
    /// | Add, Mul, In, Lt, or Eq output is in immediate mode | [`InvalidDestinationMode`] |
    ///
    /// [`UnknownOpcode`]: InterpreterError::UnknownOpcode
    /// [`UnknownMode`]: InterpreterError::UnknownMode
    /// [`InvalidAddress`]: InterpreterError::InvalidAddress
    /// [`JumpToNegative`]: InterpreterError::JumpToNegative
    /// [`InvalidDestinationMode`]: InterpreterError::InvalidDestinationMode
    #[doc(alias("step", "run"))]
    pub fn exec_instruction(
        &mut self,
        input: &mut impl Iterator<Item = i64>,
        output: &mut Vec<i64>,
    ) -> Result<StepOutcome, InterpreterError> {
        self.step(&mut internals::LogPort { input, output })
    }

    /// Run a single instruction, doing its I/O through `port`.
    ///
    /// An `IN` with nothing to read, or an `OUT` whose value `port` rejects, is left unexecuted
    /// and reported as [`State::Awaiting`].
    pub(crate) fn step(
        &mut self,
        port: &mut impl internals::Port,
    ) -> Result<StepOutcome, InterpreterError> {
        if self.poisoned {
            return Err(InterpreterError::Poisoned);
        }

        if self.halted {
            return Ok(StepOutcome::Stopped(State::Halted));
        }

        if self.index < 0 {
            let err = InvalidAddress(self.index).into();
            self.poison(&err);
            return Err(err);
        }

        let (opcode, modes) = self.decode()?;

        // arithmetic wraps on overflow
        match opcode {
            OpCode::Add => self.op3(opcode, modes, i64::wrapping_add),
            OpCode::Mul => self.op3(opcode, modes, i64::wrapping_mul),
            OpCode::In => {
                let dest = self.resolve_dest(modes[0], 1)?;
                let Some(input) = port.read() else {
                    return Ok(StepOutcome::Stopped(State::Awaiting));
                };
                self.trace(opcode, modes, [(self.raw_param(1), input)]);
                self.code[dest] = input;
                self.advance(2);
                Ok(StepOutcome::Running)
            }
            OpCode::Out => {
                let out_val = self.resolve_param(modes[0], 1)?;
                if !port.write(out_val) {
                    return Ok(StepOutcome::Stopped(State::Awaiting));
                }
                self.trace(opcode, modes, [(self.raw_param(1), out_val)]);
                self.last_output = Some(out_val);
                self.advance(2);
                Ok(StepOutcome::Running)
            }
            OpCode::Jnz => self.jump(opcode, modes, |i| i != 0),
            OpCode::Jz => self.jump(opcode, modes, |i| i == 0),
            OpCode::Lt => self.op3(opcode, modes, |a, b| i64::from(a < b)),
            OpCode::Eq => self.op3(opcode, modes, |a, b| i64::from(a == b)),
            OpCode::Rbo => {
                let offset = self.resolve_param(modes[0], 1)?;
                self.trace(opcode, modes, [(self.raw_param(1), offset)]);
                self.rel_offset = self.rel_offset.wrapping_add(offset);
                self.advance(2);
                Ok(StepOutcome::Running)
            }
            OpCode::Halt => {
                self.trace(opcode, modes, []);
                self.halted = true;
                Ok(StepOutcome::Stopped(State::Halted))
            }
        }
    }

    /// Execute until either the program halts, or it tries to read nonexistent input.
    /// Returns `Ok((v, s))`, where `v` is a [`Vec<i64>`] containing all outputs that it found,
    /// and `s` is the [`State`] at the time it stopped.
    ///
    /// Inputs queued with [`push_input`][Interpreter::push_input] are consumed before `inputs`,
    /// and any of them left unconsumed stay queued.
    ///
    /// ```
    /// use intcode_vm::prelude::*;
    /// let mut interp = Interpreter::new([3, 0, 3, 1, 4, 0, 4, 1, 99]);
    /// interp.push_input(1);
    /// assert_eq!(interp.run_through_inputs([2]), Ok((vec![1, 2], State::Halted)));
    /// ```
    ///
    /// # Errors
    ///
    /// If an internal call to [`self.exec_instruction`][Interpreter::exec_instruction] fails,
    /// returns the resulting [`InterpreterError`] unchanged.
    pub fn run_through_inputs(
        &mut self,
        inputs: impl IntoIterator<Item = i64>,
    ) -> Result<(Vec<i64>, State), InterpreterError> {
        let mut outputs = Vec::new();
        let mut pending = std::mem::take(&mut self.pending);
        let mut inputs = iter::from_fn(|| pending.pop_front()).chain(inputs);
        let result = loop {
            match self.exec_instruction(&mut inputs, &mut outputs) {
                Ok(StepOutcome::Running) => (),
                Ok(StepOutcome::Stopped(state)) => break Ok((outputs, state)),
                Err(e) => break Err(e),
            }
        };
        drop(inputs);
        self.pending = pending;
        result
    }

    /// Run the program to completion with any queued inputs, then `inputs`, consumed in order,
    /// returning the final value at address `0` alongside everything the program output.
    ///
    /// ```
    /// use intcode_vm::prelude::*;
    /// let mut interp = Interpreter::new([1, 9, 10, 3, 2, 3, 11, 0, 99, 30, 40, 50]);
    /// assert_eq!(interp.run_to_halt(empty()), Ok((3500, vec![])));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`InterpreterError::InputExhausted`] if the program wanted more input than was
    /// provided; the interpreter is left as it was right before the `IN` instruction, so it can
    /// still be resumed. Any other error is passed through from
    /// [`exec_instruction`][Interpreter::exec_instruction].
    pub fn run_to_halt(
        &mut self,
        inputs: impl IntoIterator<Item = i64>,
    ) -> Result<(i64, Vec<i64>), InterpreterError> {
        match self.run_through_inputs(inputs)? {
            (outputs, State::Halted) => Ok((self.code[0], outputs)),
            (_, State::Awaiting) => Err(InterpreterError::InputExhausted),
        }
    }

    /// Queue `next_input`, then resume until the program outputs exactly one value or stops.
    ///
    /// Queued inputs are consumed in order by `IN` instructions; any that are left over when the
    /// program outputs stay queued for the next call. This is the suspend point used to drive
    /// several interpreters in a feedback loop:
    ///
    /// ```
    /// use intcode_vm::prelude::*;
    /// // doubles every input until it receives a zero, then halts
    /// let mut interp = Interpreter::new([3, 15, 1006, 15, 14, 1002, 15, 2, 15, 4, 15, 1105, 1, 0, 99]);
    /// assert_eq!(interp.run_until_next_output(21), Ok(Yielded::Output(42)));
    /// assert_eq!(interp.run_until_next_output(-4), Ok(Yielded::Output(-8)));
    /// assert_eq!(interp.run_until_next_output(0), Ok(Yielded::Stopped(State::Halted)));
    /// ```
    ///
    /// # Errors
    ///
    /// If an internal call to [`self.exec_instruction`][Interpreter::exec_instruction] fails,
    /// returns the resulting [`InterpreterError`] unchanged.
    pub fn run_until_next_output(&mut self, next_input: i64) -> Result<Yielded, InterpreterError> {
        self.pending.push_back(next_input);
        self.resume()
    }

    /// Like [`run_until_next_output`][Interpreter::run_until_next_output], without queueing a
    /// new input first.
    ///
    /// # Errors
    ///
    /// If an internal call to [`self.exec_instruction`][Interpreter::exec_instruction] fails,
    /// returns the resulting [`InterpreterError`] unchanged.
    pub fn resume(&mut self) -> Result<Yielded, InterpreterError> {
        let mut pending = std::mem::take(&mut self.pending);
        let mut inputs = iter::from_fn(|| pending.pop_front());
        let mut outputs = Vec::with_capacity(1);
        let result = loop {
            match self.exec_instruction(&mut inputs, &mut outputs) {
                Ok(StepOutcome::Running) => {
                    if let Some(out) = outputs.pop() {
                        break Ok(Yielded::Output(out));
                    }
                }
                Ok(StepOutcome::Stopped(state)) => break Ok(Yielded::Stopped(state)),
                Err(e) => break Err(e),
            }
        };
        drop(inputs);
        self.pending = pending;
        result
    }

    /// Pre-compute as much as possible - that is, run every up to, but not including, the first
    /// `IN`, `OUT`, or `HALT` instruction, bubbling up any errors that occur.
    ///
    /// # Errors
    ///
    /// If an internal call to [`self.exec_instruction`][Interpreter::exec_instruction] fails,
    /// returns the resulting [`InterpreterError`] unchanged.
    pub fn precompute(&mut self) -> Result<(), InterpreterError> {
        while Self::parse_op(self.code[self.index])
            .is_ok_and(|(opcode, _)| !matches!(opcode, OpCode::In | OpCode::Out | OpCode::Halt))
        {
            self.exec_instruction(&mut empty(), &mut Vec::with_capacity(0))?;
        }
        Ok(())
    }
}
