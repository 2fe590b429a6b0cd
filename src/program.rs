// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Immutable program images
//!
//! A [Program] holds the initial memory of an Intcode program, and hands out fresh
//! [Interpreter]s that each work on their own copy of it, so the same image can be run any number
//! of times without the runs affecting one another.
//!
//! ```
//! use intcode_vm::prelude::*;
//! let program: Program = "1,0,0,3,99".parse().unwrap();
//! let mut first = program.interpreter_with_overrides([(1, 3), (2, 4)]).unwrap();
//! first.run_to_halt(empty()).unwrap();
//! assert_eq!(first.mem_get(3), Ok(102));
//!
//! // the image itself is untouched
//! let mut second = program.interpreter();
//! second.run_to_halt(empty()).unwrap();
//! assert_eq!(second.mem_get(3), Ok(2));
//! ```

use std::error::Error;
use std::fmt::{self, Display};
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;

use super::{Interpreter, InvalidAddress};

/// A shared, read-only Intcode program image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program(Arc<[i64]>);

impl Program {
    /// Create a new program image from `code`
    pub fn new(code: impl IntoIterator<Item = i64>) -> Self {
        Self(code.into_iter().collect())
    }

    /// The number of ints in the image
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the image is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The ints in the image
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Create an [Interpreter] with its own copy of the image
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.0.iter().copied())
    }

    /// Create an [Interpreter] with its own copy of the image, with each `(address, value)` pair
    /// in `overrides` written into memory before anything runs.
    ///
    /// # Errors
    ///
    /// If any of the addresses is negative, returns an [`InvalidAddress`] error.
    pub fn interpreter_with_overrides(
        &self,
        overrides: impl IntoIterator<Item = (i64, i64)>,
    ) -> Result<Interpreter, InvalidAddress> {
        let mut interp = self.interpreter();
        for (address, value) in overrides {
            interp.mem_override(address, value)?;
        }
        Ok(interp)
    }

    /// Create an [Interpreter] with its own copy of the image, with `inputs` already queued to be
    /// consumed first by whichever way it ends up being run.
    ///
    /// ```
    /// use intcode_vm::prelude::*;
    /// // outputs the sum of two inputs
    /// let program = Program::new([3, 11, 3, 12, 1, 11, 12, 11, 4, 11, 99]);
    /// let mut interp = program.interpreter_with_inputs([5]);
    /// assert_eq!(interp.run_until_next_output(7), Ok(Yielded::Output(12)));
    /// ```
    pub fn interpreter_with_inputs(&self, inputs: impl IntoIterator<Item = i64>) -> Interpreter {
        let mut interp = self.interpreter();
        for input in inputs {
            interp.push_input(input);
        }
        interp
    }
}

impl From<Vec<i64>> for Program {
    fn from(code: Vec<i64>) -> Self {
        Self(code.into())
    }
}

impl From<&[i64]> for Program {
    fn from(code: &[i64]) -> Self {
        Self(code.into())
    }
}

impl From<&Program> for Interpreter {
    fn from(program: &Program) -> Self {
        program.interpreter()
    }
}

/// Parse a comma-separated list of ints, ignoring whitespace around each one.
impl FromStr for Program {
    type Err = ParseProgramError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseProgramError::Empty);
        }
        s.trim()
            .split(',')
            .map(str::trim)
            .enumerate()
            .map(|(index, text)| {
                text.parse().map_err(|source| ParseProgramError::InvalidInt {
                    index,
                    text: text.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<i64>, _>>()
            .map(Self::from)
    }
}

/// An error that occured while parsing a [Program] from text
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParseProgramError {
    /// The text contained no ints at all
    Empty,
    /// An entry in the list could not be parsed as an [`i64`]
    InvalidInt {
        /// The position of the entry in the comma-separated list
        index: usize,
        /// The text of the entry, with surrounding whitespace removed
        text: String,
        /// The underlying error
        source: ParseIntError,
    },
}

impl Display for ParseProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseProgramError::Empty => write!(f, "program text was empty"),
            ParseProgramError::InvalidInt {
                index,
                text,
                source,
            } => write!(f, "entry {index} ({text:?}) is not a valid int: {source}"),
        }
    }
}

impl Error for ParseProgramError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseProgramError::Empty => None,
            ParseProgramError::InvalidInt { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn parse_with_whitespace() {
        let program: Program = " 1, 9,10 ,3,2,3,11,0,99,30,40,50\n".parse().unwrap();
        assert_eq!(program.len(), 12);
        assert_eq!(program.interpreter().run_to_halt(empty()), Ok((3500, vec![])));
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<Program>(), Err(ParseProgramError::Empty));
        assert_eq!(" \n".parse::<Program>(), Err(ParseProgramError::Empty));
        let Err(ParseProgramError::InvalidInt { index, text, .. }) = "1,2,,99".parse::<Program>()
        else {
            panic!("empty entry was accepted");
        };
        assert_eq!((index, text.as_str()), (2, ""));
        let Err(err) = "1,x".parse::<Program>() else {
            panic!("non-numeric entry was accepted");
        };
        assert!(err.to_string().starts_with("entry 1 (\"x\")"));
        assert!(err.source().is_some());
    }

    #[test]
    fn clones_are_independent() {
        let program = Program::new([3, 0, 4, 0, 99]);
        let mut a = program.interpreter();
        let mut b = Interpreter::from(&program);
        assert_eq!(a.run_to_halt([42]), Ok((42, vec![42])));
        assert_eq!(b.run_to_halt([42]), Ok((42, vec![42])));
        assert_eq!(a, b);
        assert_eq!(program.as_slice(), &[3, 0, 4, 0, 99]);
    }

    #[test]
    fn initial_inputs_reach_every_mode() {
        let program = Program::new([3, 0, 4, 0, 99]);
        let mut interp = program.interpreter_with_inputs([42]);
        assert_eq!(interp.run_to_halt(empty()), Ok((42, vec![42])));
        let mut interp = program.interpreter_with_inputs([42]);
        assert_eq!(interp.resume(), Ok(Yielded::Output(42)));
    }

    #[test]
    fn overrides() {
        let program = Program::new([1, 0, 0, 0, 99]);
        let mut interp = program.interpreter_with_overrides([(0, 2), (500, 1)]).unwrap();
        assert_eq!(interp.run_to_halt(empty()), Ok((4, vec![])));
        assert_eq!(interp.mem_get(500), Ok(1));
        assert_eq!(
            program.interpreter_with_overrides([(-2, 0)]),
            Err(InvalidAddress(-2))
        );
    }
}
