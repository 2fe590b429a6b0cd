// SPDX-FileCopyrightText: 2024 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

use super::*;
use crate::trace::TracedInstr;

/// Where executing instructions take their input from and hand their output to
pub(crate) trait Port {
    /// The next input, or [None] if none can be had
    fn read(&mut self) -> Option<i64>;
    /// Hand off `value`, returning whether it was accepted
    fn write(&mut self, value: i64) -> bool;
}

/// A [Port] reading from an iterator and appending every output to a log
pub(crate) struct LogPort<'a, I> {
    pub(crate) input: &'a mut I,
    pub(crate) output: &'a mut Vec<i64>,
}

impl<I: Iterator<Item = i64>> Port for LogPort<'_, I> {
    fn read(&mut self) -> Option<i64> {
        self.input.next()
    }

    fn write(&mut self, value: i64) -> bool {
        self.output.push(value);
        true
    }
}

impl Interpreter {
    // Given a 5 digit number, digits ABCDE are used as follows:
    // DE is the two-digit opcode
    // C is the 1st parameter's mode
    // B is the 2nd parameter's mode
    // A is the 3rd parameter's mode
    //
    // So *0*1202 would be parsed as follows:
    //
    // Opcode 02 is multiply
    // C=2: 1st parameter is in relative mode
    // B=1: 2nd parameter is in immediate mode
    // A=0: 3rd parameter is in positional mode
    pub(crate) fn parse_op(op: i64) -> Result<(OpCode, [ParamMode; 3]), InterpreterError> {
        Ok((
            OpCode::try_from(op % 100).map_err(InterpreterError::UnknownOpcode)?,
            ParamMode::extract(op)?,
        ))
    }

    /// Parse the instruction at the instruction pointer, marking `self` as poisoned on failure
    pub(crate) fn decode(&mut self) -> Result<(OpCode, [ParamMode; 3]), InterpreterError> {
        Self::parse_op(self.code[self.index]).inspect_err(|err| self.poison(err))
    }

    pub(crate) fn poison(&mut self, err: &InterpreterError) {
        tracing::debug!(ip = self.index, rbo = self.rel_offset, %err, "interpreter poisoned");
        self.poisoned = true;
    }

    /// The raw int of the `offset`th parameter of the current instruction
    pub(crate) fn raw_param(&self, offset: i64) -> i64 {
        self.code[self.index.wrapping_add(offset)]
    }

    /// Move the instruction pointer past an instruction `width` ints wide
    pub(crate) fn advance(&mut self, width: i64) {
        self.index = self.index.wrapping_add(width);
    }

    /// Turn `address` into a memory read, marking `self` as poisoned if it's negative
    fn checked_access(&mut self, address: i64) -> Result<i64, InvalidAddress> {
        match self.mem_get(address) {
            Ok(val) => Ok(val),
            Err(err) => {
                self.poison(&err.into());
                Err(err)
            }
        }
    }

    /// Processes the `offset`th parameter of the current instruction into a concrete value using
    /// the method appropriate for `mode`.
    /// If that would involve accessing memory at a negative index, instead marks `self` as
    /// poisoned and returns the error
    pub(crate) fn resolve_param(
        &mut self,
        mode: ParamMode,
        offset: i64,
    ) -> Result<i64, InvalidAddress> {
        let raw = self.raw_param(offset);
        match mode {
            ParamMode::Positional => self.checked_access(raw),
            ParamMode::Immediate => Ok(raw),
            ParamMode::Relative => self.checked_access(raw.wrapping_add(self.rel_offset)),
        }
    }

    /// Turns the `offset`th parameter of the current instruction into a destination address
    /// according to `mode`.
    /// If that would be a negative address, or if `mode` is [ParamMode::Immediate], it instead
    /// marks `self` as poisoned and returns the error
    pub(crate) fn resolve_dest(
        &mut self,
        mode: ParamMode,
        offset: i64,
    ) -> Result<i64, InterpreterError> {
        let raw = self.raw_param(offset);
        let result = match mode {
            ParamMode::Immediate => Err(InterpreterError::InvalidDestinationMode(raw)),
            ParamMode::Positional => Ok(raw),
            ParamMode::Relative => Ok(raw.wrapping_add(self.rel_offset)),
        }
        .and_then(|dest| {
            if dest < 0 {
                Err(InvalidAddress(dest).into())
            } else {
                Ok(dest)
            }
        });
        result.inspect_err(|err| self.poison(err))
    }

    /// common logic of all 4 instructions that take 3 parameters
    pub(crate) fn op3(
        &mut self,
        opcode: OpCode,
        modes: [ParamMode; 3],
        operation: impl Fn(i64, i64) -> i64,
    ) -> Result<StepOutcome, InterpreterError> {
        let a = self.resolve_param(modes[0], 1)?;
        let b = self.resolve_param(modes[1], 2)?;
        let dest = self.resolve_dest(modes[2], 3)?;
        let val = operation(a, b);
        self.trace(
            opcode,
            modes,
            [
                (self.raw_param(1), a),
                (self.raw_param(2), b),
                (self.raw_param(3), val),
            ],
        );
        self.code[dest] = val;
        self.advance(4);
        Ok(StepOutcome::Running)
    }

    pub(crate) fn jump(
        &mut self,
        opcode: OpCode,
        modes: [ParamMode; 3],
        func: impl Fn(i64) -> bool,
    ) -> Result<StepOutcome, InterpreterError> {
        let expr = self.resolve_param(modes[0], 1)?;
        let dest = self.resolve_param(modes[1], 2)?;
        self.trace(
            opcode,
            modes,
            [
                (self.raw_param(1), expr),
                (self.raw_param(2), dest),
            ],
        );
        if func(expr) {
            if dest < 0 {
                let err = InterpreterError::JumpToNegative(dest);
                self.poison(&err);
                return Err(err);
            }
            self.index = dest;
        } else {
            self.advance(3);
        }
        Ok(StepOutcome::Running)
    }

    /// Report the instruction about to finish executing to the active [trace::Trace] and hook.
    /// Must run before the instruction pointer moves.
    pub(crate) fn trace<const N: usize>(
        &mut self,
        opcode: OpCode,
        modes: [ParamMode; 3],
        resolved_params: [(i64, i64); N],
    ) {
        if self.trace.is_none() && self.hook.is_none() {
            return;
        }
        let instr = TracedInstr::build(
            opcode,
            modes,
            self.code[self.index],
            self.index,
            self.rel_offset,
            &resolved_params,
        );
        if let Some(hook) = self.hook.as_ref() {
            hook(&instr);
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.0.push(instr);
        }
    }
}
