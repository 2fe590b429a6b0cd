// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Tracing of executed instructions
//!
//! An [Interpreter] can either record every instruction it executes into a [Trace], or report
//! each one to a callback installed with [`Interpreter::on_instruction`], or both.
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use super::{Interpreter, OpCode, ParamMode};

/// A callback invoked with every instruction an [Interpreter] executes
pub type TraceHook = Arc<dyn Fn(&TracedInstr) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq)]
struct PackedModes(u8);
impl PackedModes {
    const fn pack(modes: [ParamMode; 3]) -> Self {
        Self(modes[0] as u8 | ((modes[1] as u8) << 2) | ((modes[2] as u8) << 4))
    }
    const fn unpack(self) -> [ParamMode; 3] {
        const fn unpack_bit_pair(bit_pair: u8) -> ParamMode {
            match bit_pair {
                0b00 => ParamMode::Positional,
                0b01 => ParamMode::Immediate,
                _ => ParamMode::Relative,
            }
        }
        [
            unpack_bit_pair(self.0 & 0b11),
            unpack_bit_pair((self.0 & 0b1100) >> 2),
            unpack_bit_pair((self.0 & 0b110000) >> 4),
        ]
    }
}

/// Each parameter is stored as a pair of the raw int in memory and what it resolved to.
/// For the destination of a write, the second half is the stored value.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TracedOp {
    Add((i64, i64), (i64, i64), (i64, i64)),
    Mul((i64, i64), (i64, i64), (i64, i64)),
    In((i64, i64)),
    Out((i64, i64)),
    Jnz((i64, i64), (i64, i64)),
    Jz((i64, i64), (i64, i64)),
    Lt((i64, i64), (i64, i64), (i64, i64)),
    Eq((i64, i64), (i64, i64), (i64, i64)),
    Rbo((i64, i64)),
    Halt,
}

#[derive(Clone, PartialEq, Eq)]
/// An opaque type containing information about what instruction was executed, which can be queried
/// with its various methods, or converted into a [String] using its [Display] impl.
pub struct TracedInstr {
    op: TracedOp,
    op_int: i64,
    instr_ptr: i64,
    rel_base: i64,
    packed_modes: PackedModes,
    opcode: OpCode,
}

impl TracedInstr {
    /// Return the relative base at the time the traced instruction was excuted
    pub fn rel_base(&self) -> i64 {
        self.rel_base
    }

    /// Return the instruction pointer's position when the traced instruction was executed
    pub fn instr_ptr(&self) -> i64 {
        self.instr_ptr
    }

    /// Return the actual integer of the traced instruction
    pub fn op_int(&self) -> i64 {
        self.op_int
    }

    /// Return the opcode of the traced instruction
    pub fn op_code(&self) -> OpCode {
        self.opcode
    }

    /// If the instruction stored a value, return that value
    pub fn stored_val(&self) -> Option<i64> {
        match self.op {
            TracedOp::Add(_, _, (_, v))
            | TracedOp::Mul(_, _, (_, v))
            | TracedOp::Lt(_, _, (_, v))
            | TracedOp::Eq(_, _, (_, v))
            | TracedOp::In((_, v)) => Some(v),
            _ => None,
        }
    }

    /// If the instruction output a value, return that value
    pub fn output_val(&self) -> Option<i64> {
        match self.op {
            TracedOp::Out((_, v)) => Some(v),
            _ => None,
        }
    }

    /// Return an array of the parameter modes of the traced instruction
    pub fn param_modes(&self) -> [ParamMode; 3] {
        self.packed_modes.unpack()
    }

    pub(super) fn build(
        opcode: OpCode,
        modes: [ParamMode; 3],
        op_int: i64,
        instr_ptr: i64,
        rel_base: i64,
        resolved_params: &[(i64, i64)],
    ) -> Self {
        // unfilled parameters only show up if the caller passed the wrong count for the opcode
        let param = |i: usize| resolved_params.get(i).copied().unwrap_or_default();
        debug_assert_eq!(resolved_params.len() as i64, opcode.width() - 1);

        let op = match opcode {
            OpCode::Add => TracedOp::Add(param(0), param(1), param(2)),
            OpCode::Mul => TracedOp::Mul(param(0), param(1), param(2)),
            OpCode::In => TracedOp::In(param(0)),
            OpCode::Out => TracedOp::Out(param(0)),
            OpCode::Jnz => TracedOp::Jnz(param(0), param(1)),
            OpCode::Jz => TracedOp::Jz(param(0), param(1)),
            OpCode::Lt => TracedOp::Lt(param(0), param(1), param(2)),
            OpCode::Eq => TracedOp::Eq(param(0), param(1), param(2)),
            OpCode::Rbo => TracedOp::Rbo(param(0)),
            OpCode::Halt => TracedOp::Halt,
        };
        Self {
            op_int,
            instr_ptr,
            rel_base,
            op,
            packed_modes: PackedModes::pack(modes),
            opcode,
        }
    }
}

impl Interpreter {
    /// Begin a [Trace] of executed instructions. If a trace is already running, this replaces that
    /// trace and returns in a [`Some`], otherwise, it returns [`None`].
    ///
    /// # Example
    /// ```
    /// use intcode_vm::prelude::*;
    /// let mut interp = Interpreter::new([1101, 90, 9, 4]);
    /// assert!(interp.start_trace().is_none());
    /// interp.run_through_inputs(empty()).unwrap();
    /// let trace = interp.end_trace().unwrap();
    /// assert_eq!(trace.0.len(), 2);
    /// assert_eq!(trace.0[0].stored_val(), Some(99));
    /// ```
    pub fn start_trace(&mut self) -> Option<Trace> {
        self.trace.replace(Trace::new())
    }

    /// Stop tracing executed instructions into a [Trace]. If no trace was active, returns [`None`]
    ///
    /// see [Interpreter::start_trace]
    pub fn end_trace(&mut self) -> Option<Trace> {
        self.trace.take()
    }

    /// Get a view of the current trace
    pub fn show_trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// Install `hook` to be called with every instruction executed from now on, returning the
    /// previously installed hook if there was one.
    ///
    /// Clones of the interpreter share the hook.
    ///
    /// ```
    /// use intcode_vm::prelude::*;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let count = Arc::new(AtomicUsize::new(0));
    /// let mut interp = Interpreter::new([1101, 1, 1, 0, 99]);
    /// let counter = Arc::clone(&count);
    /// interp.on_instruction(move |_| {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    /// });
    /// interp.run_through_inputs(empty()).unwrap();
    /// assert_eq!(count.load(Ordering::Relaxed), 2);
    /// ```
    pub fn on_instruction(
        &mut self,
        hook: impl Fn(&TracedInstr) + Send + Sync + 'static,
    ) -> Option<TraceHook> {
        self.hook.replace(Arc::new(hook))
    }

    /// Remove the hook installed with [`Interpreter::on_instruction`], if any
    pub fn clear_hook(&mut self) -> Option<TraceHook> {
        self.hook.take()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
/// A log of instructions that an [Interpreter] has executed since a call to
/// [Interpreter::start_trace]
///
/// see [Interpreter::start_trace]
pub struct Trace(pub Vec<TracedInstr>);

impl Trace {
    pub(crate) fn new() -> Self {
        Self(Vec::new())
    }
}

impl Debug for TracedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        macro_rules! arg {
            ($arg: ident) => {
                format_args!("{} => {}", $arg.0, $arg.1)
            };
        }
        macro_rules! variant {
            ($name: literal, ($($arg: ident),*)) => {
                f.debug_tuple($name)
                $(.field(&arg!($arg) ))*
                .finish()
            }
        }
        match self {
            Self::Add(a0, a1, a2) => variant!("Add", (a0, a1, a2)),
            Self::Mul(a0, a1, a2) => variant!("Mul", (a0, a1, a2)),
            Self::In(a0) => variant!("In", (a0)),
            Self::Out(a0) => variant!("Out", (a0)),
            Self::Jnz(a0, a1) => variant!("Jnz", (a0, a1)),
            Self::Jz(a0, a1) => variant!("Jz", (a0, a1)),
            Self::Lt(a0, a1, a2) => variant!("Lt", (a0, a1, a2)),
            Self::Eq(a0, a1, a2) => variant!("Eq", (a0, a1, a2)),
            Self::Rbo(a0) => variant!("Rbo", (a0)),
            Self::Halt => write!(f, "Halt"),
        }
    }
}

impl Debug for TracedInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedInstr")
            .field("op", &self.op)
            .field("op_int", &self.op_int)
            .field("instr_ptr", &self.instr_ptr)
            .field("rel_base", &self.rel_base)
            .field("modes", &self.packed_modes.unpack())
            .field("opcode", &self.opcode)
            .finish()
    }
}

impl Display for TracedInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ip: {:>8} | rbo: {:>5} | {:05} | ",
            self.instr_ptr, self.rel_base, self.op_int
        )?;
        let modes = self.packed_modes.unpack();

        match self.op {
            TracedOp::Add((pa, va), (pb, vb), (dest, val))
            | TracedOp::Mul((pa, va), (pb, vb), (dest, val))
            | TracedOp::Lt((pa, va), (pb, vb), (dest, val))
            | TracedOp::Eq((pa, va), (pb, vb), (dest, val)) => {
                write!(
                    f,
                    "[{} {}{pa} (resolves to {va}), {}{pb} (resolves to {vb}), {}{dest} (stored {val})]",
                    self.opcode, modes[0], modes[1], modes[2],
                )
            }
            TracedOp::Jnz((p_base, v_base), (p_dest, v_dest)) => {
                write!(
                    f,
                    "[{} {}{p_base} (resolves to {v_base}), {}{p_dest} ({} to {v_dest})]",
                    self.opcode,
                    modes[0],
                    modes[1],
                    if v_base != 0 { "jumped" } else { "didn't jump" }
                )
            }
            TracedOp::Jz((p_base, v_base), (p_dest, v_dest)) => {
                write!(
                    f,
                    "[{} {}{p_base} (resolves to {v_base}), {}{p_dest} ({} to {v_dest})]",
                    self.opcode,
                    modes[0],
                    modes[1],
                    if v_base == 0 { "jumped" } else { "didn't jump" }
                )
            }
            TracedOp::In((p, v)) => {
                write!(f, "[{} {}{p} (stored {v})]", self.opcode, modes[0])
            }
            TracedOp::Out((p, v)) => {
                write!(f, "[{} {}{p} (resolves to {v})]", self.opcode, modes[0])
            }
            TracedOp::Rbo((p, v)) => write!(
                f,
                "[{} {}{p} (resolved to {v}) (went from {} to {})]",
                self.opcode,
                modes[0],
                self.rel_base,
                self.rel_base.wrapping_add(v),
            ),
            TracedOp::Halt => write!(f, "[{}]", self.opcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::empty;

    #[test]
    fn param_mode_packing() {
        const MODES: [ParamMode; 3] = [
            ParamMode::Positional,
            ParamMode::Immediate,
            ParamMode::Relative,
        ];

        for a in MODES {
            for b in MODES {
                for c in MODES {
                    assert_eq!(PackedModes::pack([a, b, c]).unpack(), [a, b, c]);
                }
            }
        }
    }

    #[test]
    fn display() {
        let mut interp = Interpreter::new([109, 4, 21101, 2, 3, 0, 204, 0, 99]);
        interp.start_trace();
        assert_eq!(interp.run_to_halt(empty()), Ok((109, vec![5])));
        let Trace(trace) = interp.end_trace().unwrap();
        let lines: Vec<String> = trace.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            [
                "ip:        0 | rbo:     0 | 00109 | [RBO #4 (resolved to 4) (went from 0 to 4)]",
                "ip:        2 | rbo:     4 | 21101 | [ADD #2 (resolves to 2), #3 (resolves to 3), @0 (stored 5)]",
                "ip:        6 | rbo:     4 | 00204 | [OUT @0 (resolves to 5)]",
                "ip:        8 | rbo:     4 | 00099 | [HALT]",
            ]
        );
        assert_eq!(trace[2].output_val(), Some(5));
        assert_eq!(trace[1].stored_val(), Some(5));
        assert_eq!(trace[0].stored_val(), None);
    }

    #[test]
    fn hook_sees_every_instruction() {
        use std::sync::Mutex;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut interp = Interpreter::new([3, 0, 4, 0, 99]);
        assert!(interp.on_instruction(move |instr| {
            sink.lock().unwrap().push(instr.op_code());
        }).is_none());
        interp.run_to_halt([42]).unwrap();
        assert!(interp.clear_hook().is_some());
        assert_eq!(
            *seen.lock().unwrap(),
            [OpCode::In, OpCode::Out, OpCode::Halt]
        );
    }
}
