//! Unified runtime stack
//!
//! The stack holds a single ordered sequence of three entry kinds:
//! values, labels (one per live control block), and frames (one per
//! function activation). Auxiliary position indices for labels and
//! frames make `branch_to_label(k)` and `return_from_frame` O(1) in
//! lookup; only the entries actually discarded are touched.
//!
//! Invariant: above the current frame the sequence is a run of values
//! optionally separated by labels, with the topmost non-value entry
//! being either the current frame or a label inside it. Branches keep
//! the last-pushed `arity` values and discard every label between the
//! target and the top.
//!
//! Integer pops return bit-patterns (`u32`/`u64`); the operator casts
//! when its opcode calls for a signed view.

use super::{Trap, Value};

/// A label: one live `block`/`loop`/`if`.
///
/// `arity` is the number of values a branch to this label keeps;
/// `continuation` is the instruction index execution resumes at (for a
/// loop, the loop header; otherwise just past the matching `end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub arity: usize,
    pub continuation: usize,
}

/// A frame: one function activation.
#[derive(Debug)]
pub struct Frame {
    /// Instance the function belongs to, for index-space resolution.
    pub instance: usize,
    /// Parameters first, then zero-initialised declared locals.
    pub locals: Vec<Value>,
    /// Number of values `return_from_frame` keeps.
    pub return_arity: usize,
}

/// One entry of the unified stack.
#[derive(Debug)]
pub enum StackEntry {
    Value(Value),
    Label(Label),
    Frame(Frame),
}

/// The unified value/label/frame stack.
#[derive(Debug, Default)]
pub struct Stack {
    entries: Vec<StackEntry>,
    /// Positions of Label entries, bottom to top.
    labels: Vec<usize>,
    /// Positions of Frame entries, bottom to top.
    frames: Vec<usize>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Stack::default()
    }

    /// Push a value onto the stack
    pub fn push_value(&mut self, value: Value) {
        self.entries.push(StackEntry::Value(value));
    }

    /// Push multiple values onto the stack
    pub fn push_values(&mut self, values: impl IntoIterator<Item = Value>) {
        self.entries.extend(values.into_iter().map(StackEntry::Value));
    }

    /// Pop a value from the stack.
    ///
    /// Refuses to pop through a label or frame; for validated streams the
    /// operands an instruction pops always sit above the nearest control
    /// entry.
    pub fn pop_value(&mut self) -> Result<Value, Trap> {
        match self.entries.last() {
            Some(StackEntry::Value(_)) => match self.entries.pop() {
                Some(StackEntry::Value(v)) => Ok(v),
                _ => Err(Trap::stack_underflow()),
            },
            _ => Err(Trap::stack_underflow()),
        }
    }

    /// Peek at the n-th value from the top without popping (0 = top).
    pub fn peek_value(&self, n: usize) -> Result<&Value, Trap> {
        let len = self.entries.len();
        match len.checked_sub(n + 1).and_then(|i| self.entries.get(i)) {
            Some(StackEntry::Value(v)) => Ok(v),
            _ => Err(Trap::stack_underflow()),
        }
    }

    /// Pop an i32 bit-pattern
    pub fn pop_i32(&mut self) -> Result<u32, Trap> {
        match self.pop_value()? {
            Value::I32(v) => Ok(v),
            other => Err(type_mismatch("i32", &other)),
        }
    }

    /// Pop an i64 bit-pattern
    pub fn pop_i64(&mut self) -> Result<u64, Trap> {
        match self.pop_value()? {
            Value::I64(v) => Ok(v),
            other => Err(type_mismatch("i64", &other)),
        }
    }

    /// Pop an f32 value
    pub fn pop_f32(&mut self) -> Result<f32, Trap> {
        match self.pop_value()? {
            Value::F32(v) => Ok(v),
            other => Err(type_mismatch("f32", &other)),
        }
    }

    /// Pop an f64 value
    pub fn pop_f64(&mut self) -> Result<f64, Trap> {
        match self.pop_value()? {
            Value::F64(v) => Ok(v),
            other => Err(type_mismatch("f64", &other)),
        }
    }

    /// Push a label beneath the top `params` values.
    ///
    /// Entering a block moves its parameters above the new label, so a
    /// later branch finds them where block results would be.
    pub fn push_label(&mut self, label: Label, params: usize) -> Result<(), Trap> {
        let at = self
            .entries
            .len()
            .checked_sub(params)
            .ok_or_else(Trap::stack_underflow)?;
        self.labels.push(at);
        self.entries.insert(at, StackEntry::Label(label));
        Ok(())
    }

    /// Push a frame for a new function activation.
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(self.entries.len());
        self.entries.push(StackEntry::Frame(frame));
    }

    /// Branch to the k-th enclosing label (0 = innermost).
    ///
    /// Keeps the last-pushed `arity` values, discards everything else
    /// above the label including the label itself and any labels in
    /// between, and returns the label's continuation.
    pub fn branch_to_label(&mut self, k: u32) -> Result<usize, Trap> {
        let idx = self
            .labels
            .len()
            .checked_sub(k as usize + 1)
            .ok_or_else(Trap::stack_underflow)?;
        let pos = self.labels[idx];
        let label = match &self.entries[pos] {
            StackEntry::Label(label) => *label,
            _ => return Err(Trap::stack_underflow()),
        };

        let keep_from = self
            .entries
            .len()
            .checked_sub(label.arity)
            .filter(|&kf| kf > pos)
            .ok_or_else(Trap::stack_underflow)?;
        self.entries.drain(pos..keep_from);
        self.labels.truncate(idx);
        Ok(label.continuation)
    }

    /// Remove the topmost label, keeping the values above it.
    ///
    /// Used when control reaches a block's `end` normally.
    pub fn exit_label(&mut self) -> Result<(), Trap> {
        let pos = self.labels.pop().ok_or_else(Trap::stack_underflow)?;
        match self.entries.get(pos) {
            Some(StackEntry::Label(_)) => {
                self.entries.remove(pos);
                Ok(())
            }
            _ => Err(Trap::stack_underflow()),
        }
    }

    /// Pop the current frame.
    ///
    /// Keeps the top `return_arity` values, discarding the frame and
    /// every label and value it still holds.
    pub fn return_from_frame(&mut self) -> Result<(), Trap> {
        let pos = self.frames.pop().ok_or_else(Trap::stack_underflow)?;
        let return_arity = match &self.entries[pos] {
            StackEntry::Frame(frame) => frame.return_arity,
            _ => return Err(Trap::stack_underflow()),
        };

        let keep_from = self
            .entries
            .len()
            .checked_sub(return_arity)
            .filter(|&kf| kf > pos)
            .ok_or_else(Trap::stack_underflow)?;
        self.entries.drain(pos..keep_from);
        while self.labels.last().is_some_and(|&l| l >= pos) {
            self.labels.pop();
        }
        Ok(())
    }

    /// Whether the topmost control entry is the current frame (no live
    /// label above it). Decides what a function-body `end` means.
    pub fn frame_is_topmost_control(&self) -> bool {
        match (self.frames.last(), self.labels.last()) {
            (Some(frame), Some(label)) => frame > label,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Read a local of the current frame.
    pub fn local(&self, idx: u32) -> Result<Value, Trap> {
        self.current_frame()?
            .locals
            .get(idx as usize)
            .copied()
            .ok_or_else(|| type_mismatch_str("local", "missing"))
    }

    /// Write a local of the current frame.
    pub fn set_local(&mut self, idx: u32, value: Value) -> Result<(), Trap> {
        let frame = self.current_frame_mut()?;
        match frame.locals.get_mut(idx as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(type_mismatch_str("local", "missing")),
        }
    }

    /// The current (innermost) frame.
    pub fn current_frame(&self) -> Result<&Frame, Trap> {
        let pos = *self.frames.last().ok_or_else(Trap::stack_underflow)?;
        match &self.entries[pos] {
            StackEntry::Frame(frame) => Ok(frame),
            _ => Err(Trap::stack_underflow()),
        }
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, Trap> {
        let pos = *self.frames.last().ok_or_else(Trap::stack_underflow)?;
        match &mut self.entries[pos] {
            StackEntry::Frame(frame) => Ok(frame),
            _ => Err(Trap::stack_underflow()),
        }
    }

    /// Number of live frames (call depth).
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Number of labels above the current frame.
    pub fn label_depth(&self) -> usize {
        match self.frames.last() {
            Some(&fpos) => self.labels.iter().rev().take_while(|&&l| l > fpos).count(),
            None => self.labels.len(),
        }
    }

    /// Total entry count (values, labels, and frames).
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain every remaining value, bottom to top.
    ///
    /// Used at the invocation boundary after the final frame has been
    /// popped, when only result values remain.
    pub fn drain_values(&mut self) -> Result<Vec<Value>, Trap> {
        let mut values = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match entry {
                StackEntry::Value(v) => values.push(v),
                _ => return Err(Trap::stack_underflow()),
            }
        }
        self.labels.clear();
        self.frames.clear();
        Ok(values)
    }
}

fn type_mismatch(expected: &str, actual: &Value) -> Trap {
    Trap::TypeMismatch {
        expected: expected.to_string(),
        actual: format!("{:?}", actual.typ()),
    }
}

fn type_mismatch_str(expected: &str, actual: &str) -> Trap {
    Trap::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
