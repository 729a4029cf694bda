//! Trace store.
//!
//! A [`TapeStore`] owns every recorded trace, keyed by a caller-chosen
//! [`Tag`]. Recording goes through a [`Recording`] handle: seed inputs, run
//! arithmetic on the returned [`Active`] values, extract outputs, then
//! [`end`](Recording::end). Re-recording a tag overwrites its stored trace.
//!
//! The store is single-threaded by construction (`RefCell` inside, not
//! `Sync`). Threads that need their own traces use their own stores.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::mem;

use crate::active::Active;
use crate::error::{Error, Result};
use crate::float::Float;
use crate::tape::Tape;

/// Caller-chosen identifier of a recorded trace.
pub type Tag = u32;

/// Owner of all recorded traces.
#[derive(Debug)]
pub struct TapeStore<F: Float = f64> {
    tapes: RefCell<HashMap<Tag, Tape<F>>>,
    open: RefCell<HashSet<Tag>>,
}

impl<F: Float> Default for TapeStore<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> TapeStore<F> {
    pub fn new() -> Self {
        TapeStore {
            tapes: RefCell::new(HashMap::new()),
            open: RefCell::new(HashSet::new()),
        }
    }

    /// Open a recording under `tag`.
    ///
    /// Fails with [`Error::DuplicateTag`] while another recording of the same
    /// tag is open. The tag is released when the handle is ended or dropped.
    pub fn begin_recording(&self, tag: Tag) -> Result<Recording<'_, F>> {
        if !self.open.borrow_mut().insert(tag) {
            return Err(Error::DuplicateTag { tag });
        }
        tracing::trace!(tag, "recording opened");
        Ok(Recording {
            store: self,
            tag,
            tape: RefCell::new(Tape::new(tag)),
            closed: false,
        })
    }

    /// Record `f` over `inputs` in one call.
    ///
    /// Every input is seeded in order, every returned value is extracted in
    /// order, and the recording is ended. Returns the output values at
    /// `inputs`.
    pub fn record<G>(&self, tag: Tag, inputs: &[F], f: G) -> Result<Vec<F>>
    where
        G: for<'r> FnOnce(&[Active<'r, F>]) -> Vec<Active<'r, F>>,
    {
        let rec = self.begin_recording(tag)?;
        let out = {
            let xs = rec.seed_all(inputs);
            let ys = f(&xs);
            ys.iter().map(|&y| rec.extract(y)).collect::<Result<Vec<F>>>()
        };
        let out = out?;
        rec.end()?;
        Ok(out)
    }

    /// Drop the trace stored under `tag`. Unknown tags are ignored.
    pub fn clear(&self, tag: Tag) {
        if self.tapes.borrow_mut().remove(&tag).is_some() {
            tracing::trace!(tag, "trace cleared");
        }
    }

    /// True if a closed trace is stored under `tag`.
    pub fn contains(&self, tag: Tag) -> bool {
        self.tapes.borrow().contains_key(&tag)
    }

    /// Number of stored traces.
    pub fn len(&self) -> usize {
        self.tapes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tapes.borrow().is_empty()
    }

    /// Stored tags in ascending order.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.tapes.borrow().keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// `(inputs, outputs, entries)` of the trace under `tag`.
    pub fn trace_len(&self, tag: Tag) -> Result<(usize, usize, usize)> {
        self.with_tape(tag, |t| Ok((t.num_inputs(), t.num_outputs(), t.num_ops())))
    }

    /// Run `f` with shared access to the trace under `tag`.
    pub(crate) fn with_tape<R>(
        &self,
        tag: Tag,
        f: impl FnOnce(&Tape<F>) -> Result<R>,
    ) -> Result<R> {
        let tapes = self.tapes.borrow();
        let tape = tapes.get(&tag).ok_or(Error::UnknownTag { tag })?;
        f(tape)
    }

    /// Run `f` with exclusive access to the trace under `tag`.
    pub(crate) fn with_tape_mut<R>(
        &self,
        tag: Tag,
        f: impl FnOnce(&mut Tape<F>) -> Result<R>,
    ) -> Result<R> {
        let mut tapes = self.tapes.borrow_mut();
        let tape = tapes.get_mut(&tag).ok_or(Error::UnknownTag { tag })?;
        f(tape)
    }

    fn install(&self, tape: Tape<F>) {
        self.tapes.borrow_mut().insert(tape.tag, tape);
    }

    fn release(&self, tag: Tag) {
        self.open.borrow_mut().remove(&tag);
    }
}

/// An open recording.
///
/// [`Active`] values produced by [`seed`](Self::seed) borrow this handle, so
/// the recording cannot be ended while they are alive. Dropping the handle
/// without calling [`end`](Self::end) discards the trace.
#[derive(Debug)]
pub struct Recording<'s, F: Float = f64> {
    store: &'s TapeStore<F>,
    tag: Tag,
    tape: RefCell<Tape<F>>,
    closed: bool,
}

impl<'s, F: Float> Recording<'s, F> {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Mark `value` as the next independent input.
    pub fn seed(&self, value: F) -> Active<'_, F> {
        let index = self.tape.borrow_mut().push_input(value);
        Active::on_tape(value, index, &self.tape)
    }

    /// Seed every entry of `values`, in order.
    pub fn seed_all(&self, values: &[F]) -> Vec<Active<'_, F>> {
        values.iter().map(|&v| self.seed(v)).collect()
    }

    /// Mark `y` as the next dependent output and return its value.
    ///
    /// Constants are promoted onto the trace so the output keeps its
    /// position; its derivative is zero. Fails with
    /// [`Error::ForeignActive`] if `y` was recorded by another recording;
    /// the trace is then poisoned and [`end`](Self::end) fails too.
    pub fn extract(&self, y: Active<'_, F>) -> Result<F> {
        let mut tape = self.tape.borrow_mut();
        if !y.belongs_to(&self.tape) {
            tape.foreign = true;
            return Err(Error::ForeignActive { tag: self.tag });
        }
        let index = if y.is_constant() {
            tape.push_const(y.value)
        } else {
            y.index
        };
        tape.push_output(index);
        Ok(y.value)
    }

    /// Number of inputs seeded so far.
    pub fn num_seeded(&self) -> usize {
        self.tape.borrow().num_inputs()
    }

    /// Number of outputs extracted so far.
    pub fn num_extracted(&self) -> usize {
        self.tape.borrow().num_outputs()
    }

    /// Close the recording and store the trace under its tag.
    ///
    /// Fails with [`Error::ForeignActive`] if an active value of another
    /// recording reached this trace, and with [`Error::UnclosedSeed`] if
    /// inputs were seeded but no output was extracted. The trace is then
    /// discarded.
    pub fn end(mut self) -> Result<()> {
        let tape = mem::take(self.tape.get_mut());
        self.closed = true;
        self.store.release(self.tag);

        if tape.foreign {
            tracing::warn!(tag = self.tag, "recording mixed with another, discarded");
            return Err(Error::ForeignActive { tag: self.tag });
        }

        if tape.num_inputs() > 0 && tape.num_outputs() == 0 {
            tracing::warn!(tag = self.tag, seeded = tape.num_inputs(), "recording discarded");
            return Err(Error::UnclosedSeed {
                tag: self.tag,
                seeded: tape.num_inputs(),
            });
        }

        tracing::debug!(
            tag = self.tag,
            inputs = tape.num_inputs(),
            outputs = tape.num_outputs(),
            entries = tape.num_ops(),
            "trace recorded"
        );
        let mut tape = tape;
        tape.tag = self.tag;
        self.store.install(tape);
        Ok(())
    }
}

impl<F: Float> Drop for Recording<'_, F> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::trace!(tag = self.tag, "recording abandoned");
            self.store.release(self.tag);
        }
    }
}
