//! Deferred element runs: [`Sequence`] on the value side and
//! [`SequenceIter`] on the top-level decode side.
//!
//! A `Sequence<T>` is the enumerable wire category. Built from a `Vec` it
//! carries a known count and encodes in counted form, repeatably. Built
//! from an iterator the count is unknown: it encodes in streaming form
//! (`-2` sentinel, flag-prefixed elements) and is consumed by that single
//! pass. Forward-only, single-pass is the contract; encoding a drained
//! sequence is an error, not an empty run.

use std::{cell::RefCell, fmt, io::Read, io::Write};

use crate::{
    error::{Error, FormatError, Result},
    plan::{DecodePlan, EncodePlan},
    reader::ReadBuffer,
    wire,
    writer::WriteBuffer,
};

enum State<T> {
    /// Known count; encodes in counted form and survives re-encoding.
    Counted(Vec<T>),
    /// Unknown count; encodes in streaming form exactly once.
    Streaming(Box<dyn Iterator<Item = T> + Send>),
    /// A streaming sequence that has already been encoded.
    Drained,
}

/// An ordered run of elements whose count may be unknown until encoding
/// finishes.
pub struct Sequence<T> {
    state: RefCell<State<T>>,
}

impl<T> Sequence<T> {
    /// A sequence fed by an iterator of unknown length. Encodes in the
    /// streaming wire form and can be encoded only once.
    pub fn streaming<I>(iter: I) -> Self
    where
        I: Iterator<Item = T> + Send + 'static,
    {
        Self { state: RefCell::new(State::Streaming(Box::new(iter))) }
    }

    /// The element count, when it is known up front.
    pub fn known_len(&self) -> Option<usize> {
        match &*self.state.borrow() {
            State::Counted(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Consumes the sequence into a `Vec`, pulling a streaming source to
    /// its end. Fails if the sequence was already drained by an encode.
    pub fn into_vec(self) -> Result<Vec<T>> {
        match self.state.into_inner() {
            State::Counted(items) => Ok(items),
            State::Streaming(iter) => Ok(iter.collect()),
            State::Drained => Err(Error::Contract("sequence was already drained")),
        }
    }

    /// Encodes this sequence through the given element plan.
    pub(crate) fn encode_with<W: Write + 'static>(
        &self,
        elem: &EncodePlan<W, T>,
        out: &mut WriteBuffer<W>,
    ) -> Result<()>
    where
        T: 'static,
    {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Counted(items) => {
                let count = i32::try_from(items.len())
                    .map_err(|_| Error::Contract("sequence length exceeds i32::MAX"))?;
                out.write_count(count)?;
                elem.run_slice(out, items)
            }
            State::Streaming(_) => {
                let State::Streaming(iter) = std::mem::replace(&mut *state, State::Drained)
                else {
                    unreachable!()
                };
                out.write_count(wire::STREAMING_COUNT)?;
                for item in iter {
                    out.write_bool(true)?;
                    elem.run(out, &item)?;
                }
                out.write_bool(false)
            }
            State::Drained => {
                Err(Error::Contract("sequence was already drained by a previous encode"))
            }
        }
    }
}

impl<T> From<Vec<T>> for Sequence<T> {
    fn from(items: Vec<T>) -> Self {
        Self { state: RefCell::new(State::Counted(items)) }
    }
}

impl<T> FromIterator<T> for Sequence<T> {
    /// Collecting materializes the elements, so the result is counted.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<T>>())
    }
}

impl<T> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            State::Counted(items) => write!(f, "Sequence::Counted(len = {})", items.len()),
            State::Streaming(_) => f.write_str("Sequence::Streaming"),
            State::Drained => f.write_str("Sequence::Drained"),
        }
    }
}

enum IterMode {
    Finished,
    Remaining(usize),
    Streaming,
}

/// A lazy top-level decoder over a run of values, produced by
/// [`Codec::read_values`](crate::entry::Codec::read_values).
///
/// The count prefix is resolved at construction: a null run yields an
/// iterator that is immediately finished, a malformed count fails
/// construction. Elements decode one per [`Iterator::next`] call; the
/// first error finishes the iterator.
pub struct SequenceIter<T, R: Read + 'static> {
    src: ReadBuffer<R>,
    elem: DecodePlan<R, T>,
    mode: IterMode,
}

impl<T: 'static, R: Read + 'static> SequenceIter<T, R> {
    pub(crate) fn new(mut src: ReadBuffer<R>, elem: DecodePlan<R, T>) -> Result<Self> {
        let mode = match src.read_count()? {
            wire::NULL_COUNT | 0 => IterMode::Finished,
            wire::STREAMING_COUNT => IterMode::Streaming,
            count if count > 0 => IterMode::Remaining(count as usize),
            bad => return Err(FormatError::InvalidCount(bad).into()),
        };
        Ok(Self { src, elem, mode })
    }

    /// Consumes the iterator, returning the underlying source. Bytes read
    /// ahead into the buffer are discarded.
    pub fn into_source(self) -> R {
        self.src.into_source()
    }

    fn next_item(&mut self) -> Result<Option<T>> {
        match self.mode {
            IterMode::Finished => Ok(None),
            IterMode::Remaining(left) => {
                let item = self.elem.run(&mut self.src)?;
                self.mode = match left - 1 {
                    0 => IterMode::Finished,
                    left => IterMode::Remaining(left),
                };
                Ok(Some(item))
            }
            IterMode::Streaming => {
                if !self.src.read_bool()? {
                    self.mode = IterMode::Finished;
                    return Ok(None);
                }
                Ok(Some(self.elem.run(&mut self.src)?))
            }
        }
    }
}

impl<T: 'static, R: Read + 'static> Iterator for SequenceIter<T, R> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.mode = IterMode::Finished;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.mode {
            IterMode::Finished => (0, Some(0)),
            IterMode::Remaining(left) => (left, Some(left)),
            IterMode::Streaming => (0, None),
        }
    }
}
