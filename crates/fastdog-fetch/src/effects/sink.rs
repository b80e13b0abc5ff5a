use bytes::Bytes;

use crate::data::Progress;

/// Receives a transfer's bytes in offset order.
///
/// `on_start` runs once, before the first chunk, with the byte offset the
/// transfer starts at. `on_progress` follows every `on_chunk` call, after the
/// chunk is counted.
pub trait ChunkSink {
    fn on_start(&mut self, _resumed_from: u64) {}

    fn on_chunk(&mut self, chunk: &Bytes);

    fn on_progress(&mut self, _progress: &Progress) {}
}

/// [`ChunkSink`] built from two closures.
pub struct FnSink<C, P> {
    on_chunk: C,
    on_progress: P,
}

impl<C, P> FnSink<C, P>
where
    C: FnMut(&Bytes),
    P: FnMut(&Progress),
{
    pub fn new(on_chunk: C, on_progress: P) -> Self {
        Self {
            on_chunk,
            on_progress,
        }
    }
}

impl<C, P> ChunkSink for FnSink<C, P>
where
    C: FnMut(&Bytes),
    P: FnMut(&Progress),
{
    fn on_chunk(&mut self, chunk: &Bytes) {
        (self.on_chunk)(chunk)
    }

    fn on_progress(&mut self, progress: &Progress) {
        (self.on_progress)(progress)
    }
}
