use crate::error::{BrcError, Result};
use crate::stats::ProducerStats;
use crossbeam_channel as channel;
use memchr::{memchr, memrchr};
use std::io::{ErrorKind, Read};
use std::time::Instant;
use tracing::debug;

/// A newline-aligned slice of the input. `seq` is the position in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub seq: u64,
    pub bytes: Vec<u8>,
}

/// What to do with bytes after the last `\n` once the input is exhausted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EofPolicy {
    /// Emit them as a final, unterminated chunk.
    #[default]
    Flush,
    Strict,
}

/// Cuts a reader into chunks that never split a record. Each physical read of
/// `block_bytes` is trimmed at its last `\n`; the tail is carried into the next chunk.
pub struct ChunkReader<R> {
    reader: R,
    block: Vec<u8>,
    leftover: Vec<u8>,
    policy: EofPolicy,
    next_seq: u64,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, block_bytes: usize, policy: EofPolicy) -> Self {
        Self { reader, block: vec![0u8; block_bytes.max(1)], leftover: Vec::new(), policy, next_seq: 0, done: false }
    }

    fn read_block(&mut self) -> std::io::Result<usize> {
        loop {
            match self.reader.read(&mut self.block) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn emit(&mut self, bytes: Vec<u8>) -> Chunk {
        let seq = self.next_seq;
        self.next_seq += 1;
        Chunk { seq, bytes }
    }

    fn finish(&mut self) -> Option<Result<Chunk>> {
        self.done = true;
        if self.leftover.is_empty() {
            return None;
        }
        match self.policy {
            EofPolicy::Flush => {
                let tail = std::mem::take(&mut self.leftover);
                Some(Ok(self.emit(tail)))
            }
            EofPolicy::Strict => Some(Err(BrcError::UnterminatedInput { bytes: self.leftover.len() })),
        }
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let n = match self.read_block() {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(BrcError::io("read input block", e)));
                }
            };
            if n == 0 {
                return self.finish();
            }
            let fresh = &self.block[..n];
            match memrchr(b'\n', fresh) {
                // a record longer than the block: keep accumulating
                None => self.leftover.extend_from_slice(fresh),
                Some(nl) => {
                    let mut out = Vec::with_capacity(self.leftover.len() + nl + 1);
                    out.extend_from_slice(&self.leftover);
                    out.extend_from_slice(&fresh[..=nl]);
                    self.leftover.clear();
                    self.leftover.extend_from_slice(&fresh[nl + 1..]);
                    return Some(Ok(self.emit(out)));
                }
            }
        }
        None
    }
}

/// Drive `reader` onto `tx` until exhausted. Dropping `tx` on return closes the queue.
/// A disconnected receiver means the consumer already failed; production stops quietly.
pub fn produce<R: Read>(reader: ChunkReader<R>, tx: channel::Sender<Chunk>) -> Result<ProducerStats> {
    let start = Instant::now();
    let mut stats = ProducerStats::default();
    for item in reader {
        let chunk = item?;
        let len = chunk.bytes.len() as u64;
        if tx.send(chunk).is_err() {
            debug!(chunks = stats.chunks, "chunk receiver gone, producer stopping");
            break;
        }
        stats.chunks += 1;
        stats.bytes += len;
    }
    stats.wall_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// Cut an in-memory buffer into at most about `parts` slices, each extended to
/// end just after a `\n` (the last slice takes whatever remains).
pub fn split_aligned(bytes: &[u8], parts: usize) -> Vec<&[u8]> {
    let target = (bytes.len() / parts.max(1)).max(1);
    let mut out = Vec::with_capacity(parts);
    let mut start = 0usize;
    while start < bytes.len() {
        let mut end = (start + target).min(bytes.len());
        if end < bytes.len() {
            end = match memchr(b'\n', &bytes[end - 1..]) {
                Some(i) => end + i,
                None => bytes.len(),
            };
        }
        out.push(&bytes[start..end]);
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunks(input: &[u8], block: usize, policy: EofPolicy) -> Result<Vec<Chunk>> {
        ChunkReader::new(Cursor::new(input.to_vec()), block, policy).collect()
    }

    const SAMPLE: &[u8] = b"Hamburg;12.0\nBulawayo;8.9\nPalembang;38.8\nSt. John's;15.2\nCracow;12.6\n";

    #[test]
    fn every_chunk_ends_at_a_record_boundary() {
        for block in 1..=SAMPLE.len() + 3 {
            let out = chunks(SAMPLE, block, EofPolicy::Strict).unwrap();
            assert!(!out.is_empty());
            for c in &out {
                assert_eq!(c.bytes.last(), Some(&b'\n'), "block {}", block);
                assert!(!c.bytes.is_empty());
            }
            let joined: Vec<u8> = out.iter().flat_map(|c| c.bytes.iter().copied()).collect();
            assert_eq!(joined, SAMPLE, "block {}", block);
            let seqs: Vec<u64> = out.iter().map(|c| c.seq).collect();
            assert_eq!(seqs, (0..out.len() as u64).collect::<Vec<_>>());
        }
    }

    #[test]
    fn long_record_is_carried_across_blocks() {
        let out = chunks(b"a-very-long-station-name;1.0\nb;2.0\n", 4, EofPolicy::Strict).unwrap();
        assert_eq!(out[0].bytes, b"a-very-long-station-name;1.0\n");
        assert_eq!(out[1].bytes, b"b;2.0\n");
    }

    #[test]
    fn unterminated_tail_follows_policy() {
        let input = b"a;1.0\nb;2.0";
        let flushed = chunks(input, 4, EofPolicy::Flush).unwrap();
        assert_eq!(flushed.last().unwrap().bytes, b"b;2.0");
        let joined: Vec<u8> = flushed.iter().flat_map(|c| c.bytes.clone()).collect();
        assert_eq!(joined, input);

        let err = chunks(input, 4, EofPolicy::Strict).unwrap_err();
        assert!(matches!(err, BrcError::UnterminatedInput { bytes: 5 }));
    }

    #[test]
    fn split_aligned_slices_end_at_newlines() {
        for parts in 1..12 {
            let slices = split_aligned(SAMPLE, parts);
            for s in &slices {
                assert_eq!(s.last(), Some(&b'\n'), "parts {}", parts);
            }
            assert_eq!(slices.concat(), SAMPLE);
        }
        assert!(split_aligned(b"", 4).is_empty());
        assert_eq!(split_aligned(b"a;1.0\nb;2.0", 8).concat(), b"a;1.0\nb;2.0");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(chunks(b"", 16, EofPolicy::Strict).unwrap().is_empty());
    }

    #[test]
    fn produce_stops_when_receiver_is_dropped() {
        let (tx, rx) = channel::bounded::<Chunk>(1);
        drop(rx);
        let reader = ChunkReader::new(Cursor::new(SAMPLE.to_vec()), 8, EofPolicy::Strict);
        let stats = produce(reader, tx).unwrap();
        assert_eq!(stats.chunks, 0);
    }
}
