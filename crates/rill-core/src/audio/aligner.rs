//! Sample alignment for arbitrarily cut network reads
//!
//! Network reads split the PCM body wherever the transport pleases, so a
//! 16-bit sample can straddle two chunks. The aligner only ever releases
//! whole samples and carries the odd byte into the next read.

use bytes::{BufMut, Bytes, BytesMut};

/// Width of one sample in bytes (16-bit PCM).
pub const SAMPLE_WIDTH: usize = 2;

/// Split `leftover + incoming` into a sample-aligned span and the new leftover.
///
/// No byte is dropped or duplicated: the span plus the returned leftover is
/// exactly the concatenated input. When there is no leftover the span is a
/// zero-copy slice of `incoming`.
pub fn align(leftover: Option<u8>, incoming: Bytes) -> (Bytes, Option<u8>) {
    match leftover {
        None => {
            let usable = incoming.len() - incoming.len() % SAMPLE_WIDTH;
            let rest = incoming.get(usable).copied();
            (incoming.slice(..usable), rest)
        }
        Some(carried) => {
            let total = incoming.len() + 1;
            let usable = total - total % SAMPLE_WIDTH;
            if usable == 0 {
                return (Bytes::new(), Some(carried));
            }

            let mut span = BytesMut::with_capacity(usable);
            span.put_u8(carried);
            span.extend_from_slice(&incoming[..usable - 1]);
            let rest = incoming.get(usable - 1).copied();
            (span.freeze(), rest)
        }
    }
}

/// Stateful wrapper around [`align`] that owns the leftover between reads.
#[derive(Debug, Default)]
pub struct ByteAligner {
    leftover: Option<u8>,
    /// Consecutive pushes that ended with a carried byte
    carried_chunks: u32,
}

impl ByteAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk, returning the whole samples it completes.
    pub fn push(&mut self, chunk: Bytes) -> Bytes {
        let (span, rest) = align(self.leftover.take(), chunk);
        self.leftover = rest;
        self.carried_chunks = match rest {
            Some(_) => self.carried_chunks.saturating_add(1),
            None => 0,
        };
        span
    }

    /// Bytes currently held back (0 or 1).
    pub fn leftover_len(&self) -> usize {
        self.leftover.map_or(0, |_| 1)
    }

    /// How many reads in a row have left a byte behind.
    ///
    /// A well-formed stream resolves the leftover within a read or two; a
    /// stream that is off by one byte keeps it forever.
    pub fn carried_chunks(&self) -> u32 {
        self.carried_chunks
    }

    /// Take the trailing byte at end of stream. It can never form a sample.
    pub fn finish(&mut self) -> Option<u8> {
        self.carried_chunks = 0;
        self.leftover.take()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(aligner: &mut ByteAligner, cuts: &[usize], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offset = 0;
        for &cut in cuts {
            let chunk = Bytes::copy_from_slice(&data[offset..offset + cut]);
            let span = aligner.push(chunk);
            assert_eq!(span.len() % SAMPLE_WIDTH, 0);
            out.extend_from_slice(&span);
            offset += cut;
        }
        out
    }

    #[test]
    fn test_even_chunk_passes_through() {
        let (span, rest) = align(None, Bytes::from_static(&[1, 2, 3, 4]));
        assert_eq!(&span[..], &[1, 2, 3, 4]);
        assert_eq!(rest, None);
    }

    #[test]
    fn test_odd_chunk_carries_last_byte() {
        let (span, rest) = align(None, Bytes::from_static(&[1, 2, 3]));
        assert_eq!(&span[..], &[1, 2]);
        assert_eq!(rest, Some(3));

        let (span, rest) = align(rest, Bytes::from_static(&[4, 5]));
        assert_eq!(&span[..], &[3, 4]);
        assert_eq!(rest, Some(5));
    }

    #[test]
    fn test_empty_input_keeps_leftover() {
        let (span, rest) = align(Some(9), Bytes::new());
        assert!(span.is_empty());
        assert_eq!(rest, Some(9));

        let (span, rest) = align(None, Bytes::new());
        assert!(span.is_empty());
        assert_eq!(rest, None);
    }

    #[test]
    fn test_no_bytes_lost_for_any_cut_pattern() {
        let data: Vec<u8> = (0..=200u8).collect();
        let patterns: &[&[usize]] = &[
            &[201],
            &[1; 201],
            &[3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 6],
            &[2, 1, 0, 4, 1, 193],
            &[100, 0, 101],
        ];

        for cuts in patterns {
            assert_eq!(cuts.iter().sum::<usize>(), data.len());
            let mut aligner = ByteAligner::new();
            let out = feed(&mut aligner, cuts, &data);
            let total = data.len();
            assert_eq!(out.len(), total - total % SAMPLE_WIDTH);
            assert_eq!(aligner.leftover_len(), total % SAMPLE_WIDTH);
            assert_eq!(&out[..], &data[..out.len()]);
        }
    }

    #[test]
    fn test_carried_chunks_tracks_misaligned_stream() {
        let mut aligner = ByteAligner::new();
        aligner.push(Bytes::from_static(&[0, 0, 0]));
        assert_eq!(aligner.carried_chunks(), 1);
        // Even chunks never resolve a carried byte
        aligner.push(Bytes::from_static(&[0, 0]));
        aligner.push(Bytes::from_static(&[0, 0]));
        assert_eq!(aligner.carried_chunks(), 3);
        aligner.push(Bytes::from_static(&[0]));
        assert_eq!(aligner.carried_chunks(), 0);
        assert_eq!(aligner.finish(), None);
    }
}
