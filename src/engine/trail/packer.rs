use std::io::Read;
use std::io::Write;
use std::mem;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::engine::parameters::TrailCompression;

/// A primitive value that can live in a packed trail block.
pub(crate) trait TrailValue: Copy + Default + PartialEq + std::fmt::Debug {
    const WIDTH: usize;

    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

impl TrailValue for i32 {
    const WIDTH: usize = 4;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        i32::from_le_bytes(bytes[..4].try_into().unwrap())
    }
}

impl TrailValue for i64 {
    const WIDTH: usize = 8;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        i64::from_le_bytes(bytes[..8].try_into().unwrap())
    }
}

impl TrailValue for u64 {
    const WIDTH: usize = 8;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        u64::from_le_bytes(bytes[..8].try_into().unwrap())
    }
}

/// One logged mutation: which cell changed and the value it held before the change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Entry<T> {
    pub(crate) cell: u32,
    pub(crate) old: T,
}

/// Packs full trail blocks into byte buffers and unpacks them again on rewind.
///
/// The `Identity` packer is a plain byte copy; `Deflate` trades CPU for keeping long trails
/// resident in a fraction of the memory. Both produce the same observable trail behaviour.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TrailPacker {
    Identity,
    Deflate,
}

impl TrailPacker {
    pub(crate) fn for_compression(compression: TrailCompression) -> TrailPacker {
        match compression {
            TrailCompression::None => TrailPacker::Identity,
            TrailCompression::Generic => TrailPacker::Deflate,
        }
    }

    pub(crate) fn pack<T: TrailValue>(&self, block: &[Entry<T>], out: &mut Vec<u8>) {
        out.clear();
        match self {
            TrailPacker::Identity => {
                out.reserve(block.len() * (4 + T::WIDTH));
                for entry in block {
                    out.extend_from_slice(&entry.cell.to_le_bytes());
                    entry.old.write_le(out);
                }
            }
            TrailPacker::Deflate => {
                let mut raw = Vec::with_capacity(block.len() * (4 + T::WIDTH));
                for entry in block {
                    raw.extend_from_slice(&entry.cell.to_le_bytes());
                    entry.old.write_le(&mut raw);
                }
                let buffer = mem::take(out);
                let mut encoder = DeflateEncoder::new(buffer, Compression::fast());
                encoder
                    .write_all(&raw)
                    .expect("writing to an in-memory buffer cannot fail");
                *out = encoder
                    .finish()
                    .expect("finishing an in-memory deflate stream cannot fail");
            }
        }
    }

    pub(crate) fn unpack<T: TrailValue>(&self, packed: &[u8], out: &mut Vec<Entry<T>>) {
        out.clear();
        let stride = 4 + T::WIDTH;
        match self {
            TrailPacker::Identity => {
                for chunk in packed.chunks_exact(stride) {
                    out.push(Entry {
                        cell: u32::from_le_bytes(chunk[..4].try_into().unwrap()),
                        old: T::read_le(&chunk[4..]),
                    });
                }
            }
            TrailPacker::Deflate => {
                let mut raw = Vec::new();
                let _ = DeflateDecoder::new(packed)
                    .read_to_end(&mut raw)
                    .expect("unpacking a block the engine packed cannot fail");
                for chunk in raw.chunks_exact(stride) {
                    out.push(Entry {
                        cell: u32::from_le_bytes(chunk[..4].try_into().unwrap()),
                        old: T::read_le(&chunk[4..]),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(packer: TrailPacker) {
        let block: Vec<Entry<i64>> = (0..100)
            .map(|i| Entry {
                cell: i,
                old: (i as i64 - 50) * 997,
            })
            .collect();

        let mut packed = Vec::new();
        packer.pack(&block, &mut packed);

        let mut unpacked = Vec::new();
        packer.unpack(&packed, &mut unpacked);

        assert_eq!(block, unpacked);
    }

    #[test]
    fn identity_packer_roundtrips() {
        roundtrip(TrailPacker::Identity);
    }

    #[test]
    fn deflate_packer_roundtrips() {
        roundtrip(TrailPacker::Deflate);
    }

    #[test]
    fn deflate_shrinks_repetitive_blocks() {
        let block: Vec<Entry<u64>> = (0..1000).map(|i| Entry { cell: i, old: 0 }).collect();

        let mut packed = Vec::new();
        TrailPacker::Deflate.pack(&block, &mut packed);

        assert!(packed.len() < block.len() * 12);
    }
}
