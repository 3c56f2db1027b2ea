use std::mem;

use super::packer::Entry;
use super::packer::TrailPacker;
use super::packer::TrailValue;

/// Append-only log of trail entries stored in fixed-size blocks.
///
/// The last `block_size` entries stay unpacked in the active block; one further block is kept
/// unpacked in a staging buffer so that a rewind crossing a block boundary does not immediately
/// unpack. Older blocks are packed through the configured [`TrailPacker`] and kept on a stack;
/// their byte buffers are recycled through a freelist to avoid reallocation in the
/// pack/unpack churn of deep searches.
#[derive(Debug)]
pub(crate) struct PackedStore<T: TrailValue> {
    packer: TrailPacker,
    block_size: usize,
    /// Packed blocks, oldest first.
    blocks: Vec<Vec<u8>>,
    /// Recycled byte buffers for future packed blocks.
    free_blocks: Vec<Vec<u8>>,
    /// The active block holding the newest entries.
    data: Vec<Entry<T>>,
    /// The previous full block, still unpacked.
    buffer: Vec<Entry<T>>,
    buffer_used: bool,
    size: usize,
}

impl<T: TrailValue> PackedStore<T> {
    pub(crate) fn new(block_size: usize, packer: TrailPacker) -> PackedStore<T> {
        debug_assert!(block_size > 0);
        PackedStore {
            packer,
            block_size,
            blocks: Vec::new(),
            free_blocks: Vec::new(),
            data: Vec::with_capacity(block_size),
            buffer: Vec::with_capacity(block_size),
            buffer_used: false,
            size: 0,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn push(&mut self, entry: Entry<T>) {
        if self.data.len() == self.block_size {
            if self.buffer_used {
                // The staging buffer holds the older of the two unpacked blocks; pack it
                // before it is overwritten by the block that just filled up.
                let mut bytes = self.free_blocks.pop().unwrap_or_default();
                self.packer.pack(&self.buffer, &mut bytes);
                self.blocks.push(bytes);
            } else {
                self.buffer_used = true;
            }
            mem::swap(&mut self.data, &mut self.buffer);
            self.data.clear();
        }
        self.data.push(entry);
        self.size += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<Entry<T>> {
        if self.size == 0 {
            return None;
        }
        if self.data.is_empty() {
            if self.buffer_used {
                mem::swap(&mut self.data, &mut self.buffer);
                self.buffer_used = false;
            } else {
                let packed = self
                    .blocks
                    .pop()
                    .expect("non-zero size implies a packed block remains");
                self.packer.unpack(&packed, &mut self.data);
                self.free_blocks.push(packed);
            }
        }
        self.size -= 1;
        self.data.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(packer: TrailPacker) -> PackedStore<i64> {
        PackedStore::new(4, packer)
    }

    fn fill(store: &mut PackedStore<i64>, n: u32) {
        for i in 0..n {
            store.push(Entry {
                cell: i,
                old: i as i64 * 3,
            });
        }
    }

    #[test]
    fn entries_pop_in_reverse_push_order_across_blocks() {
        for packer in [TrailPacker::Identity, TrailPacker::Deflate] {
            let mut store = store(packer);
            fill(&mut store, 23);
            assert_eq!(store.size(), 23);

            for i in (0..23).rev() {
                let entry = store.pop().unwrap();
                assert_eq!(entry.cell, i);
                assert_eq!(entry.old, i as i64 * 3);
            }
            assert_eq!(store.size(), 0);
            assert!(store.pop().is_none());
        }
    }

    #[test]
    fn interleaved_push_pop_preserves_lifo_order() {
        let mut store = store(TrailPacker::Deflate);
        fill(&mut store, 10);
        for _ in 0..6 {
            let _ = store.pop();
        }
        fill(&mut store, 9);

        let entry = store.pop().unwrap();
        assert_eq!(entry.cell, 8);
        assert_eq!(store.size(), 12);
    }

    #[test]
    fn packed_block_buffers_are_recycled() {
        let mut store = store(TrailPacker::Identity);
        fill(&mut store, 16);
        while store.pop().is_some() {}
        assert!(!store.free_blocks.is_empty());

        fill(&mut store, 16);
        assert_eq!(store.size(), 16);
    }
}
