//! Monotonic bump-allocator arena (§4.2).
//!
//! Block-allocated (default 1 MiB per block), aligned bump allocation. When
//! a request doesn't fit in the current block a new block is allocated —
//! there is no compaction and no reclamation short of `reset()`. Intended
//! for scratch allocations scoped to a single generator pass or backtest
//! run, not for long-lived objects.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
    len: usize,
    offset: usize,
}

impl Block {
    fn new(size: usize) -> Self {
        let layout = Layout::from_size_align(size, 16).expect("arena block layout");
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).expect("arena block allocation failed");
        Self {
            ptr,
            layout,
            len: size,
            offset: 0,
        }
    }

    /// Attempts a bump allocation from this block; returns `None` if it
    /// doesn't fit in the remaining space.
    fn try_allocate(&mut self, bytes: usize, alignment: usize) -> Option<NonNull<u8>> {
        let base = self.ptr.as_ptr() as usize;
        let current = base + self.offset;
        let aligned = (current + alignment - 1) & !(alignment - 1);
        let padding = aligned - current;
        if self.offset + padding + bytes > self.len {
            return None;
        }
        self.offset += padding + bytes;
        NonNull::new((base + self.offset - bytes) as *mut u8)
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// A growable chain of blocks; allocations never move once handed out.
pub struct Arena {
    block_size: usize,
    blocks: Vec<Block>,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: vec![Block::new(block_size)],
        }
    }

    /// Bump-allocate `bytes` aligned to `alignment`. Rounds up within the
    /// current block; falls back to a fresh block (sized to fit the
    /// request if it exceeds the configured block size) when it doesn't
    /// fit.
    pub fn allocate(&mut self, bytes: usize, alignment: usize) -> NonNull<u8> {
        if let Some(ptr) = self
            .blocks
            .last_mut()
            .and_then(|b| b.try_allocate(bytes, alignment))
        {
            return ptr;
        }
        let size = bytes.max(self.block_size) + alignment;
        self.blocks.push(Block::new(size));
        self.blocks
            .last_mut()
            .unwrap()
            .try_allocate(bytes, alignment)
            .expect("fresh block must fit its own request")
    }

    /// Discards all but the first block and rewinds its offset to zero.
    /// Every pointer previously handed out by this arena is invalidated.
    pub fn reset(&mut self) {
        self.blocks.truncate(1);
        self.blocks[0].offset = 0;
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
