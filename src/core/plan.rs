//! Block partitioning arithmetic
//!
//! A copy of `size` bytes is split into `blocks` chunks. Every chunk is
//! `chunk_size` bytes except the first, which also absorbs `remainder`.

use serde::Serialize;

/// How one copy request is divided among workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockPlan {
    /// Total bytes in the request
    pub size: usize,
    /// Number of chunks that will be claimed
    pub blocks: usize,
    /// Bytes per chunk before the remainder is applied
    pub chunk_size: usize,
    /// Leftover bytes folded into the first chunk
    pub remainder: usize,
}

impl BlockPlan {
    /// Compute the plan for `size` bytes on a pool of `threads` workers.
    ///
    /// Sizes below `block_size` still get one block; larger sizes get one
    /// block per `block_size`, never more than there are workers. An empty
    /// request has no blocks and is never dispatched.
    pub fn compute(size: usize, block_size: usize, threads: usize) -> Self {
        if size == 0 {
            return Self {
                size,
                blocks: 0,
                chunk_size: 0,
                remainder: 0,
            };
        }

        let block_size = block_size.max(1);
        let blocks = (size.max(block_size) / block_size).min(threads).max(1);
        let chunk_size = size / blocks;
        let remainder = size - chunk_size * blocks;

        Self {
            size,
            blocks,
            chunk_size,
            remainder,
        }
    }

    /// Size of the first claimed chunk
    pub fn first_chunk(&self) -> usize {
        self.chunk_size + self.remainder
    }

    /// Chunk spans as `(offset, len)` in claim order
    pub fn chunk_spans(&self) -> Vec<(usize, usize)> {
        let mut spans = Vec::with_capacity(self.blocks);
        let mut offset = 0;

        for index in 0..self.blocks {
            let len = if index == 0 {
                self.first_chunk()
            } else {
                self.chunk_size
            };
            spans.push((offset, len));
            offset += len;
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KIB: usize = 1024;

    #[test]
    fn test_reference_scenario() {
        let plan = BlockPlan::compute(1024 * KIB, 64 * KIB, 4);
        assert_eq!(plan.blocks, 4);
        assert_eq!(plan.chunk_size, 256 * KIB);
        assert_eq!(plan.remainder, 0);
    }

    #[test]
    fn test_small_copy_uses_one_block() {
        let plan = BlockPlan::compute(100, 64 * KIB, 8);
        assert_eq!(plan.blocks, 1);
        assert_eq!(plan.first_chunk(), 100);
        assert_eq!(plan.chunk_spans(), vec![(0, 100)]);
    }

    #[test]
    fn test_remainder_goes_to_first_chunk() {
        // 3 blocks of 64K plus 5 bytes
        let plan = BlockPlan::compute(3 * 64 * KIB + 5, 64 * KIB, 8);
        assert_eq!(plan.blocks, 3);
        assert_eq!(plan.remainder, 2);
        assert_eq!(plan.first_chunk(), plan.chunk_size + 2);

        let spans = plan.chunk_spans();
        assert_eq!(spans[1].0, plan.first_chunk());
        assert_eq!(spans[2].1, plan.chunk_size);
    }

    #[test]
    fn test_exactly_one_block_size() {
        let plan = BlockPlan::compute(64 * KIB, 64 * KIB, 8);
        assert_eq!(plan.blocks, 1);
        assert_eq!(plan.chunk_spans(), vec![(0, 64 * KIB)]);
    }

    #[test]
    fn test_zero_size() {
        let plan = BlockPlan::compute(0, 64 * KIB, 8);
        assert_eq!(plan.blocks, 0);
        assert_eq!(plan.chunk_size, 0);
        assert_eq!(plan.remainder, 0);
        assert_eq!(plan.first_chunk(), 0);
        assert!(plan.chunk_spans().is_empty());
    }

    proptest! {
        #[test]
        fn prop_blocks_bounded(
            size in 0usize..(64 << 20),
            block_size in 1usize..(1 << 20),
            threads in 1usize..64,
        ) {
            let plan = BlockPlan::compute(size, block_size, threads);
            prop_assert!(plan.blocks <= threads);
            if size == 0 {
                prop_assert_eq!(plan.blocks, 0);
            } else {
                prop_assert!(plan.blocks >= 1);
                prop_assert!(plan.remainder < plan.blocks);
            }
        }

        #[test]
        fn prop_spans_tile_request(
            size in 0usize..(64 << 20),
            block_size in 1usize..(1 << 20),
            threads in 1usize..64,
        ) {
            let plan = BlockPlan::compute(size, block_size, threads);
            let spans = plan.chunk_spans();
            prop_assert_eq!(spans.len(), plan.blocks);

            let mut expected_offset = 0;
            for (offset, len) in spans {
                prop_assert_eq!(offset, expected_offset);
                expected_offset += len;
            }
            prop_assert_eq!(expected_offset, size);
        }
    }
}
