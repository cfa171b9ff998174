//! N-block and mask-block lists
//!
//! Both side channels of a twoBit record are sorted lists of `(start, size)` runs.
//! N-blocks force bases to `N`, mask-blocks lower-case them.

use std::ops::Range;

use crate::error::{FormatError, Result};

/// A run of `size` bases starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: u32,
    pub size: u32,
}
impl Block {
    #[must_use]
    pub fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }

    /// Exclusive end of the run
    ///
    /// Computed in 64 bits so that corrupt blocks cannot overflow.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.size)
    }

    /// The run as a half-open range of base positions
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end() as usize
    }
}

/// Collects the maximal runs of bases matching `pred`
///
/// Adjacent matches are always merged into a single block.
pub(crate) fn find_runs<F: Fn(u8) -> bool>(sequence: &[u8], pred: F) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut run_start = None;
    for (idx, &base) in sequence.iter().enumerate() {
        match (pred(base), run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                blocks.push(Block::new(start as u32, (idx - start) as u32));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        blocks.push(Block::new(start as u32, (sequence.len() - start) as u32));
    }
    blocks
}

/// Checks that a block list is sorted, non-overlapping, and inside the sequence
///
/// Adjacent blocks that were not merged are accepted.
pub(crate) fn validate(
    blocks: &[Block],
    base_count: u32,
    name: &str,
    kind: &'static str,
) -> Result<()> {
    let mut previous_end = 0u64;
    for (index, block) in blocks.iter().enumerate() {
        let problem = if block.end() > u64::from(base_count) {
            Some("past the end of the sequence")
        } else if index > 0 && u64::from(block.start) < previous_end {
            Some("unsorted or overlapping its predecessor")
        } else {
            None
        };
        if let Some(problem) = problem {
            return Err(FormatError::InvalidBlock {
                name: name.to_string(),
                kind,
                index,
                start: block.start,
                size: block.size,
                base_count,
                problem,
            }
            .into());
        }
        previous_end = block.end();
    }
    Ok(())
}

/// Iterates the blocks that intersect `[start, end)`
///
/// Relies on the list being sorted and non-overlapping.
pub(crate) fn overlapping(blocks: &[Block], start: usize, end: usize) -> impl Iterator<Item = &Block> {
    let first = blocks.partition_point(|block| block.end() <= start as u64);
    blocks[first..]
        .iter()
        .take_while(move |block| (block.start as usize) < end)
}

/// Total number of bases covered by a block list
pub(crate) fn covered(blocks: &[Block]) -> u64 {
    blocks.iter().map(|block| u64::from(block.size)).sum()
}

/// Overwrites every position of `out` covered by a block with `N`
///
/// `out[0]` corresponds to base `offset` of the sequence.
pub(crate) fn apply_hard_mask(blocks: &[Block], out: &mut [u8], offset: usize) {
    let end = offset + out.len();
    for block in overlapping(blocks, offset, end) {
        let lbound = block.range().start.max(offset) - offset;
        let rbound = block.range().end.min(end) - offset;
        out[lbound..rbound].fill(b'N');
    }
}

/// Lower-cases every position of `out` covered by a block
pub(crate) fn apply_soft_mask(blocks: &[Block], out: &mut [u8], offset: usize) {
    let end = offset + out.len();
    for block in overlapping(blocks, offset, end) {
        let lbound = block.range().start.max(offset) - offset;
        let rbound = block.range().end.min(end) - offset;
        out[lbound..rbound].make_ascii_lowercase();
    }
}
