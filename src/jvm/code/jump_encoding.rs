//! Fix wide jumps by rewriting them into `goto_w`
//!
//! This module is responsible for fixing jumps that require bigger relative offsets than the jump
//! instruction supports. The general idea is to switch to using `goto_w` for all jumps that don't
//! fit in the signed 16-bit offset that most other jump instructions have.
//!
//! ### Termination
//!
//! This is a fixed point: the `goto_w` rewrites are themselves longer than the initial jump
//! instruction, so the rewrites risk causing other jumps to become oversized and also need to be
//! rewritten. Every pass rewrites at least one jump and a rewritten jump never needs rewriting
//! again, so the number of passes is bounded by the number of 16-bit jumps. The caller still
//! supplies an explicit bound and gets an error if it is exceeded.
//!
//!   - once a jump is rewritten, it can be discarded from consideration (`goto_w` is definitely
//!     enough)
//!
//!   - any extra 16-bit jump instruction introduced in a rewrite are always jumping small _fixed_
//!     distances so they never need to be rewritten
//!
//! ### Rewriting
//!
//! There are two categories of 16-bit jumps that need to be rewritten: `goto` and `if*`. Depending
//! on the case, we employ a different rewrite. Rewrites always insert a segment that is a multiple
//! of four bytes wide, so `lookupswitch`/`tableswitch` padding mostly stays the same (it is
//! recomputed after every pass regardless). For `goto`, this requires some `nop` padding:
//!
//! ```text,ignore,no_run
//!                           nop
//!                           nop
//!     goto L2               goto_w L2
//! L1: ...         =>    L1: ...
//!     ...                   ...
//! L2: ...               L2: ...
//! ```
//!
//! For other instructions, the rewrite happens to already introduce exactly 8 bytes. The condition
//! is kept, but now targets a nearby trampoline.
//!
//! ```text,ignore,no_run
//!                           if* L4
//!                       L3: goto L1
//!     if* L2            L4: goto_w L2
//! L1: ...         =>    L1: ...
//!     ...                   ...
//! L2: ...               L2: ...
//! ```
//!

use crate::jvm::code::{BasicBlock, BranchInstruction, JumpTargets, Label, LabelGenerator};
use crate::jvm::Error;
use crate::util::{Offset, OffsetVec, Width};
use log::trace;
use std::collections::HashMap;
use std::ops::{RangeBounds, RangeInclusive};

/// Range of relative jump offsets supported by `goto` and `if*` branch instructions
pub const SIGNED_16BIT_JUMP_RANGE: RangeInclusive<isize> =
    RangeInclusive::new(i16::MIN as isize, i16::MAX as isize);

/// Given blocks in the specified order, detect which jumps are oversized and rewrite them.
///
/// This process might end up introducing new blocks, which is why both the block order and blocks
/// themselves must be mutable references. The `small_jump_range` parameter should always be
/// `SIGNED_16BIT_JUMP_RANGE` - it is a parameter only for unit testing purposes.
///
/// Returns the final offsets of all blocks.
pub fn widen_oversized_jumps<Frame: Clone, Insn: Default + Width>(
    block_order: &mut Vec<Label>,
    blocks: &mut HashMap<Label, BasicBlock<Frame, Insn, BranchInstruction<Label, Label, Label>>>,
    label_generator: &mut LabelGenerator,
    small_jump_range: &impl RangeBounds<isize>,
    max_passes: usize,
) -> Result<HashMap<Label, Offset>, Error> {
    let mut passes = 0;
    loop {
        let offsets = BasicBlock::layout_blocks(block_order, blocks);

        // Collect the jumps which don't fit (in layout order, for stable label numbering)
        let oversized: Vec<Label> = block_order
            .iter()
            .filter(|block_lbl| {
                let block = &blocks[*block_lbl];
                match block.branch_end.jump_targets() {
                    JumpTargets::Regular(target) => {
                        let from = offsets[*block_lbl].0 + block.instructions.offset_len().0;
                        let distance = offsets[&target].0 as isize - from as isize;
                        !small_jump_range.contains(&distance)
                    }
                    _ => false,
                }
            })
            .copied()
            .collect();

        if oversized.is_empty() {
            return Ok(offsets);
        }
        passes += 1;
        if passes > max_passes {
            return Err(Error::WideningDidNotConverge { passes: max_passes });
        }

        for block_lbl in oversized {
            widen_jump(block_order, blocks, label_generator, block_lbl);
        }
    }
}

/// Rewrite the 16-bit jump at the end of one block
fn widen_jump<Frame: Clone, Insn: Default + Width>(
    block_order: &mut Vec<Label>,
    blocks: &mut HashMap<Label, BasicBlock<Frame, Insn, BranchInstruction<Label, Label, Label>>>,
    label_generator: &mut LabelGenerator,
    block_lbl: Label,
) {
    let block = match blocks.get_mut(&block_lbl) {
        Some(block) => block,
        None => return,
    };

    // `goto` -> `nop nop goto_w`
    if let BranchInstruction::Goto(target) = block.branch_end {
        trace!("widening goto {} at the end of {}", target, block_lbl);
        block.instructions.push(Insn::default());
        block.instructions.push(Insn::default());
        block.branch_end = BranchInstruction::GotoW(target);
        return;
    }

    // `if* L2` -> `if* L4; L3: goto L1; L4: goto_w L2`
    let extra_block1 = label_generator.fresh_label();
    let extra_block2 = label_generator.fresh_label();
    let (new_branch_end, next_lbl, far_lbl) = match &block.branch_end {
        BranchInstruction::If(comp, far_lbl, next_lbl) => (
            BranchInstruction::If(*comp, extra_block2, extra_block1),
            *next_lbl,
            *far_lbl,
        ),
        BranchInstruction::IfICmp(comp, far_lbl, next_lbl) => (
            BranchInstruction::IfICmp(*comp, extra_block2, extra_block1),
            *next_lbl,
            *far_lbl,
        ),
        BranchInstruction::IfACmp(comp, far_lbl, next_lbl) => (
            BranchInstruction::IfACmp(*comp, extra_block2, extra_block1),
            *next_lbl,
            *far_lbl,
        ),
        BranchInstruction::IfNull(comp, far_lbl, next_lbl) => (
            BranchInstruction::IfNull(*comp, extra_block2, extra_block1),
            *next_lbl,
            *far_lbl,
        ),
        _ => return,
    };
    let (next_frame, far_frame) = match (blocks.get(&next_lbl), blocks.get(&far_lbl)) {
        (Some(next), Some(far)) => (next.frame.clone(), far.frame.clone()),
        _ => return,
    };
    trace!("widening branch to {} at the end of {}", far_lbl, block_lbl);
    if let Some(block) = blocks.get_mut(&block_lbl) {
        block.branch_end = new_branch_end;
    }
    blocks.insert(
        extra_block1,
        BasicBlock {
            instructions: OffsetVec::new(),
            frame: next_frame,
            branch_end: BranchInstruction::Goto(next_lbl),
        },
    );
    blocks.insert(
        extra_block2,
        BasicBlock {
            instructions: OffsetVec::new(),
            frame: far_frame,
            branch_end: BranchInstruction::GotoW(far_lbl),
        },
    );

    if let Some(position) = block_order.iter().position(|lbl| *lbl == block_lbl) {
        block_order.insert(position + 1, extra_block2);
        block_order.insert(position + 1, extra_block1);
    }
}
