use crate::jvm::class_file::{ConstantsPool, ConstantsWriter};
use crate::jvm::code::{BranchInstruction, Label, SerializableInstruction, VerifierInstruction};
use crate::jvm::verifier::VerifierFrame;
use crate::jvm::Error;
use crate::util::{Offset, OffsetVec, Width};
use std::cell::RefCell;
use std::collections::HashMap;

pub type SerializableBasicBlock<'c> =
    BasicBlock<VerifierFrame<'c>, SerializableInstruction, BranchInstruction<Label, Label, Label>>;

pub type VerifierBasicBlock<'c> =
    BasicBlock<VerifierFrame<'c>, VerifierInstruction<'c>, BranchInstruction<Label, Label, Label>>;

/// A JVM method code body is made up of a linear sequence of basic blocks.
///
/// We also store some extra information that ultimately allows us to compute things like: the
/// maximum height of the locals, the maximum height of the stack, and the stack map frames.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct BasicBlock<Frame, Insn, BrInsn> {
    /// Frame at the start of the block
    pub frame: Frame,

    /// Straight-line instructions in the block
    pub instructions: OffsetVec<Insn>,

    /// Branch instruction to close the block
    pub branch_end: BrInsn,
}

impl<Frame, Insn: Width, BrInsn: Width> Width for BasicBlock<Frame, Insn, BrInsn> {
    fn width(&self) -> usize {
        self.instructions.offset_len().0 + self.branch_end.width()
    }
}

impl<Frame, Insn: Width> BasicBlock<Frame, Insn, BranchInstruction<Label, Label, Label>> {
    /// Given an expected order of blocks, compute the offset of every basic block with respect to
    /// that start of the method.
    ///
    /// Switch instructions get their alignment padding updated along the way, since the padding
    /// depends on where the instruction ends up.
    pub fn layout_blocks(
        block_layout_order: &[Label],
        blocks: &mut HashMap<Label, Self>,
    ) -> HashMap<Label, Offset> {
        let mut block_offsets: HashMap<Label, Offset> = HashMap::new();
        let mut offset = Offset(0);
        for block_lbl in block_layout_order {
            block_offsets.insert(*block_lbl, offset);
            if let Some(block) = blocks.get_mut(block_lbl) {
                let branch_off = offset.0 + block.instructions.offset_len().0 + 1;
                block.branch_end.set_padding(((4 - branch_off % 4) % 4) as u8);
                offset.0 += block.width();
            }
        }
        block_offsets
    }
}

impl<'c, Frame>
    BasicBlock<Frame, VerifierInstruction<'c>, BranchInstruction<Label, Label, Label>>
{
    /// Serialize the instructions inside a block
    ///
    /// This is the point at which instructions referencing the constant pool get fully resolved
    /// into offsets to actual constants. Consequently, this is also the first time that the
    /// actual width of the basic block is understood.
    pub fn serialize_instructions(
        self,
        constants: &mut ConstantsPool,
    ) -> Result<
        BasicBlock<Frame, SerializableInstruction, BranchInstruction<Label, Label, Label>>,
        Error,
    > {
        let constants = &RefCell::new(constants);

        let instructions = self
            .instructions
            .values()
            .map(|insn| -> Result<SerializableInstruction, Error> {
                insn.map(
                    |class| class.constant_index(&mut constants.borrow_mut()),
                    |constant| constant.constant_index(&mut constants.borrow_mut()),
                    |field| field.constant_index(&mut constants.borrow_mut()),
                    |method| method.constant_index(&mut constants.borrow_mut()),
                    |indy_method| indy_method.constant_index(&mut constants.borrow_mut()),
                )
            })
            .collect::<Result<OffsetVec<SerializableInstruction>, Error>>()?;

        Ok(BasicBlock {
            frame: self.frame,
            instructions,
            branch_end: self.branch_end,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Instruction, LabelGenerator};
    use crate::jvm::{LoadableConstant, TypeContext};

    #[test]
    fn interning_fixes_widths() {
        let context = TypeContext::new();
        let mut labels = LabelGenerator::new();
        let next = labels.fresh_label();
        let mut constants = ConstantsPool::new();

        // Push enough constants that later `ldc`s need the wide form
        for i in 0..300 {
            constants.integer(1000 + i).unwrap();
        }

        let block: BasicBlock<(), VerifierInstruction, _> = BasicBlock {
            frame: (),
            instructions: vec![
                Instruction::Ldc(LoadableConstant::from(1000)),
                Instruction::Ldc(LoadableConstant::from("fresh")),
                Instruction::CheckCast(context.string()),
            ]
            .into_iter()
            .collect(),
            branch_end: BranchInstruction::FallThrough(next),
        };
        let serialized = block.serialize_instructions(&mut constants).unwrap();

        // `ldc` + `ldc_w` + `checkcast`
        assert_eq!(serialized.instructions.offset_len(), Offset(2 + 3 + 3));
        assert_eq!(serialized.width(), 8);
    }

    #[test]
    fn switch_padding() {
        let mut labels = LabelGenerator::new();
        let (l0, l1) = (labels.fresh_label(), labels.fresh_label());

        let mut blocks: HashMap<Label, BasicBlock<(), SerializableInstruction, _>> = HashMap::new();
        blocks.insert(
            l0,
            BasicBlock {
                frame: (),
                instructions: vec![Instruction::IConst0].into_iter().collect(),
                branch_end: BranchInstruction::TableSwitch {
                    padding: 0,
                    default: l1,
                    low: 0,
                    targets: vec![l1],
                },
            },
        );
        blocks.insert(
            l1,
            BasicBlock {
                frame: (),
                instructions: OffsetVec::new(),
                branch_end: BranchInstruction::Return,
            },
        );

        let offsets = BasicBlock::layout_blocks(&[l0, l1], &mut blocks);

        // `iconst_0` then `tableswitch` at offset 1, so two bytes of padding reach offset 4
        assert!(matches!(
            blocks[&l0].branch_end,
            BranchInstruction::TableSwitch { padding: 2, .. }
        ));
        assert_eq!(offsets[&l1], Offset(1 + 1 + 2 + 12 + 4));
    }
}
