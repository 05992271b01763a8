use crate::jvm::class_file;
use crate::jvm::class_file::ConstantsPool;
use crate::jvm::code::{jump_encoding, Label, LabelGenerator, SerializableBasicBlock, VerifierBasicBlock};
use crate::jvm::verifier::{StackMapBuilder, UninitializedSite, VerifierFrame};
use crate::jvm::{Error, Serialize};
use crate::util::{Offset, Width};
use log::debug;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};

/// Semantic representation of a method body
pub struct Code<'c> {
    /// Maximum size of locals through the method
    pub max_locals: Offset,

    /// Maximum size of stack through the method
    pub max_stack: Offset,

    /// Basic blocks in the code
    pub blocks: HashMap<Label, VerifierBasicBlock<'c>>,

    /// Order of basic blocks in the code (elements are unique and exactly match keys of `blocks`)
    pub block_order: Vec<Label>,

    /// Generator to produce the next label
    pub label_generator: LabelGenerator,

    /// Implicit frame at the start of the method
    pub entry_frame: VerifierFrame<'c>,

    /// Number of jumps with a 16-bit offset
    pub branch_count: usize,
}

impl<'c> Code<'c> {
    /// Lower the code into a `Code` attribute
    ///
    /// Widening is attempted at most `max_widening_passes` times. Each pass widens at least one
    /// jump, so the default of one more pass than there are jumps is always enough.
    pub fn serialize_code(
        mut self,
        constants: &mut ConstantsPool,
        max_widening_passes: Option<usize>,
    ) -> Result<class_file::Code, Error> {
        let max_locals: u16 = u16::try_from(self.max_locals.0)
            .map_err(|_| Error::MaxLocalsOverflow(self.max_locals))?;
        let max_stack: u16 =
            u16::try_from(self.max_stack.0).map_err(|_| Error::MaxStackOverflow(self.max_stack))?;

        // Intern constants, which settles the width of every straight-line instruction
        let mut blocks: HashMap<Label, SerializableBasicBlock> = HashMap::new();
        for block_label in &self.block_order {
            if let Some(block) = self.blocks.remove(block_label) {
                blocks.insert(*block_label, block.serialize_instructions(constants)?);
            }
        }

        // Check and rewrite oversized jumps
        let max_passes = max_widening_passes.unwrap_or(self.branch_count + 1);
        let label_offsets = jump_encoding::widen_oversized_jumps(
            &mut self.block_order,
            &mut blocks,
            &mut self.label_generator,
            &jump_encoding::SIGNED_16BIT_JUMP_RANGE,
            max_passes,
        )?;

        let code_length: usize = blocks.values().map(|block| block.width()).sum();
        if code_length > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(Offset(code_length)));
        }

        let uninitialized_offset = |site: &UninitializedSite<'c>| -> Result<u16, Error> {
            let block_offset = label_offsets
                .get(&site.block)
                .ok_or(Error::UnpositionedLabel(site.block))?;
            let insn_offset = blocks
                .get(&site.block)
                .and_then(|block| block.instructions.get_index(site.index))
                .map_or(0, |(offset, _)| offset.0);
            let offset = block_offset.0 + insn_offset;
            u16::try_from(offset).map_err(|_| Error::MethodCodeOverflow(Offset(offset)))
        };

        // Frames are only needed at jump targets
        let mut jump_targets: HashSet<Label> = HashSet::new();
        for block in blocks.values() {
            jump_targets.extend(block.branch_end.jump_targets().targets());
        }
        let implicit_frame = self
            .entry_frame
            .into_serializable(constants, &uninitialized_offset)?;
        let mut stack_map = StackMapBuilder::new(implicit_frame);
        for block_label in &self.block_order {
            if !jump_targets.contains(block_label) {
                continue;
            }
            if let (Some(block), Some(offset)) =
                (blocks.get(block_label), label_offsets.get(block_label))
            {
                let frame = block
                    .frame
                    .into_serializable(constants, &uninitialized_offset)?;
                stack_map.add(*offset, frame)?;
            }
        }

        // Write out the bytecode, block by block
        let mut code_array = class_file::BytecodeArray(Vec::with_capacity(code_length));
        for block_label in &self.block_order {
            let (block, block_offset) = match (blocks.get(block_label), label_offsets.get(block_label)) {
                (Some(block), Some(offset)) => (block, *offset),
                _ => continue,
            };
            for insn in block.instructions.values() {
                insn.serialize(&mut code_array.0).map_err(Error::Io)?;
            }

            let branch_offset = (block_offset.0 + block.instructions.offset_len().0) as isize;
            let relative = |lbl: &Label| -> isize {
                label_offsets
                    .get(lbl)
                    .map_or(0, |target| target.0 as isize - branch_offset)
            };
            let overflowed = Cell::new(false);
            let end_insn = block.branch_end.map_labels(
                |lbl| {
                    i16::try_from(relative(lbl)).unwrap_or_else(|_| {
                        overflowed.set(true);
                        0
                    })
                },
                |lbl| {
                    i32::try_from(relative(lbl)).unwrap_or_else(|_| {
                        overflowed.set(true);
                        0
                    })
                },
                |_| (),
            );
            if overflowed.get() {
                return Err(Error::WideningDidNotConverge { passes: max_passes });
            }
            end_insn.serialize(&mut code_array.0).map_err(Error::Io)?;
        }

        let mut attributes = vec![];

        // Add `StackMapTable` attribute only if there are frames
        if !stack_map.is_empty() {
            let stack_map_table = class_file::StackMapTable(stack_map.encode()?);
            attributes.push(constants.get_attribute(stack_map_table)?);
        }

        debug!(
            "serialized {} bytes of code ({} blocks, max stack {}, max locals {})",
            code_length,
            self.block_order.len(),
            max_stack,
            max_locals
        );

        Ok(class_file::Code {
            max_stack,
            max_locals,
            code_array,
            exception_table: vec![],
            attributes,
        })
    }
}
