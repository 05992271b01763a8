use crate::jvm::code::{
    table_switch_high, BasicBlock, BranchInstruction, Code, Instruction, InvokeType, JumpTargets,
    Label, LabelGenerator, VerifierBasicBlock, VerifierInstruction,
};
use crate::jvm::verifier::*;
use crate::jvm::{BaseType, Error, LoadableConstant, MethodRef, Type, VerifierErrorKind};
use crate::util::{Offset, OffsetVec, Width};
use std::collections::HashMap;

/// This provides a very slightly simplified interface for building up method bodies. It does
/// internal bookeeping to track frames, labels, reachability, etc.
///
/// ### Constructing verification frames
///
/// Frames are computed in a single pass from top to bottom. Jumps to a label which hasn't been
/// positioned yet record the frame at the jump, and further jumps (or a fallthrough when the label
/// gets positioned) merge into that frame: references go to their common supertype and locals
/// which disagree become unusable. Once a label is positioned its frame is fixed, so later
/// backward jumps must have frames that are assignable to it.
///
/// ### Tracking reachability
///
/// The JVM verifier doesn't detect and ignore dead bytecode; it still wants stackmaps for it.
/// Instead of patching over dead code afterwards, we enforce that labels cannot be placed unless
/// they are reachable (either with a fall-through from above, or there has already been a jump to
/// the label) and that instructions cannot be pushed in unreachable code. This is also important
/// for the sake of always being able to find the initial frame of the block.
pub struct CodeBuilder<'c> {
    /// Method code under construction
    code: Code<'c>,

    /// Labels which have been referenced in blocks so far, but not placed yet (keys do not overlap
    /// with keys of `block`)
    unplaced_labels: HashMap<Label, VerifierFrame<'c>>,

    /// Block currently under construction (label is not in `blocks` _or_ `unplaced_labels`)
    current_block: Option<CurrentBlock<'c>>,

    /// Which local variable slots are handed out by `allocate_local`
    allocated_locals: Vec<bool>,

    /// Method whose body is being built
    method: MethodContext<'c>,

    /// When bodies are joined, `return` jumps here to continue with the next body
    return_label: Option<Label>,
}

/// Local variable handed out by [`CodeBuilder::allocate_local`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSlot<'c> {
    pub index: u16,
    pub local_type: Type<'c>,
}

impl<'c> LocalSlot<'c> {
    /// Instruction which loads the local onto the stack
    pub fn load(&self) -> VerifierInstruction<'c> {
        match self.local_type.base_type() {
            Some(BaseType::Long) => Instruction::LLoad(self.index),
            Some(BaseType::Float) => Instruction::FLoad(self.index),
            Some(BaseType::Double) => Instruction::DLoad(self.index),
            Some(_) => Instruction::ILoad(self.index),
            None => Instruction::ALoad(self.index),
        }
    }

    /// Instruction which pops the top of the stack into the local
    pub fn store(&self) -> VerifierInstruction<'c> {
        match self.local_type.base_type() {
            Some(BaseType::Long) => Instruction::LStore(self.index),
            Some(BaseType::Float) => Instruction::FStore(self.index),
            Some(BaseType::Double) => Instruction::DStore(self.index),
            Some(_) => Instruction::IStore(self.index),
            None => Instruction::AStore(self.index),
        }
    }
}

impl<'c> CodeBuilder<'c> {
    /// Create a builder for a new method
    pub fn new(method: MethodContext<'c>, is_static: bool, parameters: &[Type<'c>]) -> Self {
        // The initial local variables are just the parameters (including maybe "this")
        let entry_frame = VerifierFrame::method_entry(&method, is_static, parameters);
        let max_locals = entry_frame.locals.offset_len();
        let allocated_locals = vec![true; max_locals.0];

        let mut label_generator = LabelGenerator::new();
        let current_block = Some(CurrentBlock::new(
            label_generator.fresh_label(),
            entry_frame.clone(),
        ));

        let code = Code {
            max_locals,
            max_stack: Offset(0),
            blocks: HashMap::new(),
            block_order: vec![],
            label_generator,
            entry_frame,
            branch_count: 0,
        };

        CodeBuilder {
            code,
            unplaced_labels: HashMap::new(),
            current_block,
            allocated_locals,
            method,
            return_label: None,
        }
    }

    /// Turn the builder into the method code
    ///
    /// Fails if execution can still fall off the end of the method or if some label was jumped to
    /// without ever being positioned.
    pub fn result(self) -> Result<Code<'c>, Error> {
        if self.current_block.is_some() {
            return Err(Error::EndReached);
        }
        if let Some(label) = self.unplaced_labels.keys().min() {
            return Err(Error::UnpositionedLabel(*label));
        }
        Ok(self.code)
    }

    /// Start another body which runs after the bodies before it
    ///
    /// From here on, `return` jumps to the start of the next body instead of leaving the method.
    /// Call [`Self::finish_joined`] once all bodies are in.
    pub fn join_body(&mut self) -> Result<(), Error> {
        if let Some(label) = self.return_label.take() {
            self.place_return_label(label)?;
        }
        self.return_label = Some(self.fresh_label());
        Ok(())
    }

    /// End the last of the joined bodies with a real `return`
    pub fn finish_joined(&mut self) -> Result<(), Error> {
        if let Some(label) = self.return_label.take() {
            self.place_return_label(label)?;
            if self.is_reachable() {
                self.push_branch_instruction(BranchInstruction::Return)?;
            }
        }
        Ok(())
    }

    /// Place the label ending a joined body, unless nothing reaches it
    fn place_return_label(&mut self, label: Label) -> Result<(), Error> {
        if self.is_reachable() || self.unplaced_labels.contains_key(&label) {
            self.place_label(label)?;
        }
        Ok(())
    }

    /// Method this code is for
    pub fn method(&self) -> &MethodContext<'c> {
        &self.method
    }

    /// Query the expected frame for a label that has already been referred to and possibly even
    /// jumped to
    pub fn lookup_frame(&self, label: Label) -> Option<&VerifierFrame<'c>> {
        // The block is already placed
        if let Some(basic_block) = self.code.blocks.get(&label) {
            return Some(&basic_block.frame);
        }

        // The block is only referred to
        if let Some(frame) = self.unplaced_labels.get(&label) {
            return Some(frame);
        }

        // The block is the one we are currently processing
        if let Some(current_block) = self.current_block.as_ref().filter(|b| b.label == label) {
            return Some(&current_block.entry_frame);
        }

        None
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> Label {
        self.code.label_generator.fresh_label()
    }

    /// Get the current frame (`None` when the current position is unreachable)
    pub fn current_frame(&self) -> Option<&VerifierFrame<'c>> {
        self.current_block
            .as_ref()
            .map(|current_block| &current_block.latest_frame)
    }

    /// Is the current position reachable?
    pub fn is_reachable(&self) -> bool {
        self.current_block.is_some()
    }

    fn check_label(&self, label: Label) -> Result<(), Error> {
        if label.belongs_to(&self.code.label_generator) {
            Ok(())
        } else {
            Err(Error::ForeignLabel(label))
        }
    }

    fn is_placed(&self, label: Label) -> bool {
        self.code.blocks.contains_key(&label)
            || self
                .current_block
                .as_ref()
                .map_or(false, |current_block| current_block.label == label)
    }

    /// Record that the given frame flows into `label`
    ///
    /// If the label is positioned, the frame must be assignable to the label's frame. Otherwise,
    /// the frame gets merged into whatever the label has accumulated so far.
    ///
    /// The block being closed is passed in separately since it is neither in `blocks` nor the
    /// current block at this point (this matters when closing the current block with a jump back
    /// to the start of the block).
    fn flow_into_label(
        &mut self,
        label: Label,
        incoming: &VerifierFrame<'c>,
        closing_block: Option<(Label, &VerifierFrame<'c>)>,
    ) -> Result<(), Error> {
        let to_error = |mismatch: FrameMismatch| Error::IncompatibleFrames {
            label,
            component: mismatch.component,
            expected: mismatch.expected,
            found: mismatch.found,
        };

        let placed_frame = match closing_block {
            Some((closing_label, entry_frame)) if closing_label == label => Some(entry_frame),
            _ => self.code.blocks.get(&label).map(|block| &block.frame),
        };
        if let Some(placed_frame) = placed_frame {
            return incoming.check_assignable_to(placed_frame).map_err(to_error);
        }

        let merged = match self.unplaced_labels.get(&label) {
            Some(existing) => existing.merge(incoming).map_err(to_error)?,
            None => incoming.clone(),
        };
        self.unplaced_labels.insert(label, merged);
        Ok(())
    }

    /// Push a new instruction to the current block
    pub fn push_instruction(&mut self, insn: VerifierInstruction<'c>) -> Result<(), Error> {
        let current_block = self.current_block.as_mut().ok_or(Error::UnreachableCode)?;
        let site = (current_block.label, current_block.instructions.len());
        current_block
            .latest_frame
            .verify_instruction(&insn, site, &self.method)
            .map_err(|kind| Error::VerifierError {
                instruction: format!("{:?}", insn),
                kind,
            })?;
        current_block
            .latest_frame
            .update_maximums(&mut self.code.max_locals, &mut self.code.max_stack);

        current_block.instructions.push(insn);
        Ok(())
    }

    /// Push a new branch instruction to close the current block and possibly open a new one
    pub fn push_branch_instruction(
        &mut self,
        mut insn: BranchInstruction<Label, Label, ()>,
    ) -> Result<(), Error> {
        for jump_label in insn.jump_targets().targets() {
            self.check_label(*jump_label)?;
        }
        normalize_switch(&mut insn)?;
        if let Some(label) = self.return_label {
            if matches!(insn, BranchInstruction::Return) {
                insn = BranchInstruction::Goto(label);
            }
        }

        let mut current_block = self.current_block.take().ok_or(Error::UnreachableCode)?;
        let verified = current_block
            .latest_frame
            .verify_branch_instruction(&insn, &self.method)
            .map_err(|kind| Error::VerifierError {
                instruction: format!("{:?}", insn),
                kind,
            });
        if let Err(err) = verified {
            self.current_block = Some(current_block);
            return Err(err);
        }

        // Check that the jump targets (if there are any) have compatible frames
        for jump_label in insn.jump_targets().targets() {
            let flowed = self.flow_into_label(
                *jump_label,
                &current_block.latest_frame,
                Some((current_block.label, &current_block.entry_frame)),
            );
            if let Err(err) = flowed {
                self.current_block = Some(current_block);
                return Err(err);
            }
        }
        if let JumpTargets::Regular(_) = insn.jump_targets() {
            self.code.branch_count += 1;
        }

        // Turn the current block into a regular block, possibly open the next current block
        let branch_end = insn.map_labels(|lbl| *lbl, |lbl| *lbl, |_| self.fresh_label());
        let (block_label, basic_block, next_block) = current_block.close_block(branch_end);
        self.code.block_order.push(block_label);
        self.code.blocks.insert(block_label, basic_block);
        self.current_block = next_block;
        Ok(())
    }

    /// Start a new block with the given label, ending the current block (if there is one) with a
    /// fallthrough. This can fail if:
    ///
    ///   * the label was already placed
    ///   * the label belongs to another method
    ///   * the label was already jumped to from elsewhere, and the frames can't be merged
    ///   * the label was not ever been jumped to and there is no fallthrough (so the label is
    ///     unreachable)
    ///
    pub fn place_label(&mut self, label: Label) -> Result<(), Error> {
        self.check_label(label)?;
        if self.is_placed(label) {
            return Err(Error::LabelAlreadyPositioned(label));
        }

        let frame = match self.current_block.take() {
            Some(current_block) => {
                let merged = match self.unplaced_labels.get(&label) {
                    Some(existing) => existing.merge(&current_block.latest_frame),
                    None => Ok(current_block.latest_frame.clone()),
                };
                let merged = match merged {
                    Ok(merged) => merged,
                    Err(mismatch) => {
                        self.current_block = Some(current_block);
                        return Err(Error::IncompatibleFrames {
                            label,
                            component: mismatch.component,
                            expected: mismatch.expected,
                            found: mismatch.found,
                        });
                    }
                };

                let (block_label, basic_block, _) =
                    current_block.close_block(BranchInstruction::FallThrough(label));
                self.code.block_order.push(block_label);
                self.code.blocks.insert(block_label, basic_block);
                self.unplaced_labels.remove(&label);
                merged
            }
            None => self
                .unplaced_labels
                .remove(&label)
                .ok_or(Error::UnreachableLabel(label))?,
        };

        frame.update_maximums(&mut self.code.max_locals, &mut self.code.max_stack);
        self.current_block = Some(CurrentBlock::new(label, frame));
        Ok(())
    }

    /// Find a free local variable slot wide enough for the type
    ///
    /// Slots freed with [`CodeBuilder::kill_local`] get reused. The slot has no usable value
    /// until something is stored into it.
    pub fn allocate_local(&mut self, local_type: Type<'c>) -> Result<LocalSlot<'c>, Error> {
        let width = local_type.width();
        if width == 0 || local_type.is_null() {
            return Err(Error::VerifierError {
                instruction: String::from("allocate local"),
                kind: VerifierErrorKind::InvalidType {
                    expected: String::from("value type"),
                    found: local_type.to_string(),
                },
            });
        }

        let mut index = 0;
        while self
            .allocated_locals
            .iter()
            .skip(index)
            .take(width)
            .any(|allocated| *allocated)
        {
            index += 1;
        }
        let end = index + width;
        let slot = u16::try_from(index)
            .ok()
            .filter(|_| end <= u16::MAX as usize + 1)
            .ok_or(Error::MaxLocalsOverflow(Offset(end)))?;

        if self.allocated_locals.len() < end {
            self.allocated_locals.resize(end, false);
        }
        for allocated in &mut self.allocated_locals[index..end] {
            *allocated = true;
        }
        Ok(LocalSlot {
            index: slot,
            local_type,
        })
    }

    /// Release a local variable slot so that it can be reused
    ///
    /// The slot becomes unusable in the current frame.
    pub fn kill_local(&mut self, local: LocalSlot<'c>) {
        let start = local.index as usize;
        let width = local.local_type.width();
        for allocated in self.allocated_locals.iter_mut().skip(start).take(width) {
            *allocated = false;
        }
        if let Some(current_block) = self.current_block.as_mut() {
            current_block.latest_frame.kill_local(local.index, width);
        }
    }

    /// Push a constant onto the stack, using the most compact instruction for it
    pub fn load_constant(&mut self, constant: LoadableConstant<'c>) -> Result<(), Error> {
        use Instruction::*;
        let insn = match constant {
            LoadableConstant::Integer(-1) => IConstM1,
            LoadableConstant::Integer(0) => IConst0,
            LoadableConstant::Integer(1) => IConst1,
            LoadableConstant::Integer(2) => IConst2,
            LoadableConstant::Integer(3) => IConst3,
            LoadableConstant::Integer(4) => IConst4,
            LoadableConstant::Integer(5) => IConst5,
            LoadableConstant::Integer(i) if i8::try_from(i).is_ok() => BiPush(i as i8),
            LoadableConstant::Integer(i) if i16::try_from(i).is_ok() => SiPush(i as i16),
            LoadableConstant::Long(0) => LConst0,
            LoadableConstant::Long(1) => LConst1,
            LoadableConstant::Float(f) if f.to_bits() == 0.0f32.to_bits() => FConst0,
            LoadableConstant::Float(f) if f == 1.0 => FConst1,
            LoadableConstant::Float(f) if f == 2.0 => FConst2,
            LoadableConstant::Double(d) if d.to_bits() == 0.0f64.to_bits() => DConst0,
            LoadableConstant::Double(d) if d == 1.0 => DConst1,
            other if other.width() == 2 => Ldc2(other),
            other => Ldc(other),
        };
        self.push_instruction(insn)
    }

    /// Call a method, picking the right invoke instruction for it
    pub fn invoke(&mut self, method: MethodRef<'c>) -> Result<(), Error> {
        let invoke_type: InvokeType = method.infer_invoke_type();
        self.push_instruction(Instruction::Invoke(invoke_type, method))
    }
}

/// Just like `BasicBlock`, but not closed off yet
struct CurrentBlock<'c> {
    pub label: Label,

    /// State of the frame at the start of `instructions`
    pub entry_frame: VerifierFrame<'c>,

    /// Tracks the state of the frame at the end of `instructions`
    pub latest_frame: VerifierFrame<'c>,

    /// Accumulated instructions
    pub instructions: OffsetVec<VerifierInstruction<'c>>,
}

impl<'c> CurrentBlock<'c> {
    /// New block starting with a given frame
    pub fn new(label: Label, entry_frame: VerifierFrame<'c>) -> CurrentBlock<'c> {
        CurrentBlock {
            label,
            latest_frame: entry_frame.clone(),
            entry_frame,
            instructions: OffsetVec::new(),
        }
    }

    /// Seal the current block into a basic block
    ///
    /// If the branch can fall through, the next block starts with the frame at the end of this
    /// one.
    pub fn close_block(
        self,
        branch_end: BranchInstruction<Label, Label, Label>,
    ) -> (Label, VerifierBasicBlock<'c>, Option<CurrentBlock<'c>>) {
        let fallthrough_target: Option<Label> = branch_end.fallthrough_target();

        // If the branch end uses `tableswitch` or `lookupswitch`, it may end up needing padding,
        // but that will be handled during the final serialization pass
        let basic_block = BasicBlock {
            frame: self.entry_frame,
            instructions: self.instructions,
            branch_end,
        };

        let next_block = fallthrough_target.map(|label| CurrentBlock::new(label, self.latest_frame));

        (self.label, basic_block, next_block)
    }
}

/// Sort `lookupswitch` cases by key and check that the keys of either switch are usable
fn normalize_switch(insn: &mut BranchInstruction<Label, Label, ()>) -> Result<(), Error> {
    match insn {
        BranchInstruction::TableSwitch { low, targets, .. } => {
            if table_switch_high(*low, targets.len()).is_none() {
                return Err(Error::InvalidSwitchRange {
                    low: *low,
                    targets: targets.len(),
                });
            }
        }
        BranchInstruction::LookupSwitch { targets, .. } => {
            targets.sort_by_key(|(key, _)| *key);
            if let Some(pair) = targets.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(Error::DuplicateSwitchKey(pair[0].0));
            }
        }
        _ => (),
    }
    Ok(())
}
