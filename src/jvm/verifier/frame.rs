use super::*;
use crate::jvm::class_file::{ClassConstantIndex, ConstantsPool};
use crate::jvm::code::{BranchInstruction, Instruction, InvokeType, Label, VerifierInstruction};
use crate::jvm::{
    BaseType, BinaryName, Error, FrameComponent, LoadableConstant, Type, VerifierErrorKind,
};
use crate::util::{Offset, OffsetVec, Width};
use std::fmt::Display;

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Besides just being able to produce stack map entries, tracking frames lets us validate that
/// the bytecode being created is valid as it is being created.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame<Cls, U> {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType<Cls, U>>,

    /// Types of values on the stack
    pub stack: OffsetVec<VerificationType<Cls, U>>,
}

/// Stack map frame stored during verification
pub type VerifierFrame<'c> = Frame<Type<'c>, UninitializedSite<'c>>;

/// Stack map frame as it is encoded in the class file
pub type SerializableFrame = Frame<ClassConstantIndex, u16>;

type VType<'c> = VerifierType<'c>;

/// Facts about the method whose code is being verified
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'c> {
    pub this_class: Type<'c>,
    pub return_type: Type<'c>,
    pub is_init: bool,
}

/// Part of a frame which does not fit what was expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMismatch {
    pub component: FrameComponent,
    pub expected: String,
    pub found: String,
}

impl<Cls: Clone, U: Clone> Frame<Cls, U> {
    /// Frame with no locals and an empty stack
    pub fn empty() -> Frame<Cls, U> {
        Frame {
            locals: OffsetVec::new(),
            stack: OffsetVec::new(),
        }
    }

    /// Set the type of a local variable
    ///
    /// Locals that overlap the updated slots (eg. a `long` whose second half gets overwritten)
    /// are invalidated and gaps are filled with `Top`.
    pub fn set_local(&mut self, index: u16, typ: VerificationType<Cls, U>) {
        let start = index as usize;
        let end = start + typ.width();
        let mut updated: OffsetVec<VerificationType<Cls, U>> = OffsetVec::new();
        let mut new_local = Some(typ);

        for (Offset(offset), _, local) in self.locals.iter() {
            let local_end = offset + local.width();
            if local_end <= start {
                pad_locals(&mut updated, offset);
                updated.push(local.clone());
            } else if offset >= end {
                if let Some(new_local) = new_local.take() {
                    pad_locals(&mut updated, start);
                    updated.push(new_local);
                }
                pad_locals(&mut updated, offset);
                updated.push(local.clone());
            }
        }
        if let Some(new_local) = new_local {
            pad_locals(&mut updated, start);
            updated.push(new_local);
        }

        self.locals = updated;
    }

    /// Mark local variable slots as unusable
    ///
    /// Trailing unusable slots are dropped entirely.
    pub fn kill_local(&mut self, index: u16, width: usize) {
        for slot in 0..width {
            self.set_local(index + slot as u16, VerificationType::Top);
        }
        self.locals.pop_while(VerificationType::is_top);
    }

    /// Update the maximum locals and stack
    ///
    /// Only has an effect if the size of the locals or the size of the stack is greater than the
    /// previous maximum values.
    pub fn update_maximums(&self, max_locals: &mut Offset, max_stack: &mut Offset) {
        max_locals.0 = max_locals.0.max(self.locals.offset_len().0);
        max_stack.0 = max_stack.0.max(self.stack.offset_len().0);
    }
}

fn pad_locals<Cls, U>(locals: &mut OffsetVec<VerificationType<Cls, U>>, offset: usize) {
    while locals.offset_len().0 < offset {
        locals.push(VerificationType::Top);
    }
}

impl<'c> VerifierFrame<'c> {
    /// Frame on entry to a method
    pub fn method_entry(
        method: &MethodContext<'c>,
        is_static: bool,
        parameters: &[Type<'c>],
    ) -> VerifierFrame<'c> {
        let mut frame = Frame::empty();
        if !is_static {
            frame.locals.push(if method.is_init {
                VerificationType::UninitializedThis
            } else {
                VerificationType::Object(method.this_class)
            });
        }
        for parameter in parameters {
            frame.locals.push(VType::from(*parameter));
        }
        frame
    }

    /// Update the frame to reflect the effects of the given (non-branching) instruction
    ///
    /// `site` is the block containing the instruction and the index of the instruction in that
    /// block. It is used to identify objects created with `new`.
    pub fn verify_instruction(
        &mut self,
        insn: &VerifierInstruction<'c>,
        site: (Label, usize),
        method: &MethodContext<'c>,
    ) -> Result<(), VerifierErrorKind> {
        verify_instruction(self, method, insn, site)
    }

    /// Update the frame to reflect the effects of the given branching instruction
    pub fn verify_branch_instruction<Lbl, LblWide, LblNext>(
        &mut self,
        insn: &BranchInstruction<Lbl, LblWide, LblNext>,
        method: &MethodContext<'c>,
    ) -> Result<(), VerifierErrorKind> {
        verify_branch_instruction(self, method, insn)
    }

    /// Combine the frame with the frame from another path into the same label
    ///
    /// References merge to their common supertype and locals which differ between the paths
    /// become unusable. The stacks must have the same shape.
    pub fn merge(&self, incoming: &VerifierFrame<'c>) -> Result<VerifierFrame<'c>, FrameMismatch> {
        let stack_mismatch = || FrameMismatch {
            component: FrameComponent::Stack,
            expected: render_types(&self.stack),
            found: render_types(&incoming.stack),
        };
        if self.stack.len() != incoming.stack.len() {
            return Err(stack_mismatch());
        }
        let mut stack = OffsetVec::new();
        for (existing, other) in self.stack.values().zip(incoming.stack.values()) {
            match VType::merge(existing, other) {
                Some(merged) if merged.width() == existing.width() => {
                    stack.push(merged);
                }
                _ => return Err(stack_mismatch()),
            }
        }

        let mut locals = OffsetVec::new();
        let locals_len = self.locals.offset_len().max(incoming.locals.offset_len()).0;
        let mut offset = 0;
        while offset < locals_len {
            let existing = self.locals.get_offset(Offset(offset)).ok();
            let other = incoming.locals.get_offset(Offset(offset)).ok();
            let merged = match (existing, other) {
                (Some(existing), Some(other)) => {
                    VType::merge(existing, other).unwrap_or(VerificationType::Top)
                }
                _ => VerificationType::Top,
            };
            offset += merged.width();
            locals.push(merged);
        }
        locals.pop_while(VerificationType::is_top);

        Ok(Frame { locals, stack })
    }

    /// Check that this frame can flow into a label whose frame is already fixed
    pub fn check_assignable_to(&self, target: &VerifierFrame<'c>) -> Result<(), FrameMismatch> {
        let stack_compatible = self.stack.len() == target.stack.len()
            && self
                .stack
                .values()
                .zip(target.stack.values())
                .all(|(found, expected)| VType::is_assignable(found, expected));
        if !stack_compatible {
            return Err(FrameMismatch {
                component: FrameComponent::Stack,
                expected: render_types(&target.stack),
                found: render_types(&self.stack),
            });
        }

        let locals_compatible = target.locals.iter().all(|(offset, _, expected)| {
            expected.is_top()
                || self
                    .locals
                    .get_offset(offset)
                    .ok()
                    .map_or(false, |found| VType::is_assignable(found, expected))
        });
        if !locals_compatible {
            return Err(FrameMismatch {
                component: FrameComponent::Locals,
                expected: render_types(&target.locals),
                found: render_types(&self.locals),
            });
        }

        Ok(())
    }

    /// Resolve the frame into its serializable form
    ///
    /// Trailing unusable locals are dropped, since the JVM treats missing locals as `Top`.
    pub fn into_serializable(
        &self,
        constants: &mut ConstantsPool,
        uninitialized_offset: impl Fn(&UninitializedSite<'c>) -> Result<u16, Error>,
    ) -> Result<SerializableFrame, Error> {
        let mut locals: OffsetVec<SerializableType> = self
            .locals
            .values()
            .map(|t| t.into_serializable(constants, &uninitialized_offset))
            .collect::<Result<_, _>>()?;
        locals.pop_while(VerificationType::is_top);
        let stack = self
            .stack
            .values()
            .map(|t| t.into_serializable(constants, &uninitialized_offset))
            .collect::<Result<_, _>>()?;
        Ok(Frame { locals, stack })
    }
}

/// Render a stack or locals for error messages (eg. `[int, java.lang.String]`)
pub fn render_types<C: Display, U: Display>(types: &OffsetVec<VerificationType<C, U>>) -> String {
    let rendered: Vec<String> = types.values().map(|t| t.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}

fn verify_instruction<'c>(
    frame: &mut VerifierFrame<'c>,
    method: &MethodContext<'c>,
    insn: &VerifierInstruction<'c>,
    (current_block, index_in_block): (Label, usize),
) -> Result<(), VerifierErrorKind> {
    use Instruction::*;
    use VerificationType::*;

    let context = method.this_class.context();

    match insn {
        Nop => (),
        AConstNull => {
            frame.stack.push(Null);
        }
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            frame.stack.push(Integer);
        }
        LConst0 | LConst1 => {
            frame.stack.push(Long);
        }
        FConst0 | FConst1 | FConst2 => {
            frame.stack.push(Float);
        }
        DConst0 | DConst1 => {
            frame.stack.push(Double);
        }
        BiPush(_) | SiPush(_) => {
            frame.stack.push(Integer);
        }
        Ldc(constant) | Ldc2(constant) => {
            let expected_width = if matches!(insn, Ldc(_)) { 1 } else { 2 };
            if constant.width() != expected_width {
                return Err(VerifierErrorKind::InvalidWidth(constant.width()));
            }
            frame.stack.push(loadable_type(constant, method)?);
        }

        ILoad(index) => {
            get_local_expecting_type(&frame.locals, *index, Integer)?;
            frame.stack.push(Integer);
        }
        LLoad(index) => {
            get_local_expecting_type(&frame.locals, *index, Long)?;
            frame.stack.push(Long);
        }
        FLoad(index) => {
            get_local_expecting_type(&frame.locals, *index, Float)?;
            frame.stack.push(Float);
        }
        DLoad(index) => {
            get_local_expecting_type(&frame.locals, *index, Double)?;
            frame.stack.push(Double);
        }
        ALoad(index) => {
            let typ = get_local(&frame.locals, *index)?;
            expect_reference(&typ)?;
            frame.stack.push(typ);
        }

        IALoad => load_primitive_array(frame, &[BaseType::Int], Integer, method)?,
        LALoad => load_primitive_array(frame, &[BaseType::Long], Long, method)?,
        FALoad => load_primitive_array(frame, &[BaseType::Float], Float, method)?,
        DALoad => load_primitive_array(frame, &[BaseType::Double], Double, method)?,
        BALoad => load_primitive_array(
            frame,
            &[BaseType::Byte, BaseType::Boolean],
            Integer,
            method,
        )?,
        CALoad => load_primitive_array(frame, &[BaseType::Char], Integer, method)?,
        SALoad => load_primitive_array(frame, &[BaseType::Short], Integer, method)?,
        AALoad => {
            pop_expecting_type(&mut frame.stack, Integer)?;
            let element = match pop(&mut frame.stack)? {
                Null => Null,
                Object(array) => match array.component_type() {
                    Some(component) if component.is_reference() => Object(component),
                    _ => return Err(mismatch("array of references", array)),
                },
                other => return Err(mismatch("array of references", other)),
            };
            frame.stack.push(element);
        }

        IStore(index) => {
            pop_expecting_type(&mut frame.stack, Integer)?;
            frame.set_local(*index, Integer);
        }
        FStore(index) => {
            pop_expecting_type(&mut frame.stack, Float)?;
            frame.set_local(*index, Float);
        }
        LStore(index) => {
            pop_expecting_type(&mut frame.stack, Long)?;
            frame.set_local(*index, Long);
        }
        DStore(index) => {
            pop_expecting_type(&mut frame.stack, Double)?;
            frame.set_local(*index, Double);
        }
        AStore(index) => {
            let popped_type = pop(&mut frame.stack)?;
            expect_reference(&popped_type)?;
            frame.set_local(*index, popped_type);
        }

        IAStore => store_primitive_array(frame, &[BaseType::Int], Integer, method)?,
        LAStore => store_primitive_array(frame, &[BaseType::Long], Long, method)?,
        FAStore => store_primitive_array(frame, &[BaseType::Float], Float, method)?,
        DAStore => store_primitive_array(frame, &[BaseType::Double], Double, method)?,
        BAStore => store_primitive_array(
            frame,
            &[BaseType::Byte, BaseType::Boolean],
            Integer,
            method,
        )?,
        CAStore => store_primitive_array(frame, &[BaseType::Char], Integer, method)?,
        SAStore => store_primitive_array(frame, &[BaseType::Short], Integer, method)?,
        AAStore => {
            // Covariance of arrays means the element is checked at runtime
            let element = pop(&mut frame.stack)?;
            expect_reference(&element)?;
            pop_expecting_type(&mut frame.stack, Integer)?;
            match pop(&mut frame.stack)? {
                Null => (),
                Object(array) if array.component_type().map_or(false, Type::is_reference) => (),
                other => return Err(mismatch("array of references", other)),
            }
        }

        Pop => {
            let _ = pop_expecting_width(&mut frame.stack, 1)?;
        }

        Pop2 => {
            let arg1 = pop(&mut frame.stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let _ = pop_expecting_width(&mut frame.stack, 1)?;
                }

                // Form 2
                2 => (),

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup => {
            let arg1 = pop_expecting_width(&mut frame.stack, 1)?;
            frame.stack.push(arg1);
            frame.stack.push(arg1);
        }

        DupX1 => {
            let arg1 = pop_expecting_width(&mut frame.stack, 1)?;
            let arg2 = pop_expecting_width(&mut frame.stack, 1)?;
            frame.stack.push(arg1);
            frame.stack.push(arg2);
            frame.stack.push(arg1);
        }

        DupX2 => {
            let arg1 = pop_expecting_width(&mut frame.stack, 1)?;
            let arg2 = pop(&mut frame.stack)?;
            match arg2.width() {
                // Form 1
                1 => {
                    let arg3 = pop_expecting_width(&mut frame.stack, 1)?;
                    frame.stack.push(arg1);
                    frame.stack.push(arg3);
                    frame.stack.push(arg2);
                    frame.stack.push(arg1);
                }

                // Form 2
                2 => {
                    frame.stack.push(arg1);
                    frame.stack.push(arg2);
                    frame.stack.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2 => {
            let arg1 = pop(&mut frame.stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_expecting_width(&mut frame.stack, 1)?;
                    frame.stack.push(arg2);
                    frame.stack.push(arg1);
                    frame.stack.push(arg2);
                    frame.stack.push(arg1);
                }

                // Form 2
                2 => {
                    frame.stack.push(arg1);
                    frame.stack.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X1 => {
            let arg1 = pop(&mut frame.stack)?;
            match arg1.width() {
                // Form 1
                1 => {
                    let arg2 = pop_expecting_width(&mut frame.stack, 1)?;
                    let arg3 = pop_expecting_width(&mut frame.stack, 1)?;
                    frame.stack.push(arg2);
                    frame.stack.push(arg1);
                    frame.stack.push(arg3);
                    frame.stack.push(arg2);
                    frame.stack.push(arg1);
                }

                // Form 2
                2 => {
                    let arg2 = pop_expecting_width(&mut frame.stack, 1)?;
                    frame.stack.push(arg1);
                    frame.stack.push(arg2);
                    frame.stack.push(arg1);
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Dup2X2 => {
            let arg1 = pop(&mut frame.stack)?;
            match arg1.width() {
                1 => {
                    let arg2 = pop_expecting_width(&mut frame.stack, 1)?;
                    let arg3 = pop(&mut frame.stack)?;
                    match arg3.width() {
                        // Form 1
                        1 => {
                            let arg4 = pop_expecting_width(&mut frame.stack, 1)?;
                            frame.stack.push(arg2);
                            frame.stack.push(arg1);
                            frame.stack.push(arg4);
                            frame.stack.push(arg3);
                            frame.stack.push(arg2);
                            frame.stack.push(arg1);
                        }

                        // Form 3
                        2 => {
                            frame.stack.push(arg2);
                            frame.stack.push(arg1);
                            frame.stack.push(arg3);
                            frame.stack.push(arg2);
                            frame.stack.push(arg1);
                        }

                        other => return Err(VerifierErrorKind::InvalidWidth(other)),
                    }
                }

                2 => {
                    let arg2 = pop(&mut frame.stack)?;
                    match arg2.width() {
                        // Form 2
                        1 => {
                            let arg3 = pop_expecting_width(&mut frame.stack, 1)?;
                            frame.stack.push(arg1);
                            frame.stack.push(arg3);
                            frame.stack.push(arg2);
                            frame.stack.push(arg1);
                        }

                        // Form 4
                        2 => {
                            frame.stack.push(arg1);
                            frame.stack.push(arg2);
                            frame.stack.push(arg1);
                        }

                        other => return Err(VerifierErrorKind::InvalidWidth(other)),
                    }
                }

                other => return Err(VerifierErrorKind::InvalidWidth(other)),
            }
        }

        Swap => {
            let arg1 = pop_expecting_width(&mut frame.stack, 1)?;
            let arg2 = pop_expecting_width(&mut frame.stack, 1)?;
            frame.stack.push(arg1);
            frame.stack.push(arg2);
        }

        IAdd | ISub | IDiv | IMul | IRem | IAnd | IOr | IXor | ISh(_) => {
            pop_expecting_type(&mut frame.stack, Integer)?;
            pop_expecting_type(&mut frame.stack, Integer)?;
            frame.stack.push(Integer);
        }

        LAdd | LSub | LDiv | LMul | LRem | LAnd | LOr | LXor => {
            pop_expecting_type(&mut frame.stack, Long)?;
            pop_expecting_type(&mut frame.stack, Long)?;
            frame.stack.push(Long);
        }

        FAdd | FSub | FDiv | FMul | FRem => {
            pop_expecting_type(&mut frame.stack, Float)?;
            pop_expecting_type(&mut frame.stack, Float)?;
            frame.stack.push(Float);
        }

        DAdd | DSub | DDiv | DMul | DRem => {
            pop_expecting_type(&mut frame.stack, Double)?;
            pop_expecting_type(&mut frame.stack, Double)?;
            frame.stack.push(Double);
        }

        INeg | I2B | I2C | I2S => {
            pop_expecting_type(&mut frame.stack, Integer)?;
            frame.stack.push(Integer);
        }

        LNeg => {
            pop_expecting_type(&mut frame.stack, Long)?;
            frame.stack.push(Long);
        }

        FNeg => {
            pop_expecting_type(&mut frame.stack, Float)?;
            frame.stack.push(Float);
        }

        DNeg => {
            pop_expecting_type(&mut frame.stack, Double)?;
            frame.stack.push(Double);
        }

        LSh(_) => {
            pop_expecting_type(&mut frame.stack, Integer)?;
            pop_expecting_type(&mut frame.stack, Long)?;
            frame.stack.push(Long);
        }

        IInc(index, _) => {
            get_local_expecting_type(&frame.locals, *index, Integer)?;
        }

        I2L => convert(frame, Integer, Long)?,
        I2F => convert(frame, Integer, Float)?,
        I2D => convert(frame, Integer, Double)?,
        L2I => convert(frame, Long, Integer)?,
        L2F => convert(frame, Long, Float)?,
        L2D => convert(frame, Long, Double)?,
        F2I => convert(frame, Float, Integer)?,
        F2L => convert(frame, Float, Long)?,
        F2D => convert(frame, Float, Double)?,
        D2I => convert(frame, Double, Integer)?,
        D2L => convert(frame, Double, Long)?,
        D2F => convert(frame, Double, Float)?,

        LCmp => {
            pop_expecting_type(&mut frame.stack, Long)?;
            pop_expecting_type(&mut frame.stack, Long)?;
            frame.stack.push(Integer);
        }
        FCmp(_) => {
            pop_expecting_type(&mut frame.stack, Float)?;
            pop_expecting_type(&mut frame.stack, Float)?;
            frame.stack.push(Integer);
        }
        DCmp(_) => {
            pop_expecting_type(&mut frame.stack, Double)?;
            pop_expecting_type(&mut frame.stack, Double)?;
            frame.stack.push(Integer);
        }

        GetStatic(field) => {
            expect_static(field.is_static, true)?;
            frame.stack.push(VType::from(field.field_type));
        }
        PutStatic(field) => {
            expect_static(field.is_static, true)?;
            pop_expecting_type(&mut frame.stack, VType::from(field.field_type))?;
        }
        GetField(field) => {
            expect_static(field.is_static, false)?;
            pop_expecting_type(&mut frame.stack, Object(field.class))?;
            frame.stack.push(VType::from(field.field_type));
        }
        PutField(field) => {
            expect_static(field.is_static, false)?;
            pop_expecting_type(&mut frame.stack, VType::from(field.field_type))?;

            // Constructors may set their own fields before calling the super constructor
            match pop(&mut frame.stack)? {
                UninitializedThis if field.class == method.this_class => (),
                receiver if VType::is_assignable(&receiver, &Object(field.class)) => (),
                receiver => return Err(mismatch(field.class, receiver)),
            }
        }

        Invoke(invoke_type, invoked) => {
            let descriptor = &invoked.descriptor;

            // Check that all the arguments match
            for expected_arg_type in descriptor.parameters.iter().rev() {
                pop_expecting_type(&mut frame.stack, VType::from(*expected_arg_type))?;
            }

            if let (InvokeType::Special, true) = (invoke_type, invoked.is_init()) {
                if !descriptor.return_type.is_void() {
                    return Err(VerifierErrorKind::MustReturnVoid);
                }

                // Initialize
                let (uninitialized, initialized) = match pop(&mut frame.stack)? {
                    UninitializedThis => (UninitializedThis, Object(method.this_class)),
                    Uninitialized(site) if site.class == invoked.class => {
                        (Uninitialized(site), Object(site.class))
                    }
                    other => return Err(VerifierErrorKind::NotUninitialized(other.to_string())),
                };
                replace_all(&mut frame.stack, &uninitialized, &initialized);
                replace_all(&mut frame.locals, &uninitialized, &initialized);
            } else {
                let (expects_interface, needs_receiver) = match invoke_type {
                    InvokeType::Static => (None, false),
                    InvokeType::Special => (None, true),
                    InvokeType::Virtual => (Some(false), true),
                    InvokeType::Interface(_) => (Some(true), true),
                };
                if let Some(expects_interface) = expects_interface {
                    if invoked.is_interface() != expects_interface {
                        let expected = if expects_interface { "interface" } else { "class" };
                        return Err(mismatch(expected, invoked.class));
                    }
                }
                expect_static(invoked.is_static, !needs_receiver)?;

                // Pop off the receiver type
                if needs_receiver {
                    pop_expecting_type(&mut frame.stack, Object(invoked.class))?;
                }

                // Push the return type
                if !descriptor.return_type.is_void() {
                    frame.stack.push(VType::from(descriptor.return_type));
                }
            }
        }

        InvokeDynamic(invoke_dynamic) => {
            let descriptor = &invoke_dynamic.descriptor;
            for expected_arg_type in descriptor.parameters.iter().rev() {
                pop_expecting_type(&mut frame.stack, VType::from(*expected_arg_type))?;
            }
            if !descriptor.return_type.is_void() {
                frame.stack.push(VType::from(descriptor.return_type));
            }
        }

        New(class) => {
            if !class.is_class() || class.is_interface() {
                return Err(mismatch("instantiable class", class));
            }
            frame.stack.push(Uninitialized(UninitializedSite {
                class: *class,
                block: current_block,
                index: index_in_block,
            }));
        }
        NewArray(base_type) => {
            pop_expecting_type(&mut frame.stack, Integer)?;
            let array = array_of(context.primitive(*base_type))?;
            frame.stack.push(Object(array));
        }
        ANewArray(class) => {
            if !class.is_reference() || class.is_null() {
                return Err(VerifierErrorKind::NotReference(class.to_string()));
            }
            pop_expecting_type(&mut frame.stack, Integer)?;
            frame.stack.push(Object(array_of(*class)?));
        }
        MultiANewArray(class, dimensions) => {
            if *dimensions == 0 || class.dimensions() < *dimensions as usize {
                return Err(VerifierErrorKind::NotArrayType(class.to_string()));
            }
            for _ in 0..*dimensions {
                pop_expecting_type(&mut frame.stack, Integer)?;
            }
            frame.stack.push(Object(*class));
        }
        ArrayLength => {
            match pop(&mut frame.stack)? {
                Null => (),
                Object(array) if array.is_array() => (),
                other => return Err(VerifierErrorKind::NotArrayType(other.to_string())),
            }
            frame.stack.push(Integer);
        }

        CheckCast(class) => {
            expect_initialized_reference(&pop(&mut frame.stack)?)?;
            frame.stack.push(Object(*class));
        }
        InstanceOf(_) => {
            expect_initialized_reference(&pop(&mut frame.stack)?)?;
            frame.stack.push(Integer);
        }

        MonitorEnter | MonitorExit => {
            expect_initialized_reference(&pop(&mut frame.stack)?)?;
        }
    }

    Ok(())
}

fn verify_branch_instruction<'c, Lbl, LblWide, LblNext>(
    frame: &mut VerifierFrame<'c>,
    method: &MethodContext<'c>,
    insn: &BranchInstruction<Lbl, LblWide, LblNext>,
) -> Result<(), VerifierErrorKind> {
    use BranchInstruction::*;
    use VerificationType::*;

    let return_type = method.return_type;
    let stack = &mut frame.stack;

    match insn {
        If(_, _, _) => pop_expecting_type(stack, Integer)?,
        IfICmp(_, _, _) => {
            pop_expecting_type(stack, Integer)?;
            pop_expecting_type(stack, Integer)?;
        }
        IfACmp(_, _, _) => {
            expect_reference(&pop(stack)?)?;
            expect_reference(&pop(stack)?)?;
        }
        IfNull(_, _, _) => expect_reference(&pop(stack)?)?,
        Goto(_) | GotoW(_) | FallThrough(_) => (),
        TableSwitch { .. } | LookupSwitch { .. } => pop_expecting_type(stack, Integer)?,
        IReturn | LReturn | FReturn | DReturn | AReturn => {
            if return_type.is_void() {
                return Err(VerifierErrorKind::MustReturnVoid);
            }
            let expected = VType::from(return_type);
            let matches_kind = match insn {
                IReturn => expected == Integer,
                LReturn => expected == Long,
                FReturn => expected == Float,
                DReturn => expected == Double,
                _ => expected.is_reference(),
            };
            if !matches_kind {
                return Err(mismatch(return_type, insn_kind(insn)));
            }
            pop_expecting_type(stack, expected)?;
        }
        Return => {
            if !return_type.is_void() {
                return Err(VerifierErrorKind::MustReturnValue);
            }
            if method.is_init && frame.locals.values().any(|t| *t == UninitializedThis) {
                return Err(VerifierErrorKind::NotUninitialized(String::from(
                    "this (the super constructor was never called)",
                )));
            }
        }
        AThrow => {
            let throwable = method.this_class.context().class(&BinaryName::THROWABLE);
            pop_expecting_type(stack, Object(throwable))?;
            *stack = OffsetVec::new();
        }
    }

    Ok(())
}

/// Short name of a return instruction (for error messages)
fn insn_kind<Lbl, LblWide, LblNext>(insn: &BranchInstruction<Lbl, LblWide, LblNext>) -> &'static str {
    match insn {
        BranchInstruction::IReturn => "ireturn",
        BranchInstruction::LReturn => "lreturn",
        BranchInstruction::FReturn => "freturn",
        BranchInstruction::DReturn => "dreturn",
        BranchInstruction::AReturn => "areturn",
        _ => "branch",
    }
}

/// Type pushed by `ldc`, `ldc_w`, or `ldc2_w`
fn loadable_type<'c>(
    constant: &LoadableConstant<'c>,
    method: &MethodContext<'c>,
) -> Result<VType<'c>, VerifierErrorKind> {
    match constant {
        LoadableConstant::Class(class) if !class.is_reference() || class.is_null() => {
            Err(VerifierErrorKind::InvalidConstant(class.to_string()))
        }
        LoadableConstant::Dynamic(dynamic) if dynamic.constant_type.is_void() => {
            Err(VerifierErrorKind::InvalidConstant(String::from("void")))
        }
        _ => Ok(VType::from(
            constant.constant_type(method.this_class.context()),
        )),
    }
}

fn load_primitive_array<'c>(
    frame: &mut VerifierFrame<'c>,
    allowed: &[BaseType],
    element: VType<'c>,
    method: &MethodContext<'c>,
) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(&mut frame.stack, VerificationType::Integer)?;
    pop_primitive_array(&mut frame.stack, allowed, method)?;
    frame.stack.push(element);
    Ok(())
}

fn store_primitive_array<'c>(
    frame: &mut VerifierFrame<'c>,
    allowed: &[BaseType],
    element: VType<'c>,
    method: &MethodContext<'c>,
) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(&mut frame.stack, element)?;
    pop_expecting_type(&mut frame.stack, VerificationType::Integer)?;
    pop_primitive_array(&mut frame.stack, allowed, method)
}

fn pop_primitive_array<'c>(
    stack: &mut OffsetVec<VType<'c>>,
    allowed: &[BaseType],
    method: &MethodContext<'c>,
) -> Result<(), VerifierErrorKind> {
    match pop(stack)? {
        VerificationType::Null => Ok(()),
        VerificationType::Object(array)
            if array.dimensions() == 1
                && array
                    .element_type()
                    .base_type()
                    .map_or(false, |base_type| allowed.contains(&base_type)) =>
        {
            Ok(())
        }
        other => {
            let context = method.this_class.context();
            let expected = allowed
                .iter()
                .map(|base_type| format!("{}[]", context.primitive(*base_type)))
                .collect::<Vec<_>>()
                .join(" or ");
            Err(mismatch(expected, other))
        }
    }
}

fn convert<'c>(
    frame: &mut VerifierFrame<'c>,
    from: VType<'c>,
    to: VType<'c>,
) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(&mut frame.stack, from)?;
    frame.stack.push(to);
    Ok(())
}

fn array_of(element: Type<'_>) -> Result<Type<'_>, VerifierErrorKind> {
    element
        .context()
        .array_of(element, 1)
        .map_err(|_| mismatch("array with at most 255 dimensions", format!("{}[]", element)))
}

fn expect_static(is_static: bool, expected: bool) -> Result<(), VerifierErrorKind> {
    let describe = |is_static: bool| if is_static { "static member" } else { "instance member" };
    if is_static == expected {
        Ok(())
    } else {
        Err(mismatch(describe(expected), describe(is_static)))
    }
}

fn expect_reference(typ: &VType<'_>) -> Result<(), VerifierErrorKind> {
    if typ.is_reference() {
        Ok(())
    } else {
        Err(VerifierErrorKind::NotReference(typ.to_string()))
    }
}

fn expect_initialized_reference(typ: &VType<'_>) -> Result<(), VerifierErrorKind> {
    match typ {
        VerificationType::Null | VerificationType::Object(_) => Ok(()),
        _ => Err(VerifierErrorKind::NotReference(typ.to_string())),
    }
}

fn mismatch(expected: impl Display, found: impl Display) -> VerifierErrorKind {
    VerifierErrorKind::InvalidType {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn replace_all<C: Clone + Eq, U: Clone + Eq>(
    offset_vec: &mut OffsetVec<VerificationType<C, U>>,
    original: &VerificationType<C, U>,
    updated: &VerificationType<C, U>,
) {
    *offset_vec = offset_vec
        .values()
        .map(|ty| if ty == original { updated.clone() } else { ty.clone() })
        .collect();
}

fn get_local<'c>(locals: &OffsetVec<VType<'c>>, index: u16) -> Result<VType<'c>, VerifierErrorKind> {
    match locals.get_offset(Offset(index as usize)).ok() {
        Some(local) if !local.is_top() => Ok(*local),
        _ => Err(VerifierErrorKind::InvalidIndex(index)),
    }
}

fn get_local_expecting_type<'c>(
    locals: &OffsetVec<VType<'c>>,
    index: u16,
    expected_type: VType<'c>,
) -> Result<(), VerifierErrorKind> {
    let found = get_local(locals, index)?;
    if found == expected_type {
        Ok(())
    } else {
        Err(mismatch(expected_type, found))
    }
}

fn pop<'c>(stack: &mut OffsetVec<VType<'c>>) -> Result<VType<'c>, VerifierErrorKind> {
    stack
        .pop()
        .map(|(_, typ)| typ)
        .ok_or(VerifierErrorKind::EmptyStack)
}

fn pop_expecting_width<'c>(
    stack: &mut OffsetVec<VType<'c>>,
    expected_width: usize,
) -> Result<VType<'c>, VerifierErrorKind> {
    let typ = pop(stack)?;
    let found_width = typ.width();
    if found_width == expected_width {
        Ok(typ)
    } else {
        Err(VerifierErrorKind::InvalidWidth(found_width))
    }
}

fn pop_expecting_type<'c>(
    stack: &mut OffsetVec<VType<'c>>,
    expected_type: VType<'c>,
) -> Result<(), VerifierErrorKind> {
    let typ = pop(stack)?;
    if VType::is_assignable(&typ, &expected_type) {
        Ok(())
    } else {
        Err(mismatch(expected_type, typ))
    }
}
