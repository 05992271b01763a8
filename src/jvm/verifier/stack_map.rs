use super::*;
use crate::jvm::class_file::StackMapFrame;
use crate::jvm::{Error, FrameComponent};
use crate::util::Offset;
use log::trace;
use std::collections::BTreeMap;

/// Accumulates the frames at jump targets and compresses them into `StackMapTable` entries
///
/// Each entry is encoded relative to the frame before it, starting from the implicit frame
/// derived from the method descriptor.
pub struct StackMapBuilder {
    initial: SerializableFrame,
    frames: BTreeMap<Offset, SerializableFrame>,
}

impl StackMapBuilder {
    pub fn new(initial: SerializableFrame) -> StackMapBuilder {
        StackMapBuilder {
            initial,
            frames: BTreeMap::new(),
        }
    }

    /// Record the frame at a jump target
    ///
    /// Recording the same frame twice at one offset is fine (eg. a label followed immediately by
    /// another label), but two different frames at one offset is an error.
    pub fn add(&mut self, offset: Offset, frame: SerializableFrame) -> Result<(), Error> {
        if let Some(existing) = self.frames.get(&offset) {
            if *existing == frame {
                return Ok(());
            }
            let (component, first, second) = if existing.locals != frame.locals {
                (
                    FrameComponent::Locals,
                    format!("{:?}", existing.locals),
                    format!("{:?}", frame.locals),
                )
            } else {
                (
                    FrameComponent::Stack,
                    format!("{:?}", existing.stack),
                    format!("{:?}", frame.stack),
                )
            };
            return Err(Error::ConflictingFrames {
                offset,
                component,
                first,
                second,
            });
        }
        self.frames.insert(offset, frame);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Encode the frames, in ascending offset order
    pub fn encode(self) -> Result<Vec<StackMapFrame>, Error> {
        let mut previous_frame = &self.initial;
        let mut previous_offset: Option<Offset> = None;
        let mut encoded = Vec::with_capacity(self.frames.len());

        for (offset, frame) in &self.frames {
            let delta = match previous_offset {
                None => offset.0,
                Some(previous) => offset.0 - previous.0 - 1,
            };
            let offset_delta = Error::check_count("Stack map offset", delta)?;
            let entry = frame.stack_map_frame(offset_delta, previous_frame);
            trace!("frame at {}: {:?}", offset.0, entry);
            encoded.push(entry);

            previous_frame = frame;
            previous_offset = Some(*offset);
        }

        Ok(encoded)
    }
}

impl SerializableFrame {
    /// Compute the most compact stack map frame encoding relative to a previous frame
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Self) -> StackMapFrame {
        let locals_difference = locals_difference(&previous_frame.locals, &self.locals);

        match (locals_difference, self.stack.len()) {
            (Some(0), 0) => StackMapFrame::SameLocalsNoStack { offset_delta },
            (Some(0), 1) => StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack: self.stack.values().copied().next().unwrap_or(VerificationType::Top),
            },
            (Some(difference @ -3..=-1), 0) => StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k: (-difference) as u8,
            },
            (Some(1..=3), 0) => {
                let previous_len = previous_frame.locals.len();
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals: self.locals.values().skip(previous_len).copied().collect(),
                }
            }
            _ => self.full_stack_map_frame(offset_delta),
        }
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.values().copied().collect(),
            locals: self.locals.values().copied().collect(),
        }
    }
}

/// Number of locals added (positive) or removed (negative) going from `from` to `to`
///
/// Only defined when one list of locals is a prefix of the other.
fn locals_difference(
    from: &crate::util::OffsetVec<SerializableType>,
    to: &crate::util::OffsetVec<SerializableType>,
) -> Option<isize> {
    let is_prefix = from.values().zip(to.values()).all(|(t1, t2)| t1 == t2);
    if is_prefix {
        Some(to.len() as isize - from.len() as isize)
    } else {
        None
    }
}
