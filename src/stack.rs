use std::fmt::Display;
use std::rc::Rc;

use crate::buffer::Buffer;
use crate::macros::MacroRegistry;
use crate::Error;

/// Distinguishes the kinds of translation pass. Nested translations inherit
/// the kind of the pass that started them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessKind {
    #[default]
    Core,
    Implementation,
}

impl Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProcessKind::Core => "core",
            ProcessKind::Implementation => "implementation",
        })
    }
}

impl std::str::FromStr for ProcessKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core" => Ok(ProcessKind::Core),
            "implementation" => Ok(ProcessKind::Implementation),
            _ => Err(format!("unknown process kind {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

pub struct Frame {
    pub id: FrameId,
    pub buffer: Buffer,
    pub registry: Option<Rc<MacroRegistry>>,
    pub kind: ProcessKind,
    /// Name of the template being expanded into this frame.
    pub template: String,
}

/// The stack of active translation contexts. Only the top frame is visible
/// to rules.
#[derive(Default)]
pub struct OutputStack {
    frames: Vec<Frame>,
    next_id: usize,
}

impl OutputStack {
    /// Pushes a frame without a registry; it is installed separately once the
    /// frame exists, since building one may need the frame's buffer.
    pub fn push(&mut self, buffer: Buffer, kind: ProcessKind, template: &str) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        log::debug!(
            "entering {kind} frame {} for {template} (depth {})",
            id.0,
            self.frames.len() + 1
        );
        self.frames.push(Frame {
            id,
            buffer,
            registry: None,
            kind,
            template: template.to_string(),
        });
        id
    }

    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop();
        if let Some(frame) = &frame {
            log::debug!("leaving frame {} for {}", frame.id.0, frame.template);
        }
        frame
    }

    pub fn top(&self) -> Result<&Frame, Error> {
        self.frames
            .last()
            .ok_or(Error::MissingInsertionContext("output buffer"))
    }

    pub fn top_mut(&mut self) -> Result<&mut Frame, Error> {
        self.frames
            .last_mut()
            .ok_or(Error::MissingInsertionContext("output buffer"))
    }

    pub fn buffer(&self) -> Result<&Buffer, Error> {
        self.top().map(|f| &f.buffer)
    }

    pub fn buffer_mut(&mut self) -> Result<&mut Buffer, Error> {
        self.top_mut().map(|f| &mut f.buffer)
    }

    pub fn registry(&self) -> Result<Rc<MacroRegistry>, Error> {
        self.top()?
            .registry
            .clone()
            .ok_or(Error::MissingInsertionContext("macro registry"))
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().rev().find(|f| f.id == id)
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.iter_mut().rev().find(|f| f.id == id)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_has_no_context() {
        let stack = OutputStack::default();
        assert!(matches!(
            stack.buffer(),
            Err(Error::MissingInsertionContext("output buffer"))
        ));
    }

    #[test]
    fn registry_must_be_installed() {
        let mut stack = OutputStack::default();
        let id = stack.push(Buffer::new(), ProcessKind::Core, "t");
        assert!(matches!(
            stack.registry(),
            Err(Error::MissingInsertionContext("macro registry"))
        ));
        stack.frame_mut(id).unwrap().registry = Some(Rc::new(MacroRegistry::default()));
        assert!(stack.registry().is_ok());
    }

    #[test]
    fn frames_are_found_by_id() {
        let mut stack = OutputStack::default();
        let outer = stack.push(Buffer::new(), ProcessKind::Implementation, "outer");
        let inner = stack.push(Buffer::new(), ProcessKind::Implementation, "inner");
        assert_ne!(outer, inner);
        assert_eq!(stack.frame(outer).unwrap().template, "outer");
        assert_eq!(stack.top().unwrap().id, inner);
        stack.pop();
        assert!(stack.frame(inner).is_none());
        assert_eq!(stack.depth(), 1);
    }
}
