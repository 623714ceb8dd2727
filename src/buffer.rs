//! Output buffers: a growable list of lines with an optional insertion tag.
//!
//! Lines are decorated when they are written, so a buffer's contents are
//! always in their final rendered form. The tag is an index into the same
//! list of lines; writes to the tag are spliced in before whatever was written
//! to the end after the tag was set.

use std::rc::Rc;

use crate::translator::Translator;
use crate::Error;

/// A prefix and suffix applied to every written line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decoration {
    pub prefix: String,
    pub suffix: String,
}

pub type TextFilter = Rc<dyn Fn(&str) -> String>;

#[derive(Clone, Default)]
struct DecorationState {
    stack: Vec<Decoration>,
    skip_blank: bool,
    filter: Option<TextFilter>,
}

/// Something to run exactly once when a buffer is finalized.
pub trait ClosureHandler {
    fn on_close(&self, translator: &mut Translator) -> Result<(), Error>;

    /// Called when a nested translation is about to start on top of the
    /// buffer this handler is registered with.
    fn on_suspend(&self, _translator: &mut Translator) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

#[derive(Default)]
pub struct Buffer {
    lines: Vec<String>,
    decoration: DecorationState,
    tag: Option<usize>,
    handlers: Vec<(HandlerId, Rc<dyn ClosureHandler>)>,
    next_handler: usize,
    closed: bool,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new, empty buffer carrying `parent`'s current decoration.
    pub fn inheriting(parent: &Buffer) -> Self {
        let mut buffer = Self::new();
        buffer.inherit_decoration(parent);
        buffer
    }

    pub fn inherit_decoration(&mut self, other: &Buffer) {
        self.decoration = other.decoration.clone();
    }

    pub fn push_decoration(&mut self, prefix: impl Into<String>, suffix: impl Into<String>) {
        self.decoration.stack.push(Decoration {
            prefix: prefix.into(),
            suffix: suffix.into(),
        });
    }

    pub fn pop_decoration(&mut self) -> Option<Decoration> {
        self.decoration.stack.pop()
    }

    pub fn set_skip_blank(&mut self, skip: bool) {
        self.decoration.skip_blank = skip;
    }

    pub fn skip_blank(&self) -> bool {
        self.decoration.skip_blank
    }

    /// Installs a filter applied to each line before decoration.
    pub fn set_filter(&mut self, filter: Option<TextFilter>) {
        self.decoration.filter = filter;
    }

    fn decorate(&self, line: &str) -> Option<String> {
        if self.decoration.skip_blank && line.trim().is_empty() {
            return None;
        }
        let filtered = match &self.decoration.filter {
            Some(filter) => filter(line),
            None => line.to_string(),
        };
        let mut out = String::new();
        for decoration in &self.decoration.stack {
            out.push_str(&decoration.prefix);
        }
        out.push_str(&filtered);
        for decoration in self.decoration.stack.iter().rev() {
            out.push_str(&decoration.suffix);
        }
        Some(out)
    }

    fn decorated_lines(&self, text: &str) -> Vec<String> {
        let text = text.strip_suffix('\n').unwrap_or(text);
        text.split('\n').filter_map(|l| self.decorate(l)).collect()
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.closed {
            Err(Error::BufferClosed)
        } else {
            Ok(())
        }
    }

    pub fn write_to_end(&mut self, text: &str) -> Result<(), Error> {
        self.check_open()?;
        let lines = self.decorated_lines(text);
        self.lines.extend(lines);
        Ok(())
    }

    /// Inserts `text` at the tag. Successive calls accumulate in call order,
    /// all of them ahead of anything written to the end since the tag was set.
    pub fn write_to_tag(&mut self, text: &str) -> Result<(), Error> {
        self.check_open()?;
        let tag = self.tag.ok_or(Error::NoTag)?;
        let lines = self.decorated_lines(text);
        let count = lines.len();
        self.lines.splice(tag..tag, lines);
        self.tag = Some(tag + count);
        Ok(())
    }

    pub fn set_tag_to_end(&mut self) {
        self.tag = Some(self.lines.len());
    }

    pub fn set_tag_to_start(&mut self) {
        self.tag = Some(0);
    }

    pub fn tag(&self) -> Option<usize> {
        self.tag
    }

    pub fn register_closure_handler(&mut self, handler: Rc<dyn ClosureHandler>) -> HandlerId {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers.push((id, handler));
        id
    }

    /// Removing a handler that already ran or was already removed does
    /// nothing.
    pub fn deregister_closure_handler(&mut self, id: HandlerId) {
        self.handlers.retain(|(h, _)| *h != id);
    }

    pub fn has_closure_handlers(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub(crate) fn closure_handlers(&self) -> Vec<Rc<dyn ClosureHandler>> {
        self.handlers.iter().map(|(_, h)| h.clone()).collect()
    }

    pub(crate) fn take_closure_handlers(&mut self) -> Vec<Rc<dyn ClosureHandler>> {
        std::mem::take(&mut self.handlers)
            .into_iter()
            .map(|(_, h)| h)
            .collect()
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Appends `child`'s lines, as already rendered by the child, and hands
    /// back `replacements` untouched.
    pub fn merge(&mut self, child: Buffer, replacements: usize) -> Result<usize, Error> {
        self.check_open()?;
        if child.has_closure_handlers() {
            log::warn!("merging a buffer whose closure handlers never ran");
        }
        self.lines.extend(child.lines);
        Ok(replacements)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_writes_accumulate_before_later_content() {
        let mut buffer = Buffer::new();
        buffer.write_to_end("header").unwrap();
        buffer.set_tag_to_end();
        buffer.write_to_end("body 1").unwrap();
        buffer.write_to_tag("decl 1").unwrap();
        buffer.write_to_end("body 2").unwrap();
        buffer.write_to_tag("decl 2\ndecl 3").unwrap();
        assert_eq!(
            buffer.lines(),
            ["header", "decl 1", "decl 2", "decl 3", "body 1", "body 2"]
        );
    }

    #[test]
    fn tag_is_required() {
        let mut buffer = Buffer::new();
        assert!(matches!(buffer.write_to_tag("x"), Err(Error::NoTag)));
    }

    #[test]
    fn moving_the_tag() {
        let mut buffer = Buffer::new();
        buffer.set_tag_to_end();
        buffer.write_to_end("a").unwrap();
        buffer.set_tag_to_end();
        buffer.write_to_end("b").unwrap();
        buffer.write_to_tag("tagged").unwrap();
        assert_eq!(buffer.lines(), ["a", "tagged", "b"]);
    }

    #[test]
    fn decoration_nests_and_pops() {
        let mut buffer = Buffer::new();
        buffer.push_decoration("  ", "");
        buffer.push_decoration("\"", "\\n\"");
        buffer.write_to_end("x").unwrap();
        assert_eq!(buffer.pop_decoration().unwrap().prefix, "\"");
        buffer.write_to_end("y").unwrap();
        assert_eq!(buffer.lines(), ["  \"x\\n\"", "  y"]);
    }

    #[test]
    fn blank_lines_and_filter() {
        let mut buffer = Buffer::new();
        buffer.set_skip_blank(true);
        buffer.set_filter(Some(Rc::new(|l: &str| l.to_uppercase())));
        buffer.write_to_end("a\n   \nb\n").unwrap();
        assert_eq!(buffer.lines(), ["A", "B"]);
    }

    #[test]
    fn closed_buffers_reject_writes() {
        let mut buffer = Buffer::new();
        buffer.set_tag_to_end();
        buffer.close();
        assert!(matches!(buffer.write_to_end("x"), Err(Error::BufferClosed)));
        assert!(matches!(buffer.write_to_tag("x"), Err(Error::BufferClosed)));
    }

    #[test]
    fn merge_appends_rendered_child() {
        let mut parent = Buffer::new();
        parent.push_decoration("> ", "");
        parent.write_to_end("one").unwrap();

        let mut child = Buffer::inheriting(&parent);
        child.push_decoration("[", "]");
        child.write_to_end("two\nthree").unwrap();
        let expected = format!("{}{}", parent.render(), child.render());

        assert_eq!(parent.merge(child, 7).unwrap(), 7);
        assert_eq!(parent.render(), expected);
        assert_eq!(parent.render(), "> one\n> [two]\n> [three]\n");
    }

    struct Nothing;

    impl ClosureHandler for Nothing {
        fn on_close(&self, _translator: &mut Translator) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn deregistration_is_idempotent() {
        let mut buffer = Buffer::new();
        let first = buffer.register_closure_handler(Rc::new(Nothing));
        let second = buffer.register_closure_handler(Rc::new(Nothing));
        assert_ne!(first, second);
        buffer.deregister_closure_handler(first);
        buffer.deregister_closure_handler(first);
        assert_eq!(buffer.take_closure_handlers().len(), 1);
        buffer.deregister_closure_handler(second);
        assert!(!buffer.has_closure_handlers());
    }
}
