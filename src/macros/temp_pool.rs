//! `$TEMP_POOL{template}` marks where expression temporaries are declared.
//!
//! Each frame gets its own [`TemporaryPool`], bound to the frame's buffer.
//! Setting a boundary first deposits whatever the previous boundary
//! collected, then moves the buffer's tag to the current end. Temporaries
//! still pending when the buffer is finalized are deposited at the last
//! boundary.
//!
//! Temporaries referenced before the first boundary wait for it. If a nested
//! translation starts in the meantime, the pool takes them out of the shared
//! caches and holds them itself, so the child never sees them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::buffer::{Buffer, ClosureHandler, HandlerId};
use crate::macros::{MacroPackage, MacroRegistry, SimpleRule};
use crate::stack::{FrameId, ProcessKind};
use crate::translator::Translator;
use crate::Error;

pub struct TemporaryPoolPackage;

impl MacroPackage for TemporaryPoolPackage {
    fn name(&self) -> &str {
        "temporary pool"
    }

    fn install(
        &self,
        registry: &mut MacroRegistry,
        translator: &mut Translator,
        frame: FrameId,
        _kind: ProcessKind,
    ) -> Result<(), Error> {
        let pool = TemporaryPool::bind(translator, frame)?;
        registry.add_simple(pool);
        Ok(())
    }
}

/// Temporaries taken out of the caches while no boundary was set.
#[derive(Debug, Default)]
struct Held {
    lambdas: Vec<String>,
    declarations: Vec<(String, String)>,
}

impl Held {
    fn is_empty(&self) -> bool {
        self.lambdas.is_empty() && self.declarations.is_empty()
    }
}

#[derive(Debug)]
struct PoolState {
    template: String,
    tag_is_set: bool,
    sequence: usize,
    handler: Option<HandlerId>,
    held: Held,
}

#[derive(Debug)]
pub struct TemporaryPool {
    frame: FrameId,
    state: RefCell<PoolState>,
}

impl TemporaryPool {
    /// Creates a pool for `frame` and registers it to run when the frame's
    /// buffer is finalized.
    pub fn bind(translator: &mut Translator, frame: FrameId) -> Result<Rc<Self>, Error> {
        let pool = Rc::new(Self {
            frame,
            state: RefCell::new(PoolState {
                template: translator.printer().default_declaration().to_string(),
                tag_is_set: false,
                sequence: 0,
                handler: None,
                held: Held::default(),
            }),
        });
        let id = bound_buffer(translator, frame)?.register_closure_handler(pool.clone());
        pool.state.borrow_mut().handler = Some(id);
        Ok(pool)
    }

    pub fn tag_is_set(&self) -> bool {
        self.state.borrow().tag_is_set
    }

    /// Establishes a new boundary using `template` for declarations and
    /// returns the marker written at the boundary.
    pub fn set_boundary(&self, template: &str, translator: &mut Translator) -> Result<String, Error> {
        if self.tag_is_set() {
            self.deposit(translator)?;
        }
        let sequence = {
            let mut state = self.state.borrow_mut();
            state.template = template.to_string();
            state.tag_is_set = true;
            state.sequence += 1;
            state.sequence
        };
        bound_buffer(translator, self.frame)?.set_tag_to_end();
        log::debug!("temporary pool {sequence} set in frame {:?}", self.frame);
        Ok(translator
            .printer()
            .comment(&format!("temporary pool {sequence}")))
    }

    /// Writes held and pending lambdas and expression temporaries at the tag
    /// and clears both caches. Does nothing while no boundary is set.
    pub fn deposit(&self, translator: &mut Translator) -> Result<(), Error> {
        let (template, held) = {
            let mut state = self.state.borrow_mut();
            if !state.tag_is_set {
                return Ok(());
            }
            (state.template.clone(), std::mem::take(&mut state.held))
        };

        let mut text = String::new();
        for temporary in held.lambdas.iter().chain(&pending_lambdas(translator)) {
            text.push_str(temporary);
            text.push('\n');
        }
        text.push_str(&translator.render_declarations(&template, &held.declarations));

        if !translator.lambdas().is_empty() {
            translator.lambdas_mut().clear();
        }
        translator.cse_mut().clear();
        if text.is_empty() {
            return Ok(());
        }

        let expanded = translator.expand_text(&text)?;
        let buffer = bound_buffer(translator, self.frame)?;
        for line in expanded.lines() {
            buffer.write_to_tag(line)?;
        }
        Ok(())
    }

    /// Moves temporaries pending in the caches into the pool until a
    /// boundary is set. With a boundary they are deposited instead.
    pub fn hold(&self, translator: &mut Translator) -> Result<(), Error> {
        if self.tag_is_set() {
            return self.deposit(translator);
        }
        if !pending_in_caches(translator) {
            return Ok(());
        }
        let lambdas = pending_lambdas(translator);
        let declarations = translator.cse().declarations().to_vec();
        {
            let mut state = self.state.borrow_mut();
            state.held.lambdas.extend(lambdas);
            state.held.declarations.extend(declarations);
        }
        if !translator.lambdas().is_empty() {
            translator.lambdas_mut().clear();
        }
        translator.cse_mut().clear();
        log::debug!("temporaries held for frame {:?}", self.frame);
        Ok(())
    }

    fn has_pending(&self, translator: &Translator) -> bool {
        !self.state.borrow().held.is_empty() || pending_in_caches(translator)
    }

    fn retire(&self, translator: &mut Translator) -> Result<(), Error> {
        if !self.tag_is_set() {
            let template = translator
                .stack()
                .frame(self.frame)
                .ok_or(Error::MissingInsertionContext("output buffer"))?
                .template
                .clone();
            if self.has_pending(translator) {
                translator.diagnostics_mut().warn(format!(
                    "{template}: temporaries were generated but no $TEMP_POOL was set; \
                     they are declared at the start of the output"
                ));
                bound_buffer(translator, self.frame)?.set_tag_to_start();
                self.state.borrow_mut().tag_is_set = true;
            } else {
                translator
                    .diagnostics_mut()
                    .warn(format!("{template}: no $TEMP_POOL was set"));
            }
        }
        self.deposit(translator)?;

        let handler = self.state.borrow_mut().handler.take();
        if let Some(id) = handler {
            bound_buffer(translator, self.frame)?.deregister_closure_handler(id);
        }
        Ok(())
    }
}

fn pending_in_caches(translator: &Translator) -> bool {
    translator.cse().has_declarations() || !translator.lambdas().is_empty()
}

fn pending_lambdas(translator: &Translator) -> Vec<String> {
    let printer = translator.printer();
    let (left, mid, right) = printer.lambda_fragments();
    translator.lambdas().temporaries(left, mid, right)
}

fn bound_buffer(translator: &mut Translator, frame: FrameId) -> Result<&mut Buffer, Error> {
    translator
        .stack_mut()
        .frame_mut(frame)
        .map(|f| &mut f.buffer)
        .ok_or(Error::MissingInsertionContext("output buffer"))
}

impl SimpleRule for TemporaryPool {
    fn name(&self) -> &str {
        "TEMP_POOL"
    }

    fn arity(&self) -> usize {
        1
    }

    fn evaluate(&self, args: &[String], translator: &mut Translator) -> Result<String, Error> {
        self.set_boundary(&args[0], translator)
    }
}

impl ClosureHandler for TemporaryPool {
    fn on_close(&self, translator: &mut Translator) -> Result<(), Error> {
        self.retire(translator)
    }

    fn on_suspend(&self, translator: &mut Translator) -> Result<(), Error> {
        self.hold(translator)
    }
}
