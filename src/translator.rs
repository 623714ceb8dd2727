use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::buffer::{Buffer, TextFilter};
use crate::cse::Cse;
use crate::diagnostics::Diagnostics;
use crate::index::IndexList;
use crate::lambda::LambdaCache;
use crate::macros::embed::EmbedPackage;
use crate::macros::fundamental::Fundamental;
use crate::macros::lambda::LambdaPackage;
use crate::macros::temp_pool::TemporaryPoolPackage;
use crate::macros::tensor::TensorPackage;
use crate::macros::{MacroPackage, MacroRegistry, Rule, Unroll};
use crate::model::Model;
use crate::printer::{printer_for_backend, LanguagePrinter};
use crate::scan::{scan_line, Segment};
use crate::stack::{FrameId, OutputStack, ProcessKind};
use crate::template::{Header, TemplateDirs, TemplateSource, Version};
use crate::util::Generation;
use crate::Error;

/// Settings for a [`Translator`].
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Templates must name this backend in their header.
    pub backend: String,
    /// Prefix for the names of expression temporaries.
    pub cse_kernel: String,
    /// Prefix for the names of cached lambdas.
    pub lambda_kernel: String,
    /// Directories searched for templates, in order.
    pub template_paths: Vec<PathBuf>,
    /// Drop lines that are blank after decoration.
    pub skip_blank: bool,
    /// The version templates are checked against.
    pub version: Version,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            backend: "cpp".to_string(),
            cse_kernel: "__cse".to_string(),
            lambda_kernel: "__lambda".to_string(),
            template_paths: vec![],
            skip_blank: false,
            version: Version::current(),
        }
    }
}

/// How a nested translation is merged into the buffer that started it.
#[derive(Clone, Default)]
pub struct NestedOptions {
    pub delimiters: Option<(String, String)>,
    pub filter: Option<TextFilter>,
}

impl NestedOptions {
    /// Lines are copied as the child renders them.
    pub fn verbatim() -> Self {
        Self::default()
    }

    /// Every line becomes an escaped string literal of `printer`'s language.
    pub fn string(printer: Rc<dyn LanguagePrinter>) -> Self {
        let (prefix, suffix) = printer.string_delimiters();
        Self {
            delimiters: Some((prefix.to_string(), suffix.to_string())),
            filter: Some(Rc::new(move |line: &str| printer.escape_string(line))),
        }
    }
}

/// Statistics for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationReport {
    pub replacements: usize,
    pub cse_hits: usize,
    pub cse_misses: usize,
    pub lambda_hits: usize,
    pub lambda_misses: usize,
    pub warnings: Vec<String>,
}

impl Display for TranslationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Macro replacements: {}", self.replacements)?;
        writeln!(
            f,
            "Expression cache: {} hits, {} misses",
            self.cse_hits, self.cse_misses
        )?;
        writeln!(
            f,
            "Lambda cache: {} hits, {} misses",
            self.lambda_hits, self.lambda_misses
        )?;
        if !self.warnings.is_empty() {
            writeln!(f, "{} warning(s):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  {warning}")?;
            }
        }
        Ok(())
    }
}

/// Expands templates against a model.
///
/// A translator owns the expression and lambda caches for the whole run, so
/// temporaries are shared between the top-level template and everything it
/// imports. Each template is expanded into its own frame on the output stack
/// with a freshly built macro registry.
pub struct Translator {
    config: TranslatorConfig,
    printer: Rc<dyn LanguagePrinter>,
    templates: Box<dyn TemplateSource>,
    model: Rc<Model>,
    packages: Vec<Rc<dyn MacroPackage>>,
    cse: Cse,
    lambdas: LambdaCache,
    stack: OutputStack,
    diagnostics: Diagnostics,
    replacements: usize,
}

impl Translator {
    pub fn new(
        config: TranslatorConfig,
        model: Model,
        templates: impl TemplateSource + 'static,
    ) -> Result<Self, Error> {
        let printer = printer_for_backend(&config.backend)
            .ok_or_else(|| Error::UnknownBackend(config.backend.clone()))?;
        let generation = Generation::default();
        let cse = Cse::new(printer.clone(), &config.cse_kernel, generation.clone());
        let lambdas = LambdaCache::new(printer.clone(), &config.lambda_kernel, generation);
        Ok(Self {
            config,
            printer,
            templates: Box::new(templates),
            model: Rc::new(model),
            packages: vec![
                Rc::new(Fundamental),
                Rc::new(TemporaryPoolPackage),
                Rc::new(TensorPackage),
                Rc::new(LambdaPackage),
                Rc::new(EmbedPackage),
            ],
            cse,
            lambdas,
            stack: OutputStack::default(),
            diagnostics: Diagnostics::default(),
            replacements: 0,
        })
    }

    /// A translator reading templates from the configured search paths.
    pub fn from_dirs(config: TranslatorConfig, model: Model) -> Result<Self, Error> {
        let dirs = TemplateDirs::new(config.template_paths.clone());
        Self::new(config, model, dirs)
    }

    /// Adds a package installed after the built-in ones; its rules replace
    /// built-in rules of the same name.
    pub fn with_package(mut self, package: impl MacroPackage + 'static) -> Self {
        self.packages.push(Rc::new(package));
        self
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn printer(&self) -> Rc<dyn LanguagePrinter> {
        self.printer.clone()
    }

    pub fn model(&self) -> Rc<Model> {
        self.model.clone()
    }

    pub fn cse(&self) -> &Cse {
        &self.cse
    }

    pub fn cse_mut(&mut self) -> &mut Cse {
        &mut self.cse
    }

    pub fn lambdas(&self) -> &LambdaCache {
        &self.lambdas
    }

    pub fn lambdas_mut(&mut self) -> &mut LambdaCache {
        &mut self.lambdas
    }

    pub fn stack(&self) -> &OutputStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut OutputStack {
        &mut self.stack
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Total number of macros replaced so far.
    pub fn replacements(&self) -> usize {
        self.replacements
    }

    /// Renders `held` declarations followed by the ones queued in the
    /// expression cache.
    pub fn render_declarations(&mut self, template: &str, held: &[(String, String)]) -> String {
        self.cse.declarations_after(held, template, &mut self.diagnostics)
    }

    pub fn translate_to_string(
        &mut self,
        template: &str,
        kind: ProcessKind,
    ) -> Result<String, Error> {
        let mut buffer = Buffer::new();
        buffer.set_skip_blank(self.config.skip_blank);
        let (buffer, _) = self.translate_to_buffer(template, buffer, kind)?;
        Ok(buffer.render())
    }

    /// Translates `template` into the file at `path`, returning the number of
    /// macros replaced.
    pub fn translate_to_file(
        &mut self,
        template: &str,
        path: impl AsRef<Path>,
        kind: ProcessKind,
    ) -> Result<usize, Error> {
        let path = path.as_ref();
        let mut buffer = Buffer::new();
        buffer.set_skip_blank(self.config.skip_blank);
        let (buffer, replacements) = self.translate_to_buffer(template, buffer, kind)?;
        std::fs::write(path, buffer.render())
            .map_err(|err| Error::IoError(path.to_path_buf(), err))?;
        log::info!("wrote {} ({replacements} replacements)", path.display());
        Ok(replacements)
    }

    /// Translates `template` into `buffer` on a new frame, finalizes the
    /// buffer and hands it back together with the number of macros replaced.
    pub fn translate_to_buffer(
        &mut self,
        template: &str,
        buffer: Buffer,
        kind: ProcessKind,
    ) -> Result<(Buffer, usize), Error> {
        let text = self.templates.load(template)?;
        let (header, body) = Header::split(template, &text)?;
        header.validate(template, &self.config.backend, self.config.version)?;

        let frame = self.stack.push(buffer, kind, template);
        let result = self.run_frame(frame, kind, template, body);
        let popped = self
            .stack
            .pop()
            .ok_or(Error::MissingInsertionContext("output buffer"))?;
        debug_assert_eq!(popped.id, frame);
        result.map(|count| (popped.buffer, count))
    }

    /// Translates `template` into a child of the current buffer and merges
    /// the result back. The child inherits the current decoration and process
    /// kind.
    pub fn translate_nested(
        &mut self,
        template: &str,
        options: NestedOptions,
    ) -> Result<usize, Error> {
        // the parent's pending temporaries stay with the parent
        let handlers = self.stack.buffer()?.closure_handlers();
        for handler in handlers {
            handler.on_suspend(self)?;
        }

        let kind = self.stack.top()?.kind;
        let mut child = Buffer::inheriting(self.stack.buffer()?);
        if let Some((prefix, suffix)) = options.delimiters {
            child.push_decoration(prefix, suffix);
        }
        if options.filter.is_some() {
            child.set_filter(options.filter);
        }
        let (child, count) = self.translate_to_buffer(template, child, kind)?;
        self.stack.buffer_mut()?.merge(child, count)
    }

    fn run_frame(
        &mut self,
        frame: FrameId,
        kind: ProcessKind,
        template: &str,
        body: &str,
    ) -> Result<usize, Error> {
        let registry = self.build_registry(frame, kind)?;
        self.stack
            .frame_mut(frame)
            .ok_or(Error::MissingInsertionContext("output buffer"))?
            .registry = Some(Rc::new(registry));

        let mut count = 0;
        let mut lineno = 1;
        for line in body.lines() {
            lineno += 1;
            count += self
                .process_line(line)
                .map_err(|err| err.in_template(template, lineno))?;
        }
        self.finalize_top()
            .map_err(|err| err.in_template(template, lineno))?;
        Ok(count)
    }

    fn build_registry(&mut self, frame: FrameId, kind: ProcessKind) -> Result<MacroRegistry, Error> {
        let mut registry = MacroRegistry::default();
        let packages = self.packages.clone();
        for package in packages {
            log::trace!("installing macro package {}", package.name());
            package.install(&mut registry, self, frame, kind)?;
        }
        Ok(registry)
    }

    /// Runs the closure handlers of the top buffer, then closes it.
    fn finalize_top(&mut self) -> Result<(), Error> {
        let handlers = self.stack.buffer_mut()?.take_closure_handlers();
        for handler in handlers {
            handler.on_close(self)?;
        }
        self.stack.buffer_mut()?.close();
        Ok(())
    }

    fn process_line(&mut self, line: &str) -> Result<usize, Error> {
        let (lines, count) = self.expand_line(line)?;
        let buffer = self.stack.buffer_mut()?;
        for line in lines {
            buffer.write_to_end(&line)?;
        }
        Ok(count)
    }

    /// Expands every macro in `text` with the current frame's registry,
    /// dropping lines that expand to nothing.
    pub fn expand_text(&mut self, text: &str) -> Result<String, Error> {
        let mut out = String::new();
        for line in text.lines() {
            for expanded in self.expand_line(line)?.0 {
                out.push_str(&expanded);
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Expands one template line into zero or more output lines, one per
    /// assignment of its indices when the line is unrolled.
    fn expand_line(&mut self, line: &str) -> Result<(Vec<String>, usize), Error> {
        let segments = scan_line(line)?;
        if !segments.iter().any(|s| matches!(s, Segment::Macro(_))) {
            let text = segments
                .into_iter()
                .filter_map(|s| match s {
                    Segment::Text(text) => Some(text),
                    Segment::Macro(_) => None,
                })
                .collect::<String>();
            return Ok((vec![text], 0));
        }

        let registry = self.stack.registry()?;
        let segments = detach_subscripts(segments, &registry);
        let mut labels = IndexList::new();
        let mut unroll = true;
        for segment in &segments {
            let Segment::Macro(call) = segment else {
                continue;
            };
            if let Rule::Index(rule) = registry.validate(call)? {
                if rule.unroll() == Unroll::Prevent {
                    unroll = false;
                }
                for index in &call.indices {
                    if !labels.iter().any(|l| l.label == index.label) {
                        labels.push(*index);
                    }
                }
            }
        }

        let assignments: Vec<IndexList> = if unroll && !labels.is_empty() {
            self.model.ranges().assignments(&labels).collect()
        } else {
            vec![labels]
        };

        let mut lines = vec![];
        let mut count = 0;
        for assignment in &assignments {
            let mut out = String::new();
            for segment in &segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Macro(call) => {
                        let indices: IndexList = call
                            .indices
                            .iter()
                            .map(|index| {
                                assignment
                                    .iter()
                                    .find(|a| a.label == index.label)
                                    .and_then(|a| a.value)
                                    .map_or(*index, |value| index.with_value(value))
                            })
                            .collect();
                        out.push_str(&registry.invoke(call, &indices, self)?);
                        count += 1;
                    }
                }
            }
            if !out.trim().is_empty() {
                lines.push(out);
            }
        }
        self.replacements += count;
        Ok((lines, count))
    }

    /// A snapshot of the run so far.
    pub fn report(&self) -> TranslationReport {
        TranslationReport {
            replacements: self.replacements,
            cse_hits: self.cse.hits(),
            cse_misses: self.cse.misses(),
            lambda_hits: self.lambdas.hits(),
            lambda_misses: self.lambdas.misses(),
            warnings: self.diagnostics.warnings().map(str::to_string).collect(),
        }
    }

    /// Ends the run, reporting collected warnings once.
    pub fn finish(mut self) -> TranslationReport {
        let warnings = self.diagnostics.take();
        if !warnings.is_empty() {
            log::warn!(
                "{} warning(s) during translation:\n  {}",
                warnings.len(),
                warnings.join("\n  ")
            );
        }
        let report = TranslationReport {
            warnings,
            ..self.report()
        };
        log::debug!(
            "expression cache: {} hits, {} misses; lambda cache: {} hits, {} misses",
            report.cse_hits,
            report.cse_misses,
            report.lambda_hits,
            report.lambda_misses
        );
        report
    }
}

/// A simple rule takes no indices, so brackets scanned after one belong to
/// the output, as in `$NAME[i]`.
fn detach_subscripts(segments: Vec<Segment>, registry: &MacroRegistry) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Macro(mut call)
                if !call.indices.is_empty()
                    && call.args.is_empty()
                    && matches!(registry.get(&call.name), Some(Rule::Simple(_))) =>
            {
                let labels: String = call.indices.drain(..).map(|index| index.label).collect();
                out.push(Segment::Macro(call));
                out.push(Segment::Text(format!("[{labels}]")));
            }
            segment => out.push(segment),
        }
    }
    out
}
