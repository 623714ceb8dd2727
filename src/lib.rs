//! # tensorgen
//! tensorgen expands code templates for symbolic tensor computations into
//! source text for a target language.
//!
//! Templates are plain text with macro directives such as `$MODEL`,
//! `$U2[AB]` or `$TEMP_POOL{"const auto $1 = $2;"}`. While the directives are
//! expanded, every expression they produce is passed through a
//! common-subexpression cache ([`Cse`]): repeated subexpressions become named
//! temporaries, and those temporaries are declared at a point the template
//! chooses with `$TEMP_POOL`, which may lie earlier in the output than the
//! place they were discovered. Whole parametrized computations can be cached
//! as lambdas ([`LambdaCache`]) and declared once.
//!
//! The entry point is [`Translator`]:
//!
//! ```
//! use tensorgen::{MemoryTemplates, Model, ProcessKind, Translator, TranslatorConfig};
//!
//! let templates = MemoryTemplates::new().with("hello.tpl", "cpp 0.1\n// $MODEL\n");
//! let mut translator =
//!     Translator::new(TranslatorConfig::default(), Model::new("quartic"), templates).unwrap();
//! let out = translator.translate_to_string("hello.tpl", ProcessKind::Core).unwrap();
//! assert_eq!(out, "// quartic\n");
//! ```
pub mod buffer;
pub mod cli;
pub mod cse;
pub mod diagnostics;
pub mod expr;
pub mod index;
pub mod lambda;
pub mod macros;
pub mod model;
pub mod printer;
pub mod scan;
pub mod stack;
pub mod template;
mod translator;
pub mod util;

use std::path::PathBuf;

use thiserror::Error;

pub use buffer::{Buffer, ClosureHandler, Decoration, HandlerId, TextFilter};
#[cfg(feature = "bin")]
pub use cli::bin::*;
pub use cse::{Cse, DeclarationTemplate, SymbolRecord};
pub use diagnostics::Diagnostics;
pub use expr::{Expr, Literal, Op, Symbol};
pub use index::{IndexClass, IndexRanges, IndexRef};
pub use lambda::{IndexTag, Lambda, LambdaCache};
pub use macros::{
    IndexFn, IndexRule, MacroPackage, MacroRegistry, Rule, SimpleFn, SimpleRule, Unroll,
};
pub use model::{Model, Tensor};
pub use printer::{printer_for_backend, CppPrinter, LanguagePrinter, PythonPrinter};
pub use stack::{FrameId, OutputStack, ProcessKind};
pub use template::{MemoryTemplates, TemplateDirs, TemplateSource, Version};
pub use translator::{NestedOptions, TranslationReport, Translator, TranslatorConfig};

#[derive(Debug, Error)]
pub enum Error {
    #[error("macro {rule}: wrong number of arguments (expected {expected}, received {received})")]
    ArgumentCountMismatch {
        rule: String,
        expected: usize,
        received: usize,
    },
    #[error("macro {rule}: wrong number of indices (expected {expected}, received {received})")]
    IndexCountMismatch {
        rule: String,
        expected: usize,
        received: usize,
    },
    #[error("macro {rule}: index '{label}' is {received}, but the rule expects a {expected} index")]
    IndexClassMismatch {
        rule: String,
        label: char,
        expected: IndexClass,
        received: IndexClass,
    },
    #[error("macro {rule}: index '{label}' has no concrete value on this line")]
    UnresolvedIndex { rule: String, label: char },
    #[error("no {0} is active")]
    MissingInsertionContext(&'static str),
    #[error("declaration template {template:?} is missing {placeholder}")]
    MalformedDeclarationTemplate {
        template: String,
        placeholder: &'static str,
    },
    #[error("template {template} needs {backend} backend version {required}, but version {available} is running")]
    VersionIncompatibility {
        template: String,
        backend: String,
        required: Version,
        available: Version,
    },
    #[error("template {template} targets backend {found}, but the translator is configured for {expected}")]
    BackendMismatch {
        template: String,
        found: String,
        expected: String,
    },
    #[error("unknown backend {0}")]
    UnknownBackend(String),
    #[error("template {template} has a malformed header {line:?}; expected `backend-name minimum-version`")]
    MalformedHeader { template: String, line: String },
    #[error("template {0} not found")]
    TemplateNotFound(String),
    #[error("unknown macro ${0}")]
    UnknownMacro(String),
    #[error("{0}")]
    MacroSyntax(String),
    #[error("tensor {tensor} has no component at {indices:?}")]
    MissingComponent { tensor: String, indices: Vec<usize> },
    #[error("write to a closed buffer")]
    BufferClosed,
    #[error("write to a buffer without a tag")]
    NoTag,
    #[error("IO error: {0}: {1}")]
    IoError(PathBuf, std::io::Error),
    #[error("{template}:{line}: {source}")]
    InTemplate {
        template: String,
        line: usize,
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn in_template(self, template: &str, line: usize) -> Error {
        Error::InTemplate {
            template: template.to_string(),
            line,
            source: Box::new(self),
        }
    }

    /// The underlying error, without the template locations wrapped around
    /// it.
    pub fn root(&self) -> &Error {
        match self {
            Error::InTemplate { source, .. } => source.root(),
            err => err,
        }
    }
}
