//! Macro rules and the registry a translation frame dispatches through.
//!
//! There are two shapes of rule. A [`SimpleRule`] takes a fixed number of
//! string arguments. An [`IndexRule`] additionally takes a fixed list of
//! tensor indices, each of which must be compatible with the class the rule
//! declares for that slot. Every invocation is validated before the rule
//! runs, so a mismatched call has no side effects.

pub mod embed;
pub mod fundamental;
pub mod lambda;
pub mod temp_pool;
pub mod tensor;

use std::rc::Rc;

use crate::index::{IndexClass, IndexRef};
use crate::scan::MacroCall;
use crate::stack::{FrameId, ProcessKind};
use crate::translator::Translator;
use crate::util::IndexMap;
use crate::Error;

pub trait SimpleRule {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    fn evaluate(&self, args: &[String], translator: &mut Translator) -> Result<String, Error>;
}

/// Whether a line using an index rule may be replicated over concrete index
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unroll {
    Allow,
    Prevent,
}

pub trait IndexRule {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    /// The class each index slot accepts.
    fn indices(&self) -> &[IndexClass];

    fn unroll(&self) -> Unroll {
        Unroll::Allow
    }

    fn evaluate(
        &self,
        args: &[String],
        indices: &[IndexRef],
        translator: &mut Translator,
    ) -> Result<String, Error>;
}

#[derive(Clone)]
pub enum Rule {
    Simple(Rc<dyn SimpleRule>),
    Index(Rc<dyn IndexRule>),
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Simple(rule) => rule.name(),
            Rule::Index(rule) => rule.name(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MacroRegistry {
    rules: IndexMap<String, Rule>,
}

impl MacroRegistry {
    fn add(&mut self, rule: Rule) {
        let name = rule.name().to_string();
        if self.rules.insert(name.clone(), rule).is_some() {
            log::debug!("macro {name} replaced");
        }
    }

    pub fn add_simple(&mut self, rule: Rc<dyn SimpleRule>) {
        self.add(Rule::Simple(rule));
    }

    pub fn add_index(&mut self, rule: Rc<dyn IndexRule>) {
        self.add(Rule::Index(rule));
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks that `call` names a known rule and matches its argument count
    /// and index signature.
    pub fn validate(&self, call: &MacroCall) -> Result<&Rule, Error> {
        let rule = self
            .rules
            .get(&call.name)
            .ok_or_else(|| Error::UnknownMacro(call.name.clone()))?;
        let (arity, classes) = match rule {
            Rule::Simple(rule) => (rule.arity(), &[][..]),
            Rule::Index(rule) => (rule.arity(), rule.indices()),
        };
        if call.args.len() != arity {
            return Err(Error::ArgumentCountMismatch {
                rule: call.name.clone(),
                expected: arity,
                received: call.args.len(),
            });
        }
        if call.indices.len() != classes.len() {
            return Err(Error::IndexCountMismatch {
                rule: call.name.clone(),
                expected: classes.len(),
                received: call.indices.len(),
            });
        }
        for (slot, index) in classes.iter().zip(&call.indices) {
            if !slot.accepts(index.class) {
                return Err(Error::IndexClassMismatch {
                    rule: call.name.clone(),
                    label: index.label,
                    expected: *slot,
                    received: index.class,
                });
            }
        }
        Ok(rule)
    }

    /// Validates `call` and then runs it. `indices` are the call's indices
    /// with whatever concrete values the current line assigns them.
    pub fn invoke(
        &self,
        call: &MacroCall,
        indices: &[IndexRef],
        translator: &mut Translator,
    ) -> Result<String, Error> {
        match self.validate(call)? {
            Rule::Simple(rule) => rule.evaluate(&call.args, translator),
            Rule::Index(rule) => rule.evaluate(&call.args, indices, translator),
        }
    }
}

/// A group of rules installed into the registry of every new frame.
pub trait MacroPackage {
    fn name(&self) -> &str;

    fn install(
        &self,
        registry: &mut MacroRegistry,
        translator: &mut Translator,
        frame: FrameId,
        kind: ProcessKind,
    ) -> Result<(), Error>;
}

type SimpleBody = dyn Fn(&[String], &mut Translator) -> Result<String, Error>;

/// A simple rule backed by a closure.
pub struct SimpleFn {
    name: String,
    arity: usize,
    body: Box<SimpleBody>,
}

impl SimpleFn {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        body: impl Fn(&[String], &mut Translator) -> Result<String, Error> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            arity,
            body: Box::new(body),
        })
    }
}

impl SimpleRule for SimpleFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn evaluate(&self, args: &[String], translator: &mut Translator) -> Result<String, Error> {
        (self.body)(args, translator)
    }
}

type IndexBody = dyn Fn(&[String], &[IndexRef], &mut Translator) -> Result<String, Error>;

/// An index rule backed by a closure.
pub struct IndexFn {
    name: String,
    arity: usize,
    indices: Vec<IndexClass>,
    unroll: Unroll,
    body: Box<IndexBody>,
}

impl IndexFn {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        indices: impl IntoIterator<Item = IndexClass>,
        body: impl Fn(&[String], &[IndexRef], &mut Translator) -> Result<String, Error> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            arity,
            indices: indices.into_iter().collect(),
            unroll: Unroll::Allow,
            body: Box::new(body),
        })
    }

    pub fn with_unroll(self: Rc<Self>, unroll: Unroll) -> Rc<Self> {
        match Rc::try_unwrap(self) {
            Ok(mut rule) => {
                rule.unroll = unroll;
                Rc::new(rule)
            }
            Err(shared) => shared,
        }
    }
}

impl IndexRule for IndexFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn indices(&self) -> &[IndexClass] {
        &self.indices
    }

    fn unroll(&self) -> Unroll {
        self.unroll
    }

    fn evaluate(
        &self,
        args: &[String],
        indices: &[IndexRef],
        translator: &mut Translator,
    ) -> Result<String, Error> {
        (self.body)(args, indices, translator)
    }
}

/// The concrete values of `indices`, or an error naming the first index that
/// has none.
pub(crate) fn concrete_values(rule: &str, indices: &[IndexRef]) -> Result<Vec<usize>, Error> {
    indices
        .iter()
        .map(|index| {
            index.value.ok_or_else(|| Error::UnresolvedIndex {
                rule: rule.to_string(),
                label: index.label,
            })
        })
        .collect()
}
