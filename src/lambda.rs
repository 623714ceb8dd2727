//! Caching of whole parametrized computations.
//!
//! A [`Lambda`] is identified by the kind of item it computes and by the
//! ordered list of index tags it is parametrized over. Its printed body plays
//! no part in identity: the first lambda of a given identity is declared and
//! every later one reuses its name.

use std::fmt::Display;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::expr::Symbol;
use crate::index::{IndexClass, IndexRef};
use crate::printer::{LambdaCase, LanguagePrinter};
use crate::util::{Generation, NameGen};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexTag {
    pub label: char,
    pub class: IndexClass,
}

impl From<&IndexRef> for IndexTag {
    fn from(index: &IndexRef) -> Self {
        Self {
            label: index.label,
            class: index.class,
        }
    }
}

impl Display for IndexTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

pub type IndexTags = SmallVec<[IndexTag; 4]>;

/// Produces the printed value of an atomic lambda.
pub type AtomicPayload = Box<dyn Fn(&dyn LanguagePrinter) -> String>;
/// Produces one printed case per concrete index combination.
pub type MapPayload = Box<dyn Fn(&dyn LanguagePrinter) -> Vec<LambdaCase>>;

pub enum Lambda {
    /// A single computed value.
    Atomic {
        kind: Symbol,
        index_tags: IndexTags,
        payload: AtomicPayload,
    },
    /// A family of values, one per combination of index values.
    Map {
        kind: Symbol,
        index_tags: IndexTags,
        payload: MapPayload,
    },
}

impl Lambda {
    pub fn atomic(
        kind: impl Into<Symbol>,
        index_tags: impl IntoIterator<Item = IndexTag>,
        payload: impl Fn(&dyn LanguagePrinter) -> String + 'static,
    ) -> Self {
        Lambda::Atomic {
            kind: kind.into(),
            index_tags: index_tags.into_iter().collect(),
            payload: Box::new(payload),
        }
    }

    pub fn map(
        kind: impl Into<Symbol>,
        index_tags: impl IntoIterator<Item = IndexTag>,
        payload: impl Fn(&dyn LanguagePrinter) -> Vec<LambdaCase> + 'static,
    ) -> Self {
        Lambda::Map {
            kind: kind.into(),
            index_tags: index_tags.into_iter().collect(),
            payload: Box::new(payload),
        }
    }

    pub fn kind(&self) -> Symbol {
        match self {
            Lambda::Atomic { kind, .. } | Lambda::Map { kind, .. } => *kind,
        }
    }

    pub fn index_tags(&self) -> &[IndexTag] {
        match self {
            Lambda::Atomic { index_tags, .. } | Lambda::Map { index_tags, .. } => index_tags,
        }
    }

    /// Identity comparison. The kind is checked first since it is cheap;
    /// tag lists are only compared when the kinds agree.
    pub fn same_identity(&self, other: &Lambda) -> bool {
        self.kind() == other.kind() && self.index_tags() == other.index_tags()
    }

    fn params(&self) -> Vec<String> {
        self.index_tags().iter().map(|t| t.to_string()).collect()
    }

    pub fn render(&self, printer: &dyn LanguagePrinter) -> String {
        let params = self.params();
        match self {
            Lambda::Atomic { payload, .. } => printer.atomic_lambda(&params, &payload(printer)),
            Lambda::Map { payload, .. } => printer.map_lambda(&params, &payload(printer)),
        }
    }
}

impl std::fmt::Debug for Lambda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Lambda::Atomic { .. } => "Atomic",
            Lambda::Map { .. } => "Map",
        };
        f.debug_struct(shape)
            .field("kind", &self.kind())
            .field("index_tags", &self.index_tags())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct LambdaRecord {
    pub name: String,
    pub lambda: Lambda,
}

impl LambdaRecord {
    pub fn make_temporary(
        &self,
        left: &str,
        mid: &str,
        right: &str,
        printer: &dyn LanguagePrinter,
    ) -> String {
        format!("{left}{}{mid}{}{right}", self.name, self.lambda.render(printer))
    }
}

pub struct LambdaCache {
    printer: Rc<dyn LanguagePrinter>,
    names: NameGen,
    atomic: Vec<LambdaRecord>,
    map: Vec<LambdaRecord>,
    hits: usize,
    misses: usize,
}

impl LambdaCache {
    pub fn new(
        printer: Rc<dyn LanguagePrinter>,
        kernel: impl Into<String>,
        generation: Generation,
    ) -> Self {
        Self {
            printer,
            names: NameGen::new(kernel, generation),
            atomic: vec![],
            map: vec![],
            hits: 0,
            misses: 0,
        }
    }

    /// Returns an invocation of the cached lambda with the same identity as
    /// `lambda`, declaring `lambda` first if there is none.
    pub fn cache(&mut self, lambda: Lambda) -> String {
        let args = lambda.params();
        let records = match lambda {
            Lambda::Atomic { .. } => &mut self.atomic,
            Lambda::Map { .. } => &mut self.map,
        };
        let name = match records.iter().find(|r| r.lambda.same_identity(&lambda)) {
            Some(record) => {
                self.hits += 1;
                record.name.clone()
            }
            None => {
                self.misses += 1;
                let name = self.names.fresh();
                log::debug!("lambda: caching {lambda:?} as {name}");
                records.push(LambdaRecord {
                    name: name.clone(),
                    lambda,
                });
                name
            }
        };
        self.printer.lambda_invocation(&name, &args)
    }

    /// One declaration per cached lambda, atomic lambdas first, each in
    /// insertion order.
    pub fn temporaries(&self, left: &str, mid: &str, right: &str) -> Vec<String> {
        self.records()
            .map(|r| r.make_temporary(left, mid, right, self.printer.as_ref()))
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &LambdaRecord> {
        self.atomic.iter().chain(self.map.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.atomic.is_empty() && self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.atomic.clear();
        self.map.clear();
        self.names.generation().advance();
        self.names.reset_count();
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::CppPrinter;

    fn tags(labels: &str) -> Vec<IndexTag> {
        labels
            .chars()
            .map(|label| IndexTag {
                label,
                class: IndexClass::classify(label).unwrap(),
            })
            .collect()
    }

    fn cache() -> LambdaCache {
        LambdaCache::new(Rc::new(CppPrinter), "lambda", Generation::default())
    }

    fn constant(kind: &str, labels: &str, value: &'static str) -> Lambda {
        Lambda::atomic(kind, tags(labels), move |_| value.to_string())
    }

    #[test]
    fn identity_ignores_payload() {
        let mut cache = cache();
        let first = cache.cache(constant("U2", "AB", "x"));
        let second = cache.cache(constant("U2", "AB", "something else"));
        assert_eq!(first, "lambda_0_0(A, B)");
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn identity_needs_kind_and_ordered_tags() {
        let mut cache = cache();
        let base = cache.cache(constant("U2", "AB", "x"));
        assert_ne!(base, cache.cache(constant("U3", "AB", "x")));
        assert_eq!(cache.cache(constant("U2", "BA", "x")), "lambda_0_2(B, A)");
        assert_ne!(base, cache.cache(constant("U2", "A", "x")));
        assert_ne!(base, cache.cache(constant("U2", "ABC", "x")));
        assert_eq!(cache.records().count(), 5);
    }

    #[test]
    fn atomic_temporaries_precede_map_temporaries() {
        let mut cache = cache();
        cache.cache(Lambda::map("M", tags("a"), |_| {
            vec![LambdaCase {
                values: vec![0],
                value: "m".into(),
            }]
        }));
        cache.cache(constant("V", "", "v"));
        let temps = cache.temporaries("auto ", " = ", ";");
        assert_eq!(
            temps,
            vec![
                "auto lambda_0_1 = [&]() -> double { return v; };".to_string(),
                "auto lambda_0_0 = [&](unsigned int a) -> double { if (a == 0) return m; return 0.0; };"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn clear_releases_payloads_and_renames() {
        let mut cache = cache();
        let held = Rc::new(());
        let captured = held.clone();
        cache.cache(Lambda::atomic("V", tags(""), move |_| {
            let _ = &captured;
            "v".to_string()
        }));
        assert_eq!(Rc::strong_count(&held), 2);
        cache.clear();
        assert_eq!(Rc::strong_count(&held), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.cache(constant("V", "", "v")), "lambda_1_0()");
    }
}
