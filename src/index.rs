//! Tensor index classes, index references as they appear in macro
//! invocations, and enumeration of concrete index assignments.

use std::fmt::Display;

use smallvec::SmallVec;

/// The range an index runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexClass {
    /// Full phase space: fields and their momenta.
    Full,
    FieldOnly,
    Parameter,
}

impl IndexClass {
    /// Classifies an index label. Uppercase letters range over phase space,
    /// `a`..=`k` over fields and `l`..=`z` over parameters.
    pub fn classify(label: char) -> Option<Self> {
        match label {
            'A'..='Z' => Some(IndexClass::Full),
            'a'..='k' => Some(IndexClass::FieldOnly),
            'l'..='z' => Some(IndexClass::Parameter),
            _ => None,
        }
    }

    /// Whether a rule slot declared with class `self` can be filled by an
    /// index of class `supplied`.
    pub fn accepts(self, supplied: IndexClass) -> bool {
        match self {
            IndexClass::Full => matches!(supplied, IndexClass::Full | IndexClass::FieldOnly),
            IndexClass::FieldOnly => supplied == IndexClass::FieldOnly,
            IndexClass::Parameter => supplied == IndexClass::Parameter,
        }
    }
}

impl Display for IndexClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IndexClass::Full => "full",
            IndexClass::FieldOnly => "field-only",
            IndexClass::Parameter => "parameter",
        })
    }
}

/// An index as supplied to an index rule. `value` is `None` when the line is
/// not unrolled and the index stays abstract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRef {
    pub label: char,
    pub class: IndexClass,
    pub value: Option<usize>,
}

impl IndexRef {
    pub fn new(label: char, class: IndexClass) -> Self {
        Self {
            label,
            class,
            value: None,
        }
    }

    /// An index whose class is inferred from its label.
    pub fn from_label(label: char) -> Option<Self> {
        IndexClass::classify(label).map(|class| Self::new(label, class))
    }

    pub fn with_value(self, value: usize) -> Self {
        Self {
            value: Some(value),
            ..self
        }
    }
}

pub type IndexList = SmallVec<[IndexRef; 4]>;

/// Sizes of the index ranges of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexRanges {
    pub fields: usize,
    pub parameters: usize,
}

impl IndexRanges {
    pub fn range(&self, class: IndexClass) -> usize {
        match class {
            IndexClass::Full => 2 * self.fields,
            IndexClass::FieldOnly => self.fields,
            IndexClass::Parameter => self.parameters,
        }
    }

    /// Every assignment of concrete values to `indices`, last index varying
    /// fastest.
    pub fn assignments(&self, indices: &[IndexRef]) -> Assignments {
        let limits: SmallVec<[usize; 4]> = indices.iter().map(|i| self.range(i.class)).collect();
        let done = limits.iter().any(|&l| l == 0);
        Assignments {
            indices: indices.iter().copied().collect(),
            current: SmallVec::from_elem(0, indices.len()),
            limits,
            done,
        }
    }
}

pub struct Assignments {
    indices: IndexList,
    current: SmallVec<[usize; 4]>,
    limits: SmallVec<[usize; 4]>,
    done: bool,
}

impl Iterator for Assignments {
    type Item = IndexList;

    fn next(&mut self) -> Option<IndexList> {
        if self.done {
            return None;
        }
        let item = self
            .indices
            .iter()
            .zip(&self.current)
            .map(|(index, &value)| index.with_value(value))
            .collect();

        // odometer step
        self.done = true;
        for pos in (0..self.current.len()).rev() {
            self.current[pos] += 1;
            if self.current[pos] < self.limits[pos] {
                self.done = false;
                break;
            }
            self.current[pos] = 0;
        }
        Some(item)
    }
}
