//! The model description the translator works from.
//!
//! Building a model from its input language, and computing tensor
//! components, belong to other layers; this module only fixes the shape of
//! what they hand over.

use std::rc::Rc;

use crate::expr::Expr;
use crate::index::{IndexClass, IndexRanges};
use crate::util::IndexMap;

/// Computes the component of a tensor for concrete index values.
pub type ComponentFn = Rc<dyn Fn(&[usize]) -> Option<Expr>>;

#[derive(Clone)]
pub struct Tensor {
    pub indices: Vec<IndexClass>,
    components: ComponentFn,
}

impl Tensor {
    pub fn new(
        indices: impl IntoIterator<Item = IndexClass>,
        components: impl Fn(&[usize]) -> Option<Expr> + 'static,
    ) -> Self {
        Self {
            indices: indices.into_iter().collect(),
            components: Rc::new(components),
        }
    }

    /// A tensor without indices.
    pub fn scalar(component: impl Fn() -> Option<Expr> + 'static) -> Self {
        Self::new(Vec::new(), move |_| component())
    }

    pub fn component(&self, values: &[usize]) -> Option<Expr> {
        (self.components)(values)
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub name: String,
    pub fields: Vec<String>,
    pub parameters: Vec<String>,
    pub tensors: IndexMap<String, Tensor>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(name.into());
        self
    }

    /// Registers a tensor. Its macros are named after `name`.
    pub fn with_tensor(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.tensors.insert(name.into(), tensor);
        self
    }

    pub fn ranges(&self) -> IndexRanges {
        IndexRanges {
            fields: self.fields.len(),
            parameters: self.parameters.len(),
        }
    }

    /// The symbol standing for phase-space coordinate `i`: fields first,
    /// then their momenta.
    pub fn coordinate(&self, i: usize) -> Option<Expr> {
        let n = self.fields.len();
        if i < n {
            Some(Expr::var(self.fields[i].as_str()))
        } else if i < 2 * n {
            Some(Expr::var(format!("__d{}", self.fields[i - n]).as_str()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_cover_phase_space() {
        let model = Model::new("m").with_field("phi").with_field("chi");
        assert_eq!(model.coordinate(1), Some(Expr::var("chi")));
        assert_eq!(model.coordinate(2), Some(Expr::var("__dphi")));
        assert_eq!(model.coordinate(4), None);
        assert_eq!(model.ranges().range(IndexClass::Full), 4);
    }

    #[test]
    fn components_come_from_the_closure() {
        let tensor = Tensor::new([IndexClass::FieldOnly], |v| Some(Expr::int(v[0] as i64)));
        assert_eq!(tensor.component(&[3]), Some(Expr::int(3)));
    }
}
