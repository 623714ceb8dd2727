//! `$<TENSOR>_LAMBDA[...]`: a whole tensor as one cached lambda.
//!
//! The line is never unrolled. The rule builds a lambda parametrized over the
//! supplied index labels, whose body enumerates every component, and returns
//! an invocation of the cached lambda with the labels as arguments.

use std::rc::Rc;

use crate::index::{IndexClass, IndexRanges, IndexRef};
use crate::lambda::{IndexTag, Lambda};
use crate::macros::{IndexRule, MacroPackage, MacroRegistry, Unroll};
use crate::model::Tensor;
use crate::printer::LambdaCase;
use crate::stack::{FrameId, ProcessKind};
use crate::translator::Translator;
use crate::Error;

/// Only installed for implementation passes.
pub struct LambdaPackage;

impl MacroPackage for LambdaPackage {
    fn name(&self) -> &str {
        "lambda"
    }

    fn install(
        &self,
        registry: &mut MacroRegistry,
        translator: &mut Translator,
        _frame: FrameId,
        kind: ProcessKind,
    ) -> Result<(), Error> {
        if kind != ProcessKind::Implementation {
            return Ok(());
        }
        let model = translator.model();
        for (name, tensor) in &model.tensors {
            registry.add_index(Rc::new(LambdaRule {
                name: format!("{name}_LAMBDA"),
                kind: name.clone(),
                tensor: tensor.clone(),
                ranges: model.ranges(),
            }));
        }
        Ok(())
    }
}

pub struct LambdaRule {
    name: String,
    kind: String,
    tensor: Tensor,
    ranges: IndexRanges,
}

impl IndexRule for LambdaRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        0
    }

    fn indices(&self) -> &[IndexClass] {
        &self.tensor.indices
    }

    fn unroll(&self) -> Unroll {
        Unroll::Prevent
    }

    fn evaluate(
        &self,
        _args: &[String],
        indices: &[IndexRef],
        translator: &mut Translator,
    ) -> Result<String, Error> {
        let tags = indices.iter().map(IndexTag::from);
        let tensor = self.tensor.clone();
        let lambda = if indices.is_empty() {
            Lambda::atomic(self.kind.as_str(), tags, move |printer| {
                tensor
                    .component(&[])
                    .map(|expr| printer.print(&expr))
                    .unwrap_or_else(|| "0".to_string())
            })
        } else {
            let ranges = self.ranges;
            let abstract_indices: Vec<IndexRef> = indices
                .iter()
                .map(|index| IndexRef::new(index.label, index.class))
                .collect();
            Lambda::map(self.kind.as_str(), tags, move |printer| {
                ranges
                    .assignments(&abstract_indices)
                    .filter_map(|assignment| {
                        let values = assignment
                            .iter()
                            .map(|index| index.value.unwrap_or_default())
                            .collect::<Vec<_>>();
                        let expr = tensor.component(&values)?;
                        Some(LambdaCase {
                            values,
                            value: printer.print(&expr),
                        })
                    })
                    .collect()
            })
        };
        Ok(translator.lambdas_mut().cache(lambda))
    }
}
