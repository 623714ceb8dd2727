use std::rc::Rc;

use crate::index::{IndexClass, IndexRef};
use crate::macros::{concrete_values, IndexRule, MacroPackage, MacroRegistry};
use crate::model::Tensor;
use crate::stack::{FrameId, ProcessKind};
use crate::translator::Translator;
use crate::Error;

/// One index rule per model tensor, named after the tensor. Components are
/// printed through the expression cache.
pub struct TensorPackage;

impl MacroPackage for TensorPackage {
    fn name(&self) -> &str {
        "tensor"
    }

    fn install(
        &self,
        registry: &mut MacroRegistry,
        translator: &mut Translator,
        _frame: FrameId,
        _kind: ProcessKind,
    ) -> Result<(), Error> {
        for (name, tensor) in &translator.model().tensors {
            registry.add_index(Rc::new(TensorRule {
                name: name.clone(),
                tensor: tensor.clone(),
            }));
        }
        Ok(())
    }
}

pub struct TensorRule {
    name: String,
    tensor: Tensor,
}

impl IndexRule for TensorRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        0
    }

    fn indices(&self) -> &[IndexClass] {
        &self.tensor.indices
    }

    fn evaluate(
        &self,
        _args: &[String],
        indices: &[IndexRef],
        translator: &mut Translator,
    ) -> Result<String, Error> {
        let values = concrete_values(&self.name, indices)?;
        let expr = self
            .tensor
            .component(&values)
            .ok_or_else(|| Error::MissingComponent {
                tensor: self.name.clone(),
                indices: values,
            })?;
        Ok(translator.cse_mut().emit(&expr))
    }
}
