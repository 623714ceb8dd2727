//! Macros describing the tool, the template being expanded and the model.

use crate::index::IndexClass;
use crate::macros::{concrete_values, IndexFn, MacroPackage, MacroRegistry, SimpleFn};
use crate::stack::{FrameId, ProcessKind};
use crate::translator::Translator;
use crate::util::ListDisplay;
use crate::Error;

pub struct Fundamental;

fn quoted(names: &[String]) -> Vec<String> {
    names.iter().map(|name| format!("\"{name}\"")).collect()
}

fn template_name(translator: &Translator) -> Result<String, Error> {
    Ok(translator.stack().top()?.template.clone())
}

/// An include guard derived from the model and the template file name.
fn guard(model: &str, template: &str) -> String {
    let stem = std::path::Path::new(template)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut guard = format!("__{model}_{stem}_H");
    guard.retain(|c| c.is_ascii_alphanumeric() || c == '_');
    guard.to_ascii_uppercase()
}

impl MacroPackage for Fundamental {
    fn name(&self) -> &str {
        "fundamental"
    }

    fn install(
        &self,
        registry: &mut MacroRegistry,
        _translator: &mut Translator,
        _frame: FrameId,
        _kind: ProcessKind,
    ) -> Result<(), Error> {
        registry.add_simple(SimpleFn::new("TOOL", 0, |_, _| {
            Ok(env!("CARGO_PKG_NAME").to_string())
        }));
        registry.add_simple(SimpleFn::new("VERSION", 0, |_, tr| {
            Ok(tr.config().version.to_string())
        }));
        registry.add_simple(SimpleFn::new("TEMPLATE", 0, |_, tr| template_name(tr)));
        registry.add_simple(SimpleFn::new("MODEL", 0, |_, tr| Ok(tr.model().name.clone())));
        registry.add_simple(SimpleFn::new("GUARD", 0, |_, tr| {
            Ok(guard(&tr.model().name, &template_name(tr)?))
        }));
        registry.add_simple(SimpleFn::new("NUMBER_FIELDS", 0, |_, tr| {
            Ok(tr.model().fields.len().to_string())
        }));
        registry.add_simple(SimpleFn::new("NUMBER_PARAMS", 0, |_, tr| {
            Ok(tr.model().parameters.len().to_string())
        }));
        registry.add_simple(SimpleFn::new("FIELD_NAMES", 0, |_, tr| {
            Ok(ListDisplay(&quoted(&tr.model().fields), ", ").to_string())
        }));
        registry.add_simple(SimpleFn::new("PARAM_NAMES", 0, |_, tr| {
            Ok(ListDisplay(&quoted(&tr.model().parameters), ", ").to_string())
        }));
        registry.add_simple(SimpleFn::new("COMMENT", 1, |args, tr| {
            Ok(tr.printer().comment(&args[0]))
        }));

        registry.add_index(IndexFn::new(
            "FIELD_NAME",
            0,
            [IndexClass::FieldOnly],
            |_, indices, tr| {
                let values = concrete_values("FIELD_NAME", indices)?;
                Ok(format!("\"{}\"", tr.model().fields[values[0]]))
            },
        ));
        registry.add_index(IndexFn::new(
            "PARAMETER",
            0,
            [IndexClass::Parameter],
            |_, indices, tr| {
                let values = concrete_values("PARAMETER", indices)?;
                Ok(tr.model().parameters[values[0]].clone())
            },
        ));
        registry.add_index(IndexFn::new(
            "COORDINATE",
            0,
            [IndexClass::Full],
            |_, indices, tr| {
                let values = concrete_values("COORDINATE", indices)?;
                let model = tr.model();
                let coordinate = model.coordinate(values[0]).ok_or_else(|| {
                    Error::MissingComponent {
                        tensor: "COORDINATE".to_string(),
                        indices: values.clone(),
                    }
                })?;
                Ok(tr.printer().print(&coordinate))
            },
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards() {
        assert_eq!(guard("quartic", "dir/core.h.tpl"), "__QUARTIC_COREH_H");
        assert_eq!(guard("two-field", "x.tpl"), "__TWOFIELD_X_H");
    }
}
