use crate::macros::{MacroPackage, MacroRegistry, SimpleFn};
use crate::stack::{FrameId, ProcessKind};
use crate::translator::{NestedOptions, Translator};
use crate::Error;

/// Nested translations: `$IMPORT{template}` copies the translated template
/// into the output, `$EMBED_STRING{template}` turns each of its lines into a
/// string literal.
pub struct EmbedPackage;

impl MacroPackage for EmbedPackage {
    fn name(&self) -> &str {
        "embed"
    }

    fn install(
        &self,
        registry: &mut MacroRegistry,
        _translator: &mut Translator,
        _frame: FrameId,
        _kind: ProcessKind,
    ) -> Result<(), Error> {
        registry.add_simple(SimpleFn::new("IMPORT", 1, |args, tr| {
            tr.translate_nested(&args[0], NestedOptions::verbatim())?;
            Ok(String::new())
        }));
        registry.add_simple(SimpleFn::new("EMBED_STRING", 1, |args, tr| {
            let options = NestedOptions::string(tr.printer());
            tr.translate_nested(&args[0], options)?;
            Ok(String::new())
        }));
        Ok(())
    }
}
