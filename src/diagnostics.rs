use std::fmt::Display;

use crate::util::IndexSet;

/// Collects warnings raised during a translation run.
///
/// Warnings are de-duplicated and kept in the order they were first raised,
/// so that they can be reported as one summary instead of being interleaved
/// with output.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: IndexSet<String>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Display) {
        let message = message.to_string();
        log::debug!("warning: {message}");
        self.warnings.insert(message);
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_issued_once() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.warn("missing $2");
        diagnostics.warn("no pool");
        diagnostics.warn("missing $2");
        assert_eq!(diagnostics.warnings().collect::<Vec<_>>(), ["missing $2", "no pool"]);
    }
}
