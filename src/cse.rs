//! Common-subexpression elimination over [`Expr`] trees.
//!
//! Every compound subexpression seen by [`Cse::parse`] gets a
//! [`SymbolRecord`] keyed by its canonical printed form, in which already
//! cached children are replaced by their names. Printing an expression through
//! [`Cse::substitute_and_record`] replaces its operands by those names and
//! queues a declaration for each temporary the first time it is referenced.

use std::rc::Rc;

use crate::diagnostics::Diagnostics;
use crate::expr::Expr;
use crate::printer::LanguagePrinter;
use crate::util::{Generation, HEntry, HashMap, NameGen};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub name: String,
    pub target: String,
    /// Set when the subexpression is first seen.
    pub filled: bool,
    /// Set when a caller first references the subexpression.
    pub written: bool,
    // keys of the records this one refers to by name
    deps: Vec<String>,
}

/// A declaration template with `$1` (name) and `$2` (target) markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationTemplate {
    text: String,
}

impl DeclarationTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn check(&self) -> Result<(), Error> {
        for placeholder in ["$1", "$2"] {
            if !self.text.contains(placeholder) {
                return Err(Error::MalformedDeclarationTemplate {
                    template: self.text.clone(),
                    placeholder,
                });
            }
        }
        Ok(())
    }

    /// Substitutes both markers. A malformed template is returned verbatim.
    pub fn instantiate(&self, name: &str, target: &str) -> String {
        if self.check().is_err() {
            return self.text.clone();
        }
        let mut out = String::with_capacity(self.text.len() + name.len() + target.len());
        let mut rest = self.text.as_str();
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            if let Some(tail) = after.strip_prefix('1') {
                out.push_str(name);
                rest = tail;
            } else if let Some(tail) = after.strip_prefix('2') {
                out.push_str(target);
                rest = tail;
            } else {
                out.push('$');
                rest = after;
            }
        }
        out.push_str(rest);
        out
    }
}

pub struct Cse {
    printer: Rc<dyn LanguagePrinter>,
    names: NameGen,
    symbols: HashMap<String, SymbolRecord>,
    // canonical printed form of every compound subexpression parsed
    // during this generation
    keys: HashMap<Expr, String>,
    decls: Vec<(String, String)>,
    hits: usize,
    misses: usize,
}

impl Cse {
    pub fn new(
        printer: Rc<dyn LanguagePrinter>,
        kernel: impl Into<String>,
        generation: Generation,
    ) -> Self {
        Self {
            printer,
            names: NameGen::new(kernel, generation),
            symbols: Default::default(),
            keys: Default::default(),
            decls: vec![],
            hits: 0,
            misses: 0,
        }
    }

    /// Creates a record for every distinct compound subexpression of `expr`.
    /// Parsing the same tree again creates nothing new.
    pub fn parse(&mut self, expr: &Expr) {
        self.parse_node(expr);
    }

    fn parse_node(&mut self, expr: &Expr) -> Option<String> {
        let Expr::Node(_, children) = expr else {
            return None;
        };
        if let Some(key) = self.keys.get(expr) {
            self.hits += 1;
            return Some(key.clone());
        }

        let mut deps: Vec<String> = vec![];
        for child in children {
            if let Some(key) = self.parse_node(child) {
                if !deps.contains(&key) {
                    deps.push(key);
                }
            }
        }

        let key = self.substitute_no_record(expr);
        match self.symbols.entry(key.clone()) {
            HEntry::Occupied(_) => self.hits += 1,
            HEntry::Vacant(entry) => {
                self.misses += 1;
                let name = self.names.fresh();
                log::trace!("cse: {name} = {key}");
                entry.insert(SymbolRecord {
                    name,
                    target: key.clone(),
                    filled: true,
                    written: false,
                    deps,
                });
            }
        }
        self.keys.insert(expr.clone(), key.clone());
        Some(key)
    }

    fn lookup(&self, expr: &Expr) -> Option<(&String, &SymbolRecord)> {
        let key = self.keys.get(expr)?;
        self.symbols.get(key).map(|record| (key, record))
    }

    /// Prints `expr` with its cached subexpressions replaced by their names,
    /// without marking any of them as used.
    pub fn substitute_no_record(&self, expr: &Expr) -> String {
        self.printer.print_with(expr, &mut |sub| {
            self.lookup(sub).map(|(_, record)| record.name.clone())
        })
    }

    /// Like [`Cse::substitute_no_record`], but every temporary that appears
    /// in the result is queued for declaration on first reference.
    pub fn substitute_and_record(&mut self, expr: &Expr) -> String {
        let mut used = vec![];
        let text = self.printer.print_with(expr, &mut |sub| {
            let (key, record) = self.lookup(sub)?;
            used.push(key.clone());
            Some(record.name.clone())
        });
        for key in used {
            self.mark_used(&key);
        }
        text
    }

    /// Parses `expr` and prints it through [`Cse::substitute_and_record`].
    pub fn emit(&mut self, expr: &Expr) -> String {
        self.parse(expr);
        self.substitute_and_record(expr)
    }

    fn mark_used(&mut self, key: &str) {
        let deps = match self.symbols.get(key) {
            Some(record) if !record.written => record.deps.clone(),
            _ => return,
        };
        // dependencies are declared before the temporaries that use them
        for dep in &deps {
            self.mark_used(dep);
        }
        if let Some(record) = self.symbols.get_mut(key) {
            record.written = true;
            self.decls.push((record.name.clone(), record.target.clone()));
        }
    }

    /// Renders every queued declaration through `template`, one per line, in
    /// first-reference order.
    pub fn declarations_as(&self, template: &str, diagnostics: &mut Diagnostics) -> String {
        self.declarations_after(&[], template, diagnostics)
    }

    /// Like [`Cse::declarations_as`], with `earlier` declarations rendered
    /// first.
    pub fn declarations_after(
        &self,
        earlier: &[(String, String)],
        template: &str,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let template = DeclarationTemplate::new(template);
        if let Err(err) = template.check() {
            diagnostics.warn(err);
        }
        let mut out = String::new();
        for (name, target) in earlier.iter().chain(&self.decls) {
            out.push_str(&template.instantiate(name, target));
            out.push('\n');
        }
        out
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.keys.clear();
        self.decls.clear();
        let generation = self.names.generation().advance();
        log::debug!("cse: starting generation {generation}");
    }

    pub fn declarations(&self) -> &[(String, String)] {
        &self.decls
    }

    pub fn has_declarations(&self) -> bool {
        !self.decls.is_empty()
    }

    pub fn symbol(&self, printed: &str) -> Option<&SymbolRecord> {
        self.symbols.get(printed)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolRecord> {
        self.symbols.values()
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
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
    use crate::expr;
    use crate::printer::CppPrinter;
    use crate::util::HashSet;

    fn cse() -> Cse {
        Cse::new(Rc::new(CppPrinter), "t", Generation::default())
    }

    fn names(cse: &Cse) -> HashSet<String> {
        cse.symbols().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn shared_sum_is_declared_once() {
        let mut cse = cse();
        let e = expr!(mul (add a b) (add a b));
        cse.parse(&e);

        let sum = cse.symbol("a + b").unwrap();
        assert_eq!(sum.name, "t_0_0");
        assert!(sum.filled && !sum.written);
        assert_eq!(cse.symbols().filter(|r| r.target == "a + b").count(), 1);

        assert_eq!(cse.substitute_and_record(&e), "t_0_0*t_0_0");
        assert_eq!(
            cse.declarations(),
            [("t_0_0".to_string(), "a + b".to_string())]
        );
        assert!(cse.symbol("a + b").unwrap().written);
    }

    #[test]
    fn parse_is_idempotent() {
        let mut cse = cse();
        let e = expr!(add (mul x (sin y)) (mul x (sin y)) (pow z 2));
        cse.parse(&e);
        let before = cse
            .symbols()
            .map(|r| (r.name.clone(), r.target.clone()))
            .collect::<HashSet<_>>();
        cse.parse(&e);
        let after = cse
            .symbols()
            .map(|r| (r.name.clone(), r.target.clone()))
            .collect::<HashSet<_>>();
        assert_eq!(before, after);
        assert_eq!(cse.misses(), before.len());
    }

    #[test]
    fn equal_printed_forms_share_a_name() {
        let mut cse = cse();
        let first = expr!(mul (add a b) c);
        let second = expr!(sin (mul (add a b) c));
        cse.parse(&first);
        cse.parse(&second);
        let from_first = cse.substitute_and_record(&expr!(neg (mul (add a b) c)));
        let from_second = cse.substitute_and_record(&expr!(cos (mul (add a b) c)));
        assert_eq!(from_first, "-t_0_1");
        assert_eq!(from_second, "cos(t_0_1)");
    }

    #[test]
    fn no_record_does_not_queue() {
        let mut cse = cse();
        let e = expr!(mul (add a b) (add a b));
        cse.parse(&e);
        assert_eq!(cse.substitute_no_record(&e), "t_0_0*t_0_0");
        assert!(!cse.has_declarations());
        assert!(!cse.symbol("a + b").unwrap().written);
    }

    #[test]
    fn dependencies_are_declared_first() {
        let mut cse = cse();
        let e = expr!(sin (mul (add a b) c));
        assert_eq!(cse.emit(&e), "sin(t_0_1)");
        assert_eq!(
            cse.declarations(),
            [
                ("t_0_0".to_string(), "a + b".to_string()),
                ("t_0_1".to_string(), "t_0_0*c".to_string()),
            ]
        );
    }

    #[test]
    fn declarations_follow_first_reference_order() {
        let mut cse = cse();
        let x = expr!(add a b);
        let y = expr!(add c d);
        cse.parse(&x);
        cse.parse(&y);
        cse.substitute_and_record(&expr!(sin (add c d)));
        cse.substitute_and_record(&expr!(cos (add a b)));
        cse.substitute_and_record(&expr!(tan (add c d)));
        let mut diagnostics = Diagnostics::default();
        assert_eq!(
            cse.declarations_as("double $1 = $2;", &mut diagnostics),
            "double t_0_1 = c + d;\ndouble t_0_0 = a + b;\n"
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn clear_starts_a_new_generation() {
        let mut cse = cse();
        let e = expr!(mul (add a b) (add a b));
        cse.parse(&e);
        let old = names(&cse);
        cse.clear();
        assert_eq!(cse.num_symbols(), 0);
        assert!(!cse.has_declarations());
        cse.parse(&e);
        let new = names(&cse);
        assert_eq!(new.len(), old.len());
        assert!(old.is_disjoint(&new));
        assert!(new.iter().all(|n| n.starts_with("t_1_")));
    }

    #[test]
    fn earlier_declarations_render_first() {
        let mut cse = cse();
        cse.emit(&expr!(sin (add a b)));
        let held = [("u_0_0".to_string(), "c*d".to_string())];
        let mut diagnostics = Diagnostics::default();
        assert_eq!(
            cse.declarations_after(&held, "$1 = $2;", &mut diagnostics),
            "u_0_0 = c*d;\nt_0_0 = a + b;\n"
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn malformed_template_falls_back_to_literal() {
        let mut cse = cse();
        cse.emit(&expr!(sin (add a b)));
        let mut diagnostics = Diagnostics::default();
        let text = cse.declarations_as("auto $1;", &mut diagnostics);
        assert_eq!(text, "auto $1;\n");
        cse.declarations_as("auto $1;", &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn template_markers() {
        let template = DeclarationTemplate::new("$1 := $2 ($$ kept)");
        assert_eq!(template.instantiate("x", "y"), "x := y ($$ kept)");
        assert!(matches!(
            DeclarationTemplate::new("$2 only").check(),
            Err(Error::MalformedDeclarationTemplate {
                placeholder: "$1",
                ..
            })
        ));
    }
}
