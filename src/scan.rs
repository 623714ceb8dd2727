//! Splits a template line into literal text and macro invocations.
//!
//! A macro is `$NAME`, optionally followed by an index list `[AB]` and an
//! argument list `{x, "y, z"}`. `$$` is a literal dollar sign, and a `$` not
//! followed by an uppercase letter or `_` is plain text.
//!
//! The scanner does not know which macros take indices. The translator puts
//! the brackets back into the text when they follow a simple rule.

use std::fmt::Display;

use crate::index::{IndexList, IndexRef};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroCall {
    pub name: String,
    pub indices: IndexList,
    pub args: Vec<String>,
}

impl MacroCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: IndexList::new(),
            args: vec![],
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds indices, classifying each by its label.
    pub fn with_indices(mut self, labels: &str) -> Result<Self, Error> {
        for label in labels.chars() {
            self.indices.push(
                IndexRef::from_label(label).ok_or_else(|| {
                    Error::MacroSyntax(format!("invalid index label '{label}'"))
                })?,
            );
        }
        Ok(self)
    }
}

impl Display for MacroCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.name)?;
        if !self.indices.is_empty() {
            f.write_str("[")?;
            for index in &self.indices {
                write!(f, "{}", index.label)?;
            }
            f.write_str("]")?;
        }
        if !self.args.is_empty() {
            write!(f, "{{{}}}", self.args.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Macro(MacroCall),
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_uppercase() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

pub fn scan_line(line: &str) -> Result<Vec<Segment>, Error> {
    let chars: Vec<char> = line.chars().collect();
    let mut segments = vec![];
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '$' {
            text.push(c);
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('$') => {
                text.push('$');
                i += 2;
            }
            Some(&next) if is_name_start(next) => {
                let (call, end) = scan_macro(&chars, i + 1)?;
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Macro(call));
                i = end;
            }
            _ => {
                text.push('$');
                i += 1;
            }
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn scan_macro(chars: &[char], start: usize) -> Result<(MacroCall, usize), Error> {
    let mut i = start;
    while i < chars.len() && is_name_char(chars[i]) {
        i += 1;
    }
    let mut call = MacroCall::new(chars[start..i].iter().collect::<String>());

    if chars.get(i) == Some(&'[') {
        if let Some(close) = chars[i..].iter().position(|&c| c == ']') {
            let inner = &chars[i + 1..i + close];
            // anything but letters means the bracket belongs to the output text
            if inner.iter().all(|c| c.is_ascii_alphabetic() || c.is_whitespace()) {
                let labels: String = inner.iter().filter(|c| !c.is_whitespace()).collect();
                call = call.with_indices(&labels)?;
                i += close + 1;
            }
        }
    }

    if chars.get(i) == Some(&'{') {
        let (args, end) = scan_args(chars, i + 1, &call.name)?;
        call.args = args;
        i = end;
    }
    Ok((call, i))
}

fn scan_args(chars: &[char], start: usize, name: &str) -> Result<(Vec<String>, usize), Error> {
    let mut args = vec![];
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if in_quotes {
            current.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    current.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_quotes = false;
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    current.push(c);
                }
                '{' => {
                    depth += 1;
                    current.push(c);
                }
                '}' if depth == 0 => {
                    if !(args.is_empty() && current.trim().is_empty()) {
                        args.push(finish_arg(&current));
                    }
                    return Ok((args, i + 1));
                }
                '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    args.push(finish_arg(&current));
                    current.clear();
                }
                c => current.push(c),
            }
        }
        i += 1;
    }
    Err(Error::MacroSyntax(format!(
        "unterminated argument list for ${name}"
    )))
}

fn finish_arg(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(e @ ('"' | '\\')) => out.push(e),
                        Some(e) => {
                            out.push('\\');
                            out.push(e);
                        }
                        None => out.push('\\'),
                    },
                    c => out.push(c),
                }
            }
            out
        }
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexClass;

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    #[test]
    fn plain_text() {
        assert_eq!(scan_line("int x = 1;").unwrap(), vec![text("int x = 1;")]);
        assert_eq!(scan_line("").unwrap(), vec![]);
    }

    #[test]
    fn dollars() {
        assert_eq!(
            scan_line("cost: $$5, $1 = $2").unwrap(),
            vec![text("cost: $5, $1 = $2")]
        );
    }

    #[test]
    fn macro_with_indices_and_args() {
        let segments = scan_line("x = $U2[A b]{1, \"p, q\"};").unwrap();
        let Segment::Macro(call) = &segments[1] else {
            panic!("expected a macro, got {segments:?}");
        };
        assert_eq!(call.name, "U2");
        assert_eq!(call.args, ["1", "p, q"]);
        let classes = call.indices.iter().map(|i| i.class).collect::<Vec<_>>();
        assert_eq!(classes, [IndexClass::Full, IndexClass::FieldOnly]);
        assert_eq!(segments[0], text("x = "));
        assert_eq!(segments[2], text(";"));
    }

    #[test]
    fn quoted_arguments() {
        let segments = scan_line(r#"$TEMP_POOL{"const auto $1 = $2; // {x}"}"#).unwrap();
        assert_eq!(
            segments,
            vec![Segment::Macro(
                MacroCall::new("TEMP_POOL").with_args(["const auto $1 = $2; // {x}"])
            )]
        );
    }

    #[test]
    fn empty_and_nested_arguments() {
        let segments = scan_line("$A{} $B{ {x, y}, z }").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Macro(MacroCall::new("A")),
                text(" "),
                Segment::Macro(MacroCall::new("B").with_args(["{x, y}", "z"])),
            ]
        );
    }

    #[test]
    fn brackets_that_are_not_indices() {
        let segments = scan_line("$NUMBER_FIELDS[0]").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Macro(MacroCall::new("NUMBER_FIELDS")), text("[0]")]
        );
    }

    #[test]
    fn unterminated_arguments() {
        assert!(matches!(
            scan_line("$COMMENT{oops"),
            Err(Error::MacroSyntax(_))
        ));
    }

    #[test]
    fn display_round_trips_through_scan() {
        let call = MacroCall::new("FIELD_NAME").with_indices("a").unwrap();
        assert_eq!(call.to_string(), "$FIELD_NAME[a]");
        assert_eq!(
            scan_line(&call.to_string()).unwrap(),
            vec![Segment::Macro(call)]
        );
    }
}
