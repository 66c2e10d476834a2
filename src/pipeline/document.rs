//! Standalone document synthesis: one equation → one compilable `.tex`.

use crate::config::EquationKind;
use crate::pipeline::scan::EquationSpan;
use std::borrow::Cow;

/// Build the minimal LaTeX document that typesets exactly `span`.
///
/// Harvested `\usepackage` lines come before the stock `amsmath`/`amssymb`
/// so a user's `\usepackage[…]{amsmath}` is loaded first and the later
/// option-less load is a no-op rather than an option clash. Macro
/// definitions come after all packages.
pub fn standalone_document(span: &EquationSpan) -> String {
    let mut doc = String::from("\\documentclass{article}\n");
    for package in &span.preamble.packages {
        doc.push_str(package);
        doc.push('\n');
    }
    doc.push_str("\\usepackage{amsmath}\n\\usepackage{amssymb}\n");
    for definition in &span.preamble.definitions {
        doc.push_str(definition);
        doc.push('\n');
    }
    doc.push_str("\\pagestyle{empty}\n\\begin{document}\n");
    doc.push_str(&wrap_equation(span));
    doc.push_str("\n\\end{document}\n");
    doc
}

/// Put the math-mode markers for the span's kind back around its text.
///
/// Block environments are switched to their starred form so the image
/// carries no equation number.
pub fn wrap_equation(span: &EquationSpan) -> String {
    let raw = &span.raw_text;
    match span.kind {
        EquationKind::Inline => format!("${raw}$"),
        EquationKind::Display => format!("\\[{raw}\\]"),
        EquationKind::Block => {
            let env = unnumbered(span.environment.as_deref().unwrap_or("equation"));
            format!("\\begin{{{env}}}{raw}\\end{{{env}}}")
        }
    }
}

fn unnumbered(env: &str) -> Cow<'_, str> {
    if env.ends_with('*') || env == "displaymath" {
        Cow::Borrowed(env)
    } else {
        Cow::Owned(format!("{env}*"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::preamble::Preamble;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn span(kind: EquationKind, raw: &str, env: Option<&str>) -> EquationSpan {
        EquationSpan {
            kind,
            raw_text: raw.to_string(),
            source_file: PathBuf::from("doc.tex"),
            ordinal: 1,
            line: 1,
            environment: env.map(str::to_string),
            label: None,
            preamble: Arc::new(Preamble::default()),
        }
    }

    #[test]
    fn wraps_each_kind() {
        assert_eq!(wrap_equation(&span(EquationKind::Inline, "x+1", None)), "$x+1$");
        assert_eq!(
            wrap_equation(&span(EquationKind::Display, "y=mx+b", None)),
            "\\[y=mx+b\\]"
        );
        assert_eq!(
            wrap_equation(&span(EquationKind::Block, "E=mc^2", Some("equation"))),
            "\\begin{equation*}E=mc^2\\end{equation*}"
        );
    }

    #[test]
    fn starred_and_unstarrable_environments_kept() {
        assert_eq!(
            wrap_equation(&span(EquationKind::Block, "a&=b", Some("align*"))),
            "\\begin{align*}a&=b\\end{align*}"
        );
        assert_eq!(
            wrap_equation(&span(EquationKind::Block, "a", Some("displaymath"))),
            "\\begin{displaymath}a\\end{displaymath}"
        );
    }

    #[test]
    fn document_orders_packages_before_definitions() {
        let mut s = span(EquationKind::Inline, "\\R", None);
        s.preamble = Arc::new(Preamble {
            packages: vec!["\\usepackage[fleqn]{amsmath}".into()],
            definitions: vec!["\\newcommand{\\R}{\\mathbb{R}}".into()],
        });
        let doc = standalone_document(&s);

        let user_pkg = doc.find("\\usepackage[fleqn]{amsmath}").unwrap();
        let stock_pkg = doc.find("\\usepackage{amsmath}").unwrap();
        let def = doc.find("\\newcommand").unwrap();
        let body = doc.find("\\begin{document}").unwrap();
        assert!(user_pkg < stock_pkg && stock_pkg < def && def < body);
        assert!(doc.contains("$\\R$"));
        assert!(doc.trim_end().ends_with("\\end{document}"));
    }
}
