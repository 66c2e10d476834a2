//! Preamble harvesting: carry a source file's packages and macros along
//! with its equations.
//!
//! An equation such as `\R^n \to \R` only typesets if `\R` is defined. The
//! standalone document each equation is rendered in therefore repeats the
//! `\usepackage` lines and command definitions of the file it came from.
//!
//! Statements are found with a regex for the command head; definition
//! bodies are then matched by brace balance, since `{…}` nests arbitrarily.
//! Comments are stripped first so commented-out packages stay out.

use once_cell::sync::Lazy;
use regex::Regex;

/// Statements harvested from one source file, in source order, deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preamble {
    /// `\usepackage[…]{…}` lines.
    pub packages: Vec<String>,
    /// `\newcommand`, `\renewcommand`, `\providecommand`, `\DeclareMathOperator`.
    pub definitions: Vec<String>,
}

static RE_USEPACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\usepackage\s*(?:\[[^\]]*\])?\s*\{[^}]*\}").unwrap());

static RE_DEFINITION_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:newcommand|renewcommand|providecommand|DeclareMathOperator)\*?").unwrap()
});

/// Harvest package and macro statements from a LaTeX source.
pub fn harvest(source: &str) -> Preamble {
    let text = strip_comments(source);
    let mut preamble = Preamble::default();

    for m in RE_USEPACKAGE.find_iter(&text) {
        push_unique(&mut preamble.packages, m.as_str());
    }

    let mut cursor = 0;
    for head in RE_DEFINITION_HEAD.find_iter(&text) {
        // Skip heads nested inside a definition already taken.
        if head.start() < cursor {
            continue;
        }
        if let Some(end) = definition_end(text.as_bytes(), head.end()) {
            push_unique(&mut preamble.definitions, &text[head.start()..end]);
            cursor = end;
        }
    }

    preamble
}

fn push_unique(list: &mut Vec<String>, statement: &str) {
    let statement = statement.trim();
    if !list.iter().any(|s| s == statement) {
        list.push(statement.to_string());
    }
}

/// Remove `%` comments (but not `\%`) from every line.
pub fn strip_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            let bytes = line.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'%' => return &line[..i],
                    _ => i += 1,
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Offset just past a definition whose head ends at `from`.
///
/// Accepts `{\name}` or `\name`, up to two `[…]` option groups, then a
/// brace-balanced body.
fn definition_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut j = skip_whitespace(bytes, from);

    match bytes.get(j)? {
        b'{' => j = balanced_end(bytes, j)?,
        b'\\' => {
            j += 1;
            let name_start = j;
            while bytes
                .get(j)
                .is_some_and(|&b| b.is_ascii_alphabetic() || b == b'@')
            {
                j += 1;
            }
            if j == name_start {
                // Control symbol such as `\!`.
                j += 1;
            }
        }
        _ => return None,
    }

    for _ in 0..2 {
        j = skip_whitespace(bytes, j);
        if bytes.get(j) == Some(&b'[') {
            j += bytes[j..].iter().position(|&b| b == b']')? + 1;
        }
    }

    j = skip_whitespace(bytes, j);
    if bytes.get(j) != Some(&b'{') {
        return None;
    }
    balanced_end(bytes, j)
}

/// Offset just past the `}` matching the `{` at `open`.
fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut j = open;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => {
                j += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j + 1);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut j: usize) -> usize {
    while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
        j += 1;
    }
    j
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvests_packages_with_options() {
        let src = "\\documentclass{article}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amsmath,bm}\n";
        let p = harvest(src);
        assert_eq!(
            p.packages,
            vec![
                "\\usepackage[utf8]{inputenc}".to_string(),
                "\\usepackage{amsmath,bm}".to_string(),
            ]
        );
        assert!(p.definitions.is_empty());
    }

    #[test]
    fn harvests_definitions_with_nested_braces() {
        let src = r"\newcommand{\norm}[1]{\left\lVert#1\right\rVert}
\renewcommand*\vec[1]{\boldsymbol{#1}}
\DeclareMathOperator*{\argmax}{arg\,max}";
        let p = harvest(src);
        assert_eq!(
            p.definitions,
            vec![
                r"\newcommand{\norm}[1]{\left\lVert#1\right\rVert}".to_string(),
                r"\renewcommand*\vec[1]{\boldsymbol{#1}}".to_string(),
                r"\DeclareMathOperator*{\argmax}{arg\,max}".to_string(),
            ]
        );
    }

    #[test]
    fn optional_default_argument() {
        let src = r"\newcommand{\pd}[2][x]{\frac{\partial #2}{\partial #1}}";
        let p = harvest(src);
        assert_eq!(p.definitions, vec![src.to_string()]);
    }

    #[test]
    fn definition_body_containing_a_definition_is_taken_once() {
        let src = r"\newcommand{\setup}{\renewcommand{\x}{y}}";
        let p = harvest(src);
        assert_eq!(p.definitions, vec![src.to_string()]);
    }

    #[test]
    fn ignores_commented_statements() {
        let src = "% \\usepackage{tikz}\n\\usepackage{bm} % \\usepackage{hyperref}\n%\\newcommand{\\x}{y}";
        let p = harvest(src);
        assert_eq!(p.packages, vec!["\\usepackage{bm}".to_string()]);
        assert!(p.definitions.is_empty());
    }

    #[test]
    fn deduplicates_in_order() {
        let src = "\\usepackage{bm}\n\\usepackage{amssymb}\n\\usepackage{bm}";
        let p = harvest(src);
        assert_eq!(p.packages.len(), 2);
        assert_eq!(p.packages[0], "\\usepackage{bm}");
    }

    #[test]
    fn unbalanced_definition_is_dropped() {
        let p = harvest(r"\newcommand{\broken}{\frac{a}");
        assert_eq!(p, Preamble::default());
    }

    #[test]
    fn strip_comments_keeps_escaped_percent() {
        assert_eq!(strip_comments(r"50\% done % note"), r"50\% done ");
        assert_eq!(strip_comments("a\n%b\nc"), "a\n\nc");
    }
}
