//! Escaping of user-provided text for inclusion in TeX sources.

use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex};

static ESCAPE_RE: Lazy<Regex> = Lazy::new(|| compile(r"([{}_$&%#])|([\\^~|<>])"));
static LINE_BREAK_RE: Lazy<Regex> = Lazy::new(|| compile(r"\r?\n"));

// Word characters are ASCII only, word boundaries stay Unicode-aware.
// Order matters: nested quotes must be handled before plain ones.
static TYPOGRAPHIC_REPLACEMENTS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (compile(r#"(?m)(^|[[:^word:]])"'\b"#), r"${1}\glqq{}\glq{}"),
        (compile(r#"(?m)\b'"([[:^word:]]|$)"#), r"\grq{}\grqq{}${1}"),
        (compile(r#"(?m)(^|[[:^word:]])"\b"#), r"${1}\glqq{}"),
        (compile(r#"(?m)\b"([[:^word:]]|$)"#), r"\grqq{}${1}"),
        (compile(r"(?m)(^|[[:^word:]])'\b"), r"${1}\glq{}"),
        (compile(r"(?m)\b'([[:^word:]]|$)"), r"\grq{}${1}"),
    ]
});

static HYPHENATION_RE: Lazy<Regex> = Lazy::new(|| compile(r"([[:word:]])-([[:word:]])"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|err| panic!("invalid built-in pattern {pattern}: {err}"))
}

#[derive(Debug, Clone, Copy)]
pub struct EscapeOptions<'a> {
    /// Replacement for each newline.
    pub line_break: &'a str,
    /// German typographic quotes (`\glqq{}` ... `\grqq{}`).
    pub typographic: bool,
    /// Hyphenation-friendly dashes (`a-b` becomes `a"=b`).
    pub hyphenation: bool,
}

impl Default for EscapeOptions<'_> {
    fn default() -> Self {
        Self {
            line_break: r"\\",
            typographic: true,
            hyphenation: true,
        }
    }
}

impl EscapeOptions<'_> {
    pub fn without_typography() -> Self {
        Self {
            typographic: false,
            hyphenation: false,
            ..Self::default()
        }
    }
}

/// Escape `text` so that it renders literally in a TeX document.
pub fn escape(text: &str, options: EscapeOptions<'_>) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut escaped = ESCAPE_RE
        .replace_all(text, |caps: &Captures<'_>| match caps.get(1) {
            Some(special) => format!("\\{}", special.as_str()),
            None => format!("\\text{}{{}}", symbol_name(&caps[2])),
        })
        .into_owned();

    if options.typographic {
        escaped = apply(&TYPOGRAPHIC_REPLACEMENTS, escaped);
    }
    if options.hyphenation {
        escaped = HYPHENATION_RE.replace_all(&escaped, r#"${1}"=${2}"#).into_owned();
    }

    LINE_BREAK_RE
        .replace_all(&escaped, NoExpand(options.line_break))
        .into_owned()
}

fn apply(replacements: &[(Regex, &'static str)], mut text: String) -> String {
    for (re, replacement) in replacements {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    text
}

fn symbol_name(symbol: &str) -> &'static str {
    match symbol {
        "\\" => "backslash",
        "^" => "asciicircum",
        "~" => "asciitilde",
        "|" => "bar",
        "<" => "less",
        _ => "greater",
    }
}
