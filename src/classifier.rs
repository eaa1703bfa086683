//! Code-string classification.
//!
//! Decides whether an extracted string is machine code (identifiers, CSS,
//! markup, URLs, ...) that must be left untranslated. The decision is made by
//! an ordered rule table so that each rule can be inspected and tested on its
//! own via [`matching_rule`].
//!
//! Whitespace exception: text containing whitespace is natural language, even
//! when it carries inline markup or placeholders (`{count} of {total}`). The
//! only rules that see multi-word text (`spans_words`) are the empty/too-short
//! check and utility-class lists, where at least 70% of the tokens are
//! utility classes. Ambiguous text is not code.

use regex::Regex;
use std::sync::OnceLock;

/// One classification rule.
#[derive(Debug, Clone, Copy)]
pub struct CodeRule {
    /// Stable rule name, reported by [`matching_rule`]
    pub name: &'static str,
    /// Whether the rule may match text that contains whitespace
    pub spans_words: bool,
    matcher: fn(&str) -> bool,
}

impl CodeRule {
    /// Apply this rule to already-trimmed text.
    pub fn matches(&self, text: &str) -> bool {
        (self.matcher)(text)
    }
}

/// Minimum share of utility-class tokens for multi-word text to count as a class list
const UTILITY_DOMINANCE: f64 = 0.7;

/// Classification rules, applied in order.
pub static CODE_RULES: &[CodeRule] = &[
    CodeRule {
        name: "too_short",
        spans_words: true,
        matcher: is_too_short,
    },
    CodeRule {
        name: "identifier",
        spans_words: false,
        matcher: is_identifier,
    },
    CodeRule {
        name: "constant",
        spans_words: false,
        matcher: is_constant,
    },
    CodeRule {
        name: "numeric_literal",
        spans_words: false,
        matcher: is_numeric_literal,
    },
    CodeRule {
        name: "file_extension",
        spans_words: false,
        matcher: has_file_extension,
    },
    CodeRule {
        name: "css_value",
        spans_words: false,
        matcher: is_css_value,
    },
    CodeRule {
        name: "css_selector",
        spans_words: false,
        matcher: is_css_selector,
    },
    CodeRule {
        name: "css_at_rule",
        spans_words: false,
        matcher: is_css_at_rule,
    },
    CodeRule {
        name: "css_custom_property",
        spans_words: false,
        matcher: is_css_custom_property,
    },
    CodeRule {
        name: "kebab_case",
        spans_words: false,
        matcher: is_kebab_case,
    },
    CodeRule {
        name: "json_shape",
        spans_words: false,
        matcher: is_json_shape,
    },
    CodeRule {
        name: "html_tag",
        spans_words: false,
        matcher: is_html_tag,
    },
    CodeRule {
        name: "absolute_path",
        spans_words: false,
        matcher: is_absolute_path,
    },
    CodeRule {
        name: "url",
        spans_words: false,
        matcher: is_url,
    },
    CodeRule {
        name: "property_access",
        spans_words: false,
        matcher: is_property_access,
    },
    CodeRule {
        name: "function_call",
        spans_words: false,
        matcher: is_function_call,
    },
    CodeRule {
        name: "keyword_prefix",
        spans_words: false,
        matcher: has_keyword_prefix,
    },
    CodeRule {
        name: "utility_class",
        spans_words: false,
        matcher: is_single_utility_class,
    },
    CodeRule {
        name: "utility_class_list",
        spans_words: true,
        matcher: is_utility_class_list,
    },
];

/// Returns true when `text` is machine-code-like and must not be translated.
pub fn is_code_string(text: &str) -> bool {
    matching_rule(text).is_some()
}

/// Name of the first rule classifying `text` as code, if any.
pub fn matching_rule(text: &str) -> Option<&'static str> {
    let trimmed = text.trim();
    let has_whitespace = trimmed.chars().any(char::is_whitespace);

    CODE_RULES
        .iter()
        .find(|rule| (rule.spans_words || !has_whitespace) && rule.matches(trimmed))
        .map(|rule| rule.name)
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("classifier pattern must compile"))
}

fn is_too_short(text: &str) -> bool {
    text.chars().count() <= 2
}

/// `^[a-zA-Z_$][a-zA-Z0-9_$]*$`, limited to identifier shapes.
///
/// A bare word such as `Submit` or `save` fits the pattern but is ordinary UI
/// text, so a match also needs `_`/`$`, a camelCase hump, or lowercase letters
/// mixed with digits (`h1`, `col12`).
fn is_identifier(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    static CAMEL_HUMP: OnceLock<Regex> = OnceLock::new();
    static LOWER_WITH_DIGITS: OnceLock<Regex> = OnceLock::new();

    if !regex(&PATTERN, r"^[a-zA-Z_$][a-zA-Z0-9_$]*$").is_match(text) {
        return false;
    }

    text.contains('_')
        || text.contains('$')
        || regex(&CAMEL_HUMP, r"[a-z0-9][A-Z]").is_match(text)
        || regex(&LOWER_WITH_DIGITS, r"^[a-z]+[0-9]+[a-z0-9]*$").is_match(text)
}

/// `^[A-Z_][A-Z0-9_]*$` with an underscore or digit (`API_KEY`, `H2`).
///
/// Plain all-caps words (`NEW`, `SALE`) are badge text, not constants.
fn is_constant(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();

    regex(&PATTERN, r"^[A-Z_][A-Z0-9_]*$").is_match(text)
        && text.chars().any(|c| c == '_' || c.is_ascii_digit())
}

fn is_numeric_literal(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(&PATTERN, r"^[-+]?[0-9][0-9.,_]*$").is_match(text)
}

fn has_file_extension(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(
        &PATTERN,
        r"(?i)\.(js|jsx|ts|tsx|mjs|cjs|css|scss|sass|less|json|html?|vue|svelte|md|mdx|svg|png|jpe?g|gif|webp|ico|woff2?|ttf|eot|otf|map|ya?ml|xml|txt|lock|sh|py|rb|go|rs)$",
    )
    .is_match(text)
}

fn is_css_value(text: &str) -> bool {
    static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
    static LENGTH: OnceLock<Regex> = OnceLock::new();
    static FUNCTION: OnceLock<Regex> = OnceLock::new();

    regex(
        &HEX_COLOR,
        r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$",
    )
    .is_match(text)
        || regex(
            &LENGTH,
            r"^-?[0-9]*\.?[0-9]+(?:px|em|rem|%|vh|vw|vmin|vmax|pt|ch|ex|fr|deg|rad|ms|s)$",
        )
        .is_match(text)
        || regex(
            &FUNCTION,
            r"^(?:rgba?|hsla?|var|calc|min|max|clamp|url|linear-gradient|radial-gradient|translate[XYZ3d]*|rotate[XYZ]?|scale[XYZ]?|cubic-bezier)\(.*\)$",
        )
        .is_match(text)
}

fn is_css_selector(text: &str) -> bool {
    static CLASS: OnceLock<Regex> = OnceLock::new();
    static ID: OnceLock<Regex> = OnceLock::new();

    regex(&CLASS, r"^\.[a-zA-Z_-][\w-]*(?:[.:#\[][\w\-=\]:.#]*)*$").is_match(text)
        || regex(&ID, r"^#[a-zA-Z_][\w-]*$").is_match(text)
}

fn is_css_at_rule(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(
        &PATTERN,
        r"^@(?:media|import|keyframes|font-face|supports|apply|tailwind|layer|charset|container|page|namespace)\b",
    )
    .is_match(text)
}

fn is_css_custom_property(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(&PATTERN, r"^--[a-zA-Z][\w-]*$").is_match(text)
}

/// Hyphenated class tokens (`btn-primary`, `col-md-6`).
///
/// Hyphenated words (`sign-in`, `e-mail`, `up-to-date`) share the shape, so a
/// match also needs a digit or a common class-name prefix.
fn is_kebab_case(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    static CLASS_PREFIX: OnceLock<Regex> = OnceLock::new();

    if !regex(&PATTERN, r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)+$").is_match(text) {
        return false;
    }

    text.chars().any(|c| c.is_ascii_digit())
        || regex(
            &CLASS_PREFIX,
            r"^(?:btn|nav|navbar|col|row|text|bg|border|icon|fa|form|card|modal|alert|badge|list|grid|flex|container|header|footer|sidebar|menu|dropdown|input|table|is|has|js|ui|app|page|layout|wrapper|theme|sr|d|m|p|w|h)-",
        )
        .is_match(text)
}

fn is_json_shape(text: &str) -> bool {
    (text.starts_with('{') && text.ends_with('}')) || (text.starts_with('[') && text.ends_with(']'))
}

fn is_html_tag(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(&PATTERN, r"^<(?:[a-zA-Z][\w-]*|/[a-zA-Z][\w-]*|!--|!DOCTYPE)").is_match(text)
}

fn is_absolute_path(text: &str) -> bool {
    static UNIX: OnceLock<Regex> = OnceLock::new();
    static WINDOWS: OnceLock<Regex> = OnceLock::new();

    regex(&UNIX, r"^(?:/|\./|\.\./|~/)[\w@.+/-]*$").is_match(text)
        || regex(&WINDOWS, r"^[A-Za-z]:\\").is_match(text)
}

fn is_url(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(
        &PATTERN,
        r"(?i)^(?:(?:https?|ftp|wss?|file)://|mailto:|tel:|data:|www\.)\S*$",
    )
    .is_match(text)
}

fn is_property_access(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(&PATTERN, r"^[a-zA-Z_$][\w$]*(?:\??\.[a-zA-Z_$][\w$]*)+$").is_match(text)
}

fn is_function_call(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    regex(&PATTERN, r"^[a-zA-Z_$][\w$.]*\(.*\);?$").is_match(text)
}

/// Statement keywords followed by code punctuation (`const x = 1`, `import { a } from 'b'`).
///
/// Bare keywords (`return`) stay translatable.
fn has_keyword_prefix(text: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();

    regex(
        &PATTERN,
        r"^(?:import|export|const|let|var|function|return|interface|async|await|require|module\.exports)\b",
    )
    .is_match(text)
        && text.contains(|c: char| matches!(c, '=' | ';' | '{' | '}' | '(' | ')' | '\'' | '"' | '`'))
}

/// A single utility-CSS token (`md:flex`, `px-4`, `hover:bg-blue-500`).
fn is_utility_token(token: &str, allow_bare: bool) -> bool {
    static VARIANT: OnceLock<Regex> = OnceLock::new();
    static SCALE: OnceLock<Regex> = OnceLock::new();
    static BARE: OnceLock<Regex> = OnceLock::new();

    let variant = regex(
        &VARIANT,
        r"^(?:sm|md|lg|xl|2xl|hover|focus|focus-within|focus-visible|active|visited|disabled|dark|group-hover|peer-focus|first|last|odd|even|placeholder|before|after|motion-safe|motion-reduce|print|rtl|ltr):",
    );
    if let Some(found) = variant.find(token) {
        let rest = &token[found.end()..];
        return !rest.is_empty() && is_utility_token(rest, true);
    }

    regex(
        &SCALE,
        r"^-?(?:p|px|py|pt|pb|pl|pr|ps|pe|m|mx|my|mt|mb|ml|mr|ms|me|w|h|size|min-w|max-w|min-h|max-h|gap|gap-x|gap-y|space-x|space-y|text|bg|border|border-[trblxy]|rounded|rounded-[trbl]{1,2}|shadow|ring|outline|flex|grid-cols|grid-rows|col-span|row-span|col|row|items|justify|content|self|place|font|leading|tracking|z|opacity|inset|inset-x|inset-y|top|bottom|left|right|order|basis|grow|shrink|overflow|overflow-x|overflow-y|object|cursor|select|transition|duration|ease|delay|animate|translate-x|translate-y|rotate|scale|fill|stroke|divide-x|divide-y|from|via|to|decoration|underline-offset|line-clamp|aspect|whitespace|break|list|align)-[\w./\[\]%#()-]+$",
    )
    .is_match(token)
        || (allow_bare
            && regex(
                &BARE,
                r"^(?:flex|grid|hidden|block|inline|inline-block|inline-flex|table|contents|relative|absolute|fixed|sticky|static|container|truncate|underline|italic|uppercase|lowercase|capitalize|grow|shrink|shadow|rounded|border|visible|invisible|antialiased|sr-only|not-sr-only|transition)$",
            )
            .is_match(token))
}

fn is_single_utility_class(text: &str) -> bool {
    is_utility_token(text, false)
}

fn is_utility_class_list(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 2 {
        return false;
    }

    let utility = tokens
        .iter()
        .filter(|token| is_utility_token(token, true))
        .count();
    utility as f64 / tokens.len() as f64 >= UTILITY_DOMINANCE
}
