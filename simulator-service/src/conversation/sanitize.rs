//! Markdown stripping for model output shown in the chat transcript.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const BULLET: &str = "•";

// Code spans are parked behind private-use markers while the other passes run.
const CODE_OPEN: char = '\u{E000}';
const CODE_CLOSE: char = '\u{E001}';

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^\s)]*)(\)+)").expect("valid link regex"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]*)`").expect("valid code regex"));
static CODE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").expect("valid placeholder regex"));
static BOLD_STARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^\n]+?)\*\*").expect("valid bold regex"));
static BOLD_UNDERSCORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([^\n]+?)__").expect("valid bold regex"));
static ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid italic regex"));
// Underscore emphasis must not touch snake_case words.
static ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w])_([^_\n]+)_([^\w]|$)").expect("valid italic regex")
});
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+").expect("valid heading regex"));
static BULLET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*+]\s+").expect("valid bullet regex"));
static ORDERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)]\s+").expect("valid ordered list regex"));
static HORIZONTAL_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\S\n]+").expect("valid whitespace regex"));

/// Strip lightweight markdown from model output.
///
/// Emphasis, inline code, links (text kept), headings and bullet markers are
/// removed; bullets become `•`. Whitespace runs collapse to one space, list
/// items stay on their own line, wrapped prose lines are joined and blank-line
/// paragraph breaks are kept as a single blank line.
pub fn sanitize(raw: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = clean_line(line);
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(join_block(&current));
                current.clear();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        paragraphs.push(join_block(&current));
    }

    paragraphs.join("\n\n")
}

fn clean_line(line: &str) -> String {
    let line = HORIZONTAL_SPACE.replace_all(line.trim(), " ");
    let line = HEADING.replace(&line, "");
    let line = BULLET_MARKER.replace(&line, format!("{BULLET} ").as_str());

    let mut code_spans = Vec::new();
    let line = stash_code_spans(&line, &mut code_spans);
    let line = strip_links(&line);
    let line = BOLD_STARS.replace_all(&line, "$1");
    let line = BOLD_UNDERSCORES.replace_all(&line, "$1");
    let line = ITALIC_STAR.replace_all(&line, "$1");
    let line = strip_underscore_emphasis(&line);
    let line = restore_code_spans(&line, &code_spans);

    HORIZONTAL_SPACE
        .replace_all(line.trim(), " ")
        .into_owned()
}

fn stash_code_spans(line: &str, spans: &mut Vec<String>) -> String {
    INLINE_CODE
        .replace_all(line, |caps: &Captures| {
            spans.push(caps[1].to_string());
            format!("{CODE_OPEN}{}{CODE_CLOSE}", spans.len() - 1)
        })
        .into_owned()
}

fn restore_code_spans(line: &str, spans: &[String]) -> String {
    CODE_PLACEHOLDER
        .replace_all(line, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| spans.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

/// Replace links with their text. Closing parens after a link belong to the
/// URL unless they close a paren opened earlier on the line, so `[t](u))`
/// and `[t](https://x/a_(b))` disappear while `(see [t](u))` keeps its `)`.
fn strip_links(line: &str) -> String {
    LINK.replace_all(line, |caps: &Captures| {
        let start = caps.get(0).map_or(0, |m| m.start());
        let url_opens = caps[2].matches('(').count();
        let extra = caps[3].len().saturating_sub(1 + url_opens);
        let kept = extra.min(unclosed_parens(&line[..start]));
        format!("{}{}", &caps[1], ")".repeat(kept))
    })
    .into_owned()
}

fn unclosed_parens(text: &str) -> usize {
    text.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth.saturating_sub(1),
        _ => depth,
    })
}

// Adjacent matches share their boundary character, so repeat until stable.
// Every replacement removes two characters, which bounds the loop.
fn strip_underscore_emphasis(line: &str) -> String {
    let mut text = line.to_string();
    loop {
        let next = ITALIC_UNDERSCORE.replace_all(&text, "$1$2$3").into_owned();
        if next == text {
            return text;
        }
        text = next;
    }
}

fn is_list_item(line: &str) -> bool {
    line.starts_with(BULLET) || ORDERED_MARKER.is_match(line)
}

fn join_block(lines: &[String]) -> String {
    let mut block = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            let separator = if is_list_item(line) || is_list_item(&lines[i - 1]) {
                "\n"
            } else {
                " "
            };
            block.push_str(separator);
        }
        block.push_str(line);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_inline_markup() {
        assert_eq!(
            sanitize("**bold** and _ital_ and `code` and [link](http://x))"),
            "bold and ital and code and link"
        );
    }

    #[test]
    fn converts_bullets_to_glyph_lines() {
        assert_eq!(sanitize("- a\n- b"), "• a\n• b");
        assert_eq!(sanitize("* one\n+ two"), "• one\n• two");
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n\n \t"), "");
    }

    #[test]
    fn removes_heading_markers() {
        assert_eq!(sanitize("## Next steps\nKeep going"), "Next steps Keep going");
    }

    #[test]
    fn preserves_paragraph_breaks() {
        assert_eq!(
            sanitize("First   paragraph\nwraps here.\n\n\n\nSecond\tone."),
            "First paragraph wraps here.\n\nSecond one."
        );
    }

    #[test]
    fn keeps_snake_case_words() {
        assert_eq!(sanitize("use file_name_here please"), "use file_name_here please");
    }

    #[test]
    fn handles_adjacent_underscore_emphasis() {
        assert_eq!(sanitize("_a_ _b_"), "a b");
    }

    #[test]
    fn link_with_parentheses_in_url() {
        assert_eq!(
            sanitize("see [Rust](https://en.wikipedia.org/wiki/Rust_(language)) now"),
            "see Rust now"
        );
    }

    #[test]
    fn link_inside_parenthetical_keeps_closing_paren() {
        assert_eq!(sanitize("(see [docs](http://x))"), "(see docs)");
        assert_eq!(sanitize("(a ([b](http://x)))"), "(a (b))");
    }

    #[test]
    fn code_spans_are_not_treated_as_emphasis() {
        assert_eq!(sanitize("run `a*b*c` now"), "run a*b*c now");
        assert_eq!(sanitize("use `__init__` and `[a](b)`"), "use __init__ and [a](b)");
    }

    #[test]
    fn underscore_bold_and_star_italic() {
        assert_eq!(sanitize("__strong__ and *soft*"), "strong and soft");
    }

    #[test]
    fn ordered_list_items_stay_on_their_own_lines() {
        assert_eq!(
            sanitize("Steps:\n1. Draft\n2. Review"),
            "Steps:\n1. Draft\n2. Review"
        );
    }

    #[test]
    fn unbalanced_markers_are_left_alone() {
        assert_eq!(sanitize("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(sanitize("a lone ` tick"), "a lone ` tick");
    }
}
