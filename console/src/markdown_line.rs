//! Per-line inline markdown styling for chat and reasoning output.
//!
//! The renderer flushes output line by line, so styling is applied to one
//! completed line at a time: inline emphasis, code spans, links, headings,
//! list bullets, block quotes, and rules. Anything block-shaped that only
//! makes sense across lines (fenced code bodies) is passed through dim.

use crossterm::style::Attribute;
use crossterm::style::Color;
use crossterm::style::ResetColor;
use crossterm::style::SetAttribute;
use crossterm::style::SetForegroundColor;
use pulldown_cmark::Event;
use pulldown_cmark::Options;
use pulldown_cmark::Parser;
use pulldown_cmark::Tag;
use pulldown_cmark::TagEnd;

use crate::terminal::ansi;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ActiveStyle {
    bold: bool,
    italic: bool,
    dim: bool,
    underline: bool,
    code: bool,
}

/// Style one completed line of markdown-ish text for the terminal.
///
/// With `color` off the text transformations (bullets, numbering, link
/// targets, rules) still apply but no escape sequences are emitted.
pub(crate) fn style_markdown_line(line: &str, width: u16, color: bool) -> String {
    if line.trim_start().starts_with("```") {
        return styled_span(line, ActiveStyle { dim: true, ..ActiveStyle::default() }, color);
    }

    let mut out = String::new();
    let mut style = ActiveStyle::default();
    // (ordered start, next index) per open list, innermost last.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut link_dest: Option<String> = None;
    let mut link_text = String::new();

    for event in Parser::new_ext(line, Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(tag) => match tag {
                Tag::Strong => style.bold = true,
                Tag::Emphasis => style.italic = true,
                Tag::Strikethrough => style.dim = true,
                Tag::Heading { .. } => {
                    style.bold = true;
                    style.underline = true;
                }
                Tag::BlockQuote => {
                    out.push_str(&styled_span(
                        "▌ ",
                        ActiveStyle { dim: true, ..ActiveStyle::default() },
                        color,
                    ));
                }
                Tag::List(start) => lists.push(start),
                Tag::Item => {
                    if lists.len() > 1 {
                        out.push_str(&"  ".repeat(lists.len() - 1));
                    }
                    match lists.last_mut() {
                        Some(Some(next)) => {
                            out.push_str(&format!("{next}. "));
                            *next += 1;
                        }
                        _ => out.push_str("• "),
                    }
                }
                Tag::Link { dest_url, .. } => {
                    style.underline = true;
                    link_dest = Some(dest_url.to_string());
                    link_text.clear();
                }
                _ => {}
            },
            Event::End(tag) => match tag {
                TagEnd::Strong => style.bold = false,
                TagEnd::Emphasis => style.italic = false,
                TagEnd::Strikethrough => style.dim = false,
                TagEnd::Heading(_) => {
                    style.bold = false;
                    style.underline = false;
                }
                TagEnd::List(_) => {
                    lists.pop();
                }
                TagEnd::Link => {
                    style.underline = false;
                    if let Some(dest) = link_dest.take() {
                        if !dest.is_empty() && dest != link_text {
                            out.push_str(&styled_span(
                                &format!(" ({dest})"),
                                ActiveStyle { dim: true, ..ActiveStyle::default() },
                                color,
                            ));
                        }
                    }
                }
                _ => {}
            },
            Event::Text(text) => {
                if link_dest.is_some() {
                    link_text.push_str(&text);
                }
                out.push_str(&styled_span(&text, style, color));
            }
            Event::Code(text) => {
                let code = ActiveStyle { code: true, ..style };
                out.push_str(&styled_span(&text, code, color));
            }
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::Rule => out.push_str(&styled_span(
                &"─".repeat(usize::from(width.max(1))),
                ActiveStyle { dim: true, ..ActiveStyle::default() },
                color,
            )),
            _ => {}
        }
    }

    out
}

fn styled_span(text: &str, style: ActiveStyle, color: bool) -> String {
    if !color || style == ActiveStyle::default() || text.is_empty() {
        return text.to_string();
    }

    let mut out = String::new();
    if style.bold {
        out.push_str(&ansi(SetAttribute(Attribute::Bold)));
    }
    if style.italic {
        out.push_str(&ansi(SetAttribute(Attribute::Italic)));
    }
    if style.dim {
        out.push_str(&ansi(SetAttribute(Attribute::Dim)));
    }
    if style.underline {
        out.push_str(&ansi(SetAttribute(Attribute::Underlined)));
    }
    if style.code {
        out.push_str(&ansi(SetForegroundColor(Color::Cyan)));
    }
    out.push_str(text);
    if style.code {
        out.push_str(&ansi(ResetColor));
    }
    out.push_str(&ansi(SetAttribute(Attribute::Reset)));
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plain_mode_applies_text_transforms_only() {
        assert_eq!(style_markdown_line("- item one", 40, false), "• item one");
        assert_eq!(style_markdown_line("3. third", 40, false), "3. third");
        assert_eq!(style_markdown_line("# Title", 40, false), "Title");
        assert_eq!(
            style_markdown_line("plain **bold** text", 40, false),
            "plain bold text"
        );
    }

    #[test]
    fn rule_fills_the_width() {
        assert_eq!(style_markdown_line("---", 8, false), "─".repeat(8));
    }

    #[test]
    fn link_target_is_appended() {
        assert_eq!(
            style_markdown_line("see [docs](https://example.com)", 40, false),
            "see docs (https://example.com)"
        );
    }

    #[test]
    fn bold_emits_ansi_when_color_is_on() {
        let styled = style_markdown_line("**hi**", 40, true);
        assert!(styled.contains(&ansi(SetAttribute(Attribute::Bold))));
        assert!(styled.contains("hi"));
    }

    #[test]
    fn code_span_is_colored() {
        let styled = style_markdown_line("run `ls`", 40, true);
        assert!(styled.contains(&ansi(SetForegroundColor(Color::Cyan))));
    }

    #[test]
    fn fence_line_passes_through() {
        assert_eq!(style_markdown_line("```rust", 40, false), "```rust");
    }
}
