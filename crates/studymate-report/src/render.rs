//! Sanitized markdown rendering.
//!
//! Study plans and tutor explanations come back from the model as markdown
//! and are rendered here before they reach a page. Sanitizing happens on the
//! parser's event stream rather than on the produced HTML:
//!
//! - raw HTML blocks and inline HTML are emitted as escaped text
//! - link and image destinations are kept only for `http`, `https`,
//!   `mailto` and scheme-less (relative) URLs; anything else becomes `#`

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

/// URL schemes allowed in link and image destinations.
const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Renders untrusted markdown into HTML that is safe to embed.
///
/// # Examples
///
/// ```
/// use studymate_report::render_markdown;
///
/// let html = render_markdown("**Week 1:** algebra <script>alert(1)</script>");
/// assert!(html.contains("<strong>Week 1:</strong>"));
/// assert!(!html.contains("<script>"));
/// ```
#[must_use]
pub fn render_markdown(input: &str) -> String {
    let parser = Parser::new_ext(input, build_options()).map(sanitize_event);

    let mut html_output = String::with_capacity(input.len() * 2);
    html::push_html(&mut html_output, parser);
    html_output
}

fn build_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: sanitize_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: sanitize_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn sanitize_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&url) {
        url
    } else {
        CowStr::Borrowed("#")
    }
}

/// A URL is safe when it has no scheme or an allowed one.
///
/// Browsers ignore ASCII whitespace and control characters inside a scheme,
/// so those are stripped before the scheme is inspected.
fn is_safe_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect();

    let Some(colon) = compact.find(':') else {
        return true;
    };

    // A ':' after the first '/', '?' or '#' belongs to a path, query or fragment.
    if compact[..colon].contains(['/', '?', '#']) {
        return true;
    }

    let scheme = compact[..colon].to_ascii_lowercase();
    ALLOWED_SCHEMES.contains(&scheme.as_str())
}
