//! Markdown → HTML rendering via `pulldown-cmark`.
//!
//! Rendering is a pure function of the input bytes, so rebuilding an
//! unchanged document always yields identical output.

use anyhow::{Context, Result};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;

/// Renders one document's source bytes into HTML bytes.
pub trait Render: Send + Sync {
    fn render(&self, source: &[u8]) -> Result<Vec<u8>>;
}

/// Options for markdown rendering
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Enable tables extension
    pub tables: bool,
    /// Enable footnotes extension
    pub footnotes: bool,
    /// Enable strikethrough extension
    pub strikethrough: bool,
    /// Enable task lists extension
    pub task_lists: bool,
    /// Enable heading attributes extension (e.g., `# Heading {#custom-id}`)
    pub heading_attributes: bool,
    /// Drop a leading `---` YAML front matter block from the output
    pub front_matter: bool,
    /// Give headings without an explicit id one derived from their text
    pub heading_ids: bool,
    /// Open links with a URL scheme in a new tab
    pub external_links_blank: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            heading_attributes: true,
            front_matter: true,
            heading_ids: true,
            external_links_blank: true,
        }
    }
}

impl MarkdownOptions {
    /// Convert to pulldown-cmark Options
    fn to_pulldown_options(&self) -> Options {
        let mut opts = Options::empty();
        if self.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            opts.insert(Options::ENABLE_TASKLISTS);
        }
        if self.heading_attributes {
            opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        if self.front_matter {
            opts.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
        }
        opts
    }
}

/// The renderer used for every document.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: MarkdownOptions,
}

impl MarkdownRenderer {
    /// Render markdown text to an HTML fragment.
    pub fn render_str(&self, markdown: &str) -> String {
        let markdown = markdown.strip_prefix('\u{feff}').unwrap_or(markdown);
        let parser = Parser::new_ext(markdown, self.options.to_pulldown_options());

        let mut events: Vec<Event> = strip_metadata(parser).collect();
        if self.options.heading_ids {
            assign_heading_ids(&mut events);
        }
        if self.options.external_links_blank {
            open_external_links_blank(&mut events);
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

impl Render for MarkdownRenderer {
    fn render(&self, source: &[u8]) -> Result<Vec<u8>> {
        let markdown = std::str::from_utf8(source).context("source is not valid UTF-8")?;
        Ok(self.render_str(markdown).into_bytes())
    }
}

/// Drop front matter blocks and everything inside them.
fn strip_metadata<'a>(events: impl Iterator<Item = Event<'a>>) -> impl Iterator<Item = Event<'a>> {
    let mut inside = false;
    events.filter(move |event| match event {
        Event::Start(Tag::MetadataBlock(_)) => {
            inside = true;
            false
        }
        Event::End(TagEnd::MetadataBlock(_)) => {
            inside = false;
            false
        }
        _ => !inside,
    })
}

/// Set `id` on headings that lack one. Duplicates get `-1`, `-2`, … suffixes.
fn assign_heading_ids(events: &mut [Event<'_>]) {
    // Explicit ids claim their slot first so generated ones steer clear.
    let mut seen: FxHashMap<String, usize> = FxHashMap::default();
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            seen.insert(id.to_string(), 0);
        }
    }

    for i in 0..events.len() {
        if !matches!(events[i], Event::Start(Tag::Heading { id: None, .. })) {
            continue;
        }

        let text = heading_text(&events[i + 1..]);
        let base = slugify(&text);
        let slug = match seen.get_mut(&base) {
            None => base.clone(),
            Some(count) => {
                *count += 1;
                format!("{base}-{count}")
            }
        };
        seen.entry(base).or_insert(0);
        seen.insert(slug.clone(), 0);

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
    }
}

/// Plain text of a heading, from the events following its start tag.
fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// Lowercase, alphanumerics kept, runs of anything else collapsed to `-`.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

/// Rewrite opening tags of links with a URL scheme to carry `target="_blank"`.
fn open_external_links_blank(events: &mut [Event<'_>]) {
    for event in events.iter_mut() {
        let Event::Start(Tag::Link {
            dest_url, title, ..
        }) = event
        else {
            continue;
        };
        if !is_external_link(dest_url) {
            continue;
        }

        let mut tag = format!("<a href=\"{}\"", escape_attr(dest_url));
        if !title.is_empty() {
            tag.push_str(&format!(" title=\"{}\"", escape_attr(title)));
        }
        tag.push_str(" target=\"_blank\" rel=\"noopener noreferrer\">");
        *event = Event::InlineHtml(CowStr::from(tag));
    }
}

/// Check if a link has a URL scheme like `https:` or `mailto:`
fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
