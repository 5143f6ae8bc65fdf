//! DOM query helpers over the `scraper` parse tree

use std::collections::VecDeque;

use scraper::{ElementRef, Selector};

/// Tags whose text is never part of what a user sees
const INVISIBLE: &[&str] = &["script", "style", "noscript", "template"];

/// Number of leading `d` characters compared when matching an icon glyph
const GLYPH_PREFIX: usize = 50;

/// Query operations the extractors need from an HTML element
///
/// Invalid selectors behave like selectors that match nothing.
pub trait DomNode<'a>: Sized {
    /// Select the first descendant matching the CSS selector
    fn select_one(&self, selector: &str) -> Option<Self>;

    /// Select all descendants matching the CSS selector
    fn select_all(&self, selector: &str) -> Vec<Self>;

    /// Get the value of an HTML attribute
    fn attr(&self, name: &str) -> Option<&'a str>;

    /// Lower-case tag name
    fn tag(&self) -> &'a str;

    /// Visible text, one space between text nodes, whitespace collapsed
    fn joined_text(&self) -> String;

    /// Visible text, one trimmed non-empty line per text node
    fn text_lines(&self) -> Vec<String>;
}

impl<'a> DomNode<'a> for ElementRef<'a> {
    fn select_one(&self, selector: &str) -> Option<Self> {
        let selector = Selector::parse(selector).ok()?;
        self.select(&selector).next()
    }

    fn select_all(&self, selector: &str) -> Vec<Self> {
        match Selector::parse(selector) {
            Ok(selector) => self.select(&selector).collect(),
            Err(_) => vec![],
        }
    }

    fn attr(&self, name: &str) -> Option<&'a str> {
        self.value().attr(name)
    }

    fn tag(&self) -> &'a str {
        self.value().name()
    }

    fn joined_text(&self) -> String {
        collapse_whitespace(&self.text_lines().join(" "))
    }

    fn text_lines(&self) -> Vec<String> {
        self.descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let parent = node.parent().and_then(ElementRef::wrap)?;
                if INVISIBLE.contains(&parent.value().name()) {
                    return None;
                }
                let line = text.trim();
                (!line.is_empty()).then(|| line.to_string())
            })
            .collect()
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bounded neighbourhood of a marker element
///
/// The search climbs at most `max_depth` ancestors of the marker. Inside each
/// ancestor it walks at most `max_nodes` descendant elements breadth-first.
/// Ancestors are tried innermost first and the first lookup that returns a
/// value ends the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorWindow {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for AncestorWindow {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_nodes: 200,
        }
    }
}

impl AncestorWindow {
    pub fn new(max_depth: usize, max_nodes: usize) -> Self {
        Self {
            max_depth,
            max_nodes,
        }
    }

    /// Ancestors of `marker`, innermost first, at most `max_depth` of them
    pub fn ancestors<'a>(&self, marker: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        marker
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(self.max_depth)
            .collect()
    }

    /// Descendant elements of `container` in breadth-first order
    pub fn breadth_first<'a>(&self, container: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        let mut visited = Vec::new();
        let mut queue: VecDeque<ElementRef<'a>> =
            container.children().filter_map(ElementRef::wrap).collect();

        while let Some(element) = queue.pop_front() {
            if visited.len() >= self.max_nodes {
                break;
            }
            queue.extend(element.children().filter_map(ElementRef::wrap));
            visited.push(element);
        }

        visited
    }

    /// Probe each ancestor container with its breadth-first descendants
    pub fn search<'a, T>(
        &self,
        marker: ElementRef<'a>,
        mut lookup: impl FnMut(ElementRef<'a>, &[ElementRef<'a>]) -> Option<T>,
    ) -> Option<T> {
        for container in self.ancestors(marker) {
            let nodes = self.breadth_first(container);
            if let Some(found) = lookup(container, &nodes) {
                return Some(found);
            }
        }
        None
    }
}

/// SVG `<path>` elements whose `d` attribute matches an icon signature
///
/// Whitespace is ignored and only the leading characters are compared, so
/// minor trailing differences between icon versions still match.
pub fn find_glyphs<'a>(root: ElementRef<'a>, signature: &str) -> Vec<ElementRef<'a>> {
    let wanted = glyph_prefix(signature);
    if wanted.is_empty() {
        return vec![];
    }
    root.select_all("path[d]")
        .into_iter()
        .filter(|path| {
            path.attr("d")
                .is_some_and(|d| glyph_prefix(d) == wanted)
        })
        .collect()
}

fn glyph_prefix(d: &str) -> String {
    d.chars()
        .filter(|c| !c.is_whitespace())
        .take(GLYPH_PREFIX)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_text_lines_skip_scripts() {
        let html = Html::parse_document(
            "<div><p> Hello </p><script>var x = 1;</script><span>World</span></div>",
        );
        let lines = html.root_element().text_lines();
        assert_eq!(lines, vec!["Hello", "World"]);
    }

    #[test]
    fn test_window_limits_depth() {
        let html = Html::parse_document(
            "<div id='outer'><div id='mid'><div id='inner'><i id='m'></i></div></div></div>",
        );
        let marker = html.root_element().select_one("#m").unwrap();
        let ancestors = AncestorWindow::new(2, 10).ancestors(marker);
        let ids: Vec<_> = ancestors.iter().filter_map(|e| e.attr("id")).collect();
        assert_eq!(ids, vec!["inner", "mid"]);
    }

    #[test]
    fn test_breadth_first_respects_budget() {
        let html = Html::parse_document(
            "<ul id='list'><li>1</li><li>2</li><li>3</li><li>4</li></ul>",
        );
        let list = html.root_element().select_one("#list").unwrap();
        assert_eq!(AncestorWindow::new(1, 3).breadth_first(list).len(), 3);
    }

    #[test]
    fn test_glyph_match_ignores_whitespace() {
        let html = Html::parse_document(
            "<svg><path d='M12 4a8 8 0 1 0 8 8 8 8 0 0 0-8-8z'></path></svg>",
        );
        let found = find_glyphs(html.root_element(), "M12 4a8 8 0 1 0  8 8 8 8 0 0 0-8-8z");
        assert_eq!(found.len(), 1);
    }
}
