use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

use crate::types::TableSource;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("upstream returned an empty document")]
    EmptyDocument,
}

/// A single `<table>` element to be classified, plus where it was found.
#[derive(Debug, Clone, Copy)]
pub struct TableCandidate<'a> {
    pub source: TableSource,
    pub table: ElementRef<'a>,
}

/// The parsed page plus every comment block that carried table markup.
pub struct PageTables {
    document: Html,
    fragments: Vec<Html>,
    table_selector: Selector,
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // `<!-->` and `<!--->` close immediately and carry no content.
    PATTERN.get_or_init(|| Regex::new(r"(?s)<!--(?:-?>|(.*?)-->)").expect("comment pattern is valid"))
}

/// Parses `html` and recovers tables hidden in `<!-- ... -->` blocks.
pub fn locate(html: &str) -> Result<PageTables, LocateError> {
    if html.trim().is_empty() {
        return Err(LocateError::EmptyDocument);
    }

    let document = Html::parse_document(html);
    let fragments = comment_pattern()
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|inner| inner.as_str())
        .filter(|inner| inner.contains("<table"))
        .map(Html::parse_fragment)
        .collect();

    Ok(PageTables {
        document,
        fragments,
        table_selector: Selector::parse("table").expect("table selector is valid"),
    })
}

impl PageTables {
    /// Visible tables in document order, then comment tables in comment order.
    pub fn candidates(&self) -> Vec<TableCandidate<'_>> {
        let visible = self
            .document
            .select(&self.table_selector)
            .map(|table| TableCandidate {
                source: TableSource::Visible,
                table,
            });

        let recovered = self.fragments.iter().enumerate().flat_map(|(i, fragment)| {
            let tables: Vec<_> = fragment.select(&self.table_selector).collect();
            if tables.is_empty() {
                debug!("Comment fragment {} yielded no tables, skipping", i);
            }
            tables.into_iter().map(|table| TableCandidate {
                source: TableSource::Comment,
                table,
            })
        });

        let candidates: Vec<_> = visible.chain(recovered).collect();
        debug!("Located {} candidate tables", candidates.len());
        candidates
    }

    pub fn comment_fragment_count(&self) -> usize {
        self.fragments.len()
    }
}
