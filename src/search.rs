use std::time::{Duration, Instant};

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use regex::RegexBuilder;
use tracing::trace;

use crate::dataset::{ColumnKey, Record};

/// The one shared (query, column) pair driving match highlighting.
///
/// Confirming a search on any column overwrites the whole pair. There is no
/// per-column query state, so at most one column highlights at a time.
#[derive(Debug, Default)]
pub struct SearchSession {
    query: String,
    column: Option<ColumnKey>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn column(&self) -> Option<ColumnKey> {
        self.column
    }
}

/// What the dropdown host should do after a confirm style action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropdownDirective {
    Close,
    StayOpen,
}

/// Free-text search behavior for a single column.
///
/// The session is passed in explicitly rather than captured, so the behavior
/// can be driven in isolation (and from tests) without a live UI.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSearch {
    key: ColumnKey,
}

/// Build the search behavior for one column.
pub fn column_search(key: ColumnKey) -> ColumnSearch {
    ColumnSearch { key }
}

impl ColumnSearch {
    /// Confirm the dropdown draft: the first draft entry (or empty) becomes
    /// the session query and this column becomes the searched column. The
    /// dropdown closes.
    pub fn confirm(&self, session: &mut SearchSession, draft: &[String]) -> DropdownDirective {
        session.query = draft.first().cloned().unwrap_or_default();
        session.column = Some(self.key);
        trace!(
            "Search confirmed: column {:?}, query \"{}\"",
            self.key, session.query
        );
        DropdownDirective::Close
    }

    /// Same state change as confirm, but the dropdown stays open. This is the
    /// third ("filter") action of the dropdown.
    pub fn apply(&self, session: &mut SearchSession, draft: &[String]) -> DropdownDirective {
        self.confirm(session, draft);
        DropdownDirective::StayOpen
    }

    /// Reset the filter through the host supplied clear capability and blank
    /// the query. Without the capability this is a no-op.
    ///
    /// The searched column marker is deliberately left in place. The source
    /// behavior never cleared it on reset, and with an empty query nothing
    /// highlights anyway, so the asymmetry is kept as-is.
    pub fn reset(&self, session: &mut SearchSession, clear_filters: Option<&mut dyn FnMut()>) {
        if let Some(clear) = clear_filters {
            clear();
            session.query.clear();
            trace!("Search reset on column {:?}", self.key);
        }
    }

    /// Case-insensitive substring test of the filter value against this
    /// column's field. A missing field never matches.
    pub fn matches(&self, value: &str, record: &Record) -> bool {
        match record.field(self.key) {
            Some(field) => field.to_lowercase().contains(&value.to_lowercase()),
            None => false,
        }
    }

    /// Filter funnel marker next to the column title.
    pub fn icon(&self, filtered: bool) -> Span<'static> {
        if filtered {
            Span::styled("▼", Style::new().fg(Color::Cyan))
        } else {
            Span::raw("▽")
        }
    }

    /// Render a cell for this column. Only the searched column highlights,
    /// and only while the query is non-empty. Missing text renders empty.
    pub fn render_cell(&self, session: &SearchSession, text: Option<&str>) -> Line<'static> {
        let text = text.unwrap_or("");
        if session.column != Some(self.key) || session.query.is_empty() {
            return Line::from(text.to_string());
        }
        highlight_matches(text, &session.query)
    }
}

/// Style every case-insensitive occurrence of `query` in `text`. The query is
/// taken literally; regex metacharacters are escaped before matching.
pub fn highlight_matches(text: &str, query: &str) -> Line<'static> {
    let re = match RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re,
        Err(_) => return Line::from(text.to_string()),
    };

    let mark = Style::new().fg(Color::Black).bg(Color::Yellow);
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            spans.push(Span::raw(text[last..m.start()].to_string()));
        }
        spans.push(Span::styled(m.as_str().to_string(), mark));
        last = m.end();
    }
    if last < text.len() {
        spans.push(Span::raw(text[last..].to_string()));
    }
    Line::from(spans)
}

/// Deferred focus for a freshly opened dropdown.
///
/// An explicit timer polled from the event loop instead of a fire-and-forget
/// callback; if the dropdown is gone before the timer is consumed, nothing
/// happens.
#[derive(Debug)]
pub struct FocusTimer {
    due: Instant,
}

impl FocusTimer {
    pub fn after(delay: Duration) -> Self {
        FocusTimer {
            due: Instant::now() + delay,
        }
    }

    pub fn ready(&self) -> bool {
        Instant::now() >= self.due
    }
}

/// Dropdown visibility hook: going from hidden to visible schedules exactly
/// one focus action, going from visible to hidden schedules none.
pub fn on_dropdown_visibility(visible: bool, delay: Duration) -> Option<FocusTimer> {
    if visible {
        Some(FocusTimer::after(delay))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_roster;

    fn record(json: &str) -> Record {
        parse_roster(json).unwrap().remove(0)
    }

    fn faker() -> Record {
        record(r#"[{"team": "T1", "name": "Faker", "season": "2022夏"}]"#)
    }

    fn plain_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn confirm_sets_query_and_column() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Name);
        let directive = search.confirm(&mut session, &["ake".to_string()]);
        assert_eq!(directive, DropdownDirective::Close);
        assert_eq!(session.query(), "ake");
        assert_eq!(session.column(), Some(ColumnKey::Name));
    }

    #[test]
    fn confirm_overwrites_previous_column() {
        let mut session = SearchSession::new();
        column_search(ColumnKey::Name).confirm(&mut session, &["ake".to_string()]);
        column_search(ColumnKey::Team).confirm(&mut session, &["T1".to_string()]);
        assert_eq!(session.query(), "T1");
        assert_eq!(session.column(), Some(ColumnKey::Team));
    }

    #[test]
    fn confirm_with_empty_draft_blanks_query() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Name);
        search.confirm(&mut session, &["ake".to_string()]);
        search.confirm(&mut session, &[]);
        assert_eq!(session.query(), "");
        assert_eq!(session.column(), Some(ColumnKey::Name));
    }

    #[test]
    fn apply_keeps_dropdown_open() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Skill);
        let directive = search.apply(&mut session, &["运营".to_string()]);
        assert_eq!(directive, DropdownDirective::StayOpen);
        assert_eq!(session.query(), "运营");
        assert_eq!(session.column(), Some(ColumnKey::Skill));
    }

    #[test]
    fn reset_blanks_query_but_keeps_column() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Name);
        search.confirm(&mut session, &["ake".to_string()]);

        let mut cleared = false;
        let mut clear = || cleared = true;
        search.reset(&mut session, Some(&mut clear));

        assert!(cleared);
        assert_eq!(session.query(), "");
        // Intentional asymmetry: the column marker survives a reset.
        assert_eq!(session.column(), Some(ColumnKey::Name));
    }

    #[test]
    fn reset_without_clear_capability_is_noop() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Name);
        search.confirm(&mut session, &["ake".to_string()]);
        search.reset(&mut session, None);
        assert_eq!(session.query(), "ake");
        assert_eq!(session.column(), Some(ColumnKey::Name));
    }

    #[test]
    fn predicate_is_case_insensitive_substring() {
        let r = faker();
        let search = column_search(ColumnKey::Name);
        assert!(search.matches("ake", &r));
        assert!(search.matches("FAKER", &r));
        assert!(!search.matches("so", &r));
    }

    #[test]
    fn predicate_missing_field_is_false() {
        let r = faker(); // no role in this record
        let search = column_search(ColumnKey::Role);
        assert!(!search.matches("中单", &r));
        assert!(!search.matches("", &r));
    }

    #[test]
    fn render_cell_inactive_column_is_plain() {
        let mut session = SearchSession::new();
        column_search(ColumnKey::Name).confirm(&mut session, &["ake".to_string()]);

        let other = column_search(ColumnKey::Team);
        let line = other.render_cell(&session, Some("Faker"));
        assert_eq!(line.spans.len(), 1);
        assert_eq!(plain_text(&line), "Faker");
    }

    #[test]
    fn render_cell_highlights_every_occurrence() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Name);
        search.confirm(&mut session, &["an".to_string()]);

        let line = search.render_cell(&session, Some("Anana"));
        // "An" + "an" marked, "a" plain
        let marked: Vec<&str> = line
            .spans
            .iter()
            .filter(|s| s.style.bg == Some(Color::Yellow))
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(marked, vec!["An", "an"]);
        assert_eq!(plain_text(&line), "Anana");
    }

    #[test]
    fn render_cell_empty_query_is_plain() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Name);
        search.confirm(&mut session, &["ake".to_string()]);

        let mut clear = || {};
        search.reset(&mut session, Some(&mut clear));

        let line = search.render_cell(&session, Some("Faker"));
        assert_eq!(line.spans.len(), 1);
        assert_eq!(plain_text(&line), "Faker");
    }

    #[test]
    fn render_cell_missing_text_is_empty() {
        let mut session = SearchSession::new();
        let search = column_search(ColumnKey::Tag1);
        search.confirm(&mut session, &["carry".to_string()]);
        let line = search.render_cell(&session, None);
        assert_eq!(plain_text(&line), "");
    }

    #[test]
    fn highlight_escapes_regex_metacharacters() {
        let line = highlight_matches("a+b a+b", "a+b");
        let marked: Vec<&str> = line
            .spans
            .iter()
            .filter(|s| s.style.bg == Some(Color::Yellow))
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(marked, vec!["a+b", "a+b"]);
    }

    #[test]
    fn highlight_works_on_cjk_text() {
        let line = highlight_matches("运营指挥", "指挥");
        assert_eq!(plain_text(&line), "运营指挥");
        let marked: Vec<&str> = line
            .spans
            .iter()
            .filter(|s| s.style.bg == Some(Color::Yellow))
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(marked, vec!["指挥"]);
    }

    #[test]
    fn visibility_hook_schedules_exactly_once() {
        let timer = on_dropdown_visibility(true, Duration::ZERO);
        assert!(timer.is_some());
        assert!(timer.unwrap().ready());

        assert!(on_dropdown_visibility(false, Duration::ZERO).is_none());
    }

    #[test]
    fn icon_reflects_filter_state() {
        let search = column_search(ColumnKey::Team);
        assert_ne!(search.icon(true).style, search.icon(false).style);
    }
}
