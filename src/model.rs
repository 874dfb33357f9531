use std::collections::HashMap;
use std::time::{Duration, Instant};

use arboard::Clipboard;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tracing::{debug, trace};

use crate::columns::{ColumnSpec, Fixed, FilterKind, LeafColumn, flatten, roster_columns};
use crate::dataset::{ColumnKey, Record};
use crate::domain::{HELP_TEXT, Message, RosterError, ViewerConfig};
use crate::inputter::{InputResult, Inputter};
use crate::search::{
    DropdownDirective, FocusTimer, SearchSession, column_search, on_dropdown_visibility,
};
use crate::ui::{CMDLINE_HEIGHT, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    FILTER,
    POPUP,
}

/// Committed per-column filter state, the thing the grid consults when it
/// recomputes visible rows. Distinct from the search session, which only
/// drives highlighting.
#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
    Text(String),
    Values(Vec<String>),
}

enum DropdownKind {
    Search,
    Enumerated {
        values: &'static [&'static str],
        selected: Vec<String>,
        curser: usize,
    },
}

struct Dropdown {
    leaf_idx: usize,
    kind: DropdownKind,
    focused: bool,
}

/// One visible column, ready to render.
#[derive(Clone)]
pub struct ColumnView {
    pub group: String,
    pub title: Line<'static>,
    pub width: usize,
    pub fixed: Fixed,
    pub data: Vec<Line<'static>>,
}

#[derive(Clone)]
pub enum DropdownView {
    Search {
        title: String,
        input: InputResult,
        focused: bool,
    },
    Enumerated {
        title: String,
        entries: Vec<(String, bool)>,
        curser: usize,
    },
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_height = ui_height
            .saturating_sub(TABLE_HEADER_HEIGHT)
            .saturating_sub(CMDLINE_HEIGHT)
            .max(1);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Snapshot of everything the ui needs to draw a frame.
pub struct UIData {
    pub name: String,
    pub columns: Vec<ColumnView>,
    pub nrows: usize,
    pub total_rows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub selected_key: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub dropdown: Option<DropdownView>,
    pub layout: UILayout,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            columns: Vec::new(),
            nrows: 0,
            total_rows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            selected_key: String::new(),
            show_popup: false,
            popup_message: String::new(),
            dropdown: None,
            layout: UILayout::default(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: ViewerConfig,
    records: Vec<Record>,
    leaves: Vec<(String, LeafColumn)>,
    session: SearchSession,
    committed: HashMap<ColumnKey, FilterValue>,
    rows: Vec<usize>,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    curser_row: usize,
    offset_row: usize,
    curser_column: usize,
    offset_column: usize,
    visible_leaves: Vec<usize>,
    dropdown: Option<Dropdown>,
    focus_timer: Option<FocusTimer>,
    input: Inputter,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn new(config: ViewerConfig, records: Vec<Record>) -> Result<Self, RosterError> {
        if records.is_empty() {
            return Err(RosterError::LoadingFailed("Empty roster!".into()));
        }
        let specs: Vec<ColumnSpec> = roster_columns();
        let leaves = flatten(&specs);
        let rows: Vec<usize> = (0..records.len()).collect();

        let mut model = Self {
            config,
            records,
            leaves,
            session: SearchSession::new(),
            committed: HashMap::new(),
            rows,
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            curser_row: 0,
            offset_row: 0,
            curser_column: 0,
            offset_column: 0,
            visible_leaves: Vec::new(),
            dropdown: None,
            focus_timer: None,
            input: Inputter::default(),
            clipboard: Clipboard::new().ok(),
            uilayout: UILayout::from_values(80, 24),
            uidata: UIData::empty(),
            status_message: "Loaded roster".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.update_table_data();
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    /// While a dropdown is open all keys are routed to the model unmapped.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::FILTER
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), RosterError> {
        // The focus timer is paced by the poll loop: once due, the dropdown
        // input takes the keyboard. A timer outliving its dropdown fires into
        // nothing.
        if self.focus_timer.as_ref().is_some_and(|t| t.ready()) {
            self.focus_timer = None;
            if let Some(dropdown) = &mut self.dropdown {
                dropdown.focused = true;
                trace!("Dropdown input focused");
                self.update_table_data();
            }
        }

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::MovePageUp => self.move_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => self.move_selection_down(self.uilayout.table_height),
                    Message::MoveBeginning => self.move_selection_beginning(),
                    Message::MoveEnd => self.move_selection_end(),
                    Message::OpenFilter => self.open_filter(),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit => {}
                    Message::RawKey(_) => {}
                },
                Modus::FILTER => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::RawKey(key) => self.dropdown_input(key),
                    _ => {}
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.close_popup(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => {}
                },
            }
        }
        Ok(())
    }

    // -------------------- filtering ---------------------- //

    fn record_passes(committed: &HashMap<ColumnKey, FilterValue>, record: &Record) -> bool {
        committed.iter().all(|(key, filter)| match filter {
            FilterValue::Text(value) => column_search(*key).matches(value, record),
            FilterValue::Values(selected) => {
                FilterKind::enumerated_matches(selected, record.field(*key).as_deref())
            }
        })
    }

    /// Recompute visible rows from the committed filters, in dataset order.
    fn update_rows(&mut self) {
        self.rows = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| Self::record_passes(&self.committed, r))
            .map(|(idx, _)| idx)
            .collect();
        debug!(
            "Filters narrowed roster to {}/{} rows",
            self.rows.len(),
            self.records.len()
        );
        self.curser_row = 0;
        self.offset_row = 0;
    }

    // -------------------- dropdown ---------------------- //

    fn open_filter(&mut self) {
        if self.visible_leaves.is_empty() {
            return;
        }
        let leaf_idx = self.visible_leaves[self.curser_column];
        let leaf = &self.leaves[leaf_idx].1;
        match leaf.filter {
            FilterKind::None => {
                self.set_status_message(format!("No filter on column \"{}\"", leaf.title));
            }
            FilterKind::TextSearch => {
                self.input.clear();
                if let Some(FilterValue::Text(value)) = self.committed.get(&leaf.key) {
                    self.input.set(value);
                }
                self.dropdown = Some(Dropdown {
                    leaf_idx,
                    kind: DropdownKind::Search,
                    focused: false,
                });
                self.focus_timer = on_dropdown_visibility(
                    true,
                    Duration::from_millis(self.config.focus_delay_ms),
                );
                self.modus = Modus::FILTER;
                self.update_table_data();
            }
            FilterKind::Enumerated(values) => {
                let selected = match self.committed.get(&leaf.key) {
                    Some(FilterValue::Values(vs)) => vs.clone(),
                    _ => Vec::new(),
                };
                // Enumerated dropdowns have no text input to focus, they
                // take keys right away.
                self.dropdown = Some(Dropdown {
                    leaf_idx,
                    kind: DropdownKind::Enumerated {
                        values,
                        selected,
                        curser: 0,
                    },
                    focused: true,
                });
                self.modus = Modus::FILTER;
                self.update_table_data();
            }
        }
    }

    fn close_dropdown(&mut self) {
        self.dropdown = None;
        self.focus_timer = on_dropdown_visibility(false, Duration::ZERO);
        self.modus = Modus::TABLE;
        self.update_table_data();
    }

    fn dropdown_input(&mut self, key: KeyEvent) {
        let is_search = self
            .dropdown
            .as_ref()
            .map(|d| matches!(d.kind, DropdownKind::Search));
        match is_search {
            Some(true) => self.search_dropdown_input(key),
            Some(false) => self.enumerated_dropdown_input(key),
            None => {}
        }
    }

    fn search_dropdown_input(&mut self, key: KeyEvent) {
        let Some(dropdown) = &self.dropdown else {
            return;
        };
        let leaf = self.leaves[dropdown.leaf_idx].1.clone();
        let search = column_search(leaf.key);

        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => {
                self.close_dropdown();
            }
            (KeyCode::Enter, _) => {
                let draft = self.input.draft();
                let directive = search.confirm(&mut self.session, &draft);
                self.commit_text(leaf.key, &draft);
                if directive == DropdownDirective::Close {
                    self.close_dropdown();
                }
                self.set_status_message(format!("Found {} rows", self.rows.len()));
            }
            (KeyCode::Tab, _) => {
                // The "filter" action: same effect, dropdown stays open.
                let draft = self.input.draft();
                let directive = search.apply(&mut self.session, &draft);
                self.commit_text(leaf.key, &draft);
                if directive == DropdownDirective::Close {
                    self.close_dropdown();
                } else {
                    self.update_table_data();
                }
                self.set_status_message(format!("Found {} rows", self.rows.len()));
            }
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => {
                let committed = &mut self.committed;
                let input = &mut self.input;
                let key = leaf.key;
                let mut clear = || {
                    committed.remove(&key);
                    input.clear();
                };
                search.reset(&mut self.session, Some(&mut clear));
                self.update_rows();
                self.update_table_data();
                self.set_status_message("Filter reset".to_string());
            }
            _ => {
                if self.dropdown.as_ref().is_some_and(|d| d.focused) {
                    self.input.read(key);
                    self.update_table_data();
                }
            }
        }
    }

    fn commit_text(&mut self, key: ColumnKey, draft: &[String]) {
        match draft.first() {
            Some(value) => {
                self.committed.insert(key, FilterValue::Text(value.clone()));
            }
            None => {
                self.committed.remove(&key);
            }
        }
        self.update_rows();
        self.update_table_data();
    }

    fn enumerated_dropdown_input(&mut self, key: KeyEvent) {
        let Some(dropdown) = &mut self.dropdown else {
            return;
        };
        let leaf_key = self.leaves[dropdown.leaf_idx].1.key;
        let DropdownKind::Enumerated {
            values,
            selected,
            curser,
        } = &mut dropdown.kind
        else {
            return;
        };

        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => self.close_dropdown(),
            (KeyCode::Up, _) => {
                *curser = curser.saturating_sub(1);
                self.update_table_data();
            }
            (KeyCode::Down, _) => {
                if *curser + 1 < values.len() {
                    *curser += 1;
                }
                self.update_table_data();
            }
            (KeyCode::Char(' '), _) => {
                let value = values[*curser].to_string();
                if let Some(pos) = selected.iter().position(|v| *v == value) {
                    selected.remove(pos);
                } else {
                    selected.push(value);
                }
                self.update_table_data();
            }
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => {
                selected.clear();
                self.update_table_data();
            }
            (KeyCode::Enter, _) => {
                if selected.is_empty() {
                    self.committed.remove(&leaf_key);
                } else {
                    self.committed
                        .insert(leaf_key, FilterValue::Values(selected.clone()));
                }
                self.close_dropdown();
                self.update_rows();
                self.update_table_data();
                self.set_status_message(format!("Found {} rows", self.rows.len()));
            }
            _ => {}
        }
    }

    // -------------------- snapshot building ---------------------- //

    /// Pick the visible leaf columns: frozen-left first, then the scrollable
    /// middle from the current offset, frozen-right always at the end.
    fn visible_columns(&self) -> Vec<usize> {
        let left: Vec<usize> = self
            .leaves
            .iter()
            .enumerate()
            .filter(|(_, (_, l))| l.fixed == Fixed::Left)
            .map(|(i, _)| i)
            .collect();
        let right: Vec<usize> = self
            .leaves
            .iter()
            .enumerate()
            .filter(|(_, (_, l))| l.fixed == Fixed::Right)
            .map(|(i, _)| i)
            .collect();
        let middle: Vec<usize> = self
            .leaves
            .iter()
            .enumerate()
            .filter(|(_, (_, l))| l.fixed == Fixed::None)
            .map(|(i, _)| i)
            .collect();

        let frozen_width: usize = left
            .iter()
            .chain(right.iter())
            .map(|&i| self.leaves[i].1.width + 1)
            .sum();
        let mut budget = self.uilayout.table_width.saturating_sub(frozen_width);

        let mut visible = left;
        for &idx in middle.iter().skip(self.offset_column) {
            let need = self.leaves[idx].1.width + 1;
            if need > budget {
                break;
            }
            budget -= need;
            visible.push(idx);
        }
        visible.extend(right);
        visible
    }

    fn middle_count(&self) -> usize {
        self.leaves
            .iter()
            .filter(|(_, l)| l.fixed == Fixed::None)
            .count()
    }

    fn column_filtered(&self, leaf: &LeafColumn) -> bool {
        self.committed.contains_key(&leaf.key)
    }

    fn title_line(&self, leaf: &LeafColumn) -> Line<'static> {
        let filtered = self.column_filtered(leaf);
        match leaf.filter {
            FilterKind::None => Line::from(leaf.title.to_string()),
            FilterKind::TextSearch => {
                let icon = column_search(leaf.key).icon(filtered);
                Line::from(vec![
                    Span::raw(leaf.title.to_string()),
                    Span::raw(" "),
                    icon,
                ])
            }
            FilterKind::Enumerated(_) => {
                let marker = if filtered {
                    Span::styled("◆", Style::new().fg(Color::Cyan))
                } else {
                    Span::raw("◇")
                };
                Line::from(vec![
                    Span::raw(leaf.title.to_string()),
                    Span::raw(" "),
                    marker,
                ])
            }
        }
    }

    fn cell_line(&self, leaf: &LeafColumn, record: &Record) -> Line<'static> {
        let value = leaf.value(record);
        match leaf.filter {
            FilterKind::TextSearch => {
                column_search(leaf.key).render_cell(&self.session, value.as_deref())
            }
            _ => Line::from(value.unwrap_or_default()),
        }
    }

    fn dropdown_view(&self) -> Option<DropdownView> {
        let dropdown = self.dropdown.as_ref()?;
        let leaf = &self.leaves[dropdown.leaf_idx].1;
        match &dropdown.kind {
            DropdownKind::Search => Some(DropdownView::Search {
                title: format!("Search {}", leaf.key.as_str()),
                input: self.input.get(),
                focused: dropdown.focused,
            }),
            DropdownKind::Enumerated {
                values,
                selected,
                curser,
            } => Some(DropdownView::Enumerated {
                title: format!("Filter {}", leaf.key.as_str()),
                entries: values
                    .iter()
                    .map(|v| (v.to_string(), selected.iter().any(|s| s == *v)))
                    .collect(),
                curser: *curser,
            }),
        }
    }

    fn update_table_data(&mut self) {
        self.visible_leaves = self.visible_columns();
        if !self.visible_leaves.is_empty() {
            self.curser_column = std::cmp::min(self.curser_column, self.visible_leaves.len() - 1);
        }

        let rbegin = std::cmp::min(self.offset_row, self.rows.len());
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, self.rows.len());
        self.curser_row = std::cmp::min(
            self.curser_row,
            rend.saturating_sub(rbegin).saturating_sub(1),
        );

        let selected_key = self
            .rows
            .get(rbegin + self.curser_row)
            .and_then(|&ridx| self.records.get(ridx))
            .map(|r| r.row_key())
            .unwrap_or_default();

        let mut columns = Vec::with_capacity(self.visible_leaves.len());
        for &idx in self.visible_leaves.iter() {
            let (group, leaf) = &self.leaves[idx];
            let data = self.rows[rbegin..rend]
                .iter()
                .map(|&ridx| self.cell_line(leaf, &self.records[ridx]))
                .collect();
            columns.push(ColumnView {
                group: group.clone(),
                title: self.title_line(leaf),
                width: std::cmp::min(leaf.width, self.config.max_column_width),
                fixed: leaf.fixed,
                data,
            });
        }

        self.uidata = UIData {
            name: "roster".to_string(),
            columns,
            nrows: rend - rbegin,
            total_rows: self.rows.len(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            abs_selected_row: self.offset_row + self.curser_row,
            selected_key,
            show_popup: self.modus == Modus::POPUP,
            popup_message: if self.modus == Modus::POPUP {
                HELP_TEXT.to_string()
            } else {
                String::new()
            },
            dropdown: self.dropdown_view(),
            layout: self.uilayout.clone(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    // -------------------- movement ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.update_table_data();
    }

    fn move_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
        self.update_table_data();
    }

    fn move_selection_end(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if self.rows.len() <= self.uilayout.table_height {
            self.offset_row = 0;
            self.curser_row = self.rows.len() - 1;
        } else {
            self.offset_row = self.rows.len() - self.uilayout.table_height;
            self.curser_row = self.uilayout.table_height - 1;
        }
        self.update_table_data();
    }

    fn move_selection_up(&mut self, size: usize) {
        if self.curser_row > 0 {
            self.curser_row = self.curser_row.saturating_sub(size);
        } else {
            self.offset_row = self.offset_row.saturating_sub(size);
        }
        self.update_table_data();
    }

    fn move_selection_down(&mut self, size: usize) {
        if self.rows.is_empty() {
            return;
        }
        if self.curser_row + self.offset_row < self.rows.len() - 1 {
            if self.curser_row < self.uilayout.table_height - 1 {
                self.curser_row = std::cmp::min(
                    self.curser_row + size,
                    std::cmp::min(self.uilayout.table_height, self.rows.len()) - 1,
                );
            } else {
                self.offset_row = std::cmp::min(
                    self.offset_row + size,
                    self.rows.len() - self.uilayout.table_height,
                );
            }
            self.update_table_data();
        }
    }

    fn move_selection_left(&mut self) {
        if self.curser_column > 0 {
            self.curser_column -= 1;
        } else if self.offset_column > 0 {
            self.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < self.visible_leaves.len() {
            self.curser_column += 1;
            self.update_table_data();
        } else {
            let shown_middle = self
                .visible_leaves
                .iter()
                .filter(|&&i| self.leaves[i].1.fixed == Fixed::None)
                .count();
            if self.offset_column + shown_middle < self.middle_count() {
                self.offset_column += 1;
                self.update_table_data();
            }
        }
    }

    // -------------------- popups & clipboard ---------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.update_table_data();
    }

    fn close_popup(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.update_table_data();
    }

    fn selected_record(&self) -> Option<&Record> {
        let ridx = *self.rows.get(self.offset_row + self.curser_row)?;
        self.records.get(ridx)
    }

    fn copy_cell(&mut self) {
        let Some(leaf_idx) = self.visible_leaves.get(self.curser_column).copied() else {
            return;
        };
        let key = self.leaves[leaf_idx].1.key;
        let Some(cell) = self.selected_record().and_then(|r| r.field(key)) else {
            self.set_status_message("Empty cell".to_string());
            return;
        };
        match &mut self.clipboard {
            Some(clipboard) => match clipboard.set_text(cell) {
                Ok(_) => self.set_status_message("Copied cell".to_string()),
                Err(e) => self.set_status_message(format!("Clipboard error: {e:?}")),
            },
            None => self.set_status_message("No clipboard available".to_string()),
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_row(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        let content = self
            .leaves
            .iter()
            .map(|(_, l)| Self::wrap_cell_content(&l.value(record).unwrap_or_default()))
            .collect::<Vec<String>>()
            .join(",");

        match &mut self.clipboard {
            Some(clipboard) => match clipboard.set_text(content) {
                Ok(_) => self.set_status_message("Copied row".to_string()),
                Err(e) => self.set_status_message(format!("Clipboard error: {e:?}")),
            },
            None => self.set_status_message("No clipboard available".to_string()),
        }
    }
}
