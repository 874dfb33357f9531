use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Clear, Paragraph},
};

use crate::columns::Fixed;
use crate::domain::ViewerConfig;
use crate::model::{ColumnView, DropdownView, Model, UIData};

pub const TABLE_HEADER_HEIGHT: usize = 2;
pub const CMDLINE_HEIGHT: usize = 1;

const DROPDOWN_WIDTH: u16 = 36;

pub struct TableUI {
    config: ViewerConfig,
}

impl TableUI {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let area = frame.area();
        let uidata = model.get_uidata();

        if area.height < (TABLE_HEADER_HEIGHT + CMDLINE_HEIGHT + 1) as u16 || area.width < 10 {
            return;
        }

        self.draw_table(uidata, frame, area);
        self.draw_statusline(uidata, frame, area);

        if let Some(dropdown) = &uidata.dropdown {
            self.draw_dropdown(dropdown, frame, area);
        }
        if uidata.show_popup {
            self.draw_popup(&uidata.popup_message, frame, area);
        }
    }

    /// Column x positions: frozen-left and middle flow from the left edge,
    /// frozen-right columns stick to the right edge.
    fn column_positions(&self, uidata: &UIData, area: Rect) -> Vec<(u16, usize)> {
        let right_total: usize = uidata
            .columns
            .iter()
            .filter(|c| c.fixed == Fixed::Right)
            .map(|c| c.width + 1)
            .sum();
        let right_start = (area.width as usize).saturating_sub(right_total);

        let mut positions = Vec::with_capacity(uidata.columns.len());
        let mut x = area.x as usize;
        let mut rx = area.x as usize + right_start;
        for (idx, column) in uidata.columns.iter().enumerate() {
            if column.fixed == Fixed::Right {
                positions.push((rx as u16, idx));
                rx += column.width + 1;
            } else {
                positions.push((x as u16, idx));
                x += column.width + 1;
            }
        }
        positions
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let positions = self.column_positions(uidata, area);

        // Group header row: adjacent columns of the same group render the
        // title once, at the first column of the run.
        let mut previous_group = "";
        for &(x, idx) in positions.iter() {
            let column = &uidata.columns[idx];
            if !column.group.is_empty() && column.group != previous_group {
                let rect = clipped(area, x, area.y, self.group_width(uidata, &positions, idx), 1);
                frame.render_widget(
                    Paragraph::new(Line::from(column.group.clone()))
                        .style(Style::new().add_modifier(Modifier::BOLD).fg(Color::Blue)),
                    rect,
                );
            }
            previous_group = column.group.as_str();
        }

        // Leaf title row and cells.
        for &(x, idx) in positions.iter() {
            let column = &uidata.columns[idx];
            let width = column.width as u16;

            let mut title_style = Style::new().add_modifier(Modifier::UNDERLINED);
            if idx == uidata.selected_column {
                title_style = title_style.add_modifier(Modifier::BOLD).fg(Color::Yellow);
            }
            let title_rect = clipped(area, x, area.y + 1, width, 1);
            frame.render_widget(
                Paragraph::new(column.title.clone()).style(title_style),
                title_rect,
            );

            let body_height = area
                .height
                .saturating_sub((TABLE_HEADER_HEIGHT + CMDLINE_HEIGHT) as u16);
            let body_rect = clipped(
                area,
                x,
                area.y + TABLE_HEADER_HEIGHT as u16,
                width,
                body_height,
            );
            let lines = self.body_lines(uidata, column, idx);
            frame.render_widget(Paragraph::new(Text::from(lines)), body_rect);
        }
    }

    /// Total width of the group run starting at `start`.
    fn group_width(&self, uidata: &UIData, positions: &[(u16, usize)], start: usize) -> u16 {
        let group = &uidata.columns[start].group;
        let mut width = 0;
        for &(_, idx) in positions.iter().skip(start) {
            if &uidata.columns[idx].group != group {
                break;
            }
            width += uidata.columns[idx].width as u16 + 1;
        }
        width.saturating_sub(1)
    }

    fn body_lines(&self, uidata: &UIData, column: &ColumnView, idx: usize) -> Vec<Line<'static>> {
        column
            .data
            .iter()
            .enumerate()
            .map(|(row, line)| {
                let mut line = line.clone();
                if row == uidata.selected_row && idx == uidata.selected_column {
                    line = line.style(Style::new().add_modifier(Modifier::REVERSED));
                }
                line
            })
            .collect()
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let y = area.y + area.height - CMDLINE_HEIGHT as u16;
        let rect = Rect::new(area.x, y, area.width, CMDLINE_HEIGHT as u16);

        let faded = uidata.last_status_message_update.elapsed().as_millis()
            > self.config.status_message_time as u128;
        let left = if faded {
            String::new()
        } else {
            uidata.status_message.clone()
        };
        let position = if uidata.total_rows == 0 {
            format!(" {} | no rows", uidata.name)
        } else {
            format!(
                " {} | {} | row {}/{}",
                uidata.name,
                uidata.selected_key,
                uidata.abs_selected_row + 1,
                uidata.total_rows
            )
        };

        let pad = (area.width as usize).saturating_sub(left.len() + position.len());
        let line = Line::from(vec![
            Span::styled(left, Style::new().fg(Color::Green)),
            Span::raw(" ".repeat(pad)),
            Span::styled(position, Style::new().add_modifier(Modifier::DIM)),
        ]);
        frame.render_widget(Paragraph::new(line), rect);
    }

    fn draw_dropdown(&self, dropdown: &DropdownView, frame: &mut Frame, area: Rect) {
        match dropdown {
            DropdownView::Search {
                title,
                input,
                focused,
            } => {
                let rect = centered_rect(DROPDOWN_WIDTH, 4, area);
                frame.render_widget(Clear, rect);
                let block = Block::bordered().title(title.clone());
                let inner = block.inner(rect);
                frame.render_widget(block, rect);

                let mut input_line = vec![Span::raw("> "), Span::raw(input.input.clone())];
                if *focused {
                    input_line.push(Span::styled(
                        "█",
                        Style::new().add_modifier(Modifier::SLOW_BLINK),
                    ));
                }
                let text = Text::from(vec![
                    Line::from(input_line),
                    Line::from(Span::styled(
                        "Enter 确定  C-r 重置  Tab 筛选",
                        Style::new().add_modifier(Modifier::DIM),
                    )),
                ]);
                frame.render_widget(Paragraph::new(text), inner);
            }
            DropdownView::Enumerated {
                title,
                entries,
                curser,
            } => {
                let height = (entries.len() + 3).min(16) as u16;
                let rect = centered_rect(DROPDOWN_WIDTH, height, area);
                frame.render_widget(Clear, rect);
                let block = Block::bordered().title(title.clone());
                let inner = block.inner(rect);
                frame.render_widget(block, rect);

                // Keep the curser line inside the visible window.
                let window = inner.height.saturating_sub(1) as usize;
                let skip = curser.saturating_sub(window.saturating_sub(1));
                let mut lines: Vec<Line> = entries
                    .iter()
                    .enumerate()
                    .skip(skip)
                    .take(window)
                    .map(|(i, (value, selected))| {
                        let mark = if *selected { "[x] " } else { "[ ] " };
                        let mut line = Line::from(format!("{mark}{value}"));
                        if i == *curser {
                            line = line.style(Style::new().add_modifier(Modifier::REVERSED));
                        }
                        line
                    })
                    .collect();
                lines.push(Line::from(Span::styled(
                    "Space 选择  Enter 确定  C-r 重置",
                    Style::new().add_modifier(Modifier::DIM),
                )));
                frame.render_widget(Paragraph::new(Text::from(lines)), inner);
            }
        }
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame, area: Rect) {
        let width = (area.width * 3 / 4).min(60);
        let height = (message.lines().count() as u16 + 2).min(area.height);
        let rect = centered_rect(width, height, area);
        frame.render_widget(Clear, rect);
        let block = Block::bordered().title(" help ");
        let inner = block.inner(rect);
        frame.render_widget(block, rect);
        frame.render_widget(Paragraph::new(message.to_string()), inner);
    }
}

fn clipped(area: Rect, x: u16, y: u16, width: u16, height: u16) -> Rect {
    let max_w = (area.x + area.width).saturating_sub(x);
    let max_h = (area.y + area.height).saturating_sub(y);
    Rect::new(x, y, width.min(max_w), height.min(max_h))
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::load_default;
    use crate::domain::Message;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Render into a test buffer and join all cell symbols. Wide glyphs leave
    /// a padding cell behind, so CJK assertions go through `compact`.
    fn render(model: &Model, width: u16, height: u16) -> String {
        let ui = TableUI::new(&ViewerConfig::default());
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| ui.draw(model, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    fn compact(screen: &str) -> String {
        screen.replace(' ', "")
    }

    fn test_model() -> Model {
        let config = ViewerConfig::default().with_focus_delay_ms(0);
        let mut model = Model::new(config, load_default().unwrap()).unwrap();
        model.update(Some(Message::Resize(160, 30))).unwrap();
        model
    }

    #[test]
    fn renders_header_and_rows() {
        let model = test_model();
        let screen = render(&model, 160, 30);
        assert!(compact(&screen).contains("战队名称"));
        assert!(screen.contains("Faker"));
        assert!(screen.contains("T1"));
    }

    #[test]
    fn renders_group_titles() {
        let mut model = test_model();
        model.update(Some(Message::Resize(200, 30))).unwrap();
        let screen = render(&model, 200, 30);
        assert!(compact(&screen).contains("标签"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let model = test_model();
        let _ = render(&model, 8, 2);
    }

    #[test]
    fn help_popup_renders() {
        let mut model = test_model();
        model.update(Some(Message::Help)).unwrap();
        let screen = render(&model, 160, 30);
        assert!(screen.contains("roster-tv keys"));
    }

    #[test]
    fn dropdown_renders_with_buttons() {
        let mut model = test_model();
        model.update(Some(Message::OpenFilter)).unwrap();
        let screen = render(&model, 160, 30);
        assert!(screen.contains("Search team"));
        assert!(compact(&screen).contains("确定"));
    }
}
