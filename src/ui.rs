use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState,
    },
};

use crate::model::{Model, UIData};

pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 2; // Status line and input line
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self {
            table_state: TableState::default(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area, input_area] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());
        let [grid_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(table_area);

        self.draw_table(uidata, frame, grid_area);
        Self::draw_scrollbar(uidata, frame, scrollbar_area);
        Self::draw_statusline(uidata, frame, status_area);
        Self::draw_cmdline(uidata, frame, input_area);

        if uidata.show_popup {
            Self::draw_popup(&uidata.popup_message, frame);
        }
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(uidata.table.iter().map(|c| Cell::from(c.name.clone())))
            .style(Style::new().bold().underlined())
            .height(TABLE_HEADER_HEIGHT as u16);

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            Row::new(
                uidata
                    .table
                    .iter()
                    .map(|c| Cell::from(c.data.get(ridx).cloned().unwrap_or_default())),
            )
        });
        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::new().on_dark_gray())
            .cell_highlight_style(Style::new().black().on_yellow());

        let selected = (nrows > 0).then_some(uidata.selected_row);
        self.table_state.select(selected);
        self.table_state.select_column(Some(uidata.selected_column));
        // Rows are already windowed by the model
        *self.table_state.offset_mut() = 0;
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_scrollbar(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut state = ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None);
        frame.render_stateful_widget(scrollbar, area, &mut state);
    }

    fn draw_statusline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::from(format!(" {} ", uidata.name)).bold().reversed(),
            Span::from(format!(" {}/{} rows ", uidata.nrows, uidata.total_rows)),
        ];
        if !uidata.filter.is_empty() {
            spans.push(Span::from(format!("filter \"{}\" ", uidata.filter)).yellow());
        }
        spans.push(Span::from(uidata.status_message.clone()).dim());
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let line = Line::from(vec![
                Span::from("/").bold().blue(),
                Span::from(uidata.cmdinput.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + 1 + uidata.cmdinput.curser_pos as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        } else {
            let line = Line::from(vec![
                " Filter ".into(),
                "</>".blue().bold(),
                " Record ".into(),
                "<Enter>".blue().bold(),
                " Help ".into(),
                "<?>".blue().bold(),
                " Quit ".into(),
                "<q> ".blue().bold(),
            ]);
            frame.render_widget(Paragraph::new(line).right_aligned(), area);
        }
    }

    fn draw_popup(message: &str, frame: &mut Frame) {
        let width = message.lines().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
        let height = message.lines().count() + 2;
        let area = Self::popup_area(frame.area(), width as u16, height as u16);
        let popup = Paragraph::new(message.to_string()).block(
            Block::bordered()
                .title(Line::from(" Help ".bold()).centered())
                .title_bottom(Line::from(" <Esc> close ").centered()),
        );
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }

    fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
        let [area] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::horizontal([Constraint::Length(width)])
            .flex(Flex::Center)
            .areas(area);
        area
    }
}
