use arboard::Clipboard;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{HELP_TEXT, Message, TVConfig, TVError};
use crate::inputter::{InputResult, Inputter};
use crate::record::{self, Row};
use crate::renderer::TableRenderer;
use crate::source::Source;
use crate::ui::{CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    RECORD,
    POPUP,
    FILTERINPUT,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

struct TableView {
    visible_columns: Vec<usize>, // Idx of schema columns that are send to the UI for rendering.
    visible_width: usize,
    column_widths: Vec<usize>, // Full render width per schema column
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    data: Vec<ColumnView>,
}

impl TableView {
    fn empty() -> Self {
        TableView {
            visible_columns: Vec::new(),
            visible_width: 0,
            column_widths: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            data: Vec::new(),
        }
    }

    fn selected_position(&self) -> usize {
        self.offset_row + self.curser_row
    }

    fn selected_column(&self) -> Option<usize> {
        self.visible_columns.get(self.curser_column).copied()
    }
}

struct RecordView {
    record_idx: usize, // Position in the visible row set
    field_data: Vec<String>,
    value_data: Vec<String>,
    curser_row: usize,
    curser_offset: usize,
}

impl RecordView {
    fn empty() -> Self {
        RecordView {
            record_idx: 0,
            field_data: Vec::new(),
            value_data: Vec::new(),
            curser_row: 0,
            curser_offset: 0,
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub nrows: usize,       // Number of rows in this view
    pub total_rows: usize,  // Number of input rows before filtering
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub filter: String,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            nrows: 0,
            total_rows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            filter: String::new(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: TVConfig,
    source: Option<Source>,
    name: String,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    renderer: TableRenderer,
    table: TableView,
    record_view: RecordView,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    filter_before_edit: String,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        name: String,
        renderer: TableRenderer,
        source: Option<Source>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            source,
            name,
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            renderer,
            table: TableView::empty(),
            record_view: RecordView::empty(),
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            filter_before_edit: String::new(),
            status_message: String::new(),
        };
        model.measure_columns();
        model.update_table_data();
        let message = format!("Loaded {} rows", model.renderer.rows().len());
        model.set_status_message(message);
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &TableRenderer {
        &self.renderer
    }

    #[cfg(test)]
    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::FILTERINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        let Some(msg) = message else {
            return Ok(());
        };
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_table_selection_down(1),
                Message::MoveUp => self.move_table_selection_up(1),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                Message::MovePageDown => {
                    self.move_table_selection_down(self.uilayout.table_height)
                }
                Message::MoveBeginning => self.move_table_selection_beginning(),
                Message::MoveEnd => self.move_table_selection_end(),
                Message::Filter => self.enter_filter_mode(),
                Message::ClearFilter => self.apply_filter(""),
                Message::Enter => self.enter(),
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Reload => self.reload(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::RECORD => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_record_selection_down(1),
                Message::MoveUp => self.move_record_selection_up(1),
                Message::MoveLeft => self.previous_record(),
                Message::MoveRight => self.next_record(),
                Message::MovePageUp => self.move_record_selection_up(10),
                Message::MovePageDown => self.move_record_selection_down(10),
                Message::CopyCell => self.copy_record_cell(),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.exit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::FILTERINPUT => match msg {
                Message::RawKey(key) => self.filter_input(key),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }
        Ok(())
    }

    // -------------------- Data views ---------------------- //

    // Render widths per schema column, measured over all input rows so that
    // the layout does not jump while the filter changes.
    fn measure_columns(&mut self) {
        let start_time = Instant::now();
        let rows: &[Row] = self.renderer.rows();
        let max_width = self.config.max_column_width;
        self.table.column_widths = self
            .renderer
            .columns()
            .par_iter()
            .map(|column| {
                let content = rows
                    .iter()
                    .map(|r| record::cell_text(record::lookup(r, column.key())).chars().count())
                    .max()
                    .unwrap_or(0);
                let header = column.header_text().chars().count();
                std::cmp::min(std::cmp::max(header, content) + COLUMN_WIDTH_MARGIN, max_width)
            })
            .collect();
        debug!(
            "Measured {} columns in {}ms",
            self.table.column_widths.len(),
            start_time.elapsed().as_millis()
        );
    }

    fn update_table_data(&mut self) {
        let nrows = self.renderer.visible_len();
        let ncolumns = self.renderer.columns().len();
        let table = &mut self.table;
        let height = self.uilayout.table_height;

        // The visible set can shrink underneath the cursor
        if nrows == 0 {
            table.offset_row = 0;
            table.curser_row = 0;
        } else if table.offset_row + table.curser_row >= nrows {
            let last = nrows - 1;
            table.offset_row = last.saturating_sub(height.saturating_sub(1));
            table.curser_row = last - table.offset_row;
        }
        table.offset_column = std::cmp::min(table.offset_column, ncolumns.saturating_sub(1));

        let window = self.renderer.render_window(table.offset_row, height);
        trace!(
            "Table: Cr {}, Cc {}, Or {}, Oc {}, rows {}/{}, tw: {}, th: {}",
            table.curser_row,
            table.curser_column,
            table.offset_row,
            table.offset_column,
            window.rows.len(),
            nrows,
            self.uilayout.table_width,
            height
        );

        // Create a list of columns that fit in the table
        table.visible_columns = Vec::new();
        let mut render_widths = Vec::new();
        let mut visible_width = 0;
        for cidx in table.offset_column..ncolumns {
            let width = table.column_widths[cidx];
            if visible_width + (width + 1) <= self.uilayout.table_width {
                table.visible_columns.push(cidx);
                render_widths.push(width);
                visible_width += width + 1;
            } else {
                // Add the last partial visible column
                if visible_width < self.uilayout.table_width {
                    let remaining_width = self.uilayout.table_width - visible_width;
                    table.visible_columns.push(cidx);
                    render_widths.push(remaining_width);
                    visible_width += remaining_width;
                }
                break;
            }
        }
        table.visible_width = visible_width;
        table.curser_column = std::cmp::min(
            table.curser_column,
            table.visible_columns.len().saturating_sub(1),
        );

        table.data = table
            .visible_columns
            .iter()
            .zip(render_widths)
            .map(|(&cidx, width)| ColumnView {
                name: Self::get_visible_name(&window.headers[cidx], width),
                width,
                data: window.rows.iter().map(|r| r.cells[cidx].clone()).collect(),
            })
            .collect();

        self.update_uidata_for_table();
    }

    fn update_uidata_for_table(&mut self) {
        let table = &self.table;
        let filter = self.renderer.filter().text().to_string();
        self.uidata = UIData {
            name: self.name.clone(),
            table: table.data.clone(),
            nrows: self.renderer.visible_len(),
            total_rows: self.renderer.rows().len(),
            selected_row: table.curser_row,
            selected_column: table.curser_column,
            abs_selected_row: table.selected_position(),
            show_popup: false,
            popup_message: String::new(),
            filter,
            cmdinput: self.input.get(),
            active_cmdinput: self.modus == Modus::FILTERINPUT,
            status_message: self.status_message.clone(),
        };
    }

    fn build_record_view(&mut self, record_idx: usize) {
        trace!("Building record view for {record_idx} ...");
        let record = &mut self.record_view;
        record.record_idx = record_idx;
        record.curser_offset = 0;
        record.curser_row = 0;
        self.update_record_data();
    }

    fn update_record_data(&mut self) {
        let record = &mut self.record_view;
        let Some(row) = self.renderer.visible_row(record.record_idx) else {
            warn!("Record {} is not visible anymore", record.record_idx);
            return;
        };
        // All fields of the record, not only the schema columns
        let (fields, values): (Vec<String>, Vec<String>) = row
            .iter()
            .map(|(k, v)| (k.clone(), record::cell_text(Some(v))))
            .unzip();
        record.field_data = fields;
        record.value_data = values;

        let height = self.uilayout.table_height;
        let rbegin = std::cmp::min(record.curser_offset, record.field_data.len());
        let rend = std::cmp::min(rbegin + height, record.field_data.len());

        let field_width = record
            .field_data
            .iter()
            .map(|f| f.chars().count())
            .max()
            .unwrap_or(0)
            + COLUMN_WIDTH_MARGIN;
        let value_width = self.uilayout.table_width.saturating_sub(field_width + 1);

        self.uidata.name = format!("R[{}]", self.name);
        self.uidata.table = vec![
            ColumnView {
                name: "Field".to_string(),
                width: field_width,
                data: record.field_data[rbegin..rend].to_vec(),
            },
            ColumnView {
                name: "Value".to_string(),
                width: value_width,
                data: record.value_data[rbegin..rend].to_vec(),
            },
        ];
        self.uidata.nrows = record.field_data.len();
        self.uidata.selected_row = record.curser_row;
        self.uidata.selected_column = 1;
        self.uidata.abs_selected_row = record.record_idx;
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        if name.chars().count() > width {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            return reduced;
        }
        name.to_string()
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        match self.modus {
            Modus::RECORD => self.update_record_data(),
            Modus::POPUP => {
                let (show_popup, popup_message) =
                    (self.uidata.show_popup, self.uidata.popup_message.clone());
                self.update_table_data();
                self.uidata.show_popup = show_popup;
                self.uidata.popup_message = popup_message;
            }
            Modus::TABLE | Modus::FILTERINPUT => self.update_table_data(),
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if self.renderer.visible_len() == 0 {
            self.set_status_message("Nothing to show");
            return;
        }
        let record_idx = self.table.selected_position();
        self.previous_modus = Modus::TABLE;
        self.modus = Modus::RECORD;
        self.build_record_view(record_idx);
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::RECORD => {
                // Jump to the record that was shown last
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
                let idx = self.record_view.record_idx;
                self.select_row(idx);
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::TABLE | Modus::FILTERINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    fn enter_filter_mode(&mut self) {
        trace!("Entering filter input ...");
        self.previous_modus = self.modus;
        self.modus = Modus::FILTERINPUT;
        self.filter_before_edit = self.renderer.filter().text().to_string();
        self.input.set(&self.filter_before_edit);
        self.uidata.cmdinput = self.input.get();
        self.uidata.active_cmdinput = true;
    }

    fn filter_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        let result = self.input.read(key);
        let text = if result.canceled {
            self.filter_before_edit.clone()
        } else {
            result.input.clone()
        };
        // Live narrowing while typing
        if text != self.renderer.filter().text() {
            self.apply_filter(&text);
        }
        if result.finished {
            trace!("Filter input finished with \"{}\"", text);
            self.modus = self.previous_modus;
            self.previous_modus = Modus::FILTERINPUT;
            self.input.clear();
        }
        self.update_uidata_for_table();
    }

    fn apply_filter(&mut self, text: &str) {
        self.renderer.set_filter(text);
        self.table.curser_row = 0;
        self.table.offset_row = 0;
        let message = if self.renderer.filter().is_active() {
            format!(
                "{} of {} rows match",
                self.renderer.visible_len(),
                self.renderer.rows().len()
            )
        } else {
            "Filter cleared".to_string()
        };
        self.set_status_message(message);
        self.update_table_data();
    }

    fn reload(&mut self) {
        let Some(source) = &self.source else {
            self.set_status_message("Nothing to reload");
            return;
        };
        match source.fetch() {
            Ok(rows) => {
                info!("Reloaded {} rows", rows.len());
                self.renderer.set_rows(Arc::new(rows));
                self.measure_columns();
                let message = format!("Reloaded {} rows", self.renderer.rows().len());
                self.set_status_message(message);
                self.update_table_data();
            }
            Err(e) => {
                error!("Reload failed: {e}");
                self.set_status_message(format!("Reload failed: {e}"));
            }
        }
    }

    fn select_row(&mut self, position: usize) {
        let table = &mut self.table;
        let height = self.uilayout.table_height;
        if position < table.offset_row {
            table.curser_row = 0;
            table.offset_row = position;
        } else if position < table.offset_row + height {
            table.curser_row = position - table.offset_row;
        } else {
            // Below the window, scroll so that the row is the last one shown
            table.curser_row = height.saturating_sub(1);
            table.offset_row = position - table.curser_row;
        }
        self.update_table_data();
    }

    fn copy_to_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard not available: {:?}", e);
                    self.set_status_message("Clipboard not available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => {
                    trace!("Copied content to clipboard.");
                    self.set_status_message("Copied to clipboard");
                }
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    fn copy_table_cell(&mut self) {
        let Some(column) = self.table.selected_column() else {
            return;
        };
        if let Some(cell) = self.renderer.cell(self.table.selected_position(), column) {
            trace!("Cell content: {}", cell);
            self.copy_to_clipboard(cell);
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_table_row(&mut self) {
        let position = self.table.selected_position();
        if position >= self.renderer.visible_len() {
            return;
        }
        let content = (0..self.renderer.columns().len())
            .filter_map(|c| self.renderer.cell(position, c))
            .map(|cell| Model::wrap_cell_content(&cell))
            .collect::<Vec<String>>();
        self.copy_to_clipboard(content.join(","));
    }

    fn copy_record_cell(&mut self) {
        let record = &self.record_view;
        if let Some(cell) = record
            .value_data
            .get(record.curser_offset + record.curser_row)
            .cloned()
        {
            self.copy_to_clipboard(cell);
        }
    }

    fn move_table_selection_beginning(&mut self) {
        self.table.curser_row = 0;
        self.table.offset_row = 0;
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        let nrows = self.renderer.visible_len();
        if nrows > 0 {
            self.select_row(nrows - 1);
        }
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let table = &mut self.table;
        if table.curser_row > 0 {
            // Curser somewhere in the middle
            table.curser_row = table.curser_row.saturating_sub(size);
        } else if table.offset_row > 0 {
            // Curser at the top, shift table up
            table.offset_row = table.offset_row.saturating_sub(size);
        }
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let nrows = self.renderer.visible_len();
        let height = self.uilayout.table_height;
        let table = &mut self.table;
        if nrows == 0 || height == 0 || table.selected_position() >= nrows - 1 {
            return;
        }
        let target = std::cmp::min(table.selected_position() + size, nrows - 1);
        if target < table.offset_row + height {
            table.curser_row = target - table.offset_row;
        } else {
            // At the bottom of the table, need to shift table down
            table.curser_row = height - 1;
            table.offset_row = target - table.curser_row;
        }
        self.update_table_data();
    }

    fn move_table_selection_left(&mut self) {
        let table = &mut self.table;
        if table.curser_column > 0 {
            table.curser_column -= 1;
        } else if table.offset_column > 0 {
            table.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let ncolumns = self.renderer.columns().len();
        let table = &mut self.table;
        if table.curser_column + table.offset_column < ncolumns.saturating_sub(1) {
            // Somewhere before the last column
            if table.curser_column < table.visible_columns.len().saturating_sub(1) {
                table.curser_column += 1;
            } else {
                // At the end of the screen
                table.offset_column += 1;
            }
            self.update_table_data();
        } else if table.visible_width > self.uilayout.table_width
            && table.offset_column < ncolumns.saturating_sub(1)
        {
            table.offset_column += 1;
            self.update_table_data();
        }
    }

    fn move_record_selection_up(&mut self, size: usize) {
        let record = &mut self.record_view;
        if record.curser_row > 0 {
            record.curser_row = record.curser_row.saturating_sub(size);
        } else if record.curser_offset > 0 {
            record.curser_offset = record.curser_offset.saturating_sub(size);
        }
        self.update_record_data();
    }

    fn move_record_selection_down(&mut self, size: usize) {
        let height = self.uilayout.table_height;
        let record = &mut self.record_view;
        let nfields = record.field_data.len();
        let position = record.curser_offset + record.curser_row;
        if nfields == 0 || height == 0 || position >= nfields - 1 {
            return;
        }
        let target = std::cmp::min(position + size, nfields - 1);
        if target < record.curser_offset + height {
            record.curser_row = target - record.curser_offset;
        } else {
            record.curser_row = height - 1;
            record.curser_offset = target - record.curser_row;
        }
        self.update_record_data();
    }

    fn previous_record(&mut self) {
        let record = &mut self.record_view;
        record.record_idx = record.record_idx.saturating_sub(1);
        self.update_record_data();
    }

    fn next_record(&mut self) {
        let record = &mut self.record_view;
        if record.record_idx + 1 < self.renderer.visible_len() {
            record.record_idx += 1;
        }
        self.update_record_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use serde_json::{Value, json};

    fn model_with(rows: Value, columns: Vec<ColumnDef>, width: usize, height: usize) -> Model {
        let rows: Vec<Row> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        let renderer = TableRenderer::new(Arc::new(rows), columns).unwrap();
        Model::init(&TVConfig::default(), "test".into(), renderer, None, width, height)
    }

    fn numbered(n: usize) -> Model {
        let rows: Vec<Value> = (0..n)
            .map(|i| json!({"id": i, "name": format!("row {i}")}))
            .collect();
        model_with(
            Value::Array(rows),
            vec![ColumnDef::new("id"), ColumnDef::new("name")],
            40,
            7, // Four table rows
        )
    }

    fn send(model: &mut Model, msg: Message) {
        model.update(Some(msg)).unwrap();
    }

    fn key(model: &mut Model, code: KeyCode) {
        send(model, Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    #[test]
    fn init_shows_first_window() {
        let model = numbered(10);
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 10);
        assert_eq!(ui.total_rows, 10);
        assert_eq!(ui.table.len(), 2);
        assert_eq!(ui.table[0].name, "id");
        assert_eq!(ui.table[0].data, vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn scrolling_moves_the_window() {
        let mut model = numbered(10);
        for _ in 0..5 {
            send(&mut model, Message::MoveDown);
        }
        let ui = model.get_uidata();
        assert_eq!(ui.abs_selected_row, 5);
        assert_eq!(ui.selected_row, 3);
        assert_eq!(ui.table[0].data, vec!["2", "3", "4", "5"]);

        send(&mut model, Message::MoveEnd);
        assert_eq!(model.get_uidata().abs_selected_row, 9);
        send(&mut model, Message::MoveDown);
        assert_eq!(model.get_uidata().abs_selected_row, 9);
        send(&mut model, Message::MoveBeginning);
        assert_eq!(model.get_uidata().abs_selected_row, 0);
    }

    #[test]
    fn live_filter_narrows_and_escape_restores() {
        let mut model = numbered(12);
        send(&mut model, Message::Filter);
        assert!(model.raw_keyevents());
        key(&mut model, KeyCode::Char('1'));
        // "1", "10", "11"
        assert_eq!(model.get_uidata().nrows, 3);
        assert_eq!(model.get_uidata().filter, "1");
        key(&mut model, KeyCode::Char('1'));
        assert_eq!(model.get_uidata().nrows, 1);

        key(&mut model, KeyCode::Esc);
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.get_uidata().nrows, 12);
        assert!(!model.renderer().filter().is_active());
    }

    #[test]
    fn enter_keeps_filter_and_clear_resets() {
        let mut model = numbered(12);
        send(&mut model, Message::Filter);
        key(&mut model, KeyCode::Char('R'));
        key(&mut model, KeyCode::Char('O'));
        key(&mut model, KeyCode::Char('W'));
        key(&mut model, KeyCode::Char(' '));
        key(&mut model, KeyCode::Char('7'));
        key(&mut model, KeyCode::Enter);
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.get_uidata().nrows, 1);
        assert_eq!(model.get_uidata().table[1].data, vec!["row 7"]);
        assert_eq!(model.get_uidata().status_message, "1 of 12 rows match");

        send(&mut model, Message::ClearFilter);
        assert_eq!(model.get_uidata().nrows, 12);
        assert_eq!(model.get_uidata().filter, "");
    }

    #[test]
    fn filter_moves_cursor_back_into_range() {
        let mut model = numbered(12);
        send(&mut model, Message::MoveEnd);
        send(&mut model, Message::Filter);
        key(&mut model, KeyCode::Char('3'));
        let ui = model.get_uidata();
        assert_eq!(ui.nrows, 1);
        assert_eq!(ui.abs_selected_row, 0);
    }

    #[test]
    fn record_view_lists_all_fields() {
        let mut model = model_with(
            json!([{"id": 1, "name": "Alice", "extra": {"k": 1}}, {"id": 2}]),
            vec![ColumnDef::new("id")],
            40,
            10,
        );
        send(&mut model, Message::Enter);
        assert_eq!(model.modus(), Modus::RECORD);
        let ui = model.get_uidata();
        assert_eq!(ui.table[0].data, vec!["id", "name", "extra"]);
        assert_eq!(ui.table[1].data, vec!["1", "Alice", r#"{"k":1}"#]);

        send(&mut model, Message::MoveRight);
        assert_eq!(model.get_uidata().table[1].data, vec!["2"]);
        send(&mut model, Message::MoveRight);
        assert_eq!(model.get_uidata().abs_selected_row, 1);

        send(&mut model, Message::Exit);
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.get_uidata().abs_selected_row, 1);
    }

    #[test]
    fn empty_table_is_safe_to_navigate() {
        let columns = vec![ColumnDef::new("id"), ColumnDef::new("name")];
        let mut model = model_with(json!([]), columns, 40, 10);
        for msg in [
            Message::MoveDown,
            Message::MoveEnd,
            Message::MoveRight,
            Message::MovePageDown,
            Message::Enter,
        ] {
            send(&mut model, msg);
        }
        let ui = model.get_uidata();
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(ui.table.len(), 2);
        assert!(ui.table[0].data.is_empty());
    }

    #[test]
    fn narrow_screen_scrolls_columns() {
        let mut model = model_with(
            json!([{"alpha": "aaaaaaaaaa", "beta": "bbbbbbbbbb", "gamma": "cccccccccc"}]),
            vec![ColumnDef::new("alpha"), ColumnDef::new("beta"), ColumnDef::new("gamma")],
            25,
            6,
        );
        assert_eq!(model.get_uidata().table[0].name, "alpha");
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::MoveRight);
        let ui = model.get_uidata();
        assert_eq!(ui.table[ui.selected_column].name, "gamma");
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = numbered(3);
        send(&mut model, Message::Help);
        assert!(model.get_uidata().show_popup);
        send(&mut model, Message::Exit);
        assert!(!model.get_uidata().show_popup);
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn reload_without_source_keeps_rows() {
        let mut model = numbered(3);
        send(&mut model, Message::Reload);
        assert_eq!(model.get_uidata().status_message, "Nothing to reload");
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn reload_keeps_the_active_filter() {
        let name = format!("atv-{}-reload.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        let write = |rows: Value| std::fs::write(&path, rows.to_string()).unwrap();
        write(json!({"pages": [
            {"title": "Home", "url": "/"},
            {"title": "Pricing", "url": "/pricing"},
        ]}));
        let source = Source::File {
            path: path.clone(),
            collection: None,
        };
        let rows = source.fetch().unwrap();
        let columns = vec![ColumnDef::new("title"), ColumnDef::new("url")];
        let renderer = TableRenderer::new(Arc::new(rows), columns).unwrap();
        let cfg = TVConfig::default();
        let mut model = Model::init(&cfg, "pages".into(), renderer, Some(source), 40, 7);

        send(&mut model, Message::Filter);
        for c in "pricing".chars() {
            key(&mut model, KeyCode::Char(c));
        }
        key(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().nrows, 1);

        write(json!({"pages": [
            {"title": "Home", "url": "/"},
            {"title": "Pricing", "url": "/pricing"},
            {"title": "Pricing FAQ", "url": "/pricing/faq"},
        ]}));
        send(&mut model, Message::Reload);
        std::fs::remove_file(&path).unwrap();

        let ui = model.get_uidata();
        assert_eq!(ui.status_message, "Reloaded 3 rows");
        assert_eq!(ui.filter, "pricing");
        assert_eq!(ui.nrows, 2);
        assert_eq!(ui.total_rows, 3);
        assert_eq!(ui.table[0].data, vec!["Pricing", "Pricing FAQ"]);
    }

    #[test]
    fn quit() {
        let mut model = numbered(1);
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn csv_wrapping() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn long_headers_are_shortened() {
        assert_eq!(Model::get_visible_name("recommendation", 8), "recom...");
        assert_eq!(Model::get_visible_name("id", 2), "");
        assert_eq!(Model::get_visible_name("id", 5), "id");
    }
}
