use super::model::HistoryItem;
use chrono::Local;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

pub fn history_table(items: &[HistoryItem]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "ID", "Time", "Method", "URL", "Status", "Req", "Resp",
    ]);

    for item in items {
        let status = match item.status_code {
            0 => Cell::new("ERR").fg(Color::Red),
            code if code < 400 => Cell::new(code).fg(Color::Green),
            code if code < 500 => Cell::new(code).fg(Color::Yellow),
            code => Cell::new(code).fg(Color::Red),
        };

        table.add_row(vec![
            Cell::new(item.id),
            Cell::new(
                item.created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S"),
            ),
            Cell::new(&item.method),
            Cell::new(&item.url).add_attribute(Attribute::Dim),
            status,
            Cell::new(format_size(item.request_size)),
            Cell::new(format_size(item.response_size)),
        ]);
    }

    table
}

fn format_size(bytes: u64) -> String {
    match bytes {
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
    }
}
