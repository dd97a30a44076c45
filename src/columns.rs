use ratatui::layout::Constraint;

use crate::store::PacketRow;

/// One packet-table column: header, cell accessor, and a width the user
/// can change independently of the others. Accessors take the row index
/// because the No. column renders the row's 1-based position.
pub struct Column {
    pub header: &'static str,
    pub min_width: u16,
    pub width: u16,
    accessor: fn(&PacketRow, usize) -> String,
}

impl Column {
    pub fn value(&self, row: &PacketRow, index: usize) -> String {
        (self.accessor)(row, index)
    }
}

pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    pub fn packet_table() -> Self {
        ColumnSet {
            columns: vec![
                Column {
                    header: "No.",
                    min_width: 4,
                    width: 6,
                    accessor: |_, index| (index + 1).to_string(),
                },
                Column {
                    header: "Time",
                    min_width: 6,
                    width: 12,
                    accessor: |row, _| or_dash(&row.timestamp),
                },
                Column {
                    header: "Source",
                    min_width: 9,
                    width: 17,
                    accessor: |row, _| or_dash(&row.source),
                },
                Column {
                    header: "Destination",
                    min_width: 9,
                    width: 17,
                    accessor: |row, _| or_dash(&row.destination),
                },
                Column {
                    header: "Protocol",
                    min_width: 5,
                    width: 9,
                    accessor: |row, _| or_dash(&row.protocol),
                },
                Column {
                    header: "Length",
                    min_width: 4,
                    width: 7,
                    accessor: |row, _| or_dash(&row.length),
                },
                Column {
                    header: "Info",
                    min_width: 10,
                    width: 30,
                    accessor: |row, _| {
                        if row.src_port.is_empty() {
                            or_dash(&row.info)
                        } else {
                            format!("{} > {}  {}", row.src_port, row.dst_port, row.info)
                        }
                    },
                },
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Sets one column's width, floored at its minimum. Other columns are
    /// untouched; there is no proportional redistribution.
    pub fn resize(&mut self, index: usize, new_width: u16) {
        if let Some(column) = self.columns.get_mut(index) {
            column.width = new_width.max(column.min_width);
        }
    }

    pub fn adjust(&mut self, index: usize, delta: i16) {
        if let Some(column) = self.columns.get(index) {
            let target = column.width.saturating_add_signed(delta);
            self.resize(index, target);
        }
    }

    /// Constraint row for the table: stored widths for all columns except
    /// the last, which flexes into the remaining space.
    pub fn constraints(&self) -> Vec<Constraint> {
        let last = self.columns.len().saturating_sub(1);
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if i == last {
                    Constraint::Min(column.min_width)
                } else {
                    Constraint::Length(column.width)
                }
            })
            .collect()
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}
