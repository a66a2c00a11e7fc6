use std::fmt::{self, Write};

/// Marks a cell which was cut to fit its column
const ELLIPSIS: &str = "...";

pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    /// Header cells must stay single words so the output can be split with awk.
    fn is_awk_safe(&self) -> bool {
        !self
            .cells
            .iter()
            .any(|cell| cell.is_empty() || cell.contains(char::is_whitespace))
    }

    fn columns(&self) -> usize {
        self.cells.len()
    }
}

impl From<Vec<String>> for Row {
    fn from(value: Vec<String>) -> Self {
        Row { cells: value }
    }
}

impl From<Vec<&str>> for Row {
    fn from(value: Vec<&str>) -> Self {
        Row {
            cells: value.into_iter().map(str::to_owned).collect(),
        }
    }
}

fn display_width(cell: &str) -> usize {
    cell.chars().count()
}

/// Cuts `cell` down to at most `max` characters, ellipsis included.
fn truncate(cell: &str, max: usize) -> String {
    if display_width(cell) <= max {
        return cell.to_string();
    }

    if max <= ELLIPSIS.len() {
        return cell.chars().take(max).collect();
    }

    let mut cut: String = cell.chars().take(max - ELLIPSIS.len()).collect();

    cut.truncate(cut.trim_end().len());
    cut.push_str(ELLIPSIS);

    cut
}

pub(crate) struct Table {
    body: Vec<Row>,
    header: Option<Row>,
    num_columns: Option<usize>,
    max_widths: Vec<(usize, usize)>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new() -> Table {
        Table {
            body: Vec::new(),
            header: None,
            num_columns: None,
            max_widths: Vec::new(),
            print_header: true,
        }
    }

    fn expect_num_columns(&mut self, num_columns: usize) {
        match self.num_columns {
            Some(prev) if prev != num_columns => panic!(
                "table has {} columns but a row with {} columns was inserted",
                prev, num_columns
            ),
            Some(_) => {}
            None => self.num_columns = Some(num_columns),
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    /// Limits the body cells of `column` to `width` characters.
    pub(crate) fn limit_width(&mut self, column: usize, width: usize) {
        self.max_widths.push((column, width));
    }

    pub(crate) fn add_row<R: Into<Row>>(&mut self, row: R) {
        let row = row.into();

        self.expect_num_columns(row.columns());

        self.body.push(row);
    }

    pub(crate) fn set_header<R: Into<Row>>(&mut self, header: R) {
        let header = header.into();

        self.expect_num_columns(header.columns());

        if !header.is_awk_safe() {
            panic!("table header is not awk safe, a cell is empty or contains whitespace")
        }

        self.header.replace(header);
    }

    fn max_width(&self, column: usize) -> Option<usize> {
        self.max_widths
            .iter()
            .rev()
            .find(|(c, _)| *c == column)
            .map(|(_, width)| *width)
    }

    fn rendered_rows(&self) -> Vec<Vec<String>> {
        let header = match (&self.header, self.print_header) {
            (Some(header), true) => Some(header.cells.clone()),
            _ => None,
        };

        let body = self.body.iter().map(|row| {
            row.cells
                .iter()
                .enumerate()
                .map(|(i, cell)| match self.max_width(i) {
                    Some(max) => truncate(cell, max),
                    None => cell.clone(),
                })
                .collect::<Vec<String>>()
        });

        header.into_iter().chain(body).collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rendered_rows();

        let mut widths = vec![0usize; self.num_columns.unwrap_or(0)];

        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(display_width(cell));
            }
        }

        for row in &rows {
            let last = row.len().saturating_sub(1);

            for (i, cell) in row.iter().enumerate() {
                f.write_str(cell)?;

                // The last column is not padded
                if i != last {
                    for _ in display_width(cell)..widths[i] + 2 {
                        f.write_char(' ')?;
                    }
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "DESCRIPTION"]);
        tab.add_row(vec!["llama3", "Meta Llama 3"]);
        tab.add_row(vec!["gemma:2b", ""]);

        tab
    }

    #[test]
    fn test_alignment() {
        assert_eq!(
            sample().to_string(),
            "MODEL     DESCRIPTION\nllama3    Meta Llama 3\ngemma:2b  \n"
        );
    }

    #[test]
    fn test_headerless() {
        let mut tab = sample();

        tab.print_header(false);

        assert_eq!(tab.to_string(), "llama3    Meta Llama 3\ngemma:2b  \n");
    }

    #[test]
    fn test_limit_width() {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "DESCRIPTION"]);
        tab.add_row(vec!["chat-model", "Default chat model"]);
        tab.limit_width(1, 11);

        assert_eq!(
            tab.to_string(),
            "MODEL       DESCRIPTION\nchat-model  Default...\n"
        );
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("héllo wörld", 20), "héllo wörld");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
        assert_eq!(truncate("héllo", 2), "hé");
    }

    #[test]
    #[should_panic]
    fn test_column_mismatch() {
        let mut tab = sample();

        tab.add_row(vec!["phi3"]);
    }
}
