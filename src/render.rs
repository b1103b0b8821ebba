//! Per-volunteer sheet rendering: a merged title row, a caption row, and a
//! styled 6-column grid, written out with print settings already applied.

use crate::backend::PageSetup;
use crate::field::Field;
use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::path::Path;

pub const CAPTIONS: [&str; 6] = ["S No", "Mandal", "JSP Id", "Name", "Mobile", "Status"];

/// Fill used for the title and caption rows.
const HEADER_FILL: u32 = 0xDF6666;
/// Width hints from the sheet source, divided down to Excel column units.
const COLUMN_WIDTHS: [f64; 6] = [50.0, 150.0, 100.0, 200.0, 100.0, 100.0];

/// Payload columns of the master carried into each volunteer sheet
/// (Mandal, JSP Id, Name, Mobile).
const PAYLOAD_FIRST: usize = 2;
/// Column of the volunteer number shown in the title (the identity phone).
const NUMBER_COL: usize = 8;

/// One volunteer's output document before it is written to disk. The status
/// column is not modeled: it is always emitted empty for a later manual pass.
#[derive(Clone, Debug, PartialEq)]
pub struct VolunteerSheet {
    pub name: String,
    pub number: String,
    /// Payload rows: Mandal, JSP Id, Name, Mobile.
    pub rows: Vec<[Field; 4]>,
}

impl VolunteerSheet {
    /// Build from one grouped set of master rows.
    pub fn from_group(name: &str, group: &[Vec<Field>]) -> Self {
        let number = group
            .first()
            .and_then(|r| r.get(NUMBER_COL))
            .map(Field::display_string)
            .unwrap_or_default();
        let rows = group
            .iter()
            .map(|r| {
                let pick = |i: usize| r.get(PAYLOAD_FIRST + i).cloned().unwrap_or(Field::Empty);
                [pick(0), pick(1), pick(2), pick(3)]
            })
            .collect();
        Self {
            name: name.to_string(),
            number,
            rows,
        }
    }

    pub fn title(&self) -> String {
        format!(
            "Kriya VolunteerName: {}    Volunteer number: {}",
            self.name, self.number
        )
    }

    /// Total rows once rendered: title + captions + data.
    pub fn rendered_rows(&self) -> usize {
        self.rows.len() + 2
    }
}

fn apply_page_setup(ws: &mut Worksheet, setup: &PageSetup) -> Result<()> {
    if setup.portrait {
        ws.set_portrait();
    } else {
        ws.set_landscape();
    }
    if setup.a4 {
        ws.set_paper_size(9);
    }
    ws.set_margins(
        setup.left_margin,
        setup.right_margin,
        setup.top_margin,
        setup.bottom_margin,
        setup.header_margin,
        setup.footer_margin,
    );
    ws.set_print_fit_to_pages(setup.fit_pages_wide, setup.fit_pages_tall);
    ws.set_print_center_horizontally(setup.center_horizontally);
    ws.set_print_gridlines(setup.print_gridlines);
    if setup.repeat_header_rows > 0 {
        ws.set_repeat_rows(0, setup.repeat_header_rows - 1)
            .context("set repeat rows")?;
    }
    Ok(())
}

/// Write the sheet at `path`, overwriting any previous file. Print settings
/// for the fixed pagination policy are embedded so the export backend finds
/// them in the document.
pub fn write_sheet(sheet: &VolunteerSheet, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();

    let header = Format::new()
        .set_font_name("Verdana")
        .set_font_size(11)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let centered = Format::new()
        .set_font_name("Verdana")
        .set_font_size(11)
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let left = Format::new()
        .set_font_name("Verdana")
        .set_font_size(11)
        .set_align(FormatAlign::Left)
        .set_border(FormatBorder::Thin);

    ws.merge_range(0, 0, 0, 5, &sheet.title(), &header)?;
    for (col, caption) in CAPTIONS.iter().enumerate() {
        ws.write_string_with_format(1, col as u16, *caption, &header)?;
    }

    for (i, row) in sheet.rows.iter().enumerate() {
        let r = (i + 2) as u32;
        ws.write_number_with_format(r, 0, (i + 1) as f64, &centered)?;
        for (j, field) in row.iter().enumerate() {
            let col = (j + 1) as u16;
            // Mandal and Name read better left-aligned.
            let fmt = if col == 1 || col == 3 { &left } else { &centered };
            write_field(ws, r, col, field, fmt, col == 4)?;
        }
        // Status placeholder, filled by a manual pass later.
        ws.write_string_with_format(r, 5, "", &centered)?;
    }

    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        ws.set_column_width(col as u16, *width / 7.0)?;
    }

    apply_page_setup(ws, &PageSetup::for_rows(sheet.rendered_rows()))?;

    workbook
        .save(path)
        .with_context(|| format!("write sheet {}", path.display()))?;
    Ok(())
}

/// Phone numbers arrive from the reader as floats; in the Mobile column they
/// are written as plain digit strings instead of numbers.
fn write_field(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    field: &Field,
    fmt: &Format,
    phone_column: bool,
) -> Result<()> {
    match field {
        Field::Number(n) if phone_column => {
            ws.write_string_with_format(row, col, &crate::field::format_number(*n), fmt)?;
        }
        Field::Number(n) => {
            ws.write_number_with_format(row, col, *n, fmt)?;
        }
        Field::Text(s) => {
            ws.write_string_with_format(row, col, s, fmt)?;
        }
        Field::Error(e) => {
            ws.write_string_with_format(row, col, e, fmt)?;
        }
        Field::Empty => {
            ws.write_string_with_format(row, col, "", fmt)?;
        }
    }
    Ok(())
}
