//! Quote PDF rendering.
//!
//! The document is assembled object-by-object with lopdf: standard Type1
//! Helvetica fonts, WinAnsi-encoded text, uncompressed content streams.
//! Rendering takes no input besides the quote detail snapshot, so the same
//! snapshot always produces byte-identical output, whether streamed to an
//! HTTP response or buffered for an email attachment.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use thiserror::Error;

use quotedesk_core::domain::quote::QuoteDetail;
use quotedesk_core::money::{decompose_line, format_currency, round_cents};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("document assembly failed: {0}")]
    Assembly(String),
}

// US Letter with the narrow margin the original layout used.
const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const MARGIN: f64 = 25.0;
const LINE_FACTOR: f64 = 1.4;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

const TITLE_SIZE: f64 = 15.0;
const BODY_SIZE: f64 = 12.0;
const TABLE_HEADER_SIZE: f64 = 11.0;
const TABLE_ROW_SIZE: f64 = 10.0;
const CLOSING_SIZE: f64 = 10.0;

/// Item table columns: label, width, right-aligned.
const TABLE_COLUMNS: [(&str, f64, bool); 6] = [
    ("Product", 150.0, false),
    ("Description", 150.0, false),
    ("Qty", 50.0, true),
    ("Tax", 40.0, true),
    ("Unit price", 80.0, true),
    ("Total", 80.0, true),
];

/// Helvetica AFM advance widths for 0x20..=0x7E, in 1/1000 em. Bold runs a
/// little wider; for alignment purposes the regular metrics are close
/// enough and keep the table deterministic.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, // 'A'..'P'
    778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'Q'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, // 'a'..'p'
    556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'q'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn char_width(ch: char) -> f64 {
    let code = ch as u32;
    if (0x20..=0x7E).contains(&code) {
        f64::from(HELVETICA_WIDTHS[(code - 0x20) as usize])
    } else {
        // Accented latin glyphs are mostly the width of their base letter.
        556.0
    }
}

fn text_width(text: &str, size: f64) -> f64 {
    text.chars().map(char_width).sum::<f64>() * size / 1000.0
}

/// WinAnsi byte encoding; glyphs outside latin-1 degrade to '?'.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| {
            let code = ch as u32;
            if code < 0x100 {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

/// Truncate `text` so it fits `width` points, appending an ellipsis when
/// something was cut.
fn fit_text(text: &str, width: f64, size: f64) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let ellipsis_width = text_width("...", size);
    let mut kept = String::new();
    for ch in text.chars() {
        if text_width(&kept, size) + char_width(ch) * size / 1000.0 + ellipsis_width > width {
            break;
        }
        kept.push(ch);
    }
    format!("{kept}...")
}

fn text_ops(ops: &mut Vec<Operation>, x: f64, y: f64, font: &str, size: f64, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn rule_ops(ops: &mut Vec<Operation>, x1: f64, x2: f64, y: f64) {
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("w", vec![0.7.into()]));
    ops.push(Operation::new("m", vec![x1.into(), y.into()]));
    ops.push(Operation::new("l", vec![x2.into(), y.into()]));
    ops.push(Operation::new("S", vec![]));
    ops.push(Operation::new("Q", vec![]));
}

/// Faint wordmark behind the first page's content.
fn watermark_ops() -> Vec<Operation> {
    let mut ops = Vec::new();
    let size = 52.0;
    let text = "QUOTEDESK";
    let x = (PAGE_WIDTH - text_width(text, size)) / 2.0;
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("g", vec![0.88.into()]));
    text_ops(&mut ops, x, 420.0, FONT_BOLD, size, text);
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Page-by-page content builder with a descending write cursor.
struct PageComposer {
    pages: Vec<Vec<Operation>>,
    y: f64,
}

impl PageComposer {
    fn new() -> Self {
        Self { pages: vec![watermark_ops()], y: PAGE_HEIGHT - MARGIN }
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        self.pages.last_mut().expect("composer always holds a page")
    }

    fn break_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_room(&mut self, needed: f64) -> bool {
        if self.y - needed < MARGIN {
            self.break_page();
            return true;
        }
        false
    }

    fn advance(&mut self, dy: f64) {
        self.y -= dy;
    }

    /// Draw one line of text at `x` and move the cursor down a line.
    fn text_line(&mut self, x: f64, font: &str, size: f64, text: &str) {
        self.ensure_room(size * LINE_FACTOR);
        let baseline = self.y - size;
        text_ops(self.ops(), x, baseline, font, size, text);
        self.advance(size * LINE_FACTOR);
    }

    fn text_line_right(&mut self, font: &str, size: f64, text: &str) {
        let x = PAGE_WIDTH - MARGIN - text_width(text, size);
        self.text_line(x, font, size, text);
    }

    fn text_line_centered(&mut self, font: &str, size: f64, text: &str) {
        let x = (PAGE_WIDTH - text_width(text, size)) / 2.0;
        self.text_line(x, font, size, text);
    }
}

fn table_left() -> f64 {
    MARGIN
}

fn table_right() -> f64 {
    MARGIN + TABLE_COLUMNS.iter().map(|(_, width, _)| *width).sum::<f64>()
}

fn draw_table_header(composer: &mut PageComposer) {
    composer.ensure_room(TABLE_HEADER_SIZE * LINE_FACTOR + 4.0);
    let baseline = composer.y - TABLE_HEADER_SIZE;
    let mut x = table_left();
    for (label, width, right_aligned) in TABLE_COLUMNS {
        let text_x = if right_aligned {
            x + width - text_width(label, TABLE_HEADER_SIZE)
        } else {
            x
        };
        text_ops(composer.ops(), text_x, baseline, FONT_BOLD, TABLE_HEADER_SIZE, label);
        x += width;
    }
    composer.advance(TABLE_HEADER_SIZE * LINE_FACTOR);
    let rule_y = composer.y;
    rule_ops(composer.ops(), table_left(), table_right(), rule_y);
    composer.advance(4.0);
}

fn draw_table_row(composer: &mut PageComposer, cells: &[String; 6]) {
    if composer.ensure_room(TABLE_ROW_SIZE * LINE_FACTOR) {
        // The table continues on the fresh page under a repeated header.
        draw_table_header(composer);
    }
    let baseline = composer.y - TABLE_ROW_SIZE;
    let mut x = table_left();
    for (cell, (_, width, right_aligned)) in cells.iter().zip(TABLE_COLUMNS.iter()) {
        let fitted = fit_text(cell, *width - 6.0, TABLE_ROW_SIZE);
        let text_x = if *right_aligned {
            x + width - text_width(&fitted, TABLE_ROW_SIZE)
        } else {
            x
        };
        text_ops(composer.ops(), text_x, baseline, FONT_REGULAR, TABLE_ROW_SIZE, &fitted);
        x += width;
    }
    composer.advance(TABLE_ROW_SIZE * LINE_FACTOR);
}

/// Greedy word wrap against the full text width of the page.
fn wrap_text(text: &str, size: f64, width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate =
            if current.is_empty() { word.to_string() } else { format!("{current} {word}") };
        if text_width(&candidate, size) <= width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Render a quote detail snapshot into PDF bytes.
pub fn render_quote_pdf(detail: &QuoteDetail) -> Result<Vec<u8>, PdfError> {
    let mut composer = PageComposer::new();

    // Header: generation date, centered title with underline.
    composer.text_line_right(
        FONT_REGULAR,
        BODY_SIZE,
        &format!("Date: {}", detail.created_at.format("%Y-%m-%d")),
    );
    composer.advance(BODY_SIZE);

    let title = format!("QUOTE No. {}", detail.id);
    let title_width = text_width(&title, TITLE_SIZE);
    let title_x = (PAGE_WIDTH - title_width) / 2.0;
    composer.text_line_centered(FONT_BOLD, TITLE_SIZE, &title);
    let underline_y = composer.y + TITLE_SIZE * (LINE_FACTOR - 1.0) - 2.0;
    rule_ops(composer.ops(), title_x, title_x + title_width, underline_y);
    composer.advance(BODY_SIZE);

    // Client block.
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, &format!("Client: {}", detail.client.fullname));
    if let Some(company_name) = &detail.client.company_name {
        composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, &format!("Company: {company_name}"));
    }
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, &format!("ID: {}", detail.client.id_number));
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, &format!("Email: {}", detail.client.email));
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, &format!("Contact: {}", detail.client.contact));
    composer.advance(BODY_SIZE * 1.5);

    // Item table with per-line tax decomposition.
    let mut subtotal = 0.0;
    let mut tax_total = 0.0;
    draw_table_header(&mut composer);
    for item in &detail.items {
        let line = decompose_line(item.price, item.quantity, item.tax);
        subtotal += line.base;
        tax_total += line.tax_amount;

        let gross = item.price * item.quantity as f64;
        draw_table_row(
            &mut composer,
            &[
                item.product_name.clone(),
                item.product_description.clone(),
                item.quantity.to_string(),
                format!("{}%", item.tax),
                format_currency(item.price),
                format_currency(gross),
            ],
        );
    }
    let closing_rule_y = composer.y;
    rule_ops(composer.ops(), table_left(), table_right(), closing_rule_y);
    composer.advance(BODY_SIZE * 1.5);

    // Totals: subtotal and tax are derived from the lines, the grand total
    // is the stored quote total.
    composer.text_line_right(
        FONT_BOLD,
        BODY_SIZE,
        &format!("SUBTOTAL: {}", format_currency(round_cents(subtotal))),
    );
    composer.text_line_right(
        FONT_BOLD,
        BODY_SIZE,
        &format!("TAX: {}", format_currency(round_cents(tax_total))),
    );
    composer.text_line_right(
        FONT_BOLD,
        BODY_SIZE,
        &format!("TOTAL: {}", format_currency(detail.total)),
    );
    composer.advance(BODY_SIZE * 1.5);

    // Optional notes.
    if let Some(notes) = detail.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        for line in wrap_text(&format!("Notes: {notes}"), BODY_SIZE, usable) {
            composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, &line);
        }
        composer.advance(BODY_SIZE * 1.5);
    }

    // Fixed business footer plus the creator identity.
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, "Sincerely, Quotedesk Solutions Ltd.");
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, "Phone: 311 222 33 44");
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, "Email: sales@quotedesk.example");
    composer.text_line(MARGIN, FONT_REGULAR, BODY_SIZE, "2nd Street #a-23");
    composer.text_line(
        MARGIN,
        FONT_REGULAR,
        BODY_SIZE,
        &format!("Prepared by: {}", detail.created_by),
    );
    composer.advance(BODY_SIZE);
    composer.text_line_centered(
        FONT_REGULAR,
        CLOSING_SIZE,
        "We look forward to a favorable reply and thank you for your interest.",
    );

    assemble_document(composer.pages)
}

fn assemble_document(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, PdfError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let font_bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => font_regular_id,
            FONT_BOLD => font_bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let encoded = content.encode().map_err(|error| PdfError::Assembly(error.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|error| PdfError::Assembly(error.to_string()))?;
    Ok(bytes)
}

/// Wrap rendered bytes into a download response.
pub fn pdf_response(quote_id: i64, bytes: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"quote_{quote_id}.pdf\""),
        )
        .body(Body::from(bytes))
        .expect("static response parts are valid")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use quotedesk_core::domain::quote::{
        ClientHeader, QuoteDetail, QuoteItemDetail, QuoteStatus,
    };

    use super::render_quote_pdf;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    fn detail(items: Vec<QuoteItemDetail>, total: f64, notes: Option<&str>) -> QuoteDetail {
        QuoteDetail {
            id: 7,
            total,
            status: QuoteStatus::Pending,
            notes: notes.map(str::to_string),
            created_by: "ada".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 2, 10, 30, 0).unwrap(),
            client: ClientHeader {
                id: 1,
                fullname: "Ada Lovelace".to_string(),
                company_name: Some("Analytical Engines".to_string()),
                id_number: "123".to_string(),
                email: "ada@example.com".to_string(),
                contact: "555 0100".to_string(),
            },
            items,
        }
    }

    fn item(price: f64, quantity: i64, tax: i64) -> QuoteItemDetail {
        QuoteItemDetail {
            id: 1,
            product_id: 1,
            price,
            quantity,
            tax,
            product_name: "Control board".to_string(),
            product_description: "Industrial control board".to_string(),
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let detail = detail(vec![item(119.0, 2, 19)], 238.0, Some("deliver by friday"));
        let first = render_quote_pdf(&detail).expect("first render");
        let second = render_quote_pdf(&detail).expect("second render");
        assert_eq!(first, second, "same snapshot must produce identical bytes");
    }

    #[test]
    fn totals_block_shows_the_decomposed_amounts() {
        let detail = detail(vec![item(119.0, 2, 19)], 238.0, None);
        let bytes = render_quote_pdf(&detail).expect("render");

        assert!(contains(&bytes, b"SUBTOTAL: $200.00"));
        assert!(contains(&bytes, b"TAX: $38.00"));
        assert!(contains(&bytes, b"TOTAL: $238.00"));
        assert!(contains(&bytes, b"QUOTE No. 7"));
        assert!(contains(&bytes, b"Ada Lovelace"));
        assert!(!contains(&bytes, b"Notes:"));
    }

    #[test]
    fn notes_appear_when_present() {
        let detail = detail(vec![item(121.0, 1, 21)], 121.0, Some("deliver by friday"));
        let bytes = render_quote_pdf(&detail).expect("render");
        assert!(contains(&bytes, b"Notes: deliver by friday"));
        assert!(contains(&bytes, b"SUBTOTAL: $100.00"));
        assert!(contains(&bytes, b"TAX: $21.00"));
    }

    #[test]
    fn long_item_lists_paginate() {
        let items: Vec<_> = (0..80).map(|_| item(10.0, 1, 0)).collect();
        let detail = detail(items, 800.0, None);
        let bytes = render_quote_pdf(&detail).expect("render");

        let doc = lopdf::Document::load_mem(&bytes).expect("parse rendered pdf");
        assert!(doc.get_pages().len() >= 2, "80 rows cannot fit one page");
    }
}
