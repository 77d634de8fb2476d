//! Prescription PDF.
//!
//! Layout and painting are separate: [`layout_prescription`] is a pure
//! function producing positioned text runs, [`PdfRenderer`] paints them with
//! `printpdf` on A4 pages. Document id and dates come from the prescription,
//! so repeated renders carry the same layout and metadata.
//!
//! The builtin Helvetica only covers Latin-1. Names or notes in Devanagari
//! need a TrueType font (`notifications.pdf_font`); without one such text is
//! logged and painted unreadable.

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Datelike, NaiveDate};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use tracing::{debug, warn};

use super::document::{display_date, PrescriptionDocument};
use super::{NotifyError, NotifyResult};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
/// Content never goes below this line; the footer lives under it.
const CONTENT_BOTTOM: f32 = 30.0;
const LEFT: f32 = 14.0;
const RIGHT_COLUMN: f32 = 120.0;

const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 14.0;
const TABLE_SIZE: f32 = 8.0;
const FOOTER_SIZE: f32 = 8.0;
const LINE_HEIGHT: f32 = 6.0;
const TABLE_LINE_HEIGHT: f32 = 4.5;

pub const FOOTER_DISCLAIMER: &str =
    "This is a digitally generated prescription. No physical signature required.";
pub const FOOTER_CONTACT: &str = "For queries, contact: support@sehatrakshak.com";

/// Table columns: header, x offset (mm), wrap width (chars).
const COLUMNS: [(&str, f32, usize); 7] = [
    ("#", 14.0, 3),
    ("Medicine", 22.0, 26),
    ("Dosage", 70.0, 14),
    ("Frequency", 96.0, 10),
    ("Timing", 118.0, 14),
    ("Duration", 144.0, 10),
    ("Instructions", 164.0, 22),
];

/// One piece of text at a fixed position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Zero-based page index
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
    pub text: String,
}

/// The laid-out document.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub title: String,
    pub page_count: usize,
    pub runs: Vec<TextRun>,
}

impl PdfLayout {
    /// All text in paint order, one run per line.
    pub fn text_lines(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Runs the builtin font cannot draw.
    pub fn non_latin_runs(&self) -> Vec<&TextRun> {
        self.runs.iter().filter(|r| !is_latin1(&r.text)).collect()
    }
}

fn is_latin1(text: &str) -> bool {
    text.chars().all(|c| u32::from(c) <= 0xFF)
}

/// Cursor that breaks onto a new page when content would cross the bottom
/// margin.
struct Cursor {
    page: usize,
    y: f32,
    runs: Vec<TextRun>,
}

impl Cursor {
    fn new() -> Self {
        Self {
            page: 0,
            y: TOP,
            runs: Vec::new(),
        }
    }

    /// Make room for `height` mm, starting a new page if needed.
    fn reserve(&mut self, height: f32) {
        if self.y - height < CONTENT_BOTTOM {
            self.page += 1;
            self.y = TOP;
        }
    }

    fn text_at(&mut self, x: f32, size: f32, bold: bool, text: impl Into<String>) {
        self.runs.push(TextRun {
            page: self.page,
            x,
            y: self.y,
            size,
            bold,
            text: text.into(),
        });
    }

    fn line(&mut self, size: f32, bold: bool, text: impl Into<String>) {
        self.reserve(LINE_HEIGHT);
        self.text_at(LEFT, size, bold, text);
        self.y -= LINE_HEIGHT;
    }

    fn heading(&mut self, text: &str) {
        self.y -= 4.0;
        // Keep a heading with at least one line under it
        self.reserve(8.0 + LINE_HEIGHT);
        self.text_at(LEFT, HEADING_SIZE, true, text);
        self.y -= 8.0;
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap_text(text, 95) {
            self.line(BODY_SIZE, false, line);
        }
    }
}

/// Lay out a prescription on A4 pages.
pub fn layout_prescription(doc: &PrescriptionDocument) -> PdfLayout {
    let mut c = Cursor::new();

    // Header
    c.text_at(80.0, 24.0, true, "SEHAT RAKSHAK");
    c.y -= 10.0;
    c.text_at(88.0, 12.0, false, "Digital Prescription");
    c.y -= 14.0;

    // Patient block
    c.heading("Patient Information");
    c.text_at(LEFT, BODY_SIZE, false, format!("Name: {}", doc.patient_name));
    c.text_at(RIGHT_COLUMN, BODY_SIZE, false, format!("MRN: {}", doc.patient_mrn));
    c.y -= LINE_HEIGHT;
    c.text_at(LEFT, BODY_SIZE, false, format!("Age: {} years", doc.patient_age));
    c.text_at(70.0, BODY_SIZE, false, format!("Gender: {}", doc.patient_gender));
    c.text_at(RIGHT_COLUMN, BODY_SIZE, false, format!("Mobile: {}", doc.patient_mobile));
    c.y -= LINE_HEIGHT;
    c.text_at(LEFT, BODY_SIZE, false, format!("Date: {}", doc.display_date()));
    if let Some(follow_up) = doc.follow_up_date {
        c.text_at(
            RIGHT_COLUMN,
            BODY_SIZE,
            false,
            format!("Follow-up: {}", display_date(follow_up)),
        );
    }
    c.y -= LINE_HEIGHT;

    c.heading("Diagnosis");
    c.paragraph(&doc.diagnosis);

    if let Some(notes) = doc.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        c.heading("Clinical Notes");
        c.paragraph(notes);
    }

    // Medication table
    c.heading("Prescribed Medications");
    table_header(&mut c);
    for (i, med) in doc.medications.iter().enumerate() {
        let cells = [
            (i + 1).to_string(),
            med.medicine_name.clone(),
            med.dosage.clone(),
            med.frequency.clone(),
            med.timing.clone(),
            format!("{} days", med.duration_days),
            med.instructions
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "-".into()),
        ];
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(COLUMNS.iter())
            .map(|(cell, (_, _, width))| wrap_text(cell, *width))
            .collect();
        let height = wrapped.iter().map(Vec::len).max().unwrap_or(1) as f32 * TABLE_LINE_HEIGHT;

        if c.y - height < CONTENT_BOTTOM {
            c.reserve(height + TABLE_LINE_HEIGHT + 2.0);
            table_header(&mut c);
        }
        for (lines, (_, x, _)) in wrapped.iter().zip(COLUMNS.iter()) {
            for (n, line) in lines.iter().enumerate() {
                c.runs.push(TextRun {
                    page: c.page,
                    x: *x,
                    y: c.y - n as f32 * TABLE_LINE_HEIGHT,
                    size: TABLE_SIZE,
                    bold: false,
                    text: line.clone(),
                });
            }
        }
        c.y -= height + 1.5;
    }

    // Signature block
    c.y -= 14.0;
    c.reserve(3.0 * LINE_HEIGHT);
    c.text_at(RIGHT_COLUMN, BODY_SIZE, false, "________________________________");
    c.y -= LINE_HEIGHT;
    c.text_at(RIGHT_COLUMN, BODY_SIZE, false, format!("Dr. {}", doc.doctor_name));
    c.y -= LINE_HEIGHT;
    c.text_at(RIGHT_COLUMN, BODY_SIZE, false, "Digital Signature");

    // Footer on every page
    let page_count = c.page + 1;
    for page in 0..page_count {
        c.runs.push(TextRun {
            page,
            x: 45.0,
            y: 17.0,
            size: FOOTER_SIZE,
            bold: false,
            text: FOOTER_DISCLAIMER.into(),
        });
        c.runs.push(TextRun {
            page,
            x: 70.0,
            y: 12.0,
            size: FOOTER_SIZE,
            bold: false,
            text: FOOTER_CONTACT.into(),
        });
    }

    PdfLayout {
        title: format!("Prescription {} {}", doc.patient_mrn, doc.prescription_date),
        page_count,
        runs: c.runs,
    }
}

fn table_header(c: &mut Cursor) {
    c.reserve(TABLE_LINE_HEIGHT * 2.0);
    for (title, x, _) in COLUMNS {
        c.text_at(x, 9.0, true, title);
    }
    c.y -= TABLE_LINE_HEIGHT + 1.5;
}

/// Paints prescription layouts with builtin Helvetica, or with an embedded
/// TrueType font when one is configured.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    font: Option<Arc<[u8]>>,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed `font` (TrueType bytes) for every run.
    pub fn with_font(font: Vec<u8>) -> Self {
        Self {
            font: Some(font.into()),
        }
    }

    /// Load the configured font, or keep the builtin one when `path` is
    /// `None`.
    pub fn from_font_file(path: Option<&Path>) -> NotifyResult<Self> {
        match path {
            Some(path) => {
                let font = std::fs::read(path)?;
                debug!(path = %path.display(), bytes = font.len(), "Loaded PDF font");
                Ok(Self::with_font(font))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn has_embedded_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render the prescription to PDF bytes.
    pub fn render(&self, doc: &PrescriptionDocument) -> NotifyResult<Vec<u8>> {
        let layout = layout_prescription(doc);
        let stamp = document_timestamp(doc.prescription_date)?;

        let (pdf, first_page, first_layer) =
            PdfDocument::new(&layout.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let pdf = pdf
            .with_document_id(doc.prescription_id.replace('-', ""))
            .with_creation_date(stamp)
            .with_mod_date(stamp);

        let (regular, bold) = match &self.font {
            Some(font) => {
                let embedded = pdf
                    .add_external_font(&font[..])
                    .map_err(|e| NotifyError::Pdf(format!("font error: {e}")))?;
                (embedded.clone(), embedded)
            }
            None => {
                let unreadable = layout.non_latin_runs().len();
                if unreadable > 0 {
                    warn!(
                        prescription_id = %doc.prescription_id,
                        runs = unreadable,
                        "Prescription text outside Latin-1 cannot be drawn without notifications.pdf_font"
                    );
                }
                let regular = pdf
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|e| NotifyError::Pdf(format!("font error: {e}")))?;
                let bold = pdf
                    .add_builtin_font(BuiltinFont::HelveticaBold)
                    .map_err(|e| NotifyError::Pdf(format!("font error: {e}")))?;
                (regular, bold)
            }
        };

        let mut layers = vec![pdf.get_page(first_page).get_layer(first_layer)];
        for n in 1..layout.page_count {
            let (page, layer) =
                pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", n + 1));
            layers.push(pdf.get_page(page).get_layer(layer));
        }

        for run in &layout.runs {
            let font = if run.bold { &bold } else { &regular };
            layers[run.page].use_text(run.text.as_str(), run.size, Mm(run.x), Mm(run.y), font);
        }

        let mut buf = BufWriter::new(Vec::new());
        pdf.save(&mut buf)
            .map_err(|e| NotifyError::Pdf(format!("save error: {e}")))?;
        let bytes = buf
            .into_inner()
            .map_err(|e| NotifyError::Pdf(format!("buffer error: {e}")))?;

        debug!(
            prescription_id = %doc.prescription_id,
            pages = layout.page_count,
            bytes = bytes.len(),
            "Rendered prescription PDF"
        );
        Ok(bytes)
    }

    /// Render as a `data:application/pdf;base64,...` URL.
    pub fn data_url(&self, doc: &PrescriptionDocument) -> NotifyResult<String> {
        let bytes = self.render(doc)?;
        Ok(format!("data:application/pdf;base64,{}", STANDARD.encode(bytes)))
    }

    /// Render into `dir` as `Prescription_<MRN>_<YYYY-MM-DD>.pdf`, replacing
    /// any earlier render of the same prescription. Returns the written path.
    pub fn write(&self, doc: &PrescriptionDocument, dir: &Path) -> NotifyResult<PathBuf> {
        let bytes = self.render(doc)?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(pdf_filename(&doc.patient_mrn, doc.prescription_date));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Render with the builtin font.
pub fn render_pdf(doc: &PrescriptionDocument) -> NotifyResult<Vec<u8>> {
    PdfRenderer::default().render(doc)
}

/// [`PdfRenderer::data_url`] with the builtin font.
pub fn pdf_data_url(doc: &PrescriptionDocument) -> NotifyResult<String> {
    PdfRenderer::default().data_url(doc)
}

/// [`PdfRenderer::write`] with the builtin font.
pub fn write_pdf(doc: &PrescriptionDocument, dir: &Path) -> NotifyResult<PathBuf> {
    PdfRenderer::default().write(doc, dir)
}

/// Download file name for a prescription.
pub fn pdf_filename(mrn: &str, date: NaiveDate) -> String {
    format!("Prescription_{}_{}.pdf", mrn, date.format("%Y-%m-%d"))
}

/// Midnight UTC of the prescription date.
fn document_timestamp(date: NaiveDate) -> NotifyResult<time::OffsetDateTime> {
    let month = time::Month::try_from(date.month() as u8)
        .map_err(|e| NotifyError::Pdf(format!("invalid month: {e}")))?;
    let day = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
        .map_err(|e| NotifyError::Pdf(format!("invalid date: {e}")))?;
    Ok(day.midnight().assume_utc())
}

/// Greedy word wrap at `max_chars`.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
