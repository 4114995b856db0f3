use std::fs::File;
use std::io::Write;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use thiserror::Error;

// A4 in PDF points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;

const TITLE_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 12.0;
const LINE_HEIGHT: f32 = 18.0;
const TITLE_LINE_HEIGHT: f32 = 28.0;
const HEADING_GAP: f32 = 12.0;
const NOTE_INDENT: f32 = 28.0;

// Helvetica averages a little over half an em per glyph.
const AVG_GLYPH_WIDTH: f32 = 0.55;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to build PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to serialize PDF: {0}")]
    Serialize(String),

    #[error("failed to write report: {0}")]
    Write(#[source] std::io::Error),

    #[error("render task failed: {0}")]
    Task(String),
}

#[async_trait::async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Writes the finished report into `output`. The caller owns the file's path.
    async fn render(&self, title: &str, analysis: &str, output: File) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Heading,
    Note,
    Body,
}

impl LineStyle {
    fn font(&self) -> &'static str {
        match self {
            LineStyle::Title | LineStyle::Heading => "F2",
            LineStyle::Note => "F3",
            LineStyle::Body => "F1",
        }
    }

    fn size(&self) -> f32 {
        match self {
            LineStyle::Title => TITLE_SIZE,
            _ => BODY_SIZE,
        }
    }
}

/// `1.`, `12.` → heading; `-` → note; anything else → body. A decimal such
/// as `12.5` is not a list marker.
pub fn classify(line: &str) -> LineStyle {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    let mut after = line[digits..].chars();
    let is_marker = digits > 0
        && after.next() == Some('.')
        && !after.next().is_some_and(|c| c.is_ascii_digit());
    if is_marker {
        LineStyle::Heading
    } else if line.starts_with('-') {
        LineStyle::Note
    } else {
        LineStyle::Body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub style: LineStyle,
    pub text: String,
    pub x: f32,
    pub y: f32,
}

pub type Page = Vec<PlacedLine>;

fn estimate_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_WIDTH
}

fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        // Words longer than a whole line are hard-split.
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let split_at = word
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            let rest = word.split_off(split_at);
            lines.push(word);
            word = rest;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lays the title and analysis out on pages. Pure: identical input gives identical pages.
pub fn paginate(title: &str, analysis: &str) -> Vec<Page> {
    let mut pages: Vec<Page> = vec![Vec::new()];
    let mut y = PAGE_HEIGHT - MARGIN;
    let usable_width = PAGE_WIDTH - 2.0 * MARGIN;

    let title_x = ((PAGE_WIDTH - estimate_width(title, TITLE_SIZE)) / 2.0).max(MARGIN);
    y -= TITLE_SIZE;
    pages[0].push(PlacedLine {
        style: LineStyle::Title,
        text: title.to_string(),
        x: title_x,
        y,
    });
    y -= TITLE_LINE_HEIGHT - TITLE_SIZE;

    for raw in analysis.lines() {
        let style = classify(raw);
        let indent = if style == LineStyle::Note { NOTE_INDENT } else { 0.0 };
        let max_chars = (((usable_width - indent) / (BODY_SIZE * AVG_GLYPH_WIDTH)) as usize).max(1);

        if style == LineStyle::Heading {
            y -= HEADING_GAP;
        }

        for segment in wrap(raw, max_chars) {
            if y - LINE_HEIGHT < MARGIN {
                pages.push(Vec::new());
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= LINE_HEIGHT;
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    style,
                    text: segment,
                    x: MARGIN + indent,
                    y,
                });
            }
        }
    }

    pages
}

/// Maps text onto WinAnsi bytes for the standard Type1 fonts.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201C}' | '\u{201D}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            '\u{2022}' => 0x95,
            '\t' => b' ',
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) <= 0x7E || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

fn page_operations(page: &Page) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(page.len() * 5);
    for line in page {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![line.style.font().into(), line.style.size().into()],
        ));
        ops.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(&line.text))],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

pub fn build_document(title: &str, analysis: &str) -> Result<Document, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font = |base: &str| {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base.to_string(),
            "Encoding" => "WinAnsiEncoding",
        })
    };
    let regular = font("Helvetica");
    let bold = font("Helvetica-Bold");
    let oblique = font("Helvetica-Oblique");

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
            "F3" => oblique,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in paginate(title, analysis) {
        let content = Content {
            operations: page_operations(&page),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

pub fn render_pdf(title: &str, analysis: &str) -> Result<Vec<u8>, RenderError> {
    let mut doc = build_document(title, analysis)?;
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| RenderError::Serialize(e.to_string()))?;
    Ok(buf)
}

/// Renders analysis reports with the built-in Helvetica family.
pub struct PdfReportRenderer;

#[async_trait::async_trait]
impl ReportRenderer for PdfReportRenderer {
    #[tracing::instrument(
        name = "pipeline_stage render",
        skip(self, title, analysis, output),
        fields(pipeline.stage = "render", render.bytes)
    )]
    async fn render(&self, title: &str, analysis: &str, output: File) -> Result<(), RenderError> {
        let title = title.to_string();
        let analysis = analysis.to_string();
        let written = tokio::task::spawn_blocking(move || write_report(&title, &analysis, output))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))??;

        tracing::Span::current().record("render.bytes", written);
        Ok(())
    }
}

fn write_report(title: &str, analysis: &str, mut output: File) -> Result<usize, RenderError> {
    let bytes = render_pdf(title, analysis)?;
    output.write_all(&bytes).map_err(RenderError::Write)?;
    output.flush().map_err(RenderError::Write)?;
    Ok(bytes.len())
}
