use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use headless_chrome::{types::PrintToPdfOptions, Browser, LaunchOptions};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::{AppError, AppResult};
use crate::models::ChatEntry;

pub const EXPORT_TITLE: &str = "Chat Export";
pub const EMPTY_EXPORT_MESSAGE: &str = "No chat history found to export.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Doc,
    Pdf,
    Pptx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Doc => "doc",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Pptx => "pptx",
        }
    }
}

/// `ChatHistory_<YYYY-MM-DD>.<ext>`
pub fn file_name_for(format: ExportFormat, date: NaiveDate) -> String {
    format!("ChatHistory_{}.{}", date.format("%Y-%m-%d"), format.extension())
}

pub fn default_file_name(format: ExportFormat) -> String {
    file_name_for(format, chrono::Local::now().date_naive())
}

/// Writes the transcript to `output_path` in the requested format.
pub fn export_transcript(
    entries: &[ChatEntry],
    format: ExportFormat,
    output_path: &Path,
) -> AppResult<()> {
    if entries.is_empty() {
        return Err(AppError::Export(EMPTY_EXPORT_MESSAGE.to_string()));
    }
    match format {
        ExportFormat::Doc => fs::write(output_path, render_doc_html(entries))?,
        ExportFormat::Pdf => export_pdf(entries, output_path)?,
        ExportFormat::Pptx => fs::write(output_path, build_pptx(entries)?)?,
    }
    info!(path = %output_path.display(), ?format, entries = entries.len(), "exported transcript");
    Ok(())
}

// ============================================================================
// DOC
// ============================================================================

/// HTML document that word processors open as `application/msword`.
pub fn render_doc_html(entries: &[ChatEntry]) -> String {
    let mut content = String::from("<html><head><meta charset=\"utf-8\"><style>");
    content.push_str(
        ".message { margin: 10px 0; padding: 10px; } .user { background: #f0f0f0; } .assistant { background: #f0f0f0; }",
    );
    content.push_str("</style></head><body>");
    content.push_str(&format!("<h1>{}</h1>", EXPORT_TITLE));
    for entry in entries {
        let label = entry.role.label();
        content.push_str(&format!(
            r#"<div class="message {}"><strong>{}:</strong><br/>{}</div>"#,
            label.to_lowercase(),
            label,
            markdown_to_html(&entry.message)
        ));
    }
    content.push_str("</body></html>");
    content
}

// ============================================================================
// PDF
// ============================================================================

pub fn render_pdf_html(entries: &[ChatEntry]) -> String {
    let mut html_content = String::new();
    for entry in entries {
        let label = entry.role.label();
        html_content.push_str(&format!(
            r#"<section class="message {}"><h3 class="role">{}</h3>{}</section>"#,
            label.to_lowercase(),
            label,
            markdown_to_html(&entry.message)
        ));
    }
    generate_full_html(EXPORT_TITLE, &html_content)
}

/// Prints the transcript to PDF with headless Chrome. Blocks the calling thread.
fn export_pdf(entries: &[ChatEntry], output_path: &Path) -> AppResult<()> {
    let full_html = render_pdf_html(entries);

    // Data URLs have size limits, so print from a temporary file.
    let temp_html_path = std::env::temp_dir().join(format!("vartik_export_{}.html", uuid::Uuid::new_v4()));
    fs::write(&temp_html_path, &full_html)?;
    let file_url = format!("file://{}", temp_html_path.to_string_lossy());

    let result = print_to_pdf(&file_url);
    let _ = fs::remove_file(&temp_html_path);

    fs::write(output_path, result?)?;
    Ok(())
}

fn print_to_pdf(file_url: &str) -> AppResult<Vec<u8>> {
    let chrome = |what: &str, e: &dyn std::fmt::Display| AppError::Export(format!("{}: {}", what, e));

    let options = LaunchOptions::default_builder()
        .headless(true)
        .build()
        .map_err(|e| chrome("Failed to build launch options", &e))?;
    let browser = Browser::new(options).map_err(|e| chrome("Failed to launch browser", &e))?;
    let tab = browser
        .new_tab()
        .map_err(|e| chrome("Failed to create tab", &e))?;

    tab.navigate_to(file_url)
        .map_err(|e| chrome("Failed to navigate", &e))?;
    tab.wait_until_navigated()
        .map_err(|e| chrome("Failed to wait for navigation", &e))?;
    std::thread::sleep(Duration::from_millis(300));
    debug!("printing transcript to pdf");

    let pdf_options = PrintToPdfOptions {
        landscape: Some(false),
        display_header_footer: Some(false),
        print_background: Some(true),
        scale: Some(1.0),
        paper_width: Some(8.27),  // A4 width in inches
        paper_height: Some(11.69), // A4 height in inches
        margin_top: Some(0.6),
        margin_bottom: Some(0.6),
        margin_left: Some(0.6),
        margin_right: Some(0.6),
        page_ranges: None,
        ignore_invalid_page_ranges: None,
        header_template: None,
        footer_template: None,
        prefer_css_page_size: Some(true),
        transfer_mode: None,
        generate_tagged_pdf: None,
        generate_document_outline: None,
    };

    tab.print_to_pdf(Some(pdf_options))
        .map_err(|e| chrome("Failed to generate PDF", &e))
}

fn generate_full_html(title: &str, content: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        {css}
    </style>
</head>
<body>
    <h1 class="title">{title}</h1>
    <main class="content">
        {content}
    </main>
</body>
</html>"##,
        title = html_escape(title),
        content = content,
        css = PDF_CSS
    )
}

const PDF_CSS: &str = r##"
@page {
    size: A4;
    margin: 1.5cm;
}

body {
    font-family: 'Segoe UI', Helvetica, Arial, sans-serif;
    font-size: 11pt;
    line-height: 1.5;
    color: #2c2c2c;
    -webkit-print-color-adjust: exact;
    print-color-adjust: exact;
}

.title {
    font-size: 16pt;
    margin-bottom: 1em;
}

.message {
    margin: 0 0 0.8em 0;
    padding: 0.6em 0.8em;
    border-radius: 6px;
    background: #f0f0f0;
    page-break-inside: avoid;
}

.role {
    font-size: 11pt;
    margin: 0 0 0.3em 0;
}

p {
    margin: 0 0 0.5em 0;
}

pre {
    background: #1e1e1e;
    color: #d4d4d4;
    border-radius: 4px;
    padding: 0.6em 0.8em;
    font-size: 9pt;
    white-space: pre-wrap;
}

code {
    font-family: 'Consolas', monospace;
    font-size: 0.9em;
}
"##;

fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut html = String::new();
    let mut in_code_block = false;
    let mut code_lang = String::new();
    let mut code_content = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                html.push_str(&format!("<h{}>", level as u8));
            }
            Event::End(TagEnd::Heading(level)) => {
                html.push_str(&format!("</h{}>", level as u8));
            }
            Event::Start(Tag::Paragraph) => html.push_str("<p>"),
            Event::End(TagEnd::Paragraph) => html.push_str("</p>"),
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code_content.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let lang_class = if code_lang.is_empty() {
                    "plaintext"
                } else {
                    code_lang.as_str()
                };
                html.push_str(&format!(
                    r#"<pre><code class="language-{}">{}</code></pre>"#,
                    html_escape(lang_class),
                    html_escape(&code_content)
                ));
            }
            Event::Start(Tag::List(None)) => html.push_str("<ul>"),
            Event::End(TagEnd::List(false)) => html.push_str("</ul>"),
            Event::Start(Tag::List(Some(_))) => html.push_str("<ol>"),
            Event::End(TagEnd::List(true)) => html.push_str("</ol>"),
            Event::Start(Tag::Item) => html.push_str("<li>"),
            Event::End(TagEnd::Item) => html.push_str("</li>"),
            Event::Start(Tag::BlockQuote(_)) => html.push_str("<blockquote>"),
            Event::End(TagEnd::BlockQuote(_)) => html.push_str("</blockquote>"),
            Event::Start(Tag::Strong) => html.push_str("<strong>"),
            Event::End(TagEnd::Strong) => html.push_str("</strong>"),
            Event::Start(Tag::Emphasis) => html.push_str("<em>"),
            Event::End(TagEnd::Emphasis) => html.push_str("</em>"),
            Event::Code(text) => {
                html.push_str(&format!("<code>{}</code>", html_escape(&text)));
            }
            Event::Text(text) => {
                if in_code_block {
                    code_content.push_str(&text);
                } else {
                    html.push_str(&html_escape(&text));
                }
            }
            // Chat replies use single newlines as line breaks.
            Event::SoftBreak | Event::HardBreak => {
                if in_code_block {
                    code_content.push('\n');
                } else {
                    html.push_str("<br/>");
                }
            }
            Event::Rule => html.push_str("<hr>"),
            Event::Html(raw) | Event::InlineHtml(raw) => html.push_str(&html_escape(&raw)),
            _ => {}
        }
    }

    html
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// PPTX
// ============================================================================

const EMU_PER_INCH: f64 = 914_400.0;
const SLIDE_WIDTH_IN: f64 = 10.0;
const SLIDE_HEIGHT_IN: f64 = 7.5;
const TEXT_X_IN: f64 = 0.5;
const TEXT_WIDTH_IN: f64 = 9.0;
const TITLE_Y_IN: f64 = 0.5;
const FIRST_ENTRY_Y_IN: f64 = 1.0;
const CONTINUED_ENTRY_Y_IN: f64 = 0.5;
const MAX_ENTRY_Y_IN: f64 = 6.0;
const ENTRY_STEP_IN: f64 = 1.0;

/// An entry and the vertical offset (inches) of its text box.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedEntry<'a> {
    pub y: f64,
    pub entry: &'a ChatEntry,
}

/// Lays entries out top-down, starting a new slide once the cursor passes
/// the usable slide height. The first slide also carries the title.
pub fn layout_slides(entries: &[ChatEntry]) -> Vec<Vec<PlacedEntry<'_>>> {
    let mut slides = Vec::new();
    let mut current = Vec::new();
    let mut y = FIRST_ENTRY_Y_IN;

    for entry in entries {
        if y > MAX_ENTRY_Y_IN {
            slides.push(std::mem::take(&mut current));
            y = CONTINUED_ENTRY_Y_IN;
        }
        current.push(PlacedEntry { y, entry });
        y += ENTRY_STEP_IN;
    }
    slides.push(current);
    slides
}

fn emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}

/// Builds the `.pptx` package in memory.
pub fn build_pptx(entries: &[ChatEntry]) -> AppResult<Vec<u8>> {
    let slides = layout_slides(entries);
    let zip_err = |e: zip::result::ZipError| AppError::Export(format!("pptx: {}", e));

    let mut zip_buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut zip_buffer));
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut add = |name: &str, body: &str| -> AppResult<()> {
            zip.start_file(name, options).map_err(zip_err)?;
            zip.write_all(body.as_bytes())?;
            Ok(())
        };

        add("[Content_Types].xml", &content_types_xml(slides.len()))?;
        add("_rels/.rels", ROOT_RELS)?;
        add("ppt/presentation.xml", &presentation_xml(slides.len()))?;
        add(
            "ppt/_rels/presentation.xml.rels",
            &presentation_rels(slides.len()),
        )?;
        add("ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER)?;
        add(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            SLIDE_MASTER_RELS,
        )?;
        add("ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT)?;
        add(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            SLIDE_LAYOUT_RELS,
        )?;
        add("ppt/theme/theme1.xml", THEME)?;

        for (index, placed) in slides.iter().enumerate() {
            let number = index + 1;
            add(
                &format!("ppt/slides/slide{}.xml", number),
                &slide_xml(index == 0, placed),
            )?;
            add(
                &format!("ppt/slides/_rels/slide{}.xml.rels", number),
                SLIDE_RELS,
            )?;
        }

        zip.finish().map_err(zip_err)?;
    }
    Ok(zip_buffer)
}

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const GROUP_PROPS: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

fn slide_xml(with_title: bool, placed: &[PlacedEntry<'_>]) -> String {
    let mut shapes = String::new();
    let mut shape_id = 2;

    if with_title {
        let title = run_paragraph(EXPORT_TITLE, 2400, true);
        shapes.push_str(&text_box(shape_id, TITLE_Y_IN, 0.5, &title));
        shape_id += 1;
    }

    for item in placed {
        let mut paragraphs = run_paragraph(&format!("{}:", item.entry.role.label()), 1600, true);
        for line in item.entry.message.lines() {
            paragraphs.push_str(&run_paragraph(line, 1600, false));
        }
        shapes.push_str(&text_box(shape_id, item.y, ENTRY_STEP_IN, &paragraphs));
        shape_id += 1;
    }

    format!(
        r#"{XML_DECL}<p:sld {NS}><p:cSld><p:spTree>{GROUP_PROPS}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn text_box(id: usize, y: f64, height: f64, paragraphs: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:spAutoFit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        x = emu(TEXT_X_IN),
        y = emu(y),
        cx = emu(TEXT_WIDTH_IN),
        cy = emu(height),
    )
}

fn run_paragraph(text: &str, size: u32, bold: bool) -> String {
    if text.is_empty() {
        return "<a:p/>".to_string();
    }
    format!(
        r#"<a:p><a:r><a:rPr lang="en-US" sz="{size}" b="{b}" dirty="0"><a:solidFill><a:srgbClr val="363636"/></a:solidFill></a:rPr><a:t>{text}</a:t></a:r></a:p>"#,
        b = if bold { 1 } else { 0 },
        text = html_escape(text),
    )
}

fn content_types_xml(slide_count: usize) -> String {
    let slides: String = (1..=slide_count)
        .map(|n| format!(r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#))
        .collect();
    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>{slides}</Types>"#
    )
}

fn presentation_xml(slide_count: usize) -> String {
    let ids: String = (0..slide_count)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
        .collect();
    format!(
        r#"{XML_DECL}<p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{cx}" cy="{cy}" type="screen4x3"/><p:notesSz cx="{cy}" cy="{cx}"/></p:presentation>"#,
        cx = emu(SLIDE_WIDTH_IN),
        cy = emu(SLIDE_HEIGHT_IN),
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let slides: String = (0..slide_count)
        .map(|i| format!(r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#, i + 2, i + 1))
        .collect();
    format!(
        r#"{XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>{slides}<Relationship Id="rId{theme}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="theme/theme1.xml"/></Relationships>"#,
        theme = slide_count + 2,
    )
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#;

const SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#;

const SLIDE_MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/></Relationships>"#;

const SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#;

const SLIDE_LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#;

const SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/></Relationships>"#;

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Vartik"><a:themeElements><a:clrScheme name="Vartik"><a:dk1><a:srgbClr val="000000"/></a:dk1><a:lt1><a:srgbClr val="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="363636"/></a:dk2><a:lt2><a:srgbClr val="F0F0F0"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Vartik"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Vartik"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn transcript(count: usize) -> Vec<ChatEntry> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    ChatEntry::user(&format!("question-{:02}", i))
                } else {
                    ChatEntry::assistant(&format!("answer-{:02}\nsecond line", i))
                }
            })
            .collect()
    }

    fn assert_each_once_in_order(haystack: &str, entries: &[ChatEntry]) {
        let mut last = 0;
        for entry in entries {
            let marker = entry.message.lines().next().unwrap();
            assert_eq!(haystack.matches(marker).count(), 1, "{marker} not exactly once");
            let at = haystack.find(marker).unwrap();
            assert!(at >= last, "{marker} out of order");
            last = at;
        }
    }

    #[test]
    fn doc_export_lists_every_entry_once() {
        let entries = transcript(5);
        let html = render_doc_html(&entries);
        assert!(html.contains("<h1>Chat Export</h1>"));
        assert!(html.contains(r#"<div class="message assistant"><strong>Assistant:</strong>"#));
        assert!(html.contains("answer-01<br/>second line"));
        assert_each_once_in_order(&html, &entries);
    }

    #[test]
    fn pdf_page_escapes_and_orders_entries() {
        let mut entries = transcript(3);
        entries.push(ChatEntry::user("is 1 < 2 & **bold**?"));
        let html = render_pdf_html(&entries);
        assert!(html.contains("1 &lt; 2 &amp; <strong>bold</strong>"));
        assert_each_once_in_order(&html, &entries[..3]);
    }

    #[test]
    fn raw_html_in_messages_is_escaped() {
        let html = render_doc_html(&[ChatEntry::assistant("<script>alert(1)</script>")]);
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn slides_paginate_when_cursor_passes_height() {
        let entries = transcript(13);
        let slides = layout_slides(&entries);
        let sizes: Vec<usize> = slides.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![6, 6, 1]);
        assert_eq!(slides[0][0].y, FIRST_ENTRY_Y_IN);
        assert_eq!(slides[1][0].y, CONTINUED_ENTRY_Y_IN);
        assert_eq!(layout_slides(&[]).len(), 1);
    }

    #[test]
    fn pptx_package_holds_every_entry_once() {
        let entries = transcript(13);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(file_name_for(
            ExportFormat::Pptx,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        ));
        assert!(path.ends_with("ChatHistory_2024-05-01.pptx"));
        export_transcript(&entries, ExportFormat::Pptx, &path).unwrap();

        let mut archive = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
        let mut text = String::new();
        for n in 1..=3 {
            let mut slide = archive
                .by_name(&format!("ppt/slides/slide{}.xml", n))
                .unwrap();
            slide.read_to_string(&mut text).unwrap();
        }
        assert!(archive.by_name("ppt/slides/slide4.xml").is_err());
        assert_eq!(text.matches(EXPORT_TITLE).count(), 1);
        assert_each_once_in_order(&text, &entries);

        let mut presentation = String::new();
        archive
            .by_name("ppt/presentation.xml")
            .unwrap()
            .read_to_string(&mut presentation)
            .unwrap();
        assert_eq!(presentation.matches("<p:sldId ").count(), 3);
    }

    #[test]
    fn empty_transcript_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = export_transcript(&[], ExportFormat::Doc, &dir.path().join("x.doc")).unwrap_err();
        assert!(matches!(err, AppError::Export(ref m) if m == EMPTY_EXPORT_MESSAGE));
        assert!(!dir.path().join("x.doc").exists());
    }
}
