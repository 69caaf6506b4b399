//! Minimal PDF 1.4 writer: Letter pages, the two standard Helvetica faces, left-aligned text.

use std::fmt::Write as _;

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    const fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Default)]
pub struct PdfDocument {
    pages: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl PdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        let mut op = String::new();
        let _ = write!(op, "BT /{} {size} Tf {x} {y} Td (", font.resource());
        self.current.extend_from_slice(op.as_bytes());
        self.current.extend(encode_text(text));
        self.current.extend_from_slice(b") Tj ET\n");
    }

    pub fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.new_page();
        let page_count = self.pages.len();
        // 1 catalog, 2 page tree, 3-4 fonts, then a page/content pair per page.
        let page_ids: Vec<usize> = (0..page_count).map(|index| 5 + index * 2).collect();

        let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::new();

        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        let mut objects: Vec<Vec<u8>> = vec![
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>").into_bytes(),
            font_object("Helvetica"),
            font_object("Helvetica-Bold"),
        ];
        for (index, content) in self.pages.into_iter().enumerate() {
            let content_id = page_ids[index] + 1;
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_id} 0 R >>"
                )
                .into_bytes(),
            );
            let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            stream.extend(content);
            stream.extend_from_slice(b"\nendstream");
            objects.push(stream);
        }

        for (index, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj\n", index + 1).into_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_at = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(xref, "{offset:010} 00000 n ");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        );
        out.extend(xref.into_bytes());
        out
    }
}

fn font_object(base: &str) -> Vec<u8> {
    format!("<< /Type /Font /Subtype /Type1 /BaseFont /{base} /Encoding /WinAnsiEncoding >>")
        .into_bytes()
}

/// Escapes a string literal and maps it onto WinAnsi; unmappable characters become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                bytes.push(b'\\');
                bytes.push(c as u8);
            }
            ' '..='~' => bytes.push(c as u8),
            '\u{a0}'..='\u{ff}' => bytes.push(c as u32 as u8),
            '\u{20ac}' => bytes.push(0x80),
            '\u{2018}' => bytes.push(0x91),
            '\u{2019}' => bytes.push(0x92),
            '\u{201c}' => bytes.push(0x93),
            '\u{201d}' => bytes.push(0x94),
            '\u{2022}' => bytes.push(0x95),
            '\u{2013}' => bytes.push(0x96),
            '\u{2014}' => bytes.push(0x97),
            _ => bytes.push(b'?'),
        }
    }
    bytes
}
