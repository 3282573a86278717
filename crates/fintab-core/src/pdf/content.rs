//! Content stream interpretation: glyph positions and ruling lines.

use std::collections::BTreeMap;
use std::rc::Rc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, trace};

use super::font::{number, FontInfo};
use super::{PageLayout, Result, Rule, TextChar};
use crate::error::PdfError;

/// Form XObjects nested deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 8;

/// A PDF transformation matrix `[a b c d e f]` (row-vector convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f64> = operands.iter().filter_map(number).collect();
        if v.len() != 6 {
            return None;
        }
        Some(Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.a + y * self.c + self.e, x * self.b + y * self.d + self.f)
    }

    fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Rc<FontInfo>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Resolved resources for one content stream level.
struct Resources {
    fonts: BTreeMap<Vec<u8>, Rc<FontInfo>>,
    xobjects: Option<Dictionary>,
}

impl Resources {
    fn load(doc: &Document, dict: Option<&Dictionary>) -> Self {
        let mut fonts = BTreeMap::new();
        let mut xobjects = None;

        if let Some(dict) = dict {
            if let Some(Object::Dictionary(font_dict)) = resolve(doc, dict.get(b"Font").ok()) {
                for (name, obj) in font_dict.iter() {
                    if let Ok((_, Object::Dictionary(font))) = doc.dereference(obj) {
                        fonts.insert(name.clone(), Rc::new(FontInfo::from_dict(doc, font)));
                    }
                }
            }
            if let Some(Object::Dictionary(xobj)) = resolve(doc, dict.get(b"XObject").ok()) {
                xobjects = Some(xobj.clone());
            }
        }

        Self { fonts, xobjects }
    }
}

fn resolve<'a>(doc: &'a Document, obj: Option<&'a Object>) -> Option<&'a Object> {
    obj.and_then(|o| doc.dereference(o).ok().map(|(_, o)| o))
}

/// Interprets content streams into a [`PageLayout`].
pub(crate) struct PageInterpreter<'a> {
    doc: &'a Document,
    page: u32,
    origin_x: f64,
    page_top: f64,
    chars: Vec<TextChar>,
    rules: Vec<Rule>,
    images: usize,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    path: Vec<(f64, f64)>,
    subpath_start: Option<(f64, f64)>,
    pending: Vec<Rule>,
}

impl<'a> PageInterpreter<'a> {
    /// `media_box` is `[llx, lly, urx, ury]` in PDF user space.
    pub fn new(doc: &'a Document, page: u32, media_box: [f64; 4]) -> Self {
        Self {
            doc,
            page,
            origin_x: media_box[0],
            page_top: media_box[3],
            chars: Vec::new(),
            rules: Vec::new(),
            images: 0,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            path: Vec::new(),
            subpath_start: None,
            pending: Vec::new(),
        }
    }

    /// Run the page content stream and return the collected layout.
    pub fn run(
        mut self,
        content: &[u8],
        resources: Option<&Dictionary>,
        media_box: [f64; 4],
    ) -> Result<PageLayout> {
        let resources = Resources::load(self.doc, resources);
        self.interpret(content, &resources, 0)?;

        debug!(
            "Page {}: {} glyphs, {} rules, {} images",
            self.page,
            self.chars.len(),
            self.rules.len(),
            self.images
        );

        Ok(PageLayout {
            page: self.page,
            width: media_box[2] - media_box[0],
            height: media_box[3] - media_box[1],
            chars: self.chars,
            rules: self.rules,
            images: self.images,
        })
    }

    fn interpret(&mut self, data: &[u8], resources: &Resources, depth: usize) -> Result<()> {
        let content = Content::decode(data).map_err(|e| PdfError::Content {
            page: self.page,
            reason: e.to_string(),
        })?;

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.state.ctm = m.then(&self.state.ctm);
                    }
                }
                "BT" => {
                    self.text_matrix = Matrix::IDENTITY;
                    self.line_matrix = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.state.font = Some(
                            resources
                                .fonts
                                .get(name)
                                .cloned()
                                .unwrap_or_else(|| Rc::new(FontInfo::fallback())),
                        );
                    }
                    if let Some(size) = operands.get(1).and_then(number) {
                        self.state.font_size = size;
                    }
                }
                "Tc" => self.set_from(operands, |s, v| s.char_spacing = v),
                "Tw" => self.set_from(operands, |s, v| s.word_spacing = v),
                "Tz" => self.set_from(operands, |s, v| s.horizontal_scale = v / 100.0),
                "TL" => self.set_from(operands, |s, v| s.leading = v),
                "Ts" => self.set_from(operands, |s, v| s.rise = v),
                "Td" => {
                    let (tx, ty) = pair(operands);
                    self.move_line(tx, ty);
                }
                "TD" => {
                    let (tx, ty) = pair(operands);
                    self.state.leading = -ty;
                    self.move_line(tx, ty);
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.text_matrix = m;
                        self.line_matrix = m;
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show_text(bytes);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show_text(bytes);
                    }
                }
                "\"" => {
                    if let Some(aw) = operands.first().and_then(number) {
                        self.state.word_spacing = aw;
                    }
                    if let Some(ac) = operands.get(1).and_then(number) {
                        self.state.char_spacing = ac;
                    }
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show_text(bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show_text(bytes),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * self.state.font_size
                                            * self.state.horizontal_scale;
                                        self.advance(tx);
                                    }
                                }
                            }
                        }
                    }
                }
                "m" => {
                    let p = self.user_point(operands);
                    self.path.clear();
                    self.path.push(p);
                    self.subpath_start = Some(p);
                }
                "l" => {
                    let p = self.user_point(operands);
                    if let Some(last) = self.path.last().copied() {
                        if let Some(rule) = Rule::between(last, p) {
                            self.pending.push(rule);
                        }
                    }
                    self.path.push(p);
                }
                "c" | "v" | "y" => {
                    // Curves never form ruling lines; keep the current point.
                    if operands.len() >= 2 {
                        let p = self.user_point(&operands[operands.len() - 2..]);
                        self.path.push(p);
                    }
                }
                "h" => self.close_subpath(),
                "re" => {
                    let v: Vec<f64> = operands.iter().filter_map(number).collect();
                    if v.len() == 4 {
                        self.rectangle(v[0], v[1], v[2], v[3]);
                    }
                }
                "S" | "f" | "F" | "f*" | "B" | "B*" => self.paint(),
                "s" | "b" | "b*" => {
                    self.close_subpath();
                    self.paint();
                }
                "n" => self.discard_path(),
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.invoke_xobject(name, resources, depth)?;
                    }
                }
                "BI" => self.images += 1,
                _ => {}
            }
        }

        Ok(())
    }

    fn set_from(&mut self, operands: &[Object], apply: impl Fn(&mut GraphicsState, f64)) {
        if let Some(v) = operands.first().and_then(number) {
            apply(&mut self.state, v);
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    fn advance(&mut self, tx: f64) {
        self.text_matrix = Matrix::translate(tx, 0.0).then(&self.text_matrix);
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let font = self
            .state
            .font
            .clone()
            .unwrap_or_else(|| Rc::new(FontInfo::fallback()));
        let fs = self.state.font_size;
        let th = self.state.horizontal_scale;
        let rise = self.state.rise;

        for glyph in font.decode(bytes) {
            let glyph_advance = glyph.width / 1000.0 * fs * th;
            let device = self.text_matrix.then(&self.state.ctm);
            let start = device.apply(0.0, rise);
            let end = device.apply(glyph_advance, rise);
            let size = (fs * device.vertical_scale()).abs();
            let baseline = self.page_top - start.1;

            self.chars.push(TextChar {
                text: glyph.text,
                x0: start.0.min(end.0) - self.origin_x,
                x1: start.0.max(end.0) - self.origin_x,
                top: baseline - size,
                bottom: baseline,
                size,
            });

            let mut spacing = self.state.char_spacing;
            if glyph.code == 32 && !font.is_two_byte() {
                spacing += self.state.word_spacing;
            }
            self.advance(glyph_advance + spacing * th);
        }
    }

    fn user_point(&self, operands: &[Object]) -> (f64, f64) {
        let (x, y) = pair(operands);
        let (dx, dy) = self.state.ctm.apply(x, y);
        (dx - self.origin_x, self.page_top - dy)
    }

    fn rectangle(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
        let points: Vec<(f64, f64)> = corners
            .iter()
            .map(|(cx, cy)| {
                let (dx, dy) = self.state.ctm.apply(*cx, *cy);
                (dx - self.origin_x, self.page_top - dy)
            })
            .collect();

        // A hairline rectangle is a single rule.
        let width = (points[1].0 - points[0].0).abs().max((points[1].1 - points[0].1).abs());
        let height = (points[3].0 - points[0].0).abs().max((points[3].1 - points[0].1).abs());
        if height < 2.0 || width < 2.0 {
            let xs = points.iter().map(|p| p.0);
            let ys = points.iter().map(|p| p.1);
            let x0 = xs.clone().fold(f64::INFINITY, f64::min);
            let x1 = xs.fold(f64::NEG_INFINITY, f64::max);
            let top = ys.clone().fold(f64::INFINITY, f64::min);
            let bottom = ys.fold(f64::NEG_INFINITY, f64::max);
            let mid_y = (top + bottom) / 2.0;
            let mid_x = (x0 + x1) / 2.0;
            let rule = if height < 2.0 && width >= 2.0 {
                Rule::between((x0, mid_y), (x1, mid_y))
            } else {
                Rule::between((mid_x, top), (mid_x, bottom))
            };
            self.pending.extend(rule);
        } else {
            for i in 0..4 {
                if let Some(rule) = Rule::between(points[i], points[(i + 1) % 4]) {
                    self.pending.push(rule);
                }
            }
        }

        self.path.clear();
        self.subpath_start = None;
    }

    fn close_subpath(&mut self) {
        if let (Some(start), Some(last)) = (self.subpath_start, self.path.last().copied()) {
            if let Some(rule) = Rule::between(last, start) {
                self.pending.push(rule);
            }
            self.path.push(start);
        }
    }

    fn paint(&mut self) {
        self.rules.append(&mut self.pending);
        self.discard_path();
    }

    fn discard_path(&mut self) {
        self.pending.clear();
        self.path.clear();
        self.subpath_start = None;
    }

    fn invoke_xobject(&mut self, name: &[u8], resources: &Resources, depth: usize) -> Result<()> {
        let Some(xobjects) = resources.xobjects.as_ref() else {
            return Ok(());
        };
        let Some(Object::Stream(stream)) = resolve(self.doc, xobjects.get(name).ok()) else {
            return Ok(());
        };

        let subtype = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"");

        match subtype {
            b"Image" => {
                self.images += 1;
                Ok(())
            }
            b"Form" if depth < MAX_FORM_DEPTH => {
                trace!("Entering form XObject {}", String::from_utf8_lossy(name));
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());

                let matrix = match stream.dict.get(b"Matrix") {
                    Ok(Object::Array(values)) => Matrix::from_operands(values),
                    _ => None,
                }
                .unwrap_or(Matrix::IDENTITY);

                let form_resources = match resolve(self.doc, stream.dict.get(b"Resources").ok()) {
                    Some(Object::Dictionary(dict)) => Resources::load(self.doc, Some(dict)),
                    _ => Resources {
                        fonts: resources.fonts.clone(),
                        xobjects: resources.xobjects.clone(),
                    },
                };

                let saved = self.state.clone();
                let saved_stack = self.stack.len();
                let (saved_tm, saved_tlm) = (self.text_matrix, self.line_matrix);
                self.state.ctm = matrix.then(&self.state.ctm);

                let result = self.interpret(&data, &form_resources, depth + 1);

                self.state = saved;
                self.stack.truncate(saved_stack);
                self.text_matrix = saved_tm;
                self.line_matrix = saved_tlm;
                result
            }
            _ => Ok(()),
        }
    }
}

fn pair(operands: &[Object]) -> (f64, f64) {
    let x = operands.first().and_then(number).unwrap_or(0.0);
    let y = operands.get(1).and_then(number).unwrap_or(0.0);
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_then() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(10.0, 20.0);

        // Scale first, then shift.
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 22.0));
        // Shift first, then scale.
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 42.0));
    }

    #[test]
    fn test_interpret_text_and_rules() {
        let doc = Document::with_version("1.5");
        let content = b"BT /F1 10 Tf 72 700 Td (Ab) Tj ET 72 690 m 300 690 l S 50 50 100 0.5 re f";
        let layout = PageInterpreter::new(&doc, 1, [0.0, 0.0, 612.0, 792.0])
            .run(content, None, [0.0, 0.0, 612.0, 792.0])
            .unwrap();

        assert_eq!(layout.chars.len(), 2);
        let a = &layout.chars[0];
        assert_eq!(a.text, "A");
        assert_eq!(a.x0, 72.0);
        assert_eq!(a.bottom, 92.0);
        assert_eq!(a.size, 10.0);
        // Fallback width is 500/1000 em.
        assert_eq!(layout.chars[1].x0, 77.0);

        assert_eq!(layout.rules.len(), 2);
        assert!(layout.rules.iter().all(|r| r.is_horizontal()));
        assert_eq!(layout.rules[0].top, 102.0);
    }

    #[test]
    fn test_tj_adjustment_moves_glyphs() {
        let doc = Document::with_version("1.5");
        let content = b"BT /F1 10 Tf 0 0 Td [(A) -1000 (B)] TJ ET";
        let layout = PageInterpreter::new(&doc, 1, [0.0, 0.0, 100.0, 100.0])
            .run(content, None, [0.0, 0.0, 100.0, 100.0])
            .unwrap();

        assert_eq!(layout.chars[0].x0, 0.0);
        // 5pt glyph advance plus 10pt from the -1000 adjustment.
        assert_eq!(layout.chars[1].x0, 15.0);
    }
}
