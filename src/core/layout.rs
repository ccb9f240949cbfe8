//! Renderer-agnostic pagination engine.
//!
//! Produces a `LayoutPlan`: ordered pages of positioned blocks. No drawing or
//! rasterization happens here; a separate rasterizer consumes the plan. The
//! engine is pure and deterministic: identical inputs always yield an
//! identical plan, and nothing here reads clocks or randomness.
//!
//! Packing model: a single vertical cursor per page. Fixed-height blocks
//! (headings, info rows, table rows, signature cards) never split; when one
//! does not fit in the remaining space, the page breaks first. Text blocks are
//! continuable: the text is word-wrapped once up front, then as many lines as
//! fit are placed in a box on the current page and the remainder carries over
//! to fresh pages until every line is placed. No line is dropped or emitted
//! twice.

use crate::core::error::QcError;
use serde::{Deserialize, Serialize};

/// Page geometry and block metrics, in abstract points.
///
/// Defaults describe an A4 portrait page. A TOML fragment may override any
/// subset of fields; everything else keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f64,
    pub page_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub line_height: f64,
    pub char_width: f64,
    pub text_padding: f64,
    pub heading_height: f64,
    pub info_row_height: f64,
    pub table_header_height: f64,
    pub table_row_height: f64,
    pub signature_card_height: f64,
    pub block_gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin_top: 40.0,
            margin_bottom: 40.0,
            margin_left: 40.0,
            margin_right: 40.0,
            line_height: 14.0,
            char_width: 6.0,
            text_padding: 8.0,
            heading_height: 24.0,
            info_row_height: 18.0,
            table_header_height: 20.0,
            table_row_height: 18.0,
            signature_card_height: 90.0,
            block_gap: 10.0,
        }
    }
}

impl LayoutConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, QcError> {
        let cfg: LayoutConfig = toml::from_str(raw)
            .map_err(|e| QcError::Validation(format!("layout config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Geometry must leave a usable content box: positive width, and room for
    /// at least one wrapped text line between the margins.
    pub fn validate(&self) -> Result<(), QcError> {
        let all = [
            self.page_width,
            self.page_height,
            self.line_height,
            self.char_width,
            self.heading_height,
            self.info_row_height,
            self.table_header_height,
            self.table_row_height,
            self.signature_card_height,
        ];
        if all.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(QcError::Validation(
                "layout config: page and block metrics must be positive".to_string(),
            ));
        }
        let non_negative = [
            self.margin_top,
            self.margin_bottom,
            self.margin_left,
            self.margin_right,
            self.text_padding,
            self.block_gap,
        ];
        if non_negative.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(QcError::Validation(
                "layout config: margins and padding must be non-negative".to_string(),
            ));
        }
        if self.content_width() <= self.char_width {
            return Err(QcError::Validation(
                "layout config: margins leave no horizontal content space".to_string(),
            ));
        }
        if self.content_height() < self.line_height + 2.0 * self.text_padding {
            return Err(QcError::Validation(
                "layout config: margins leave no room for a single text line".to_string(),
            ));
        }
        Ok(())
    }

    pub fn content_width(&self) -> f64 {
        self.page_width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f64 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Character columns available to wrapped text inside a padded box.
    fn text_columns(&self) -> usize {
        let usable = self.content_width() - 2.0 * self.text_padding;
        ((usable / self.char_width).floor() as usize).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    InfoRow,
    TableHeader,
    TableRow,
    TextBox,
    SignatureCard,
}

/// One positioned content block. `content` carries free text (headings, text
/// boxes); `cells` carries column values for row-like blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPlan {
    pub page_width: f64,
    pub page_height: f64,
    pub pages: Vec<Page>,
}

/// Greedy vertical packer over a fixed-height page sequence.
pub struct PageWriter {
    cfg: LayoutConfig,
    pages: Vec<Page>,
    y: f64,
}

impl PageWriter {
    pub fn new(cfg: &LayoutConfig) -> Result<Self, QcError> {
        cfg.validate()?;
        Ok(Self {
            cfg: cfg.clone(),
            pages: vec![Page::default()],
            y: cfg.margin_top,
        })
    }

    fn limit(&self) -> f64 {
        self.cfg.page_height - self.cfg.margin_bottom
    }

    fn remaining(&self) -> f64 {
        (self.limit() - self.y).max(0.0)
    }

    /// A page with nothing on it yet; breaking here would loop forever.
    fn on_fresh_page(&self) -> bool {
        self.pages.last().map(|p| p.blocks.is_empty()).unwrap_or(true)
    }

    fn break_page(&mut self) {
        self.pages.push(Page::default());
        self.y = self.cfg.margin_top;
    }

    fn place(&mut self, kind: BlockKind, height: f64, content: String, cells: Vec<String>) {
        let block = Block {
            kind,
            x: self.cfg.margin_left,
            y: self.y,
            width: self.cfg.content_width(),
            height,
            content,
            cells,
        };
        self.pages.last_mut().expect("writer always has a page").blocks.push(block);
        self.y += height;
    }

    /// Places a non-splittable block, breaking the page first when it does not
    /// fit. A block taller than a whole page is still placed on a fresh page
    /// rather than failing; overfull output beats a lost block.
    pub fn fixed_block(&mut self, kind: BlockKind, height: f64, content: &str, cells: Vec<String>) {
        if height > self.remaining() && !self.on_fresh_page() {
            self.break_page();
        }
        self.place(kind, height, content.to_string(), cells);
    }

    pub fn heading(&mut self, text: &str) {
        let height = self.cfg.heading_height;
        self.fixed_block(BlockKind::Heading, height, text, Vec::new());
    }

    pub fn info_row(&mut self, label: &str, value: &str) {
        let height = self.cfg.info_row_height;
        self.fixed_block(
            BlockKind::InfoRow,
            height,
            "",
            vec![label.to_string(), value.to_string()],
        );
    }

    pub fn signature_card(&mut self, cells: Vec<String>) {
        let height = self.cfg.signature_card_height;
        self.fixed_block(BlockKind::SignatureCard, height, "", cells);
    }

    /// Vertical breathing room between sections. Never forces a page break on
    /// its own; the next block's fit check handles that.
    pub fn gap(&mut self) {
        if !self.on_fresh_page() {
            self.y += self.cfg.block_gap;
        }
    }

    /// Table as a header row plus one row per entry. Rows never split; when a
    /// row crosses the page boundary the header repeats on the continuation
    /// page. The header is also kept together with the first row.
    pub fn table(&mut self, header: &[String], rows: &[Vec<String>]) {
        let header_h = self.cfg.table_header_height;
        let row_h = self.cfg.table_row_height;
        let lead = header_h + if rows.is_empty() { 0.0 } else { row_h };
        if lead > self.remaining() && !self.on_fresh_page() {
            self.break_page();
        }
        self.place(BlockKind::TableHeader, header_h, String::new(), header.to_vec());
        for row in rows {
            if row_h > self.remaining() && !self.on_fresh_page() {
                self.break_page();
                self.place(BlockKind::TableHeader, header_h, String::new(), header.to_vec());
            }
            self.place(BlockKind::TableRow, row_h, String::new(), row.clone());
        }
    }

    /// Continuable text block. Wraps once, then fills page by page. Each
    /// fragment's box is sized to exactly the lines it holds plus padding, and
    /// the fragments together carry every wrapped line exactly once.
    pub fn text_block(&mut self, text: &str) {
        let lines = wrap_text(text, self.cfg.text_columns());
        if lines.is_empty() {
            return;
        }
        let line_h = self.cfg.line_height;
        let pad = self.cfg.text_padding;
        let mut idx = 0usize;
        while idx < lines.len() {
            let avail = self.remaining() - 2.0 * pad;
            let mut fit = if avail > 0.0 {
                (avail / line_h).floor() as usize
            } else {
                0
            };
            if fit == 0 {
                if self.on_fresh_page() {
                    // Validated configs always fit one line per fresh page;
                    // force progress regardless.
                    fit = 1;
                } else {
                    self.break_page();
                    continue;
                }
            }
            let take = fit.min(lines.len() - idx);
            let content = lines[idx..idx + take].join("\n");
            let height = take as f64 * line_h + 2.0 * pad;
            self.place(BlockKind::TextBox, height, content, Vec::new());
            idx += take;
            if idx < lines.len() {
                self.break_page();
            }
        }
    }

    pub fn finish(self) -> LayoutPlan {
        LayoutPlan {
            page_width: self.cfg.page_width,
            page_height: self.cfg.page_height,
            pages: self.pages,
        }
    }
}

/// Greedy word wrap to at most `columns` characters per line. Paragraph breaks
/// (`\n`) are preserved; a word longer than the line is hard-split.
pub fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word;
            // Hard-split oversized words so every line obeys the column limit.
            while word.chars().count() > columns {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let split_at = word
                    .char_indices()
                    .nth(columns)
                    .map(|(i, _)| i)
                    .unwrap_or(word.len());
                lines.push(word[..split_at].to_string());
                word = &word[split_at..];
            }
            if word.is_empty() {
                continue;
            }
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > columns && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if current.is_empty() {
                current.push_str(word);
            } else {
                current.push(' ');
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    // A fully blank input still occupies one (empty) line.
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> LayoutConfig {
        // Content box: 100 wide, 100 tall; 5 chars per line after padding.
        LayoutConfig {
            page_width: 120.0,
            page_height: 140.0,
            margin_top: 20.0,
            margin_bottom: 20.0,
            margin_left: 10.0,
            margin_right: 10.0,
            line_height: 10.0,
            char_width: 10.0,
            text_padding: 10.0,
            heading_height: 20.0,
            info_row_height: 15.0,
            table_header_height: 20.0,
            table_row_height: 15.0,
            signature_card_height: 50.0,
            block_gap: 5.0,
        }
    }

    fn text_boxes(plan: &LayoutPlan) -> Vec<&Block> {
        plan.pages
            .iter()
            .flat_map(|p| p.blocks.iter())
            .filter(|b| b.kind == BlockKind::TextBox)
            .collect()
    }

    #[test]
    fn test_wrap_respects_columns() {
        let lines = wrap_text("the quick brown fox jumps", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "the quick brown fox jumps");
    }

    #[test]
    fn test_wrap_hard_splits_long_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_preserves_paragraph_breaks() {
        let lines = wrap_text("one\n\ntwo", 10);
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = LayoutConfig::default();
        cfg.margin_top = 500.0;
        cfg.margin_bottom = 500.0;
        assert!(matches!(cfg.validate(), Err(QcError::Validation(_))));

        let mut cfg = LayoutConfig::default();
        cfg.page_height = -1.0;
        assert!(matches!(cfg.validate(), Err(QcError::Validation(_))));
    }

    #[test]
    fn test_config_toml_partial_override() {
        let cfg = LayoutConfig::from_toml_str("page_height = 400.0\nline_height = 12.0\n").unwrap();
        assert_eq!(cfg.page_height, 400.0);
        assert_eq!(cfg.line_height, 12.0);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.page_width, LayoutConfig::default().page_width);
    }

    #[test]
    fn test_fixed_block_breaks_page_instead_of_splitting() {
        let cfg = small_cfg();
        let mut writer = PageWriter::new(&cfg).unwrap();
        // Content height is 100; each signature card is 50.
        writer.signature_card(vec!["a".to_string()]);
        writer.signature_card(vec!["b".to_string()]);
        writer.signature_card(vec!["c".to_string()]);
        let plan = writer.finish();
        assert_eq!(plan.pages.len(), 2);
        assert_eq!(plan.pages[0].blocks.len(), 2);
        assert_eq!(plan.pages[1].blocks.len(), 1);
        // Continuation restarts at the top margin.
        assert_eq!(plan.pages[1].blocks[0].y, cfg.margin_top);
    }

    #[test]
    fn test_text_block_line_conservation() {
        let cfg = small_cfg();
        // 5-char columns: each word below lands on its own line -> 12 lines.
        let words: Vec<String> = (0..12).map(|i| format!("w{:03}", i)).collect();
        let text = words.join(" ");
        let wrapped = wrap_text(&text, cfg.text_columns());
        assert_eq!(wrapped.len(), 12);

        let mut writer = PageWriter::new(&cfg).unwrap();
        writer.text_block(&text);
        let plan = writer.finish();

        let boxes = text_boxes(&plan);
        // Fresh page fits floor((100 - 20)/10) = 8 lines per box.
        assert_eq!(boxes.len(), 2);
        let total_lines: usize = boxes
            .iter()
            .map(|b| b.content.lines().count())
            .sum();
        assert_eq!(total_lines, 12);
        // No duplicate or lost lines.
        let mut seen: Vec<&str> = boxes.iter().flat_map(|b| b.content.lines()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 12);
        // Box height tracks its exact line count plus padding.
        assert_eq!(boxes[0].height, 8.0 * cfg.line_height + 2.0 * cfg.text_padding);
        assert_eq!(boxes[1].height, 4.0 * cfg.line_height + 2.0 * cfg.text_padding);
    }

    #[test]
    fn test_text_block_fills_partial_page_first() {
        let cfg = small_cfg();
        let mut writer = PageWriter::new(&cfg).unwrap();
        // Eat 50 of the 100 content height first.
        writer.signature_card(vec!["sig".to_string()]);
        // Remaining 50 - 20 padding = 30 -> 3 lines fit on page one.
        let words: Vec<String> = (0..5).map(|i| format!("w{:03}", i)).collect();
        writer.text_block(&words.join(" "));
        let plan = writer.finish();
        let boxes = text_boxes(&plan);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].content.lines().count(), 3);
        assert_eq!(boxes[1].content.lines().count(), 2);
        assert_eq!(plan.pages.len(), 2);
    }

    #[test]
    fn test_table_header_repeats_on_continuation() {
        let cfg = small_cfg();
        let mut writer = PageWriter::new(&cfg).unwrap();
        let header = vec!["code".to_string(), "status".to_string()];
        // Header 20 + rows 15 each: page one holds header + 5 rows (95 of 100).
        let rows: Vec<Vec<String>> = (0..8)
            .map(|i| vec![format!("1.{}", i + 1), "ok".to_string()])
            .collect();
        writer.table(&header, &rows);
        let plan = writer.finish();

        assert_eq!(plan.pages.len(), 2);
        let headers_on_page = |page: &Page| {
            page.blocks
                .iter()
                .filter(|b| b.kind == BlockKind::TableHeader)
                .count()
        };
        assert_eq!(headers_on_page(&plan.pages[0]), 1);
        assert_eq!(headers_on_page(&plan.pages[1]), 1);
        let total_rows: usize = plan
            .pages
            .iter()
            .flat_map(|p| p.blocks.iter())
            .filter(|b| b.kind == BlockKind::TableRow)
            .count();
        assert_eq!(total_rows, 8);
    }

    #[test]
    fn test_empty_table_emits_header_only() {
        let cfg = small_cfg();
        let mut writer = PageWriter::new(&cfg).unwrap();
        writer.table(&["code".to_string()], &[]);
        let plan = writer.finish();
        assert_eq!(plan.pages.len(), 1);
        assert_eq!(plan.pages[0].blocks.len(), 1);
        assert_eq!(plan.pages[0].blocks[0].kind, BlockKind::TableHeader);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let cfg = small_cfg();
        let build = || {
            let mut writer = PageWriter::new(&cfg).unwrap();
            writer.heading("Phase: Welding");
            writer.info_row("score", "66.7");
            writer.table(
                &["code".to_string(), "status".to_string()],
                &[vec!["1.1".to_string(), "ok".to_string()]],
            );
            writer.gap();
            writer.text_block("analysis text that wraps across lines");
            writer.signature_card(vec!["A. Inspector".to_string()]);
            writer.finish()
        };
        assert_eq!(build(), build());
    }
}
