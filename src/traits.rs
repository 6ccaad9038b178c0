//! Resolved traits attached to formatting objects.
//!
//! Property parsing and inheritance happen upstream; layout only ever sees
//! these fully computed values.

use serde::{Deserialize, Serialize};

use crate::min_opt_max::{Length, MinOptMax};

/// 8-bit sRGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Font selection handed to the font-metrics provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontState {
    /// Resolved family name.
    pub family: String,
    /// Font size in millipoints.
    pub size: Length,
    /// CSS-style numeric weight.
    pub weight: u16,
    pub italic: bool,
}

impl Default for FontState {
    fn default() -> Self {
        Self {
            family: "serif".to_string(),
            size: 12_000,
            weight: 400,
            italic: false,
        }
    }
}

impl FontState {
    /// Font state for a family and size.
    pub fn new(family: impl Into<String>, size: Length) -> Self {
        Self {
            family: family.into(),
            size,
            ..Self::default()
        }
    }
}

/// Linefeed handling for text content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinefeedTreatment {
    /// Linefeeds are forced line terminators.
    Preserve,
    /// Linefeeds behave like a space.
    #[default]
    TreatAsSpace,
    /// Linefeeds are dropped.
    Ignore,
}

/// Inline alignment of lines within a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Start,
    Center,
    End,
    Justify,
}

/// Traits for a run of text and for other inline leaves.
#[derive(Clone, Debug, PartialEq)]
pub struct TextTraits {
    pub font: FontState,
    pub color: Color,
    /// Lines may wrap at break opportunities.
    pub wrap: bool,
    /// Extra elastic space added to each inter-word space.
    ///
    /// `None` means "normal": the text engine derives elasticity from the
    /// space glyph width.
    pub word_spacing: Option<MinOptMax>,
    /// Extra space after every glyph.
    pub letter_spacing: Length,
    /// Automatic hyphenation allowed for this run.
    pub hyphenate: bool,
    /// Minimum number of characters left before a hyphen.
    pub hyphenation_push_char_count: usize,
    /// Minimum number of characters carried after a hyphen.
    pub hyphenation_remain_char_count: usize,
    pub linefeed_treatment: LinefeedTreatment,
    pub white_space_collapse: bool,
}

impl Default for TextTraits {
    fn default() -> Self {
        Self {
            font: FontState::default(),
            color: Color::BLACK,
            wrap: true,
            word_spacing: None,
            letter_spacing: 0,
            hyphenate: false,
            hyphenation_push_char_count: 2,
            hyphenation_remain_char_count: 2,
            linefeed_treatment: LinefeedTreatment::default(),
            white_space_collapse: true,
        }
    }
}

/// Space before or after a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpaceSpec {
    pub space: MinOptMax,
    /// Discarded at the leading/trailing edge of a reference area.
    pub conditional: bool,
}

impl Default for SpaceSpec {
    fn default() -> Self {
        Self {
            space: MinOptMax::ZERO,
            conditional: true,
        }
    }
}

impl SpaceSpec {
    pub fn fixed(length: Length) -> Self {
        Self {
            space: MinOptMax::fixed(length),
            conditional: true,
        }
    }

    /// Space that survives area boundaries.
    pub fn retained(self) -> Self {
        Self {
            conditional: false,
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderStyle {
    #[default]
    None,
    Solid,
    Dashed,
    Dotted,
    Double,
}

/// One border edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderSide {
    pub width: Length,
    pub style: BorderStyle,
    pub color: Color,
}

impl BorderSide {
    pub fn solid(width: Length) -> Self {
        Self {
            width,
            style: BorderStyle::Solid,
            color: Color::BLACK,
        }
    }

    /// Width that actually occupies space.
    pub fn effective_width(&self) -> Length {
        if self.style == BorderStyle::None {
            0
        } else {
            self.width
        }
    }
}

/// Borders and padding in writing-mode relative directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderAndPadding {
    pub border_before: BorderSide,
    pub border_after: BorderSide,
    pub border_start: BorderSide,
    pub border_end: BorderSide,
    pub padding_before: Length,
    pub padding_after: Length,
    pub padding_start: Length,
    pub padding_end: Length,
}

impl BorderAndPadding {
    /// Uniform border and padding on every side.
    pub fn uniform(border: BorderSide, padding: Length) -> Self {
        Self {
            border_before: border,
            border_after: border,
            border_start: border,
            border_end: border,
            padding_before: padding,
            padding_after: padding,
            padding_start: padding,
            padding_end: padding,
        }
    }

    pub fn before(&self) -> Length {
        self.border_before.effective_width() + self.padding_before
    }

    pub fn after(&self) -> Length {
        self.border_after.effective_width() + self.padding_after
    }

    pub fn start(&self) -> Length {
        self.border_start.effective_width() + self.padding_start
    }

    pub fn end(&self) -> Length {
        self.border_end.effective_width() + self.padding_end
    }
}

/// Forced break class for `break-before` / `break-after`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BreakClass {
    #[default]
    Auto,
    Column,
    Page,
    EvenPage,
    OddPage,
}

impl BreakClass {
    pub fn is_forced(self) -> bool {
        !matches!(self, Self::Auto)
    }
}

/// Traits for block-level formatting objects.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockTraits {
    pub space_before: SpaceSpec,
    pub space_after: SpaceSpec,
    pub start_indent: Length,
    pub end_indent: Length,
    pub border: BorderAndPadding,
    pub background: Option<Color>,
    pub break_before: BreakClass,
    pub break_after: BreakClass,
    pub text_align: TextAlign,
    /// Alignment of the last line; `None` follows `text_align` except that
    /// justified blocks end with a start-aligned line.
    pub text_align_last: Option<TextAlign>,
    pub text_indent: Length,
    /// Minimum height of each line.
    pub line_height: Length,
}

impl Default for BlockTraits {
    fn default() -> Self {
        Self {
            space_before: SpaceSpec::default(),
            space_after: SpaceSpec::default(),
            start_indent: 0,
            end_indent: 0,
            border: BorderAndPadding::default(),
            background: None,
            break_before: BreakClass::Auto,
            break_after: BreakClass::Auto,
            text_align: TextAlign::Start,
            text_align_last: None,
            text_indent: 0,
            line_height: 14_400,
        }
    }
}

impl BlockTraits {
    /// Alignment used for the final line of a paragraph.
    pub fn last_line_align(&self) -> TextAlign {
        match self.text_align_last {
            Some(align) => align,
            None if self.text_align == TextAlign::Justify => TextAlign::Start,
            None => self.text_align,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AbsolutePosition {
    #[default]
    Auto,
    Absolute,
    Fixed,
}

/// Treatment of content exceeding a container's rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    ErrorIfOverflow,
}

/// Traits for `block-container`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContainerTraits {
    pub block: BlockTraits,
    pub position: AbsolutePosition,
    /// Offset from the containing region's top edge.
    pub top: Length,
    /// Offset from the containing region's left edge.
    pub left: Length,
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub overflow: Overflow,
}

impl ContainerTraits {
    pub fn is_absolute(&self) -> bool {
        !matches!(self.position, AbsolutePosition::Auto)
    }
}

/// Traits for `list-block`.
#[derive(Clone, Debug, PartialEq)]
pub struct ListTraits {
    pub block: BlockTraits,
    /// Distance from the item's start edge to the body's start edge.
    pub provisional_distance_between_starts: Length,
    /// Gap between the end of the label and the start of the body.
    pub provisional_label_separation: Length,
}

impl Default for ListTraits {
    fn default() -> Self {
        Self {
            block: BlockTraits::default(),
            provisional_distance_between_starts: 24_000,
            provisional_label_separation: 6_000,
        }
    }
}

/// Column width declaration for a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnWidth {
    Fixed(Length),
    /// Share of the width left after fixed columns.
    Proportional(u32),
}

/// Traits for `table`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableTraits {
    pub block: BlockTraits,
    /// Declared columns; empty means one proportional column per cell of the
    /// widest row.
    pub columns: Vec<ColumnWidth>,
}

/// Traits for `table-cell`.
#[derive(Clone, Debug, PartialEq)]
pub struct CellTraits {
    pub border: BorderAndPadding,
    pub background: Option<Color>,
    pub columns_spanned: u32,
}

impl Default for CellTraits {
    fn default() -> Self {
        Self {
            border: BorderAndPadding::default(),
            background: None,
            columns_spanned: 1,
        }
    }
}

/// Traits for `external-graphic`; the content size is already resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphicTraits {
    pub src: String,
    pub width: Length,
    pub height: Length,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderPattern {
    #[default]
    Space,
    Rule {
        thickness: Length,
    },
    Dots,
}

/// Traits for `leader`.
#[derive(Clone, Debug, PartialEq)]
pub struct LeaderTraits {
    pub length: MinOptMax,
    pub pattern: LeaderPattern,
    pub text: TextTraits,
}

impl Default for LeaderTraits {
    fn default() -> Self {
        Self {
            length: MinOptMax::new(0, 12_000, Length::MAX / 4),
            pattern: LeaderPattern::Space,
            text: TextTraits::default(),
        }
    }
}

/// Padding policy at the end of a page sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForcePageCount {
    #[default]
    NoForce,
    Even,
    Odd,
    EndOnEven,
    EndOnOdd,
}

/// Traits for `page-sequence`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageSequenceTraits {
    /// Simple page master or page-sequence-master name.
    pub master_reference: String,
    pub initial_page_number: Option<u32>,
    /// Page number format token (`1`, `01`, `i`, `I`, `a`, `A`).
    pub format: String,
    pub force_page_count: ForcePageCount,
}

impl PageSequenceTraits {
    pub fn new(master_reference: impl Into<String>) -> Self {
        Self {
            master_reference: master_reference.into(),
            initial_page_number: None,
            format: "1".to_string(),
            force_page_count: ForcePageCount::NoForce,
        }
    }
}
