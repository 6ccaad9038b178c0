//! Page geometry templates and page-sequence-master definitions.

use serde::{Deserialize, Serialize};

use crate::error::FoError;
use crate::min_opt_max::Length;

/// Axis-aligned rectangle in page coordinates (origin top-left, y down).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: Length,
    pub y: Length,
    pub width: Length,
    pub height: Length,
}

impl Rect {
    pub const fn new(x: Length, y: Length, width: Length, height: Length) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Shrink by the given margins, never going negative.
    pub fn inset(self, margins: Margins) -> Self {
        Self {
            x: self.x + margins.left,
            y: self.y + margins.top,
            width: (self.width - margins.left - margins.right).max(0),
            height: (self.height - margins.top - margins.bottom).max(0),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Margins {
    pub top: Length,
    pub bottom: Length,
    pub left: Length,
    pub right: Length,
}

impl Margins {
    pub const fn uniform(value: Length) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }
}

/// Region classes of a simple page master.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegionClass {
    Before,
    After,
    Start,
    End,
    Body,
}

impl RegionClass {
    /// Default region name.
    pub fn default_name(self) -> &'static str {
        match self {
            Self::Before => "xsl-region-before",
            Self::After => "xsl-region-after",
            Self::Start => "xsl-region-start",
            Self::End => "xsl-region-end",
            Self::Body => "xsl-region-body",
        }
    }

    /// Side regions in the order static content is laid out.
    pub const OUTER: [RegionClass; 4] = [Self::Before, Self::After, Self::Start, Self::End];
}

/// `region-body` definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionBody {
    pub name: String,
    pub margin: Margins,
    pub column_count: u32,
    pub column_gap: Length,
}

impl Default for RegionBody {
    fn default() -> Self {
        Self {
            name: RegionClass::Body.default_name().to_string(),
            margin: Margins::default(),
            column_count: 1,
            column_gap: 12_000,
        }
    }
}

/// `region-before`/`after`/`start`/`end` definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionOuter {
    pub name: String,
    pub extent: Length,
}

impl RegionOuter {
    pub fn new(class: RegionClass, extent: Length) -> Self {
        Self {
            name: class.default_name().to_string(),
            extent,
        }
    }
}

/// Named page geometry template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimplePageMaster {
    pub name: String,
    pub page_width: Length,
    pub page_height: Length,
    pub margin: Margins,
    pub body: RegionBody,
    pub before: Option<RegionOuter>,
    pub after: Option<RegionOuter>,
    pub start: Option<RegionOuter>,
    pub end: Option<RegionOuter>,
}

impl SimplePageMaster {
    /// A4 portrait page with one-inch margins and only a body region.
    pub fn a4(name: impl Into<String>) -> Self {
        Self::new(name, 595_276, 841_890).with_margin(Margins::uniform(72_000))
    }

    pub fn new(name: impl Into<String>, page_width: Length, page_height: Length) -> Self {
        Self {
            name: name.into(),
            page_width,
            page_height,
            margin: Margins::default(),
            body: RegionBody::default(),
            before: None,
            after: None,
            start: None,
            end: None,
        }
    }

    pub fn with_margin(mut self, margin: Margins) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_body(mut self, body: RegionBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_region(mut self, class: RegionClass, region: RegionOuter) -> Self {
        match class {
            RegionClass::Before => self.before = Some(region),
            RegionClass::After => self.after = Some(region),
            RegionClass::Start => self.start = Some(region),
            RegionClass::End => self.end = Some(region),
            RegionClass::Body => {
                self.body.name = region.name;
            }
        }
        self
    }

    /// Page content rectangle (page minus page margins).
    pub fn content_rect(&self) -> Rect {
        Rect::new(0, 0, self.page_width, self.page_height).inset(self.margin)
    }

    /// Region-body viewport rectangle.
    pub fn body_rect(&self) -> Rect {
        self.content_rect().inset(self.body.margin)
    }

    /// Outer region definition for a class.
    pub fn outer(&self, class: RegionClass) -> Option<&RegionOuter> {
        match class {
            RegionClass::Before => self.before.as_ref(),
            RegionClass::After => self.after.as_ref(),
            RegionClass::Start => self.start.as_ref(),
            RegionClass::End => self.end.as_ref(),
            RegionClass::Body => None,
        }
    }

    /// Viewport rectangle for an outer region.
    ///
    /// Before and after span the full content width; start and end sit
    /// between them.
    pub fn outer_rect(&self, class: RegionClass) -> Option<Rect> {
        let content = self.content_rect();
        let region = self.outer(class)?;
        let before = self.before.as_ref().map_or(0, |r| r.extent);
        let after = self.after.as_ref().map_or(0, |r| r.extent);
        let rect = match class {
            RegionClass::Before => Rect::new(content.x, content.y, content.width, region.extent),
            RegionClass::After => Rect::new(
                content.x,
                content.y + content.height - region.extent,
                content.width,
                region.extent,
            ),
            RegionClass::Start => Rect::new(
                content.x,
                content.y + before,
                region.extent,
                (content.height - before - after).max(0),
            ),
            RegionClass::End => Rect::new(
                content.x + content.width - region.extent,
                content.y + before,
                region.extent,
                (content.height - before - after).max(0),
            ),
            RegionClass::Body => return None,
        };
        Some(rect)
    }

    /// Region class whose name matches, if any.
    pub fn region_for_name(&self, name: &str) -> Option<RegionClass> {
        if self.body.name == name {
            return Some(RegionClass::Body);
        }
        RegionClass::OUTER
            .into_iter()
            .find(|class| self.outer(*class).is_some_and(|r| r.name == name))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PagePosition {
    #[default]
    Any,
    First,
    Rest,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OddOrEven {
    #[default]
    Any,
    Odd,
    Even,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlankOrNotBlank {
    #[default]
    Any,
    Blank,
    NotBlank,
}

/// Page-master name guarded by page predicates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionalPageMasterReference {
    pub master_name: String,
    pub page_position: PagePosition,
    pub odd_or_even: OddOrEven,
    pub blank_or_not_blank: BlankOrNotBlank,
}

impl ConditionalPageMasterReference {
    /// Reference that matches every page.
    pub fn any(master_name: impl Into<String>) -> Self {
        Self {
            master_name: master_name.into(),
            page_position: PagePosition::Any,
            odd_or_even: OddOrEven::Any,
            blank_or_not_blank: BlankOrNotBlank::Any,
        }
    }

    pub fn with_page_position(mut self, position: PagePosition) -> Self {
        self.page_position = position;
        self
    }

    pub fn with_odd_or_even(mut self, parity: OddOrEven) -> Self {
        self.odd_or_even = parity;
        self
    }

    pub fn with_blank_or_not_blank(mut self, blank: BlankOrNotBlank) -> Self {
        self.blank_or_not_blank = blank;
        self
    }

    pub fn matches(&self, is_odd: bool, is_first: bool, is_blank: bool) -> bool {
        let position_ok = match self.page_position {
            PagePosition::Any => true,
            PagePosition::First => is_first,
            PagePosition::Rest => !is_first,
        };
        let parity_ok = match self.odd_or_even {
            OddOrEven::Any => true,
            OddOrEven::Odd => is_odd,
            OddOrEven::Even => !is_odd,
        };
        let blank_ok = match self.blank_or_not_blank {
            BlankOrNotBlank::Any => true,
            BlankOrNotBlank::Blank => is_blank,
            BlankOrNotBlank::NotBlank => !is_blank,
        };
        position_ok && parity_ok && blank_ok
    }
}

/// Repeat bound of a subsequence specifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaxRepeats {
    Bounded(u32),
    #[default]
    Unbounded,
}

impl MaxRepeats {
    /// `consumed` has reached the bound.
    pub fn is_exhausted(self, consumed: u32) -> bool {
        match self {
            Self::Bounded(max) => consumed >= max,
            Self::Unbounded => false,
        }
    }
}

/// One entry of a page-sequence-master.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubsequenceSpecifier {
    /// `single-page-master-reference`.
    Single { master_name: String },
    /// `repeatable-page-master-reference`.
    Repeatable {
        master_name: String,
        max_repeats: MaxRepeats,
    },
    /// `repeatable-page-master-alternatives`.
    Alternatives {
        max_repeats: MaxRepeats,
        references: Vec<ConditionalPageMasterReference>,
    },
}

impl SubsequenceSpecifier {
    pub fn max_repeats(&self) -> MaxRepeats {
        match self {
            Self::Single { .. } => MaxRepeats::Bounded(1),
            Self::Repeatable { max_repeats, .. } | Self::Alternatives { max_repeats, .. } => {
                *max_repeats
            }
        }
    }

    /// First master matching the page predicates, ignoring the repeat bound.
    pub fn candidate(&self, is_odd: bool, is_first: bool, is_blank: bool) -> Option<&str> {
        match self {
            Self::Single { master_name } | Self::Repeatable { master_name, .. } => {
                Some(master_name.as_str())
            }
            Self::Alternatives { references, .. } => references
                .iter()
                .find(|r| r.matches(is_odd, is_first, is_blank))
                .map(|r| r.master_name.as_str()),
        }
    }

    /// Every master name this specifier can yield.
    pub fn master_names(&self) -> impl Iterator<Item = &str> + '_ {
        let (single, refs): (Option<&str>, &[ConditionalPageMasterReference]) = match self {
            Self::Single { master_name } | Self::Repeatable { master_name, .. } => {
                (Some(master_name.as_str()), &[])
            }
            Self::Alternatives { references, .. } => (None, references.as_slice()),
        };
        single
            .into_iter()
            .chain(refs.iter().map(|r| r.master_name.as_str()))
    }
}

/// Ordered list of subsequence specifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageSequenceMaster {
    pub name: String,
    pub specifiers: Vec<SubsequenceSpecifier>,
}

impl PageSequenceMaster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifiers: Vec::new(),
        }
    }

    pub fn with_specifier(mut self, specifier: SubsequenceSpecifier) -> Self {
        self.specifiers.push(specifier);
        self
    }
}

/// Master selected by a page-sequence's `master-reference`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterRef<'a> {
    Simple(&'a SimplePageMaster),
    Sequence(&'a PageSequenceMaster),
}

/// `layout-master-set`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutMasterSet {
    simple: Vec<SimplePageMaster>,
    sequences: Vec<PageSequenceMaster>,
}

impl LayoutMasterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_simple(&mut self, master: SimplePageMaster) -> Result<(), FoError> {
        if self.contains_name(&master.name) {
            return Err(FoError::DuplicateMaster(master.name));
        }
        self.simple.push(master);
        Ok(())
    }

    pub fn add_sequence(&mut self, master: PageSequenceMaster) -> Result<(), FoError> {
        if self.contains_name(&master.name) {
            return Err(FoError::DuplicateMaster(master.name));
        }
        if master.specifiers.is_empty() {
            return Err(FoError::EmptySequenceMaster(master.name));
        }
        self.sequences.push(master);
        Ok(())
    }

    fn contains_name(&self, name: &str) -> bool {
        self.simple.iter().any(|m| m.name == name) || self.sequences.iter().any(|m| m.name == name)
    }

    pub fn simple(&self, name: &str) -> Option<&SimplePageMaster> {
        self.simple.iter().find(|m| m.name == name)
    }

    pub fn sequence(&self, name: &str) -> Option<&PageSequenceMaster> {
        self.sequences.iter().find(|m| m.name == name)
    }

    /// Resolve a `master-reference`.
    pub fn lookup(&self, name: &str) -> Option<MasterRef<'_>> {
        self.simple(name)
            .map(MasterRef::Simple)
            .or_else(|| self.sequence(name).map(MasterRef::Sequence))
    }

    pub fn simple_masters(&self) -> &[SimplePageMaster] {
        &self.simple
    }

    /// Check that every page-sequence-master names existing simple masters.
    pub fn validate(&self) -> Result<(), FoError> {
        for sequence in &self.sequences {
            for specifier in &sequence.specifiers {
                for name in specifier.master_names() {
                    if self.simple(name).is_none() {
                        return Err(FoError::UnknownMaster(name.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_regions_tile_the_content_rect() {
        let master = SimplePageMaster::new("p", 100_000, 200_000)
            .with_margin(Margins::uniform(10_000))
            .with_region(
                RegionClass::Before,
                RegionOuter::new(RegionClass::Before, 20_000),
            )
            .with_region(
                RegionClass::After,
                RegionOuter::new(RegionClass::After, 15_000),
            )
            .with_region(RegionClass::Start, RegionOuter::new(RegionClass::Start, 5_000));
        let content = master.content_rect();
        assert_eq!(content, Rect::new(10_000, 10_000, 80_000, 180_000));
        let after = master.outer_rect(RegionClass::After).unwrap();
        assert_eq!(after.y + after.height, content.y + content.height);
        let start = master.outer_rect(RegionClass::Start).unwrap();
        assert_eq!(start.y, 30_000);
        assert_eq!(start.height, 145_000);
        assert!(master.outer_rect(RegionClass::End).is_none());
    }

    #[test]
    fn region_lookup_by_name() {
        let master = SimplePageMaster::a4("a4").with_region(
            RegionClass::Before,
            RegionOuter {
                name: "header".to_string(),
                extent: 12_000,
            },
        );
        assert_eq!(master.region_for_name("header"), Some(RegionClass::Before));
        assert_eq!(
            master.region_for_name("xsl-region-body"),
            Some(RegionClass::Body)
        );
        assert_eq!(master.region_for_name("footer"), None);
    }

    #[test]
    fn conditional_reference_predicates() {
        let first_odd = ConditionalPageMasterReference::any("m")
            .with_page_position(PagePosition::First)
            .with_odd_or_even(OddOrEven::Odd)
            .with_blank_or_not_blank(BlankOrNotBlank::NotBlank);
        assert!(first_odd.matches(true, true, false));
        assert!(!first_odd.matches(false, true, false));
        assert!(!first_odd.matches(true, false, false));
        assert!(!first_odd.matches(true, true, true));
    }

    #[test]
    fn master_set_rejects_duplicates_and_dangling_refs() {
        let mut set = LayoutMasterSet::new();
        set.add_simple(SimplePageMaster::a4("a4")).unwrap();
        assert_eq!(
            set.add_simple(SimplePageMaster::a4("a4")),
            Err(FoError::DuplicateMaster("a4".to_string()))
        );
        assert!(matches!(
            set.add_sequence(PageSequenceMaster::new("empty")),
            Err(FoError::EmptySequenceMaster(_))
        ));
        set.add_sequence(PageSequenceMaster::new("seq").with_specifier(
            SubsequenceSpecifier::Single {
                master_name: "missing".to_string(),
            },
        ))
        .unwrap();
        assert_eq!(
            set.validate(),
            Err(FoError::UnknownMaster("missing".to_string()))
        );
    }
}
