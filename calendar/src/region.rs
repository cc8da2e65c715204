use tracing::debug;

use crate::dom::Element;
use crate::format::{Directives, LabelKind};
use crate::template::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Year,
    Month,
    Day,
    Holiday,
    HolidayMark,
    Holiday2,
    Image,
}

impl RegionKind {
    pub fn label_kind(self) -> Option<LabelKind> {
        match self {
            Self::Year => Some(LabelKind::Year),
            Self::Month => Some(LabelKind::Month),
            _ => None,
        }
    }

    /// Regions that hold per-cell text and are hidden once the text is placed.
    pub fn is_cell(self) -> bool {
        matches!(
            self,
            Self::Day | Self::Holiday | Self::HolidayMark | Self::Holiday2
        )
    }
}

// Longer prefixes first: `holiday-` must not swallow `holidaymark-` or `holiday2-`.
const INDEXED_PREFIXES: [(&str, RegionKind); 4] = [
    ("holidaymark-", RegionKind::HolidayMark),
    ("holiday2-", RegionKind::Holiday2),
    ("holiday-", RegionKind::Holiday),
    ("day-", RegionKind::Day),
];

/// A parsed region label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionName {
    pub kind: RegionKind,
    pub index: Option<usize>,
    pub directives: Directives,
    /// Image block name; empty when the label has no bracket.
    pub block: Option<String>,
}

impl RegionName {
    /// Returns `None` for labels outside the grammar. A malformed bracket yields no directives.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        let (base, bracket) = match label.split_once('[') {
            Some((base, rest)) => (base, rest.strip_suffix(']')),
            None => (label, None),
        };
        let directives = || bracket.map(Directives::parse).unwrap_or_default();

        for (prefix, kind) in INDEXED_PREFIXES {
            if let Some(rest) = base.strip_prefix(prefix) {
                let index = rest.parse::<usize>().ok()?;
                return Some(Self {
                    kind,
                    index: Some(index),
                    directives: directives(),
                    block: None,
                });
            }
        }

        if base.starts_with("image") {
            return Some(Self {
                kind: RegionKind::Image,
                index: None,
                directives: Directives::default(),
                block: Some(bracket.unwrap_or_default().trim().to_string()),
            });
        }

        let kind = if base.starts_with("year") {
            RegionKind::Year
        } else if base.starts_with("month") {
            RegionKind::Month
        } else {
            return None;
        };

        Some(Self {
            kind,
            index: None,
            directives: directives(),
            block: None,
        })
    }

    /// Stable image key across a year of calendars: `<block>-<month>`.
    pub fn image_key(&self, month: u32) -> Option<String> {
        self.block
            .as_ref()
            .map(|block| format!("{}-{}", block, month))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRegion {
    pub name: RegionName,
    pub label: String,
    pub id: Option<String>,
    /// Declared geometry in user units; `None` when the element has no usable rect.
    pub rect: Option<Rect>,
    /// Child-index path from the root to the placeholder element.
    pub path: Vec<usize>,
}

/// All labelled regions of one template instance, in document order.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    regions: Vec<TemplateRegion>,
}

impl RegionIndex {
    pub fn locate(root: &Element) -> Self {
        let mut regions = Vec::new();
        root.walk(|path, element| {
            let Some(label) = element.label() else {
                return;
            };
            let Some(name) = RegionName::parse(label) else {
                return;
            };
            let rect = Rect::from_element(element);
            if rect.is_none() {
                debug!(label, "region has no usable geometry");
            }
            regions.push(TemplateRegion {
                name,
                label: label.to_string(),
                id: element.attr("id").map(str::to_string),
                rect,
                path: path.to_vec(),
            });
        });
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateRegion> {
        self.regions.iter()
    }

    pub fn of_kind(&self, kind: RegionKind) -> impl Iterator<Item = &TemplateRegion> {
        self.regions.iter().filter(move |r| r.name.kind == kind)
    }

    /// First region of `kind` for grid cell `index`.
    pub fn find(&self, kind: RegionKind, index: usize) -> Option<&TemplateRegion> {
        self.regions
            .iter()
            .find(|r| r.name.kind == kind && r.name.index == Some(index))
    }
}

pub fn locate_regions(root: &Element) -> RegionIndex {
    RegionIndex::locate(root)
}
