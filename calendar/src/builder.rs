use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::design::{Color, DesignConfig};
use crate::dom::{Element, Node, XLINK_NAMESPACE};
use crate::error::{CalendarError, CalendarResult};
use crate::format::{date_color, format_day, format_label, Align};
use crate::grid::{CalendarGrid, DayCell, YearMonth, DAYS_PER_WEEK};
use crate::holiday::{HolidayResolver, MonthHolidays};
use crate::region::{RegionIndex, RegionKind};
use crate::template::{Rect, Template};

const LABEL_COLOR: &str = "rgb(0, 0, 0)";
const STROKE_COLOR: &str = "#FFFFFF";
const MARK_WEIGHT: &str = "950";
const MIN_STROKE_WIDTH: f64 = 2.0;
const STROKE_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Idle,
    Cloned,
    GridComputed,
    RegionsLocated,
    TextInjected,
    ImageRegionsExtracted,
    Done,
}

/// A photo frame found in the template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRegion {
    pub name: String,
    pub block: String,
    pub id: Option<String>,
    pub rect_px: Rect,
    pub rect_svg: Rect,
}

#[derive(Debug, Clone)]
pub struct BuiltCalendar {
    year_month: YearMonth,
    root: Element,
    image_regions: BTreeMap<String, ImageRegion>,
}

impl BuiltCalendar {
    pub fn year_month(&self) -> YearMonth {
        self.year_month
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn image_regions(&self) -> &BTreeMap<String, ImageRegion> {
        &self.image_regions
    }

    pub fn to_svg_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.root.write_xml(&mut out);
        out
    }

    /// Places an `<image id="image-<name>">` over the named frame, replacing a previous one.
    /// Returns `false` when the calendar has no frame of that name.
    pub fn embed_image(&mut self, name: &str, href: &str) -> bool {
        let Some(region) = self.image_regions.get(name) else {
            return false;
        };
        let id = format!("image-{}", region.name);
        let rect = region.rect_svg;
        let image = Element::new("image")
            .with_attr("id", id.as_str())
            .with_attr("x", number(rect.x))
            .with_attr("y", number(rect.y))
            .with_attr("width", number(rect.width))
            .with_attr("height", number(rect.height))
            .with_attr("preserveAspectRatio", "none")
            .with_attr("xlink:href", href);

        if self.root.attr("xmlns:xlink").is_none() {
            self.root.set_attr("xmlns:xlink", XLINK_NAMESPACE);
        }

        let existing = self.root.find_path(|e| e.attr("id") == Some(id.as_str()));
        if let Some((&index, parent)) = existing.as_deref().and_then(<[usize]>::split_last) {
            if let Some(parent) = self.root.element_at_mut(parent) {
                parent.children_mut()[index] = Node::Element(image);
                return true;
            }
        }
        self.root.push(image);
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct TextStyle<'a> {
    color: &'a str,
    font: &'a str,
    align: Align,
    weight: Option<&'a str>,
    stroke: Option<&'a str>,
}

pub struct CalendarBuilder<'a> {
    design: &'a DesignConfig,
    template: &'a Template,
    stage: BuildStage,
}

impl<'a> CalendarBuilder<'a> {
    pub fn new(design: &'a DesignConfig, template: &'a Template) -> Self {
        Self {
            design,
            template,
            stage: BuildStage::Idle,
        }
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    fn advance(&mut self, next: BuildStage) {
        trace!(design = %self.design.id, from = ?self.stage, to = ?next, "build stage");
        self.stage = next;
    }

    /// `holidays` must be resolved for `year_month`.
    pub fn build(
        &mut self,
        year_month: YearMonth,
        holidays: &MonthHolidays,
    ) -> CalendarResult<BuiltCalendar> {
        self.stage = BuildStage::Idle;
        if holidays.year_month() != year_month {
            return Err(CalendarError::HolidayMonthMismatch {
                expected: year_month,
                got: holidays.year_month(),
            });
        }

        let mut root = self.template.instantiate();
        self.advance(BuildStage::Cloned);

        let grid = CalendarGrid::compute(year_month)?;
        self.advance(BuildStage::GridComputed);

        let regions = RegionIndex::locate(&root);
        self.advance(BuildStage::RegionsLocated);

        self.place_labels(&mut root, &regions, year_month);
        self.place_days(&mut root, &regions, &grid, holidays);
        self.advance(BuildStage::TextInjected);

        let image_regions = self.extract_images(&mut root, &regions, year_month);
        self.advance(BuildStage::ImageRegionsExtracted);

        debug!(
            design = %self.design.id,
            %year_month,
            regions = regions.len(),
            images = image_regions.len(),
            "calendar built"
        );
        self.advance(BuildStage::Done);

        Ok(BuiltCalendar {
            year_month,
            root,
            image_regions,
        })
    }

    fn place_labels(&self, root: &mut Element, regions: &RegionIndex, year_month: YearMonth) {
        let colors = &self.design.colors;
        let fonts = &self.design.fonts;

        for region in regions.iter() {
            let Some(kind) = region.name.kind.label_kind() else {
                continue;
            };
            let Some(rect) = region.rect else {
                debug!(label = %region.label, "skipping label region without geometry");
                continue;
            };
            let (font, color) = match region.name.kind {
                RegionKind::Year => (fonts.year(), colors.year.as_ref()),
                _ => (fonts.month(), colors.month.as_ref()),
            };
            let text = format_label(kind, year_month.year(), year_month.month(), &region.name.directives);
            let style = TextStyle {
                color: color.map_or(LABEL_COLOR, Color::as_str),
                font,
                align: region.name.directives.align(),
                weight: None,
                stroke: None,
            };
            add_text(root, rect, &text, &style);
            hide(root, &region.path);
        }
    }

    fn place_days(
        &self,
        root: &mut Element,
        regions: &RegionIndex,
        grid: &CalendarGrid,
        holidays: &MonthHolidays,
    ) {
        let options = &self.design.options;
        let colors = &self.design.colors;
        let fonts = &self.design.fonts;
        let stroke = (!options.disable_text_stroke)
            .then(|| colors.stroke.as_ref().map_or(STROKE_COLOR, Color::as_str));
        let holiday_color = colors.holiday().as_str();

        for (index, cell) in grid.iter() {
            let slot = match cell {
                DayCell::Previous(_) if options.disable_previous_month_date => continue,
                DayCell::Next(_) if options.disable_next_month_date => continue,
                _ if options.disable_previous_month_date => index - grid.first_weekday(),
                _ => index,
            };
            let annotation = match cell {
                DayCell::Current(day) => holidays.get(day),
                _ => None,
            };
            let is_holiday = annotation.is_some();
            let color = date_color(cell, index % DAYS_PER_WEEK, is_holiday, colors).as_str();

            if let Some(annotation) = annotation {
                let holiday_style = TextStyle {
                    color: holiday_color,
                    font: fonts.holiday(),
                    align: Align::Center,
                    weight: None,
                    stroke,
                };
                if let Some(mark) = annotation.mark.as_deref() {
                    let mark_style = TextStyle {
                        font: fonts.date(),
                        weight: Some(MARK_WEIGHT),
                        stroke: None,
                        ..holiday_style
                    };
                    place_cell_text(root, regions, RegionKind::HolidayMark, slot, mark, mark_style);
                }
                if let Some(name) = annotation.anniversary.as_deref() {
                    place_cell_text(root, regions, RegionKind::Holiday2, slot, name, holiday_style);
                }
                if let Some(name) = annotation.holiday.as_deref() {
                    place_cell_text(root, regions, RegionKind::Holiday, slot, name, holiday_style);
                }
            }

            let day_style = TextStyle {
                color,
                font: fonts.date(),
                align: Align::Center,
                weight: None,
                stroke,
            };
            place_cell_text(root, regions, RegionKind::Day, slot, &format_day(cell), day_style);
        }

        for region in regions.iter().filter(|r| r.name.kind.is_cell()) {
            hide(root, &region.path);
        }
    }

    fn extract_images(
        &self,
        root: &mut Element,
        regions: &RegionIndex,
        year_month: YearMonth,
    ) -> BTreeMap<String, ImageRegion> {
        let viewport = self.template.viewport();
        let mut images = BTreeMap::new();

        for region in regions.of_kind(RegionKind::Image) {
            hide(root, &region.path);
            let (Some(rect), Some(name)) = (region.rect, region.name.image_key(year_month.month()))
            else {
                debug!(label = %region.label, "skipping image region without geometry");
                continue;
            };
            images.entry(name.clone()).or_insert_with(|| ImageRegion {
                name,
                block: region.name.block.clone().unwrap_or_default(),
                id: region.id.clone(),
                rect_px: viewport.to_pixels(rect),
                rect_svg: rect,
            });
        }
        images
    }
}

/// Resolves holidays and builds one month in a single call.
pub fn build_calendar(
    design: &DesignConfig,
    template: &Template,
    resolver: &HolidayResolver,
    year_month: YearMonth,
    holidays_only: bool,
) -> CalendarResult<BuiltCalendar> {
    let holidays = resolver.resolve(year_month, holidays_only);
    CalendarBuilder::new(design, template).build(year_month, &holidays)
}

fn place_cell_text(
    root: &mut Element,
    regions: &RegionIndex,
    kind: RegionKind,
    slot: usize,
    text: &str,
    style: TextStyle<'_>,
) {
    let Some(region) = regions.find(kind, slot) else {
        trace!(?kind, slot, "no region for cell");
        return;
    };
    let Some(rect) = region.rect else {
        return;
    };
    let style = TextStyle {
        align: region.name.directives.align(),
        ..style
    };
    add_text(root, rect, text, &style);
}

/// The stroke pass goes first so the fill glyphs sit on top of it.
fn add_text(root: &mut Element, rect: Rect, text: &str, style: &TextStyle<'_>) {
    if let Some(stroke) = style.stroke {
        root.push(text_element(rect, text, style, Some(stroke)));
    }
    root.push(text_element(rect, text, style, None));
}

fn text_element(rect: Rect, text: &str, style: &TextStyle<'_>, stroke: Option<&str>) -> Element {
    let font_size = rect.height;
    let (x, anchor) = match style.align {
        Align::Left => (rect.x, "start"),
        Align::Center => (rect.center_x(), "middle"),
        Align::Right => (rect.right(), "end"),
    };

    let mut css = vec![
        "font-style:normal".to_string(),
        format!("font-weight:{}", style.weight.unwrap_or("normal")),
        format!("font-size:{}px", number(font_size)),
        "line-height:1.25".to_string(),
        format!("font-family:'{}'", style.font),
        "white-space:pre".to_string(),
        format!("fill:{}", stroke.unwrap_or(style.color)),
        "fill-opacity:1".to_string(),
        "dominant-baseline:alphabetic".to_string(),
    ];
    match stroke {
        Some(color) => {
            css.push(format!("stroke:{}", color));
            css.push(format!(
                "stroke-width:{}px",
                number(MIN_STROKE_WIDTH.max(font_size * STROKE_RATIO))
            ));
            css.push("stroke-linecap:round".to_string());
            css.push("stroke-linejoin:round".to_string());
        }
        None => css.push("stroke:none".to_string()),
    }

    Element::new("text")
        .with_attr("xml:space", "preserve")
        .with_attr("style", css.join(";"))
        .with_attr("x", number(x))
        .with_attr("y", number(rect.bottom()))
        .with_attr("text-anchor", anchor)
        .with_child(Element::new("tspan").with_text(text))
}

fn hide(root: &mut Element, path: &[usize]) {
    if let Some(element) = root.element_at_mut(path) {
        element.set_style_property("opacity", "0");
    }
}

fn number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}
