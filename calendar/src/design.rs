use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CalendarError, CalendarResult};
use crate::template::Template;

pub const DEFAULT_FONT: &str = "Noto Sans Gothic";
pub const DEFAULT_MONTH_TEMPLATE: &str = "main.svg";
const INDEX_FILE: &str = "index.json";

/// A CSS color as written in the design file (`rgb(..)`, `rgba(..)` or `#hex`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    #[default]
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperSize {
    #[default]
    A4,
    A5,
    A6,
    B6JIS,
    Postcard,
    L,
    #[serde(rename = "2L")]
    TwoL,
}

impl PaperSize {
    /// Portrait width and height in millimetres.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::A6 => (105.0, 148.0),
            Self::B6JIS => (128.0, 182.0),
            Self::Postcard => (100.0, 148.0),
            Self::L => (89.0, 127.0),
            Self::TwoL => (127.0, 178.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Layout {
    pub orientation: Orientation,
    pub size: PaperSize,
}

impl Layout {
    pub fn page_size_mm(&self) -> (f64, f64) {
        let (width, height) = self.size.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Templates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignColors {
    pub date: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuesday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wednesday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thursday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_month_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_month_date: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Color>,
}

impl DesignColors {
    pub fn new(date: impl Into<Color>) -> Self {
        Self {
            date: date.into(),
            sunday_date: None,
            monday_date: None,
            tuesday_date: None,
            wednesday_date: None,
            thursday_date: None,
            friday_date: None,
            saturday_date: None,
            holiday_date: None,
            previous_month_date: None,
            next_month_date: None,
            year: None,
            month: None,
            stroke: None,
        }
    }

    /// Day color for a weekday, 0 = Sunday.
    pub fn weekday(&self, weekday: usize) -> &Color {
        let color = match weekday % 7 {
            0 => &self.sunday_date,
            1 => &self.monday_date,
            2 => &self.tuesday_date,
            3 => &self.wednesday_date,
            4 => &self.thursday_date,
            5 => &self.friday_date,
            _ => &self.saturday_date,
        };
        color.as_ref().unwrap_or(&self.date)
    }

    pub fn holiday(&self) -> &Color {
        self.holiday_date
            .as_ref()
            .or(self.sunday_date.as_ref())
            .unwrap_or(&self.date)
    }

    pub fn previous_month(&self) -> &Color {
        self.previous_month_date.as_ref().unwrap_or(&self.date)
    }

    pub fn next_month(&self) -> &Color {
        self.next_month_date.as_ref().unwrap_or(&self.date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignFonts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holiday: Option<String>,
}

impl DesignFonts {
    pub fn date(&self) -> &str {
        self.date.as_deref().unwrap_or(DEFAULT_FONT)
    }

    pub fn month(&self) -> &str {
        self.month.as_deref().unwrap_or_else(|| self.date())
    }

    pub fn year(&self) -> &str {
        self.year.as_deref().unwrap_or_else(|| self.date())
    }

    pub fn holiday(&self) -> &str {
        self.holiday.as_deref().unwrap_or_else(|| self.date())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignOptions {
    #[serde(default)]
    pub disable_previous_month_date: bool,
    #[serde(default)]
    pub disable_next_month_date: bool,
    #[serde(default)]
    pub disable_text_stroke: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub templates: Templates,
    pub colors: DesignColors,
    #[serde(default)]
    pub fonts: DesignFonts,
    #[serde(default)]
    pub options: DesignOptions,
}

impl DesignConfig {
    pub fn new(id: impl Into<String>, colors: DesignColors) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            layout: Layout::default(),
            templates: Templates::default(),
            colors,
            fonts: DesignFonts::default(),
            options: DesignOptions::default(),
        }
    }

    /// Month template path relative to the designs directory.
    pub fn month_template_path(&self) -> PathBuf {
        match &self.templates.month {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.id).join(DEFAULT_MONTH_TEMPLATE),
        }
    }
}

/// Designs loaded from a directory, in index order.
#[derive(Debug, Clone)]
pub struct DesignRegistry {
    root: PathBuf,
    designs: Vec<DesignConfig>,
}

impl DesignRegistry {
    pub fn load(root: impl Into<PathBuf>) -> CalendarResult<Self> {
        let mut registry = Self {
            root: root.into(),
            designs: Vec::new(),
        };
        registry.refresh()?;
        Ok(registry)
    }

    pub fn from_designs(root: impl Into<PathBuf>, designs: Vec<DesignConfig>) -> Self {
        Self {
            root: root.into(),
            designs,
        }
    }

    /// Re-reads `index.json`. Later duplicates of an id replace earlier ones.
    pub fn refresh(&mut self) -> CalendarResult<()> {
        let path = self.root.join(INDEX_FILE);
        let content = read_file(&path)?;
        let loaded: Vec<DesignConfig> = serde_json::from_str(&content)?;

        let mut designs: Vec<DesignConfig> = Vec::with_capacity(loaded.len());
        for design in loaded {
            match designs.iter_mut().find(|d| d.id == design.id) {
                Some(existing) => *existing = design,
                None => designs.push(design),
            }
        }
        info!(root = %self.root.display(), count = designs.len(), "Loaded design index");
        self.designs = designs;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn designs(&self) -> &[DesignConfig] {
        &self.designs
    }

    pub fn get(&self, id: &str) -> Option<&DesignConfig> {
        self.designs.iter().find(|d| d.id == id)
    }

    pub fn require(&self, id: &str) -> CalendarResult<&DesignConfig> {
        self.get(id)
            .ok_or_else(|| CalendarError::UnknownDesign(id.to_string()))
    }

    pub fn next_id(&self, id: &str) -> Option<&str> {
        let position = self.designs.iter().position(|d| d.id == id)?;
        let next = (position + 1) % self.designs.len();
        Some(self.designs[next].id.as_str())
    }

    pub fn prev_id(&self, id: &str) -> Option<&str> {
        let position = self.designs.iter().position(|d| d.id == id)?;
        let len = self.designs.len();
        Some(self.designs[(position + len - 1) % len].id.as_str())
    }

    pub fn template_path(&self, id: &str) -> CalendarResult<PathBuf> {
        Ok(self.root.join(self.require(id)?.month_template_path()))
    }

    pub fn load_template(&self, id: &str) -> CalendarResult<Template> {
        let path = self.template_path(id)?;
        debug!(design = id, path = %path.display(), "Loading month template");
        Ok(Template::parse(&read_file(&path)?)?)
    }
}

fn read_file(path: &Path) -> CalendarResult<String> {
    fs::read_to_string(path).map_err(|source| CalendarError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const INDEX: &str = r##"[
        {
            "id": "simple",
            "name": "Simple",
            "layout": {"orientation": "landscape", "size": "A5"},
            "colors": {"date": "rgb(0, 0, 0)", "sundayDate": "rgb(200, 0, 0)"},
            "fonts": {"date": "Klee One"},
            "options": {"disablePreviousMonthDate": true}
        },
        {
            "id": "photo",
            "name": "Photo",
            "layout": {"orientation": "portrait", "size": "2L"},
            "templates": {"month": "photo/month.svg"},
            "colors": {"date": "#333333", "holidayDate": "#ff0000"}
        }
    ]"##;

    #[test]
    fn test_color_fallbacks() {
        let mut colors = DesignColors::new("rgb(0, 0, 0)");
        assert_eq!(colors.holiday().as_str(), "rgb(0, 0, 0)");
        colors.sunday_date = Some("rgb(200, 0, 0)".into());
        assert_eq!(colors.weekday(0).as_str(), "rgb(200, 0, 0)");
        assert_eq!(colors.weekday(3).as_str(), "rgb(0, 0, 0)");
        assert_eq!(colors.holiday().as_str(), "rgb(200, 0, 0)");
        colors.holiday_date = Some("#ff0000".into());
        assert_eq!(colors.holiday().as_str(), "#ff0000");
        assert_eq!(colors.previous_month().as_str(), "rgb(0, 0, 0)");
    }

    #[test]
    fn test_font_fallbacks() {
        let mut fonts = DesignFonts::default();
        assert_eq!(fonts.holiday(), DEFAULT_FONT);
        fonts.date = Some("Klee One".to_string());
        fonts.year = Some("Yomogi".to_string());
        assert_eq!(fonts.month(), "Klee One");
        assert_eq!(fonts.year(), "Yomogi");
    }

    #[test]
    fn test_page_size_follows_orientation() {
        let layout = Layout {
            orientation: Orientation::Landscape,
            size: PaperSize::A4,
        };
        assert_eq!(layout.page_size_mm(), (297.0, 210.0));
        assert_eq!(PaperSize::TwoL.dimensions_mm(), (127.0, 178.0));
    }

    #[test]
    fn test_registry_load_and_navigation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.json"), INDEX).unwrap();

        let registry = DesignRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.designs().len(), 2);

        let simple = registry.get("simple").unwrap();
        assert_eq!(simple.layout.size, PaperSize::A5);
        assert!(simple.options.disable_previous_month_date);
        assert_eq!(simple.fonts.date(), "Klee One");
        assert_eq!(
            registry.template_path("simple").unwrap(),
            dir.path().join("simple").join("main.svg")
        );
        assert_eq!(
            registry.template_path("photo").unwrap(),
            dir.path().join("photo/month.svg")
        );

        assert_eq!(registry.next_id("photo"), Some("simple"));
        assert_eq!(registry.prev_id("simple"), Some("photo"));
        assert_eq!(registry.next_id("missing"), None);
        assert!(matches!(
            registry.require("missing"),
            Err(CalendarError::UnknownDesign(_))
        ));
    }

    #[test]
    fn test_missing_template_is_an_io_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.json"), INDEX).unwrap();
        let registry = DesignRegistry::load(dir.path()).unwrap();
        assert!(matches!(
            registry.load_template("simple"),
            Err(CalendarError::Io { .. })
        ));
    }
}
