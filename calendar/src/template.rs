use serde::Serialize;

use crate::dom::Element;
use crate::error::TemplateError;

const PX_PER_INCH: f64 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Reads the declared `x`/`y`/`width`/`height` of an element. Missing `x`/`y` mean 0;
    /// width and height are required and must not be negative.
    pub fn from_element(element: &Element) -> Option<Self> {
        let width = element.number_attr("width")?;
        let height = element.number_attr("height")?;
        if width < 0.0 || height < 0.0 {
            return None;
        }
        Some(Self {
            x: element.number_attr("x").unwrap_or(0.0),
            y: element.number_attr("y").unwrap_or(0.0),
            width,
            height,
        })
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Converts an SVG length (`12`, `12px`, `210mm`, `1in`, ...) to CSS pixels.
/// Relative units (`%`, `em`) have no absolute size and yield `None`.
pub fn parse_length_px(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic() || c == '%')
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value = number.trim().parse::<f64>().ok()?;
    let scale = match unit.trim() {
        "" | "px" => 1.0,
        "mm" => PX_PER_INCH / 25.4,
        "cm" => PX_PER_INCH / 2.54,
        "in" => PX_PER_INCH,
        "pt" => PX_PER_INCH / 72.0,
        "pc" => PX_PER_INCH / 6.0,
        _ => return None,
    };
    Some(value * scale).filter(|v| v.is_finite())
}

fn parse_view_box(raw: &str) -> Option<Rect> {
    let values: Vec<f64> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [x, y, width, height] if *width > 0.0 && *height > 0.0 => {
            Some(Rect::new(*x, *y, *width, *height))
        }
        _ => None,
    }
}

/// The template's user coordinate system and its rendered size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub view_box: Rect,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    fn from_root(root: &Element) -> Self {
        let view_box = root.attr("viewBox").and_then(parse_view_box);
        let width = root.attr("width").and_then(parse_length_px);
        let height = root.attr("height").and_then(parse_length_px);

        match view_box {
            Some(view_box) => {
                let aspect = view_box.height / view_box.width;
                let (width, height) = match (width, height) {
                    (Some(w), Some(h)) => (w, h),
                    (Some(w), None) => (w, w * aspect),
                    (None, Some(h)) => (h / aspect, h),
                    (None, None) => (view_box.width, view_box.height),
                };
                Self {
                    view_box,
                    width,
                    height,
                }
            }
            None => {
                let width = width.unwrap_or(0.0);
                let height = height.unwrap_or(0.0);
                Self {
                    view_box: Rect::new(0.0, 0.0, width, height),
                    width,
                    height,
                }
            }
        }
    }

    /// Maps a rect in user units onto the rendered pixel grid.
    pub fn to_pixels(&self, rect: Rect) -> Rect {
        let scale = |size: f64, extent: f64| if extent > 0.0 { size / extent } else { 1.0 };
        let sx = scale(self.width, self.view_box.width);
        let sy = scale(self.height, self.view_box.height);
        Rect {
            x: (rect.x - self.view_box.x) * sx,
            y: (rect.y - self.view_box.y) * sy,
            width: rect.width * sx,
            height: rect.height * sy,
        }
    }
}

/// A parsed month template. Shared read-only; builds work on [`Template::instantiate`] copies.
#[derive(Debug, Clone)]
pub struct Template {
    root: Element,
    viewport: Viewport,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut root = Element::parse(text)?;
        if root.local_name() != "svg" {
            return Err(TemplateError::NotSvg(root.name().to_string()));
        }

        let viewport = Viewport::from_root(&root);
        // let the document scale to whatever container it lands in
        for attr in ["id", "width", "height"] {
            root.remove_attr(attr);
        }
        if root.attr("viewBox").is_none() && viewport.view_box.width > 0.0 {
            let vb = viewport.view_box;
            root.set_attr(
                "viewBox",
                format!("{} {} {} {}", vb.x, vb.y, vb.width, vb.height),
            );
        }

        Ok(Self { root, viewport })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn instantiate(&self) -> Element {
        self.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_units() {
        assert_eq!(parse_length_px("12"), Some(12.0));
        assert_eq!(parse_length_px(" 12px "), Some(12.0));
        assert_eq!(parse_length_px("1in"), Some(96.0));
        assert_eq!(parse_length_px("72pt"), Some(96.0));
        assert!((parse_length_px("25.4mm").unwrap() - 96.0).abs() < 1e-9);
        assert_eq!(parse_length_px("100%"), None);
        assert_eq!(parse_length_px("2em"), None);
        assert_eq!(parse_length_px("abc"), None);
    }

    #[test]
    fn test_template_strips_root_size_and_keeps_viewport() {
        let template = Template::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg" id="page" width="254mm" height="127mm" viewBox="0 0 254 127"/>"#,
        )
        .unwrap();
        let root = template.root();
        assert_eq!(root.attr("id"), None);
        assert_eq!(root.attr("width"), None);
        assert_eq!(root.attr("viewBox"), Some("0 0 254 127"));

        let viewport = template.viewport();
        assert!((viewport.width - 960.0).abs() < 1e-9);
        assert!((viewport.height - 480.0).abs() < 1e-9);

        let px = viewport.to_pixels(Rect::new(25.4, 12.7, 50.8, 25.4));
        assert!((px.x - 96.0).abs() < 1e-9);
        assert!((px.y - 48.0).abs() < 1e-9);
        assert!((px.width - 192.0).abs() < 1e-9);
        assert!((px.height - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_template_without_view_box_gets_one() {
        let template =
            Template::parse(r#"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="200"/>"#)
                .unwrap();
        assert_eq!(template.root().attr("viewBox"), Some("0 0 300 200"));
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(template.viewport().to_pixels(rect), rect);
    }

    #[test]
    fn test_non_svg_root_is_rejected() {
        assert!(matches!(
            Template::parse("<html/>"),
            Err(TemplateError::NotSvg(name)) if name == "html"
        ));
    }

    #[test]
    fn test_rect_requires_size() {
        let rect = Element::new("rect").with_attr("width", "10").with_attr("height", "5");
        assert_eq!(Rect::from_element(&rect), Some(Rect::new(0.0, 0.0, 10.0, 5.0)));
        assert_eq!(Rect::from_element(&Element::new("g")), None);
        let negative = Element::new("rect").with_attr("width", "-1").with_attr("height", "5");
        assert_eq!(Rect::from_element(&negative), None);
    }

    #[test]
    fn test_instances_are_independent() {
        let template =
            Template::parse(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"/>"#)
                .unwrap();
        let mut copy = template.instantiate();
        copy.push(Element::new("rect"));
        assert!(template.root().children().is_empty());
    }
}
