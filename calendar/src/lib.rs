mod builder;
mod cache;
mod design;
mod dom;
mod error;
mod format;
mod grid;
mod holiday;
mod region;
mod template;
mod validation;

pub use builder::{build_calendar, BuildStage, BuiltCalendar, CalendarBuilder, ImageRegion};
pub use cache::{CalendarCache, CalendarKey};
pub use design::{
    Color, DesignColors, DesignConfig, DesignFonts, DesignOptions, DesignRegistry, Layout,
    Orientation, PaperSize, Templates, DEFAULT_FONT,
};
pub use dom::{Element, Node, SVG_NAMESPACE, XLINK_NAMESPACE};
pub use error::{CalendarError, CalendarResult, TemplateError};
pub use format::{date_color, format_day, format_label, Align, Directives, LabelKind};
pub use grid::{
    compute_grid, fiscal_months, normalize_year_month, CalendarGrid, DayCell, YearMonth,
    DAYS_PER_WEEK, GRID_CELLS,
};
pub use holiday::{
    DayAnnotation, HolidayInfo, HolidayResolver, HolidayTable, MonthHolidays, ANNIVERSARY_MARKS,
};
pub use region::{locate_regions, RegionIndex, RegionKind, RegionName, TemplateRegion};
pub use template::{parse_length_px, Rect, Template, Viewport};
pub use validation::{date_key, parse_date_key, validate_input, ValidationError};
