//! Label text and color selection.

use crate::design::{Color, DesignColors};
use crate::grid::DayCell;

const MONTH_LONG_JA: [&str; 12] = [
    "睦月", "如月", "弥生", "卯月", "皐月", "水無月", "文月", "葉月", "長月", "神無月", "霜月", "師走",
];

const MONTH_LONG_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTH_SHORT_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Year,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

/// Formatting hints from the bracket of a region label, e.g. `month[long,enUS]`.
/// Unknown tokens are kept but never match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    tokens: Vec<String>,
}

impl Directives {
    pub fn parse(raw: &str) -> Self {
        Self {
            tokens: raw
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn has(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn align(&self) -> Align {
        if self.has("left") {
            Align::Left
        } else if self.has("right") {
            Align::Right
        } else {
            Align::Center
        }
    }
}

pub fn format_label(kind: LabelKind, year: i32, month: u32, directives: &Directives) -> String {
    let long = directives.has("long");
    let short = directives.has("short");
    let ja = directives.has("jaJP");
    let en = directives.has("enUS");

    match kind {
        LabelKind::Year if long && ja => format!("{}年", year),
        LabelKind::Year => year.to_string(),
        LabelKind::Month => {
            let name = |table: &[&'static str; 12]| {
                month
                    .checked_sub(1)
                    .and_then(|i| table.get(i as usize))
                    .map(|name| name.to_string())
            };
            let text = if short && ja {
                Some(format!("{}月", month))
            } else if long && ja {
                name(&MONTH_LONG_JA)
            } else if short && en {
                name(&MONTH_SHORT_EN)
            } else if long && en {
                name(&MONTH_LONG_EN)
            } else {
                None
            };
            text.unwrap_or_else(|| month.to_string())
        }
    }
}

pub fn format_day(cell: DayCell) -> String {
    cell.day().to_string()
}

/// Spillover days take their adjacent-month color; holidays beat the weekday color.
pub fn date_color(cell: DayCell, weekday: usize, holiday: bool, colors: &DesignColors) -> &Color {
    match cell {
        DayCell::Previous(_) => colors.previous_month(),
        DayCell::Next(_) => colors.next_month(),
        DayCell::Current(_) if holiday => colors.holiday(),
        DayCell::Current(_) => colors.weekday(weekday),
    }
}
