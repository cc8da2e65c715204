use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::{debug, warn};

use crate::builder::{build_calendar, BuiltCalendar};
use crate::design::DesignRegistry;
use crate::error::CalendarResult;
use crate::grid::YearMonth;
use crate::holiday::HolidayResolver;
use crate::template::Template;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarKey {
    pub design: String,
    pub year_month: YearMonth,
    pub holidays_only: bool,
}

/// Parsed templates per design and built calendars per (design, month, holiday mode).
///
/// Built calendars are only valid for the template and holiday data they were built from;
/// callers that change either must invalidate the matching entries.
pub struct CalendarCache {
    templates: Cache<String, Arc<Template>>,
    calendars: Cache<CalendarKey, Arc<BuiltCalendar>>,
}

impl CalendarCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            templates: Cache::builder().max_capacity(capacity).build(),
            calendars: Cache::builder()
                .time_to_live(ttl)
                .time_to_idle(ttl * 2)
                .max_capacity(capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    pub fn template_or_load(
        &self,
        registry: &DesignRegistry,
        design: &str,
    ) -> CalendarResult<Arc<Template>> {
        if let Some(template) = self.templates.get(design) {
            return Ok(template);
        }
        let template = Arc::new(registry.load_template(design)?);
        self.templates.insert(design.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Returns the calendar and whether it was served from the cache.
    pub fn calendar_or_build(
        &self,
        registry: &DesignRegistry,
        resolver: &HolidayResolver,
        design: &str,
        year_month: YearMonth,
        holidays_only: bool,
    ) -> CalendarResult<(Arc<BuiltCalendar>, bool)> {
        let key = CalendarKey {
            design: design.to_string(),
            year_month,
            holidays_only,
        };
        if let Some(built) = self.calendars.get(&key) {
            return Ok((built, true));
        }

        let config = registry.require(design)?;
        let template = self.template_or_load(registry, design)?;
        let built = Arc::new(build_calendar(
            config,
            &template,
            resolver,
            year_month,
            holidays_only,
        )?);
        self.calendars.insert(key, Arc::clone(&built));
        Ok((built, false))
    }

    /// Swaps in an edited template and drops every calendar built from the old one.
    pub fn replace_template(&self, design: &str, template: Template) {
        self.invalidate_design(design);
        self.templates
            .insert(design.to_string(), Arc::new(template));
    }

    pub fn invalidate_design(&self, design: &str) {
        debug!(design, "Invalidating design");
        self.templates.invalidate(design);
        let design = design.to_string();
        self.invalidate_calendars(move |key| key.design == design);
    }

    pub fn invalidate_month(&self, year_month: YearMonth) {
        debug!(%year_month, "Invalidating month");
        self.invalidate_calendars(move |key| key.year_month == year_month);
    }

    /// Holiday or anniversary data changed; every built calendar may be stale.
    pub fn invalidate_holidays(&self) {
        debug!("Invalidating all calendars");
        self.calendars.invalidate_all();
    }

    fn invalidate_calendars<F>(&self, predicate: F)
    where
        F: Fn(&CalendarKey) -> bool + Send + Sync + 'static,
    {
        if let Err(e) = self
            .calendars
            .invalidate_entries_if(move |key, _| predicate(key))
        {
            warn!(error = %e, "Selective invalidation failed, clearing all calendars");
            self.calendars.invalidate_all();
        }
    }

    pub fn contains_calendar(&self, key: &CalendarKey) -> bool {
        self.calendars.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holiday::HolidayTable;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const INDEX: &str = r#"[
        {"id": "a", "name": "A", "layout": {"orientation": "portrait", "size": "A4"}, "colors": {"date": "black"}},
        {"id": "b", "name": "B", "layout": {"orientation": "portrait", "size": "A4"}, "colors": {"date": "black"}}
    ]"#;

    const TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" viewBox="0 0 100 100">
        <rect inkscape:label="month" x="0" y="0" width="100" height="20"/>
    </svg>"#;

    fn registry() -> (DesignRegistry, TempDir) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.json"), INDEX).unwrap();
        for id in ["a", "b"] {
            fs::create_dir(dir.path().join(id)).unwrap();
            fs::write(dir.path().join(id).join("main.svg"), TEMPLATE).unwrap();
        }
        (DesignRegistry::load(dir.path()).unwrap(), dir)
    }

    fn key(design: &str, month: u32) -> CalendarKey {
        CalendarKey {
            design: design.to_string(),
            year_month: YearMonth::new(2025, month).unwrap(),
            holidays_only: false,
        }
    }

    fn fill(cache: &CalendarCache, registry: &DesignRegistry, resolver: &HolidayResolver) {
        for design in ["a", "b"] {
            for month in [4, 5] {
                let ym = YearMonth::new(2025, month).unwrap();
                cache
                    .calendar_or_build(registry, resolver, design, ym, false)
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_second_build_is_a_hit() {
        let (registry, _dir) = registry();
        let resolver = HolidayResolver::new(HolidayTable::new());
        let cache = CalendarCache::new(64, Duration::from_secs(60));
        let ym = YearMonth::new(2025, 4).unwrap();

        let (first, hit) = cache
            .calendar_or_build(&registry, &resolver, "a", ym, false)
            .unwrap();
        assert!(!hit);
        let (second, hit) = cache
            .calendar_or_build(&registry, &resolver, "a", ym, false)
            .unwrap();
        assert!(hit);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.to_svg_string().contains("<tspan>4</tspan>"));
    }

    #[test]
    fn test_unknown_design() {
        let (registry, _dir) = registry();
        let resolver = HolidayResolver::new(HolidayTable::new());
        let cache = CalendarCache::new(64, Duration::from_secs(60));
        let ym = YearMonth::new(2025, 4).unwrap();
        assert!(cache
            .calendar_or_build(&registry, &resolver, "zzz", ym, false)
            .is_err());
    }

    #[test]
    fn test_invalidate_design_and_month() {
        let (registry, _dir) = registry();
        let resolver = HolidayResolver::new(HolidayTable::new());
        let cache = CalendarCache::new(64, Duration::from_secs(60));
        fill(&cache, &registry, &resolver);

        cache.invalidate_design("a");
        assert!(!cache.contains_calendar(&key("a", 4)));
        assert!(!cache.contains_calendar(&key("a", 5)));
        assert!(cache.contains_calendar(&key("b", 4)));

        cache.invalidate_month(YearMonth::new(2025, 5).unwrap());
        assert!(cache.contains_calendar(&key("b", 4)));
        assert!(!cache.contains_calendar(&key("b", 5)));

        cache.invalidate_holidays();
        assert!(!cache.contains_calendar(&key("b", 4)));
    }

    #[test]
    fn test_replace_template() {
        let (registry, _dir) = registry();
        let resolver = HolidayResolver::new(HolidayTable::new());
        let cache = CalendarCache::new(64, Duration::from_secs(60));
        let ym = YearMonth::new(2025, 4).unwrap();
        cache
            .calendar_or_build(&registry, &resolver, "a", ym, false)
            .unwrap();

        let edited = Template::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" viewBox="0 0 100 100">
                 <rect inkscape:label="month[long,enUS]" x="0" y="0" width="100" height="20"/>
               </svg>"#,
        )
        .unwrap();
        cache.replace_template("a", edited);

        let (built, hit) = cache
            .calendar_or_build(&registry, &resolver, "a", ym, false)
            .unwrap();
        assert!(!hit);
        assert!(built.to_svg_string().contains("<tspan>April</tspan>"));
    }
}
