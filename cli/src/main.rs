use base64::{engine::general_purpose::STANDARD, Engine as _};
use calendar::{
    build_calendar, fiscal_months, normalize_year_month, BuiltCalendar, DesignRegistry,
    HolidayResolver, HolidayTable, YearMonth,
};
use clap::Parser;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// CLI tool to render month calendars from SVG design templates
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding `index.json` and one folder per design
    ///
    /// Each design is listed in `index.json` and its month template lives at
    /// `<design>/main.svg` unless the design names another path.
    #[arg(short, long, default_value = "designs", help = "Path to the designs directory")]
    designs: PathBuf,

    #[arg(help = "Design id from index.json")]
    design: String,

    #[arg(help = "Calendar year")]
    year: i32,

    /// Month to render. All twelve months are rendered when omitted.
    ///
    /// With --fiscal the month is a slot in an April-first year: 1 is April of YEAR and 12 is
    /// March of YEAR+1.
    #[arg(help = "Month 1-12 (defaults to the whole year)")]
    month: Option<u32>,

    #[arg(long, help = "Treat the year as starting in April")]
    fiscal: bool,

    /// JSON file of public holidays. The bundled Japanese table is used when omitted.
    #[arg(long, help = "Optional path to a holidays JSON file")]
    holidays: Option<PathBuf>,

    #[arg(long, help = "Optional path to an anniversaries JSON file")]
    anniversaries: Option<PathBuf>,

    #[arg(long, help = "Ignore anniversaries, show public holidays only")]
    holidays_only: bool,

    /// Optional output file for a single month (defaults to stdout if not provided)
    #[arg(short, long, help = "Optional path for the output SVG file")]
    output: Option<PathBuf>,

    #[arg(long, help = "Directory for one SVG per month, required for a whole year")]
    output_dir: Option<PathBuf>,

    /// Photo to place into every image region of a block, e.g. `--image photo=cat.jpg`
    #[arg(long = "image", value_parser = parse_image, help = "Embed an image as BLOCK=PATH")]
    images: Vec<(String, PathBuf)>,
}

fn parse_image(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((block, path)) if !path.is_empty() => {
            Ok((block.trim().to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected BLOCK=PATH, got '{}'", raw)),
    }
}

fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn data_url(path: &Path) -> Result<String, Box<dyn Error>> {
    let bytes =
        fs::read(path).map_err(|e| format!("Failed to read image {}: {}", path.display(), e))?;
    Ok(format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes)))
}

fn load_resolver(args: &Args) -> Result<HolidayResolver, Box<dyn Error>> {
    let statutory = match &args.holidays {
        Some(path) => HolidayTable::load(path)?,
        None => HolidayTable::bundled()?,
    };
    let anniversaries = match &args.anniversaries {
        Some(path) => HolidayTable::load(path)?,
        None => HolidayTable::new(),
    };
    Ok(HolidayResolver::with_anniversaries(statutory, anniversaries))
}

fn months(args: &Args) -> Result<Vec<YearMonth>, Box<dyn Error>> {
    Ok(match args.month {
        Some(month) => vec![normalize_year_month(args.year, month, args.fiscal)?],
        None => fiscal_months(args.year, args.fiscal)?,
    })
}

fn render(args: &Args) -> Result<Vec<BuiltCalendar>, Box<dyn Error>> {
    let registry = DesignRegistry::load(&args.designs)?;
    let design = registry.require(&args.design)?;
    let template = registry.load_template(&args.design)?;
    let resolver = load_resolver(args)?;

    let mut images = Vec::with_capacity(args.images.len());
    for (block, path) in &args.images {
        images.push((block.as_str(), data_url(path)?));
    }

    let mut calendars = Vec::new();
    for year_month in months(args)? {
        let mut built =
            build_calendar(design, &template, &resolver, year_month, args.holidays_only)?;
        for (block, href) in &images {
            let name = format!("{}-{}", block, year_month.month());
            if !built.embed_image(&name, href) {
                warn!(design = %design.id, image = %name, "Template has no region for image");
            }
        }
        info!(design = %design.id, %year_month, "Rendered calendar");
        calendars.push(built);
    }
    Ok(calendars)
}

fn output_file_name(design: &str, year_month: YearMonth) -> String {
    format!(
        "{}-{}-{:02}.svg",
        design,
        year_month.year(),
        year_month.month()
    )
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    if args.month.is_none() && args.output_dir.is_none() {
        return Err("Rendering a whole year requires --output-dir".into());
    }

    let calendars = render(args)?;

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create output directory: {}", e))?;
        for built in &calendars {
            let path = dir.join(output_file_name(&args.design, built.year_month()));
            fs::write(&path, built.to_svg_string())
                .map_err(|e| format!("Failed to write to output file: {}", e))?;
            println!("SVG successfully written to: {}", path.display());
        }
        return Ok(());
    }

    for built in &calendars {
        let svg_content = built.to_svg_string();
        match &args.output {
            Some(path) => {
                fs::write(path, svg_content)
                    .map_err(|e| format!("Failed to write to output file: {}", e))?;
                println!("SVG successfully written to: {}", path.display());
            }
            None => {
                io::stdout()
                    .write_all(svg_content.as_bytes())
                    .map_err(|e| format!("Failed to write to stdout: {}", e))?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args = Args::parse();
    run(&args)
}
