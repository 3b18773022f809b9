//! Table, CSV and JSON output of a quota result map.
use colored::{ColoredString, Colorize};
use tabled::builder::Builder;
use tabled::settings::object::Segment;
use tabled::settings::{Alignment, Style};

use hpc_quota::{Count, ResultMap, Usage};

pub const HEADERS: [&str; 7] = [
    "path",
    "space used",
    "quota (s)",
    "quota (h)",
    "files",
    "quota (s)",
    "quota (h)",
];

const CSV_HEADERS: [&str; 7] = [
    "path",
    "space_used_bytes",
    "space_soft_limit_bytes",
    "space_hard_limit_bytes",
    "inodes_used",
    "inodes_soft_limit",
    "inodes_hard_limit",
];

// paths are masked after this many characters.
pub const ANONYMIZE_KEEP: usize = 14;

const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// `1536` -> `1.5 KiB`. Zero is shown as `0.0 KiB`.
pub fn bytes_to_human(n: u64) -> String {
    if n == 0 {
        return "0.0 KiB".to_string();
    }
    let mut v = n as f64;
    for unit in UNITS.iter() {
        if v < 1024.0 {
            return format!("{:.1} {}", v, unit);
        }
        v /= 1024.0;
    }
    format!("{:.1} EiB", v)
}

/// `1234567` -> `1 234 567`.
pub fn number_grouped(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

pub fn anonymize(path: &str, keep: usize) -> String {
    path.chars()
        .enumerate()
        .map(|(i, c)| if i < keep { c } else { '*' })
        .collect()
}

fn space_used(c: Count) -> String {
    match c {
        Count::Known(n) => bytes_to_human(n),
        Count::Unknown => c.to_string(),
    }
}

fn inodes_used(c: Count) -> String {
    match c {
        Count::Known(n) => number_grouped(n),
        Count::Unknown => c.to_string(),
    }
}

fn limit(l: Option<u64>, f: fn(u64) -> String) -> String {
    l.map(f).unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warning,
    Critical,
}

/// How close to its limit a used value is.
pub fn level(ratio: Option<f64>) -> Option<Level> {
    match ratio {
        Some(r) if r > 0.85 => Some(Level::Critical),
        Some(r) if r > 0.7 => Some(Level::Warning),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Palette {
        Palette { enabled }
    }

    fn paint(&self, text: &str, rgb: (u8, u8, u8)) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let s: ColoredString = text.truecolor(rgb.0, rgb.1, rgb.2);
        s.to_string()
    }

    pub fn header(&self, text: &str) -> String {
        self.paint(text, (0x2e, 0x54, 0xff))
    }

    pub fn error(&self, text: &str) -> String {
        self.paint(text, (0xc7, 0x00, 0x39))
    }

    pub fn by_ratio(&self, text: &str, ratio: Option<f64>) -> String {
        match level(ratio) {
            Some(Level::Critical) => self.paint(text, (0xc7, 0x00, 0x39)),
            Some(Level::Warning) => self.paint(text, (0xff, 0x57, 0x33)),
            None => text.to_string(),
        }
    }
}

fn display_path(path: &str, masked: bool) -> String {
    if masked {
        anonymize(path, ANONYMIZE_KEEP)
    } else {
        path.to_string()
    }
}

fn table_row(path: &str, u: &Usage, palette: &Palette) -> Vec<String> {
    vec![
        path.to_string(),
        palette.by_ratio(&space_used(u.space_used_bytes), u.space_ratio()),
        limit(u.space_soft_limit_bytes, bytes_to_human),
        limit(u.space_hard_limit_bytes, bytes_to_human),
        palette.by_ratio(&inodes_used(u.inodes_used), u.inodes_ratio()),
        limit(u.inodes_soft_limit, number_grouped),
        limit(u.inodes_hard_limit, number_grouped),
    ]
}

/// The quota table, right-aligned, with colored headers.
pub fn table(map: &ResultMap, palette: &Palette, masked: bool) -> String {
    let mut builder = Builder::default();
    builder.push_record(HEADERS.iter().map(|h| palette.header(h)));
    for (path, usage) in map {
        builder.push_record(table_row(&display_path(path, masked), usage, palette));
    }
    let mut table = builder.build();
    table.with(Style::psql());
    table.modify(Segment::all(), Alignment::right());
    table.to_string()
}

/// Table framed by the version banner and the issues footer.
pub fn report(map: &ResultMap, palette: &Palette, masked: bool) -> String {
    format!(
        "\ndusage v{}\n\n{}\n\nPlease report issues at: https://github.com/NordicHPC/dusage",
        env!("CARGO_PKG_VERSION"),
        table(map, palette, masked),
    )
}

fn csv_count(c: Count) -> String {
    c.to_string()
}

fn csv_limit(l: Option<u64>) -> String {
    l.map(|n| n.to_string()).unwrap_or_default()
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Raw numbers, empty field for no limit.
pub fn csv(map: &ResultMap, masked: bool) -> String {
    let mut out = CSV_HEADERS.join(",");
    out.push('\n');
    for (path, u) in map {
        let fields = [
            csv_field(&display_path(path, masked)),
            csv_count(u.space_used_bytes),
            csv_limit(u.space_soft_limit_bytes),
            csv_limit(u.space_hard_limit_bytes),
            csv_count(u.inodes_used),
            csv_limit(u.inodes_soft_limit),
            csv_limit(u.inodes_hard_limit),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

pub fn json(map: &ResultMap) -> serde_json::Result<String> {
    serde_json::to_string_pretty(map)
}
