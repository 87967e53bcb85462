use albumdiff_common::{ComparisonSummary, LibraryComparison};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

const RULE_WIDTH: usize = 50;

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub summary: ComparisonSummary,
    pub missing_in_google: Vec<String>,
    pub missing_in_onedrive: Vec<String>,
    pub count_mismatches: BTreeMap<String, JsonCountPair>,
    pub matched_albums: BTreeMap<String, JsonMatchedAlbum>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct JsonCountPair {
    pub onedrive: u64,
    pub google: u64,
}

/// A paired album, keyed in the report by its OneDrive name
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct JsonMatchedAlbum {
    pub google_name: String,
    pub onedrive_count: u64,
    pub google_count: u64,
}

pub fn build_json_report(comparison: &LibraryComparison) -> JsonReport {
    let count_mismatches = comparison
        .count_mismatches()
        .iter()
        .map(|(name, &(onedrive, google))| (name.clone(), JsonCountPair { onedrive, google }))
        .collect();

    let onedrive = comparison.onedrive_albums();
    let google = comparison.google_albums();
    let matched_albums = comparison
        .pairing()
        .iter()
        .map(|(od_name, gp_name)| {
            let matched = JsonMatchedAlbum {
                google_name: gp_name.to_string(),
                onedrive_count: onedrive.get(od_name).map_or(0, |a| a.item_count),
                google_count: google.get(gp_name).map_or(0, |a| a.item_count),
            };
            (od_name.to_string(), matched)
        })
        .collect();

    JsonReport {
        summary: comparison.summary(),
        missing_in_google: comparison.missing_in_google().to_vec(),
        missing_in_onedrive: comparison.missing_in_onedrive().to_vec(),
        count_mismatches,
        matched_albums,
    }
}

struct Palette {
    red: &'static str,
    yellow: &'static str,
    green: &'static str,
    reset: &'static str,
}

impl Palette {
    fn new(use_color: bool) -> Self {
        if use_color {
            Self {
                red: RED,
                yellow: YELLOW,
                green: GREEN,
                reset: RESET,
            }
        } else {
            Self {
                red: "",
                yellow: "",
                green: "",
                reset: "",
            }
        }
    }
}

/// Human readable comparison results
pub fn render_console<W: Write>(
    out: &mut W,
    comparison: &LibraryComparison,
    use_color: bool,
) -> io::Result<()> {
    let palette = Palette::new(use_color);
    let onedrive = comparison.onedrive_albums();
    let google = comparison.google_albums();

    writeln!(out, "\n{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "COMPARISON RESULTS")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;

    let summary = comparison.summary();
    writeln!(out, "\nSummary:")?;
    writeln!(out, "   OneDrive Albums:  {}", summary.onedrive_album_count)?;
    writeln!(out, "   Google Albums:    {}", summary.google_album_count)?;
    writeln!(out, "   Matched:          {}", summary.matched_albums)?;

    let missing_in_google = comparison.missing_in_google();
    if !missing_in_google.is_empty() {
        writeln!(
            out,
            "\n{}Missing in Google Photos ({}):{}",
            palette.red,
            missing_in_google.len(),
            palette.reset
        )?;
        for name in missing_in_google {
            let count = onedrive.get(name).map_or(0, |a| a.item_count);
            writeln!(out, "   - {} ({} items)", name, count)?;
        }
    }

    let missing_in_onedrive = comparison.missing_in_onedrive();
    if !missing_in_onedrive.is_empty() {
        writeln!(
            out,
            "\n{}Missing in OneDrive ({}):{}",
            palette.red,
            missing_in_onedrive.len(),
            palette.reset
        )?;
        for name in missing_in_onedrive {
            let count = google.get(name).map_or(0, |a| a.item_count);
            writeln!(out, "   - {} ({} items)", name, count)?;
        }
    }

    let mismatches = comparison.count_mismatches();
    if !mismatches.is_empty() {
        writeln!(
            out,
            "\n{}Count Mismatches ({}):{}",
            palette.yellow,
            mismatches.len(),
            palette.reset
        )?;
        for (name, &(od_count, gp_count)) in mismatches {
            let diff = gp_count as i64 - od_count as i64;
            writeln!(
                out,
                "   - {}: OneDrive={}, Google={} (diff: {:+})",
                name, od_count, gp_count, diff
            )?;
        }
    }

    if comparison.is_in_sync() {
        writeln!(out, "\n{}Libraries are in sync!{}", palette.green, palette.reset)?;
    }

    writeln!(out, "\n{}", "=".repeat(RULE_WIDTH))?;
    Ok(())
}
