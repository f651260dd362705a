// SPDX-License-Identifier: GPL-3.0-only

//! Markdown rendering of finished scans.
//!
//! Two documents come out of a report: the per-folder year audit and the
//! recent-activity matrix (folders × extensions). The matrix can exceed what a
//! spreadsheet import tolerates, so it is split into parts of at most
//! `rows_per_part` rows. Only the first part carries the summary and the list
//! of folders without counted files.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use num_format::{Locale, ToFormattedString};

use audit_types::{ScanReport, display_folder};

use crate::audit::format_bytes;

pub const YEAR_REPORT_FILE: &str = "bucket-audit-years.md";
pub const RECENT_REPORT_STEM: &str = "bucket-audit-recent";
const RECENT_TOTAL_COLUMN: &str = "Recent total";

/// One rendered document and the file name it should be written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions<'a> {
    /// Bucket name or local directory, shown in headers.
    pub source: &'a str,
    pub generated_at: DateTime<Utc>,
    pub rows_per_part: usize,
    pub recent_days: i64,
}

fn count(value: u64) -> String {
    value.to_formatted_string(&Locale::en)
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn prefix_label(prefix: &str) -> &str {
    if prefix.is_empty() { "(whole bucket)" } else { prefix }
}

pub fn render_year_report(report: &ScanReport, options: &ReportOptions<'_>) -> String {
    let aggregates = &report.aggregates;
    let mut out = String::new();

    let _ = writeln!(out, "# Bucket audit: files per folder and year\n");
    let _ = writeln!(
        out,
        "**Date:** {}  ",
        options.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "**Source:** `{}`  ", options.source);
    let _ = writeln!(out, "**Prefix:** `{}`  ", prefix_label(&report.root_prefix));
    if let Some(excluded) = &report.excluded_prefix {
        let _ = writeln!(out, "**Excluded:** `{excluded}`  ");
    }
    let _ = writeln!(out, "**Status:** {}  ", report.status);
    let _ = writeln!(
        out,
        "**Objects:** {} ({}), ignored {}\n",
        count(report.objects_processed),
        format_bytes(aggregates.bytes()),
        count(report.objects_ignored)
    );
    let _ = writeln!(out, "---\n");

    for folder in aggregates.known_paths() {
        let _ = writeln!(out, "### `{}`\n", display_folder(folder));

        match aggregates.years().folder(folder) {
            Some(years) => {
                let _ = writeln!(out, "| Year | Files |");
                let _ = writeln!(out, "| :--- | ---: |");
                for (year, files) in years {
                    let _ = writeln!(out, "| {year} | {} |", count(*files));
                }
                let _ = writeln!(
                    out,
                    "\n**Total in this folder:** {} files",
                    count(aggregates.folder_total(folder))
                );
            }
            None if has_subfolders(aggregates.known_paths(), folder) => {
                let _ = writeln!(out, "> *Contains only subfolders.*");
            }
            None => {
                let _ = writeln!(out, "> *Empty folder.*");
            }
        }

        let _ = writeln!(out, "\n---\n");
    }

    out
}

fn has_subfolders(known: &BTreeSet<String>, folder: &str) -> bool {
    known
        .range::<str, _>((std::ops::Bound::Excluded(folder), std::ops::Bound::Unbounded))
        .next()
        .is_some_and(|next| next.starts_with(folder))
}

/// Folder rows of the recent matrix: every folder with a counted extension or
/// a recent object, with its per-extension counts.
fn matrix_rows(report: &ScanReport) -> BTreeMap<&str, BTreeMap<&str, u64>> {
    let aggregates = &report.aggregates;
    let mut rows: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();

    for (folder, extensions) in aggregates.extensions().iter() {
        let row = rows.entry(folder).or_default();
        for (extension, files) in extensions {
            *row.entry(extension.as_str()).or_insert(0) += files;
        }
    }
    for folder in aggregates.recent().keys() {
        rows.entry(folder.as_str()).or_default();
    }

    rows
}

pub fn render_recent_matrix(
    report: &ScanReport,
    options: &ReportOptions<'_>,
) -> Vec<RenderedReport> {
    let aggregates = &report.aggregates;
    let rows = matrix_rows(report);
    let columns: BTreeSet<&str> = rows.values().flat_map(|row| row.keys().copied()).collect();

    let row_list: Vec<_> = rows.iter().collect();
    let rows_per_part = options.rows_per_part.max(1);
    let chunks: Vec<_> = if row_list.is_empty() {
        vec![&row_list[..]]
    } else {
        row_list.chunks(rows_per_part).collect()
    };
    let parts = chunks.len();

    let mut rendered = Vec::with_capacity(parts);
    for (index, chunk) in chunks.into_iter().enumerate() {
        let mut out = String::new();
        let _ = writeln!(out, "# Recent activity matrix");
        if parts > 1 {
            let _ = writeln!(out, "\nPart {} of {}", index + 1, parts);
        }

        if index == 0 {
            render_summary(&mut out, report, options);
        }

        let _ = writeln!(out, "\n## Matrix\n");
        let mut header = String::from("| Folder |");
        let mut rule = String::from("| :--- |");
        for column in &columns {
            let _ = write!(header, " {} |", cell(column));
            rule.push_str(" ---: |");
        }
        let _ = write!(header, " {RECENT_TOTAL_COLUMN} |");
        rule.push_str(" ---: |");
        let _ = writeln!(out, "{header}\n{rule}");

        for (folder, counts) in chunk {
            let mut line = format!("| {} |", cell(display_folder(folder)));
            for column in &columns {
                let value = counts.get(column).copied().unwrap_or(0);
                let _ = write!(line, " {} |", count(value));
            }
            let _ = write!(line, " {} |", count(aggregates.recent_count(folder)));
            let _ = writeln!(out, "{line}");
        }

        if index == 0 {
            let without: Vec<&str> = aggregates
                .folders_without_files()
                .filter(|folder| !folder.is_empty())
                .collect();
            if !without.is_empty() {
                let _ = writeln!(out, "\n## Folders without recent files\n");
                let _ = writeln!(out, "| Folder | Status |");
                let _ = writeln!(out, "| :--- | :--- |");
                for folder in without {
                    let _ = writeln!(out, "| {} | no recent files (or empty) |", cell(folder));
                }
            }
        }

        let file_name = if parts > 1 {
            format!("{RECENT_REPORT_STEM}_part_{}.md", index + 1)
        } else {
            format!("{RECENT_REPORT_STEM}.md")
        };
        rendered.push(RenderedReport {
            file_name,
            contents: out,
        });
    }

    rendered
}

fn render_summary(out: &mut String, report: &ScanReport, options: &ReportOptions<'_>) {
    let _ = writeln!(out, "\n## Summary\n");
    let _ = writeln!(out, "| Item | Value |");
    let _ = writeln!(out, "| :--- | :--- |");
    let _ = writeln!(out, "| Status | {} |", cell(&report.status.to_string()));
    let _ = writeln!(
        out,
        "| Report date | {} |",
        options.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "| Recent files (<{}d) | {} |",
        options.recent_days,
        count(report.aggregates.recent_total())
    );
    let _ = writeln!(out, "| Source | {} |", cell(options.source));
    let _ = writeln!(
        out,
        "| Excluded prefix | {} |",
        cell(report.excluded_prefix.as_deref().unwrap_or("-"))
    );
    let _ = writeln!(
        out,
        "| Outside window | {} |",
        count(report.objects_outside_window)
    );
}

/// Renders both documents and writes them into `dir`, returning the paths.
pub fn write_reports(
    dir: &Path,
    report: &ScanReport,
    options: &ReportOptions<'_>,
) -> std::io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut documents = vec![RenderedReport {
        file_name: YEAR_REPORT_FILE.to_string(),
        contents: render_year_report(report, options),
    }];
    documents.extend(render_recent_matrix(report, options));

    let mut written = Vec::with_capacity(documents.len());
    for document in documents {
        let path = dir.join(&document.file_name);
        fs::write(&path, document.contents)?;
        tracing::info!(path = %path.display(), "report written");
        written.push(path);
    }

    Ok(written)
}
