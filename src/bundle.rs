use crate::config::ReportSettings;
use crate::error::{EngineError, EngineResult};
use crate::exams::{self, Exam};
use crate::report::{self, Artifact};
use crate::results::ExamResult;
use anyhow::Context;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const SHEET_ENTRY: &str = "sheet.txt";
pub const BUNDLE_FORMAT_V1: &str = "resultsd-report-bundle-v1";

#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

fn safe_file_stem(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn card_entry_name(rank: Option<i64>, admission_no: &str) -> String {
    format!(
        "cards/{:03}-{}.txt",
        rank.unwrap_or(0),
        safe_file_stem(admission_no)
    )
}

/// Entry names for cards in listing order. Stems that collide after
/// sanitizing get a `-2`, `-3`, ... suffix in order of appearance.
pub fn card_entry_names(cards: &[(ExamResult, Artifact)]) -> Vec<String> {
    let mut used = HashSet::new();
    cards
        .iter()
        .map(|(r, _)| {
            let base = card_entry_name(r.rank, &r.admission_no);
            let mut name = base.clone();
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{}-{}.txt", base.trim_end_matches(".txt"), n);
                n += 1;
            }
            name
        })
        .collect()
}

fn write_entry(
    zip: &mut ZipWriter<File>,
    opts: FileOptions,
    name: &str,
    bytes: &[u8],
) -> anyhow::Result<()> {
    zip.start_file(name, opts)
        .with_context(|| format!("failed to start entry {}", name))?;
    zip.write_all(bytes)
        .with_context(|| format!("failed to write entry {}", name))?;
    Ok(())
}

fn write_bundle(
    exam: &Exam,
    cards: &[(ExamResult, Artifact)],
    sheet: &Artifact,
    out_path: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let names = card_entry_names(cards);
    let entries: Vec<serde_json::Value> = cards
        .iter()
        .zip(&names)
        .map(|((r, a), path)| {
            json!({
                "path": path,
                "resultId": r.id,
                "studentId": r.student_id,
                "admissionNo": r.admission_no,
                "rank": r.rank,
                "sha256": a.sha256_hex(),
            })
        })
        .collect();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "examId": exam.id,
        "examName": exam.name,
        "publishedAt": exam.published_at,
        "sheet": { "path": SHEET_ENTRY, "sha256": sheet.sha256_hex() },
        "cards": entries,
    });
    let manifest_text =
        serde_json::to_string_pretty(&manifest).context("failed to serialize manifest")?;
    write_entry(&mut zip, opts, MANIFEST_ENTRY, manifest_text.as_bytes())?;
    write_entry(&mut zip, opts, SHEET_ENTRY, &sheet.bytes)?;
    for ((_, a), name) in cards.iter().zip(&names) {
        write_entry(&mut zip, opts, name, &a.bytes)?;
    }
    zip.finish().context("failed to finalize zip")?;
    Ok(())
}

/// Writes every report card of a published exam plus its result sheet into
/// one zip archive at `out_path`.
pub fn export_report_bundle(
    conn: &Connection,
    exam_id: &str,
    out_path: &Path,
    settings: &ReportSettings,
) -> EngineResult<BundleSummary> {
    let exam = exams::load_exam(conn, exam_id)?;
    let cards = report::render_all_report_cards(conn, &exam, settings)?;
    let sheet = report::render_result_sheet(conn, exam_id, settings)?;

    write_bundle(&exam, &cards, &sheet, out_path)
        .map_err(|e| EngineError::Io(format!("{e:#}")))?;

    tracing::info!(
        exam_id = %exam.id,
        cards = cards.len(),
        out = %out_path.to_string_lossy(),
        "report bundle exported"
    );
    Ok(BundleSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: cards.len() + 2,
    })
}
