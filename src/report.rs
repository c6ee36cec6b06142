//! Fixed-layout printable artifacts.
//!
//! Every page is exactly `PAGE_HEIGHT` lines of exactly `PAGE_WIDTH`
//! characters, each terminated by `\n`. Nothing time-dependent is printed,
//! so rendering the same stored data twice yields identical bytes.
//!
//! Widths are counted in Unicode scalar values (`char`s), not terminal
//! display columns: a line always holds 80 `char`s, but wide glyphs such as
//! CJK names take two columns each and print wider than the page.

use crate::calc::{self, Grade, PassStatus};
use crate::config::ReportSettings;
use crate::error::{EngineError, EngineResult};
use crate::exams::Exam;
use crate::results::{self, ExamResult};
use crate::roster::{self, ClassRef};
use rusqlite::Connection;
use sha2::{Digest, Sha256};

pub const PAGE_WIDTH: usize = 80;
pub const PAGE_HEIGHT: usize = 66;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn sha256_hex(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }

    pub fn page_count(&self) -> usize {
        self.bytes.iter().filter(|b| **b == b'\n').count() / PAGE_HEIGHT
    }
}

fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

fn left(s: &str, width: usize) -> String {
    format!("{:<width$}", truncate(s, width), width = width)
}

fn right(s: &str, width: usize) -> String {
    format!("{:>width$}", truncate(s, width), width = width)
}

fn center(s: &str, width: usize) -> String {
    let t = truncate(s, width);
    let pad = (width - t.chars().count()) / 2;
    left(&format!("{}{}", " ".repeat(pad), t), width)
}

fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(PAGE_WIDTH).collect()
}

fn write_pages(pages: &[Vec<String>]) -> Artifact {
    let mut out = String::new();
    for page in pages {
        for i in 0..PAGE_HEIGHT {
            let line = page.get(i).map(String::as_str).unwrap_or("");
            out.push_str(&left(line, PAGE_WIDTH));
            out.push('\n');
        }
    }
    Artifact {
        bytes: out.into_bytes(),
    }
}

/// Splits `body` across pages and pins `footer` to the bottom of the last.
fn paginate_with_footer(body: &[String], footer: &[String]) -> Vec<Vec<String>> {
    let last_capacity = PAGE_HEIGHT - footer.len();
    let mut pages = Vec::new();
    let mut rest = body;
    while rest.len() > last_capacity {
        let take = PAGE_HEIGHT.min(rest.len());
        pages.push(rest[..take].to_vec());
        rest = &rest[take..];
    }
    let mut last = rest.to_vec();
    last.resize(last_capacity, String::new());
    last.extend(footer.iter().cloned());
    pages.push(last);
    pages
}

fn class_label(class: &ClassRef) -> String {
    match &class.section {
        Some(section) => format!("{} - Section {}", class.name, section),
        None => class.name.clone(),
    }
}

fn rank_label(rank: Option<i64>) -> String {
    rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardSubject {
    pub name: String,
    pub max_marks: f64,
    pub obtained: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportCard {
    pub school_name: String,
    pub student_name: String,
    pub admission_no: String,
    pub class_label: String,
    pub exam_name: String,
    pub exam_type: String,
    pub start_date: String,
    pub end_date: String,
    pub subjects: Vec<CardSubject>,
    pub total_obtained: f64,
    pub total_max: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub status: PassStatus,
    pub rank: Option<i64>,
    pub show_rank: bool,
}

impl ReportCard {
    pub fn from_result(
        exam: &Exam,
        class: &ClassRef,
        result: &ExamResult,
        settings: &ReportSettings,
    ) -> Self {
        Self {
            school_name: settings.school_name.clone(),
            student_name: result.student_name.clone(),
            admission_no: result.admission_no.clone(),
            class_label: class_label(class),
            exam_name: exam.name.clone(),
            exam_type: exam.exam_type.clone(),
            start_date: exam.start_date.clone(),
            end_date: exam.end_date.clone(),
            subjects: exam
                .subjects
                .iter()
                .map(|s| CardSubject {
                    name: s.subject_name.clone(),
                    max_marks: s.max_marks,
                    obtained: result.score_for(&s.subject_name),
                })
                .collect(),
            total_obtained: result.total_obtained,
            total_max: result.total_max,
            percentage: result.percentage,
            grade: result.grade,
            status: result.status,
            rank: result.rank,
            show_rank: settings.show_rank,
        }
    }
}

// Subject table columns; widths sum to PAGE_WIDTH.
const COL_SUBJECT: usize = 40;
const COL_MAX: usize = 12;
const COL_OBTAINED: usize = 12;
const COL_GRADE: usize = 16;

fn subject_row(name: &str, max: &str, obtained: &str, grade: &str) -> String {
    format!(
        "{}{}{}{}",
        left(name, COL_SUBJECT),
        right(max, COL_MAX),
        right(obtained, COL_OBTAINED),
        right(grade, COL_GRADE)
    )
}

fn signature_footer() -> Vec<String> {
    let line = "____________________";
    let gap = PAGE_WIDTH - 2 * (line.len() + 2);
    vec![
        String::new(),
        String::new(),
        format!("  {}{}{}  ", line, " ".repeat(gap), line),
        format!(
            "  {}{}{}  ",
            left("Class Teacher", line.len()),
            " ".repeat(gap),
            left("Principal", line.len())
        ),
        String::new(),
    ]
}

pub fn layout_report_card(card: &ReportCard) -> Artifact {
    let mut body: Vec<String> = Vec::new();
    if !card.school_name.is_empty() {
        body.push(center(&card.school_name, PAGE_WIDTH));
    }
    body.push(center("REPORT CARD", PAGE_WIDTH));
    body.push(rule('='));
    body.push(String::new());

    body.push(format!("Student       : {}", card.student_name));
    body.push(format!("Admission No  : {}", card.admission_no));
    body.push(format!("Class         : {}", card.class_label));
    body.push(String::new());
    body.push(format!("Exam          : {} ({})", card.exam_name, card.exam_type));
    body.push(format!(
        "Exam Dates    : {} to {}",
        card.start_date, card.end_date
    ));
    body.push(String::new());

    body.push(rule('-'));
    body.push(subject_row("Subject", "Max Marks", "Obtained", "Grade"));
    body.push(rule('-'));
    for s in &card.subjects {
        let obtained = s
            .obtained
            .map(calc::format_marks)
            .unwrap_or_else(|| "-".to_string());
        body.push(subject_row(
            &s.name,
            &calc::format_marks(s.max_marks),
            &obtained,
            calc::subject_grade(s.obtained, s.max_marks).as_str(),
        ));
    }
    body.push(rule('-'));
    body.push(subject_row(
        "Total",
        &calc::format_marks(card.total_max),
        &calc::format_marks(card.total_obtained),
        &format!("{}%", calc::format_percent(card.percentage)),
    ));
    body.push(rule('-'));
    body.push(String::new());

    body.push(format!(
        "Total Marks   : {} / {}",
        calc::format_marks(card.total_obtained),
        calc::format_marks(card.total_max)
    ));
    body.push(format!(
        "Percentage    : {}%",
        calc::format_percent(card.percentage)
    ));
    body.push(format!("Overall Grade : {}", card.grade.as_str()));
    body.push(format!("Result        : {}", card.status.as_str()));
    // The rank line is always printed; `show_rank = false` masks the value.
    let rank = if card.show_rank { card.rank } else { None };
    body.push(format!("Class Rank    : {}", rank_label(rank)));

    write_pages(&paginate_with_footer(&body, &signature_footer()))
}

fn ensure_published(exam: &Exam) -> EngineResult<()> {
    if !exam.is_published {
        return Err(EngineError::ResultNotPublished {
            exam_id: exam.id.clone(),
        });
    }
    Ok(())
}

pub fn render_report_card(
    conn: &Connection,
    result_id: &str,
    settings: &ReportSettings,
) -> EngineResult<(ExamResult, Artifact)> {
    let (exam, result) = results::load_result(conn, result_id)?;
    ensure_published(&exam)?;
    let class = roster::load_class(conn, &exam.class_id)?;
    let card = ReportCard::from_result(&exam, &class, &result, settings);
    Ok((result, layout_report_card(&card)))
}

/// Every report card of a published exam, in listing order.
pub fn render_all_report_cards(
    conn: &Connection,
    exam: &Exam,
    settings: &ReportSettings,
) -> EngineResult<Vec<(ExamResult, Artifact)>> {
    ensure_published(exam)?;
    let class = roster::load_class(conn, &exam.class_id)?;
    let listed = results::list_results(conn, exam)?;
    Ok(listed
        .into_iter()
        .map(|r| {
            let card = ReportCard::from_result(exam, &class, &r, settings);
            let artifact = layout_report_card(&card);
            (r, artifact)
        })
        .collect())
}

// Result sheet columns; widths sum to PAGE_WIDTH.
const SHEET_RANK: usize = 6;
const SHEET_ADMISSION: usize = 12;
const SHEET_NAME: usize = 26;
const SHEET_TOTAL: usize = 14;
const SHEET_PERCENT: usize = 8;
const SHEET_GRADE: usize = 6;
const SHEET_STATUS: usize = 8;

fn sheet_row(cells: [&str; 7]) -> String {
    format!(
        "{}{}{}{}{}{}{}",
        left(cells[0], SHEET_RANK),
        left(cells[1], SHEET_ADMISSION),
        left(cells[2], SHEET_NAME),
        right(cells[3], SHEET_TOTAL),
        right(cells[4], SHEET_PERCENT),
        right(cells[5], SHEET_GRADE),
        right(cells[6], SHEET_STATUS)
    )
}

pub fn layout_result_sheet(
    exam: &Exam,
    class: &ClassRef,
    results: &[ExamResult],
    settings: &ReportSettings,
) -> Artifact {
    let mut header: Vec<String> = Vec::new();
    if !settings.school_name.is_empty() {
        header.push(center(&settings.school_name, PAGE_WIDTH));
    }
    header.push(center("RESULT SHEET", PAGE_WIDTH));
    header.push(rule('='));
    header.push(format!("Exam  : {} ({})", exam.name, exam.exam_type));
    header.push(format!("Class : {}", class_label(class)));
    header.push(format!("Dates : {} to {}", exam.start_date, exam.end_date));
    header.push(rule('-'));
    header.push(sheet_row([
        "Rank", "Adm No", "Name", "Total", "%", "Grade", "Result",
    ]));
    header.push(rule('-'));

    let mut rows: Vec<String> = results
        .iter()
        .map(|r| {
            let total = format!(
                "{} / {}",
                calc::format_marks(r.total_obtained),
                calc::format_marks(r.total_max)
            );
            sheet_row([
                &rank_label(r.rank),
                &r.admission_no,
                &r.student_name,
                &total,
                &calc::format_percent(r.percentage),
                r.grade.as_str(),
                r.status.as_str(),
            ])
        })
        .collect();
    if rows.is_empty() {
        rows.push("(no results)".to_string());
    }

    // Two trailing lines per page: a blank and the page counter.
    let per_page = PAGE_HEIGHT - header.len() - 2;
    let chunks: Vec<&[String]> = rows.chunks(per_page).collect();
    let total_pages = chunks.len();
    let pages: Vec<Vec<String>> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut page = header.clone();
            page.extend(chunk.iter().cloned());
            page.resize(PAGE_HEIGHT - 1, String::new());
            page.push(right(
                &format!("Page {} of {}", i + 1, total_pages),
                PAGE_WIDTH,
            ));
            page
        })
        .collect();
    write_pages(&pages)
}

pub fn render_result_sheet(
    conn: &Connection,
    exam_id: &str,
    settings: &ReportSettings,
) -> EngineResult<Artifact> {
    let (exam, listed) = results::list_results_for_exam(conn, exam_id)?;
    ensure_published(&exam)?;
    let class = roster::load_class(conn, &exam.class_id)?;
    Ok(layout_result_sheet(&exam, &class, &listed, settings))
}
