mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::Read;
use test_support::{error_code, Fixture};

#[test]
fn bundle_holds_manifest_sheet_and_one_card_per_result() {
    let mut fx = Fixture::new("resultsd-bundle", &["A-1", "A-2", "A-3"]);
    let exam_id = fx.create_exam("Term 1");
    let s = fx.students.clone();
    fx.submit(
        &exam_id,
        json!([
            { "studentId": s[0], "subject": "Math", "marksObtained": 50 },
            { "studentId": s[1], "subject": "Math", "marksObtained": 70 },
            { "studentId": s[2], "subject": "Math", "marksObtained": 60 }
        ]),
    );

    let bundle_path = fx.workspace.join("exports").join("term1.zip");
    let v = fx.call(
        "reports.exportBundle",
        json!({ "examId": exam_id, "outPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(error_code(&v), "result_not_published");
    assert!(!bundle_path.exists());

    fx.call_ok("exams.publish", json!({ "examId": exam_id }));
    let res = fx.call_ok(
        "reports.exportBundle",
        json!({ "examId": exam_id, "outPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(res["bundleFormat"], json!("resultsd-report-bundle-v1"));
    assert_eq!(res["entryCount"], json!(5));

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["format"], json!("resultsd-report-bundle-v1"));
    assert_eq!(manifest["examId"], json!(exam_id));

    let cards = manifest["cards"].as_array().expect("cards");
    let paths: Vec<&str> = cards.iter().filter_map(|c| c["path"].as_str()).collect();
    assert_eq!(
        paths,
        vec!["cards/001-A-2.txt", "cards/002-A-3.txt", "cards/003-A-1.txt"]
    );

    let mut card = String::new();
    archive
        .by_name("cards/001-A-2.txt")
        .expect("card entry")
        .read_to_string(&mut card)
        .expect("read card");
    let rendered = fx.call_ok(
        "reports.reportCard",
        json!({ "resultId": cards[0]["resultId"] }),
    );
    assert_eq!(rendered["text"].as_str(), Some(card.as_str()));
    assert_eq!(rendered["sha256"], cards[0]["sha256"]);

    assert!(archive.by_name("sheet.txt").is_ok());
}

#[test]
fn tied_cards_with_colliding_admission_numbers_are_all_reachable() {
    let mut fx = Fixture::new("resultsd-bundle-collide", &["A/1", "A_1"]);
    let exam_id = fx.create_exam("Term 1");
    let s = fx.students.clone();
    fx.submit(
        &exam_id,
        json!([
            { "studentId": s[0], "subject": "Math", "marksObtained": 60 },
            { "studentId": s[1], "subject": "Math", "marksObtained": 60 }
        ]),
    );
    fx.call_ok("exams.publish", json!({ "examId": exam_id }));

    let bundle_path = fx.workspace.join("tied.zip");
    let res = fx.call_ok(
        "reports.exportBundle",
        json!({ "examId": exam_id, "outPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(res["entryCount"], json!(4));

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    assert_eq!(archive.len(), 4);

    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    let cards = manifest["cards"].as_array().expect("cards");
    assert_eq!(cards.len(), 2);
    let mut admissions = Vec::new();
    for c in cards {
        let path = c["path"].as_str().expect("path");
        let mut text = String::new();
        archive
            .by_name(path)
            .expect("card entry")
            .read_to_string(&mut text)
            .expect("read card");
        let admission = c["admissionNo"].as_str().expect("admissionNo");
        assert!(text.contains(&format!("Admission No  : {admission}")));
        admissions.push(admission.to_string());
    }
    admissions.sort();
    assert_eq!(admissions, vec!["A/1", "A_1"]);
}
