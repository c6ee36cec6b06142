mod test_support;

use serde_json::json;
use test_support::{error_code, Fixture};

#[test]
fn published_exams_reject_every_mutation() {
    let mut fx = Fixture::new("resultsd-publish-lock", &["A-1", "A-2"]);
    let exam_id = fx.create_exam("Term 1");
    let s = fx.students.clone();
    fx.submit(
        &exam_id,
        json!([
            { "studentId": s[0], "subject": "Math", "marksObtained": 80 },
            { "studentId": s[0], "subject": "Science", "marksObtained": 70 },
            { "studentId": s[1], "subject": "Math", "marksObtained": 60 }
        ]),
    );

    let published = fx.call_ok("exams.publish", json!({ "examId": exam_id }));
    assert_eq!(published["alreadyPublished"], json!(false));
    assert_eq!(published["ranked"], json!(2));

    let before = fx.call_ok("results.list", json!({ "examId": exam_id }));
    assert_eq!(before["isPublished"], json!(true));
    assert!(before["results"]
        .as_array()
        .expect("results")
        .iter()
        .all(|r| r["rank"].is_i64()));

    let v = fx.call(
        "marks.submit",
        json!({
            "examId": exam_id,
            "entries": [{ "studentId": s[1], "subject": "Math", "marksObtained": 99 }]
        }),
    );
    assert_eq!(error_code(&v), "exam_locked");

    let v = fx.call("results.recomputeRanks", json!({ "examId": exam_id }));
    assert_eq!(error_code(&v), "exam_locked");

    let v = fx.call(
        "exams.update",
        json!({ "examId": exam_id, "patch": { "name": "Renamed" } }),
    );
    assert_eq!(error_code(&v), "exam_locked");

    let after = fx.call_ok("results.list", json!({ "examId": exam_id }));
    assert_eq!(before["results"], after["results"]);
}

#[test]
fn publishing_twice_is_a_no_op() {
    let mut fx = Fixture::new("resultsd-publish-twice", &["A-1"]);
    let exam_id = fx.create_exam("Term 1");
    let first = fx.call_ok("exams.publish", json!({ "examId": exam_id }));
    let second = fx.call_ok("exams.publish", json!({ "examId": exam_id }));
    assert_eq!(second["alreadyPublished"], json!(true));
    assert_eq!(second["publishedAt"], first["publishedAt"]);

    let v = fx.call("exams.publish", json!({ "examId": "missing" }));
    assert_eq!(error_code(&v), "not_found");
}
