use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;
use std::process::Command;

fn docscope(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("docscope"));
    cmd.current_dir(dir);
    for var in [
        "DOCSCOPE_ENV_FILE",
        "DOCSCOPE_TOKENIZER",
        "DOCSCOPE_RANKING",
        "DOCSCOPE_DOC_CONVERSION",
        "DOCSCOPE_CONVERT_ENDPOINT",
        "DOCSCOPE_CONVERT_API_KEY",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_docx(path: &Path, text: &str) {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:body></w:document>"#
    );
    let file = std::fs::File::create(path).unwrap();
    let mut w = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    w.start_file("word/document.xml", opts).unwrap();
    w.write_all(document.as_bytes()).unwrap();
    w.finish().unwrap();
}

#[test]
fn view_ranks_matches_and_highlights_the_selected_preview() {
    let tmp = tempfile::tempdir().unwrap();
    write_docx(&tmp.path().join("budget.docx"), "Budget for the apple harvest");
    std::fs::write(
        tmp.path().join("memo.doc"),
        b"\xd0\xcf\x11\xe0\x00\x00orchard memo about apple trees\x00",
    )
    .unwrap();
    std::fs::write(tmp.path().join("notes.txt"), "apple").unwrap();
    std::fs::write(tmp.path().join("other.doc"), b"\x00\x00unrelated text\x00").unwrap();

    let out = docscope(tmp.path())
        .args([
            "view",
            "budget.docx",
            "notes.txt",
            "memo.doc",
            "other.doc",
            "--query",
            "apple orchard",
            "--select",
            "MEMO.DOC",
        ])
        .output()
        .expect("run docscope view");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("view json");

    assert_eq!(v["kind"].as_str(), Some("view"));
    assert_eq!(v["keywords"], serde_json::json!(["apple", "orchard"]));
    assert_eq!(v["summary"].as_str(), Some("2 of 3 documents"));

    let notices = v["notices"].as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["code"].as_str(), Some("unsupported_format"));
    assert_eq!(
        notices[0]["message"].as_str(),
        Some("Unsupported format: notes.txt")
    );

    let docs = v["documents"].as_array().unwrap();
    let names: Vec<&str> = docs.iter().filter_map(|d| d["name"].as_str()).collect();
    assert_eq!(names, ["memo.doc", "budget.docx"]);
    assert_eq!(docs[0]["selected"].as_bool(), Some(true));
    assert_eq!(docs[0]["format"].as_str(), Some("doc"));
    assert_eq!(docs[0]["error"].as_str(), Some("doc_conversion_disabled"));
    assert_eq!(docs[1]["selected"].as_bool(), Some(false));
    assert!(docs[1]["error"].is_null());

    assert_eq!(v["preview"]["markers"].as_u64(), Some(2));
    let html = v["preview"]["html"].as_str().unwrap();
    assert!(html.contains("<mark class=\"keyword-highlight\">orchard</mark>"));
    assert!(html.contains("<mark class=\"keyword-highlight\">apple</mark>"));
}

#[test]
fn select_of_a_filtered_out_document_keeps_the_top_match() {
    let tmp = tempfile::tempdir().unwrap();
    write_docx(&tmp.path().join("budget.docx"), "Budget for the apple harvest");
    std::fs::write(tmp.path().join("other.doc"), b"\x00\x00unrelated text\x00").unwrap();

    let out = docscope(tmp.path())
        .args([
            "view",
            "budget.docx",
            "other.doc",
            "--query",
            "apple",
            "--select",
            "other.doc",
        ])
        .output()
        .expect("run docscope view");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("view json");

    let docs = v["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["name"].as_str(), Some("budget.docx"));
    assert_eq!(docs[0]["selected"].as_bool(), Some(true));
    assert_eq!(v["preview"]["markers"].as_u64(), Some(1));
}

#[test]
fn view_text_output_lists_documents_with_codes() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("memo.doc"), b"\x00\x00quarterly memo\x00").unwrap();

    docscope(tmp.path())
        .args(["view", "memo.doc", "--output", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 document"))
        .stdout(predicate::str::contains("* memo.doc (doc) [doc_conversion_disabled]"))
        .stdout(predicate::str::contains("quarterly memo"));
}

#[test]
fn extract_prints_the_record_and_rejects_unknown_formats() {
    let tmp = tempfile::tempdir().unwrap();
    write_docx(&tmp.path().join("note.docx"), "Hello &amp; welcome");
    std::fs::write(tmp.path().join("notes.txt"), "plain").unwrap();

    let out = docscope(tmp.path())
        .args(["extract", "note.docx"])
        .output()
        .expect("run docscope extract");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("record json");
    assert_eq!(v["name"].as_str(), Some("note.docx"));
    assert_eq!(v["format"].as_str(), Some("docx"));
    assert_eq!(v["plain_text"].as_str(), Some("Hello & welcome"));
    assert!(v["safe_markup"].as_str().unwrap().contains("<p>Hello &amp; welcome</p>"));

    docscope(tmp.path())
        .args(["extract", "notes.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported format: notes.txt"));
}

#[test]
fn convert_without_a_configured_service_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("memo.doc"), b"\x00legacy\x00").unwrap();

    docscope(tmp.path())
        .args(["convert", "memo.doc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DOCSCOPE_CONVERT_ENDPOINT"));
    assert!(!tmp.path().join("memo.docx").exists());
}
