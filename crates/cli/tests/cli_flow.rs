use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CONFIG: &str = r#"
[embedding]
mode = "stub"
dimension = 32

[splitter]
chunk_size = 200
chunk_overlap = 20
"#;

#[allow(deprecated)]
fn rag(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rag").expect("binary");
    cmd.current_dir(workdir)
        .env_remove("OPENAI_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("PINECONE_API_KEY")
        .env_remove("RAG_EMBEDDING_MODE")
        .arg("--quiet");
    cmd
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("rag.toml"), CONFIG).unwrap();
    fs::write(
        temp.path().join("notes.txt"),
        "Mars has two small moons, Phobos and Deimos.\n\n\
         Jupiter is the largest planet and has dozens of moons.",
    )
    .unwrap();
    temp
}

#[test]
fn missing_file_does_not_abort_ingest() {
    let temp = setup();
    let root = temp.path();

    let ingest = run_json(rag(root).args(["ingest", "absent.txt", "notes.txt"]));
    assert_eq!(ingest["files"], serde_json::json!(["notes.txt"]));
    assert_eq!(ingest["failed_files"], serde_json::json!(["absent.txt"]));
    let stored = ingest["stored"].as_array().expect("stored ids").len();
    assert!(stored >= 1);

    let stats = run_json(rag(root).arg("stats"));
    assert_eq!(stats["index"]["vector_count"], stored);
}

#[test]
fn ingest_search_stats_reset() {
    let temp = setup();
    let root = temp.path();

    let ingest = run_json(rag(root).args(["ingest", "notes.txt", "--subject", "Planets"]));
    assert_eq!(ingest["files"], serde_json::json!(["notes.txt"]));
    assert_eq!(ingest["failed"], 0);
    let stored = ingest["stored"].as_array().expect("stored ids").len();
    assert!(stored >= 1);
    assert!(root.join(".rag/faiss_index.bin").exists());

    let matches = run_json(rag(root).args(["search", "moons of Mars", "-k", "2"]));
    let matches = matches.as_array().expect("match array");
    assert!(!matches.is_empty());
    assert!(matches.len() <= 2);
    assert_eq!(matches[0]["metadata"]["subject"], "Planets");
    assert_eq!(matches[0]["metadata"]["source_id"], "notes.txt");
    assert!(matches[0]["metadata"]["chunk"].is_string());

    let stats = run_json(rag(root).arg("stats"));
    assert_eq!(stats["backend"], "native");
    assert_eq!(stats["embedding_model"], "stub");
    assert_eq!(stats["capabilities"]["delete_one"], false);
    assert_eq!(stats["index"]["vector_count"], stored);
    assert_eq!(stats["index"]["dimension"], 32);

    let reset = run_json(rag(root).arg("reset"));
    assert_eq!(reset["status"], "ok");

    let stats = run_json(rag(root).arg("stats"));
    assert_eq!(stats["index"]["vector_count"], 0);
    let matches = run_json(rag(root).args(["search", "moons of Mars"]));
    assert_eq!(matches, serde_json::json!([]));
}

#[test]
fn html_files_are_stripped_before_splitting() {
    let temp = setup();
    let root = temp.path();
    fs::write(
        root.join("mail.html"),
        "<html><head><style>p { color: red; }</style></head>\
         <body><p>Saturn&#39;s rings are mostly ice &amp; rock.</p></body></html>",
    )
    .unwrap();

    let ingest = run_json(rag(root).args(["ingest", "mail.html"]));
    assert_eq!(ingest["stored"], serde_json::json!([0]));

    let matches = run_json(rag(root).args(["search", "rings", "-k", "1"]));
    assert_eq!(
        matches[0]["metadata"]["chunk"],
        "Saturn's rings are mostly ice & rock."
    );
}

#[test]
fn blank_question_gets_prompt_without_model_call() {
    let temp = setup();
    let answer = run_json(
        rag(temp.path())
            .env("OPENAI_API_KEY", "sk-test")
            .args(["ask", "   "]),
    );
    assert_eq!(answer["grounded"], false);
    assert_eq!(
        answer["text"],
        "Your question is empty. Ask something about your documents."
    );
}

#[test]
fn ask_without_key_fails_fast() {
    let temp = setup();
    rag(temp.path())
        .args(["ask", "What orbits Mars?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn invalid_splitter_config_is_rejected() {
    let temp = setup();
    fs::write(
        temp.path().join("bad.toml"),
        "[embedding]\nmode = \"stub\"\n\n[splitter]\nchunk_size = 50\nchunk_overlap = 50\n",
    )
    .unwrap();

    rag(temp.path())
        .args(["--config", "bad.toml", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chunk_overlap"));
}

#[test]
fn embed_mode_flag_overrides_config() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("doc.txt"), "Pluto was reclassified in 2006.").unwrap();

    let ingest = run_json(rag(temp.path()).args(["--embed-mode", "stub", "ingest", "doc.txt"]));
    assert_eq!(ingest["stored"], serde_json::json!([0]));
}
