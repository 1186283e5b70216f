use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use fda_pipeline::{
    config::{Config, MAX_SUMMARY_WORDS},
    extraction::ExtractionError,
    processing::{Document, Pipeline, PipelineError, Stage},
    setup,
    summarization::SummaryStrategy,
    text::count_words,
};
use tempfile::TempDir;

/// Ten-page 510(k) decision summary as `pdftotext` would print it, pages separated by form feeds.
fn decision_summary_pages() -> String {
    let bodies = [
        "510(k) SUMMARY\n510(k) Number: K240287\nApplicant: Example Medical, Inc.\n\
         Device Trade Name: VascuLine Peripheral Catheter\n\
         Regulation Number: 21 CFR 880.5200\nProduct Code: FOZ",
        "Device Description: The VascuLine catheter is a single-lumen, polyurethane\n\
         catheter supplied with an introducer needle. The principle of operation is\n\
         passive infusion through the lumen.",
        "Indications for Use: The catheter is intended for short-term peripheral\n\
         vascular access to sample blood and administer fluids.",
        "Predicate Device: The legally marketed device used for comparison is the\n\
         PeriFlow Catheter, cleared under a prior submission.",
        "Technological Characteristics: The subject and predicate share materials,\n\
         lumen diameter and length. Differences do not raise new questions of\n\
         safety or effectiveness. Substantial equivalence is supported.",
        "Performance Testing: Bench testing covered tensile strength, flow rate,\n\
         leakage and kink resistance. All samples met the acceptance criteria.",
        "Biocompatibility: Patient-contacting materials were evaluated per ISO 10993-1\n\
         for cytotoxicity, sensitization, irritation and hemocompatibility.",
        "Sterilization: The device is sterilized with ethylene oxide to a sterility\n\
         assurance level of 10^-6. Shelf life of three years was validated.",
        "Clinical Testing: No clinical studies were required to demonstrate\n\
         substantial equivalence for this device.",
        "Conclusion: The non-clinical data demonstrate that the VascuLine catheter is\n\
         as safe and effective as the predicate device.",
    ];
    bodies
        .iter()
        .enumerate()
        .map(|(index, body)| format!("K240287 - Page {} of 10\n{body}\n", index + 1))
        .collect::<Vec<_>>()
        .join("\u{000c}")
}

struct Fixture {
    dir: TempDir,
    pdftotext: PathBuf,
    soffice: PathBuf,
    silent_soffice: PathBuf,
}

/// Shared so the fake tool is written once, before any test spawns a process.
fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(Fixture::new)
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let pages = dir.path().join("pages.txt");
        std::fs::write(&pages, decision_summary_pages()).expect("write pages");
        let pdftotext = write_script(
            dir.path(),
            "pdftotext",
            &format!("#!/bin/sh\ncat '{}'\n", pages.display()),
        );
        // Called as: --headless --norestore --convert-to pdf --outdir <dir> <source>
        let soffice = write_script(
            dir.path(),
            "soffice",
            "#!/bin/sh\n[ \"$1\" = --headless ] || exit 2\n\
             name=$(basename \"$7\")\nprintf '%%PDF-1.4\\n' > \"$6/${name%.*}.pdf\"\n",
        );
        let silent_soffice = write_script(dir.path(), "soffice-silent", "#!/bin/sh\nexit 0\n");
        setup::install_tokenizer(&dir.path().join("tokenizer")).expect("install tokenizer");
        Self {
            dir,
            pdftotext,
            soffice,
            silent_soffice,
        }
    }

    fn config(&self) -> Config {
        self.config_with_soffice(&self.soffice)
    }

    fn config_with_soffice(&self, soffice: &Path) -> Config {
        let pdftotext = self.pdftotext.display().to_string();
        let soffice = soffice.display().to_string();
        let tokenizer = self.dir.path().join("tokenizer").display().to_string();
        Config::from_lookup(move |key| match key {
            "PDFTOTEXT_BIN" => Some(pdftotext.clone()),
            "SOFFICE_BIN" => Some(soffice.clone()),
            "TOKENIZER_DATA_DIR" => Some(tokenizer.clone()),
            "EMBEDDING_PROVIDER" => Some("hashing".to_string()),
            _ => None,
        })
        .expect("config")
    }

    fn write_input(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).expect("write input");
        path
    }
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

#[cfg(not(unix))]
fn write_script(dir: &Path, name: &str, _body: &str) -> PathBuf {
    dir.join(name)
}

#[cfg(unix)]
#[tokio::test]
async fn ten_page_decision_summary_passes_every_stage() {
    let fixture = fixture();
    let config = fixture.config();
    let pipeline = Pipeline::from_config(&config).await.expect("pipeline");
    assert_eq!(pipeline.strategy(), SummaryStrategy::Local);

    let document = Document::from_bytes("K240287.pdf", b"%PDF-1.7\nfixture".to_vec());
    let report = pipeline.process(document).await.expect("report");

    assert_eq!(report.pages.len(), 10);
    assert!(!report.text.trim().is_empty());
    assert!(!report.text.contains("Page 3 of 10"));

    let failed = report.validation.failed_checks();
    assert!(failed.is_empty(), "failed checks: {failed:?}");
    assert!(report.validation.checks.contains_key("template:Product Code"));
    assert_eq!(report.validation.checks["biocompatibility"].pages, vec![7]);

    assert_eq!(report.embedding.dimension, config.embedding_dimension);
    assert_eq!(report.embedding.values.len(), config.embedding_dimension);

    assert!(!report.summary.text.is_empty());
    assert!(report.summary.word_count <= MAX_SUMMARY_WORDS);
    assert_eq!(count_words(&report.summary.text), report.summary.word_count);
    assert_eq!(report.summary.strategy, SummaryStrategy::Local);

    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["validation"]["pathway"], "510k");
    assert_eq!(json["document"]["kind"], "pdf");
}

#[tokio::test]
async fn zero_byte_pdf_produces_only_an_extraction_error() {
    let fixture = fixture();
    let pipeline = Pipeline::from_config(&fixture.config()).await.expect("pipeline");

    let error = pipeline
        .process(Document::from_bytes("empty.pdf", Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        PipelineError::Extraction(ExtractionError::EmptyInput)
    ));
    let snapshot = fixture_snapshot(&pipeline);
    assert_eq!(snapshot.0, 0);
    assert_eq!(snapshot.1, 1);
}

#[tokio::test]
async fn corrupted_pdf_produces_only_an_extraction_error() {
    let fixture = fixture();
    let pipeline = Pipeline::from_config(&fixture.config()).await.expect("pipeline");

    let error = pipeline
        .process(Document::from_bytes(
            "corrupt.pdf",
            b"\x89PNG\r\n\x1a\nnot a pdf".to_vec(),
        ))
        .await
        .unwrap_err();
    assert_eq!(error.stage(), Stage::Extract);
    assert!(matches!(
        error,
        PipelineError::Extraction(ExtractionError::Corrupt(_))
    ));
    assert_eq!(fixture_snapshot(&pipeline), (0, 1));
}

#[cfg(unix)]
#[tokio::test]
async fn batch_keeps_going_after_a_failed_document() {
    let fixture = fixture();
    let pipeline = Pipeline::from_config(&fixture.config()).await.expect("pipeline");

    let paths = vec![
        fixture.write_input("broken.pdf", b""),
        fixture.write_input("notes.png", b"binary"),
        fixture.write_input("K240287.pdf", b"%PDF-1.7\nfixture"),
    ];
    let entries = pipeline.process_batch(&paths).await;

    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries[0].outcome.as_ref().unwrap_err().stage(),
        Stage::Extract
    );
    assert!(matches!(
        entries[1].outcome,
        Err(PipelineError::Extraction(ExtractionError::UnsupportedFormat(_)))
    ));
    let report = entries[2].outcome.as_ref().expect("third document succeeds");
    assert_eq!(report.pages.len(), 10);
    assert_eq!(fixture_snapshot(&pipeline), (1, 2));
}

#[cfg(unix)]
#[tokio::test]
async fn word_document_is_converted_then_extracted() {
    let fixture = fixture();
    let pipeline = Pipeline::from_config(&fixture.config()).await.expect("pipeline");

    let document = Document::from_bytes("K240287.docx", b"PK\x03\x04word".to_vec());
    let report = pipeline.process(document).await.expect("report");

    assert_eq!(report.pages.len(), 10);
    assert_eq!(report.validation.checks["biocompatibility"].pages, vec![7]);
    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["document"]["kind"], "office");
}

#[cfg(unix)]
#[tokio::test]
async fn converter_without_output_is_a_tool_failure() {
    let fixture = fixture();
    let config = fixture.config_with_soffice(&fixture.silent_soffice);
    let pipeline = Pipeline::from_config(&config).await.expect("pipeline");

    let error = pipeline
        .process(Document::from_bytes("K240287.docx", b"PK\x03\x04word".to_vec()))
        .await
        .unwrap_err();

    match error {
        PipelineError::Extraction(ExtractionError::ToolFailed { status, stderr, .. }) => {
            assert_eq!(status, Some(0));
            assert!(stderr.contains("no PDF produced"), "stderr: {stderr}");
        }
        other => panic!("expected a converter failure, got {other:?}"),
    }
    assert_eq!(fixture_snapshot(&pipeline), (0, 1));
}

fn fixture_snapshot(pipeline: &Pipeline) -> (u64, u64) {
    let snapshot = pipeline.metrics().snapshot();
    (snapshot.documents_processed, snapshot.documents_failed)
}
