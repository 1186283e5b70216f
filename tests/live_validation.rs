use std::time::Duration;

use fda_pipeline::{
    config::{Config, MAX_SUMMARY_WORDS},
    extraction::{Extractor, tool_available},
    processing::Document,
    summarization::{Summarizer, SummaryStrategy, TextRankSummarizer, TokenizerData},
    text::count_words,
};

/// Build a one-page PDF whose content stream draws `lines` in Helvetica.
fn minimal_pdf(lines: &[&str]) -> Vec<u8> {
    let mut stream = String::from("BT /F1 12 Tf 72 720 Td 14 TL\n");
    for line in lines {
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        stream.push_str(&format!("({escaped}) Tj T*\n"));
    }
    stream.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
    }
    let xref_at = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    pdf
}

#[tokio::test]
#[ignore = "Requires poppler-utils (pdftotext) on PATH"]
async fn live_pdftotext_extracts_generated_pdf() {
    assert!(
        tool_available("pdftotext", "-v").await,
        "pdftotext must be installed"
    );
    let extractor = Extractor::new("pdftotext", "soffice", Duration::from_secs(30));
    let pdf = minimal_pdf(&[
        "Indications for Use: peripheral vascular access.",
        "Predicate Device: PeriFlow Catheter.",
    ]);

    let extracted = extractor
        .extract(&Document::from_bytes("live.pdf", pdf))
        .await
        .expect("extraction");

    assert_eq!(extracted.pages().len(), 1);
    let text = extracted.full_text();
    assert!(text.contains("Indications for Use"), "unexpected text: {text}");
    assert!(text.contains("PeriFlow"), "unexpected text: {text}");
}

#[tokio::test]
#[ignore = "Requires OPENAI_API_KEY and network access"]
async fn live_openai_summary_respects_word_limit() {
    let config = Config::from_env().expect("config");
    assert!(
        config.has_remote_credential(),
        "OPENAI_API_KEY must be set for this test"
    );
    let local = TokenizerData::bundled()
        .map(TextRankSummarizer::new)
        .expect("bundled tokenizer data");

    let summarizer = Summarizer::select(&config, Some(local)).await;
    assert_eq!(summarizer.strategy(), SummaryStrategy::Remote);

    let text = "The VascuLine catheter is a single-lumen polyurethane catheter intended for \
                short-term peripheral vascular access. Bench testing covered tensile strength, \
                flow rate, and leakage. Biocompatibility was evaluated per ISO 10993-1. \
                The device is sterilized with ethylene oxide. No clinical studies were required. \
                The data demonstrate substantial equivalence to the predicate device.";
    let summary = summarizer.summarize(text).await.expect("summary");

    assert_eq!(summary.strategy, SummaryStrategy::Remote);
    assert!(summary.fallback_reason.is_none(), "fell back: {summary:?}");
    assert!(!summary.text.trim().is_empty());
    assert!(count_words(&summary.text) <= MAX_SUMMARY_WORDS);
}
