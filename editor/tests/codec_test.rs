//! On-disk round trips through the document codecs with an edit in between.

use editor::document::{
    CodecError, Document, DocumentCodec, JsonCodec, Paragraph, PlainTextCodec, Run, RunStyle,
};
use editor::suggestions::DisabledSuggestions;
use editor::{EditorConfig, SessionStore, Strategy};
use shared_types::{Decision, SessionMode, SessionState};
use std::sync::Arc;

fn heading_style() -> RunStyle {
    RunStyle {
        bold: true,
        font_size: Some(16),
        ..Default::default()
    }
}

fn styled_document() -> Document {
    Document::new(vec![
        Paragraph::new(vec![Run::styled("Quarterly Report", heading_style())]),
        Paragraph::new(vec![
            Run::plain("Revenue grew in "),
            Run::styled(
                "teh third quarter",
                RunStyle {
                    italic: true,
                    ..Default::default()
                },
            ),
            Run::plain(" despite headwinds."),
        ]),
        Paragraph::new(vec![Run::styled(
            "Footnote: figures are unaudited.",
            RunStyle {
                font_name: Some("Courier".to_string()),
                ..Default::default()
            },
        )]),
    ])
}

async fn auto_apply(document: Document, search: &str, replace: &str) -> Document {
    let store = SessionStore::new(EditorConfig::default(), Arc::new(DisabledSuggestions));
    let id = store
        .start_session(
            "codec-test",
            document,
            Some(SessionMode::AutoApply),
            Strategy::literal(search, replace),
        )
        .await
        .unwrap();
    assert_eq!(
        store.decide(&id, Decision::AcceptAll).await.unwrap(),
        SessionState::Completed
    );
    store.get_result(&id).await.unwrap()
}

#[tokio::test]
async fn test_json_round_trip_keeps_untouched_runs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.json");
    let output = dir.path().join("report_revised.json");

    JsonCodec.save(&styled_document(), &input).unwrap();

    let parsed = JsonCodec.load(&input).unwrap();
    let edited = auto_apply(parsed, "teh", "the").await;
    JsonCodec.save(&edited, &output).unwrap();

    let reread = JsonCodec.load(&output).unwrap();
    let original = styled_document();

    assert_eq!(reread.paragraphs()[0], original.paragraphs()[0]);
    assert_eq!(reread.paragraphs()[2], original.paragraphs()[2]);

    let body = reread.paragraphs()[1].runs();
    assert_eq!(body.len(), 3);
    assert_eq!(body[0], original.paragraphs()[1].runs()[0]);
    assert_eq!(body[1].text, "the third quarter");
    assert!(body[1].style.italic);
    assert_eq!(body[2], original.paragraphs()[1].runs()[2]);
}

#[tokio::test]
async fn test_plain_text_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, "first colour\nsecond colour\n").unwrap();

    let parsed = PlainTextCodec.parse(&std::fs::read(&input).unwrap()).unwrap();
    let edited = auto_apply(parsed, "colour", "color").await;

    let output = dir.path().join("notes_revised.txt");
    std::fs::write(&output, PlainTextCodec.serialize(&edited).unwrap()).unwrap();
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "first color\nsecond color\n"
    );
}

#[test]
fn test_unsupported_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.json");
    std::fs::write(&input, b"\x00\x01 not json").unwrap();
    let raw = std::fs::read(&input).unwrap();

    assert!(matches!(JsonCodec.parse(&raw), Err(CodecError::UnsupportedFormat(_))));
    assert!(matches!(
        PlainTextCodec.parse(&[0xc3, 0x28]),
        Err(CodecError::UnsupportedFormat(_))
    ));
}
