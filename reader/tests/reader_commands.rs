//! Integration tests for the reader's commands

mod common;

use reader::app::{describe_outcomes, Reply};
use reader::commands::{parse, Command};
use reader::error::ReaderError;
use speech_core::{NarrationError, SpeakOutcome};

use common::*;

async fn run(t: &mut TestReader, line: &str) -> Result<Reply, ReaderError> {
    let command = parse(line)?.expect("blank line");
    t.reader.execute(command).await
}

async fn finish(reply: Reply) -> Vec<SpeakOutcome> {
    match reply {
        Reply::Playing { task, .. } => task.await.unwrap().unwrap(),
        other => panic!("expected playback, got {other:?}"),
    }
}

fn message(reply: Reply) -> String {
    match reply {
        Reply::Message(msg) => msg,
        other => panic!("expected a message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_load_prefetches_every_text() {
    let mut t = TestReader::new(CountingSpeech::default(), true);
    let path = t.story_file();

    let msg = message(run(&mut t, &format!("load {}", path.display())).await.unwrap());
    assert!(msg.contains("Der Hund"));
    assert!(msg.contains("prefetching 4 texts"));

    t.reader.session().prefetcher().settle().await;
    assert_eq!(t.speech.total_calls(), 4);
    assert_eq!(t.reader.session().cache().stats().entries, 4);
}

#[tokio::test]
async fn test_read_sentence_uses_prefetched_audio() {
    let mut t = TestReader::new(CountingSpeech::default(), true);
    let path = t.story_file();
    t.reader.load_story(&path).unwrap();
    t.reader.session().prefetcher().settle().await;

    let outcomes = finish(run(&mut t, "read 2").await.unwrap()).await;
    assert_eq!(outcomes, vec![SpeakOutcome::Spoken]);
    assert_eq!(t.speech.calls_for("Der Hund schläft."), 1);
    assert_eq!(t.output.scheduled(), 1);
}

#[tokio::test]
async fn test_read_out_of_range() {
    let mut t = TestReader::new(CountingSpeech::default(), false);
    assert!(matches!(run(&mut t, "read 1").await, Err(ReaderError::InvalidInput(_))));

    let path = t.story_file();
    t.reader.load_story(&path).unwrap();
    assert!(matches!(run(&mut t, "read 3").await, Err(ReaderError::InvalidInput(_))));
}

#[tokio::test]
async fn test_second_read_while_loading_is_busy() {
    let mut t = TestReader::new(CountingSpeech::gated(), false);
    let path = t.story_file();
    t.reader.load_story(&path).unwrap();

    let first = run(&mut t, "read 1").await.unwrap();
    while t.reader.narrator().session().is_idle() {
        tokio::task::yield_now().await;
    }

    let err = run(&mut t, "word Hund").await.unwrap_err();
    assert!(err.is_busy());

    t.speech.release(1);
    assert_eq!(finish(first).await, vec![SpeakOutcome::Spoken]);
    assert_eq!(t.speech.calls_for("Hund"), 0);
}

#[tokio::test]
async fn test_empty_story_reported_as_empty() {
    let mut t = TestReader::new(CountingSpeech::default(), true);
    let path = t.write_file("empty.json", r#"{ "title": "Leer", "sentences": [] }"#);
    t.reader.load_story(&path).unwrap();

    let err = run(&mut t, "read 1").await.unwrap_err();
    assert!(err.to_string().contains("no sentences"), "{err}");
}

#[tokio::test]
async fn test_read_all_in_order() {
    let mut t = TestReader::new(CountingSpeech::default(), false);
    let path = t.story_file();
    t.reader.load_story(&path).unwrap();

    let outcomes = finish(run(&mut t, "read all").await.unwrap()).await;
    assert_eq!(outcomes, vec![SpeakOutcome::Spoken, SpeakOutcome::Spoken]);
    assert_eq!(t.output.scheduled(), 2);
    assert!(t.reader.narrator().session().is_idle());
}

#[tokio::test]
async fn test_unavailable_word_is_silent() {
    let mut t = TestReader::new(CountingSpeech::default(), false);
    let outcomes = finish(run(&mut t, "word silence").await.unwrap()).await;
    assert_eq!(outcomes, vec![SpeakOutcome::Silent]);
    assert_eq!(
        describe_outcomes("word \"silence\"", &Ok(outcomes)),
        "No speech available for word \"silence\""
    );
}

#[tokio::test]
async fn test_edit_then_done_prefetches_new_text() {
    let mut t = TestReader::new(CountingSpeech::default(), true);
    let path = t.story_file();
    t.reader.load_story(&path).unwrap();
    t.reader.session().prefetcher().settle().await;

    run(&mut t, "edit 1 Der Hund springt.").await.unwrap();
    assert!(t.reader.session().is_editing());
    assert_eq!(t.speech.calls_for("Der Hund springt."), 0);

    let msg = message(run(&mut t, "done").await.unwrap());
    assert!(msg.contains("prefetching 4 texts"));
    t.reader.session().prefetcher().settle().await;

    assert_eq!(t.speech.calls_for("Der Hund springt."), 1);
    // the unchanged texts were already cached
    assert_eq!(t.speech.calls_for("Der Hund schläft."), 1);
    assert!(matches!(run(&mut t, "done").await, Err(ReaderError::InvalidInput(_))));
}

#[tokio::test]
async fn test_reload_clears_cache() {
    let mut t = TestReader::new(CountingSpeech::default(), true);
    let path = t.story_file();
    t.reader.load_story(&path).unwrap();
    t.reader.session().prefetcher().settle().await;
    let first_id = t.reader.session().story_id();

    t.reader.load_story(&path).unwrap();
    assert_eq!(t.reader.session().story_id(), first_id + 1);
    t.reader.session().prefetcher().settle().await;
    assert_eq!(t.speech.calls_for("Der Hund rennt."), 2);
}

#[tokio::test]
async fn test_export_writes_wav() {
    let mut t = TestReader::new(CountingSpeech::default(), false);
    let path = t.story_file();
    t.reader.load_story(&path).unwrap();

    let out = t.dir.path().join("first.wav");
    let msg = message(run(&mut t, &format!("export 1 {}", out.display())).await.unwrap());
    assert!(msg.contains("20 ms"));

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    // header plus 480 16-bit samples
    assert_eq!(bytes.len(), 44 + 960);
}

#[tokio::test]
async fn test_status_reports_cache() {
    let mut t = TestReader::new(CountingSpeech::default(), true);
    let status = message(run(&mut t, "status").await.unwrap());
    assert!(status.contains("no story loaded"));

    let path = t.story_file();
    t.reader.load_story(&path).unwrap();
    t.reader.session().prefetcher().settle().await;

    let status = message(run(&mut t, "status").await.unwrap());
    assert!(status.contains("story 1"));
    assert!(status.contains("loading: -, speaking: -"));
    assert!(status.contains("4 entries"));
}

#[tokio::test]
async fn test_bad_story_file() {
    let mut t = TestReader::new(CountingSpeech::default(), true);
    let path = t.write_file("broken.json", "{ not json");
    let err = run(&mut t, &format!("load {}", path.display())).await.unwrap_err();
    assert!(matches!(err, ReaderError::Story(_)));

    let missing = t.dir.path().join("missing.json");
    assert!(t.reader.load_story(&missing).is_err());
}

#[test]
fn test_describe_busy() {
    assert_eq!(
        describe_outcomes("sentence 1", &Err(NarrationError::Busy)),
        "Still reading, try again in a moment"
    );
    assert_eq!(parse("quit").unwrap(), Some(Command::Quit));
}
