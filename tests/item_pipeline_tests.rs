//! End-to-end item processing through the supervisor with a dry-run ffmpeg:
//! record contents, completion markers, and ledger assembly.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use lingo_cli::core::paths::PathService;
use lingo_cli::core::pipeline::item::{ItemProcessor, ItemProcessorParams};
use lingo_cli::core::pipeline::{SupervisorOptions, run_supervisor};
use lingo_cli::core::resume::ResumptionStore;
use lingo_cli::core::subtitle::{Cue, SubtitleFormat, SubtitleTrack};
use lingo_cli::services::ffmpeg::{ClipFormat, Ffmpeg};

fn cues(n: usize) -> Vec<Cue> {
    (0..n)
        .map(|i| Cue {
            index: i,
            start: Duration::from_millis(i as u64 * 2000),
            end: Duration::from_millis(i as u64 * 2000 + 1500),
            lines: vec![format!("発話 {}", i)],
        })
        .collect()
}

fn processor(paths: &PathService, foreign: Arc<SubtitleTrack>) -> ItemProcessor {
    ItemProcessor::new(ItemProcessorParams {
        media_path: paths.media_path().to_path_buf(),
        artifact_prefix: paths.artifact_prefix(),
        source_base: paths.output_base(),
        audio_stream: Some(1),
        clip_format: ClipFormat::Ogg,
        offset_ms: 0,
        foreign,
        native: None,
        ffmpeg: Ffmpeg::new("ffmpeg", true),
        stt: None,
        stt_lang_hint: "ja".into(),
        stt_prompt: None,
    })
}

#[tokio::test]
async fn dry_run_pipeline_writes_complete_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("Show E01.mkv");
    std::fs::write(&media, b"").unwrap();
    let paths = PathService::new(&media);
    std::fs::create_dir_all(paths.media_dir()).unwrap();

    let foreign = Arc::new(SubtitleTrack {
        cues: cues(12),
        format: SubtitleFormat::Srt,
    });
    let report = run_supervisor(
        &CancellationToken::new(),
        foreign.cues.clone(),
        Arc::new(processor(&paths, Arc::clone(&foreign))),
        &ResumptionStore::empty(),
        &paths.ledger_path(),
        SupervisorOptions {
            workers: 3,
            field_sep: '\t',
            progress: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(report.written, 12);

    let content = std::fs::read_to_string(paths.ledger_path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 12);
    for (i, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[0], "Show E01");
        assert!(fields[2].starts_with("<img src=\"Show E01_"));
        assert!(fields[3].starts_with("[sound:Show E01_"));
        assert_eq!(fields[4], format!("発話 {}", i));
    }
    // Neighbor context lands in the prev/next columns.
    let second: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(second[6], "発話 0");
    assert_eq!(second[8], "発話 2");
}

#[tokio::test]
async fn preexisting_images_short_circuit_but_still_record() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("Show.mkv");
    std::fs::write(&media, b"").unwrap();
    let paths = PathService::new(&media);
    std::fs::create_dir_all(paths.media_dir()).unwrap();

    let all = cues(6);
    // Stills for cues 2 and 4 survive from an interrupted earlier run whose
    // ledger write never happened.
    for index in [2usize, 4] {
        let tag = lingo_cli::core::paths::timecode(all[index].start);
        std::fs::write(
            paths.media_dir().join(format!("Show_{}.avif", tag)),
            b"prior image",
        )
        .unwrap();
    }

    let foreign = Arc::new(SubtitleTrack {
        cues: all,
        format: SubtitleFormat::Srt,
    });
    run_supervisor(
        &CancellationToken::new(),
        foreign.cues.clone(),
        Arc::new(processor(&paths, Arc::clone(&foreign))),
        &ResumptionStore::empty(),
        &paths.ledger_path(),
        SupervisorOptions {
            workers: 2,
            field_sep: '\t',
            progress: None,
        },
    )
    .await
    .unwrap();

    // All six cues have ledger lines; the pre-existing images were left
    // untouched and their references preserved.
    let content = std::fs::read_to_string(paths.ledger_path()).unwrap();
    assert_eq!(content.lines().count(), 6);
    for index in [2usize, 4] {
        let tag = lingo_cli::core::paths::timecode(Duration::from_millis(index as u64 * 2000));
        assert!(content.contains(&format!("<img src=\"Show_{}.avif\">", tag)));
        let image = paths.media_dir().join(format!("Show_{}.avif", tag));
        assert_eq!(std::fs::read(&image).unwrap(), b"prior image");
    }
}
