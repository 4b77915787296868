//! The `process` command: route single-file or bulk input through the
//! pipeline, dispatching on each task's error behavior.
//!
//! Bulk mode walks the input directory, skipping `.media` artifact
//! directories and anything a previous run generated, and advances task by
//! task: continue-class and task-aborting errors move on to the next file,
//! an abort-all error ends the run, and probe-class errors ask the user
//! (degrading to abort-task when stdin is not a terminal).

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::cli::{InputMode, ProcessArgs, ui};
use crate::config::{Config, ConfigService};
use crate::core::language::{LangTag, LanguageResolver, iso639_1};
use crate::core::merge::{MergePlan, OutputMerger};
use crate::core::paths::{MEDIA_DIR_SUFFIX, PathService, is_generated_artifact};
use crate::core::pipeline::supervisor::{SupervisorOptions, run_supervisor};
use crate::core::pipeline::item::{ItemProcessor, ItemProcessorParams};
use crate::core::resume::ResumptionStore;
use crate::core::selection::TrackSelector;
use crate::core::sources::SubtitleSourceIndex;
use crate::core::subtitle::{Cue, SubtitleTrack, serialize_srt};
use crate::error::{ErrorBehavior, LingoError};
use crate::services::ffmpeg::{ClipFormat, Ffmpeg, artifact_path};
use crate::services::mediainfo::{MediaInfoCli, MediaInfoProvider};
use crate::services::stt::{SttClient, WhisperClient};
use crate::services::translit::{
    HttpProviderFactory, PoolConfig, PoolKey, TranslitStyle, global_manager, init_global_manager,
    shutdown_global_manager,
};
use crate::Result;

/// Execute the `process` subcommand.
pub async fn execute(args: ProcessArgs, config_service: &dyn ConfigService) -> Result<()> {
    let mut config = config_service.get_config()?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let targets = preference_list(args.langs.as_deref(), &config.languages.targets)?;
    let natives = preference_list(args.native_langs.as_deref(), &config.languages.natives)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling");
                cancel.cancel();
            }
        });
    }

    if config.translit.enabled {
        let factory = Arc::new(HttpProviderFactory::new(
            config.translit.base_url.clone(),
            Duration::from_secs(config.translit.timeout_seconds),
        ));
        let pool_config = PoolConfig {
            max_per_key: config.translit.max_per_key,
            initial_capacity: config.translit.initial_capacity,
            idle_timeout: Duration::from_secs(config.translit.idle_timeout_seconds),
            ..PoolConfig::default()
        };
        if let Some(previous) = init_global_manager(factory, pool_config) {
            previous.shutdown().await;
        }
    }

    let result = match args.input_mode() {
        InputMode::Single => {
            run_task(&args.input, &config, &targets, &natives, &args, &cancel).await
        }
        InputMode::Bulk => run_bulk(&config, &targets, &natives, &args, &cancel).await,
    };

    // Both the single and bulk paths land here, so shutdown runs no matter
    // how the run ended; it is idempotent besides.
    shutdown_global_manager().await;
    result
}

fn apply_overrides(config: &mut Config, args: &ProcessArgs) {
    if let Some(workers) = args.workers {
        config.pipeline.workers_max = workers;
    }
    if let Some(offset_ms) = args.offset_ms {
        config.pipeline.offset_ms = offset_ms;
    }
    if args.stt {
        config.stt.enabled = true;
    }
    if args.translit {
        config.translit.enabled = true;
    }
    if args.no_merge {
        config.merge.enabled = false;
    }
}

fn preference_list(cli_value: Option<&str>, config_value: &[String]) -> Result<Vec<LangTag>> {
    match cli_value {
        Some(value) => LangTag::parse_list(value),
        None => config_value
            .iter()
            .map(|s| LangTag::parse(s))
            .collect(),
    }
}

/// Walk `root` for processable media: accepted extensions only, `.media`
/// directories pruned, generated artifacts rejected.
pub fn discover_media(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(MEDIA_DIR_SUFFIX)))
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_generated_artifact(name) {
            debug!("discovery: rejecting generated artifact {}", name);
            continue;
        }
        found.push(path.to_path_buf());
    }
    found.sort();
    Ok(found)
}

async fn run_bulk(
    config: &Config,
    targets: &[LangTag],
    natives: &[LangTag],
    args: &ProcessArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let tasks = discover_media(&args.input, &config.general.video_extensions)?;
    if tasks.is_empty() {
        ui::status_warn(&format!(
            "no processable media found under {}",
            args.input.display()
        ));
        return Ok(());
    }
    info!("bulk mode: {} files", tasks.len());

    for (position, media) in tasks.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(LingoError::Cancelled);
        }
        ui::status_ok(&format!(
            "[{}/{}] {}",
            position + 1,
            tasks.len(),
            media.display()
        ));
        match run_task(media, config, targets, natives, args, cancel).await {
            Ok(()) => {}
            Err(e) => {
                let behavior = e.behavior();
                warn!("task failed ({}): {}", behavior, e);
                match behavior {
                    ErrorBehavior::Continue => {}
                    ErrorBehavior::AbortTask => {
                        ui::status_err(&format!("{}; skipping this file", e));
                    }
                    ErrorBehavior::AbortAllTasks => return Err(e),
                    ErrorBehavior::ProbeUser => {
                        if !ask_to_continue(&e, args.assume_yes) {
                            return Err(e);
                        }
                        ui::status_warn("continuing with the next file");
                    }
                }
            }
        }
    }
    Ok(())
}

fn ask_to_continue(error: &LingoError, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    if !std::io::stdin().is_terminal() {
        // Non-interactive callers treat probe-class errors as abort-task,
        // which in bulk mode means moving on.
        return true;
    }
    dialoguer::Confirm::new()
        .with_prompt(format!("{}. Continue with the next file?", error))
        .default(true)
        .interact()
        .unwrap_or(false)
}

async fn run_task(
    media: &Path,
    config: &Config,
    targets: &[LangTag],
    natives: &[LangTag],
    args: &ProcessArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let probe = MediaInfoCli::default().probe(media).await?;
    let paths = PathService::new(media);
    std::fs::create_dir_all(paths.media_dir())?;

    let resolver = LanguageResolver::new();
    let index = SubtitleSourceIndex::build(&paths, &probe, &resolver);
    let selector = TrackSelector::new();
    let ffmpeg = Ffmpeg::new("ffmpeg", args.dry_run);

    let target_pick = selector
        .select_subtitle(index.candidates(), targets)
        .ok_or_else(|| {
            LingoError::no_matching_track(format!(
                "no subtitle for {:?} among {} candidates",
                targets.iter().map(ToString::to_string).collect::<Vec<_>>(),
                index.candidates().len()
            ))
        })?;
    let target_lang = target_pick.candidate.language.clone();
    info!(
        "target subtitle: {} (preference {}, quality {})",
        target_lang, target_pick.preference_index, target_pick.quality
    );

    let foreign_path =
        SubtitleSourceIndex::materialize(&paths, &ffmpeg, target_pick.candidate).await?;
    let foreign = Arc::new(SubtitleTrack::load(&foreign_path)?);

    // The native track is optional context; losing it never fails a task.
    let native = match selector.select_subtitle(index.candidates(), natives) {
        Some(pick) => {
            match SubtitleSourceIndex::materialize(&paths, &ffmpeg, pick.candidate).await {
                Ok(path) => match SubtitleTrack::load(&path) {
                    Ok(track) => Some(Arc::new(track)),
                    Err(e) => {
                        warn!("native subtitle unusable: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("native subtitle materialization failed: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let audio = selector.select_audio(&probe.audio, &target_lang);
    if let Some(pick) = &audio {
        if pick.language_mismatch {
            ui::status_warn(&format!(
                "no {} audio track; using stream {} ({})",
                target_lang, pick.track.stream_index, pick.track.language
            ));
        }
    }

    let stt: Option<Arc<dyn SttClient>> = if config.stt.enabled {
        if config.stt.api_key.is_empty() {
            return Err(LingoError::config("stt.api_key is required when STT is enabled"));
        }
        Some(Arc::new(WhisperClient::new(
            config.stt.api_key.clone(),
            config.stt.base_url.clone(),
            config.stt.clone(),
        )?))
    } else {
        None
    };

    let clip_format = if config.pipeline.condensed_audio {
        ClipFormat::Wav
    } else {
        ClipFormat::Ogg
    };
    let processor = ItemProcessor::new(ItemProcessorParams {
        media_path: media.to_path_buf(),
        artifact_prefix: paths.artifact_prefix(),
        source_base: paths.output_base(),
        audio_stream: audio.as_ref().map(|pick| pick.track.stream_index),
        clip_format,
        offset_ms: config.pipeline.offset_ms,
        foreign: Arc::clone(&foreign),
        native,
        ffmpeg: ffmpeg.clone(),
        stt,
        stt_lang_hint: iso639_1(&target_lang.base)
            .unwrap_or(&target_lang.base)
            .to_string(),
        stt_prompt: config.stt.initial_prompt.clone(),
    });

    let store = ResumptionStore::open(&paths.ledger_path())?;
    let reporter = ui::RunReporter::start(media, foreign.cues.len());
    let options = SupervisorOptions {
        workers: config.pipeline.workers_max,
        field_sep: config.field_sep_char(),
        progress: Some(reporter.progress_sink()),
    };
    let report = run_supervisor(
        cancel,
        foreign.cues.clone(),
        Arc::new(processor),
        &store,
        &paths.ledger_path(),
        options,
    )
    .await?;
    reporter.finish(report.written, report.skipped);

    if config.pipeline.condensed_audio {
        if let Err(e) = build_condensed_track(&paths, &foreign.cues, &ffmpeg).await {
            warn!("condensed track failed: {}", e);
        }
    }
    if config.translit.enabled {
        write_translit_outputs(&paths, &foreign, &target_lang, config, cancel).await?;
    }
    if config.merge.enabled {
        let mut plan = MergePlan::new(&paths, &target_lang, &config.merge.container_ext);
        plan.discover_generated_audio(&target_lang);
        plan.add_subtitle(foreign_path.clone(), target_lang.clone(), "Dialogue");
        for style_name in &config.translit.styles {
            if let Some(style) = TranslitStyle::parse(style_name) {
                let path = paths.translit_path(style.suffix());
                if path.exists() {
                    plan.add_subtitle(
                        path,
                        target_lang.clone(),
                        format!("Dialogue ({})", style.as_str()),
                    );
                }
            }
        }
        OutputMerger::new(ffmpeg.clone()).merge(&plan).await?;
    }
    Ok(())
}

/// Concatenate this task's WAV clips into one condensed listening track.
async fn build_condensed_track(
    paths: &PathService,
    cues: &[Cue],
    ffmpeg: &Ffmpeg,
) -> Result<()> {
    let stem = paths.media_path().file_stem().map(|s| s.to_string_lossy().into_owned());
    let output = paths
        .media_path()
        .with_file_name(format!("{}.CONDENSED.ogg", stem.unwrap_or_default()));
    if output.exists() {
        debug!("condensed track {} already exists", output.display());
        return Ok(());
    }

    let prefix = paths.artifact_prefix();
    let mut listing = String::new();
    for cue in cues {
        let clip = artifact_path(&prefix, cue.start, "wav");
        if clip.exists() {
            listing.push_str(&format!("file '{}'\n", clip.display()));
        }
    }
    if listing.is_empty() {
        debug!("no clips available for condensed track");
        return Ok(());
    }
    let list_file = paths.media_dir().join("condensed.txt");
    std::fs::write(&list_file, listing)?;
    ffmpeg.concat_audio(&list_file, &output).await
}

/// Run cue text through the provider pool and write subtitle siblings per
/// configured style. Provider failures degrade to the original text.
async fn write_translit_outputs(
    paths: &PathService,
    foreign: &SubtitleTrack,
    target_lang: &LangTag,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(manager) = global_manager() else {
        return Ok(());
    };

    for style_name in &config.translit.styles {
        let Some(style) = TranslitStyle::parse(style_name) else {
            continue;
        };
        let output = paths.translit_path(style.suffix());
        if output.exists() {
            debug!("transliterated output {} already exists", output.display());
            continue;
        }
        let key = PoolKey::new(target_lang, style);

        let mut rendered = Vec::with_capacity(foreign.cues.len());
        for cue in &foreign.cues {
            if cancel.is_cancelled() {
                return Err(LingoError::Cancelled);
            }
            let text = cue.joined_text();
            let lines = match manager.process_with_managed_provider(&key, &text).await {
                Ok(result) => vec![result.rendered(style)],
                Err(e) => {
                    warn!("transliteration failed for cue {} ({}): {}", cue.index, key, e);
                    cue.lines.clone()
                }
            };
            rendered.push(Cue {
                index: cue.index,
                start: cue.start,
                end: cue.end,
                lines,
            });
        }
        std::fs::write(&output, serialize_srt(&rendered))?;
        ui::status_ok(&format!("wrote {}", output.display()));
    }
    Ok(())
}
