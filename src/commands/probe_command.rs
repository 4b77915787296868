//! The `probe` command: list a container's tracks and preview the subtitle
//! and audio selection for the requested languages.

use colored::Colorize;

use crate::cli::{ProbeArgs, ui};
use crate::config::ConfigService;
use crate::core::language::{LangTag, LanguageResolver};
use crate::core::paths::PathService;
use crate::core::selection::TrackSelector;
use crate::core::sources::{SubtitleSource, SubtitleSourceIndex};
use crate::services::mediainfo::{MediaInfoCli, MediaInfoProvider};
use crate::Result;

/// Execute the `probe` subcommand.
pub async fn execute(args: ProbeArgs, config_service: &dyn ConfigService) -> Result<()> {
    let config = config_service.get_config()?;
    let targets = match args.langs.as_deref() {
        Some(value) => LangTag::parse_list(value)?,
        None => config
            .languages
            .targets
            .iter()
            .map(|s| LangTag::parse(s))
            .collect::<Result<Vec<_>>>()?,
    };

    let probe = MediaInfoCli::default().probe(&args.input).await?;
    if let Some(general) = &probe.general {
        println!(
            "{} {} ({:.1} min)",
            "container:".bold(),
            general.format,
            general.duration_ms.unwrap_or(0) as f64 / 60_000.0
        );
    }

    println!("{}", "audio tracks:".bold());
    for track in &probe.audio {
        println!(
            "  #{} {} {}ch{}",
            track.stream_index,
            track.language,
            track.channel_count,
            track
                .title
                .as_deref()
                .map(|t| format!(" \"{}\"", t))
                .unwrap_or_default()
        );
    }

    let paths = PathService::new(&args.input);
    let index = SubtitleSourceIndex::build(&paths, &probe, &LanguageResolver::new());
    println!("{}", "subtitle candidates:".bold());
    for candidate in index.candidates() {
        let origin = match &candidate.source {
            SubtitleSource::Standalone { path } => format!("file {}", path.display()),
            SubtitleSource::Embedded {
                stream_index,
                format,
                codec_id,
                ..
            } => format!(
                "stream #{} ({}{})",
                stream_index,
                format,
                codec_id
                    .as_deref()
                    .map(|c| format!(", {}", c))
                    .unwrap_or_default()
            ),
        };
        println!(
            "  {} [{:?}]{} from {}",
            candidate.language,
            candidate.subtype,
            if candidate.is_default { " default" } else { "" },
            origin
        );
    }

    let selector = TrackSelector::new();
    match selector.select_subtitle(index.candidates(), &targets) {
        Some(pick) => ui::status_ok(&format!(
            "selection for {:?}: {} (quality {})",
            targets.iter().map(ToString::to_string).collect::<Vec<_>>(),
            pick.candidate.language,
            pick.quality
        )),
        None => ui::status_warn("no subtitle candidate matches the requested languages"),
    }
    if let Some(target) = targets.first() {
        match selector.select_audio(&probe.audio, target) {
            Some(pick) if pick.language_mismatch => ui::status_warn(&format!(
                "audio: stream #{} ({}), language mismatch",
                pick.track.stream_index, pick.track.language
            )),
            Some(pick) => ui::status_ok(&format!(
                "audio: stream #{} ({}, {}ch)",
                pick.track.stream_index, pick.track.language, pick.track.channel_count
            )),
            None => ui::status_warn("no audio tracks found"),
        }
    }
    Ok(())
}
