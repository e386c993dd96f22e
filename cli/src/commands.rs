use chrono::{TimeDelta, offset};
use fightline_core::context::ReplayConfigExt;
use fightline_core::tasks::ProgressCallback;
use fightline_core::{
    ActorPositionsTask, BuffLookupTask, DEFAULT_POOL, MapTimeline, TaskOutput,
};
use fightline_types::ReplayConfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::context::{CliContext, ReplayInput};

/// Error message with its whole source chain
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// `m:ss.mmm` for a span of milliseconds
fn format_offset(ms: i64) -> String {
    let Some(delta) = TimeDelta::try_milliseconds(ms) else {
        return format!("{ms}ms");
    };
    let sign = if ms < 0 { "-" } else { "" };
    let delta = delta.abs();
    format!(
        "{sign}{}:{:02}.{:03}",
        delta.num_minutes(),
        delta.num_seconds() % 60,
        delta.num_milliseconds() % 1000
    )
}

pub async fn load_file(path: &str, ctx: &CliContext) -> Result<(), String> {
    let path = PathBuf::from(path);
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let input: ReplayInput = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid fight file {}: {}", path.display(), e))?;

    let known_maps = input.fight.maps.iter().flatten().count();
    println!(
        "Loaded fight {} ({}) with {} events, {} maps at {}",
        input.fight.id,
        format_offset(input.fight.duration()),
        input.events.len(),
        known_maps,
        offset::Local::now().format("%H:%M:%S")
    );
    tracing::info!(
        path = %path.display(),
        fight_id = input.fight.id,
        events = input.events.len(),
        "Loaded fight"
    );

    ctx.set_input(path, input).await;
    Ok(())
}

/// Build the debuff index and actor timelines for the loaded fight on the
/// worker pool.
pub async fn replay(
    ctx: &CliContext,
    interval: Option<i64>,
    pool: Option<&str>,
) -> Result<(), String> {
    let input = ctx
        .input()
        .await
        .ok_or("No fight loaded, use `load --path <file>` first")?;
    let interval = match interval {
        Some(interval) => interval,
        None => ctx.config.read().await.sample_interval_ms,
    };
    let pool = pool.unwrap_or(DEFAULT_POOL);
    let started = Instant::now();

    let buff_task = BuffLookupTask {
        events: input.debuffs.clone(),
        fight_end_time: Some(input.fight.end_time),
    };
    let debuffs = match ctx
        .registry
        .execute_task(buff_task.into(), None, Some(pool))
        .map_err(|e| describe(&e))?
        .await
        .map_err(|e| describe(&e))?
    {
        TaskOutput::BuffLookup(lookup) => lookup,
        other => return Err(format!("Unexpected {:?} output", other.kind())),
    };

    let task = ActorPositionsTask::new(input.fight.clone(), input.events.clone())
        .with_roster(input.roster.clone())
        .with_actors(input.actors.clone())
        .with_debuffs(debuffs.clone())
        .with_sample_interval(interval);
    let progress: ProgressCallback = Arc::new(|fraction| {
        tracing::debug!(progress = fraction, "Reconstructing actor timelines");
    });
    let timeline = match ctx
        .registry
        .execute_task(task.into(), Some(progress), Some(pool))
        .map_err(|e| describe(&e))?
        .await
        .map_err(|e| describe(&e))?
    {
        TaskOutput::ActorPositions(timeline) => timeline,
        other => return Err(format!("Unexpected {:?} output", other.kind())),
    };

    println!(
        "Reconstructed {} actors over {} samples ({}ms step) in {}ms",
        timeline.actors.len(),
        timeline.timestamps.len(),
        timeline.sample_interval,
        started.elapsed().as_millis()
    );
    if !ctx.store_results(&input, debuffs, timeline).await {
        println!("Fight changed while replaying, results discarded");
    }
    Ok(())
}

/// Print every visible actor at `time` (ms since fight start).
pub async fn show_frame(ctx: &CliContext, time: i64, actor: Option<i64>) -> Result<(), String> {
    let timeline = ctx
        .timeline()
        .await
        .ok_or("No timeline yet, run `replay` first")?;

    let frames: Vec<_> = timeline
        .lookup_all(time)
        .into_iter()
        .filter(|frame| actor.is_none_or(|id| frame.actor.actor_id == id))
        .collect();
    if frames.is_empty() {
        println!("No actors visible at {}", format_offset(time));
        return Ok(());
    }

    println!(
        "{:<8} {:<24} {:<12} {:>9} {:>9} {:>7} {:>6} {:<5} Taunted",
        "Id", "Name", "Kind", "X", "Z", "Facing", "HP%", "Alive"
    );
    println!("{}", "-".repeat(96));
    for frame in frames {
        let sample = frame.sample;
        let health = sample
            .health
            .map(|h| format!("{:.0}", h.percent()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<24} {:<12} {:>9.2} {:>9.2} {:>7.1} {:>6} {:<5} {}",
            frame.actor.actor_id,
            frame.actor.name,
            format!("{:?}", frame.actor.kind),
            sample.position[0],
            sample.position[2],
            sample.facing.to_degrees(),
            health,
            sample.is_alive,
            sample.is_taunted
        );
    }
    Ok(())
}

pub async fn show_phases(ctx: &CliContext) -> Result<(), String> {
    let input = ctx.input().await.ok_or("No fight loaded")?;
    let signal = (!input.phase_signal.is_empty()).then_some(input.phase_signal.as_slice());
    let maps = MapTimeline::build(Some(&input.fight), None, signal);

    if maps.entries.is_empty() {
        println!("Fight has no maps");
        return Ok(());
    }
    if let Some(source) = maps.source() {
        let note = if maps.is_approximate() { " (approximate)" } else { "" };
        println!("Map boundaries from {:?}{}", source, note);
    }

    let start = input.fight.start_time;
    for entry in &maps.entries {
        let label = entry
            .map_name
            .as_deref()
            .or(entry.map_file.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("map {}", entry.map_id));
        println!(
            "{:>3}  {:>10} - {:<10} {}",
            entry.phase_index + 1,
            format_offset(entry.start_time - start),
            format_offset(entry.end_time - start),
            label
        );
    }
    Ok(())
}

pub async fn show_stats(ctx: &CliContext) {
    let all = ctx.registry.all_stats();
    if all.is_empty() {
        println!("No worker pools running");
        return;
    }

    println!(
        "{:<16} {:>7} {:>9} {:>6} {:>7} {:>5} {:>5} {:>9}",
        "Pool", "Tasks", "Complete", "Failed", "Workers", "Busy", "Queue", "Avg ms"
    );
    println!("{}", "-".repeat(72));
    let rows = all
        .iter()
        .map(|(name, stats)| (name.as_str(), stats.clone()))
        .chain(ctx.registry.stats(None).map(|total| ("(all)", total)));
    for (name, stats) in rows {
        println!(
            "{:<16} {:>7} {:>9} {:>6} {:>7} {:>5} {:>5} {:>9.1}",
            name,
            stats.total_tasks,
            stats.completed_tasks,
            stats.failed_tasks,
            stats.active_workers,
            stats.busy_workers,
            stats.queue_size,
            stats.average_task_time_ms
        );
    }
}

pub async fn show_settings(ctx: &CliContext, save: bool) -> Result<(), String> {
    let config = ctx.config.read().await;
    if let Some(path) = ReplayConfig::config_path() {
        println!("Config file: {}", path.display());
    }
    if let Some(path) = ctx.loaded_path().await {
        println!("Loaded fight: {}", path.display());
    }
    let rendered = serde_json::to_string_pretty(&*config).map_err(|e| e.to_string())?;
    println!("{rendered}");

    if save {
        config.save().map_err(|e| describe(&e))?;
        println!("Configuration saved");
    }
    Ok(())
}

pub fn exit(ctx: &CliContext) {
    let destroyed = ctx.registry.destroy_pool(None);
    tracing::debug!(pools = destroyed, "Shut down worker pools");
    let mut stdout = std::io::stdout();
    // Nothing useful to do if the terminal is gone
    let _ = writeln!(stdout, "quitting...");
    let _ = stdout.flush();
}
