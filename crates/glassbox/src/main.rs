//! `gbx` - CLI for glassbox
//!
//! This binary runs the instrumented demonstrations, prints what each one
//! measured, and records finished runs in the `SQLite` ledger.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::warn;

use glassbox::cli::{
    Cli, Command, ConfigCommand, CyclesCommand, HistoryCommand, MemoryCommand, PipelineCommand,
    ProtocolCommand, RetryCommand,
};
use glassbox::memory::{benchmark_layouts, run_cycle_demo};
use glassbox::pipeline::run_pipeline_demo;
use glassbox::probe::Probe;
use glassbox::records::RecordBook;
use glassbox::registry::SettingsRegistry;
use glassbox::retry::{run_flaky_demo, RetryDemo};
use glassbox::storage::{DemoKind, RunLedger, RunRecord};
use glassbox::{init_logging, Config};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Protocol(cmd) => handle_protocol(&config, &cmd),
        Command::Memory(cmd) => handle_memory(&config, &cmd),
        Command::Cycles(cmd) => handle_cycles(&config, &cmd),
        Command::Retry(cmd) => handle_retry(&config, &cmd),
        Command::Pipeline(cmd) => handle_pipeline(&config, &cmd),
        Command::History(cmd) => handle_history(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn handle_protocol(config: &Config, cmd: &ProtocolCommand) -> anyhow::Result<()> {
    let probe = Probe::new();

    // Interned, frozen settings.
    let registry = SettingsRegistry::with_probe(probe.clone());
    let first = registry.intern("API_URL", "https://api.example.org");
    registry.intern("TIMEOUT_MS", 2_500);
    let second = registry.intern("API_URL", "https://changed.example.org");
    let reused = Arc::ptr_eq(&first, &second);
    let rejection = match registry.try_update("API_URL", "https://changed.example.org") {
        Err(e) => e.to_string(),
        Ok(()) => "write unexpectedly accepted".to_string(),
    };

    // Instrumented record book.
    let mut book = RecordBook::with_probe(probe.clone());
    book.insert("endpoint", "https://api.example.org");
    book.insert("retries", 3);
    book.insert("cache", "warm");
    let cache_hit = book.get("cache").is_some();
    let trace_hit = book.get("trace_id").is_some();
    book.remove("retries");
    let remaining = book.len();
    let rendered = book.to_string();

    let events = probe.events();

    if cmd.json {
        let detail = serde_json::json!({
            "settings": {
                "keys": registry.keys(),
                "re_intern_reused_original": reused,
                "surviving_value": first.value(),
                "rejected_write": rejection,
            },
            "records": {
                "kept": remaining,
                "cache_hit": cache_hit,
                "trace_id_hit": trace_hit,
                "rendered": rendered,
            },
            "probe_events": events,
        });
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        println!("Protocol demo");
        println!("-------------");
        println!();
        println!("[Settings]");
        println!("  Interned keys:     {}", registry.keys().join(", "));
        println!("  Re-intern reused:  {reused}");
        println!("  Surviving value:   {}", first.value());
        println!("  Rejected write:    {rejection}");
        println!();
        println!("[Record book]");
        println!("  Records kept:      {remaining}");
        println!("  Lookup hits:       cache={cache_hit}, trace_id={trace_hit}");
        println!("  Rendered:          {rendered}");
        println!();
        println!("[Probe log] ({} events)", events.len());
        for (i, event) in events.iter().enumerate() {
            println!("  {:>2}. {event}", i + 1);
        }
    }

    record_run(
        config,
        DemoKind::Protocol,
        serde_json::json!({
            "settings": registry.len(),
            "re_intern_reused_original": reused,
            "records": remaining,
            "probe_events": events.len(),
        }),
    );
    Ok(())
}

fn handle_memory(config: &Config, cmd: &MemoryCommand) -> anyhow::Result<()> {
    let count = cmd.count.unwrap_or(config.memory.instances);
    let report = benchmark_layouts(count);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Memory layout demo");
        println!("------------------");
        println!("Instances:       {}", report.instances);
        println!(
            "Dynamic layout:  {} B each, {} B total, built in {:.1} ms",
            report.dynamic_bytes_each, report.dynamic_total_bytes, report.dynamic_build_ms
        );
        println!(
            "Fixed layout:    {} B each, {} B total, built in {:.1} ms",
            report.fixed_bytes_each, report.fixed_total_bytes, report.fixed_build_ms
        );
        println!(
            "Savings:         {} B ({:.1}x smaller per instance)",
            report.saved_bytes(),
            report.ratio()
        );
    }

    record_run(config, DemoKind::Memory, serde_json::to_value(report)?);
    Ok(())
}

fn handle_cycles(config: &Config, cmd: &CyclesCommand) -> anyhow::Result<()> {
    let demo = run_cycle_demo();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&demo)?);
    } else {
        println!("Reference cycle demo");
        println!("--------------------");
        println!("Strong cycle:  {}", demo.strong);
        println!("Weak cycle:    {}", demo.weak);
        println!("Broken cycle:  {}", demo.broken);
        if demo.strong.leaked() {
            println!();
            println!("The strong pair is unreachable but never dropped; the weak and");
            println!("broken variants reclaim every node.");
        }
    }

    record_run(config, DemoKind::Cycles, serde_json::to_value(demo)?);
    Ok(())
}

fn handle_retry(config: &Config, cmd: &RetryCommand) -> anyhow::Result<()> {
    let mut policy = config.retry_policy();
    if let Some(attempts) = cmd.attempts {
        policy.max_attempts = attempts;
    }
    if let Some(delay_ms) = cmd.delay_ms {
        policy.delay = Duration::from_millis(delay_ms);
    }
    let failures = cmd.failures.unwrap_or(config.retry.failures);

    let demo = run_flaky_demo(&policy, failures);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&demo)?);
    } else {
        println!("Retry demo ({policy}; endpoint drops the first {failures})");
        match &demo {
            RetryDemo::Recovered {
                payload,
                attempts,
                slept_ms,
            } => {
                println!("Recovered after {attempts} attempts ({slept_ms} ms asleep): {payload}");
            }
            RetryDemo::GaveUp { attempts, error } => {
                println!("Gave up after {attempts} attempts: {error}");
            }
        }
    }

    record_run(config, DemoKind::Retry, serde_json::to_value(demo)?);
    Ok(())
}

fn handle_pipeline(config: &Config, cmd: &PipelineCommand) -> anyhow::Result<()> {
    let mut plan = config.pipeline_plan()?;
    if let Some(lines) = cmd.lines {
        plan.lines = lines;
    }
    if let Some(level) = cmd.level {
        plan.level = level;
    }
    if let Some(needle) = &cmd.needle {
        plan.needle = needle.clone();
    }
    if let Some(pattern) = &cmd.pattern {
        plan.pattern = Some(pattern.clone());
    }
    if cmd.dedup {
        plan.dedup = true;
    }
    if let Some(preview) = cmd.preview {
        plan.preview = preview;
    }

    let report = run_pipeline_demo(&plan)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Pipeline demo: {} matching lines out of {} synthetic, {} actually scanned",
            report.matches.len(),
            report.total,
            report.scanned
        );
        for line in &report.matches {
            println!("  {line}");
        }
    }

    record_run(
        config,
        DemoKind::Pipeline,
        serde_json::json!({
            "total": report.total,
            "scanned": report.scanned,
            "matches": report.matches.len(),
        }),
    );
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    let ledger = RunLedger::open(config.database_path())?;
    let runs = match cmd.demo {
        Some(demo) => ledger.by_demo(demo, cmd.limit)?,
        None => ledger.recent(cmd.limit)?,
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    let stats = ledger.stats()?;
    println!(
        "Run history: {} runs, {} bytes at {}",
        stats.total_runs,
        stats.db_size_bytes,
        ledger.path().display()
    );
    if runs.is_empty() {
        println!("Nothing recorded yet. Run a demo first, for example: gbx memory");
        return Ok(());
    }
    println!();
    for run in &runs {
        println!(
            "#{:<5} {}  {:<9} {}",
            run.id.unwrap_or(0),
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.demo,
            run.summary
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Memory]");
                println!("  Instances:        {}", config.memory.instances);
                println!();
                println!("[Retry]");
                println!("  Attempts:         {}", config.retry.attempts);
                println!("  Delay (ms):       {}", config.retry.delay_ms);
                println!("  Failures:         {}", config.retry.failures);
                println!();
                println!("[Pipeline]");
                println!("  Lines:            {}", config.pipeline.lines);
                println!("  Level:            {}", config.pipeline.level);
                println!("  Needle:           {}", config.pipeline.needle);
                println!("  Preview:          {}", config.pipeline.preview);
                println!();
                println!("[Ledger]");
                println!("  Enabled:          {}", config.ledger.enabled);
                println!("  Database path:    {}", config.database_path().display());
                println!("  Max runs:         {}", config.ledger.max_runs);
                println!("  Max age (days):   {}", config.ledger.max_age_days);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

/// Record a finished demo in the run ledger, then apply the retention limits.
///
/// Ledger trouble is logged and otherwise ignored; a demo that ran to
/// completion should still report its findings.
fn record_run(config: &Config, demo: DemoKind, summary: serde_json::Value) {
    if !config.ledger.enabled {
        return;
    }
    let ledger = match RunLedger::open(config.database_path()) {
        Ok(ledger) => ledger,
        Err(e) => {
            warn!(demo = %demo, "failed to open run ledger: {e}");
            return;
        }
    };
    if let Err(e) = ledger.record(&RunRecord::new(demo, summary)) {
        warn!(demo = %demo, "failed to record run: {e}");
        return;
    }
    if config.ledger.max_runs > 0 {
        if let Err(e) = ledger.prune_keep_recent(config.ledger.max_runs) {
            warn!("failed to prune run ledger by count: {e}");
        }
    }
    if let Some(max_age) = config.max_run_age() {
        if let Err(e) = ledger.prune_older_than(max_age) {
            warn!("failed to prune run ledger by age: {e}");
        }
    }
}
