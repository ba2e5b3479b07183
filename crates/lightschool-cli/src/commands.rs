//! Subcommand handlers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::warn;
use url::Url;

use lightschool_core::api::SchoolClient;
use lightschool_core::cache::{OfflineCacheManager, ResponseSource};
use lightschool_core::config::Config;
use lightschool_core::models::{LessonPack, Unit};
use lightschool_core::net::CacheRequest;
use lightschool_core::session::{grade_quiz, render_card, LessonSession, Sender, TutorContext, TutorSession};

type StdinLines = Lines<BufReader<Stdin>>;

fn stdin_lines() -> StdinLines {
    BufReader::new(io::stdin()).lines()
}

async fn prompt(lines: &mut StdinLines, text: &str) -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?)
}

fn source_label(source: ResponseSource) -> &'static str {
    match source {
        ResponseSource::Cache => "offline copy",
        ResponseSource::Network => "network",
    }
}

// ===== Lifecycle =====

pub async fn install(manager: &OfflineCacheManager, config: &Config) -> Result<()> {
    let manifest = config.manifest()?;
    let count = manager
        .initialize(&config.generation, &manifest)
        .await
        .with_context(|| format!("Install of {} failed", config.generation))?;
    println!("Installed {} ({} resources)", config.generation, count);
    Ok(())
}

pub async fn activate(manager: &OfflineCacheManager, config: &Config) -> Result<()> {
    let report = manager.activate_generation(&config.generation).await?;
    println!("Activated {}", report.current);
    if let Some(previous) = report.previous {
        println!("  previous: {}", previous);
    }
    for store in &report.deleted {
        println!("  deleted:  {}", store);
    }
    for store in &report.failed {
        println!("  cleanup failed: {} (will retry on next activation)", store);
    }
    Ok(())
}

/// Pick the last activated generation back up.
pub async fn resume(manager: &OfflineCacheManager) -> Result<()> {
    if manager.resume().await?.is_none() {
        warn!("No activated generation, requests go to the network");
    }
    Ok(())
}

// ===== Fetch / status =====

pub async fn fetch(manager: &OfflineCacheManager, config: &Config, path: &str, accept: Option<&str>) -> Result<()> {
    let url = match Url::parse(path) {
        Ok(url) => url,
        Err(_) => config.origin_url()?.join(path)?,
    };
    let mut request = CacheRequest::get(url);
    if let Some(accept) = accept {
        request = request.with_header("accept", accept);
    }

    let routed = manager.route(&request).await?;
    eprintln!(
        "{} {} ({}, {:?})",
        routed.response.status,
        request.url,
        source_label(routed.source),
        routed.policy
    );
    io::stdout().write_all(&routed.response.body).await?;
    io::stdout().flush().await?;
    Ok(())
}

pub async fn status(manager: &OfflineCacheManager) -> Result<()> {
    let stores = manager.status().await?;
    if stores.is_empty() {
        println!("No stores");
        return Ok(());
    }
    for store in stores {
        let marker = if store.current { "*" } else { " " };
        let sealed = if store.sealed { "ready" } else { "incomplete" };
        println!("{} {} [{}] {} entries", marker, store.name, sealed, store.entries.len());
        for entry in &store.entries {
            println!(
                "    {} {:>8}B {:>8}  {}",
                entry.status,
                entry.size,
                entry.age_display(),
                entry.key
            );
        }
    }
    Ok(())
}

// ===== Lessons and quizzes =====

async fn load_unit(
    client: &SchoolClient,
    subject: &str,
    grade: u32,
    unit_id: &str,
    locale: &str,
) -> Result<Unit> {
    let fetched = client.lesson_pack(subject, grade, locale).await.map_err(|e| {
        if e.is_offline() {
            anyhow::anyhow!("Lesson not available offline yet: {}", e)
        } else {
            anyhow::Error::new(e)
        }
    })?;
    if fetched.source == ResponseSource::Cache {
        eprintln!("(from {})", source_label(fetched.source));
    }

    let pack: LessonPack = fetched.data;
    if let Err(problem) = pack.validate() {
        warn!(%problem, subject, grade, "Lesson pack failed validation");
    }
    match pack.unit(unit_id) {
        Some(unit) => Ok(unit.clone()),
        None => bail!("No unit {} in {} grade {}", unit_id, subject, grade),
    }
}

pub async fn lesson(
    manager: Arc<OfflineCacheManager>,
    config: &Config,
    subject: &str,
    grade: u32,
    unit_id: &str,
    locale: &str,
) -> Result<()> {
    let client = SchoolClient::new(manager, config.origin_url()?);
    let unit = load_unit(&client, subject, grade, unit_id, locale).await?;
    let Some(mut session) = LessonSession::new(&unit) else {
        println!("{} has no cards", unit.title);
        return Ok(());
    };

    let mut lines = stdin_lines();
    loop {
        println!();
        println!("{} ({}/{}, {:.0}%)", session.title(), session.index() + 1, session.len(), session.progress_percent());
        println!();
        println!("{}", render_card(session.current()));
        println!();

        let controls = session.controls();
        let mut keys = Vec::new();
        if controls.prev_enabled {
            keys.push("[p]rev");
        }
        if controls.show_next {
            keys.push("[n]ext");
        }
        keys.push("[q]uit");
        if controls.show_quiz {
            println!("End of unit. Take the quiz: lightschool quiz {} {} {}", subject, grade, session.unit_id());
        }

        let Some(input) = prompt(&mut lines, &format!("{} > ", keys.join(" "))).await? else {
            break;
        };
        match input.trim() {
            "n" | "" => {
                if !session.next() {
                    break;
                }
            }
            "p" => {
                session.prev();
            }
            "q" => break,
            other => println!("Unknown key: {}", other),
        }
    }
    Ok(())
}

pub async fn quiz(
    manager: Arc<OfflineCacheManager>,
    config: &Config,
    subject: &str,
    grade: u32,
    unit_id: &str,
    locale: &str,
    save: bool,
) -> Result<()> {
    let client = SchoolClient::new(manager, config.origin_url()?);
    let unit = load_unit(&client, subject, grade, unit_id, locale).await?;
    if unit.quiz.is_empty() {
        println!("{} has no quiz", unit.title);
        return Ok(());
    }

    let mut lines = stdin_lines();
    let mut answers = HashMap::new();
    for (n, question) in unit.quiz.iter().enumerate() {
        println!();
        println!("{}. {}", n + 1, question.prompt);
        for (i, choice) in question.choices.iter().enumerate() {
            println!("   {}) {}", i + 1, choice);
        }
        let Some(input) = prompt(&mut lines, "answer > ").await? else {
            break;
        };
        // Choices are shown 1-based.
        if let Some(choice) = input.trim().parse::<usize>().ok().and_then(|c| c.checked_sub(1)) {
            answers.insert(question.id.clone(), choice);
        }
    }

    let result = grade_quiz(&unit, &answers);
    println!();
    println!("Score: {}% ({}/{})", result.score, result.correct, result.total);
    for explanation in &result.explanations {
        let mark = if explanation.correct { "ok" } else { "x " };
        println!("  {} {}", mark, explanation.prompt);
        if !explanation.explanation.is_empty() {
            println!("     {}", explanation.explanation);
        }
    }

    if save {
        match client.save_progress(&result.progress_update(subject, grade)).await {
            Ok(_) => println!("Progress saved"),
            Err(e) => {
                warn!(error = %e, unit = %result.unit_id, "Failed to save progress");
                println!("Could not save progress: {}", e.server_message().unwrap_or_else(|| e.to_string()));
            }
        }
    }
    Ok(())
}

// ===== Tutor =====

async fn ask(client: &SchoolClient, session: &mut TutorSession, input: &str) {
    let Some(request) = session.compose(input) else {
        return;
    };
    match client.ask_tutor(&request).await {
        Ok(reply) => session.receive(&reply),
        Err(e) => {
            warn!(error = %e, "Tutor request failed");
            session.fail(e.server_message().as_deref());
        }
    }
    if let Some(last) = session.messages().last().filter(|m| m.sender == Sender::Tutor) {
        let badge = if session.rules_badge() { " [rules]" } else { "" };
        println!("tutor{}: {}", badge, last.text);
    }
}

pub async fn tutor(
    manager: Arc<OfflineCacheManager>,
    config: &Config,
    subject: String,
    grade: u32,
    locale: String,
    message: String,
) -> Result<()> {
    let client = SchoolClient::new(manager, config.origin_url()?);
    let mut session = TutorSession::new(TutorContext { subject, grade, locale });

    if !message.trim().is_empty() {
        ask(&client, &mut session, &message).await;
        return Ok(());
    }

    let mut lines = stdin_lines();
    while let Some(input) = prompt(&mut lines, "you > ").await? {
        if matches!(input.trim(), "quit" | "exit") {
            break;
        }
        ask(&client, &mut session, &input).await;
    }
    Ok(())
}

// ===== Config =====

pub fn show_config(config: &Config, init: bool) -> Result<()> {
    let path = Config::config_path()?;
    if init {
        config.save()?;
        println!("Wrote {}", path.display());
    } else {
        println!("Config file: {}", path.display());
    }
    println!("Stores:      {}", config.stores_dir()?.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
