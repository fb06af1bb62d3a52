use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use clap::Parser;
use engine::GameEngine;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::thread_rng;
use store::{retry_on_unavailable, seed_catalog, CatalogFixture, StoreConfig};
use types::TeamId;

#[derive(Parser, Debug)]
struct Params {
    /// Database URL; falls back to DATABASE_URL, then an in-memory database.
    #[arg(short, long)]
    database_url: Option<String>,

    /// Competing team names.
    #[arg(short, long)]
    team: Vec<String>,

    /// JSON catalog fixture; the built-in sample is used when omitted.
    #[arg(short, long)]
    fixture: Option<std::path::PathBuf>,

    /// Random submissions to play through before printing the standings.
    #[arg(short, long, default_value_t = 20)]
    submissions: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Params::parse();
    tracing::info!("args: {args:?}");

    let config = StoreConfig::from_cli_or_env(args.database_url.clone());
    let pool = config.create_pool().await?;
    let engine = Arc::new(GameEngine::new(pool));
    engine.migrate().await?;

    let team_names = if args.team.is_empty() {
        vec!["Night Owls".to_string(), "Grey Foxes".to_string()]
    } else {
        args.team.clone()
    };

    let fixture = match &args.fixture {
        Some(path) => CatalogFixture::from_json(&std::fs::read_to_string(path)?)?,
        None => CatalogFixture::sample(),
    };
    fixture.ensure_playable()?;
    let (marks, tasks) = seed_catalog(engine.catalog(), &fixture).await?;
    let mut teams = Vec::new();
    for name in &team_names {
        teams.push(engine.catalog().add_team(TeamId::generate(), name).await?);
    }
    tracing::info!(
        "Teams: {}",
        teams.iter().map(|team| team.name.as_str()).join(", ")
    );

    let now = engine.now();
    let game = engine
        .create_game(now - Duration::minutes(5), Some(now + Duration::hours(2)), None)
        .await?;

    let mut game_marks = Vec::new();
    for mark in &marks {
        game_marks.push(engine.assign_mark(game.id, mark.id).await?);
    }
    let mut game_tasks = Vec::new();
    for task in &tasks {
        game_tasks.push(engine.assign_task(game.id, task.id).await?);
    }
    // Pair task N with mark N; the leftover marks stay as decoys.
    for (game_task, game_mark) in game_tasks.iter().zip(&game_marks) {
        engine
            .set_correct_answer(game.id, game_task.id, game_mark.id)
            .await?;
    }

    let mut rng = thread_rng();
    for _ in 0..args.submissions {
        let team = teams.choose(&mut rng).expect("at least one team");
        let game_task = game_tasks.choose(&mut rng).expect("at least one game task");
        let game_mark = game_marks.choose(&mut rng).expect("at least one game mark");
        let (team_id, game_id, task_id, mark_id) = (team.id, game.id, game_task.id, game_mark.id);
        let runner = engine.clone();
        let outcome = retry_on_unavailable(
            move || {
                let runner = runner.clone();
                Box::pin(async move { runner.submit_answer(team_id, game_id, task_id, mark_id).await })
            },
            3,
            StdDuration::from_millis(50),
        )
        .await?;
        tracing::info!(
            "{} -> game task {}: correct={} accepted={}",
            team.name,
            game_task.id,
            outcome.correct,
            outcome.accepted
        );
    }

    let board = engine.leaderboard(game.id).await?;
    println!("{}", serde_json::to_string_pretty(&board)?);

    engine.close_game(game.id).await?;
    if let Err(e) = engine
        .submit_answer(teams[0].id, game.id, game_tasks[0].id, game_marks[0].id)
        .await
    {
        tracing::info!("Submission after close rejected: {e}");
    }

    Ok(())
}
