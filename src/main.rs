use anyhow::{Context, Result};
use meal_planner::api_connection::Provider;
use meal_planner::backend::{CompletionBackend, EmbeddingBackend, RetryingBackend};
use meal_planner::cli::{parse_args, Cli, Command};
use meal_planner::config::PlannerConfig;
use meal_planner::error::PlannerError;
use meal_planner::plan_store::PlanStore;
use meal_planner::planner::MemoryStore;
use meal_planner::profile::UserProfile;
use meal_planner::reminders::{LogNotifier, ReminderDispatcher, ReminderScheduler};
use meal_planner::search::{EmbeddingEngine, JsonRecipeSource, RecipeCorpus};
use meal_planner::service::{remove_plan, stored_plan, PlannerService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn apply_overrides(config: &mut PlannerConfig, cli: &Cli) {
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = dir.clone();
    }
    if let Some(path) = &cli.recipes {
        config.recipes_path = path.clone();
    }
    if let Some(path) = &cli.corpus_snapshot {
        config.corpus_snapshot = path.clone();
    }
}

fn open_reminders(config: &PlannerConfig) -> Result<Arc<ReminderScheduler>> {
    let scheduler = ReminderScheduler::persistent(config.timezone, config.reminder_hour, config.reminder_store_path())
        .context("Failed to open the reminder store")?;
    Ok(Arc::new(scheduler))
}

fn load_profile(config: &PlannerConfig, user: &str, path: Option<PathBuf>) -> Result<UserProfile> {
    let path = path.unwrap_or_else(|| config.profile_path(user));
    UserProfile::load(&path, user)
}

/// Flips to `true` on Ctrl-C so a running plan stops after its current block.
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current block");
            tx.send_replace(true);
        }
    });
    rx
}

fn open_service(config: &PlannerConfig) -> Result<PlannerService> {
    let embedder: Arc<dyn EmbeddingBackend> = Arc::new(EmbeddingEngine::new()?);
    let source = JsonRecipeSource::new(&config.recipes_path);
    let corpus = RecipeCorpus::load_or_build(&config.corpus_snapshot, &source, embedder)
        .context("Failed to prepare the recipe corpus")?;
    info!(recipes = corpus.len(), "recipe corpus ready");

    let provider = Provider::openrouter(&config.api_key_env_var, &config.api_url, &config.model);
    let backend: Arc<dyn CompletionBackend> = Arc::new(RetryingBackend::new(provider, config.retry_policy()));

    Ok(PlannerService::new(
        backend,
        Arc::new(corpus),
        Arc::new(MemoryStore::new(config.memory_exchanges)),
        PlanStore::new(&config.storage_dir),
        open_reminders(config)?,
    )
    .with_cancellation(cancel_on_ctrl_c()))
}

fn print_blocks(plans: &[String], schedules: &[String]) {
    for (idx, plan) in plans.iter().enumerate() {
        println!("=== Блок {} ===\n{}\n", idx + 1, plan);
        if let Some(schedule) = schedules.get(idx) {
            println!("--- Закупки ---\n{}\n", schedule);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = parse_args();
    let mut config = PlannerConfig::from_env()?;
    apply_overrides(&mut config, &cli);

    match cli.command {
        Command::BuildCorpus => {
            let embedder: Arc<dyn EmbeddingBackend> = Arc::new(EmbeddingEngine::new()?);
            let source = JsonRecipeSource::new(&config.recipes_path);
            let corpus = RecipeCorpus::from_source(&source, embedder)?;
            corpus.save(&config.corpus_snapshot)?;
            println!(
                "Indexed {} recipes into {}",
                corpus.len(),
                config.corpus_snapshot.display()
            );
        }
        Command::Generate { user, profile, resume } => {
            let profile = load_profile(&config, &user, profile)?;
            let service = open_service(&config)?;
            if resume {
                let plan = service.resume_plan(&profile).await?;
                print_blocks(&plan.plan_texts(), &plan.schedule_texts());
            } else {
                let outcome = service.generate_plan(&profile).await?;
                println!(
                    "Дни готовки: {}; Время готовки: {} минут\nБлюда: {}\n",
                    outcome.preferences.cooking_days,
                    outcome.preferences.max_minutes,
                    outcome.dishes.join(", ")
                );
                print_blocks(&outcome.plan.plan_texts(), &outcome.plan.schedule_texts());
            }
        }
        Command::Edit { user, profile, prompt } => {
            let profile = load_profile(&config, &user, profile)?;
            let service = open_service(&config)?;
            let outcome = service.edit_plan(&profile, &prompt).await?;
            print_blocks(&outcome.plan.plan_texts(), &outcome.plan.schedule_texts());
        }
        Command::View { user } => {
            let store = PlanStore::new(&config.storage_dir);
            match stored_plan(&store, &user) {
                Ok(plan) if !plan.is_placeholder() => print_blocks(&plan.meal_plan, &plan.shopping_schedule),
                Ok(_) => println!("План для пользователя {} ещё не готов", user),
                Err(PlannerError::NoActivePlan(_)) => println!("У пользователя {} нет плана", user),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Delete { user } => {
            let store = PlanStore::new(&config.storage_dir);
            match remove_plan(&store, &*open_reminders(&config)?, &user).await {
                Ok(removed_jobs) => println!("План удалён, напоминаний удалено: {}", removed_jobs),
                Err(PlannerError::NoActivePlan(_)) => println!("У пользователя {} нет плана", user),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Reminders { user } => {
            let jobs = open_reminders(&config)?.list_all(&user).await?;
            if jobs.is_empty() {
                println!("Напоминаний нет");
            }
            for job in jobs {
                let local = job.next_fire.with_timezone(&config.timezone);
                println!("{} | {}\n{}\n", job.key.job_id(), local.format("%Y-%m-%d %H:%M"), job.message);
            }
        }
        Command::Watch { interval } => {
            let dispatcher = ReminderDispatcher::new(open_reminders(&config)?, Arc::new(LogNotifier));
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tx.send_replace(true);
                }
            });
            dispatcher.run(Duration::from_secs(interval.max(1)), rx).await?;
        }
    }

    Ok(())
}
