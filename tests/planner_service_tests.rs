use anyhow::Result;
use async_trait::async_trait;
use chrono_tz::Tz;
use meal_planner::api_connection::ApiConnectionError;
use meal_planner::backend::{CompletionBackend, EmbeddingBackend};
use meal_planner::error::PlannerError;
use meal_planner::plan_store::PlanStore;
use meal_planner::planner::MemoryStore;
use meal_planner::profile::UserProfile;
use meal_planner::recipe::RawRecipe;
use meal_planner::reminders::ReminderScheduler;
use meal_planner::search::RecipeCorpus;
use meal_planner::service::PlannerService;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use tokio::sync::watch;

/// Answers every prompt kind the pipeline sends. Block plans and schedules
/// are numbered in the order they are requested.
#[derive(Default)]
struct ScriptedBackend {
    plans: AtomicUsize,
    schedules: AtomicUsize,
    fail_on_plan: Mutex<Option<usize>>,
    meal_prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ApiConnectionError> {
        if prompt.contains("Дни готовки: X") {
            return Ok("Дни готовки: 2; Время готовки: 40 минут.".to_string());
        }
        if prompt.contains("ровно из 10 блюд") {
            self.meal_prompts.lock().unwrap().push(prompt.to_string());
            return Ok((1..=10).map(|i| format!("Блюдо {}", i)).collect::<Vec<_>>().join("\n"));
        }
        if prompt.contains("график закупок") {
            let n = self.schedules.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(format!("закупки {}", n));
        }
        let n = self.plans.fetch_add(1, Ordering::SeqCst) + 1;
        let mut fail_on = self.fail_on_plan.lock().unwrap();
        if *fail_on == Some(n) {
            *fail_on = None;
            return Err(ApiConnectionError::EmptyResponse);
        }
        Ok(format!("план {}", n))
    }
}

struct LetterEmbedder;

impl EmbeddingBackend for LetterEmbedder {
    fn dimension(&self) -> usize {
        32
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; 32];
                for c in text.chars().filter(|c| c.is_alphabetic()) {
                    v[(c as usize) % 32] += 1.0;
                }
                v
            })
            .collect())
    }
}

struct Harness {
    dir: TempDir,
    backend: Arc<ScriptedBackend>,
    service: PlannerService,
    plans: PlanStore,
}

fn corpus() -> Arc<RecipeCorpus> {
    let recipes = vec![
        Some(RawRecipe {
            title: Some("Блюдо с рисом".to_string()),
            url: Some("https://eda.ru/ris".to_string()),
            ingredients: Some(vec!["Рис: 200 г".to_string()]),
            ..Default::default()
        }),
        Some(RawRecipe {
            title: None,
            url: Some("https://eda.ru/broken".to_string()),
            ..Default::default()
        }),
    ];
    Arc::new(RecipeCorpus::build(recipes, Arc::new(LetterEmbedder)).unwrap())
}

fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let backend = Arc::new(ScriptedBackend::default());
    let plans = PlanStore::new(dir.path());
    let reminders = Arc::new(
        ReminderScheduler::persistent(Tz::Europe__Moscow, 9, dir.path().join("reminders.json")).unwrap(),
    );
    let service = PlannerService::new(
        backend.clone(),
        corpus(),
        Arc::new(MemoryStore::default()),
        plans.clone(),
        reminders,
    );
    Harness {
        dir,
        backend,
        service,
        plans,
    }
}

fn profile(user_id: &str) -> UserProfile {
    UserProfile {
        user_id: user_id.to_string(),
        about_user: "работаю допоздна".to_string(),
        forbidden_products: "грибы".to_string(),
        favorite_products: "рис".to_string(),
        cooking_preferences: "два раза в неделю".to_string(),
    }
}

#[tokio::test]
async fn generate_saves_plan_and_schedules_reminders() {
    let h = harness();
    let outcome = h.service.generate_plan(&profile("1")).await.unwrap();
    assert_eq!(outcome.dishes.len(), 10);
    assert_eq!(outcome.plan.plan_texts(), vec!["план 1", "план 2"]);

    let stored = h.service.view_plan("1").unwrap();
    assert_eq!(stored.meal_plan, vec!["план 1", "план 2"]);
    assert_eq!(stored.shopping_schedule, vec!["закупки 1", "закупки 2"]);
    assert_eq!(h.plans.load_checkpoint("1").unwrap(), None);

    let mut ids: Vec<String> = h
        .service
        .list_reminders("1")
        .await
        .unwrap()
        .iter()
        .map(|job| job.key.job_id())
        .collect();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "reminder_1_Понедельник-Среда".to_string(),
            "reminder_1_Четверг-Воскресенье".to_string(),
        ]
    );
}

#[tokio::test]
async fn second_generate_is_refused() {
    let h = harness();
    h.service.generate_plan(&profile("1")).await.unwrap();
    let err = h.service.generate_plan(&profile("1")).await.unwrap_err();
    assert!(matches!(err, PlannerError::PlanAlreadyExists(ref user) if user == "1"));
}

#[tokio::test]
async fn edit_regenerates_with_override_and_replaces_reminders() {
    let h = harness();
    let err = h.service.edit_plan(&profile("2"), "без риса").await.unwrap_err();
    assert!(matches!(err, PlannerError::NoActivePlan(_)));

    h.service.generate_plan(&profile("2")).await.unwrap();
    let outcome = h.service.edit_plan(&profile("2"), "без риса").await.unwrap();
    assert_eq!(outcome.plan.plan_texts(), vec!["план 3", "план 4"]);

    let meal_prompts = h.backend.meal_prompts.lock().unwrap().clone();
    assert_eq!(meal_prompts.len(), 2);
    assert!(meal_prompts[1].contains("без риса"));
    assert!(meal_prompts[1].contains("AI: Блюдо 1"));

    let jobs = h.service.list_reminders("2").await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.message.contains("закупки 3") || job.message.contains("закупки 4")));
}

#[tokio::test]
async fn delete_removes_plan_and_reminders() {
    let h = harness();
    h.service.generate_plan(&profile("3")).await.unwrap();
    h.service.generate_plan(&profile("30")).await.unwrap();

    h.service.delete_plan("3").await.unwrap();
    assert!(matches!(h.service.view_plan("3"), Err(PlannerError::NoActivePlan(_))));
    assert!(h.service.list_reminders("3").await.unwrap().is_empty());
    assert_eq!(h.service.list_reminders("30").await.unwrap().len(), 2);

    assert!(matches!(
        h.service.delete_plan("3").await,
        Err(PlannerError::NoActivePlan(_))
    ));
}

#[tokio::test]
async fn failed_run_leaves_placeholders_and_can_resume() {
    let h = harness();
    *h.backend.fail_on_plan.lock().unwrap() = Some(2);

    let err = h.service.generate_plan(&profile("4")).await.unwrap_err();
    assert!(matches!(err, PlannerError::Backend(ApiConnectionError::EmptyResponse)));

    let stored = h.service.view_plan("4").unwrap();
    assert!(stored.is_placeholder());
    let progress = h.plans.load_checkpoint("4").unwrap().unwrap();
    assert_eq!(progress.completed.len(), 1);
    assert!(h.service.list_reminders("4").await.unwrap().is_empty());

    let plan = h.service.resume_plan(&profile("4")).await.unwrap();
    assert_eq!(plan.plan_texts(), vec!["план 1", "план 3"]);
    assert_eq!(h.service.view_plan("4").unwrap().meal_plan, vec!["план 1", "план 3"]);
    assert_eq!(h.service.list_reminders("4").await.unwrap().len(), 2);

    assert!(matches!(
        h.service.resume_plan(&profile("4")).await,
        Err(PlannerError::NothingToResume(_))
    ));
}

#[tokio::test]
async fn cancelled_run_stops_before_the_next_block() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(ScriptedBackend::default());
    let plans = PlanStore::new(dir.path());
    let (tx, rx) = watch::channel(true);
    let service = PlannerService::new(
        backend.clone(),
        corpus(),
        Arc::new(MemoryStore::default()),
        plans.clone(),
        Arc::new(ReminderScheduler::new(Tz::UTC, 9)),
    )
    .with_cancellation(rx);

    let err = service.generate_plan(&profile("5")).await.unwrap_err();
    assert!(matches!(err, PlannerError::Cancelled { completed_blocks: 0 }));
    assert_eq!(backend.plans.load(Ordering::SeqCst), 0);
    assert_eq!(plans.load_checkpoint("5").unwrap().unwrap().completed.len(), 0);

    tx.send_replace(false);
    let plan = service.resume_plan(&profile("5")).await.unwrap();
    assert_eq!(plan.blocks.len(), 2);
}

#[tokio::test]
async fn different_users_plan_concurrently() {
    let h = harness();
    let (p6, p7) = (profile("6"), profile("7"));
    let (a, b) = tokio::join!(
        h.service.generate_plan(&p6),
        h.service.generate_plan(&p7)
    );
    assert_eq!(a.unwrap().plan.blocks.len(), 2);
    assert_eq!(b.unwrap().plan.blocks.len(), 2);
    assert_eq!(h.service.list_reminders("6").await.unwrap().len(), 2);
    assert_eq!(h.service.list_reminders("7").await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_edit_keeps_previous_plan() {
    let h = harness();
    h.service.generate_plan(&profile("8")).await.unwrap();
    *h.backend.fail_on_plan.lock().unwrap() = Some(3);

    let err = h.service.edit_plan(&profile("8"), "без риса").await.unwrap_err();
    assert!(matches!(err, PlannerError::Backend(ApiConnectionError::EmptyResponse)));

    let stored = h.service.view_plan("8").unwrap();
    assert_eq!(stored.meal_plan, vec!["план 1", "план 2"]);
    assert_eq!(stored.shopping_schedule, vec!["закупки 1", "закупки 2"]);
    let jobs = h.service.list_reminders("8").await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.message.contains("закупки 1") || job.message.contains("закупки 2")));

    let plan = h.service.resume_plan(&profile("8")).await.unwrap();
    assert_eq!(plan.plan_texts(), vec!["план 4", "план 5"]);
    assert_eq!(h.service.view_plan("8").unwrap().meal_plan, vec!["план 4", "план 5"]);
}

#[tokio::test]
async fn services_with_separate_reminder_handles_share_one_file() {
    let h = harness();
    let other = PlannerService::new(
        h.backend.clone(),
        corpus(),
        Arc::new(MemoryStore::default()),
        h.plans.clone(),
        Arc::new(ReminderScheduler::persistent(Tz::Europe__Moscow, 9, h.dir.path().join("reminders.json")).unwrap()),
    );

    other.generate_plan(&profile("11")).await.unwrap();
    h.service.generate_plan(&profile("12")).await.unwrap();

    assert_eq!(other.list_reminders("12").await.unwrap().len(), 2);
    assert_eq!(h.service.list_reminders("11").await.unwrap().len(), 2);
}
