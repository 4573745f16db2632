use std::num::NonZeroUsize;
use std::sync::Arc;

use taskdeck::config::Config;
use taskdeck::context::AppContext;
use taskdeck::error::TaskdeckError;
use taskdeck::store::{FileStore, KeyValueStore};
use taskdeck::task::{FilterParams, Pagination, SortDirection, SortField, SortParams, TaskPatch};

async fn open(dir: &std::path::Path) -> AppContext {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.to_path_buf()));
    AppContext::with_store(Config::default(), store).await
}

#[tokio::test]
async fn tasks_filters_and_session_survive_a_restart() {
    let td = tempfile::tempdir().expect("tempdir");

    let mut ctx = open(td.path()).await;
    ctx.session
        .login("user@taskmanager.com", "user123")
        .await
        .expect("login");

    let mut list = ctx.open_task_list().await.expect("task list");
    let milk = list.add("Buy milk", "semi-skimmed").await.expect("add");
    list.add("Walk the dog", "").await.expect("add");
    list.add("Buy bread", "").await.expect("add");
    list.toggle_completion(&milk.id)
        .await
        .expect("toggle")
        .expect("loaded");
    list.set_filters(FilterParams {
        completed: None,
        search: Some("buy".to_owned()),
    })
    .await;
    ctx.shutdown();

    let ctx = open(td.path()).await;
    assert_eq!(ctx.session.user().map(|u| u.id.as_str()), Some("2"));

    let mut list = ctx.open_task_list().await.expect("task list");
    assert_eq!(list.all().len(), 3);
    assert_eq!(list.filters().search.as_deref(), Some("buy"));

    list.set_sort(SortParams::new(SortField::Title, SortDirection::Asc));
    let view = list.view();
    assert_eq!(view.total, 2);
    let titles: Vec<&str> = view.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["Buy bread", "Buy milk"]);
    assert!(view.tasks[1].completed);
}

#[tokio::test]
async fn users_only_see_their_own_tasks() {
    let td = tempfile::tempdir().expect("tempdir");

    let mut ctx = open(td.path()).await;
    ctx.session
        .login("admin@taskmanager.com", "admin123")
        .await
        .expect("login");
    let mut admin_list = ctx.open_task_list().await.expect("task list");
    let admin_task = admin_list.add("Rotate keys", "").await.expect("add");

    ctx.session.logout().await;
    ctx.session
        .login("user@taskmanager.com", "user123")
        .await
        .expect("login");
    let mut list = ctx.open_task_list().await.expect("task list");
    assert!(list.all().is_empty());

    let err = list
        .update("missing", TaskPatch::completed(true))
        .await
        .expect_err("missing id");
    assert!(matches!(err, TaskdeckError::TaskNotFound(_)));

    let err = list
        .update(&admin_task.id, TaskPatch::completed(true))
        .await
        .expect_err("foreign id");
    assert!(matches!(err, TaskdeckError::TaskNotFound(_)));
    list.delete(&admin_task.id).await.expect("delete is a no-op");

    ctx.session.logout().await;
    ctx.session
        .login("admin@taskmanager.com", "admin123")
        .await
        .expect("login");
    let admin_list = ctx.open_task_list().await.expect("task list");
    let kept = admin_list.get(&admin_task.id).expect("admin task survives");
    assert!(!kept.completed);
}

#[tokio::test]
async fn paging_through_a_dozen_tasks() {
    let td = tempfile::tempdir().expect("tempdir");
    let mut ctx = open(td.path()).await;
    ctx.session
        .login("user@taskmanager.com", "user123")
        .await
        .expect("login");

    let mut list = ctx.open_task_list().await.expect("task list");
    for i in 0..12 {
        list.add(&format!("task {i}"), "").await.expect("add");
    }

    let limit = NonZeroUsize::new(5).expect("nonzero");
    let mut sizes = Vec::new();
    for page in 1..=4 {
        list.set_pagination(Pagination::new(NonZeroUsize::new(page).expect("nonzero"), limit));
        let view = list.view();
        assert_eq!(view.total, 12);
        sizes.push(view.tasks.len());
    }
    assert_eq!(sizes, [5, 5, 2, 0]);
}

#[tokio::test]
async fn error_log_is_admin_only_and_records_failures() {
    let td = tempfile::tempdir().expect("tempdir");
    let mut ctx = open(td.path()).await;

    let err = ctx
        .session
        .login("user@taskmanager.com", "wrong")
        .await
        .expect_err("bad password");
    ctx.handle_error(&anyhow::Error::from(err), "login").await;

    ctx.session
        .login("user@taskmanager.com", "user123")
        .await
        .expect("login");
    assert!(matches!(
        ctx.session.require_admin(),
        Err(TaskdeckError::NotAuthorized)
    ));

    ctx.session
        .login("admin@taskmanager.com", "admin123")
        .await
        .expect("login");
    assert!(ctx.session.require_admin().is_ok());
    let logged = ctx.errors.stored_errors().await;
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].user_id, "anonymous");
    assert_eq!(logged[0].status_code, 401);
    assert_eq!(logged[0].route, "login");
}
