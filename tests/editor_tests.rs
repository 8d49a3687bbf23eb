//! End-to-end editor sessions against a live server.

use live_wiki::client::{Editor, EditorConfig, EditorSnapshot, Status};
use live_wiki::wiki_types::bus::MARKDOWN_ADDRESS;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("live_wiki=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

async fn start_test_server() -> SocketAddr {
    let app = live_wiki::create_router();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    addr
}

/// Start an editor session whose save notifications are live on the server.
async fn start_editor(addr: &SocketAddr) -> Editor {
    let editor = Editor::connect(EditorConfig {
        server: format!("http://{}", addr),
        quiescence: Duration::from_millis(50),
    });
    editor.start().await;
    assert!(tokio::time::timeout(TIMEOUT, editor.ready()).await.unwrap());

    // Frames are handled in order, so the register is done once this replies
    editor
        .channel()
        .send(MARKDOWN_ADDRESS, json!(""))
        .await
        .unwrap();
    editor
}

async fn wait_until(editor: &Editor, pred: impl FnMut(&EditorSnapshot) -> bool) {
    let mut rx = editor.subscribe();
    tokio::time::timeout(TIMEOUT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for editor state")
        .expect("editor state dropped");
}

async fn create_page(editor: &Editor, name: &str, markdown: &str) -> u64 {
    editor.new_page();
    editor.rename(name);
    editor.edit_markdown(markdown);
    editor.save().await.unwrap();
    editor.snapshot().page.id.unwrap()
}

#[tokio::test]
async fn test_start_renders_default_draft() {
    init_tracing();
    let addr = start_test_server().await;
    let editor = start_editor(&addr).await;

    wait_until(&editor, |s| !s.page.html.is_empty()).await;

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.page.id, None);
    assert_eq!(snapshot.page.name, "Example page");
    assert_eq!(
        snapshot.page.html,
        "<h1>Example page</h1>\n<p>Some text <em>here</em>.</p>\n"
    );
}

#[tokio::test]
async fn test_typing_is_rendered_after_quiescence() {
    init_tracing();
    let addr = start_test_server().await;
    let editor = start_editor(&addr).await;

    editor.edit_markdown("# H");
    editor.edit_markdown("# He");
    editor.edit_markdown("# Hello");

    wait_until(&editor, |s| s.page.html == "<h1>Hello</h1>\n").await;
    assert_eq!(editor.snapshot().page.markdown, "# Hello");
}

#[tokio::test]
async fn test_saving_a_draft_creates_and_opens_it() {
    init_tracing();
    let addr = start_test_server().await;
    let editor = start_editor(&addr).await;

    let id = create_page(&editor, "Fresh", "new content").await;

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.page.id, Some(id));
    assert_eq!(snapshot.page.name, "Fresh");
    assert_eq!(snapshot.page.markdown, "new content");
    assert!(snapshot.pages.iter().any(|p| p.id == id && p.name == "Fresh"));
    assert_eq!(snapshot.status, Some(Status::Success("Page created".to_string())));
}

#[tokio::test]
async fn test_save_by_other_client_sets_flag() {
    init_tracing();
    let addr = start_test_server().await;
    let alice = start_editor(&addr).await;
    let bob = start_editor(&addr).await;

    let id = create_page(&alice, "Shared", "v1").await;
    bob.load(id).await.unwrap();
    bob.edit_markdown("v2 from bob");
    bob.save().await.unwrap();

    wait_until(&alice, |s| s.concurrent_edit).await;

    // Content on alice's side is untouched
    assert_eq!(alice.snapshot().page.markdown, "v1");
    assert!(!bob.snapshot().concurrent_edit);
}

#[tokio::test]
async fn test_own_save_does_not_set_flag() {
    init_tracing();
    let addr = start_test_server().await;
    let alice = start_editor(&addr).await;

    let id = create_page(&alice, "Mine", "v1").await;
    alice.edit_markdown("v2");
    alice.save().await.unwrap();
    assert_eq!(
        alice.snapshot().status,
        Some(Status::Success("Page saved".to_string()))
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = alice.snapshot();
    assert_eq!(snapshot.page.id, Some(id));
    assert!(!snapshot.concurrent_edit);
}

#[tokio::test]
async fn test_save_of_other_page_does_not_set_flag() {
    init_tracing();
    let addr = start_test_server().await;
    let alice = start_editor(&addr).await;
    let bob = start_editor(&addr).await;

    let first = create_page(&alice, "First", "1").await;
    let second = create_page(&bob, "Second", "2").await;
    alice.load(first).await.unwrap();

    bob.edit_markdown("2 again");
    bob.save().await.unwrap();
    assert_eq!(bob.snapshot().page.id, Some(second));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!alice.snapshot().concurrent_edit);
}

#[tokio::test]
async fn test_reload_clears_flag() {
    init_tracing();
    let addr = start_test_server().await;
    let alice = start_editor(&addr).await;
    let bob = start_editor(&addr).await;

    let id = create_page(&alice, "Shared", "v1").await;
    bob.load(id).await.unwrap();
    bob.edit_markdown("v2");
    bob.save().await.unwrap();
    wait_until(&alice, |s| s.concurrent_edit).await;

    alice.load(id).await.unwrap();

    let snapshot = alice.snapshot();
    assert!(!snapshot.concurrent_edit);
    assert_eq!(snapshot.page.markdown, "v2");
    wait_until(&alice, |s| s.page.html == "<p>v2</p>\n").await;
}

#[tokio::test]
async fn test_load_missing_page_reports_error() {
    init_tracing();
    let addr = start_test_server().await;
    let editor = start_editor(&addr).await;

    assert!(editor.load(99).await.is_err());

    let snapshot = editor.snapshot();
    assert!(matches!(snapshot.status, Some(Status::Error(_))));
    assert_eq!(snapshot.page.id, None);
}

#[tokio::test]
async fn test_delete_opens_fresh_draft() {
    init_tracing();
    let addr = start_test_server().await;
    let editor = start_editor(&addr).await;

    let id = create_page(&editor, "Doomed", "bye").await;
    editor.delete().await.unwrap();

    let snapshot = editor.snapshot();
    assert_eq!(snapshot.page.id, None);
    assert_eq!(snapshot.page.name, "Example page");
    assert!(snapshot.pages.iter().all(|p| p.id != id));
    assert_eq!(snapshot.status, Some(Status::Success("Page deleted".to_string())));
}

#[tokio::test]
async fn test_delete_draft_is_an_error() {
    init_tracing();
    let addr = start_test_server().await;
    let editor = start_editor(&addr).await;

    assert!(editor.delete().await.is_err());
    assert!(matches!(editor.snapshot().status, Some(Status::Error(_))));
}
