mod common;

use common::{request, CoreCall, ScriptedCore, TestView};
use effect_shell::protocol::{
    Effect, HttpRequest, HttpResult, KeyValueOperation, KeyValueResponse, KeyValueResult,
    PlatformRequest, PlatformResponse, RenderOperation, TimeRequest, TimeResponse, Value,
};
use effect_shell::store::MemoryStore;
use effect_shell::{Shell, ShellConfig, ShellError};

type Handle = effect_shell::ShellHandle<String, TestView>;

fn start(core: &ScriptedCore) -> (Handle, effect_shell::ShellTask) {
    Shell::with_store(core.clone(), ShellConfig::default(), MemoryStore::new())
        .expect("shell should start")
}

#[tokio::test]
async fn test_initial_view_is_decoded_at_start() {
    let core = ScriptedCore::new(&TestView::new("hello", 0));
    let (handle, task) = start(&core);

    assert_eq!(*handle.view(), TestView::new("hello", 0));
    assert_eq!(core.view_calls(), 1);

    drop(handle);
    task.wait().await.unwrap();
}

#[tokio::test]
async fn test_render_publishes_view_without_response() {
    let core = ScriptedCore::new(&TestView::default());
    core.on_event(vec![request(1, Effect::Render(RenderOperation))]);
    let (handle, task) = start(&core);
    let mut subscription = handle.subscribe();

    core.set_view(&TestView::new("rendered", 1));
    handle.update(&"go".to_string()).unwrap();

    let view = subscription.changed().await.expect("view published");
    assert_eq!(*view, TestView::new("rendered", 1));
    assert_eq!(*handle.view(), TestView::new("rendered", 1));

    drop(handle);
    let stats = task.wait().await.unwrap();
    assert_eq!(stats.render, 1);
    assert_eq!(stats.responses, 0);
    assert!(core.response_ids().is_empty());
}

#[tokio::test]
async fn test_time_now_is_submitted_under_request_id() {
    let core = ScriptedCore::new(&TestView::default());
    core.on_event(vec![request(2, Effect::Time(TimeRequest::Now))]);
    core.on_response(2, vec![]);
    let (handle, task) = start(&core);

    handle.update(&"now".to_string()).unwrap();
    core.wait_for_responses(1).await;

    let responses: Vec<TimeResponse> = core.responses_for(2);
    assert_eq!(responses.len(), 1);
    match &responses[0] {
        TimeResponse::Now { instant } => assert!(instant.seconds > 1_600_000_000),
        other => panic!("unexpected response {other:?}"),
    }

    drop(handle);
    let stats = task.wait().await.unwrap();
    assert_eq!(stats.events, 1);
    assert_eq!(stats.responses, 1);
}

#[tokio::test]
async fn test_batch_is_routed_in_issuance_order() {
    let port = common::free_port();
    let core = ScriptedCore::new(&TestView::default());
    core.on_event(vec![
        request(1, Effect::Time(TimeRequest::Now)),
        request(
            2,
            Effect::Http(HttpRequest::get(format!("http://127.0.0.1:{port}/facts"))),
        ),
        request(3, Effect::Platform(PlatformRequest)),
        request(4, Effect::Render(RenderOperation)),
        request(
            5,
            Effect::KeyValue(KeyValueOperation::Set {
                key: "count".to_string(),
                value: vec![1],
            }),
        ),
    ]);
    let (handle, task) = start(&core);

    handle.update(&"batch".to_string()).unwrap();
    core.wait_for_responses(4).await;

    assert_eq!(core.response_ids(), vec![1, 3, 5, 2]);

    let platform: Vec<PlatformResponse> = core.responses_for(3);
    assert!(!platform[0].0.is_empty());

    let stored: Vec<KeyValueResult> = core.responses_for(5);
    assert_eq!(
        stored,
        vec![KeyValueResult::Ok {
            response: KeyValueResponse::Set {
                previous: Value::None
            }
        }]
    );

    let http: Vec<HttpResult> = core.responses_for(2);
    assert_eq!(http.len(), 1);
    assert!(!http[0].is_ok());

    drop(handle);
    let stats = task.wait().await.unwrap();
    assert_eq!(stats.total_routed(), 5);
    assert_eq!(stats.responses, 4);
}

#[tokio::test]
async fn test_nested_batches_run_before_siblings() {
    let core = ScriptedCore::new(&TestView::default());
    core.on_event(vec![
        request(1, Effect::Platform(PlatformRequest)),
        request(2, Effect::Platform(PlatformRequest)),
    ]);
    core.on_response(1, vec![request(3, Effect::Time(TimeRequest::Now))]);
    let (handle, task) = start(&core);

    handle.update(&"go".to_string()).unwrap();
    core.wait_for_responses(3).await;
    assert_eq!(core.response_ids(), vec![1, 3, 2]);

    drop(handle);
    task.wait().await.unwrap();
}

#[tokio::test]
async fn test_events_are_forwarded_verbatim() {
    let core = ScriptedCore::new(&TestView::default());
    let (handle, task) = start(&core);

    handle.update_raw(vec![9, 8, 7]).unwrap();
    drop(handle);
    task.wait().await.unwrap();

    assert_eq!(
        core.calls(),
        vec![CoreCall::View, CoreCall::Event(vec![9, 8, 7])]
    );
}

#[tokio::test]
async fn test_malformed_batch_stops_the_shell() {
    let core = ScriptedCore::new(&TestView::default());
    core.on_event(vec![request(1, Effect::Platform(PlatformRequest))]);
    // Variant index past the end of `Effect`.
    let mut bogus = Vec::new();
    bogus.extend_from_slice(&1u64.to_le_bytes());
    bogus.extend_from_slice(&4u32.to_le_bytes());
    bogus.extend_from_slice(&42u32.to_le_bytes());
    core.on_response_raw(1, bogus);
    let (handle, task) = start(&core);

    handle.update(&"go".to_string()).unwrap();
    let err = task.wait().await.unwrap_err();
    assert!(err.is_protocol_violation());

    assert!(matches!(
        handle.update(&"again".to_string()),
        Err(ShellError::Stopped)
    ));
}

#[tokio::test]
async fn test_malformed_initial_view_fails_start() {
    let core = ScriptedCore::new(&TestView::default());
    core.set_view_raw(vec![1]);

    let result = Shell::with_store::<_, String, TestView, _>(
        core,
        ShellConfig::default(),
        MemoryStore::new(),
    );
    assert!(matches!(result, Err(ShellError::Protocol(_))));
}

#[tokio::test]
async fn test_shutdown_ends_the_loop_with_live_handles() {
    let core = ScriptedCore::new(&TestView::default());
    let (handle, task) = start(&core);
    let other = handle.clone();

    other.shutdown();
    let stats = task.wait().await.unwrap();
    assert_eq!(stats.events, 0);
    assert!(!handle.is_running());
}
