use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use crate::client::{ApiError, ApiRequest, Backend};
use crate::kpi::{self, KpiMetric};
use crate::output::{JsonSink, NoticeLevel, SinkEvent};
use crate::pagination::PageControl;
use crate::table::{
    spawn_table, LoadOutcome, MemoryPageSizes, PageSizeStore, TableController, TableError,
    TableKind, ViewPhase,
};

#[derive(Clone)]
struct Reply {
    delay: Duration,
    result: Result<Option<Value>, ApiError>,
}

/// Answers by endpoint (`/products?page=1&per_page=25&search=`). The last
/// scripted reply for an endpoint keeps being served.
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    bodies: Mutex<Vec<Option<Value>>>,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self::default()
    }

    fn on_after(self, endpoint: &str, delay: Duration, result: Result<Option<Value>, ApiError>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(Reply { delay, result });
        self
    }

    fn on(self, endpoint: &str, result: Result<Option<Value>, ApiError>) -> Self {
        self.on_after(endpoint, Duration::ZERO, result)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn bodies(&self) -> Vec<Option<Value>> {
        self.bodies.lock().unwrap().clone()
    }

    fn next_reply(&self, endpoint: &str) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(endpoint) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Reply {
                delay: Duration::ZERO,
                result: Err(ApiError::network(format!("unscripted endpoint {endpoint}"))),
            },
        }
    }
}

impl Backend for ScriptedBackend {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<Option<Value>, ApiError>> + Send {
        let endpoint = request.endpoint();
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method, endpoint));
        self.bodies.lock().unwrap().push(request.body.clone());
        let reply = self.next_reply(&endpoint);
        async move {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            reply.result
        }
    }
}

#[derive(Clone, Default)]
struct SharedSizes(Arc<Mutex<BTreeMap<String, u32>>>);

impl PageSizeStore for SharedSizes {
    fn load(&self, key: &str) -> Option<u32> {
        self.0.lock().unwrap().get(key).copied()
    }

    fn save(&mut self, key: &str, size: u32) -> Result<(), String> {
        self.0.lock().unwrap().insert(key.to_string(), size);
        Ok(())
    }
}

fn product_page(ids: &[&str], total: u64, page: u32) -> Option<Value> {
    let data = ids
        .iter()
        .map(|id| {
            json!({
                "ItemCode": id,
                "ProductName": format!("Item {id}"),
                "Category": "Parts",
                "Price": 10,
                "Stock": 1,
                "Status": "Active"
            })
        })
        .collect::<Vec<_>>();
    Some(json!({ "data": data, "total": total, "page": page }))
}

fn products_url(page: u32, per_page: u32, search: &str) -> String {
    format!("/products?page={page}&per_page={per_page}&search={search}")
}

fn controller_for(
    kind: TableKind,
    backend: &Arc<ScriptedBackend>,
) -> TableController<ScriptedBackend, JsonSink> {
    TableController::new(
        kind,
        Arc::clone(backend),
        JsonSink::recording(),
        Box::new(MemoryPageSizes::new()),
    )
}

fn count_rows(events: &[SinkEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SinkEvent::Rows { .. }))
        .count()
}

fn last_summary(events: &[SinkEvent]) -> Option<(u64, u64, u64)> {
    events.iter().rev().find_map(|e| match e {
        SinkEvent::Summary {
            start_item,
            end_item,
            total,
        } => Some((*start_item, *end_item, *total)),
        _ => None,
    })
}

#[tokio::test]
async fn load_updates_state_before_the_response() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut table = controller_for(TableKind::Products, &backend);
    assert_eq!(table.phase(), ViewPhase::Idle);

    let ticket = table.begin_load(2, "widget");
    assert_eq!(table.state().current_page, 2);
    assert_eq!(table.state().search_term, "widget");
    assert_eq!(table.phase(), ViewPhase::Loading);
    assert!(matches!(table.sink().events()[0], SinkEvent::Loading { .. }));

    let outcome = table.finish_load(&ticket, Err(ApiError::network("connection refused")));
    assert!(matches!(outcome, LoadOutcome::Failed(_)));
    assert_eq!(table.state().current_page, 2);
    assert_eq!(table.state().search_term, "widget");
    assert_eq!(table.phase(), ViewPhase::Errored);
}

#[tokio::test]
async fn successful_load_renders_rows_summary_and_controls() {
    let backend = Arc::new(
        ScriptedBackend::new().on(&products_url(2, 25, ""), Ok(product_page(&["P-1", "P-2"], 61, 2))),
    );
    let mut table = controller_for(TableKind::Products, &backend);

    let outcome = table.load(2, "").await;
    assert_eq!(outcome, LoadOutcome::Rendered { rows: 2 });
    assert_eq!(table.phase(), ViewPhase::Rendered);
    assert_eq!(table.rows_on_page(), 2);

    let events = table.sink().events();
    assert_eq!(count_rows(events), 1);
    assert_eq!(last_summary(events), Some((26, 50, 61)));
    let controls = events
        .iter()
        .find_map(|e| match e {
            SinkEvent::Controls { controls, .. } => Some(controls.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(controls.first(), Some(&PageControl::Previous { enabled: true }));
    assert!(controls.contains(&PageControl::Page {
        number: 2,
        current: true
    }));
    assert_eq!(controls.last(), Some(&PageControl::Next { enabled: true }));
}

#[tokio::test]
async fn narrower_windows_center_on_the_current_page() {
    let backend = Arc::new(
        ScriptedBackend::new().on(&products_url(5, 25, ""), Ok(product_page(&["P-101"], 250, 5))),
    );
    let mut table = controller_for(TableKind::Products, &backend).with_max_visible(3);
    table.load(5, "").await;

    let window = table
        .sink()
        .events()
        .iter()
        .find_map(|e| match e {
            SinkEvent::Controls { window, .. } => Some(window.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(window.total_pages, 10);
    assert_eq!(window.visible_pages, vec![4, 5, 6]);
    assert!(window.show_leading_ellipsis);
    assert!(window.show_trailing_ellipsis);
}

#[tokio::test]
async fn empty_results_render_a_search_aware_placeholder() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(1, 25, "zzz"), Ok(product_page(&[], 0, 1)))
            .on(&products_url(1, 25, ""), Ok(product_page(&[], 0, 1))),
    );
    let mut table = controller_for(TableKind::Products, &backend);

    assert_eq!(table.search("zzz").await, LoadOutcome::Empty);
    assert_eq!(table.search("").await, LoadOutcome::Empty);

    let placeholders: Vec<_> = table
        .sink()
        .events()
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Placeholder { message } => Some(message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        placeholders,
        vec![
            "No products match the current search.".to_string(),
            "No products found.".to_string()
        ]
    );
    assert_eq!(last_summary(table.sink().events()), Some((0, 0, 0)));
}

#[tokio::test]
async fn malformed_success_is_rendered_as_an_error() {
    let backend = Arc::new(
        ScriptedBackend::new().on(&products_url(1, 25, ""), Ok(Some(json!({"data": "nope", "total": 3})))),
    );
    let mut table = controller_for(TableKind::Products, &backend);

    let outcome = table.load(1, "").await;
    assert!(matches!(outcome, LoadOutcome::Failed(ApiError::Malformed { .. })));

    let events = table.sink().events();
    assert_eq!(count_rows(events), 0);
    assert!(events
        .iter()
        .any(|e| matches!(e, SinkEvent::Error { message } if message.contains("data"))));
    assert_eq!(last_summary(events), Some((0, 0, 0)));
    assert!(matches!(
        events.last(),
        Some(SinkEvent::Controls { controls, .. }) if controls.is_empty()
    ));
}

#[tokio::test]
async fn server_error_message_reaches_the_error_row() {
    let backend = Arc::new(ScriptedBackend::new().on(
        &products_url(1, 25, ""),
        Err(ApiError::server(500, "database unavailable")),
    ));
    let mut table = controller_for(TableKind::Products, &backend);
    table.load(1, "").await;
    assert!(table.sink().events().iter().any(|e| matches!(
        e,
        SinkEvent::Error { message } if message == "Could not load products: database unavailable"
    )));
}

#[tokio::test]
async fn responses_for_superseded_loads_are_discarded() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut table = controller_for(TableKind::Products, &backend);

    let first = table.begin_load(1, "a");
    let second = table.begin_load(1, "ab");
    assert_eq!(table.latest_seq(), second.seq);

    let outcome = table.finish_load(&second, Ok(product_page(&["P-2"], 1, 1)));
    assert_eq!(outcome, LoadOutcome::Rendered { rows: 1 });
    let rendered = table.sink().events().len();

    assert_eq!(
        table.finish_load(&first, Ok(product_page(&["P-1", "P-9"], 2, 1))),
        LoadOutcome::Stale
    );
    assert_eq!(table.sink().events().len(), rendered);
    assert_eq!(table.rows_on_page(), 1);
    assert_eq!(table.state().search_term, "ab");
}

#[tokio::test]
async fn deleting_the_only_row_on_the_last_page_steps_back() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(3, 25, ""), Ok(product_page(&["P-51"], 51, 3)))
            .on("/products/P-51", Ok(None))
            .on(&products_url(2, 25, ""), Ok(product_page(&["P-26"], 50, 2))),
    );
    let mut table = controller_for(TableKind::Products, &backend);
    table.load(3, "").await;

    let outcome = table.on_delete_confirmed("P-51").await.unwrap();
    assert_eq!(outcome, LoadOutcome::Rendered { rows: 1 });
    assert_eq!(table.state().current_page, 2);
    assert_eq!(
        backend.calls(),
        vec![
            format!("GET {}", products_url(3, 25, "")),
            "DELETE /products/P-51".to_string(),
            format!("GET {}", products_url(2, 25, "")),
        ]
    );
    assert!(table.sink().events().iter().any(|e| matches!(
        e,
        SinkEvent::Notice { notice } if notice.level == NoticeLevel::Success
    )));
}

#[tokio::test(start_paused = true)]
async fn navigation_follows_the_page_the_server_returned() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(9, 25, ""), Ok(product_page(&["P-51"], 51, 3)))
            .on(&products_url(2, 25, ""), Ok(product_page(&["P-26"], 51, 2))),
    );
    let table = controller_for(TableKind::Products, &backend);
    let (handle, task) = spawn_table(table, Duration::from_millis(300));

    handle.load(9, "").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.previous_page().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(
        backend.calls(),
        vec![
            format!("GET {}", products_url(9, 25, "")),
            format!("GET {}", products_url(2, 25, "")),
        ]
    );
}

#[tokio::test]
async fn deleting_on_a_clamped_page_steps_back_from_the_served_page() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(9, 25, ""), Ok(product_page(&["P-51"], 51, 3)))
            .on("/products/P-51", Ok(None))
            .on(&products_url(2, 25, ""), Ok(product_page(&["P-26"], 50, 2))),
    );
    let mut table = controller_for(TableKind::Products, &backend);
    table.load(9, "").await;
    assert_eq!(table.state().current_page, 9);
    assert_eq!(table.current_page(), 3);
    assert_eq!(table.page_after_delete(), 2);

    table.on_delete_confirmed("P-51").await.unwrap();
    assert_eq!(
        backend.calls().last(),
        Some(&format!("GET {}", products_url(2, 25, "")))
    );
}

#[tokio::test]
async fn delete_after_a_failed_load_stays_on_the_requested_page() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(3, 25, ""), Err(ApiError::network("connection reset")))
            .on("/products/P-51", Ok(None)),
    );
    let mut table = controller_for(TableKind::Products, &backend);
    table.load(3, "").await;
    assert_eq!(table.rows_on_page(), 0);
    assert_eq!(table.page_after_delete(), 3);

    table.on_delete_confirmed("P-51").await.unwrap();
    assert_eq!(
        backend.calls(),
        vec![
            format!("GET {}", products_url(3, 25, "")),
            "DELETE /products/P-51".to_string(),
            format!("GET {}", products_url(3, 25, "")),
        ]
    );
}

#[tokio::test]
async fn delete_on_an_empty_page_does_not_step_back() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(2, 25, ""), Ok(product_page(&[], 25, 2)))
    );
    let mut table = controller_for(TableKind::Products, &backend);
    assert_eq!(table.load(2, "").await, LoadOutcome::Empty);
    assert_eq!(table.page_after_delete(), 2);
}

#[tokio::test]
async fn deleting_on_the_first_page_reloads_it() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(1, 25, "bolt"), Ok(product_page(&["P-1", "P-2"], 2, 1)))
            .on("/products/P-1", Ok(None)),
    );
    let mut table = controller_for(TableKind::Products, &backend);
    table.load(1, "bolt").await;
    table.on_delete_confirmed("P-1").await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], format!("GET {}", products_url(1, 25, "bolt")));
    assert_eq!(table.state().current_page, 1);
}

#[tokio::test]
async fn failed_delete_leaves_state_and_skips_reload() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(2, 25, ""), Ok(product_page(&["P-26"], 26, 2)))
            .on("/products/P-26", Err(ApiError::server(409, "product has open orders"))),
    );
    let mut table = controller_for(TableKind::Products, &backend);
    table.load(2, "").await;

    let err = table.on_delete_confirmed("P-26").await.unwrap_err();
    assert_eq!(err, TableError::Api(ApiError::server(409, "product has open orders")));
    assert_eq!(table.state().current_page, 2);
    assert_eq!(backend.calls().len(), 2);
    assert!(table.sink().events().iter().any(|e| matches!(
        e,
        SinkEvent::Notice { notice } if notice.level == NoticeLevel::Error
            && notice.message == "product has open orders"
    )));
}

#[tokio::test]
async fn declined_delete_is_a_silent_no_op() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut table = controller_for(TableKind::Users, &backend);

    let outcome = table.delete_with_confirmation("7", |_| false).await.unwrap();
    assert_eq!(outcome, None);
    assert!(backend.calls().is_empty());
    assert!(table.sink().events().is_empty());
}

#[tokio::test]
async fn read_only_tables_refuse_record_actions() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut table = controller_for(TableKind::StockHistory, &backend);

    let err = table.delete_with_confirmation("1", |_| true).await.unwrap_err();
    assert!(matches!(err, TableError::Unsupported { action: "delete", .. }));
    let err = table.save_record(None, json!({})).await.unwrap_err();
    assert!(matches!(err, TableError::Unsupported { action: "save", .. }));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn edits_reload_current_page_and_creates_go_to_page_one() {
    let users = |page: u32| format!("/users?page={page}&per_page=10&search=ann");
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&users(3), Ok(Some(json!({"data": [{"UserID": 7}], "total": 21, "page": 3}))))
            .on("/users/7", Ok(Some(json!({"UserID": 7}))))
            .on("/users", Ok(Some(json!({"UserID": 22}))))
            .on(&users(1), Ok(Some(json!({"data": [{"UserID": 1}], "total": 22, "page": 1})))),
    );
    let mut table = controller_for(TableKind::Users, &backend);
    table.load(3, "ann").await;

    table
        .save_record(Some("7"), json!({"Username": "ann"}))
        .await
        .unwrap();
    assert_eq!(table.state().current_page, 3);

    table
        .save_record(None, json!({"Username": "bob"}))
        .await
        .unwrap();
    assert_eq!(table.state().current_page, 1);
    assert_eq!(table.state().search_term, "ann");

    assert_eq!(
        backend.calls(),
        vec![
            format!("GET {}", users(3)),
            "PUT /users/7".to_string(),
            format!("GET {}", users(3)),
            "POST /users".to_string(),
            format!("GET {}", users(1)),
        ]
    );
    assert_eq!(backend.bodies()[1], Some(json!({"Username": "ann"})));
}

#[tokio::test]
async fn page_size_change_is_remembered_and_restarts_at_page_one() {
    let backend = Arc::new(ScriptedBackend::new().on(
        &products_url(1, 50, "bolt"),
        Ok(product_page(&["P-1"], 1, 1)),
    ));
    let sizes = SharedSizes::default();
    let mut table = TableController::new(
        TableKind::Products,
        Arc::clone(&backend),
        JsonSink::recording(),
        Box::new(sizes.clone()),
    );
    assert_eq!(table.state().page_size, 25);
    table.begin_load(4, "bolt");

    table.on_page_size_changed(50).await;
    assert_eq!(table.state().page_size, 50);
    assert_eq!(table.state().current_page, 1);
    assert_eq!(sizes.load("products"), Some(50));

    let reopened = TableController::new(
        TableKind::Products,
        Arc::clone(&backend),
        JsonSink::recording(),
        Box::new(sizes.clone()),
    );
    assert_eq!(reopened.state().page_size, 50);
}

struct ReadOnlySizes;

impl PageSizeStore for ReadOnlySizes {
    fn load(&self, _key: &str) -> Option<u32> {
        None
    }

    fn save(&mut self, _key: &str, _size: u32) -> Result<(), String> {
        Err("read-only file system".to_string())
    }
}

#[tokio::test]
async fn unsaved_page_size_still_applies() {
    let backend = Arc::new(ScriptedBackend::new().on(
        "/users?page=1&per_page=40&search=",
        Ok(Some(json!({"data": [], "total": 0}))),
    ));
    let mut table = TableController::new(
        TableKind::Users,
        Arc::clone(&backend),
        JsonSink::recording(),
        Box::new(ReadOnlySizes),
    );
    assert_eq!(table.on_page_size_changed(40).await, LoadOutcome::Empty);
    assert_eq!(table.state().page_size, 40);
    assert!(matches!(
        &table.sink().events()[0],
        SinkEvent::Notice { notice } if notice.level == NoticeLevel::Info
    ));
}

#[tokio::test]
async fn default_page_sizes_follow_table_type() {
    let backend = Arc::new(ScriptedBackend::new());
    let expected = [
        (TableKind::Products, 25),
        (TableKind::StockHistory, 15),
        (TableKind::Users, 10),
        (TableKind::Generic("PurchaseOrderDtl".to_string()), 10),
        (TableKind::Database("Orders".to_string()), 20),
    ];
    for (kind, size) in expected {
        assert_eq!(controller_for(kind, &backend).state().page_size, size);
    }
}

#[tokio::test]
async fn generic_tables_infer_columns_across_rows() {
    let backend = Arc::new(ScriptedBackend::new().on(
        "/tables/PurchaseOrderDtl/data?page=1&per_page=10&search=",
        Ok(Some(json!({
            "data": [
                {"order_id": 1, "received": true},
                {"order_id": 2, "received": null, "note": "late"}
            ],
            "total": 2,
            "page": 1
        }))),
    ));
    let mut table = controller_for(TableKind::Generic("PurchaseOrderDtl".to_string()), &backend);
    table.load(1, "").await;

    let (columns, rows) = table
        .sink()
        .events()
        .iter()
        .find_map(|e| match e {
            SinkEvent::Rows { columns, rows } => Some((columns.clone(), rows.clone())),
            _ => None,
        })
        .unwrap();
    let titles: Vec<_> = columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Order id", "Received", "Note"]);
    let first: Vec<_> = rows[0].iter().map(|c| c.text.as_str()).collect();
    assert_eq!(first, vec!["1", "Yes", "-"]);
    assert_eq!(table.state().table_identifier.as_deref(), Some("PurchaseOrderDtl"));
}

#[tokio::test]
async fn database_tables_use_server_paging_and_declared_columns() {
    let backend = Arc::new(ScriptedBackend::new().on(
        "/database/table/Orders?page=2&per_page=20",
        Ok(Some(json!({
            "data": [{"OrderID": 21, "Total": 5}],
            "columns": ["OrderID", "Customer", "Total"],
            "total": 21,
            "page": 2,
            "per_page": 20,
            "table_name": "Orders"
        }))),
    ));
    let mut table = controller_for(TableKind::Database("Orders".to_string()), &backend);
    let outcome = table.load(2, "ignored").await;
    assert_eq!(outcome, LoadOutcome::Rendered { rows: 1 });
    assert_eq!(table.state().search_term, "");
    assert_eq!(last_summary(table.sink().events()), Some((21, 21, 21)));

    let columns = table
        .sink()
        .events()
        .iter()
        .find_map(|e| match e {
            SinkEvent::Rows { columns, .. } => Some(columns.clone()),
            _ => None,
        })
        .unwrap();
    let keys: Vec<_> = columns.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["OrderID", "Customer", "Total"]);
    assert_eq!(columns[0].title, "OrderID");
}

#[tokio::test(start_paused = true)]
async fn debounced_search_issues_one_load_for_the_last_term() {
    let backend = Arc::new(
        ScriptedBackend::new().on(&products_url(1, 25, "abcd"), Ok(product_page(&["P-1"], 1, 1))),
    );
    let table = controller_for(TableKind::Products, &backend);
    let (handle, task) = spawn_table(table, Duration::from_millis(300));

    handle.search("abc").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.search("abcd").await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(backend.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.search_term, "abcd");
    assert_eq!(state.current_page, 1);

    handle.shutdown().await.unwrap();
    let table = task.await.unwrap();
    assert_eq!(backend.calls(), vec![format!("GET {}", products_url(1, 25, "abcd"))]);
    assert_eq!(table.phase(), ViewPhase::Rendered);
}

#[tokio::test(start_paused = true)]
async fn actor_renders_only_the_latest_of_overlapping_loads() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on_after(
                &products_url(1, 25, ""),
                Duration::from_millis(200),
                Ok(product_page(&["P-1"], 30, 1)),
            )
            .on_after(
                &products_url(2, 25, ""),
                Duration::from_millis(10),
                Ok(product_page(&["P-26"], 30, 2)),
            ),
    );
    let table = controller_for(TableKind::Products, &backend);
    let (handle, task) = spawn_table(table, Duration::from_millis(300));

    handle.load(1, "").await.unwrap();
    handle.select_page(2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.shutdown().await.unwrap();

    let table = task.await.unwrap();
    assert_eq!(backend.calls().len(), 2);
    assert_eq!(count_rows(table.sink().events()), 1);
    assert_eq!(last_summary(table.sink().events()), Some((26, 30, 30)));
    assert_eq!(table.last_page().map(|p| p.page), Some(2));
}

#[tokio::test(start_paused = true)]
async fn shutdown_applies_loads_still_in_flight() {
    let backend = Arc::new(ScriptedBackend::new().on_after(
        &products_url(1, 25, ""),
        Duration::from_millis(100),
        Ok(product_page(&["P-1"], 1, 1)),
    ));
    let table = controller_for(TableKind::Products, &backend);
    let (handle, task) = spawn_table(table, Duration::from_millis(300));

    handle.load(1, "").await.unwrap();
    handle.shutdown().await.unwrap();
    let table = task.await.unwrap();
    assert_eq!(table.phase(), ViewPhase::Rendered);
    assert_eq!(table.rows_on_page(), 1);

    assert_eq!(handle.refresh().await, Err(TableError::Closed));
}

#[tokio::test(start_paused = true)]
async fn next_and_previous_stay_within_bounds() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(1, 25, ""), Ok(product_page(&["P-1"], 30, 1)))
            .on(&products_url(2, 25, ""), Ok(product_page(&["P-26"], 30, 2))),
    );
    let table = controller_for(TableKind::Products, &backend);
    let (handle, task) = spawn_table(table, Duration::from_millis(300));

    handle.previous_page().await.unwrap();
    handle.load(1, "").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.next_page().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.next_page().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.snapshot().await.unwrap().current_page, 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    assert_eq!(
        backend.calls(),
        vec![
            format!("GET {}", products_url(1, 25, "")),
            format!("GET {}", products_url(2, 25, "")),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn actor_delete_replies_with_the_reload_outcome() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on(&products_url(2, 25, ""), Ok(product_page(&["P-26"], 26, 2)))
            .on("/products/P-26", Ok(None))
            .on(&products_url(1, 25, ""), Ok(product_page(&["P-1"], 25, 1))),
    );
    let table = controller_for(TableKind::Products, &backend);
    let (handle, task) = spawn_table(table, Duration::from_millis(300));

    handle.load(2, "").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let outcome = handle.delete("P-26").await.unwrap();
    assert_eq!(outcome, LoadOutcome::Rendered { rows: 1 });
    assert_eq!(handle.snapshot().await.unwrap().current_page, 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn catalogs_and_dashboard_source() {
    let backend = ScriptedBackend::new()
        .on(
            "/tables",
            Ok(Some(json!([
                {"name": "PurchaseOrderDtl", "displayName": "Purchase orders"},
                {"name": "Stock"}
            ]))),
        )
        .on("/database/tables", Ok(Some(json!(["Orders", "Customers"]))))
        .on(
            "/dashboard/set-source-table",
            Ok(Some(json!({"message": "Source set to Orders"}))),
        );

    let tables = crate::catalog::list_tables(&backend).await.unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].label(), "Purchase orders");
    assert_eq!(tables[1].label(), "Stock");

    let names = crate::catalog::list_database_tables(&backend).await.unwrap();
    assert_eq!(names, vec!["Orders".to_string(), "Customers".to_string()]);

    let message = crate::catalog::set_dashboard_source(&backend, " Orders ")
        .await
        .unwrap();
    assert_eq!(message, "Source set to Orders");
    assert_eq!(
        backend.bodies().last().cloned().flatten(),
        Some(json!({"table_name": "Orders"}))
    );
}

#[tokio::test]
async fn table_list_must_be_an_array() {
    let backend = ScriptedBackend::new().on("/tables", Ok(Some(json!({"tables": []}))));
    let err = crate::catalog::list_tables(&backend).await.unwrap_err();
    assert!(matches!(err, ApiError::Malformed { .. }));
}

#[tokio::test]
async fn kpis_fail_independently() {
    let backend = ScriptedBackend::new()
        .on("/total-revenue", Ok(Some(json!({"value": 1500.5, "trend": 0.1}))))
        .on("/net-profit", Err(ApiError::server(500, "boom")))
        .on("/total-quantity-ordered", Ok(Some(json!({"value": 40, "trend": 0}))))
        .on("/new-customers", Ok(Some(json!({"value": 3}))))
        .on("/total-quantity-received", Ok(Some(json!({"value": null}))))
        .on("/average-discount", Ok(Some(json!({"value": 0.125, "trend": -0.02}))));

    let readings = kpi::fetch_all(&backend).await;
    assert_eq!(readings.len(), KpiMetric::ALL.len());
    assert_eq!(readings[0].display_value, "฿1,500.50");
    assert_eq!(readings[0].display_trend, "+10.0%");
    assert_eq!(readings[1].display_value, "Error");
    assert_eq!(readings[1].error.as_deref(), Some("boom"));
    assert_eq!(readings[2].display_value, "40 units");
    assert_eq!(readings[3].display_trend, "-");
    assert_eq!(readings[4].display_value, "-");
    assert_eq!(readings[5].display_value, "12.5%");
}
