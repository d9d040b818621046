//! Forward/backward pagination equivalence over a deterministic dataset.
//!
//! Requesting all items via repeated forward pages of size `k` (following
//! `endCursor`) must yield the same ordered sequence as requesting them via
//! repeated backward pages of size `k` (following `startCursor`), for every
//! `1 <= k <= N`. The dataset deliberately repeats sort values so the
//! identity tie-break is load-bearing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{MockBackend, MockDoc};
use dory::cursor::{SortClause, SortSpec};
use dory::executor::{ExecutionContext, QueryExecutor};
use dory::pagination::PageArgs;
use dory::plan::{DecodeContext, FieldPlan};
use dory::request::QueryRequest;

const SCORES: [i64; 12] = [3, 1, 2, 3, 2, 1, 3, 2, 1, 3, 2, 1];

fn dataset() -> Vec<MockDoc> {
    SCORES
        .iter()
        .enumerate()
        .map(|(i, score)| {
            MockDoc::new(
                "items",
                &format!("d{:02}", i + 1),
                json!({"score": score, "name": format!("item {}", i + 1)}),
            )
        })
        .collect()
}

/// Ground truth: score descending, id ascending.
fn expected_order() -> Vec<String> {
    let mut docs: Vec<(i64, String)> = SCORES
        .iter()
        .enumerate()
        .map(|(i, score)| (*score, format!("d{:02}", i + 1)))
        .collect();
    docs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    docs.into_iter().map(|(_, id)| id).collect()
}

fn plan(page: PageArgs) -> FieldPlan {
    FieldPlan::new("items")
        .sort(SortSpec::new().then(SortClause::desc("score")))
        .page(page)
}

async fn fetch_page(
    executor: &QueryExecutor,
    page: PageArgs,
) -> dory::pagination::Connection<dory::response::TypedDocument> {
    let ctx = ExecutionContext::new(Duration::from_secs(5));
    let decode = DecodeContext::new();
    let request = QueryRequest::build(
        &plan(page),
        vec!["items".to_string()],
        &decode,
        ctx.deadline(),
    )
    .unwrap();
    let response = executor.execute(&request, &ctx, &decode).await.unwrap();
    response
        .into_connection(&request.window, &request.sort)
        .unwrap()
}

async fn traverse_forward(executor: &QueryExecutor, k: usize) -> Vec<String> {
    let mut after: Option<String> = None;
    let mut out = Vec::new();
    loop {
        let connection = fetch_page(executor, PageArgs::forward(k, after.clone())).await;
        out.extend(connection.nodes.iter().map(|n| n.id.clone()));
        if connection.page_info.has_next_page {
            after = connection.page_info.end_cursor.clone();
            assert!(after.is_some());
        } else {
            break;
        }
    }
    out
}

async fn traverse_backward(executor: &QueryExecutor, k: usize) -> Vec<String> {
    let mut before: Option<String> = None;
    let mut out: Vec<String> = Vec::new();
    loop {
        let connection = fetch_page(executor, PageArgs::backward(k, before.clone())).await;
        let mut page: Vec<String> = connection.nodes.iter().map(|n| n.id.clone()).collect();
        page.extend(out);
        out = page;
        if connection.page_info.has_previous_page {
            before = connection.page_info.start_cursor.clone();
            assert!(before.is_some());
        } else {
            break;
        }
    }
    out
}

#[tokio::test]
async fn test_forward_and_backward_traversals_agree_for_every_page_size() {
    let executor = QueryExecutor::new(Arc::new(MockBackend::new(dataset())));
    let expected = expected_order();

    for k in 1..=SCORES.len() {
        let forward = traverse_forward(&executor, k).await;
        let backward = traverse_backward(&executor, k).await;

        assert_eq!(forward, expected, "forward traversal diverged at k={k}");
        assert_eq!(backward, expected, "backward traversal diverged at k={k}");
    }
}

#[tokio::test]
async fn test_page_boundaries_report_neighbors() {
    let executor = QueryExecutor::new(Arc::new(MockBackend::new(dataset())));

    let first_page = fetch_page(&executor, PageArgs::forward(5, None)).await;
    assert_eq!(first_page.nodes.len(), 5);
    assert!(first_page.page_info.has_next_page);
    assert!(!first_page.page_info.has_previous_page);

    let second_page = fetch_page(
        &executor,
        PageArgs::forward(5, first_page.page_info.end_cursor.clone()),
    )
    .await;
    assert_eq!(second_page.nodes.len(), 5);
    assert!(second_page.page_info.has_next_page);
    assert!(second_page.page_info.has_previous_page);

    let last_page = fetch_page(
        &executor,
        PageArgs::forward(5, second_page.page_info.end_cursor.clone()),
    )
    .await;
    assert_eq!(last_page.nodes.len(), 2);
    assert!(!last_page.page_info.has_next_page);
    assert!(last_page.page_info.has_previous_page);

    let tail = fetch_page(&executor, PageArgs::backward(4, None)).await;
    assert_eq!(tail.nodes.len(), 4);
    assert!(!tail.page_info.has_next_page);
    assert!(tail.page_info.has_previous_page);
}

#[tokio::test]
async fn test_total_count_spans_all_pages() {
    let executor = QueryExecutor::new(Arc::new(MockBackend::new(dataset())));
    let ctx = ExecutionContext::new(Duration::from_secs(5));
    let decode = DecodeContext::new();

    let counted = plan(PageArgs::forward(3, None)).with_total_count();
    let request = QueryRequest::build(
        &counted,
        vec!["items".to_string()],
        &decode,
        ctx.deadline(),
    )
    .unwrap();
    let response = executor.execute(&request, &ctx, &decode).await.unwrap();
    assert_eq!(response.total_count().unwrap(), SCORES.len() as u64);
}
