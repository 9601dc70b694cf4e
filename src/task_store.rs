//! Client-side task state.
//!
//! [`TaskStore`] holds the signed-in user's tasks exactly as the last feed
//! snapshot delivered them and derives the filtered views from that. It never
//! edits the list itself; a write only shows up once the feed pushes again.

use futures::stream::{BoxStream, StreamExt};

use crate::error::FetchError;
use crate::fields::{Category, Status};
use crate::store::{DocumentStore, Query};
use crate::task::{Task, TASKS_COLLECTION};
use std::sync::Arc;

/// Active search text and category filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub search_query: String,
    pub category: Option<Category>,
}

impl Filters {
    /// Case-insensitive title substring match plus exact category match.
    /// An empty query and an unset category both match everything.
    pub fn matches(&self, task: &Task) -> bool {
        let query = self.search_query.to_lowercase();
        let title_ok = query.is_empty() || task.title.to_lowercase().contains(&query);
        let category_ok = self.category.is_none_or(|c| c == task.category);
        title_ok && category_ok
    }

    pub fn is_searching(&self) -> bool {
        !self.search_query.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
    filters: Filters,
    loading: bool,
    error: Option<FetchError>,
}

impl Default for TaskStore {
    fn default() -> Self {
        TaskStore::new()
    }
}

impl TaskStore {
    /// Empty store waiting for its first snapshot.
    pub fn new() -> Self {
        TaskStore { tasks: Vec::new(), filters: Filters::default(), loading: true, error: None }
    }

    /// Replace the whole list with a fresh snapshot.
    pub fn apply_snapshot(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.loading = false;
        self.error = None;
    }

    pub fn fail(&mut self, error: FetchError) {
        tracing::error!(%error, "task feed failed");
        self.loading = false;
        self.error = Some(error);
    }

    pub fn set_search_query(&mut self, text: impl Into<String>) {
        self.filters.search_query = text.into();
    }

    pub fn set_category(&mut self, category: Option<Category>) {
        self.filters.category = category;
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Every task of the last snapshot, in feed order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filtered(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| self.filters.matches(t))
    }

    /// Tasks with `status` that pass the filters, in feed order.
    pub fn tasks_by_status(&self, status: Status) -> Vec<&Task> {
        self.filtered().filter(|t| t.status == status).collect()
    }

    pub fn has_results(&self) -> bool {
        self.filtered().next().is_some()
    }

    /// The views give way to a "no results" panel while a search finds nothing.
    pub fn shows_not_found(&self) -> bool {
        self.filters.is_searching() && !self.has_results()
    }
}

/// Stream of task snapshots for `user_id`.
///
/// Nothing happens until the stream is polled; dropping it ends the
/// subscription, and calling this again starts a fresh one. Documents that
/// do not parse as tasks are skipped.
pub fn subscribe(
    store: Arc<dyn DocumentStore>,
    user_id: &str,
) -> BoxStream<'static, Result<Vec<Task>, FetchError>> {
    let uid = user_id.to_string();
    tracing::debug!(%uid, "subscribing to tasks");
    store
        .watch(Query::eq(TASKS_COLLECTION, "userId", uid.as_str()))
        .map(move |snapshot| {
            let docs = snapshot?;
            let tasks = docs
                .iter()
                .filter_map(|doc| match Task::from_document(doc) {
                    Ok(task) if task.user_id == uid => Some(task),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed task document");
                        None
                    }
                })
                .collect();
            Ok(tasks)
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::LocalDocumentStore;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn task(id: &str, title: &str, category: Category, status: Status) -> Task {
        let at = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        Task {
            id: id.into(),
            user_id: "u1".into(),
            title: title.into(),
            description: None,
            category,
            dueon: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            status,
            is_completed: status.is_completed(),
            image_url: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn ids(tasks: Vec<&Task>) -> Vec<String> {
        tasks.into_iter().map(|t| t.id.clone()).collect()
    }

    fn loaded() -> TaskStore {
        let mut store = TaskStore::new();
        store.apply_snapshot(vec![
            task("a", "Buy milk", Category::Personal, Status::ToDo),
            task("b", "Write report", Category::Work, Status::ToDo),
            task("c", "Review PR", Category::Work, Status::InProgress),
            task("d", "Call mum", Category::Personal, Status::Completed),
        ]);
        store
    }

    #[test]
    fn starts_loading_until_first_snapshot() {
        let mut store = TaskStore::new();
        assert!(store.is_loading());
        store.apply_snapshot(Vec::new());
        assert!(!store.is_loading());
        assert!(!store.has_results());
        assert!(!store.shows_not_found());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut store = loaded();
        store.set_search_query("WRI");
        assert_eq!(ids(store.tasks_by_status(Status::ToDo)), vec!["b"]);
        assert!(store.tasks_by_status(Status::InProgress).is_empty());
    }

    #[test]
    fn whitespace_in_query_is_part_of_the_match() {
        let mut store = TaskStore::new();
        store.apply_snapshot(vec![
            task("a", "Buy milk", Category::Personal, Status::ToDo),
            task("b", "Groceries", Category::Personal, Status::ToDo),
        ]);
        store.set_search_query(" ");
        assert_eq!(ids(store.tasks_by_status(Status::ToDo)), vec!["a"]);

        store.set_search_query("milk ");
        assert!(!store.has_results());
        assert!(store.shows_not_found());
    }

    #[test]
    fn clearing_search_restores_category_view() {
        let mut store = loaded();
        store.set_category(Some(Category::Work));
        let before = ids(store.tasks_by_status(Status::ToDo));

        store.set_search_query("zzz");
        assert!(store.shows_not_found());
        store.set_search_query("");
        assert_eq!(ids(store.tasks_by_status(Status::ToDo)), before);
        assert_eq!(before, vec!["b"]);
    }

    #[test]
    fn status_partition_respects_filters() {
        let mut store = loaded();
        store.set_category(Some(Category::Personal));
        store.set_search_query("m");
        for status in Status::ALL {
            for t in store.tasks() {
                let listed = store.tasks_by_status(status).iter().any(|x| x.id == t.id);
                let expected = t.status == status && store.filters().matches(t);
                assert_eq!(listed, expected, "task {} in {status}", t.id);
            }
        }
    }

    #[test]
    fn snapshot_replaces_list_and_keeps_feed_order() {
        let mut store = loaded();
        store.apply_snapshot(vec![
            task("z", "Zebra", Category::Work, Status::ToDo),
            task("y", "Yak", Category::Work, Status::ToDo),
        ]);
        assert_eq!(ids(store.tasks_by_status(Status::ToDo)), vec!["z", "y"]);
        assert!(store.get("a").is_none());
    }

    #[test]
    fn failure_is_kept_until_next_snapshot() {
        let mut store = TaskStore::new();
        store.fail(StoreError::Feed("offline".into()).into());
        assert!(store.error().is_some());
        assert!(!store.is_loading());
        store.apply_snapshot(Vec::new());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn subscribe_skips_malformed_and_foreign_documents() {
        let dir = tempfile::tempdir().unwrap();
        let docs = Arc::new(LocalDocumentStore::open(&dir.path().join("db.json")).unwrap());
        let good = task("", "Buy milk", Category::Personal, Status::ToDo).to_fields().unwrap();
        docs.add(TASKS_COLLECTION, good).await.unwrap();
        let broken = json!({"userId": "u1", "title": "x", "status": "LATER"});
        docs.add(TASKS_COLLECTION, broken.as_object().unwrap().clone()).await.unwrap();
        let mut other = task("", "Not mine", Category::Work, Status::ToDo);
        other.user_id = "u2".into();
        docs.add(TASKS_COLLECTION, other.to_fields().unwrap()).await.unwrap();

        let store: Arc<dyn DocumentStore> = docs;
        let mut feed = subscribe(store, "u1");
        let tasks = feed.next().await.unwrap().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy milk");
        assert!(!tasks[0].id.is_empty());
    }
}
