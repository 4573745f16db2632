#![forbid(unsafe_code)]

//! Filter, sort and paginate a user's tasks into the page a view shows.
//!
//! Everything here is a pure function of its inputs: the task slice is only
//! borrowed, and equal inputs always produce equal output.

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::task::model::Task;

pub const DEFAULT_PAGE_SIZE: NonZeroUsize = NonZeroUsize::new(5).unwrap();

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl FilterParams {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_none() && self.search_needle().is_none()
    }

    fn search_needle(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Title,
    Description,
    Completed,
    CreatedAt,
    UpdatedAt,
    UserId,
}

impl SortField {
    pub const ALL: [Self; 7] = [
        Self::Id,
        Self::Title,
        Self::Description,
        Self::Completed,
        Self::CreatedAt,
        Self::UpdatedAt,
        Self::UserId,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Description => "description",
            Self::Completed => "completed",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::UserId => "user_id",
        }
    }

    /// Ascending order of the two tasks' values for this field.
    #[must_use]
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Title => a.title.cmp(&b.title),
            Self::Description => a.description.cmp(&b.description),
            Self::Completed => a.completed.cmp(&b.completed),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::UserId => a.user_id.cmp(&b.user_id),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the camelCase spellings used in stored records too.
        let norm = match s.trim() {
            "createdAt" | "created" => "created_at",
            "updatedAt" | "updated" => "updated_at",
            "userId" | "user" => "user_id",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == norm)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|f| f.as_str()).collect();
                format!("unknown sort field '{s}' (one of: {})", allowed.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("expected asc|desc, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortParams {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortParams {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortParams {
    #[must_use]
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    #[must_use]
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ord = self.field.compare(a, b);
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: NonZeroUsize,
    pub limit: NonZeroUsize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: NonZeroUsize::MIN,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    #[must_use]
    pub fn new(page: NonZeroUsize, limit: NonZeroUsize) -> Self {
        Self { page, limit }
    }

    #[must_use]
    pub fn first_page(limit: NonZeroUsize) -> Self {
        Self {
            page: NonZeroUsize::MIN,
            limit,
        }
    }

    /// Index of the first item on this page; saturates instead of overflowing.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.get() - 1).saturating_mul(self.limit.get())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskView {
    pub tasks: Vec<Task>,
    /// Number of tasks matching the filter, before pagination.
    pub total: usize,
}

#[must_use]
pub fn matches(task: &Task, filter: &FilterParams) -> bool {
    if let Some(completed) = filter.completed
        && task.completed != completed
    {
        return false;
    }
    if let Some(needle) = filter.search_needle()
        && !task.title.to_lowercase().contains(&needle.to_lowercase())
    {
        return false;
    }
    true
}

/// Filtered tasks in display order, before pagination.
#[must_use]
pub fn filter_and_sort<'a>(
    tasks: &'a [Task],
    filter: &FilterParams,
    sort: &SortParams,
) -> Vec<&'a Task> {
    let mut out: Vec<&Task> = tasks.iter().filter(|t| matches(t, filter)).collect();
    // `sort_by` is stable: equal keys keep their incoming order.
    out.sort_by(|a, b| sort.compare(a, b));
    out
}

#[must_use]
pub fn derive_view(
    tasks: &[Task],
    filter: &FilterParams,
    sort: &SortParams,
    pagination: &Pagination,
) -> TaskView {
    let ordered = filter_and_sort(tasks, filter, sort);
    let total = ordered.len();
    let tasks = ordered
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.limit.get())
        .cloned()
        .collect();
    TaskView { tasks, total }
}

#[must_use]
pub fn page_count(total: usize, limit: NonZeroUsize) -> usize {
    total.div_ceil(limit.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use time::macros::datetime;

    fn task(id: &str, title: &str, completed: bool, created_at: OffsetDateTime) -> Task {
        Task {
            id: id.to_owned(),
            title: title.to_owned(),
            description: String::new(),
            completed,
            created_at,
            updated_at: created_at,
            user_id: "u1".to_owned(),
        }
    }

    fn numbered(n: usize) -> Vec<Task> {
        let base = datetime!(2024-01-01 00:00 UTC);
        (0..n)
            .map(|i| {
                task(
                    &format!("t{i:02}"),
                    &format!("Task {i}"),
                    i % 3 == 0,
                    base + time::Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    fn page(n: usize, limit: usize) -> Pagination {
        Pagination::new(
            NonZeroUsize::new(n).unwrap(),
            NonZeroUsize::new(limit).unwrap(),
        )
    }

    #[test]
    fn completed_filter_keeps_only_matching_tasks() {
        let tasks = numbered(10);
        let filter = FilterParams {
            completed: Some(true),
            search: None,
        };
        let view = derive_view(&tasks, &filter, &SortParams::default(), &page(1, 50));
        assert_eq!(view.total, 4);
        assert!(view.tasks.iter().all(|t| t.completed));

        let filter = FilterParams {
            completed: Some(false),
            search: None,
        };
        let view = derive_view(&tasks, &filter, &SortParams::default(), &page(1, 50));
        assert_eq!(view.total, 6);
        assert!(view.tasks.iter().all(|t| !t.completed));
    }

    #[test]
    fn search_is_case_insensitive_literal_substring() {
        let at = datetime!(2024-01-01 00:00 UTC);
        let tasks = vec![
            task("a", "Buy MILK", false, at),
            task("b", "milkshake recipe", true, at),
            task("c", "Walk the dog", false, at),
            task("d", "m.lk", false, at),
        ];
        let filter = FilterParams {
            completed: None,
            search: Some("Milk".to_owned()),
        };
        let view = derive_view(&tasks, &filter, &SortParams::default(), &page(1, 10));
        let ids: Vec<&str> = view.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        for t in &view.tasks {
            assert!(t.title.to_lowercase().contains("milk"));
        }

        let filter = FilterParams {
            completed: Some(false),
            search: Some("milk".to_owned()),
        };
        let view = derive_view(&tasks, &filter, &SortParams::default(), &page(1, 10));
        assert_eq!(view.total, 1);
        assert_eq!(view.tasks[0].id, "a");
    }

    #[test]
    fn empty_search_is_no_constraint() {
        let tasks = numbered(4);
        let filter = FilterParams {
            completed: None,
            search: Some(String::new()),
        };
        assert!(filter.is_empty());
        let view = derive_view(&tasks, &filter, &SortParams::default(), &page(1, 10));
        assert_eq!(view.total, 4);
    }

    #[test]
    fn sorted_sequence_is_monotonic_in_both_directions() {
        let mut tasks = numbered(9);
        tasks.swap(0, 5);
        tasks.swap(2, 7);
        for field in SortField::ALL {
            let asc = SortParams::new(field, SortDirection::Asc);
            let ordered = filter_and_sort(&tasks, &FilterParams::default(), &asc);
            assert!(
                ordered
                    .windows(2)
                    .all(|w| field.compare(w[0], w[1]) != Ordering::Greater),
                "{field} asc"
            );

            let desc = SortParams::new(field, SortDirection::Desc);
            let ordered = filter_and_sort(&tasks, &FilterParams::default(), &desc);
            assert!(
                ordered
                    .windows(2)
                    .all(|w| field.compare(w[0], w[1]) != Ordering::Less),
                "{field} desc"
            );
        }
    }

    #[test]
    fn ties_keep_encounter_order() {
        let at = datetime!(2024-01-01 00:00 UTC);
        let tasks = vec![
            task("z", "same", false, at),
            task("a", "same", false, at),
            task("m", "same", false, at),
        ];
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let sort = SortParams::new(SortField::Title, direction);
            let ids: Vec<&str> = filter_and_sort(&tasks, &FilterParams::default(), &sort)
                .iter()
                .map(|t| t.id.as_str())
                .collect();
            assert_eq!(ids, ["z", "a", "m"]);
        }
    }

    #[test]
    fn created_at_desc_puts_newest_first() {
        let t1 = datetime!(2024-01-01 08:00 UTC);
        let t2 = datetime!(2024-01-01 09:00 UTC);
        let tasks = vec![task("a", "first", false, t1), task("b", "second", false, t2)];
        let sort = SortParams::new(SortField::CreatedAt, SortDirection::Desc);
        let view = derive_view(&tasks, &FilterParams::default(), &sort, &page(1, 5));
        let ids: Vec<&str> = view.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn pagination_boundaries() {
        let tasks = numbered(12);
        let filter = FilterParams::default();
        let sort = SortParams::default();

        let sizes: Vec<(usize, usize)> = (1..=4)
            .map(|p| {
                let v = derive_view(&tasks, &filter, &sort, &page(p, 5));
                (v.tasks.len(), v.total)
            })
            .collect();
        assert_eq!(sizes, [(5, 12), (5, 12), (2, 12), (0, 12)]);
        assert_eq!(page_count(12, NonZeroUsize::new(5).unwrap()), 3);
        assert_eq!(page_count(0, NonZeroUsize::new(5).unwrap()), 0);

        let far = derive_view(&tasks, &filter, &sort, &page(usize::MAX, usize::MAX));
        assert!(far.tasks.is_empty());
        assert_eq!(far.total, 12);
    }

    #[test]
    fn derivation_is_pure_and_repeatable() {
        let tasks = numbered(7);
        let before = tasks.clone();
        let filter = FilterParams {
            completed: Some(false),
            search: Some("task".to_owned()),
        };
        let sort = SortParams::new(SortField::Title, SortDirection::Asc);
        let first = derive_view(&tasks, &filter, &sort, &page(1, 3));
        let second = derive_view(&tasks, &filter, &sort, &page(1, 3));
        assert_eq!(first, second);
        assert_eq!(tasks, before);
    }

    #[test]
    fn parses_sort_fields_and_directions() {
        assert_eq!("createdAt".parse::<SortField>(), Ok(SortField::CreatedAt));
        assert_eq!("title".parse::<SortField>(), Ok(SortField::Title));
        assert!("priority".parse::<SortField>().is_err());
        assert_eq!("desc".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert!("down".parse::<SortDirection>().is_err());
    }
}
