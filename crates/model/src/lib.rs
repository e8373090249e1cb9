use std::fmt::Debug;

use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::Serialize;
pub use serde_with;
use thiserror::Error;
use utility::id::{HasId, Id};

pub mod point;
pub mod run;
pub mod user;

pub trait ExampleData {
    fn example_data() -> Self;
}

/// Violations of the invariants of the model types. Every value of this crate
/// is checked once, when it is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("{name} {value} is out of range [{min}, {max}]")]
    InvalidCoordinate {
        name: &'static str,
        value: String,
        min: i32,
        max: i32,
    },
    #[error("finish datetime must be after start datetime")]
    InvalidFinishPoint,
    #[error("run has already been finished")]
    AlreadyFinished,
    #[error("invalid run: {0}")]
    InvalidTransition(String),
    #[error("invalid user: {0}")]
    InvalidUser(String),
}

/// Inclusive bounds on the start datetime of runs. Missing bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartRange {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl StartRange {
    pub fn new(from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, datetime: &NaiveDateTime) -> bool {
        self.from.map_or(true, |from| *datetime >= from)
            && self.to.map_or(true, |to| *datetime <= to)
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WithId<V>
where
    V: HasId,
    V::IdType: Serialize + Debug + Clone,
{
    pub id: Id<V>,
    #[serde(flatten)]
    pub content: V,
}

impl<V> WithId<V>
where
    V: HasId,
    V::IdType: Serialize + Debug + Clone,
{
    pub fn new(id: Id<V>, content: V) -> Self {
        Self { id, content }
    }
}

impl<V> PartialEq for WithId<V>
where
    V: HasId + PartialEq,
    V::IdType: Serialize + Debug + Clone + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.content == other.content
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 11, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn start_range_bounds_are_inclusive() {
        let range = StartRange::new(Some(at(1, 0)), Some(at(30, 23)));
        assert!(range.contains(&at(1, 0)));
        assert!(range.contains(&at(30, 23)));
        assert!(!range.contains(&at(30, 23).checked_add_signed(chrono::Duration::seconds(1)).unwrap()));
        assert!(StartRange::unbounded().contains(&at(15, 12)));
        assert!(StartRange::new(None, Some(at(2, 0))).contains(&at(1, 0)));
        assert!(!StartRange::new(Some(at(2, 0)), None).contains(&at(1, 0)));
    }

    #[test]
    fn with_id_compares_id_and_content() {
        let start = point::GeoPoint::from_degrees(at(1, 8), 41.644035, 41.633785).unwrap();
        let run = run::Run::started(Id::new(1), start);

        assert_eq!(WithId::new(Id::new(7), run.clone()), WithId::new(Id::new(7), run.clone()));
        assert_ne!(WithId::new(Id::new(7), run.clone()), WithId::new(Id::new(8), run));
    }
}
