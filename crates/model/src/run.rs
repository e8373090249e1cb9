use chrono::Duration;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::{decimal::round_f64_half_up, id::HasId, id::Id};

use crate::{point::GeoPoint, user::User, ExampleData, ModelError};

/// Number of fractional digits of reported speeds.
pub const SPEED_SCALE: u32 = 2;

const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Started,
    Finished,
}

/// One run of a user. A run is created in the [`RunState::Started`] state and
/// finished exactly once; finishing yields a new value.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    user_id: Id<User>,
    start_point: GeoPoint,
    finish_point: Option<GeoPoint>,
    distance: Option<i32>,
}

impl HasId for Run {
    type IdType = i64;
}

impl Run {
    pub fn started(user_id: Id<User>, start_point: GeoPoint) -> Self {
        Self {
            user_id,
            start_point,
            finish_point: None,
            distance: None,
        }
    }

    /// Rebuilds a run from its stored parts.
    pub fn restore(
        user_id: Id<User>,
        start_point: GeoPoint,
        finish_point: Option<GeoPoint>,
        distance: Option<i32>,
    ) -> Result<Self, ModelError> {
        match (&finish_point, distance) {
            (Some(finish), Some(_)) => {
                if finish.timestamp() <= start_point.timestamp() {
                    return Err(ModelError::InvalidTransition(
                        "finish datetime must be after start datetime".to_owned(),
                    ));
                }
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(ModelError::InvalidTransition(
                    "finished run without distance".to_owned(),
                ))
            }
            (None, Some(_)) => {
                return Err(ModelError::InvalidTransition(
                    "distance on a run that has not been finished".to_owned(),
                ))
            }
        }
        Ok(Self {
            user_id,
            start_point,
            finish_point,
            distance,
        })
    }

    /// Finishes the run at `finish_point`. Without an explicit distance the
    /// straight-line distance between start and finish is used.
    pub fn finish(
        &self,
        finish_point: GeoPoint,
        explicit_distance: Option<i32>,
    ) -> Result<Self, ModelError> {
        if self.finish_point.is_some() {
            return Err(ModelError::AlreadyFinished);
        }
        if finish_point.timestamp() <= self.start_point.timestamp() {
            return Err(ModelError::InvalidFinishPoint);
        }
        let distance = explicit_distance
            .unwrap_or_else(|| self.start_point.distance_to(&finish_point));
        Ok(Self {
            user_id: self.user_id,
            start_point: self.start_point.clone(),
            finish_point: Some(finish_point),
            distance: Some(distance),
        })
    }

    pub fn user_id(&self) -> Id<User> {
        self.user_id
    }

    pub fn start_point(&self) -> &GeoPoint {
        &self.start_point
    }

    pub fn finish_point(&self) -> Option<&GeoPoint> {
        self.finish_point.as_ref()
    }

    /// Distance in meters, present once the run is finished.
    pub fn distance(&self) -> Option<i32> {
        self.distance
    }

    pub fn state(&self) -> RunState {
        match self.finish_point {
            Some(_) => RunState::Finished,
            None => RunState::Started,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() == RunState::Finished
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.finish_point
            .as_ref()
            .map(|finish| finish.timestamp() - self.start_point.timestamp())
    }

    /// Unrounded average speed in km/h.
    pub fn raw_average_speed_kmh(&self) -> Option<f64> {
        let distance = self.distance?;
        let elapsed = self.elapsed()?;
        Some(speed_kmh(distance, elapsed))
    }

    /// Average speed in km/h, rounded half-up to two decimal places.
    pub fn average_speed_kmh(&self) -> Option<f64> {
        self.raw_average_speed_kmh()
            .and_then(|speed| round_f64_half_up(speed, SPEED_SCALE))
    }
}

/// Speed over whole elapsed seconds. Runs shorter than a second fall back to
/// the fractional duration.
pub(crate) fn speed_kmh(distance: i32, elapsed: Duration) -> f64 {
    let seconds = match elapsed.num_seconds() {
        0 => elapsed.num_milliseconds() as f64 / 1000.0,
        seconds => seconds as f64,
    };
    if seconds <= 0.0 {
        return 0.0;
    }
    distance as f64 / seconds * MPS_TO_KMH
}

impl ExampleData for Run {
    fn example_data() -> Self {
        let start = GeoPoint::example_data();
        let finish = GeoPoint::new(
            start.timestamp() + Duration::hours(2),
            Decimal::new(41_626_743, 6),
            Decimal::new(41_586_784, 6),
        )
        .unwrap_or_else(|_| start.clone());
        Self {
            user_id: Id::new(100),
            start_point: start,
            finish_point: Some(finish),
            distance: Some(6548),
        }
    }
}

/// Aggregate over a set of finished runs. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub count: i64,
    #[serde(rename = "distance")]
    pub total_distance_meters: i64,
    /// Mean of the average speeds of the single runs, not total distance over
    /// total time.
    #[serde(rename = "avgSpeed")]
    pub average_speed_kmh: f64,
}

impl RunStats {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds stats from raw aggregates. `mean_speed_kmh` is rounded here.
    pub fn new(count: i64, total_distance_meters: i64, mean_speed_kmh: Option<f64>) -> Self {
        if count <= 0 {
            return Self::empty();
        }
        Self {
            count,
            total_distance_meters,
            average_speed_kmh: mean_speed_kmh
                .and_then(|speed| round_f64_half_up(speed, SPEED_SCALE))
                .unwrap_or_default(),
        }
    }

    /// Aggregates the finished runs among `runs`; started runs are skipped.
    pub fn from_runs<'a, I>(runs: I) -> Self
    where
        I: IntoIterator<Item = &'a Run>,
    {
        let (count, distance, speed_sum) = runs
            .into_iter()
            .filter_map(|run| Some((run.distance?, run.raw_average_speed_kmh()?)))
            .fold((0_i64, 0_i64, 0.0_f64), |(count, distance, speeds), (d, s)| {
                (count + 1, distance + d as i64, speeds + s)
            });
        if count == 0 {
            return Self::empty();
        }
        Self::new(count, distance, Some(speed_sum / count as f64))
    }
}

impl ExampleData for RunStats {
    fn example_data() -> Self {
        Self {
            count: 187,
            total_distance_meters: 1023,
            average_speed_kmh: 4.3,
        }
    }
}
