use model::run::RunStats;
use rust_decimal::{prelude::ToPrimitive as _, Decimal};
use sqlx::prelude::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RunStatsRow {
    pub count: i64,
    pub distance: Option<i64>,
    /// Mean of the per-run average speeds in km/h, not rounded yet.
    pub mean_speed_kmh: Option<Decimal>,
}

impl RunStatsRow {
    pub fn to_model(self) -> RunStats {
        RunStats::new(
            self.count,
            self.distance.unwrap_or_default(),
            self.mean_speed_kmh.and_then(|speed| speed.to_f64()),
        )
    }
}
