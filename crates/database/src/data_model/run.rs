use chrono::NaiveDateTime;
use model::{point::GeoPoint, run::Run, ModelError, WithId};
use rust_decimal::Decimal;
use sqlx::prelude::FromRow;
use utility::id::Id;

use super::{DatabaseRow, Result};

pub const RUN_COLUMNS: &str = "
    id,
    user_id,
    start_datetime,
    start_latitude,
    start_longitude,
    finish_datetime,
    finish_latitude,
    finish_longitude,
    distance
";

#[derive(Debug, Clone, FromRow)]
pub struct RunRow {
    pub id: i64,
    pub user_id: i64,
    pub start_datetime: NaiveDateTime,
    pub start_latitude: Decimal,
    pub start_longitude: Decimal,
    pub finish_datetime: Option<NaiveDateTime>,
    pub finish_latitude: Option<Decimal>,
    pub finish_longitude: Option<Decimal>,
    pub distance: Option<i32>,
}

impl DatabaseRow for RunRow {
    type Model = Run;

    fn to_model(self) -> Result<WithId<Run>> {
        let start = GeoPoint::new(self.start_datetime, self.start_latitude, self.start_longitude)?;
        let finish = match (self.finish_datetime, self.finish_latitude, self.finish_longitude) {
            (Some(datetime), Some(latitude), Some(longitude)) => {
                Some(GeoPoint::new(datetime, latitude, longitude)?)
            }
            (None, None, None) => None,
            _ => {
                return Err(ModelError::InvalidTransition(format!(
                    "run {} has an incomplete finish point",
                    self.id
                )))
            }
        };
        let run = Run::restore(Id::new(self.user_id), start, finish, self.distance)?;
        Ok(WithId::new(Id::new(self.id), run))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn row() -> RunRow {
        let start = NaiveDate::from_ymd_opt(2023, 11, 8)
            .unwrap()
            .and_hms_opt(11, 23, 34)
            .unwrap();
        RunRow {
            id: 3,
            user_id: 100,
            start_datetime: start,
            start_latitude: Decimal::new(41_644_035, 6),
            start_longitude: Decimal::new(41_633_785, 6),
            finish_datetime: None,
            finish_latitude: None,
            finish_longitude: None,
            distance: None,
        }
    }

    #[test]
    fn started_row_becomes_started_run() {
        let run = row().to_model().unwrap();
        assert_eq!(run.id, Id::new(3));
        assert!(!run.content.is_finished());
    }

    #[test]
    fn partial_finish_is_rejected() {
        let mut row = row();
        row.finish_latitude = Some(Decimal::new(41_626_743, 6));
        assert!(matches!(row.to_model(), Err(ModelError::InvalidTransition(_))));
    }
}
