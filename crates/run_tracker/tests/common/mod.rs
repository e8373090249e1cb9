#![allow(dead_code)]

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use model::{
    point::GeoPoint,
    user::{Sex, User},
    WithId,
};
use run_tracker::{client::Client, memory::MemoryDatabase};
use rust_decimal::Decimal;

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
}

pub fn point(datetime: NaiveDateTime, latitude: &str, longitude: &str) -> GeoPoint {
    GeoPoint::new(
        datetime,
        Decimal::from_str(latitude).unwrap(),
        Decimal::from_str(longitude).unwrap(),
    )
    .unwrap()
}

pub fn client() -> Client<MemoryDatabase> {
    let _ = env_logger::builder().is_test(true).try_init();
    Client::new(MemoryDatabase::new())
}

pub async fn runner(client: &Client<MemoryDatabase>) -> WithId<User> {
    let user = User::new(
        "John",
        "Smith",
        NaiveDate::from_ymd_opt(1985, 8, 2).unwrap(),
        Sex::Male,
    )
    .unwrap();
    client.create_user(user).await.unwrap()
}
