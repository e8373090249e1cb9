use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::HasId;

use crate::{ExampleData, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sex {
    Male,
    Female,
    Nonbinary,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "MALE",
            Sex::Female => "FEMALE",
            Sex::Nonbinary => "NONBINARY",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Sex::Male),
            "FEMALE" => Ok(Sex::Female),
            "NONBINARY" => Ok(Sex::Nonbinary),
            other => Err(ModelError::InvalidUser(format!("unknown sex {}", other))),
        }
    }
}

/// A registered runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", try_from = "RawUser")]
pub struct User {
    first_name: String,
    last_name: String,
    birth_date: NaiveDate,
    sex: Sex,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    first_name: String,
    last_name: String,
    birth_date: NaiveDate,
    sex: Sex,
}

impl TryFrom<RawUser> for User {
    type Error = ModelError;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        User::new(raw.first_name, raw.last_name, raw.birth_date, raw.sex)
    }
}

impl HasId for User {
    type IdType = i64;
}

impl User {
    pub fn new<F, L>(
        first_name: F,
        last_name: L,
        birth_date: NaiveDate,
        sex: Sex,
    ) -> Result<Self, ModelError>
    where
        F: Into<String>,
        L: Into<String>,
    {
        let first_name = first_name.into();
        let last_name = last_name.into();
        if first_name.trim().is_empty() {
            return Err(ModelError::InvalidUser("first name is empty".to_owned()));
        }
        if last_name.trim().is_empty() {
            return Err(ModelError::InvalidUser("last name is empty".to_owned()));
        }
        Ok(Self {
            first_name,
            last_name,
            birth_date,
            sex,
        })
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    /// Ordering used when listing users.
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.last_name, &self.first_name)
    }
}

impl ExampleData for User {
    fn example_data() -> Self {
        Self {
            first_name: "John".to_owned(),
            last_name: "Smith".to_owned(),
            birth_date: NaiveDate::from_ymd_opt(1985, 8, 2).unwrap_or_default(),
            sex: Sex::Male,
        }
    }
}
