pub mod date_time {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize as _, Deserializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    /// Accepts `YYYY-MM-DDTHH:MM:SS` with optional fractional seconds.
    pub fn parse_naive(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s, FORMAT).or_else(|_| s.parse::<NaiveDateTime>())
    }

    pub fn deserialize_naive<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_naive(&s).map_err(Error::custom)
    }

    pub fn deserialize_naive_option<'de, D>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_naive(&s).map(Some).map_err(Error::custom),
            None => Ok(None),
        }
    }

}
