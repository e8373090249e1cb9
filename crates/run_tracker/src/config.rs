use std::{env, str::FromStr, time::Duration};

/// How long a `run_for_update` may wait for a lock held by someone else.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Which store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown store kind '{}'", other)),
        }
    }
}

impl StoreKind {
    /// Reads `RUN_TRACKER_STORE`, defaulting to postgres.
    pub fn from_env() -> Result<Self, String> {
        match env::var("RUN_TRACKER_STORE") {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::Postgres),
        }
    }
}

/// Reads `DATABASE_LOCK_TIMEOUT_MS`.
pub fn lock_timeout_from_env() -> Duration {
    env::var("DATABASE_LOCK_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_LOCK_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_kinds() {
        assert_eq!("Memory".parse::<StoreKind>(), Ok(StoreKind::Memory));
        assert_eq!("postgres".parse::<StoreKind>(), Ok(StoreKind::Postgres));
        assert!("sqlite".parse::<StoreKind>().is_err());
    }
}
