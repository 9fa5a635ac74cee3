use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) const TIMESTAMP_SIZE: usize = 8;

/// Wall-clock instant in nanoseconds since the Unix epoch, as embedded in echo request payloads.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp::from(SystemTime::now())
    }

    pub fn to_be_bytes(self) -> [u8; TIMESTAMP_SIZE] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; TIMESTAMP_SIZE]) -> Self {
        Timestamp(i64::from_be_bytes(bytes))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` lies in the future.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        match u64::try_from(self.0.saturating_sub(earlier.0)) {
            Ok(nanos) => Duration::from_nanos(nanos),
            Err(_) => Duration::ZERO,
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(since_epoch) => i64::try_from(since_epoch.as_nanos()).unwrap_or(i64::MAX),
            Err(e) => i64::try_from(e.duration().as_nanos()).map_or(i64::MIN, |n| -n),
        };
        Timestamp(nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_big_endian() {
        let timestamp = Timestamp(0x0102_0304_0506_0708);
        assert_eq!([1, 2, 3, 4, 5, 6, 7, 8], timestamp.to_be_bytes());
    }

    #[test]
    fn round_trips_through_bytes() {
        let timestamp = Timestamp::now();
        assert_eq!(timestamp, Timestamp::from_be_bytes(timestamp.to_be_bytes()));
    }

    #[test]
    fn duration_since_saturates() {
        let earlier = Timestamp(1_000);
        let later = Timestamp(1_500);
        assert_eq!(Duration::from_nanos(500), later.saturating_duration_since(earlier));
        assert_eq!(Duration::ZERO, earlier.saturating_duration_since(later));
    }

    #[test]
    fn from_system_time() {
        let time = UNIX_EPOCH + Duration::from_secs(3);
        assert_eq!(Timestamp(3_000_000_000), Timestamp::from(time));
    }
}
