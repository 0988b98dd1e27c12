//! Wall-clock timestamps in the `YYYY-MM-DD HH:MM:SS` shape every TPC-C
//! datetime column carries.

use baler_core::types::DATETIME_LEN;
use chrono::Local;

pub struct Clock;

impl Clock {
    pub fn now_string() -> String {
        let s = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        debug_assert_eq!(s.len(), DATETIME_LEN);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let s = Clock::now_string();
        assert_eq!(s.len(), DATETIME_LEN);
        assert_eq!(s.as_bytes()[4], b'-');
        assert_eq!(s.as_bytes()[10], b' ');
        assert_eq!(s.as_bytes()[13], b':');
    }
}
