use std::sync::Arc;

/// Source of the `HH:MM` string stamped on each snapshot.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Current local wall-clock time as `HH:MM`.
pub fn local_hhmm() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

/// Clock backed by [`local_hhmm`].
pub fn local_clock() -> Clock {
    Arc::new(local_hhmm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_time_is_hh_mm() {
        let now = local_hhmm();
        let (hours, minutes) = now.split_once(':').unwrap();
        assert_eq!((hours.len(), minutes.len()), (2, 2));
        assert!(hours.parse::<u8>().unwrap() < 24);
        assert!(minutes.parse::<u8>().unwrap() < 60);
    }
}
