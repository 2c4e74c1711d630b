use std::sync::Arc;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use crate::entities::{Counter, PeriodCount, StatisticType};

/// Visits and image views counted since the last flush, one entry per
/// statistics period. Counting only touches this map, never the catalog.
#[derive(Debug, Clone, Default)]
pub struct StatisticsBuffer {
    counts: Arc<DashMap<(StatisticType, NaiveDate), PeriodCount>>,
}

impl StatisticsBuffer {
    pub fn add(&self, counter: Counter, at: DateTime<Utc>) {
        for kind in StatisticType::ALL {
            let date = kind.period_start(at);
            self.counts.entry((kind, date))
                .or_insert_with(|| PeriodCount::new(kind, date))
                .add(counter);
        }
    }

    /// Removes and returns everything counted so far.
    pub fn take(&self) -> Vec<PeriodCount> {
        let keys = self.counts.iter().map(|x| *x.key()).collect::<Vec<_>>();
        keys.into_iter()
            .filter_map(|key| self.counts.remove(&key).map(|(_, count)| count))
            .collect()
    }

    /// Puts back counts that could not be stored.
    pub fn restore(&self, counts: Vec<PeriodCount>) {
        for count in counts {
            self.counts.entry((count.kind, count.date))
                .or_insert_with(|| PeriodCount::new(count.kind, count.date))
                .merge(&count);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use super::*;

    #[test]
    fn counts_into_every_period() {
        let buffer = StatisticsBuffer::default();
        let at = Utc.with_ymd_and_hms(2026, 10, 21, 8, 30, 0).unwrap();
        buffer.add(Counter::Visits, at);
        buffer.add(Counter::Visits, at);
        buffer.add(Counter::ImageViews, at);

        let mut counts = buffer.take();
        counts.sort_by_key(|x| x.kind.as_str());
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].kind, StatisticType::Daily);
        assert_eq!(counts[0].date, at.date_naive());
        assert_eq!(counts[1].kind, StatisticType::Monthly);
        assert_eq!(counts[1].date.to_string(), "2026-10-01");
        assert_eq!(counts[2].date.to_string(), "2026-10-19");
        assert!(counts.iter().all(|x| x.visits == 2 && x.image_views == 1));
        assert!(buffer.take().is_empty());
    }

    #[test]
    fn restore_merges_with_new_counts() {
        let buffer = StatisticsBuffer::default();
        let at = Utc.with_ymd_and_hms(2026, 10, 21, 8, 30, 0).unwrap();
        buffer.add(Counter::Visits, at);
        let taken = buffer.take();
        buffer.add(Counter::ImageViews, at);
        buffer.restore(taken);

        let counts = buffer.take();
        assert_eq!(counts.len(), 3);
        assert!(counts.iter().all(|x| x.visits == 1 && x.image_views == 1));
    }
}
