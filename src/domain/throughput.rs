use chrono::NaiveDate;

/// Demands finished in the period ending at `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throughput {
    pub date: NaiveDate,
    pub completed_demands: usize,
}
