use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

pub const WORKING_HOURS_PER_DAY: f64 = 6.0;

pub fn beginning_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    beginning_of_day(date) + Duration::seconds(86_399)
}

/// Weeks start on Monday.
pub fn beginning_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    beginning_of_week(date) + Duration::days(6)
}

pub fn beginning_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// End-of-week dates from the week of `start` through the week of `end`,
/// inclusive. Empty when either bound is missing or `start > end`.
pub fn weeks_between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<NaiveDate> {
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    if start > end {
        return Vec::new();
    }

    let last = end_of_week(end);
    let mut current = end_of_week(start);
    let mut weeks = Vec::new();
    while current <= last {
        weeks.push(current);
        current += Duration::weeks(1);
    }
    weeks
}

/// End-of-month dates from the month of `start` through the month of `end`.
pub fn months_between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<NaiveDate> {
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    if start > end {
        return Vec::new();
    }

    let last = end_of_month(end);
    let mut current = end_of_month(start);
    let mut months = Vec::new();
    while current <= last {
        months.push(current);
        match current.succ_opt() {
            Some(next_month_start) => current = end_of_month(next_month_start),
            None => break,
        }
    }
    months
}

/// Weekdays strictly between the two instants, both endpoint days excluded.
/// Argument order does not matter.
pub fn business_days_between(first: NaiveDateTime, second: NaiveDateTime) -> u32 {
    let (lower, upper) = if first <= second {
        (first.date(), second.date())
    } else {
        (second.date(), first.date())
    };

    let mut business_days = 0;
    let mut date = upper - Duration::days(1);
    while date > lower {
        if !is_weekend(date) {
            business_days += 1;
        }
        date -= Duration::days(1);
    }
    business_days
}

/// Working hours between two instants, counting at most
/// [`WORKING_HOURS_PER_DAY`] per business day.
pub fn compute_working_hours(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> f64 {
    let (Some(start), Some(end)) = (start, end) else {
        return 0.0;
    };
    if end <= start {
        return 0.0;
    }

    if start.date() == end.date() {
        if is_weekend(start.date()) {
            return 0.0;
        }
        return hours(end - start).min(WORKING_HOURS_PER_DAY);
    }

    let first_day = if is_weekend(start.date()) {
        0.0
    } else {
        hours(end_of_day(start.date()) - start).min(WORKING_HOURS_PER_DAY)
    };
    let last_day = if is_weekend(end.date()) {
        0.0
    } else {
        hours(end - beginning_of_day(end.date())).min(WORKING_HOURS_PER_DAY)
    };
    let full_days = business_days_between(start, end) as f64 * WORKING_HOURS_PER_DAY;

    first_day + full_days + last_day
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub beginning_of_week: NaiveDate,
    pub end_of_week: NaiveDate,
}

impl WeekWindow {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            beginning_of_week: beginning_of_week(date),
            end_of_week: end_of_week(date),
        }
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        (0..7)
            .map(|offset| self.beginning_of_week + Duration::days(offset))
            .collect()
    }

    pub fn is_last_in_month(&self) -> bool {
        (self.end_of_week + Duration::weeks(1)).month() != self.end_of_week.month()
    }

    pub fn is_last_in_year(&self) -> bool {
        (self.end_of_week + Duration::weeks(1)).year() != self.end_of_week.year()
    }
}

/// The weeks still to be consolidated: starts at `start`, steps one week at a
/// time while the step date is not after `end`.
#[derive(Debug, Clone)]
pub struct WeekWalk {
    current: NaiveDate,
    end: NaiveDate,
}

impl WeekWalk {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            current: start,
            end,
        }
    }

    pub fn remaining(&self) -> usize {
        if self.current > self.end {
            return 0;
        }
        (self.end - self.current).num_days() as usize / 7 + 1
    }
}

impl Iterator for WeekWalk {
    type Item = WeekWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current > self.end {
            return None;
        }
        let window = WeekWindow::containing(self.current);
        self.current += Duration::weeks(1);
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}
