use crate::calendar::{self, WeekendPolicy};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trade color assigned when a draft names none and no trades are known yet.
pub const FALLBACK_TRADE: &str = "#1e6fd9";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

/// A schedulable unit of work. Dependencies are held as predecessor ids;
/// `lane_id` is a non-owning back-reference to the lane holding this task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: i32,
    pub name: String,
    pub trade: String,
    pub crew_size: u32,
    pub start_date: NaiveDate,
    pub duration_days: i64,
    pub dependencies: Vec<i32>,
    pub work_saturday: bool,
    pub work_sunday: bool,
    pub status: TaskStatus,
    pub progress: u8,
    pub lane_id: i32,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            trade: FALLBACK_TRADE.to_string(),
            crew_size: 1,
            start_date: default_start_date(),
            duration_days: 1,
            dependencies: Vec::new(),
            work_saturday: false,
            work_sunday: false,
            status: TaskStatus::default(),
            progress: 0,
            lane_id: 0,
        }
    }
}

fn default_start_date() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl Task {
    pub fn new(
        id: i32,
        name: impl Into<String>,
        start_date: NaiveDate,
        duration_days: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            start_date,
            duration_days: duration_days.max(1),
            ..Default::default()
        }
    }

    pub fn weekend_policy(&self) -> WeekendPolicy {
        WeekendPolicy::new(self.work_saturday, self.work_sunday)
    }

    /// End date under this task's own calendar.
    pub fn end_date(&self) -> NaiveDate {
        calendar::add_business_days(self.start_date, self.duration_days, self.weekend_policy())
    }

    /// Push the start date forward until it lands on a working day.
    pub fn normalize_start_date(&mut self) {
        self.start_date = calendar::next_working_day(self.start_date, self.weekend_policy());
    }

    /// Changing the weekend flags can strand the start date on a day that
    /// is no longer worked, so normalization always follows.
    pub fn set_weekend_policy(&mut self, work_saturday: bool, work_sunday: bool) {
        self.work_saturday = work_saturday;
        self.work_sunday = work_sunday;
        self.normalize_start_date();
    }

    pub fn depends_on(&self, predecessor_id: i32) -> bool {
        self.dependencies.contains(&predecessor_id)
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }
}

/// Configuration for creating a task through the planner. Missing pieces
/// (trade, lane) are filled in at insertion time.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub name: String,
    pub trade: Option<String>,
    pub crew_size: u32,
    pub start_date: NaiveDate,
    pub duration_days: i64,
    pub work_saturday: bool,
    pub work_sunday: bool,
    pub lane_id: Option<i32>,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, duration_days: i64) -> Self {
        Self {
            name: name.into(),
            trade: None,
            crew_size: 1,
            start_date,
            duration_days,
            work_saturday: false,
            work_sunday: false,
            lane_id: None,
        }
    }

    pub fn in_lane(mut self, lane_id: i32) -> Self {
        self.lane_id = Some(lane_id);
        self
    }

    pub fn with_trade(mut self, trade: impl Into<String>) -> Self {
        self.trade = Some(trade.into());
        self
    }

    pub fn with_weekends(mut self, work_saturday: bool, work_sunday: bool) -> Self {
        self.work_saturday = work_saturday;
        self.work_sunday = work_sunday;
        self
    }
}
