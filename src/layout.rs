use crate::task::Task;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Fixed row geometry shared by slot assignment and hit testing.
pub const ROW_HEIGHT: f64 = 28.0;
pub const ROW_GAP: f64 = 6.0;
pub const LANE_TOP_PAD: f64 = 12.0;
pub const LANE_BOTTOM_PAD: f64 = 8.0;
/// Vertical spacing between consecutive lane bands.
pub const LANE_GAP: f64 = 10.0;
pub const DEFAULT_LANE_HEIGHT: f64 = 160.0;
/// Width of the resize-sensitive band at each end of a task bar.
pub const EDGE_BAND: f64 = 6.0;
pub const DEFAULT_DAY_WIDTH: f64 = 24.0;
pub const DEFAULT_LANE_COLOR: &str = "#9e9e9e";

/// A task's 2-D position within its lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub x: f64,
    pub y: f64,
}

/// World-space horizontal mapping between dates and pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    pub origin: NaiveDate,
    pub day_width: f64,
}

impl TimeScale {
    pub fn new(origin: NaiveDate, day_width: f64) -> Self {
        let day_width = if day_width.is_finite() && day_width > 0.0 {
            day_width
        } else {
            DEFAULT_DAY_WIDTH
        };
        Self { origin, day_width }
    }

    pub fn x_for_date(&self, date: NaiveDate) -> f64 {
        (date - self.origin).num_days() as f64 * self.day_width
    }

    pub fn date_for_x(&self, x: f64) -> NaiveDate {
        self.origin + Duration::days((x / self.day_width).floor() as i64)
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self {
            origin: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            day_width: DEFAULT_DAY_WIDTH,
        }
    }
}

/// Which part of a task bar a pointer landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRegion {
    Body,
    StartEdge,
    EndEdge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub task_id: i32,
    pub region: HitRegion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    NoLaneAvailable,
    LaneNotFound(i32),
    LaneNotEmpty { lane_id: i32, task_count: usize },
    LastLane,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::NoLaneAvailable => {
                write!(f, "no lanes exist; create a lane before placing tasks")
            }
            LayoutError::LaneNotFound(id) => write!(f, "lane {id} does not exist"),
            LayoutError::LaneNotEmpty {
                lane_id,
                task_count,
            } => write!(
                f,
                "lane {lane_id} still holds {task_count} task(s); move or delete them first"
            ),
            LayoutError::LastLane => write!(f, "the last remaining lane cannot be deleted"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// A horizontal track owning an ordered set of task ids and their slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lane {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub offset_y: f64,
    pub height: f64,
    pub task_order: Vec<i32>,
    pub positions: HashMap<i32, Slot>,
}

impl Default for Lane {
    fn default() -> Self {
        Self {
            id: 0,
            name: "Lane".to_string(),
            color: DEFAULT_LANE_COLOR.to_string(),
            offset_y: 0.0,
            height: DEFAULT_LANE_HEIGHT,
            task_order: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl Lane {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn contains_task(&self, task_id: i32) -> bool {
        self.task_order.contains(&task_id)
    }

    pub fn task_count(&self) -> usize {
        self.task_order.len()
    }

    /// Highest slot y a task may occupy and still fit inside the band.
    pub fn max_slot_y(&self) -> f64 {
        self.offset_y + self.height - ROW_HEIGHT - LANE_BOTTOM_PAD
    }

    /// Next free vertical slot: below the last-placed task, or the top
    /// padding line for an empty lane, clamped to the band.
    pub fn next_slot_y(&self) -> f64 {
        let base = match self
            .task_order
            .last()
            .and_then(|id| self.positions.get(id))
        {
            Some(slot) => slot.y + ROW_HEIGHT + ROW_GAP,
            None => self.offset_y + LANE_TOP_PAD,
        };
        base.min(self.max_slot_y())
    }

    pub(crate) fn insert_task(&mut self, task_id: i32, slot: Slot) {
        if !self.task_order.contains(&task_id) {
            self.task_order.push(task_id);
        }
        self.positions.insert(task_id, slot);
    }

    pub(crate) fn remove_task(&mut self, task_id: i32) -> bool {
        let held = self.task_order.contains(&task_id);
        self.task_order.retain(|id| *id != task_id);
        self.positions.remove(&task_id);
        held
    }
}

/// Ordered lane collection. Display order is array order; vertical offsets
/// are a running sum of lane heights plus spacing.
#[derive(Debug, Clone)]
pub struct LaneLayout {
    lanes: Vec<Lane>,
    next_lane_id: i32,
}

impl Default for LaneLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LaneLayout {
    pub fn new() -> Self {
        Self {
            lanes: Vec::new(),
            next_lane_id: 1,
        }
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub(crate) fn lanes_mut(&mut self) -> &mut Vec<Lane> {
        &mut self.lanes
    }

    pub fn lane(&self, lane_id: i32) -> Option<&Lane> {
        self.lanes.iter().find(|lane| lane.id == lane_id)
    }

    pub(crate) fn lane_mut(&mut self, lane_id: i32) -> Option<&mut Lane> {
        self.lanes.iter_mut().find(|lane| lane.id == lane_id)
    }

    pub fn first_lane_id(&self) -> Option<i32> {
        self.lanes.first().map(|lane| lane.id)
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub(crate) fn allocate_lane_id(&mut self) -> i32 {
        let id = self.next_lane_id;
        self.next_lane_id += 1;
        id
    }

    pub fn add_lane(&mut self, name: impl Into<String>) -> i32 {
        let id = self.allocate_lane_id();
        self.lanes.push(Lane::new(id, name));
        self.recompute_offsets();
        id
    }

    /// Adopt an externally built lane (state import). Keeps the lane's own
    /// id and geometry; the id counter is re-seeded above it.
    pub(crate) fn push_lane(&mut self, lane: Lane) {
        self.next_lane_id = self.next_lane_id.max(lane.id + 1);
        self.lanes.push(lane);
    }

    pub fn remove_lane(&mut self, lane_id: i32) -> Result<(), LayoutError> {
        let index = self
            .lanes
            .iter()
            .position(|lane| lane.id == lane_id)
            .ok_or(LayoutError::LaneNotFound(lane_id))?;
        let task_count = self.lanes[index].task_count();
        if task_count > 0 {
            return Err(LayoutError::LaneNotEmpty {
                lane_id,
                task_count,
            });
        }
        if self.lanes.len() == 1 {
            return Err(LayoutError::LastLane);
        }
        self.lanes.remove(index);
        self.recompute_offsets();
        Ok(())
    }

    /// Reorder lanes; returns false when `from` is out of range.
    pub fn move_lane(&mut self, from: usize, to: usize) -> bool {
        if from >= self.lanes.len() {
            return false;
        }
        let lane = self.lanes.remove(from);
        let to = to.min(self.lanes.len());
        self.lanes.insert(to, lane);
        self.recompute_offsets();
        true
    }

    /// Recompute every lane's vertical offset as a running sum of heights
    /// plus inter-lane spacing. Slots move with their lane.
    pub fn recompute_offsets(&mut self) {
        let mut running = 0.0;
        for lane in &mut self.lanes {
            let shift = running - lane.offset_y;
            lane.offset_y = running;
            if shift != 0.0 {
                for slot in lane.positions.values_mut() {
                    slot.y += shift;
                }
            }
            running += lane.height + LANE_GAP;
        }
    }

    pub fn total_height(&self) -> f64 {
        self.lanes
            .last()
            .map(|lane| lane.offset_y + lane.height)
            .unwrap_or(0.0)
    }

    /// Place a task in `lane_id`, falling back to the first lane when the
    /// requested lane is absent or unknown. Fails only with zero lanes.
    pub fn place_task(
        &mut self,
        task_id: i32,
        lane_id: Option<i32>,
        x: f64,
    ) -> Result<(i32, Slot), LayoutError> {
        if self.lanes.is_empty() {
            return Err(LayoutError::NoLaneAvailable);
        }
        let target = match lane_id {
            Some(id) if self.lane(id).is_some() => id,
            Some(id) => {
                let fallback = self.lanes[0].id;
                log::warn!("lane {id} not found; placing task {task_id} in lane {fallback}");
                fallback
            }
            None => self.lanes[0].id,
        };
        let lane = self
            .lane_mut(target)
            .ok_or(LayoutError::LaneNotFound(target))?;
        let slot = Slot {
            x,
            y: lane.next_slot_y(),
        };
        lane.insert_task(task_id, slot);
        Ok((target, slot))
    }

    pub fn remove_task(&mut self, task_id: i32) -> bool {
        let mut removed = false;
        for lane in &mut self.lanes {
            removed |= lane.remove_task(task_id);
        }
        removed
    }

    /// Migrate a task between lanes, keeping its x and taking a fresh
    /// vertical slot in the target.
    pub fn move_task_to_lane(&mut self, task_id: i32, to: i32) -> Result<Slot, LayoutError> {
        if self.lane(to).is_none() {
            return Err(LayoutError::LaneNotFound(to));
        }
        let x = self
            .slot(task_id)
            .map(|(_, slot)| slot.x)
            .unwrap_or(0.0);
        for lane in &mut self.lanes {
            if lane.id != to {
                lane.remove_task(task_id);
            }
        }
        let lane = self.lane_mut(to).ok_or(LayoutError::LaneNotFound(to))?;
        let slot = Slot {
            x,
            y: lane.next_slot_y(),
        };
        lane.insert_task(task_id, slot);
        Ok(slot)
    }

    /// Make sure the task sits in exactly the given lane, reusing an
    /// existing slot there if one survived. Used during state import.
    pub(crate) fn ensure_membership(&mut self, task_id: i32, lane_id: i32, x: f64) -> bool {
        if self.lane(lane_id).is_none() {
            return false;
        }
        for lane in &mut self.lanes {
            if lane.id != lane_id {
                lane.remove_task(task_id);
            }
        }
        if let Some(lane) = self.lane_mut(lane_id) {
            if !lane.contains_task(task_id) || !lane.positions.contains_key(&task_id) {
                let slot = Slot {
                    x,
                    y: lane.next_slot_y(),
                };
                lane.insert_task(task_id, slot);
            }
        }
        true
    }

    pub fn lane_of_task(&self, task_id: i32) -> Option<i32> {
        self.lanes
            .iter()
            .find(|lane| lane.contains_task(task_id))
            .map(|lane| lane.id)
    }

    pub fn slot(&self, task_id: i32) -> Option<(i32, Slot)> {
        for lane in &self.lanes {
            if let Some(slot) = lane.positions.get(&task_id) {
                return Some((lane.id, *slot));
            }
        }
        None
    }

    pub(crate) fn set_task_x(&mut self, task_id: i32, x: f64) -> bool {
        for lane in &mut self.lanes {
            if let Some(slot) = lane.positions.get_mut(&task_id) {
                slot.x = x;
                return true;
            }
        }
        false
    }

    /// Sort a lane's tasks by start date and restack them top to bottom.
    /// Used to de-overlap after bulk edits.
    pub fn relayout_lane(
        &mut self,
        lane_id: i32,
        start_dates: &BTreeMap<i32, NaiveDate>,
    ) -> Result<(), LayoutError> {
        let lane = self
            .lane_mut(lane_id)
            .ok_or(LayoutError::LaneNotFound(lane_id))?;
        lane.task_order
            .sort_by_key(|id| (start_dates.get(id).copied(), *id));
        let max_y = lane.max_slot_y();
        let mut y = lane.offset_y + LANE_TOP_PAD;
        for id in lane.task_order.clone() {
            let clamped = y.min(max_y);
            if let Some(slot) = lane.positions.get_mut(&id) {
                slot.y = clamped;
            }
            y += ROW_HEIGHT + ROW_GAP;
        }
        Ok(())
    }

    /// The lane whose band contains the given y, if any.
    pub fn lane_at_y(&self, y: f64) -> Option<i32> {
        self.lanes
            .iter()
            .find(|lane| y >= lane.offset_y && y < lane.offset_y + lane.height)
            .map(|lane| lane.id)
    }

    /// Report which task bar (if any) the world-space point lands on, and
    /// whether it falls in the resize band near the start or end boundary.
    pub fn hit_test(
        &self,
        x: f64,
        y: f64,
        tasks: &BTreeMap<i32, Task>,
        scale: &TimeScale,
    ) -> Option<Hit> {
        for lane in &self.lanes {
            if y < lane.offset_y || y >= lane.offset_y + lane.height {
                continue;
            }
            // Later-placed tasks draw on top, so scan in reverse order.
            for &task_id in lane.task_order.iter().rev() {
                let Some(slot) = lane.positions.get(&task_id) else {
                    continue;
                };
                let Some(task) = tasks.get(&task_id) else {
                    continue;
                };
                if y < slot.y || y >= slot.y + ROW_HEIGHT {
                    continue;
                }
                let x0 = slot.x;
                let x1 = scale.x_for_date(task.end_date());
                if x < x0 - EDGE_BAND / 2.0 || x > x1 + EDGE_BAND / 2.0 {
                    continue;
                }
                let region = if x <= x0 + EDGE_BAND {
                    HitRegion::StartEdge
                } else if x >= x1 - EDGE_BAND {
                    HitRegion::EndEdge
                } else {
                    HitRegion::Body
                };
                return Some(Hit { task_id, region });
            }
        }
        None
    }
}
