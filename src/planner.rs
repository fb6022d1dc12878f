use crate::calendar;
use crate::graph::DependencyDag;
use crate::layout::{Hit, Lane, LaneLayout, LayoutError, Slot, TimeScale};
use crate::metadata::ProjectMeta;
use crate::repair::repair_state;
use crate::snapshot::PlannerSnapshot;
use crate::task::{FALLBACK_TRADE, Task, TaskDraft, TaskStatus};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Mutating operations between defensive validation sweeps.
const SWEEP_INTERVAL: u64 = 120;

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    TaskNotFound(i32),
    LaneNotFound(i32),
    NoLaneAvailable,
    LaneNotEmpty { lane_id: i32, task_count: usize },
    LastLane,
    CycleDetected { task_id: i32, predecessor_id: i32 },
    DuplicateDependency { task_id: i32, predecessor_id: i32 },
    InvalidResize { task_id: i32, boundary: NaiveDate },
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::TaskNotFound(id) => write!(f, "task {id} does not exist"),
            PlannerError::LaneNotFound(id) => write!(f, "lane {id} does not exist"),
            PlannerError::NoLaneAvailable => {
                write!(f, "no lanes exist; create a lane before adding tasks")
            }
            PlannerError::LaneNotEmpty {
                lane_id,
                task_count,
            } => write!(
                f,
                "lane {lane_id} still holds {task_count} task(s); move or delete them first"
            ),
            PlannerError::LastLane => write!(f, "the last remaining lane cannot be deleted"),
            PlannerError::CycleDetected {
                task_id,
                predecessor_id,
            } => write!(
                f,
                "making task {predecessor_id} a predecessor of task {task_id} would create a dependency cycle"
            ),
            PlannerError::DuplicateDependency {
                task_id,
                predecessor_id,
            } => write!(f, "task {task_id} already depends on task {predecessor_id}"),
            PlannerError::InvalidResize { task_id, boundary } => write!(
                f,
                "resizing task {task_id} to {boundary} would leave it shorter than one working day"
            ),
        }
    }
}

impl std::error::Error for PlannerError {}

impl From<LayoutError> for PlannerError {
    fn from(value: LayoutError) -> Self {
        match value {
            LayoutError::NoLaneAvailable => PlannerError::NoLaneAvailable,
            LayoutError::LaneNotFound(id) => PlannerError::LaneNotFound(id),
            LayoutError::LaneNotEmpty {
                lane_id,
                task_count,
            } => PlannerError::LaneNotEmpty {
                lane_id,
                task_count,
            },
            LayoutError::LastLane => PlannerError::LastLane,
        }
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Start,
    End,
}

/// Emitted after each committed mutation. Subscribers (autosave, undo
/// history) decide their own debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    TaskAdded(i32),
    TaskMutated(i32),
    TaskRemoved(i32),
    LanesChanged,
    StateReplaced,
}

type ChangeListener = Box<dyn FnMut(ChangeEvent)>;

/// The scheduling engine facade. Owns the task index, the lane layout,
/// the trade-visibility filter, and the selection; every mutation flows
/// through here so the DAG, calendar, and layout invariants are
/// re-established before an operation returns.
pub struct Planner {
    tasks: BTreeMap<i32, Task>,
    layout: LaneLayout,
    scale: TimeScale,
    meta: ProjectMeta,
    trade_filter: BTreeMap<String, bool>,
    selection: BTreeSet<i32>,
    clipboard: Vec<Task>,
    cascade_enabled: bool,
    next_task_id: i32,
    ticks: u64,
    listeners: Vec<ChangeListener>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self::with_scale(TimeScale::default())
    }

    pub fn with_scale(scale: TimeScale) -> Self {
        let mut layout = LaneLayout::new();
        layout.add_lane("Lane 1");
        Self {
            tasks: BTreeMap::new(),
            layout,
            scale,
            meta: ProjectMeta::default(),
            trade_filter: BTreeMap::new(),
            selection: BTreeSet::new(),
            clipboard: Vec::new(),
            cascade_enabled: true,
            next_task_id: 1,
            ticks: 0,
            listeners: Vec::new(),
        }
    }

    // ---- read views -----------------------------------------------------

    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }

    pub fn scale(&self) -> &TimeScale {
        &self.scale
    }

    pub fn lanes(&self) -> &[Lane] {
        self.layout.lanes()
    }

    pub fn lane(&self, lane_id: i32) -> Option<&Lane> {
        self.layout.lane(lane_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task(&self, task_id: i32) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks in a lane, in stacking order.
    pub fn tasks_in_lane(&self, lane_id: i32) -> Vec<&Task> {
        let Some(lane) = self.layout.lane(lane_id) else {
            return Vec::new();
        };
        lane.task_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .collect()
    }

    pub fn slot(&self, task_id: i32) -> Option<Slot> {
        self.layout.slot(task_id).map(|(_, slot)| slot)
    }

    pub fn task_end_date(&self, task_id: i32) -> Option<NaiveDate> {
        self.tasks.get(&task_id).map(Task::end_date)
    }

    /// All (predecessor, successor) pairs, for arrow drawing and reports.
    pub fn dependency_edges(&self) -> Vec<(i32, i32)> {
        let mut edges = Vec::new();
        for (id, task) in &self.tasks {
            for &pred in &task.dependencies {
                edges.push((pred, *id));
            }
        }
        edges
    }

    pub fn trade_filter(&self) -> &BTreeMap<String, bool> {
        &self.trade_filter
    }

    pub fn is_trade_visible(&self, trade: &str) -> bool {
        self.trade_filter.get(trade).copied().unwrap_or(true)
    }

    pub fn selected(&self) -> &BTreeSet<i32> {
        &self.selection
    }

    pub fn cascade_enabled(&self) -> bool {
        self.cascade_enabled
    }

    pub fn hit_test(&self, x: f64, y: f64) -> Option<Hit> {
        self.layout.hit_test(x, y, &self.tasks, &self.scale)
    }

    pub fn lane_at_y(&self, y: f64) -> Option<i32> {
        self.layout.lane_at_y(y)
    }

    // ---- subscriptions and ticks ----------------------------------------

    pub fn subscribe(&mut self, listener: impl FnMut(ChangeEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: ChangeEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    /// Advance the defensive-sweep counter; every `SWEEP_INTERVAL` ticks a
    /// full repair pass runs. Returns the repairs applied (usually zero).
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        if self.ticks % SWEEP_INTERVAL != 0 {
            return 0;
        }
        let repairs = self.validate_and_repair();
        if repairs > 0 {
            log::warn!("defensive sweep repaired {repairs} inconsistencies");
        }
        repairs
    }

    pub fn reset_ticks(&mut self) {
        self.ticks = 0;
    }

    /// Run the consistency pass immediately.
    pub fn validate_and_repair(&mut self) -> usize {
        repair_state(
            &mut self.tasks,
            &mut self.layout,
            &mut self.trade_filter,
            &self.scale,
        )
    }

    // ---- project metadata -----------------------------------------------

    pub fn set_project_name(&mut self, name: impl Into<String>) {
        self.meta.name = name.into();
    }

    pub fn set_project_description(&mut self, description: impl Into<String>) {
        self.meta.description = description.into();
    }

    // ---- lanes ----------------------------------------------------------

    pub fn add_lane(&mut self, name: impl Into<String>) -> i32 {
        let id = self.layout.add_lane(name);
        self.emit(ChangeEvent::LanesChanged);
        id
    }

    pub fn remove_lane(&mut self, lane_id: i32) -> PlannerResult<()> {
        self.layout.remove_lane(lane_id)?;
        self.emit(ChangeEvent::LanesChanged);
        Ok(())
    }

    pub fn move_lane(&mut self, from: usize, to: usize) -> bool {
        let moved = self.layout.move_lane(from, to);
        if moved {
            self.emit(ChangeEvent::LanesChanged);
        }
        moved
    }

    pub fn set_lane_name(&mut self, lane_id: i32, name: impl Into<String>) -> PlannerResult<()> {
        let lane = self
            .layout
            .lane_mut(lane_id)
            .ok_or(PlannerError::LaneNotFound(lane_id))?;
        lane.name = name.into();
        self.emit(ChangeEvent::LanesChanged);
        Ok(())
    }

    pub fn set_lane_color(&mut self, lane_id: i32, color: impl Into<String>) -> PlannerResult<()> {
        let lane = self
            .layout
            .lane_mut(lane_id)
            .ok_or(PlannerError::LaneNotFound(lane_id))?;
        lane.color = color.into();
        self.emit(ChangeEvent::LanesChanged);
        Ok(())
    }

    /// Re-stack one lane's tasks by start date to clear overlaps.
    pub fn relayout_lane(&mut self, lane_id: i32) -> PlannerResult<()> {
        let starts: BTreeMap<i32, NaiveDate> = self
            .tasks
            .iter()
            .map(|(id, task)| (*id, task.start_date))
            .collect();
        self.layout.relayout_lane(lane_id, &starts)?;
        self.emit(ChangeEvent::LanesChanged);
        Ok(())
    }

    // ---- task CRUD ------------------------------------------------------

    pub fn add_task(&mut self, draft: TaskDraft) -> PlannerResult<i32> {
        let id = self.next_task_id;
        let trade = draft
            .trade
            .filter(|trade| !trade.is_empty())
            .or_else(|| self.trade_filter.keys().next().cloned())
            .unwrap_or_else(|| FALLBACK_TRADE.to_string());

        let mut task = Task::new(id, draft.name, draft.start_date, draft.duration_days);
        task.trade = trade;
        task.crew_size = draft.crew_size.max(1);
        task.work_saturday = draft.work_saturday;
        task.work_sunday = draft.work_sunday;
        task.normalize_start_date();

        let x = self.scale.x_for_date(task.start_date);
        let (lane_id, _) = self.layout.place_task(id, draft.lane_id, x)?;
        task.lane_id = lane_id;

        self.trade_filter.entry(task.trade.clone()).or_insert(true);
        self.tasks.insert(id, task);
        self.next_task_id += 1;
        self.emit(ChangeEvent::TaskAdded(id));
        Ok(id)
    }

    /// Remove the task, its layout slot, and every dependency edge that
    /// references it from either side.
    pub fn remove_task(&mut self, task_id: i32) -> PlannerResult<()> {
        if self.tasks.remove(&task_id).is_none() {
            return Err(PlannerError::TaskNotFound(task_id));
        }
        self.layout.remove_task(task_id);
        self.selection.remove(&task_id);
        for task in self.tasks.values_mut() {
            task.dependencies.retain(|id| *id != task_id);
        }
        self.emit(ChangeEvent::TaskRemoved(task_id));
        Ok(())
    }

    pub fn set_task_name(&mut self, task_id: i32, name: impl Into<String>) -> PlannerResult<()> {
        self.task_mut(task_id)?.name = name.into();
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    pub fn set_task_trade(&mut self, task_id: i32, trade: impl Into<String>) -> PlannerResult<()> {
        let trade = trade.into();
        self.task_mut(task_id)?.trade = trade.clone();
        self.trade_filter.entry(trade).or_insert(true);
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    pub fn set_task_status(&mut self, task_id: i32, status: TaskStatus) -> PlannerResult<()> {
        self.task_mut(task_id)?.status = status;
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    pub fn set_task_progress(&mut self, task_id: i32, progress: u8) -> PlannerResult<()> {
        self.task_mut(task_id)?.set_progress(progress);
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    pub fn set_task_crew_size(&mut self, task_id: i32, crew_size: u32) -> PlannerResult<()> {
        self.task_mut(task_id)?.crew_size = crew_size.max(1);
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    pub fn set_task_duration(&mut self, task_id: i32, duration_days: i64) -> PlannerResult<()> {
        self.task_mut(task_id)?.duration_days = duration_days.max(1);
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    /// Weekend flag changes re-normalize the start date, which can move
    /// the bar; the slot x follows.
    pub fn set_task_weekends(
        &mut self,
        task_id: i32,
        work_saturday: bool,
        work_sunday: bool,
    ) -> PlannerResult<()> {
        let task = self.task_mut(task_id)?;
        task.set_weekend_policy(work_saturday, work_sunday);
        let start = task.start_date;
        let x = self.scale.x_for_date(start);
        self.layout.set_task_x(task_id, x);
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    fn task_mut(&mut self, task_id: i32) -> PlannerResult<&mut Task> {
        self.tasks
            .get_mut(&task_id)
            .ok_or(PlannerError::TaskNotFound(task_id))
    }

    // ---- dependencies ---------------------------------------------------

    pub fn add_dependency(&mut self, task_id: i32, predecessor_id: i32) -> PlannerResult<()> {
        if !self.tasks.contains_key(&task_id) {
            return Err(PlannerError::TaskNotFound(task_id));
        }
        if !self.tasks.contains_key(&predecessor_id) {
            return Err(PlannerError::TaskNotFound(predecessor_id));
        }
        if self.tasks[&task_id].depends_on(predecessor_id) {
            return Err(PlannerError::DuplicateDependency {
                task_id,
                predecessor_id,
            });
        }
        let dag = DependencyDag::build(&self.tasks);
        if dag.would_create_cycle(task_id, predecessor_id) {
            return Err(PlannerError::CycleDetected {
                task_id,
                predecessor_id,
            });
        }
        self.task_mut(task_id)?.dependencies.push(predecessor_id);
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    /// Idempotent removal; returns whether an edge was actually removed.
    pub fn remove_dependency(&mut self, task_id: i32, predecessor_id: i32) -> PlannerResult<bool> {
        let task = self.task_mut(task_id)?;
        let before = task.dependencies.len();
        task.dependencies.retain(|id| *id != predecessor_id);
        let removed = task.dependencies.len() != before;
        if removed {
            self.emit(ChangeEvent::TaskMutated(task_id));
        }
        Ok(removed)
    }

    /// Chain consecutive pairs: each task depends on the one before it.
    /// Already-present edges are skipped; returns the number added.
    pub fn link_in_sequence(&mut self, ordered_task_ids: &[i32]) -> PlannerResult<usize> {
        let mut added = 0;
        for pair in ordered_task_ids.windows(2) {
            let (predecessor_id, task_id) = (pair[0], pair[1]);
            if self
                .tasks
                .get(&task_id)
                .is_some_and(|task| task.depends_on(predecessor_id))
            {
                continue;
            }
            self.add_dependency(task_id, predecessor_id)?;
            added += 1;
        }
        Ok(added)
    }

    pub fn direct_successors(&self, task_id: i32) -> Vec<i32> {
        DependencyDag::build(&self.tasks).direct_successors(task_id)
    }

    pub fn transitive_successors(&self, task_id: i32) -> BTreeSet<i32> {
        DependencyDag::build(&self.tasks).transitive_successors(task_id)
    }

    // ---- selection ------------------------------------------------------

    pub fn select_task(&mut self, task_id: i32) -> PlannerResult<()> {
        if !self.tasks.contains_key(&task_id) {
            return Err(PlannerError::TaskNotFound(task_id));
        }
        self.selection.insert(task_id);
        Ok(())
    }

    pub fn toggle_selection(&mut self, task_id: i32) -> PlannerResult<bool> {
        if !self.tasks.contains_key(&task_id) {
            return Err(PlannerError::TaskNotFound(task_id));
        }
        if self.selection.remove(&task_id) {
            Ok(false)
        } else {
            self.selection.insert(task_id);
            Ok(true)
        }
    }

    pub fn deselect_task(&mut self, task_id: i32) {
        self.selection.remove(&task_id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_cascade_enabled(&mut self, enabled: bool) {
        self.cascade_enabled = enabled;
    }

    // ---- move / resize --------------------------------------------------

    /// Shift a task to a new start date and optionally a new lane. The
    /// same calendar-day delta is applied to the rest of a multi-selection
    /// containing the task, and (in cascade mode) to every transitive
    /// successor of anything shifted.
    pub fn move_task(
        &mut self,
        task_id: i32,
        new_start: NaiveDate,
        new_lane: Option<i32>,
    ) -> PlannerResult<()> {
        let old_start = self
            .tasks
            .get(&task_id)
            .ok_or(PlannerError::TaskNotFound(task_id))?
            .start_date;
        if let Some(lane_id) = new_lane {
            if self.layout.lane(lane_id).is_none() {
                return Err(PlannerError::LaneNotFound(lane_id));
            }
        }
        let delta_days = (new_start - old_start).num_days();

        let mut shifted: BTreeSet<i32> = BTreeSet::new();
        shifted.insert(task_id);
        if self.selection.contains(&task_id) && self.selection.len() > 1 {
            shifted.extend(self.selection.iter().copied());
        }
        if self.cascade_enabled {
            let dag = DependencyDag::build(&self.tasks);
            for seed in shifted.clone() {
                shifted.extend(dag.transitive_successors(seed));
            }
        }

        for id in &shifted {
            let Some(task) = self.tasks.get_mut(id) else {
                continue;
            };
            task.start_date = task.start_date + Duration::days(delta_days);
            task.normalize_start_date();
            let x = self.scale.x_for_date(task.start_date);
            self.layout.set_task_x(*id, x);
        }

        if let Some(lane_id) = new_lane {
            let task = self.task_mut(task_id)?;
            if task.lane_id != lane_id {
                task.lane_id = lane_id;
                self.layout.move_task_to_lane(task_id, lane_id)?;
            }
        }

        for id in shifted {
            self.emit(ChangeEvent::TaskMutated(id));
        }
        Ok(())
    }

    /// Drag one boundary of a task to a new date; the opposite boundary
    /// stays fixed. Rejected without mutation when the candidate span
    /// would cover less than one working day of the task's own calendar.
    pub fn resize_task_edge(
        &mut self,
        task_id: i32,
        edge: ResizeEdge,
        boundary: NaiveDate,
    ) -> PlannerResult<()> {
        let task = self
            .tasks
            .get(&task_id)
            .ok_or(PlannerError::TaskNotFound(task_id))?;
        let policy = task.weekend_policy();
        match edge {
            ResizeEdge::End => {
                let duration = calendar::business_days_between(task.start_date, boundary, policy);
                if duration < 1 {
                    return Err(PlannerError::InvalidResize { task_id, boundary });
                }
                self.task_mut(task_id)?.duration_days = duration;
            }
            ResizeEdge::Start => {
                let end = task.end_date();
                let new_start = calendar::next_working_day(boundary, policy);
                let duration = calendar::business_days_between(new_start, end, policy);
                if duration < 1 {
                    return Err(PlannerError::InvalidResize { task_id, boundary });
                }
                let task = self.task_mut(task_id)?;
                task.start_date = new_start;
                task.duration_days = duration;
                let x = self.scale.x_for_date(new_start);
                self.layout.set_task_x(task_id, x);
            }
        }
        self.emit(ChangeEvent::TaskMutated(task_id));
        Ok(())
    }

    // ---- copy / paste ---------------------------------------------------

    /// Snapshot the selected tasks into the clipboard; returns the count.
    pub fn copy_selection(&mut self) -> usize {
        self.clipboard = self
            .selection
            .iter()
            .filter_map(|id| self.tasks.get(id).cloned())
            .collect();
        self.clipboard.len()
    }

    /// Paste the clipboard at an anchor date and lane. Pasted tasks get
    /// fresh ids and no dependencies; their relative date offsets are kept
    /// by shifting everything by the same delta from the earliest copied
    /// start, and they stack down the anchor lane.
    pub fn paste_at(&mut self, anchor_date: NaiveDate, anchor_lane: i32) -> PlannerResult<Vec<i32>> {
        if self.layout.lane(anchor_lane).is_none() {
            return Err(PlannerError::LaneNotFound(anchor_lane));
        }
        let Some(reference) = self.clipboard.iter().map(|task| task.start_date).min() else {
            return Ok(Vec::new());
        };
        let delta = anchor_date - reference;

        let mut pasted = Vec::with_capacity(self.clipboard.len());
        for source in self.clipboard.clone() {
            let id = self.next_task_id;
            self.next_task_id += 1;

            let mut task = source;
            task.id = id;
            task.dependencies.clear();
            task.lane_id = anchor_lane;
            task.start_date = task.start_date + delta;
            task.normalize_start_date();

            let x = self.scale.x_for_date(task.start_date);
            self.layout.place_task(id, Some(anchor_lane), x)?;
            self.trade_filter.entry(task.trade.clone()).or_insert(true);
            self.tasks.insert(id, task);
            pasted.push(id);
        }
        for id in &pasted {
            self.emit(ChangeEvent::TaskAdded(*id));
        }
        Ok(pasted)
    }

    // ---- trade filter ---------------------------------------------------

    pub fn set_trade_visible(&mut self, trade: impl Into<String>, visible: bool) {
        self.trade_filter.insert(trade.into(), visible);
    }

    // ---- import / export ------------------------------------------------

    /// Serialize the full state: flattened tasks (dependencies as id
    /// lists), lanes with their slot maps, and the visibility filter.
    pub fn export_state(&self) -> PlannerSnapshot {
        PlannerSnapshot {
            meta: self.meta.clone(),
            tasks: self.tasks.values().cloned().collect(),
            lanes: self.layout.lanes().to_vec(),
            trade_filter: self.trade_filter.clone(),
        }
    }

    /// Replace the in-memory state with a snapshot. Lane membership is
    /// rebuilt preferentially from each task's own `lane_id`, falling back
    /// to the per-lane task lists; a repair pass always follows, so
    /// structurally invalid snapshots are corrected rather than rejected.
    /// Returns the total number of fixes applied.
    pub fn import_state(&mut self, snapshot: PlannerSnapshot) -> usize {
        let PlannerSnapshot {
            meta,
            tasks,
            lanes,
            trade_filter,
        } = snapshot;

        self.meta = meta;
        self.trade_filter = trade_filter;
        self.selection.clear();
        self.clipboard.clear();

        let mut layout = LaneLayout::new();
        for lane in lanes {
            layout.push_lane(lane);
        }

        let mut fixes = 0;
        let mut index: BTreeMap<i32, Task> = BTreeMap::new();
        let mut max_id = 0;
        for mut task in tasks {
            if index.contains_key(&task.id) {
                task.id = max_id + 1;
                fixes += 1;
            }
            max_id = max_id.max(task.id);
            index.insert(task.id, task);
        }

        for (id, task) in &index {
            if layout.lane(task.lane_id).is_some() {
                let x = self.scale.x_for_date(task.start_date);
                layout.ensure_membership(*id, task.lane_id, x);
            }
            // Unknown lane_id: left where a lane's own task list claims
            // it, or adopted as an orphan by the repair pass.
        }

        self.tasks = index;
        self.layout = layout;
        self.next_task_id = max_id + 1;

        fixes += self.validate_and_repair();
        if fixes > 0 {
            log::warn!("state import repaired {fixes} inconsistencies");
        }
        self.emit(ChangeEvent::StateReplaced);
        fixes
    }
}
