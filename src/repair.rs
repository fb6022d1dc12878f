use crate::graph::DependencyDag;
use crate::layout::{
    DEFAULT_LANE_HEIGHT, LANE_TOP_PAD, LaneLayout, ROW_GAP, ROW_HEIGHT, Slot, TimeScale,
};
use crate::task::Task;
use std::collections::{BTreeMap, HashSet};

/// Idempotent consistency pass over the whole in-memory model. Fixes lane
/// identity, filter completeness, lane membership, positions, dependency
/// hygiene, and out-of-range task fields. Returns the number of repairs;
/// running it again immediately afterwards returns zero.
pub fn repair_state(
    tasks: &mut BTreeMap<i32, Task>,
    layout: &mut LaneLayout,
    trade_filter: &mut BTreeMap<String, bool>,
    scale: &TimeScale,
) -> usize {
    let mut repairs = 0;
    repairs += repair_lane_identity(layout);
    repairs += ensure_lane_exists(tasks, layout);
    repairs += repair_filter(tasks, trade_filter);
    repairs += repair_membership(tasks, layout, scale);
    repairs += repair_positions(tasks, layout, scale);
    repairs += repair_dependencies(tasks);
    repairs += repair_task_fields(tasks);
    repairs
}

/// Duplicate lane ids get fresh ones; lanes with broken geometry get the
/// default height and recomputed offsets.
fn repair_lane_identity(layout: &mut LaneLayout) -> usize {
    let mut repairs = 0;
    let mut seen = HashSet::new();
    let mut relabels = Vec::new();
    for index in 0..layout.lanes().len() {
        let id = layout.lanes()[index].id;
        if !seen.insert(id) {
            relabels.push(index);
        }
    }
    for index in relabels {
        let fresh = layout.allocate_lane_id();
        layout.lanes_mut()[index].id = fresh;
        repairs += 1;
    }

    let mut geometry_broken = false;
    for lane in layout.lanes_mut() {
        if !lane.height.is_finite() || lane.height <= 0.0 {
            lane.height = DEFAULT_LANE_HEIGHT;
            repairs += 1;
            geometry_broken = true;
        }
        if !lane.offset_y.is_finite() {
            lane.offset_y = 0.0;
            repairs += 1;
            geometry_broken = true;
        }
    }
    if geometry_broken {
        layout.recompute_offsets();
    }
    repairs
}

/// Orphan repair needs somewhere to put tasks.
fn ensure_lane_exists(tasks: &BTreeMap<i32, Task>, layout: &mut LaneLayout) -> usize {
    if layout.is_empty() && !tasks.is_empty() {
        layout.add_lane("Lane 1");
        return 1;
    }
    0
}

/// Every known trade gets a visibility entry, defaulting to visible.
fn repair_filter(tasks: &BTreeMap<i32, Task>, trade_filter: &mut BTreeMap<String, bool>) -> usize {
    let mut repairs = 0;
    for task in tasks.values() {
        if !trade_filter.contains_key(&task.trade) {
            trade_filter.insert(task.trade.clone(), true);
            repairs += 1;
        }
    }
    repairs
}

/// Restore the task/lane bijection: drop stale ids from lanes, resolve
/// tasks listed in several lanes, adopt orphans into the first lane, and
/// point each task's `lane_id` at the lane physically holding it.
fn repair_membership(
    tasks: &mut BTreeMap<i32, Task>,
    layout: &mut LaneLayout,
    scale: &TimeScale,
) -> usize {
    let mut repairs = 0;

    let known: HashSet<i32> = tasks.keys().copied().collect();
    for lane in layout.lanes_mut() {
        let before = lane.task_order.len();
        lane.task_order.retain(|id| known.contains(id));
        repairs += before - lane.task_order.len();
        let before = lane.positions.len();
        lane.positions.retain(|id, _| known.contains(id));
        repairs += before.saturating_sub(lane.positions.len());
    }

    // A task held by several lanes keeps the one matching its lane_id,
    // else the first occurrence.
    for (id, task) in tasks.iter() {
        let holders: Vec<i32> = layout
            .lanes()
            .iter()
            .filter(|lane| lane.contains_task(*id))
            .map(|lane| lane.id)
            .collect();
        if holders.len() > 1 {
            let keep = if holders.contains(&task.lane_id) {
                task.lane_id
            } else {
                holders[0]
            };
            for lane in layout.lanes_mut() {
                if lane.id != keep && lane.remove_task(*id) {
                    repairs += 1;
                }
            }
        }
    }

    for (id, task) in tasks.iter_mut() {
        match layout.lane_of_task(*id) {
            Some(holder) => {
                if task.lane_id != holder {
                    task.lane_id = holder;
                    repairs += 1;
                }
            }
            None => {
                let x = scale.x_for_date(task.start_date);
                if let Ok((lane_id, _)) = layout.place_task(*id, None, x) {
                    task.lane_id = lane_id;
                    repairs += 1;
                }
            }
        }
    }
    repairs
}

/// Replace missing, non-finite, or out-of-band slots with deterministic
/// ones derived from the task's stacking order.
fn repair_positions(
    tasks: &BTreeMap<i32, Task>,
    layout: &mut LaneLayout,
    scale: &TimeScale,
) -> usize {
    let mut repairs = 0;
    for lane in layout.lanes_mut() {
        let band_top = lane.offset_y;
        let band_bottom = lane.offset_y + lane.height;
        let max_y = lane.max_slot_y();
        for (index, &task_id) in lane.task_order.clone().iter().enumerate() {
            let fallback_x = tasks
                .get(&task_id)
                .map(|task| scale.x_for_date(task.start_date))
                .unwrap_or(0.0);
            let fresh_y = (band_top + LANE_TOP_PAD + index as f64 * (ROW_HEIGHT + ROW_GAP))
                .min(max_y)
                .max(band_top);
            match lane.positions.get_mut(&task_id) {
                Some(slot) => {
                    if !slot.x.is_finite() {
                        slot.x = fallback_x;
                        repairs += 1;
                    }
                    if !slot.y.is_finite() || slot.y < band_top || slot.y >= band_bottom {
                        slot.y = fresh_y;
                        repairs += 1;
                    }
                }
                None => {
                    lane.positions.insert(
                        task_id,
                        Slot {
                            x: fallback_x,
                            y: fresh_y,
                        },
                    );
                    repairs += 1;
                }
            }
        }
    }
    repairs
}

/// Dependency hygiene for hostile saved state: self-references, dangling
/// ids, duplicates, and cycle-closing edges are dropped so the DAG
/// invariant holds even for data the engine never produced.
fn repair_dependencies(tasks: &mut BTreeMap<i32, Task>) -> usize {
    let mut repairs = 0;
    let known: HashSet<i32> = tasks.keys().copied().collect();

    for (id, task) in tasks.iter_mut() {
        let before = task.dependencies.len();
        let mut kept = Vec::with_capacity(before);
        for &pred in &task.dependencies {
            if pred != *id && known.contains(&pred) && !kept.contains(&pred) {
                kept.push(pred);
            }
        }
        repairs += before - kept.len();
        task.dependencies = kept;
    }

    let mut dag = DependencyDag::with_nodes(known.iter().copied());
    let ids: Vec<i32> = tasks.keys().copied().collect();
    for id in ids {
        let deps = tasks
            .get(&id)
            .map(|task| task.dependencies.clone())
            .unwrap_or_default();
        let mut kept = Vec::with_capacity(deps.len());
        for pred in deps {
            if dag.try_insert_edge(id, pred) {
                kept.push(pred);
            } else {
                repairs += 1;
            }
        }
        if let Some(task) = tasks.get_mut(&id) {
            task.dependencies = kept;
        }
    }
    repairs
}

/// Clamp numeric fields back into range and re-normalize start dates.
fn repair_task_fields(tasks: &mut BTreeMap<i32, Task>) -> usize {
    let mut repairs = 0;
    for task in tasks.values_mut() {
        if task.duration_days < 1 {
            task.duration_days = 1;
            repairs += 1;
        }
        if task.crew_size < 1 {
            task.crew_size = 1;
            repairs += 1;
        }
        if task.progress > 100 {
            task.progress = 100;
            repairs += 1;
        }
        let normalized = crate::calendar::next_working_day(task.start_date, task.weekend_policy());
        if normalized != task.start_date {
            task.start_date = normalized;
            repairs += 1;
        }
    }
    repairs
}
