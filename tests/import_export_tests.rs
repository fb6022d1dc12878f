use chrono::NaiveDate;
use planboard::layout::{Lane, Slot};
use planboard::{Planner, PlannerSnapshot, Task, TaskDraft};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn monday() -> NaiveDate {
    d(2025, 3, 3)
}

fn build_sample_planner() -> Planner {
    let mut planner = Planner::new();
    planner.set_project_name("Site 12");
    let second = planner.add_lane("Finishes");

    let a = planner
        .add_task(TaskDraft::new("Excavate", monday(), 3).with_trade("earthworks"))
        .unwrap();
    let b = planner
        .add_task(
            TaskDraft::new("Foundations", d(2025, 3, 6), 5)
                .with_trade("concrete")
                .with_weekends(true, false),
        )
        .unwrap();
    let c = planner
        .add_task(TaskDraft::new("Paint", d(2025, 3, 17), 4).in_lane(second))
        .unwrap();
    planner.add_dependency(b, a).unwrap();
    planner.add_dependency(c, b).unwrap();
    planner.set_trade_visible("earthworks", false);
    planner
}

/// Every task's lane_id names exactly one lane that lists it exactly once,
/// and every listed id is a live task pointing back at that lane.
fn assert_lane_bijection(planner: &Planner) {
    for task in planner.tasks() {
        let holders: Vec<_> = planner
            .lanes()
            .iter()
            .filter(|lane| lane.contains_task(task.id))
            .collect();
        assert_eq!(holders.len(), 1, "task {} held by {} lanes", task.id, holders.len());
        assert_eq!(holders[0].id, task.lane_id, "task {} lane_id mismatch", task.id);
        let occurrences = holders[0]
            .task_order
            .iter()
            .filter(|id| **id == task.id)
            .count();
        assert_eq!(occurrences, 1);
    }
    for lane in planner.lanes() {
        for id in &lane.task_order {
            let task = planner.task(*id).expect("lane lists unknown task");
            assert_eq!(task.lane_id, lane.id);
            assert!(lane.positions.contains_key(id), "task {id} has no slot");
        }
    }
}

#[test]
fn export_import_round_trip_preserves_state() {
    let planner = build_sample_planner();
    let snapshot = planner.export_state();

    let mut restored = Planner::new();
    let repairs = restored.import_state(snapshot.clone());
    assert_eq!(repairs, 0, "a clean snapshot needs no repairs");

    assert_eq!(restored.meta().name, "Site 12");
    assert_eq!(restored.export_state(), snapshot);
    assert_eq!(restored.trade_filter().get("earthworks"), Some(&false));
    assert_lane_bijection(&restored);
}

#[test]
fn import_is_idempotent() {
    let snapshot = build_sample_planner().export_state();
    let mut planner = Planner::new();
    planner.import_state(snapshot);
    let again = planner.export_state();
    assert_eq!(planner.import_state(again.clone()), 0);
    assert_eq!(planner.export_state(), again);
}

#[test]
fn new_tasks_after_import_get_unused_ids() {
    let snapshot = build_sample_planner().export_state();
    let mut planner = Planner::new();
    planner.import_state(snapshot);

    let existing: Vec<i32> = planner.tasks().map(|task| task.id).collect();
    let id = planner.add_task(TaskDraft::new("New", monday(), 1)).unwrap();
    assert!(!existing.contains(&id));
}

#[test]
fn unknown_lane_reference_is_repaired_into_the_first_lane() {
    let mut snapshot = build_sample_planner().export_state();
    let task_id = snapshot.tasks[0].id;
    snapshot.tasks[0].lane_id = 999;
    // Scrub the stale membership the exporting lane still carries.
    for lane in &mut snapshot.lanes {
        lane.task_order.retain(|id| *id != task_id);
        lane.positions.remove(&task_id);
    }

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 1);

    let first_lane = planner.lanes()[0].id;
    let task = planner.task(task_id).unwrap();
    assert_eq!(task.lane_id, first_lane);

    let lane = planner.lane(first_lane).unwrap();
    let slot = lane.positions[&task_id];
    assert!(slot.y >= lane.offset_y && slot.y < lane.offset_y + lane.height);
    assert_lane_bijection(&planner);

    // Running the validator again finds nothing left to fix.
    assert_eq!(planner.validate_and_repair(), 0);
}

#[test]
fn membership_is_rebuilt_from_the_tasks_own_lane_id() {
    let mut snapshot = build_sample_planner().export_state();
    // Claim the first task in every lane's list; its own lane_id wins.
    let task_id = snapshot.tasks[0].id;
    let home = snapshot.tasks[0].lane_id;
    for lane in &mut snapshot.lanes {
        if !lane.task_order.contains(&task_id) {
            lane.task_order.push(task_id);
        }
    }

    let mut planner = Planner::new();
    planner.import_state(snapshot);
    assert_eq!(planner.task(task_id).unwrap().lane_id, home);
    assert_lane_bijection(&planner);
}

#[test]
fn duplicate_lane_ids_are_relabeled() {
    let mut snapshot = build_sample_planner().export_state();
    let clone_id = snapshot.lanes[0].id;
    let mut extra = Lane::new(clone_id, "Impostor");
    extra.offset_y = 400.0;
    snapshot.lanes.push(extra);

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 1);

    let mut ids: Vec<i32> = planner.lanes().iter().map(|lane| lane.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), planner.lanes().len());
    assert_eq!(planner.validate_and_repair(), 0);
}

#[test]
fn duplicate_task_ids_are_reassigned_not_dropped() {
    let mut snapshot = build_sample_planner().export_state();
    let mut clone = snapshot.tasks[0].clone();
    clone.name = "Duplicate".to_string();
    snapshot.tasks.push(clone);

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 1);
    assert_eq!(planner.task_count(), 4);
    assert_lane_bijection(&planner);
}

#[test]
fn missing_filter_entries_default_to_visible() {
    let mut snapshot = build_sample_planner().export_state();
    snapshot.trade_filter.clear();

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 1);
    for trade in ["earthworks", "concrete"] {
        assert_eq!(planner.trade_filter().get(trade), Some(&true));
    }
}

#[test]
fn hostile_dependency_lists_are_cleaned_up() {
    let mut snapshot = build_sample_planner().export_state();
    let a = snapshot.tasks[0].id;
    let b = snapshot.tasks[1].id;
    snapshot.tasks[0].dependencies = vec![a, 424242, b, b];
    // tasks[1] already depends on a, closing a cycle with the edge above.

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 3);

    // Self-reference, dangling id, and duplicate are gone; one direction
    // of the a<->b pair survived.
    let deps_a = &planner.task(a).unwrap().dependencies;
    let deps_b = &planner.task(b).unwrap().dependencies;
    assert!(!deps_a.contains(&a));
    assert!(!deps_a.contains(&424242));
    assert!(deps_a.contains(&b) ^ deps_b.contains(&a));
    assert_eq!(planner.validate_and_repair(), 0);
}

#[test]
fn broken_positions_are_reassigned_within_bounds() {
    let mut snapshot = build_sample_planner().export_state();
    let lane_id = snapshot.tasks[0].lane_id;
    let task_id = snapshot.tasks[0].id;
    let lane = snapshot
        .lanes
        .iter_mut()
        .find(|lane| lane.id == lane_id)
        .unwrap();
    lane.positions.insert(
        task_id,
        Slot {
            x: 10.0,
            y: f64::NAN,
        },
    );

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 1);

    let lane = planner.lane(lane_id).unwrap();
    let slot = lane.positions[&task_id];
    assert!(slot.y.is_finite());
    assert!(slot.y >= lane.offset_y && slot.y < lane.offset_y + lane.height);
    assert_eq!(planner.validate_and_repair(), 0);
}

#[test]
fn out_of_band_positions_are_pulled_back() {
    let mut snapshot = build_sample_planner().export_state();
    let lane_id = snapshot.tasks[0].lane_id;
    let task_id = snapshot.tasks[0].id;
    let lane = snapshot
        .lanes
        .iter_mut()
        .find(|lane| lane.id == lane_id)
        .unwrap();
    lane.positions.insert(task_id, Slot { x: 0.0, y: 5000.0 });

    let mut planner = Planner::new();
    assert!(planner.import_state(snapshot) >= 1);
    let lane = planner.lane(lane_id).unwrap();
    let slot = lane.positions[&task_id];
    assert!(slot.y >= lane.offset_y && slot.y < lane.offset_y + lane.height);
}

#[test]
fn snapshot_with_tasks_but_no_lanes_grows_one() {
    let mut snapshot = PlannerSnapshot::default();
    snapshot.tasks.push(Task::new(5, "Lonely", monday(), 2));

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 1);
    assert_eq!(planner.lanes().len(), 1);
    assert_eq!(planner.task(5).unwrap().lane_id, planner.lanes()[0].id);
    assert_lane_bijection(&planner);
}

#[test]
fn partially_malformed_json_still_imports() {
    let raw = r#"{
        "tasks": [
            { "id": 3, "name": "Bare" },
            { "name": "No id at all", "duration_days": -4, "progress": 240 }
        ],
        "lanes": [ { "id": 1 } ]
    }"#;
    let snapshot: PlannerSnapshot = serde_json::from_str(raw).unwrap();

    let mut planner = Planner::new();
    let repairs = planner.import_state(snapshot);
    assert!(repairs >= 1);
    assert_eq!(planner.task_count(), 2);
    for task in planner.tasks() {
        assert!(task.duration_days >= 1);
        assert!(task.progress <= 100);
    }
    assert_lane_bijection(&planner);
}

#[test]
fn weekend_starts_in_snapshots_are_normalized() {
    let mut snapshot = PlannerSnapshot::default();
    snapshot.lanes.push(Lane::new(1, "Only"));
    // 2025-03-08 is a Saturday.
    snapshot.tasks.push(Task::new(9, "Drifted", d(2025, 3, 8), 2));

    let mut planner = Planner::new();
    assert!(planner.import_state(snapshot) >= 1);
    assert_eq!(planner.task(9).unwrap().start_date, d(2025, 3, 10));
}

#[test]
fn bijection_survives_a_busy_editing_session() {
    let mut planner = build_sample_planner();
    let third = planner.add_lane("Third");
    let ids: Vec<i32> = planner.tasks().map(|task| task.id).collect();

    planner.move_task(ids[0], d(2025, 3, 11), Some(third)).unwrap();
    planner.move_lane(2, 0);
    planner.select_task(ids[1]).unwrap();
    planner.copy_selection();
    planner.paste_at(d(2025, 3, 24), third).unwrap();
    planner.remove_task(ids[2]).unwrap();
    planner.relayout_lane(third).unwrap();

    assert_lane_bijection(&planner);
    assert_eq!(planner.validate_and_repair(), 0);

    let snapshot = planner.export_state();
    let mut restored = Planner::new();
    assert_eq!(restored.import_state(snapshot), 0);
    assert_lane_bijection(&restored);
}
