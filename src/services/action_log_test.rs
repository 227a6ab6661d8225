use super::*;
use serde_json::json;
use std::collections::HashMap;

fn stroke(x: f64) -> Action {
    Action::Draw(DrawStroke {
        tool: Tool::Pen,
        color: "#112233".into(),
        size: 3,
        points: vec![Point { x, y: x }],
    })
}

fn text(content: &str) -> Action {
    Action::Text(json!({"content": content, "x": 0.0, "y": 0.0, "font": "16px Arial", "color": "#000000"}))
}

/// Minimal canvas model: what is visible after replaying actions in order.
fn replay(actions: &[Action]) -> Vec<Action> {
    let mut canvas = Vec::new();
    for action in actions {
        if action.is_clear() {
            canvas.clear();
        } else {
            canvas.push(action.clone());
        }
    }
    canvas
}

// =============================================================================
// append / snapshot
// =============================================================================

#[test]
fn new_log_is_empty() {
    let log = ActionLog::new();
    assert!(log.snapshot().is_empty());
    assert_eq!(log.stats(), LogStats { entries: 0, last_seq: 0, compacted: 0 });
}

#[test]
fn append_assigns_increasing_sequence_numbers() {
    let log = ActionLog::new();
    assert_eq!(log.append(stroke(1.0)), 1);
    assert_eq!(log.append(text("a")), 2);
    assert_eq!(log.append(Action::Clear), 3);
    assert_eq!(log.append(stroke(2.0)), 4);
}

#[test]
fn snapshot_preserves_append_order() {
    let log = ActionLog::new();
    log.append(stroke(1.0));
    log.append(text("a"));
    log.append(stroke(2.0));
    assert_eq!(log.snapshot(), vec![stroke(1.0), text("a"), stroke(2.0)]);
}

#[test]
fn snapshot_is_a_copy() {
    let log = ActionLog::new();
    log.append(stroke(1.0));
    let before = log.snapshot();
    log.append(stroke(2.0));
    assert_eq!(before.len(), 1);
    assert_eq!(log.snapshot().len(), 2);
}

// =============================================================================
// clear compaction
// =============================================================================

#[test]
fn clear_drops_earlier_entries_and_is_retained_as_head() {
    let log = ActionLog::new();
    log.append(stroke(1.0));
    log.append(stroke(2.0));
    log.append(Action::Clear);

    assert!(log.snapshot().is_empty());
    let history = log.history();
    assert_eq!(history.len(), 1);
    assert!(history[0].action.is_clear());
    assert_eq!(history[0].seq, 3);
    assert_eq!(log.stats(), LogStats { entries: 1, last_seq: 3, compacted: 2 });
}

#[test]
fn actions_after_clear_are_kept() {
    let log = ActionLog::new();
    log.append(stroke(1.0));
    log.append(Action::Clear);
    log.append(text("after"));
    assert_eq!(log.snapshot(), vec![text("after")]);
}

#[test]
fn clear_on_empty_log() {
    let log = ActionLog::new();
    log.append(Action::Clear);
    assert!(log.snapshot().is_empty());
    assert_eq!(log.stats().compacted, 0);
}

#[test]
fn repeated_clears_keep_only_latest() {
    let log = ActionLog::new();
    log.append(Action::Clear);
    log.append(Action::Clear);
    let history = log.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].seq, 2);
    assert_eq!(log.stats().compacted, 1);
}

#[test]
fn snapshot_replays_to_same_canvas_as_full_history() {
    let all = vec![
        stroke(1.0),
        text("a"),
        Action::Clear,
        stroke(2.0),
        stroke(3.0),
        Action::Clear,
        text("b"),
        stroke(4.0),
    ];
    for cut in 0..=all.len() {
        let log = ActionLog::new();
        for action in &all[..cut] {
            log.append(action.clone());
        }
        assert_eq!(replay(&log.snapshot()), replay(&all[..cut]), "prefix of {cut} actions");
    }
}

// =============================================================================
// locked callbacks
// =============================================================================

#[test]
fn append_with_sees_the_new_entry() {
    let log = ActionLog::new();
    log.append(stroke(1.0));
    let (seq, kind) = log.append_with(text("x"), |entry| (entry.seq, entry.action.kind()));
    assert_eq!(seq, 2);
    assert_eq!(kind, "text");
}

#[test]
fn snapshot_with_passes_current_actions() {
    let log = ActionLog::new();
    log.append(stroke(1.0));
    let n = log.snapshot_with(|actions| actions.len());
    assert_eq!(n, 1);
}

#[test]
fn concurrent_appends_get_unique_contiguous_sequence_numbers() {
    let log = Arc::new(ActionLog::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                (0..50)
                    .map(|i| log.append(stroke(f64::from(t * 100 + i))))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut seqs: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=400).collect::<Vec<u64>>());
    assert_eq!(log.snapshot().len(), 400);
}

#[test]
fn per_thread_order_is_preserved_in_snapshot() {
    let log = Arc::new(ActionLog::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                for i in 0..25 {
                    log.append(stroke(f64::from(t * 1000 + i)));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let mut last: HashMap<i64, f64> = HashMap::new();
    for action in log.snapshot() {
        let Action::Draw(s) = action else { panic!("only strokes appended") };
        #[allow(clippy::cast_possible_truncation)]
        let thread = (s.points[0].x / 1000.0).floor() as i64;
        if let Some(prev) = last.insert(thread, s.points[0].x) {
            assert!(s.points[0].x > prev, "thread {thread} out of order");
        }
    }
}

#[test]
fn action_serde_shapes() {
    assert_eq!(serde_json::to_value(Action::Clear).unwrap(), json!({"type": "clear"}));
    let v = serde_json::to_value(stroke(5.0)).unwrap();
    assert_eq!(v["type"], "draw");
    assert_eq!(v["payload"]["size"], 3);
}
