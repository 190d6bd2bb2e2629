use ai_tools::{TraceBuffer, TraceEvent, TraceKind};

fn event(i: u64) -> TraceEvent {
    TraceEvent::new(TraceKind::ActionStart, 1, format!("event {i}")).at(i, i as f64 * 0.5)
}

#[test]
fn push_keeps_insertion_order_until_full() {
    let mut buffer = TraceBuffer::new(4);
    for i in 0..3 {
        buffer.push(event(i));
    }

    assert_eq!(buffer.len(), 3);
    let ticks: Vec<u64> = buffer.iter().map(|e| e.tick).collect();
    assert_eq!(ticks, vec![0, 1, 2]);
}

#[test]
fn full_buffer_evicts_oldest() {
    let mut buffer = TraceBuffer::new(3);
    for i in 0..5 {
        buffer.push(event(i));
    }

    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.capacity(), 3);
    assert_eq!(buffer.total_pushed(), 5);
    let ticks: Vec<u64> = buffer.iter().map(|e| e.tick).collect();
    assert_eq!(ticks, vec![2, 3, 4]);
}

#[test]
fn recent_returns_newest_events_oldest_first() {
    let mut buffer = TraceBuffer::new(8);
    for i in 0..6 {
        buffer.push(event(i));
    }

    let recent: Vec<u64> = buffer.recent(2).iter().map(|e| e.tick).collect();
    assert_eq!(recent, vec![4, 5]);

    assert_eq!(buffer.recent(100).len(), 6);
    assert!(buffer.recent(0).is_empty());
}

#[test]
fn clear_empties_but_keeps_capacity() {
    let mut buffer = TraceBuffer::new(2);
    buffer.push(event(0));
    buffer.clear();

    assert!(buffer.is_empty());
    assert_eq!(buffer.capacity(), 2);
    assert!(buffer.recent(5).is_empty());
}

#[test]
fn display_includes_kind_message_and_extra() {
    let event = TraceEvent::new(TraceKind::PlanFound, 7, "plan found")
        .at(3, 1.5)
        .with_extra("cost", 2);
    let text = event.to_string();
    assert!(text.contains("#7"));
    assert!(text.contains("PlanFound"));
    assert!(text.contains("plan found"));
    assert!(text.contains("cost=2"));
}
