//! End-to-end dispatch scenarios: a three-level event family, a standalone
//! event type, RAII handles, and cross-thread publishing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fanout_bus::{dispatch_as, Event, EventBus, ScopedSubscription};

// --- Event family under test ---

#[derive(Default)]
struct BaseEvent {
    sequence: u32,
}
dispatch_as!(BaseEvent);

#[derive(Default)]
struct DerivedEvent {
    base: BaseEvent,
}

impl AsRef<BaseEvent> for DerivedEvent {
    fn as_ref(&self) -> &BaseEvent {
        &self.base
    }
}
dispatch_as!(DerivedEvent => BaseEvent);

#[derive(Default)]
struct VeryDerivedEvent {
    derived: DerivedEvent,
}

impl AsRef<DerivedEvent> for VeryDerivedEvent {
    fn as_ref(&self) -> &DerivedEvent {
        &self.derived
    }
}
dispatch_as!(VeryDerivedEvent => DerivedEvent);

struct PlainEvent;
impl Event for PlainEvent {}

fn counting<E: Event>(hits: &Arc<AtomicUsize>) -> impl Fn(&E) + Send + Sync + 'static {
    let hits = Arc::clone(hits);
    move |_: &E| {
        hits.fetch_add(1, Ordering::Relaxed);
    }
}

// --- Scenarios ---

#[test]
fn base_event_single_publish() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let _sub = ScopedSubscription::subscribe(&bus, counting::<BaseEvent>(&calls)).unwrap();
    bus.publish(&BaseEvent::default());
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn derived_event_fans_out_to_base() {
    let bus = EventBus::new();
    let base_calls = Arc::new(AtomicUsize::new(0));
    let derived_calls = Arc::new(AtomicUsize::new(0));

    let base_cookie = bus.subscribe(counting::<BaseEvent>(&base_calls)).unwrap();
    let derived_cookie = bus
        .subscribe(counting::<DerivedEvent>(&derived_calls))
        .unwrap();

    bus.publish(&BaseEvent::default());
    assert_eq!(base_calls.load(Ordering::Relaxed), 1);
    assert_eq!(derived_calls.load(Ordering::Relaxed), 0);

    bus.publish(&DerivedEvent::default());
    assert_eq!(base_calls.load(Ordering::Relaxed), 2);
    assert_eq!(derived_calls.load(Ordering::Relaxed), 1);

    bus.unsubscribe(base_cookie).unwrap();
    bus.publish(&DerivedEvent::default());
    assert_eq!(base_calls.load(Ordering::Relaxed), 2);
    assert_eq!(derived_calls.load(Ordering::Relaxed), 2);

    bus.unsubscribe(derived_cookie).unwrap();
    bus.publish(&DerivedEvent::default());
    assert_eq!(base_calls.load(Ordering::Relaxed), 2);
    assert_eq!(derived_calls.load(Ordering::Relaxed), 2);
}

#[test]
fn very_derived_event_walks_whole_chain() {
    let bus = EventBus::new();
    let derived_calls = Arc::new(AtomicUsize::new(0));
    let very_derived_calls = Arc::new(AtomicUsize::new(0));

    let _very_derived_sub =
        ScopedSubscription::subscribe(&bus, counting::<VeryDerivedEvent>(&very_derived_calls))
            .unwrap();
    let _derived_sub =
        ScopedSubscription::subscribe(&bus, counting::<DerivedEvent>(&derived_calls)).unwrap();

    bus.publish(&BaseEvent::default());
    assert_eq!(derived_calls.load(Ordering::Relaxed), 0);
    assert_eq!(very_derived_calls.load(Ordering::Relaxed), 0);

    bus.publish(&DerivedEvent::default());
    assert_eq!(derived_calls.load(Ordering::Relaxed), 1);
    assert_eq!(very_derived_calls.load(Ordering::Relaxed), 0);

    bus.publish(&VeryDerivedEvent::default());
    assert_eq!(derived_calls.load(Ordering::Relaxed), 2);
    assert_eq!(very_derived_calls.load(Ordering::Relaxed), 1);
}

#[test]
fn plain_event_dispatches_as_itself() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let _sub = ScopedSubscription::subscribe(&bus, counting::<PlainEvent>(&calls)).unwrap();
    bus.publish(&PlainEvent);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[test]
fn chain_delivery_is_most_derived_first() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["base-1", "base-2"] {
        let order = Arc::clone(&order);
        bus.subscribe(move |_: &BaseEvent| order.lock().unwrap().push(tag))
            .unwrap();
    }
    {
        let order = Arc::clone(&order);
        bus.subscribe(move |_: &DerivedEvent| order.lock().unwrap().push("derived"))
            .unwrap();
    }

    bus.publish(&DerivedEvent::default());
    assert_eq!(
        *order.lock().unwrap(),
        vec!["derived", "base-1", "base-2"]
    );
}

#[test]
fn ancestor_handlers_see_the_embedded_view() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let seen = Arc::clone(&seen);
        bus.subscribe(move |event: &BaseEvent| seen.lock().unwrap().push(event.sequence))
            .unwrap();
    }

    let event = DerivedEvent {
        base: BaseEvent { sequence: 42 },
    };
    bus.publish(&event);
    assert_eq!(*seen.lock().unwrap(), vec![42]);
}

#[test]
fn raii_scope_and_reassignment() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));

    {
        let _sub = ScopedSubscription::subscribe(&bus, counting::<BaseEvent>(&calls)).unwrap();
        bus.publish(&BaseEvent::default());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    // Subscription left scope with it.
    bus.publish(&BaseEvent::default());
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    let mut sub = ScopedSubscription::new();
    sub.assign(&bus, counting::<BaseEvent>(&calls)).unwrap();
    bus.publish(&BaseEvent::default());
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn empty_scoped_subscription_drops_cleanly() {
    let _sub: ScopedSubscription<'_, PlainEvent> = ScopedSubscription::new();
}

// --- Cross-thread behavior ---

#[test]
fn subscribe_before_publish_is_visible_across_threads() {
    let bus = Arc::new(EventBus::new());
    let calls = Arc::new(AtomicUsize::new(0));

    bus.subscribe(counting::<BaseEvent>(&calls)).unwrap();

    let publisher = {
        let bus = Arc::clone(&bus);
        std::thread::spawn(move || {
            for sequence in 0..100 {
                bus.publish(&BaseEvent { sequence });
            }
        })
    };
    publisher.join().unwrap();

    assert_eq!(calls.load(Ordering::Relaxed), 100);
}

#[test]
fn concurrent_family_publishes_count_exactly() {
    let bus = Arc::new(EventBus::new());
    let base_calls = Arc::new(AtomicUsize::new(0));
    let derived_calls = Arc::new(AtomicUsize::new(0));

    bus.subscribe(counting::<BaseEvent>(&base_calls)).unwrap();
    bus.subscribe(counting::<DerivedEvent>(&derived_calls))
        .unwrap();

    let mut publishers = Vec::new();
    for _ in 0..2 {
        let bus = Arc::clone(&bus);
        publishers.push(std::thread::spawn(move || {
            for _ in 0..500 {
                bus.publish(&DerivedEvent::default());
            }
        }));
    }
    for _ in 0..2 {
        let bus = Arc::clone(&bus);
        publishers.push(std::thread::spawn(move || {
            for _ in 0..500 {
                bus.publish(&BaseEvent::default());
            }
        }));
    }
    for publisher in publishers {
        publisher.join().unwrap();
    }

    // Base handler fires for both event types; derived only for derived.
    assert_eq!(base_calls.load(Ordering::Relaxed), 2_000);
    assert_eq!(derived_calls.load(Ordering::Relaxed), 1_000);
}
