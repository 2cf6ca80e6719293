//! End-to-end lifecycle tests through the public API.

#![expect(unused_crate_dependencies, reason = "only the public api is used here")]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use strata_lifecycle::*;
use tokio::time::{self, timeout};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Eq, PartialEq)]
enum Event {
    Starting,
    Running,
    Stopping(State),
    Terminated(State),
    Failed(State, String),
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    fn push(&self, ev: Event) {
        self.events.lock().unwrap().push(ev);
    }

    /// Waits until a terminal notification has been seen and returns
    /// everything seen.
    async fn finished(&self) -> Vec<Event> {
        timeout(WAIT, async {
            loop {
                let done = self
                    .events
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|e| matches!(e, Event::Terminated(_) | Event::Failed(..)));
                if done {
                    break;
                }
                time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("test: terminal notification");
        self.events.lock().unwrap().clone()
    }
}

impl Listener for Recorder {
    fn starting(&self) {
        self.push(Event::Starting);
    }

    fn running(&self) {
        self.push(Event::Running);
    }

    fn stopping(&self, from: State) {
        self.push(Event::Stopping(from));
    }

    fn terminated(&self, from: State) {
        self.push(Event::Terminated(from));
    }

    fn failed(&self, from: State, failure: &anyhow::Error) {
        self.push(Event::Failed(from, failure.to_string()));
    }
}

fn ok_hook() -> StartingFn {
    hook(|_| async { Ok(()) })
}

#[tokio::test]
async fn idle_service_full_cycle() {
    let rec = Recorder::default();
    let svc = idle_builder(ok_hook(), ok_hook())
        .with_name("idle")
        .with_listener(rec.clone())
        .build();

    svc.start_async().expect("test: start");
    svc.await_running().await.expect("test: running");
    svc.stop_async();
    timeout(WAIT, svc.await_terminated())
        .await
        .expect("test: no hang")
        .expect("test: terminated");

    assert_eq!(
        rec.finished().await,
        vec![
            Event::Starting,
            Event::Running,
            Event::Stopping(State::Running),
            Event::Terminated(State::Stopping),
        ]
    );
}

#[tokio::test]
async fn timer_service_failure_reported_to_listener() {
    let rec = Recorder::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();

    let svc = timer_builder(
        Duration::from_millis(2),
        ok_hook(),
        iteration(move |_| {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 2 {
                    anyhow::bail!("disk full");
                }
                Ok(())
            }
        }),
        ok_hook(),
    )
    .expect("test: build timer")
    .with_listener(rec.clone())
    .build();

    svc.start_async().expect("test: start");
    let err = timeout(WAIT, svc.await_terminated())
        .await
        .expect("test: no hang")
        .expect_err("test: should fail");
    assert!(matches!(err, ServiceError::Failed { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(
        rec.finished().await,
        vec![
            Event::Starting,
            Event::Running,
            Event::Stopping(State::Running),
            Event::Failed(State::Stopping, "disk full".to_owned()),
        ]
    );
}

#[tokio::test]
async fn starting_failure_sequence() {
    let rec = Recorder::default();
    let svc = new_idle_service(
        hook(|_| async { Err(anyhow::anyhow!("port in use")) }),
        ok_hook(),
    );
    svc.add_listener(rec.clone());

    svc.start_async().expect("test: start");
    assert!(svc.await_terminated().await.is_err());

    assert_eq!(
        rec.finished().await,
        vec![
            Event::Starting,
            Event::Failed(State::Starting, "port in use".to_owned()),
        ]
    );
}

#[tokio::test]
async fn func_listener_only_failed() {
    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    let listener = new_listener(
        None,
        None,
        None,
        None,
        Some(Box::new(move |from: State, e: &anyhow::Error| {
            *s.lock().unwrap() = Some((from, e.to_string()));
        })),
    );

    let svc = new_idle_service(
        ok_hook(),
        hook(|_| async { Err(anyhow::anyhow!("cleanup failed")) }),
    );
    svc.add_listener(listener);
    svc.start_async().expect("test: start");
    svc.await_running().await.expect("test: running");
    svc.stop_async();
    assert!(svc.await_terminated().await.is_err());

    timeout(WAIT, async {
        while seen.lock().unwrap().is_none() {
            time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("test: failed notification");

    assert_eq!(
        *seen.lock().unwrap(),
        Some((State::Stopping, "cleanup failed".to_owned()))
    );
}

#[tokio::test]
async fn monitor_reports_json() {
    let svc = new_idle_service(ok_hook(), ok_hook());
    let mon = svc.monitor();
    assert_eq!(mon.get_current(), State::New);

    svc.start_async().expect("test: start");
    svc.await_running().await.expect("test: running");

    let j = mon.fetch_status_json().expect("test: json");
    assert_eq!(j["state"], "Running");
    assert_eq!(j["name"], "service");

    svc.stop_async();
    assert_eq!(mon.wait_terminal().await.expect("test: wait"), State::Terminated);
}
