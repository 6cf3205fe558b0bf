//! Integration tests for the isolated policy
//!
//! All tests in this binary share one master context and the installed
//! context redirector, so each test uses its own property keys.

use guestbox::core::interrupt;
use guestbox::logging::handler::{Handler, LogRecord};
use guestbox::logging::isolating;
use guestbox::properties::ambient;
use guestbox::{
    BaseNamespace, Catalog, ExecutionContext, GuestFailure, GuestboxError, IsolatedSupervisor,
    LaunchSpec, Library, RunOutcome, Supervisor, SupervisorConfig,
};
use log::LevelFilter;
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier, Mutex, Once, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

type Seen = Arc<Mutex<Vec<String>>>;

fn seen() -> Seen {
    Arc::new(Mutex::new(Vec::new()))
}

fn supervisor(catalog: Catalog) -> IsolatedSupervisor {
    IsolatedSupervisor::new(
        SupervisorConfig::default(),
        Arc::new(catalog),
        Arc::new(BaseNamespace::builtin()),
    )
}

fn idle_library(location: &str) -> Library {
    Library::new(location).with_entry_point("idle", |_| Ok(()))
}

#[test]
fn test_overrides_are_per_context_and_ambient_stays_unset() {
    let sup = supervisor(Catalog::new().with_library(idle_library("app")));
    let spec = |x: &str| {
        LaunchSpec::new("idle")
            .with_code_location("app")
            .with_property("scenario.x", x)
    };

    let c1 = sup.launch(&spec("1")).unwrap();
    let c2 = sup.launch(&spec("2")).unwrap();
    c1.join().unwrap();
    c2.join().unwrap();

    assert_eq!(c1.get_property("scenario.x").as_deref(), Some("1"));
    assert_eq!(c2.get_property("scenario.x").as_deref(), Some("2"));
    assert_eq!(ambient::get_property("scenario.x"), None);
}

#[test]
fn test_guest_writes_are_invisible_to_other_contexts() {
    let observed = seen();
    let record = observed.clone();
    let library = Library::new("app")
        .with_entry_point("writer", |_| {
            ambient::set_property("isolation.k", "written");
            Ok(())
        })
        .with_entry_point("reader", move |_| {
            let value = ambient::get_property("isolation.k").unwrap_or_else(|| "unset".into());
            record.lock().unwrap().push(value);
            Ok(())
        });
    let sup = supervisor(Catalog::new().with_library(library));

    let writer = sup.launch(&LaunchSpec::new("writer").with_code_location("app")).unwrap();
    writer.join().unwrap();
    let reader = sup.launch(&LaunchSpec::new("reader").with_code_location("app")).unwrap();
    reader.join().unwrap();

    assert_eq!(writer.get_property("isolation.k").as_deref(), Some("written"));
    assert_eq!(*observed.lock().unwrap(), vec!["unset".to_string()]);
    assert_eq!(ambient::get_property("isolation.k"), None);
}

#[test]
fn test_child_keeps_snapshot_taken_at_launch() {
    let observed = seen();
    let record = observed.clone();
    let library = Library::new("app").with_entry_point("late_reader", move |_| {
        guestbox::receive()?;
        let value = ambient::get_property("snapshot.k").unwrap_or_default();
        record.lock().unwrap().push(value);
        Ok(())
    });
    let sup = supervisor(Catalog::new().with_library(library));

    ambient::set_property("snapshot.k", "1");
    let child = sup
        .launch(&LaunchSpec::new("late_reader").with_code_location("app"))
        .unwrap();
    ambient::set_property("snapshot.k", "2");
    child.send(Box::new(())).unwrap();
    child.join().unwrap();

    assert_eq!(*observed.lock().unwrap(), vec!["1".to_string()]);
    assert_eq!(ambient::get_property("snapshot.k").as_deref(), Some("2"));
}

#[test]
fn test_same_name_resolves_to_own_private_definition() {
    let observed = seen();
    let tagging = |location: &'static str| {
        let record = observed.clone();
        Library::new(location).with_entry_point("Tag", move |_| {
            record.lock().unwrap().push(location.to_string());
            Ok(())
        })
    };
    let catalog = Catalog::new()
        .with_library(tagging("lib-a"))
        .with_library(tagging("lib-b").with_entry_point("OnlyB", |_| Ok(())));
    let sup = supervisor(catalog);

    let a = sup.launch(&LaunchSpec::new("Tag").with_code_location("lib-a")).unwrap();
    a.join().unwrap();
    let b = sup.launch(&LaunchSpec::new("Tag").with_code_location("lib-b")).unwrap();
    b.join().unwrap();
    assert_eq!(*observed.lock().unwrap(), vec!["lib-a", "lib-b"]);

    let outcome = sup
        .run_sync(&LaunchSpec::new("OnlyB").with_code_location("lib-a"))
        .unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Failed(GuestFailure::EntryPointNotFound { ref name }) if name == "OnlyB"
    ));
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn test_guest_errors_and_panics_become_join_results() {
    let library = Library::new("app")
        .with_entry_point("ok", |_| Ok(()))
        .with_entry_point("fails", |args| anyhow::bail!("bad input: {}", args.join(",")))
        .with_entry_point("panics", |_| panic!("guest exploded"));
    let sup = supervisor(Catalog::new().with_library(library));
    let launch = |entry: &str| {
        sup.launch(
            &LaunchSpec::new(entry)
                .with_code_location("app")
                .with_args(["x", "y"]),
        )
        .unwrap()
    };

    assert!(launch("ok").join().is_ok());

    let failed = launch("fails");
    match failed.join() {
        Err(GuestFailure::Failed(cause)) => assert_eq!(cause.to_string(), "bad input: x,y"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(failed.is_terminated());

    match launch("panics").join() {
        Err(GuestFailure::Panicked { message }) => assert_eq!(message, "guest exploded"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Joining again reports the same recorded outcome.
    assert!(matches!(failed.join(), Err(GuestFailure::Failed(_))));
}

#[test]
fn test_launch_errors_create_no_context() {
    let sup = supervisor(Catalog::new().with_library(idle_library("app")));

    let missing = sup.launch(&LaunchSpec::new("idle").with_code_location("nowhere"));
    assert!(matches!(missing, Err(GuestboxError::CodeLocation(_))));

    let unnamed = sup.launch(&LaunchSpec::new(" "));
    assert!(matches!(unnamed, Err(GuestboxError::LaunchSpec(_))));

    let bad_key = sup.launch(&LaunchSpec::new("idle").with_property("a=b", "c"));
    assert!(matches!(bad_key, Err(GuestboxError::LaunchSpec(_))));
}

#[test]
fn test_two_guests_rendezvous_on_a_shared_barrier() {
    let finished = seen();
    let record = finished.clone();
    let library = Library::new("app").with_entry_point("meet", move |args| {
        let message = guestbox::receive()?;
        let barrier = message
            .downcast::<Arc<Barrier>>()
            .map_err(|_| anyhow::anyhow!("expected a barrier"))?;
        barrier.wait();
        record.lock().unwrap().push(args[0].clone());
        Ok(())
    });
    let sup = supervisor(Catalog::new().with_library(library));
    let barrier = Arc::new(Barrier::new(2));
    let spec = |name: &str| LaunchSpec::new("meet").with_code_location("app").with_args([name]);

    let first = sup.launch(&spec("first")).unwrap();
    first.send(Box::new(barrier.clone())).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(!first.is_terminated(), "first guest must wait for its partner");
    assert!(finished.lock().unwrap().is_empty());

    let second = sup.launch(&spec("second")).unwrap();
    second.send(Box::new(barrier)).unwrap();
    first.join().unwrap();
    second.join().unwrap();

    let mut names = finished.lock().unwrap().clone();
    names.sort();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn test_interrupted_join_waits_for_real_termination() {
    let library = Library::new("app").with_entry_point("stubborn", |_| {
        // The first interrupt is swallowed; the guest still finishes its work.
        let _ = interrupt::sleep(Duration::from_secs(10));
        let _ = interrupt::sleep(Duration::from_millis(100));
        Ok(())
    });
    let sup = supervisor(Catalog::new().with_library(library));
    let context = sup
        .launch(&LaunchSpec::new("stubborn").with_code_location("app"))
        .unwrap();

    let joined = context.clone();
    let (flag_tx, flag_rx) = std::sync::mpsc::channel();
    let joiner = thread::spawn(move || {
        flag_tx.send(interrupt::current_flag()).unwrap();
        let started = Instant::now();
        let outcome = joined.join();
        (outcome.is_ok(), joined.is_terminated(), interrupt::interrupted(), started.elapsed())
    });

    thread::sleep(Duration::from_millis(50));
    flag_rx.recv().unwrap().raise();

    let (ok, terminated, status_kept, elapsed) = joiner.join().unwrap();
    assert!(ok);
    assert!(terminated);
    assert!(status_kept, "join restores the caller's interrupt status");
    assert!(elapsed < Duration::from_secs(5), "interrupt was forwarded to the worker");
}

#[test]
fn test_interrupting_a_context_stops_a_sleeping_guest() {
    let library = Library::new("app").with_entry_point("nap", |_| {
        interrupt::sleep(Duration::from_secs(30))?;
        anyhow::bail!("slept through the interrupt")
    });
    let sup = supervisor(Catalog::new().with_library(library));
    let context = sup.launch(&LaunchSpec::new("nap").with_code_location("app")).unwrap();

    thread::sleep(Duration::from_millis(50));
    context.interrupt();
    assert!(context.join().is_ok(), "interruption ends the guest normally");
}

#[test]
fn test_spawned_threads_inherit_the_guest_context() {
    let observed = seen();
    let record = observed.clone();
    let library = Library::new("app").with_entry_point("forker", move |_| {
        let inherited = guestbox::spawn(|| ambient::get_property("inherit.k"));
        let plain = thread::spawn(|| ambient::get_property("inherit.k"));
        let inherited = inherited.join().unwrap().unwrap_or_default();
        let plain = plain.join().unwrap().unwrap_or_else(|| "master".into());
        record.lock().unwrap().extend([inherited, plain]);
        Ok(())
    });
    let sup = supervisor(Catalog::new().with_library(library));

    sup.launch(
        &LaunchSpec::new("forker")
            .with_code_location("app")
            .with_property("inherit.k", "guest"),
    )
    .unwrap()
    .join()
    .unwrap();

    assert_eq!(*observed.lock().unwrap(), vec!["guest", "master"]);
}

#[test]
fn test_worker_sets_code_path_property() {
    let sup = supervisor(
        Catalog::new()
            .with_library(idle_library("tools/one"))
            .with_library(Library::new("tools/two")),
    );
    let context = sup
        .launch(&LaunchSpec::new("idle").with_code_location("tools/*"))
        .unwrap();
    context.join().unwrap();

    assert_eq!(
        context.get_property("guest.code.path").as_deref(),
        Some("tools/*")
    );
    assert!(context.namespace().locations().starts_with(&[
        "tools/one".to_string(),
        "tools/two".to_string()
    ]));
}

/// Handler collecting `(context, message)` pairs.
struct Capture {
    level: RwLock<LevelFilter>,
    sink: Arc<Mutex<Vec<(Option<Uuid>, String)>>>,
}

impl Handler for Capture {
    fn publish(&self, record: &LogRecord) {
        self.sink
            .lock()
            .unwrap()
            .push((record.context_id, record.message.clone()));
    }
    fn set_level(&self, level: LevelFilter) {
        *self.level.write().unwrap() = level;
    }
    fn level(&self) -> LevelFilter {
        *self.level.read().unwrap()
    }
}

static LOGGER: Once = Once::new();

#[test]
fn test_guest_log_records_follow_context_configuration() {
    LOGGER.call_once(|| {
        let fallback = env_logger::Builder::new().is_test(true).build();
        isolating::install(Box::new(fallback), LevelFilter::Trace).unwrap();
    });

    let sink = Arc::new(Mutex::new(Vec::new()));
    let handler_sink = sink.clone();
    let library = Library::new("app")
        .with_entry_point("chatty", |args| {
            log::info!(target: "guest::chatty", "hello from {}", args[0]);
            log::debug!(target: "guest::chatty", "debug from {}", args[0]);
            Ok(())
        })
        .with_handler("test.Capture", move || {
            Box::new(Capture {
                level: RwLock::new(LevelFilter::Trace),
                sink: handler_sink.clone(),
            })
        });
    let sup = supervisor(Catalog::new().with_library(library));

    let configured = sup
        .launch(
            &LaunchSpec::new("chatty")
                .with_code_location("app")
                .with_args(["a"])
                .with_property("logging.handlers", "test.Capture")
                .with_property("logging.test.Capture.level", "INFO"),
        )
        .unwrap();
    configured.join().unwrap();
    let defaulted = sup
        .launch(&LaunchSpec::new("chatty").with_code_location("app").with_args(["b"]))
        .unwrap();
    defaulted.join().unwrap();

    let sink = sink.lock().unwrap();
    assert_eq!(*sink, vec![(Some(configured.id()), "hello from a".to_string())]);
    assert!(configured.logging().is_built());
}

#[test]
fn test_log_manager_is_shared_by_concurrent_callers() {
    let sup = supervisor(Catalog::new().with_library(idle_library("app")));
    let context: Arc<ExecutionContext> = sup
        .launch(&LaunchSpec::new("idle").with_code_location("app"))
        .unwrap();
    context.join().unwrap();

    let managers: Vec<_> = (0..8)
        .map(|_| {
            let context = context.clone();
            thread::spawn(move || context.logging().get_manager().unwrap())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert!(managers.iter().all(|m| Arc::ptr_eq(m, &managers[0])));
}

#[test]
fn test_default_root_logger_writes_to_the_console() {
    let sup = supervisor(Catalog::new().with_library(idle_library("app")));
    let context = sup
        .launch(&LaunchSpec::new("idle").with_code_location("app"))
        .unwrap();
    context.join().unwrap();

    assert_eq!(context.logging().handlers().unwrap().len(), 1);
    assert_eq!(context.logging().level().unwrap(), LevelFilter::Info);
}

#[test]
fn test_base_properties_of_a_later_supervisor_reach_its_guests() {
    let _first = supervisor(Catalog::new());
    let mut base_properties = BTreeMap::new();
    base_properties.insert("seeded.tier".to_string(), "prod".to_string());
    let second = IsolatedSupervisor::new(
        SupervisorConfig {
            base_properties,
            ..SupervisorConfig::default()
        },
        Arc::new(Catalog::new().with_library(idle_library("app"))),
        Arc::new(BaseNamespace::builtin()),
    );

    let context = second
        .launch(&LaunchSpec::new("idle").with_code_location("app"))
        .unwrap();
    context.join().unwrap();

    assert_eq!(context.get_property("seeded.tier").as_deref(), Some("prod"));
    assert_eq!(ambient::get_property("seeded.tier").as_deref(), Some("prod"));
}

#[test]
fn test_jar_launch_runs_the_declared_main() {
    let observed = seen();
    let record = observed.clone();
    let catalog = Catalog::new()
        .with_library(
            Library::new("apps/tool")
                .with_main("tool.Main")
                .with_entry_point("tool.Main", move |args| {
                    record.lock().unwrap().push(args.join(" "));
                    Ok(())
                }),
        )
        .with_library(idle_library("apps/bare"));
    let sup = supervisor(catalog);

    let spec = LaunchSpec::parse_args(&["-Djar.k=v", "-jar", "apps/tool", "hi", "-x"]).unwrap();
    let context = sup.launch(&spec).unwrap();
    context.join().unwrap();

    assert_eq!(*observed.lock().unwrap(), vec!["hi -x".to_string()]);
    assert_eq!(context.label(), "tool.Main");
    assert_eq!(context.get_property("jar.k").as_deref(), Some("v"));
    assert_eq!(context.get_property("guest.code.path").as_deref(), Some("apps/tool"));

    match sup.launch(&LaunchSpec::main_of("apps/bare")) {
        Err(GuestboxError::LaunchSpec(message)) => assert!(message.contains("declares no main")),
        other => panic!("unexpected launch result: {other:?}"),
    }
}
