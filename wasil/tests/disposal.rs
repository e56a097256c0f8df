mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use wasil::prelude::*;

/// Teardown order as observed by the hooks.
#[derive(Clone, Debug, Default)]
struct Log(Arc<Mutex<Vec<&'static str>>>);

impl Log {
    fn push(&self, name: &'static str) {
        self.0.lock().push(name);
    }

    fn entries(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }
}

#[derive(Debug)]
struct Handle {
    name: &'static str,
    log: Log,
    fail: bool,
}

impl Dispose for Handle {
    fn dispose(&self) -> Result<(), BoxError> {
        self.log.push(self.name);
        if self.fail {
            Err(format!("{} could not close", self.name).into())
        } else {
            Ok(())
        }
    }
}

fn handle(name: &'static str, log: &Log, fail: bool) -> Service<Handle> {
    let log = log.clone();
    Service::factory(vec![], move |_| {
        Ok(Handle {
            name,
            log: log.clone(),
            fail,
        })
    })
    .named(name)
    .disposable()
}

#[test]
fn scope_disposes_in_reverse_construction_order() {
    common::init_tracing();
    let log = Log::default();
    let provider = ServiceCollection::new()
        .add_scoped(handle("x", &log, false))
        .add_scoped(handle("y", &log, false))
        .add_scoped(handle("z", &log, false))
        .build_provider()
        .unwrap();

    let scope = provider.create_scope();
    for name in ["x", "y", "z"] {
        scope.resolve_named::<Handle>(name).unwrap();
    }
    scope.dispose().unwrap();

    assert_eq!(log.entries(), vec!["z", "y", "x"]);
    assert!(matches!(
        scope.resolve_named::<Handle>("x"),
        Err(WasilError::ScopeDisposed)
    ));
}

#[test]
fn failing_hook_is_reported_after_the_rest_run() {
    common::init_tracing();
    let log = Log::default();
    let provider = ServiceCollection::new()
        .add_scoped(handle("x", &log, false))
        .add_scoped(handle("y", &log, true))
        .add_scoped(handle("z", &log, false))
        .build_provider()
        .unwrap();

    let scope = provider.create_scope();
    for name in ["x", "y", "z"] {
        scope.resolve_named::<Handle>(name).unwrap();
    }

    let err = scope.dispose().unwrap_err();
    assert_eq!(log.entries(), vec!["z", "y", "x"]);
    match err {
        WasilError::Disposal(disposal) => {
            assert_eq!(disposal.failures.len(), 1);
            assert_eq!(disposal.failures[0].key, ServiceKey::named::<Handle>("y"));
            assert!(disposal.failures[0].source.to_string().contains("y could not close"));
        }
        other => panic!("Expected Disposal, got: {other:?}"),
    }

    // Second call is a no-op.
    scope.dispose().unwrap();
    assert_eq!(log.entries().len(), 3);
}

#[test]
fn provider_disposes_singletons_only() {
    common::init_tracing();
    let log = Log::default();
    let provider = ServiceCollection::new()
        .add_singleton(handle("pool", &log, false))
        .add_transient(handle("job", &log, false))
        .build_provider()
        .unwrap();

    // A transient resolved from the provider belongs to its caller.
    let job = provider.resolve_named::<Handle>("job").unwrap();
    provider.dispose().unwrap();

    assert_eq!(log.entries(), vec!["pool"]);
    assert_eq!(job.name, "job");
    assert!(provider.is_disposed());
    assert!(matches!(
        provider.resolve_named::<Handle>("pool"),
        Err(WasilError::ProviderDisposed)
    ));
    assert!(matches!(
        provider.create_scope().resolve_named::<Handle>("job"),
        Err(WasilError::ProviderDisposed)
    ));
}

#[test]
fn dispose_while_building_tears_down_the_instance() {
    use std::sync::Barrier;
    use std::thread;

    common::init_tracing();
    let log = Log::default();
    let started = Arc::new(Barrier::new(2));
    let resume = Arc::new(Barrier::new(2));

    let factory_log = log.clone();
    let (factory_started, factory_resume) = (started.clone(), resume.clone());
    let provider = ServiceCollection::new()
        .add_scoped(
            Service::factory(vec![], move |_| {
                factory_started.wait();
                factory_resume.wait();
                Ok(Handle {
                    name: "slow",
                    log: factory_log.clone(),
                    fail: false,
                })
            })
            .disposable(),
        )
        .build_provider()
        .unwrap();

    let scope = provider.create_scope();
    let outcome = thread::scope(|s| {
        let building = s.spawn(|| scope.resolve::<Handle>().map(|_| ()));
        started.wait();
        scope.dispose().unwrap();
        resume.wait();
        building.join().unwrap()
    });

    assert!(matches!(outcome, Err(WasilError::ScopeDisposed)));
    assert_eq!(log.entries(), vec!["slow"]);
}

#[test]
fn scope_transients_belong_to_the_scope() {
    common::init_tracing();
    let log = Log::default();
    let provider = ServiceCollection::new()
        .add_transient(handle("job", &log, false))
        .build_provider()
        .unwrap();

    provider.scoped(|scope| {
        scope.resolve_named::<Handle>("job")?;
        scope.resolve_named::<Handle>("job")?;
        Ok(())
    })
    .unwrap();

    assert_eq!(log.entries(), vec!["job", "job"]);
    provider.dispose().unwrap();
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn registered_instances_are_never_disposed() {
    common::init_tracing();
    let log = Log::default();
    let provider = ServiceCollection::new()
        .add_singleton(
            Service::instance(Handle {
                name: "given",
                log: log.clone(),
                fail: false,
            })
            .disposable(),
        )
        .build_provider()
        .unwrap();

    let given = provider.resolve::<Handle>().unwrap();
    provider.dispose().unwrap();

    assert!(log.entries().is_empty());
    assert_eq!(given.name, "given");
}

#[test]
fn dropping_the_provider_disposes_it() {
    common::init_tracing();
    let log = Log::default();
    {
        let provider = ServiceCollection::new()
            .add_singleton(handle("pool", &log, false))
            .build_provider()
            .unwrap();
        let _clone = provider.clone();
    }
    assert_eq!(log.entries(), vec!["pool"]);
}
