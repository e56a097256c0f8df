mod common;

use std::sync::Arc;

use wasil::error::{AnnotationIssue, InvalidLifetimeError};
use wasil::prelude::*;

#[derive(Debug)]
struct A;
#[derive(Debug)]
struct B;
#[derive(Debug)]
struct Clock;
#[derive(Debug)]
struct Request;

#[test]
fn two_service_cycle_is_rejected_with_chain() {
    common::init_tracing();
    let result = ServiceCollection::new()
        .add_transient(Service::factory(vec![Param::of::<B>()], |_| Ok(A)))
        .add_transient(Service::factory(vec![Param::of::<A>()], |_| Ok(B)))
        .build_provider();

    match result.unwrap_err() {
        WasilError::CircularDependency(err) => {
            assert_eq!(err.chain_names(), vec!["A", "B", "A"]);
            assert!(err.to_string().contains("A -> B -> A"));
        }
        other => panic!("Expected CircularDependency, got: {other:?}"),
    }
}

#[test]
fn singleton_depending_on_transient_is_captive() {
    common::init_tracing();
    let result = ServiceCollection::new()
        .add_singleton(Service::factory(vec![Param::of::<Request>()], |_| Ok(A)))
        .add_transient(Service::factory(vec![], |_| Ok(Request)))
        .build_provider();

    match result.unwrap_err() {
        WasilError::InvalidLifetime(InvalidLifetimeError::CaptiveDependency { path }) => {
            assert_eq!(path.first().map(|(key, _)| *key), Some(ServiceKey::of::<A>()));
            assert_eq!(path.last().map(|(_, lifetime)| *lifetime), Some(Lifetime::Transient));
        }
        other => panic!("Expected CaptiveDependency, got: {other:?}"),
    }
}

#[test]
fn singleton_depending_on_scoped_is_captive() {
    common::init_tracing();
    let result = ServiceCollection::new()
        .add_singleton(Service::factory(vec![Param::of::<Request>()], |_| Ok(A)))
        .add_scoped(Service::factory(vec![], |_| Ok(Request)))
        .build_provider();

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        WasilError::InvalidLifetime(InvalidLifetimeError::CaptiveDependency { .. })
    ));
    assert!(err.to_string().contains("Hint:"));
}

#[test]
fn missing_required_dependency_names_consumer() {
    common::init_tracing();
    let result = ServiceCollection::new()
        .add_transient(Service::factory(vec![Param::of::<Clock>()], |_| Ok(A)))
        .build_provider();

    match result.unwrap_err() {
        WasilError::Unresolvable(err) => {
            assert_eq!(err.requested, ServiceKey::of::<Clock>());
            assert_eq!(err.required_by, Some(ServiceKey::of::<A>()));
        }
        other => panic!("Expected Unresolvable, got: {other:?}"),
    }
}

struct Audit {
    clock: Option<Arc<Clock>>,
}

#[test]
fn optional_dependency_left_empty_when_unregistered() {
    common::init_tracing();
    let provider = ServiceCollection::new()
        .add_singleton(Service::factory(vec![Param::optional::<Clock>()], |args| {
            Ok(Audit {
                clock: args.take_optional()?,
            })
        }))
        .build_provider()
        .unwrap();

    assert!(provider.resolve::<Audit>().unwrap().clock.is_none());
}

#[test]
fn optional_dependency_filled_when_registered() {
    common::init_tracing();
    let provider = ServiceCollection::new()
        .add_singleton(Service::instance(Clock))
        .add_singleton(Service::factory(vec![Param::optional::<Clock>()], |args| {
            Ok(Audit {
                clock: args.take_optional()?,
            })
        }))
        .build_provider()
        .unwrap();

    assert!(provider.resolve::<Audit>().unwrap().clock.is_some());
}

#[test]
fn deferred_type_name_resolves() {
    common::init_tracing();
    let provider = ServiceCollection::new()
        .add_singleton(Service::instance(Clock))
        .add_transient(Service::factory(vec![Param::deferred("Clock")], |args| {
            Ok(Audit {
                clock: Some(args.take()?),
            })
        }))
        .build_provider()
        .unwrap();

    assert!(provider.resolve::<Audit>().unwrap().clock.is_some());
}

#[test]
fn unknown_type_name_is_annotation_error() {
    common::init_tracing();
    let result = ServiceCollection::new()
        .add_transient(Service::factory(vec![Param::deferred("Clokc")], |_| Ok(A)))
        .build_provider();

    match result.unwrap_err() {
        WasilError::TypeAnnotation(err) => {
            assert_eq!(err.consumer, ServiceKey::of::<A>());
            assert_eq!(err.position, 0);
            assert!(matches!(err.issue, AnnotationIssue::Unknown("Clokc")));
        }
        other => panic!("Expected TypeAnnotation, got: {other:?}"),
    }
}

#[test]
fn runtime_reentry_through_context_is_a_cycle() {
    common::init_tracing();
    let provider = ServiceCollection::new()
        .add_transient(Service::factory(vec![Param::context()], |args| {
            let resolver = args.resolver()?;
            resolver.resolve::<B>()?;
            Ok(A)
        }))
        .add_transient(Service::factory(vec![Param::context()], |args| {
            args.resolver()?.resolve::<A>()?;
            Ok(B)
        }))
        .build_provider()
        .unwrap();

    let err = provider.resolve::<A>().unwrap_err();
    let names: Vec<String> = err
        .chain()
        .map(|chain| chain.iter().map(ServiceKey::short_name).collect())
        .unwrap_or_default();
    assert!(
        err.to_string().contains("A -> B -> A"),
        "unexpected error: {err}"
    );
    assert!(names.first().is_some_and(|name| name == "A"));
}
