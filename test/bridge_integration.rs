//! Integration Tests for the Bridge
//!
//! Tests the complete calling surface including:
//! - Full call lifecycle against the instrumented mock
//! - Error taxonomy and message formats
//! - Allocation and release accounting
//! - Concurrent use of a shared provider
//! - Provider loading failure modes

use std::thread;

use opcall::{
    operate, Bridge, CallError, Fault, LoadError, MockProvider, NativeProvider, Operator,
};

// =============================================================================
// Call Lifecycle Tests
// =============================================================================

#[test]
fn test_full_call_lifecycle() {
    let mock = MockProvider::new();
    let bridge = Bridge::new(&mock);

    // Successful call: the value comes back, everything is released.
    assert_eq!(bridge.operate("+", 2, 3).unwrap(), 5);

    // Failed call: the message comes back decoded, everything is released.
    match bridge.operate("/", 1, 0) {
        Err(CallError::Operation(message)) => assert_eq!(message, "division by zero"),
        other => panic!("expected a native error, got {:?}", other),
    }

    let stats = mock.stats();
    assert_eq!(stats.operate_calls, 2);
    assert_eq!(stats.ints_allocated, 1);
    assert_eq!(stats.strings_allocated, 1);
    assert_eq!(stats.results_allocated, 2);
    assert!(stats.balanced());
}

#[test]
fn test_owned_provider_round_trip() {
    let bridge = Bridge::new(MockProvider::new());
    assert_eq!(bridge.operate("*", 21, 2).unwrap(), 42);
    assert_eq!(bridge.provider().stats().operate_calls, 1);

    // The provider survives the bridge, counters intact.
    let mock = bridge.into_provider();
    assert!(mock.stats().balanced());
}

#[test]
fn test_top_level_operate_shares_the_bridge_semantics() {
    let mock = MockProvider::new();
    assert_eq!(operate(&mock, "%", 17, 5).unwrap(), 2);
    assert!(matches!(
        operate(&mock, "×", 2, 2),
        Err(CallError::UnsupportedOperator('×'))
    ));
    // Only the valid call reached the provider.
    assert_eq!(mock.stats().operate_calls, 1);
}

#[test]
fn test_operator_parsing_surface() {
    assert_eq!(Operator::from_char('+'), Some(Operator::Add));
    assert_eq!(Operator::from_char('&'), None);
    for op in Operator::ALL {
        assert_eq!(Operator::from_char(op.symbol()), Some(op));
        assert_eq!(op.to_string().len(), 1);
    }
}

// =============================================================================
// Error Taxonomy Tests
// =============================================================================

#[test]
fn test_error_messages_read_like_the_failure() {
    let mock = MockProvider::new();
    let bridge = Bridge::new(&mock);

    let err = bridge.operate("+-", 1, 2).unwrap_err();
    assert_eq!(err.to_string(), "\"+-\" should be a character");

    let err = bridge.operate("!", 1, 2).unwrap_err();
    assert_eq!(err.to_string(), "unsupported operator '!'");

    let err = bridge.operate("/", 9, 0).unwrap_err();
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn test_validation_failures_make_no_native_calls() {
    let mock = MockProvider::new();
    let bridge = Bridge::new(&mock);

    assert!(bridge.operate("+-", 1, 2).is_err());
    assert!(bridge.operate("", 1, 2).is_err());
    assert!(bridge.operate("abc", 1, 2).is_err());
    assert!(bridge.operate("#", 1, 2).is_err());

    let stats = mock.stats();
    assert_eq!(stats.operate_calls, 0);
    assert_eq!(stats.outstanding(), 0);
}

#[test]
fn test_contract_violations_become_errors_not_crashes() {
    let mock = MockProvider::with_fault(Fault::NullHandle);
    assert!(matches!(
        Bridge::new(&mock).operate("+", 1, 1),
        Err(CallError::NullResult)
    ));

    let mock = MockProvider::with_fault(Fault::EmptyResult);
    assert!(matches!(
        Bridge::new(&mock).operate("+", 1, 1),
        Err(CallError::EmptyResult)
    ));

    let mock = MockProvider::with_fault(Fault::GarbageMessage);
    assert!(matches!(
        Bridge::new(&mock).operate("+", 1, 1),
        Err(CallError::InvalidMessage(_))
    ));
}

// =============================================================================
// Allocation Accounting Tests
// =============================================================================

#[test]
fn test_mixed_workload_releases_every_allocation() {
    let mock = MockProvider::new();
    let bridge = Bridge::new(&mock);

    for x in [i32::MIN, -7, 0, 7, i32::MAX] {
        for y in [-3, 0, 3] {
            for op in Operator::ALL {
                // Success or failure, nothing may leak.
                let _ = bridge.apply(op, x, y);
            }
        }
    }

    let stats = mock.stats();
    assert_eq!(stats.operate_calls, 90);
    assert!(stats.balanced());
    assert_eq!(stats.outstanding(), 0);
}

#[test]
fn test_fault_shapes_are_all_handled_without_leaks() {
    for fault in [Fault::NullHandle, Fault::EmptyResult, Fault::GarbageMessage] {
        let mock = MockProvider::with_fault(fault);
        let bridge = Bridge::new(&mock);
        assert!(bridge.operate("+", 1, 1).is_err(), "{:?}", fault);
        assert!(mock.stats().balanced(), "{:?} leaked", fault);
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_bridge_is_shareable_across_threads() {
    let mock = MockProvider::new();

    thread::scope(|scope| {
        for worker in 0..4 {
            let mock = &mock;
            scope.spawn(move || {
                let bridge = Bridge::new(mock);
                for i in 0..100 {
                    assert_eq!(bridge.apply(Operator::Add, worker, i).unwrap(), worker + i);
                }
            });
        }
    });

    let stats = mock.stats();
    assert_eq!(stats.operate_calls, 400);
    assert!(stats.balanced());
}

#[test]
fn test_concurrent_error_paths_release_cleanly() {
    let mock = MockProvider::new();

    thread::scope(|scope| {
        for _ in 0..4 {
            let mock = &mock;
            scope.spawn(move || {
                let bridge = Bridge::new(mock);
                for i in 0..50 {
                    assert!(bridge.apply(Operator::Div, i, 0).is_err());
                }
            });
        }
    });

    let stats = mock.stats();
    assert_eq!(stats.operate_calls, 200);
    assert_eq!(stats.strings_allocated, 200);
    assert!(stats.balanced());
}

// =============================================================================
// Provider Loading Tests
// =============================================================================

#[test]
fn test_discover_reports_missing_library_by_name() {
    let err = NativeProvider::discover("opcall-integration-missing").unwrap_err();
    assert!(matches!(err, LoadError::NotFound(_)));
    assert!(err.to_string().contains("opcall-integration-missing"));
}

#[test]
fn test_load_reports_unopenable_path() {
    let err = NativeProvider::load("/definitely/not/here/libopcore.so").unwrap_err();
    match err {
        LoadError::Open { path, .. } => assert!(path.ends_with("libopcore.so")),
        other => panic!("expected Open, got {}", other),
    }
}
