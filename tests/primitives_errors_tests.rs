#![cfg(feature = "dev")]

use emunfold_rs::internals::primitives::errors::UnfoldError;
use emunfold_rs::internals::primitives::shape::{
    format_shape, shape_length, strides, validate_shape,
};

#[test]
fn test_error_classes() {
    let argument_errors = [
        UnfoldError::EmptyInput,
        UnfoldError::ZeroSum,
        UnfoldError::NonPositiveEfficiency { index: 2 },
        UnfoldError::InvalidBandwidth(-1.0),
        UnfoldError::DuplicateParameter {
            parameter: "max_iterations",
        },
        UnfoldError::NegativeCount {
            index: 0,
            value: -3.0,
        },
    ];
    for e in &argument_errors {
        assert!(e.is_invalid_argument(), "{e:?} should be an argument error");
        assert!(!e.is_runtime());
    }

    let runtime_errors = [
        UnfoldError::FilterNotSet,
        UnfoldError::ZeroDensity,
        UnfoldError::EmptyCache,
        UnfoldError::NonPositivePrediction {
            bin: 1,
            predicted: 0.0,
            observed: 4.0,
        },
    ];
    for e in &runtime_errors {
        assert!(e.is_runtime(), "{e:?} should be a runtime error");
        assert!(!e.is_invalid_argument());
    }
}

#[test]
fn test_error_messages() {
    let e = UnfoldError::DimensionMismatch {
        what: "observed array",
        expected: 4,
        got: 3,
    };
    assert_eq!(
        e.to_string(),
        "Incompatible discretization of the observed array: expected 4, got 3"
    );

    let e = UnfoldError::NonPositivePrediction {
        bin: 7,
        predicted: 0.0,
        observed: 2.0,
    };
    let msg = e.to_string();
    assert!(msg.contains("bin 7"));
    assert!(msg.contains("2 observed"));

    let e = UnfoldError::NonPositiveEfficiency { index: 5 };
    assert!(e.to_string().contains("cell 5"));
}

#[test]
fn test_shape_helpers() {
    assert_eq!(shape_length(&[3, 4, 5]), 60);
    assert_eq!(strides(&[3, 4, 5]), vec![20, 5, 1]);
    assert_eq!(format_shape(&[3, 4]), "[3, 4]");

    assert!(validate_shape(&[2, 2], "unfolded space").is_ok());
    assert_eq!(
        validate_shape(&[], "unfolded space"),
        Err(UnfoldError::EmptyInput)
    );
    assert!(validate_shape(&[2, 0], "unfolded space").is_err());
}
