//! Named boolean predicates callable from policy conditions.
//!
//! The set of functions is closed: policies name a function by string in
//! their JSON form, and the name is resolved to a [`Function`] variant when
//! the policy is loaded. Unknown names never reach evaluation.

use std::fmt;
use std::str::FromStr;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;

/// First hour (inclusive, UTC) of the working day.
pub const WORKING_HOURS_START: u32 = 9;
/// Last hour (exclusive, UTC) of the working day.
pub const WORKING_HOURS_END: u32 = 17;

/// Errors raised while resolving or applying a function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {found}")]
    Arity {
        function: Function,
        expected: usize,
        found: usize,
    },

    #[error("{function}: {reason}")]
    InvalidArgument { function: Function, reason: String },
}

// ============================================================================
// Function
// ============================================================================

/// A registered condition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    /// `is_resource_owner(subject_id, owner_id)`: the two ids are equal by
    /// canonical string form.
    IsResourceOwner,
    /// `is_within_working_hours(time)`: the hour of `time` lies in
    /// `[09:00, 17:00)`.
    IsWithinWorkingHours,
}

impl Function {
    /// Every registered function.
    pub const ALL: [Function; 2] = [Function::IsResourceOwner, Function::IsWithinWorkingHours];

    /// The name policies use to refer to this function.
    pub fn name(self) -> &'static str {
        match self {
            Function::IsResourceOwner => "is_resource_owner",
            Function::IsWithinWorkingHours => "is_within_working_hours",
        }
    }

    /// Number of arguments the function takes.
    pub fn arity(self) -> usize {
        match self {
            Function::IsResourceOwner => 2,
            Function::IsWithinWorkingHours => 1,
        }
    }

    /// Applies the function to resolved arguments.
    pub fn call(self, args: &[AttributeValue]) -> Result<bool, FunctionError> {
        if args.len() != self.arity() {
            return Err(FunctionError::Arity {
                function: self,
                expected: self.arity(),
                found: args.len(),
            });
        }

        match self {
            Function::IsResourceOwner => Ok(args[0].to_string() == args[1].to_string()),
            Function::IsWithinWorkingHours => {
                let time = args[0]
                    .as_scalar()
                    .and_then(|s| s.as_time())
                    .ok_or_else(|| FunctionError::InvalidArgument {
                        function: self,
                        reason: format!("expected a timestamp, got {}", args[0]),
                    })?;
                let hour = time.hour();
                Ok((WORKING_HOURS_START..WORKING_HOURS_END).contains(&hour))
            }
        }
    }
}

impl FromStr for Function {
    type Err = FunctionError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Function::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| FunctionError::UnknownFunction(name.to_string()))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks up a function by name and applies it.
pub fn call(name: &str, args: &[AttributeValue]) -> Result<bool, FunctionError> {
    name.parse::<Function>()?.call(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Scalar;
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    fn at_hour(hour: u32) -> AttributeValue {
        Scalar::Time(Utc.with_ymd_and_hms(2025, 3, 4, hour, 30, 0).unwrap()).into()
    }

    #[test_case(8, false ; "before opening")]
    #[test_case(9, true ; "opening hour")]
    #[test_case(12, true ; "midday")]
    #[test_case(16, true ; "last hour")]
    #[test_case(17, false ; "closing hour")]
    #[test_case(23, false ; "late night")]
    fn test_working_hours(hour: u32, expected: bool) {
        assert_eq!(Function::IsWithinWorkingHours.call(&[at_hour(hour)]), Ok(expected));
    }

    #[test]
    fn test_working_hours_accepts_rfc3339_text() {
        let arg = AttributeValue::Scalar(Scalar::from("2025-03-04T10:00:00Z"));
        assert_eq!(Function::IsWithinWorkingHours.call(&[arg]), Ok(true));
    }

    #[test]
    fn test_working_hours_rejects_non_time() {
        let arg = AttributeValue::Scalar(Scalar::Int(10));
        assert!(matches!(
            Function::IsWithinWorkingHours.call(&[arg]),
            Err(FunctionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_resource_owner_compares_canonical_strings() {
        let owner = |a: Scalar, b: Scalar| Function::IsResourceOwner.call(&[a.into(), b.into()]);

        assert_eq!(owner(Scalar::Int(5), Scalar::from("5")), Ok(true));
        assert_eq!(owner(Scalar::Int(5), Scalar::Int(5)), Ok(true));
        assert_eq!(owner(Scalar::Int(5), Scalar::Int(7)), Ok(false));
    }

    #[test]
    fn test_arity_is_checked() {
        let err = Function::IsResourceOwner.call(&[Scalar::Int(1).into()]);
        assert_eq!(
            err,
            Err(FunctionError::Arity {
                function: Function::IsResourceOwner,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_call_by_name() {
        assert_eq!(call("is_within_working_hours", &[at_hour(10)]), Ok(true));
        assert_eq!(
            call("is_admin", &[]),
            Err(FunctionError::UnknownFunction("is_admin".into()))
        );
    }

    #[test]
    fn test_names_round_trip() {
        for function in Function::ALL {
            assert_eq!(function.name().parse::<Function>(), Ok(function));
        }
    }
}
