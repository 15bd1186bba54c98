/// Implements the wire-name helpers for a fieldless enum.
///
/// Each variant is paired with the string the REST backend uses for it. The
/// macro generates:
/// - `ALL`: every variant in declaration order,
/// - `as_str()`: the wire name,
/// - `Display`, writing the wire name,
/// - `FromStr`, accepting the wire name case-insensitively.
///
/// # Example
/// ```ignore
/// wire_names!(Priority {
///     Low => "low",
///     Medium => "medium",
///     High => "high",
/// });
/// ```
/// The `serde` attributes on the enum must agree with the names given here;
/// the unit tests in `types` check that they do.
macro_rules! wire_names {
    ($enum:ident { $($variant:ident => $name:literal),* $(,)? }) => {
        impl $enum {
            pub const ALL: &'static [$enum] = &[$($enum::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($enum::$variant => $name,)*
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum {
            type Err = $crate::error::ServiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $enum::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        $crate::error::ServiceError::Validation(format!(
                            "unknown {} '{}' (expected one of: {})",
                            stringify!($enum),
                            s,
                            [$($name),*].join(", ")
                        ))
                    })
            }
        }
    };
}
