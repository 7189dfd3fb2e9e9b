//! Enum-to-column binding for counter collections.
//!
//! A counter collection is untyped at its core: a fixed number of columns
//! addressed by dense `u16` ids. This module layers the typed view on top.
//! An enumeration of counter names is bound once per process into a
//! [`CounterSchema`]: a kind table, a name table, and the offset that maps
//! a member's integer value to its column index.
//!
//! The usual way to declare a schema is the [`counter_enum!`](crate::counter_enum)
//! macro:
//!
//! ```rust
//! use tallies::counter_enum;
//!
//! counter_enum! {
//!     pub enum PipStats {
//!         ProcessesLaunched,
//!         CacheHits as "CacheHitCount",
//!         ExecuteDuration: stopwatch,
//!     }
//! }
//! ```
//!
//! Each member is *numeric* unless tagged `: stopwatch`, and displays under
//! its identifier unless renamed with `as "..."`. Schemas can also be built
//! by hand from a descriptor table via [`CounterSchema::bind`] when the set
//! of counters is not known at compile time.
//!
//! Binding validates the member set: values must be dense (no gaps, no
//! duplicates) and the cardinality must fit in 16 bits. Violations surface
//! as [`InvalidCounterSchema`](crate::CounterError::InvalidCounterSchema)
//! on first use of the typed collection.

use crate::error::CounterError;

/// The two behaviors a counter column can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// A plain 64-bit additive accumulator.
    Numeric,
    /// A tick accumulator with an implicit call-count companion; written
    /// through stopwatch scopes or explicit duration adds.
    Stopwatch,
}

/// One member of a counter enumeration, as supplied to [`CounterSchema::bind`].
///
/// The [`counter_enum!`](crate::counter_enum) macro generates these tables;
/// callers binding a schema at runtime can build them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDescriptor {
    /// The member's integer value. The set of values across a schema must
    /// be dense.
    pub value: i64,
    /// Numeric or stopwatch.
    pub kind: CounterKind,
    /// Display name used in statistics keys, rendering, and errors.
    pub name: &'static str,
}

/// Immutable schema tables shared by every collection of one enum type.
///
/// Holds the kind and name of each column plus the offset that converts a
/// member value into its column index (`column = value - offset`). Built
/// once and shared via `Arc`; collections never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSchema {
    kinds: Box<[CounterKind]>,
    names: Box<[String]>,
    offset: i64,
}

impl CounterSchema {
    /// Validates a descriptor table and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::InvalidCounterSchema`] when the table is
    /// empty, its cardinality exceeds 16 bits, or the member values are
    /// not dense (gaps or duplicates).
    pub fn bind(descriptors: &[CounterDescriptor]) -> crate::Result<Self> {
        if descriptors.is_empty() {
            return Err(CounterError::InvalidCounterSchema(
                "schema declares no counters".to_string(),
            ));
        }
        if descriptors.len() > u16::MAX as usize {
            return Err(CounterError::InvalidCounterSchema(format!(
                "cardinality {} exceeds 16 bits",
                descriptors.len()
            )));
        }

        let offset = descriptors.iter().map(|d| d.value).min().unwrap_or(0);
        let max = descriptors.iter().map(|d| d.value).max().unwrap_or(0);
        let span = max as i128 - offset as i128 + 1;
        if span != descriptors.len() as i128 {
            return Err(CounterError::InvalidCounterSchema(format!(
                "{} members span values {offset}..={max}; members must be dense",
                descriptors.len()
            )));
        }

        let mut kinds = vec![None; descriptors.len()];
        let mut names = vec![String::new(); descriptors.len()];
        for descriptor in descriptors {
            let column = (descriptor.value - offset) as usize;
            if kinds[column].is_some() {
                return Err(CounterError::InvalidCounterSchema(format!(
                    "duplicate member value {}",
                    descriptor.value
                )));
            }
            kinds[column] = Some(descriptor.kind);
            names[column] = descriptor.name.to_string();
        }

        Ok(CounterSchema {
            kinds: kinds.into_iter().flatten().collect(),
            names: names.into_boxed_slice(),
            offset,
        })
    }

    /// Builds an all-numeric schema with generated names.
    ///
    /// This is the constructor-time table route for untyped
    /// [`CounterGroup`](crate::CounterGroup) use where no enum exists.
    pub fn anonymous(columns: u16) -> Self {
        CounterSchema {
            kinds: vec![CounterKind::Numeric; columns as usize].into_boxed_slice(),
            names: (0..columns)
                .map(|i| format!("counter{i}"))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            offset: 0,
        }
    }

    /// Number of columns.
    #[inline]
    pub fn columns(&self) -> u16 {
        self.kinds.len() as u16
    }

    /// Kind of column `id`.
    #[inline]
    pub fn kind(&self, id: u16) -> CounterKind {
        self.kinds[id as usize]
    }

    /// Display name of column `id`.
    #[inline]
    pub fn name(&self, id: u16) -> &str {
        &self.names[id as usize]
    }

    /// Minimum member value; `column = value - offset`.
    #[inline]
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Whether two schemas describe the same shape (column count, kinds,
    /// and offset). Merge, difference, and sum require this.
    pub(crate) fn shape_matches(&self, other: &CounterSchema) -> bool {
        self.offset == other.offset && self.kinds == other.kinds
    }
}

/// A fieldless enum usable as the key space of a typed counter collection.
///
/// Implemented by the [`counter_enum!`](crate::counter_enum) macro; the
/// methods tie the enum to its descriptor table and process-wide cached
/// schema.
pub trait CounterEnum: Copy + 'static {
    /// The descriptor table, one entry per member in declaration order.
    fn descriptors() -> &'static [CounterDescriptor];

    /// The bound schema for this enum, cached once per process.
    ///
    /// # Errors
    ///
    /// Returns the binding failure if the member set is invalid; the same
    /// error is returned on every subsequent call.
    fn schema() -> crate::Result<&'static std::sync::Arc<CounterSchema>>;

    /// The member's raw integer value.
    fn raw_value(self) -> i64;
}

/// Declares a counter enumeration and binds it to a schema.
///
/// Expands to a plain fieldless `enum` deriving `Clone`, `Copy`, `Debug`,
/// `PartialEq`, `Eq`, and `Hash`, plus a [`CounterEnum`] implementation
/// whose schema is validated lazily, once per process.
///
/// Member grammar: `Name [= discriminant] [: numeric | : stopwatch] [as "Display"]`.
/// Members default to numeric and display under their identifier.
///
/// # Examples
///
/// ```rust
/// use tallies::{counter_enum, CounterCollection};
///
/// counter_enum! {
///     pub enum CachePhase {
///         Lookups,
///         Misses,
///         FetchDuration: stopwatch,
///         RemoteHits as "CacheRemoteHits",
///     }
/// }
///
/// let counters = CounterCollection::<CachePhase>::new(None).unwrap();
/// counters.increment(CachePhase::Lookups).unwrap();
/// assert_eq!(counters.value(CachePhase::Lookups), 1);
/// ```
#[macro_export]
macro_rules! counter_enum {
    (@kind) => {
        $crate::schema::CounterKind::Numeric
    };
    (@kind numeric) => {
        $crate::schema::CounterKind::Numeric
    };
    (@kind stopwatch) => {
        $crate::schema::CounterKind::Stopwatch
    };
    (@kind $other:ident) => {
        compile_error!(concat!(
            "unknown counter kind `",
            stringify!($other),
            "`; expected `numeric` or `stopwatch`"
        ))
    };
    (@display $variant:ident) => {
        stringify!($variant)
    };
    (@display $variant:ident, $rename:literal) => {
        $rename
    };
    (
        $(#[$outer:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident $(= $disc:literal)? $(: $kind:ident)? $(as $rename:literal)?
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant $(= $disc)?
            ),+
        }

        impl $crate::schema::CounterEnum for $name {
            fn descriptors() -> &'static [$crate::schema::CounterDescriptor] {
                const DESCRIPTORS: &[$crate::schema::CounterDescriptor] = &[
                    $(
                        $crate::schema::CounterDescriptor {
                            value: $name::$variant as i64,
                            kind: $crate::counter_enum!(@kind $($kind)?),
                            name: $crate::counter_enum!(@display $variant $(, $rename)?),
                        }
                    ),+
                ];
                DESCRIPTORS
            }

            fn schema() -> $crate::Result<&'static ::std::sync::Arc<$crate::schema::CounterSchema>> {
                static SCHEMA: ::std::sync::OnceLock<
                    $crate::Result<::std::sync::Arc<$crate::schema::CounterSchema>>,
                > = ::std::sync::OnceLock::new();
                match SCHEMA.get_or_init(|| {
                    $crate::schema::CounterSchema::bind(
                        <$name as $crate::schema::CounterEnum>::descriptors(),
                    )
                    .map(::std::sync::Arc::new)
                }) {
                    Ok(schema) => Ok(schema),
                    Err(err) => Err(err.clone()),
                }
            }

            fn raw_value(self) -> i64 {
                self as i64
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    counter_enum! {
        enum Simple {
            Alpha,
            Beta: stopwatch,
            Gamma as "GammaRays",
            Delta: stopwatch as "DeltaTime",
        }
    }

    counter_enum! {
        enum Gappy {
            First = 0,
            Third = 2,
        }
    }

    #[test]
    fn test_descriptor_table_order() {
        let descriptors = Simple::descriptors();
        assert_eq!(descriptors.len(), 4);
        assert_eq!(descriptors[0].value, 0);
        assert_eq!(descriptors[0].name, "Alpha");
        assert_eq!(descriptors[0].kind, CounterKind::Numeric);
        assert_eq!(descriptors[1].kind, CounterKind::Stopwatch);
        assert_eq!(descriptors[2].name, "GammaRays");
        assert_eq!(descriptors[3].name, "DeltaTime");
        assert_eq!(descriptors[3].kind, CounterKind::Stopwatch);
    }

    #[test]
    fn test_bound_schema_tables() {
        let schema = Simple::schema().unwrap();
        assert_eq!(schema.columns(), 4);
        assert_eq!(schema.offset(), 0);
        assert_eq!(schema.kind(1), CounterKind::Stopwatch);
        assert_eq!(schema.name(2), "GammaRays");
    }

    #[test]
    fn test_schema_is_cached() {
        let first = Simple::schema().unwrap();
        let second = Simple::schema().unwrap();
        assert!(std::sync::Arc::ptr_eq(first, second));
    }

    #[test]
    fn test_gap_is_rejected() {
        let err = Gappy::schema().unwrap_err();
        assert!(matches!(err, CounterError::InvalidCounterSchema(_)));
        assert!(err.to_string().contains("dense"));
    }

    #[test]
    fn test_nonzero_offset() {
        counter_enum! {
            enum Shifted {
                Low = 5,
                Mid = 6,
                High = 7,
            }
        }
        let schema = Shifted::schema().unwrap();
        assert_eq!(schema.offset(), 5);
        assert_eq!(schema.columns(), 3);
        assert_eq!(schema.name(0), "Low");
    }

    #[test]
    fn test_empty_table_rejected() {
        let err = CounterSchema::bind(&[]).unwrap_err();
        assert!(matches!(err, CounterError::InvalidCounterSchema(_)));
    }

    #[test]
    fn test_duplicate_value_rejected() {
        // A gap plus a duplicate can balance the span check; the placement
        // pass must still catch it.
        let descriptors = [
            CounterDescriptor {
                value: 0,
                kind: CounterKind::Numeric,
                name: "a",
            },
            CounterDescriptor {
                value: 0,
                kind: CounterKind::Numeric,
                name: "b",
            },
            CounterDescriptor {
                value: 2,
                kind: CounterKind::Numeric,
                name: "c",
            },
        ];
        let err = CounterSchema::bind(&descriptors).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_cardinality_over_16_bits_rejected() {
        let descriptors: Vec<CounterDescriptor> = (0..=u16::MAX as i64 + 1)
            .map(|value| CounterDescriptor {
                value,
                kind: CounterKind::Numeric,
                name: "c",
            })
            .collect();
        let err = CounterSchema::bind(&descriptors).unwrap_err();
        assert!(err.to_string().contains("16 bits"));
    }

    #[test]
    fn test_anonymous_schema() {
        let schema = CounterSchema::anonymous(3);
        assert_eq!(schema.columns(), 3);
        assert_eq!(schema.kind(0), CounterKind::Numeric);
        assert_eq!(schema.name(2), "counter2");
    }

    #[test]
    fn test_shape_matching() {
        let a = CounterSchema::anonymous(3);
        let b = CounterSchema::anonymous(3);
        let c = CounterSchema::anonymous(4);
        assert!(a.shape_matches(&b));
        assert!(!a.shape_matches(&c));
    }
}
