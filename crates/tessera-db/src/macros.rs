//! Macros for defining entity schemas.
//!
//! The [`define_entity!`] macro implements [`crate::Entity`] for a struct,
//! tying each field to a column and a Rust type.

/// Implements [`crate::Entity`] for an existing struct.
///
/// # Syntax
///
/// ```ignore
/// define_entity!(
///     User {
///         type_name: "com.x.User",
///         table: "user",
///         key: id,
///         columns: {
///             id: i64 => "id",
///             name: String => "name",
///             email: Option<String> => "email"
///         }
///     }
/// );
/// ```
///
/// Every field of the struct must be listed. `key:` may be omitted for
/// tables without a primary key.
///
/// # Usage
///
/// ```ignore
/// use tessera_db::{define_entity, Entity};
///
/// #[derive(Debug, Clone)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// define_entity!(
///     User {
///         type_name: "com.x.User",
///         table: "user",
///         key: id,
///         columns: {
///             id: i64 => "id",
///             name: String => "name"
///         }
///     }
/// );
///
/// assert_eq!(User::schema().key(), Some("id"));
/// ```
#[macro_export]
macro_rules! define_entity {
    (
        $entity:ident {
            type_name: $type_name:literal,
            table: $table:literal,
            key: $key:ident,
            columns: {
                $($field:ident: $col_type:ty => $db_col:literal),* $(,)?
            }
        }
    ) => {
        $crate::define_entity!(@impl $entity, $type_name, $table,
            ::std::option::Option::Some(stringify!($key)),
            $($field: $col_type => $db_col),*);
    };

    (
        $entity:ident {
            type_name: $type_name:literal,
            table: $table:literal,
            columns: {
                $($field:ident: $col_type:ty => $db_col:literal),* $(,)?
            }
        }
    ) => {
        $crate::define_entity!(@impl $entity, $type_name, $table,
            ::std::option::Option::None,
            $($field: $col_type => $db_col),*);
    };

    (@impl $entity:ident, $type_name:literal, $table:literal, $key:expr,
        $($field:ident: $col_type:ty => $db_col:literal),*) => {
        impl $crate::Entity for $entity {
            fn schema() -> &'static $crate::Schema {
                static SCHEMA: ::std::sync::LazyLock<$crate::Schema> =
                    ::std::sync::LazyLock::new(|| {
                        $crate::Schema::new(
                            $type_name,
                            $table,
                            $key,
                            vec![$($crate::define_column!($field, $col_type, $db_col)),*],
                        )
                    });
                &SCHEMA
            }

            fn to_record(&self) -> $crate::Record {
                let mut record = $crate::Record::new();
                $(
                    record.insert(
                        $db_col.to_string(),
                        <$col_type as $crate::SqlType>::to_value(&self.$field),
                    );
                )*
                record
            }

            fn from_record(record: &$crate::Record) -> $crate::error::Result<Self> {
                Ok(Self {
                    $(
                        $field: <$col_type as $crate::SqlType>::from_value(
                            record.get($db_col),
                            $db_col,
                        )?,
                    )*
                })
            }
        }
    };
}

/// Builds the [`crate::Element`] for one declared column.
#[macro_export]
macro_rules! define_column {
    ($field:ident, $col_type:ty, $db_col:literal) => {
        $crate::Element::new(
            stringify!($field),
            $db_col,
            <$col_type as $crate::SqlType>::COLUMN_TYPE,
            <$col_type as $crate::SqlType>::NULLABLE,
        )
    };
}
