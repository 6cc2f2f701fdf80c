//! Values bound to statement parameters and read back from result rows.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error::CannotConvertSqlVal, Result};

/// Enumeration of the types a database value may take.
///
/// See also [`SqlVal`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SqlType {
    /// Boolean
    Bool,
    /// 4 bytes
    Int,
    /// 8 bytes
    BigInt,
    /// 8 byte float
    Real,
    /// String
    Text,
    /// Blob
    Blob,
}
impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SqlType::*;
        match &self {
            Bool => "bool",
            Int => "int",
            BigInt => "big int",
            Real => "float",
            Text => "string",
            Blob => "blob",
        }
        .fmt(f)
    }
}

/// A database value.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlVal {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}
impl SqlVal {
    /// Returns true if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlVal::Null)
    }
}
impl fmt::Display for SqlVal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SqlVal::*;
        match &self {
            Null => f.write_str("NULL"),
            Bool(val) => val.fmt(f),
            Int(val) => val.fmt(f),
            BigInt(val) => val.fmt(f),
            Real(val) => val.fmt(f),
            Text(val) => val.fmt(f),
            Blob(val) => f.write_fmt(format_args!("{val:?}")),
        }
    }
}

/// Used to convert another type to a [`SqlVal`] for binding.
pub trait ToSql {
    /// Convert to a `SqlVal`, copying if necessary.
    fn to_sql(&self) -> SqlVal;
}

/// Used to convert a [`SqlVal`] read from a row into another type.
pub trait FromSql {
    /// Convert from a `SqlVal`. Fails if the value does not fit.
    fn from_sql(val: SqlVal) -> Result<Self>
    where
        Self: Sized;
}

impl ToSql for SqlVal {
    fn to_sql(&self) -> SqlVal {
        self.clone()
    }
}
impl FromSql for SqlVal {
    fn from_sql(val: SqlVal) -> Result<Self> {
        Ok(val)
    }
}

macro_rules! impl_basic_from_sql {
    ($prim:ty, $variant:ident, $sqltype:ident) => {
        impl FromSql for $prim {
            fn from_sql(val: SqlVal) -> Result<Self> {
                if let SqlVal::$variant(val) = val {
                    Ok(val)
                } else {
                    Err(CannotConvertSqlVal(SqlType::$sqltype, val))
                }
            }
        }
    };
}

macro_rules! impl_prim_to_sql {
    ($prim:ty, $variant:ident) => {
        impl ToSql for $prim {
            fn to_sql(&self) -> SqlVal {
                SqlVal::$variant(self.clone())
            }
        }
    };
}

impl_prim_to_sql!(bool, Bool);
impl_prim_to_sql!(i32, Int);
impl_prim_to_sql!(i64, BigInt);
impl_prim_to_sql!(f64, Real);
impl_prim_to_sql!(String, Text);
impl_prim_to_sql!(Vec<u8>, Blob);

impl_basic_from_sql!(f64, Real, Real);
impl_basic_from_sql!(String, Text, Text);
impl_basic_from_sql!(Vec<u8>, Blob, Blob);

impl ToSql for str {
    fn to_sql(&self) -> SqlVal {
        SqlVal::Text(self.to_string())
    }
}
impl<T: ToSql + ?Sized> ToSql for &T {
    fn to_sql(&self) -> SqlVal {
        (**self).to_sql()
    }
}

// SQLite reports every integer column as 8 bytes, so the integer
// conversions accept either width and range-check the narrowing.
impl FromSql for i64 {
    fn from_sql(val: SqlVal) -> Result<Self> {
        match val {
            SqlVal::Int(i) => Ok(i as i64),
            SqlVal::BigInt(i) => Ok(i),
            _ => Err(CannotConvertSqlVal(SqlType::BigInt, val)),
        }
    }
}
impl FromSql for i32 {
    fn from_sql(val: SqlVal) -> Result<Self> {
        match val {
            SqlVal::Int(i) => Ok(i),
            SqlVal::BigInt(i) => {
                i32::try_from(i).map_err(|_| CannotConvertSqlVal(SqlType::Int, SqlVal::BigInt(i)))
            }
            _ => Err(CannotConvertSqlVal(SqlType::Int, val)),
        }
    }
}
impl FromSql for bool {
    fn from_sql(val: SqlVal) -> Result<Self> {
        match val {
            SqlVal::Bool(b) => Ok(b),
            SqlVal::Int(i) => Ok(i != 0),
            SqlVal::BigInt(i) => Ok(i != 0),
            _ => Err(CannotConvertSqlVal(SqlType::Bool, val)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(val: SqlVal) -> Result<Self> {
        if val.is_null() {
            Ok(None)
        } else {
            T::from_sql(val).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_narrows_to_int_when_in_range() {
        assert_eq!(i32::from_sql(SqlVal::BigInt(70000)).unwrap(), 70000);
    }

    #[test]
    fn bigint_out_of_range_is_rejected() {
        let err = i32::from_sql(SqlVal::BigInt(i64::MAX)).unwrap_err();
        assert!(matches!(err, CannotConvertSqlVal(SqlType::Int, SqlVal::BigInt(_))));
    }

    #[test]
    fn text_does_not_convert_to_integer() {
        let err = i64::from_sql(SqlVal::Text("70000".into())).unwrap_err();
        assert!(matches!(err, CannotConvertSqlVal(SqlType::BigInt, _)));
    }

    #[test]
    fn null_converts_to_none() {
        assert_eq!(Option::<String>::from_sql(SqlVal::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_sql(SqlVal::Text("memberA".into())).unwrap(),
            Some("memberA".to_string())
        );
    }

    #[test]
    fn str_binds_as_text() {
        assert_eq!("memberV100".to_sql(), SqlVal::Text("memberV100".to_string()));
    }
}
