//! Column type inference
//!
//! Guesses a column type from a single scalar and widens two guesses into
//! the least lossy common type.

use crate::error::{Error, Result};
use crate::schema::types::TypeTag;
use crate::types::Scalar;
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,4})?Z$").unwrap()
});

/// Default length above which a string column becomes `text`
pub const DEFAULT_MAX_VARCHAR_LENGTH: u32 = 512;

/// Length of a hex object identifier
const OBJECT_ID_LENGTH: u32 = 24;

/// Width used when two unrelated types collide
const FALLBACK_VARCHAR_LENGTH: u32 = 255;

const VARCHAR_BUCKETS: [u32; 3] = [50, 100, 255];

#[derive(Debug, Clone)]
pub struct TypeInferencer {
    max_varchar_length: u32,
}

impl Default for TypeInferencer {
    fn default() -> Self {
        TypeInferencer::new(DEFAULT_MAX_VARCHAR_LENGTH)
    }
}

impl TypeInferencer {
    pub fn new(max_varchar_length: u32) -> Self {
        TypeInferencer { max_varchar_length }
    }

    pub fn max_varchar_length(&self) -> u32 {
        self.max_varchar_length
    }

    /// Guess a column type for a single value
    pub fn guess(&self, value: &Scalar) -> Result<TypeTag> {
        match value {
            Scalar::ObjectId(_) => Ok(TypeTag::Varchar(OBJECT_ID_LENGTH)),
            Scalar::DateTime(_) => Ok(TypeTag::DateTime),
            Scalar::Null | Scalar::Int(_) => Ok(TypeTag::Int),
            Scalar::Double(_) => Ok(TypeTag::Double),
            Scalar::String(s) => Ok(self.guess_string(s)),
            Scalar::Bool(_) => Err(Error::UnknownType {
                value: value.to_string(),
                field: None,
                row: None,
            }),
        }
    }

    fn guess_string(&self, s: &str) -> TypeTag {
        let len = u32::try_from(s.chars().count()).unwrap_or(u32::MAX);

        if len > self.max_varchar_length {
            return TypeTag::Text;
        }
        if is_iso_timestamp(s) {
            return TypeTag::DateTime;
        }

        let bucket = VARCHAR_BUCKETS
            .iter()
            .copied()
            .filter(|b| *b <= self.max_varchar_length)
            .find(|b| len <= *b)
            .unwrap_or(self.max_varchar_length);
        TypeTag::Varchar(bucket)
    }

    /// Method form of [`widen`]
    pub fn widen(&self, a: TypeTag, b: TypeTag) -> TypeTag {
        widen(a, b)
    }
}

fn is_iso_timestamp(s: &str) -> bool {
    // Cheap length and separator checks before the regex
    s.len() >= 20 && s.as_bytes()[10] == b'T' && ISO_TIMESTAMP_REGEX.is_match(s)
}

/// Combine two column types into the most permissive common type.
///
/// Commutative and idempotent. The pair is put in lexicographic order of the
/// rendered tags before any rule is applied.
pub fn widen(a: TypeTag, b: TypeTag) -> TypeTag {
    let (a, b) = if a.to_string() <= b.to_string() { (a, b) } else { (b, a) };

    match (a, b) {
        _ if a == b => a,
        (TypeTag::Text, _) | (_, TypeTag::Text) => TypeTag::Text,
        (TypeTag::Double, TypeTag::Int) => TypeTag::Double,
        (TypeTag::Varchar(n1), TypeTag::Varchar(n2)) => TypeTag::Varchar(n1.max(n2)),
        // Never narrow an existing varchar below its declared length
        (TypeTag::Varchar(n), _) | (_, TypeTag::Varchar(n)) => {
            TypeTag::Varchar(n.max(FALLBACK_VARCHAR_LENGTH))
        }
        _ => TypeTag::Varchar(FALLBACK_VARCHAR_LENGTH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectId;
    use chrono::{TimeZone, Utc};

    fn all_tags() -> Vec<TypeTag> {
        vec![
            TypeTag::Int,
            TypeTag::Double,
            TypeTag::Text,
            TypeTag::DateTime,
            TypeTag::Varchar(24),
            TypeTag::Varchar(50),
            TypeTag::Varchar(100),
            TypeTag::Varchar(255),
            TypeTag::Varchar(512),
        ]
    }

    #[test]
    fn test_guess_scalars() {
        let inferencer = TypeInferencer::default();
        let id = Scalar::ObjectId(ObjectId::new("507f1f77bcf86cd799439011"));
        let when = Scalar::DateTime(Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap());

        assert_eq!(inferencer.guess(&id).unwrap(), TypeTag::Varchar(24));
        assert_eq!(inferencer.guess(&when).unwrap(), TypeTag::DateTime);
        assert_eq!(inferencer.guess(&Scalar::Null).unwrap(), TypeTag::Int);
        assert_eq!(inferencer.guess(&Scalar::Int(7)).unwrap(), TypeTag::Int);
        assert_eq!(inferencer.guess(&Scalar::Double(0.5)).unwrap(), TypeTag::Double);
    }

    #[test]
    fn test_guess_string_buckets() {
        let inferencer = TypeInferencer::default();
        let guess = |len: usize| inferencer.guess(&Scalar::String("x".repeat(len))).unwrap();

        assert_eq!(guess(0), TypeTag::Varchar(50));
        assert_eq!(guess(49), TypeTag::Varchar(50));
        assert_eq!(guess(50), TypeTag::Varchar(50));
        assert_eq!(guess(51), TypeTag::Varchar(100));
        assert_eq!(guess(101), TypeTag::Varchar(255));
        assert_eq!(guess(300), TypeTag::Varchar(512));
        assert_eq!(guess(512), TypeTag::Varchar(512));
        assert_eq!(guess(513), TypeTag::Text);
    }

    #[test]
    fn test_guess_counts_characters_not_bytes() {
        let inferencer = TypeInferencer::default();
        // 40 characters, 80 bytes
        let s = "é".repeat(40);
        assert_eq!(inferencer.guess(&Scalar::String(s)).unwrap(), TypeTag::Varchar(50));
    }

    #[test]
    fn test_guess_custom_threshold() {
        let inferencer = TypeInferencer::new(80);
        let guess = |len: usize| inferencer.guess(&Scalar::String("x".repeat(len))).unwrap();

        assert_eq!(guess(60), TypeTag::Varchar(80));
        assert_eq!(guess(81), TypeTag::Text);
    }

    #[test]
    fn test_guess_timestamp_strings() {
        let inferencer = TypeInferencer::default();
        let guess = |s: &str| inferencer.guess(&Scalar::String(s.to_string())).unwrap();

        assert_eq!(guess("2014-03-01T10:00:00Z"), TypeTag::DateTime);
        assert_eq!(guess("2014-03-01T10:00:00.123Z"), TypeTag::DateTime);
        assert_eq!(guess("2014-03-01T10:00:00+02:00"), TypeTag::Varchar(50));
        assert_eq!(guess("2014-03-01"), TypeTag::Varchar(50));
    }

    #[test]
    fn test_guess_bool_is_unknown() {
        let inferencer = TypeInferencer::default();
        let err = inferencer.guess(&Scalar::Bool(true)).unwrap_err();
        assert!(matches!(err, Error::UnknownType { ref value, .. } if value == "true"));
    }

    #[test]
    fn test_widen_idempotent_and_commutative() {
        for a in all_tags() {
            assert_eq!(widen(a, a), a);
            for b in all_tags() {
                assert_eq!(widen(a, b), widen(b, a), "widen({}, {})", a, b);
            }
        }
    }

    #[test]
    fn test_widen_rules() {
        assert_eq!(widen(TypeTag::Double, TypeTag::Int), TypeTag::Double);
        assert_eq!(widen(TypeTag::Int, TypeTag::Double), TypeTag::Double);
        assert_eq!(
            widen(TypeTag::Varchar(50), TypeTag::Varchar(100)),
            TypeTag::Varchar(100)
        );
        assert_eq!(widen(TypeTag::Text, TypeTag::Int), TypeTag::Text);
        assert_eq!(widen(TypeTag::Varchar(50), TypeTag::Text), TypeTag::Text);
        assert_eq!(widen(TypeTag::DateTime, TypeTag::Int), TypeTag::Varchar(255));
        assert_eq!(widen(TypeTag::Varchar(50), TypeTag::Int), TypeTag::Varchar(255));
    }

    #[test]
    fn test_widen_never_narrows() {
        assert_eq!(
            widen(TypeTag::Varchar(512), TypeTag::DateTime),
            TypeTag::Varchar(512)
        );

        // Folding any sequence of tags only moves up
        let mut current = TypeTag::Int;
        for next in all_tags() {
            let widened = widen(current, next);
            assert_eq!(widen(widened, current), widened);
            current = widened;
        }
        assert_eq!(current, TypeTag::Text);
    }
}
