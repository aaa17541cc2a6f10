use {
    serde::{
        de::{self, value::MapAccessDeserializer, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor},
        ser::{SerializeSeq, Serializer},
        Deserialize, Serialize,
    },
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        marker::PhantomData,
        ops::Index,
        slice,
    },
};

/// Implement Display for a given class by formatting it as pretty-printed JSON.
#[macro_export]
macro_rules! display_json {
    ($cls:ident) => {
        impl std::fmt::Display for $cls {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let buf = Vec::new();
                let serde_formatter = ::serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut ser = ::serde_json::Serializer::with_formatter(buf, serde_formatter);
                if let Err(e) = ::serde::Serialize::serialize(self, &mut ser) {
                    ::log::error!("Failed to serialize {}: {}", stringify!($cls), e);
                    return Err(::std::fmt::Error {});
                }
                match std::str::from_utf8(&ser.into_inner()) {
                    Ok(s) => f.write_str(s),
                    Err(e) => {
                        ::log::error!("JSON serialization contained non-UTF-8 characters: {}", e);
                        Err(::std::fmt::Error {})
                    }
                }
            }
        }
    };
}

/// Implement FromStr for a given class by parsing it as JSON.
#[macro_export]
macro_rules! from_str_json {
    ($cls:ident) => {
        impl ::std::str::FromStr for $cls {
            type Err = ::serde_json::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ::serde_json::from_str::<Self>(s).map_err(|e| {
                    ::log::debug!("Failed to parse {}: {}: {:?}", stringify!($cls), s, e);
                    e
                })
            }
        }
    };
}

/// Whether a [StringLikeList] was written as a single element or as a list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListKind {
    Single,
    List,
}

/// A JSON field that may be a single element or a list of elements.
///
/// IAM and CloudFormation both accept `"Action": "s3:GetObject"` as shorthand for `"Action": ["s3:GetObject"]`. The
/// shape used on input is kept on output so documents survive a parse/print cycle unchanged.
#[derive(Clone, Debug, Eq)]
pub enum StringLikeList<T> {
    Single(T),
    List(Vec<T>),
}

impl<T> StringLikeList<T> {
    pub fn kind(&self) -> ListKind {
        match self {
            Self::Single(_) => ListKind::Single,
            Self::List(_) => ListKind::List,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(_) => false,
            Self::List(v) => v.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::List(v) => v.len(),
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        match self {
            Self::Single(v) => slice::from_ref(v).iter(),
            Self::List(v) => v.iter(),
        }
    }

    pub fn to_vec(&self) -> Vec<&T> {
        self.iter().collect()
    }
}

impl<T: PartialEq> PartialEq for StringLikeList<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Single(a), Self::Single(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Single(a), Self::List(b)) => b.len() == 1 && a == &b[0],
            (Self::List(a), Self::Single(b)) => a.len() == 1 && &a[0] == b,
        }
    }
}

impl<T> From<T> for StringLikeList<T> {
    fn from(v: T) -> Self {
        Self::Single(v)
    }
}

impl<T> From<Vec<T>> for StringLikeList<T> {
    fn from(v: Vec<T>) -> Self {
        Self::List(v)
    }
}

impl From<&str> for StringLikeList<String> {
    fn from(v: &str) -> Self {
        Self::Single(v.to_string())
    }
}

impl From<Vec<&str>> for StringLikeList<String> {
    fn from(v: Vec<&str>) -> Self {
        Self::List(v.into_iter().map(str::to_string).collect())
    }
}

impl<T> Index<usize> for StringLikeList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        match self {
            Self::Single(v) => {
                if index == 0 {
                    v
                } else {
                    panic!("index out of bounds: the len is 1 but the index is {}", index);
                }
            }
            Self::List(v) => &v[index],
        }
    }
}

impl<'a, T> IntoIterator for &'a StringLikeList<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Display> Display for StringLikeList<T> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Single(v) => write!(f, "{}", v),
            Self::List(v) => {
                f.write_str("[")?;
                for (i, e) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str("]")
            }
        }
    }
}

struct StringLikeListVisitor<T> {
    phantom: PhantomData<T>,
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for StringLikeListVisitor<T> {
    type Value = StringLikeList<T>;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{} or list of {}", short_type_name::<T>(), short_type_name::<T>())
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        T::deserialize(v.into_deserializer()).map(StringLikeList::Single)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        T::deserialize(v.into_deserializer()).map(StringLikeList::Single)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        T::deserialize(v.into_deserializer()).map(StringLikeList::Single)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        T::deserialize(v.into_deserializer()).map(StringLikeList::Single)
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        T::deserialize(MapAccessDeserializer::new(access)).map(StringLikeList::Single)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut result = match access.size_hint() {
            Some(size) => Vec::with_capacity(size),
            None => Vec::new(),
        };

        while let Some(item) = access.next_element::<T>()? {
            result.push(item);
        }

        Ok(StringLikeList::List(result))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for StringLikeList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StringLikeListVisitor {
            phantom: PhantomData,
        })
    }
}

impl<T: Serialize> Serialize for StringLikeList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Single(v) => v.serialize(serializer),
            Self::List(v) => {
                let mut seq = serializer.serialize_seq(Some(v.len()))?;
                for e in v {
                    seq.serialize_element(e)?;
                }
                seq.end()
            }
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    match name.rfind("::") {
        Some(pos) => &name[pos + 2..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{ListKind, StringLikeList},
        pretty_assertions::assert_eq,
        serde::Serialize,
        std::panic::catch_unwind,
    };

    #[test_log::test]
    fn test_basic_ops() {
        let sl1a = StringLikeList::<u32>::Single(1);
        let sl1b = StringLikeList::<u32>::List(vec![1]);
        let sl2 = StringLikeList::<u32>::List(vec![1, 2]);
        let sl3 = StringLikeList::<u32>::List(vec![]);
        assert_eq!(sl1a, sl1b);
        assert_eq!(sl1b, sl1a);
        assert_ne!(sl1a, sl2);
        assert_ne!(sl2, sl1a);

        assert!(!sl1a.is_empty());
        assert!(sl3.is_empty());
        assert_eq!(sl1a.len(), 1);
        assert_eq!(sl2.len(), 2);
        assert_eq!(sl1a.kind(), ListKind::Single);
        assert_eq!(sl1b.kind(), ListKind::List);
        assert_eq!(sl2.to_vec(), vec![&1, &2]);
        assert_eq!(sl2.iter().sum::<u32>(), 3);

        assert_eq!(format!("{}", sl1a), "1");
        assert_eq!(format!("{}", sl2), "[1, 2]");
        assert_eq!(sl2[1], 2);

        let e = catch_unwind(|| {
            let sl = StringLikeList::<u32>::Single(1);
            println!("This won't print: {}", sl[1]);
        })
        .unwrap_err();
        assert_eq!(*e.downcast::<String>().unwrap(), "index out of bounds: the len is 1 but the index is 1");
    }

    #[test_log::test]
    fn test_shape_preserved() {
        let single: StringLikeList<String> = serde_json::from_str(r#""s3:GetObject""#).unwrap();
        assert_eq!(single.kind(), ListKind::Single);
        assert_eq!(serde_json::to_string(&single).unwrap(), r#""s3:GetObject""#);

        let list: StringLikeList<String> = serde_json::from_str(r#"["s3:GetObject"]"#).unwrap();
        assert_eq!(list.kind(), ListKind::List);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["s3:GetObject"]"#);
        assert_eq!(single, list);

        let e = serde_json::from_str::<StringLikeList<String>>("3.5").unwrap_err();
        assert!(e.to_string().starts_with("invalid type: floating point `3.5`, expected String or list of String"));
    }

    #[derive(Debug)]
    struct SerFail {}
    display_json!(SerFail);

    impl Serialize for SerFail {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("Serialization failed"))
        }
    }

    #[test_log::test]
    fn test_ser_fail() {
        let e = catch_unwind(|| SerFail {}.to_string()).unwrap_err();
        let e2 = e.downcast::<String>().unwrap();
        assert!((*e2).contains("a Display implementation returned an error"));
    }
}
