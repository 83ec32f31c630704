//! Serializes opaque parameter values as base64 for the inspection JSON output.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};
use serde_with::de::DeserializeAs;
use serde_with::ser::SerializeAs;
use std::borrow::Cow;
use std::convert::TryInto;
use std::marker::PhantomData;

#[derive(Copy, Clone, Debug, Default)]
pub struct Base64(PhantomData<()>);

impl<T> SerializeAs<T> for Base64
where
    T: AsRef<[u8]>,
{
    fn serialize_as<S>(source: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64::encode(source))
    }
}

impl<'de, T> DeserializeAs<'de, T> for Base64
where
    T: TryFrom<Vec<u8>>,
{
    fn deserialize_as<D>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
    {
        <Cow<'de, str> as Deserialize<'de>>::deserialize(deserializer)
            .and_then(|s| base64::decode(&*s).map_err(Error::custom))
            .and_then(|vec: Vec<u8>| {
                let length = vec.len();
                vec.try_into().map_err(|_e: T::Error| {
                    Error::custom(format!("can't convert a byte vector of length {length} to the output type"))
                })
            })
    }
}
