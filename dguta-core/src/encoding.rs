use bincode::config::{self, Configuration};

use crate::{
    age::AgeBucket,
    error::{Error, Result},
    guta::Guts,
};

/// Tree (bucket) names inside each store.
pub const GUT_BUCKET: &str = "gut";
pub const CHILDREN_BUCKET: &str = "children";

const CONFIG: Configuration = config::standard();

/// Record key: raw directory path bytes with the age bucket as a single
/// trailing byte. Lexical key order therefore groups a directory's age
/// variants together, adjacent to its same-prefix children. Bucket codes are
/// all below 0x20 and the path text comes from a tab-separated line format
/// that cannot contain control bytes, so splitting on the final byte is
/// unambiguous.
pub fn record_key(dir: &str, age: AgeBucket) -> Vec<u8> {
    let mut key = Vec::with_capacity(dir.len() + 1);
    key.extend_from_slice(dir.as_bytes());
    key.push(age.code());
    key
}

/// Inverse of [`record_key`].
pub fn split_record_key(key: &[u8]) -> Result<(&str, AgeBucket)> {
    let (&age_byte, dir_bytes) = key.split_last().ok_or_else(|| bad_key("empty key"))?;
    let age = AgeBucket::from_code(age_byte)
        .ok_or_else(|| bad_key(&format!("bad age byte: {age_byte}")))?;
    let dir = std::str::from_utf8(dir_bytes).map_err(|_| bad_key("non-utf8 directory"))?;
    Ok((dir, age))
}

fn bad_key(reason: &str) -> Error {
    Error::Decode(bincode::error::DecodeError::OtherString(format!(
        "record key: {reason}"
    )))
}

pub fn encode_guts(guts: &Guts) -> Result<Vec<u8>> {
    Ok(bincode::encode_to_vec(guts, CONFIG)?)
}

pub fn decode_guts(bytes: &[u8]) -> Result<Guts> {
    let (guts, _) = bincode::decode_from_slice(bytes, CONFIG)?;
    Ok(guts)
}

pub fn encode_children(children: &[String]) -> Result<Vec<u8>> {
    Ok(bincode::encode_to_vec(children, CONFIG)?)
}

pub fn decode_children(bytes: &[u8]) -> Result<Vec<String>> {
    let (children, _) = bincode::decode_from_slice(bytes, CONFIG)?;
    Ok(children)
}
