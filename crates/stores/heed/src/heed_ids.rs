use std::borrow::Cow;

use heed::{BoxedError, BytesDecode, BytesEncode};
use uuid::Uuid;

#[derive(Debug)]
pub struct HeedUuid(pub Uuid);

impl From<Uuid> for HeedUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl<'a> BytesEncode<'a> for HeedUuid {
    type EItem = Self;

    fn bytes_encode(item: &'a Self::EItem) -> Result<Cow<'a, [u8]>, BoxedError> {
        Ok(item.0.as_bytes().into())
    }
}

impl<'a> BytesDecode<'a> for HeedUuid {
    type DItem = HeedUuid;

    fn bytes_decode(bytes: &'a [u8]) -> Result<Self::DItem, BoxedError> {
        Ok(HeedUuid(Uuid::from_slice(bytes)?))
    }
}

/// Key of the top-level feed index: big-endian creation time in
/// milliseconds, then the thread id. Byte order equals chronological order,
/// so a reverse scan walks the feed newest first.
#[derive(Debug)]
pub struct HeedCreationKey(pub (u64, Uuid));

impl From<(u64, Uuid)> for HeedCreationKey {
    fn from(key: (u64, Uuid)) -> Self {
        Self(key)
    }
}

impl<'a> BytesEncode<'a> for HeedCreationKey {
    type EItem = Self;

    fn bytes_encode(item: &'a Self::EItem) -> Result<Cow<'a, [u8]>, BoxedError> {
        let mut bytes = Vec::with_capacity(24);
        bytes.extend_from_slice(&item.0 .0.to_be_bytes());
        bytes.extend_from_slice(item.0 .1.as_bytes());
        Ok(Cow::Owned(bytes))
    }
}

impl<'a> BytesDecode<'a> for HeedCreationKey {
    type DItem = HeedCreationKey;

    fn bytes_decode(bytes: &'a [u8]) -> Result<Self::DItem, BoxedError> {
        if bytes.len() != 24 {
            return Err(BoxedError::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Invalid byte length for HeedCreationKey",
            )));
        }
        let timestamp = u64::from_be_bytes(bytes[..8].try_into()?);
        let uuid = Uuid::from_slice(&bytes[8..])?;
        Ok(HeedCreationKey((timestamp, uuid)))
    }
}
