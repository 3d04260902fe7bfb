//! On-disk envelope for stored records.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::record::Record;

/// Versioned record envelope, rkyv-encoded in sled.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Envelope {
    /// Record version.
    pub version: u64,
    /// JSON-encoded record.
    pub data: Vec<u8>,
}

impl Envelope {
    /// Wrap a record at the given version.
    pub fn wrap(record: &Record, version: u64) -> Result<Self, Error> {
        Ok(Self {
            version,
            data: record.to_json_bytes()?,
        })
    }

    /// Decode the wrapped record.
    pub fn record(&self) -> Result<Record, Error> {
        Ok(Record::from_json_bytes(&self.data)?)
    }

    /// Serialize the envelope to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize an envelope from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::new();
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_keeps_version_and_record() {
        let record = Record::new("p1").with("title", "Loft").with("floors", 2);
        let envelope = Envelope::wrap(&record, 7).unwrap();

        let decoded = Envelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.version, 7);
        assert_eq!(decoded.record().unwrap(), record);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Envelope::from_bytes(&[1, 2, 3]).is_err());
    }
}
