//! Batch-level provenance metadata
//!
//! A client may tag every record with its batch, file and session, or send the
//! tags once alongside the collection. Record-level values always win.

use serde::Deserialize;

use super::record::FieldValue;

/// Provenance fields that can fall back to batch metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchField {
    BatchId,
    FileName,
    FileHash,
    UploadSessionId,
}

/// Metadata sent once per bulk request
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    #[serde(default, alias = "batch_id")]
    pub batch_id: Option<FieldValue>,
    #[serde(default, alias = "file_name")]
    pub file_name: Option<FieldValue>,
    #[serde(default, alias = "file_hash")]
    pub file_hash: Option<FieldValue>,
    #[serde(default, alias = "upload_session_id")]
    pub upload_session_id: Option<FieldValue>,
}

impl BatchMetadata {
    pub fn get(&self, field: BatchField) -> Option<&FieldValue> {
        let value = match field {
            BatchField::BatchId => &self.batch_id,
            BatchField::FileName => &self.file_name,
            BatchField::FileHash => &self.file_hash,
            BatchField::UploadSessionId => &self.upload_session_id,
        };
        value.as_ref().filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_case_keys() {
        let meta: BatchMetadata = serde_json::from_value(json!({
            "batchId": "B1",
            "file_hash": "H1",
            "uploadSessionId": null
        }))
        .unwrap();

        assert_eq!(meta.get(BatchField::BatchId), Some(&FieldValue::from("B1")));
        assert_eq!(meta.get(BatchField::FileHash), Some(&FieldValue::from("H1")));
        assert_eq!(meta.get(BatchField::FileName), None);
        assert_eq!(meta.get(BatchField::UploadSessionId), None);
    }
}
