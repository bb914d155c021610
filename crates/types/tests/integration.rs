//! Integration tests for types

#[cfg(test)]
mod tests {
    use rscoop_types::*;

    #[test]
    fn test_patch_deserializes_partially() {
        let patch: OperationPatch = serde_json::from_str(r#"{"is_minimized": true}"#).unwrap();
        assert_eq!(patch, OperationPatch::minimized(true));
        assert!(!patch.is_empty());
        assert!(OperationPatch::default().is_empty());
    }

    #[test]
    fn test_start_request_from_wire() {
        let req: StartRequest =
            serde_json::from_str(r#"{"operationType": "update", "packageName": "7zip", "force": true}"#)
                .unwrap();
        assert_eq!(req.effective_type(), OperationType::ForceUpdate);
        assert!(req.validate().is_ok());
        assert_eq!(req.bucket, None);
    }

    #[test]
    fn test_output_record_serialization() {
        let record = OperationOutput::new("Installing 'git'", OutputSource::CommandEcho, 42);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "command-echo");
        assert_eq!(json["timestamp"], 42);
    }
}
