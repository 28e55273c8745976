use lessonsync_cloud::CloudError;
use lessonsync_vault::VaultError;

#[test]
fn no_credential_display() {
    assert_eq!(CloudError::NoCredential.to_string(), "no credential stored");
}

#[test]
fn remote_list_display() {
    let err = CloudError::RemoteList {
        folder_id: "f-1".into(),
        reason: "listing returned 500 Internal Server Error".into(),
    };
    assert_eq!(
        err.to_string(),
        "listing folder f-1 failed: listing returned 500 Internal Server Error"
    );
}

#[test]
fn remote_fetch_display() {
    let err = CloudError::RemoteFetch {
        file_id: "abc".into(),
        reason: "connection reset".into(),
    };
    assert_eq!(err.to_string(), "downloading file abc failed: connection reset");
}

#[test]
fn auth_failed_display() {
    let err = CloudError::AuthFailed("invalid_grant".into());
    assert_eq!(err.to_string(), "authentication failed: invalid_grant");
}

#[test]
fn serialization_error_from_serde() {
    let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
    let err: CloudError = serde_err.into();
    assert!(matches!(err, CloudError::Serialization(_)));
}

// --- Vault mapping ---

#[test]
fn vault_errors_map_by_class() {
    assert!(matches!(
        CloudError::from(VaultError::KeyProvisioning("x".into())),
        CloudError::KeyProvisioning(_)
    ));
    assert!(matches!(
        CloudError::from(VaultError::CredentialCorrupted("x".into())),
        CloudError::CredentialCorrupted(_)
    ));
    assert!(matches!(
        CloudError::from(VaultError::Storage("x".into())),
        CloudError::LocalStorage(_)
    ));
}

// --- Recoverability ---

#[test]
fn key_provisioning_is_fatal() {
    assert!(!CloudError::KeyProvisioning("no keystore".into()).is_recoverable());
    assert!(!CloudError::Config("bad".into()).is_recoverable());
}

#[test]
fn run_level_errors_are_recoverable() {
    assert!(CloudError::NoCredential.is_recoverable());
    assert!(CloudError::CredentialCorrupted("tag".into()).is_recoverable());
    assert!(CloudError::AuthFailed("expired".into()).is_recoverable());
    assert!(CloudError::LocalStorage("disk full".into()).is_recoverable());
}

#[test]
fn kinds_are_stable() {
    assert_eq!(CloudError::NoCredential.kind(), "no_credential");
    assert_eq!(CloudError::AuthFailed(String::new()).kind(), "authentication");
    assert_eq!(
        CloudError::RemoteList {
            folder_id: String::new(),
            reason: String::new()
        }
        .kind(),
        "remote_list"
    );
}
