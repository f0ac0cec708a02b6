use std::sync::Mutex;

use super::*;

#[derive(Default)]
struct MemoryRemote {
    objects: Mutex<Vec<(String, usize, String)>>,
}

impl RemoteStore for MemoryRemote {
    fn upload(&self, object_path: &str, bytes: Vec<u8>, content_type: &str) -> RenderResult<()> {
        self.objects.lock().unwrap().push((
            object_path.to_string(),
            bytes.len(),
            content_type.to_string(),
        ));
        Ok(())
    }

    fn signed_url(&self, object_path: &str, ttl: Duration) -> RenderResult<String> {
        Ok(format!("mem://{object_path}?ttl={}", ttl.as_secs()))
    }
}

fn store() -> SupabaseStore {
    let mut config = RemoteConfig::new("https://abc.supabase.co/", "service-key");
    config.bucket = "bucket".to_string();
    SupabaseStore::new(config).unwrap()
}

#[test]
fn endpoints_follow_storage_api_layout() {
    let s = store();
    assert_eq!(
        s.object_url("renders/x-rendered.png"),
        "https://abc.supabase.co/storage/v1/object/bucket/renders/x-rendered.png"
    );
    assert_eq!(
        s.sign_endpoint("/previews/x.png"),
        "https://abc.supabase.co/storage/v1/object/sign/bucket/previews/x.png"
    );
}

#[test]
fn relative_signed_paths_are_made_absolute() {
    let s = store();
    assert_eq!(
        s.absolutize("/object/sign/bucket/a.png?token=t"),
        "https://abc.supabase.co/storage/v1/object/sign/bucket/a.png?token=t"
    );
    assert_eq!(s.absolutize("https://cdn/x"), "https://cdn/x");
}

#[test]
fn empty_credentials_disable_remote() {
    let err = SupabaseStore::new(RemoteConfig::new("", "key")).unwrap_err();
    assert_eq!(err.kind(), "remote_disabled");
    let err = SupabaseStore::new(RemoteConfig::new("https://x", " ")).unwrap_err();
    assert_eq!(err.kind(), "remote_disabled");
}

#[test]
fn config_defaults_bucket_and_ttl() {
    let config: RemoteConfig =
        serde_json::from_str(r#"{"url":"https://x","service_key":"k"}"#).unwrap();
    assert_eq!(config.bucket, DEFAULT_BUCKET);
    assert_eq!(config.signed_url_ttl(), Duration::from_secs(86_400));
}

#[test]
fn publish_uploads_file_then_signs() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("a-rendered.png");
    std::fs::write(&local, [1u8, 2, 3]).unwrap();

    let remote = MemoryRemote::default();
    let url = publish(&remote, &local, "renders/a-rendered.png", Duration::from_secs(60)).unwrap();
    assert_eq!(url, "mem://renders/a-rendered.png?ttl=60");
    assert_eq!(
        remote.objects.lock().unwrap().as_slice(),
        [(
            "renders/a-rendered.png".to_string(),
            3,
            "image/png".to_string()
        )]
    );
}

#[test]
fn publish_missing_file_fails_before_upload() {
    let remote = MemoryRemote::default();
    let err = publish(
        &remote,
        Path::new("/definitely/not/here.png"),
        "renders/x.png",
        Duration::from_secs(1),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "internal");
    assert!(remote.objects.lock().unwrap().is_empty());
}

#[test]
fn content_types_by_extension() {
    assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
    assert_eq!(content_type_for(Path::new("a.pdf")), "application/pdf");
    assert_eq!(content_type_for(Path::new("a")), "application/octet-stream");
}
