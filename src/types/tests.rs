use super::*;

#[test]
fn test_extension_is_lowercased() {
    let resource = FileResource::file("id:1", "Report.PDF");
    assert_eq!(resource.extension().as_deref(), Some("pdf"));
}

#[test]
fn test_extension_uses_last_dot() {
    let resource = FileResource::file("id:1", "archive.tar.gz");
    assert_eq!(resource.extension().as_deref(), Some("gz"));
}

#[test]
fn test_extension_missing() {
    assert_eq!(FileResource::file("id:1", "README").extension(), None);
    assert_eq!(FileResource::file("id:1", ".bashrc").extension(), None);
    assert_eq!(FileResource::file("id:1", "trailing.").extension(), None);
}

#[test]
fn test_resource_kind_serialization() {
    let json = serde_json::to_string(&ResourceKind::Folder).unwrap();
    assert_eq!(json, "\"folder\"");

    let kind: ResourceKind = serde_json::from_str("\"file\"").unwrap();
    assert_eq!(kind, ResourceKind::File);
}

#[test]
fn test_needs_refresh_inside_margin() {
    let now = Utc::now();
    let credential = AccessCredential {
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        expires_at: now + Duration::minutes(4),
    };
    assert!(credential.needs_refresh(now, Duration::minutes(5)));
}

#[test]
fn test_needs_refresh_outside_margin() {
    let now = Utc::now();
    let credential = AccessCredential {
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        expires_at: now + Duration::minutes(10),
    };
    assert!(!credential.needs_refresh(now, Duration::minutes(5)));
}

#[test]
fn test_grant_preserves_previous_refresh_token() {
    let expires_at = Utc::now();
    let grant = TokenGrant {
        access_token: "new".to_string(),
        refresh_token: None,
        expires_at,
    };
    let credential = grant.into_credential("old-refresh");
    assert_eq!(credential.access_token, "new");
    assert_eq!(credential.refresh_token, "old-refresh");
}

#[test]
fn test_grant_refresh_token_is_authoritative() {
    let grant = TokenGrant {
        access_token: "new".to_string(),
        refresh_token: Some("rotated".to_string()),
        expires_at: Utc::now(),
    };
    assert_eq!(grant.into_credential("old").refresh_token, "rotated");
}

#[test]
fn test_index_report_record() {
    let mut report = IndexReport::default();
    report.record(FileOutcome::Indexed {
        external_id: "id:1".to_string(),
        chunks: 3,
    });
    report.record(FileOutcome::Skipped {
        external_id: "id:2".to_string(),
        reason: SkipReason::AlreadyIndexed,
    });
    report.record(FileOutcome::Failed(FileFailure {
        external_id: "id:3".to_string(),
        name: "data.xyz".to_string(),
        kind: ErrorKind::UnsupportedFormat,
        message: "Unsupported file type: xyz".to_string(),
    }));

    assert_eq!(report.processed(), 3);
    assert_eq!(report.chunks_inserted, 3);
    assert_eq!(report.indexed, vec!["id:1".to_string()]);
    assert_eq!(report.skipped, vec!["id:2".to_string()]);
    assert!(!report.is_complete_success());
}

#[test]
fn test_index_report_serialization() {
    let mut report = IndexReport::default();
    report.record(FileOutcome::Failed(FileFailure {
        external_id: "id:3".to_string(),
        name: "data.xyz".to_string(),
        kind: ErrorKind::UnsupportedFormat,
        message: "unsupported".to_string(),
    }));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["failed"][0]["kind"], "unsupported_format");
}

#[test]
fn test_render_empty_query_response() {
    assert_eq!(QueryResponse::default().render(), "No results found.");
}

#[test]
fn test_render_groups_by_resource() {
    let response = QueryResponse {
        results: vec![
            ResourceMatch {
                resource_id: "id:1".to_string(),
                name: "a.pdf".to_string(),
                path: Some("/docs/a.pdf".to_string()),
                contents: vec!["first".to_string(), "second".to_string()],
            },
            ResourceMatch {
                resource_id: "id:2".to_string(),
                name: "b.pdf".to_string(),
                path: None,
                contents: vec!["third".to_string()],
            },
        ],
    };

    let text = response.render();
    assert!(text.starts_with("Here are the results of your query:\n"));
    assert!(text.contains("FROM: /docs/a.pdf\nfirst\nsecond\n"));
    assert!(text.contains("FROM: b.pdf\nthird\n"));
}

#[test]
fn test_chunk_for_resource() {
    let resource = FileResource::file("id:9", "notes.txt").with_path("/notes.txt");
    let chunk = Chunk::for_resource("hello".to_string(), &resource);
    assert_eq!(chunk.resource_external_id, "id:9");
    assert_eq!(chunk.resource_name, "notes.txt");
    assert_eq!(chunk.resource_path.as_deref(), Some("/notes.txt"));
}
