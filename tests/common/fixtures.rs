use noticeflow::notice::NoticeDocument;
use std::path::PathBuf;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

pub fn load_notice_fixture(relative: &str) -> NoticeDocument {
    let content = load_fixture(relative);
    NoticeDocument::from_json_str(&content)
        .unwrap_or_else(|e| panic!("Failed to decode notice fixture {}: {}", relative, e))
}
