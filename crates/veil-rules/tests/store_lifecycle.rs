//! Store, resolver and cascade working together.

use std::sync::Arc;

use veil_core::PatternType;
use veil_rules::{BlockElementDraft, MemoryStore, PresetDraft, RuleStore};

fn draft(name: &str, selector: &str, pattern: &str, ty: PatternType) -> BlockElementDraft {
    BlockElementDraft::new(name, vec![selector.to_string()], pattern, ty)
}

#[tokio::test]
async fn test_presets_drive_active_rules() {
    let rules = RuleStore::new(Arc::new(MemoryStore::new()));

    let shorts = rules
        .save_block_element(draft("Shorts", "ytd-reel-shelf-renderer", "youtube.com", PatternType::SiteWide))
        .await
        .unwrap();
    let sidebar = rules
        .save_block_element(draft("Sidebar", "#secondary", "youtube.com/watch*", PatternType::PathPattern))
        .await
        .unwrap();
    let comments = rules
        .save_block_element(draft("Comments", "#comments", "youtube.com/watch*", PatternType::PathPattern))
        .await
        .unwrap();

    let focus = rules
        .save_preset(PresetDraft::new("Focus", vec![shorts.id.clone(), sidebar.id.clone()]))
        .await
        .unwrap();
    let quiet = rules
        .save_preset(PresetDraft::new("Quiet", vec![sidebar.id.clone(), comments.id.clone()]))
        .await
        .unwrap();

    // Nothing is enabled yet
    assert!(rules
        .active_block_elements("https://www.youtube.com/watch?v=1")
        .await
        .is_empty());

    rules.toggle_preset(&focus.id, None).await.unwrap();
    rules.toggle_preset(&quiet.id, Some(true)).await.unwrap();

    let active: Vec<String> = rules
        .active_block_elements("https://www.youtube.com/watch?v=1")
        .await
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(active, vec!["Shorts", "Sidebar", "Comments"]);

    let home: Vec<String> = rules
        .active_block_elements("https://www.youtube.com/")
        .await
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(home, vec!["Shorts"]);

    // Deleting the shared element strips it from both presets
    let report = rules.delete_block_element(&sidebar.id).await.unwrap();
    assert!(report.deleted.is_empty());
    assert_eq!(report.updated.len(), 2);

    // Deleting the last member of Focus removes the preset
    let report = rules.delete_block_element(&shorts.id).await.unwrap();
    assert_eq!(report.deleted, vec![focus.id.clone()]);

    let presets = rules.presets().await;
    assert_eq!(presets.len(), 1);
    assert_eq!(presets[0].id, quiet.id);
    assert_eq!(presets[0].block_element_ids, vec![comments.id.clone()]);

    let active: Vec<String> = rules
        .active_block_elements("https://youtube.com/watch?v=2")
        .await
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(active, vec![comments.id]);
}

#[tokio::test]
async fn test_store_survives_json_round_trip() {
    let backend = Arc::new(MemoryStore::new());
    let rules = RuleStore::new(Arc::clone(&backend));
    let element = rules
        .save_block_element(draft("Ads", ".ad", "example.com", PatternType::SiteWide))
        .await
        .unwrap();

    let persisted = serde_json::to_string(&backend.snapshot()).unwrap();
    assert!(persisted.contains("\"urlPatternType\":\"site_wide\""));

    let restored = MemoryStore::from_record(serde_json::from_str(&persisted).unwrap());
    let rules = RuleStore::new(Arc::new(restored));
    assert_eq!(rules.block_elements().await, vec![element]);
}
