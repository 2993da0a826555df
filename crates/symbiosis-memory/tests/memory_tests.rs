#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{Duration, Local, NaiveDate, Utc};
    use std::sync::Arc;
    use symbiosis_core::{
        ChatHistory, ChatMessage, DirectorMemory, MediaFile, MemoryEntry, Result, Role,
        SymbiosisError, VisualImage, format_fact_date,
    };
    use symbiosis_memory::retriever::*;
    use symbiosis_memory::{
        ChatRow, MediaSearch, MemoryBackend, MemoryRetriever, Retrieval, SqliteMemoryBackend,
    };

    fn store() -> Arc<SqliteMemoryBackend> {
        Arc::new(SqliteMemoryBackend::open_in_memory().unwrap())
    }

    fn media(name: &str, description: &str) -> MediaFile {
        MediaFile {
            name: name.into(),
            mime: "video/mp4".into(),
            url: format!("https://archive.example/{name}"),
            thumbnail: None,
            description: Some(description.into()),
        }
    }

    /// Backend whose every action fails.
    struct BrokenBackend;

    #[async_trait]
    impl MemoryBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        async fn get_recent_chat(&self) -> Result<Vec<ChatRow>> {
            Err(SymbiosisError::Memory("down".into()))
        }
        async fn log_chat(&self, _: Role, _: &str) -> Result<()> {
            Err(SymbiosisError::Memory("down".into()))
        }
        async fn retrieve(&self, _: &[String]) -> Result<Retrieval> {
            Err(SymbiosisError::Memory("down".into()))
        }
        async fn store_atomic(&self, _: &MemoryEntry) -> Result<()> {
            Err(SymbiosisError::Memory("down".into()))
        }
        async fn retrieve_director_memory(&self, _: &[String]) -> Result<Vec<DirectorMemory>> {
            Err(SymbiosisError::Memory("down".into()))
        }
        async fn store_director_fact(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Err(SymbiosisError::Memory("down".into()))
        }
        async fn director_search(&self, _: &str, _: &[String], _: &[String]) -> Result<MediaSearch> {
            Err(SymbiosisError::Memory("down".into()))
        }
        async fn search_entity_visuals(&self, _: &str) -> Result<Vec<VisualImage>> {
            Err(SymbiosisError::Memory("down".into()))
        }
    }

    // ── SQLite backend ─────────────────────────────────────────

    #[tokio::test]
    async fn test_store_and_retrieve_renders_date() {
        let db = store();
        let day = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        db.store_atomic_on(&MemoryEntry::new("Alex likes green tea", "Alex", "Food, Neutral", 4), day)
            .unwrap();

        let r = db.retrieve(&["Alex".into()]).await.unwrap();
        assert!(r.has_rows());
        assert!(r.relevant_memories[0].starts_with("[Jan 30, 2025] Alex likes green tea"));
    }

    #[tokio::test]
    async fn test_store_atomic_stamps_local_day() {
        let db = store();
        let before = Local::now().date_naive();
        db.store_atomic(&MemoryEntry::new("Alex likes green tea", "Alex", "Food, Neutral", 4))
            .await
            .unwrap();
        let after = Local::now().date_naive();

        let r = db.retrieve(&["Alex".into()]).await.unwrap();
        let row = &r.relevant_memories[0];
        assert!(
            [before, after]
                .into_iter()
                .any(|day| row.starts_with(&format!("[{}]", format_fact_date(day)))),
            "row {row:?}"
        );
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_hits_then_importance() {
        let db = store();
        let day = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        db.store_atomic_on(&MemoryEntry::new("Sam plays chess", "Sam", "Hobby", 9), day).unwrap();
        db.store_atomic_on(&MemoryEntry::new("Sam plays chess with Alex", "Sam, Alex", "Hobby", 3), day)
            .unwrap();

        let r = db.retrieve(&["Sam".into(), "Alex".into()]).await.unwrap();
        assert_eq!(r.relevant_memories.len(), 2);
        assert!(r.relevant_memories[0].contains("with Alex"));
    }

    #[tokio::test]
    async fn test_retrieve_without_match_is_not_found() {
        let db = store();
        let r = db.retrieve(&["Nobody".into()]).await.unwrap();
        assert!(!r.found);
        let r = db.retrieve(&["ab".into()]).await.unwrap();
        assert!(!r.found);
    }

    #[tokio::test]
    async fn test_chat_log_returns_oldest_first() {
        let db = store();
        let now = Utc::now();
        db.log_chat_at(Role::User, "first", now - Duration::minutes(2)).unwrap();
        db.log_chat_at(Role::Assistant, "second", now - Duration::minutes(1)).unwrap();
        let rows = db.get_recent_chat().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "first");
        assert_eq!(rows[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_chat_log_keeps_only_recent_rows() {
        let db = store();
        for i in 0..15 {
            db.log_chat(Role::User, &format!("line {i}")).await.unwrap();
        }
        let rows = db.get_recent_chat().await.unwrap();
        assert_eq!(rows.len(), symbiosis_memory::store::RECENT_CHAT_LIMIT);
        assert_eq!(rows.last().unwrap().content, "line 14");
    }

    #[tokio::test]
    async fn test_director_facts_match_entity_or_fact() {
        let db = store();
        db.store_director_fact("Has a scar on the left hand", "Alex", "Metadata").await.unwrap();
        db.store_director_fact("Wears red boots", "Sam", "Metadata").await.unwrap();

        let rows = db.retrieve_director_memory(&["scar".into()]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity, "Alex");

        let rows = db.retrieve_director_memory(&["Sam".into()]).await.unwrap();
        assert_eq!(rows[0].fact, "Wears red boots");
    }

    #[tokio::test]
    async fn test_director_search_requires_every_constraint() {
        let db = store();
        db.add_media(&media("alex_beach.mp4", "Alex at the beach")).unwrap();
        db.add_media(&media("sam_park.mp4", "Sam in the park")).unwrap();

        let both = db
            .director_search("alex and sam", &["Alex".into(), "Sam".into()], &[])
            .await
            .unwrap();
        assert!(!both.found);

        let alex = db.director_search("alex", &["Alex".into()], &[]).await.unwrap();
        assert!(alex.found);
        assert_eq!(alex.files.len(), 1);
    }

    #[tokio::test]
    async fn test_director_search_applies_excludes() {
        let db = store();
        db.add_media(&media("alex_beach.mp4", "Alex at the beach")).unwrap();
        let r = db
            .director_search("alex", &["Alex".into()], &["beach".into()])
            .await
            .unwrap();
        assert!(!r.found);
        assert!(r.files.is_empty());
    }

    #[tokio::test]
    async fn test_entity_visuals_case_insensitive() {
        let db = store();
        db.add_visual("Alex", "https://img.example/alex1.jpg").unwrap();
        db.add_visual("Sam", "https://img.example/sam.jpg").unwrap();
        let images = db.search_entity_visuals("alex").await.unwrap();
        assert_eq!(images.len(), 1);
        assert!(db.search_entity_visuals("Nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.db");
        {
            let db = SqliteMemoryBackend::open(&path).unwrap();
            db.store_atomic(&MemoryEntry::new("Robin bakes bread", "Robin", "Food", 3))
                .await
                .unwrap();
        }
        let db = SqliteMemoryBackend::open(&path).unwrap();
        assert_eq!(db.fact_count().unwrap(), 1);
    }

    // ── Media filtering ────────────────────────────────────────

    #[test]
    fn test_exclude_is_case_insensitive_substring() {
        let mut result = MediaSearch {
            found: true,
            files: vec![media("a.mp4", "Alex in the RAIN"), media("b.mp4", "Alex indoors")],
        };
        result.exclude(&["rain".into()]);
        assert!(result.found);
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].name, "b.mp4");
    }

    // ── Keyword heuristics ─────────────────────────────────────

    #[test]
    fn test_title_case_words_drop_stopwords() {
        assert_eq!(title_case_words("let's talk about ruben"), vec!["Ruben".to_string()]);
        assert!(title_case_words("no I dont know").is_empty());
    }

    #[test]
    fn test_sticky_words_take_two_long_alpha_words() {
        let words = sticky_words("Tell me about Gregory and his brother, Patrick and Theodore");
        assert_eq!(words, vec!["Gregory".to_string(), "Patrick".to_string()]);
    }

    #[test]
    fn test_deep_anchor_scans_back_to_last_named_subject() {
        let mut history = ChatHistory::default();
        history.push(ChatMessage::user("My sister Clara moved to Berlin"));
        history.push(ChatMessage::assistant("How is she finding it?"));
        history.push(ChatMessage::user("what do you think"));
        history.push(ChatMessage::user("Why though"));
        assert_eq!(deep_anchor(&history), vec!["My".to_string(), "Clara".to_string(), "Berlin".to_string()]);
    }

    #[test]
    fn test_deep_anchor_limited_to_five_user_turns() {
        let mut history = ChatHistory::new(20);
        history.push(ChatMessage::user("Clara called"));
        for _ in 0..5 {
            history.push(ChatMessage::user("hmm ok"));
        }
        assert!(deep_anchor(&history).is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_and_drops_short() {
        let keys = dedup_keywords(vec!["Alex".into(), "al".into(), "Alex".into(), " Sam ".into()]);
        assert_eq!(keys, vec!["Alex".to_string(), "Sam".to_string()]);
    }

    #[test]
    fn test_build_keywords_merges_sources() {
        let retriever = MemoryRetriever::new(store(), 0.0);
        let mut history = ChatHistory::default();
        history.push(ChatMessage::user("I went hiking with Marco"));
        history.push(ChatMessage::assistant("Sounds wonderful, mountains always help"));
        let keys = retriever.build_keywords(&KeywordQuery {
            input: "it was fun",
            extracted: &["Hiking".into()],
            history: &history,
            interrogation: false,
        }).keywords;
        assert_eq!(keys[0], "Hiking");
        assert!(keys.contains(&"Fun".to_string()));
        assert!(!keys.contains(&"wonderful,".to_string()));
        assert!(keys.contains(&"mountains".to_string()));
        assert!(keys.contains(&"Marco".to_string()));
        assert!(!keys.contains(&"Relationship".to_string()));
    }

    #[test]
    fn test_ghost_audit_reported_in_plan() {
        let retriever = MemoryRetriever::new(store(), 1.0).with_seed(1);
        let history = ChatHistory::default();
        let plan = retriever.build_keywords(&KeywordQuery {
            input: "hey",
            extracted: &[],
            history: &history,
            interrogation: false,
        });
        assert!(plan.ghost_audit);
    }

    #[test]
    fn test_ghost_audit_always_fires_at_probability_one() {
        let retriever = MemoryRetriever::new(store(), 1.0).with_seed(7);
        let history = ChatHistory::default();
        let keys = retriever.build_keywords(&KeywordQuery {
            input: "hello there",
            extracted: &[],
            history: &history,
            interrogation: false,
        }).keywords;
        for k in GHOST_AUDIT_KEYWORDS {
            assert!(keys.contains(&k.to_string()));
        }
    }

    #[test]
    fn test_ghost_audit_suppressed_in_interrogation() {
        let retriever = MemoryRetriever::new(store(), 1.0).with_seed(7);
        let history = ChatHistory::default();
        let keys = retriever.build_keywords(&KeywordQuery {
            input: "hello there",
            extracted: &[],
            history: &history,
            interrogation: true,
        }).keywords;
        assert!(!keys.contains(&"Relationship".to_string()));
    }

    #[test]
    fn test_long_input_falls_back_to_raw_words() {
        let retriever = MemoryRetriever::new(store(), 0.0);
        let history = ChatHistory::default();
        let input = "honestly, what else could anybody possibly want from a quiet weekend";
        let keys = retriever.build_keywords(&KeywordQuery {
            input,
            extracted: &[],
            history: &history,
            interrogation: false,
        }).keywords;
        assert!(keys.contains(&"honestly,".to_string()));
        assert!(keys.contains(&"weekend".to_string()));
        assert!(!keys.contains(&"what".to_string()));
    }

    #[tokio::test]
    async fn test_retrieval_errors_degrade_to_empty() {
        let retriever = MemoryRetriever::new(Arc::new(BrokenBackend), 0.0);
        let r = retriever.retrieve(&["Alex".into()]).await;
        assert!(!r.found);
        assert!(retriever.retrieve_director(&["Alex".into()]).await.is_empty());
    }
}
