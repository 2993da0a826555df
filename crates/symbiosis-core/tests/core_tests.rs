#[cfg(test)]
mod tests {
    use serde_json::json;
    use symbiosis_core::*;

    // ── Mood tests ─────────────────────────────────────────────

    #[test]
    fn test_mood_unknown_collapses_to_neutral() {
        for raw in ["ANGRY", "", "  ", "happy", "QUESTIONS", "null"] {
            assert_eq!(Mood::sanitize(raw), Mood::Neutral, "input {raw:?}");
        }
    }

    #[test]
    fn test_mood_sanitize_matches_exact_labels_only() {
        assert_eq!(Mood::sanitize("QUESTION"), Mood::Question);
        assert_eq!(Mood::sanitize(" joyful "), Mood::Neutral);
        assert_eq!(Mood::sanitize("Cryptic"), Mood::Neutral);
    }

    #[test]
    fn test_mood_from_model_value_folds_case() {
        assert_eq!(Mood::from_value(Some(&json!(" joyful "))), Mood::Joyful);
        assert_eq!(Mood::from_value(Some(&json!("Cryptic"))), Mood::Cryptic);
        assert_eq!(Mood::from_value(Some(&json!(3))), Mood::Neutral);
        assert_eq!(Mood::from_value(None), Mood::Neutral);
    }

    #[test]
    fn test_mood_sanitize_is_idempotent() {
        for raw in ["sad", "GLITCH", "bogus", "Affectionate", ""] {
            let once = Mood::sanitize(raw);
            let twice = Mood::sanitize(once.as_str());
            assert_eq!(once, twice);
        }
        for mood in Mood::ALL {
            assert_eq!(Mood::sanitize(mood.as_str()), mood);
        }
    }

    #[test]
    fn test_mood_deserializes_leniently() {
        let mood: Mood = serde_json::from_str("\"furious\"").unwrap();
        assert_eq!(mood, Mood::Neutral);
        let mood: Mood = serde_json::from_str("\"curious\"").unwrap();
        assert_eq!(mood, Mood::Curious);
        assert_eq!(serde_json::to_string(&Mood::Sad).unwrap(), "\"SAD\"");
    }

    // ── History tests ──────────────────────────────────────────

    #[test]
    fn test_history_truncates_to_limit() {
        let mut history = ChatHistory::new(10);
        for i in 0..15 {
            history.push(ChatMessage::user(format!("msg {i}")));
        }
        assert_eq!(history.len(), 10);
        assert_eq!(history.iter().next().unwrap().content, "msg 5");
        assert_eq!(history.last().unwrap().content, "msg 14");
    }

    #[test]
    fn test_history_last_by_role() {
        let mut history = ChatHistory::default();
        history.push(ChatMessage::user("hi"));
        history.push(ChatMessage::assistant("hello there"));
        history.push(ChatMessage::user("how are you"));
        assert_eq!(history.last_by_role(Role::Assistant).unwrap().content, "hello there");
        assert_eq!(history.by_role(Role::User).len(), 2);
    }

    #[test]
    fn test_transcript_tail_keeps_end() {
        let mut history = ChatHistory::default();
        history.push(ChatMessage::user("first line"));
        history.push(ChatMessage::assistant("second line"));
        let tail = history.transcript_tail(11);
        assert_eq!(tail, "second line");
        assert!(history.transcript().starts_with("USER: first line"));
    }

    // ── Memory entry tests ─────────────────────────────────────

    #[test]
    fn test_memory_entry_lenient_fields() {
        let entry: MemoryEntry = serde_json::from_value(json!({
            "fact": "Casey likes tea",
            "entities": ["Casey", "Tea"],
            "topics": "Preference, Neutral",
            "importance": "12"
        }))
        .unwrap();
        assert_eq!(entry.entities, "Casey, Tea");
        assert_eq!(entry.importance, 10);
        assert_eq!(entry.entity_list(), vec!["Casey", "Tea"]);
    }

    #[test]
    fn test_memory_entry_non_finite_importance_defaults() {
        for raw in ["NaN", "inf", "-inf"] {
            let entry: MemoryEntry = serde_json::from_value(json!({
                "fact": "Casey likes tea",
                "importance": raw
            }))
            .unwrap();
            assert_eq!(entry.importance, 5, "importance {raw:?}");
        }
    }

    #[test]
    fn test_memory_entry_blank() {
        assert!(MemoryEntry::new("null", "", "", 3).is_blank());
        assert!(MemoryEntry::new("   ", "", "", 3).is_blank());
        assert!(!MemoryEntry::new("Casey is tall", "Casey", "Identity", 3).is_blank());
    }

    #[test]
    fn test_director_memory_accepts_both_casings() {
        let a: DirectorMemory = serde_json::from_value(json!({"Entity": "Brent", "Fact": "Brent is tall"})).unwrap();
        let b: DirectorMemory = serde_json::from_value(json!({"entity": "Brent", "fact": "Brent is tall"})).unwrap();
        assert_eq!(a, b);
    }

    // ── Turn reply tests ───────────────────────────────────────

    #[test]
    fn test_turn_reply_serializes_camel_case() {
        let reply = TurnReply::text("hi", Mood::Cryptic).with_decks(vec!["Brent".into()]);
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["responseText"], "hi");
        assert_eq!(value["directorAction"], "SHOW_DECKS");
        assert_eq!(value["deckKeywords"][0], "Brent");
        assert!(value.get("files").is_none());
    }

    #[test]
    fn test_with_decks_ignores_empty() {
        let reply = TurnReply::text("hi", Mood::Neutral).with_decks(vec![]);
        assert!(reply.director_action.is_none());
    }

    // ── Knowledge graph tests ──────────────────────────────────

    #[test]
    fn test_graph_keeps_only_verbatim_context_words() {
        let context = "Casey went hiking with Jordan in the mountains. Casey loves coffee.";
        let raw = json!({
            "roots": [{
                "label": "casey",
                "mood": "joyful",
                "branches": [{
                    "label": "Mountains",
                    "mood": "CURIOUS",
                    "leaves": [
                        {"text": "Jordan", "mood": "AFFECTIONATE"},
                        {"text": "Outdoors", "mood": "JOYFUL"},
                        {"text": "2024", "mood": "SAD"},
                        {"text": "hot coffee", "mood": "SAD"}
                    ]
                }]
            }]
        });
        let graph = KnowledgeGraph::from_response(&raw).sanitize(context);
        assert_eq!(graph.roots.len(), 1);
        let root = &graph.roots[0];
        assert_eq!(root.label, "CASEY");
        assert_eq!(root.mood, Mood::Joyful);
        let leaves: Vec<&str> = root.branches[0].leaves.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(leaves, vec!["JORDAN"]);
    }

    #[test]
    fn test_graph_caps_shape() {
        let context = "A B C D E F G alpha beta gamma delta epsilon zeta eta";
        let leaves: Vec<_> = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta"]
            .iter()
            .map(|t| json!({"text": t, "mood": "SAD"}))
            .collect();
        let branches: Vec<_> = (0..7)
            .map(|_| json!({"label": "alpha", "mood": "SAD", "leaves": leaves.clone()}))
            .collect();
        let roots: Vec<_> = (0..5)
            .map(|_| json!({"label": "beta", "mood": "SAD", "branches": branches.clone()}))
            .collect();
        let graph = KnowledgeGraph::from_response(&json!({ "roots": roots })).sanitize(context);
        assert_eq!(graph.roots.len(), graph::MAX_ROOTS);
        for root in &graph.roots {
            assert!(root.branches.len() <= graph::MAX_BRANCHES);
            for branch in &root.branches {
                assert!(branch.leaves.len() <= graph::MAX_LEAVES);
            }
        }
    }

    #[test]
    fn test_graph_unknown_moods_become_neutral() {
        let raw = json!({"roots": [{"label": "tea", "mood": "ECSTATIC"}]});
        let graph = KnowledgeGraph::from_response(&raw).sanitize("tea time");
        assert_eq!(graph.roots[0].mood, Mood::Neutral);
    }

    #[test]
    fn test_graph_missing_roots_is_empty() {
        assert!(KnowledgeGraph::from_response(&json!({"response": "hi"})).is_empty());
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = SymbiosisError::Http { status: 500, body: "boom".into() };
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert!(SymbiosisError::Credentials { status: 401 }.is_credential_error());
        assert!(!SymbiosisError::Timeout { secs: 15 }.is_credential_error());
    }
}
