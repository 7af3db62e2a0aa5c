//! End-to-end tests for branch navigation and streamed segmentation.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatbranch::{
        ContentSource, ConversationView, Error, Message, MessageId, MessageStore, OpenSpanDisplay,
        PluginRegistry, Rendered, Span, SpanState, TranscriptStore, ViewConfig, ViewEvent,
        segment,
    };
    use futures::{StreamExt, stream};

    fn ids(path: &[MessageId]) -> Vec<&str> {
        path.iter().map(|id| id.as_str()).collect()
    }

    fn chunks(parts: &[&str]) -> ContentSource {
        ContentSource::chunked(parts.iter().map(|part| part.to_string()).collect::<Vec<_>>())
    }

    fn joined(spans: &[Span]) -> String {
        spans.iter().map(|span| span.raw.as_str()).collect()
    }

    #[tokio::test]
    async fn advancing_switches_the_displayed_sibling() {
        let messages = vec![
            Message::new("1", "Hi"),
            Message::reply("2", "1", "A"),
            Message::reply("3", "1", "B"),
        ];
        let mut view = ConversationView::new(messages, ViewConfig::default());
        assert_eq!(ids(&view.active_path_from("1")), vec!["1", "2"]);

        let change = view.advance("2");
        assert!(change.changed());
        assert_eq!(ids(change.newly_displayed()), vec!["3"]);
        assert_eq!(ids(&view.active_path_from("1")), vec!["1", "3"]);

        // Clamped at the last sibling.
        assert!(!view.advance("3").changed());
        assert!(view.retreat("3").changed());
        assert_eq!(ids(&view.active_path()), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn branch_selections_survive_switching_away() {
        let messages = vec![
            Message::new("1", "root"),
            Message::reply("2", "1", "left"),
            Message::reply("3", "1", "right"),
            Message::reply("4", "2", "left.a"),
            Message::reply("5", "2", "left.b"),
            Message::reply("6", "3", "right.a"),
        ];
        let mut view = ConversationView::new(messages, ViewConfig::default());
        view.select_node("5");
        assert_eq!(ids(&view.active_path()), vec!["1", "2", "5"]);

        view.advance("2");
        assert_eq!(ids(&view.active_path()), vec!["1", "3", "6"]);

        view.retreat("3");
        assert_eq!(ids(&view.active_path()), vec!["1", "2", "5"]);

        let rendered = view.render_path();
        assert!(rendered[1].has_siblings);
        assert_eq!(rendered[2].position.to_string(), "2/2");
    }

    #[tokio::test]
    async fn navigation_on_unknown_ids_is_a_no_op() {
        let mut view = ConversationView::new(vec![Message::new("1", "Hi")], ViewConfig::default());
        assert!(!view.advance("nope").changed());
        assert!(!view.retreat("nope").changed());
        assert!(!view.select_node("nope").changed());
        assert!(view.active_path_from("nope").is_empty());
    }

    #[tokio::test]
    async fn orphans_are_reported_and_not_displayed() {
        let messages = vec![
            Message::new("1", "Hi"),
            Message::reply("2", "1", "A"),
            Message::reply("9", "missing", "lost"),
        ];
        let mut view = ConversationView::new(messages, ViewConfig::default());
        let diagnostics = view.diagnostics();
        assert!(!diagnostics.is_clean());
        assert_eq!(ids(&diagnostics.orphaned), vec!["9"]);
        assert_eq!(ids(&view.active_path()), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn streamed_chunks_match_the_whole_text() {
        let parts = ["He", "llo ```py", "thon\nprint(1)\n```", " done"];
        let mut view = ConversationView::new(vec![Message::new("1", "")], ViewConfig::default());
        view.attach_stream("1", chunks(&parts)).unwrap();
        assert!(view.is_streaming("1"));

        let events = view.drain().await;
        assert_eq!(events.len(), parts.len() + 1);
        assert!(matches!(
            events.last(),
            Some(ViewEvent::ContentChanged { is_final: true, .. })
        ));
        assert!(!view.is_streaming("1"));

        let spans = view.spans("1").unwrap().to_vec();
        let texts: Vec<&str> = spans.iter().map(|span| span.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello ", "python\nprint(1)\n", " done"]);
        assert!(spans[0].is_plain());
        assert_eq!(spans[1].plugin(), Some("fenced_code"));
        assert_eq!(
            spans[1].rendered,
            Some(Rendered::Code {
                language: Some("python".to_string()),
                code: "print(1)\n".to_string(),
            })
        );
        assert!(spans.iter().all(Span::is_final));

        let whole = segment(&PluginRegistry::with_defaults(), &parts.concat());
        assert_eq!(spans, whole);
    }

    #[tokio::test]
    async fn every_chunking_yields_the_same_spans() {
        let text = "A```code```B and $x^2$ then $$\\int f$$.";
        let expected = segment(&PluginRegistry::with_defaults(), text);
        assert_eq!(joined(&expected), text);

        for chunk_chars in 1..=text.len() {
            let mut view =
                ConversationView::new(vec![Message::new("m", text)], ViewConfig::default());
            view.replay("m", chunk_chars, Duration::ZERO).unwrap();
            view.drain().await;
            assert_eq!(view.spans("m").unwrap(), expected.as_slice(), "{chunk_chars}");
        }
    }

    #[tokio::test]
    async fn open_regions_follow_the_display_setting() {
        let config = ViewConfig::default().with_open_span_display(OpenSpanDisplay::Pending);
        let mut view = ConversationView::new(vec![Message::new("1", "")], config);
        view.attach_stream("1", chunks(&["Hello ```py", "\nx\n```"]))
            .unwrap();

        view.next_event().await.unwrap();
        let spans = view.spans("1").unwrap();
        assert!(spans.last().unwrap().is_pending());
        assert_eq!(joined(&spans[..spans.len() - 1]), "Hello ");

        view.drain().await;
        let spans = view.spans("1").unwrap();
        assert!(spans.iter().all(|span| !span.is_pending()));
        assert!(spans.iter().any(Span::is_formatted));
    }

    #[tokio::test]
    async fn failed_stream_keeps_what_arrived() {
        let source = ContentSource::Chunks(Box::pin(stream::iter(vec![
            Ok("partial ```rust\nfn".to_string()),
            Err(Error::streaming("connection reset", None)),
            Ok("never seen".to_string()),
        ])));
        let mut view = ConversationView::new(vec![Message::new("1", "")], ViewConfig::default());
        view.attach_stream("1", source).unwrap();

        let events = view.drain().await;
        let failures = events
            .iter()
            .filter(|event| matches!(event, ViewEvent::StreamFailed { .. }))
            .count();
        assert_eq!(failures, 1);

        assert_eq!(view.buffer("1"), Some("partial ```rust\nfn"));
        let spans = view.spans("1").unwrap();
        assert_eq!(joined(spans), "partial ```rust\nfn");
        assert!(spans.iter().all(|span| span.is_plain() && span.is_final()));

        let rendered = view.render_message("1").unwrap();
        assert!(rendered.failure.unwrap().is_streaming());
    }

    #[tokio::test]
    async fn cancelled_stream_stops_updating() {
        let source = ContentSource::Chunks(Box::pin(stream::iter(vec![Ok::<_, Error>(
            "first ".to_string(),
        )])
            .chain(stream::pending())));
        let mut view = ConversationView::new(vec![Message::new("1", "")], ViewConfig::default());
        let token = view.attach_stream("1", source).unwrap();

        view.next_event().await.unwrap();
        assert_eq!(view.buffer("1"), Some("first "));
        token.cancel();

        let event = view.next_event().await.unwrap();
        assert!(matches!(event, ViewEvent::Cancelled { .. }));
        assert!(view.next_event().await.is_none());
        assert!(!view.is_streaming("1"));
        assert!(view.spans("1").unwrap().iter().all(|span| span.state == SpanState::Final));
    }

    #[tokio::test]
    async fn transcript_round_trips_through_a_file() {
        let path = std::env::temp_dir().join(format!(
            "chatbranch-integration-{}.yaml",
            std::process::id()
        ));
        let messages = vec![
            Message::new(1u64, "Hi").with_author("user"),
            Message::reply(2u64, 1u64, "").with_author("assistant"),
            Message::reply(3u64, 1u64, "B"),
        ];
        let mut view = ConversationView::new(messages, ViewConfig::default());
        view.attach_stream("2", chunks(&["Sure: ", "$a+b$"])).unwrap();
        view.drain().await;
        view.advance("2");

        let store = TranscriptStore::new(&path);
        store.save(&view.transcript()).unwrap();
        let loaded = store.messages().await.unwrap();
        assert_eq!(loaded[1].content, "Sure: $a+b$");

        let mut reloaded = ConversationView::load(&store, ViewConfig::default())
            .await
            .unwrap();
        assert_eq!(ids(&reloaded.active_path()), vec!["1", "2"]);
        let spans = reloaded.spans("2").unwrap();
        assert_eq!(spans[1].plugin(), Some("inline_math"));

        view.reload(&store).await.unwrap();
        assert_eq!(ids(&view.active_path()), vec!["1", "3"]);

        std::fs::remove_file(&path).unwrap();
    }
}
