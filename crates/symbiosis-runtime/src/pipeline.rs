use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dedup::FactJudge;
use crate::director::{DEFAULT_DRILL_DOWN_LIMIT, IntentRouter};
use crate::generator::{GenerationRequest, ResponseGenerator};
use crate::guard::{self, GLITCH_REPLY, SOCIAL_ADVISORY};
use crate::prompts::Persona;
use crate::redundancy::RedundancyGuard;
use crate::session::Session;
use crate::synthesis::Synthesizer;
use crate::temporal::{DEFAULT_IMPORTANCE_THRESHOLD, Resolution, TemporalResolver};
use crate::writer::{DEFAULT_QUEUE_CAPACITY, MemoryWriter, WriteJob};
use symbiosis_config::SymbiosisConfig;
use symbiosis_core::{
    ChatHistory, ChatMessage, KnowledgeGraph, Mood, Result, Role, SessionMode, SymbiosisError,
    TurnReply, VisualImage,
};
use symbiosis_llm::{CompletionClient, OpenAiProvider, RetryPolicy};
use symbiosis_memory::{
    HttpMemoryBackend, KeywordQuery, MemoryBackend, MemoryRetriever, SqliteMemoryBackend,
};

/// Tunables threaded into every stage.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub persona: Persona,
    pub ghost_audit_probability: f64,
    pub drill_down_limit: usize,
    pub time_gap_hours: i64,
    pub writer_queue_capacity: usize,
    pub importance_threshold: u8,
    pub history_limit: usize,
    /// Fixes the ghost audit rolls.
    pub rng_seed: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            persona: Persona::default(),
            ghost_audit_probability: 0.05,
            drill_down_limit: DEFAULT_DRILL_DOWN_LIMIT,
            time_gap_hours: 6,
            writer_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            importance_threshold: DEFAULT_IMPORTANCE_THRESHOLD,
            history_limit: symbiosis_core::message::DEFAULT_HISTORY_LIMIT,
            rng_seed: None,
        }
    }
}

impl From<&SymbiosisConfig> for PipelineSettings {
    fn from(config: &SymbiosisConfig) -> Self {
        Self {
            persona: Persona {
                name: config.agent.subject_name.clone(),
                pronouns: config.agent.subject_pronouns.clone(),
            },
            ghost_audit_probability: config.pipeline.ghost_audit_probability,
            drill_down_limit: config.pipeline.drill_down_limit,
            time_gap_hours: config.pipeline.time_gap_hours,
            writer_queue_capacity: config.pipeline.writer_queue_capacity,
            importance_threshold: config.pipeline.importance_threshold,
            history_limit: config.memory.history_limit,
            rng_seed: None,
        }
    }
}

/// One utterance in, one [`TurnReply`] out.
pub struct Pipeline {
    settings: PipelineSettings,
    retriever: Arc<MemoryRetriever>,
    synthesizer: Synthesizer,
    temporal: TemporalResolver,
    router: IntentRouter,
    generator: ResponseGenerator,
    guard: RedundancyGuard,
    writer: MemoryWriter,
}

impl Pipeline {
    /// Wire every stage. Spawns the writer task, so a tokio runtime must be
    /// running.
    pub fn new(client: CompletionClient, backend: Arc<dyn MemoryBackend>, settings: PipelineSettings) -> Self {
        let mut retriever = MemoryRetriever::new(backend, settings.ghost_audit_probability);
        if let Some(seed) = settings.rng_seed {
            retriever = retriever.with_seed(seed);
        }
        let retriever = Arc::new(retriever);
        let judge = FactJudge::new(client.clone(), settings.persona.clone());

        Self {
            synthesizer: Synthesizer::new(client.clone(), settings.persona.clone()),
            temporal: TemporalResolver::new(
                client.clone(),
                Arc::clone(&retriever),
                settings.importance_threshold,
            ),
            router: IntentRouter::new(
                client.clone(),
                Arc::clone(&retriever),
                judge.clone(),
                settings.drill_down_limit,
            ),
            generator: ResponseGenerator::new(client.clone()),
            guard: RedundancyGuard::new(client, Arc::clone(&retriever)),
            writer: MemoryWriter::spawn(judge, Arc::clone(&retriever), settings.writer_queue_capacity),
            retriever,
            settings,
        }
    }

    /// Build the completion provider and memory backend the config names.
    pub fn from_config(config: &SymbiosisConfig) -> Result<Self> {
        let api_key = config
            .services
            .openrouter_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SymbiosisError::Config(
                    "no completion API key configured (set OPENROUTER_API_KEY or services.openrouter_api_key)".into(),
                )
            })?;
        let provider_name = if config.completion.base_url.contains("openrouter") {
            "openrouter"
        } else {
            "openai-compatible"
        };
        let provider = OpenAiProvider::new(api_key)
            .with_base_url(config.completion.base_url.clone(), provider_name.into())
            .with_app_title(config.completion.app_title.clone());
        let policy = RetryPolicy {
            max_attempts: config.completion.max_attempts,
            base_delay: Duration::from_millis(config.completion.base_delay_ms),
            timeout: Duration::from_secs(config.completion.timeout_secs),
        };
        let client = CompletionClient::new(Arc::new(provider), config.agent.model.clone()).with_policy(policy);

        let backend: Arc<dyn MemoryBackend> = match &config.memory.backend_url {
            Some(url) => Arc::new(HttpMemoryBackend::new(url.clone())),
            None => Arc::new(SqliteMemoryBackend::open(&config.memory.db_path)?),
        };
        info!(
            model = %config.agent.model,
            backend = backend.name(),
            "pipeline configured"
        );
        Ok(Self::new(client, backend, PipelineSettings::from(config)))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn backend(&self) -> &Arc<dyn MemoryBackend> {
        self.retriever.backend()
    }

    /// A fresh session sized to the configured history limit.
    pub fn new_session(&self) -> Session {
        Session::new().with_history_limit(self.settings.history_limit)
    }

    /// Seed the session from the persisted chat log.
    pub async fn restore_session(&self, session: &mut Session, now: DateTime<Utc>) {
        match self.backend().get_recent_chat().await {
            Ok(rows) => {
                debug!(rows = rows.len(), "restoring chat history");
                session.restore(rows, now, self.settings.time_gap_hours);
            }
            Err(e) => warn!(error = %e, "chat history unavailable, starting fresh"),
        }
    }

    /// Images for one entity deck. Empty on any backend failure.
    pub async fn entity_visuals(&self, entity: &str) -> Vec<VisualImage> {
        match self.backend().search_entity_visuals(entity).await {
            Ok(images) => images,
            Err(e) => {
                warn!(error = %e, %entity, "visual lookup failed");
                vec![]
            }
        }
    }

    /// Wait until every queued background write has finished.
    pub async fn drain(&self) {
        self.writer.drain().await;
    }

    /// Finish background writes and stop the writer.
    pub async fn shutdown(self) {
        self.writer.shutdown().await;
    }

    /// Run one turn. `today` anchors every date the turn produces.
    pub async fn run_turn(&self, session: &mut Session, input: &str, today: NaiveDate) -> TurnReply {
        let input = input.trim();
        if input.is_empty() {
            return TurnReply::text("...", session.mood);
        }
        if let Some(reply) = session.command(input) {
            info!(mode = ?session.mode, "session mode changed");
            return reply;
        }
        if guard::is_garbage(input) {
            warn!("garbage input rejected");
            session.mood = Mood::Glitch;
            return TurnReply::text(GLITCH_REPLY, Mood::Glitch);
        }

        let text = guard::scrub_injection(input).into_owned();
        self.log_chat(Role::User, &text);

        let mut history = session.history.clone();
        if guard::is_social(&text) {
            history.push(ChatMessage::system(SOCIAL_ADVISORY));
        }

        let reply = match session.mode {
            SessionMode::Director => self.router.route(&text, &history).await,
            SessionMode::Standard | SessionMode::Interrogation => {
                self.standard_turn(session, &text, &history, today).await
            }
        };

        session.record_exchange(&text, &reply);
        self.log_chat(Role::Assistant, &reply.response_text);
        reply
    }

    async fn standard_turn(
        &self,
        session: &mut Session,
        text: &str,
        history: &ChatHistory,
        today: NaiveDate,
    ) -> TurnReply {
        let interrogation = session.is_interrogation();
        let pending = session.pending_fact.take();
        let synthesis = self
            .synthesizer
            .analyze(text, history, pending.as_deref(), today)
            .await;

        let entries = match self
            .temporal
            .resolve(synthesis.entries, &synthesis.search_keywords, text, today)
            .await
        {
            Resolution::Ready(entries) => entries,
            Resolution::Intercept { pending_fact, question } => {
                session.pending_fact = Some(pending_fact);
                return TurnReply::text(question, Mood::Curious).with_graph(KnowledgeGraph::default());
            }
        };

        let plan = self.retriever.build_keywords(&KeywordQuery {
            input: text,
            extracted: &synthesis.search_keywords,
            history,
            interrogation,
        });
        let memory = self.retriever.retrieve(&plan.keywords).await;

        let mut generated = self
            .generator
            .generate(GenerationRequest {
                input: text,
                memory: &memory,
                history,
                interrogation,
                ghost_audit: plan.ghost_audit,
            })
            .await;
        if interrogation {
            generated = self.guard.review(generated, &synthesis.search_keywords).await;
        }

        self.writer
            .submit(WriteJob {
                entries,
                context: memory.relevant_memories,
            })
            .await;

        TurnReply::text(generated.response, generated.mood).with_graph(generated.graph)
    }

    /// Fire-and-forget chat log append.
    fn log_chat(&self, role: Role, content: &str) {
        let backend = Arc::clone(self.backend());
        let content = content.to_string();
        tokio::spawn(async move {
            if let Err(e) = backend.log_chat(role, &content).await {
                warn!(error = %e, role = role.as_str(), "chat log append failed");
            }
        });
    }
}
