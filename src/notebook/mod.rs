//! Notebook engine — draft state and the generation workflow.
//!
//! Owns everything the console front end operates on: the draft buffer,
//! prompt context fields, sampling parameters, preset/session stores and
//! the completion provider. Generation is two-phase so the caller can keep
//! servicing input while tokens arrive:
//!
//! 1. [`Notebook::begin_generation`] composes the prompt, saves the
//!    session, and returns the token channel plus a cancellation handle.
//! 2. The caller pumps [`StreamEvent`]s through [`Notebook::apply_token`]
//!    and closes out with [`Notebook::finish_generation`].

pub mod console;

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::grammar::{self, GrammarChecker, GrammarMatch};
use crate::llm::{providers, CompletionProvider, CompletionRequest, StopReason, StreamEvent};
use crate::markdown;
use crate::presets::{PresetStore, SamplingParams};
use crate::prompt::{self, PromptContext};
use crate::session::SessionStore;
use crate::voice::VoiceEngine;

pub struct Notebook {
    provider: CompletionProvider,
    grammar: GrammarChecker,
    voice: Option<VoiceEngine>,
    presets: PresetStore,
    session: SessionStore,
    work_dir: PathBuf,

    draft: String,
    context: PromptContext,
    model: String,
    params: SamplingParams,
    /// Speak generated text aloud when a voice engine is configured.
    audio_enabled: bool,

    last_prompt: String,
    last_generated: String,
    /// Findings from the most recent grammar check; offsets refer to the
    /// draft as it was when checked.
    grammar_matches: Vec<GrammarMatch>,

    gen_cancel: Option<CancellationToken>,
}

impl Notebook {
    /// Build the engine from resolved config and load the saved session.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let provider = providers::build(&config.llm, config.llm_api_key.clone())?;
        let grammar = GrammarChecker::new(&config.grammar)?;
        let voice = if config.tts.enabled {
            Some(VoiceEngine::build(
                &config.tts,
                &config.work_dir,
                config.novelai_api_key.clone(),
            )?)
        } else {
            None
        };
        let session = SessionStore::new(&config.work_dir);
        let draft = session.load()?;
        if !draft.is_empty() {
            info!(chars = draft.len(), "restored previous session");
        }

        Ok(Self {
            provider,
            grammar,
            voice,
            presets: PresetStore::new(&config.work_dir),
            session,
            work_dir: config.work_dir.clone(),
            draft,
            context: PromptContext::default(),
            model: config.llm.default_model.clone(),
            params: SamplingParams::default(),
            audio_enabled: config.tts.enabled,
            last_prompt: String::new(),
            last_generated: String::new(),
            grammar_matches: Vec::new(),
            gen_cancel: None,
        })
    }

    // ── Draft access ──────────────────────────────────────────────────

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn append_line(&mut self, line: &str) {
        if !self.draft.is_empty() {
            self.draft.push('\n');
        }
        self.draft.push_str(line);
    }

    pub fn clear_draft(&mut self) -> Result<(), AppError> {
        self.draft.clear();
        self.session.save(&self.draft)
    }

    pub fn context_mut(&mut self) -> &mut PromptContext {
        &mut self.context
    }

    pub fn save_session(&self) -> Result<(), AppError> {
        self.session.save(&self.draft)
    }

    // ── Model / params ────────────────────────────────────────────────

    pub async fn list_models(&self) -> Result<Vec<String>, AppError> {
        Ok(self.provider.list_models().await?)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    /// Set one sampling field by its wire name. Returns an error naming the
    /// field when the name or value does not fit.
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        fn bad(key: &str, value: &str) -> AppError {
            AppError::Preset(format!("invalid value '{value}' for {key}"))
        }
        match key {
            "max_tokens" => {
                self.params.max_tokens = value.parse().map_err(|_| bad(key, value))?
            }
            "temperature" => {
                self.params.temperature = value.parse().map_err(|_| bad(key, value))?
            }
            "top_p" => self.params.top_p = value.parse().map_err(|_| bad(key, value))?,
            "top_k" => self.params.top_k = value.parse().map_err(|_| bad(key, value))?,
            "min_p" => self.params.min_p = value.parse().map_err(|_| bad(key, value))?,
            "repetition_penalty" => {
                self.params.repetition_penalty = value.parse().map_err(|_| bad(key, value))?
            }
            "presence_penalty" => {
                self.params.presence_penalty = value.parse().map_err(|_| bad(key, value))?
            }
            other => return Err(AppError::Preset(format!("unknown parameter: {other}"))),
        }
        Ok(())
    }

    // ── Presets ───────────────────────────────────────────────────────

    pub fn preset_save(&self, name: &str) -> Result<(), AppError> {
        self.presets.save(name, &self.params)
    }

    pub fn preset_load(&mut self, name: &str) -> Result<(), AppError> {
        self.params = self.presets.load(name)?;
        Ok(())
    }

    pub fn preset_list(&self) -> Result<Vec<String>, AppError> {
        self.presets.list()
    }

    pub fn preset_delete(&self, name: &str) -> Result<bool, AppError> {
        self.presets.delete(name)
    }

    // ── Generation ────────────────────────────────────────────────────

    /// Compose the prompt from the current draft and start streaming.
    ///
    /// The draft is remembered as the undo point and the session is saved
    /// before any network traffic.
    pub async fn begin_generation(
        &mut self,
    ) -> Result<mpsc::Receiver<StreamEvent>, AppError> {
        self.last_prompt = self.draft.clone();
        self.last_generated.clear();
        self.grammar_matches.clear();
        self.session.save(&self.draft)?;

        let full_prompt = prompt::compose(&self.context, self.draft.trim());
        debug!(
            model = %self.model,
            prompt_len = full_prompt.len(),
            "starting generation"
        );

        let cancel = CancellationToken::new();
        self.gen_cancel = Some(cancel.clone());

        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: full_prompt,
            params: self.params.clone(),
        };
        let rx = self.provider.stream_completion(request, cancel).await?;
        Ok(rx)
    }

    /// Append one streamed token to the draft and the generation record.
    pub fn apply_token(&mut self, token: &str) {
        self.draft.push_str(token);
        self.last_generated.push_str(token);
    }

    /// Close out a generation: persist the session and hand back the
    /// generated text for optional speech.
    pub fn finish_generation(&mut self, reason: StopReason) -> Result<Option<String>, AppError> {
        self.gen_cancel = None;
        self.session.save(&self.draft)?;
        info!(
            ?reason,
            generated_chars = self.last_generated.len(),
            "generation finished"
        );

        if self.audio_enabled && self.voice.is_some() && !self.last_generated.is_empty() {
            Ok(Some(self.last_generated.clone()))
        } else {
            Ok(None)
        }
    }

    /// Cancel the in-flight generation (if any) and stop audio playback.
    pub fn cancel(&self) {
        if let Some(token) = &self.gen_cancel {
            token.cancel();
        }
        if let Some(voice) = &self.voice {
            voice.stop();
        }
    }

    /// Restore the pre-generation draft, then the caller regenerates.
    pub async fn retry(&mut self) -> Result<mpsc::Receiver<StreamEvent>, AppError> {
        self.draft = self.last_prompt.clone();
        self.begin_generation().await
    }

    /// Throw away the last generation and restore the pre-generation draft.
    pub fn undo(&mut self) -> Result<(), AppError> {
        self.draft = self.last_prompt.clone();
        self.last_generated.clear();
        self.session.save(&self.draft)
    }

    // ── Voice ─────────────────────────────────────────────────────────

    pub fn voice(&self) -> Option<&VoiceEngine> {
        self.voice.as_ref()
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    /// Toggle speech for generated text. Refused when no voice engine is
    /// configured, so the flag never silently promises audio.
    pub fn set_audio_enabled(&mut self, on: bool) -> Result<(), AppError> {
        if on && self.voice.is_none() {
            return Err(AppError::Config("tts is not enabled in config".into()));
        }
        self.audio_enabled = on;
        Ok(())
    }

    // ── Grammar ───────────────────────────────────────────────────────

    /// Check the draft; findings are kept for [`Notebook::apply_fix`].
    pub async fn check_grammar(&mut self) -> Result<&[GrammarMatch], AppError> {
        self.grammar_matches = self.grammar.check(self.draft.trim()).await?;
        Ok(&self.grammar_matches)
    }

    pub fn grammar_matches(&self) -> &[GrammarMatch] {
        &self.grammar_matches
    }

    /// Apply replacement `choice` of finding `index` to the draft.
    /// Remaining findings are dropped — their offsets no longer line up.
    pub fn apply_fix(&mut self, index: usize, choice: usize) -> Result<String, AppError> {
        let m = self
            .grammar_matches
            .get(index)
            .ok_or_else(|| AppError::Grammar(format!("no grammar match #{index}")))?;
        let replacement = m
            .replacements
            .get(choice)
            .ok_or_else(|| AppError::Grammar(format!("match #{index} has no suggestion #{choice}")))?
            .value
            .clone();

        // The check ran against the trimmed draft; apply against the same view.
        let trimmed = self.draft.trim().to_string();
        let fixed = grammar::apply_replacement(&trimmed, m, &replacement)?;
        self.draft = fixed;
        self.grammar_matches.clear();
        self.session.save(&self.draft)?;
        Ok(replacement)
    }

    // ── Markdown ──────────────────────────────────────────────────────

    pub fn preview_markdown(&self) -> Result<PathBuf, AppError> {
        markdown::open_preview(&self.work_dir, &self.draft)
    }
}

impl Drop for Notebook {
    fn drop(&mut self) {
        // Session save mirrors the window-close handler of the original UI.
        if let Err(e) = self.session.save(&self.draft) {
            warn!(error = %e, "failed to save session on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn notebook(dir: &TempDir) -> Notebook {
        let config = Config::test_default(dir.path());
        Notebook::new(&config).unwrap()
    }

    async fn run_generation(nb: &mut Notebook) -> StopReason {
        let mut rx = nb.begin_generation().await.unwrap();
        loop {
            match rx.recv().await {
                Some(StreamEvent::Token(t)) => nb.apply_token(&t),
                Some(StreamEvent::Finished(reason)) => {
                    nb.finish_generation(reason).unwrap();
                    return reason;
                }
                Some(StreamEvent::Failed(e)) => panic!("stream failed: {e}"),
                None => panic!("stream ended without finish event"),
            }
        }
    }

    #[tokio::test]
    async fn generation_appends_stream_to_draft() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);
        nb.append_line("Once upon a time");

        let reason = run_generation(&mut nb).await;
        assert_eq!(reason, StopReason::Done);
        // Dummy provider echoes the prompt back.
        assert_eq!(nb.draft(), "Once upon a time[echo] Once upon a time");
    }

    #[tokio::test]
    async fn undo_restores_pre_generation_draft() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);
        nb.append_line("Draft text");

        run_generation(&mut nb).await;
        assert_ne!(nb.draft(), "Draft text");

        nb.undo().unwrap();
        assert_eq!(nb.draft(), "Draft text");
    }

    #[tokio::test]
    async fn retry_regenerates_from_undo_point() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);
        nb.append_line("Seed");
        run_generation(&mut nb).await;

        let mut rx = nb.retry().await.unwrap();
        let mut out = String::new();
        loop {
            match rx.recv().await {
                Some(StreamEvent::Token(t)) => {
                    nb.apply_token(&t);
                    out.push_str(&t);
                }
                Some(StreamEvent::Finished(r)) => {
                    nb.finish_generation(r).unwrap();
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(nb.draft(), format!("Seed{out}"));
    }

    #[tokio::test]
    async fn generation_persists_session() {
        let dir = TempDir::new().unwrap();
        {
            let mut nb = notebook(&dir);
            nb.append_line("Persisted");
            run_generation(&mut nb).await;
        }
        let nb2 = notebook(&dir);
        assert!(nb2.draft().starts_with("Persisted"));
        assert!(nb2.draft().contains("[echo]"));
    }

    #[tokio::test]
    async fn prompt_includes_context_fields() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);
        nb.context_mut().memory = "MEM".into();
        nb.append_line("draft");

        run_generation(&mut nb).await;
        // The echo provider streams the composed prompt back, so context
        // interleaving is visible in the generated text.
        assert!(nb.draft().contains("[echo] MEM\ndraft"));
    }

    #[test]
    fn set_param_validates_names_and_values() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);

        nb.set_param("temperature", "1.2").unwrap();
        assert_eq!(nb.params().temperature, 1.2);
        nb.set_param("top_k", "-1").unwrap();
        assert_eq!(nb.params().top_k, -1);

        assert!(nb.set_param("temperature", "warm").is_err());
        assert!(nb.set_param("beam_width", "4").is_err());
    }

    #[test]
    fn presets_round_trip_through_engine() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);

        nb.set_param("temperature", "0.55").unwrap();
        nb.preset_save("mine").unwrap();

        nb.set_param("temperature", "0.9").unwrap();
        nb.preset_load("mine").unwrap();
        assert_eq!(nb.params().temperature, 0.55);
        assert_eq!(nb.preset_list().unwrap(), vec!["mine"]);
    }

    #[test]
    fn audio_toggle_refused_without_voice() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);
        assert!(!nb.audio_enabled());
        assert!(nb.set_audio_enabled(true).is_err());
    }

    #[test]
    fn apply_fix_updates_draft() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);
        nb.append_line("He dont know.");
        nb.grammar_matches = vec![GrammarMatch {
            offset: 3,
            length: 4,
            message: "typo".into(),
            replacements: vec![crate::grammar::Replacement { value: "doesn't".into() }],
        }];

        let applied = nb.apply_fix(0, 0).unwrap();
        assert_eq!(applied, "doesn't");
        assert_eq!(nb.draft(), "He doesn't know.");
        assert!(nb.grammar_matches().is_empty());
    }

    #[test]
    fn apply_fix_bad_indices_error() {
        let dir = TempDir::new().unwrap();
        let mut nb = notebook(&dir);
        assert!(nb.apply_fix(0, 0).is_err());
    }
}
